//! MongoDB connection handle and the `db` core module that owns its lifecycle.

use anyhow::Context;
use async_trait::async_trait;
use bookshelf_kernel::settings::DatabaseSettings;
use bookshelf_kernel::{InitCtx, Module};
use bson::doc;
use mongodb::{Client, Collection};

/// Explicitly constructed database handle. Cloning is cheap; every clone
/// shares the same connection pool.
#[derive(Clone, Debug)]
pub struct Database {
    client: Client,
    inner: mongodb::Database,
}

impl Database {
    /// Parse the connection string and build the client. The driver connects
    /// lazily, so an unreachable server surfaces on the first operation
    /// (see [`Database::ping`]).
    pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<Self> {
        let client = Client::with_uri_str(&settings.uri)
            .await
            .with_context(|| "failed to parse MongoDB connection string")?;

        // A database named in the URI path wins over the configured name.
        let inner = client
            .default_database()
            .unwrap_or_else(|| client.database(&settings.name));

        tracing::info!(target: "bookshelf-db", database = %inner.name(), "MongoDB client created");

        Ok(Self { client, inner })
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.inner.collection(name)
    }

    pub async fn ping(&self) -> anyhow::Result<()> {
        self.inner
            .run_command(doc! { "ping": 1 })
            .await
            .with_context(|| format!("failed to reach MongoDB database '{}'", self.name()))?;
        Ok(())
    }

    /// Close every pooled connection. Operations issued afterwards fail.
    pub async fn close(&self) {
        self.client.clone().shutdown().await;
        tracing::info!(target: "bookshelf-db", database = %self.name(), "MongoDB client closed");
    }
}

/// Core module that verifies connectivity at startup and closes the client
/// at shutdown.
pub struct DbModule {
    database: Database,
}

impl DbModule {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl Module for DbModule {
    fn name(&self) -> &'static str {
        "db"
    }

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        self.database.ping().await?;
        tracing::info!(module = self.name(), database = %self.database.name(), "database reachable");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.database.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_malformed_connection_string() {
        let settings = DatabaseSettings {
            uri: "postgres://localhost".to_string(),
            ..DatabaseSettings::default()
        };
        assert!(Database::connect(&settings).await.is_err());
    }

    #[tokio::test]
    async fn database_name_comes_from_uri_path() {
        let settings = DatabaseSettings {
            uri: "mongodb://localhost:27017/catalog".to_string(),
            name: "ignored".to_string(),
            ..DatabaseSettings::default()
        };
        let database = Database::connect(&settings).await.unwrap();
        assert_eq!(database.name(), "catalog");
    }

    #[tokio::test]
    async fn database_name_falls_back_to_settings() {
        let settings = DatabaseSettings {
            uri: "mongodb://localhost:27017".to_string(),
            name: "bookstore".to_string(),
            ..DatabaseSettings::default()
        };
        let database = Database::connect(&settings).await.unwrap();
        assert_eq!(database.name(), "bookstore");
    }
}
