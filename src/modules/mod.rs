pub mod books;

use std::sync::Arc;

use bookshelf_db::{Database, DbModule};
use bookshelf_kernel::{settings::Settings, ModuleRegistry};

use books::gateway::{InMemoryBookGateway, MongoBookGateway};
use books::BooksModule;

/// Register the database core module (unless running in memory) and every
/// feature module with the registry.
pub async fn register_all(registry: &mut ModuleRegistry, settings: &Settings) -> anyhow::Result<()> {
    if settings.database.in_memory {
        tracing::warn!("database.in_memory is set; books are not persisted");
        registry.register_custom(Arc::new(BooksModule::new(InMemoryBookGateway::new())));
        return Ok(());
    }

    let database = Database::connect(&settings.database).await?;
    let gateway = MongoBookGateway::new(&database, &settings.database.collection);
    registry.register_core(Arc::new(DbModule::new(database)));
    registry.register_custom(Arc::new(BooksModule::new(gateway)));
    Ok(())
}
