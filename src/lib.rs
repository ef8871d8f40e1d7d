//! Bookshelf application: wires the book catalog module into the kernel
//! registry and serves it over HTTP.

pub mod modules;
pub mod summation;

use anyhow::Context;
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

/// Build a registry with every module registered, ready to boot.
pub async fn build_registry(settings: &Settings) -> anyhow::Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, settings).await?;
    tracing::info!(
        core = registry.core_module_count(),
        custom = registry.custom_module_count(),
        "modules registered"
    );
    Ok(registry)
}

/// Boot every module. If any module fails, the ones already up are stopped
/// before the boot error is returned.
pub async fn boot(registry: &ModuleRegistry, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
    let Err(err) = registry.boot(ctx).await else {
        return Ok(());
    };
    if let Err(stop_err) = registry.shutdown().await {
        tracing::error!(error = ?stop_err, "module shutdown after failed boot");
    }
    Err(err.context("module boot failed"))
}

/// Boot every module, serve until a shutdown signal, then stop modules in
/// reverse order.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    bookshelf_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        environment = settings.environment.as_str(),
        api_prefix = %settings.server.api_prefix,
        "bookshelf bootstrap starting"
    );

    let registry = build_registry(&settings).await?;
    let ctx = InitCtx {
        settings: &settings,
    };
    boot(&registry, &ctx).await?;

    let served = bookshelf_http::start_server(&registry, &settings).await;
    let stopped = registry.shutdown().await;

    served?;
    stopped.context("module shutdown failed")?;
    tracing::info!("bookshelf stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use bookshelf_kernel::{settings::Environment, Module};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };
    use tower::ServiceExt;

    struct Tracked {
        name: &'static str,
        fail_init: bool,
        stopped: Arc<AtomicBool>,
    }

    #[async_trait::async_trait]
    impl Module for Tracked {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
            if self.fail_init {
                anyhow::bail!("index creation failed");
            }
            Ok(())
        }

        async fn stop(&self) -> anyhow::Result<()> {
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn in_memory_settings(environment: Environment) -> Settings {
        let mut settings = Settings {
            environment,
            ..Settings::default()
        };
        settings.database.in_memory = true;
        settings
    }

    async fn call(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn books_are_served_under_api_prefix() {
        let settings = in_memory_settings(Environment::Development);
        let registry = build_registry(&settings).await.unwrap();
        registry
            .boot(&InitCtx {
                settings: &settings,
            })
            .await
            .unwrap();
        let app = bookshelf_http::build_router(&registry, &settings);

        let (status, body) = call(
            &app,
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/books")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "title": "Dune",
                        "author": "Frank Herbert",
                        "isbn": "9780441013593",
                        "genre": "science_fiction",
                        "price": 15.99,
                        "publication_date": "1965-08-01"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "available");

        let (status, body) = call(
            &app,
            Request::builder()
                .uri("/api/v1/books?page=1&limit=10")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["total"], 1);

        let (status, body) = call(
            &app,
            Request::builder().uri("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["environment"], "development");

        let (status, body) = call(
            &app,
            Request::builder()
                .uri("/docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/v1/books/{id}"].is_object());

        registry.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn in_memory_mode_skips_database_module() {
        let registry = build_registry(&in_memory_settings(Environment::Production))
            .await
            .unwrap();
        assert_eq!(registry.core_module_count(), 0);
        assert!(registry.get_module("books").is_some());
        assert!(registry.get_module("db").is_none());
    }

    #[tokio::test]
    async fn failed_boot_stops_modules_already_up() {
        let settings = in_memory_settings(Environment::Development);
        let ready = Arc::new(AtomicBool::new(false));
        let mut registry = ModuleRegistry::new();
        registry.register_custom(Arc::new(Tracked {
            name: "ready",
            fail_init: false,
            stopped: ready.clone(),
        }));
        registry.register_custom(Arc::new(Tracked {
            name: "broken",
            fail_init: true,
            stopped: Arc::new(AtomicBool::new(false)),
        }));

        let err = boot(
            &registry,
            &InitCtx {
                settings: &settings,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "module boot failed");
        assert!(format!("{err:#}").contains("index creation failed"));
        assert!(ready.load(Ordering::SeqCst));
    }
}
