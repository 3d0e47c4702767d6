mod admin;
mod bootstrap;
mod chat;
mod errors;
mod health;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use ednna_core::config::{AppConfig, LoadOptions};
use tokio::sync::Notify;

use crate::bootstrap::Application;

fn init_logging(config: &AppConfig) {
    use ednna_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

fn router(app: &Application) -> Router {
    Router::new()
        .merge(chat::router(app.orchestrator.clone()))
        .merge(admin::router(app.db_pool.clone()))
        .merge(health::router(app.db_pool.clone()))
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging must be up before bootstrap emits its events.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    let shutdown = Arc::new(Notify::new());

    let signal = shutdown.clone();
    let routes = router(&app);
    let server = tokio::spawn(async move {
        axum::serve(listener, routes)
            .with_graceful_shutdown(async move { signal.notified().await })
            .await
    });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "ednna-server started"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = app.config.server.graceful_shutdown_secs,
        "ednna-server stopping"
    );
    shutdown.notify_one();

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, server).await {
        Ok(joined) => joined??,
        Err(_) => tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            "in-flight requests did not drain before the grace period"
        ),
    }

    app.db_pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use ednna_core::config::{ConfigOverrides, LoadOptions};
    use tower::ServiceExt;

    use crate::bootstrap::bootstrap;

    #[tokio::test]
    async fn combined_router_serves_every_surface() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap");

        for uri in ["/health", "/admin/learn"] {
            let request = Request::builder().uri(uri).body(Body::empty()).expect("request");
            let response = super::router(&app).oneshot(request).await.expect("response");
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
        }

        let request = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"message": "oi", "user_id": "router"}"#))
            .expect("request");
        let response = super::router(&app).oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        app.db_pool.close().await;
    }
}
