mod handlers;
mod response;

pub use handlers::{
    auth_test, execute, health, logs, logs_stats, validate, LogsQuery, ValidateRequest,
};

use crate::app::App;
use crate::errors::AssistantError;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub fn router(app: Arc<App>) -> Router {
    Router::new()
        .route("/execute", post(execute))
        .route("/validate", post(validate))
        .route("/health", get(health))
        .route("/auth-test", get(auth_test))
        .route("/logs", get(logs))
        .route("/logs/stats", get(logs_stats))
        .with_state(app)
}

pub async fn serve(app: Arc<App>, listen_addr: &str) -> Result<(), AssistantError> {
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .map_err(|err| {
            AssistantError::configuration(format!("Failed to bind {}: {}", listen_addr, err))
        })?;
    app.logger.info(
        "HTTP server listening",
        Some(&serde_json::json!({ "addr": listen_addr })),
    );
    axum::serve(listener, router(app.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AssistantError::internal(format!("HTTP server error: {}", err)))?;
    app.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
