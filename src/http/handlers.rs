use crate::app::App;
use crate::constants::auth::API_KEY_HEADER;
use crate::constants::buffers::DEFAULT_LOG_PAGE;
use crate::errors::AssistantError;
use crate::managers::execution::{CommandRequest, ExecuteResponse};
use crate::services::security::AuthOutcome;
use crate::services::validation::ValidationVerdict;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct ValidateRequest {
    pub command: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

fn authorize(app: &App, headers: &HeaderMap) -> Result<AuthOutcome, AssistantError> {
    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    app.security.verify_api_key(presented)
}

// Extractor failures are reported only after the caller is authorized.
fn accept_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AssistantError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        AssistantError::invalid_params(format!("Invalid request body: {}", rejection.body_text()))
    })
}

fn accept_query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AssistantError> {
    query.map(|Query(value)| value).map_err(|rejection| {
        AssistantError::invalid_params(format!("Invalid query string: {}", rejection.body_text()))
    })
}

pub async fn execute(
    State(app): State<Arc<App>>,
    headers: HeaderMap,
    body: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Json<ExecuteResponse>, AssistantError> {
    authorize(&app, &headers)?;
    let request = accept_body(body)?;
    let command = app.security.clean_command(&request.command)?;
    let approved = match app.policy.approve(&command, request.query) {
        Ok(approved) => approved,
        Err(err) => {
            app.logger.warn(
                "Blocked command",
                Some(&serde_json::json!({ "command": command, "reason": err.message })),
            );
            return Err(err);
        }
    };
    let response = app.execution.execute(approved).await?;
    Ok(Json(response))
}

pub async fn validate(
    State(app): State<Arc<App>>,
    headers: HeaderMap,
    body: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<ValidationVerdict>, AssistantError> {
    authorize(&app, &headers)?;
    let request = accept_body(body)?;
    Ok(Json(app.policy.validate(&request.command)))
}

pub async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn auth_test(
    State(app): State<Arc<App>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AssistantError> {
    let outcome = authorize(&app, &headers)?;
    Ok(Json(serde_json::json!({
        "authenticated": true,
        "auth": outcome.as_str(),
    })))
}

pub async fn logs(
    State(app): State<Arc<App>>,
    headers: HeaderMap,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> Result<Json<Value>, AssistantError> {
    authorize(&app, &headers)?;
    let query = accept_query(query)?;
    let entries = app.logger.recent(query.limit.unwrap_or(DEFAULT_LOG_PAGE));
    Ok(Json(serde_json::json!({
        "count": entries.len(),
        "entries": entries,
    })))
}

pub async fn logs_stats(
    State(app): State<Arc<App>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AssistantError> {
    authorize(&app, &headers)?;
    Ok(Json(app.logger.stats()))
}
