mod common;
use common::{settings_from, test_settings, FakeConnector, Script};

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http_body_util::BodyExt;
use linux_assistant::app::App;
use linux_assistant::http::{self, LogsQuery, ValidateRequest};
use linux_assistant::managers::execution::{CommandRequest, ExecuteResponse};
use linux_assistant::services::logger::{LogLevel, Logger};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

const KEY: &str = "s3cret-key";

fn app_with(api_key: Option<&str>, connector: &FakeConnector) -> Arc<App> {
    let mut settings = test_settings();
    settings.api_key = api_key.map(str::to_string);
    let mut logger = Logger::new("test");
    logger.set_level(LogLevel::Debug);
    Arc::new(App::with_connector(
        logger,
        Arc::new(settings),
        Arc::new(connector.clone()),
    ))
}

fn keyed(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-api-key", HeaderValue::from_str(value).expect("header"));
    headers
}

fn request(command: &str) -> Result<Json<CommandRequest>, JsonRejection> {
    Ok(Json(CommandRequest {
        command: command.to_string(),
        query: None,
    }))
}

async fn malformed_body<T: DeserializeOwned>() -> Result<Json<T>, JsonRejection> {
    let raw = Request::builder()
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"command\": "))
        .expect("request");
    Json::<T>::from_request(raw, &()).await
}

async fn body_json(response: Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn execute_requires_api_key() {
    let connector = FakeConnector::new(Script::default());
    let app = app_with(Some(KEY), &connector);

    let response = http::execute(State(app.clone()), HeaderMap::new(), request("df -h"))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE),
        Some(&HeaderValue::from_static("ApiKey"))
    );
    let body = body_json(response).await;
    assert_eq!(
        body["detail"],
        "API key required. Provide via 'X-API-Key' header."
    );

    let response = http::execute(State(app), keyed("wrong"), request("df -h"))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["detail"], "Invalid API key");

    connector.snapshot(|log| assert_eq!(log.connects, 0));
}

#[tokio::test]
async fn malformed_body_is_checked_after_auth() {
    let connector = FakeConnector::new(Script::default());
    let app = app_with(Some(KEY), &connector);

    let response = http::execute(State(app.clone()), HeaderMap::new(), malformed_body().await)
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = http::validate(State(app.clone()), keyed("wrong"), malformed_body().await)
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = http::execute(State(app), keyed(KEY), malformed_body().await)
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["detail"]
        .as_str()
        .expect("detail")
        .starts_with("Invalid request body"));
    connector.snapshot(|log| assert_eq!(log.connects, 0));
}

#[tokio::test]
async fn execute_runs_approved_command() {
    let connector = FakeConnector::new(Script::default());
    let app = app_with(Some(KEY), &connector);

    let Json(response): Json<ExecuteResponse> = http::execute(
        State(app),
        keyed(KEY),
        Ok(Json(CommandRequest {
            command: "  uptime \n".to_string(),
            query: Some("how long has it been up?".to_string()),
        })),
    )
    .await
    .expect("execute");

    assert_eq!(response.exit_code, 0);
    assert_eq!(response.stdout, "ok");
    assert!(response.saved_path.is_some());
    connector.snapshot(|log| {
        assert!(log.commands.contains(&"uptime".to_string()));
        assert_eq!(log.closes, 1);
    });
}

#[tokio::test]
async fn blocked_commands_never_reach_the_host() {
    let connector = FakeConnector::new(Script::default());
    let app = app_with(None, &connector);

    let response = http::execute(State(app.clone()), HeaderMap::new(), request("rm -rf /"))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert!(body["detail"]
        .as_str()
        .expect("detail")
        .starts_with("Error: "));

    let long_run = "fio --name=t --filename=/dev/nvme0n1 --runtime=15 --time_based";
    let response = http::execute(State(app), HeaderMap::new(), request(long_run))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    connector.snapshot(|log| {
        assert_eq!(log.connects, 0);
        assert!(log.commands.is_empty());
    });
}

#[tokio::test]
async fn empty_command_is_bad_request() {
    let connector = FakeConnector::new(Script::default());
    let app = app_with(None, &connector);

    let response = http::execute(State(app), HeaderMap::new(), request("   "))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upstream_error_text_is_not_executed() {
    let connector = FakeConnector::new(Script::default());
    let app = app_with(None, &connector);

    let response = http::execute(
        State(app),
        HeaderMap::new(),
        request("Error: I cannot help with that."),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["detail"], "Error: I cannot help with that.");
    assert_eq!(body["code"], "UPSTREAM_ERROR");
    connector.snapshot(|log| assert_eq!(log.connects, 0));
}

#[tokio::test]
async fn missing_credentials_fail_before_dialing() {
    let settings = settings_from(&[
        ("SSH_HOST", "192.0.2.10"),
        ("SSH_USER", "bench"),
        ("SSH_KEY_PATH", "/nonexistent/id_rsa"),
    ]);
    let app = Arc::new(App::initialize(Logger::new("test"), settings));

    let response = http::execute(State(app), HeaderMap::new(), request("df -h"))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn validate_reports_verdict() {
    let connector = FakeConnector::new(Script::default());
    let app = app_with(None, &connector);

    let Json(verdict) = http::validate(
        State(app.clone()),
        HeaderMap::new(),
        Ok(Json(ValidateRequest {
            command: "shutdown -h now".to_string(),
        })),
    )
    .await
    .expect("validate");
    assert!(!verdict.allowed);
    let reason = verdict.reason.expect("reason");
    assert!(reason.contains("shutdown"), "{}", reason);

    let Json(verdict) = http::validate(
        State(app),
        HeaderMap::new(),
        Ok(Json(ValidateRequest {
            command: "fio --name=t --filename=/dev/nvme0n1 --runtime=5 --time_based".to_string(),
        })),
    )
    .await
    .expect("validate");
    assert!(verdict.allowed);
}

#[tokio::test]
async fn health_is_open() {
    let Json(body) = http::health().await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn auth_test_reports_mode() {
    let connector = FakeConnector::new(Script::default());

    let open = app_with(None, &connector);
    let Json(body) = http::auth_test(State(open), HeaderMap::new())
        .await
        .expect("open");
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["auth"], "disabled");

    let guarded = app_with(Some(KEY), &connector);
    let Json(body) = http::auth_test(State(guarded.clone()), keyed(KEY))
        .await
        .expect("keyed");
    assert_eq!(body["auth"], "api_key");

    let response = http::auth_test(State(guarded), HeaderMap::new())
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logs_expose_recent_entries_and_counters() {
    let connector = FakeConnector::new(Script::default());
    let app = app_with(None, &connector);
    let _ = http::execute(State(app.clone()), HeaderMap::new(), request("rm -rf /")).await;

    let Json(body) = http::logs(
        State(app.clone()),
        HeaderMap::new(),
        Ok(Query(LogsQuery { limit: Some(50) })),
    )
    .await
    .expect("logs");
    let entries = body["entries"].as_array().expect("entries");
    assert_eq!(body["count"].as_u64(), Some(entries.len() as u64));
    assert!(entries
        .iter()
        .any(|entry| entry["message"] == "Blocked command"));

    let Json(stats) = http::logs_stats(State(app), HeaderMap::new())
        .await
        .expect("stats");
    assert!(stats["warn"].as_u64().unwrap_or(0) >= 1, "{}", stats);
}

#[test]
fn startup_logs_the_active_policy() {
    let connector = FakeConnector::new(Script::default());
    let mut logger = Logger::new("test");
    logger.set_level(LogLevel::Debug);
    let mut settings = test_settings();
    settings.api_key = Some(KEY.to_string());
    let _app = App::with_connector(logger.clone(), Arc::new(settings), Arc::new(connector));

    let entry = logger
        .recent(100)
        .into_iter()
        .find(|entry| entry.message == "Command policy active")
        .expect("policy entry");
    let meta = entry.meta.expect("meta");
    assert_eq!(meta["target_device"], "/dev/nvme0n1");
    assert_eq!(meta["max_runtime_seconds"], 10);
    assert_eq!(meta["api_auth"], true);
}
