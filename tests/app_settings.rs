// tests/app_settings.rs
//
// The full app picks its thresholds up from the settings file + env.

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use chat_gate::config::{load_settings_from, ENV_MPS_THRESHOLD, ENV_SETTINGS_PATH};

fn json_request(method: &str, uri: &str, payload: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let resp = app
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[serial_test::serial]
#[tokio::test]
async fn app_uses_settings_file_then_env_override() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{"channel":"somechannel","mps_threshold":4.2,"bypass_sub":false}"#,
    )
    .unwrap();

    std::env::set_var(ENV_SETTINGS_PATH, path.display().to_string());
    std::env::remove_var(ENV_MPS_THRESHOLD);

    let app = chat_gate::app().await.expect("app() should build a Router");
    let (status, v) = get_json(&app, "/config").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["mps_threshold"], 4.2);
    assert_eq!(v["role_bypass"]["subscriber"], false);
    assert_eq!(v["role_bypass"]["broadcaster"], true);

    std::env::set_var(ENV_MPS_THRESHOLD, "1.5");
    let app = chat_gate::app().await.expect("app() should build a Router");
    let (_, v) = get_json(&app, "/config").await;
    assert_eq!(v["mps_threshold"], 1.5);

    std::env::remove_var(ENV_MPS_THRESHOLD);
    std::env::remove_var(ENV_SETTINGS_PATH);
}

#[serial_test::serial]
#[tokio::test]
async fn retuning_is_written_back_to_settings_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("settings.json");
    std::fs::write(&path, r#"{"channel":"somechannel","font_size":22}"#).unwrap();
    std::env::set_var(ENV_SETTINGS_PATH, path.display().to_string());
    std::env::remove_var(ENV_MPS_THRESHOLD);

    let app = chat_gate::app().await.expect("app() should build a Router");

    let resp = app
        .clone()
        .oneshot(json_request("PATCH", "/config/threshold", r#"{"mps_threshold":4.5}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let saved = load_settings_from(&path).unwrap();
    assert_eq!(saved.mps_threshold, 4.5);
    assert_eq!(saved.channel, "somechannel");
    assert_eq!(saved.font_size, 22);

    let bypass = r#"{"broadcaster":true,"mod":true,"vip":false,"sub":true}"#;
    app.clone()
        .oneshot(json_request("PATCH", "/config/bypass", bypass))
        .await
        .unwrap();
    let saved = load_settings_from(&path).unwrap();
    assert!(!saved.bypass_vip);
    assert!(saved.bypass_mod);
    assert_eq!(saved.mps_threshold, 4.5);

    app.clone()
        .oneshot(json_request("PUT", "/config", r#"{"cooldown_secs":8.0}"#))
        .await
        .unwrap();
    let saved = load_settings_from(&path).unwrap();
    assert_eq!(saved.cooldown_secs, 8.0);
    assert_eq!(saved.mps_threshold, 3.0);

    // A restart picks the saved values up.
    let app = chat_gate::app().await.expect("app() should build a Router");
    let (_, v) = get_json(&app, "/config").await;
    assert_eq!(v["cooldown_secs"], 8.0);

    std::env::remove_var(ENV_SETTINGS_PATH);
}

#[serial_test::serial]
#[tokio::test]
async fn app_fails_on_missing_settings_path() {
    std::env::set_var(ENV_SETTINGS_PATH, "/definitely/not/here/chatgate.toml");
    assert!(chat_gate::app().await.is_err());
    std::env::remove_var(ENV_SETTINGS_PATH);
}

#[serial_test::serial]
#[tokio::test]
async fn metrics_endpoint_lists_filter_series() {
    std::env::remove_var(ENV_SETTINGS_PATH);
    let app = chat_gate::app().await.expect("app() should build a Router");

    let req = json_request("POST", "/decide", r#"{"user":"m","text":"measure this message please"}"#);
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let text = String::from_utf8(
        body::to_bytes(resp.into_body(), 1_048_576)
            .await
            .unwrap()
            .to_vec(),
    )
    .unwrap();
    for needle in ["chatgate_messages_total", "chatgate_mps"] {
        assert!(text.contains(needle), "missing {needle} in /metrics");
    }
}
