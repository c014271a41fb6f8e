// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the admin HTTP API.
//!
//! Uses `axum_test::TestServer` for the admin router and a real local
//! listener for the token endpoint it talks to.

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::{header, HeaderValue, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use axum_test::TestServer;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use credgate::config::ServerConfig;
use credgate::credential::engine::CredentialEngine;
use credgate::schema::EngineConfig;
use credgate::state::AppState;
use credgate::transport::build_router;

fn server_config(auth_token: Option<&str>, config: Option<PathBuf>) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        auth_token: auth_token.map(str::to_owned),
        config,
        resource_dir: None,
        connect_timeout_ms: 2000,
        request_timeout_ms: 5000,
        refresh_retries: 0,
    }
}

fn engine_json(token_url: &str) -> Value {
    json!({
        "routes": [{
            "pathPrefix": "/partner",
            "tokenUrl": token_url,
            "tokenTtl": 30,
            "tokenTtlUnit": "minutes",
            "waitLength": 1,
            "clientId": "svc-a",
            "clientSecret": "s3cr3t"
        }],
        "tokenSchemas": {
            "/partner": {
                "request": {
                    "body": { "grant_type": "client_credentials", "client_secret": "!ref(config.clientSecret)" }
                },
                "source": {
                    "body": [{ "source": "access_token", "destination": "!ref(response.accessToken)" }]
                },
                "update": {
                    "direction": "request",
                    "headers": { "Authorization": "Bearer !ref(response.accessToken)" },
                    "removeHeaders": ["X-Api-Key"]
                }
            }
        }
    })
}

fn test_server(config: ServerConfig, engine_config: EngineConfig) -> anyhow::Result<TestServer> {
    let engine = CredentialEngine::new(engine_config, config.engine_settings())?;
    let state = Arc::new(AppState::new(engine, config));
    Ok(TestServer::new(build_router(state)).expect("failed to create test server"))
}

/// Token endpoint that always answers with `tok-abc`, or 500 when `fail`.
async fn spawn_token_endpoint(fail: bool) -> anyhow::Result<String> {
    let router = Router::new().route(
        "/token",
        post(move || async move {
            if fail {
                Err((StatusCode::INTERNAL_SERVER_ERROR, "boom"))
            } else {
                Ok(Json(json!({ "access_token": "tok-abc", "expires_in": 1800 })))
            }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(format!("http://{addr}/token"))
}

fn bearer(token: &'static str) -> HeaderValue {
    HeaderValue::from_static(token)
}

#[tokio::test]
async fn health_skips_auth() -> anyhow::Result<()> {
    let config: EngineConfig = serde_json::from_value(engine_json("http://127.0.0.1:9/token"))?;
    let server = test_server(server_config(Some("secret"), None), config)?;

    let resp = server.get("/api/v1/health").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["status"], "running");
    assert_eq!(body["route_count"], 1);
    Ok(())
}

#[tokio::test]
async fn auth_required_for_everything_else() -> anyhow::Result<()> {
    let config: EngineConfig = serde_json::from_value(engine_json("http://127.0.0.1:9/token"))?;
    let server = test_server(server_config(Some("secret"), None), config)?;

    let resp = server.get("/api/v1/routes").await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = server
        .get("/api/v1/routes")
        .add_header(header::AUTHORIZATION, bearer("Bearer secret"))
        .await;
    resp.assert_status_ok();
    let routes: Vec<Value> = resp.json();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0]["path_prefix"], "/partner");
    assert_eq!(routes[0]["state"], "EXPIRED");
    Ok(())
}

#[tokio::test]
async fn config_dump_masks_secrets() -> anyhow::Result<()> {
    let config: EngineConfig = serde_json::from_value(engine_json("http://127.0.0.1:9/token"))?;
    let server = test_server(server_config(None, None), config)?;

    let resp = server.get("/api/v1/config").await;
    resp.assert_status_ok();
    let text = resp.text();
    assert!(!text.contains("s3cr3t"));
    let body: Value = resp.json();
    assert_eq!(body["routes"][0]["clientSecret"], "[REDACTED]");
    assert_eq!(body["routes"][0]["clientId"], "svc-a");
    Ok(())
}

#[tokio::test]
async fn acquire_by_route_and_by_path() -> anyhow::Result<()> {
    let url = spawn_token_endpoint(false).await?;
    let config: EngineConfig = serde_json::from_value(engine_json(&url))?;
    let server = test_server(server_config(None, None), config)?;

    let resp = server
        .post("/api/v1/acquire")
        .json(&json!({ "route": "/partner", "direction": "request" }))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["direction"], "request");
    assert_eq!(body["headerUpdates"]["Authorization"], "Bearer tok-abc");
    assert_eq!(body["headerRemovals"], json!(["X-Api-Key"]));

    let resp = server
        .post("/api/v1/acquire")
        .json(&json!({ "path": "/partner/orders/7", "direction": "request" }))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["headerUpdates"]["Authorization"], "Bearer tok-abc");

    let resp = server.get("/api/v1/routes").await;
    let routes: Vec<Value> = resp.json();
    assert_eq!(routes[0]["state"], "FRESH");
    Ok(())
}

#[tokio::test]
async fn acquire_other_direction_is_empty() -> anyhow::Result<()> {
    let config: EngineConfig = serde_json::from_value(engine_json("http://127.0.0.1:9/token"))?;
    let server = test_server(server_config(None, None), config)?;

    let resp = server
        .post("/api/v1/acquire")
        .json(&json!({ "route": "/partner", "direction": "response" }))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["headerUpdates"], json!({}));
    assert_eq!(body["headerRemovals"], json!([]));
    Ok(())
}

#[tokio::test]
async fn acquire_errors_map_to_status_codes() -> anyhow::Result<()> {
    let url = spawn_token_endpoint(true).await?;
    let config: EngineConfig = serde_json::from_value(engine_json(&url))?;
    let server = test_server(server_config(None, None), config)?;

    let resp = server
        .post("/api/v1/acquire")
        .json(&json!({ "route": "/partner", "direction": "request" }))
        .await;
    resp.assert_status(StatusCode::BAD_GATEWAY);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "TOKEN_ENDPOINT_ERROR");

    let resp = server
        .post("/api/v1/acquire")
        .json(&json!({ "path": "/elsewhere", "direction": "request" }))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);

    let resp = server.post("/api/v1/acquire").json(&json!({ "direction": "request" })).await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    Ok(())
}

#[tokio::test]
async fn reload_reads_the_config_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("credgate.json");
    let mut json = engine_json("http://127.0.0.1:9/token");
    std::fs::write(&path, serde_json::to_vec(&json)?)?;

    let config = EngineConfig::load(&path)?;
    let server = test_server(server_config(None, Some(path.clone())), config)?;

    // Add a second route sharing the schema.
    json["routes"]
        .as_array_mut()
        .ok_or_else(|| anyhow::anyhow!("routes"))?
        .push(json!({ "pathPrefix": "/other", "tokenUrl": "http://127.0.0.1:9/token", "tokenSchema": "/partner" }));
    std::fs::write(&path, serde_json::to_vec(&json)?)?;

    let resp = server.post("/api/v1/config/reload").await;
    resp.assert_status_ok();
    let summary: Value = resp.json();
    assert_eq!(summary["kept"], json!(["/partner"]));
    assert_eq!(summary["added"], json!(["/other"]));

    // A broken file is rejected and the running config stays.
    std::fs::write(&path, b"{ not json")?;
    let resp = server.post("/api/v1/config/reload").await;
    resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "CONFIG_ERROR");
    let routes: Vec<Value> = server.get("/api/v1/routes").await.json();
    assert_eq!(routes.len(), 2);
    Ok(())
}

#[tokio::test]
async fn reload_without_config_file_is_rejected() -> anyhow::Result<()> {
    let server = test_server(server_config(None, None), EngineConfig::default())?;
    let resp = server.post("/api/v1/config/reload").await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}
