// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the admin API.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::schema::{Direction, EngineConfig};
use crate::state::AppState;

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub route_count: usize,
    pub uptime_secs: u64,
}

/// Body for `POST /api/v1/acquire`. Exactly one of `route` or `path`.
#[derive(Debug, Deserialize)]
pub struct AcquireRequest {
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    pub direction: Direction,
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/v1/health`
pub async fn health(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "running".to_owned(),
        route_count: s.engine.config().routes.len(),
        uptime_secs: s.started_at.elapsed().as_secs(),
    })
}

/// `GET /api/v1/routes`: freshness of every route.
pub async fn list_routes(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(s.engine.status_list())
}

/// `GET /api/v1/config`: current configuration with secrets masked.
pub async fn show_config(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    let config = s.engine.config();
    Json(&*config).into_response()
}

/// `POST /api/v1/acquire`: acquire a token and return the update instructions.
pub async fn acquire(
    State(s): State<Arc<AppState>>,
    Json(req): Json<AcquireRequest>,
) -> impl IntoResponse {
    let route = match (req.route, req.path) {
        (Some(route), None) => route,
        (None, Some(path)) => match s.engine.route_for_path(&path) {
            Some(route) => route,
            None => {
                return ErrorKind::UnknownRoute
                    .to_http_response(format!("no credential route matches {path}"))
                    .into_response()
            }
        },
        _ => {
            return ErrorKind::BadRequest
                .to_http_response("exactly one of route or path is required")
                .into_response()
        }
    };

    match s.engine.acquire_and_project(&route, req.direction).await {
        Ok(projection) => Json(projection).into_response(),
        Err(e) => e.to_http_response().into_response(),
    }
}

/// `POST /api/v1/config/reload`: re-read the config file.
pub async fn reload_config(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(path) = s.config.config.as_deref() else {
        return ErrorKind::BadRequest.to_http_response("no config file configured").into_response();
    };
    let result = EngineConfig::load(path).and_then(|config| s.engine.reload(config));
    match result {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => {
            tracing::warn!(path = %path.display(), err = %e, "config reload failed");
            e.to_http_response().into_response()
        }
    }
}
