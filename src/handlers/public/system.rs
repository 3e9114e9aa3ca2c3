use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::schema::registry;
use crate::server::AppState;

/// GET / - Service information and the resources it serves
pub async fn root() -> Json<Value> {
    let resources: Vec<&str> = registry().all().iter().map(|schema| schema.name).collect();

    Json(json!({
        "success": true,
        "data": {
            "name": "Catalog API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Resource endpoints for catalog entities over a record store",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "login": "/auth/login (public - token acquisition)",
                "whoami": "/api/auth/whoami (token required)",
                "data": "/api/:resource[/:id]",
            },
            "resources": resources,
        }
    }))
}

/// GET /health - Store connectivity
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let backend = state.store.backend();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "store": backend
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": true,
                    "message": "store unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "store": backend
                    }
                })),
            )
        }
    }
}
