use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::AppState;

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "nikki-bot",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let state_db_ok = state.state_store.get("__readyz").await.is_ok();

    if state_db_ok {
        (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "checks": { "state_db": "ok" },
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not_ready",
                "checks": { "state_db": "failed" },
            })),
        )
    }
}
