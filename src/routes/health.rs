use axum::{extract::State, Json};
use serde_json::{json, Value};

use super::SharedState;
use crate::store::{DataStore, Query, SESSIONS_TABLE};

pub async fn index<S: DataStore>(State(state): State<SharedState<S>>) -> Json<Value> {
    Json(json!({
        "message": "Mokart API",
        "status": "running",
        "supabase": state.store.is_some(),
    }))
}

/// Liveness plus a one-row probe of the store. Always 200.
pub async fn health<S: DataStore>(State(state): State<SharedState<S>>) -> Json<Value> {
    let Some(store) = &state.store else {
        return Json(json!({"status": "healthy", "supabase": "not_configured"}));
    };

    match store.query::<Value>(SESSIONS_TABLE, &Query::new().limit(1)).await {
        Ok(_) => Json(json!({"status": "healthy", "supabase": "connected"})),
        Err(e) => {
            log::warn!("Health probe failed: {}", e);
            Json(json!({
                "status": "healthy",
                "supabase": "disconnected",
                "error": e.to_string(),
            }))
        }
    }
}
