use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use super::{bearer_token, SharedState};
use crate::auth;
use crate::error::ApiError;
use crate::models::{AuthResponse, LoginRequest, RegisterRequest};
use crate::store::DataStore;

pub async fn login<S: DataStore>(
    State(state): State<SharedState<S>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(request) = payload?;
    request.validate().map_err(ApiError::Validation)?;

    let response = auth::login(&state.config, state.store.as_ref(), &request).await?;
    Ok(Json(response))
}

pub async fn register<S: DataStore>(
    State(state): State<SharedState<S>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(request) = payload?;
    request.validate().map_err(ApiError::Validation)?;

    let response = auth::register(state.store.as_ref(), &request).await?;
    log::info!("Registered {}", request.email);
    Ok(Json(response))
}

pub async fn logout<S: DataStore>(
    State(state): State<SharedState<S>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    auth::logout(&state.config, state.store.as_ref(), bearer_token(&headers)).await?;
    Ok(Json(json!({"message": "Logged out"})))
}

pub async fn me<S: DataStore>(
    State(state): State<SharedState<S>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let user = auth::current_user(&state.config, state.store.as_ref(), bearer_token(&headers)).await?;
    Ok(Json(json!({ "user": user })))
}

/// Creates the demo account. Only routed in demo mode.
pub async fn seed_demo<S: DataStore>(State(state): State<SharedState<S>>) -> Result<Json<Value>, ApiError> {
    if !state.config.demo_mode {
        return Err(ApiError::NotFound("Not Found".to_string()));
    }
    auth::seed_demo_account(state.store.as_ref()).await.map(Json)
}
