//! Login/register flow on top of the store's auth calls.
//!
//! # Login
//! 1. Demo credentials (demo mode only) short-circuit to a fixed user
//! 2. Sign-in against the store
//! 3. On invalid credentials: sign up with the same credentials, then sign in again
//!    - an existing account (wrong password) ends in 401, nothing is created
//! 4. Email confirmation pending: answer with a temporary user

use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::models::{AuthResponse, LoginRequest, RegisterRequest};
use crate::store::{AuthSession, DataStore, StoreError};

pub const DEMO_EMAIL: &str = "demo@mokart.com";
pub const DEMO_PASSWORD: &str = "demo123456";
pub const DEMO_ACCESS_TOKEN: &str = "demo-token";

pub fn is_demo_login(config: &ApiConfig, request: &LoginRequest) -> bool {
    config.demo_mode && request.email == DEMO_EMAIL && request.password == DEMO_PASSWORD
}

pub fn demo_user() -> Value {
    json!({
        "id": "demo-user-123",
        "email": DEMO_EMAIL,
        "user_metadata": {"vehicle_model": "Demo Kart"}
    })
}

pub fn demo_response() -> AuthResponse {
    AuthResponse {
        user: demo_user(),
        session: Some(json!({
            "access_token": DEMO_ACCESS_TOKEN,
            "refresh_token": "demo-refresh"
        })),
        message: "Demo login successful".to_string(),
    }
}

fn pending_confirmation(email: &str) -> AuthResponse {
    AuthResponse {
        user: json!({"id": "temp", "email": email, "user_metadata": {}}),
        session: Some(json!({"access_token": "temp", "refresh_token": "temp"})),
        message: "Account created (awaiting email confirmation)".to_string(),
    }
}

fn signed_in(auth: AuthSession, message: &str) -> AuthResponse {
    AuthResponse {
        user: auth.user,
        session: auth.session,
        message: message.to_string(),
    }
}

fn unauthorized(source: StoreError) -> ApiError {
    ApiError::upstream(StatusCode::UNAUTHORIZED, source)
}

pub async fn login<S: DataStore>(
    config: &ApiConfig,
    store: Option<&S>,
    request: &LoginRequest,
) -> Result<AuthResponse, ApiError> {
    if is_demo_login(config, request) {
        log::info!("Demo login for {}", request.email);
        return Ok(demo_response());
    }

    let store = store.ok_or(ApiError::Unconfigured)?;

    match store.sign_in(request).await {
        Ok(auth) => Ok(signed_in(auth, "Login successful")),
        Err(StoreError::InvalidCredentials) => register_then_sign_in(store, request).await,
        Err(e) => Err(unauthorized(e)),
    }
}

async fn register_then_sign_in<S: DataStore>(
    store: &S,
    request: &LoginRequest,
) -> Result<AuthResponse, ApiError> {
    log::info!("Sign-in refused for {}, trying automatic registration", request.email);

    match store.sign_up(request, json!({})).await {
        Ok(_) => {}
        Err(StoreError::UserAlreadyExists) => {
            return Err(unauthorized(StoreError::InvalidCredentials));
        }
        Err(StoreError::ConfirmationRequired(reason)) => {
            log::info!("Registration of {} pending confirmation: {}", request.email, reason);
            return Ok(pending_confirmation(&request.email));
        }
        Err(e) => return Err(ApiError::upstream(StatusCode::BAD_REQUEST, e)),
    }

    match store.sign_in(request).await {
        Ok(auth) => Ok(signed_in(auth, "Account created and logged in")),
        Err(StoreError::EmailNotConfirmed) => Ok(pending_confirmation(&request.email)),
        // The service hides existing addresses on sign-up; a second refusal means a wrong password.
        Err(e @ StoreError::InvalidCredentials) => Err(unauthorized(e)),
        Err(e) => Err(ApiError::upstream(StatusCode::BAD_REQUEST, e)),
    }
}

pub async fn register<S: DataStore>(
    store: Option<&S>,
    request: &RegisterRequest,
) -> Result<AuthResponse, ApiError> {
    let store = store.ok_or(ApiError::Unconfigured)?;
    let vehicle_model = request.vehicle_model.as_deref().unwrap_or("Unknown");

    let auth = store
        .sign_up(&request.credentials(), json!({ "vehicle_model": vehicle_model }))
        .await
        .map_err(|e| ApiError::upstream(StatusCode::BAD_REQUEST, e))?;

    Ok(signed_in(auth, "Account created"))
}

pub async fn current_user<S: DataStore>(
    config: &ApiConfig,
    store: Option<&S>,
    access_token: Option<&str>,
) -> Result<Value, ApiError> {
    let token = access_token.ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

    if config.demo_mode && token == DEMO_ACCESS_TOKEN {
        return Ok(demo_user());
    }

    let store = store.ok_or(ApiError::Unconfigured)?;
    store.get_user(token).await.map_err(unauthorized)
}

pub async fn logout<S: DataStore>(
    config: &ApiConfig,
    store: Option<&S>,
    access_token: Option<&str>,
) -> Result<(), ApiError> {
    let Some(token) = access_token else {
        return Ok(());
    };
    if config.demo_mode && token == DEMO_ACCESS_TOKEN {
        return Ok(());
    }

    let store = store.ok_or(ApiError::Unconfigured)?;
    store.sign_out(token).await.map_err(ApiError::data)
}

/// Creates the demo account upstream. Never fails: the outcome is reported in the body.
pub async fn seed_demo_account<S: DataStore>(store: Option<&S>) -> Result<Value, ApiError> {
    let store = store.ok_or(ApiError::Unconfigured)?;
    let credentials = LoginRequest::new(DEMO_EMAIL, DEMO_PASSWORD);

    match store
        .sign_up(&credentials, json!({"vehicle_model": "Demo Kart"}))
        .await
    {
        Ok(auth) => Ok(json!({
            "message": "Demo user created",
            "user": auth.user,
            "session": auth.session,
        })),
        Err(e) => Ok(json!({
            "error": e.to_string(),
            "message": "The demo user may already exist",
        })),
    }
}
