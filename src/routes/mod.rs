use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderMap, HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::store::DataStore;

pub mod auth;
pub mod health;
pub mod sessions;

/// Everything a handler can reach. Built once at startup.
pub struct AppState<S> {
    pub config: ApiConfig,
    /// `None` when Supabase is not configured (degraded mode).
    pub store: Option<S>,
}

impl<S: DataStore> AppState<S> {
    pub fn new(config: ApiConfig, store: Option<S>) -> Self {
        Self { config, store }
    }

    pub fn store(&self) -> Result<&S, ApiError> {
        self.store.as_ref().ok_or(ApiError::Unconfigured)
    }
}

pub type SharedState<S> = Arc<AppState<S>>;

pub fn router<S: DataStore>(state: SharedState<S>) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(health::index::<S>))
        .route("/health", get(health::health::<S>))
        .route("/auth/login", post(auth::login::<S>))
        .route("/auth/register", post(auth::register::<S>))
        .route("/auth/logout", post(auth::logout::<S>))
        .route("/auth/me", get(auth::me::<S>))
        .route("/auth/test", get(auth::seed_demo::<S>))
        .route(
            "/sessions",
            get(sessions::list_sessions::<S>).post(sessions::create_session::<S>),
        )
        .route("/sessions/:session_id/trajectory", get(sessions::trajectory::<S>))
        .route("/sessions/:session_id/stats", get(sessions::stats::<S>))
        .route("/sessions/:session_id/sensor-data", post(sessions::add_sensor_data::<S>))
        .route("/sessions/:session_id/data", post(sessions::add_sensor_batch::<S>))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60))
}

/// Token from an `Authorization: Bearer <token>` header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}


#[cfg(test)]
mod tests {
    use super::testing::{app, get, send};
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer  xyz "));
        assert_eq!(bearer_token(&headers), Some("xyz"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_configured_origin() {
        let (app, _) = app(ApiConfig::default(), None);
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/sessions")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();

        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:3000"
        );
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (app, _) = app(ApiConfig::default(), None);
        let (status, _) = send(app, get("/nowhere")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
