use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use super::{AuthSession, DataStore, Query, StoreError, StoreResult};
use crate::models::LoginRequest;

const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Supabase project client (PostgREST + GoTrue over HTTPS)
///
/// # Timeouts and Retries
/// - Every request carries the configured timeout
/// - Connection failures are retried up to `max_retries` times
/// - Timeouts are retried for reads only, so an insert is never sent twice
/// - HTTP error statuses are never retried
///
/// # Error Classification
/// GoTrue reports failures as `error_code` (recent versions) or only as a
/// message (older versions). Both are folded into [`StoreError`] here so
/// callers branch on kinds.
#[derive(Clone)]
pub struct SupabaseClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

impl SupabaseClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration, max_retries: u32) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mokart_api/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(SupabaseClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            max_retries,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// Request authorised with the project key.
    fn service_request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Request authorised as the user owning `access_token`.
    fn user_request(&self, builder: RequestBuilder, access_token: &str) -> RequestBuilder {
        builder.header("apikey", &self.api_key).bearer_auth(access_token)
    }

    async fn execute(&self, request: RequestBuilder, idempotent: bool) -> StoreResult<Response> {
        let mut attempt = 0u32;

        loop {
            let pending = request
                .try_clone()
                .ok_or_else(|| StoreError::Network("Request body cannot be replayed".to_string()))?;

            let err = match pending.send().await {
                Ok(response) => return check_status(response).await,
                Err(e) => e,
            };

            let retryable = err.is_connect() || (idempotent && err.is_timeout());
            let classified = if err.is_timeout() {
                StoreError::Timeout
            } else {
                StoreError::Network(err.to_string())
            };

            if !retryable || attempt >= self.max_retries {
                return Err(classified);
            }

            attempt += 1;
            log::warn!(
                "Supabase request failed ({}), retry {}/{}",
                classified,
                attempt,
                self.max_retries
            );
            tokio::time::sleep(RETRY_BACKOFF * attempt).await;
        }
    }

    async fn auth_call(&self, request: RequestBuilder) -> StoreResult<AuthSession> {
        let response = self.execute(request, false).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        parse_auth_body(body)
    }
}

impl DataStore for SupabaseClient {
    async fn query<T>(&self, table: &str, query: &Query) -> StoreResult<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let request = self
            .service_request(self.client.get(self.rest_url(table)))
            .query(&query_params(query));

        let response = self.execute(request, true).await?;
        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn insert<R, T>(&self, table: &str, records: &[R]) -> StoreResult<Vec<T>>
    where
        R: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        let request = self
            .service_request(self.client.post(self.rest_url(table)))
            .header("Prefer", "return=representation")
            .json(records);

        let response = self.execute(request, false).await?;
        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn sign_in(&self, credentials: &LoginRequest) -> StoreResult<AuthSession> {
        let request = self
            .client
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(&json!({
                "email": credentials.email,
                "password": credentials.password,
            }));

        self.auth_call(request).await
    }

    async fn sign_up(&self, credentials: &LoginRequest, metadata: Value) -> StoreResult<AuthSession> {
        let request = self
            .client
            .post(self.auth_url("signup"))
            .header("apikey", &self.api_key)
            .json(&json!({
                "email": credentials.email,
                "password": credentials.password,
                "data": metadata,
            }));

        self.auth_call(request).await
    }

    async fn sign_out(&self, access_token: &str) -> StoreResult<()> {
        let request = self.user_request(self.client.post(self.auth_url("logout")), access_token);
        self.execute(request, false).await?;
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> StoreResult<Value> {
        let request = self.user_request(self.client.get(self.auth_url("user")), access_token);
        let response = self.execute(request, true).await?;
        response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

async fn check_status(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(classify_error(status, &body))
}

/// PostgREST query string for a [`Query`].
fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![(
        "select".to_string(),
        query.columns.clone().unwrap_or_else(|| "*".to_string()),
    )];

    for (column, value) in &query.filters {
        params.push((column.clone(), format!("eq.{}", value)));
    }

    if let Some(order) = &query.order {
        let direction = if order.descending { "desc" } else { "asc" };
        params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
    }

    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }

    params
}

fn classify_error(status: StatusCode, body: &str) -> StoreError {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);

    let message = ["msg", "message", "error_description", "error"]
        .iter()
        .find_map(|key| parsed.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| {
            let text = body.trim();
            if text.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                text.to_string()
            }
        });

    match parsed.get("error_code").and_then(Value::as_str) {
        Some("invalid_credentials") => return StoreError::InvalidCredentials,
        Some("email_not_confirmed") => return StoreError::EmailNotConfirmed,
        Some("user_already_exists") | Some("email_exists") => return StoreError::UserAlreadyExists,
        _ => {}
    }

    // Older GoTrue releases only send a message
    let lower = message.to_lowercase();
    if lower.contains("invalid login credentials") {
        StoreError::InvalidCredentials
    } else if lower.contains("email not confirmed") {
        StoreError::EmailNotConfirmed
    } else if lower.contains("already registered") {
        StoreError::UserAlreadyExists
    } else if lower.contains("confirmation") {
        StoreError::ConfirmationRequired(message)
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        StoreError::Unauthorized(message)
    } else {
        StoreError::Http {
            status: status.as_u16(),
            message,
        }
    }
}

/// Sign-in and auto-confirmed sign-up return a token body embedding `user`;
/// sign-up awaiting email confirmation returns the bare user.
fn parse_auth_body(body: Value) -> StoreResult<AuthSession> {
    let Value::Object(mut map) = body else {
        return Err(StoreError::Decode("Expected a JSON object".to_string()));
    };

    if map.contains_key("access_token") {
        let user = map
            .remove("user")
            .ok_or_else(|| StoreError::Decode("Session without user".to_string()))?;
        return Ok(AuthSession {
            user,
            session: Some(Value::Object(map)),
        });
    }

    if map.contains_key("id") {
        return Ok(AuthSession {
            user: Value::Object(map),
            session: None,
        });
    }

    Err(StoreError::Decode("Neither a session nor a user".to_string()))
}
