//! Data access to the hosted database-and-auth service.
//!
//! Handlers only see the [`DataStore`] trait. [`SupabaseClient`] talks to a
//! Supabase project (PostgREST tables + GoTrue auth).

pub mod supabase;

#[cfg(test)]
pub mod memory;

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::LoginRequest;

pub use supabase::SupabaseClient;

pub const SESSIONS_TABLE: &str = "sessions";
pub const SENSOR_DATA_TABLE: &str = "sensor_data";

/// Failures of the external service, classified once at the client boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Email not confirmed")]
    EmailNotConfirmed,

    #[error("Email confirmation required: {0}")]
    ConfirmationRequired(String),

    #[error("User already registered")]
    UserAlreadyExists,

    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl StoreError {
    /// Worth a retry: the request may never have reached the service.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Timeout | StoreError::Network(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

/// Row selection: equality filters, optional ordering and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub columns: Option<String>,
    pub filters: Vec<(String, String)>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.columns = Some(columns.to_string());
        self
    }

    pub fn eq(mut self, column: &str, value: &str) -> Self {
        self.filters.push((column.to_string(), value.to_string()));
        self
    }

    pub fn order_by(mut self, column: &str, descending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            descending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// User and (when issued) session returned by sign-in/sign-up.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSession {
    pub user: Value,
    pub session: Option<Value>,
}

pub trait DataStore: Send + Sync + 'static {
    fn query<T>(&self, table: &str, query: &Query) -> impl Future<Output = StoreResult<Vec<T>>> + Send
    where
        T: DeserializeOwned + Send;

    /// Returns the stored rows, including server-assigned fields.
    fn insert<R, T>(&self, table: &str, records: &[R]) -> impl Future<Output = StoreResult<Vec<T>>> + Send
    where
        R: Serialize + Sync,
        T: DeserializeOwned + Send;

    fn sign_in(&self, credentials: &LoginRequest) -> impl Future<Output = StoreResult<AuthSession>> + Send;

    fn sign_up(
        &self,
        credentials: &LoginRequest,
        metadata: Value,
    ) -> impl Future<Output = StoreResult<AuthSession>> + Send;

    fn sign_out(&self, access_token: &str) -> impl Future<Output = StoreResult<()>> + Send;

    fn get_user(&self, access_token: &str) -> impl Future<Output = StoreResult<Value>> + Send;
}
