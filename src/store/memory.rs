//! In-process stand-in for the hosted service, used by handler tests.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use super::{AuthSession, DataStore, Query, StoreError, StoreResult};
use crate::models::LoginRequest;

struct Account {
    id: String,
    password: String,
    confirmed: bool,
    metadata: Value,
}

impl Account {
    fn user(&self, email: &str) -> Value {
        json!({"id": self.id, "email": email, "user_metadata": self.metadata})
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    accounts: Mutex<HashMap<String, Account>>,
    next_id: Mutex<u64>,
    require_confirmation: bool,
    sign_up_error: Option<StoreError>,
    outage: Option<StoreError>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// New accounts must confirm their email before signing in.
    pub fn with_confirmation(mut self) -> Self {
        self.require_confirmation = true;
        self
    }

    /// Every sign-up fails with `err`.
    pub fn with_sign_up_error(mut self, err: StoreError) -> Self {
        self.sign_up_error = Some(err);
        self
    }

    /// Every table call fails with `err`.
    pub fn with_outage(mut self, err: StoreError) -> Self {
        self.outage = Some(err);
        self
    }

    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.entry(table.to_string()).or_default().extend(rows);
        }
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .map(|t| t.get(table).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn add_account(&self, email: &str, password: &str) {
        let id = self.next_id("user");
        if let Ok(mut accounts) = self.accounts.lock() {
            accounts.insert(
                email.to_string(),
                Account {
                    id,
                    password: password.to_string(),
                    confirmed: true,
                    metadata: json!({}),
                },
            );
        }
    }

    pub fn account_count(&self) -> usize {
        self.accounts.lock().map(|a| a.len()).unwrap_or(0)
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut next = self.next_id.lock().unwrap_or_else(|e| e.into_inner());
        *next += 1;
        format!("{}-{}", prefix, *next)
    }

    fn token_for(id: &str) -> String {
        format!("token-{}", id)
    }

    fn session_for(id: &str) -> Value {
        json!({"access_token": Self::token_for(id), "refresh_token": "refresh", "token_type": "bearer"})
    }
}

fn as_filter_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

impl DataStore for MemoryStore {
    async fn query<T>(&self, table: &str, query: &Query) -> StoreResult<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        if let Some(err) = &self.outage {
            return Err(err.clone());
        }

        let mut rows: Vec<Value> = self
            .rows(table)
            .into_iter()
            .filter(|row| {
                query.filters.iter().all(|(column, expected)| {
                    row.get(column).map(as_filter_text).as_deref() == Some(expected.as_str())
                })
            })
            .collect();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare(&a[&order.column], &b[&order.column]);
                if order.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| StoreError::Decode(e.to_string())))
            .collect()
    }

    async fn insert<R, T>(&self, table: &str, records: &[R]) -> StoreResult<Vec<T>>
    where
        R: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        if let Some(err) = &self.outage {
            return Err(err.clone());
        }

        let mut stored = Vec::with_capacity(records.len());
        for record in records {
            let mut row = serde_json::to_value(record).map_err(|e| StoreError::Decode(e.to_string()))?;
            if let Value::Object(map) = &mut row {
                map.insert("id".into(), Value::String(self.next_id(table)));
                map.insert("created_at".into(), Value::String(Utc::now().to_rfc3339()));
            }
            stored.push(row);
        }
        self.seed(table, stored.clone());

        stored
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| StoreError::Decode(e.to_string())))
            .collect()
    }

    async fn sign_in(&self, credentials: &LoginRequest) -> StoreResult<AuthSession> {
        let accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        match accounts.get(&credentials.email) {
            Some(account) if account.password == credentials.password => {
                if !account.confirmed {
                    return Err(StoreError::EmailNotConfirmed);
                }
                Ok(AuthSession {
                    user: account.user(&credentials.email),
                    session: Some(Self::session_for(&account.id)),
                })
            }
            _ => Err(StoreError::InvalidCredentials),
        }
    }

    async fn sign_up(&self, credentials: &LoginRequest, metadata: Value) -> StoreResult<AuthSession> {
        if let Some(err) = &self.sign_up_error {
            return Err(err.clone());
        }

        let id = self.next_id("user");
        let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        if accounts.contains_key(&credentials.email) {
            return Err(StoreError::UserAlreadyExists);
        }

        let account = Account {
            id,
            password: credentials.password.clone(),
            confirmed: !self.require_confirmation,
            metadata,
        };
        let user = account.user(&credentials.email);
        let session = account.confirmed.then(|| Self::session_for(&account.id));
        accounts.insert(credentials.email.clone(), account);

        Ok(AuthSession { user, session })
    }

    async fn sign_out(&self, _access_token: &str) -> StoreResult<()> {
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> StoreResult<Value> {
        let accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        accounts
            .iter()
            .find(|(_, account)| Self::token_for(&account.id) == access_token)
            .map(|(email, account)| account.user(email))
            .ok_or_else(|| StoreError::Unauthorized("invalid JWT".to_string()))
    }
}
