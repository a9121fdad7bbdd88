use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(deserialize_with = "trimmed")]
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.trim().to_string(),
            password: password.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_credentials(&self.email, &self.password)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(deserialize_with = "trimmed")]
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub vehicle_model: Option<String>,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_credentials(&self.email, &self.password)
    }

    pub fn credentials(&self) -> LoginRequest {
        LoginRequest::new(&self.email, &self.password)
    }
}

/// Body returned by login and register.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: Value,
    pub session: Option<Value>,
    pub message: String,
}

// Blanks around an email never reach the store
fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(|s| s.trim().to_string())
}

fn validate_credentials(email: &str, password: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err("email must be a valid address".to_string());
    }
    if password.is_empty() {
        return Err("password must not be empty".to_string());
    }
    Ok(())
}
