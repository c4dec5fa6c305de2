//! Third-party credential model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Third-party identity providers whose tokens can be stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    GitHub,
}

impl Provider {
    /// Get the provider name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::GitHub => "github",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(Provider::GitHub),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

/// Stored third-party credential; at most one active row per user and provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedCredential {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: Provider,
    pub username: Option<String>,
    /// base64(IV ‖ ciphertext)
    #[serde(skip_serializing)]
    pub encrypted_token: String,
    pub scopes: Vec<String>,
    pub last_verified: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upsert payload for a credential
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub user_id: Uuid,
    pub provider: Provider,
    pub username: Option<String>,
    pub encrypted_token: String,
    pub scopes: Vec<String>,
}

/// Integration status reported to the owning user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_verified: Option<DateTime<Utc>>,
}

impl CredentialStatus {
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            username: None,
            valid: None,
            scopes: Vec::new(),
            last_verified: None,
        }
    }
}
