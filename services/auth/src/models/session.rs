//! Permanent session model and related functionality

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

use super::Principal;

/// Server-tracked session row
///
/// Rows are soft-revoked by clearing `is_active`; they are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermanentSession {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// `None` means the session never expires
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl PermanentSession {
    /// Whether the row may still authenticate a request at `now`
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

/// New session creation payload
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: Uuid,
    pub token_hash: String,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A live session joined with the principal that owns it
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub session: PermanentSession,
    pub principal: Principal,
}

/// Session metadata safe to hand back to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&PermanentSession> for SessionSummary {
    fn from(session: &PermanentSession) -> Self {
        Self {
            id: session.id,
            device_info: session.device_info.clone(),
            ip_address: session.ip_address.clone(),
            last_activity: session.last_activity,
            created_at: session.created_at,
            expires_at: session.expires_at,
        }
    }
}

/// Coarse description of the client that opened a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl DeviceInfo {
    /// Derive device metadata from a user agent string and remote address
    pub fn detect(user_agent: Option<&str>, ip_address: Option<&str>) -> Self {
        let mut info = DeviceInfo {
            ip_address: ip_address.map(str::to_string),
            ..Default::default()
        };

        if let Some(user_agent) = user_agent {
            static TABLET: OnceLock<Regex> = OnceLock::new();
            static MOBILE: OnceLock<Regex> = OnceLock::new();
            let tablet = TABLET
                .get_or_init(|| Regex::new(r"Tablet|iPad").expect("Failed to compile tablet regex"));
            let mobile = MOBILE.get_or_init(|| {
                Regex::new(r"Mobile|Android|iPhone").expect("Failed to compile mobile regex")
            });

            let device_type = if tablet.is_match(user_agent) {
                "tablet"
            } else if mobile.is_match(user_agent) {
                "mobile"
            } else {
                "desktop"
            };

            // Edge and Chrome both advertise Safari; order matters.
            let browser = if user_agent.contains("Edg/") || user_agent.contains("Edge") {
                Some("Edge")
            } else if user_agent.contains("Firefox") {
                Some("Firefox")
            } else if user_agent.contains("Chrome") {
                Some("Chrome")
            } else if user_agent.contains("Safari") {
                Some("Safari")
            } else {
                None
            };

            info.user_agent = Some(user_agent.to_string());
            info.device_type = Some(device_type.to_string());
            info.browser = browser.map(str::to_string);
        }

        info
    }

    /// Serialized form stored on the session row
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_DESKTOP: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
    const SAFARI_IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const EDGE_DESKTOP: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36 Edg/120.0";

    #[test]
    fn test_detect_desktop_chrome() {
        let info = DeviceInfo::detect(Some(CHROME_DESKTOP), Some("10.0.0.1"));
        assert_eq!(info.device_type.as_deref(), Some("desktop"));
        assert_eq!(info.browser.as_deref(), Some("Chrome"));
        assert_eq!(info.ip_address.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_detect_ipad_is_tablet() {
        let info = DeviceInfo::detect(Some(SAFARI_IPAD), None);
        assert_eq!(info.device_type.as_deref(), Some("tablet"));
        assert_eq!(info.browser.as_deref(), Some("Safari"));
    }

    #[test]
    fn test_detect_edge_before_chrome() {
        let info = DeviceInfo::detect(Some(EDGE_DESKTOP), None);
        assert_eq!(info.browser.as_deref(), Some("Edge"));
    }

    #[test]
    fn test_detect_without_user_agent() {
        let info = DeviceInfo::detect(None, Some("127.0.0.1"));
        assert_eq!(info.to_json(), r#"{"ip_address":"127.0.0.1"}"#);
    }

    #[test]
    fn test_session_usable_window() {
        let now = Utc::now();
        let mut session = PermanentSession {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: String::new(),
            device_info: None,
            ip_address: None,
            created_at: now,
            last_activity: now,
            expires_at: None,
            is_active: true,
        };
        assert!(session.is_usable_at(now));

        session.expires_at = Some(now);
        assert!(!session.is_usable_at(now));

        session.expires_at = None;
        session.is_active = false;
        assert!(!session.is_usable_at(now));
    }
}
