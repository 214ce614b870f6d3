//! API token model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Role;

/// Bearer token for automation (deploy hooks, scripts).
///
/// Only the SHA-256 digest of the token is stored; `token_prefix` is kept so
/// an operator can tell tokens apart in listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiToken {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub token_prefix: String,
    pub role: Role,
    pub created_by: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApiToken {
    /// A token is usable when it is neither revoked nor expired
    pub fn is_active(&self) -> bool {
        if self.revoked_at.is_some() {
            return false;
        }
        match self.expires_at {
            Some(expires_at) => expires_at > Utc::now(),
            None => true,
        }
    }
}

/// Row to insert for a freshly issued token
#[derive(Debug, Clone)]
pub struct NewApiToken {
    pub name: String,
    pub token_hash: String,
    pub token_prefix: String,
    pub role: Role,
    pub created_by: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token() -> ApiToken {
        ApiToken {
            id: 1,
            name: "deploy".to_string(),
            token_hash: "x".repeat(64),
            token_prefix: "folio_abcd".to_string(),
            role: Role::Editor,
            created_by: None,
            expires_at: None,
            last_used_at: None,
            revoked_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_active_without_expiry() {
        assert!(token().is_active());
    }

    #[test]
    fn test_revoked_is_inactive() {
        let mut t = token();
        t.revoked_at = Some(Utc::now());
        assert!(!t.is_active());
    }

    #[test]
    fn test_expired_is_inactive() {
        let mut t = token();
        t.expires_at = Some(Utc::now() - Duration::minutes(1));
        assert!(!t.is_active());
    }
}
