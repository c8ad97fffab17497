use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use graphguard_core::SubjectId;

use crate::codec::TokenError;

/// Credential kind, embedded in the claims so every token is
/// self-describing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived, stateless, verified by signature + expiry alone.
    Access,
    /// Longer-lived, stateful, backed by a store record.
    Refresh,
}

/// Claims carried by every token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject identity reference.
    pub sub: SubjectId,

    /// Credential kind.
    #[serde(rename = "type")]
    pub token_type: TokenType,

    /// Issued-at, seconds since the epoch.
    pub iat: i64,

    /// Expiry, seconds since the epoch.
    pub exp: i64,

    /// Opaque application claims.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenClaims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// Deterministically validate the claims' time window.
    ///
    /// A window where `exp <= iat` is structurally broken and reported as
    /// [`TokenError::Invalid`]; a well-formed window that `now` has passed
    /// is [`TokenError::Expired`]. Callers rely on this distinction to pick
    /// the right denial code.
    pub fn validate_window(&self, now: DateTime<Utc>) -> Result<(), TokenError> {
        if self.exp <= self.iat {
            return Err(TokenError::Invalid);
        }
        if now.timestamp() >= self.exp {
            return Err(TokenError::Expired);
        }
        Ok(())
    }
}
