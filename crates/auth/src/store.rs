//! Stateful refresh-token ledger.
//!
//! Access tokens are never stored; refresh tokens are, so they can be
//! revoked and rotated. Expiry is passive: it is checked when a token is
//! resolved, never swept in the background.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use thiserror::Error;
use tracing::debug;

use graphguard_core::SubjectId;

use crate::claims::TokenType;
use crate::codec::TokenCodec;
use crate::settings::AuthSettings;

/// Persisted state of one refresh token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshRecord {
    /// The signed token value handed to the client.
    pub token: String,
    pub subject: SubjectId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,

    /// Set when the token was superseded by rotation. A consumed token is
    /// still revocable but no longer resolves under rotate-on-use.
    pub consumed: bool,

    /// Back-reference to the rotated predecessor's token value.
    pub rotated_from: Option<String>,
}

impl RefreshRecord {
    pub fn revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    fn live(&self, now: DateTime<Utc>) -> bool {
        !self.revoked() && !self.expired(now)
    }
}

/// Failure reported by a [`RefreshTokenStore`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record for the token value.
    #[error("refresh token not found")]
    NotFound,

    /// The token was revoked, or superseded by rotation.
    #[error("refresh token revoked")]
    Revoked,

    /// The record's expiry has passed.
    #[error("refresh token expired")]
    Expired,

    /// Minting the token value failed.
    #[error("token encoding failed: {0}")]
    Codec(String),

    /// The backing store could not serve the request (e.g. lock poisoned).
    #[error("refresh store unavailable: {0}")]
    Unavailable(String),
}

/// Refresh-token persistence contract.
///
/// `revoke` and `rotate` on a single token value must be serialized by the
/// implementation so that concurrent requests racing on the same token
/// observe at-most-once semantics.
pub trait RefreshTokenStore: Send + Sync {
    /// Create and persist a new refresh token for `subject`.
    ///
    /// When long-running refresh is off, the subject's prior live tokens
    /// are revoked first.
    fn issue(&self, subject: SubjectId) -> Result<RefreshRecord, StoreError>;

    /// Look up a token and check its state. Revoked tokens never resolve
    /// again; consumed tokens stop resolving under rotate-on-use.
    fn resolve(&self, token: &str) -> Result<RefreshRecord, StoreError>;

    /// Revoke a token. Revoking an already-revoked token is a reported
    /// failure, not a no-op.
    fn revoke(&self, token: &str) -> Result<RefreshRecord, StoreError>;

    /// Replace a token with a successor, marking the predecessor consumed.
    /// Exactly one of any set of concurrent rotations of the same token
    /// succeeds.
    fn rotate(&self, token: &str) -> Result<RefreshRecord, StoreError>;
}

/// In-memory [`RefreshTokenStore`].
///
/// Intended for tests/dev. All mutations run under the write lock, which is
/// what serializes racing `revoke`/`rotate` calls per token.
pub struct InMemoryRefreshStore {
    settings: AuthSettings,
    codec: TokenCodec,
    records: RwLock<HashMap<String, RefreshRecord>>,
}

impl InMemoryRefreshStore {
    pub fn new(settings: AuthSettings, codec: TokenCodec) -> Self {
        Self {
            settings,
            codec,
            records: RwLock::new(HashMap::new()),
        }
    }

    fn mint(&self, subject: SubjectId) -> Result<String, StoreError> {
        self.codec
            .encode(TokenType::Refresh, subject, Map::new())
            .map_err(|e| StoreError::Codec(e.to_string()))
    }

    fn check_state(record: &RefreshRecord, now: DateTime<Utc>, reject_consumed: bool) -> Result<(), StoreError> {
        if record.revoked() {
            return Err(StoreError::Revoked);
        }
        if reject_consumed && record.consumed {
            return Err(StoreError::Revoked);
        }
        if record.expired(now) {
            return Err(StoreError::Expired);
        }
        Ok(())
    }
}

impl RefreshTokenStore for InMemoryRefreshStore {
    fn issue(&self, subject: SubjectId) -> Result<RefreshRecord, StoreError> {
        let token = self.mint(subject)?;
        let now = Utc::now();

        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        if !self.settings.long_running_refresh {
            let mut displaced = 0usize;
            for record in records.values_mut() {
                if record.subject == subject && record.live(now) {
                    record.revoked_at = Some(now);
                    displaced += 1;
                }
            }
            if displaced > 0 {
                debug!(%subject, displaced, "revoked prior refresh tokens");
            }
        }

        let record = RefreshRecord {
            token: token.clone(),
            subject,
            created_at: now,
            expires_at: now + self.settings.refresh_ttl,
            revoked_at: None,
            consumed: false,
            rotated_from: None,
        };
        records.insert(token, record.clone());

        debug!(%subject, "issued refresh token");
        Ok(record)
    }

    fn resolve(&self, token: &str) -> Result<RefreshRecord, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        let record = records.get(token).ok_or(StoreError::NotFound)?;
        Self::check_state(record, Utc::now(), self.settings.rotate_on_use)?;
        Ok(record.clone())
    }

    fn revoke(&self, token: &str) -> Result<RefreshRecord, StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        let record = records.get_mut(token).ok_or(StoreError::NotFound)?;
        if record.revoked() {
            return Err(StoreError::Revoked);
        }

        record.revoked_at = Some(Utc::now());
        debug!(subject = %record.subject, "revoked refresh token");
        Ok(record.clone())
    }

    fn rotate(&self, token: &str) -> Result<RefreshRecord, StoreError> {
        let now = Utc::now();

        // The whole read-check-mint-insert sequence runs under the write
        // lock; a concurrent rotation of the same token sees the consumed
        // marker and loses.
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        let record = records.get(token).ok_or(StoreError::NotFound)?;
        Self::check_state(record, now, true)?;
        let subject = record.subject;

        // Mint before mutating so a signing failure leaves the predecessor
        // untouched.
        let successor_token = self.mint(subject)?;

        if let Some(record) = records.get_mut(token) {
            record.consumed = true;
        }
        let successor = RefreshRecord {
            token: successor_token.clone(),
            subject,
            created_at: now,
            expires_at: now + self.settings.refresh_ttl,
            revoked_at: None,
            consumed: false,
            rotated_from: Some(token.to_string()),
        };
        records.insert(successor_token, successor.clone());

        debug!(%subject, "rotated refresh token");
        Ok(successor)
    }
}
