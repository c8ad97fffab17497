//! Identity model and the persistence seam the engine consumes.

use serde::{Deserialize, Serialize};

use crate::error::IdentityResult;
use crate::{Permission, SubjectId};

/// Snapshot of an account as seen by the auth engine.
///
/// Owned by the external persistence collaborator; this core only reads and
/// asserts on it. A store never hands out archived identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject: SubjectId,
    pub username: String,
    pub email: String,
    pub secondary_email: Option<String>,
    pub authenticated: bool,
    pub verified: bool,
    pub archived: bool,
    pub permissions: Vec<Permission>,
}

impl Identity {
    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Name used when a denial message refers to this account.
    pub fn display_name(&self) -> &str {
        &self.username
    }
}

/// Narrow persistence contract backed by the hosting application's storage.
///
/// Every method is synchronous; the caller decides how to schedule it. All
/// state transitions are atomic from the engine's point of view.
pub trait IdentityStore: Send + Sync {
    /// Load a live identity. Archived subjects are not resolvable.
    fn load(&self, subject: SubjectId) -> IdentityResult<Identity>;

    /// Resolve an identity from a credential pair.
    fn authenticate(&self, username: &str, password: &str) -> IdentityResult<Identity>;

    /// Check a password against the stored credential without logging in.
    fn verify_password(&self, subject: SubjectId, password: &str) -> IdentityResult<bool>;

    /// Set the account's verified flag. Fails when already set.
    fn set_verified(&self, subject: SubjectId) -> IdentityResult<Identity>;

    /// Atomically swap the primary and secondary email fields.
    ///
    /// Fails with [`crate::IdentityError::SecondaryEmailRequired`] (and
    /// performs no mutation) when there is no secondary email on record.
    fn swap_emails(&self, subject: SubjectId) -> IdentityResult<Identity>;
}
