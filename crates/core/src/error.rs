//! Error model for the identity persistence boundary.

use thiserror::Error;

/// Result type used across the identity boundary.
pub type IdentityResult<T> = Result<T, IdentityError>;

/// Failure reported by an [`crate::IdentityStore`].
///
/// Keep this focused on deterministic account-state failures. Transport and
/// token concerns belong to the auth crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// No resolvable identity for the subject. Archived accounts are
    /// reported as not found.
    #[error("identity not found")]
    NotFound,

    /// The credential pair did not match a live identity.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The account's verified flag is already set.
    #[error("account already verified")]
    AlreadyVerified,

    /// The account has no secondary email on record to swap.
    #[error("secondary email required")]
    SecondaryEmailRequired,

    /// The backing store could not serve the request (e.g. lock poisoned).
    #[error("identity store unavailable: {0}")]
    Unavailable(String),
}

impl IdentityError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
