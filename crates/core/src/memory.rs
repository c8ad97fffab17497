//! In-memory identity store.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::error::IdentityResult;
use crate::{Identity, IdentityError, IdentityStore, SubjectId};

#[derive(Debug, Clone)]
struct AccountRecord {
    identity: Identity,
    password: String,
}

/// In-memory [`IdentityStore`].
///
/// Intended for tests/dev. Passwords are stored in the clear here; real
/// deployments back this trait with their user storage and hashing.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    accounts: RwLock<HashMap<SubjectId, AccountRecord>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account. Replaces any previous record for the subject.
    pub fn insert(&self, identity: Identity, password: impl Into<String>) {
        let mut accounts = match self.accounts.write() {
            Ok(accounts) => accounts,
            Err(poisoned) => poisoned.into_inner(),
        };
        accounts.insert(
            identity.subject,
            AccountRecord {
                identity,
                password: password.into(),
            },
        );
    }
}

impl IdentityStore for InMemoryIdentityStore {
    fn load(&self, subject: SubjectId) -> IdentityResult<Identity> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| IdentityError::unavailable("lock poisoned"))?;

        match accounts.get(&subject) {
            Some(record) if !record.identity.archived => Ok(record.identity.clone()),
            _ => Err(IdentityError::NotFound),
        }
    }

    fn authenticate(&self, username: &str, password: &str) -> IdentityResult<Identity> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| IdentityError::unavailable("lock poisoned"))?;

        let record = accounts
            .values()
            .find(|r| r.identity.username == username)
            .ok_or(IdentityError::InvalidCredentials)?;

        // Archived accounts fail exactly like bad credentials, so a caller
        // cannot probe for their existence.
        if record.identity.archived || record.password != password {
            return Err(IdentityError::InvalidCredentials);
        }

        Ok(record.identity.clone())
    }

    fn verify_password(&self, subject: SubjectId, password: &str) -> IdentityResult<bool> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| IdentityError::unavailable("lock poisoned"))?;

        match accounts.get(&subject) {
            Some(record) if !record.identity.archived => Ok(record.password == password),
            _ => Err(IdentityError::NotFound),
        }
    }

    fn set_verified(&self, subject: SubjectId) -> IdentityResult<Identity> {
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| IdentityError::unavailable("lock poisoned"))?;

        let record = accounts.get_mut(&subject).ok_or(IdentityError::NotFound)?;
        if record.identity.archived {
            return Err(IdentityError::NotFound);
        }
        if record.identity.verified {
            return Err(IdentityError::AlreadyVerified);
        }

        record.identity.verified = true;
        debug!(%subject, "account verified");
        Ok(record.identity.clone())
    }

    fn swap_emails(&self, subject: SubjectId) -> IdentityResult<Identity> {
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| IdentityError::unavailable("lock poisoned"))?;

        let record = accounts.get_mut(&subject).ok_or(IdentityError::NotFound)?;
        if record.identity.archived {
            return Err(IdentityError::NotFound);
        }

        let Some(secondary) = record.identity.secondary_email.take() else {
            return Err(IdentityError::SecondaryEmailRequired);
        };

        let primary = std::mem::replace(&mut record.identity.email, secondary);
        record.identity.secondary_email = Some(primary);
        debug!(%subject, "primary and secondary emails swapped");
        Ok(record.identity.clone())
    }
}
