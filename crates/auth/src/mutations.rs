//! Account-level state transitions composed from the codec, the stores and
//! the response contract.
//!
//! Every failure is translated into the response's `errors` map here;
//! nothing propagates to the transport layer. There are no partial success
//! states: a mutation either fully applies or reports why it did not.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use graphguard_core::{Identity, IdentityError, IdentityStore, SubjectId};

use crate::claims::{TokenClaims, TokenType};
use crate::codec::TokenCodec;
use crate::response::{
    messages, FieldErrors, ObtainPayload, ObtainResult, RefreshPayload, RefreshResult,
    RevokeResult, SwapEmailsResult, VerifyResult,
};
use crate::settings::AuthSettings;
use crate::store::{RefreshTokenStore, StoreError};

/// Mutation handlers for the token and account lifecycle.
pub struct AccountMutations {
    settings: AuthSettings,
    codec: TokenCodec,
    store: Arc<dyn RefreshTokenStore>,
    identities: Arc<dyn IdentityStore>,
}

impl AccountMutations {
    pub fn new(
        settings: AuthSettings,
        codec: TokenCodec,
        store: Arc<dyn RefreshTokenStore>,
        identities: Arc<dyn IdentityStore>,
    ) -> Self {
        Self {
            settings,
            codec,
            store,
            identities,
        }
    }

    /// Login: resolve the identity from credentials and hand out a refresh
    /// token plus a corresponding access token.
    pub fn obtain_tokens(&self, username: &str, password: &str) -> ObtainResult {
        let identity = match self.identities.authenticate(username, password) {
            Ok(identity) => identity,
            Err(IdentityError::InvalidCredentials | IdentityError::NotFound) => {
                debug!(username, "login rejected");
                return ObtainResult::err(FieldErrors::non_field(messages::INVALID_CREDENTIALS));
            }
            Err(e) => {
                warn!(error = %e, "identity store failed during login");
                return ObtainResult::err(FieldErrors::non_field(messages::OPERATION_FAILED));
            }
        };

        let refresh = match self.store.issue(identity.subject) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "refresh issuance failed");
                return ObtainResult::err(FieldErrors::non_field(messages::OPERATION_FAILED));
            }
        };

        match self.mint_access(&identity) {
            Ok((token, claims)) => ObtainResult::ok(ObtainPayload {
                token,
                refresh_token: refresh.token,
                payload: claims,
            }),
            Err(errors) => ObtainResult::err(errors),
        }
    }

    /// Exchange a refresh token for a fresh access token.
    ///
    /// Under rotate-on-use the presented token is consumed and a successor
    /// is returned; otherwise it is revalidated and handed back.
    pub fn refresh_tokens(&self, refresh_token: &str) -> RefreshResult {
        let record = if self.settings.rotate_on_use {
            self.store.rotate(refresh_token)
        } else {
            self.store.resolve(refresh_token)
        };

        let record = match record {
            Ok(record) => record,
            Err(StoreError::Expired) => {
                return RefreshResult::err(FieldErrors::non_field(messages::EXPIRED_TOKEN));
            }
            Err(StoreError::NotFound | StoreError::Revoked) => {
                return RefreshResult::err(FieldErrors::non_field(messages::INVALID_TOKEN));
            }
            Err(e) => {
                warn!(error = %e, "refresh store failed");
                return RefreshResult::err(FieldErrors::non_field(messages::OPERATION_FAILED));
            }
        };

        // The subject may have been archived since the token was issued.
        let identity = match self.identities.load(record.subject) {
            Ok(identity) => identity,
            Err(_) => {
                return RefreshResult::err(FieldErrors::non_field(messages::INVALID_TOKEN));
            }
        };

        match self.mint_access(&identity) {
            Ok((token, claims)) => RefreshResult::ok(RefreshPayload {
                token,
                refresh_token: record.token,
                payload: claims,
            }),
            Err(errors) => RefreshResult::err(errors),
        }
    }

    /// Invalidate a refresh token for good.
    pub fn revoke_token(&self, refresh_token: &str) -> RevokeResult {
        match self.store.revoke(refresh_token) {
            Ok(_) => RevokeResult::ok(),
            Err(StoreError::NotFound | StoreError::Revoked | StoreError::Expired) => {
                RevokeResult::err(FieldErrors::non_field(messages::INVALID_TOKEN))
            }
            Err(e) => {
                warn!(error = %e, "revoke failed");
                RevokeResult::err(FieldErrors::non_field(messages::OPERATION_FAILED))
            }
        }
    }

    /// Mark the subject's account verified.
    pub fn verify_account(&self, subject: SubjectId) -> VerifyResult {
        match self.identities.set_verified(subject) {
            Ok(_) => VerifyResult::ok(),
            Err(IdentityError::AlreadyVerified) => {
                VerifyResult::err(FieldErrors::non_field(messages::ALREADY_VERIFIED))
            }
            Err(IdentityError::NotFound) => {
                VerifyResult::err(FieldErrors::non_field(messages::ACCOUNT_NOT_FOUND))
            }
            Err(e) => {
                warn!(error = %e, "verify failed");
                VerifyResult::err(FieldErrors::non_field(messages::OPERATION_FAILED))
            }
        }
    }

    /// Swap the primary and secondary email of the authenticated identity.
    ///
    /// The password confirmation prevents identity spoofing through a stale
    /// session.
    pub fn swap_emails(&self, identity: &Identity, password: &str) -> SwapEmailsResult {
        match self.identities.verify_password(identity.subject, password) {
            Ok(true) => {}
            Ok(false) => {
                return SwapEmailsResult::err(FieldErrors::field(
                    "password",
                    messages::INVALID_PASSWORD,
                ));
            }
            Err(IdentityError::NotFound) => {
                return SwapEmailsResult::err(FieldErrors::non_field(messages::ACCOUNT_NOT_FOUND));
            }
            Err(e) => {
                warn!(error = %e, "password check failed");
                return SwapEmailsResult::err(FieldErrors::non_field(messages::OPERATION_FAILED));
            }
        }

        match self.identities.swap_emails(identity.subject) {
            Ok(_) => SwapEmailsResult::ok(),
            Err(IdentityError::SecondaryEmailRequired) => {
                SwapEmailsResult::err(FieldErrors::non_field(messages::SECONDARY_EMAIL_REQUIRED))
            }
            Err(IdentityError::NotFound) => {
                SwapEmailsResult::err(FieldErrors::non_field(messages::ACCOUNT_NOT_FOUND))
            }
            Err(e) => {
                warn!(error = %e, "email swap failed");
                SwapEmailsResult::err(FieldErrors::non_field(messages::OPERATION_FAILED))
            }
        }
    }

    /// Access token + claims carrying the identity's username.
    fn mint_access(&self, identity: &Identity) -> Result<(String, TokenClaims), FieldErrors> {
        let mut extra = Map::new();
        extra.insert(
            "username".to_string(),
            Value::String(identity.username.clone()),
        );

        let claims = self
            .codec
            .make_claims(TokenType::Access, identity.subject, extra);

        match self.codec.sign(&claims) {
            Ok(token) => Ok((token, claims)),
            Err(e) => {
                warn!(error = %e, "access token signing failed");
                Err(FieldErrors::non_field(messages::OPERATION_FAILED))
            }
        }
    }
}
