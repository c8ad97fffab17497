//! Wire-facing mutation result shapes.
//!
//! Every mutation answers with `success`, an `errors` map, and an
//! operation-specific payload. Payload and errors are mutually exclusive:
//! when `success` is false the payload is null, and vice versa.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::claims::TokenClaims;

/// Field-keyed error messages.
///
/// Operation-level failures that belong to no single input field go under
/// the `nonFieldErrors` key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub const NON_FIELD: &'static str = "nonFieldErrors";

    /// A single operation-level message.
    pub fn non_field(message: impl Into<String>) -> Self {
        Self::field(Self::NON_FIELD, message)
    }

    /// A single message attached to a named input field.
    pub fn field(name: impl Into<String>, message: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(name.into(), vec![message.into()]);
        Self(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.0.get(field)
    }
}

/// Human-readable failure messages, stable across the mutation surface.
/// Localization happens in the hosting application, keyed off these texts'
/// positions in the response, never off the denial codes.
pub mod messages {
    pub const INVALID_CREDENTIALS: &str = "Please enter valid credentials.";
    pub const INVALID_TOKEN: &str = "Invalid token.";
    pub const EXPIRED_TOKEN: &str = "Token expired.";
    pub const INVALID_PASSWORD: &str = "Invalid password.";
    pub const ALREADY_VERIFIED: &str = "Account already verified.";
    pub const SECONDARY_EMAIL_REQUIRED: &str = "Account has no secondary email to swap.";
    pub const ACCOUNT_NOT_FOUND: &str = "Account not found.";
    pub const OPERATION_FAILED: &str = "Unable to complete the operation, please try again.";
}

// ─────────────────────────────────────────────────────────────────────────────
// Payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Tokens handed out by a successful login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObtainPayload {
    /// Stateless access token.
    pub token: String,
    /// Stateful refresh token.
    pub refresh_token: String,
    /// Decoded claims of the access token.
    pub payload: TokenClaims,
}

/// Tokens handed out by a successful refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshPayload {
    pub token: String,
    pub refresh_token: String,
    pub payload: TokenClaims,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokePayload {
    pub revoked: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObtainResult {
    pub success: bool,
    pub errors: Option<FieldErrors>,
    pub obtain_payload: Option<ObtainPayload>,
}

impl ObtainResult {
    pub fn ok(payload: ObtainPayload) -> Self {
        Self {
            success: true,
            errors: None,
            obtain_payload: Some(payload),
        }
    }

    pub fn err(errors: FieldErrors) -> Self {
        Self {
            success: false,
            errors: Some(errors),
            obtain_payload: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResult {
    pub success: bool,
    pub errors: Option<FieldErrors>,
    pub refresh_payload: Option<RefreshPayload>,
}

impl RefreshResult {
    pub fn ok(payload: RefreshPayload) -> Self {
        Self {
            success: true,
            errors: None,
            refresh_payload: Some(payload),
        }
    }

    pub fn err(errors: FieldErrors) -> Self {
        Self {
            success: false,
            errors: Some(errors),
            refresh_payload: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeResult {
    pub success: bool,
    pub errors: Option<FieldErrors>,
    pub revoke_payload: Option<RevokePayload>,
}

impl RevokeResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            errors: None,
            revoke_payload: Some(RevokePayload { revoked: true }),
        }
    }

    pub fn err(errors: FieldErrors) -> Self {
        Self {
            success: false,
            errors: Some(errors),
            revoke_payload: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    pub success: bool,
    pub errors: Option<FieldErrors>,
}

impl VerifyResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            errors: None,
        }
    }

    pub fn err(errors: FieldErrors) -> Self {
        Self {
            success: false,
            errors: Some(errors),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapEmailsResult {
    pub success: bool,
    pub errors: Option<FieldErrors>,
}

impl SwapEmailsResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            errors: None,
        }
    }

    pub fn err(errors: FieldErrors) -> Self {
        Self {
            success: false,
            errors: Some(errors),
        }
    }
}
