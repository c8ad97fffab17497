//! Declarative policy guards attached to protected operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use graphguard_core::Permission;

/// Stable wire codes for policy denials.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialCode {
    Unauthenticated,
    NotVerified,
    NoSufficientPermissions,
    InvalidToken,
    ExpiredToken,
}

impl DenialCode {
    /// Default human-readable message for the code. Hosts that localize
    /// replace this text, never the code.
    pub fn message(&self) -> &'static str {
        match self {
            DenialCode::Unauthenticated => "Unauthenticated.",
            DenialCode::NotVerified => "Please verify your account.",
            DenialCode::NoSufficientPermissions => "Not sufficient permissions.",
            DenialCode::InvalidToken => "Invalid token.",
            DenialCode::ExpiredToken => "Token expired.",
        }
    }
}

/// Structured rejection produced by a directive.
///
/// Terminal for the pipeline run that produced it: remaining directives are
/// skipped and the protected operation does not execute.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct Denial {
    pub code: DenialCode,
    pub message: String,
}

impl Denial {
    pub fn new(code: DenialCode) -> Self {
        Self {
            code,
            message: code.message().to_string(),
        }
    }

    pub fn with_message(code: DenialCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Composable permission predicates, attached to an operation at definition
/// time and evaluated per request.
///
/// Each variant holds its own configuration; evaluation order is the
/// caller's declaration order. `TokenRequired` must precede the
/// identity-reading variants when they are composed — the pipeline does not
/// reorder.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthDirective {
    /// Resolve a bearer token into an identity on the context.
    TokenRequired,

    /// Reject anonymous callers.
    IsAuthenticated,

    /// Reject accounts whose verified flag is absent or false.
    IsVerified,

    /// Require every listed permission, checked in declaration order.
    HasPermission(Vec<Permission>),
}
