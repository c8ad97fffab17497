//! Per-request context threaded through directive evaluation.

use std::collections::BTreeMap;

use graphguard_core::Identity;

/// Mutable request-scoped state.
///
/// The transport fills in headers and the operation path. The resolved
/// identity slot is written by the `TokenRequired` directive (the only
/// directive allowed to mutate the context) and read by everything after
/// it.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    headers: BTreeMap<String, String>,
    operation: String,
    identity: Option<Identity>,
}

impl RequestContext {
    /// Context for the named operation (the field/path being resolved).
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..Self::default()
        }
    }

    /// Attach a transport header. Names are matched case-insensitively.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Install the resolved identity for downstream directives and the
    /// operation itself.
    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }
}

/// Extracts a bearer token from the request.
///
/// Supplied by the hosting framework; [`BearerTokenFinder`] covers the
/// common `authorization` header case.
pub trait TokenFinder: Send + Sync {
    fn find_token(&self, ctx: &RequestContext) -> Option<String>;
}

/// Default finder: `authorization: Bearer <token>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BearerTokenFinder;

impl TokenFinder for BearerTokenFinder {
    fn find_token(&self, ctx: &RequestContext) -> Option<String> {
        let header = ctx.header("authorization")?;
        let token = header.strip_prefix("Bearer ")?.trim();

        if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        }
    }
}
