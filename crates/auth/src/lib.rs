//! `graphguard-auth` — token lifecycle and policy enforcement engine.
//!
//! This crate is intentionally decoupled from HTTP and real storage: the
//! hosting framework supplies a [`TokenFinder`] and an identity store, and
//! drives protected operations through the [`PolicyPipeline`]. Account-level
//! state transitions (login, refresh, revoke, verify, email swap) live in
//! [`AccountMutations`].

pub mod claims;
pub mod codec;
pub mod context;
pub mod directives;
pub mod mutations;
pub mod pipeline;
pub mod response;
pub mod settings;
pub mod store;

pub use claims::{TokenClaims, TokenType};
pub use codec::{TokenCodec, TokenError};
pub use context::{BearerTokenFinder, RequestContext, TokenFinder};
pub use directives::{AuthDirective, Denial, DenialCode};
pub use mutations::AccountMutations;
pub use pipeline::PolicyPipeline;
pub use response::{
    FieldErrors, ObtainPayload, ObtainResult, RefreshPayload, RefreshResult, RevokePayload,
    RevokeResult, SwapEmailsResult, VerifyResult,
};
pub use settings::{AuthSettings, SigningConfig};
pub use store::{InMemoryRefreshStore, RefreshRecord, RefreshTokenStore, StoreError};
