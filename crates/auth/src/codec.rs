//! Token encoding and decoding.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use graphguard_core::SubjectId;

use crate::claims::{TokenClaims, TokenType};
use crate::settings::{AuthSettings, SigningConfig};

/// Why a token failed to decode.
///
/// `Invalid` is never retryable; `Expired` is retryable only through
/// re-authentication. Callers must be able to tell them apart to choose the
/// correct denial code.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Malformed, forged, or signed with the wrong key.
    #[error("invalid token")]
    Invalid,

    /// Correctly signed and well-formed, but past its expiry.
    #[error("token expired")]
    Expired,
}

/// Signs and verifies tokens.
///
/// Pure function of its input and the injected signing configuration; no
/// side effects, no storage.
#[derive(Clone)]
pub struct TokenCodec {
    header: Header,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    pub fn new(settings: &AuthSettings) -> Result<Self> {
        let algorithm = settings.signing.algorithm();

        let (encoding, decoding) = match &settings.signing {
            SigningConfig::Hmac { secret, .. } => (
                EncodingKey::from_secret(secret.as_bytes()),
                DecodingKey::from_secret(secret.as_bytes()),
            ),
            SigningConfig::RsaPem {
                private, public, ..
            } => (
                EncodingKey::from_rsa_pem(private).context("invalid RSA private key")?,
                DecodingKey::from_rsa_pem(public).context("invalid RSA public key")?,
            ),
        };

        // Expiry is validated deterministically via TokenClaims so that
        // Expired and Invalid stay distinguishable.
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            header: Header::new(algorithm),
            encoding,
            decoding,
            validation,
            access_ttl: settings.access_ttl,
            refresh_ttl: settings.refresh_ttl,
        })
    }

    /// TTL applied to newly encoded tokens of the given kind.
    pub fn ttl(&self, token_type: TokenType) -> Duration {
        match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        }
    }

    /// Fresh claims for `subject` with the configured TTL.
    pub fn make_claims(
        &self,
        token_type: TokenType,
        subject: SubjectId,
        extra: Map<String, Value>,
    ) -> TokenClaims {
        let now = Utc::now();
        TokenClaims {
            sub: subject,
            token_type,
            iat: now.timestamp(),
            exp: (now + self.ttl(token_type)).timestamp(),
            extra,
        }
    }

    /// Sign prepared claims.
    pub fn sign(&self, claims: &TokenClaims) -> Result<String> {
        debug!(subject = %claims.sub, token_type = ?claims.token_type, "encoding token");
        jsonwebtoken::encode(&self.header, claims, &self.encoding).context("failed to sign token")
    }

    /// Sign a new token for `subject` with the configured TTL.
    pub fn encode(
        &self,
        token_type: TokenType,
        subject: SubjectId,
        extra: Map<String, Value>,
    ) -> Result<String> {
        self.sign(&self.make_claims(token_type, subject, extra))
    }

    /// Verify signature and time window, returning the claims.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| {
                debug!(error = %e, "token rejected");
                TokenError::Invalid
            })?;

        data.claims.validate_window(Utc::now())?;
        Ok(data.claims)
    }
}
