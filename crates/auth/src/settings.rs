//! Process-wide auth configuration.
//!
//! One immutable [`AuthSettings`] value is constructed at process start and
//! passed explicitly into the codec, store and pipeline constructors. No
//! module-level globals.

use chrono::Duration;
use jsonwebtoken::Algorithm;
use tracing::warn;

/// Token signing configuration.
///
/// No `Debug` derive: key material must not end up in logs.
#[derive(Clone)]
pub enum SigningConfig {
    /// HMAC shared-secret signing (HS256/HS384/HS512).
    Hmac { secret: String, algorithm: Algorithm },

    /// RSA keypair in PEM form (RS256/RS384/RS512).
    RsaPem {
        private: Vec<u8>,
        public: Vec<u8>,
        algorithm: Algorithm,
    },
}

impl SigningConfig {
    /// HMAC-SHA256 with the given shared secret.
    pub fn hmac(secret: impl Into<String>) -> Self {
        Self::Hmac {
            secret: secret.into(),
            algorithm: Algorithm::HS256,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::Hmac { algorithm, .. } => *algorithm,
            Self::RsaPem { algorithm, .. } => *algorithm,
        }
    }
}

/// Immutable settings injected into the engine's constructors.
#[derive(Clone)]
pub struct AuthSettings {
    pub signing: SigningConfig,

    /// Lifetime of stateless access tokens.
    pub access_ttl: Duration,

    /// Lifetime of stateful refresh tokens.
    pub refresh_ttl: Duration,

    /// Allow multiple live refresh tokens per subject. When off (the
    /// default), issuing a refresh token revokes the subject's prior live
    /// tokens.
    pub long_running_refresh: bool,

    /// Rotate refresh tokens on use. A rotated predecessor stops resolving
    /// but remains revocable.
    pub rotate_on_use: bool,
}

impl AuthSettings {
    pub fn new(signing: SigningConfig) -> Self {
        Self {
            signing,
            access_ttl: Duration::minutes(5),
            refresh_ttl: Duration::days(7),
            long_running_refresh: false,
            rotate_on_use: true,
        }
    }

    /// Read settings from the environment.
    ///
    /// Falls back to an insecure dev default when `GRAPHGUARD_JWT_SECRET` is
    /// not set.
    pub fn from_env() -> Self {
        let secret = std::env::var("GRAPHGUARD_JWT_SECRET").unwrap_or_else(|_| {
            warn!("GRAPHGUARD_JWT_SECRET not set; using insecure dev default");
            "dev-secret".to_string()
        });

        Self::new(SigningConfig::hmac(secret))
    }
}
