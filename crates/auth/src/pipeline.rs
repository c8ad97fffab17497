//! Ordered directive evaluation ahead of protected operations.

use std::sync::Arc;

use tracing::debug;

use graphguard_core::{Identity, IdentityStore, Permission};

use crate::claims::TokenType;
use crate::codec::{TokenCodec, TokenError};
use crate::context::{RequestContext, TokenFinder};
use crate::directives::{AuthDirective, Denial, DenialCode};

/// Evaluates an operation's directives in declaration order.
///
/// Holds the collaborators `TokenRequired` needs; the other variants are
/// pure reads of the context. Evaluation is synchronous and never retried:
/// a denial is the final verdict for the request.
pub struct PolicyPipeline {
    codec: TokenCodec,
    finder: Arc<dyn TokenFinder>,
    identities: Arc<dyn IdentityStore>,
}

impl PolicyPipeline {
    pub fn new(
        codec: TokenCodec,
        finder: Arc<dyn TokenFinder>,
        identities: Arc<dyn IdentityStore>,
    ) -> Self {
        Self {
            codec,
            finder,
            identities,
        }
    }

    /// Evaluate directives sequentially, aborting on the first denial.
    pub fn evaluate(
        &self,
        directives: &[AuthDirective],
        ctx: &mut RequestContext,
    ) -> Result<(), Denial> {
        for directive in directives {
            if let Some(denial) = self.resolve_permission(directive, ctx) {
                debug!(
                    code = ?denial.code,
                    operation = ctx.operation(),
                    "directive denied request"
                );
                return Err(denial);
            }
        }
        Ok(())
    }

    /// Run `op` only when every directive passes, with the (possibly
    /// mutated) context.
    pub fn guard<T>(
        &self,
        directives: &[AuthDirective],
        ctx: &mut RequestContext,
        op: impl FnOnce(&RequestContext) -> T,
    ) -> Result<T, Denial> {
        self.evaluate(directives, ctx)?;
        Ok(op(ctx))
    }

    fn resolve_permission(
        &self,
        directive: &AuthDirective,
        ctx: &mut RequestContext,
    ) -> Option<Denial> {
        match directive {
            AuthDirective::TokenRequired => self.resolve_token(ctx),
            AuthDirective::IsAuthenticated => check_authenticated(ctx.identity()),
            AuthDirective::IsVerified => check_verified(ctx.identity()),
            AuthDirective::HasPermission(required) => {
                check_permissions(ctx.identity(), required, ctx.operation())
            }
        }
    }

    /// The only directive that mutates the context: on success the resolved
    /// identity is installed for everything downstream.
    fn resolve_token(&self, ctx: &mut RequestContext) -> Option<Denial> {
        let Some(token) = self.finder.find_token(ctx) else {
            return Some(Denial::new(DenialCode::InvalidToken));
        };

        let claims = match self.codec.decode(&token) {
            Ok(claims) => claims,
            Err(TokenError::Expired) => return Some(Denial::new(DenialCode::ExpiredToken)),
            Err(TokenError::Invalid) => return Some(Denial::new(DenialCode::InvalidToken)),
        };

        // Only stateless access tokens authenticate requests; a refresh
        // token presented as a bearer credential is rejected outright.
        if claims.token_type != TokenType::Access {
            return Some(Denial::new(DenialCode::InvalidToken));
        }

        match self.identities.load(claims.sub) {
            Ok(identity) => {
                ctx.set_identity(identity);
                None
            }
            // The subject no longer resolves to a live identity (archived
            // or deleted); the token is useless.
            Err(_) => Some(Denial::new(DenialCode::InvalidToken)),
        }
    }
}

fn check_authenticated(identity: Option<&Identity>) -> Option<Denial> {
    match identity {
        Some(identity) if identity.authenticated => None,
        _ => Some(Denial::new(DenialCode::Unauthenticated)),
    }
}

fn check_verified(identity: Option<&Identity>) -> Option<Denial> {
    match identity {
        Some(identity) if identity.verified => None,
        _ => Some(Denial::new(DenialCode::NotVerified)),
    }
}

fn check_permissions(
    identity: Option<&Identity>,
    required: &[Permission],
    operation: &str,
) -> Option<Denial> {
    let Some(identity) = identity else {
        return Some(Denial::new(DenialCode::NoSufficientPermissions));
    };

    for permission in required {
        if !identity.has_permission(permission) {
            return Some(Denial::with_message(
                DenialCode::NoSufficientPermissions,
                format!(
                    "User {}, has not sufficient permissions for {}: missing {}.",
                    identity.display_name(),
                    operation,
                    permission
                ),
            ));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use jsonwebtoken::{Algorithm, EncodingKey, Header};
    use proptest::prelude::*;
    use serde_json::Map;

    use graphguard_core::{InMemoryIdentityStore, SubjectId};

    use crate::claims::TokenClaims;
    use crate::context::BearerTokenFinder;
    use crate::settings::{AuthSettings, SigningConfig};

    use super::*;

    const SECRET: &str = "test-secret-key-12345";

    fn test_identity(username: &str) -> Identity {
        Identity {
            subject: SubjectId::new(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            secondary_email: None,
            authenticated: true,
            verified: true,
            archived: false,
            permissions: vec![Permission::new("sample.can_eat")],
        }
    }

    fn test_pipeline(identities: Arc<InMemoryIdentityStore>) -> PolicyPipeline {
        let settings = AuthSettings::new(SigningConfig::hmac(SECRET));
        let codec = TokenCodec::new(&settings).unwrap();
        PolicyPipeline::new(codec, Arc::new(BearerTokenFinder), identities)
    }

    fn mint_access(subject: SubjectId) -> String {
        let settings = AuthSettings::new(SigningConfig::hmac(SECRET));
        TokenCodec::new(&settings)
            .unwrap()
            .encode(TokenType::Access, subject, Map::new())
            .unwrap()
    }

    /// Sign handcrafted claims with the pipeline's key.
    fn mint_raw(claims: &TokenClaims) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn bearer_ctx(operation: &str, token: &str) -> RequestContext {
        RequestContext::new(operation).with_header("authorization", format!("Bearer {token}"))
    }

    #[test]
    fn token_required_installs_the_identity() {
        let identities = Arc::new(InMemoryIdentityStore::new());
        let identity = test_identity("ada");
        let subject = identity.subject;
        identities.insert(identity, "pw");

        let pipeline = test_pipeline(identities);
        let mut ctx = bearer_ctx("me", &mint_access(subject));

        pipeline
            .evaluate(&[AuthDirective::TokenRequired], &mut ctx)
            .unwrap();

        assert_eq!(ctx.identity().unwrap().username, "ada");
    }

    #[test]
    fn missing_token_is_invalid_token() {
        let pipeline = test_pipeline(Arc::new(InMemoryIdentityStore::new()));
        let mut ctx = RequestContext::new("me");

        let denial = pipeline
            .evaluate(&[AuthDirective::TokenRequired], &mut ctx)
            .unwrap_err();

        assert_eq!(denial.code, DenialCode::InvalidToken);
    }

    #[test]
    fn forged_token_is_invalid_never_expired() {
        let pipeline = test_pipeline(Arc::new(InMemoryIdentityStore::new()));
        let mut ctx = bearer_ctx("me", "garbage.token.value");

        let denial = pipeline
            .evaluate(&[AuthDirective::TokenRequired], &mut ctx)
            .unwrap_err();

        assert_eq!(denial.code, DenialCode::InvalidToken);
    }

    #[test]
    fn expired_token_is_expired_never_invalid() {
        let identities = Arc::new(InMemoryIdentityStore::new());
        let identity = test_identity("ada");
        let subject = identity.subject;
        identities.insert(identity, "pw");

        let now = chrono::Utc::now().timestamp();
        let token = mint_raw(&TokenClaims {
            sub: subject,
            token_type: TokenType::Access,
            iat: now - 600,
            exp: now - 60,
            extra: Map::new(),
        });

        let pipeline = test_pipeline(identities);
        let mut ctx = bearer_ctx("me", &token);

        let denial = pipeline
            .evaluate(&[AuthDirective::TokenRequired], &mut ctx)
            .unwrap_err();

        assert_eq!(denial.code, DenialCode::ExpiredToken);
    }

    #[test]
    fn refresh_token_as_bearer_is_invalid() {
        let identities = Arc::new(InMemoryIdentityStore::new());
        let identity = test_identity("ada");
        let subject = identity.subject;
        identities.insert(identity, "pw");

        let now = chrono::Utc::now().timestamp();
        let token = mint_raw(&TokenClaims {
            sub: subject,
            token_type: TokenType::Refresh,
            iat: now,
            exp: now + 600,
            extra: Map::new(),
        });

        let pipeline = test_pipeline(identities);
        let mut ctx = bearer_ctx("me", &token);

        let denial = pipeline
            .evaluate(&[AuthDirective::TokenRequired], &mut ctx)
            .unwrap_err();

        assert_eq!(denial.code, DenialCode::InvalidToken);
    }

    #[test]
    fn archived_subject_is_invalid_token() {
        let identities = Arc::new(InMemoryIdentityStore::new());
        let mut identity = test_identity("gone");
        identity.archived = true;
        let subject = identity.subject;
        identities.insert(identity, "pw");

        let pipeline = test_pipeline(identities);
        let mut ctx = bearer_ctx("me", &mint_access(subject));

        let denial = pipeline
            .evaluate(&[AuthDirective::TokenRequired], &mut ctx)
            .unwrap_err();

        assert_eq!(denial.code, DenialCode::InvalidToken);
    }

    #[test]
    fn anonymous_caller_is_unauthenticated() {
        let pipeline = test_pipeline(Arc::new(InMemoryIdentityStore::new()));
        let mut ctx = RequestContext::new("me");

        let denial = pipeline
            .evaluate(&[AuthDirective::IsAuthenticated], &mut ctx)
            .unwrap_err();

        assert_eq!(denial.code, DenialCode::Unauthenticated);
    }

    #[test]
    fn unverified_account_is_not_verified() {
        let identities = Arc::new(InMemoryIdentityStore::new());
        let mut identity = test_identity("foo");
        identity.verified = false;
        let subject = identity.subject;
        identities.insert(identity, "pw");

        let pipeline = test_pipeline(identities);
        let mut ctx = bearer_ctx("me", &mint_access(subject));

        let denial = pipeline
            .evaluate(
                &[
                    AuthDirective::TokenRequired,
                    AuthDirective::IsAuthenticated,
                    AuthDirective::IsVerified,
                ],
                &mut ctx,
            )
            .unwrap_err();

        assert_eq!(denial.code, DenialCode::NotVerified);
    }

    #[test]
    fn public_operation_passes_for_anonymous_callers() {
        let pipeline = test_pipeline(Arc::new(InMemoryIdentityStore::new()));
        let mut ctx = RequestContext::new("publicUser");

        let result = pipeline.guard(&[], &mut ctx, |ctx| ctx.identity().is_none());
        assert_eq!(result, Ok(true));
    }

    #[test]
    fn first_denial_short_circuits_the_rest() {
        let identities = Arc::new(InMemoryIdentityStore::new());
        let mut identity = test_identity("foo");
        identity.verified = false;
        identity.permissions = vec![];
        let subject = identity.subject;
        identities.insert(identity, "pw");

        let pipeline = test_pipeline(identities);
        let mut ctx = bearer_ctx("restricted", &mint_access(subject));

        // IsVerified comes first in declaration order, so its denial wins
        // even though HasPermission would also deny.
        let denial = pipeline
            .evaluate(
                &[
                    AuthDirective::TokenRequired,
                    AuthDirective::IsVerified,
                    AuthDirective::HasPermission(vec![Permission::new("sample.can_eat")]),
                ],
                &mut ctx,
            )
            .unwrap_err();

        assert_eq!(denial.code, DenialCode::NotVerified);
    }

    #[test]
    fn denied_operation_never_executes() {
        let pipeline = test_pipeline(Arc::new(InMemoryIdentityStore::new()));
        let mut ctx = RequestContext::new("me");
        let executed = Cell::new(false);

        let result = pipeline.guard(&[AuthDirective::IsAuthenticated], &mut ctx, |_| {
            executed.set(true);
        });

        assert!(result.is_err());
        assert!(!executed.get());
    }

    #[test]
    fn missing_permission_denial_names_the_first_missing_one() {
        let identities = Arc::new(InMemoryIdentityStore::new());
        let mut identity = test_identity("eve");
        identity.permissions = vec![Permission::new("sample.can_eat")];
        let subject = identity.subject;
        identities.insert(identity, "pw");

        let pipeline = test_pipeline(identities);
        let mut ctx = bearer_ctx("updateRecipe", &mint_access(subject));

        let denial = pipeline
            .evaluate(
                &[
                    AuthDirective::TokenRequired,
                    AuthDirective::HasPermission(vec![
                        Permission::new("sample.can_eat"),
                        Permission::new("sample.can_cook"),
                    ]),
                ],
                &mut ctx,
            )
            .unwrap_err();

        assert_eq!(denial.code, DenialCode::NoSufficientPermissions);
        assert!(denial.message.contains("eve"));
        assert!(denial.message.contains("updateRecipe"));
        assert!(denial.message.contains("sample.can_cook"));
        assert!(!denial.message.contains("sample.can_eat"));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: whichever required permission is the first one the
        /// identity lacks is the one the denial references, regardless of
        /// how many requirements follow it.
        #[test]
        fn denial_references_first_missing_permission(
            (total, missing_at) in (2usize..6).prop_flat_map(|n| (Just(n), 0..n))
        ) {
            let names: Vec<String> =
                (0..total).map(|i| format!("sample.perm_{i}")).collect();

            let mut identity = test_identity("prop");
            identity.permissions = names[..missing_at]
                .iter()
                .cloned()
                .map(Permission::from)
                .collect();

            let required: Vec<Permission> =
                names.iter().cloned().map(Permission::from).collect();

            let denial =
                check_permissions(Some(&identity), &required, "op").unwrap();

            prop_assert_eq!(denial.code, DenialCode::NoSufficientPermissions);
            prop_assert!(denial.message.contains(&names[missing_at]));
        }
    }
}
