//! Per-request credential strategy selection.
//!
//! A request authenticates with exactly one strategy: a bearer token when
//! an `Authorization: Bearer` header is present, else the session cookie.
//! A failed token never falls back to the cookie — that would produce
//! ambiguous multi-credential error messages. Credential-class failures
//! collapse into the uniform [`Authentication::Unauthenticated`] outcome;
//! infrastructure failures propagate as errors.

use std::sync::Arc;

use creel_core::error::AuthResult;
use creel_core::session::SessionManager;
use creel_core::types::AuthContext;

use crate::token::TokenAuthenticator;

/// Outcome of per-request authentication.
#[derive(Debug)]
pub enum Authentication {
    /// Authenticated via a bearer token; no session is attached.
    Token(AuthContext),
    /// Authenticated via a session cookie; `session_id` is set.
    Session(AuthContext),
    /// No usable credential. The routing layer maps this to 401.
    Unauthenticated,
}

impl Authentication {
    /// The context, if authenticated by either strategy.
    pub fn context(&self) -> Option<&AuthContext> {
        match self {
            Self::Token(ctx) | Self::Session(ctx) => Some(ctx),
            Self::Unauthenticated => None,
        }
    }

    pub fn into_context(self) -> Option<AuthContext> {
        match self {
            Self::Token(ctx) | Self::Session(ctx) => Some(ctx),
            Self::Unauthenticated => None,
        }
    }
}

pub struct RequestAuthenticator {
    tokens: Arc<TokenAuthenticator>,
    sessions: Arc<SessionManager>,
}

impl RequestAuthenticator {
    pub fn new(tokens: Arc<TokenAuthenticator>, sessions: Arc<SessionManager>) -> Self {
        Self { tokens, sessions }
    }

    /// Authenticate a request from its `Authorization` header value and
    /// session cookie value, whichever is present.
    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
        session_cookie: Option<&str>,
    ) -> AuthResult<Authentication> {
        // A non-Bearer Authorization header (e.g. Basic) is not a bearer
        // credential, so the session strategy still applies.
        if let Some(raw) = authorization.and_then(bearer_token) {
            return self.authenticate_token(raw).await;
        }

        if let Some(session_id) = session_cookie {
            return self.authenticate_session(session_id).await;
        }

        Ok(Authentication::Unauthenticated)
    }

    async fn authenticate_token(&self, raw: &str) -> AuthResult<Authentication> {
        match self.tokens.validate_token(raw).await {
            Ok(ctx) => Ok(Authentication::Token(ctx)),
            Err(err) if err.is_credential_failure() => Ok(Authentication::Unauthenticated),
            Err(err) => Err(err),
        }
    }

    async fn authenticate_session(&self, session_id: &str) -> AuthResult<Authentication> {
        match self.sessions.validate_session(session_id).await? {
            Some(session) => Ok(Authentication::Session(AuthContext {
                user_id: session.user_id,
                organization_id: session.current_organization_id,
                session_id: Some(session.id),
            })),
            None => Ok(Authentication::Unauthenticated),
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use creel_core::adapters::{DatabaseAdapter, MemoryDatabaseAdapter};
    use creel_core::clock::{Clock, ManualClock};
    use creel_core::config::AuthConfig;
    use creel_core::types::CreateUser;

    struct Fixture {
        auth: RequestAuthenticator,
        tokens: Arc<TokenAuthenticator>,
        sessions: Arc<SessionManager>,
        database: Arc<MemoryDatabaseAdapter>,
    }

    fn fixture() -> Fixture {
        let config = Arc::new(AuthConfig::new("0123456789012345678901234567890X"));
        let database = Arc::new(MemoryDatabaseAdapter::new());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::starting_now());
        let tokens = Arc::new(TokenAuthenticator::new(
            config.clone(),
            database.clone(),
            clock.clone(),
        ));
        let sessions = Arc::new(SessionManager::new(config, database.clone(), clock));
        let auth = RequestAuthenticator::new(tokens.clone(), sessions.clone());
        Fixture {
            auth,
            tokens,
            sessions,
            database,
        }
    }

    async fn seed_user(fx: &Fixture, email: &str) -> (String, String) {
        let (user, org, _) = fx
            .database
            .create_user_with_personal_org(
                CreateUser {
                    email: email.into(),
                    name: None,
                },
                format!("{}'s workspace", email),
                chrono::Utc::now(),
            )
            .await
            .unwrap();
        (user.id, org.id)
    }

    #[tokio::test]
    async fn bearer_header_selects_the_token_strategy() {
        let fx = fixture();
        let (user_id, org_id) = seed_user(&fx, "a@example.com").await;
        let (_, raw) = fx
            .tokens
            .create_token(&user_id, &org_id, "ci")
            .await
            .unwrap();

        let outcome = fx
            .auth
            .authenticate(Some(&format!("Bearer {}", raw)), None)
            .await
            .unwrap();
        match outcome {
            Authentication::Token(ctx) => {
                assert_eq!(ctx.user_id, user_id);
                assert_eq!(ctx.organization_id, org_id);
                assert!(ctx.session_id.is_none());
                assert!(ctx.require_session_id().is_err());
            }
            other => panic!("expected token auth, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn session_cookie_selects_the_session_strategy() {
        let fx = fixture();
        let (user_id, org_id) = seed_user(&fx, "a@example.com").await;
        let session = fx.sessions.create_session(&user_id, None).await.unwrap();

        let outcome = fx
            .auth
            .authenticate(None, Some(&session.id))
            .await
            .unwrap();
        match outcome {
            Authentication::Session(ctx) => {
                assert_eq!(ctx.user_id, user_id);
                assert_eq!(ctx.organization_id, org_id);
                assert_eq!(ctx.require_session_id().unwrap(), session.id);
            }
            other => panic!("expected session auth, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn failed_token_never_falls_back_to_the_cookie() {
        let fx = fixture();
        let (user_id, _) = seed_user(&fx, "a@example.com").await;
        let session = fx.sessions.create_session(&user_id, None).await.unwrap();

        // A valid cookie rides along, but the bad bearer token decides.
        let outcome = fx
            .auth
            .authenticate(Some("Bearer bogus:credential"), Some(&session.id))
            .await
            .unwrap();
        assert!(matches!(outcome, Authentication::Unauthenticated));
    }

    #[tokio::test]
    async fn absence_of_both_is_unauthenticated() {
        let fx = fixture();
        let outcome = fx.auth.authenticate(None, None).await.unwrap();
        assert!(matches!(outcome, Authentication::Unauthenticated));
        assert!(outcome.context().is_none());
    }

    #[tokio::test]
    async fn non_bearer_authorization_defers_to_the_cookie() {
        let fx = fixture();
        let outcome = fx
            .auth
            .authenticate(Some("Basic dXNlcjpwYXNz"), None)
            .await
            .unwrap();
        assert!(matches!(outcome, Authentication::Unauthenticated));

        let (user_id, _) = seed_user(&fx, "a@example.com").await;
        let session = fx.sessions.create_session(&user_id, None).await.unwrap();
        let outcome = fx
            .auth
            .authenticate(Some("Basic dXNlcjpwYXNz"), Some(&session.id))
            .await
            .unwrap();
        assert!(matches!(outcome, Authentication::Session(_)));
    }

    #[tokio::test]
    async fn stale_cookie_is_unauthenticated() {
        let fx = fixture();
        let outcome = fx
            .auth
            .authenticate(None, Some("expired-or-unknown"))
            .await
            .unwrap();
        assert!(matches!(outcome, Authentication::Unauthenticated));
    }
}
