//! Server-side sessions.
//!
//! The session store is the one piece of shared mutable state in the
//! process. The cookie value is the session id signed with the session
//! secret, so a forged or tampered cookie fails verification before the
//! store is ever consulted.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

const SESSION_TTL_DAYS: i64 = 7;
const COOKIE_NAME: &str = "campus_session";
const LOGIN_STATE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone)]
struct SessionRecord {
    account_id: Uuid,
    expires_at: DateTime<Utc>,
}

/// Signed cookie payload: the session id plus expiry.
#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: Uuid,
    iat: i64,
    exp: i64,
}

/// Signed payload for the OAuth `state` parameter. Stateless: the signature
/// and expiry carry everything needed to verify the round-trip.
#[derive(Debug, Serialize, Deserialize)]
struct LoginStateClaims {
    nonce: Uuid,
    iat: i64,
    exp: i64,
}

/// Session manager, constructed once at startup and shared through
/// application state.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<RwLock<HashMap<Uuid, SessionRecord>>>,
    secret: String,
    ttl: Duration,
    secure_cookies: bool,
}

impl SessionManager {
    pub fn new(secret: impl Into<String>, secure_cookies: bool) -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            secret: secret.into(),
            ttl: Duration::days(SESSION_TTL_DAYS),
            secure_cookies,
        }
    }

    pub fn cookie_name(&self) -> &'static str {
        COOKIE_NAME
    }

    /// Create a session for the account and return the signed token that
    /// goes into the cookie.
    pub async fn establish(
        &self,
        account_id: Uuid,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let session_id = Uuid::new_v4();

        // Abandoned sessions are never resolved again, so expired records
        // are swept here to keep the store bounded.
        let mut store = self.store.write().await;
        store.retain(|_, record| record.expires_at > now);
        store.insert(
            session_id,
            SessionRecord {
                account_id,
                expires_at,
            },
        );
        drop(store);

        let claims = SessionClaims {
            sub: session_id,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
    }

    /// Resolve a token back to the account id it was established for.
    ///
    /// Invalid signatures, unknown sessions and expired sessions all come
    /// back as `None`; expired records are removed on the way out.
    pub async fn resolve(&self, token: &str) -> Option<Uuid> {
        let session_id = self.verify(token)?;

        let record = self.store.read().await.get(&session_id).cloned()?;

        if record.expires_at < Utc::now() {
            self.store.write().await.remove(&session_id);
            return None;
        }

        Some(record.account_id)
    }

    /// Invalidate a session. Idempotent: garbage and already-terminated
    /// tokens are no-ops.
    pub async fn terminate(&self, token: &str) {
        if let Some(session_id) = self.verify(token) {
            self.store.write().await.remove(&session_id);
        }
    }

    /// Value for the `state` parameter on the consent redirect.
    pub fn issue_login_state(&self) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = LoginStateClaims {
            nonce: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(LOGIN_STATE_TTL_MINUTES)).timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
    }

    /// Whether a `state` parameter round-tripped through the provider came
    /// from us and has not expired.
    pub fn verify_login_state(&self, token: &str) -> bool {
        decode::<LoginStateClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .is_ok()
    }

    fn verify(&self, token: &str) -> Option<Uuid> {
        decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .ok()
        .map(|data| data.claims.sub)
    }

    /// Set-Cookie header for a freshly established session. The cookie
    /// crosses origins between the API and the client, hence SameSite=None;
    /// Secure only in production so local HTTP development still works.
    pub fn cookie_header(&self, token: &str) -> String {
        let max_age = self.ttl.num_seconds();
        let secure = if self.secure_cookies { "; Secure" } else { "" };
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=None; Max-Age={}{}",
            COOKIE_NAME, token, max_age, secure
        )
    }

    /// Set-Cookie header that removes the session cookie.
    pub fn clear_cookie_header(&self) -> String {
        let secure = if self.secure_cookies { "; Secure" } else { "" };
        format!(
            "{}=; Path=/; HttpOnly; SameSite=None; Max-Age=0{}",
            COOKIE_NAME, secure
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SessionManager {
        SessionManager::new("test-secret-key-for-testing-only", false)
    }

    #[tokio::test]
    async fn establish_then_resolve_returns_account_id() {
        let sessions = manager();
        let account_id = Uuid::new_v4();

        let token = sessions.establish(account_id).await.expect("should sign");
        assert_eq!(sessions.resolve(&token).await, Some(account_id));
    }

    #[tokio::test]
    async fn terminate_invalidates_and_is_idempotent() {
        let sessions = manager();
        let token = sessions.establish(Uuid::new_v4()).await.unwrap();

        sessions.terminate(&token).await;
        assert_eq!(sessions.resolve(&token).await, None);

        // terminating again, or terminating garbage, is not an error
        sessions.terminate(&token).await;
        sessions.terminate("not-a-token").await;
    }

    #[tokio::test]
    async fn garbage_token_resolves_to_none() {
        let sessions = manager();
        assert_eq!(sessions.resolve("garbage").await, None);
    }

    #[tokio::test]
    async fn token_signed_with_other_secret_rejected() {
        let sessions = manager();
        let other = SessionManager::new("a-different-secret", false);

        let token = other.establish(Uuid::new_v4()).await.unwrap();
        assert_eq!(sessions.resolve(&token).await, None);
    }

    #[tokio::test]
    async fn sessions_are_not_shared_between_managers() {
        // Two managers with the same secret but separate stores: the token
        // verifies, but the session record does not exist.
        let a = SessionManager::new("shared-secret", false);
        let b = SessionManager::new("shared-secret", false);

        let token = a.establish(Uuid::new_v4()).await.unwrap();
        assert_eq!(b.resolve(&token).await, None);
    }

    #[tokio::test]
    async fn expired_record_is_removed_on_resolve() {
        let sessions = manager();
        let account_id = Uuid::new_v4();
        let token = sessions.establish(account_id).await.unwrap();

        // Force the stored record past its expiry.
        let session_id = sessions.verify(&token).unwrap();
        sessions
            .store
            .write()
            .await
            .get_mut(&session_id)
            .unwrap()
            .expires_at = Utc::now() - Duration::minutes(1);

        assert_eq!(sessions.resolve(&token).await, None);
        assert!(!sessions.store.read().await.contains_key(&session_id));
    }

    #[tokio::test]
    async fn abandoned_expired_sessions_are_swept_on_establish() {
        let sessions = manager();

        // An expired session whose cookie is never presented again.
        let abandoned = sessions.establish(Uuid::new_v4()).await.unwrap();
        let abandoned_id = sessions.verify(&abandoned).unwrap();
        sessions
            .store
            .write()
            .await
            .get_mut(&abandoned_id)
            .unwrap()
            .expires_at = Utc::now() - Duration::minutes(1);

        // The next login sweeps it out of the store.
        let account_id = Uuid::new_v4();
        let fresh = sessions.establish(account_id).await.unwrap();

        assert!(!sessions.store.read().await.contains_key(&abandoned_id));
        assert_eq!(sessions.store.read().await.len(), 1);
        assert_eq!(sessions.resolve(&fresh).await, Some(account_id));
    }

    #[test]
    fn cookie_is_http_only_cross_site() {
        let sessions = manager();
        let header = sessions.cookie_header("tok");

        assert!(header.starts_with("campus_session=tok; "));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("SameSite=None"));
        assert!(header.contains("Path=/"));
        assert!(!header.contains("Secure"));
    }

    #[test]
    fn cookie_is_secure_in_production() {
        let sessions = SessionManager::new("s", true);
        assert!(sessions.cookie_header("tok").ends_with("; Secure"));
        assert!(sessions.clear_cookie_header().ends_with("; Secure"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let header = manager().clear_cookie_header();
        assert!(header.starts_with("campus_session=; "));
        assert!(header.contains("Max-Age=0"));
    }

    #[test]
    fn login_state_round_trips() {
        let sessions = manager();
        let state = sessions.issue_login_state().unwrap();
        assert!(sessions.verify_login_state(&state));
    }

    #[test]
    fn login_state_rejects_garbage_and_foreign_signatures() {
        let sessions = manager();
        assert!(!sessions.verify_login_state("garbage"));

        let other = SessionManager::new("a-different-secret", false);
        let foreign = other.issue_login_state().unwrap();
        assert!(!sessions.verify_login_state(&foreign));
    }

    #[test]
    fn login_state_rejects_expired_values() {
        let sessions = manager();

        // Signed with the right secret, but past expiry (and past the
        // default validation leeway).
        let now = Utc::now();
        let stale = encode(
            &Header::default(),
            &LoginStateClaims {
                nonce: Uuid::new_v4(),
                iat: (now - Duration::minutes(30)).timestamp(),
                exp: (now - Duration::minutes(20)).timestamp(),
            },
            &EncodingKey::from_secret(sessions.secret.as_bytes()),
        )
        .unwrap();

        assert!(!sessions.verify_login_state(&stale));
    }
}
