//! # Sessions
//!
//! Stateless signed cookie carrying the account id and role.
//!
//! Token layout: `{client_id}.{role}.{expires_unix}.{hex hmac-sha256}` where the
//! MAC covers the first three fields. Tampered, malformed or expired tokens are
//! treated as if no cookie was sent.
use std::{sync::Arc, time::Duration};

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, header::COOKIE, request::Parts},
};
use catalog::Role;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{error::AppError, state::State};

pub const SESSION_COOKIE: &str = "aureliana_session";

type HmacSha256 = Hmac<Sha256>;

pub struct SessionKeys {
    secret: Vec<u8>,
    ttl: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub client_id: i64,
    pub role: Role,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl,
        }
    }

    pub fn issue(&self, client_id: i64, role: Role) -> Result<String, AppError> {
        let expires = Utc::now().timestamp() + self.ttl.as_secs() as i64;
        self.issue_with_expiry(client_id, role, expires)
    }

    fn issue_with_expiry(&self, client_id: i64, role: Role, expires: i64) -> Result<String, AppError> {
        let payload = format!("{client_id}.{}.{expires}", role.as_str());
        let signature = self
            .sign(&payload)
            .ok_or_else(|| AppError::InternalError("session key rejected".into()))?;

        Ok(format!("{payload}.{signature}"))
    }

    pub fn verify(&self, token: &str) -> Option<Session> {
        let (payload, signature) = token.rsplit_once('.')?;
        let signature = hex::decode(signature).ok()?;

        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).ok()?;

        let mut fields = payload.splitn(3, '.');
        let client_id = fields.next()?.parse().ok()?;
        let role = fields.next()?.parse().ok()?;
        let expires: i64 = fields.next()?.parse().ok()?;

        if expires <= Utc::now().timestamp() {
            return None;
        }

        Some(Session { client_id, role })
    }

    fn sign(&self, payload: &str) -> Option<String> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(payload.as_bytes());

        Some(hex::encode(mac.finalize().into_bytes()))
    }

    pub fn cookie(&self, token: &str) -> Result<HeaderValue, AppError> {
        let value = format!(
            "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.ttl.as_secs()
        );

        HeaderValue::from_str(&value).map_err(|e| AppError::InternalError(e.into()))
    }

    pub fn clear_cookie() -> HeaderValue {
        HeaderValue::from_static("aureliana_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
    }
}

fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token)
}

/// Present when the request carries a valid session cookie.
pub struct MaybeSession(pub Option<Session>);

impl FromRequestParts<Arc<State>> for MaybeSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<State>) -> Result<Self, Self::Rejection> {
        Ok(MaybeSession(
            session_token(&parts.headers).and_then(|token| state.sessions.verify(token)),
        ))
    }
}

impl FromRequestParts<Arc<State>> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<State>) -> Result<Self, Self::Rejection> {
        MaybeSession::from_request_parts(parts, state)
            .await?
            .0
            .ok_or_else(|| AppError::Unauthorized("Please log in.".to_string()))
    }
}

/// Logged-in administrator.
pub struct AdminSession(pub Session);

impl FromRequestParts<Arc<State>> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<State>) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;

        if !session.role.is_admin() {
            return Err(AppError::forbidden("Access denied."));
        }

        Ok(AdminSession(session))
    }
}

/// Logged-in shopper. Administrators are turned away from cart and checkout.
pub struct CustomerSession(pub Session);

impl FromRequestParts<Arc<State>> for CustomerSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<State>) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;

        if session.role.is_admin() {
            return Err(AppError::forbidden(
                "Admin users cannot access the shopping cart.",
            ));
        }

        Ok(CustomerSession(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> SessionKeys {
        SessionKeys::new("unit-test-secret", Duration::from_secs(3600))
    }

    #[test]
    fn test_issue_then_verify() {
        let keys = keys();
        let token = keys.issue(42, Role::User).expect("token");

        assert_eq!(
            keys.verify(&token),
            Some(Session {
                client_id: 42,
                role: Role::User
            })
        );
    }

    #[test]
    fn test_tampered_role_rejected() {
        let keys = keys();
        let token = keys.issue(42, Role::User).expect("token");
        let forged = token.replacen(".user.", ".admin.", 1);

        assert_ne!(forged, token);
        assert_eq!(keys.verify(&forged), None);
    }

    #[test]
    fn test_other_secret_rejected() {
        let token = keys().issue(1, Role::Admin).expect("token");
        let other = SessionKeys::new("different", Duration::from_secs(3600));

        assert_eq!(other.verify(&token), None);
    }

    #[test]
    fn test_expired_rejected() {
        let keys = keys();
        let expired = keys
            .issue_with_expiry(5, Role::User, Utc::now().timestamp() - 1)
            .expect("token");

        assert_eq!(keys.verify(&expired), None);
    }

    #[test]
    fn test_garbage_rejected() {
        let keys = keys();

        assert_eq!(keys.verify(""), None);
        assert_eq!(keys.verify("1.user.99999999999"), None);
        assert_eq!(keys.verify("1.user.99999999999.zz"), None);
    }

    #[test]
    fn test_cookie_header_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; aureliana_session=abc.def; other=1"),
        );

        assert_eq!(session_token(&headers), Some("abc.def"));
        assert_eq!(session_token(&HeaderMap::new()), None);
    }
}
