use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{HeaderMap, header};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::Role;
use crate::state::AppState;
use crate::store::Store;

pub const DEFAULT_TOKEN_TTL_DAYS: i64 = 7;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("User no longer exists")]
    UnknownUser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: Uuid,
    pub role: Role,
    pub exp: i64,
}

// Caller as resolved from the store, not from the token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: Uuid,
    pub role: Role,
    pub username: String,
    pub email: String,
}

pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn issue(&self, user_id: Uuid, role: Role, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = Claims {
            user_id,
            role,
            exp: (now + self.ttl).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub fn authenticate(headers: &HeaderMap, keys: &TokenKeys, store: &Store) -> Result<Identity, AuthError> {
    let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;
    let claims = keys.verify(token)?;
    let user = store.user(claims.user_id).ok_or(AuthError::UnknownUser)?;

    Ok(Identity {
        id: user.id,
        role: user.role,
        username: user.username,
        email: user.email,
    })
}

// Any failure means anonymous
pub fn optional_identity(headers: &HeaderMap, keys: &TokenKeys, store: &Store) -> Option<Identity> {
    match authenticate(headers, keys, store) {
        Ok(identity) => Some(identity),
        Err(AuthError::MissingToken) => None,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unusable credential");
            None
        }
    }
}

pub fn require_role(identity: &Identity, role: Role) -> Result<(), ApiError> {
    if identity.role == role {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Insufficient permissions".to_string()))
    }
}

// Extractors

pub struct AuthUser(pub Identity);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let identity = authenticate(&parts.headers, &state.tokens, &state.store)?;
        Ok(AuthUser(identity))
    }
}

pub struct AdminUser(pub Identity);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let identity = authenticate(&parts.headers, &state.tokens, &state.store)?;
        require_role(&identity, Role::Admin)?;
        Ok(AdminUser(identity))
    }
}

pub struct MaybeUser(pub Option<Identity>);

impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(optional_identity(&parts.headers, &state.tokens, &state.store)))
    }
}

// Forwarded client address, then the socket peer, then loopback
pub struct ClientKey(pub String);

pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = ["x-forwarded-for", "x-real-ip"].iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
    });

    forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

impl<S: Send + Sync> FromRequestParts<S> for ClientKey {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientKey(client_key(&parts.headers, peer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use axum::http::HeaderValue;

    fn keys() -> TokenKeys {
        TokenKeys::new(b"test-secret", Duration::days(DEFAULT_TOKEN_TTL_DAYS))
    }

    fn store_with(role: Role) -> (Store, User) {
        let store = Store::new();
        let user = store.insert_user(User {
            id: Uuid::new_v4(),
            username: "ada".into(),
            email: "ada@example.com".into(),
            name: None,
            role,
            created_at: Utc::now(),
        });
        (store, user)
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn issued_token_resolves_to_stored_user() {
        let keys = keys();
        let (store, user) = store_with(Role::Admin);
        let token = keys.issue(user.id, user.role, Utc::now()).unwrap();

        let identity = authenticate(&bearer(&token), &keys, &store).unwrap();
        assert_eq!(identity.id, user.id);
        assert_eq!(identity.role, Role::Admin);
        assert_eq!(identity.username, "ada");
        assert_eq!(identity.email, "ada@example.com");
    }

    #[test]
    fn missing_header_is_rejected() {
        let (store, _) = store_with(Role::User);
        assert!(matches!(
            authenticate(&HeaderMap::new(), &keys(), &store),
            Err(AuthError::MissingToken)
        ));
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let (store, user) = store_with(Role::User);
        let other = TokenKeys::new(b"other-secret", Duration::days(1));
        let token = other.issue(user.id, user.role, Utc::now()).unwrap();

        assert!(matches!(
            authenticate(&bearer(&token), &keys(), &store),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = keys();
        let (store, user) = store_with(Role::User);
        let token = keys
            .issue(user.id, user.role, Utc::now() - Duration::days(30))
            .unwrap();

        assert!(authenticate(&bearer(&token), &keys, &store).is_err());
    }

    #[test]
    fn token_for_deleted_user_is_rejected() {
        let keys = keys();
        let (store, _) = store_with(Role::User);
        let token = keys.issue(Uuid::new_v4(), Role::Admin, Utc::now()).unwrap();

        assert!(matches!(
            authenticate(&bearer(&token), &keys, &store),
            Err(AuthError::UnknownUser)
        ));
    }

    #[test]
    fn optional_identity_swallows_failures() {
        let (store, _) = store_with(Role::User);
        assert!(optional_identity(&bearer("garbage"), &keys(), &store).is_none());
        assert!(optional_identity(&HeaderMap::new(), &keys(), &store).is_none());
    }

    #[test]
    fn require_role_compares_exactly() {
        let identity = Identity {
            id: Uuid::new_v4(),
            role: Role::User,
            username: "bob".into(),
            email: "bob@example.com".into(),
        };
        assert!(require_role(&identity, Role::User).is_ok());
        assert!(matches!(
            require_role(&identity, Role::Admin),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn client_key_prefers_forwarded_headers() {
        let peer: SocketAddr = "192.168.1.5:4000".parse().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_key(&headers, Some(peer)), "203.0.113.7");

        headers.remove("x-forwarded-for");
        assert_eq!(client_key(&headers, Some(peer)), "198.51.100.2");

        assert_eq!(client_key(&HeaderMap::new(), Some(peer)), "192.168.1.5");
        assert_eq!(client_key(&HeaderMap::new(), None), "127.0.0.1");
    }
}
