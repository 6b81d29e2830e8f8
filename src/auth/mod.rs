pub mod middleware;
pub mod store;

mod login;
mod register;

use axum::{Router, http::HeaderMap, routing::post};
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::{AppState, error::ApiError, error::ApiResult};

pub use middleware::{Caller, OnUnauthenticated, require_auth};

pub const AUTH_COOKIE: &str = "auth_token";
pub const SESSION_TTL: time::Duration = time::Duration::hours(24);

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register::register))
        .route("/login", post(login::login))
}

/// Pulls `alias:password` out of the Basic-Auth header. Exactly one
/// Authorization header must be present, base64-decodable, and contain the
/// `:` separator.
pub fn extract_credentials(headers: &HeaderMap) -> Result<(String, String), ApiError> {
    let mut values = headers.get_all(axum::http::header::AUTHORIZATION).iter();
    let header = match (values.next(), values.next()) {
        (Some(value), None) => value,
        _ => return Err(ApiError::MalformedCredentials),
    };

    let encoded = header
        .to_str()
        .map_err(|_| ApiError::MalformedCredentials)?
        .strip_prefix("Basic ")
        .ok_or(ApiError::MalformedCredentials)?;

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| ApiError::MalformedCredentials)?;
    let decoded = String::from_utf8(decoded).map_err(|_| ApiError::MalformedCredentials)?;

    let (alias, password) = decoded
        .split_once(':')
        .ok_or(ApiError::MalformedCredentials)?;
    Ok((alias.to_owned(), password.to_owned()))
}

pub fn valid_alias(alias: &str) -> bool {
    alias.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Deterministic salted digest: hex(sha256(password || salt)). Same inputs
/// always hash the same, which login relies on for comparison.
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn new_salt() -> String {
    let bytes: [u8; 8] = rand::rng().random();
    hex::encode(bytes)
}

/// Constant-time digest comparison. Login must not leak, through timing,
/// how much of the digest matched.
pub fn digests_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Creates a session row for `alias` and returns the cookie that carries it.
/// The token is random, not time-ordered, so it cannot be guessed from an
/// issuance timestamp.
pub async fn issue_session(
    sessions: &store::SessionStore,
    alias: &str,
) -> ApiResult<Cookie<'static>> {
    let session_id = Uuid::new_v4().to_string();
    sessions.insert(&session_id, alias).await?;
    tracing::info!(alias, session = %session_id, "initiating session");

    Ok(Cookie::build((AUTH_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .max_age(SESSION_TTL)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header::AUTHORIZATION};

    fn basic(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let encoded = base64::engine::general_purpose::STANDARD.encode(value);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
        );
        headers
    }

    #[test]
    fn extracts_alias_and_password() {
        let (alias, password) = extract_credentials(&basic("anya:p1")).unwrap();
        assert_eq!(alias, "anya");
        assert_eq!(password, "p1");
    }

    #[test]
    fn password_may_contain_separator() {
        let (_, password) = extract_credentials(&basic("anya:p:1")).unwrap();
        assert_eq!(password, "p:1");
    }

    #[test]
    fn missing_header_is_malformed() {
        let err = extract_credentials(&HeaderMap::new()).unwrap_err();
        assert!(matches!(err, ApiError::MalformedCredentials));
    }

    #[test]
    fn duplicated_header_is_malformed() {
        let mut headers = basic("anya:p1");
        headers.append(AUTHORIZATION, HeaderValue::from_static("Basic YTpi"));
        assert!(extract_credentials(&headers).is_err());
    }

    #[test]
    fn bad_base64_is_malformed() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic !!!"));
        assert!(extract_credentials(&headers).is_err());
    }

    #[test]
    fn missing_separator_is_malformed() {
        assert!(extract_credentials(&basic("anya")).is_err());
    }

    #[test]
    fn hash_is_deterministic_and_salt_sensitive() {
        assert_eq!(hash_password("p1", "aa"), hash_password("p1", "aa"));
        assert_ne!(hash_password("p1", "aa"), hash_password("p1", "bb"));
        assert_ne!(hash_password("p1", "aa"), hash_password("p2", "aa"));
    }

    #[test]
    fn alias_charset() {
        assert!(valid_alias("zawie_01"));
        assert!(valid_alias(""));
        assert!(!valid_alias("an ya"));
        assert!(!valid_alias("anya!"));
    }

    #[test]
    fn digest_comparison() {
        assert!(digests_match("abc", "abc"));
        assert!(!digests_match("abc", "abd"));
        assert!(!digests_match("abc", "abcd"));
    }
}
