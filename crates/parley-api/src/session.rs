//! Session manager: a signed, expiring token carried in an HTTP-only cookie.
//!
//! The token is a JWT over `Claims { sub, iat, exp }` verified statelessly on
//! every request. There is no server-side session table, so revocation is
//! only by cookie deletion (logout) or expiry.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use parley_types::api::Claims;

use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "session";
const SESSION_TTL_DAYS: i64 = 7;

pub fn issue_token(secret: &str, user_id: Uuid) -> anyhow::Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        iat: now.timestamp() as usize,
        exp: (now + Duration::days(SESSION_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Session cookie for a freshly authenticated user: HTTP-only, SameSite=Lax,
/// 7-day lifetime, Secure only when the deployment runs behind TLS.
pub fn issue(secret: &str, user_id: Uuid, secure: bool) -> anyhow::Result<Cookie<'static>> {
    let token = issue_token(secret, user_id)?;

    let mut builder = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(SESSION_TTL_DAYS));
    if secure {
        builder = builder.secure(true);
    }

    Ok(builder.build())
}

pub fn resolve_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthenticated)
}

/// Resolves the session cookie to its claims. Absent, malformed, badly
/// signed and expired tokens all fail the same way.
pub fn resolve(secret: &str, jar: &CookieJar) -> Result<Claims, ApiError> {
    let cookie = jar.get(SESSION_COOKIE).ok_or(ApiError::Unauthenticated)?;
    resolve_token(secret, cookie.value())
}

/// Removal cookie clearing the session immediately. Idempotent.
pub fn removal() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_then_resolve_roundtrip() {
        let user_id = Uuid::new_v4();
        let token = issue_token("top-secret", user_id).unwrap();

        let claims = resolve_token("top-secret", &token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn garbage_and_wrong_secret_are_rejected() {
        let token = issue_token("top-secret", Uuid::new_v4()).unwrap();

        assert!(matches!(
            resolve_token("other-secret", &token),
            Err(ApiError::Unauthenticated)
        ));
        assert!(matches!(
            resolve_token("top-secret", "not-a-token"),
            Err(ApiError::Unauthenticated)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        // Hand-roll a token whose exp is well past the default leeway
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4(),
            iat: (now - 7200) as usize,
            exp: (now - 3600) as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"top-secret"),
        )
        .unwrap();

        assert!(matches!(
            resolve_token("top-secret", &token),
            Err(ApiError::Unauthenticated)
        ));
    }

    #[test]
    fn cookie_attributes() {
        let cookie = issue("top-secret", Uuid::new_v4(), false).unwrap();
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(7)));
        assert_ne!(cookie.secure(), Some(true));

        let secure = issue("top-secret", Uuid::new_v4(), true).unwrap();
        assert_eq!(secure.secure(), Some(true));

        let removal = removal();
        assert_eq!(removal.max_age(), Some(time::Duration::ZERO));
        assert!(removal.value().is_empty());
    }
}
