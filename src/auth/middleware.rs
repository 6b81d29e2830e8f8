use axum::{
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;

use crate::error::{ApiError, ApiResult};

use super::store::SessionStore;
use super::{AUTH_COOKIE, SESSION_TTL};

/// What to do with a request that carries no valid session: bounce browsers
/// to the login page, or reject API calls with 401.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnUnauthenticated {
    Redirect,
    Reject,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub sessions: SessionStore,
    pub on_unauthenticated: OnUnauthenticated,
}

/// Resolves the session cookie to an alias. A missing or expired session is
/// `Ok(None)`; only storage faults are errors.
pub async fn authenticate(sessions: &SessionStore, jar: &CookieJar) -> ApiResult<Option<String>> {
    let Some(cookie) = jar.get(AUTH_COOKIE) else {
        return Ok(None);
    };
    sessions.pull(cookie.value(), SESSION_TTL).await
}

/// Request-gating middleware. Downstream handlers read the resolved alias
/// through [`Caller`] and never re-derive identity themselves.
pub async fn require_auth(
    State(config): State<AuthConfig>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&config.sessions, &jar).await {
        Err(err) => {
            tracing::error!(%err, "authentication middleware storage fault");
            (StatusCode::BAD_REQUEST, "bad request").into_response()
        }
        Ok(None) => {
            tracing::warn!("unauthenticated request");
            match config.on_unauthenticated {
                OnUnauthenticated::Redirect => Redirect::to("/login").into_response(),
                OnUnauthenticated::Reject => ApiError::Unauthenticated.into_response(),
            }
        }
        Ok(Some(alias)) => {
            tracing::debug!(%alias, "authenticated");
            request.extensions_mut().insert(Caller(alias));
            next.run(request).await
        }
    }
}

/// The authenticated alias, injected by [`require_auth`]. Extracting it from
/// a route that is not wrapped by the middleware is a programmer error, not
/// something untrusted input can trigger, so it surfaces as a 500.
#[derive(Clone, Debug)]
pub struct Caller(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Caller>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "no authenticated identity in scope",
        ))
    }
}
