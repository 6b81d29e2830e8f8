use axum::{
    debug_handler,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;

use crate::{AppState, ApiError, ApiResult};

use super::store::{CredentialStore, SessionStore};

/// Unknown alias and wrong password are deliberately indistinguishable to
/// the client; only the log records which it was.
#[debug_handler(state = AppState)]
pub(crate) async fn login(
    State(credentials): State<CredentialStore>,
    State(sessions): State<SessionStore>,
    jar: CookieJar,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let (alias, password) = super::extract_credentials(&headers)?;
    tracing::info!(%alias, "login request");

    let Some((salt, stored_hash)) = credentials.credentials(&alias).await? else {
        tracing::warn!(%alias, "login for unknown alias");
        return Err(ApiError::InvalidCredentials);
    };

    let presented = super::hash_password(&password, &salt);
    if !super::digests_match(&presented, &stored_hash) {
        tracing::warn!(%alias, "invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let cookie = super::issue_session(&sessions, &alias).await?;
    Ok((jar.add(cookie), StatusCode::OK))
}
