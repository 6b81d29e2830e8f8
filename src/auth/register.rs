use axum::{
    debug_handler,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;

use crate::{AppState, ApiError, ApiResult};

use super::store::{CredentialStore, SessionStore};

#[debug_handler(state = AppState)]
pub(crate) async fn register(
    State(credentials): State<CredentialStore>,
    State(sessions): State<SessionStore>,
    jar: CookieJar,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let (alias, password) = super::extract_credentials(&headers)?;
    tracing::info!(%alias, "registration request");

    if !super::valid_alias(&alias) {
        tracing::warn!(%alias, "malformed alias");
        return Err(ApiError::InvalidAlias);
    }
    if credentials.alias_exists(&alias).await? {
        tracing::warn!(%alias, "alias already taken");
        return Err(ApiError::AliasExists);
    }

    let salt = super::new_salt();
    let hash = super::hash_password(&password, &salt);
    credentials.insert_account(&alias, &salt, &hash).await?;

    let cookie = super::issue_session(&sessions, &alias).await?;
    Ok((jar.add(cookie), StatusCode::OK))
}
