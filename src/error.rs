use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

pub type ApiResult<T> = Result<T, ApiError>;

/// Everything a handler can fail with, mapped onto the HTTP surface in
/// [`IntoResponse`]. Storage faults never leak their internal text to the
/// client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing or malformed Authorization header")]
    MalformedCredentials,
    #[error("alias must be alphanumeric")]
    InvalidAlias,
    #[error("alias already exists")]
    AliasExists,
    /// Covers both unknown alias and wrong password. The response body is
    /// identical for both so login cannot be used to enumerate aliases.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("malformed request body")]
    MalformedBody,
    #[error("subject query parameter is required")]
    MissingSubject,
    #[error("message carries no cipher entries")]
    EmptyBundle,
    #[error("sender or recipient is not a registered account")]
    UnknownParticipant,
    #[error("no account for alias")]
    UnknownAlias,
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        use ApiError::*;
        match self {
            MalformedCredentials | InvalidAlias | AliasExists | MalformedBody | MissingSubject | EmptyBundle
            | UnknownParticipant | UnknownAlias => StatusCode::BAD_REQUEST,
            InvalidCredentials => StatusCode::FORBIDDEN,
            Unauthenticated => StatusCode::UNAUTHORIZED,
            Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Storage(err) => {
                tracing::error!(%err, "storage fault");
                "internal server error".to_owned()
            }
            other => other.to_string(),
        };

        (status, body).into_response()
    }
}
