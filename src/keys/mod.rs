pub mod directory;

use axum::{
    Json, Router, debug_handler,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::{AuthConfig, Caller, OnUnauthenticated, require_auth};
use crate::{ApiError, ApiResult, AppState};

use directory::KeyDirectory;

pub fn router(state: AppState) -> Router<AppState> {
    let auth = AuthConfig {
        sessions: state.sessions.clone(),
        on_unauthenticated: OnUnauthenticated::Reject,
    };
    Router::new()
        .route("/", get(latest_keys).post(register_key))
        .layer(middleware::from_fn_with_state(auth, require_auth))
}

#[derive(Deserialize)]
pub struct RegisterKeyRequest {
    #[serde(rename = "deviceUUID")]
    pub device_uuid: String,
    #[serde(rename = "keyUUID")]
    pub key_uuid: String,
    #[serde(rename = "publicKey")]
    pub public_key: String,
}

#[derive(Serialize)]
pub struct KeyEntry {
    #[serde(rename = "keyId")]
    pub key_id: String,
    #[serde(rename = "publicKey")]
    pub public_key: String,
}

#[derive(Deserialize)]
pub struct SubjectQuery {
    pub subject: Option<String>,
}

#[debug_handler(state = AppState)]
async fn register_key(
    State(directory): State<KeyDirectory>,
    Caller(alias): Caller,
    payload: Result<Json<RegisterKeyRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload.map_err(|_| ApiError::MalformedBody)?;

    directory
        .register_key(
            &alias,
            &request.device_uuid,
            &request.key_uuid,
            &request.public_key,
        )
        .await?;
    Ok(StatusCode::OK)
}

#[debug_handler(state = AppState)]
async fn latest_keys(
    State(directory): State<KeyDirectory>,
    Caller(_alias): Caller,
    Query(SubjectQuery { subject }): Query<SubjectQuery>,
) -> ApiResult<Json<Vec<KeyEntry>>> {
    let subject = subject.filter(|s| !s.is_empty()).ok_or(ApiError::MissingSubject)?;

    let keys = directory.latest_keys(&subject).await?;
    Ok(Json(
        keys.into_iter()
            .map(|key| KeyEntry {
                key_id: key.key_id,
                public_key: key.public_key,
            })
            .collect(),
    ))
}
