pub mod relay;

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
use crate::keys::SubjectQuery;
use crate::{ApiError, ApiResult, AppState};

use relay::{CipherEntry, Message, MessageRelay};

pub fn router(state: AppState) -> Router<AppState> {
    let auth = AuthConfig {
        sessions: state.sessions.clone(),
        on_unauthenticated: OnUnauthenticated::Reject,
    };
    Router::new()
        .route("/", get(get_conversation).post(post_message))
        .layer(middleware::from_fn_with_state(auth, require_auth))
}

#[derive(Deserialize)]
pub struct PostMessageRequest {
    pub recipient: String,
    pub ciphers: Vec<CipherEntry>,
}

#[derive(Serialize)]
pub struct GetMessagesResponse {
    pub messages: Vec<Message>,
}

/// The sender is always the authenticated caller; the body only names the
/// recipient.
#[debug_handler(state = AppState)]
async fn post_message(
    State(relay): State<MessageRelay>,
    Caller(sender): Caller,
    payload: Result<Json<PostMessageRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload.map_err(|_| ApiError::MalformedBody)?;

    relay
        .send(&sender, &request.recipient, &request.ciphers)
        .await?;
    Ok(StatusCode::OK)
}

#[debug_handler(state = AppState)]
async fn get_conversation(
    State(relay): State<MessageRelay>,
    Caller(alias): Caller,
    Query(SubjectQuery { subject }): Query<SubjectQuery>,
) -> ApiResult<Json<GetMessagesResponse>> {
    let subject = subject.filter(|s| !s.is_empty()).ok_or(ApiError::MissingSubject)?;

    let messages = relay.conversation(&alias, &subject).await?;
    Ok(Json(GetMessagesResponse { messages }))
}
