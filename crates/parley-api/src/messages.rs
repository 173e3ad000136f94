use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::warn;
use uuid::Uuid;

use parley_types::api::{Claims, MessageListResponse, PostMessageResponse, SendMessageRequest};
use parley_types::models::{Message, Role};

use crate::error::{ApiError, run_blocking};
use crate::state::AppState;

/// Ownership guard: existence and ownership are checked as one lookup, so a
/// conversation owned by someone else is indistinguishable from a missing
/// one. Runs before any message read or write.
async fn assert_ownership(
    state: &AppState,
    conversation_id: i64,
    user_id: Uuid,
) -> Result<(), ApiError> {
    let db = state.clone();
    let uid = user_id.to_string();
    let conversation =
        run_blocking(move || db.db.get_conversation(conversation_id, &uid)).await?;
    conversation.map(|_| ()).ok_or(ApiError::NotFound)
}

/// The polling endpoint: a full ordered re-read of the conversation's log.
/// Idempotent between writes; clients call it on a fixed interval.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MessageListResponse>, ApiError> {
    assert_ownership(&state, conversation_id, claims.sub).await?;

    let db = state.clone();
    let rows = run_blocking(move || db.db.list_messages(conversation_id)).await?;
    let messages = rows
        .into_iter()
        .map(|row| row.into_message())
        .collect::<anyhow::Result<Vec<Message>>>()?;

    Ok(Json(MessageListResponse { messages }))
}

pub async fn post_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    assert_ownership(&state, conversation_id, claims.sub).await?;

    let db = state.clone();
    let role = req.role;
    let content = req.content.clone();
    let attachments = req.attachments;
    let row = run_blocking(move || {
        db.db
            .append_message(conversation_id, role.as_str(), &content, &attachments)
    })
    .await?;
    let message = row.into_message()?;

    // Best-effort assistant reply: the user message above is already
    // committed and stays committed no matter what happens here.
    let ai_response = if req.role == Role::User {
        answer_with_assistant(&state, conversation_id, &req.content).await
    } else {
        None
    };

    Ok((
        StatusCode::CREATED,
        Json(PostMessageResponse {
            message,
            ai_response,
        }),
    ))
}

async fn answer_with_assistant(
    state: &AppState,
    conversation_id: i64,
    prompt: &str,
) -> Option<Message> {
    let responder = state.responder.as_ref()?;

    let reply = match responder.ask(prompt).await {
        Ok(reply) => reply,
        Err(err) => {
            warn!("assistant responder failed, reply omitted: {err:#}");
            return None;
        }
    };

    let db = state.clone();
    let append = run_blocking(move || {
        db.db
            .append_message(conversation_id, Role::Assistant.as_str(), &reply, &[])
    })
    .await;

    match append.map(|row| row.into_message()) {
        Ok(Ok(message)) => Some(message),
        Ok(Err(err)) => {
            warn!("assistant reply stored but unreadable: {err:#}");
            None
        }
        Err(err) => {
            warn!("failed to store assistant reply: {err}");
            None
        }
    }
}
