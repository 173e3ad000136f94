use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

use parley_types::api::{
    Claims, ConversationListResponse, ConversationResponse, CreateConversationRequest,
};
use parley_types::models::Conversation;

use crate::error::{ApiError, run_blocking};
use crate::state::AppState;

pub const DEFAULT_TITLE: &str = "New conversation";

/// Sorted by updated_at descending, most recently active first.
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ConversationListResponse>, ApiError> {
    let db = state.clone();
    let uid = claims.sub.to_string();
    let rows = run_blocking(move || db.db.list_conversations(&uid)).await?;

    let conversations = rows
        .into_iter()
        .map(|row| row.into_conversation())
        .collect::<anyhow::Result<Vec<Conversation>>>()?;

    Ok(Json(ConversationListResponse { conversations }))
}

pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let db = state.clone();
    let uid = claims.sub.to_string();
    let row = run_blocking(move || db.db.create_conversation(&uid, &title)).await?;

    Ok((
        StatusCode::CREATED,
        Json(ConversationResponse {
            conversation: row.into_conversation()?,
        }),
    ))
}
