use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Attachment, Conversation, Message, Role, User};

// -- Session claims --

/// Signed session token claims, carried in the HTTP-only `session` cookie.
/// Canonical definition lives here so the auth handlers and the middleware
/// share one type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub username: String,
    pub email: String,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
}

/// `GET /auth/me` never fails — an unauthenticated caller just gets null.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: Option<User>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// -- Conversations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateConversationRequest {
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<Conversation>,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub conversation: Conversation,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct PostMessageResponse {
    pub message: Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_response: Option<Message>,
}

// -- Uploads --

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file: Attachment,
}
