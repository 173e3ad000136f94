//! Database row types — these map directly to SQLite rows.
//! Distinct from the parley-types API models to keep the DB layer independent.

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};

use parley_types::models::{Attachment, Conversation, Message, Role, User};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct ConversationRow {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct MessageRow {
    pub id: i64,
    pub conversation_id: i64,
    pub role: String,
    pub content: String,
    pub attachments: Option<String>,
    pub created_at: String,
}

impl UserRow {
    /// API model, without the password hash.
    pub fn into_user(self) -> Result<User> {
        Ok(User {
            id: self
                .id
                .parse()
                .map_err(|e| anyhow!("corrupt user id '{}': {}", self.id, e))?,
            username: self.username,
            email: self.email,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

impl ConversationRow {
    pub fn into_conversation(self) -> Result<Conversation> {
        Ok(Conversation {
            id: self.id,
            user_id: self
                .user_id
                .parse()
                .map_err(|e| anyhow!("corrupt user_id '{}' on conversation {}: {}", self.user_id, self.id, e))?,
            title: self.title,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

impl MessageRow {
    pub fn into_message(self) -> Result<Message> {
        let role = Role::parse(&self.role)
            .ok_or_else(|| anyhow!("corrupt role '{}' on message {}", self.role, self.id))?;
        let attachments: Vec<Attachment> = match &self.attachments {
            Some(json) => serde_json::from_str(json)
                .map_err(|e| anyhow!("corrupt attachments on message {}: {}", self.id, e))?,
            None => vec![],
        };
        Ok(Message {
            id: self.id,
            conversation_id: self.conversation_id,
            role,
            content: self.content,
            attachments,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Try RFC 3339 first, then parse as naive UTC and convert.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| anyhow!("corrupt timestamp '{}': {}", s, e))
}
