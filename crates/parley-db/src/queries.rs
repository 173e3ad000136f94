use crate::Database;
use crate::models::{ConversationRow, MessageRow, UserRow};
use anyhow::{Result, anyhow};
use parley_types::models::Attachment;
use rusqlite::{Connection, OptionalExtension};

/// Conversation titles are capped at 50 characters; longer first messages
/// are truncated with a trailing ellipsis marker. Char-based so multi-byte
/// content never gets split mid code point.
pub fn derive_title(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(50).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, email: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password) VALUES (?1, ?2, ?3, ?4)",
                (id, username, email, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Overwrites username and email; the password hash only when a new one
    /// is supplied.
    pub fn update_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let changed = match password_hash {
                Some(hash) => conn.execute(
                    "UPDATE users SET username = ?1, email = ?2, password = ?3 WHERE id = ?4",
                    (username, email, hash, id),
                )?,
                None => conn.execute(
                    "UPDATE users SET username = ?1, email = ?2 WHERE id = ?3",
                    (username, email, id),
                )?,
            };
            if changed == 0 {
                return Err(anyhow!("no such user: {}", id));
            }
            Ok(())
        })
    }

    // -- Conversations --

    pub fn create_conversation(&self, user_id: &str, title: &str) -> Result<ConversationRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversations (user_id, title) VALUES (?1, ?2)",
                (user_id, title),
            )?;
            let id = conn.last_insert_rowid();
            query_conversation(conn, id)?
                .ok_or_else(|| anyhow!("conversation {} vanished after insert", id))
        })
    }

    pub fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, title, created_at, updated_at
                 FROM conversations
                 WHERE user_id = ?1
                 ORDER BY updated_at DESC, id DESC",
            )?;

            let rows = stmt
                .query_map([user_id], conversation_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Existence and ownership in one lookup: a conversation owned by
    /// someone else is indistinguishable from one that does not exist.
    pub fn get_conversation(&self, id: i64, user_id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(
                    "SELECT id, user_id, title, created_at, updated_at
                     FROM conversations
                     WHERE id = ?1 AND user_id = ?2",
                )?
                .query_row((id, user_id), conversation_from_row)
                .optional()?;

            Ok(row)
        })
    }

    // -- Messages --

    /// Appends one message and applies the conversation side effects in the
    /// same transaction: the first user-role message sets the title from its
    /// content; every append refreshes updated_at. If any step fails the
    /// whole append rolls back.
    pub fn append_message(
        &self,
        conversation_id: i64,
        role: &str,
        content: &str,
        attachments: &[Attachment],
    ) -> Result<MessageRow> {
        let attachments_json = if attachments.is_empty() {
            None
        } else {
            Some(serde_json::to_string(attachments)?)
        };

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let count = count_in(&tx, conversation_id)?;

            tx.execute(
                "INSERT INTO messages (conversation_id, role, content, attachments)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![conversation_id, role, content, attachments_json],
            )?;
            let message_id = tx.last_insert_rowid();

            if count == 0 && role == "user" {
                tx.execute(
                    "UPDATE conversations SET title = ?1, updated_at = datetime('now') WHERE id = ?2",
                    rusqlite::params![derive_title(content), conversation_id],
                )?;
            } else {
                tx.execute(
                    "UPDATE conversations SET updated_at = datetime('now') WHERE id = ?1",
                    [conversation_id],
                )?;
            }

            let row = query_message(&tx, message_id)?
                .ok_or_else(|| anyhow!("message {} vanished mid-transaction", message_id))?;

            tx.commit()?;
            Ok(row)
        })
    }

    pub fn list_messages(&self, conversation_id: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, role, content, attachments, created_at
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at ASC, id ASC",
            )?;

            let rows = stmt
                .query_map([conversation_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn count_messages(&self, conversation_id: i64) -> Result<i64> {
        self.with_conn(|conn| count_in(conn, conversation_id))
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // column is always a compile-time constant, never user input
    let sql = format!(
        "SELECT id, username, email, password, created_at FROM users WHERE {} = ?1",
        column
    );
    let row = conn
        .prepare(&sql)?
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_conversation(conn: &Connection, id: i64) -> Result<Option<ConversationRow>> {
    let row = conn
        .prepare(
            "SELECT id, user_id, title, created_at, updated_at FROM conversations WHERE id = ?1",
        )?
        .query_row([id], conversation_from_row)
        .optional()?;

    Ok(row)
}

fn query_message(conn: &Connection, id: i64) -> Result<Option<MessageRow>> {
    let row = conn
        .prepare(
            "SELECT id, conversation_id, role, content, attachments, created_at
             FROM messages WHERE id = ?1",
        )?
        .query_row([id], message_from_row)
        .optional()?;

    Ok(row)
}

fn count_in(conn: &Connection, conversation_id: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
        [conversation_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn conversation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role: row.get(2)?,
        content: row.get(3)?,
        attachments: row.get(4)?,
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::models::Attachment;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn seed_user(db: &Database, email: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        db.create_user(&id, "alice", email, "$argon2$fake-hash").unwrap();
        id
    }

    #[test]
    fn user_roundtrip_by_email_and_id() {
        let db = test_db();
        let id = seed_user(&db, "alice@example.com");

        let by_email = db.get_user_by_email("alice@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, id);
        assert_eq!(by_email.username, "alice");

        let by_id = db.get_user_by_id(&id).unwrap().unwrap();
        assert_eq!(by_id.email, "alice@example.com");

        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_rejected_by_constraint() {
        let db = test_db();
        seed_user(&db, "alice@example.com");

        let id = uuid::Uuid::new_v4().to_string();
        let err = db.create_user(&id, "impostor", "alice@example.com", "hash");
        assert!(err.is_err());
    }

    #[test]
    fn update_user_without_password_keeps_hash() {
        let db = test_db();
        let id = seed_user(&db, "alice@example.com");

        db.update_user(&id, "alicia", "alicia@example.com", None).unwrap();
        let user = db.get_user_by_id(&id).unwrap().unwrap();
        assert_eq!(user.username, "alicia");
        assert_eq!(user.email, "alicia@example.com");
        assert_eq!(user.password, "$argon2$fake-hash");

        db.update_user(&id, "alicia", "alicia@example.com", Some("new-hash")).unwrap();
        let user = db.get_user_by_id(&id).unwrap().unwrap();
        assert_eq!(user.password, "new-hash");
    }

    #[test]
    fn conversation_ownership_collapses_to_not_found() {
        let db = test_db();
        let owner = seed_user(&db, "owner@example.com");
        let other = seed_user(&db, "other@example.com");

        let conv = db.create_conversation(&owner, "New conversation").unwrap();

        assert!(db.get_conversation(conv.id, &owner).unwrap().is_some());
        // Someone else's conversation looks exactly like a missing one
        assert!(db.get_conversation(conv.id, &other).unwrap().is_none());
        assert!(db.get_conversation(9999, &owner).unwrap().is_none());
        assert!(db.list_conversations(&other).unwrap().is_empty());
    }

    #[test]
    fn conversations_listed_most_recently_updated_first() {
        let db = test_db();
        let owner = seed_user(&db, "owner@example.com");

        let stale = db.create_conversation(&owner, "stale").unwrap();
        let fresh = db.create_conversation(&owner, "fresh").unwrap();

        // Backdate one; datetime('now') only has second resolution
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE conversations SET updated_at = '2020-01-01 00:00:00' WHERE id = ?1",
                [stale.id],
            )?;
            Ok(())
        })
        .unwrap();

        let listed = db.list_conversations(&owner).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, fresh.id);
        assert_eq!(listed[1].id, stale.id);
    }

    #[test]
    fn append_preserves_order_and_count() {
        let db = test_db();
        let owner = seed_user(&db, "owner@example.com");
        let conv = db.create_conversation(&owner, "New conversation").unwrap();

        assert_eq!(db.count_messages(conv.id).unwrap(), 0);

        for i in 0..5 {
            db.append_message(conv.id, "user", &format!("message {i}"), &[]).unwrap();
        }

        let messages = db.list_messages(conv.id).unwrap();
        assert_eq!(messages.len(), 5);
        assert_eq!(db.count_messages(conv.id).unwrap(), 5);

        for pair in messages.windows(2) {
            assert!(pair[0].id < pair[1].id);
            assert!(pair[0].created_at <= pair[1].created_at);
        }
        assert_eq!(messages[0].content, "message 0");
        assert_eq!(messages[4].content, "message 4");
    }

    #[test]
    fn polling_twice_returns_identical_list() {
        let db = test_db();
        let owner = seed_user(&db, "owner@example.com");
        let conv = db.create_conversation(&owner, "New conversation").unwrap();

        db.append_message(conv.id, "user", "hello", &[]).unwrap();
        db.append_message(conv.id, "assistant", "hi back", &[]).unwrap();

        let first: Vec<(i64, String)> = db
            .list_messages(conv.id)
            .unwrap()
            .into_iter()
            .map(|m| (m.id, m.content))
            .collect();
        let second: Vec<(i64, String)> = db
            .list_messages(conv.id)
            .unwrap()
            .into_iter()
            .map(|m| (m.id, m.content))
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn attachment_metadata_survives_roundtrip() {
        let db = test_db();
        let owner = seed_user(&db, "owner@example.com");
        let conv = db.create_conversation(&owner, "New conversation").unwrap();

        let attachments = vec![
            Attachment {
                name: "report.pdf".into(),
                kind: "application/pdf".into(),
                size: 123_456,
            },
            Attachment {
                name: "notes.docx".into(),
                kind: "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
                    .into(),
                size: 42,
            },
        ];

        db.append_message(conv.id, "user", "see attached", &attachments).unwrap();

        let stored = db.list_messages(conv.id).unwrap().remove(0);
        let parsed: Vec<Attachment> =
            serde_json::from_str(stored.attachments.as_deref().unwrap()).unwrap();
        assert_eq!(parsed, attachments);

        // Empty attachment lists are stored as NULL, not "[]"
        db.append_message(conv.id, "assistant", "noted", &[]).unwrap();
        let plain = db.list_messages(conv.id).unwrap().remove(1);
        assert!(plain.attachments.is_none());
    }

    #[test]
    fn first_user_message_sets_title_with_truncation() {
        let db = test_db();
        let owner = seed_user(&db, "owner@example.com");
        let conv = db.create_conversation(&owner, "New conversation").unwrap();

        let content = "Lorem ipsum dolor sit amet consectetur adipiscing elit sed do";
        assert!(content.chars().count() > 50);
        db.append_message(conv.id, "user", content, &[]).unwrap();

        let expected: String = content.chars().take(50).collect::<String>() + "...";
        let conv = db.get_conversation(conv.id, &owner).unwrap().unwrap();
        assert_eq!(conv.title, expected);
    }

    #[test]
    fn short_first_message_becomes_title_verbatim() {
        let db = test_db();
        let owner = seed_user(&db, "owner@example.com");
        let conv = db.create_conversation(&owner, "New conversation").unwrap();

        db.append_message(conv.id, "user", "Hi there!!", &[]).unwrap();

        let conv = db.get_conversation(conv.id, &owner).unwrap().unwrap();
        assert_eq!(conv.title, "Hi there!!");
    }

    #[test]
    fn later_messages_never_change_the_title() {
        let db = test_db();
        let owner = seed_user(&db, "owner@example.com");
        let conv = db.create_conversation(&owner, "New conversation").unwrap();

        db.append_message(conv.id, "user", "First!", &[]).unwrap();
        db.append_message(conv.id, "assistant", "A very long reply that would certainly exceed the title limit if it were ever used", &[]).unwrap();
        db.append_message(conv.id, "user", "Second user message", &[]).unwrap();

        let conv = db.get_conversation(conv.id, &owner).unwrap().unwrap();
        assert_eq!(conv.title, "First!");
    }

    #[test]
    fn assistant_first_message_keeps_default_title() {
        let db = test_db();
        let owner = seed_user(&db, "owner@example.com");
        let conv = db.create_conversation(&owner, "New conversation").unwrap();

        db.append_message(conv.id, "assistant", "Welcome aboard", &[]).unwrap();

        let conv = db.get_conversation(conv.id, &owner).unwrap().unwrap();
        assert_eq!(conv.title, "New conversation");
    }

    #[test]
    fn derive_title_is_char_based() {
        assert_eq!(derive_title("Hi there!!"), "Hi there!!");

        let exactly_50: String = "x".repeat(50);
        assert_eq!(derive_title(&exactly_50), exactly_50);

        let over: String = "x".repeat(51);
        assert_eq!(derive_title(&over), format!("{}...", "x".repeat(50)));

        // 60 multi-byte chars must not split a code point
        let kanji: String = "日".repeat(60);
        assert_eq!(derive_title(&kanji), format!("{}...", "日".repeat(50)));
    }
}
