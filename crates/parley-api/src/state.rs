use std::sync::Arc;

use parley_db::Database;

use crate::responder::Responder;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub session_secret: String,
    /// Set the Secure flag on the session cookie (TLS deployments).
    pub cookie_secure: bool,
    /// External assistant responder; None disables assistant replies.
    pub responder: Option<Responder>,
}
