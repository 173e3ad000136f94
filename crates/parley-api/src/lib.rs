pub mod auth;
pub mod conversations;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod responder;
pub mod session;
pub mod state;
pub mod upload;
