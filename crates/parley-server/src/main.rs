mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_api::middleware::require_auth;
use parley_api::responder::Responder;
use parley_api::state::{AppState, AppStateInner};
use parley_api::{auth, conversations, messages, upload};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = parley_db::Database::open(&PathBuf::from(&config.db_path))?;

    let responder = match &config.responder_url {
        Some(url) => {
            info!("Assistant responder configured at {}", url);
            Some(Responder::new(url)?)
        }
        None => {
            info!("No assistant responder configured, replies disabled");
            None
        }
    };

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        session_secret: config.session_secret.clone(),
        cookie_secure: config.cookie_secure,
        responder,
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/user/update", put(auth::update_user))
        .route("/conversations", get(conversations::list_conversations))
        .route("/conversations", post(conversations::create_conversation))
        .route("/conversations/{id}/messages", get(messages::get_messages))
        .route("/conversations/{id}/messages", post(messages::post_message))
        .route("/upload", post(upload::upload))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Parley server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
