use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::error::ApiError;
use crate::session;
use crate::state::AppState;

/// Resolves the session cookie and stashes the claims as a request extension
/// for every protected route. Short-circuits with 401 before any handler runs.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = session::resolve(&state.session_secret, &jar)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
