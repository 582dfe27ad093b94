use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// Extract and verify the bearer token, then attach the caller's `Principal`
/// to the request extensions for the handlers behind this layer.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let principal = state.issuer.verify(token)?;
    debug!(user_id = principal.user_id, "authenticated request");

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
