use std::sync::Arc;

use tracing::error;

use storefront_db::Database;

use crate::error::ApiError;
use crate::token::TokenIssuer;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub issuer: TokenIssuer,
}

impl AppStateInner {
    pub fn new(db: Database, issuer: TokenIssuer) -> AppState {
        Arc::new(Self { db, issuer })
    }
}

/// Run blocking DB work off the async runtime.
///
/// Each `Database` call takes the lock on its own, so a lookup and a later
/// write are not atomic together. Writes that depend on an earlier check
/// re-assert it in their own statement (e.g. `AND is_active = 1`).
pub async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed"))
        })?
}
