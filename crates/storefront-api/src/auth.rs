use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};

use storefront_db::models::NewUser;
use storefront_types::api::{LoginRequest, RegisterRequest, TokenResponse, UpdateRolesRequest};
use storefront_types::auth::{Principal, RoleFlags};
use storefront_types::models::User;

use crate::authz;
use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::validation("username must be 3-32 characters"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::validation("password must be at least 8 characters"));
    }
    if req.email.trim().is_empty() {
        return Err(ApiError::validation("email is required"));
    }

    let token = run_blocking(&state, move |state| {
        if state.db.get_user_by_username(&req.username)?.is_some() {
            return Err(ApiError::Conflict("username is already taken".into()));
        }

        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
            .to_string();

        let roles = RoleFlags::CUSTOMER;
        let user_id = state
            .db
            .create_user(&NewUser {
                first_name: &req.first_name,
                last_name: &req.last_name,
                username: &req.username,
                email: &req.email,
                password_hash: &password_hash,
                roles,
            })
            .map_err(ApiError::conflict_or_internal("username or email is already taken"))?;

        info!(user_id, username = %req.username, "user registered");
        Ok(state.issuer.access_token(&req.username, user_id, roles)?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(TokenResponse::bearer(token))))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = run_blocking(&state, move |state| {
        let user = state
            .db
            .get_user_by_username(&req.username)?
            .ok_or(ApiError::Unauthorized)?;

        // Verify password
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|e| anyhow::anyhow!("stored password hash is malformed: {}", e))?;
        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| ApiError::Unauthorized)?;

        if !user.is_active {
            warn!(user_id = user.id, "login attempt on inactive account");
            return Err(ApiError::Unauthorized);
        }

        Ok(state.issuer.access_token(&user.username, user.id, user.roles())?)
    })
    .await?;

    Ok(Json(TokenResponse::bearer(token)))
}

pub async fn me(Extension(principal): Extension<Principal>) -> Json<Principal> {
    Json(principal)
}

/// Replace a user's role flags. Tokens issued before the change keep their
/// old flags until they expire.
pub async fn update_permissions(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(principal): Extension<Principal>,
    Json(roles): Json<UpdateRolesRequest>,
) -> Result<Json<User>, ApiError> {
    let user = run_blocking(&state, move |state| {
        if state.db.get_user_by_id(user_id)?.is_none() {
            return Err(ApiError::not_found("user not found"));
        }
        if let Err(denied) = authz::require_admin(&principal) {
            warn!(user_id = principal.user_id, target = user_id, "role change denied");
            return Err(denied.into());
        }

        state.db.set_user_roles(user_id, roles)?;
        info!(admin = principal.user_id, target = user_id, ?roles, "roles updated");

        state
            .db
            .get_user_by_id(user_id)?
            .map(User::from)
            .ok_or_else(|| ApiError::not_found("user not found"))
    })
    .await?;

    Ok(Json(user))
}
