use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use storefront_db::is_constraint_violation;
use storefront_types::models::StatusError;

use crate::authz::Forbidden;
use crate::token::TokenError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("you do not have access to this resource")]
    Forbidden,

    #[error("missing or invalid credentials")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Signing(TokenError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// An inactive entity counts as absent for mutations.
    pub fn from_status(err: StatusError, what: &str) -> Self {
        match err {
            StatusError::AlreadyInactive => Self::NotFound(format!("{what} not found")),
        }
    }

    /// Map a failed insert/update: constraint violations become `Conflict(msg)`.
    pub fn conflict_or_internal(msg: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |err| {
            if is_constraint_violation(&err) {
                Self::Conflict(msg.to_string())
            } else {
                Self::Internal(err)
            }
        }
    }
}

impl From<Forbidden> for ApiError {
    fn from(_: Forbidden) -> Self {
        Self::Forbidden
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(_) => Self::Signing(err),
            TokenError::Invalid => Self::Unauthorized,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            Self::Signing(_) => (StatusCode::INTERNAL_SERVER_ERROR, "signing_error"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let message = match &self {
            Self::Signing(e) => {
                error!("token signing failed: {}", e);
                "internal server error".to_string()
            }
            Self::Internal(e) => {
                error!("internal error: {:#}", e);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        json_error(status, code, message)
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
