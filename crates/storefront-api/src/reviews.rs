use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{info, warn};

use storefront_types::api::{CreateReview, Detail};
use storefront_types::auth::Principal;
use storefront_types::models::Review;

use crate::authz;
use crate::error::ApiError;
use crate::products::require_active_product;
use crate::state::{AppState, run_blocking};

const GRADES: std::ops::RangeInclusive<i64> = 1..=5;

pub async fn all_reviews(State(state): State<AppState>) -> Result<Json<Vec<Review>>, ApiError> {
    let reviews = run_blocking(&state, |state| Ok(state.db.list_active_reviews()?)).await?;
    Ok(Json(reviews))
}

/// GET /reviews/{slug} — active reviews of an active product.
pub async fn product_reviews(
    State(state): State<AppState>,
    Path(product_slug): Path<String>,
) -> Result<Json<Vec<Review>>, ApiError> {
    let reviews = run_blocking(&state, move |state| {
        let product = require_active_product(state, &product_slug)?;
        Ok(state.db.list_active_reviews_for_product(product.id)?)
    })
    .await?;

    Ok(Json(reviews))
}

/// The review is written under the caller's own user id.
pub async fn add_review(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateReview>,
) -> Result<impl IntoResponse, ApiError> {
    if !GRADES.contains(&req.grade) {
        return Err(ApiError::validation("grade must be between 1 and 5"));
    }

    let review = run_blocking(&state, move |state| {
        let product = state
            .db
            .get_product_by_id(req.product_id)?
            .filter(|p| p.is_active)
            .ok_or_else(|| ApiError::not_found("product not found"))?;

        if let Err(denied) = authz::authorize_review_create(&principal) {
            warn!(user_id = principal.user_id, "review denied: no role");
            return Err(denied.into());
        }

        let review = state
            .db
            .add_review(principal.user_id, product.id, &req.comment, req.grade, Utc::now())?
            // deactivated since the lookup
            .ok_or_else(|| ApiError::not_found("product not found"))?;
        info!(review_id = review.id, product_id = product.id, "review created");
        Ok(review)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(review)))
}

/// DELETE /reviews/{slug} — deactivate every active review of a product.
pub async fn delete_reviews(
    State(state): State<AppState>,
    Path(product_slug): Path<String>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Detail>, ApiError> {
    let count = run_blocking(&state, move |state| {
        let product = require_active_product(state, &product_slug)?;

        if let Err(denied) = authz::authorize_review_purge(&principal) {
            warn!(user_id = principal.user_id, product_id = product.id, "review purge denied");
            return Err(denied.into());
        }

        match state.db.deactivate_reviews_for_product(product.id)? {
            0 => Err(ApiError::not_found("no active reviews")),
            n => {
                info!(product_id = product.id, count = n, "reviews deactivated");
                Ok(n)
            }
        }
    })
    .await?;

    Ok(Json(Detail::new(format!("{count} review(s) deleted"))))
}
