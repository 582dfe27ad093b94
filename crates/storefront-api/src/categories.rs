use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};

use storefront_types::api::CreateCategory;
use storefront_types::auth::Principal;
use storefront_types::models::Category;

use crate::authz;
use crate::error::ApiError;
use crate::state::{AppState, AppStateInner, run_blocking};

pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    let categories = run_blocking(&state, |state| Ok(state.db.list_categories()?)).await?;
    Ok(Json(categories))
}

pub async fn create_category(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateCategory>,
) -> Result<impl IntoResponse, ApiError> {
    let slug = category_slug(&req.name)?;

    let category = run_blocking(&state, move |state| {
        check_parent(state, req.parent_id, None)?;
        deny_unless_admin(&principal)?;

        let category = state
            .db
            .insert_category(req.name.trim(), &slug, req.parent_id)
            .map_err(ApiError::conflict_or_internal("a category with this name already exists"))?;
        info!(category_id = category.id, slug = %category.slug, "category created");
        Ok(category)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(category_id): Path<i64>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateCategory>,
) -> Result<Json<Category>, ApiError> {
    let slug = category_slug(&req.name)?;

    let category = run_blocking(&state, move |state| {
        if state.db.get_category_by_id(category_id)?.is_none() {
            return Err(ApiError::not_found("category not found"));
        }
        check_parent(state, req.parent_id, Some(category_id))?;
        deny_unless_admin(&principal)?;

        state
            .db
            .update_category(category_id, req.name.trim(), &slug, req.parent_id)
            .map_err(ApiError::conflict_or_internal("a category with this name already exists"))?;
        info!(category_id, slug = %slug, "category updated");

        Ok(Category {
            id: category_id,
            slug,
            name: req.name.trim().to_string(),
            parent_id: req.parent_id,
        })
    })
    .await?;

    Ok(Json(category))
}

fn category_slug(name: &str) -> Result<String, ApiError> {
    let slug = slug::slugify(name.trim());
    if slug.is_empty() {
        return Err(ApiError::validation("category name must contain letters or digits"));
    }
    Ok(slug)
}

/// The parent must exist, and `this` must not appear in the parent's chain of
/// ancestors (which would close a cycle).
fn check_parent(state: &AppStateInner, parent_id: Option<i64>, this: Option<i64>) -> Result<(), ApiError> {
    let Some(parent_id) = parent_id else {
        return Ok(());
    };
    let Some(parent) = state.db.get_category_by_id(parent_id)? else {
        return Err(ApiError::not_found("parent category not found"));
    };
    let Some(this) = this else {
        return Ok(());
    };

    let mut seen = HashSet::new();
    let mut current = Some(parent);
    while let Some(category) = current {
        if category.id == this {
            return Err(ApiError::validation("a category cannot be its own ancestor"));
        }
        if !seen.insert(category.id) {
            break;
        }
        current = match category.parent_id {
            Some(id) => state.db.get_category_by_id(id)?,
            None => None,
        };
    }
    Ok(())
}

fn deny_unless_admin(principal: &Principal) -> Result<(), ApiError> {
    authz::require_admin(principal).map_err(|denied| {
        warn!(user_id = principal.user_id, "category change denied");
        denied.into()
    })
}
