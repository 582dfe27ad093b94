use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};

use storefront_db::models::ProductFields;
use storefront_types::api::{CreateProduct, Detail};
use storefront_types::auth::Principal;
use storefront_types::models::Product;

use crate::authz::{self, ProductAction};
use crate::error::ApiError;
use crate::state::{AppState, AppStateInner, run_blocking};

const DUPLICATE_SLUG: &str = "a product with this name already exists";

/// GET /products — everything active and in stock.
pub async fn all_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, ApiError> {
    let products = run_blocking(&state, |state| {
        let products = state.db.list_available_products()?;
        if products.is_empty() {
            return Err(ApiError::not_found("no products"));
        }
        Ok(products)
    })
    .await?;

    Ok(Json(products))
}

/// GET /products/{slug} — products in a category and its direct children.
/// Grandchildren are not included.
pub async fn products_by_category(
    State(state): State<AppState>,
    Path(category_slug): Path<String>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let products = run_blocking(&state, move |state| {
        let category = state
            .db
            .get_category_by_slug(&category_slug)?
            .ok_or_else(|| ApiError::not_found("category not found"))?;

        let mut ids = vec![category.id];
        ids.extend(state.db.child_category_ids(category.id)?);

        Ok(state.db.list_available_products_in(&ids)?)
    })
    .await?;

    Ok(Json(products))
}

/// GET /products/detail/{slug}
pub async fn product_detail(
    State(state): State<AppState>,
    Path(product_slug): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let product = run_blocking(&state, move |state| {
        state
            .db
            .get_available_product_by_slug(&product_slug)?
            .ok_or_else(|| ApiError::not_found("product not found"))
    })
    .await?;

    Ok(Json(product))
}

pub async fn create_product(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateProduct>,
) -> Result<impl IntoResponse, ApiError> {
    let slug = validate(&req)?;

    run_blocking(&state, move |state| {
        require_category(state, req.category)?;
        check(&principal, ProductAction::Create, None)?;

        // Suppliers own what they list; admin-only listings belong to the platform.
        let supplier_id = principal.roles.is_supplier.then_some(principal.user_id);
        let id = state
            .db
            .insert_product(&fields(&req, &slug), supplier_id)
            .map_err(ApiError::conflict_or_internal(DUPLICATE_SLUG))?;

        info!(product_id = id, slug = %slug, ?supplier_id, "product created");
        Ok(())
    })
    .await?;

    Ok((StatusCode::CREATED, Json(Detail::new("product created"))))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(product_slug): Path<String>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateProduct>,
) -> Result<Json<Detail>, ApiError> {
    let slug = validate(&req)?;

    run_blocking(&state, move |state| {
        let product = require_active_product(state, &product_slug)?;
        require_category(state, req.category)?;
        check(&principal, ProductAction::Update, product.supplier_id)?;

        let updated = state
            .db
            .update_product(product.id, &fields(&req, &slug))
            .map_err(ApiError::conflict_or_internal(DUPLICATE_SLUG))?;
        if !updated {
            // deactivated since the lookup
            return Err(ApiError::not_found("product not found"));
        }

        info!(product_id = product.id, slug = %slug, "product updated");
        Ok(())
    })
    .await?;

    Ok(Json(Detail::new("product updated")))
}

/// Soft delete: the row stays, `is_active` flips to false.
pub async fn delete_product(
    State(state): State<AppState>,
    Path(product_slug): Path<String>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Detail>, ApiError> {
    run_blocking(&state, move |state| {
        let product = state
            .db
            .get_product_by_slug(&product_slug)?
            .ok_or_else(|| ApiError::not_found("product not found"))?;
        product
            .status()
            .deactivate()
            .map_err(|e| ApiError::from_status(e, "product"))?;
        check(&principal, ProductAction::Delete, product.supplier_id)?;

        if !state.db.deactivate_product(product.id)? {
            // lost a race with another deactivation
            return Err(ApiError::not_found("product not found"));
        }

        info!(product_id = product.id, user_id = principal.user_id, "product deactivated");
        Ok(())
    })
    .await?;

    Ok(Json(Detail::new("product deleted")))
}

fn validate(req: &CreateProduct) -> Result<String, ApiError> {
    if req.price < 0 {
        return Err(ApiError::validation("price must not be negative"));
    }
    if req.stock < 0 {
        return Err(ApiError::validation("stock must not be negative"));
    }
    let slug = slug::slugify(req.name.trim());
    if slug.is_empty() {
        return Err(ApiError::validation("product name must contain letters or digits"));
    }
    Ok(slug)
}

fn fields<'a>(req: &'a CreateProduct, slug: &'a str) -> ProductFields<'a> {
    ProductFields {
        name: req.name.trim(),
        slug,
        description: &req.description,
        price: req.price,
        image_url: &req.image_url,
        stock: req.stock,
        category_id: req.category,
    }
}

fn require_category(state: &AppStateInner, category_id: i64) -> Result<(), ApiError> {
    match state.db.get_category_by_id(category_id)? {
        Some(_) => Ok(()),
        None => Err(ApiError::not_found("category not found")),
    }
}

/// Inactive products are treated as missing.
pub(crate) fn require_active_product(state: &AppStateInner, slug: &str) -> Result<Product, ApiError> {
    state
        .db
        .get_product_by_slug(slug)?
        .filter(|p| p.is_active)
        .ok_or_else(|| ApiError::not_found("product not found"))
}

fn check(principal: &Principal, action: ProductAction, supplier_id: Option<i64>) -> Result<(), ApiError> {
    authz::authorize_product(principal, action, supplier_id).map_err(|denied| {
        warn!(user_id = principal.user_id, ?action, ?supplier_id, "product change denied");
        denied.into()
    })
}
