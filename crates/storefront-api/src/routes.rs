use axum::{
    Router, middleware,
    routing::{delete, get, patch, post, put},
};

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{auth, categories, products, reviews};

/// All REST routes. Reads are public; every mutation sits behind `require_auth`.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/token", post(auth::login))
        .route("/categories", get(categories::list_categories))
        .route("/products", get(products::all_products))
        .route("/products/{slug}", get(products::products_by_category))
        .route("/products/detail/{slug}", get(products::product_detail))
        .route("/reviews", get(reviews::all_reviews))
        .route("/reviews/{slug}", get(reviews::product_reviews))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/permissions/{user_id}", patch(auth::update_permissions))
        .route("/categories", post(categories::create_category))
        .route("/categories/{category_id}", put(categories::update_category))
        .route("/products", post(products::create_product))
        .route(
            "/products/{slug}",
            put(products::update_product).delete(products::delete_product),
        )
        .route("/reviews", post(reviews::add_review))
        .route("/reviews/{slug}", delete(reviews::delete_reviews))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}
