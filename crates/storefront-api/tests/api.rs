use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::Utc;
use http_body_util::BodyExt;
use jsonwebtoken::Algorithm;
use serde_json::{Value, json};
use tower::ServiceExt;

use storefront_api::{AppState, AppStateInner, AuthConfig, TokenIssuer, router};
use storefront_db::Database;
use storefront_db::models::{NewUser, ProductFields};
use storefront_types::auth::RoleFlags;

const ADMIN: RoleFlags = RoleFlags {
    is_admin: true,
    is_supplier: false,
    is_customer: false,
};
const SUPPLIER: RoleFlags = RoleFlags {
    is_admin: false,
    is_supplier: true,
    is_customer: false,
};
const CUSTOMER: RoleFlags = RoleFlags::CUSTOMER;
const NOBODY: RoleFlags = RoleFlags {
    is_admin: false,
    is_supplier: false,
    is_customer: false,
};

fn setup() -> (Router, AppState) {
    let db = Database::open_in_memory().unwrap();
    let issuer = TokenIssuer::new(AuthConfig {
        secret: "test-secret".into(),
        algorithm: Algorithm::HS256,
        token_lifetime: chrono::Duration::minutes(20),
    });
    let state = AppStateInner::new(db, issuer);
    (router(state.clone()), state)
}

fn seed_user(state: &AppState, username: &str, roles: RoleFlags) -> i64 {
    state
        .db
        .create_user(&NewUser {
            first_name: "Test",
            last_name: "User",
            username,
            email: &format!("{username}@example.com"),
            password_hash: "unused",
            roles,
        })
        .unwrap()
}

/// Users with ids 1..=count, all customers unless re-roled later.
fn seed_users(state: &AppState, count: i64) {
    for i in 1..=count {
        assert_eq!(seed_user(state, &format!("user{i}"), CUSTOMER), i);
    }
}

fn seed_product(state: &AppState, name: &str, category_id: i64, supplier_id: Option<i64>) -> i64 {
    let slug = slug::slugify(name);
    state
        .db
        .insert_product(
            &ProductFields {
                name,
                slug: &slug,
                description: "a thing",
                price: 1_000,
                image_url: "http://img/x.png",
                stock: 5,
                category_id,
            },
            supplier_id,
        )
        .unwrap()
}

fn token(state: &AppState, user_id: i64, roles: RoleFlags) -> String {
    state
        .issuer
        .access_token(&format!("user{user_id}"), user_id, roles)
        .unwrap()
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn product_body(name: &str, category: i64) -> Value {
    json!({
        "name": name,
        "description": "updated",
        "price": 1_500,
        "image_url": "http://img/y.png",
        "stock": 3,
        "category": category,
    })
}

#[tokio::test]
async fn supplier_may_only_update_own_products() {
    let (app, state) = setup();
    seed_users(&state, 9);
    let cat = state.db.insert_category("Phones", "phones", None).unwrap();
    seed_product(&state, "Theirs", cat.id, Some(9));
    seed_product(&state, "Mine", cat.id, Some(7));

    let supplier = token(&state, 7, SUPPLIER);

    let (status, _) = send(
        &app,
        Method::PUT,
        "/products/theirs",
        Some(&supplier),
        Some(product_body("Theirs v2", cat.id)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::PUT,
        "/products/mine",
        Some(&supplier),
        Some(product_body("Mine v2", cat.id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // re-slugged from the new name
    let product = state.db.get_product_by_slug("mine-v2").unwrap().unwrap();
    assert_eq!(product.price, 1_500);
    assert_eq!(product.supplier_id, Some(7));
}

#[tokio::test]
async fn admin_may_update_any_product() {
    let (app, state) = setup();
    seed_users(&state, 2);
    let cat = state.db.insert_category("Phones", "phones", None).unwrap();
    seed_product(&state, "Owned", cat.id, Some(2));
    seed_product(&state, "Platform", cat.id, None);

    let admin = token(&state, 1, ADMIN);
    for slug in ["owned", "platform"] {
        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/products/{slug}"),
            Some(&admin),
            Some(product_body(&format!("{slug} edited"), cat.id)),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{slug}");
    }
}

#[tokio::test]
async fn supplier_cannot_delete_platform_product() {
    let (app, state) = setup();
    seed_users(&state, 1);
    let cat = state.db.insert_category("Phones", "phones", None).unwrap();
    seed_product(&state, "Platform", cat.id, None);

    let (status, _) = send(
        &app,
        Method::DELETE,
        "/products/platform",
        Some(&token(&state, 1, SUPPLIER)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deleting_a_product_only_flips_its_flag() {
    let (app, state) = setup();
    seed_users(&state, 3);
    let cat = state.db.insert_category("Phones", "phones", None).unwrap();
    let id = seed_product(&state, "Pixel", cat.id, Some(3));
    let owner = token(&state, 3, SUPPLIER);

    let (status, _) = send(&app, Method::DELETE, "/products/pixel", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::GET, "/products/detail/pixel", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let row = state.db.get_product_by_id(id).unwrap().expect("row still present");
    assert!(!row.is_active);

    // inactive -> inactive is not a silent success
    let (status, _) = send(&app, Method::DELETE, "/products/pixel", Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // nor can a deleted product be edited
    let (status, _) = send(
        &app,
        Method::PUT,
        "/products/pixel",
        Some(&owner),
        Some(product_body("Pixel", cat.id)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn category_browsing_includes_children_but_not_grandchildren() {
    let (app, state) = setup();
    let root = state.db.insert_category("Electronics", "electronics", None).unwrap();
    let child = state.db.insert_category("Phones", "phones", Some(root.id)).unwrap();
    let grandchild = state.db.insert_category("Android", "android", Some(child.id)).unwrap();
    let other = state.db.insert_category("Books", "books", None).unwrap();

    seed_product(&state, "Radio", root.id, None);
    seed_product(&state, "Pixel", child.id, None);
    seed_product(&state, "Galaxy", grandchild.id, None);
    seed_product(&state, "Novel", other.id, None);

    let (status, body) = send(&app, Method::GET, "/products/electronics", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let mut slugs: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["slug"].as_str().unwrap())
        .collect();
    slugs.sort();
    assert_eq!(slugs, vec!["pixel", "radio"]);

    let (status, _) = send(&app, Method::GET, "/products/no-such-category", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_catalog_is_not_found() {
    let (app, _state) = setup();
    let (status, body) = send(&app, Method::GET, "/products", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn product_creation_checks_category_then_role() {
    let (app, state) = setup();
    seed_users(&state, 2);
    let cat = state.db.insert_category("Phones", "phones", None).unwrap();
    let customer = token(&state, 1, CUSTOMER);
    let supplier = token(&state, 2, SUPPLIER);

    let (status, _) = send(
        &app,
        Method::POST,
        "/products",
        Some(&customer),
        Some(product_body("Pixel", cat.id + 100)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::POST,
        "/products",
        Some(&customer),
        Some(product_body("Pixel", cat.id)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::POST,
        "/products",
        Some(&supplier),
        Some(product_body("Pixel", cat.id)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let product = state.db.get_product_by_slug("pixel").unwrap().unwrap();
    assert_eq!(product.supplier_id, Some(2));
    assert_eq!(product.rating, 0.0);

    let (status, _) = send(
        &app,
        Method::POST,
        "/products",
        Some(&supplier),
        Some(product_body("Pixel", cat.id)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn admin_listing_is_platform_owned() {
    let (app, state) = setup();
    seed_users(&state, 1);
    let cat = state.db.insert_category("Phones", "phones", None).unwrap();

    let (status, _) = send(
        &app,
        Method::POST,
        "/products",
        Some(&token(&state, 1, ADMIN)),
        Some(product_body("House Brand", cat.id)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        state.db.get_product_by_slug("house-brand").unwrap().unwrap().supplier_id,
        None
    );
}

#[tokio::test]
async fn invalid_product_payload_is_rejected() {
    let (app, state) = setup();
    seed_users(&state, 1);
    let cat = state.db.insert_category("Phones", "phones", None).unwrap();

    let mut body = product_body("Pixel", cat.id);
    body["price"] = json!(-1);
    let (status, _) = send(
        &app,
        Method::POST,
        "/products",
        Some(&token(&state, 1, ADMIN)),
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn mutations_require_a_valid_token() {
    let (app, state) = setup();
    let cat = state.db.insert_category("Phones", "phones", None).unwrap();

    let (status, _) = send(&app, Method::POST, "/products", None, Some(product_body("X", cat.id))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::POST,
        "/products",
        Some("not.a.token"),
        Some(product_body("X", cat.id)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let foreign = TokenIssuer::new(AuthConfig {
        secret: "someone-else".into(),
        algorithm: Algorithm::HS256,
        token_lifetime: chrono::Duration::minutes(20),
    })
    .access_token("admin", 1, ADMIN)
    .unwrap();
    let (status, _) = send(
        &app,
        Method::POST,
        "/products",
        Some(&foreign),
        Some(product_body("X", cat.id)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn denials_are_uniform() {
    let (app, state) = setup();
    seed_users(&state, 3);
    let cat = state.db.insert_category("Phones", "phones", None).unwrap();
    seed_product(&state, "Pixel", cat.id, Some(3));

    let (_, not_owner) = send(
        &app,
        Method::DELETE,
        "/products/pixel",
        Some(&token(&state, 2, SUPPLIER)),
        None,
    )
    .await;
    let (_, no_role) = send(
        &app,
        Method::DELETE,
        "/products/pixel",
        Some(&token(&state, 1, CUSTOMER)),
        None,
    )
    .await;

    assert_eq!(not_owner, no_role);
    assert_eq!(not_owner["error"], "forbidden");
}

#[tokio::test]
async fn reviews_need_some_role_and_a_valid_grade() {
    let (app, state) = setup();
    seed_users(&state, 2);
    let cat = state.db.insert_category("Phones", "phones", None).unwrap();
    let pid = seed_product(&state, "Pixel", cat.id, None);

    let review = json!({ "product_id": pid, "comment": "solid", "grade": 4 });

    let (status, _) = send(
        &app,
        Method::POST,
        "/reviews",
        Some(&token(&state, 1, NOBODY)),
        Some(review.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::POST,
        "/reviews",
        Some(&token(&state, 1, CUSTOMER)),
        Some(json!({ "product_id": pid, "comment": "too good", "grade": 6 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        Method::POST,
        "/reviews",
        Some(&token(&state, 1, CUSTOMER)),
        Some(json!({ "product_id": pid + 50, "comment": "?", "grade": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        Method::POST,
        "/reviews",
        Some(&token(&state, 1, CUSTOMER)),
        Some(review),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user_id"], 1);

    let (status, _) = send(
        &app,
        Method::POST,
        "/reviews",
        Some(&token(&state, 2, SUPPLIER)),
        Some(json!({ "product_id": pid, "comment": "ok", "grade": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, Method::GET, "/reviews/pixel", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let rating = state.db.get_product_by_id(pid).unwrap().unwrap().rating;
    assert!((rating - 3.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn reviews_of_a_deleted_product_are_not_found() {
    let (app, state) = setup();
    seed_users(&state, 2);
    let cat = state.db.insert_category("Phones", "phones", None).unwrap();
    let pid = seed_product(&state, "Pixel", cat.id, None);
    state.db.add_review(1, pid, "before", 4, Utc::now()).unwrap().unwrap();

    let (status, _) = send(
        &app,
        Method::DELETE,
        "/products/pixel",
        Some(&token(&state, 2, ADMIN)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::GET, "/reviews/pixel", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::POST,
        "/reviews",
        Some(&token(&state, 1, CUSTOMER)),
        Some(json!({ "product_id": pid, "comment": "after", "grade": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let reviews = state.db.list_active_reviews().unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].comment, "before");
}

#[tokio::test]
async fn only_admins_may_purge_reviews() {
    let (app, state) = setup();
    seed_users(&state, 7);
    let cat = state.db.insert_category("Phones", "phones", None).unwrap();
    let pid = seed_product(&state, "Pixel", cat.id, Some(7));
    state.db.add_review(1, pid, "nice", 5, Utc::now()).unwrap().unwrap();

    // owning supplier is still refused
    let (status, _) = send(
        &app,
        Method::DELETE,
        "/reviews/pixel",
        Some(&token(&state, 7, SUPPLIER)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = token(&state, 2, ADMIN);
    let (status, _) = send(&app, Method::DELETE, "/reviews/pixel", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, Method::GET, "/reviews", None, None).await;
    assert_eq!(body, json!([]));
    assert_eq!(state.db.get_product_by_id(pid).unwrap().unwrap().rating, 0.0);

    let (status, _) = send(&app, Method::DELETE, "/reviews/pixel", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn register_login_and_me() {
    let (app, _state) = setup();

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "username": "ada",
            "email": "ada@example.com",
            "password": "correct horse",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["token_type"], "bearer");

    let (status, _) = send(
        &app,
        Method::POST,
        "/auth/token",
        None,
        Some(json!({ "username": "ada", "password": "wrong password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/token",
        None,
        Some(json!({ "username": "ada", "password": "correct horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let access = body["access_token"].as_str().unwrap().to_string();

    let (status, me) = send(&app, Method::GET, "/auth/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "ada");
    assert_eq!(me["is_customer"], true);
    assert_eq!(me["is_supplier"], false);
    assert_eq!(me["is_admin"], false);
}

#[tokio::test]
async fn duplicate_username_is_a_conflict() {
    let (app, state) = setup();
    seed_user(&state, "taken", CUSTOMER);

    let (status, _) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "first_name": "A",
            "last_name": "B",
            "username": "taken",
            "email": "new@example.com",
            "password": "long enough",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn role_changes_do_not_touch_issued_tokens() {
    let (app, state) = setup();
    seed_users(&state, 2);
    let admin = token(&state, 1, ADMIN);
    let old = token(&state, 2, CUSTOMER);

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/permissions/2",
        Some(&old),
        Some(json!({ "is_admin": false, "is_supplier": true, "is_customer": true })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/permissions/2",
        Some(&admin),
        Some(json!({ "is_admin": false, "is_supplier": true, "is_customer": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_supplier"], true);
    assert!(body.get("password").is_none());

    let (_, me) = send(&app, Method::GET, "/auth/me", Some(&old), None).await;
    assert_eq!(me["is_supplier"], false);

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/permissions/99",
        Some(&admin),
        Some(json!({ "is_admin": false, "is_supplier": false, "is_customer": false })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn categories_are_admin_managed() {
    let (app, state) = setup();
    seed_users(&state, 2);
    let admin = token(&state, 1, ADMIN);

    let (status, _) = send(
        &app,
        Method::POST,
        "/categories",
        Some(&token(&state, 2, SUPPLIER)),
        Some(json!({ "name": "Garden" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, root) = send(
        &app,
        Method::POST,
        "/categories",
        Some(&admin),
        Some(json!({ "name": "Home & Garden" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(root["slug"], "home-garden");
    let root_id = root["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        Method::POST,
        "/categories",
        Some(&admin),
        Some(json!({ "name": "Tools", "parent_id": root_id + 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, child) = send(
        &app,
        Method::POST,
        "/categories",
        Some(&admin),
        Some(json!({ "name": "Tools", "parent_id": root_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let child_id = child["id"].as_i64().unwrap();

    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/categories/{child_id}"),
        Some(&admin),
        Some(json!({ "name": "Power Tools", "parent_id": root_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["slug"], "power-tools");

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/categories/{child_id}"),
        Some(&admin),
        Some(json!({ "name": "Loop", "parent_id": child_id })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, all) = send(&app, Method::GET, "/categories", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn category_parent_chain_cannot_loop() {
    let (app, state) = setup();
    seed_users(&state, 1);
    let admin = token(&state, 1, ADMIN);
    let root = state.db.insert_category("Home", "home", None).unwrap();
    let child = state.db.insert_category("Kitchen", "kitchen", Some(root.id)).unwrap();
    let grandchild = state.db.insert_category("Knives", "knives", Some(child.id)).unwrap();

    for parent in [child.id, grandchild.id] {
        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/categories/{}", root.id),
            Some(&admin),
            Some(json!({ "name": "Home", "parent_id": parent })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "parent {parent}");
    }
    assert_eq!(state.db.get_category_by_id(root.id).unwrap().unwrap().parent_id, None);

    // moving a leaf under a sibling branch is fine
    let other = state.db.insert_category("Garden", "garden", Some(root.id)).unwrap();
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/categories/{}", grandchild.id),
        Some(&admin),
        Some(json!({ "name": "Knives", "parent_id": other.id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
