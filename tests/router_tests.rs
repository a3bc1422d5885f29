mod common;

use axum::http::{Method, StatusCode};
use common::{InMemoryRepository, send, test_router, token_for};
use serde_json::json;
use std::sync::atomic::Ordering;
use shop_wishlist::{
    error::FORBIDDEN_MESSAGE,
    models::Role,
    validation::{NOT_IN_WISHLIST_MESSAGE, PRICE_NEGATIVE, PRICE_NUMERIC},
};

#[tokio::test]
async fn test_health_and_docs_are_public() {
    let repo = InMemoryRepository::new();
    let (app, _) = test_router(&repo);

    let (status, _) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, doc) = send(&app, Method::GET, "/api-docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"].get("/wishlist").is_some());
}

#[tokio::test]
async fn test_product_listing_is_public() {
    let repo = InMemoryRepository::new();
    repo.seed_product("Lamp", "99.99");
    let (app, _) = test_router(&repo);

    let (status, body) = send(&app, Method::GET, "/products", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"][0]["name"], json!("Lamp"));
    assert_eq!(body["data"][0]["price"], json!("99.99"));
}

#[tokio::test]
async fn test_single_product_requires_authentication() {
    let repo = InMemoryRepository::new();
    let user = repo.seed_user(Role::User);
    let product = repo.seed_product("Lamp", "10.00");
    let (app, state) = test_router(&repo);
    let uri = format!("/products/{}", product.id);

    let (status, body) = send(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));

    let token = token_for(&state, &user);
    let (status, body) = send(&app, Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], json!(product.id));

    let (status, body) = send(&app, Method::GET, "/products/9999", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], json!("Product not found."));
}

#[tokio::test]
async fn test_wishlist_requires_authentication_for_every_method() {
    let repo = InMemoryRepository::new();
    let user = repo.seed_user(Role::User);
    let product = repo.seed_product("Lamp", "10.00");
    repo.seed_wishlist(user.id, product.id);
    let (app, _) = test_router(&repo);

    let requests = [
        (Method::GET, "/wishlist".to_string(), None),
        (Method::POST, "/wishlist".to_string(), Some(json!({"product_id": product.id}))),
        (Method::DELETE, format!("/wishlist/{}", product.id), None),
    ];

    for (method, uri, body) in requests {
        let (status, response) = send(&app, method, &uri, Some("garbage-token"), body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(response["message"], json!("Unauthenticated."));
    }
    assert_eq!(repo.wishlist_rows().len(), 1);
}

#[tokio::test]
async fn test_product_mutations_gate_on_admin_role() {
    let repo = InMemoryRepository::new();
    let user = repo.seed_user(Role::User);
    let product = repo.seed_product("Lamp", "10.00");
    let (app, state) = test_router(&repo);
    let token = token_for(&state, &user);
    let item = format!("/products/{}", product.id);

    let requests = [
        (Method::POST, "/products", Some(json!({"name": "X", "price": 1}))),
        (Method::PUT, item.as_str(), Some(json!({"price": 2}))),
        (Method::PATCH, item.as_str(), Some(json!({"price": 3}))),
        (Method::DELETE, item.as_str(), None),
    ];

    for (method, uri, body) in requests {
        let (status, response) = send(&app, method.clone(), uri, Some(&token), body.clone()).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri}");
        assert_eq!(response["message"], json!(FORBIDDEN_MESSAGE));

        let (status, _) = send(&app, method, uri, None, body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    assert_eq!(repo.products(), vec![product]);
}

#[tokio::test]
async fn test_admin_product_lifecycle() {
    let repo = InMemoryRepository::new();
    let admin = repo.seed_user(Role::Admin);
    let (app, state) = test_router(&repo);
    let token = token_for(&state, &admin);

    let (status, body) = send(
        &app,
        Method::POST,
        "/products",
        Some(&token),
        Some(json!({"name": "Chair", "price": 49, "description": "Oak"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], json!("Product created successfully"));
    assert_eq!(body["data"]["price"], json!("49.00"));
    let id = body["data"]["id"].as_i64().unwrap();
    let item = format!("/products/{id}");

    let (status, body) = send(&app, Method::PATCH, &item, Some(&token), Some(json!({"price": "39.5"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Product updated successfully"));
    assert_eq!(body["data"]["name"], json!("Chair"));
    assert_eq!(body["data"]["price"], json!("39.50"));
    assert_eq!(body["data"]["description"], json!("Oak"));

    let (status, body) = send(&app, Method::PUT, &item, Some(&token), Some(json!({"name": "Armchair"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], json!("Armchair"));
    assert_eq!(body["data"]["price"], json!("39.50"));

    let (status, body) = send(&app, Method::DELETE, &item, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Product deleted successfully"));
    assert!(body.get("data").is_none());

    let (status, _) = send(&app, Method::DELETE, &item, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_validation_envelope() {
    let repo = InMemoryRepository::new();
    let admin = repo.seed_user(Role::Admin);
    let (app, state) = test_router(&repo);
    let token = token_for(&state, &admin);

    let (status, body) = send(
        &app,
        Method::POST,
        "/products",
        Some(&token),
        Some(json!({"name": "Chair", "price": -0.01})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("Validation failed."));
    assert_eq!(body["errors"]["price"], json!([PRICE_NEGATIVE]));
    assert!(body["errors"].get("name").is_none());

    let (_, body) = send(
        &app,
        Method::POST,
        "/products",
        Some(&token),
        Some(json!({"name": "Chair", "price": "abc"})),
    )
    .await;
    assert_eq!(body["errors"]["price"], json!([PRICE_NUMERIC]));
    assert!(repo.products().is_empty());
}

#[tokio::test]
async fn test_missing_body_is_validated_as_empty() {
    let repo = InMemoryRepository::new();
    let user = repo.seed_user(Role::User);
    let (app, state) = test_router(&repo);
    let token = token_for(&state, &user);

    let (status, body) = send(&app, Method::POST, "/wishlist", Some(&token), None).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["product_id"], json!(["Product ID is required."]));
}

#[tokio::test]
async fn test_wishlist_flow_through_router() {
    let repo = InMemoryRepository::new();
    let user = repo.seed_user(Role::User);
    let product = repo.seed_product("Lamp", "10.00");
    let (app, state) = test_router(&repo);
    let token = token_for(&state, &user);
    let add = Some(json!({"product_id": product.id}));

    let (status, body) = send(&app, Method::POST, "/wishlist", Some(&token), add.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], json!("Product added to wishlist successfully"));
    assert_eq!(body["data"]["id"], json!(product.id));

    let (status, body) = send(&app, Method::POST, "/wishlist", Some(&token), add).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["product_id"], json!([NOT_IN_WISHLIST_MESSAGE]));
    assert_eq!(repo.wishlist_rows().len(), 1);

    let (status, body) = send(&app, Method::GET, "/wishlist", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let uri = format!("/wishlist/{}", product.id);
    let (status, body) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Product removed from wishlist successfully"));

    let (status, body) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], json!("Product is not in your wishlist"));
    assert!(repo.wishlist_rows().is_empty());
}

#[tokio::test]
async fn test_register_login_logout_flow() {
    let repo = InMemoryRepository::new();
    let (app, _) = test_router(&repo);

    let (status, body) = send(
        &app,
        Method::POST,
        "/register",
        None,
        Some(json!({"name": "Ada", "email": "Ada@Example.com", "password": "correct horse"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["user"]["email"], json!("ada@example.com"));
    assert_eq!(body["data"]["user"]["role"], json!("user"));
    assert!(body["data"]["user"].get("password_hash").is_none());

    let (status, body) = send(
        &app,
        Method::POST,
        "/register",
        None,
        Some(json!({"name": "Ada", "email": "ada@example.com", "password": "correct horse"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["email"], json!(["The email has already been taken."]));

    let (status, body) = send(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({"email": "ada@example.com", "password": "wrong password"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], json!("Invalid credentials."));

    let (status, body) = send(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({"email": "ADA@example.com", "password": "correct horse"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::GET, "/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], json!("Ada"));

    let (status, _) = send(&app, Method::POST, "/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::GET, "/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    let repo = InMemoryRepository::new();
    let (app, _) = test_router(&repo);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}


#[tokio::test]
async fn test_non_numeric_ids_are_not_found_in_envelope() {
    let repo = InMemoryRepository::new();
    let user = repo.seed_user(Role::User);
    let admin = repo.seed_user(Role::Admin);
    let (app, state) = test_router(&repo);
    let user_token = token_for(&state, &user);
    let admin_token = token_for(&state, &admin);

    let requests = [
        (Method::GET, "/products/abc", user_token.as_str(), None),
        (Method::DELETE, "/wishlist/abc", user_token.as_str(), None),
        (Method::DELETE, "/products/abc", admin_token.as_str(), None),
        (
            Method::PUT,
            "/products/99999999999999999999",
            admin_token.as_str(),
            Some(json!({"name": "Overflow"})),
        ),
    ];

    for (method, uri, token, body) in requests {
        let (status, response) = send(&app, method.clone(), uri, Some(token), body).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
        assert_eq!(response["success"], json!(false));
        assert_eq!(response["message"], json!("Product not found."));
    }
}

#[tokio::test]
async fn test_non_numeric_id_still_gated_for_non_admin() {
    let repo = InMemoryRepository::new();
    let user = repo.seed_user(Role::User);
    let (app, state) = test_router(&repo);
    let token = token_for(&state, &user);

    let (status, _) = send(&app, Method::DELETE, "/products/abc", Some(&token), None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_principal_is_resolved_once_per_request() {
    let repo = InMemoryRepository::new();
    let admin = repo.seed_user(Role::Admin);
    let user = repo.seed_user(Role::User);
    let product = repo.seed_product("Lamp", "10.00");
    let (app, state) = test_router(&repo);

    let admin_token = token_for(&state, &admin);
    let uri = format!("/products/{}", product.id);
    let (status, _) = send(&app, Method::PATCH, &uri, Some(&admin_token), Some(json!({"price": 12}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(repo.user_lookups.load(Ordering::SeqCst), 1);

    repo.user_lookups.store(0, Ordering::SeqCst);
    let user_token = token_for(&state, &user);
    let (status, _) = send(&app, Method::GET, "/wishlist", Some(&user_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(repo.user_lookups.load(Ordering::SeqCst), 1);
}
