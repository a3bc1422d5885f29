use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token. Only the catalog listing exposes product data;
/// single-product reads and everything wishlist-related sit behind authentication.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // Creates a `user`-role account and returns its first token.
        .route("/register", post(handlers::register_user))
        // POST /login
        .route("/login", post(handlers::login))
        // GET /products
        .route("/products", get(handlers::list_products))
}
