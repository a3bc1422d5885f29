use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Authenticated Router Module
///
/// Routes for any signed-in principal. The router is wrapped in `auth_middleware`, and
/// every handler also takes `AuthUser` so the wishlist rules always act on the caller's
/// own id, never one supplied in the body.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /logout
        // Revokes the presented token until its natural expiry.
        .route("/logout", post(handlers::logout))
        // GET /me
        .route("/me", get(handlers::get_me))
        // GET /products/{id}
        .route("/products/{id}", get(handlers::show_product))
        // GET/POST /wishlist
        // POST validates product_id: required, integer, existing, not already held.
        .route(
            "/wishlist",
            get(handlers::get_wishlist).post(handlers::add_to_wishlist),
        )
        // DELETE /wishlist/{product_id}
        // 404 when the product is missing or not in the caller's wishlist.
        .route(
            "/wishlist/{product_id}",
            delete(handlers::remove_from_wishlist),
        )
}
