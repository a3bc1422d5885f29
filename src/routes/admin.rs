use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{post, put},
};

/// Admin Router Module
///
/// Catalog mutations. `create_router` wraps this router in `admin_middleware`, which
/// authenticates and then requires `role = admin` before the body is even read; the
/// handlers repeat the role check so they stay safe when mounted elsewhere (tests).
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /products
        .route("/products", post(handlers::create_product))
        // PUT/PATCH/DELETE /products/{id}
        // PUT and PATCH share the partial-update semantics.
        .route(
            "/products/{id}",
            put(handlers::update_product)
                .patch(handlers::update_product)
                .delete(handlers::delete_product),
        )
}
