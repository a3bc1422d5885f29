use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod response;
pub mod validation;

// Routing segregated by access level (public, authenticated, admin).
pub mod routes;
use auth::AuthUser;
use models::Role;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::ApiError;
pub use repository::{PostgresRepository, Repository, RepositoryError, RepositoryState};

/// ApiDoc
///
/// OpenAPI document aggregated from every `#[utoipa::path]` handler and `ToSchema` model,
/// served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_products, handlers::show_product, handlers::create_product,
        handlers::update_product, handlers::delete_product, handlers::get_wishlist,
        handlers::add_to_wishlist, handlers::remove_from_wishlist, handlers::register_user,
        handlers::login, handlers::logout, handlers::get_me
    ),
    components(
        schemas(
            models::Product, models::Role, models::CreateProductRequest,
            models::UpdateProductRequest, models::AddToWishlistRequest,
            models::RegisterUserRequest, models::LoginRequest, models::UserProfile,
            models::AuthResponse,
        )
    ),
    tags(
        (name = "shop-wishlist", description = "Product catalog and per-user wishlist API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, cloneable state handed to every request: the repository handle and the
/// immutable configuration.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Gate for `authenticated_routes`. Extracting `AuthUser` performs the whole token check;
/// a failure short-circuits with 401 before the handler runs. The resolved principal is
/// stored in the request extensions so the handler's own `AuthUser` does not repeat the
/// revocation check and user lookup.
async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// admin_middleware
///
/// Gate for `admin_routes`: 401 without a valid principal, 403 for any role but admin.
/// Runs before body extraction, so a forbidden caller never reaches validation.
async fn admin_middleware(
    auth_user: AuthUser,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    auth::require_role(&auth_user, Role::Admin)?;
    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

/// create_router
///
/// Assembles the routing tree, scoped middleware, observability layers and state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Same paths as the public/authenticated product routes, different methods.
        .merge(
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                admin_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: every log line of a request carries its method, uri
/// and `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
