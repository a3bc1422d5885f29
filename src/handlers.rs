use crate::{
    AppState,
    auth::{self, AuthUser},
    error::ApiError,
    models::{
        AddToWishlistRequest, AuthResponse, CreateProductRequest, LoginRequest, NewUser, Product,
        RegisterUserRequest, Role, UpdateProductRequest, UserProfile, WishlistEntry,
    },
    repository::RepositoryError,
    response::ApiResponse,
    validation::{
        self, EMAIL_TAKEN, JsonPayload, NOT_IN_WISHLIST_MESSAGE, PRODUCT_ID_EXISTS, ProductId,
    },
};
use axum::extract::State;

pub const PRODUCT_NOT_FOUND: &str = "Product not found.";
pub const NOT_IN_WISHLIST: &str = "Product is not in your wishlist";

pub const PRODUCT_CREATED: &str = "Product created successfully";
pub const PRODUCT_UPDATED: &str = "Product updated successfully";
pub const PRODUCT_DELETED: &str = "Product deleted successfully";
pub const WISHLIST_ADDED: &str = "Product added to wishlist successfully";
pub const WISHLIST_REMOVED: &str = "Product removed from wishlist successfully";
pub const USER_REGISTERED: &str = "User registered successfully";
pub const LOGGED_IN: &str = "Login successful";
pub const LOGGED_OUT: &str = "Logged out successfully";

// --- Products ---

/// list_products
///
/// [Public Route] Lists the whole catalog.
#[utoipa::path(
    get,
    path = "/products",
    responses((status = 200, description = "All products", body = [Product]))
)]
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<Product>>, ApiError> {
    let products = state.repo.list_products().await?;
    Ok(ApiResponse::ok(products))
}

/// show_product
///
/// [Authenticated Route] Retrieves a single product.
#[utoipa::path(
    get,
    path = "/products/{id}",
    params(("id" = i64, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Found", body = Product),
        (status = 401, description = "Unauthenticated"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn show_product(
    _user: AuthUser,
    State(state): State<AppState>,
    ProductId(id): ProductId,
) -> Result<ApiResponse<Product>, ApiError> {
    let product = state
        .repo
        .get_product(id)
        .await?
        .ok_or(ApiError::NotFound(PRODUCT_NOT_FOUND))?;
    Ok(ApiResponse::ok(product))
}

/// create_product
///
/// [Admin Route] Adds a product to the catalog.
///
/// *Order*: role guard, then create-mode validation, then the insert. A forbidden or invalid
/// request never reaches the repository.
#[utoipa::path(
    post,
    path = "/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Created", body = Product),
        (status = 403, description = "Not an admin"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn create_product(
    user: AuthUser,
    State(state): State<AppState>,
    JsonPayload(payload): JsonPayload,
) -> Result<ApiResponse<Product>, ApiError> {
    auth::require_role(&user, Role::Admin)?;
    let input = validation::validate_product_create(&payload)?;

    let product = state.repo.create_product(input).await?;
    tracing::info!(product_id = product.id, admin_id = %user.id, "product created");
    Ok(ApiResponse::created(PRODUCT_CREATED, product))
}

/// update_product
///
/// [Admin Route] Partial update (PUT and PATCH behave the same). Only fields present in the
/// body are validated and written; the rest keep their stored values.
#[utoipa::path(
    put,
    path = "/products/{id}",
    params(("id" = i64, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Updated", body = Product),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn update_product(
    user: AuthUser,
    State(state): State<AppState>,
    ProductId(id): ProductId,
    JsonPayload(payload): JsonPayload,
) -> Result<ApiResponse<Product>, ApiError> {
    auth::require_role(&user, Role::Admin)?;
    let changes = validation::validate_product_update(&payload)?;

    let product = state
        .repo
        .update_product(id, changes)
        .await?
        .ok_or(ApiError::NotFound(PRODUCT_NOT_FOUND))?;
    tracing::info!(product_id = id, admin_id = %user.id, "product updated");
    Ok(ApiResponse::with_message(PRODUCT_UPDATED, product))
}

/// delete_product
///
/// [Admin Route] Removes a product; its wishlist entries cascade with it.
#[utoipa::path(
    delete,
    path = "/products/{id}",
    params(("id" = i64, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_product(
    user: AuthUser,
    State(state): State<AppState>,
    ProductId(id): ProductId,
) -> Result<ApiResponse<()>, ApiError> {
    auth::require_role(&user, Role::Admin)?;

    if !state.repo.delete_product(id).await? {
        return Err(ApiError::NotFound(PRODUCT_NOT_FOUND));
    }
    tracing::info!(product_id = id, admin_id = %user.id, "product deleted");
    Ok(ApiResponse::message(PRODUCT_DELETED))
}

// --- Wishlist ---

/// get_wishlist
///
/// [Authenticated Route] Lists the products in the caller's wishlist.
#[utoipa::path(
    get,
    path = "/wishlist",
    responses(
        (status = 200, description = "My wishlist", body = [Product]),
        (status = 401, description = "Unauthenticated")
    )
)]
pub async fn get_wishlist(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<Product>>, ApiError> {
    let products = state.repo.list_wishlist(id).await?;
    Ok(ApiResponse::ok(products))
}

/// add_to_wishlist
///
/// [Authenticated Route] Adds a product to the caller's wishlist.
///
/// *Uniqueness*: validation checks membership before the insert, and the storage layer
/// rejects a duplicate pair regardless. A duplicate that slips past the first check (two
/// concurrent adds) comes back as `Conflict` and is reported exactly like the validation
/// failure.
#[utoipa::path(
    post,
    path = "/wishlist",
    request_body = AddToWishlistRequest,
    responses(
        (status = 201, description = "Added", body = Product),
        (status = 401, description = "Unauthenticated"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn add_to_wishlist(
    user: AuthUser,
    State(state): State<AppState>,
    JsonPayload(payload): JsonPayload,
) -> Result<ApiResponse<Product>, ApiError> {
    let product_id = validation::validate_wishlist_post(&payload, &user, &*state.repo).await?;

    let entry = WishlistEntry {
        user_id: user.id,
        product_id,
    };
    match state.repo.add_to_wishlist(entry).await {
        Ok(()) => {}
        Err(RepositoryError::Conflict(_)) => {
            tracing::warn!(user_id = %user.id, product_id, "duplicate wishlist insert rejected by storage");
            return Err(ApiError::field("product_id", NOT_IN_WISHLIST_MESSAGE));
        }
        Err(RepositoryError::MissingReference(_)) => {
            return Err(ApiError::field("product_id", PRODUCT_ID_EXISTS));
        }
        Err(e) => return Err(e.into()),
    }
    tracing::info!(user_id = %user.id, product_id, "wishlist entry added");

    let product = state
        .repo
        .get_product(product_id)
        .await?
        .ok_or(ApiError::NotFound(PRODUCT_NOT_FOUND))?;
    Ok(ApiResponse::created(WISHLIST_ADDED, product))
}

/// remove_from_wishlist
///
/// [Authenticated Route] Removes a product from the caller's wishlist. A missing product
/// and a product that is not in the wishlist are both 404s, with different messages.
#[utoipa::path(
    delete,
    path = "/wishlist/{product_id}",
    params(("product_id" = i64, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Removed"),
        (status = 401, description = "Unauthenticated"),
        (status = 404, description = "Product missing or not in the wishlist")
    )
)]
pub async fn remove_from_wishlist(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    ProductId(product_id): ProductId,
) -> Result<ApiResponse<()>, ApiError> {
    if !state.repo.product_exists(product_id).await? {
        return Err(ApiError::NotFound(PRODUCT_NOT_FOUND));
    }

    let entry = WishlistEntry {
        user_id,
        product_id,
    };
    // A concurrent remove can win between the check and the delete; both read as "not held".
    if !state.repo.wishlist_contains(entry).await? || !state.repo.remove_from_wishlist(entry).await? {
        return Err(ApiError::NotFound(NOT_IN_WISHLIST));
    }
    tracing::info!(%user_id, product_id, "wishlist entry removed");
    Ok(ApiResponse::message(WISHLIST_REMOVED))
}

// --- Accounts ---

/// register_user
///
/// [Public Route] Creates a `user`-role account and returns a bearer token for it.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = AuthResponse),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    JsonPayload(payload): JsonPayload,
) -> Result<ApiResponse<AuthResponse>, ApiError> {
    let registration = validation::validate_registration(&payload)?;

    if state
        .repo
        .get_user_by_email(&registration.email)
        .await?
        .is_some()
    {
        return Err(ApiError::field("email", EMAIL_TAKEN));
    }

    let new_user = NewUser {
        name: registration.name,
        email: registration.email,
        password_hash: auth::hash_password(&registration.password)?,
        role: Role::User,
    };
    let user = match state.repo.create_user(new_user).await {
        Ok(user) => user,
        Err(RepositoryError::Conflict(_)) => return Err(ApiError::field("email", EMAIL_TAKEN)),
        Err(e) => return Err(e.into()),
    };
    tracing::info!(user_id = %user.id, "user registered");

    let token = auth::issue_token(&state.config, user.id)?;
    Ok(ApiResponse::created(
        USER_REGISTERED,
        AuthResponse {
            user: user.into(),
            token,
            token_type: "Bearer".to_string(),
        },
    ))
}

/// login
///
/// [Public Route] Exchanges email + password for a bearer token. Unknown email and wrong
/// password are indistinguishable to the caller.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    JsonPayload(payload): JsonPayload,
) -> Result<ApiResponse<AuthResponse>, ApiError> {
    let (email, password) = validation::validate_login(&payload)?;

    let user = state
        .repo
        .get_user_by_email(&email)
        .await?
        .filter(|user| auth::verify_password(&password, &user.password_hash))
        .ok_or_else(|| {
            tracing::info!("login rejected");
            ApiError::InvalidCredentials
        })?;

    let token = auth::issue_token(&state.config, user.id)?;
    Ok(ApiResponse::with_message(
        LOGGED_IN,
        AuthResponse {
            user: user.into(),
            token,
            token_type: "Bearer".to_string(),
        },
    ))
}

/// logout
///
/// [Authenticated Route] Revokes the token used for this request.
#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "Unauthenticated")
    )
)]
pub async fn logout(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<ApiResponse<()>, ApiError> {
    if let Some(session) = user.session {
        state
            .repo
            .revoke_token(session.jti, user.id, session.expires_at)
            .await?;
        tracing::info!(user_id = %user.id, jti = %session.jti, "token revoked");
    }
    Ok(ApiResponse::message(LOGGED_OUT))
}

/// get_me
///
/// [Authenticated Route] The caller's profile.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 401, description = "Unauthenticated")
    )
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let user = state
        .repo
        .get_user(id)
        .await?
        .ok_or(ApiError::Unauthenticated)?;
    Ok(ApiResponse::ok(user.into()))
}
