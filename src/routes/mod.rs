/// Router Module Index
///
/// Routes are split by access level. Each module returns a `Router<AppState>` that
/// `create_router` merges, attaching the matching middleware to the protected groups.

/// Routes open to anonymous clients: health, account creation/login, catalog listing.
pub mod public;

/// Routes behind the `AuthUser` extractor middleware.
pub mod authenticated;

/// Catalog mutations, restricted to the `admin` role.
pub mod admin;
