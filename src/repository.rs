use crate::models::{NewUser, Product, ProductChanges, ProductInput, User, WishlistEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// RepositoryError
///
/// Storage failures the handlers need to tell apart. Constraint violations are surfaced
/// as their own variants so a racing duplicate insert can be reported with the same shape
/// as the validation-time check instead of a generic 500.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A unique constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A foreign key pointed at a row that no longer exists.
    #[error("missing reference: {0}")]
    MissingReference(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// The storage contract for users, products and wishlist membership. Handlers and the
/// validator only ever see `Arc<dyn Repository>`, so tests swap in an in-memory store.
///
/// Implementations MUST reject a second `add_to_wishlist` for the same (user, product) pair
/// with `RepositoryError::Conflict`, independent of any check done before the insert.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users / Auth ---
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    // Conflict if the email is taken.
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    // Records a logged-out token id until its natural expiry.
    async fn revoke_token(&self, jti: Uuid, user_id: Uuid, expires_at: DateTime<Utc>) -> RepoResult<()>;
    async fn is_token_revoked(&self, jti: Uuid) -> RepoResult<bool>;

    // --- Products ---
    async fn list_products(&self) -> RepoResult<Vec<Product>>;
    async fn get_product(&self, id: i64) -> RepoResult<Option<Product>>;
    async fn product_exists(&self, id: i64) -> RepoResult<bool>;
    async fn create_product(&self, input: ProductInput) -> RepoResult<Product>;
    // Only the present fields of `changes` are written. None if the product is missing.
    async fn update_product(&self, id: i64, changes: ProductChanges) -> RepoResult<Option<Product>>;
    async fn delete_product(&self, id: i64) -> RepoResult<bool>;

    // --- Wishlist Membership ---
    async fn list_wishlist(&self, user_id: Uuid) -> RepoResult<Vec<Product>>;
    // Scoped to entry.user_id only.
    async fn wishlist_contains(&self, entry: WishlistEntry) -> RepoResult<bool>;
    async fn add_to_wishlist(&self, entry: WishlistEntry) -> RepoResult<()>;
    // True if a row was removed.
    async fn remove_from_wishlist(&self, entry: WishlistEntry) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL (schema in `migrations/`).
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PRODUCT_COLUMNS: &str = "id, name, price, description, created_at, updated_at";
const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at";

/// Maps constraint violations onto the dedicated error variants.
fn classify(err: sqlx::Error, what: &str) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            RepositoryError::Conflict(what.to_owned())
        }
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            RepositoryError::MissingReference(what.to_owned())
        }
        _ => RepositoryError::Database(err),
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// get_user_by_email
    ///
    /// Emails are compared case-insensitively; they are stored lowercased on insert.
    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = LOWER($1)");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let sql = format!(
            "INSERT INTO users (id, name, email, password_hash, role) \
             VALUES ($1, $2, LOWER($3), $4, $5) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify(e, "email already exists"))
    }

    /// revoke_token
    ///
    /// Also sweeps entries whose tokens have expired anyway, keeping the table bounded.
    async fn revoke_token(&self, jti: Uuid, user_id: Uuid, expires_at: DateTime<Utc>) -> RepoResult<()> {
        sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "INSERT INTO revoked_tokens (jti, user_id, expires_at) VALUES ($1, $2, $3) \
             ON CONFLICT (jti) DO NOTHING",
        )
        .bind(jti)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_token_revoked(&self, jti: Uuid) -> RepoResult<bool> {
        let revoked: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM revoked_tokens WHERE jti = $1)")
                .bind(jti)
                .fetch_one(&self.pool)
                .await?;
        Ok(revoked)
    }

    async fn list_products(&self) -> RepoResult<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id");
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    async fn get_product(&self, id: i64) -> RepoResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    async fn product_exists(&self, id: i64) -> RepoResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn create_product(&self, input: ProductInput) -> RepoResult<Product> {
        let sql = format!(
            "INSERT INTO products (name, price, description) VALUES ($1, $2, $3) \
             RETURNING {PRODUCT_COLUMNS}"
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(&input.name)
            .bind(input.price)
            .bind(&input.description)
            .fetch_one(&self.pool)
            .await?;
        Ok(product)
    }

    /// update_product
    ///
    /// COALESCE keeps stored values for absent fields. Description needs an explicit flag
    /// because "absent" and "set to null" are different requests.
    async fn update_product(&self, id: i64, changes: ProductChanges) -> RepoResult<Option<Product>> {
        let (set_description, description) = match changes.description {
            Some(description) => (true, description),
            None => (false, None),
        };
        let sql = format!(
            r#"
            UPDATE products
            SET name = COALESCE($2, name),
                price = COALESCE($3, price),
                description = CASE WHEN $4 THEN $5 ELSE description END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .bind(changes.name)
            .bind(changes.price)
            .bind(set_description)
            .bind(description)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// delete_product
    ///
    /// Wishlist rows referencing the product go with it (ON DELETE CASCADE).
    async fn delete_product(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_wishlist(&self, user_id: Uuid) -> RepoResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT p.id, p.name, p.price, p.description, p.created_at, p.updated_at
            FROM wishlists w
            JOIN products p ON p.id = w.product_id
            WHERE w.user_id = $1
            ORDER BY w.created_at, p.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    async fn wishlist_contains(&self, entry: WishlistEntry) -> RepoResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM wishlists WHERE user_id = $1 AND product_id = $2)",
        )
        .bind(entry.user_id)
        .bind(entry.product_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// add_to_wishlist
    ///
    /// Plain INSERT with no ON CONFLICT clause: the (user_id, product_id) primary key is the
    /// backstop for two concurrent adds that both passed validation.
    async fn add_to_wishlist(&self, entry: WishlistEntry) -> RepoResult<()> {
        sqlx::query("INSERT INTO wishlists (user_id, product_id) VALUES ($1, $2)")
            .bind(entry.user_id)
            .bind(entry.product_id)
            .execute(&self.pool)
            .await
            .map_err(|e| classify(e, "wishlist entry"))?;
        Ok(())
    }

    async fn remove_from_wishlist(&self, entry: WishlistEntry) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM wishlists WHERE user_id = $1 AND product_id = $2")
            .bind(entry.user_id)
            .bind(entry.product_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
