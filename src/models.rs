use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Roles ---

/// Role
///
/// The RBAC field stored on every user row as lowercase text. New accounts default to `User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            _ => Err(UnknownRole(value)),
        }
    }
}

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Canonical identity record from the `users` table. The password hash is loaded for
/// login verification but never serialized.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// NewUser
///
/// Insert payload for the `users` table. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Product
///
/// A catalog row from the `products` table. `price` is NUMERIC(10,2) and serializes as a
/// decimal string (e.g. "99.99") so no precision is lost in transit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[ts(type = "string")]
    #[schema(value_type = String, example = "99.99")]
    pub price: Decimal,
    pub description: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// WishlistEntry
///
/// One membership row in the `wishlists` table. The pair is the primary key; a user holds a
/// given product at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WishlistEntry {
    pub user_id: Uuid,
    pub product_id: i64,
}

// --- Validated Payloads ---

/// ProductInput
///
/// A fully validated create payload. Only produced by `validation::validate_product`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductInput {
    pub name: String,
    pub price: Decimal,
    pub description: Option<String>,
}

/// ProductChanges
///
/// A validated partial update. `None` means the field was absent and stays untouched;
/// `description: Some(None)` clears the stored description.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub description: Option<Option<String>>,
}

impl ProductChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.price.is_none() && self.description.is_none()
    }

    /// Applies the present fields onto a stored product.
    pub fn apply_to(self, product: &mut Product) {
        if let Some(name) = self.name {
            product.name = name;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(description) = self.description {
            product.description = description;
        }
    }
}

// --- Request Payloads (Documentation Schemas) ---

// Handlers accept raw JSON objects so the validator can tell "missing" from "wrong type";
// these structs describe the accepted shapes for the OpenAPI document.

/// CreateProductRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateProductRequest {
    #[schema(example = "Mechanical Keyboard")]
    pub name: String,
    #[ts(type = "number | string")]
    #[schema(value_type = f64, example = 149.99)]
    pub price: Decimal,
    pub description: Option<String>,
}

/// UpdateProductRequest
///
/// Partial update: absent fields are left as stored.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProductRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "number | string | null")]
    #[schema(value_type = Option<f64>)]
    pub price: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// AddToWishlistRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AddToWishlistRequest {
    pub product_id: i64,
}

/// RegisterUserRequest
///
/// The password is hashed before it reaches the repository and is never logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// --- Output Schemas ---

/// UserProfile
///
/// Public view of a user (GET /me and the auth responses).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

/// AuthResponse
///
/// Issued on register and login. `token` goes into `Authorization: Bearer <token>`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub user: UserProfile,
    pub token: String,
    pub token_type: String,
}
