use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::Role,
    repository::RepositoryState,
};

/// Claims
///
/// Payload of the bearer tokens issued by `/register` and `/login`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's UUID. The role is always re-read from the database.
    pub sub: Uuid,
    /// Expiration time (seconds since epoch). Always validated.
    pub exp: usize,
    /// Issued at.
    pub iat: usize,
    /// Token id, recorded on logout so the token stops working before `exp`.
    pub jti: Uuid,
}

/// TokenSession
///
/// The token a request authenticated with. Absent for the local `x-user-id` bypass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSession {
    pub jti: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// AuthUser
///
/// The resolved principal of an authenticated request: who is acting and with which role.
/// Handlers and the wishlist membership rule receive it explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
    pub session: Option<TokenSession>,
}

impl AuthUser {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self {
            id,
            role,
            session: None,
        }
    }
}

/// AuthUser Extractor Implementation
///
/// Makes `AuthUser` usable as a handler argument. Resolution order:
/// 0. A principal already resolved by the route middleware (request extensions).
/// 1. Local bypass: in `Env::Local`, an `x-user-id` header naming an existing user.
/// 2. Bearer token extraction from the `Authorization` header.
/// 3. JWT decode (HS256, expiry enforced).
/// 4. Revocation check against logged-out token ids.
/// 5. DB lookup, so deleted users and role changes take effect immediately.
///
/// Rejection: `ApiError::Unauthenticated` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(resolved) = parts.extensions.get::<AuthUser>() {
            return Ok(resolved.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|id_str| Uuid::parse_str(id_str).ok());

            if let Some(user_id) = bypass_id {
                if let Some(user) = repo.get_user(user_id).await? {
                    return Ok(AuthUser::new(user.id, user.role));
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthenticated)?;

        let claims = decode_token(&config, token)?;

        if repo.is_token_revoked(claims.jti).await? {
            tracing::debug!(jti = %claims.jti, "rejected revoked token");
            return Err(ApiError::Unauthenticated);
        }

        let user = repo
            .get_user(claims.sub)
            .await?
            .ok_or(ApiError::Unauthenticated)?;

        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp as i64, 0)
            .ok_or(ApiError::Unauthenticated)?;

        Ok(AuthUser {
            id: user.id,
            role: user.role,
            session: Some(TokenSession {
                jti: claims.jti,
                expires_at,
            }),
        })
    }
}

// --- Tokens ---

/// issue_token
///
/// Signs a fresh HS256 token for `user_id`, valid for `config.jwt_ttl_seconds`.
pub fn issue_token(config: &AppConfig, user_id: Uuid) -> Result<String, ApiError> {
    let now = Utc::now().timestamp().max(0) as usize;
    let claims = Claims {
        sub: user_id,
        iat: now,
        exp: now + config.jwt_ttl_seconds as usize,
        jti: Uuid::new_v4(),
    };
    let key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
    encode(&Header::default(), &claims, &key).map_err(|e| {
        tracing::error!(error = %e, "failed to sign token");
        ApiError::Internal
    })
}

pub fn decode_token(config: &AppConfig, token: &str) -> Result<Claims, ApiError> {
    let key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                _ => tracing::debug!(error = %e, "rejected malformed token"),
            }
            ApiError::Unauthenticated
        })
}

// --- Role Guard ---

/// allow
///
/// Pure role predicate. `Role::Admin` requires an admin principal; `Role::User` admits
/// any authenticated principal.
pub fn allow(principal: &AuthUser, required: Role) -> bool {
    match required {
        Role::Admin => principal.role == Role::Admin,
        Role::User => true,
    }
}

/// require_role
///
/// `allow` as a gate: handlers call it before touching the payload or the repository.
pub fn require_role(principal: &AuthUser, required: Role) -> Result<(), ApiError> {
    if allow(principal, required) {
        Ok(())
    } else {
        tracing::info!(user_id = %principal.id, required = required.as_str(), "role check failed");
        Err(ApiError::Forbidden)
    }
}

// --- Passwords ---

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            tracing::error!(error = %e, "password hashing failed");
            ApiError::Internal
        })
}

/// Verify a password against a stored PHC hash string.
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}
