#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use shop_wishlist::{
    AppState,
    auth::{self, AuthUser},
    config::AppConfig,
    create_router,
    error::ApiError,
    models::{NewUser, Product, ProductChanges, ProductInput, Role, User, WishlistEntry},
    repository::{RepoResult, Repository, RepositoryError, RepositoryState},
};
use std::{
    collections::{BTreeMap, HashMap},
    str::FromStr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use tower::ServiceExt;
use uuid::Uuid;

// --- IN-MEMORY REPOSITORY ---

// Mirrors the Postgres schema rules: unique emails, one row per (user, product) pair,
// foreign keys on wishlist rows, cascading delete from products.
#[derive(Default)]
struct Store {
    users: HashMap<Uuid, User>,
    products: BTreeMap<i64, Product>,
    next_product_id: i64,
    wishlists: Vec<WishlistEntry>,
    revoked: HashMap<Uuid, DateTime<Utc>>,
}

#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
    // When set, membership reads always miss, as if a concurrent request inserted the row
    // after validation ran.
    pub stale_membership_reads: AtomicBool,
    // When set, existence reads always hit, as if the product was deleted after validation.
    pub stale_product_reads: AtomicBool,
    // Number of `get_user` calls, i.e. principal resolutions that reached storage.
    pub user_lookups: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed_user(&self, role: Role) -> User {
        let id = Uuid::new_v4();
        let user = User {
            id,
            name: format!("{} {}", role.as_str(), &id.to_string()[..8]),
            email: format!("{}@example.test", id),
            password_hash: "not-a-real-hash".to_string(),
            role,
            created_at: Utc::now(),
        };
        self.store.lock().unwrap().users.insert(id, user.clone());
        user
    }

    pub fn seed_product(&self, name: &str, price: &str) -> Product {
        let mut store = self.store.lock().unwrap();
        store.next_product_id += 1;
        let now = Utc::now();
        let mut price = Decimal::from_str(price).unwrap();
        price.rescale(2);
        let product = Product {
            id: store.next_product_id,
            name: name.to_string(),
            price,
            description: None,
            created_at: now,
            updated_at: now,
        };
        store.products.insert(product.id, product.clone());
        product
    }

    pub fn seed_wishlist(&self, user_id: Uuid, product_id: i64) {
        self.store
            .lock()
            .unwrap()
            .wishlists
            .push(WishlistEntry { user_id, product_id });
    }

    pub fn products(&self) -> Vec<Product> {
        self.store.lock().unwrap().products.values().cloned().collect()
    }

    pub fn product(&self, id: i64) -> Option<Product> {
        self.store.lock().unwrap().products.get(&id).cloned()
    }

    pub fn wishlist_rows(&self) -> Vec<WishlistEntry> {
        self.store.lock().unwrap().wishlists.clone()
    }

    pub fn holds(&self, user_id: Uuid, product_id: i64) -> bool {
        self.wishlist_rows()
            .contains(&WishlistEntry { user_id, product_id })
    }

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        self.store
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        self.user_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.store.lock().unwrap().users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let email = email.to_lowercase();
        Ok(self
            .store
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.email.to_lowercase() == email)
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut store = self.store.lock().unwrap();
        let email = user.email.to_lowercase();
        if store.users.values().any(|u| u.email.to_lowercase() == email) {
            return Err(RepositoryError::Conflict("users_email_key".to_string()));
        }
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Utc::now(),
        };
        store.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn revoke_token(&self, jti: Uuid, _user_id: Uuid, expires_at: DateTime<Utc>) -> RepoResult<()> {
        self.store.lock().unwrap().revoked.insert(jti, expires_at);
        Ok(())
    }

    async fn is_token_revoked(&self, jti: Uuid) -> RepoResult<bool> {
        Ok(self.store.lock().unwrap().revoked.contains_key(&jti))
    }

    async fn list_products(&self) -> RepoResult<Vec<Product>> {
        Ok(self.products())
    }

    async fn get_product(&self, id: i64) -> RepoResult<Option<Product>> {
        Ok(self.product(id))
    }

    async fn product_exists(&self, id: i64) -> RepoResult<bool> {
        if self.stale_product_reads.load(Ordering::SeqCst) {
            return Ok(true);
        }
        Ok(self.store.lock().unwrap().products.contains_key(&id))
    }

    async fn create_product(&self, input: ProductInput) -> RepoResult<Product> {
        let mut store = self.store.lock().unwrap();
        store.next_product_id += 1;
        let now = Utc::now();
        let product = Product {
            id: store.next_product_id,
            name: input.name,
            price: input.price,
            description: input.description,
            created_at: now,
            updated_at: now,
        };
        store.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(&self, id: i64, changes: ProductChanges) -> RepoResult<Option<Product>> {
        let mut store = self.store.lock().unwrap();
        Ok(store.products.get_mut(&id).map(|product| {
            if !changes.is_empty() {
                changes.apply_to(product);
                product.updated_at = Utc::now();
            }
            product.clone()
        }))
    }

    async fn delete_product(&self, id: i64) -> RepoResult<bool> {
        let mut store = self.store.lock().unwrap();
        let removed = store.products.remove(&id).is_some();
        store.wishlists.retain(|entry| entry.product_id != id);
        Ok(removed)
    }

    async fn list_wishlist(&self, user_id: Uuid) -> RepoResult<Vec<Product>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .wishlists
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .filter_map(|entry| store.products.get(&entry.product_id).cloned())
            .collect())
    }

    async fn wishlist_contains(&self, entry: WishlistEntry) -> RepoResult<bool> {
        if self.stale_membership_reads.load(Ordering::SeqCst) {
            return Ok(false);
        }
        Ok(self.store.lock().unwrap().wishlists.contains(&entry))
    }

    async fn add_to_wishlist(&self, entry: WishlistEntry) -> RepoResult<()> {
        let mut store = self.store.lock().unwrap();
        if !store.users.contains_key(&entry.user_id) || !store.products.contains_key(&entry.product_id) {
            return Err(RepositoryError::MissingReference("wishlists_fkey".to_string()));
        }
        if store.wishlists.contains(&entry) {
            return Err(RepositoryError::Conflict("wishlists_pkey".to_string()));
        }
        store.wishlists.push(entry);
        Ok(())
    }

    async fn remove_from_wishlist(&self, entry: WishlistEntry) -> RepoResult<bool> {
        let mut store = self.store.lock().unwrap();
        let before = store.wishlists.len();
        store.wishlists.retain(|held| *held != entry);
        Ok(store.wishlists.len() < before)
    }
}

// --- STATE & PRINCIPALS ---

pub fn test_state(repo: &Arc<InMemoryRepository>) -> AppState {
    AppState {
        repo: repo.clone() as RepositoryState,
        config: AppConfig::default(),
    }
}

pub fn principal(user: &User) -> AuthUser {
    AuthUser::new(user.id, user.role)
}

pub fn token_for(state: &AppState, user: &User) -> String {
    auth::issue_token(&state.config, user.id).unwrap()
}

/// Messages recorded for `field`, or empty when the error is not a validation error.
pub fn field_messages(err: &ApiError, field: &str) -> Vec<String> {
    match err {
        ApiError::Validation(errors) => errors.get(field).map(<[String]>::to_vec).unwrap_or_default(),
        _ => vec![],
    }
}

// --- ROUTER DRIVER ---

pub fn test_router(repo: &Arc<InMemoryRepository>) -> (Router, AppState) {
    let state = test_state(repo);
    (create_router(state.clone()), state)
}

/// Sends one request through the full router; returns the status and the JSON body
/// (`Value::Null` for non-JSON bodies).
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}
