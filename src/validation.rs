use std::{collections::BTreeMap, convert::Infallible, str::FromStr};

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};
use validator::ValidateEmail;

use crate::{
    auth::AuthUser,
    error::ApiError,
    handlers::PRODUCT_NOT_FOUND,
    models::{ProductChanges, ProductInput, WishlistEntry},
    repository::{RepoResult, Repository},
};

/// A decoded JSON request body. Non-object bodies are treated as empty.
pub type Payload = Map<String, Value>;

pub fn payload_object(body: Value) -> Payload {
    match body {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

/// JsonPayload
///
/// Body extractor for validated endpoints. A missing, non-JSON or malformed body becomes an
/// empty payload, so the caller gets field errors (422) rather than a bare 400/415.
pub struct JsonPayload(pub Payload);

impl<S> FromRequest<S> for JsonPayload
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<Value>::from_request(req, state).await {
            Ok(Json(body)) => Ok(JsonPayload(payload_object(body))),
            Err(rejection) => {
                tracing::debug!(error = %rejection.body_text(), "unreadable body treated as empty");
                Ok(JsonPayload(Payload::new()))
            }
        }
    }
}

/// ProductId
///
/// Path extractor for `{id}` / `{product_id}` segments. An id that is not an integer (or
/// overflows i64) can never name a stored product, so it is answered like any other
/// unknown id: 404 "Product not found." in the usual envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductId(pub i64);

impl<S> FromRequestParts<S> for ProductId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<i64>::from_request_parts(parts, state).await {
            Ok(Path(id)) => Ok(ProductId(id)),
            Err(rejection) => {
                tracing::debug!(error = %rejection.body_text(), "unparseable product id");
                Err(ApiError::NotFound(PRODUCT_NOT_FOUND))
            }
        }
    }
}

// --- Messages ---

pub const NAME_REQUIRED: &str = "Product name is required.";
pub const NAME_STRING: &str = "Product name must be a string.";
pub const NAME_MAX: &str = "Product name cannot exceed 255 characters.";
pub const PRICE_REQUIRED: &str = "Product price is required.";
pub const PRICE_NUMERIC: &str = "Product price must be a number.";
pub const PRICE_NEGATIVE: &str = "Product price cannot be negative.";
pub const PRICE_MAX: &str = "Product price may not be greater than 99999999.99.";
pub const DESCRIPTION_STRING: &str = "Product description must be a string.";
pub const DESCRIPTION_MAX: &str = "Product description cannot exceed 1000 characters.";

pub const PRODUCT_ID_REQUIRED: &str = "Product ID is required.";
pub const PRODUCT_ID_INTEGER: &str = "Product ID must be an integer.";
pub const PRODUCT_ID_EXISTS: &str = "The selected product does not exist.";
pub const NOT_IN_WISHLIST_MESSAGE: &str = "This product is already in your wishlist.";

pub const USER_NAME_REQUIRED: &str = "The name field is required.";
pub const USER_NAME_STRING: &str = "The name field must be a string.";
pub const USER_NAME_MAX: &str = "The name field must not be greater than 255 characters.";
pub const EMAIL_REQUIRED: &str = "The email field is required.";
pub const EMAIL_INVALID: &str = "The email field must be a valid email address.";
pub const EMAIL_MAX: &str = "The email field must not be greater than 255 characters.";
pub const EMAIL_TAKEN: &str = "The email has already been taken.";
pub const PASSWORD_REQUIRED: &str = "The password field is required.";
pub const PASSWORD_STRING: &str = "The password field must be a string.";
pub const PASSWORD_MIN: &str = "The password field must be at least 8 characters.";

const NAME_MAX_CHARS: usize = 255;
const DESCRIPTION_MAX_CHARS: usize = 1000;
const EMAIL_MAX_CHARS: usize = 255;
const PASSWORD_MIN_CHARS: usize = 8;

/// Largest value a NUMERIC(10, 2) column holds.
fn price_ceiling() -> Decimal {
    Decimal::new(9_999_999_999, 2)
}

// --- Error Set ---

/// FieldErrors
///
/// Field name mapped to its messages, serialized as `{"field": ["message", ...]}`.
/// Every failing field is reported; each field carries the first rule it violated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: &str) {
        self.0
            .entry(field.to_owned())
            .or_default()
            .push(message.to_owned());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Records the outcome of one field's rule chain, returning the value on success.
    fn check<T>(&mut self, field: &str, outcome: Result<T, &'static str>) -> Option<T> {
        match outcome {
            Ok(value) => Some(value),
            Err(message) => {
                self.add(field, message);
                None
            }
        }
    }

    fn finish<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::Validation(errors)
    }
}

// --- Field Lookup ---

/// Mode
///
/// `Update` gives every field "sometimes" semantics: absent fields are skipped entirely,
/// present fields go through the same rules as `Create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Update,
}

enum Field<'a> {
    Absent,
    /// `null`, or a string that is empty once trimmed.
    Blank,
    Present(&'a Value),
}

fn lookup<'a>(payload: &'a Payload, key: &str) -> Field<'a> {
    match payload.get(key) {
        None => Field::Absent,
        Some(Value::Null) => Field::Blank,
        Some(Value::String(s)) if s.trim().is_empty() => Field::Blank,
        Some(value) => Field::Present(value),
    }
}

fn string_rule(
    value: &Value,
    max_chars: usize,
    type_msg: &'static str,
    max_msg: &'static str,
) -> Result<String, &'static str> {
    let s = value.as_str().ok_or(type_msg)?.trim();
    if s.chars().count() > max_chars {
        return Err(max_msg);
    }
    Ok(s.to_owned())
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// Accepts JSON numbers and numeric strings. Type failures and sign failures carry
/// different messages.
fn price_rule(value: &Value) -> Result<Decimal, &'static str> {
    let mut price = match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
    .ok_or(PRICE_NUMERIC)?;

    if price < Decimal::ZERO {
        return Err(PRICE_NEGATIVE);
    }
    price.rescale(2);
    if price > price_ceiling() {
        return Err(PRICE_MAX);
    }
    Ok(price)
}

fn integer_rule(value: &Value) -> Result<i64, &'static str> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            })
            .ok_or(PRODUCT_ID_INTEGER),
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| PRODUCT_ID_INTEGER),
        _ => Err(PRODUCT_ID_INTEGER),
    }
}

// --- Product Schema ---

/// validate_product
///
/// Checks a product payload in the given mode. The result lists only the fields that were
/// present (create mode guarantees `name` and `price`).
pub fn validate_product(payload: &Payload, mode: Mode) -> Result<ProductChanges, FieldErrors> {
    let mut errors = FieldErrors::default();
    let mut changes = ProductChanges::default();

    match lookup(payload, "name") {
        Field::Absent if mode == Mode::Update => {}
        Field::Absent | Field::Blank => errors.add("name", NAME_REQUIRED),
        Field::Present(value) => {
            changes.name = errors.check(
                "name",
                string_rule(value, NAME_MAX_CHARS, NAME_STRING, NAME_MAX),
            );
        }
    }

    match lookup(payload, "price") {
        Field::Absent if mode == Mode::Update => {}
        Field::Absent | Field::Blank => errors.add("price", PRICE_REQUIRED),
        Field::Present(value) => changes.price = errors.check("price", price_rule(value)),
    }

    match lookup(payload, "description") {
        Field::Absent if mode == Mode::Update => {}
        Field::Absent | Field::Blank => changes.description = Some(None),
        Field::Present(value) => {
            changes.description = errors
                .check(
                    "description",
                    string_rule(value, DESCRIPTION_MAX_CHARS, DESCRIPTION_STRING, DESCRIPTION_MAX),
                )
                .map(Some);
        }
    }

    errors.finish(changes)
}

/// Create-mode entry point: every required field is present in the result.
pub fn validate_product_create(payload: &Payload) -> Result<ProductInput, FieldErrors> {
    let changes = validate_product(payload, Mode::Create)?;
    match (changes.name, changes.price) {
        (Some(name), Some(price)) => Ok(ProductInput {
            name,
            price,
            description: changes.description.flatten(),
        }),
        (name, price) => {
            let mut errors = FieldErrors::default();
            if name.is_none() {
                errors.add("name", NAME_REQUIRED);
            }
            if price.is_none() {
                errors.add("price", PRICE_REQUIRED);
            }
            Err(errors)
        }
    }
}

pub fn validate_product_update(payload: &Payload) -> Result<ProductChanges, FieldErrors> {
    validate_product(payload, Mode::Update)
}

// --- Wishlist Membership ---

/// NotInWishlist
///
/// Contextual rule for `product_id`: passes only when an authenticated principal is given
/// and that principal does not already hold the product. Membership is looked up for the
/// acting user only, so other users' wishlists never affect the outcome.
pub struct NotInWishlist<'a> {
    repo: &'a dyn Repository,
}

impl<'a> NotInWishlist<'a> {
    pub fn new(repo: &'a dyn Repository) -> Self {
        Self { repo }
    }

    pub async fn passes(&self, principal: Option<&AuthUser>, product_id: i64) -> RepoResult<bool> {
        let Some(user) = principal else {
            return Ok(false);
        };
        let held = self
            .repo
            .wishlist_contains(WishlistEntry {
                user_id: user.id,
                product_id,
            })
            .await?;
        Ok(!held)
    }

    pub fn message(&self) -> &'static str {
        NOT_IN_WISHLIST_MESSAGE
    }
}

/// validate_wishlist_post
///
/// Runs `product_id` through required → integer → exists → not-in-wishlist, stopping at
/// the first failure. The last two rules are repository round trips.
pub async fn validate_wishlist_post(
    payload: &Payload,
    principal: &AuthUser,
    repo: &dyn Repository,
) -> Result<i64, ApiError> {
    let value = match lookup(payload, "product_id") {
        Field::Absent | Field::Blank => {
            return Err(ApiError::field("product_id", PRODUCT_ID_REQUIRED));
        }
        Field::Present(value) => value,
    };

    let product_id =
        integer_rule(value).map_err(|message| ApiError::field("product_id", message))?;

    if !repo.product_exists(product_id).await? {
        return Err(ApiError::field("product_id", PRODUCT_ID_EXISTS));
    }

    let rule = NotInWishlist::new(repo);
    if !rule.passes(Some(principal), product_id).await? {
        return Err(ApiError::field("product_id", rule.message()));
    }

    Ok(product_id)
}

// --- Account Schemas ---

/// Validated registration payload; `email` is lowercased.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

fn email_rule(value: &Value) -> Result<String, &'static str> {
    let email = value.as_str().ok_or(EMAIL_INVALID)?.trim().to_lowercase();
    if email.chars().count() > EMAIL_MAX_CHARS {
        return Err(EMAIL_MAX);
    }
    if !email.validate_email() {
        return Err(EMAIL_INVALID);
    }
    Ok(email)
}

/// Passwords are taken verbatim (no trimming).
fn password_rule(payload: &Payload, min_chars: usize) -> Result<String, &'static str> {
    match payload.get("password") {
        None | Some(Value::Null) => Err(PASSWORD_REQUIRED),
        Some(Value::String(s)) if s.is_empty() => Err(PASSWORD_REQUIRED),
        Some(Value::String(s)) if s.chars().count() < min_chars => Err(PASSWORD_MIN),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(PASSWORD_STRING),
    }
}

/// Shape checks for POST /register. Email uniqueness needs the repository and is checked
/// by the handler.
pub fn validate_registration(payload: &Payload) -> Result<Registration, FieldErrors> {
    let mut errors = FieldErrors::default();

    let name = match lookup(payload, "name") {
        Field::Absent | Field::Blank => {
            errors.add("name", USER_NAME_REQUIRED);
            None
        }
        Field::Present(value) => errors.check(
            "name",
            string_rule(value, NAME_MAX_CHARS, USER_NAME_STRING, USER_NAME_MAX),
        ),
    };

    let email = match lookup(payload, "email") {
        Field::Absent | Field::Blank => {
            errors.add("email", EMAIL_REQUIRED);
            None
        }
        Field::Present(value) => errors.check("email", email_rule(value)),
    };

    let password = errors.check("password", password_rule(payload, PASSWORD_MIN_CHARS));

    match (name, email, password) {
        (Some(name), Some(email), Some(password)) => errors.finish(Registration {
            name,
            email,
            password,
        }),
        _ => Err(errors),
    }
}

/// Shape checks for POST /login. No format or length rules: a wrong value is simply
/// an invalid credential.
pub fn validate_login(payload: &Payload) -> Result<(String, String), FieldErrors> {
    let mut errors = FieldErrors::default();

    let email = match lookup(payload, "email") {
        Field::Present(Value::String(s)) => Some(s.trim().to_lowercase()),
        Field::Present(_) => {
            errors.add("email", EMAIL_INVALID);
            None
        }
        Field::Absent | Field::Blank => {
            errors.add("email", EMAIL_REQUIRED);
            None
        }
    };

    let password = errors.check("password", password_rule(payload, 0));

    match (email, password) {
        (Some(email), Some(password)) => errors.finish((email, password)),
        _ => Err(errors),
    }
}
