use shop_wishlist::{
    AppState,
    auth::hash_password,
    config::{AppConfig, Env},
    create_router,
    models::{NewUser, Role},
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, database + migrations, admin bootstrap, then the
/// HTTP server. Startup failures panic; the process must not serve with a broken setup.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise crate-level debug.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shop_wishlist=debug,tower_http=info,sqlx=warn".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);
    if config.uses_insecure_defaults() {
        tracing::warn!(
            "Running in Local mode with the built-in JWT secret: the x-user-id bypass is enabled. \
             Set APP_ENV=production and JWT_SECRET for any shared deployment."
        );
    }

    // 3. Database + schema
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Failed to apply database migrations.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 4. Admin bootstrap
    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        ensure_admin(&repo, email, password).await;
    }

    // 5. Router and server
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState { repo, config });

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}

/// Creates the configured admin account unless a user with that email already exists.
/// An existing account keeps its role and password.
async fn ensure_admin(repo: &RepositoryState, email: &str, password: &str) {
    let email = email.trim().to_lowercase();

    match repo.get_user_by_email(&email).await {
        Ok(Some(user)) => {
            if !user.is_admin() {
                tracing::warn!(user_id = %user.id, "ADMIN_EMAIL belongs to a non-admin account");
            }
            return;
        }
        Ok(None) => {}
        Err(e) => panic!("FATAL: Failed to look up the admin account: {e}"),
    }

    let password_hash =
        hash_password(password).expect("FATAL: Failed to hash the admin password.");
    let admin = repo
        .create_user(NewUser {
            name: "Administrator".to_string(),
            email,
            password_hash,
            role: Role::Admin,
        })
        .await
        .expect("FATAL: Failed to create the admin account.");

    tracing::info!(user_id = %admin.id, "admin account created");
}
