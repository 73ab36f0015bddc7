//! Postgres row models for the fleet registry and the OAuth2 tables it shares
//! with the token server.

pub mod models;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Open a pool sized for the registry's request fan-out.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Apply the embedded `servers` / `oauth_*` schema.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
