use tracing_subscriber::EnvFilter;

use fleet_api::config::AppConfig;
use fleet_api::state::AppState;

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let db = fleet_db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .expect("failed to connect to database");

    fleet_db::run_migrations(&db)
        .await
        .expect("failed to run migrations");

    let state = AppState::new(db, config);

    // Load before serving so a bad fleet document stops the process here
    // instead of failing every request.
    let fleet = state
        .registry
        .config()
        .load()
        .expect("fleet config rejected");
    tracing::info!(
        path = %state.config.fleet_config_path.display(),
        types = fleet.types().len(),
        vps = fleet.vps().len(),
        "server registry ready"
    );

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for shutdown signal");
    tracing::info!("shutting down");
    state.db.close().await;
}
