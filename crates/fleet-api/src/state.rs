use std::sync::Arc;

use fleet_infra::postgres::{PgCredentialIssuer, PgServerRepository, PgTokenOracle};
use sqlx::PgPool;

use crate::auth::AuthorizationGate;
use crate::config::AppConfig;
use crate::fleet_config::ConfigStore;
use crate::registry::ServerRegistry;

/// Everything a transport needs to serve the registry.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub registry: Arc<ServerRegistry>,
    pub config: AppConfig,
}

impl AppState {
    /// Wire the registry to the shared Postgres database.
    pub fn new(db: PgPool, config: AppConfig) -> Self {
        let fleet = Arc::new(ConfigStore::from_path(&config.fleet_config_path));
        let gate = AuthorizationGate::new(Arc::new(PgTokenOracle::new(db.clone())));
        let registry = ServerRegistry::new(
            fleet,
            gate,
            Arc::new(PgServerRepository::new(db.clone())),
            Arc::new(PgCredentialIssuer::new(db.clone())),
        );
        Self {
            db,
            registry: Arc::new(registry),
            config,
        }
    }
}
