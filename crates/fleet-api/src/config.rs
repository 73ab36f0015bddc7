use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub fleet_config_path: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".into())
                .parse()
                .expect("DATABASE_MAX_CONNECTIONS must be a valid u32"),
            fleet_config_path: env::var("FLEET_CONFIG_PATH")
                .unwrap_or_else(|_| "config/servers.json".into())
                .into(),
        }
    }
}
