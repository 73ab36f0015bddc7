pub mod memory;
pub mod postgres;
pub mod types;

use async_trait::async_trait;
use fleet_db::models::{KindFilter, Server};

pub use types::{CallerEvidence, ClientId, CredentialRecord, Scope};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("credential rejected: {0}")]
    CredentialRejected(String),

    #[error("unknown scope: {0}")]
    UnknownScope(String),

    #[error("{0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Storage for server records. Implementations must give read-your-writes
/// consistency for a single id.
#[async_trait]
pub trait ServerRepository: Send + Sync + 'static {
    async fn get(&self, id: &str) -> Result<Option<Server>>;

    /// Insert or overwrite the record with `server.id`, returning what was stored.
    async fn put(&self, server: &Server) -> Result<Server>;

    /// Remove a record permanently. Returns `false` if nothing was there.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Servers not yet `ENDED`, oldest first.
    async fn list_open(&self, filter: KindFilter) -> Result<Vec<Server>>;

    async fn count_open_for_vps(&self, vps_id: &str) -> Result<i64>;
}

/// Registers scoped client credentials with the OAuth2 token server.
#[async_trait]
pub trait CredentialIssuer: Send + Sync + 'static {
    /// Register the credential. Either the whole record is stored or an
    /// error is returned.
    async fn issue(&self, record: &CredentialRecord) -> Result<()>;
}

/// Verifies presented credentials. Token issuance itself lives elsewhere.
#[async_trait]
pub trait AuthorizationOracle: Send + Sync + 'static {
    /// `Ok(true)` only if the evidence authenticates and carries `scope`.
    async fn verify(&self, evidence: &CallerEvidence, scope: Scope) -> Result<bool>;

    /// The client the evidence authenticates, if any.
    async fn identity_of(&self, evidence: &CallerEvidence) -> Result<Option<ClientId>>;
}
