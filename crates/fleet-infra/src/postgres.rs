//! Collaborators backed by the shared Postgres database.

use async_trait::async_trait;
use fleet_db::models::{AccessToken, KindFilter, OAuthClient, Server};
use sqlx::PgPool;
use tracing::{debug, info};

use crate::{
    AuthorizationOracle, CallerEvidence, ClientId, CredentialIssuer, CredentialRecord, Result,
    Scope, ServerRepository,
};

/// `servers` table.
#[derive(Clone)]
pub struct PgServerRepository {
    pool: PgPool,
}

impl PgServerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ServerRepository for PgServerRepository {
    async fn get(&self, id: &str) -> Result<Option<Server>> {
        Ok(Server::get_by_id(&self.pool, id).await?)
    }

    async fn put(&self, server: &Server) -> Result<Server> {
        Ok(Server::upsert(&self.pool, server).await?)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(Server::delete(&self.pool, id).await?)
    }

    async fn list_open(&self, filter: KindFilter) -> Result<Vec<Server>> {
        Ok(Server::list_open(&self.pool, filter).await?)
    }

    async fn count_open_for_vps(&self, vps_id: &str) -> Result<i64> {
        Ok(Server::count_open_for_vps(&self.pool, vps_id).await?)
    }
}

/// Writes client rows straight into the token server's `oauth_clients` table.
#[derive(Clone)]
pub struct PgCredentialIssuer {
    pool: PgPool,
}

impl PgCredentialIssuer {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialIssuer for PgCredentialIssuer {
    async fn issue(&self, record: &CredentialRecord) -> Result<()> {
        OAuthClient::insert(
            &self.pool,
            &record.client_id,
            &record.client_secret,
            &Scope::join(&record.scope),
            &record.owner_id,
        )
        .await?;
        info!(client_id = %record.client_id, "registered oauth client");
        Ok(())
    }
}

/// Resolves bearer tokens against `oauth_access_tokens`.
#[derive(Clone)]
pub struct PgTokenOracle {
    pool: PgPool,
}

impl PgTokenOracle {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lookup(&self, evidence: &CallerEvidence) -> Result<Option<AccessToken>> {
        let Some(token) = evidence.token() else {
            return Ok(None);
        };
        let found = AccessToken::get_valid(&self.pool, token).await?;
        if found.is_none() {
            debug!("access token unknown or expired");
        }
        Ok(found)
    }
}

#[async_trait]
impl AuthorizationOracle for PgTokenOracle {
    async fn verify(&self, evidence: &CallerEvidence, scope: Scope) -> Result<bool> {
        Ok(self
            .lookup(evidence)
            .await?
            .is_some_and(|t| t.scopes().any(|s| s == scope.as_str())))
    }

    async fn identity_of(&self, evidence: &CallerEvidence) -> Result<Option<ClientId>> {
        Ok(self.lookup(evidence).await?.map(|t| ClientId(t.client_id)))
    }
}
