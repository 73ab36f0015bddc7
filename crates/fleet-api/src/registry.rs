//! Server lifecycle: registration, status updates, teardown and reads.
//!
//! ```text
//! WAITING -> STARTING -> STARTED -> ENDING -> ENDED
//! STARTING -> (deleted)
//! WAITING | STARTED | ENDING -> ENDED   (close)
//! ```

use std::sync::Arc;

use chrono::Utc;
use fleet_db::models::{KindFilter, OAuthClient, Server, ServerStatus};
use fleet_infra::{CallerEvidence, CredentialIssuer, CredentialRecord, Scope, ServerRepository};
use tracing::{error, info, warn};

use crate::auth::AuthorizationGate;
use crate::dto::{Closed, CreatedServer, CredentialPair, NewServerRequest, ProjectedServer, ServerList};
use crate::error::RegistryError;
use crate::fleet_config::ConfigStore;
use crate::locks::IdLocks;
use crate::validate;

pub struct ServerRegistry {
    config: Arc<ConfigStore>,
    gate: AuthorizationGate,
    servers: Arc<dyn ServerRepository>,
    credentials: Arc<dyn CredentialIssuer>,
    server_locks: IdLocks,
    vps_locks: IdLocks,
}

impl ServerRegistry {
    pub fn new(
        config: Arc<ConfigStore>,
        gate: AuthorizationGate,
        servers: Arc<dyn ServerRepository>,
        credentials: Arc<dyn CredentialIssuer>,
    ) -> Self {
        Self {
            config,
            gate,
            servers,
            credentials,
            server_locks: IdLocks::new(),
            vps_locks: IdLocks::new(),
        }
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    async fn require(&self, evidence: &CallerEvidence, scope: Scope) -> Result<(), RegistryError> {
        if self.gate.has_scope(evidence, scope).await {
            Ok(())
        } else {
            Err(RegistryError::Forbidden(scope))
        }
    }

    /// Register a server for the calling VPS and mint its client credential.
    ///
    /// Besides the field, caller and type checks, registration fails with
    /// `LimitExceeded` when the VPS already runs `maxServers` open servers.
    ///
    /// The two writes are not transactional. If the credential cannot be
    /// issued the server record is deleted again and `SavingFailed` is
    /// returned; if that delete fails too the record is orphaned and
    /// `RollbackFailed` is returned instead.
    pub async fn create_server(
        &self,
        req: NewServerRequest,
        evidence: &CallerEvidence,
    ) -> Result<CreatedServer, RegistryError> {
        self.require(evidence, Scope::ServersManager).await?;
        validate::name(&req.name)?;
        validate::server_type(&req.r#type)?;
        validate::ip(&req.ip)?;
        let port = validate::port(req.port)?;

        let vps_id = self
            .gate
            .caller_identity(evidence)
            .await
            .ok_or(RegistryError::InvalidVps)?
            .0;
        let vps = self
            .config
            .vps(&vps_id)?
            .ok_or(RegistryError::InvalidVps)?;
        let definition = self
            .config
            .resolve(&req.r#type)?
            .ok_or(RegistryError::InvalidType)?;

        let _vps_guard = self.vps_locks.lock(&vps_id).await;
        let open = self.servers.count_open_for_vps(&vps_id).await?;
        if open >= vps.max_servers {
            return Err(RegistryError::LimitExceeded {
                vps_id,
                open,
                max: vps.max_servers,
            });
        }

        let server = Server {
            id: Server::generate_id(),
            name: req.name,
            r#type: req.r#type,
            kind: definition.kind(),
            vps_id,
            ip: req.ip,
            port: i32::from(port),
            status: ServerStatus::Waiting,
            creation_time: Utc::now(),
            end_time: None,
        };
        let _server_guard = self.server_locks.lock(&server.id).await;
        let stored = self.servers.put(&server).await?;

        let record = CredentialRecord::for_server(&stored.id, OAuthClient::generate_secret());
        if let Err(e) = self.credentials.issue(&record).await {
            warn!(server_id = %stored.id, error = %e, "credential issuance failed, removing server");
            return Err(self.roll_back(&stored.id).await);
        }

        info!(
            server_id = %stored.id,
            vps_id = %stored.vps_id,
            server_type = %stored.r#type,
            "server registered"
        );
        Ok(CreatedServer {
            server: ProjectedServer::full(stored),
            auth: CredentialPair {
                client_id: record.client_id,
                client_secret: record.client_secret,
            },
        })
    }

    async fn roll_back(&self, id: &str) -> RegistryError {
        match self.servers.delete(id).await {
            Ok(true) => RegistryError::SavingFailed,
            Ok(false) => {
                error!(server_id = %id, "rollback found no server to delete");
                RegistryError::RollbackFailed { id: id.to_string() }
            }
            Err(e) => {
                error!(server_id = %id, error = %e, "rollback failed, server record orphaned");
                RegistryError::RollbackFailed { id: id.to_string() }
            }
        }
    }

    /// Move a server forward to `WAITING`, `STARTED` or `ENDING`.
    pub async fn set_status(
        &self,
        id: &str,
        evidence: &CallerEvidence,
        new_status: &str,
    ) -> Result<ProjectedServer, RegistryError> {
        self.require(evidence, Scope::EditServerStatus).await?;
        validate::server_id(id)?;
        let requested = validate::requested_status(new_status)?;

        let _guard = self.server_locks.lock(id).await;
        let mut server = self.servers.get(id).await?.ok_or(RegistryError::NotFound)?;
        let current = server.status;
        if !requested.is_after(current) {
            return Err(RegistryError::StatusNotAfter { current });
        }

        server.status = requested;
        let stored = self.servers.put(&server).await?;
        info!(server_id = %id, from = %current, to = %requested, "server status changed");
        Ok(ProjectedServer::full(stored))
    }

    /// Tear a server down. `STARTING` servers never went live and are deleted
    /// outright; anything else still open is closed as `ENDED`.
    pub async fn delete_or_close(
        &self,
        id: &str,
        evidence: &CallerEvidence,
    ) -> Result<Closed, RegistryError> {
        self.require(evidence, Scope::DeleteServer).await?;
        validate::server_id(id)?;

        let _guard = self.server_locks.lock(id).await;
        let mut server = self.servers.get(id).await?.ok_or(RegistryError::NotFound)?;
        match server.status {
            ServerStatus::Ended => Err(RegistryError::AlreadyEnded),
            ServerStatus::Starting => {
                if !self.servers.delete(id).await? {
                    return Err(RegistryError::NotFound);
                }
                info!(server_id = %id, "server deleted before start");
                Ok(Closed::Deleted)
            }
            previous => {
                server.status = ServerStatus::Ended;
                server.end_time = Some(Utc::now());
                let stored = self.servers.put(&server).await?;
                info!(server_id = %id, from = %previous, "server closed");
                Ok(Closed::Ended(ProjectedServer::full(stored)))
            }
        }
    }

    pub async fn get_server(
        &self,
        id: &str,
        evidence: &CallerEvidence,
    ) -> Result<ProjectedServer, RegistryError> {
        validate::server_id(id)?;
        let server = self.servers.get(id).await?.ok_or(RegistryError::NotFound)?;
        let show_extended = self
            .gate
            .has_scope(evidence, Scope::ShowExtendedServerFields)
            .await;
        Ok(ProjectedServer::project(server, show_extended))
    }

    pub async fn list_open_servers(
        &self,
        filter: KindFilter,
        evidence: &CallerEvidence,
    ) -> Result<ServerList, RegistryError> {
        let servers = self.servers.list_open(filter).await?;
        let show_extended = self
            .gate
            .has_scope(evidence, Scope::ShowExtendedServerFields)
            .await;
        Ok(ServerList::new(
            servers
                .into_iter()
                .map(|s| ProjectedServer::project(s, show_extended))
                .collect(),
        ))
    }
}
