//! In-process collaborators for local runs and tests. Data is lost on restart.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use fleet_db::models::{KindFilter, Server};
use tokio::sync::RwLock;
use tracing::info;

use crate::{
    AuthorizationOracle, CallerEvidence, ClientId, CredentialIssuer, CredentialRecord, Error,
    Result, Scope, ServerRepository,
};

#[derive(Default)]
pub struct MemoryServerRepository {
    servers: RwLock<HashMap<String, Server>>,
    fail_deletes: AtomicBool,
}

impl MemoryServerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `delete` fail, to exercise rollback failure.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.servers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.servers.read().await.is_empty()
    }
}

#[async_trait]
impl ServerRepository for MemoryServerRepository {
    async fn get(&self, id: &str) -> Result<Option<Server>> {
        Ok(self.servers.read().await.get(id).cloned())
    }

    async fn put(&self, server: &Server) -> Result<Server> {
        self.servers
            .write()
            .await
            .insert(server.id.clone(), server.clone());
        Ok(server.clone())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("repository rejected delete".into()));
        }
        Ok(self.servers.write().await.remove(id).is_some())
    }

    async fn list_open(&self, filter: KindFilter) -> Result<Vec<Server>> {
        let servers = self.servers.read().await;
        let mut open: Vec<Server> = servers
            .values()
            .filter(|s| s.status.is_open() && filter.matches(s.kind))
            .cloned()
            .collect();
        open.sort_by(|a, b| a.creation_time.cmp(&b.creation_time).then(a.id.cmp(&b.id)));
        Ok(open)
    }

    async fn count_open_for_vps(&self, vps_id: &str) -> Result<i64> {
        let servers = self.servers.read().await;
        Ok(servers
            .values()
            .filter(|s| s.vps_id == vps_id && s.status.is_open())
            .count() as i64)
    }
}

#[derive(Default)]
pub struct MemoryCredentialIssuer {
    issued: RwLock<Vec<CredentialRecord>>,
    fail: AtomicBool,
}

impl MemoryCredentialIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every subsequent `issue` call.
    pub fn fail_issuance(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn issued(&self) -> Vec<CredentialRecord> {
        self.issued.read().await.clone()
    }

    pub async fn find(&self, client_id: &str) -> Option<CredentialRecord> {
        self.issued
            .read()
            .await
            .iter()
            .find(|r| r.client_id == client_id)
            .cloned()
    }
}

#[async_trait]
impl CredentialIssuer for MemoryCredentialIssuer {
    async fn issue(&self, record: &CredentialRecord) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::CredentialRejected(record.client_id.clone()));
        }
        let mut issued = self.issued.write().await;
        if issued.iter().any(|r| r.client_id == record.client_id) {
            return Err(Error::CredentialRejected(format!(
                "client {} already registered",
                record.client_id
            )));
        }
        info!(client_id = %record.client_id, "registered in-memory client");
        issued.push(record.clone());
        Ok(())
    }
}

struct Grant {
    client: ClientId,
    scopes: HashSet<Scope>,
}

/// Fixed token table, configured up front.
#[derive(Default)]
pub struct StaticTokenOracle {
    grants: HashMap<String, Grant>,
}

impl StaticTokenOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(
        mut self,
        token: impl Into<String>,
        client_id: impl Into<String>,
        scopes: impl IntoIterator<Item = Scope>,
    ) -> Self {
        self.grants.insert(
            token.into(),
            Grant {
                client: ClientId(client_id.into()),
                scopes: scopes.into_iter().collect(),
            },
        );
        self
    }

    fn grant(&self, evidence: &CallerEvidence) -> Option<&Grant> {
        evidence.token().and_then(|t| self.grants.get(t))
    }
}

#[async_trait]
impl AuthorizationOracle for StaticTokenOracle {
    async fn verify(&self, evidence: &CallerEvidence, scope: Scope) -> Result<bool> {
        Ok(self
            .grant(evidence)
            .is_some_and(|g| g.scopes.contains(&scope)))
    }

    async fn identity_of(&self, evidence: &CallerEvidence) -> Result<Option<ClientId>> {
        Ok(self.grant(evidence).map(|g| g.client.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fleet_db::models::{ServerKind, ServerStatus};

    fn server(id: &str, vps: &str, kind: ServerKind, status: ServerStatus) -> Server {
        Server {
            id: id.into(),
            name: format!("srv-{id}"),
            r#type: "KOTH".into(),
            kind,
            vps_id: vps.into(),
            ip: "127.0.0.1".into(),
            port: 20001,
            status,
            creation_time: Utc::now(),
            end_time: None,
        }
    }

    #[tokio::test]
    async fn list_open_skips_ended_and_filters_kind() {
        let repo = MemoryServerRepository::new();
        repo.put(&server("a1", "vps-1", ServerKind::Server, ServerStatus::Waiting))
            .await
            .unwrap();
        repo.put(&server("b2", "vps-1", ServerKind::Proxy, ServerStatus::Started))
            .await
            .unwrap();
        repo.put(&server("c3", "vps-2", ServerKind::Server, ServerStatus::Ended))
            .await
            .unwrap();

        let all = repo.list_open(KindFilter::Any).await.unwrap();
        assert_eq!(all.len(), 2);
        let proxies = repo.list_open(KindFilter::Proxy).await.unwrap();
        assert_eq!(proxies.len(), 1);
        assert_eq!(proxies[0].id, "b2");

        assert_eq!(repo.count_open_for_vps("vps-1").await.unwrap(), 2);
        assert_eq!(repo.count_open_for_vps("vps-2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let repo = MemoryServerRepository::new();
        repo.put(&server("a1", "vps-1", ServerKind::Server, ServerStatus::Waiting))
            .await
            .unwrap();
        assert!(repo.delete("a1").await.unwrap());
        assert!(!repo.delete("a1").await.unwrap());

        repo.fail_deletes(true);
        assert!(repo.delete("a1").await.is_err());
    }

    #[tokio::test]
    async fn issuer_rejects_duplicates_and_injected_failures() {
        let issuer = MemoryCredentialIssuer::new();
        let record = CredentialRecord::for_server("abc", "s".repeat(64));
        issuer.issue(&record).await.unwrap();
        assert!(issuer.issue(&record).await.is_err());

        issuer.fail_issuance(true);
        let other = CredentialRecord::for_server("def", "s".repeat(64));
        assert!(issuer.issue(&other).await.is_err());
        assert_eq!(issuer.issued().await.len(), 1);
    }

    #[tokio::test]
    async fn static_oracle_checks_scope_membership() {
        let oracle =
            StaticTokenOracle::new().with_token("tok", "vps-1", [Scope::ServersManager]);
        let evidence = CallerEvidence::bearer("tok");

        assert!(oracle.verify(&evidence, Scope::ServersManager).await.unwrap());
        assert!(!oracle.verify(&evidence, Scope::DeleteServer).await.unwrap());
        assert_eq!(
            oracle.identity_of(&evidence).await.unwrap(),
            Some(ClientId("vps-1".into()))
        );

        let anon = CallerEvidence::anonymous();
        assert!(!oracle.verify(&anon, Scope::ServersManager).await.unwrap());
        assert_eq!(oracle.identity_of(&anon).await.unwrap(), None);
    }
}
