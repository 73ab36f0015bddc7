use std::sync::Arc;

use fleet_infra::{AuthorizationOracle, CallerEvidence, ClientId, Scope};

/// Answers "does this caller hold that scope" without ever failing: an
/// oracle outage reads as "no".
#[derive(Clone)]
pub struct AuthorizationGate {
    oracle: Arc<dyn AuthorizationOracle>,
}

impl AuthorizationGate {
    pub fn new(oracle: Arc<dyn AuthorizationOracle>) -> Self {
        Self { oracle }
    }

    pub async fn has_scope(&self, evidence: &CallerEvidence, scope: Scope) -> bool {
        match self.oracle.verify(evidence, scope).await {
            Ok(granted) => granted,
            Err(e) => {
                tracing::warn!(%scope, error = %e, "scope check failed, denying");
                false
            }
        }
    }

    /// The authenticated client behind `evidence`, used as the owning VPS of
    /// servers it registers.
    pub async fn caller_identity(&self, evidence: &CallerEvidence) -> Option<ClientId> {
        match self.oracle.identity_of(evidence).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(error = %e, "identity lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use fleet_infra::memory::StaticTokenOracle;

    use super::*;

    struct DownOracle;

    #[async_trait]
    impl AuthorizationOracle for DownOracle {
        async fn verify(&self, _: &CallerEvidence, _: Scope) -> fleet_infra::Result<bool> {
            Err(fleet_infra::Error::Unavailable("token store down".into()))
        }

        async fn identity_of(
            &self,
            _: &CallerEvidence,
        ) -> fleet_infra::Result<Option<ClientId>> {
            Err(fleet_infra::Error::Unavailable("token store down".into()))
        }
    }

    #[tokio::test]
    async fn oracle_failures_read_as_denied() {
        let gate = AuthorizationGate::new(Arc::new(DownOracle));
        let evidence = CallerEvidence::bearer("tok");
        assert!(!gate.has_scope(&evidence, Scope::ServersManager).await);
        assert_eq!(gate.caller_identity(&evidence).await, None);
    }

    #[tokio::test]
    async fn delegates_to_oracle() {
        let oracle = StaticTokenOracle::new().with_token(
            "tok",
            "vps-1",
            [Scope::ServersManager, Scope::ShowExtendedServerFields],
        );
        let gate = AuthorizationGate::new(Arc::new(oracle));
        let evidence = CallerEvidence::bearer("tok");

        assert!(gate.has_scope(&evidence, Scope::ShowExtendedServerFields).await);
        assert!(!gate.has_scope(&evidence, Scope::DeleteServer).await);
        assert_eq!(
            gate.caller_identity(&evidence).await,
            Some(ClientId("vps-1".into()))
        );
        assert_eq!(gate.caller_identity(&CallerEvidence::anonymous()).await, None);
    }
}
