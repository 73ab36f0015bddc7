use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Capability strings carried by OAuth2 access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Reveal `ip`, `port` and `vps_id` on server reads.
    #[serde(rename = "server_show_more")]
    ShowExtendedServerFields,
    #[serde(rename = "player_show_more")]
    ShowExtendedPlayerFields,
    #[serde(rename = "servertester_create")]
    CreateServerTest,
    /// Register new servers (held by VPS agents).
    #[serde(rename = "servers_manager")]
    ServersManager,
    #[serde(rename = "server_status_edit")]
    EditServerStatus,
    #[serde(rename = "server_delete")]
    DeleteServer,
}

impl Scope {
    /// Scope granted to the credential minted for every new server.
    pub const SERVER_CREDENTIAL: [Scope; 3] = [
        Scope::ShowExtendedServerFields,
        Scope::ShowExtendedPlayerFields,
        Scope::CreateServerTest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShowExtendedServerFields => "server_show_more",
            Self::ShowExtendedPlayerFields => "player_show_more",
            Self::CreateServerTest => "servertester_create",
            Self::ServersManager => "servers_manager",
            Self::EditServerStatus => "server_status_edit",
            Self::DeleteServer => "server_delete",
        }
    }

    /// Join scopes the OAuth2 way: space separated.
    pub fn join(scopes: &[Scope]) -> String {
        scopes
            .iter()
            .map(Scope::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "server_show_more" => Ok(Self::ShowExtendedServerFields),
            "player_show_more" => Ok(Self::ShowExtendedPlayerFields),
            "servertester_create" => Ok(Self::CreateServerTest),
            "servers_manager" => Ok(Self::ServersManager),
            "server_status_edit" => Ok(Self::EditServerStatus),
            "server_delete" => Ok(Self::DeleteServer),
            other => Err(crate::Error::UnknownScope(other.to_string())),
        }
    }
}

/// Authenticated OAuth2 client id. For VPS agents this is the VPS id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub String);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whatever the caller presented to prove who it is: a bearer token, or
/// nothing at all.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CallerEvidence {
    token: Option<String>,
}

impl CallerEvidence {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Read an `Authorization` header value. Anything other than a non-empty
    /// `Bearer` token counts as anonymous.
    pub fn from_authorization_header(value: Option<&str>) -> Self {
        let token = value
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty());
        Self {
            token: token.map(str::to_string),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

// Tokens stay out of logs.
impl fmt::Debug for CallerEvidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallerEvidence")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A scoped client credential bound to exactly one server.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub client_id: String,
    pub client_secret: String,
    pub scope: Vec<Scope>,
    pub owner_id: String,
}

impl CredentialRecord {
    /// Credential for a freshly registered server: client id and owner are
    /// both the server id.
    pub fn for_server(server_id: &str, client_secret: String) -> Self {
        Self {
            client_id: server_id.to_string(),
            client_secret,
            scope: Scope::SERVER_CREDENTIAL.to_vec(),
            owner_id: server_id.to_string(),
        }
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scope", &self.scope)
            .field("owner_id", &self.owner_id)
            .finish()
    }
}
