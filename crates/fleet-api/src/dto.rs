use std::fmt;

use chrono::{DateTime, Utc};
use fleet_db::models::{Server, ServerKind, ServerStatus};
use serde::{Deserialize, Serialize};

// ── Requests ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct NewServerRequest {
    pub name: String,
    pub r#type: String,
    pub ip: String,
    pub port: i64,
}

// ── Responses ──────────────────────────────────────────────────────

/// A server as shown to a caller. `vps_id`, `ip` and `port` are only filled
/// in for callers allowed to see them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedServer {
    pub id: String,
    pub name: String,
    pub r#type: String,
    pub kind: ServerKind,
    pub status: ServerStatus,
    pub creation_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vps_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
}

impl ProjectedServer {
    pub fn project(server: Server, show_extended: bool) -> Self {
        let (vps_id, ip, port) = if show_extended {
            (Some(server.vps_id), Some(server.ip), Some(server.port))
        } else {
            (None, None, None)
        };
        Self {
            id: server.id,
            name: server.name,
            r#type: server.r#type,
            kind: server.kind,
            status: server.status,
            creation_time: server.creation_time,
            end_time: server.end_time,
            vps_id,
            ip,
            port,
        }
    }

    pub fn full(server: Server) -> Self {
        Self::project(server, true)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerList {
    pub size: usize,
    pub servers: Vec<ProjectedServer>,
}

impl ServerList {
    pub fn new(servers: Vec<ProjectedServer>) -> Self {
        Self {
            size: servers.len(),
            servers,
        }
    }
}

/// Client credentials handed back once, at creation.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct CredentialPair {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedServer {
    #[serde(flatten)]
    pub server: ProjectedServer,
    pub auth: CredentialPair,
}

/// How a delete request was carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Closed {
    /// Record removed outright.
    Deleted,
    /// Record kept, moved to `ENDED`.
    Ended(ProjectedServer),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> Server {
        Server {
            id: "ab12".into(),
            name: "koth_1".into(),
            r#type: "KOTH".into(),
            kind: ServerKind::Server,
            vps_id: "vps-1".into(),
            ip: "127.0.0.1".into(),
            port: 20001,
            status: ServerStatus::Waiting,
            creation_time: Utc::now(),
            end_time: None,
        }
    }

    #[test]
    fn redacted_projection_omits_extended_fields() {
        let json = serde_json::to_value(ProjectedServer::project(server(), false)).unwrap();
        let obj = json.as_object().unwrap();
        for hidden in ["vpsId", "ip", "port", "endTime"] {
            assert!(!obj.contains_key(hidden), "{hidden} leaked");
        }
        assert_eq!(obj["type"], "KOTH");
        assert_eq!(obj["status"], "WAITING");
        assert!(obj.contains_key("creationTime"));
    }

    #[test]
    fn full_projection_has_everything() {
        let json = serde_json::to_value(ProjectedServer::full(server())).unwrap();
        assert_eq!(json["vpsId"], "vps-1");
        assert_eq!(json["ip"], "127.0.0.1");
        assert_eq!(json["port"], 20001);
    }

    #[test]
    fn created_server_flattens_with_auth() {
        let created = CreatedServer {
            server: ProjectedServer::full(server()),
            auth: CredentialPair {
                client_id: "ab12".into(),
                client_secret: "secret".into(),
            },
        };
        let json = serde_json::to_value(&created).unwrap();
        assert_eq!(json["id"], "ab12");
        assert_eq!(json["auth"]["client_id"], "ab12");
        assert!(!format!("{created:?}").contains("\"secret\""));
    }
}
