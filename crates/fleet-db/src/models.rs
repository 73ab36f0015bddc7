use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

// ── ServerStatus ────────────────────────────────────────────────────

/// Lifecycle of a game server. Declaration order is the lifecycle order;
/// a server only ever moves to a later variant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type, Serialize, Deserialize,
)]
#[sqlx(type_name = "server_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ServerStatus {
    Waiting,
    Starting,
    Started,
    Ending,
    Ended,
}

impl ServerStatus {
    pub const ALL: [Self; 5] = [
        Self::Waiting,
        Self::Starting,
        Self::Started,
        Self::Ending,
        Self::Ended,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Starting => "STARTING",
            Self::Started => "STARTED",
            Self::Ending => "ENDING",
            Self::Ended => "ENDED",
        }
    }

    /// `true` when `self` comes strictly later in the lifecycle than `current`.
    pub fn is_after(&self, current: ServerStatus) -> bool {
        *self > current
    }

    /// Statuses a server agent may request directly. `STARTING` and `ENDED`
    /// are reached through other paths.
    pub fn is_client_settable(&self) -> bool {
        matches!(self, Self::Waiting | Self::Started | Self::Ending)
    }

    pub fn is_open(&self) -> bool {
        *self != Self::Ended
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown server status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for ServerStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

// ── ServerKind ──────────────────────────────────────────────────────

/// Game servers host matches, proxies front them.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize,
)]
#[sqlx(type_name = "server_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    #[default]
    Server,
    Proxy,
}

impl ServerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Proxy => "proxy",
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which kinds a listing should include.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KindFilter {
    Server,
    Proxy,
    #[default]
    Any,
}

impl KindFilter {
    /// Parse the legacy numeric `type` query flag: `1` servers, `2` proxies,
    /// anything else (or nothing) both.
    pub fn from_query(flag: Option<&str>) -> Self {
        match flag.map(str::trim) {
            Some("1") => Self::Server,
            Some("2") => Self::Proxy,
            _ => Self::Any,
        }
    }

    pub fn kind(&self) -> Option<ServerKind> {
        match self {
            Self::Server => Some(ServerKind::Server),
            Self::Proxy => Some(ServerKind::Proxy),
            Self::Any => None,
        }
    }

    pub fn matches(&self, kind: ServerKind) -> bool {
        self.kind().is_none_or(|k| k == kind)
    }
}

// ── Server ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    pub name: String,
    #[sqlx(rename = "type")]
    pub r#type: String,
    pub kind: ServerKind,
    pub vps_id: String,
    pub ip: String,
    pub port: i32,
    pub status: ServerStatus,
    pub creation_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Server {
    /// Fresh registry id: 32 lowercase hex characters.
    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    /// Insert or fully overwrite the row with `server.id`.
    pub async fn upsert(pool: &PgPool, server: &Server) -> sqlx::Result<Self> {
        sqlx::query_as(
            r#"INSERT INTO servers (id, name, type, kind, vps_id, ip, port, status, creation_time, end_time)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               ON CONFLICT (id) DO UPDATE
               SET name = EXCLUDED.name,
                   type = EXCLUDED.type,
                   kind = EXCLUDED.kind,
                   vps_id = EXCLUDED.vps_id,
                   ip = EXCLUDED.ip,
                   port = EXCLUDED.port,
                   status = EXCLUDED.status,
                   end_time = EXCLUDED.end_time
               RETURNING *"#,
        )
        .bind(&server.id)
        .bind(&server.name)
        .bind(&server.r#type)
        .bind(server.kind)
        .bind(&server.vps_id)
        .bind(&server.ip)
        .bind(server.port)
        .bind(server.status)
        .bind(server.creation_time)
        .bind(server.end_time)
        .fetch_one(pool)
        .await
    }

    pub async fn get_by_id(pool: &PgPool, id: &str) -> sqlx::Result<Option<Self>> {
        sqlx::query_as("SELECT * FROM servers WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Remove the row. Returns `false` when nothing matched.
    pub async fn delete(pool: &PgPool, id: &str) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM servers WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_open(pool: &PgPool, filter: KindFilter) -> sqlx::Result<Vec<Self>> {
        match filter.kind() {
            Some(kind) => {
                sqlx::query_as(
                    "SELECT * FROM servers WHERE status <> 'ENDED' AND kind = $1 ORDER BY creation_time",
                )
                .bind(kind)
                .fetch_all(pool)
                .await
            }
            None => {
                sqlx::query_as("SELECT * FROM servers WHERE status <> 'ENDED' ORDER BY creation_time")
                    .fetch_all(pool)
                    .await
            }
        }
    }

    pub async fn count_open_for_vps(pool: &PgPool, vps_id: &str) -> sqlx::Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM servers WHERE vps_id = $1 AND status <> 'ENDED'",
        )
        .bind(vps_id)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }
}

// ── OAuthClient (shared with the token server) ─────────────────────

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
    pub user_id: Option<String>,
}

impl OAuthClient {
    /// 32 random bytes, hex encoded.
    pub fn generate_secret() -> String {
        use rand::Rng;
        let bytes: [u8; 32] = rand::rng().random();
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub async fn insert(
        pool: &PgPool,
        client_id: &str,
        client_secret: &str,
        scope: &str,
        user_id: &str,
    ) -> sqlx::Result<Self> {
        sqlx::query_as(
            r#"INSERT INTO oauth_clients (client_id, client_secret, scope, user_id)
               VALUES ($1, $2, $3, $4)
               RETURNING client_id, client_secret, scope, user_id"#,
        )
        .bind(client_id)
        .bind(client_secret)
        .bind(scope)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }
}

// ── AccessToken (read-only from Rust, the token server writes these) ─

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub client_id: String,
    pub expires: DateTime<Utc>,
    pub scope: Option<String>,
}

impl AccessToken {
    /// Look up a token, returning `None` if expired or unknown.
    pub async fn get_valid(pool: &PgPool, token: &str) -> sqlx::Result<Option<Self>> {
        sqlx::query_as(
            r#"SELECT access_token, client_id, expires, scope
               FROM oauth_access_tokens
               WHERE access_token = $1 AND expires > now()"#,
        )
        .bind(token)
        .fetch_optional(pool)
        .await
    }

    /// Space-separated scope tokens granted to this access token.
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.as_deref().unwrap_or_default().split_whitespace()
    }
}
