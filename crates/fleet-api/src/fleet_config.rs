//! Fleet configuration: which server types exist, which VPSes may run them,
//! and with what port ranges.
//!
//! The document is read once per [`ConfigStore`]. A rejected document is
//! never partially applied, and the rejection is kept for the store's whole
//! lifetime.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

use fleet_db::models::ServerKind;
use serde::Deserialize;

// ── Errors ───────────────────────────────────────────────────────────

/// One problem found while validating the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub path: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read fleet config {path}: {message}")]
    Read { path: String, message: String },

    #[error("malformed fleet config at line {line}, column {column}: {message}")]
    Schema {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("invalid fleet config: {}", join_issues(.0))]
    Invalid(Vec<ConfigIssue>),
}

fn join_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Schema {
            message: e.to_string(),
            line: e.line(),
            column: e.column(),
        }
    }
}

// ── Document schema ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawDocument {
    types: Vec<RawType>,
    vps: Vec<RawVps>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawType {
    id: String,
    port_min: i64,
    port_max: i64,
    database_tags: Option<Vec<String>>,
    kind: Option<ServerKind>,
    variants: Option<Vec<RawVariant>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVariant {
    id: String,
    port_min: i64,
    port_max: i64,
    database_tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVps {
    id: String,
    max_servers: i64,
    config: Option<Vec<RawOverride>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOverride {
    r#type: Option<String>,
    port_min: Option<i64>,
    port_max: Option<i64>,
}

// ── Snapshot ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub min: i64,
    pub max: i64,
}

impl PortRange {
    pub fn contains(&self, port: i64) -> bool {
        (self.min..=self.max).contains(&port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    pub id: String,
    pub ports: PortRange,
    pub database_tags: Vec<String>,
    pub kind: ServerKind,
    pub variants: Vec<VariantDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDefinition {
    pub id: String,
    pub ports: PortRange,
    pub database_tags: Vec<String>,
}

/// Per-VPS port override. A missing `type` applies to every type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOverride {
    pub r#type: Option<String>,
    pub port_min: Option<i64>,
    pub port_max: Option<i64>,
}

impl ConfigOverride {
    fn is_wildcard(&self) -> bool {
        self.r#type.as_deref().is_none_or(str::is_empty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpsDefinition {
    pub id: String,
    pub max_servers: i64,
    pub overrides: Vec<ConfigOverride>,
}

impl VpsDefinition {
    /// Port range this VPS uses for `definition`: the first override naming
    /// its id, else the first wildcard override, else the definition's own
    /// range. Bounds an override leaves out fall back to the definition.
    pub fn port_range_for(&self, definition: &Definition<'_>) -> PortRange {
        let own = definition.ports();
        let id = definition.id();
        let chosen = self
            .overrides
            .iter()
            .find(|o| o.r#type.as_deref() == Some(id))
            .or_else(|| self.overrides.iter().find(|o| o.is_wildcard()));
        match chosen {
            Some(o) => PortRange {
                min: o.port_min.unwrap_or(own.min),
                max: o.port_max.unwrap_or(own.max),
            },
            None => own,
        }
    }
}

/// Where an identifier lives: a type, or one of its variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locator {
    pub type_index: usize,
    pub variant_index: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Definition<'a> {
    Type(&'a TypeDefinition),
    Variant {
        parent: &'a TypeDefinition,
        variant: &'a VariantDefinition,
    },
}

impl<'a> Definition<'a> {
    pub fn id(&self) -> &'a str {
        match self {
            Self::Type(t) => &t.id,
            Self::Variant { variant, .. } => &variant.id,
        }
    }

    pub fn ports(&self) -> PortRange {
        match self {
            Self::Type(t) => t.ports,
            Self::Variant { variant, .. } => variant.ports,
        }
    }

    pub fn database_tags(&self) -> &'a [String] {
        match self {
            Self::Type(t) => &t.database_tags,
            Self::Variant { variant, .. } => &variant.database_tags,
        }
    }

    /// Variants run as the same kind as their parent type.
    pub fn kind(&self) -> ServerKind {
        match self {
            Self::Type(t) => t.kind,
            Self::Variant { parent, .. } => parent.kind,
        }
    }
}

/// Validated, immutable view of the fleet document.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    types: Vec<TypeDefinition>,
    vps: Vec<VpsDefinition>,
    index: HashMap<String, Locator>,
    vps_ids: HashSet<String>,
}

impl ConfigSnapshot {
    pub fn parse(document: &str) -> Result<Self, ConfigError> {
        let raw: RawDocument = serde_json::from_str(document)?;
        Self::build(raw)
    }

    fn build(raw: RawDocument) -> Result<Self, ConfigError> {
        let mut issues = Vec::new();
        let mut index: HashMap<String, Locator> = HashMap::new();
        let mut types = Vec::with_capacity(raw.types.len());

        let mut register = |id: &str, locator: Locator, path: String, issues: &mut Vec<ConfigIssue>| {
            if index.contains_key(id) {
                issues.push(ConfigIssue {
                    path,
                    message: format!("duplicate identifier {id:?}"),
                });
            } else {
                index.insert(id.to_string(), locator);
            }
        };

        for (i, t) in raw.types.into_iter().enumerate() {
            register(
                &t.id,
                Locator {
                    type_index: i,
                    variant_index: None,
                },
                format!("types[{i}].id"),
                &mut issues,
            );

            let variants = t
                .variants
                .unwrap_or_default()
                .into_iter()
                .enumerate()
                .map(|(j, v)| {
                    register(
                        &v.id,
                        Locator {
                            type_index: i,
                            variant_index: Some(j),
                        },
                        format!("types[{i}].variants[{j}].id"),
                        &mut issues,
                    );
                    VariantDefinition {
                        id: v.id,
                        ports: PortRange {
                            min: v.port_min,
                            max: v.port_max,
                        },
                        database_tags: v.database_tags.unwrap_or_default(),
                    }
                })
                .collect();

            types.push(TypeDefinition {
                id: t.id,
                ports: PortRange {
                    min: t.port_min,
                    max: t.port_max,
                },
                database_tags: t.database_tags.unwrap_or_default(),
                kind: t.kind.unwrap_or_default(),
                variants,
            });
        }

        let mut vps_ids = HashSet::new();
        let mut vps = Vec::with_capacity(raw.vps.len());
        for (i, v) in raw.vps.into_iter().enumerate() {
            if !vps_ids.insert(v.id.clone()) {
                issues.push(ConfigIssue {
                    path: format!("vps[{i}].id"),
                    message: format!("duplicate vps {:?}", v.id),
                });
            }
            vps.push(VpsDefinition {
                id: v.id,
                max_servers: v.max_servers,
                overrides: v
                    .config
                    .unwrap_or_default()
                    .into_iter()
                    .map(|o| ConfigOverride {
                        r#type: o.r#type,
                        port_min: o.port_min,
                        port_max: o.port_max,
                    })
                    .collect(),
            });
        }

        if !issues.is_empty() {
            return Err(ConfigError::Invalid(issues));
        }

        Ok(Self {
            types,
            vps,
            index,
            vps_ids,
        })
    }

    pub fn locate(&self, id: &str) -> Option<Locator> {
        self.index.get(id).copied()
    }

    pub fn resolve(&self, id: &str) -> Option<Definition<'_>> {
        let locator = self.locate(id)?;
        let parent = self.types.get(locator.type_index)?;
        match locator.variant_index {
            None => Some(Definition::Type(parent)),
            Some(j) => parent
                .variants
                .get(j)
                .map(|variant| Definition::Variant { parent, variant }),
        }
    }

    pub fn types(&self) -> &[TypeDefinition] {
        &self.types
    }

    pub fn vps(&self) -> &[VpsDefinition] {
        &self.vps
    }

    pub fn vps_exists(&self, id: &str) -> bool {
        self.vps_ids.contains(id)
    }

    pub fn find_vps(&self, id: &str) -> Option<&VpsDefinition> {
        self.vps.iter().find(|v| v.id == id)
    }

    /// Every registered type and variant id.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }
}

// ── Store ────────────────────────────────────────────────────────────

#[derive(Debug)]
enum ConfigSource {
    File(PathBuf),
    Inline(String),
}

/// Lazily loaded fleet configuration.
///
/// The first query loads and validates the document; concurrent first
/// queries wait on the same load. The outcome, snapshot or error, is final.
///
/// Loading from a file does blocking I/O on the calling thread. Call
/// [`ConfigStore::load`] once at start-up, before serving traffic, so the
/// read never lands on an async worker.
#[derive(Debug)]
pub struct ConfigStore {
    source: ConfigSource,
    loaded: OnceLock<Result<ConfigSnapshot, ConfigError>>,
}

impl ConfigStore {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: ConfigSource::File(path.into()),
            loaded: OnceLock::new(),
        }
    }

    pub fn from_json(document: impl Into<String>) -> Self {
        Self {
            source: ConfigSource::Inline(document.into()),
            loaded: OnceLock::new(),
        }
    }

    /// Load the document if that has not happened yet and return the outcome.
    pub fn load(&self) -> Result<&ConfigSnapshot, ConfigError> {
        self.loaded
            .get_or_init(|| self.read_and_validate())
            .as_ref()
            .map_err(Clone::clone)
    }

    fn read_and_validate(&self) -> Result<ConfigSnapshot, ConfigError> {
        let result = match &self.source {
            ConfigSource::File(path) => std::fs::read_to_string(path)
                .map_err(|e| ConfigError::Read {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })
                .and_then(|doc| ConfigSnapshot::parse(&doc)),
            ConfigSource::Inline(doc) => ConfigSnapshot::parse(doc),
        };
        match &result {
            Ok(snapshot) => tracing::info!(
                types = snapshot.types.len(),
                identifiers = snapshot.index.len(),
                vps = snapshot.vps.len(),
                "fleet config loaded"
            ),
            Err(e) => tracing::error!(error = %e, "fleet config rejected"),
        }
        result
    }

    pub fn exists(&self, id: &str) -> Result<bool, ConfigError> {
        Ok(self.load()?.locate(id).is_some())
    }

    pub fn resolve(&self, id: &str) -> Result<Option<Definition<'_>>, ConfigError> {
        Ok(self.load()?.resolve(id))
    }

    pub fn vps_exists(&self, id: &str) -> Result<bool, ConfigError> {
        Ok(self.load()?.vps_exists(id))
    }

    pub fn vps(&self, id: &str) -> Result<Option<&VpsDefinition>, ConfigError> {
        Ok(self.load()?.find_vps(id))
    }

    /// The recorded load failure, if any.
    pub fn last_error(&self) -> Option<ConfigError> {
        self.load().err()
    }
}
