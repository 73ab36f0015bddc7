use fleet_db::models::ServerStatus;
use fleet_infra::Scope;

use crate::fleet_config::ConfigError;

/// Coarse class of a [`RegistryError`], for whatever transport embeds the
/// registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Forbidden,
    InvalidArgument,
    NotFound,
    Conflict,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("forbidden: missing scope {0}")]
    Forbidden(Scope),

    #[error("invalid server name")]
    InvalidName,

    #[error("invalid server type")]
    InvalidType,

    #[error("invalid server ip")]
    InvalidIp,

    #[error("invalid server port")]
    InvalidPort,

    #[error("caller is not a configured vps")]
    InvalidVps,

    #[error("invalid server id")]
    InvalidId,

    #[error("invalid server status")]
    InvalidStatus,

    #[error("server not found")]
    NotFound,

    #[error("status must come after current status {current}")]
    StatusNotAfter { current: ServerStatus },

    #[error("server has already ended")]
    AlreadyEnded,

    #[error("vps {vps_id} runs {open}/{max} servers")]
    LimitExceeded { vps_id: String, open: i64, max: i64 },

    #[error("fleet config unavailable: {0}")]
    ConfigLoadFailed(#[from] ConfigError),

    #[error("server could not be saved")]
    SavingFailed,

    /// Compensating delete after a failed credential issuance did not go
    /// through; the server record is orphaned.
    #[error("rollback of server {id} failed, record left orphaned")]
    RollbackFailed { id: String },

    #[error("repository error: {0}")]
    Repository(#[from] fleet_infra::Error),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Forbidden(_) | Self::LimitExceeded { .. } => ErrorKind::Forbidden,
            Self::InvalidName
            | Self::InvalidType
            | Self::InvalidIp
            | Self::InvalidPort
            | Self::InvalidVps
            | Self::InvalidId
            | Self::InvalidStatus => ErrorKind::InvalidArgument,
            Self::NotFound => ErrorKind::NotFound,
            Self::StatusNotAfter { .. } | Self::AlreadyEnded => ErrorKind::Conflict,
            Self::ConfigLoadFailed(_)
            | Self::SavingFailed
            | Self::RollbackFailed { .. }
            | Self::Repository(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Forbidden => 403,
            ErrorKind::InvalidArgument => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Internal => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        assert_eq!(RegistryError::Forbidden(Scope::DeleteServer).status_code(), 403);
        assert_eq!(RegistryError::InvalidPort.status_code(), 400);
        assert_eq!(RegistryError::NotFound.status_code(), 404);
        assert_eq!(
            RegistryError::StatusNotAfter {
                current: ServerStatus::Started
            }
            .status_code(),
            409
        );
        assert_eq!(RegistryError::AlreadyEnded.kind(), ErrorKind::Conflict);
        assert_eq!(RegistryError::SavingFailed.status_code(), 500);
        assert_eq!(
            RegistryError::RollbackFailed { id: "ab".into() }.kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn status_not_after_names_current_status() {
        let err = RegistryError::StatusNotAfter {
            current: ServerStatus::Started,
        };
        assert_eq!(
            err.to_string(),
            "status must come after current status STARTED"
        );
    }
}
