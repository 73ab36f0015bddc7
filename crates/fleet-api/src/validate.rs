//! Per-field checks for server requests. Each returns the matching
//! [`RegistryError`] so callers can chain them with `?`.

use std::net::IpAddr;

use fleet_db::models::ServerStatus;

use crate::error::RegistryError;

pub const MAX_NAME_LEN: usize = 32;
pub const MAX_TYPE_LEN: usize = 16;
/// Applies to both address families; short IPv6 forms like `::1` fit.
pub const MAX_IP_LEN: usize = 15;

pub fn name(name: &str) -> Result<(), RegistryError> {
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(RegistryError::InvalidName);
    }
    Ok(())
}

pub fn server_type(server_type: &str) -> Result<(), RegistryError> {
    let len = server_type.chars().count();
    if len == 0 || len > MAX_TYPE_LEN {
        return Err(RegistryError::InvalidType);
    }
    Ok(())
}

pub fn ip(ip: &str) -> Result<IpAddr, RegistryError> {
    if ip.len() > MAX_IP_LEN {
        return Err(RegistryError::InvalidIp);
    }
    ip.parse().map_err(|_| RegistryError::InvalidIp)
}

pub fn port(port: i64) -> Result<u16, RegistryError> {
    u16::try_from(port)
        .ok()
        .filter(|p| *p != 0)
        .ok_or(RegistryError::InvalidPort)
}

/// Server ids are non-empty runs of hex digits.
pub fn server_id(id: &str) -> Result<(), RegistryError> {
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(RegistryError::InvalidId);
    }
    Ok(())
}

/// A status a client may request through a status update.
pub fn requested_status(status: &str) -> Result<ServerStatus, RegistryError> {
    status
        .parse::<ServerStatus>()
        .ok()
        .filter(ServerStatus::is_client_settable)
        .ok_or(RegistryError::InvalidStatus)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_length_bounds() {
        assert!(name("koth_1").is_ok());
        assert!(name(&"a".repeat(32)).is_ok());
        assert!(matches!(name(""), Err(RegistryError::InvalidName)));
        assert!(matches!(name(&"a".repeat(33)), Err(RegistryError::InvalidName)));
    }

    #[test]
    fn type_length_bounds() {
        assert!(server_type("KOTH").is_ok());
        assert!(server_type(&"T".repeat(16)).is_ok());
        assert!(matches!(server_type(""), Err(RegistryError::InvalidType)));
        assert!(matches!(
            server_type(&"T".repeat(17)),
            Err(RegistryError::InvalidType)
        ));
    }

    #[test]
    fn ip_literals() {
        assert!(ip("127.0.0.1").is_ok());
        assert!(ip("255.255.255.255").is_ok());
        assert!(ip("::1").is_ok());
        assert!(ip("fe80::1:2:3").is_ok());
        for bad in ["", "localhost", "256.0.0.1", "127.0.0.1 ", "1.2.3", "::g"] {
            assert!(matches!(ip(bad), Err(RegistryError::InvalidIp)), "{bad:?}");
        }
    }

    #[test]
    fn ip_longer_than_fifteen_chars_is_rejected_for_any_family() {
        assert!(ip("1234:5678::abcd").is_ok());
        for long in ["2001:db8::ff00:42:8329", "::ffff:255.255.255.255", "1234:5678::abcde"] {
            assert!(matches!(ip(long), Err(RegistryError::InvalidIp)), "{long:?}");
        }
    }

    #[test]
    fn port_range() {
        assert_eq!(port(1).unwrap(), 1);
        assert_eq!(port(65535).unwrap(), 65535);
        for bad in [0, -1, 65536, i64::MAX] {
            assert!(matches!(port(bad), Err(RegistryError::InvalidPort)), "{bad}");
        }
    }

    #[test]
    fn ids_are_hex() {
        assert!(server_id("0a1B2c").is_ok());
        assert!(matches!(server_id(""), Err(RegistryError::InvalidId)));
        assert!(matches!(server_id("xyz"), Err(RegistryError::InvalidId)));
        assert!(matches!(server_id("12-34"), Err(RegistryError::InvalidId)));
    }

    #[test]
    fn only_client_settable_statuses_are_accepted() {
        assert_eq!(requested_status("WAITING").unwrap(), ServerStatus::Waiting);
        assert_eq!(requested_status("STARTED").unwrap(), ServerStatus::Started);
        assert_eq!(requested_status("ENDING").unwrap(), ServerStatus::Ending);
        for bad in ["STARTING", "ENDED", "started", "", "PAUSED"] {
            assert!(
                matches!(requested_status(bad), Err(RegistryError::InvalidStatus)),
                "{bad}"
            );
        }
    }
}
