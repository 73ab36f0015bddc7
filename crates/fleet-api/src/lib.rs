//! Authoritative lifecycle of game servers in the fleet.
//!
//! [`registry::ServerRegistry`] is the entry point. It checks capabilities
//! through [`auth::AuthorizationGate`], validates against the fleet document
//! held by [`fleet_config::ConfigStore`], and persists through the
//! collaborator traits in `fleet_infra`.

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod fleet_config;
pub mod locks;
pub mod registry;
pub mod state;
pub mod validate;

pub use error::{ErrorKind, RegistryError};
