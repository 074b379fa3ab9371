/// Rescue Identity Library
///
/// Token and authority core for the SOS/rescue platform.
///
/// ## Modules
///
/// - `config`: Service configuration
/// - `core`: `IdentityCore` facade over every operation
/// - `db`: Store traits with Postgres and in-memory backends
/// - `error`: Error types
/// - `http`: Internal JSON API
/// - `metrics`: Prometheus counters
/// - `models`: Roles, claims, invites, missions, audit entries
/// - `security`: Issuance, validation, revocation ledger, refresh rotation, permissions
/// - `services`: Authority rules, invite engine, mission engine, audit trail
/// - `validators`: Input validation
pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod http;
pub mod metrics;
pub mod models;
pub mod security;
pub mod services;
pub mod validators;

// Re-export commonly used types
pub use crate::core::{CoreStores, IdentityCore, IssueTokenRequest};
pub use error::{IdentityError, Result};
