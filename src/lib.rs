//! Passgroup - declarative group management for encrypted password databases.
//!
//! Given a group name and an action (create, modify, delete), opens an
//! encrypted database, reconciles the group and reports whether anything changed.

pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod group;
pub mod logging;
pub mod module;
pub mod params;
pub mod reconciler;
pub mod secret;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{GroupError, Result};
pub use group::{Group, GroupReport};
pub use logging::{LogConfig, init_logging};
pub use params::{Action, GroupRequest, ModuleArgs};
pub use reconciler::{GroupMatch, Outcome, Reconciler};
pub use secret::SensitiveString;
pub use store::{CredentialStore, Credentials, Database};
