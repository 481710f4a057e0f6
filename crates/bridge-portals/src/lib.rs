pub mod bootstrap;
pub mod db;
pub mod error;
pub mod factory;
pub mod redaction;
pub mod state;
pub mod store;

pub use bootstrap::{bootstrap, schedule_bootstrap};
pub use error::{PortalError, Result};
pub use factory::{ChatFactory, InitPortalOptions};
pub use redaction::redact_message;
pub use state::{update_portal_config, ModelSwitchChoreography, SettingsUpdate, ToolInfo};
pub use store::PortalStore;
