pub mod health;
pub mod redactions;
pub mod settings;
pub mod webhooks;
