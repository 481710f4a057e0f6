pub mod manifest;
pub mod resolver;

pub use resolver::{CapabilityResolver, EffectiveSetting, SettingSource};
