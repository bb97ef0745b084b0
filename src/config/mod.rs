//! Server configuration: TOML file plus environment overrides.

pub mod types;
pub mod loader;

pub use types::*;
pub use loader::*;
