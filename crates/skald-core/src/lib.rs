pub mod canon;
pub mod config;
pub mod hash;
pub mod paths;
pub mod ts;
pub mod types;

pub use config::{ConfigError, SkaldConfig};
pub use types::*;
