//! Sigil Core - Shared infrastructure for the sigil session crates
//!
//! Configuration errors, configuration loading and logging bootstrap used by every crate in
//! the workspace

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
pub use logging::*;

// Referenced by the exported logging macros
pub use tracing;
