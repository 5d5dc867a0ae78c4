//! cloudcfg: handler build selection for the cloud storage mountlist
//!
//! This library exposes cloudcfg's core functionality for use in property-based tests.
//! The main binary is at src/main.rs.

pub mod cli;
pub mod config;
pub mod detect;
pub mod disk_space;
pub mod error_helpers;
pub mod logger;
pub mod mountlist;
pub mod preview;
pub mod probe;
pub mod sink;
pub mod status;
pub mod token;
pub mod transform;
pub mod variant;

// Re-export commonly used types for convenience
pub use detect::detect_variant;
pub use mountlist::{Applied, Mountlist, MountlistError, StaleBackupPolicy, UpdateOptions};
pub use sink::{LogSink, MemorySink, NullSink};
pub use transform::{transform, ReplacementTable};
pub use variant::{Service, Variant};
