//! Core types for rfsend.
//!
//! Everything the pipeline crates share lives here: the decoded reading
//! model, the change mask, sink selection, the change tracker that decides
//! what counts as news, and the TOML configuration schema.

pub mod config;
pub mod mask;
pub mod reading;
pub mod sink;
pub mod tracker;

pub use config::{ConfigError, ConfigLoader, ConfigResult, SenderConfig};
pub use mask::ChangeMask;
pub use reading::{Celsius, DecodedReading, SensorKey};
pub use sink::{SinkKind, SinkTarget};
pub use tracker::ChangeTracker;
