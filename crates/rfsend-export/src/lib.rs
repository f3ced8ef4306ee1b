//! The publish pipeline.
//!
//! A reading that passes the change gate is rendered into a fixed-capacity
//! payload buffer, pushed to the sink in a single HTTP exchange, and the
//! response body is captured through a fixed-capacity sink that can never
//! overrun. One reading is in flight at a time; the orchestrator owns both
//! buffers and reuses them across publishes.

pub mod buffer;
pub mod publish;
pub mod response;
pub mod serialize;
pub mod transport;

pub use buffer::PayloadBuf;
pub use publish::{Publisher, PublisherOptions, PublishStats, SkipReason};
pub use response::ResponseSink;
pub use serialize::render;
pub use transport::{PublishOutcome, TransportClient, TransportOptions};
