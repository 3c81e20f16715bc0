//! # Dispatcher
//!
//! Fan-out of published records to sinks.
//!
//! Responsibilities:
//! - Accept records from the bridge without blocking it ([`DispatchOutput`])
//! - Fan-out to multiple sinks
//! - Isolate slow sinks so they never stall the publish cycle
//! - Drop frames, never calibration, when a queue is full ([`queue`])

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod output;
pub mod queue;
pub mod sinks;

pub use contracts::{DataSink, PublishedRecord};
pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use output::{dispatch_channel, DispatchOutput};
pub use queue::{record_queue, RecordReceiver, RecordSender, SendOutcome};
pub use sinks::{FileSink, LogSink, NetworkSink};
