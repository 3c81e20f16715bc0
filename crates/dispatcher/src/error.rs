//! Dispatcher error types

use thiserror::Error;

/// Sink setup failures; nothing after startup is fatal to the dispatcher
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// A sink rejected its parameters or could not open its target
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Two sinks share a name, so their metrics could not be told apart
    #[error("duplicate sink name '{name}'")]
    DuplicateSink { name: String },

    /// A sink queue must hold at least one frame
    #[error("sink '{name}' has a zero queue capacity")]
    ZeroQueueCapacity { name: String },
}

impl DispatcherError {
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
