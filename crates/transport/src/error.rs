//! Transport error types

use contracts::ContractError;
use thiserror::Error;

/// Transport specific error
#[derive(Debug, Error)]
pub enum TransportError {
    /// Locator refused by the source
    #[error("locator '{locator}' rejected: {message}")]
    LocatorRejected { locator: String, message: String },

    /// Emission frequency not usable
    #[error("invalid frequency {frequency_hz} Hz")]
    InvalidFrequency { frequency_hz: f64 },

    /// Delivery thread could not be started
    #[error("failed to spawn delivery thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl TransportError {
    /// Create locator rejected error
    pub fn locator_rejected(locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LocatorRejected {
            locator: locator.into(),
            message: message.into(),
        }
    }
}

impl From<TransportError> for ContractError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::LocatorRejected { locator, message } => {
                ContractError::subscription(locator, message)
            }
            TransportError::Contract(inner) => inner,
            other => ContractError::TransportUnavailable {
                message: other.to_string(),
            },
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, TransportError>;
