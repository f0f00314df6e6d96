//! Error types for a3s-emitter

use thiserror::Error;

/// Error type a fallible listener returns from its callback
pub type ListenerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in the emitter
#[derive(Debug, Error)]
pub enum EmitterError {
    /// A listener returned an error during dispatch
    #[error("Listener for event '{event}' failed: {source}")]
    ListenerFailed {
        event: String,
        #[source]
        source: ListenerError,
    },

    /// A listener panicked during dispatch
    #[error("Listener for event '{event}' panicked: {message}")]
    ListenerPanicked { event: String, message: String },

    /// Registration refused under the reject policy
    #[error("Event '{event}' already has {count} listeners (max {max})")]
    MaxListenersExceeded {
        event: String,
        count: usize,
        max: usize,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EmitterError {
    /// Short stable label for logs
    pub fn as_label(&self) -> &'static str {
        match self {
            EmitterError::ListenerFailed { .. } => "listener_failed",
            EmitterError::ListenerPanicked { .. } => "listener_panicked",
            EmitterError::MaxListenersExceeded { .. } => "max_listeners_exceeded",
            EmitterError::Config(_) => "config",
            EmitterError::Serialization(_) => "serialization",
        }
    }

    /// Whether this error was raised by listener code during dispatch
    pub fn is_listener_fault(&self) -> bool {
        matches!(
            self,
            EmitterError::ListenerFailed { .. } | EmitterError::ListenerPanicked { .. }
        )
    }
}

/// Result type alias for emitter operations
pub type Result<T> = std::result::Result<T, EmitterError>;
