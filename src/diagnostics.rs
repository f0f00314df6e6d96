//! Diagnostic sink — where the emitter reports threshold warnings and listener faults
//!
//! The emitter never surfaces these conditions to its callers. Instead it
//! hands them to a `DiagnosticSink`. `TracingSink` is the default and logs
//! through `tracing`; `MemorySink` keeps them for inspection.

use crate::listener::ListenerId;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{PoisonError, RwLock};

/// A condition reported by the emitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// An event reached its configured listener threshold
    MaxListenersExceeded {
        /// Debug rendering of the event identifier
        event: String,
        /// Listener count after the registration
        count: usize,
        /// Configured threshold
        max: usize,
    },

    /// A listener failed or panicked during dispatch
    ListenerFault {
        event: String,
        listener: ListenerId,
        /// Rendered fault message
        error: String,
        /// `true` if the listener panicked rather than returning an error
        panicked: bool,
    },
}

impl Diagnostic {
    /// Human-readable message
    pub fn message(&self) -> String {
        match self {
            Diagnostic::MaxListenersExceeded { event, count, max } => format!(
                "Possible listener leak: {} listeners registered for event {} (maxListeners is {})",
                count, event, max
            ),
            Diagnostic::ListenerFault {
                event,
                listener,
                error,
                ..
            } => format!("Listener {} for event {} faulted: {}", listener, event, error),
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Diagnostic::MaxListenersExceeded { .. })
    }
}

/// Receiver of emitter diagnostics
///
/// Implementations must not call back into the emitter that reports to them.
/// A panic inside `report` is contained by `deliver` and never reaches the
/// emitter's caller.
pub trait DiagnosticSink: Send + Sync {
    /// Handle a single diagnostic
    fn report(&self, diagnostic: &Diagnostic);
}

/// Hand a diagnostic to a sink, containing any panic it raises
pub(crate) fn deliver(sink: &dyn DiagnosticSink, diagnostic: &Diagnostic) {
    if catch_unwind(AssertUnwindSafe(|| sink.report(diagnostic))).is_err() {
        tracing::debug!(
            diagnostic = %diagnostic.message(),
            "Diagnostic sink panicked, diagnostic dropped"
        );
    }
}

/// Default sink: structured `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: &Diagnostic) {
        match diagnostic {
            Diagnostic::MaxListenersExceeded { event, count, max } => {
                tracing::warn!(
                    event = %event,
                    count = *count,
                    max = *max,
                    "Possible listener leak: listener count reached maxListeners"
                );
            }
            Diagnostic::ListenerFault {
                event,
                listener,
                error,
                panicked,
            } => {
                tracing::error!(
                    event = %event,
                    listener = %listener,
                    panicked = *panicked,
                    error = %error,
                    "Listener faulted during emit"
                );
            }
        }
    }
}

/// In-memory sink for tests and introspection
///
/// Keeps at most `max_entries` diagnostics, dropping the oldest.
pub struct MemorySink {
    entries: RwLock<Vec<Diagnostic>>,
    max_entries: usize,
}

impl MemorySink {
    /// Create a new in-memory sink
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            max_entries,
        }
    }

    /// All recorded diagnostics, oldest first
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of recorded threshold warnings
    pub fn warnings(&self) -> usize {
        self.entries().iter().filter(|d| d.is_warning()).count()
    }

    /// Number of recorded listener faults
    pub fn faults(&self) -> usize {
        self.entries().iter().filter(|d| !d.is_warning()).count()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(1_000)
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, diagnostic: &Diagnostic) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.push(diagnostic.clone());

        if self.max_entries > 0 && entries.len() > self.max_entries {
            let drain_count = entries.len() - self.max_entries;
            entries.drain(..drain_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warning(count: usize) -> Diagnostic {
        Diagnostic::MaxListenersExceeded {
            event: "\"tick\"".to_string(),
            count,
            max: 2,
        }
    }

    #[test]
    fn test_warning_message() {
        let msg = warning(3).message();
        assert!(msg.contains("3 listeners"));
        assert!(msg.contains("maxListeners is 2"));
        assert!(warning(3).is_warning());
    }

    #[test]
    fn test_fault_message() {
        let d = Diagnostic::ListenerFault {
            event: "\"tick\"".to_string(),
            listener: ListenerId::next(),
            error: "boom".to_string(),
            panicked: false,
        };
        assert!(d.message().ends_with("faulted: boom"));
        assert!(!d.is_warning());
    }

    #[test]
    fn test_memory_sink_records() {
        let sink = MemorySink::default();
        assert!(sink.is_empty());

        sink.report(&warning(2));
        sink.report(&Diagnostic::ListenerFault {
            event: "\"tick\"".to_string(),
            listener: ListenerId::next(),
            error: "boom".to_string(),
            panicked: true,
        });

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.warnings(), 1);
        assert_eq!(sink.faults(), 1);

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_memory_sink_max_capacity() {
        let sink = MemorySink::new(3);
        for i in 0..5 {
            sink.report(&warning(i));
        }

        let entries = sink.entries();
        assert_eq!(entries.len(), 3);
        // Oldest entries drained
        assert_eq!(entries[0], warning(2));
        assert_eq!(entries[2], warning(4));
    }

    struct PanickingSink;

    impl DiagnosticSink for PanickingSink {
        fn report(&self, _diagnostic: &Diagnostic) {
            panic!("sink is broken");
        }
    }

    #[test]
    fn test_deliver_contains_sink_panic() {
        deliver(&PanickingSink, &warning(1));
        deliver(&TracingSink, &warning(1));
    }
}
