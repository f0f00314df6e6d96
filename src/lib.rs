//! # a3s-emitter
//!
//! Strictly-typed, in-process event emitter for the A3S ecosystem.
//!
//! ## Overview
//!
//! `a3s-emitter` associates named events with ordered lists of listeners
//! and invokes them synchronously when an event is emitted. Dispatch is
//! fault-isolated: a listener that returns an error or panics is reported
//! to a diagnostic sink and the remaining listeners still run.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_emitter::{Callback, EventEmitter};
//!
//! let emitter: EventEmitter<&str, u32> = EventEmitter::new();
//!
//! let audit = Callback::infallible(|n: &u32| println!("audit {}", n));
//! let first_only = Callback::infallible(|n: &u32| println!("first {}", n));
//!
//! emitter
//!     .on("order.placed", audit.clone())
//!     .once("order.placed", first_only);
//!
//! assert!(emitter.emit("order.placed", &42)); // both run
//! assert!(emitter.emit("order.placed", &7)); // only `audit`
//!
//! emitter.off_event("order.placed");
//! assert!(!emitter.emit("order.placed", &1));
//! ```
//!
//! ## Architecture
//!
//! - **EventEmitter** — listener registry keyed by any hashable identifier
//! - **TypedEmitter** — one channel per [`Event`] type, payloads checked at compile time
//! - **Callback** — opaque listener handle; identity is used for removal
//! - **DiagnosticSink** — receives threshold warnings and listener faults
//!   (`TracingSink` by default, `MemorySink` for tests)

pub mod config;
pub mod diagnostics;
pub mod emitter;
pub mod error;
pub mod listener;
pub mod typed;

// Re-export core types
pub use config::{EmitterConfig, MaxListenersPolicy, DEFAULT_MAX_LISTENERS};
pub use diagnostics::{Diagnostic, DiagnosticSink, MemorySink, TracingSink};
pub use emitter::{DispatchReport, EventEmitter, ListenerFault};
pub use error::{EmitterError, ListenerError, Result};
pub use listener::{Callback, Listener, ListenerId, ListenerKind, Placement};
pub use typed::{Event, TypedEmitter};
