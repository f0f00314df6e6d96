//! Statically typed events
//!
//! Each event is a type implementing [`Event`], which fixes its payload
//! type. `TypedEmitter` keeps one listener channel per event type, so a
//! callback for the wrong payload does not compile:
//!
//! ```rust
//! use a3s_emitter::{Callback, Event, TypedEmitter};
//!
//! struct UserCreated;
//! impl Event for UserCreated {
//!     type Payload = String;
//!     const NAME: &'static str = "user.created";
//! }
//!
//! let emitter = TypedEmitter::new();
//! emitter.on::<UserCreated>(Callback::infallible(|name: &String| {
//!     println!("welcome {}", name);
//! }));
//!
//! assert!(emitter.emit::<UserCreated>(&"ada".to_string()));
//! assert_eq!(emitter.events(), vec!["user.created"]);
//! ```

use crate::config::EmitterConfig;
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::emitter::{DispatchReport, EventEmitter};
use crate::error::Result;
use crate::listener::Callback;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// An event type and the payload its listeners receive
pub trait Event: 'static {
    /// Payload passed by reference to every listener
    type Payload: ?Sized + 'static;

    /// Name used in diagnostics and by `TypedEmitter::events`
    const NAME: &'static str;
}

type Channel<P> = EventEmitter<&'static str, P>;

/// Type-erased view of one event's channel
trait ErasedChannel: Send + Sync {
    fn name(&self) -> &'static str;
    fn listener_count(&self) -> usize;
    fn clear(&self);
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

struct Named<P: ?Sized> {
    name: &'static str,
    emitter: Channel<P>,
}

impl<P: ?Sized + 'static> ErasedChannel for Named<P> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn listener_count(&self) -> usize {
        self.emitter.listener_count(self.name)
    }

    fn clear(&self) {
        self.emitter.off_all();
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Emitter whose events are types
///
/// Every event type gets its own `EventEmitter`, created on first
/// registration and sharing this emitter's configuration and sink.
pub struct TypedEmitter {
    channels: RwLock<HashMap<TypeId, Arc<dyn ErasedChannel>>>,
    config: EmitterConfig,
    sink: Arc<dyn DiagnosticSink>,
}

impl TypedEmitter {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            config: EmitterConfig::default(),
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_config(config: EmitterConfig) -> Result<Self> {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    pub fn with_sink(config: EmitterConfig, sink: Arc<dyn DiagnosticSink>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            channels: RwLock::new(HashMap::new()),
            config,
            sink,
        })
    }

    fn lookup<E: Event>(&self) -> Option<Arc<Named<E::Payload>>> {
        let channel = self
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<E>())
            .cloned()?;
        channel.into_any().downcast::<Named<E::Payload>>().ok()
    }

    fn channel<E: Event>(&self) -> Arc<Named<E::Payload>> {
        if let Some(channel) = self.lookup::<E>() {
            return channel;
        }

        let created: Arc<Named<E::Payload>> = Arc::new(Named {
            name: E::NAME,
            emitter: EventEmitter::from_parts(self.config.clone(), self.sink.clone()),
        });

        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        let entry = channels
            .entry(TypeId::of::<E>())
            .or_insert_with(|| created.clone() as Arc<dyn ErasedChannel>)
            .clone();
        drop(channels);

        // Another thread may have won the race; its channel is the live one
        entry
            .into_any()
            .downcast::<Named<E::Payload>>()
            .unwrap_or(created)
    }

    // ─── Registration ────────────────────────────────────────────

    pub fn on<E: Event>(&self, callback: Callback<E::Payload>) -> &Self {
        self.channel::<E>().emitter.on(E::NAME, callback);
        self
    }

    pub fn prepend<E: Event>(&self, callback: Callback<E::Payload>) -> &Self {
        self.channel::<E>().emitter.prepend(E::NAME, callback);
        self
    }

    pub fn once<E: Event>(&self, callback: Callback<E::Payload>) -> &Self {
        self.channel::<E>().emitter.once(E::NAME, callback);
        self
    }

    pub fn prepend_once<E: Event>(&self, callback: Callback<E::Payload>) -> &Self {
        self.channel::<E>().emitter.prepend_once(E::NAME, callback);
        self
    }

    // ─── Removal ─────────────────────────────────────────────────

    pub fn off<E: Event>(&self, callback: &Callback<E::Payload>) -> &Self {
        if let Some(channel) = self.lookup::<E>() {
            channel.emitter.off(E::NAME, callback);
        }
        self
    }

    pub fn off_event<E: Event>(&self) -> &Self {
        if let Some(channel) = self.lookup::<E>() {
            channel.emitter.off_event(E::NAME);
        }
        self
    }

    pub fn off_all(&self) -> &Self {
        let channels: Vec<Arc<dyn ErasedChannel>> = self
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for channel in channels {
            channel.clear();
        }
        self
    }

    // ─── Dispatch ────────────────────────────────────────────────

    pub fn emit<E: Event>(&self, payload: &E::Payload) -> bool {
        self.emit_with_report::<E>(payload).is_some()
    }

    pub fn emit_with_report<E: Event>(&self, payload: &E::Payload) -> Option<DispatchReport> {
        self.lookup::<E>()?
            .emitter
            .emit_with_report(E::NAME, payload)
    }

    // ─── Introspection ───────────────────────────────────────────

    pub fn listeners<E: Event>(&self) -> Vec<Callback<E::Payload>> {
        self.lookup::<E>()
            .map(|channel| channel.emitter.listeners(E::NAME))
            .unwrap_or_default()
    }

    pub fn listener_count<E: Event>(&self) -> usize {
        self.lookup::<E>()
            .map_or(0, |channel| channel.emitter.listener_count(E::NAME))
    }

    /// Names of event types with at least one listener
    pub fn events(&self) -> Vec<&'static str> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|channel| channel.listener_count() > 0)
            .map(|channel| channel.name())
            .collect()
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }
}

impl Default for TypedEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypedEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedEmitter")
            .field("events", &self.events())
            .field("config", &self.config)
            .finish()
    }
}
