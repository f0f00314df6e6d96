//! Listener registry and synchronous dispatch
//!
//! `EventEmitter` maps event identifiers to ordered listener sequences and
//! invokes them on `emit`. Dispatch works on a snapshot of the sequence
//! taken when `emit` starts, so listeners may add or remove listeners
//! (including themselves) while being invoked. One-shot listeners from the
//! snapshot are removed after every listener has run.
//!
//! All operations take `&self`. The registry lock is held only while the
//! mapping is read or mutated, never while a listener runs.

use crate::config::{EmitterConfig, MaxListenersPolicy};
use crate::diagnostics::{deliver, Diagnostic, DiagnosticSink, TracingSink};
use crate::error::{EmitterError, Result};
use crate::listener::{Callback, Listener, ListenerId, ListenerKind, Placement};
use std::any::Any;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A listener invocation that failed during dispatch
#[derive(Debug)]
pub struct ListenerFault {
    /// The record that faulted
    pub listener: ListenerId,

    /// `ListenerFailed` or `ListenerPanicked`
    pub error: EmitterError,
}

/// Outcome of one dispatch pass
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Number of listeners invoked (the snapshot size)
    pub invoked: usize,

    /// Faults captured, in invocation order
    pub faults: Vec<ListenerFault>,
}

impl DispatchReport {
    /// True if every listener returned normally
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }

    /// Number of listeners that returned normally
    pub fn succeeded(&self) -> usize {
        self.invoked - self.faults.len()
    }
}

/// In-process event emitter
///
/// `K` is the event identifier, `A` the payload every listener of this
/// emitter receives by reference.
///
/// ```rust
/// use a3s_emitter::{Callback, EventEmitter};
///
/// let emitter: EventEmitter<&str, u32> = EventEmitter::new();
/// let log = Callback::infallible(|n: &u32| println!("got {}", n));
///
/// emitter.on("tick", log.clone()).once("tick", log.clone());
/// assert!(emitter.emit("tick", &1));
/// assert_eq!(emitter.listener_count("tick"), 1);
///
/// emitter.off("tick", &log);
/// assert!(!emitter.emit("tick", &2));
/// ```
pub struct EventEmitter<K, A: ?Sized> {
    /// Event → listeners in dispatch order. Never holds an empty sequence.
    listeners: RwLock<HashMap<K, Vec<Listener<A>>>>,

    max_listeners: AtomicUsize,

    policy: MaxListenersPolicy,

    sink: Arc<dyn DiagnosticSink>,
}

impl<K, A> EventEmitter<K, A>
where
    K: Eq + Hash + Clone + fmt::Debug,
    A: ?Sized,
{
    /// Create an empty emitter with the default configuration
    pub fn new() -> Self {
        Self::from_parts(EmitterConfig::default(), Arc::new(TracingSink))
    }

    /// Create an empty emitter with a custom configuration
    pub fn with_config(config: EmitterConfig) -> Result<Self> {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    /// Create an empty emitter reporting to a custom diagnostic sink
    pub fn with_sink(config: EmitterConfig, sink: Arc<dyn DiagnosticSink>) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(config, sink))
    }

    pub(crate) fn from_parts(config: EmitterConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            max_listeners: AtomicUsize::new(config.max_listeners),
            policy: config.policy,
            sink,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<K, Vec<Listener<A>>>> {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, Vec<Listener<A>>>> {
        self.listeners.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ─── Configuration ───────────────────────────────────────────

    /// Current configuration
    pub fn config(&self) -> EmitterConfig {
        EmitterConfig {
            max_listeners: self.max_listeners(),
            policy: self.policy,
        }
    }

    pub fn max_listeners(&self) -> usize {
        self.max_listeners.load(Ordering::Relaxed)
    }

    /// Change the listener threshold; existing registrations are unaffected
    pub fn set_max_listeners(&self, max_listeners: usize) -> Result<&Self> {
        EmitterConfig::default()
            .with_max_listeners(max_listeners)
            .validate()?;
        self.max_listeners.store(max_listeners, Ordering::Relaxed);
        Ok(self)
    }

    // ─── Registration ────────────────────────────────────────────

    /// Append a persistent listener
    pub fn on(&self, event: impl Into<K>, callback: Callback<A>) -> &Self {
        self.add_listener(event, callback, ListenerKind::Persistent, Placement::Append)
    }

    /// Insert a persistent listener ahead of all current listeners
    pub fn prepend(&self, event: impl Into<K>, callback: Callback<A>) -> &Self {
        self.add_listener(event, callback, ListenerKind::Persistent, Placement::Prepend)
    }

    /// Append a one-shot listener
    pub fn once(&self, event: impl Into<K>, callback: Callback<A>) -> &Self {
        self.add_listener(event, callback, ListenerKind::Once, Placement::Append)
    }

    /// Insert a one-shot listener ahead of all current listeners
    pub fn prepend_once(&self, event: impl Into<K>, callback: Callback<A>) -> &Self {
        self.add_listener(event, callback, ListenerKind::Once, Placement::Prepend)
    }

    /// Register a listener. Never fails: the listener threshold is advisory here.
    pub fn add_listener(
        &self,
        event: impl Into<K>,
        callback: Callback<A>,
        kind: ListenerKind,
        placement: Placement,
    ) -> &Self {
        // Insertion only fails when the threshold is enforced
        let _ = self.insert(event.into(), callback, kind, placement, false);
        self
    }

    /// Register a listener, honoring `MaxListenersPolicy::Reject`
    ///
    /// Under `Warn` this never fails. Under `Reject`, a registration that
    /// would push the event past `max_listeners` is refused.
    pub fn try_add_listener(
        &self,
        event: impl Into<K>,
        callback: Callback<A>,
        kind: ListenerKind,
        placement: Placement,
    ) -> Result<ListenerId> {
        let enforce = self.policy == MaxListenersPolicy::Reject;
        self.insert(event.into(), callback, kind, placement, enforce)
    }

    fn insert(
        &self,
        event: K,
        callback: Callback<A>,
        kind: ListenerKind,
        placement: Placement,
        enforce: bool,
    ) -> Result<ListenerId> {
        let max = self.max_listeners();
        let listener = Listener::new(callback, kind);
        let id = listener.id();

        let count = {
            let mut map = self.write();
            let current = map.get(&event).map_or(0, Vec::len);
            if enforce && current >= max {
                return Err(EmitterError::MaxListenersExceeded {
                    event: format!("{:?}", event),
                    count: current,
                    max,
                });
            }

            let list = map.entry(event.clone()).or_default();
            match placement {
                Placement::Append => list.push(listener),
                Placement::Prepend => list.insert(0, listener),
            }
            list.len()
        };

        tracing::trace!(
            event = ?event,
            listener = %id,
            kind = ?kind,
            placement = ?placement,
            count,
            "Listener registered"
        );

        if count >= max {
            deliver(
                self.sink.as_ref(),
                &Diagnostic::MaxListenersExceeded {
                    event: format!("{:?}", event),
                    count,
                    max,
                },
            );
        }

        Ok(id)
    }

    // ─── Removal ─────────────────────────────────────────────────

    /// Remove the earliest-registered listener for `event` with this callback
    ///
    /// Removes at most one record; duplicates need one call each. No-op if
    /// nothing matches.
    pub fn off<Q>(&self, event: &Q, callback: &Callback<A>) -> &Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        let removed = {
            let mut map = self.write();
            let removed = match map.get_mut(event) {
                Some(list) => remove_first(list, callback),
                None => None,
            };
            if removed.is_some() {
                prune(&mut *map, event);
            }
            removed
        };

        if let Some(id) = removed {
            tracing::trace!(event = ?event, listener = %id, "Listener removed");
        }
        self
    }

    /// Remove every listener registered for `event`
    pub fn off_event<Q>(&self, event: &Q) -> &Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        if let Some(list) = self.write().remove(event) {
            tracing::debug!(event = ?event, removed = list.len(), "Event listeners cleared");
        }
        self
    }

    /// Remove every listener for every event
    pub fn off_all(&self) -> &Self {
        let removed: usize = {
            let mut map = self.write();
            let removed = map.values().map(Vec::len).sum();
            map.clear();
            removed
        };
        tracing::debug!(removed, "All listeners cleared");
        self
    }

    /// Remove the earliest matching listener under each event
    pub fn off_callback(&self, callback: &Callback<A>) -> &Self {
        let removed = {
            let mut map = self.write();
            let removed = map
                .values_mut()
                .filter_map(|list| remove_first(list, callback))
                .count();
            map.retain(|_, list| !list.is_empty());
            removed
        };
        tracing::trace!(removed, "Callback removed across events");
        self
    }

    /// Remove by optional event and optional callback
    ///
    /// | event | callback | effect |
    /// |---|---|---|
    /// | none | none | `off_all` |
    /// | some | none | `off_event` |
    /// | some | some | `off` |
    /// | none | some | `off_callback` |
    pub fn remove<Q>(&self, event: Option<&Q>, callback: Option<&Callback<A>>) -> &Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        match (event, callback) {
            (None, None) => self.off_all(),
            (Some(event), None) => self.off_event(event),
            (Some(event), Some(callback)) => self.off(event, callback),
            (None, Some(callback)) => self.off_callback(callback),
        }
    }

    /// Remove one specific record; returns whether it was present
    pub fn off_id<Q>(&self, event: &Q, id: ListenerId) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut map = self.write();
        let Some(list) = map.get_mut(event) else {
            return false;
        };
        let Some(pos) = list.iter().position(|l| l.id() == id) else {
            return false;
        };
        list.remove(pos);
        prune(&mut *map, event);
        true
    }

    // ─── Dispatch ────────────────────────────────────────────────

    /// Invoke every listener registered for `event`, in order
    ///
    /// Returns `false` if the event had no listeners. Listener errors and
    /// panics are reported to the diagnostic sink and never reach the caller.
    pub fn emit<Q>(&self, event: &Q, args: &A) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        self.emit_with_report(event, args).is_some()
    }

    /// Same as `emit`, returning what happened to each invocation
    ///
    /// `None` means the event had no listeners.
    pub fn emit_with_report<Q>(&self, event: &Q, args: &A) -> Option<DispatchReport>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        let snapshot: Vec<Listener<A>> = match self.read().get(event) {
            Some(list) if !list.is_empty() => list.clone(),
            _ => return None,
        };

        let mut report = DispatchReport {
            invoked: snapshot.len(),
            faults: Vec::new(),
        };

        for listener in &snapshot {
            if let Err(error) = self.invoke(event, listener, args) {
                report.faults.push(ListenerFault {
                    listener: listener.id(),
                    error,
                });
            }
        }

        self.remove_fired_once(event, &snapshot);

        tracing::trace!(
            event = ?event,
            invoked = report.invoked,
            faults = report.faults.len(),
            "Event emitted"
        );
        Some(report)
    }

    fn invoke<Q>(&self, event: &Q, listener: &Listener<A>, args: &A) -> Result<()>
    where
        Q: fmt::Debug + ?Sized,
    {
        let outcome = catch_unwind(AssertUnwindSafe(|| listener.callback().call(args)));
        let (error, message, panicked) = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(source)) => {
                let message = source.to_string();
                let error = EmitterError::ListenerFailed {
                    event: format!("{:?}", event),
                    source,
                };
                (error, message, false)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                let error = EmitterError::ListenerPanicked {
                    event: format!("{:?}", event),
                    message: message.clone(),
                };
                (error, message, true)
            }
        };

        deliver(
            self.sink.as_ref(),
            &Diagnostic::ListenerFault {
                event: format!("{:?}", event),
                listener: listener.id(),
                error: message,
                panicked,
            },
        );
        Err(error)
    }

    /// Drop one-shot records of a finished dispatch that are still registered
    fn remove_fired_once<Q>(&self, event: &Q, snapshot: &[Listener<A>])
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let fired: Vec<ListenerId> = snapshot
            .iter()
            .filter(|l| !l.is_persistent())
            .map(Listener::id)
            .collect();
        if fired.is_empty() {
            return;
        }

        let mut map = self.write();
        if let Some(list) = map.get_mut(event) {
            list.retain(|l| !fired.contains(&l.id()));
            prune(&mut *map, event);
        }
    }

    // ─── Introspection ───────────────────────────────────────────

    /// Callbacks registered for `event`, in dispatch order
    ///
    /// The returned vector is a copy; changing it does not affect the emitter.
    pub fn listeners<Q>(&self, event: &Q) -> Vec<Callback<A>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.read()
            .get(event)
            .map(|list| list.iter().map(|l| l.callback().clone()).collect())
            .unwrap_or_default()
    }

    /// Listener records registered for `event`, in dispatch order
    pub fn listener_records<Q>(&self, event: &Q) -> Vec<Listener<A>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.read().get(event).cloned().unwrap_or_default()
    }

    pub fn listener_count<Q>(&self, event: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.read().get(event).map_or(0, Vec::len)
    }

    pub fn has_listeners<Q>(&self, event: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.read().contains_key(event)
    }

    /// Events with at least one listener
    ///
    /// Each identifier appears once. Order is unspecified but does not
    /// change while the emitter is not mutated.
    pub fn events(&self) -> Vec<K> {
        self.read().keys().cloned().collect()
    }
}

impl<K, A> Default for EventEmitter<K, A>
where
    K: Eq + Hash + Clone + fmt::Debug,
    A: ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, A> fmt::Debug for EventEmitter<K, A>
where
    K: Eq + Hash + fmt::Debug,
    A: ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let map = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        let counts: HashMap<&K, usize> = map.iter().map(|(k, v)| (k, v.len())).collect();
        f.debug_struct("EventEmitter")
            .field("listeners", &counts)
            .field("max_listeners", &self.max_listeners.load(Ordering::Relaxed))
            .field("policy", &self.policy)
            .finish()
    }
}

/// Remove the first record whose callback matches
fn remove_first<A: ?Sized>(list: &mut Vec<Listener<A>>, callback: &Callback<A>) -> Option<ListenerId> {
    let pos = list.iter().position(|l| l.callback() == callback)?;
    Some(list.remove(pos).id())
}

/// Delete the event's entry if its sequence became empty
fn prune<K, Q, A>(map: &mut HashMap<K, Vec<Listener<A>>>, event: &Q)
where
    K: Eq + Hash + Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    A: ?Sized,
{
    if map.get(event).is_some_and(Vec::is_empty) {
        map.remove(event);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "listener panicked with a non-string payload".to_string()
    }
}
