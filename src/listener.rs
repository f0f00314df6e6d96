//! Listener records and callback handles

use crate::error::ListenerError;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Opaque invocable handle registered against an event
///
/// Identity is the underlying allocation: clones of a callback compare
/// equal, two callbacks built from identical closures do not. Keep a
/// clone around to remove the listener later.
pub struct Callback<A: ?Sized> {
    inner: Arc<dyn Fn(&A) -> std::result::Result<(), ListenerError> + Send + Sync>,
}

impl<A: ?Sized> Callback<A> {
    /// Wrap a fallible closure
    ///
    /// An `Err` return is treated as a listener fault during dispatch.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&A) -> std::result::Result<(), ListenerError> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Wrap a closure that cannot fail (it may still panic)
    pub fn infallible<F>(f: F) -> Self
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        Self::new(move |args: &A| {
            f(args);
            Ok(())
        })
    }

    /// Invoke the callback directly
    pub fn call(&self, args: &A) -> std::result::Result<(), ListenerError> {
        (self.inner)(args)
    }

    /// Whether both handles refer to the same callback
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<A: ?Sized> Clone for Callback<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: ?Sized> PartialEq for Callback<A> {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl<A: ?Sized> Eq for Callback<A> {}

impl<A: ?Sized> fmt::Debug for Callback<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callback")
            .field(&Arc::as_ptr(&self.inner).cast::<()>())
            .finish()
    }
}

/// Unique identifier of one listener record
///
/// Duplicate registrations of the same callback get distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lst-{}", self.0)
    }
}

/// Whether a listener survives being invoked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListenerKind {
    /// Registered via `on`, stays until removed
    #[default]
    Persistent,
    /// Registered via `once`, removed after its first dispatch
    Once,
}

/// Where a new listener goes in the event's sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Placement {
    #[default]
    Append,
    Prepend,
}

/// One registered listener
pub struct Listener<A: ?Sized> {
    id: ListenerId,
    callback: Callback<A>,
    kind: ListenerKind,
}

impl<A: ?Sized> Listener<A> {
    pub(crate) fn new(callback: Callback<A>, kind: ListenerKind) -> Self {
        Self {
            id: ListenerId::next(),
            callback,
            kind,
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn callback(&self) -> &Callback<A> {
        &self.callback
    }

    pub fn kind(&self) -> ListenerKind {
        self.kind
    }

    /// `false` for one-shot listeners
    pub fn is_persistent(&self) -> bool {
        self.kind == ListenerKind::Persistent
    }
}

impl<A: ?Sized> Clone for Listener<A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: self.callback.clone(),
            kind: self.kind,
        }
    }
}

impl<A: ?Sized> fmt::Debug for Listener<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}
