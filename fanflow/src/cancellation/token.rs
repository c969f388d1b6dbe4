//! Tree-structured cancellation signal.

use crate::context::{ContextKey, Scope};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Roughly 30 years; deadlines past this are clamped.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Returns the instant `timeout` from now, or [`FAR_FUTURE`] from now if that overflows.
pub(crate) fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

/// A callback type for trigger notifications.
pub type TriggerCallback = Box<dyn FnOnce(&CancelReason) + Send>;

/// Why a signal fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelReason {
    /// Someone called [`CancellationSignal::trigger`].
    Requested(String),
    /// The signal's own deadline elapsed.
    DeadlineExceeded,
    /// An ancestor fired.
    ParentCancelled(Box<CancelReason>),
}

impl CancelReason {
    /// Creates a `Requested` reason.
    #[must_use]
    pub fn requested(message: impl Into<String>) -> Self {
        Self::Requested(message.into())
    }

    /// Returns true if a deadline, here or in an ancestor, caused the signal to fire.
    #[must_use]
    pub fn is_deadline(&self) -> bool {
        match self {
            Self::DeadlineExceeded => true,
            Self::ParentCancelled(inner) => inner.is_deadline(),
            Self::Requested(_) => false,
        }
    }

    /// Returns the reason at the top of the ancestor chain.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::ParentCancelled(inner) => inner.root_cause(),
            other => other,
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested(message) => write!(f, "cancelled: {message}"),
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
            Self::ParentCancelled(inner) => write!(f, "parent cancelled: {inner}"),
        }
    }
}

struct Node {
    triggered: AtomicBool,
    reason: RwLock<Option<CancelReason>>,
    notify: Notify,
    callbacks: Mutex<Vec<TriggerCallback>>,
    children: Mutex<Vec<Weak<Node>>>,
    parent: Option<Arc<Node>>,
    deadline: Option<Instant>,
}

impl Node {
    fn new(parent: Option<Arc<Self>>, deadline: Option<Instant>) -> Arc<Self> {
        Arc::new(Self {
            triggered: AtomicBool::new(false),
            reason: RwLock::new(None),
            notify: Notify::new(),
            callbacks: Mutex::new(Vec::new()),
            children: Mutex::new(Vec::new()),
            parent,
            deadline,
        })
    }

    fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Fires this node and every live descendant. Returns false if it had already fired.
    fn trigger(&self, reason: CancelReason) -> bool {
        {
            let mut slot = self.reason.write();
            if slot.is_some() {
                return false;
            }
            *slot = Some(reason.clone());
            self.triggered.store(true, Ordering::SeqCst);
        }

        self.notify.notify_waiters();

        let callbacks: Vec<_> = std::mem::take(&mut *self.callbacks.lock());
        for callback in callbacks {
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(&reason);
            })) {
                warn!("Trigger callback panicked: {:?}", e);
            }
        }

        let children: Vec<_> = std::mem::take(&mut *self.children.lock());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.trigger(CancelReason::ParentCancelled(Box::new(reason.clone())));
        }

        true
    }

    fn adopt(self: &Arc<Self>, child: &Arc<Self>) {
        {
            let mut children = self.children.lock();
            children.retain(|weak| weak.strong_count() > 0);
            children.push(Arc::downgrade(child));
        }

        // The parent may have fired between creating the child and registering it.
        if let Some(reason) = self.reason.read().clone() {
            child.trigger(CancelReason::ParentCancelled(Box::new(reason)));
        }
    }
}

/// A broadcast-once stop notification.
///
/// Handles are cheap to clone and all clones observe the same state. Signals
/// form a tree: triggering a signal triggers all of its descendants, never its
/// parent or siblings. A signal may carry a deadline, after which it behaves
/// as if [`trigger`](Self::trigger) had been called with
/// [`CancelReason::DeadlineExceeded`].
///
/// Each handle also carries an immutable [`Scope`] of context values that
/// children inherit.
#[derive(Clone)]
pub struct CancellationSignal {
    node: Arc<Node>,
    scope: Scope,
}

impl CancellationSignal {
    /// Creates a new root signal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            node: Node::new(None, None),
            scope: Scope::root(),
        }
    }

    /// Creates a new root signal that fires after `timeout`.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        let signal = Self {
            node: Node::new(None, Some(deadline_after(timeout))),
            scope: Scope::root(),
        };
        signal.arm_deadline();
        signal
    }

    /// Creates a child signal.
    ///
    /// The child inherits this handle's context values. If this signal has
    /// already fired, the child starts out fired.
    #[must_use]
    pub fn child(&self) -> Self {
        self.spawn_child(None)
    }

    /// Creates a child signal that fires after `timeout`.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn child_with_deadline(&self, timeout: Duration) -> Self {
        let child = self.spawn_child(Some(deadline_after(timeout)));
        child.arm_deadline();
        child
    }

    fn spawn_child(&self, deadline: Option<Instant>) -> Self {
        let node = Node::new(Some(self.node.clone()), deadline);
        self.node.adopt(&node);
        Self {
            node,
            scope: self.scope.clone(),
        }
    }

    fn arm_deadline(&self) {
        let Some(deadline) = self.node.deadline else {
            return;
        };
        if self.is_triggered() {
            return;
        }

        let signal = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = signal.cancelled() => {}
                () = tokio::time::sleep_until(deadline) => {
                    if signal.node.trigger(CancelReason::DeadlineExceeded) {
                        debug!("Signal deadline elapsed");
                    }
                }
            }
        });
    }

    /// Fires the signal.
    ///
    /// Idempotent: only the first reason is kept. Never blocks on observers.
    /// Returns true if this call was the one that fired it.
    pub fn trigger(&self, reason: CancelReason) -> bool {
        self.node.trigger(reason)
    }

    /// Fires the signal with a `Requested` reason.
    pub fn cancel(&self, message: impl Into<String>) -> bool {
        self.trigger(CancelReason::requested(message))
    }

    /// Returns whether the signal has fired.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.node.is_triggered()
    }

    /// Returns the reason the signal fired, if it has.
    #[must_use]
    pub fn reason(&self) -> Option<CancelReason> {
        self.node.reason.read().clone()
    }

    /// Completes once the signal has fired.
    ///
    /// Cancel-safe, so it can sit in a `tokio::select!` next to other work.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.node.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }

    /// Completes once the signal has fired, yielding the reason.
    pub async fn triggered(&self) -> CancelReason {
        self.cancelled().await;
        self.reason()
            .unwrap_or_else(|| CancelReason::requested("unknown"))
    }

    /// Registers a callback to run when the signal fires.
    ///
    /// If already fired, the callback runs immediately. Panics in callbacks are
    /// logged and suppressed.
    pub fn on_trigger<F>(&self, callback: F)
    where
        F: FnOnce(&CancelReason) + Send + 'static,
    {
        {
            let mut callbacks = self.node.callbacks.lock();
            if !self.is_triggered() {
                callbacks.push(Box::new(callback));
                return;
            }
        }

        if let Some(reason) = self.reason() {
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(&reason);
            })) {
                warn!("Trigger callback panicked: {:?}", e);
            }
        }
    }

    /// Returns the earliest deadline on this signal or any ancestor.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        let mut earliest: Option<Instant> = None;
        let mut current = Some(&self.node);
        while let Some(node) = current {
            if let Some(deadline) = node.deadline {
                earliest = Some(earliest.map_or(deadline, |e| e.min(deadline)));
            }
            current = node.parent.as_ref();
        }
        earliest
    }

    /// Returns the time left before the earliest deadline, if any.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns a handle on the same signal with `value` added under `key`.
    ///
    /// The returned handle fires together with this one. Use [`child`](Self::child)
    /// first if the new scope also needs its own cancellation.
    #[must_use]
    pub fn with_value<T>(&self, key: &ContextKey<T>, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            node: self.node.clone(),
            scope: self.scope.with(key, value),
        }
    }

    /// Looks up a context value carried by this handle.
    #[must_use]
    pub fn value<T>(&self, key: &ContextKey<T>) -> Option<&T>
    where
        T: Any + Send + Sync,
    {
        self.scope.get(key)
    }

    /// Returns the context scope carried by this handle.
    #[must_use]
    pub const fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Returns true if both handles observe the same signal.
    #[must_use]
    pub fn same_signal(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationSignal")
            .field("triggered", &self.is_triggered())
            .field("reason", &self.reason())
            .field("deadline", &self.node.deadline)
            .field("scope", &self.scope)
            .finish()
    }
}
