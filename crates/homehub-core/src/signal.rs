//! Signal/slot system for HomeHub.
//!
//! Resources publish their state through signals: whenever a published value
//! changes, every connected slot (callback) is invoked with the new value.
//! The presentation layer connects to these signals instead of polling.
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - The signal type for emitting notifications
//! - [`ConnectionId`] - Unique identifier returned when connecting a slot
//! - [`ConnectionGuard`] - RAII guard that disconnects when dropped
//!
//! # Example
//!
//! ```
//! use homehub_core::Signal;
//!
//! let status_changed = Signal::<String>::new();
//!
//! let conn_id = status_changed.connect(|text| {
//!     println!("Status changed to: {}", text);
//! });
//!
//! status_changed.emit("ready".to_string());
//! status_changed.disconnect(conn_id);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::logging::targets;

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Use this ID to disconnect a specific connection via [`Signal::disconnect`].
    /// The ID remains valid until the connection is explicitly disconnected or
    /// the signal is dropped.
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A type-safe signal that can have multiple connected slots.
///
/// When a signal is emitted, all connected slots are invoked with the
/// provided arguments, in the emitting task or thread.
///
/// # Type Parameter
///
/// - `Args`: The argument type passed to connected slots. Use `()` for signals
///   with no arguments, or a tuple like `(String, i32)` for multiple arguments.
///
/// # Re-entrancy
///
/// Slots are collected before invocation, so a slot may connect or disconnect
/// other slots on the same signal without deadlocking. Such changes take
/// effect from the next emission.
pub struct Signal<Args> {
    /// All active connections.
    connections: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
    /// Whether signal emission is temporarily blocked.
    blocked: AtomicBool,
    /// Number of emissions that reached at least the connection list.
    emissions: AtomicU64,
}

impl<Args: Clone + Send + 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: Clone + Send + 'static> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
            blocked: AtomicBool::new(false),
            emissions: AtomicU64::new(0),
        }
    }

    /// Connect a slot (closure) to this signal.
    ///
    /// Returns a `ConnectionId` that can be used to disconnect the slot later.
    ///
    /// # Example
    ///
    /// ```
    /// use homehub_core::Signal;
    ///
    /// let signal = Signal::<String>::new();
    /// let id = signal.connect(|s| println!("Got: {}", s));
    /// signal.emit("Hello".to_string());
    /// ```
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.connections.lock().insert(Arc::new(slot))
    }

    /// Disconnect a specific slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed, `false` otherwise.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    /// Disconnect all slots from this signal.
    pub fn disconnect_all(&self) {
        self.connections.lock().clear();
    }

    /// Get the number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Block signal emission temporarily.
    ///
    /// While blocked, calls to `emit()` will do nothing.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Check if signal emission is currently blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Number of times this signal has been emitted while unblocked.
    pub fn emission_count(&self) -> u64 {
        self.emissions.load(Ordering::SeqCst)
    }

    /// Emit the signal, invoking all connected slots.
    ///
    /// If the signal is blocked, this does nothing.
    #[tracing::instrument(skip_all, target = "homehub_core::signal", level = "trace")]
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, "signal blocked, skipping emit");
            return;
        }

        let slots: Vec<Slot<Args>> = self.connections.lock().values().cloned().collect();
        self.emissions.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(target: targets::SIGNAL, connection_count = slots.len(), "emitting signal");

        for slot in slots {
            slot(&args);
        }
    }
}

impl<Args: Clone + Send + 'static> std::fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("connections", &self.connection_count())
            .field("blocked", &self.is_blocked())
            .finish()
    }
}

#[cfg(feature = "tokio")]
impl<Args: Clone + Send + 'static> Signal<Args> {
    /// Connect a slot that forwards every emission into an unbounded channel.
    ///
    /// This turns a signal into an async stream of values for consumers that
    /// prefer `recv().await` over callbacks. The connection removes itself
    /// on the first emission after the receiver has been dropped.
    pub fn connect_channel(
        self: &Arc<Self>,
    ) -> (ConnectionId, tokio::sync::mpsc::UnboundedReceiver<Args>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let weak = Arc::downgrade(self);
        let id_cell: Arc<Mutex<Option<ConnectionId>>> = Arc::new(Mutex::new(None));
        let id_for_slot = Arc::clone(&id_cell);
        let id = self.connect(move |args: &Args| {
            if tx.send(args.clone()).is_err() {
                if let (Some(signal), Some(id)) = (weak.upgrade(), *id_for_slot.lock()) {
                    signal.disconnect(id);
                }
            }
        });
        *id_cell.lock() = Some(id);
        (id, rx)
    }
}

/// A connection guard that automatically disconnects when dropped.
///
/// Created via [`Signal::connect_scoped`]. The guard holds a weak reference,
/// so it never keeps the signal alive and dropping it after the signal is
/// gone is a no-op.
///
/// # Example
///
/// ```
/// use homehub_core::Signal;
/// use std::sync::atomic::{AtomicI32, Ordering};
/// use std::sync::Arc;
///
/// let signal = Arc::new(Signal::<i32>::new());
/// let counter = Arc::new(AtomicI32::new(0));
/// {
///     let counter_clone = counter.clone();
///     let _guard = signal.connect_scoped(move |&n| {
///         counter_clone.fetch_add(n, Ordering::SeqCst);
///     });
///     signal.emit(42);
/// }
/// signal.emit(43);
/// assert_eq!(counter.load(Ordering::SeqCst), 42);
/// ```
pub struct ConnectionGuard<Args: Clone + Send + 'static> {
    signal: Weak<Signal<Args>>,
    id: ConnectionId,
}

impl<Args: Clone + Send + 'static> ConnectionGuard<Args> {
    /// The connection this guard owns.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl<Args: Clone + Send + 'static> Signal<Args> {
    /// Connect a slot with automatic disconnection when the guard is dropped.
    pub fn connect_scoped<F>(self: &Arc<Self>, slot: F) -> ConnectionGuard<Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let id = self.connect(slot);
        ConnectionGuard {
            signal: Arc::downgrade(self),
            id,
        }
    }
}

impl<Args: Clone + Send + 'static> Drop for ConnectionGuard<Args> {
    fn drop(&mut self) {
        if let Some(signal) = self.signal.upgrade() {
            signal.disconnect(self.id);
        }
    }
}
