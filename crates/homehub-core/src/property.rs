//! Property system for HomeHub.
//!
//! Properties hold the state a resource publishes (fetched events, the last
//! known location, the current weather). When a property changes, the owning
//! resource emits a signal so the presentation layer can re-render.
//!
//! # Property Types
//!
//! - **Property<T>**: A value cell with change detection
//! - **Published<T>**: A property paired with its change signal
//!
//! # Example
//!
//! ```
//! use homehub_core::{Property, Signal};
//!
//! struct Counter {
//!     value: Property<i32>,
//!     value_changed: Signal<i32>,
//! }
//!
//! impl Counter {
//!     fn set_value(&self, new_value: i32) {
//!         if self.value.set(new_value) {
//!             self.value_changed.emit(new_value);
//!         }
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, RwLock};

use crate::logging::targets;
use crate::signal::Signal;

/// A reactive property that tracks changes.
///
/// `Property<T>` wraps a value and provides change detection. When `set()` is
/// called, it compares the new value with the current one and returns whether
/// the value actually changed.
///
/// # Example
///
/// ```
/// use homehub_core::Property;
///
/// let prop = Property::new(42);
/// assert_eq!(prop.get(), 42);
/// assert!(!prop.set(42));
/// assert!(prop.set(100));
/// assert_eq!(prop.get(), 100);
/// ```
pub struct Property<T> {
    value: RwLock<T>,
}

impl<T: Clone> Property<T> {
    /// Create a new property with an initial value.
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// Get the current value.
    ///
    /// This clones the value. For large types, consider using `with()` instead.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Access the value through a closure without cloning.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.value.read())
    }

    /// Set the value without change detection.
    pub fn set_silent(&self, value: T) {
        *self.value.write() = value;
    }

    /// Mutate the value in place and return a copy of the result, taken
    /// under the same write lock. Always counts as a change.
    pub fn update<F>(&self, f: F) -> T
    where
        F: FnOnce(&mut T),
    {
        let mut current = self.value.write();
        f(&mut *current);
        current.clone()
    }
}

impl<T: Clone + PartialEq> Property<T> {
    /// Set the value, returning `true` if the value changed.
    ///
    /// The caller should emit the associated notification signal when this
    /// returns `true`.
    pub fn set(&self, value: T) -> bool {
        let mut current = self.value.write();
        if *current != value {
            *current = value;
            true
        } else {
            false
        }
    }

}

impl<T: Clone + Default> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("value", &self.get())
            .finish()
    }
}

/// Published state: a property plus the signal announcing its changes.
///
/// This is the unit every HomeHub resource uses to expose observable state.
/// The signal is reference counted so observers can hold on to it (for
/// example to build a channel with [`Signal::connect_channel`]).
///
/// Writes and their notifications are serialized, so observers see values
/// in the order they were stored. A slot may publish to the same state again
/// from inside its callback.
pub struct Published<T: Clone + Send + 'static> {
    name: &'static str,
    value: Property<T>,
    changed: Arc<Signal<T>>,
    ordering: ReentrantMutex<()>,
}

impl<T: Clone + Send + 'static> Published<T> {
    /// Create published state with an initial value.
    pub fn new(name: &'static str, value: T) -> Self {
        Self {
            name,
            value: Property::new(value),
            changed: Arc::new(Signal::new()),
            ordering: ReentrantMutex::new(()),
        }
    }

    /// The name used in trace output.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current snapshot.
    pub fn get(&self) -> T {
        self.value.get()
    }

    /// Access the current value without cloning.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        self.value.with(f)
    }

    /// The change signal.
    pub fn changed(&self) -> &Arc<Signal<T>> {
        &self.changed
    }

    /// Replace the value and notify unconditionally.
    ///
    /// Used for collections whose element type has no meaningful equality,
    /// or where observers want every refresh even if nothing changed.
    pub fn publish_always(&self, value: T) {
        let _order = self.ordering.lock();
        self.value.set_silent(value.clone());
        tracing::trace!(target: targets::PROPERTY, name = self.name, "publishing");
        self.changed.emit(value);
    }

    /// Mutate in place and notify with the resulting value.
    pub fn modify<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        let _order = self.ordering.lock();
        let value = self.value.update(f);
        self.changed.emit(value);
    }
}

impl<T: Clone + PartialEq + Send + 'static> Published<T> {
    /// Replace the value, notifying observers only when it changed.
    ///
    /// Returns `true` if a notification was emitted.
    pub fn publish(&self, value: T) -> bool {
        let _order = self.ordering.lock();
        if self.value.set(value.clone()) {
            tracing::trace!(target: targets::PROPERTY, name = self.name, "value changed");
            self.changed.emit(value);
            true
        } else {
            false
        }
    }
}

impl<T: Clone + fmt::Debug + Send + 'static> fmt::Debug for Published<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Published")
            .field("name", &self.name)
            .field("value", &self.get())
            .field("observers", &self.changed.connection_count())
            .finish()
    }
}
