//! Core systems for HomeHub.
//!
//! This crate provides the observable-state building blocks that every
//! HomeHub resource publishes through:
//!
//! - **Signal/Slot System**: Type-safe change notification
//! - **Property System**: Value cells with change detection
//! - **Published State**: A property paired with its change signal
//! - **Logging**: Shared `tracing` targets
//!
//! # Signal/Slot Example
//!
//! ```
//! use homehub_core::Signal;
//!
//! let value_changed = Signal::<i32>::new();
//!
//! let conn_id = value_changed.connect(|value| {
//!     println!("Value changed to: {}", value);
//! });
//!
//! value_changed.emit(42);
//! value_changed.disconnect(conn_id);
//! ```
//!
//! # Published State Example
//!
//! ```
//! use homehub_core::Published;
//!
//! let temperature = Published::new("temperature", 0.0_f64);
//! temperature.changed().connect(|t| println!("now {t}"));
//! assert!(temperature.publish(21.5));
//! assert!(!temperature.publish(21.5));
//! ```

pub mod logging;
pub mod property;
pub mod signal;

pub use property::{Property, Published};
pub use signal::{ConnectionGuard, ConnectionId, Signal};
