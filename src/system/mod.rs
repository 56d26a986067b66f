//! System utilities for embedded devices.
//!
//! The MQTT engine needs a monotonic millisecond clock to schedule keep-alive
//! pings and to detect a missing ping response. Platforms provide it by
//! implementing [`TickCounter`]; hosted builds can use [`StdTickCounter`].
//!
//! ```rust
//! use libiot_mqtt::system::TickCounter;
//!
//! struct SysTick {
//!     ticks: u64,
//! }
//!
//! impl TickCounter for SysTick {
//!     fn now_ms(&self) -> u64 {
//!         self.ticks
//!     }
//! }
//!
//! assert_eq!(SysTick { ticks: 42 }.now_ms(), 42);
//! ```

/// A monotonic millisecond counter.
///
/// The absolute value is meaningless; only differences between two readings
/// are used. Readings must never decrease.
pub trait TickCounter {
    /// Milliseconds elapsed since an arbitrary, fixed origin.
    fn now_ms(&self) -> u64;
}

impl<T: TickCounter + ?Sized> TickCounter for &T {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// A [`TickCounter`] backed by [`std::time::Instant`].
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct StdTickCounter {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdTickCounter {
    /// Creates a counter whose origin is the moment of creation.
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdTickCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl TickCounter for StdTickCounter {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}
