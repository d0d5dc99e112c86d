//! At-most-one-pending update coalescing.
//!
//! High-frequency producers (pointer moves during a drag) call
//! [`SingleFlight::schedule`]; the consumer calls [`SingleFlight::flush`]
//! once per scheduler tick. Only the latest value survives between ticks.

/// Holds at most one pending value.
#[derive(Debug)]
pub struct SingleFlight<T> {
    pending: Option<T>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<T> SingleFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pending value.
    ///
    /// Returns true when nothing was pending, meaning the caller should
    /// request a tick. Later calls before the tick only overwrite the value.
    pub fn schedule(&mut self, value: T) -> bool {
        self.pending.replace(value).is_none()
    }

    /// Take the pending value on a tick.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take()
    }

    /// Drop the pending value without applying it.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
