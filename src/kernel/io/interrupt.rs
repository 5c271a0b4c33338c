// src/kernel/io/interrupt.rs
//! Interrupt staging.
//!
//! Device completions are not delivered to processes directly; they
//! are staged here and drained once per I/O step, after every device
//! has been serviced.

use std::collections::VecDeque;

use serde::Serialize;

use crate::kernel::core::Pid;

/// Interrupt class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterruptKind {
    IoComplete,
    DmaComplete,
}

/// A staged interrupt.
#[derive(Debug, Clone, Serialize)]
pub struct Interrupt {
    pub id: u64,
    pub kind: InterruptKind,
    pub device: String,
    pub pid: Pid,
    pub data: serde_json::Value,
}

/// Staging queue plus a lifetime interrupt counter.
#[derive(Debug, Default)]
pub struct InterruptController {
    queue: VecDeque<Interrupt>,
    counter: u64,
}

impl InterruptController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an interrupt and return its id.
    pub fn raise(&mut self, kind: InterruptKind, device: &str, pid: Pid, data: serde_json::Value) -> u64 {
        self.counter += 1;
        log::debug!("interrupt {}: {kind:?} from {device} (pid {pid})", self.counter);
        self.queue.push_back(Interrupt {
            id: self.counter,
            kind,
            device: device.to_string(),
            pid,
            data,
        });
        self.counter
    }

    /// Drain every staged interrupt, in arrival order.
    pub fn drain(&mut self) -> Vec<Interrupt> {
        self.queue.drain(..).collect()
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Total interrupts raised over the controller's lifetime.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_ids_are_monotonic() {
        let mut ctrl = InterruptController::new();
        let a = ctrl.raise(InterruptKind::IoComplete, "disk0", Pid::new(1), serde_json::Value::Null);
        let b = ctrl.raise(InterruptKind::IoComplete, "disk1", Pid::new(2), serde_json::Value::Null);
        assert!(b > a);
        assert_eq!(ctrl.pending(), 2);
    }

    #[test]
    fn test_drain_empties_queue_but_keeps_total() {
        let mut ctrl = InterruptController::new();
        ctrl.raise(InterruptKind::IoComplete, "disk0", Pid::new(1), serde_json::Value::Null);
        let drained = ctrl.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(ctrl.pending(), 0);
        assert_eq!(ctrl.total(), 1);
        assert!(ctrl.drain().is_empty());
    }
}
