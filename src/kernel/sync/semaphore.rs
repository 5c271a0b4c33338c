// src/kernel/sync/semaphore.rs
//! Counting semaphores (modeled).

use std::collections::VecDeque;

use crate::kernel::core::Pid;

/// A counting semaphore with a FIFO waiter queue. Like everything in
/// the engine, it models blocking: `wait` returning `false` means the
/// caller should move the process to WAITING, nothing actually blocks.
#[derive(Debug)]
pub struct Semaphore {
    name: String,
    value: u64,
    max_value: u64,
    waiting: VecDeque<Pid>,
}

impl Semaphore {
    #[must_use]
    pub fn new(name: &str, value: u64, max_value: u64) -> Self {
        Self {
            name: name.to_string(),
            value,
            max_value: max_value.max(value),
            waiting: VecDeque::new(),
        }
    }

    /// P operation. Returns `true` when the semaphore was acquired;
    /// otherwise the pid is appended to the waiter queue (once).
    pub fn wait(&mut self, pid: Pid) -> bool {
        if self.value > 0 {
            self.value -= 1;
            log::debug!("pid {pid} acquired semaphore '{}' (value {})", self.name, self.value);
            return true;
        }
        if !self.waiting.contains(&pid) {
            self.waiting.push_back(pid);
        }
        log::debug!("pid {pid} blocked on semaphore '{}'", self.name);
        false
    }

    /// V operation. The value saturates at `max_value`; the head waiter,
    /// if any, is popped and returned so the caller can wake it.
    pub fn signal(&mut self, pid: Pid) -> Option<Pid> {
        self.value = (self.value + 1).min(self.max_value);
        log::debug!("pid {pid} released semaphore '{}' (value {})", self.name, self.value);
        let woken = self.waiting.pop_front();
        if let Some(woken) = woken {
            log::debug!("semaphore '{}' waking pid {woken}", self.name);
        }
        woken
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }

    #[must_use]
    pub const fn max_value(&self) -> u64 {
        self.max_value
    }

    #[must_use]
    pub fn waiting(&self) -> usize {
        self.waiting.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_signal_round_trip_restores_value() {
        let mut sem = Semaphore::new("slots", 2, 2);
        assert!(sem.wait(Pid::new(1)));
        assert_eq!(sem.value(), 1);
        assert_eq!(sem.signal(Pid::new(1)), None);
        assert_eq!(sem.value(), 2);
    }

    #[test]
    fn test_exhausted_semaphore_queues_waiters_once() {
        let mut sem = Semaphore::new("slots", 1, 1);
        assert!(sem.wait(Pid::new(1)));
        assert!(!sem.wait(Pid::new(2)));
        assert!(!sem.wait(Pid::new(2)));
        assert_eq!(sem.waiting(), 1);
    }

    #[test]
    fn test_signal_wakes_fifo_and_saturates() {
        let mut sem = Semaphore::new("slots", 1, 1);
        sem.wait(Pid::new(1));
        sem.wait(Pid::new(2));
        sem.wait(Pid::new(3));

        assert_eq!(sem.signal(Pid::new(1)), Some(Pid::new(2)));
        assert_eq!(sem.signal(Pid::new(1)), Some(Pid::new(3)));
        // Value never exceeds the maximum.
        sem.signal(Pid::new(1));
        sem.signal(Pid::new(1));
        assert_eq!(sem.value(), 1);
    }
}
