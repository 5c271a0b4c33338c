// src/kernel/sync/mod.rs
//! Concurrency layer: semaphores, mutexes, deadlock detection and the
//! banker's algorithm.
//!
//! Everything here is modeled state the engine maintains; nothing is
//! enforced against actual parallel execution. The manager owns the
//! named primitives and routes engine calls to them by name.

pub mod bankers;
pub mod deadlock;
pub mod mutex;
pub mod semaphore;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::kernel::core::{Pid, SyncError};

pub use bankers::{BankersAlgorithm, BankersProcess, BankersState};
pub use deadlock::DeadlockDetector;
pub use mutex::Mutex;
pub use semaphore::Semaphore;

/// Named synchronization primitives plus the resource-graph tools.
#[derive(Debug, Default)]
pub struct ConcurrencyManager {
    semaphores: BTreeMap<String, Semaphore>,
    mutexes: BTreeMap<String, Mutex>,
    deadlock: DeadlockDetector,
    bankers: Option<BankersAlgorithm>,
}

impl ConcurrencyManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a semaphore. `max_value` defaults to the
    /// initial value.
    pub fn create_semaphore(&mut self, name: &str, initial: u64, max_value: Option<u64>) {
        let max = max_value.unwrap_or(initial);
        log::debug!("semaphore '{name}' created (value {initial})");
        self.semaphores.insert(name.to_string(), Semaphore::new(name, initial, max));
    }

    pub fn create_mutex(&mut self, name: &str) {
        log::debug!("mutex '{name}' created");
        self.mutexes.insert(name.to_string(), Mutex::new(name));
    }

    pub fn semaphore_wait(&mut self, name: &str, pid: Pid) -> Result<bool, SyncError> {
        self.semaphores
            .get_mut(name)
            .map(|s| s.wait(pid))
            .ok_or_else(|| SyncError::UnknownSemaphore(name.to_string()))
    }

    pub fn semaphore_signal(&mut self, name: &str, pid: Pid) -> Result<Option<Pid>, SyncError> {
        self.semaphores
            .get_mut(name)
            .map(|s| s.signal(pid))
            .ok_or_else(|| SyncError::UnknownSemaphore(name.to_string()))
    }

    pub fn mutex_lock(&mut self, name: &str, pid: Pid) -> Result<bool, SyncError> {
        self.mutexes
            .get_mut(name)
            .map(|m| m.lock(pid))
            .ok_or_else(|| SyncError::UnknownMutex(name.to_string()))
    }

    pub fn mutex_unlock(&mut self, name: &str, pid: Pid) -> Result<Option<Pid>, SyncError> {
        self.mutexes
            .get_mut(name)
            .ok_or_else(|| SyncError::UnknownMutex(name.to_string()))?
            .unlock(pid)
    }

    /// Initialize (or reset) the banker's algorithm with the total
    /// counts per resource class.
    pub fn init_bankers(&mut self, resources: Vec<u64>) {
        log::debug!("banker's algorithm initialized with {resources:?}");
        self.bankers = Some(BankersAlgorithm::new(resources));
    }

    #[must_use]
    pub const fn bankers(&self) -> Option<&BankersAlgorithm> {
        self.bankers.as_ref()
    }

    pub fn bankers_mut(&mut self) -> Result<&mut BankersAlgorithm, SyncError> {
        self.bankers.as_mut().ok_or(SyncError::BankersUninitialized)
    }

    #[must_use]
    pub const fn deadlock(&self) -> &DeadlockDetector {
        &self.deadlock
    }

    pub fn deadlock_mut(&mut self) -> &mut DeadlockDetector {
        &mut self.deadlock
    }

    /// Run deadlock detection over the current wait-for graph.
    #[must_use]
    pub fn check_deadlock(&self) -> Vec<Pid> {
        self.deadlock.detect()
    }

    /// Reporting snapshot of every primitive.
    #[must_use]
    pub fn state(&self) -> SyncState {
        SyncState {
            semaphores: self
                .semaphores
                .values()
                .map(|s| SemaphoreState {
                    name: s.name().to_string(),
                    value: s.value(),
                    max_value: s.max_value(),
                    waiting: s.waiting(),
                })
                .collect(),
            mutexes: self
                .mutexes
                .values()
                .map(|m| MutexState {
                    name: m.name().to_string(),
                    locked: m.is_locked(),
                    owner: m.owner(),
                    waiting: m.waiting(),
                })
                .collect(),
            bankers: self.bankers.as_ref().map(BankersAlgorithm::state),
        }
    }
}

/// Semaphore snapshot inside [`SyncState`].
#[derive(Debug, Clone, Serialize)]
pub struct SemaphoreState {
    pub name: String,
    pub value: u64,
    pub max_value: u64,
    pub waiting: usize,
}

/// Mutex snapshot inside [`SyncState`].
#[derive(Debug, Clone, Serialize)]
pub struct MutexState {
    pub name: String,
    pub locked: bool,
    pub owner: Option<Pid>,
    pub waiting: usize,
}

/// Concurrency-layer snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SyncState {
    pub semaphores: Vec<SemaphoreState>,
    pub mutexes: Vec<MutexState>,
    pub bankers: Option<BankersState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_lookup_errors_on_unknown_primitives() {
        let mut mgr = ConcurrencyManager::new();
        assert_eq!(
            mgr.semaphore_wait("ghost", Pid::new(1)),
            Err(SyncError::UnknownSemaphore("ghost".into()))
        );
        assert_eq!(
            mgr.mutex_lock("ghost", Pid::new(1)),
            Err(SyncError::UnknownMutex("ghost".into()))
        );
        assert!(matches!(mgr.bankers_mut(), Err(SyncError::BankersUninitialized)));
    }

    #[test]
    fn test_semaphore_default_max_is_initial_value() {
        let mut mgr = ConcurrencyManager::new();
        mgr.create_semaphore("slots", 3, None);
        assert_eq!(mgr.semaphore_wait("slots", Pid::new(1)), Ok(true));
        assert_eq!(mgr.semaphore_signal("slots", Pid::new(1)), Ok(None));

        let state = mgr.state();
        assert_eq!(state.semaphores[0].value, 3);
        assert_eq!(state.semaphores[0].max_value, 3);
    }

    #[test]
    fn test_state_reflects_mutex_ownership() {
        let mut mgr = ConcurrencyManager::new();
        mgr.create_mutex("fs");
        mgr.mutex_lock("fs", Pid::new(4)).unwrap();
        mgr.mutex_lock("fs", Pid::new(5)).unwrap();

        let state = mgr.state();
        assert!(state.mutexes[0].locked);
        assert_eq!(state.mutexes[0].owner, Some(Pid::new(4)));
        assert_eq!(state.mutexes[0].waiting, 1);
    }
}
