// src/kernel/sync/mutex.rs
//! Owner-checked mutexes (modeled).

use std::collections::VecDeque;

use crate::kernel::core::{Pid, SyncError};

/// A mutex with owner tracking and a FIFO waiter queue. `unlock` by a
/// non-owner is refused and the lock stays held.
#[derive(Debug)]
pub struct Mutex {
    name: String,
    owner: Option<Pid>,
    waiting: VecDeque<Pid>,
}

impl Mutex {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            owner: None,
            waiting: VecDeque::new(),
        }
    }

    /// Returns `true` when the lock was taken; otherwise the pid is
    /// queued (once). Re-locking by the owner does not recurse; the
    /// owner simply keeps the lock.
    pub fn lock(&mut self, pid: Pid) -> bool {
        match self.owner {
            None => {
                self.owner = Some(pid);
                log::debug!("pid {pid} acquired mutex '{}'", self.name);
                true
            }
            Some(owner) if owner == pid => true,
            Some(owner) => {
                if !self.waiting.contains(&pid) {
                    self.waiting.push_back(pid);
                }
                log::debug!("pid {pid} blocked on mutex '{}' (owner {owner})", self.name);
                false
            }
        }
    }

    /// Release the lock. Fails without releasing when `pid` is not the
    /// owner. On success the head waiter, if any, is popped and
    /// returned for waking.
    pub fn unlock(&mut self, pid: Pid) -> Result<Option<Pid>, SyncError> {
        if self.owner != Some(pid) {
            log::warn!("pid {pid} tried to unlock mutex '{}' it does not own", self.name);
            return Err(SyncError::NotOwner {
                name: self.name.clone(),
                pid,
            });
        }

        self.owner = None;
        log::debug!("pid {pid} released mutex '{}'", self.name);
        let woken = self.waiting.pop_front();
        if let Some(woken) = woken {
            log::debug!("mutex '{}' waking pid {woken}", self.name);
        }
        Ok(woken)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.owner.is_some()
    }

    #[must_use]
    pub const fn owner(&self) -> Option<Pid> {
        self.owner
    }

    #[must_use]
    pub fn waiting(&self) -> usize {
        self.waiting.len()
    }
}
