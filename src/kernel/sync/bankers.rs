// src/kernel/sync/bankers.rs
//! Banker's algorithm over N resource classes.
//!
//! The safety check is the textbook loop: scan every process looking
//! for one whose remaining need fits in `work`, fold its allocation
//! back in, and stop only when a full pass makes no progress.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::kernel::core::Pid;

/// Banker's algorithm state.
#[derive(Debug)]
pub struct BankersAlgorithm {
    available: Vec<u64>,
    allocation: BTreeMap<Pid, Vec<u64>>,
    max_need: BTreeMap<Pid, Vec<u64>>,
}

impl BankersAlgorithm {
    /// `resources[i]` is the total (initially available) count of
    /// resource class `i`.
    #[must_use]
    pub fn new(resources: Vec<u64>) -> Self {
        Self {
            available: resources,
            allocation: BTreeMap::new(),
            max_need: BTreeMap::new(),
        }
    }

    /// Declare a process and its maximum claim. Rejects claims with
    /// the wrong number of resource classes.
    pub fn add_process(&mut self, pid: Pid, max_need: Vec<u64>) -> bool {
        if max_need.len() != self.available.len() {
            return false;
        }
        self.allocation.insert(pid, vec![0; self.available.len()]);
        self.max_need.insert(pid, max_need);
        true
    }

    /// Request resources for `pid`. The grant is tentative: if the
    /// resulting state is unsafe the grant is rolled back and the
    /// request denied. Returns whether the request was granted.
    pub fn request_resources(&mut self, pid: Pid, request: &[u64]) -> bool {
        let (Some(allocation), Some(max_need)) = (self.allocation.get(&pid), self.max_need.get(&pid))
        else {
            log::warn!("banker: request from undeclared pid {pid}");
            return false;
        };
        if request.len() != self.available.len() {
            return false;
        }

        // 1. The request may not exceed the declared remaining need.
        let exceeds_claim = request
            .iter()
            .zip(max_need.iter().zip(allocation.iter()))
            .any(|(&req, (&max, &alloc))| req > max - alloc);
        if exceeds_claim {
            log::warn!("banker: pid {pid} requested beyond its claim");
            return false;
        }

        // 2. The request must fit in what is currently available.
        if request.iter().zip(&self.available).any(|(&req, &avail)| req > avail) {
            log::debug!("banker: pid {pid} must wait (insufficient resources)");
            return false;
        }

        // 3. Tentative grant.
        for (avail, &req) in self.available.iter_mut().zip(request) {
            *avail -= req;
        }
        if let Some(alloc) = self.allocation.get_mut(&pid) {
            for (a, &req) in alloc.iter_mut().zip(request) {
                *a += req;
            }
        }

        // 4. Keep the grant only if the state stays safe.
        if self.is_safe() {
            log::debug!("banker: granted {request:?} to pid {pid}");
            return true;
        }

        for (avail, &req) in self.available.iter_mut().zip(request) {
            *avail += req;
        }
        if let Some(alloc) = self.allocation.get_mut(&pid) {
            for (a, &req) in alloc.iter_mut().zip(request) {
                *a -= req;
            }
        }
        log::debug!("banker: denied {request:?} to pid {pid} (unsafe state)");
        false
    }

    /// Return resources. Releases are clamped to what the pid holds.
    pub fn release_resources(&mut self, pid: Pid, release: &[u64]) -> bool {
        let Some(alloc) = self.allocation.get_mut(&pid) else {
            return false;
        };
        if release.len() != self.available.len() {
            return false;
        }
        for ((a, avail), &rel) in alloc.iter_mut().zip(self.available.iter_mut()).zip(release) {
            let returned = rel.min(*a);
            *a -= returned;
            *avail += returned;
        }
        true
    }

    /// Textbook safety check.
    #[must_use]
    pub fn is_safe(&self) -> bool {
        let mut work = self.available.clone();
        let mut finished: BTreeMap<Pid, bool> =
            self.allocation.keys().map(|&pid| (pid, false)).collect();

        loop {
            let mut progressed = false;
            for (&pid, alloc) in &self.allocation {
                if finished.get(&pid).copied().unwrap_or(true) {
                    continue;
                }
                let Some(max_need) = self.max_need.get(&pid) else {
                    continue;
                };
                let fits = max_need
                    .iter()
                    .zip(alloc.iter().zip(&work))
                    .all(|(&max, (&a, &w))| max - a <= w);
                if fits {
                    for (w, &a) in work.iter_mut().zip(alloc) {
                        *w += a;
                    }
                    finished.insert(pid, true);
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }

        finished.values().all(|&done| done)
    }

    #[must_use]
    pub fn available(&self) -> &[u64] {
        &self.available
    }

    #[must_use]
    pub fn allocation_of(&self, pid: Pid) -> Option<&[u64]> {
        self.allocation.get(&pid).map(Vec::as_slice)
    }

    /// Reporting snapshot.
    #[must_use]
    pub fn state(&self) -> BankersState {
        BankersState {
            available: self.available.clone(),
            processes: self
                .allocation
                .iter()
                .map(|(&pid, alloc)| BankersProcess {
                    pid,
                    allocation: alloc.clone(),
                    max_need: self.max_need.get(&pid).cloned().unwrap_or_default(),
                })
                .collect(),
        }
    }
}

/// Per-process banker row inside [`BankersState`].
#[derive(Debug, Clone, Serialize)]
pub struct BankersProcess {
    pub pid: Pid,
    pub allocation: Vec<u64>,
    pub max_need: Vec<u64>,
}

/// Banker snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct BankersState {
    pub available: Vec<u64>,
    pub processes: Vec<BankersProcess>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u64) -> Pid {
        Pid::new(n)
    }

    #[test]
    fn test_grant_within_claim_and_availability() {
        let mut bankers = BankersAlgorithm::new(vec![10, 5, 7]);
        bankers.add_process(pid(1), vec![7, 5, 3]);

        assert!(bankers.request_resources(pid(1), &[2, 1, 0]));
        assert_eq!(bankers.available(), &[8, 4, 7]);
        assert!(bankers.is_safe());
    }

    #[test]
    fn test_request_beyond_claim_is_rejected() {
        let mut bankers = BankersAlgorithm::new(vec![10, 5, 7]);
        bankers.add_process(pid(1), vec![3, 2, 2]);

        assert!(!bankers.request_resources(pid(1), &[4, 0, 0]));
        assert_eq!(bankers.available(), &[10, 5, 7]);
    }

    #[test]
    fn test_request_beyond_available_must_wait() {
        let mut bankers = BankersAlgorithm::new(vec![2, 1, 1]);
        bankers.add_process(pid(1), vec![5, 3, 3]);

        assert!(!bankers.request_resources(pid(1), &[3, 0, 0]));
        assert_eq!(bankers.available(), &[2, 1, 1]);
    }

    #[test]
    fn test_unsafe_grant_is_rolled_back() {
        // Two processes with large claims over one resource class: once
        // process 1 holds 5 of 10, granting 5 to process 2 leaves 0
        // available while both still need more, which is unsafe.
        let mut bankers = BankersAlgorithm::new(vec![10]);
        bankers.add_process(pid(1), vec![10]);
        bankers.add_process(pid(2), vec![10]);

        assert!(bankers.request_resources(pid(1), &[5]));
        assert!(!bankers.request_resources(pid(2), &[5]));
        assert_eq!(bankers.available(), &[5]);
        assert_eq!(bankers.allocation_of(pid(2)), Some(&[0][..]));
    }

    #[test]
    fn test_classic_multi_process_safe_sequence() {
        // The standard three-class example: state is safe and further
        // conservative requests stay grantable.
        let mut bankers = BankersAlgorithm::new(vec![10, 5, 7]);
        bankers.add_process(pid(1), vec![7, 5, 3]);
        bankers.add_process(pid(2), vec![3, 2, 2]);
        bankers.add_process(pid(3), vec![9, 0, 2]);

        assert!(bankers.request_resources(pid(1), &[0, 1, 0]));
        assert!(bankers.request_resources(pid(2), &[2, 0, 0]));
        assert!(bankers.request_resources(pid(3), &[3, 0, 2]));
        assert!(bankers.is_safe());

        assert!(bankers.release_resources(pid(2), &[2, 0, 0]));
        assert_eq!(bankers.available(), &[7, 4, 5]);
    }

    #[test]
    fn test_release_clamps_to_held_amount() {
        let mut bankers = BankersAlgorithm::new(vec![4]);
        bankers.add_process(pid(1), vec![4]);
        bankers.request_resources(pid(1), &[2]);

        assert!(bankers.release_resources(pid(1), &[10]));
        assert_eq!(bankers.available(), &[4]);
        assert_eq!(bankers.allocation_of(pid(1)), Some(&[0][..]));
    }
}
