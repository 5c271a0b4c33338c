// src/kernel/core/types.rs
//! Process identifiers and the recognized configuration values.
//!
//! Policy names arriving from an outer layer are normalized to
//! uppercase; unknown names fall back to the subsystem default rather
//! than erroring, so a misspelled algorithm degrades to FCFS instead
//! of wedging a simulation.

use core::fmt;
use serde::Serialize;

/// Process identifier. Allocated monotonically starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Pid(u64);

impl Pid {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// CPU scheduling policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SchedulingAlgorithm {
    /// First come, first served (non-preemptive).
    #[default]
    #[serde(rename = "FCFS")]
    Fcfs,
    /// Shortest job first (non-preemptive).
    #[serde(rename = "SJF")]
    Sjf,
    /// Round robin with a fixed time quantum.
    #[serde(rename = "RR")]
    RoundRobin,
    /// Preemptive priority (smaller number = higher priority).
    #[serde(rename = "PRIORITY")]
    Priority,
}

impl SchedulingAlgorithm {
    /// Parse a policy name, case-insensitively. Unknown names fall
    /// back to FCFS.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.to_uppercase().as_str() {
            "SJF" => Self::Sjf,
            "RR" => Self::RoundRobin,
            "PRIORITY" => Self::Priority,
            "FCFS" => Self::Fcfs,
            other => {
                log::warn!("unknown scheduling algorithm '{other}', using FCFS");
                Self::Fcfs
            }
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fcfs => "FCFS",
            Self::Sjf => "SJF",
            Self::RoundRobin => "RR",
            Self::Priority => "PRIORITY",
        }
    }
}

/// Memory-management mode the engine is initialized with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryMode {
    /// Fixed partitions with first/best/worst fit.
    Partitions,
    /// Demand paging with page replacement.
    #[default]
    Paging,
    /// Segmentation over a coalescing free list.
    Segmentation,
}

impl MemoryMode {
    /// Parse a mode name; unknown names fall back to paging.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "partitions" => Self::Partitions,
            "segmentation" => Self::Segmentation,
            "paging" => Self::Paging,
            other => {
                log::warn!("unknown memory mode '{other}', using paging");
                Self::Paging
            }
        }
    }
}

/// Placement algorithm for partition allocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FitAlgorithm {
    #[default]
    FirstFit,
    BestFit,
    WorstFit,
}

impl FitAlgorithm {
    /// Parse an algorithm name; unknown names fall back to first fit.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "best_fit" => Self::BestFit,
            "worst_fit" => Self::WorstFit,
            "first_fit" => Self::FirstFit,
            other => {
                log::warn!("unknown fit algorithm '{other}', using first_fit");
                Self::FirstFit
            }
        }
    }
}

/// Page-replacement policy for paging mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplacementPolicy {
    /// Evict the page with the oldest load time.
    #[default]
    Fifo,
    /// Evict the page with the oldest access time.
    Lru,
    /// Second-chance scan over the frame table.
    Clock,
}

impl ReplacementPolicy {
    /// Parse a policy name; unknown names fall back to FIFO.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.to_uppercase().as_str() {
            "LRU" => Self::Lru,
            "CLOCK" => Self::Clock,
            "FIFO" => Self::Fifo,
            other => {
                log::warn!("unknown replacement policy '{other}', using FIFO");
                Self::Fifo
            }
        }
    }
}

/// Device-queue ordering policy applied when a device picks its next
/// request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IoSchedulingPolicy {
    #[default]
    Fcfs,
    /// Shortest seek time first relative to the disk head.
    Sstf,
    /// Elevator sweep in the current direction.
    Scan,
    /// Stable ascending sort on request priority.
    Priority,
}

impl IoSchedulingPolicy {
    /// Parse a policy name; unknown names fall back to FCFS.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.to_uppercase().as_str() {
            "SSTF" => Self::Sstf,
            "SCAN" => Self::Scan,
            "PRIORITY" => Self::Priority,
            "FCFS" => Self::Fcfs,
            other => {
                log::warn!("unknown I/O scheduling policy '{other}', using FCFS");
                Self::Fcfs
            }
        }
    }
}

/// Engine configuration. Defaults mirror the recognized configuration
/// surface: paging over 1024 memory units, FCFS with a quantum of 4.
#[derive(Debug, Clone, Serialize)]
pub struct KernelConfig {
    pub memory_mode: MemoryMode,
    pub total_memory: u64,
    pub algorithm: SchedulingAlgorithm,
    pub time_quantum: u64,
    pub io_policy: IoSchedulingPolicy,
    pub replacement: ReplacementPolicy,
    /// Seed for the I/O early-completion jitter mode. `None` keeps
    /// device completion fully deterministic.
    pub jitter_seed: Option<u64>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            memory_mode: MemoryMode::default(),
            total_memory: 1024,
            algorithm: SchedulingAlgorithm::default(),
            time_quantum: 4,
            io_policy: IoSchedulingPolicy::default(),
            replacement: ReplacementPolicy::default(),
            jitter_seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_parsing_is_case_insensitive() {
        assert_eq!(SchedulingAlgorithm::from_name("rr"), SchedulingAlgorithm::RoundRobin);
        assert_eq!(SchedulingAlgorithm::from_name("Priority"), SchedulingAlgorithm::Priority);
        assert_eq!(SchedulingAlgorithm::from_name("sjf"), SchedulingAlgorithm::Sjf);
    }

    #[test]
    fn test_unknown_names_fall_back_to_defaults() {
        assert_eq!(SchedulingAlgorithm::from_name("LOTTERY"), SchedulingAlgorithm::Fcfs);
        assert_eq!(MemoryMode::from_name("buddy"), MemoryMode::Paging);
        assert_eq!(ReplacementPolicy::from_name("OPT"), ReplacementPolicy::Fifo);
        assert_eq!(IoSchedulingPolicy::from_name("C-LOOK"), IoSchedulingPolicy::Fcfs);
        assert_eq!(FitAlgorithm::from_name("next_fit"), FitAlgorithm::FirstFit);
    }
}
