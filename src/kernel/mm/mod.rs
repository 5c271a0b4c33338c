// src/kernel/mm/mod.rs
//! Memory management.
//!
//! Three interchangeable modes behind one facade: fixed partitions,
//! demand paging and segmentation. The mode is chosen at engine
//! initialization and never changes for the lifetime of the manager.

pub mod paging;
pub mod partitions;
pub mod segmentation;

use serde::Serialize;

use crate::kernel::core::{FitAlgorithm, MemoryMode, Pid, ReplacementPolicy};

pub use paging::{Frame, Page, PagingManager, DEFAULT_PAGE_SIZE};
pub use partitions::{Partition, PartitionManager, DEFAULT_PARTITION_SIZES};
pub use segmentation::{Segment, SegmentationManager};

/// Frames per memory unit divisor: a 1024-unit machine gets 256 frames.
const FRAMES_PER_MEMORY_DIVISOR: u64 = 4;

/// Mode-dispatched memory manager.
#[derive(Debug)]
pub enum MemoryManager {
    Partitions(PartitionManager),
    Paging(PagingManager),
    Segmentation(SegmentationManager),
}

impl MemoryManager {
    /// Build a manager for `mode` over `total_memory` units. Paging
    /// derives its frame count from the memory size and uses the
    /// default page size; use [`MemoryManager::paging_with`] to pick
    /// both independently.
    #[must_use]
    pub fn new(mode: MemoryMode, total_memory: u64) -> Self {
        match mode {
            MemoryMode::Partitions => Self::Partitions(PartitionManager::new(total_memory)),
            MemoryMode::Paging => {
                let num_frames = (total_memory / FRAMES_PER_MEMORY_DIVISOR).max(1) as usize;
                Self::Paging(PagingManager::new(DEFAULT_PAGE_SIZE, num_frames))
            }
            MemoryMode::Segmentation => Self::Segmentation(SegmentationManager::new(total_memory)),
        }
    }

    /// Paging manager with explicit page size and frame count.
    #[must_use]
    pub fn paging_with(page_size: u64, num_frames: usize) -> Self {
        Self::Paging(PagingManager::new(page_size, num_frames))
    }

    #[must_use]
    pub const fn mode(&self) -> MemoryMode {
        match self {
            Self::Partitions(_) => MemoryMode::Partitions,
            Self::Paging(_) => MemoryMode::Paging,
            Self::Segmentation(_) => MemoryMode::Segmentation,
        }
    }

    /// Allocate `size` units for `pid`. Returns the base address of
    /// the binding (partitions/segmentation) or 0 for paging, whose
    /// binding is the page table itself. `None` when nothing fits.
    pub fn allocate(&mut self, pid: Pid, size: u64, algorithm: FitAlgorithm) -> Option<u64> {
        match self {
            Self::Partitions(mgr) => mgr.allocate(pid, size, algorithm),
            Self::Paging(mgr) => {
                mgr.allocate(pid, size);
                Some(0)
            }
            Self::Segmentation(mgr) => mgr.allocate(pid, size),
        }
    }

    /// Release everything `pid` holds in the current mode.
    pub fn deallocate(&mut self, pid: Pid) -> bool {
        match self {
            Self::Partitions(mgr) => mgr.deallocate(pid),
            Self::Paging(mgr) => mgr.deallocate(pid),
            Self::Segmentation(mgr) => mgr.deallocate(pid),
        }
    }

    #[must_use]
    pub fn has_allocation(&self, pid: Pid) -> bool {
        match self {
            Self::Partitions(mgr) => mgr.has_allocation(pid),
            Self::Paging(mgr) => mgr.has_allocation(pid),
            Self::Segmentation(mgr) => mgr.has_allocation(pid),
        }
    }

    /// Touch a page and service any fault (paging mode only; other
    /// modes report no fault).
    pub fn access(&mut self, pid: Pid, page_no: usize, policy: ReplacementPolicy) -> bool {
        match self {
            Self::Paging(mgr) => mgr.access(pid, page_no, policy),
            _ => false,
        }
    }

    #[must_use]
    pub fn paging(&self) -> Option<&PagingManager> {
        match self {
            Self::Paging(mgr) => Some(mgr),
            _ => None,
        }
    }

    pub fn paging_mut(&mut self) -> Option<&mut PagingManager> {
        match self {
            Self::Paging(mgr) => Some(mgr),
            _ => None,
        }
    }

    /// Paging counters, when the manager runs in paging mode.
    #[must_use]
    pub fn paging_metrics(&self) -> Option<PagingMetrics> {
        let Self::Paging(mgr) = self else { return None };
        Some(PagingMetrics::new(mgr.page_accesses(), mgr.page_faults()))
    }

    /// Mode-specific snapshot for state reporting.
    #[must_use]
    pub fn state(&self) -> MemoryState {
        match self {
            Self::Partitions(mgr) => {
                let (internal, external) = mgr.fragmentation();
                MemoryState::Partitions {
                    total_memory: mgr.total_memory(),
                    partitions: mgr.partitions().to_vec(),
                    internal_fragmentation: internal,
                    external_fragmentation: external,
                }
            }
            Self::Paging(mgr) => MemoryState::Paging {
                total_frames: mgr.frames().len(),
                frames: mgr.frames().to_vec(),
                page_faults: mgr.page_faults(),
                page_accesses: mgr.page_accesses(),
            },
            Self::Segmentation(mgr) => MemoryState::Segmentation {
                total_memory: mgr.total_memory(),
                free_blocks: mgr.free_blocks().to_vec(),
                segments: mgr
                    .segments()
                    .iter()
                    .map(|(&pid, segments)| ProcessSegments {
                        pid,
                        segments: segments.clone(),
                    })
                    .collect(),
            },
        }
    }
}

/// Per-process segment listing inside [`MemoryState::Segmentation`].
#[derive(Debug, Clone, Serialize)]
pub struct ProcessSegments {
    pub pid: Pid,
    pub segments: Vec<Segment>,
}

/// Mode-tagged memory snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum MemoryState {
    Partitions {
        total_memory: u64,
        partitions: Vec<Partition>,
        internal_fragmentation: u64,
        external_fragmentation: u64,
    },
    Paging {
        total_frames: usize,
        frames: Vec<Frame>,
        page_faults: u64,
        page_accesses: u64,
    },
    Segmentation {
        total_memory: u64,
        free_blocks: Vec<(u64, u64)>,
        segments: Vec<ProcessSegments>,
    },
}

/// Paging counters plus the derived hit rate (percent).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagingMetrics {
    pub page_faults: u64,
    pub page_accesses: u64,
    pub hit_rate: f64,
}

impl PagingMetrics {
    #[must_use]
    pub fn new(page_accesses: u64, page_faults: u64) -> Self {
        let hit_rate = if page_accesses == 0 {
            0.0
        } else {
            (page_accesses - page_faults) as f64 / page_accesses as f64 * 100.0
        };
        Self {
            page_faults,
            page_accesses,
            hit_rate,
        }
    }
}
