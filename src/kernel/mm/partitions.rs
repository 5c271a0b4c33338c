// src/kernel/mm/partitions.rs
//! Fixed-partition allocation.
//!
//! Partitions are laid out back to back at construction time and never
//! move; allocation marks one partition as owned by a pid. Internal
//! fragmentation is the slack between a partition's size and what its
//! owner asked for, external fragmentation the sum of free partitions.

use serde::Serialize;

use crate::kernel::core::{FitAlgorithm, Pid};

/// Default partition layout (memory units).
pub const DEFAULT_PARTITION_SIZES: [u64; 4] = [64, 128, 256, 512];

/// A fixed memory partition.
#[derive(Debug, Clone, Serialize)]
pub struct Partition {
    pub id: usize,
    pub base: u64,
    pub size: u64,
    pub allocated: bool,
    pub owner: Option<Pid>,
    /// Units actually requested by the owner; drives internal
    /// fragmentation accounting.
    pub used: u64,
}

/// Fixed-partition allocator.
#[derive(Debug)]
pub struct PartitionManager {
    total_memory: u64,
    partitions: Vec<Partition>,
}

impl PartitionManager {
    #[must_use]
    pub fn new(total_memory: u64) -> Self {
        Self::with_sizes(total_memory, &DEFAULT_PARTITION_SIZES)
    }

    #[must_use]
    pub fn with_sizes(total_memory: u64, sizes: &[u64]) -> Self {
        let mut partitions = Vec::with_capacity(sizes.len());
        let mut base = 0;
        for (id, &size) in sizes.iter().enumerate() {
            partitions.push(Partition {
                id,
                base,
                size,
                allocated: false,
                owner: None,
                used: 0,
            });
            base += size;
        }
        Self { total_memory, partitions }
    }

    /// Allocate a partition for `pid` under the given placement
    /// algorithm. Returns the partition's base address, or `None` when
    /// no free partition is large enough.
    pub fn allocate(&mut self, pid: Pid, size: u64, algorithm: FitAlgorithm) -> Option<u64> {
        let index = match algorithm {
            FitAlgorithm::FirstFit => self
                .partitions
                .iter()
                .position(|p| !p.allocated && p.size >= size),
            FitAlgorithm::BestFit => self
                .partitions
                .iter()
                .enumerate()
                .filter(|(_, p)| !p.allocated && p.size >= size)
                .min_by_key(|(_, p)| p.size - size)
                .map(|(i, _)| i),
            FitAlgorithm::WorstFit => self
                .partitions
                .iter()
                .enumerate()
                .filter(|(_, p)| !p.allocated && p.size >= size)
                .max_by_key(|(_, p)| p.size)
                .map(|(i, _)| i),
        }?;

        let partition = &mut self.partitions[index];
        partition.allocated = true;
        partition.owner = Some(pid);
        partition.used = size;
        log::debug!(
            "pid {pid}: partition {} ({} units at base {}) via {algorithm:?}",
            partition.id,
            partition.size,
            partition.base
        );
        Some(partition.base)
    }

    /// Free every partition owned by `pid`. Returns `true` when at
    /// least one partition was released.
    pub fn deallocate(&mut self, pid: Pid) -> bool {
        let mut freed = false;
        for partition in &mut self.partitions {
            if partition.owner == Some(pid) {
                partition.allocated = false;
                partition.owner = None;
                partition.used = 0;
                freed = true;
                log::debug!("pid {pid}: released partition {}", partition.id);
            }
        }
        freed
    }

    #[must_use]
    pub fn has_allocation(&self, pid: Pid) -> bool {
        self.partitions.iter().any(|p| p.owner == Some(pid))
    }

    /// `(internal, external)` fragmentation in memory units.
    #[must_use]
    pub fn fragmentation(&self) -> (u64, u64) {
        let internal = self
            .partitions
            .iter()
            .filter(|p| p.allocated)
            .map(|p| p.size - p.used)
            .sum();
        let external = self
            .partitions
            .iter()
            .filter(|p| !p.allocated)
            .map(|p| p.size)
            .sum();
        (internal, external)
    }

    #[must_use]
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    #[must_use]
    pub const fn total_memory(&self) -> u64 {
        self.total_memory
    }
}
