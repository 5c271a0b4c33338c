// src/kernel/stats.rs
//! Execution timeline and derived statistics.
//!
//! The timeline is the Gantt-style view of a simulation run: one
//! segment per maximal run of consecutive ticks executed by the same
//! process. Colors come from a fixed palette, assigned in order of
//! first appearance, so the same workload always renders the same.

use serde::Serialize;

use crate::kernel::mm::Partition;
use crate::kernel::process::{Pcb, ProcessState};

/// Fixed segment color palette, cycled by first-appearance order.
pub const TIMELINE_PALETTE: [&str; 8] = [
    "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f", "#edc948", "#b07aa1", "#9c755f",
];

/// One merged run of ticks on the CPU. `start` is the tick boundary
/// the run began at (first tick of a simulation starts at boundary 0).
#[derive(Debug, Clone, Serialize)]
pub struct TimelineSegment {
    /// Process name (the key consumers chart by).
    #[serde(rename = "pid")]
    pub name: String,
    pub start: u64,
    pub duration: u64,
    pub priority: u32,
    pub color: String,
}

/// Incremental timeline assembly during a simulation run.
#[derive(Debug, Default)]
pub struct TimelineBuilder {
    segments: Vec<TimelineSegment>,
    seen: Vec<String>,
}

impl TimelineBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `name` executed the tick ending at `tick` (so it
    /// spans boundaries `tick - 1 .. tick`). Consecutive ticks of the
    /// same process merge into one segment.
    pub fn record(&mut self, tick: u64, name: &str, priority: u32) {
        let start = tick.saturating_sub(1);
        if let Some(last) = self.segments.last_mut()
            && last.name == name
            && last.start + last.duration == start
        {
            last.duration += 1;
            return;
        }

        let color = self.color_for(name);
        self.segments.push(TimelineSegment {
            name: name.to_string(),
            start,
            duration: 1,
            priority,
            color,
        });
    }

    fn color_for(&mut self, name: &str) -> String {
        let index = match self.seen.iter().position(|n| n == name) {
            Some(index) => index,
            None => {
                self.seen.push(name.to_string());
                self.seen.len() - 1
            }
        };
        TIMELINE_PALETTE[index % TIMELINE_PALETTE.len()].to_string()
    }

    #[must_use]
    pub fn build(self) -> Vec<TimelineSegment> {
        self.segments
    }
}

/// Fragmentation report over a partition table.
#[derive(Debug, Clone, Serialize)]
pub struct FragmentationReport {
    pub total_memory: u64,
    pub allocated_memory: u64,
    pub free_memory: u64,
    pub memory_utilization: f64,
    pub external_fragmentation: f64,
    pub num_free_blocks: usize,
}

/// Utilization and external fragmentation of a partition layout.
/// External fragmentation is the share of free memory that is not in
/// the largest free partition (free space a maximal request cannot
/// use).
#[must_use]
pub fn fragmentation_report(partitions: &[Partition]) -> FragmentationReport {
    let total: u64 = partitions.iter().map(|p| p.size).sum();
    let allocated: u64 = partitions.iter().filter(|p| p.allocated).map(|p| p.size).sum();
    let free = total - allocated;

    let free_blocks: Vec<&Partition> = partitions.iter().filter(|p| !p.allocated).collect();
    let external = match free_blocks.iter().map(|p| p.size).max() {
        Some(largest) if total > 0 => (free - largest) as f64 / total as f64 * 100.0,
        _ => 0.0,
    };

    FragmentationReport {
        total_memory: total,
        allocated_memory: allocated,
        free_memory: free,
        memory_utilization: if total > 0 {
            allocated as f64 / total as f64 * 100.0
        } else {
            0.0
        },
        external_fragmentation: external,
        num_free_blocks: free_blocks.len(),
    }
}

/// Page-fault/hit breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct PageFaultReport {
    pub total_accesses: u64,
    pub page_faults: u64,
    pub page_hits: u64,
    pub fault_rate: f64,
    pub hit_rate: f64,
}

#[must_use]
pub fn page_fault_report(total_accesses: u64, page_faults: u64) -> PageFaultReport {
    if total_accesses == 0 {
        return PageFaultReport {
            total_accesses: 0,
            page_faults: 0,
            page_hits: 0,
            fault_rate: 0.0,
            hit_rate: 0.0,
        };
    }
    let hits = total_accesses - page_faults;
    PageFaultReport {
        total_accesses,
        page_faults,
        page_hits: hits,
        fault_rate: page_faults as f64 / total_accesses as f64 * 100.0,
        hit_rate: hits as f64 / total_accesses as f64 * 100.0,
    }
}

/// CPU utilization over a finished workload: total burst demand versus
/// the longest creation-to-completion span, as a percentage.
#[must_use]
pub fn cpu_utilization<'a>(processes: impl Iterator<Item = &'a Pcb>) -> f64 {
    let completed: Vec<&Pcb> = processes
        .filter(|p| p.state() == ProcessState::Terminated)
        .collect();
    if completed.is_empty() {
        return 0.0;
    }

    let total_burst: u64 = completed.iter().map(|p| p.burst_time()).sum();
    let span = completed.iter().map(|p| p.turnaround_time()).max().unwrap_or(0);
    if span == 0 {
        return 0.0;
    }
    total_burst as f64 / span as f64 * 100.0
}
