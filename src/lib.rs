// src/lib.rs
//! sim_os: an educational operating-system simulator.
//!
//! The engine models the four classic kernel subsystems (process
//! lifecycle, CPU scheduling, memory management and I/O device
//! servicing) as cooperating state machines over a shared process
//! table, advanced in discrete ticks of a logical clock. Nothing here
//! touches real hardware: preemption, page faults and DMA transfers
//! are modeled, and the engine's job is to produce metrics (waiting
//! time, turnaround, page-fault rate, device utilization) and a
//! Gantt-style execution timeline.
//!
//! Entry points:
//! - [`Kernel`] for an owned engine instance;
//! - [`kernel::global`] for the process-wide instance behind a single
//!   lock, which is how an API layer is expected to drive it.

#![forbid(unsafe_code)]

pub mod kernel;

pub use kernel::core::{
    FitAlgorithm, IoSchedulingPolicy, KernelConfig, KernelError, KernelResult, MemoryMode, Pid,
    ReplacementPolicy, SchedulingAlgorithm,
};
pub use kernel::Kernel;
