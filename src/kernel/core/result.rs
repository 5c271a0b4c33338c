// src/kernel/core/result.rs
//! Engine error taxonomy.
//!
//! Subsystem-internal operations stay idempotent and signal failure
//! through `bool`/`Option` returns; the typed errors here are the
//! engine-level surface an embedding layer (HTTP, CLI) translates
//! from. No operation leaves the engine in a partially mutated state.

use thiserror::Error;

use super::types::Pid;

/// Engine result type.
pub type KernelResult<T> = Result<T, KernelError>;

/// Top-level engine error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    /// An operation was attempted before the global engine was
    /// initialized.
    #[error("kernel is not initialized")]
    Uninitialized,
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Process-table errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error("unknown pid {0}")]
    UnknownPid(Pid),
    /// The CPU is already held by another process.
    #[error("cannot dispatch pid {pid}: CPU held by pid {holder}")]
    CpuBusy { pid: Pid, holder: Pid },
}

/// Memory-manager errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// No partition, frame or free block could satisfy the request.
    #[error("allocation of {size} units for pid {pid} failed")]
    AllocationFailed { pid: Pid, size: u64 },
    #[error("pid {0} holds no allocation in the current mode")]
    NoBinding(Pid),
}

/// I/O-manager errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IoError {
    #[error("unknown device '{0}'")]
    UnknownDevice(String),
}

/// Concurrency-layer errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("unknown semaphore '{0}'")]
    UnknownSemaphore(String),
    #[error("unknown mutex '{0}'")]
    UnknownMutex(String),
    /// `unlock` by a process that does not own the mutex. The mutex is
    /// not released.
    #[error("pid {pid} does not own mutex '{name}'")]
    NotOwner { name: String, pid: Pid },
    #[error("banker's algorithm is not initialized")]
    BankersUninitialized,
}
