// src/kernel/mod.rs
//! The simulation engine.
//!
//! [`Kernel`] owns the logical clock and the five subsystems (process
//! table, CPU scheduler, memory manager, I/O manager and concurrency
//! layer) and sequences every mutation: each tick runs the scheduler
//! first, then the I/O step. All state the engine exposes is a
//! serializable snapshot, so an API layer never reaches into live
//! structures.
//!
//! The engine is single-threaded and cooperative. Embedders that want
//! to share it across threads go through [`global`], which wraps one
//! instance in a single lock.

pub mod core;
pub mod io;
pub mod mm;
pub mod process;
pub mod scheduler;
pub mod stats;
pub mod sync;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use self::core::{
    FitAlgorithm, IoError, IoSchedulingPolicy, KernelConfig, KernelResult, MemoryError,
    MemoryMode, Pid, ProcessError, SchedulingAlgorithm,
};
use self::io::{DeviceState, IoManager, IoOperation, IoStatistics};
use self::mm::{MemoryManager, MemoryState, PagingMetrics};
use self::process::{Pcb, ProcessState, ProcessTable};
use self::scheduler::{CpuMetrics, CpuScheduler, CpuState};
use self::stats::{TimelineBuilder, TimelineSegment};
use self::sync::{ConcurrencyManager, SyncState};

pub use self::core::KernelError;

/// The simulation engine.
#[derive(Debug)]
pub struct Kernel {
    table: ProcessTable,
    scheduler: CpuScheduler,
    memory: MemoryManager,
    io: IoManager,
    concurrency: ConcurrencyManager,
    clock: u64,
    config: KernelConfig,
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}

impl Kernel {
    #[must_use]
    pub fn new(config: KernelConfig) -> Self {
        let mut io = IoManager::new();
        if let Some(seed) = config.jitter_seed {
            io.enable_jitter(seed);
        }
        log::info!(
            "kernel initialized: {:?} over {} units, default {}",
            config.memory_mode,
            config.total_memory,
            config.algorithm.as_str()
        );
        Self {
            table: ProcessTable::new(),
            scheduler: CpuScheduler::new(),
            memory: MemoryManager::new(config.memory_mode, config.total_memory),
            io,
            concurrency: ConcurrencyManager::new(),
            clock: 0,
            config,
        }
    }

    #[must_use]
    pub const fn clock(&self) -> u64 {
        self.clock
    }

    #[must_use]
    pub const fn config(&self) -> &KernelConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Process operations
    // ------------------------------------------------------------------

    /// Create a process and allocate its memory. On allocation failure
    /// the PCB is terminated and the error returned. A process created
    /// while the CPU is idle is dispatched immediately.
    pub fn create_process(
        &mut self,
        name: &str,
        priority: u32,
        burst_time: u64,
        memory_required: u64,
    ) -> KernelResult<Pid> {
        let pid = self.table.create(name, priority, burst_time, memory_required, self.clock);

        if memory_required > 0 {
            match self.memory.allocate(pid, memory_required, FitAlgorithm::FirstFit) {
                Some(base) => {
                    if self.memory.mode() != MemoryMode::Paging {
                        self.table.set_memory_base(pid, Some(base));
                    }
                }
                None => {
                    log::warn!("pid {pid} ({name}): no memory for {memory_required} units");
                    self.table.terminate(pid, self.clock);
                    return Err(MemoryError::AllocationFailed { pid, size: memory_required }.into());
                }
            }
        }

        if self.table.running_process().is_none() {
            self.table.to_running(pid, self.clock);
        }
        log::info!("pid {pid} ({name}) created: burst {burst_time}, {memory_required} units");
        Ok(pid)
    }

    /// Explicit state transition, as driven by an outer layer.
    pub fn transition(&mut self, pid: Pid, target: ProcessState, reason: Option<&str>) -> KernelResult<()> {
        if self.table.get(pid).is_none() {
            return Err(ProcessError::UnknownPid(pid).into());
        }
        match target {
            ProcessState::Ready | ProcessState::New => self.table.to_ready(pid),
            ProcessState::Running => {
                if !self.table.to_running(pid, self.clock) {
                    let holder = self.table.running_process().unwrap_or(pid);
                    return Err(ProcessError::CpuBusy { pid, holder }.into());
                }
            }
            ProcessState::Waiting => self.table.to_waiting(pid, reason.unwrap_or("IO")),
            ProcessState::Terminated => {
                self.table.terminate(pid, self.clock);
                self.release_memory(pid);
            }
        }
        Ok(())
    }

    #[must_use]
    pub const fn process_table(&self) -> &ProcessTable {
        &self.table
    }

    pub fn process_table_mut(&mut self) -> &mut ProcessTable {
        &mut self.table
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    /// Advance the whole machine by one tick: clock, CPU scheduling,
    /// then the I/O step. Returns the pid that consumed the CPU tick.
    pub fn schedule_step(&mut self, algorithm: SchedulingAlgorithm, time_quantum: u64) -> Option<Pid> {
        self.clock += 1;
        let executed = self
            .scheduler
            .schedule_step(&mut self.table, self.clock, algorithm, time_quantum);
        self.io.step(self.clock, self.config.io_policy, &mut self.table);
        self.reap_terminated();
        executed
    }

    /// One tick under the configured defaults.
    pub fn tick(&mut self) -> Option<Pid> {
        self.schedule_step(self.config.algorithm, self.config.time_quantum)
    }

    /// Run up to `steps` ticks, stopping early once every process has
    /// terminated. Produces the timeline and the end-of-run metrics.
    pub fn simulate(&mut self, algorithm: SchedulingAlgorithm, time_quantum: u64, steps: u64) -> SimulationRun {
        log::info!("simulation: {} for up to {steps} steps", algorithm.as_str());
        let mut timeline = TimelineBuilder::new();

        for _ in 0..steps {
            if self.table.active_count() == 0 {
                log::info!("simulation drained at tick {}", self.clock);
                break;
            }
            if let Some(pid) = self.schedule_step(algorithm, time_quantum)
                && let Some(pcb) = self.table.get(pid)
            {
                timeline.record(self.clock, pcb.name(), pcb.priority());
            }
        }

        SimulationRun {
            timeline: timeline.build(),
            metrics: self.metrics(),
        }
    }

    /// End-of-run metrics for every subsystem.
    #[must_use]
    pub fn metrics(&self) -> SimulationMetrics {
        SimulationMetrics {
            cpu: self.scheduler.metrics(&self.table),
            memory: self.memory.paging_metrics(),
            io: self.io.statistics(),
        }
    }

    /// Release memory held by terminated processes. Runs after every
    /// tick so bindings never outlive their owner.
    fn reap_terminated(&mut self) {
        let finished: Vec<Pid> = self
            .table
            .iter()
            .filter(|p| p.state() == ProcessState::Terminated)
            .map(Pcb::pid)
            .filter(|&pid| self.memory.has_allocation(pid))
            .collect();
        for pid in finished {
            self.release_memory(pid);
        }
    }

    fn release_memory(&mut self, pid: Pid) {
        if self.memory.deallocate(pid) {
            self.table.set_memory_base(pid, None);
        }
    }

    // ------------------------------------------------------------------
    // Memory operations
    // ------------------------------------------------------------------

    /// Allocate memory for an existing process.
    pub fn allocate_memory(&mut self, pid: Pid, size: u64, algorithm: FitAlgorithm) -> KernelResult<u64> {
        if self.table.get(pid).is_none() {
            return Err(ProcessError::UnknownPid(pid).into());
        }
        let base = self
            .memory
            .allocate(pid, size, algorithm)
            .ok_or(MemoryError::AllocationFailed { pid, size })?;
        if self.memory.mode() != MemoryMode::Paging {
            self.table.set_memory_base(pid, Some(base));
        }
        Ok(base)
    }

    /// Touch a page of a process's address space, servicing any fault
    /// with the configured replacement policy. Reports whether the
    /// access faulted; always `false` outside paging mode.
    pub fn access_page(&mut self, pid: Pid, page_no: usize) -> bool {
        let policy = self.config.replacement;
        self.memory.access(pid, page_no, policy)
    }

    /// Release a process's memory. Returns whether anything was held.
    pub fn deallocate_memory(&mut self, pid: Pid) -> bool {
        let had = self.memory.deallocate(pid);
        if had {
            self.table.set_memory_base(pid, None);
        }
        had
    }

    #[must_use]
    pub fn memory_state(&self) -> MemoryState {
        self.memory.state()
    }

    #[must_use]
    pub const fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut MemoryManager {
        &mut self.memory
    }

    // ------------------------------------------------------------------
    // I/O operations
    // ------------------------------------------------------------------

    /// Queue an I/O request against a known device.
    pub fn request_io(
        &mut self,
        pid: Pid,
        device: &str,
        operation: IoOperation,
        data_size: u64,
        priority: u32,
    ) -> KernelResult<u64> {
        self.io
            .request(pid, device, operation, data_size, priority, self.clock)
            .ok_or_else(|| IoError::UnknownDevice(device.to_string()).into())
    }

    /// Run one I/O step at the current clock without advancing it.
    pub fn io_step(&mut self, policy: IoSchedulingPolicy) {
        self.io.step(self.clock, policy, &mut self.table);
    }

    #[must_use]
    pub fn io_devices(&self) -> Vec<DeviceState> {
        self.io.devices_state()
    }

    #[must_use]
    pub fn io_statistics(&self) -> IoStatistics {
        self.io.statistics()
    }

    #[must_use]
    pub const fn io(&self) -> &IoManager {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut IoManager {
        &mut self.io
    }

    // ------------------------------------------------------------------
    // Concurrency operations
    // ------------------------------------------------------------------

    pub fn create_semaphore(&mut self, name: &str, initial: u64, max_value: Option<u64>) {
        self.concurrency.create_semaphore(name, initial, max_value);
    }

    pub fn create_mutex(&mut self, name: &str) {
        self.concurrency.create_mutex(name);
    }

    /// Semaphore P operation. A process that fails to acquire is moved
    /// to WAITING.
    pub fn semaphore_wait(&mut self, name: &str, pid: Pid) -> KernelResult<bool> {
        let acquired = self.concurrency.semaphore_wait(name, pid).map_err(KernelError::from)?;
        if !acquired {
            self.table.to_waiting(pid, name);
        }
        Ok(acquired)
    }

    /// Semaphore V operation. A woken process is moved back to READY.
    pub fn semaphore_signal(&mut self, name: &str, pid: Pid) -> KernelResult<Option<Pid>> {
        let woken = self.concurrency.semaphore_signal(name, pid).map_err(KernelError::from)?;
        self.wake(woken);
        Ok(woken)
    }

    /// Mutex lock. A process that fails to acquire is moved to WAITING.
    pub fn mutex_lock(&mut self, name: &str, pid: Pid) -> KernelResult<bool> {
        let acquired = self.concurrency.mutex_lock(name, pid).map_err(KernelError::from)?;
        if !acquired {
            self.table.to_waiting(pid, name);
        }
        Ok(acquired)
    }

    /// Mutex unlock; fails for non-owners. A woken process is moved
    /// back to READY.
    pub fn mutex_unlock(&mut self, name: &str, pid: Pid) -> KernelResult<Option<Pid>> {
        let woken = self.concurrency.mutex_unlock(name, pid).map_err(KernelError::from)?;
        self.wake(woken);
        Ok(woken)
    }

    fn wake(&mut self, pid: Option<Pid>) {
        if let Some(pid) = pid
            && self.table.get(pid).map(Pcb::state) == Some(ProcessState::Waiting)
        {
            self.table.to_ready(pid);
        }
    }

    pub fn init_bankers(&mut self, resources: Vec<u64>) {
        self.concurrency.init_bankers(resources);
    }

    /// Declare a process to the banker's algorithm.
    pub fn bankers_add_process(&mut self, pid: Pid, max_need: Vec<u64>) -> KernelResult<bool> {
        Ok(self.concurrency.bankers_mut().map_err(KernelError::from)?.add_process(pid, max_need))
    }

    /// Banker-checked resource request.
    pub fn bankers_request(&mut self, pid: Pid, request: &[u64]) -> KernelResult<bool> {
        Ok(self
            .concurrency
            .bankers_mut()
            .map_err(KernelError::from)?
            .request_resources(pid, request))
    }

    #[must_use]
    pub fn check_deadlock(&self) -> Vec<Pid> {
        self.concurrency.check_deadlock()
    }

    #[must_use]
    pub fn concurrency_state(&self) -> SyncState {
        self.concurrency.state()
    }

    #[must_use]
    pub const fn concurrency(&self) -> &ConcurrencyManager {
        &self.concurrency
    }

    pub fn concurrency_mut(&mut self) -> &mut ConcurrencyManager {
        &mut self.concurrency
    }

    // ------------------------------------------------------------------
    // Aggregate state
    // ------------------------------------------------------------------

    /// Snapshot of the whole machine.
    #[must_use]
    pub fn system_state(&self) -> SystemState {
        SystemState {
            clock: self.clock,
            processes: self.table.snapshot(),
            cpu: self.scheduler.cpu_state(&self.table),
            memory: self.memory.state(),
            io_devices: self.io.devices_state(),
            concurrency: self.concurrency.state(),
        }
    }
}

/// Whole-machine snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SystemState {
    pub clock: u64,
    pub processes: Vec<Pcb>,
    pub cpu: CpuState,
    pub memory: MemoryState,
    pub io_devices: Vec<DeviceState>,
    pub concurrency: SyncState,
}

/// Metrics block of a simulation run. The memory section is present
/// only in paging mode and serializes as an empty object otherwise.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationMetrics {
    pub cpu: CpuMetrics,
    #[serde(serialize_with = "memory_metrics_or_empty")]
    pub memory: Option<PagingMetrics>,
    pub io: IoStatistics,
}

/// Result of [`Kernel::simulate`]: the merged execution timeline plus
/// end-of-run metrics.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationRun {
    pub timeline: Vec<TimelineSegment>,
    pub metrics: SimulationMetrics,
}

fn memory_metrics_or_empty<S: Serializer>(
    value: &Option<PagingMetrics>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(metrics) => metrics.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

/// The process-wide engine instance behind a single lock.
///
/// Every invariant in the engine assumes serialized access; callers on
/// other threads must go through [`with`], which takes the lock for
/// the duration of the closure.
pub mod global {
    use lazy_static::lazy_static;
    use spin::Mutex;

    use super::core::{KernelConfig, KernelError, KernelResult};
    use super::Kernel;

    lazy_static! {
        static ref KERNEL: Mutex<Option<Kernel>> = Mutex::new(None);
    }

    /// Build (or rebuild) the global engine.
    pub fn initialize(config: KernelConfig) {
        *KERNEL.lock() = Some(Kernel::new(config));
    }

    /// Run `f` against the global engine. Fails with
    /// [`KernelError::Uninitialized`] before [`initialize`].
    pub fn with<T>(f: impl FnOnce(&mut Kernel) -> T) -> KernelResult<T> {
        let mut guard = KERNEL.lock();
        match guard.as_mut() {
            Some(kernel) => Ok(f(kernel)),
            None => Err(KernelError::Uninitialized),
        }
    }

    /// Tear the global engine down (mainly for tests).
    pub fn shutdown() {
        *KERNEL.lock() = None;
    }

    #[must_use]
    pub fn is_initialized() -> bool {
        KERNEL.lock().is_some()
    }
}
