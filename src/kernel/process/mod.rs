// src/kernel/process/mod.rs
//! Process lifecycle management.
//!
//! The process table is the authoritative store of PCBs and the single
//! point every other subsystem mutates through. Queue membership and
//! the state field are kept in lockstep: a pid lives in at most one of
//! the ready queue, the waiting queue or the running slot, and in none
//! of them once terminated.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

use crate::kernel::core::Pid;

/// Process state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProcessState {
    New,
    Ready,
    Running,
    Waiting,
    Terminated,
}

/// Process control block.
///
/// All times are logical ticks. `response_time` stays `None` until the
/// first dispatch and is never overwritten afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Pcb {
    pid: Pid,
    name: String,
    state: ProcessState,
    priority: u32,
    program_counter: u64,

    arrival_time: u64,
    burst_time: u64,
    remaining_time: u64,
    waiting_time: u64,
    turnaround_time: u64,
    response_time: Option<u64>,

    memory_required: u64,
    memory_base: Option<u64>,

    context_switches: u64,
    io_operations: u64,
}

impl Pcb {
    fn new(pid: Pid, name: String, priority: u32, burst_time: u64, memory_required: u64, now: u64) -> Self {
        Self {
            pid,
            name,
            state: ProcessState::New,
            priority,
            program_counter: 0,
            arrival_time: now,
            burst_time,
            remaining_time: burst_time,
            waiting_time: 0,
            turnaround_time: 0,
            response_time: None,
            memory_required,
            memory_base: None,
            context_switches: 0,
            io_operations: 0,
        }
    }

    #[must_use]
    pub const fn pid(&self) -> Pid {
        self.pid
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn state(&self) -> ProcessState {
        self.state
    }

    #[must_use]
    pub const fn priority(&self) -> u32 {
        self.priority
    }

    #[must_use]
    pub const fn program_counter(&self) -> u64 {
        self.program_counter
    }

    #[must_use]
    pub const fn arrival_time(&self) -> u64 {
        self.arrival_time
    }

    #[must_use]
    pub const fn burst_time(&self) -> u64 {
        self.burst_time
    }

    #[must_use]
    pub const fn remaining_time(&self) -> u64 {
        self.remaining_time
    }

    #[must_use]
    pub const fn waiting_time(&self) -> u64 {
        self.waiting_time
    }

    #[must_use]
    pub const fn turnaround_time(&self) -> u64 {
        self.turnaround_time
    }

    #[must_use]
    pub const fn response_time(&self) -> Option<u64> {
        self.response_time
    }

    #[must_use]
    pub const fn memory_required(&self) -> u64 {
        self.memory_required
    }

    #[must_use]
    pub const fn memory_base(&self) -> Option<u64> {
        self.memory_base
    }

    #[must_use]
    pub const fn context_switches(&self) -> u64 {
        self.context_switches
    }

    #[must_use]
    pub const fn io_operations(&self) -> u64 {
        self.io_operations
    }
}

/// Process table: pid-ordered PCB store plus the scheduling queues
/// derived from it.
///
/// Pids are allocated monotonically, so iteration over the map visits
/// processes in creation order.
#[derive(Debug)]
pub struct ProcessTable {
    processes: BTreeMap<Pid, Pcb>,
    next_pid: u64,
    ready_queue: VecDeque<Pid>,
    waiting_queue: Vec<Pid>,
    running: Option<Pid>,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            processes: BTreeMap::new(),
            next_pid: 1,
            ready_queue: VecDeque::new(),
            waiting_queue: Vec::new(),
            running: None,
        }
    }

    /// Create a PCB in NEW state and immediately move it to READY.
    pub fn create(
        &mut self,
        name: &str,
        priority: u32,
        burst_time: u64,
        memory_required: u64,
        now: u64,
    ) -> Pid {
        let pid = Pid::new(self.next_pid);
        self.next_pid += 1;

        let pcb = Pcb::new(pid, name.to_string(), priority, burst_time, memory_required, now);
        self.processes.insert(pid, pcb);
        self.to_ready(pid);
        pid
    }

    /// Move a pid to READY: append to the ready queue if absent, drop
    /// it from the waiting queue, release the CPU if it held it.
    /// Unknown pids are ignored.
    pub fn to_ready(&mut self, pid: Pid) {
        let Some(pcb) = self.processes.get_mut(&pid) else {
            return;
        };
        let old = pcb.state;
        pcb.state = ProcessState::Ready;

        if !self.ready_queue.contains(&pid) {
            self.ready_queue.push_back(pid);
        }
        self.waiting_queue.retain(|&p| p != pid);
        if self.running == Some(pid) {
            self.running = None;
        }
        log::debug!("pid {pid}: {old:?} -> READY");
    }

    /// Dispatch a pid. Fails (returns `false`) when the CPU is held by
    /// a different process. `now` is the dispatch boundary used for the
    /// one-shot response-time stamp.
    pub fn to_running(&mut self, pid: Pid, now: u64) -> bool {
        if !self.processes.contains_key(&pid) {
            return false;
        }
        if let Some(holder) = self.running
            && holder != pid
        {
            return false;
        }

        self.ready_queue.retain(|&p| p != pid);
        self.running = Some(pid);

        // contains_key checked above
        if let Some(pcb) = self.processes.get_mut(&pid) {
            let old = pcb.state;
            pcb.state = ProcessState::Running;
            if pcb.response_time.is_none() {
                pcb.response_time = Some(now.saturating_sub(pcb.arrival_time));
            }
            log::debug!("pid {pid}: {old:?} -> RUNNING");
        }
        true
    }

    /// Block a pid on I/O (or another wait reason). Unknown pids are
    /// ignored.
    pub fn to_waiting(&mut self, pid: Pid, reason: &str) {
        let Some(pcb) = self.processes.get_mut(&pid) else {
            return;
        };
        let old = pcb.state;
        pcb.state = ProcessState::Waiting;
        pcb.io_operations += 1;

        if !self.waiting_queue.contains(&pid) {
            self.waiting_queue.push(pid);
        }
        self.ready_queue.retain(|&p| p != pid);
        if self.running == Some(pid) {
            self.running = None;
        }
        log::debug!("pid {pid}: {old:?} -> WAITING ({reason})");
    }

    /// Terminate a pid: remove it from every queue and record its
    /// turnaround. Unknown pids are ignored.
    pub fn terminate(&mut self, pid: Pid, now: u64) {
        let Some(pcb) = self.processes.get_mut(&pid) else {
            return;
        };
        pcb.state = ProcessState::Terminated;
        pcb.remaining_time = 0;
        pcb.turnaround_time = now.saturating_sub(pcb.arrival_time);

        self.ready_queue.retain(|&p| p != pid);
        self.waiting_queue.retain(|&p| p != pid);
        if self.running == Some(pid) {
            self.running = None;
        }
        log::debug!("pid {pid}: TERMINATED at tick {now}");
    }

    /// Run the RUNNING pid for up to `slice` ticks. Returns `true` when
    /// the burst completes, in which case the pid is terminated within
    /// the same call.
    pub fn execute(&mut self, pid: Pid, slice: u64, now: u64) -> bool {
        let Some(pcb) = self.processes.get_mut(&pid) else {
            return false;
        };
        if pcb.state != ProcessState::Running {
            return false;
        }

        let executed = slice.min(pcb.remaining_time);
        pcb.remaining_time -= executed;
        pcb.program_counter += executed;

        if pcb.remaining_time == 0 {
            self.terminate(pid, now);
            return true;
        }
        false
    }

    /// Charge one tick of waiting time to every pid in the ready queue.
    pub fn tick_waiting_times(&mut self) {
        for pid in &self.ready_queue {
            if let Some(pcb) = self.processes.get_mut(pid) {
                pcb.waiting_time += 1;
            }
        }
    }

    pub fn increment_context_switches(&mut self, pid: Pid) {
        if let Some(pcb) = self.processes.get_mut(&pid) {
            pcb.context_switches += 1;
        }
    }

    /// Record the base address of the pid's memory binding (partition
    /// and segmentation modes).
    pub fn set_memory_base(&mut self, pid: Pid, base: Option<u64>) {
        if let Some(pcb) = self.processes.get_mut(&pid) {
            pcb.memory_base = base;
        }
    }

    #[must_use]
    pub fn get(&self, pid: Pid) -> Option<&Pcb> {
        self.processes.get(&pid)
    }

    #[must_use]
    pub const fn running_process(&self) -> Option<Pid> {
        self.running
    }

    #[must_use]
    pub fn ready_head(&self) -> Option<Pid> {
        self.ready_queue.front().copied()
    }

    #[must_use]
    pub const fn ready_queue(&self) -> &VecDeque<Pid> {
        &self.ready_queue
    }

    #[must_use]
    pub fn waiting_queue(&self) -> &[Pid] {
        &self.waiting_queue
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pcb> {
        self.processes.values()
    }

    /// Number of processes that have not yet terminated.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.processes
            .values()
            .filter(|p| p.state != ProcessState::Terminated)
            .count()
    }

    /// Snapshot of every PCB, in creation order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Pcb> {
        self.processes.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(bursts: &[u64]) -> ProcessTable {
        let mut table = ProcessTable::new();
        for (i, &burst) in bursts.iter().enumerate() {
            table.create(&format!("P{}", i + 1), 5, burst, 100, 0);
        }
        table
    }

    #[test]
    fn test_create_assigns_monotonic_pids_and_readies() {
        let mut table = table_with(&[3, 2]);
        let p1 = Pid::new(1);
        let p2 = Pid::new(2);

        assert_eq!(table.get(p1).map(Pcb::state), Some(ProcessState::Ready));
        assert_eq!(table.ready_queue().iter().copied().collect::<Vec<_>>(), vec![p1, p2]);
        let p3 = table.create("P3", 1, 1, 10, 4);
        assert_eq!(p3, Pid::new(3));
        assert_eq!(table.get(p3).map(Pcb::arrival_time), Some(4));
    }

    #[test]
    fn test_to_ready_is_idempotent() {
        let mut table = table_with(&[3]);
        let p1 = Pid::new(1);
        table.to_ready(p1);
        table.to_ready(p1);
        assert_eq!(table.ready_queue().iter().filter(|&&p| p == p1).count(), 1);
    }

    #[test]
    fn test_to_running_rejects_second_process() {
        let mut table = table_with(&[3, 2]);
        let p1 = Pid::new(1);
        let p2 = Pid::new(2);

        assert!(table.to_running(p1, 0));
        assert!(!table.to_running(p2, 0));
        assert_eq!(table.running_process(), Some(p1));
        assert_eq!(table.get(p2).map(Pcb::state), Some(ProcessState::Ready));
    }

    #[test]
    fn test_response_time_is_set_once() {
        let mut table = table_with(&[5]);
        let p1 = Pid::new(1);

        assert!(table.to_running(p1, 3));
        assert_eq!(table.get(p1).and_then(Pcb::response_time), Some(3));

        table.to_ready(p1);
        assert!(table.to_running(p1, 9));
        assert_eq!(table.get(p1).and_then(Pcb::response_time), Some(3));
    }

    #[test]
    fn test_execute_terminates_on_exhaustion() {
        let mut table = table_with(&[2]);
        let p1 = Pid::new(1);
        table.to_running(p1, 0);

        assert!(!table.execute(p1, 1, 1));
        assert!(table.execute(p1, 1, 2));

        let pcb = table.get(p1).unwrap();
        assert_eq!(pcb.state(), ProcessState::Terminated);
        assert_eq!(pcb.remaining_time(), 0);
        assert_eq!(pcb.turnaround_time(), 2);
        assert_eq!(table.running_process(), None);
    }

    #[test]
    fn test_zero_burst_terminates_on_first_execute() {
        let mut table = table_with(&[0]);
        let p1 = Pid::new(1);
        table.to_running(p1, 0);
        assert!(table.execute(p1, 1, 1));
        assert_eq!(table.get(p1).map(Pcb::state), Some(ProcessState::Terminated));
    }

    #[test]
    fn test_waiting_round_trip_counts_io() {
        let mut table = table_with(&[4]);
        let p1 = Pid::new(1);
        table.to_running(p1, 0);
        table.to_waiting(p1, "disk0");

        assert_eq!(table.running_process(), None);
        assert_eq!(table.waiting_queue(), &[p1]);
        assert_eq!(table.get(p1).map(Pcb::io_operations), Some(1));

        table.to_ready(p1);
        assert!(table.waiting_queue().is_empty());
        assert_eq!(table.get(p1).map(Pcb::state), Some(ProcessState::Ready));
    }

    #[test]
    fn test_queues_partition_known_pids() {
        let mut table = table_with(&[3, 2, 1]);
        let p1 = Pid::new(1);
        let p2 = Pid::new(2);

        table.to_running(p1, 0);
        table.to_waiting(p2, "printer0");
        table.terminate(Pid::new(3), 1);

        for pcb in table.iter() {
            let pid = pcb.pid();
            let in_ready = table.ready_queue().contains(&pid);
            let in_waiting = table.waiting_queue().contains(&pid);
            let is_running = table.running_process() == Some(pid);
            let memberships = usize::from(in_ready) + usize::from(in_waiting) + usize::from(is_running);
            match pcb.state() {
                ProcessState::Terminated => assert_eq!(memberships, 0),
                _ => assert_eq!(memberships, 1),
            }
        }
    }

    #[test]
    fn test_operations_ignore_unknown_pids() {
        let mut table = table_with(&[1]);
        let ghost = Pid::new(99);
        table.to_ready(ghost);
        table.to_waiting(ghost, "IO");
        table.terminate(ghost, 1);
        assert!(!table.to_running(ghost, 0));
        assert!(!table.execute(ghost, 1, 1));
        assert_eq!(table.active_count(), 1);
    }
}
