// src/kernel/scheduler/mod.rs
//! CPU scheduling.
//!
//! One call to [`CpuScheduler::schedule_step`] advances the machine by
//! a single tick under the selected policy. Dispatch happens at the
//! tick's start boundary, termination at its end; waiting time is
//! charged after the execution phase, to every process that sat in the
//! ready queue without running that tick. Ties in the argmin scans
//! (priority, remaining time) are broken by queue order: the first
//! element achieving the minimum wins.

use serde::Serialize;

use crate::kernel::core::{Pid, SchedulingAlgorithm};
use crate::kernel::process::{Pcb, ProcessState, ProcessTable};

/// CPU scheduler state: the active policy plus the Round-Robin quantum
/// counter, which survives across ticks.
#[derive(Debug)]
pub struct CpuScheduler {
    algorithm: SchedulingAlgorithm,
    time_quantum: u64,
    quantum_counter: u64,
}

impl Default for CpuScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuScheduler {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            algorithm: SchedulingAlgorithm::Fcfs,
            time_quantum: 4,
            quantum_counter: 0,
        }
    }

    /// Advance the CPU by one tick (`now` is the tick being executed,
    /// starting at 1). Returns the pid that consumed the tick, if any.
    pub fn schedule_step(
        &mut self,
        table: &mut ProcessTable,
        now: u64,
        algorithm: SchedulingAlgorithm,
        time_quantum: u64,
    ) -> Option<Pid> {
        self.algorithm = algorithm;
        self.time_quantum = time_quantum.max(1);

        match algorithm {
            SchedulingAlgorithm::Fcfs => self.step_fcfs(table, now),
            SchedulingAlgorithm::Sjf => self.step_sjf(table, now),
            SchedulingAlgorithm::RoundRobin => self.step_round_robin(table, now),
            SchedulingAlgorithm::Priority => self.step_priority(table, now),
        }
    }

    /// First come, first served: run the current process to completion,
    /// then take the head of the ready queue.
    fn step_fcfs(&mut self, table: &mut ProcessTable, now: u64) -> Option<Pid> {
        let executed = match table.running_process() {
            Some(pid) => {
                table.execute(pid, 1, now);
                Some(pid)
            }
            None => {
                let head = table.ready_head();
                Self::dispatch_and_execute(table, head, now)
            }
        };
        table.tick_waiting_times();
        executed
    }

    /// Non-preemptive SJF: a running process is never disturbed; on an
    /// idle CPU the ready process with the least remaining time wins.
    fn step_sjf(&mut self, table: &mut ProcessTable, now: u64) -> Option<Pid> {
        let executed = match table.running_process() {
            Some(pid) => {
                table.execute(pid, 1, now);
                Some(pid)
            }
            None => {
                let shortest = argmin_by(table, |pcb| pcb.remaining_time());
                Self::dispatch_and_execute(table, shortest, now)
            }
        };
        table.tick_waiting_times();
        executed
    }

    /// Round robin: rotate the running process to the tail of the
    /// ready queue once it has held the CPU for a full quantum. The
    /// successor is loaded in the same tick but executes from the next
    /// one, so no process is charged two units for a single tick.
    fn step_round_robin(&mut self, table: &mut ProcessTable, now: u64) -> Option<Pid> {
        if table.running_process().is_none() {
            let Some(head) = table.ready_head() else {
                table.tick_waiting_times();
                return None;
            };
            table.to_running(head, now.saturating_sub(1));
            self.quantum_counter = 0;
        }

        let current = table.running_process()?;
        let completed = table.execute(current, 1, now);
        self.quantum_counter += 1;
        table.tick_waiting_times();

        if completed {
            self.quantum_counter = 0;
            if let Some(next) = table.ready_head() {
                table.to_running(next, now);
            }
        } else if self.quantum_counter >= self.time_quantum {
            table.increment_context_switches(current);
            table.to_ready(current);
            self.quantum_counter = 0;
            if let Some(next) = table.ready_head() {
                table.to_running(next, now);
            }
        }
        Some(current)
    }

    /// Preemptive priority: a strictly better-priority arrival evicts
    /// the running process. A lone running process never preempts
    /// itself (ties keep the CPU).
    fn step_priority(&mut self, table: &mut ProcessTable, now: u64) -> Option<Pid> {
        let executed = match table.running_process() {
            Some(current) => {
                let best = argmin_by(table, |pcb| u64::from(pcb.priority()));
                let preempt = best.is_some_and(|b| {
                    match (table.get(b), table.get(current)) {
                        (Some(bp), Some(cp)) => bp.priority() < cp.priority(),
                        _ => false,
                    }
                });

                if preempt {
                    // best.is_some checked by preempt
                    let best = best.unwrap_or(current);
                    table.increment_context_switches(current);
                    table.to_ready(current);
                    Self::dispatch_and_execute(table, Some(best), now)
                } else {
                    table.execute(current, 1, now);
                    Some(current)
                }
            }
            None => {
                let best = argmin_by(table, |pcb| u64::from(pcb.priority()));
                Self::dispatch_and_execute(table, best, now)
            }
        };
        table.tick_waiting_times();
        executed
    }

    fn dispatch_and_execute(table: &mut ProcessTable, pid: Option<Pid>, now: u64) -> Option<Pid> {
        let pid = pid?;
        if !table.to_running(pid, now.saturating_sub(1)) {
            return None;
        }
        table.execute(pid, 1, now);
        Some(pid)
    }

    /// Aggregate metrics over terminated processes. All zeros while
    /// nothing has terminated.
    #[must_use]
    pub fn metrics(&self, table: &ProcessTable) -> CpuMetrics {
        let completed: Vec<&Pcb> = table
            .iter()
            .filter(|p| p.state() == ProcessState::Terminated)
            .collect();

        if completed.is_empty() {
            return CpuMetrics::default();
        }

        let count = completed.len() as f64;
        let avg_waiting_time =
            completed.iter().map(|p| p.waiting_time() as f64).sum::<f64>() / count;
        let avg_turnaround_time =
            completed.iter().map(|p| p.turnaround_time() as f64).sum::<f64>() / count;

        let responses: Vec<u64> = completed.iter().filter_map(|p| p.response_time()).collect();
        let avg_response_time = if responses.is_empty() {
            0.0
        } else {
            responses.iter().map(|&r| r as f64).sum::<f64>() / responses.len() as f64
        };

        CpuMetrics {
            avg_waiting_time,
            avg_turnaround_time,
            avg_response_time,
            throughput: completed.len() as u64,
            total_context_switches: completed.iter().map(|p| p.context_switches()).sum(),
        }
    }

    /// Snapshot of the scheduler for state reporting.
    #[must_use]
    pub fn cpu_state(&self, table: &ProcessTable) -> CpuState {
        let running = table.running_process().and_then(|pid| {
            table.get(pid).map(|pcb| RunningSummary {
                pid,
                name: pcb.name().to_string(),
                remaining_time: pcb.remaining_time(),
            })
        });

        CpuState {
            algorithm: self.algorithm,
            time_quantum: self.time_quantum,
            quantum_counter: self.quantum_counter,
            running_process: running,
            ready_queue_size: table.ready_queue().len(),
        }
    }
}

/// Ready-queue argmin with stable first-wins tie-breaking.
fn argmin_by(table: &ProcessTable, key: impl Fn(&Pcb) -> u64) -> Option<Pid> {
    let mut best: Option<(Pid, u64)> = None;
    for &pid in table.ready_queue() {
        let Some(pcb) = table.get(pid) else { continue };
        let k = key(pcb);
        if best.is_none_or(|(_, bk)| k < bk) {
            best = Some((pid, k));
        }
    }
    best.map(|(pid, _)| pid)
}

/// Aggregate CPU metrics over terminated processes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CpuMetrics {
    pub avg_waiting_time: f64,
    pub avg_turnaround_time: f64,
    pub avg_response_time: f64,
    pub throughput: u64,
    pub total_context_switches: u64,
}

/// Running-process summary inside [`CpuState`].
#[derive(Debug, Clone, Serialize)]
pub struct RunningSummary {
    pub pid: Pid,
    pub name: String,
    pub remaining_time: u64,
}

/// Scheduler snapshot for state reporting.
#[derive(Debug, Clone, Serialize)]
pub struct CpuState {
    pub algorithm: SchedulingAlgorithm,
    pub time_quantum: u64,
    pub quantum_counter: u64,
    pub running_process: Option<RunningSummary>,
    pub ready_queue_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(
        table: &mut ProcessTable,
        scheduler: &mut CpuScheduler,
        algorithm: SchedulingAlgorithm,
        quantum: u64,
        ticks: u64,
    ) -> Vec<Option<Pid>> {
        (1..=ticks)
            .map(|now| scheduler.schedule_step(table, now, algorithm, quantum))
            .collect()
    }

    fn pids(executed: &[Option<Pid>]) -> Vec<u64> {
        executed.iter().flatten().map(|p| p.as_u64()).collect()
    }

    #[test]
    fn test_fcfs_runs_in_arrival_order() {
        let mut table = ProcessTable::new();
        table.create("P1", 5, 3, 100, 0);
        table.create("P2", 5, 2, 100, 0);
        table.create("P3", 5, 1, 100, 0);

        let mut scheduler = CpuScheduler::new();
        let executed = run(&mut table, &mut scheduler, SchedulingAlgorithm::Fcfs, 4, 6);
        assert_eq!(pids(&executed), vec![1, 1, 1, 2, 2, 3]);

        let metrics = scheduler.metrics(&table);
        assert_eq!(metrics.throughput, 3);
        assert_eq!(metrics.total_context_switches, 0);
        assert!((metrics.avg_waiting_time - 8.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_sjf_picks_shortest_when_idle() {
        let mut table = ProcessTable::new();
        table.create("P1", 5, 3, 100, 0);
        table.create("P2", 5, 2, 100, 0);
        table.create("P3", 5, 1, 100, 0);

        let mut scheduler = CpuScheduler::new();
        let executed = run(&mut table, &mut scheduler, SchedulingAlgorithm::Sjf, 4, 6);
        // Idle CPU at every dispatch point: shortest job first throughout.
        assert_eq!(pids(&executed), vec![3, 2, 2, 1, 1, 1]);
    }

    #[test]
    fn test_sjf_never_preempts_running_process() {
        let mut table = ProcessTable::new();
        let p1 = table.create("P1", 5, 4, 100, 0);
        table.to_running(p1, 0);
        table.create("P2", 5, 1, 100, 0);

        let mut scheduler = CpuScheduler::new();
        let executed = run(&mut table, &mut scheduler, SchedulingAlgorithm::Sjf, 4, 5);
        assert_eq!(pids(&executed), vec![1, 1, 1, 1, 2]);
    }

    #[test]
    fn test_round_robin_quantum_one_rotates_every_tick() {
        let mut table = ProcessTable::new();
        table.create("P1", 5, 3, 100, 0);
        table.create("P2", 5, 3, 100, 0);

        let mut scheduler = CpuScheduler::new();
        let executed = run(&mut table, &mut scheduler, SchedulingAlgorithm::RoundRobin, 1, 6);
        assert_eq!(pids(&executed), vec![1, 2, 1, 2, 1, 2]);
    }

    #[test]
    fn test_round_robin_interleaves_on_quantum_expiry() {
        let mut table = ProcessTable::new();
        table.create("P1", 5, 5, 100, 0);
        table.create("P2", 5, 3, 100, 0);

        let mut scheduler = CpuScheduler::new();
        let executed = run(&mut table, &mut scheduler, SchedulingAlgorithm::RoundRobin, 2, 8);
        assert_eq!(pids(&executed), vec![1, 1, 2, 2, 1, 1, 2, 1]);

        let metrics = scheduler.metrics(&table);
        assert!(metrics.total_context_switches >= 3);
    }

    #[test]
    fn test_priority_preempts_on_better_arrival() {
        let mut table = ProcessTable::new();
        let p1 = table.create("P1", 5, 5, 100, 0);
        table.to_running(p1, 0);

        let mut scheduler = CpuScheduler::new();
        for now in 1..=2 {
            scheduler.schedule_step(&mut table, now, SchedulingAlgorithm::Priority, 4);
        }
        table.create("P2", 1, 2, 100, 2);

        let executed: Vec<Option<Pid>> = (3..=7)
            .map(|now| scheduler.schedule_step(&mut table, now, SchedulingAlgorithm::Priority, 4))
            .collect();
        assert_eq!(pids(&executed), vec![2, 2, 1, 1, 1]);

        let p1_pcb = table.get(p1).unwrap();
        assert_eq!(p1_pcb.turnaround_time(), 7);
        assert!(p1_pcb.context_switches() >= 1);
    }

    #[test]
    fn test_priority_single_process_keeps_cpu() {
        let mut table = ProcessTable::new();
        let p1 = table.create("P1", 5, 3, 100, 0);
        table.to_running(p1, 0);

        let mut scheduler = CpuScheduler::new();
        let executed = run(&mut table, &mut scheduler, SchedulingAlgorithm::Priority, 4, 3);
        assert_eq!(pids(&executed), vec![1, 1, 1]);
        assert_eq!(table.get(p1).map(Pcb::context_switches), Some(0));
    }

    #[test]
    fn test_metrics_zero_without_terminations() {
        let mut table = ProcessTable::new();
        table.create("P1", 5, 3, 100, 0);
        let scheduler = CpuScheduler::new();
        assert_eq!(scheduler.metrics(&table), CpuMetrics::default());
    }
}
