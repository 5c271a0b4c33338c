// src/kernel/io/mod.rs
//! I/O device management.
//!
//! Per-device request queues serviced one request at a time, an
//! interrupt staging queue drained once per step, and DMA transfer
//! tracking. Within a step the order is fixed: per device, service
//! completion precedes queue reordering and dispatch; the interrupt
//! drain follows all dispatching; DMA advances last.

pub mod device;
pub mod dma;
pub mod interrupt;
pub mod queue;

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::kernel::core::{IoSchedulingPolicy, Pid};
use crate::kernel::process::{ProcessState, ProcessTable};

pub use device::{Device, DeviceState, DeviceStatus, DeviceType, IoOperation, IoRequest};
pub use dma::{DmaController, DmaTransfer, DMA_RATE};
pub use interrupt::{Interrupt, InterruptController, InterruptKind};
pub use queue::{position, ScanDirection, HEAD_POSITION};

/// Chance that a busy device finishes early when jitter mode is on.
const JITTER_PROBABILITY: f64 = 0.3;

/// I/O manager: the device map plus interrupt and DMA controllers.
#[derive(Debug)]
pub struct IoManager {
    devices: BTreeMap<String, Device>,
    interrupts: InterruptController,
    dma: DmaController,
    request_counter: u64,
    completed: Vec<IoRequest>,
    scan_direction: ScanDirection,
    /// Seeded RNG for the optional early-completion jitter mode.
    jitter: Option<StdRng>,
}

impl Default for IoManager {
    fn default() -> Self {
        Self::new()
    }
}

impl IoManager {
    /// Manager with the standard device roster: two disks, a printer
    /// and a network interface.
    #[must_use]
    pub fn new() -> Self {
        let mut manager = Self::empty();
        manager.add_device("disk0", DeviceType::Disk, 50);
        manager.add_device("disk1", DeviceType::Disk, 50);
        manager.add_device("printer0", DeviceType::Printer, 10);
        manager.add_device("network0", DeviceType::Network, 100);
        manager
    }

    /// Manager with no devices.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            devices: BTreeMap::new(),
            interrupts: InterruptController::new(),
            dma: DmaController::new(),
            request_counter: 0,
            completed: Vec::new(),
            scan_direction: ScanDirection::Up,
            jitter: None,
        }
    }

    pub fn add_device(&mut self, name: &str, device_type: DeviceType, speed: u64) {
        log::debug!("device added: {name} ({device_type:?}, speed {speed})");
        self.devices.insert(name.to_string(), Device::new(name, device_type, speed));
    }

    /// Turn on the early-completion jitter branch, seeded for
    /// reproducibility.
    pub fn enable_jitter(&mut self, seed: u64) {
        self.jitter = Some(StdRng::seed_from_u64(seed));
    }

    /// Queue an I/O request. Returns the request id, or `None` for an
    /// unknown device.
    pub fn request(
        &mut self,
        pid: Pid,
        device_name: &str,
        operation: IoOperation,
        data_size: u64,
        priority: u32,
        now: u64,
    ) -> Option<u64> {
        let Some(device) = self.devices.get_mut(device_name) else {
            log::warn!("I/O request for unknown device '{device_name}'");
            return None;
        };

        self.request_counter += 1;
        let request_id = self.request_counter;
        device.enqueue(IoRequest {
            request_id,
            pid,
            device: device_name.to_string(),
            operation,
            data_size,
            priority,
            arrival_time: now,
            start_time: 0,
            completion_time: 0,
        });
        Some(request_id)
    }

    /// Advance every device by one step at tick `now`.
    ///
    /// Completed requests raise `IO_COMPLETE` interrupts; the drain at
    /// the end of the step wakes any process still WAITING on one.
    pub fn step(&mut self, now: u64, policy: IoSchedulingPolicy, table: &mut ProcessTable) {
        for device in self.devices.values_mut() {
            let due = device.current().is_some_and(|current| {
                let elapsed = now.saturating_sub(current.start_time);
                elapsed >= device.estimated_service_time().unwrap_or(0)
            });
            let jitter_fire = !due
                && device.current().is_some()
                && self
                    .jitter
                    .as_mut()
                    .is_some_and(|rng| rng.gen_bool(JITTER_PROBABILITY));

            if (due || jitter_fire)
                && let Some(done) = device.complete_current(now)
            {
                self.interrupts.raise(
                    InterruptKind::IoComplete,
                    &done.device,
                    done.pid,
                    serde_json::json!({ "request_id": done.request_id }),
                );
                self.completed.push(done);
            }

            if device.is_available() && !device.queue().is_empty() {
                queue::order_queue(device.queue_mut(), policy, self.scan_direction);
                device.start_next(now);
            }
        }

        for interrupt in self.interrupts.drain() {
            if interrupt.kind == InterruptKind::IoComplete
                && table.get(interrupt.pid).map(|p| p.state()) == Some(ProcessState::Waiting)
            {
                table.to_ready(interrupt.pid);
            }
        }

        self.dma.advance(DMA_RATE);
    }

    /// Begin a DMA transfer for a known device.
    pub fn start_dma(&mut self, device_name: &str, source: u64, dest: u64, size: u64) -> Option<u64> {
        if !self.devices.contains_key(device_name) {
            return None;
        }
        Some(self.dma.start_transfer(device_name, source, dest, size))
    }

    #[must_use]
    pub fn has_device(&self, name: &str) -> bool {
        self.devices.contains_key(name)
    }

    #[must_use]
    pub fn devices_state(&self) -> Vec<DeviceState> {
        self.devices.values().map(Device::state).collect()
    }

    #[must_use]
    pub fn device(&self, name: &str) -> Option<&Device> {
        self.devices.get(name)
    }

    #[must_use]
    pub fn completed_requests(&self) -> &[IoRequest] {
        &self.completed
    }

    #[must_use]
    pub fn dma(&self) -> &DmaController {
        &self.dma
    }

    #[must_use]
    pub fn statistics(&self) -> IoStatistics {
        let completed = self.completed.len() as u64;
        let avg_turnaround_time = if self.completed.is_empty() {
            0.0
        } else {
            self.completed
                .iter()
                .map(|r| r.completion_time.saturating_sub(r.arrival_time) as f64)
                .sum::<f64>()
                / self.completed.len() as f64
        };

        IoStatistics {
            total_requests: self.request_counter,
            completed_requests: completed,
            pending_requests: self.request_counter - completed,
            avg_turnaround_time,
            total_interrupts: self.interrupts.total(),
        }
    }
}

/// Aggregate I/O statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IoStatistics {
    pub total_requests: u64,
    pub completed_requests: u64,
    pub pending_requests: u64,
    pub avg_turnaround_time: f64,
    pub total_interrupts: u64,
}
