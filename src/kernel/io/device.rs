// src/kernel/io/device.rs
//! Modeled I/O devices and their request queues.

use std::collections::VecDeque;

use serde::Serialize;

use crate::kernel::core::Pid;

/// Device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceType {
    Disk,
    Printer,
    Keyboard,
    Network,
    Usb,
}

/// Device availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceStatus {
    Idle,
    Busy,
    Error,
}

/// Direction of an I/O request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IoOperation {
    Read,
    Write,
}

impl IoOperation {
    /// Parse an operation name; anything that is not "write" reads.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("write") {
            Self::Write
        } else {
            Self::Read
        }
    }
}

/// A single I/O request. Timestamps are logical ticks.
#[derive(Debug, Clone, Serialize)]
pub struct IoRequest {
    pub request_id: u64,
    pub pid: Pid,
    pub device: String,
    pub operation: IoOperation,
    pub data_size: u64,
    pub priority: u32,
    pub arrival_time: u64,
    pub start_time: u64,
    pub completion_time: u64,
}

/// A modeled device: service speed, request queue, at most one request
/// in flight.
#[derive(Debug)]
pub struct Device {
    name: String,
    device_type: DeviceType,
    status: DeviceStatus,
    /// Data units serviced per tick.
    speed: u64,
    queue: VecDeque<IoRequest>,
    current: Option<IoRequest>,
    total_operations: u64,
    total_waiting_time: u64,
}

impl Device {
    #[must_use]
    pub fn new(name: &str, device_type: DeviceType, speed: u64) -> Self {
        Self {
            name: name.to_string(),
            device_type,
            status: DeviceStatus::Idle,
            speed: speed.max(1),
            queue: VecDeque::new(),
            current: None,
            total_operations: 0,
            total_waiting_time: 0,
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.status == DeviceStatus::Idle
    }

    pub fn enqueue(&mut self, request: IoRequest) {
        log::debug!(
            "device {}: request {} queued (queue length {})",
            self.name,
            request.request_id,
            self.queue.len() + 1
        );
        self.queue.push_back(request);
    }

    /// Pop the queue head into service. No-op unless the device is
    /// idle and has queued work.
    pub fn start_next(&mut self, now: u64) -> Option<u64> {
        if !self.is_available() {
            return None;
        }
        let mut request = self.queue.pop_front()?;
        request.start_time = now;
        self.total_waiting_time += now.saturating_sub(request.arrival_time);
        self.status = DeviceStatus::Busy;
        let id = request.request_id;
        log::debug!("device {}: servicing request {id} (pid {})", self.name, request.pid);
        self.current = Some(request);
        Some(id)
    }

    /// Ticks the in-flight request still needs, given the device speed.
    #[must_use]
    pub fn estimated_service_time(&self) -> Option<u64> {
        self.current.as_ref().map(|r| r.data_size.div_ceil(self.speed))
    }

    /// Finish the in-flight request and return it.
    pub fn complete_current(&mut self, now: u64) -> Option<IoRequest> {
        let mut request = self.current.take()?;
        request.completion_time = now;
        self.status = DeviceStatus::Idle;
        self.total_operations += 1;
        log::debug!(
            "device {}: request {} complete (service time {})",
            self.name,
            request.request_id,
            now.saturating_sub(request.start_time)
        );
        Some(request)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn device_type(&self) -> DeviceType {
        self.device_type
    }

    #[must_use]
    pub const fn status(&self) -> DeviceStatus {
        self.status
    }

    #[must_use]
    pub const fn speed(&self) -> u64 {
        self.speed
    }

    #[must_use]
    pub const fn current(&self) -> Option<&IoRequest> {
        self.current.as_ref()
    }

    #[must_use]
    pub const fn queue(&self) -> &VecDeque<IoRequest> {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut VecDeque<IoRequest> {
        &mut self.queue
    }

    /// Reporting snapshot.
    #[must_use]
    pub fn state(&self) -> DeviceState {
        DeviceState {
            name: self.name.clone(),
            device_type: self.device_type,
            status: self.status,
            queue_length: self.queue.len(),
            current_request: self.current.as_ref().map(|r| r.request_id),
            total_operations: self.total_operations,
            avg_waiting_time: if self.total_operations == 0 {
                0.0
            } else {
                self.total_waiting_time as f64 / self.total_operations as f64
            },
        }
    }
}

/// Externally visible device snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceState {
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub status: DeviceStatus,
    pub queue_length: usize,
    pub current_request: Option<u64>,
    pub total_operations: u64,
    pub avg_waiting_time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: u64, size: u64) -> IoRequest {
        IoRequest {
            request_id: id,
            pid: Pid::new(1),
            device: "disk0".into(),
            operation: IoOperation::Read,
            data_size: size,
            priority: 5,
            arrival_time: 0,
            start_time: 0,
            completion_time: 0,
        }
    }

    #[test]
    fn test_service_cycle_tracks_counters() {
        let mut device = Device::new("disk0", DeviceType::Disk, 50);
        device.enqueue(request(1, 100));

        assert_eq!(device.start_next(3), Some(1));
        assert_eq!(device.status(), DeviceStatus::Busy);
        assert_eq!(device.estimated_service_time(), Some(2));
        // Waiting time accumulated: started at 3, arrived at 0.
        assert!(device.start_next(3).is_none());

        let done = device.complete_current(5).unwrap();
        assert_eq!(done.completion_time, 5);
        assert!(device.is_available());
        assert_eq!(device.state().total_operations, 1);
        assert!((device.state().avg_waiting_time - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_operation_parsing_defaults_to_read() {
        assert_eq!(IoOperation::from_name("WRITE"), IoOperation::Write);
        assert_eq!(IoOperation::from_name("read"), IoOperation::Read);
        assert_eq!(IoOperation::from_name("scribble"), IoOperation::Read);
    }
}
