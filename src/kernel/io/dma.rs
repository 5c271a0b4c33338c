// src/kernel/io/dma.rs
//! DMA transfer tracking.
//!
//! One active transfer per device, advanced at a fixed rate each I/O
//! step. Transfers are bookkeeping only; no bytes move anywhere.

use std::collections::BTreeMap;

use serde::Serialize;

/// Units transferred per step.
pub const DMA_RATE: u64 = 1024;

/// An active DMA transfer.
#[derive(Debug, Clone, Serialize)]
pub struct DmaTransfer {
    pub id: u64,
    pub source: u64,
    pub dest: u64,
    pub size: u64,
    pub transferred: u64,
}

/// DMA controller: device name → active transfer.
#[derive(Debug, Default)]
pub struct DmaController {
    active: BTreeMap<String, DmaTransfer>,
    counter: u64,
}

impl DmaController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a transfer for `device`, replacing any active one.
    pub fn start_transfer(&mut self, device: &str, source: u64, dest: u64, size: u64) -> u64 {
        self.counter += 1;
        log::debug!("dma transfer {} started for {device} ({size} units)", self.counter);
        self.active.insert(
            device.to_string(),
            DmaTransfer {
                id: self.counter,
                source,
                dest,
                size,
                transferred: 0,
            },
        );
        self.counter
    }

    /// Advance every active transfer by `rate` units and remove the
    /// finished ones. Returns the device names that completed.
    pub fn advance(&mut self, rate: u64) -> Vec<String> {
        let mut completed = Vec::new();
        for (device, transfer) in &mut self.active {
            transfer.transferred += rate;
            if transfer.transferred >= transfer.size {
                log::debug!("dma transfer {} complete for {device}", transfer.id);
                completed.push(device.clone());
            }
        }
        for device in &completed {
            self.active.remove(device);
        }
        completed
    }

    #[must_use]
    pub fn active(&self) -> &BTreeMap<String, DmaTransfer> {
        &self.active
    }
}
