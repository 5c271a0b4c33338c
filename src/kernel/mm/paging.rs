// src/kernel/mm/paging.rs
//! Demand paging with page replacement.
//!
//! A fixed array of frames backs per-process page tables. Accessing an
//! invalid page counts a fault; loading a page into a full frame table
//! evicts a victim chosen by the active replacement policy. Event
//! ordering for FIFO/LRU uses an internal monotonic counter rather
//! than the engine clock, so several page operations within one tick
//! still have a total order.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::kernel::core::{Pid, ReplacementPolicy};

/// Default page size in bytes.
pub const DEFAULT_PAGE_SIZE: u64 = 4096;

/// Pages loaded eagerly when a process is allocated.
const PRELOAD_PAGES: usize = 3;

/// A physical frame slot.
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    pub frame_no: usize,
    pub occupied: bool,
    pub owner: Option<Pid>,
    pub page_no: Option<usize>,
}

/// A page-table entry.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub frame_no: Option<usize>,
    pub valid: bool,
    pub referenced: bool,
    pub modified: bool,
    pub load_time: u64,
    pub last_access: u64,
    pub ref_count: u64,
}

impl Page {
    const fn empty() -> Self {
        Self {
            frame_no: None,
            valid: false,
            referenced: false,
            modified: false,
            load_time: 0,
            last_access: 0,
            ref_count: 0,
        }
    }
}

/// Paging memory manager.
#[derive(Debug)]
pub struct PagingManager {
    page_size: u64,
    frames: Vec<Frame>,
    tables: BTreeMap<Pid, Vec<Page>>,
    page_faults: u64,
    page_accesses: u64,
    /// Monotonic event counter stamping loads and accesses.
    events: u64,
}

impl PagingManager {
    #[must_use]
    pub fn new(page_size: u64, num_frames: usize) -> Self {
        let frames = (0..num_frames)
            .map(|frame_no| Frame {
                frame_no,
                occupied: false,
                owner: None,
                page_no: None,
            })
            .collect();
        Self {
            page_size: page_size.max(1),
            frames,
            tables: BTreeMap::new(),
            page_faults: 0,
            page_accesses: 0,
            events: 0,
        }
    }

    /// Build a page table for `pid` covering `size` bytes, without
    /// loading anything. Returns the number of pages.
    pub fn register(&mut self, pid: Pid, size: u64) -> usize {
        let num_pages = size.div_ceil(self.page_size) as usize;
        self.release_frames(pid);
        self.tables.insert(pid, (0..num_pages).map(|_| Page::empty()).collect());
        log::debug!("pid {pid}: page table with {num_pages} pages");
        num_pages
    }

    /// Register `pid` and eagerly load its first pages FIFO-style.
    pub fn allocate(&mut self, pid: Pid, size: u64) -> usize {
        let num_pages = self.register(pid, size);
        for page_no in 0..num_pages.min(PRELOAD_PAGES) {
            self.load_page(pid, page_no, ReplacementPolicy::Fifo);
        }
        num_pages
    }

    /// Touch a page: bump the access counters and reference bits.
    /// Returns `true` when the access faulted (page not resident); the
    /// caller is expected to follow up with [`Self::load_page`].
    pub fn access_page(&mut self, pid: Pid, page_no: usize) -> bool {
        if self.tables.get(&pid).is_none_or(|t| page_no >= t.len()) {
            return false;
        }

        self.events += 1;
        self.page_accesses += 1;
        let events = self.events;

        let mut faulted = false;
        if let Some(page) = self.tables.get_mut(&pid).and_then(|t| t.get_mut(page_no)) {
            page.referenced = true;
            page.last_access = events;
            page.ref_count += 1;
            faulted = !page.valid;
        }

        if faulted {
            self.page_faults += 1;
            log::debug!("pid {pid}: page fault on page {page_no}");
        }
        faulted
    }

    /// Access a page and service the fault in one call. Returns whether
    /// a fault occurred.
    pub fn access(&mut self, pid: Pid, page_no: usize, policy: ReplacementPolicy) -> bool {
        let faulted = self.access_page(pid, page_no);
        if faulted {
            self.load_page(pid, page_no, policy);
        }
        faulted
    }

    /// Load a page into a free frame, or evict a victim chosen by
    /// `policy`. Returns `false` for unknown pid/page or when there are
    /// no frames at all.
    pub fn load_page(&mut self, pid: Pid, page_no: usize, policy: ReplacementPolicy) -> bool {
        if self.tables.get(&pid).is_none_or(|t| page_no >= t.len()) {
            return false;
        }

        let frame_no = match self.frames.iter().position(|f| !f.occupied) {
            Some(free) => free,
            None => match self.select_victim(policy) {
                Some(victim) => {
                    self.evict(victim);
                    victim
                }
                None => return false,
            },
        };

        self.events += 1;
        let events = self.events;

        let frame = &mut self.frames[frame_no];
        frame.occupied = true;
        frame.owner = Some(pid);
        frame.page_no = Some(page_no);

        // existence checked on entry
        if let Some(page) = self.tables.get_mut(&pid).and_then(|t| t.get_mut(page_no)) {
            page.frame_no = Some(frame_no);
            page.valid = true;
            page.load_time = events;
            page.last_access = events;
        }
        log::debug!("pid {pid}: page {page_no} -> frame {frame_no} ({policy:?})");
        true
    }

    /// Pick the frame to evict. All frames are occupied when this runs.
    fn select_victim(&mut self, policy: ReplacementPolicy) -> Option<usize> {
        match policy {
            ReplacementPolicy::Fifo => self.victim_by_min(|page| page.load_time),
            ReplacementPolicy::Lru => self.victim_by_min(|page| page.last_access),
            ReplacementPolicy::Clock => self.victim_by_clock(),
        }
    }

    fn victim_by_min(&self, key: impl Fn(&Page) -> u64) -> Option<usize> {
        let mut best: Option<(usize, u64)> = None;
        for frame in self.frames.iter().filter(|f| f.occupied) {
            let Some(page) = self.resident_page(frame) else { continue };
            let k = key(page);
            if best.is_none_or(|(_, bk)| k < bk) {
                best = Some((frame.frame_no, k));
            }
        }
        best.map(|(frame_no, _)| frame_no)
    }

    /// Second-chance scan: the first unreferenced occupied frame is the
    /// victim; referenced frames lose their bit as the scan passes. If
    /// every frame is referenced, fall back to the first occupied one.
    fn victim_by_clock(&mut self) -> Option<usize> {
        let mut victim = None;
        for i in 0..self.frames.len() {
            if !self.frames[i].occupied {
                continue;
            }
            let referenced = self
                .resident_page(&self.frames[i])
                .is_some_and(|page| page.referenced);
            if referenced {
                self.clear_referenced(i);
            } else {
                victim = Some(i);
                break;
            }
        }
        victim.or_else(|| self.frames.iter().position(|f| f.occupied))
    }

    fn resident_page(&self, frame: &Frame) -> Option<&Page> {
        let owner = frame.owner?;
        let page_no = frame.page_no?;
        self.tables.get(&owner)?.get(page_no)
    }

    fn clear_referenced(&mut self, frame_no: usize) {
        let (Some(owner), Some(page_no)) = (self.frames[frame_no].owner, self.frames[frame_no].page_no)
        else {
            return;
        };
        if let Some(page) = self.tables.get_mut(&owner).and_then(|t| t.get_mut(page_no)) {
            page.referenced = false;
        }
    }

    /// Invalidate the page resident in `frame_no` and free the frame.
    fn evict(&mut self, frame_no: usize) {
        let (owner, page_no) = {
            let frame = &mut self.frames[frame_no];
            let pair = (frame.owner, frame.page_no);
            frame.occupied = false;
            frame.owner = None;
            frame.page_no = None;
            pair
        };
        if let (Some(owner), Some(page_no)) = (owner, page_no)
            && let Some(page) = self.tables.get_mut(&owner).and_then(|t| t.get_mut(page_no))
        {
            page.valid = false;
            page.frame_no = None;
        }
    }

    fn release_frames(&mut self, pid: Pid) {
        for frame in &mut self.frames {
            if frame.owner == Some(pid) {
                frame.occupied = false;
                frame.owner = None;
                frame.page_no = None;
            }
        }
    }

    /// Drop the pid's page table and free its frames. Returns `true`
    /// when the pid had a table.
    pub fn deallocate(&mut self, pid: Pid) -> bool {
        self.release_frames(pid);
        self.tables.remove(&pid).is_some()
    }

    #[must_use]
    pub fn has_allocation(&self, pid: Pid) -> bool {
        self.tables.contains_key(&pid)
    }

    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    #[must_use]
    pub fn page_table(&self, pid: Pid) -> Option<&[Page]> {
        self.tables.get(&pid).map(Vec::as_slice)
    }

    #[must_use]
    pub const fn page_faults(&self) -> u64 {
        self.page_faults
    }

    #[must_use]
    pub const fn page_accesses(&self) -> u64 {
        self.page_accesses
    }

    #[must_use]
    pub fn occupied_frames(&self) -> usize {
        self.frames.iter().filter(|f| f.occupied).count()
    }
}
