// src/kernel/io/queue.rs
//! Device-queue ordering policies.
//!
//! Disk positions are modeled, not tracked: a request's position is
//! `request_id % 1000` and the head rests at [`HEAD_POSITION`]. Only
//! the ordering matters: reordering never mutates the requests
//! themselves, only their sequence in the queue.

use std::collections::VecDeque;

use crate::kernel::core::IoSchedulingPolicy;

use super::device::IoRequest;

/// Modeled disk-head position.
pub const HEAD_POSITION: u64 = 0;

/// Elevator direction for SCAN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    Up,
    Down,
}

/// Modeled on-disk position of a request.
#[must_use]
pub const fn position(request_id: u64) -> u64 {
    request_id % 1000
}

/// Reorder `queue` in place according to `policy`. Sorts are stable,
/// so FCFS order is the tie-breaker everywhere.
pub fn order_queue(queue: &mut VecDeque<IoRequest>, policy: IoSchedulingPolicy, direction: ScanDirection) {
    match policy {
        IoSchedulingPolicy::Fcfs => {}
        IoSchedulingPolicy::Sstf => {
            queue
                .make_contiguous()
                .sort_by_key(|r| position(r.request_id).abs_diff(HEAD_POSITION));
        }
        IoSchedulingPolicy::Scan => match direction {
            ScanDirection::Up => {
                queue.make_contiguous().sort_by_key(|r| position(r.request_id));
            }
            ScanDirection::Down => {
                queue
                    .make_contiguous()
                    .sort_by_key(|r| u64::MAX - position(r.request_id));
            }
        },
        IoSchedulingPolicy::Priority => {
            queue.make_contiguous().sort_by_key(|r| r.priority);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::core::Pid;
    use crate::kernel::io::device::IoOperation;

    fn queue_of(specs: &[(u64, u32)]) -> VecDeque<IoRequest> {
        specs
            .iter()
            .map(|&(request_id, priority)| IoRequest {
                request_id,
                pid: Pid::new(1),
                device: "disk0".into(),
                operation: IoOperation::Read,
                data_size: 100,
                priority,
                arrival_time: 0,
                start_time: 0,
                completion_time: 0,
            })
            .collect()
    }

    fn ids(queue: &VecDeque<IoRequest>) -> Vec<u64> {
        queue.iter().map(|r| r.request_id).collect()
    }

    #[test]
    fn test_fcfs_keeps_arrival_order() {
        let mut queue = queue_of(&[(3, 5), (1, 5), (2, 5)]);
        order_queue(&mut queue, IoSchedulingPolicy::Fcfs, ScanDirection::Up);
        assert_eq!(ids(&queue), vec![3, 1, 2]);
    }

    #[test]
    fn test_sstf_sorts_by_distance_from_head() {
        let mut queue = queue_of(&[(900, 5), (10, 5), (500, 5)]);
        order_queue(&mut queue, IoSchedulingPolicy::Sstf, ScanDirection::Up);
        assert_eq!(ids(&queue), vec![10, 500, 900]);
    }

    #[test]
    fn test_scan_sweeps_up_and_down() {
        let mut queue = queue_of(&[(500, 5), (10, 5), (900, 5)]);
        order_queue(&mut queue, IoSchedulingPolicy::Scan, ScanDirection::Up);
        assert_eq!(ids(&queue), vec![10, 500, 900]);

        order_queue(&mut queue, IoSchedulingPolicy::Scan, ScanDirection::Down);
        assert_eq!(ids(&queue), vec![900, 500, 10]);
    }

    #[test]
    fn test_priority_sort_is_stable() {
        let mut queue = queue_of(&[(1, 5), (2, 1), (3, 5), (4, 1)]);
        order_queue(&mut queue, IoSchedulingPolicy::Priority, ScanDirection::Up);
        assert_eq!(ids(&queue), vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_position_wraps_at_one_thousand() {
        assert_eq!(position(1234), 234);
        assert_eq!(position(42), 42);
    }
}
