// src/kernel/sync/deadlock.rs
//! Deadlock detection over a wait-for graph.
//!
//! An edge `p -> q` exists when `p` requests a resource currently
//! allocated to `q`. Detection is depth-first with an explicit
//! recursion stack; a back edge into the stack marks every pid from
//! the re-entered node onward as a cycle participant.

use std::collections::{BTreeMap, BTreeSet};

use crate::kernel::core::Pid;

/// Resource allocation/request bookkeeping plus cycle detection.
#[derive(Debug, Default)]
pub struct DeadlockDetector {
    allocation: BTreeMap<Pid, BTreeSet<String>>,
    request: BTreeMap<Pid, BTreeSet<String>>,
}

impl DeadlockDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_allocation(&mut self, pid: Pid, resource: &str) {
        self.allocation.entry(pid).or_default().insert(resource.to_string());
    }

    pub fn add_request(&mut self, pid: Pid, resource: &str) {
        self.request.entry(pid).or_default().insert(resource.to_string());
    }

    pub fn remove_allocation(&mut self, pid: Pid, resource: &str) {
        if let Some(resources) = self.allocation.get_mut(&pid) {
            resources.remove(resource);
        }
    }

    pub fn remove_request(&mut self, pid: Pid, resource: &str) {
        if let Some(resources) = self.request.get_mut(&pid) {
            resources.remove(resource);
        }
    }

    /// Pids participating in at least one wait-for cycle, ascending.
    /// Empty when the graph is acyclic.
    #[must_use]
    pub fn detect(&self) -> Vec<Pid> {
        let graph = self.wait_for_graph();
        let mut visited = BTreeSet::new();
        let mut deadlocked = BTreeSet::new();

        for &start in graph.keys() {
            if !visited.contains(&start) {
                let mut stack = Vec::new();
                Self::dfs(start, &graph, &mut visited, &mut stack, &mut deadlocked);
            }
        }

        if !deadlocked.is_empty() {
            log::warn!("deadlock detected among pids {deadlocked:?}");
        }
        deadlocked.into_iter().collect()
    }

    /// Wait-for edges: `p -> q` iff some requested resource of `p` is
    /// held by `q != p`.
    #[must_use]
    pub fn wait_for_graph(&self) -> BTreeMap<Pid, BTreeSet<Pid>> {
        let mut graph: BTreeMap<Pid, BTreeSet<Pid>> = BTreeMap::new();
        for (&requester, resources) in &self.request {
            let edges = graph.entry(requester).or_default();
            for resource in resources {
                for (&holder, held) in &self.allocation {
                    if holder != requester && held.contains(resource) {
                        edges.insert(holder);
                    }
                }
            }
        }
        graph
    }

    fn dfs(
        node: Pid,
        graph: &BTreeMap<Pid, BTreeSet<Pid>>,
        visited: &mut BTreeSet<Pid>,
        stack: &mut Vec<Pid>,
        deadlocked: &mut BTreeSet<Pid>,
    ) {
        visited.insert(node);
        stack.push(node);

        for &next in graph.get(&node).into_iter().flatten() {
            if let Some(entry) = stack.iter().position(|&p| p == next) {
                deadlocked.extend(stack[entry..].iter().copied());
            } else if !visited.contains(&next) {
                Self::dfs(next, graph, visited, stack, deadlocked);
            }
        }

        stack.pop();
    }

    #[must_use]
    pub fn allocation(&self) -> &BTreeMap<Pid, BTreeSet<String>> {
        &self.allocation
    }

    #[must_use]
    pub fn request(&self) -> &BTreeMap<Pid, BTreeSet<String>> {
        &self.request
    }
}
