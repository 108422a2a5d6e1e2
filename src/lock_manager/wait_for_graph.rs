use std::collections::{BTreeSet, HashMap};

use crate::common::TxnId;

/// Edges point from a waiting transaction to the (granted, incompatible)
/// holders it is blocked on (§4.4.6). Rebuilt from scratch on every
/// cycle-detector sweep rather than maintained incrementally, since the
/// lock table already changes underneath it on every grant/wound/unlock.
pub(super) struct WaitForGraph {
    edges: HashMap<TxnId, BTreeSet<TxnId>>,
}

impl WaitForGraph {
    pub(super) fn new() -> Self {
        Self {
            edges: HashMap::new(),
        }
    }

    pub(super) fn add_edge(&mut self, waiter: TxnId, holder: TxnId) {
        self.edges.entry(waiter).or_default().insert(holder);
    }

    /// Depth-first search for a cycle, visiting neighbors in ascending
    /// txn_id order so that detection is deterministic across runs (§4.4.6).
    /// Returns the cycle's member ids if one exists.
    pub(super) fn find_cycle(&self) -> Option<Vec<TxnId>> {
        let mut nodes: Vec<TxnId> = self.edges.keys().copied().collect();
        nodes.sort_unstable();

        for &start in &nodes {
            let mut visited = BTreeSet::new();
            let mut path = Vec::new();
            if let Some(cycle) = self.dfs(start, &mut visited, &mut path) {
                return Some(cycle);
            }
        }
        None
    }

    fn dfs(
        &self,
        node: TxnId,
        visited: &mut BTreeSet<TxnId>,
        path: &mut Vec<TxnId>,
    ) -> Option<Vec<TxnId>> {
        if let Some(pos) = path.iter().position(|&n| n == node) {
            return Some(path[pos..].to_vec());
        }
        if visited.contains(&node) {
            return None;
        }
        visited.insert(node);
        path.push(node);

        if let Some(neighbors) = self.edges.get(&node) {
            for &next in neighbors {
                if let Some(cycle) = self.dfs(next, visited, path) {
                    return Some(cycle);
                }
            }
        }

        path.pop();
        None
    }
}
