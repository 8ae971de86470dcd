//! Garbage collection of nodes with zero reference count.

use crate::{
    core::{
        bdd_manager::BddManager,
        bdd_node::{Edge, NodeID, TERMINAL},
    },
    misc::hash_select::HashSet,
};

impl BddManager {
    /// Recursively remove nodes with zero reference count.
    ///
    /// Removal starts from the nodes in `roots`; with `None`, all nodes
    /// are scanned. The terminal is never collected. The computed table
    /// is dropped afterwards, since its entries hold no references.
    /// Returns the number of removed nodes.
    pub fn collect_garbage(&mut self, roots: Option<&[Edge]>) -> usize {
        let seed: Vec<NodeID> = match roots {
            Some(edges) => edges.iter().map(|e| e.node()).collect(),
            None => self.nodes.keys().copied().collect(),
        };
        self.collect_from(seed, None)
    }

    /// Worklist collection. When a level index is handed in (during
    /// reordering), removed ids are pruned from it so that a cascade
    /// below the swapped pair cannot leave stale entries behind.
    pub(crate) fn collect_from(
        &mut self,
        seed: impl IntoIterator<Item = NodeID>,
        mut levels: Option<&mut Vec<HashSet<NodeID>>>,
    ) -> usize {
        if !self.garbage_collection {
            return 0;
        }
        let before = self.len();
        let mut dead: Vec<NodeID> = seed
            .into_iter()
            .filter(|&id| id != TERMINAL && self.ref_count.get(&id) == Some(&0))
            .collect();
        while let Some(id) = dead.pop() {
            // may have been queued more than once
            let Some(node) = self.nodes.remove(&id) else {
                continue;
            };
            self.unique.remove(&node);
            let count = self.ref_count.remove(&id);
            debug_assert_eq!(count, Some(0));
            if id.0 < self.min_free {
                self.min_free = id.0;
            }
            if let Some(levels) = levels.as_deref_mut() {
                levels[node.level].remove(&id);
            }
            for child in [node.low, node.high] {
                self.decref(child);
                let child = child.node();
                if child != TERMINAL && self.ref_count.get(&child) == Some(&0) {
                    dead.push(child);
                }
            }
        }
        self.clear_ite_cache();
        let collected = before - self.len();
        if collected > 0 {
            log::debug!("collected {} garbage nodes", collected);
        }
        collected
    }
}
