//! Swap of adjacent BDD levels.

use crate::{
    core::{
        bdd_manager::BddManager,
        bdd_node::{BddNode, Edge, NodeID},
        error::{BddError, Result},
    },
    misc::hash_select::HashSet,
};

impl BddManager {
    /// Permute the variables at the adjacent levels `x` and `y`.
    ///
    /// Swapping invokes the garbage collector, so nodes that should
    /// remain must be referenced. Node ids are preserved, so held edges
    /// stay valid; only node counts change. Returns the node counts
    /// before and after.
    pub fn swap(&mut self, x: usize, y: usize) -> Result<(usize, usize)> {
        self.collect_garbage(None);
        let mut levels = self.levels_index();
        self.swap_with_levels(x, y, &mut levels)
    }

    /// Swap the levels of the named variables (which must be adjacent).
    pub fn swap_vars(&mut self, a: &str, b: &str) -> Result<(usize, usize)> {
        let x = self.level_of_var(a)?;
        let y = self.level_of_var(b)?;
        self.swap(x, y)
    }

    /// The swap itself, sharing a level index with the caller so sifting
    /// does not rescan the node table for every move.
    pub(crate) fn swap_with_levels(
        &mut self,
        x: usize,
        y: usize,
        all_levels: &mut Vec<HashSet<NodeID>>,
    ) -> Result<(usize, usize)> {
        let n = self.vars.len();
        let (x, y) = if x > y { (y, x) } else { (x, y) };
        if y >= n {
            return Err(BddError::BadArgument(format!(
                "level {y} is not below the number of declared variables ({n})"
            )));
        }
        if y - x != 1 {
            return Err(BddError::BadArgument(format!(
                "levels {x} and {y} are not adjacent"
            )));
        }
        log::debug!(
            "swapping levels {} ({} nodes) and {} ({} nodes)",
            x,
            all_levels[x].len(),
            y,
            all_levels[y].len()
        );
        let oldsize = self.len();

        // detach both levels from the unique table
        let snap_x: Vec<(NodeID, BddNode)> = all_levels[x]
            .iter()
            .map(|&u| (u, self.nodes[&u]))
            .collect();
        let snap_y: Vec<(NodeID, BddNode)> = all_levels[y]
            .iter()
            .map(|&u| (u, self.nodes[&u]))
            .collect();
        for (_, node) in snap_x.iter().chain(snap_y.iter()) {
            debug_assert!(node.level == x || node.level == y);
            let popped = self.unique.remove(node);
            debug_assert!(popped.is_some());
        }

        // promote every y node to level x
        for &(u, node) in &snap_y {
            let moved = BddNode { level: x, ..node };
            self.nodes.insert(u, moved);
            debug_assert!(!self.unique.contains_key(&moved));
            self.unique.insert(moved, u);
        }

        // demote the x nodes that do not mention y; their triple changes
        // only in its level
        let mut done: HashSet<NodeID> = HashSet::default();
        for &(u, node) in &snap_x {
            if self.level(node.low) <= y || self.level(node.high) <= y {
                continue;
            }
            let moved = BddNode { level: y, ..node };
            self.nodes.insert(u, moved);
            debug_assert!(!self.unique.contains_key(&moved));
            self.unique.insert(moved, u);
            done.insert(u);
        }

        // expand the x nodes that depend on y
        let mut garbage: HashSet<NodeID> = HashSet::default();
        let mut fresh_lower: HashSet<NodeID> = HashSet::default();
        for &(u, node) in &snap_x {
            if done.contains(&u) {
                continue;
            }
            let (v, w) = (node.low, node.high);
            self.decref(v);
            self.decref(w);
            // possibly dead after the rewrite
            garbage.insert(v.node());
            garbage.insert(w.node());
            let (iv, v0, v1) = self.swap_cofactor(v, y);
            let (iw, w0, w1) = self.swap_cofactor(w, y);
            debug_assert!(y <= iv && y <= iw);
            debug_assert!(y == iv || y == iw);
            // complement on the split low edge
            let (v0, v1) = if v.is_complemented() && iv == y {
                (-v0, -v1)
            } else {
                (v0, v1)
            };
            let p = self.find_or_add(y, v0, w0)?;
            let q = self.find_or_add(y, v1, w1)?;
            debug_assert!(!q.is_complemented());
            debug_assert_ne!(p, q, "node depends on both swapped levels");
            if self.level(p) == y {
                fresh_lower.insert(p.node());
            }
            if self.level(q) == y {
                fresh_lower.insert(q.node());
            }
            let moved = BddNode {
                level: x,
                low: p,
                high: q,
            };
            self.nodes.insert(u, moved);
            debug_assert!(!self.unique.contains_key(&moved));
            self.unique.insert(moved, u);
            self.incref(p);
            self.incref(q);
        }

        // swap the two variables in the order bijection
        let var_x = self.level_to_var[&x].clone();
        let var_y = self.level_to_var[&y].clone();
        self.vars.insert(var_x.clone(), y);
        self.vars.insert(var_y.clone(), x);
        self.level_to_var.insert(y, var_x);
        self.level_to_var.insert(x, var_y);

        self.clear_ite_cache();
        self.collect_from(garbage, Some(all_levels));
        let newsize = self.len();

        // rebuild the level index for the two swapped levels
        let mut at_x: HashSet<NodeID> = HashSet::default();
        let mut at_y: HashSet<NodeID> = HashSet::default();
        for (u, _) in snap_x.iter().chain(snap_y.iter()) {
            if let Some(node) = self.nodes.get(u) {
                match node.level {
                    l if l == x => at_x.insert(*u),
                    l if l == y => at_y.insert(*u),
                    l => {
                        return Err(BddError::InvariantViolation(format!(
                            "node {} left the swapped levels (now at {})",
                            u.0, l
                        )))
                    }
                };
            }
        }
        for &u in &fresh_lower {
            if let Some(node) = self.nodes.get(&u) {
                debug_assert_eq!(node.level, y);
                at_y.insert(u);
            }
        }
        all_levels[x] = at_x;
        all_levels[y] = at_y;

        log::debug!("swap of levels {} and {}: {} -> {} nodes", x, y, oldsize, newsize);
        Ok((oldsize, newsize))
    }

    /// Cofactor of edge `u` with respect to level `y` during a swap.
    ///
    /// A node that reads as being above `y` was at level `y` when the
    /// swap started (it has already been promoted), so `y` is reported
    /// as its level.
    fn swap_cofactor(&self, u: Edge, y: usize) -> (usize, Edge, Edge) {
        let i = self.level(u);
        if y < i {
            (i, u, u)
        } else {
            let node = self.nodes[&u.node()];
            (y, node.low, node.high)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::{error::BddError, test::tests::TestCase};

    #[test]
    fn swap_is_an_involution_on_size() {
        let _ = env_logger::builder().is_test(true).try_init();
        let testcase = TestCase::test_trivial();
        let mut man = testcase.man.clone();
        let root = testcase.f;
        man.incref(root);

        let expected = man.sat_count(root, Some(testcase.nr_variables)).unwrap();
        let (before, _) = man.swap(0, 1).unwrap();
        assert_eq!(man.sat_count(root, Some(testcase.nr_variables)).unwrap(), expected);
        assert!(testcase.verify_against(&man, root));
        let (_, after) = man.swap(0, 1).unwrap();
        assert_eq!(before, after);
        assert_eq!(man.sat_count(root, Some(testcase.nr_variables)).unwrap(), expected);
        assert!(testcase.verify_against(&man, root));
        man.assert_consistent().unwrap();
    }

    #[test]
    fn swap_each_adjacent_pair_preserves_semantics() {
        let _ = env_logger::builder().is_test(true).try_init();
        let testcase = TestCase::random_1();
        for i in 0..testcase.nr_variables - 1 {
            let mut man = testcase.man.clone();
            man.incref(testcase.f);
            man.swap(i, i + 1).unwrap();
            assert!(testcase.verify_against(&man, testcase.f));
            man.assert_consistent().unwrap();
        }
    }

    #[test]
    fn swap_sequence_top_to_bottom() {
        let _ = env_logger::builder().is_test(true).try_init();
        let testcase = TestCase::random_1();
        let n = testcase.nr_variables;
        for v in 0..n - 1 {
            let mut man = testcase.man.clone();
            man.incref(testcase.f);
            for i in v..n - 1 {
                man.swap(i, i + 1).unwrap();
            }
            assert!(testcase.verify_against(&man, testcase.f));
            man.assert_consistent().unwrap();
        }
    }

    #[test]
    fn swap_updates_the_variable_order() {
        let testcase = TestCase::test_trivial();
        let mut man = testcase.man.clone();
        man.incref(testcase.f);
        let before_0 = man.var_at_level(0).unwrap().to_string();
        let before_1 = man.var_at_level(1).unwrap().to_string();
        man.swap(0, 1).unwrap();
        assert_eq!(man.var_at_level(0).unwrap(), before_1);
        assert_eq!(man.var_at_level(1).unwrap(), before_0);
        assert_eq!(man.level_of_var(&before_0).unwrap(), 1);
    }

    #[test]
    fn non_adjacent_swap_is_rejected() {
        let testcase = TestCase::test_trivial();
        let mut man = testcase.man.clone();
        man.incref(testcase.f);
        assert!(matches!(man.swap(0, 2), Err(BddError::BadArgument(_))));
        assert!(matches!(man.swap(1, 1), Err(BddError::BadArgument(_))));
        assert!(matches!(man.swap(2, 9), Err(BddError::BadArgument(_))));
    }

    #[test]
    fn swap_preserves_node_ids_of_held_edges() {
        let testcase = TestCase::test_trivial();
        let mut man = testcase.man.clone();
        let root = testcase.f;
        man.incref(root);
        man.swap(1, 2).unwrap();
        assert!(man.contains(root));
        assert!(testcase.verify_against(&man, root));
    }
}
