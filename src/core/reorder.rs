//! Dynamic variable reordering: Rudell sifting and reordering to a
//! requested permutation, built on the adjacent-level swap.

use rand::seq::SliceRandom;

use crate::{
    core::{
        bdd_manager::BddManager,
        bdd_node::NodeID,
        error::{BddError, Result},
    },
    misc::hash_select::{HashMap, HashSet},
};

impl BddManager {
    /// Reduce the manager size by Rudell's sifting algorithm, or swap
    /// variables into the given `order`.
    ///
    /// Reordering invokes the garbage collector, so nodes that should
    /// remain must be referenced. Node ids are preserved; only node
    /// counts and levels change.
    pub fn reorder(&mut self, order: Option<&HashMap<String, usize>>) -> Result<()> {
        self.with_reorder_lock(|man| {
            let len_before = man.len();
            match order {
                None => man.apply_sifting()?,
                Some(order) => man.sort_to_order(order)?,
            }
            log::info!(
                "reordering changed manager size from {} to {} nodes",
                len_before,
                man.len()
            );
            Ok(())
        })
    }

    /// Make the variables of each pair adjacent, by shifting the upper
    /// one down. Used to prepare fused image computations.
    pub fn reorder_to_pairs(&mut self, pairs: &HashMap<String, String>) -> Result<()> {
        self.with_reorder_lock(|man| {
            man.collect_garbage(None);
            let mut levels = man.levels_index();
            let mut moves = 0;
            for (x, y) in pairs {
                let jx = man.level_of_var(x)?;
                let jy = man.level_of_var(y)?;
                if jx == jy {
                    return Err(BddError::BadArgument(format!(
                        "cannot pair variable {x:?} with itself"
                    )));
                }
                let k = jx.abs_diff(jy);
                if k == 1 {
                    continue;
                }
                let (jx, jy) = if jx > jy { (jy, jx) } else { (jx, jy) };
                man.shift(jx, jy - 1, &mut levels)?;
                moves += k;
            }
            log::info!("total shifts: {}", moves);
            Ok(())
        })
    }

    /// Reordering is exclusive: requesting one while a reorder is
    /// running is an error, never a recursion.
    fn with_reorder_lock<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.in_reorder {
            return Err(BddError::InUse(
                "a reorder is already in progress".to_string(),
            ));
        }
        self.in_reorder = true;
        let r = f(self);
        self.in_reorder = false;
        r
    }

    /// Sift every variable to its locally best level.
    fn apply_sifting(&mut self) -> Result<()> {
        self.collect_garbage(None);
        let n = self.len();
        if self.vars.len() < 2 {
            return Ok(());
        }
        let mut levels = self.levels_index();
        let mut names: Vec<String> = self.vars.keys().cloned().collect();
        // the visit order is heuristic; shuffling injects some randomness
        names.shuffle(&mut rand::thread_rng());
        for var in &names {
            let k = self.sift_var(var, &mut levels)?;
            log::info!("{} nodes for variable {:?} at level {}", self.len(), var, k);
        }
        debug_assert!(self.len() <= n);
        log::debug!("final variable order: {:?}", self.vars);
        Ok(())
    }

    /// Shift `var` to the closer end of the order, sweep it to the other
    /// end while recording the manager size at every position, then
    /// shift it back to the position of the minimum.
    fn sift_var(&mut self, var: &str, levels: &mut Vec<HashSet<NodeID>>) -> Result<usize> {
        let bottom = self.vars.len() - 1;
        let level = self.level_of_var(var)?;
        let (mut start, mut end) = (0, bottom);
        if 2 * level >= bottom {
            std::mem::swap(&mut start, &mut end);
        }
        self.shift(level, start, levels)?;
        let sizes = self.shift(start, end, levels)?;
        let (&best, &best_size) = sizes
            .iter()
            .min_by_key(|&(_, &size)| size)
            .expect("the sweep visits at least two levels");
        self.shift(end, best, levels)?;
        debug_assert_eq!(best_size, self.len());
        Ok(best)
    }

    /// Shift the variable at level `start` to level `end` by adjacent
    /// swaps. Returns the manager size seen at every visited level.
    pub(crate) fn shift(
        &mut self,
        start: usize,
        end: usize,
        levels: &mut Vec<HashSet<NodeID>>,
    ) -> Result<HashMap<usize, usize>> {
        let mut sizes: HashMap<usize, usize> = HashMap::default();
        if start == end {
            sizes.insert(start, self.len());
            return Ok(sizes);
        }
        let forward = start < end;
        let mut i = start;
        while i != end {
            let j = if forward { i + 1 } else { i - 1 };
            let (before, after) = self.swap_with_levels(i, j, levels)?;
            sizes.insert(i, before);
            sizes.insert(j, after);
            i = j;
        }
        Ok(sizes)
    }

    /// Swap variables until the given `order` is reached.
    fn sort_to_order(&mut self, order: &HashMap<String, usize>) -> Result<()> {
        let n = self.vars.len();
        if order.len() != n {
            return Err(BddError::BadArgument(format!(
                "the order lists {} variables, but {} are declared",
                order.len(),
                n
            )));
        }
        let mut seen = vec![false; n];
        for (var, &level) in order {
            self.level_of_var(var)?;
            if level >= n || seen[level] {
                return Err(BddError::BadArgument(format!(
                    "the requested order is not a bijection onto 0..{n}"
                )));
            }
            seen[level] = true;
        }
        self.collect_garbage(None);
        let mut levels = self.levels_index();
        let mut swaps = 0;
        for _ in 0..n {
            for i in 0..n - 1 {
                let x = self.var_at_level(i)?.to_string();
                let y = self.var_at_level(i + 1)?.to_string();
                if order[&x] > order[&y] {
                    self.swap_with_levels(i, i + 1, &mut levels)?;
                    swaps += 1;
                }
            }
        }
        log::info!("total swaps: {}", swaps);
        Ok(())
    }
}
