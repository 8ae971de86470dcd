//! Model counting, model enumeration, and evaluation.

use num_bigint::BigUint;

use crate::{
    core::{
        bdd_manager::BddManager,
        bdd_node::{Edge, NodeID, FALSE, TRUE},
        error::{BddError, Result},
    },
    misc::hash_select::HashMap,
};

/// A (possibly partial) assignment of variables to Boolean values.
pub type Assignment = HashMap<String, bool>;

fn pow2(exp: usize) -> BigUint {
    BigUint::from(1u32) << exp
}

impl BddManager {
    pub fn is_sat(&self, u: Edge) -> bool {
        u != FALSE
    }

    /// Exact number of assignments over `nvars` variables satisfying the
    /// function referenced by `u`.
    ///
    /// With `nvars` absent, the universe is the support of `u`. `nvars`
    /// must cover the support. Support levels are ranked contiguously so
    /// the result does not depend on where the support sits in the
    /// global order.
    pub fn sat_count(&self, u: Edge, nvars: Option<usize>) -> Result<BigUint> {
        if !self.contains(u) {
            return Err(BddError::BadArgument(format!(
                "edge {u} does not reference an existing node"
            )));
        }
        let support = self.support_levels(u)?;
        let k = support.len();
        let n = nvars.unwrap_or(k);
        if n < k {
            return Err(BddError::BadArgument(format!(
                "the universe of {n} variables does not cover the support ({k} variables)"
            )));
        }
        let slack = n - k;
        // rank the support contiguously from the top
        let mut rank: HashMap<usize, usize> = support
            .iter()
            .enumerate()
            .map(|(new, &old)| (old, new + slack))
            .collect();
        rank.insert(self.terminal_level(), n);
        let mut cache: HashMap<NodeID, BigUint> = HashMap::default();
        let r = self.sat_count_rec(u, &rank, n, &mut cache);
        let top = rank[&self.level(u)];
        Ok(r * pow2(top))
    }

    fn sat_count_rec(
        &self,
        u: Edge,
        rank: &HashMap<usize, usize>,
        n: usize,
        cache: &mut HashMap<NodeID, BigUint>,
    ) -> BigUint {
        if u == TRUE {
            return BigUint::from(1u32);
        }
        if u == FALSE {
            return BigUint::from(0u32);
        }
        let node = self.nodes[&u.node()];
        let i = rank[&node.level];
        let local = match cache.get(&u.node()) {
            Some(count) => count.clone(),
            None => {
                let low_count = self.sat_count_rec(node.low, rank, n, cache);
                let high_count = self.sat_count_rec(node.high, rank, n, cache);
                // gaps account for variables skipped between the levels
                let low_gap = rank[&self.level(node.low)] - i - 1;
                let high_gap = rank[&self.level(node.high)] - i - 1;
                let count = low_count * pow2(low_gap) + high_count * pow2(high_gap);
                cache.insert(u.node(), count.clone());
                count
            }
        };
        if u.is_complemented() {
            // the complement counts the other assignments of the subtree
            pow2(n - i) - local
        } else {
            local
        }
    }

    /// Follow one path down, reading `assignment`; every support
    /// variable must be assigned.
    pub fn evaluate(&self, u: Edge, assignment: &Assignment) -> Result<bool> {
        if !self.contains(u) {
            return Err(BddError::BadArgument(format!(
                "edge {u} does not reference an existing node"
            )));
        }
        let mut e = u;
        let mut negate = false;
        loop {
            negate ^= e.is_complemented();
            if e.is_terminal() {
                return Ok(!negate);
            }
            let node = self.nodes[&e.node()];
            let var = self.var_at_level(node.level)?;
            let value = assignment.get(var).copied().ok_or_else(|| {
                BddError::BadArgument(format!("assignment is missing variable {var:?}"))
            })?;
            e = if value { node.high } else { node.low };
        }
    }

    /// Enumerate the satisfying assignments of `u` over `care_vars`.
    ///
    /// The cubes of `u` are collected by a depth-first walk, then each
    /// cube is expanded over the care variables missing from it. If
    /// `care_vars` misses part of the support, a warning is logged and
    /// partial assignments are yielded.
    pub fn pick_iter(&self, u: Edge, care_vars: Option<&[&str]>) -> Result<PickIter> {
        if !self.contains(u) {
            return Err(BddError::BadArgument(format!(
                "edge {u} does not reference an existing node"
            )));
        }
        let support = self.support(u)?;
        let care: Vec<String> = match care_vars {
            Some(names) => {
                for name in names {
                    self.level_of_var(name)?;
                }
                let missing: Vec<&String> = support
                    .iter()
                    .filter(|var| !names.contains(&var.as_str()))
                    .collect();
                if !missing.is_empty() {
                    log::warn!("care_vars misses support variables: {missing:?}");
                }
                names.iter().map(|s| s.to_string()).collect()
            }
            None => support.iter().cloned().collect(),
        };
        let mut cubes = Vec::new();
        let mut cube = HashMap::default();
        self.sat_cubes(u, &mut cube, true, &mut cubes);
        Ok(PickIter::new(cubes, care))
    }

    /// Depth-first cube enumeration; the complement bits along the path
    /// flip the terminal's value.
    fn sat_cubes(
        &self,
        u: Edge,
        cube: &mut HashMap<usize, bool>,
        mut value: bool,
        out: &mut Vec<Assignment>,
    ) {
        if u.is_complemented() {
            value = !value;
        }
        if u.is_terminal() {
            if value {
                out.push(
                    cube.iter()
                        .map(|(&level, &val)| (self.level_to_var[&level].clone(), val))
                        .collect(),
                );
            }
            return;
        }
        let node = self.nodes[&u.node()];
        cube.insert(node.level, false);
        self.sat_cubes(node.low, cube, value, out);
        cube.insert(node.level, true);
        self.sat_cubes(node.high, cube, value, out);
        cube.remove(&node.level);
    }
}

/// Iterator over satisfying assignments: each cube is expanded over the
/// care variables absent from it by binary counting.
pub struct PickIter {
    cubes: std::vec::IntoIter<Assignment>,
    care: Vec<String>,
    current: Option<CubeExpansion>,
}

struct CubeExpansion {
    cube: Assignment,
    missing: Vec<String>,
    next: u64,
    total: u64,
}

impl PickIter {
    fn new(cubes: Vec<Assignment>, care: Vec<String>) -> Self {
        PickIter {
            cubes: cubes.into_iter(),
            care,
            current: None,
        }
    }
}

impl Iterator for PickIter {
    type Item = Assignment;

    fn next(&mut self) -> Option<Assignment> {
        loop {
            if self.current.is_none() {
                let cube = self.cubes.next()?;
                let mut missing: Vec<String> = self
                    .care
                    .iter()
                    .filter(|var| !cube.contains_key(*var))
                    .cloned()
                    .collect();
                missing.sort();
                let total = 1u64 << missing.len();
                self.current = Some(CubeExpansion {
                    cube,
                    missing,
                    next: 0,
                    total,
                });
            }
            let expansion = self.current.as_mut().unwrap();
            if expansion.next == expansion.total {
                self.current = None;
                continue;
            }
            let bits = expansion.next;
            expansion.next += 1;
            let mut model = expansion.cube.clone();
            for (i, var) in expansion.missing.iter().enumerate() {
                model.insert(var.clone(), bits >> i & 1 == 1);
            }
            return Some(model);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    fn assignment(pairs: &[(&str, bool)]) -> Assignment {
        pairs.iter().map(|&(k, v)| (k.to_string(), v)).collect()
    }

    fn setup() -> (BddManager, Edge, Edge) {
        let mut man = BddManager::default();
        man.declare(&["x", "y"]).unwrap();
        let x = man.var("x").unwrap();
        let y = man.var("y").unwrap();
        (man, x, y)
    }

    #[test]
    fn count_of_constants() {
        let (man, _, _) = setup();
        assert_eq!(man.sat_count(TRUE, Some(2)).unwrap(), BigUint::from(4u32));
        assert_eq!(man.sat_count(FALSE, Some(2)).unwrap(), BigUint::from(0u32));
        assert_eq!(man.sat_count(TRUE, None).unwrap(), BigUint::from(1u32));
    }

    #[test]
    fn count_single_cube() {
        let (mut man, x, y) = setup();
        let u = man.and(x, -y).unwrap();
        assert_eq!(man.sat_count(u, Some(2)).unwrap(), BigUint::from(1u32));
        // universe smaller than the support is rejected
        assert!(man.sat_count(u, Some(1)).is_err());
        // a larger universe scales by the slack
        assert_eq!(man.sat_count(u, Some(5)).unwrap(), BigUint::from(8u32));
    }

    #[test]
    fn count_complement_law() {
        let (mut man, x, y) = setup();
        let candidates = {
            let a = man.and(x, -y).unwrap();
            let b = man.or(x, y).unwrap();
            let c = man.xor(x, y).unwrap();
            [a, b, c, x, TRUE]
        };
        for u in candidates {
            for n in [2usize, 3, 6] {
                let yes = man.sat_count(u, Some(n)).unwrap();
                let no = man.sat_count(-u, Some(n)).unwrap();
                assert_eq!(yes + no, pow2(n));
            }
        }
    }

    #[test]
    fn count_ignores_the_position_of_the_support() {
        // the count must not depend on where the support sits in the
        // global order
        let mut man = BddManager::default();
        man.declare(&["a", "b", "c", "d"]).unwrap();
        let b = man.var("b").unwrap();
        let d = man.var("d").unwrap();
        let u = man.or(b, d).unwrap();
        assert_eq!(man.sat_count(u, Some(2)).unwrap(), BigUint::from(3u32));
        assert_eq!(man.sat_count(u, Some(4)).unwrap(), BigUint::from(12u32));
    }

    #[test]
    fn evaluate_follows_paths() {
        let (mut man, x, y) = setup();
        let u = man.xor(x, y).unwrap();
        assert!(man.evaluate(u, &assignment(&[("x", true), ("y", false)])).unwrap());
        assert!(!man.evaluate(u, &assignment(&[("x", true), ("y", true)])).unwrap());
        assert!(man
            .evaluate(u, &assignment(&[("x", true)]))
            .is_err());
    }

    #[test]
    fn pick_iter_enumerates_the_single_model() {
        let (mut man, x, y) = setup();
        let u = man.and(x, -y).unwrap();
        let models: Vec<Assignment> = man.pick_iter(u, None).unwrap().collect();
        assert_eq!(models, vec![assignment(&[("x", true), ("y", false)])]);
    }

    #[test]
    fn pick_iter_expands_care_variables() {
        let (mut man, x, y) = setup();
        let u = man.equiv(x, y).unwrap();
        let mut models: Vec<Assignment> = man.pick_iter(u, Some(&["x", "y"])).unwrap().collect();
        models.sort_by_key(|m| (m["x"], m["y"]));
        assert_eq!(
            models,
            vec![
                assignment(&[("x", false), ("y", false)]),
                assignment(&[("x", true), ("y", true)]),
            ]
        );
        // a variable outside the support doubles the models
        let models: Vec<Assignment> = {
            let mut man = man.clone();
            man.declare(&["z"]).unwrap();
            man.pick_iter(u, Some(&["x", "y", "z"])).unwrap().collect()
        };
        assert_eq!(models.len(), 4);
        assert!(models.iter().all(|m| m.contains_key("z")));
    }

    #[test]
    fn pick_iter_with_partial_care_warns_and_yields_partial_models() {
        let (mut man, x, y) = setup();
        let u = man.and(x, y).unwrap();
        let models: Vec<Assignment> = man.pick_iter(u, Some(&["x"])).unwrap().collect();
        assert_eq!(models, vec![assignment(&[("x", true), ("y", true)])]);
    }

    #[test]
    fn pick_iter_of_false_is_empty() {
        let (man, _, _) = setup();
        let models: Vec<Assignment> = man.pick_iter(FALSE, None).unwrap().collect();
        assert!(models.is_empty());
    }

    #[test]
    fn count_matches_enumeration() {
        let mut man = BddManager::default();
        man.declare(&["a", "b", "c"]).unwrap();
        let a = man.var("a").unwrap();
        let b = man.var("b").unwrap();
        let c = man.var("c").unwrap();
        let ab = man.and(a, b).unwrap();
        let u = man.or(ab, c).unwrap();
        let count = man.sat_count(u, Some(3)).unwrap();
        let models: Vec<Assignment> =
            man.pick_iter(u, Some(&["a", "b", "c"])).unwrap().collect();
        assert_eq!(count, BigUint::from(models.len()));
        for model in &models {
            assert!(man.evaluate(u, model).unwrap());
        }
    }

    #[test]
    fn let_with_compose_then_count() {
        // ((x /\ y) \/ z) with x := ~z equals y \/ z, which has 6 models
        // over three variables
        let mut man = BddManager::default();
        man.declare(&["x", "y", "z"]).unwrap();
        let x = man.var("x").unwrap();
        let y = man.var("y").unwrap();
        let z = man.var("z").unwrap();
        let xy = man.and(x, y).unwrap();
        let u = man.or(xy, z).unwrap();
        let mut sub = HashMap::default();
        sub.insert("x".to_string(), -z);
        let r = man.compose(u, &sub).unwrap();
        let expected = man.or(y, z).unwrap();
        assert_eq!(r, expected);
        assert_eq!(man.sat_count(r, Some(3)).unwrap(), BigUint::from(6u32));
    }
}
