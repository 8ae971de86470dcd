//! Substitution: composition with functions, variable renaming, and
//! restriction to constants.

use crate::{
    core::{
        bdd_manager::BddManager,
        bdd_node::{Edge, NodeID, FALSE, TRUE},
        error::{BddError, Result},
    },
    misc::hash_select::HashMap,
};

impl BddManager {
    /// Substitute BDDs for variables in `f`.
    ///
    /// A single-entry substitution descends with a memo per `(node, g)`
    /// pair; the simultaneous form memoizes per node, since the
    /// substitution map is fixed for the whole call.
    pub fn compose(&mut self, f: Edge, var_sub: &HashMap<String, Edge>) -> Result<Edge> {
        self.wrapped(|man| {
            if !man.contains(f) {
                return Err(BddError::BadArgument(format!(
                    "edge {f} does not reference an existing node"
                )));
            }
            for (var, &g) in var_sub {
                man.level_of_var(var)?;
                if !man.contains(g) {
                    return Err(BddError::BadArgument(format!(
                        "substitute {g} for {var:?} does not reference an existing node"
                    )));
                }
            }
            match var_sub.len() {
                0 => {
                    log::warn!("compose with an empty substitution has no effect");
                    Ok(f)
                }
                1 => {
                    let (var, &g) = var_sub.iter().next().unwrap();
                    let j = man.level_of_var(var)?;
                    let mut cache = HashMap::default();
                    man.compose_rec(f, j, g, &mut cache)
                }
                _ => {
                    let level_sub: HashMap<usize, Edge> = var_sub
                        .iter()
                        .map(|(var, &g)| Ok((man.level_of_var(var)?, g)))
                        .collect::<Result<_>>()?;
                    let mut cache = HashMap::default();
                    man.vector_compose_rec(f, &level_sub, &mut cache)
                }
            }
        })
    }

    fn compose_rec(
        &mut self,
        f: Edge,
        j: usize,
        g: Edge,
        cache: &mut HashMap<(Edge, Edge), Edge>,
    ) -> Result<Edge> {
        if f.is_terminal() {
            return Ok(f);
        }
        if let Some(&r) = cache.get(&(f, g)) {
            return Ok(r);
        }
        let node = self.nodes[&f.node()];
        let r = if j < node.level {
            // f is independent of the substituted variable
            f
        } else if j == node.level {
            let r = self.ite_rec(g, node.high, node.low)?;
            f.transfer_sign(r)
        } else {
            let z = node.level.min(self.level(g));
            let (f0, f1) = self.top_cofactor(f, z);
            let (g0, g1) = self.top_cofactor(g, z);
            let p = self.compose_rec(f0, j, g0, cache)?;
            let q = self.compose_rec(f1, j, g1, cache)?;
            self.find_or_add(z, p, q)?
        };
        cache.insert((f, g), r);
        Ok(r)
    }

    fn vector_compose_rec(
        &mut self,
        f: Edge,
        level_sub: &HashMap<usize, Edge>,
        cache: &mut HashMap<NodeID, Edge>,
    ) -> Result<Edge> {
        if f.is_terminal() {
            return Ok(f);
        }
        if let Some(&r) = cache.get(&f.node()) {
            return Ok(f.transfer_sign(r));
        }
        let node = self.nodes[&f.node()];
        let p = self.vector_compose_rec(node.low, level_sub, cache)?;
        let q = self.vector_compose_rec(node.high, level_sub, cache)?;
        let g = match level_sub.get(&node.level) {
            Some(&g) => g,
            None => self.find_or_add(node.level, FALSE, TRUE)?,
        };
        let r = self.ite_rec(g, q, p)?;
        cache.insert(f.node(), r);
        Ok(f.transfer_sign(r))
    }

    /// Rename variables in `u`, simultaneously.
    ///
    /// Renaming onto a variable that is essential for `u` (and is not
    /// itself renamed away) is a soft error: it is logged, not refused.
    pub fn rename(&mut self, u: Edge, dvars: &HashMap<String, String>) -> Result<Edge> {
        self.wrapped(|man| {
            if !man.contains(u) {
                return Err(BddError::BadArgument(format!(
                    "edge {u} does not reference an existing node"
                )));
            }
            if dvars.is_empty() {
                return Ok(u);
            }
            for (old, new) in dvars {
                man.level_of_var(old)?;
                man.level_of_var(new)?;
                if man.is_essential(u, new) && !dvars.contains_key(new) {
                    log::warn!(
                        "renaming {old:?} onto {new:?}, which is essential for the function"
                    );
                }
            }
            let level_map: HashMap<usize, usize> = man
                .vars
                .iter()
                .map(|(var, &level)| {
                    let target = dvars.get(var).unwrap_or(var);
                    (level, man.vars[target])
                })
                .collect();
            let mut cache = HashMap::default();
            man.rename_rec(u, &level_map, &mut cache)
        })
    }

    fn rename_rec(
        &mut self,
        u: Edge,
        level_map: &HashMap<usize, usize>,
        cache: &mut HashMap<NodeID, Edge>,
    ) -> Result<Edge> {
        if u.is_terminal() {
            return Ok(u);
        }
        if let Some(&r) = cache.get(&u.node()) {
            return Ok(u.transfer_sign(r));
        }
        let node = self.nodes[&u.node()];
        let p = self.rename_rec(node.low, level_map, cache)?;
        let q = self.rename_rec(node.high, level_map, cache)?;
        let g = {
            let j = level_map[&node.level];
            self.find_or_add(j, FALSE, TRUE)?
        };
        let r = self.ite_rec(g, q, p)?;
        cache.insert(u.node(), r);
        Ok(u.transfer_sign(r))
    }

    /// Substitute Boolean constants for variables in `u`.
    pub fn cofactor(&mut self, u: Edge, values: &HashMap<String, bool>) -> Result<Edge> {
        self.wrapped(|man| {
            if !man.contains(u) {
                return Err(BddError::BadArgument(format!(
                    "edge {u} does not reference an existing node"
                )));
            }
            if values.is_empty() {
                log::warn!("cofactor with an empty assignment has no effect");
                return Ok(u);
            }
            let by_level: HashMap<usize, bool> = values
                .iter()
                .map(|(var, &val)| Ok((man.level_of_var(var)?, val)))
                .collect::<Result<_>>()?;
            let mut cache = HashMap::default();
            man.cofactor_rec(u, &by_level, &mut cache)
        })
    }

    fn cofactor_rec(
        &mut self,
        u: Edge,
        values: &HashMap<usize, bool>,
        cache: &mut HashMap<Edge, Edge>,
    ) -> Result<Edge> {
        if u.is_terminal() {
            return Ok(u);
        }
        if let Some(&r) = cache.get(&u) {
            return Ok(r);
        }
        let node = self.nodes[&u.node()];
        let r = if let Some(&val) = values.get(&node.level) {
            let child = if val { node.high } else { node.low };
            self.cofactor_rec(child, values, cache)?
        } else {
            let p = self.cofactor_rec(node.low, values, cache)?;
            let q = self.cofactor_rec(node.high, values, cache)?;
            self.find_or_add(node.level, p, q)?
        };
        let r = u.transfer_sign(r);
        cache.insert(u, r);
        Ok(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bdd_node::{FALSE, TRUE};

    fn assignment(pairs: &[(&str, bool)]) -> HashMap<String, bool> {
        pairs.iter().map(|&(k, v)| (k.to_string(), v)).collect()
    }

    fn setup() -> (BddManager, Edge, Edge, Edge) {
        let mut man = BddManager::default();
        man.declare(&["x", "y", "z"]).unwrap();
        let x = man.var("x").unwrap();
        let y = man.var("y").unwrap();
        let z = man.var("z").unwrap();
        (man, x, y, z)
    }

    #[test]
    fn cofactor_with_constants() {
        let (mut man, x, y, _) = setup();
        let u = man.and(x, y).unwrap();
        // (x /\ y)[x := TRUE] == y
        let r = man.cofactor(u, &assignment(&[("x", true)])).unwrap();
        assert_eq!(r, y);
        // (x /\ y)[x := FALSE] == FALSE
        let r = man.cofactor(u, &assignment(&[("x", false)])).unwrap();
        assert_eq!(r, FALSE);
        // both at once
        let r = man
            .cofactor(u, &assignment(&[("x", true), ("y", true)]))
            .unwrap();
        assert_eq!(r, TRUE);
    }

    #[test]
    fn compose_substitutes_functions() {
        let (mut man, x, y, z) = setup();
        let u = man.and(x, -y).unwrap();
        // (x /\ ~y)[x := y] == FALSE
        let mut sub = HashMap::default();
        sub.insert("x".to_string(), y);
        let r = man.compose(u, &sub).unwrap();
        assert_eq!(r, FALSE);
        // ((x /\ y) \/ z)[x := ~z] == y \/ z
        let xy = man.and(x, y).unwrap();
        let u = man.or(xy, z).unwrap();
        let mut sub = HashMap::default();
        sub.insert("x".to_string(), -z);
        let r = man.compose(u, &sub).unwrap();
        let expected = man.or(y, z).unwrap();
        assert_eq!(r, expected);
    }

    #[test]
    fn vector_compose_is_simultaneous() {
        let (mut man, x, y, _) = setup();
        let u = man.and(x, -y).unwrap();
        // {x := y, y := x} on x /\ ~y yields y /\ ~x
        let mut sub = HashMap::default();
        sub.insert("x".to_string(), y);
        sub.insert("y".to_string(), x);
        let r = man.compose(u, &sub).unwrap();
        let expected = man.and(y, -x).unwrap();
        assert_eq!(r, expected);
    }

    #[test]
    fn rename_swaps_variables_simultaneously() {
        let (mut man, x, y, _) = setup();
        let u = man.and(x, -y).unwrap();
        let mut dvars = HashMap::default();
        dvars.insert("x".to_string(), "y".to_string());
        dvars.insert("y".to_string(), "x".to_string());
        let r = man.rename(u, &dvars).unwrap();
        let expected = man.and(y, -x).unwrap();
        assert_eq!(r, expected);
    }

    #[test]
    fn rename_to_fresh_variable() {
        let (mut man, x, y, z) = setup();
        let u = man.and(x, y).unwrap();
        let mut dvars = HashMap::default();
        dvars.insert("x".to_string(), "z".to_string());
        let r = man.rename(u, &dvars).unwrap();
        let expected = man.and(z, y).unwrap();
        assert_eq!(r, expected);
    }

    #[test]
    fn undeclared_names_are_rejected() {
        let (mut man, x, _, _) = setup();
        assert!(man
            .cofactor(x, &assignment(&[("nope", true)]))
            .is_err());
        let mut sub = HashMap::default();
        sub.insert("nope".to_string(), x);
        assert!(man.compose(x, &sub).is_err());
        let mut dvars = HashMap::default();
        dvars.insert("x".to_string(), "nope".to_string());
        assert!(man.rename(x, &dvars).is_err());
    }

    #[test]
    fn compose_keeps_independent_functions_unchanged() {
        let (mut man, x, y, z) = setup();
        let u = man.or(y, z).unwrap();
        let mut sub = HashMap::default();
        sub.insert("x".to_string(), z);
        let r = man.compose(u, &sub).unwrap();
        assert_eq!(r, u);
    }
}
