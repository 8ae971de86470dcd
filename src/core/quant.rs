//! Existential and universal quantification, and the fused relational
//! image/preimage computation.

use crate::{
    core::{
        bdd_manager::BddManager,
        bdd_node::{Edge, FALSE, TRUE},
        error::{BddError, Result},
    },
    misc::hash_select::{HashMap, HashSet},
};

impl BddManager {
    /// Existential or universal abstraction of `qvars` from `u`.
    pub fn quantify(&mut self, u: Edge, qvars: &[&str], forall: bool) -> Result<Edge> {
        self.wrapped(|man| {
            if !man.contains(u) {
                return Err(BddError::BadArgument(format!(
                    "edge {u} does not reference an existing node"
                )));
            }
            let qlevels: HashSet<usize> = qvars
                .iter()
                .map(|var| man.level_of_var(var))
                .collect::<Result<_>>()?;
            if qlevels.is_empty() {
                return Ok(u);
            }
            let max_q = *qlevels.iter().max().unwrap();
            let mut cache = HashMap::default();
            man.quantify_rec(u, &qlevels, max_q, forall, &mut cache)
        })
    }

    pub fn exist(&mut self, qvars: &[&str], u: Edge) -> Result<Edge> {
        self.quantify(u, qvars, false)
    }

    pub fn forall(&mut self, qvars: &[&str], u: Edge) -> Result<Edge> {
        self.quantify(u, qvars, true)
    }

    fn quantify_rec(
        &mut self,
        u: Edge,
        qlevels: &HashSet<usize>,
        max_q: usize,
        forall: bool,
        cache: &mut HashMap<Edge, Edge>,
    ) -> Result<Edge> {
        if u.is_terminal() {
            return Ok(u);
        }
        if let Some(&r) = cache.get(&u) {
            return Ok(r);
        }
        let node = self.nodes[&u.node()];
        if node.level > max_q {
            // all quantified variables lie above this subgraph
            return Ok(u);
        }
        let (mut v, mut w) = (node.low, node.high);
        if u.is_complemented() {
            v = -v;
            w = -w;
        }
        let p = self.quantify_rec(v, qlevels, max_q, forall, cache)?;
        let q = self.quantify_rec(w, qlevels, max_q, forall, cache)?;
        let r = if qlevels.contains(&node.level) {
            if forall {
                self.ite_rec(p, q, FALSE)? // conjoin
            } else {
                self.ite_rec(p, TRUE, q)? // disjoin
            }
        } else {
            self.find_or_add(node.level, p, q)?
        };
        cache.insert(u, r);
        Ok(r)
    }

    //------------------------------------------------------------------------//
    // Fused relational product

    /// One-pass `exists/forall qvars. trans /\ source`, followed by the
    /// given rename, without building the intermediate conjunction.
    ///
    /// `rename` maps variables in the quantified conjunction (typically
    /// primed ones) to the variables of the result. The targets must be
    /// quantified away or absent from the support of the conjunction.
    pub fn image(
        &mut self,
        trans: Edge,
        source: Edge,
        rename: &HashMap<String, String>,
        qvars: &[&str],
        forall: bool,
    ) -> Result<Edge> {
        self.wrapped(|man| {
            let qlevels = man.qvar_levels(qvars)?;
            let rename_levels = man.rename_levels(rename)?;
            // the unprimed targets must not collide with what remains of
            // the conjunction's support
            let mut support = man.support_levels(trans)?;
            support.extend(man.support_levels(source)?);
            support.retain(|level| !qlevels.contains(level));
            for target in rename_levels.values() {
                if support.contains(target) {
                    return Err(BddError::BadArgument(format!(
                        "rename target level {target} collides with the support of the conjunction"
                    )));
                }
            }
            let mut cache = HashMap::default();
            man.image_rec(
                trans,
                source,
                Some(&rename_levels),
                None,
                &qlevels,
                forall,
                &mut cache,
            )
        })
    }

    /// One-pass `exists/forall qvars. trans /\ rename(target)`, the
    /// relational product toward the predecessors. Here `rename` is
    /// applied to `target` before the conjunction.
    pub fn preimage(
        &mut self,
        trans: Edge,
        target: Edge,
        rename: &HashMap<String, String>,
        qvars: &[&str],
        forall: bool,
    ) -> Result<Edge> {
        self.wrapped(|man| {
            let qlevels = man.qvar_levels(qvars)?;
            let rename_levels = man.rename_levels(rename)?;
            let mut cache = HashMap::default();
            man.image_rec(
                trans,
                target,
                None,
                Some(&rename_levels),
                &qlevels,
                forall,
                &mut cache,
            )
        })
    }

    fn qvar_levels(&self, qvars: &[&str]) -> Result<HashSet<usize>> {
        qvars.iter().map(|var| self.level_of_var(var)).collect()
    }

    fn rename_levels(&self, rename: &HashMap<String, String>) -> Result<HashMap<usize, usize>> {
        let map: HashMap<usize, usize> = rename
            .iter()
            .map(|(from, to)| Ok((self.level_of_var(from)?, self.level_of_var(to)?)))
            .collect::<Result<_>>()?;
        for (&from, &to) in &map {
            if map.contains_key(&to) {
                return Err(BddError::BadArgument(format!(
                    "rename source and target levels overlap at level {to}"
                )));
            }
            if from.abs_diff(to) != 1 {
                log::warn!(
                    "renamed levels {from} and {to} are not adjacent; \
                     the fused image may build larger intermediate nodes"
                );
            }
        }
        Ok(map)
    }

    #[allow(clippy::too_many_arguments)]
    fn image_rec(
        &mut self,
        u: Edge,
        v: Edge,
        umap: Option<&HashMap<usize, usize>>,
        vmap: Option<&HashMap<usize, usize>>,
        qlevels: &HashSet<usize>,
        forall: bool,
        cache: &mut HashMap<(Edge, Edge), Edge>,
    ) -> Result<Edge> {
        // controlling values for the conjunction
        if u == FALSE || v == FALSE {
            return Ok(FALSE);
        }
        if u == TRUE && v == TRUE {
            return Ok(TRUE);
        }
        if let Some(&r) = cache.get(&(u, v)) {
            return Ok(r);
        }
        let iu = self.level(u);
        let jv = self.level(v);
        let iv = vmap
            .and_then(|map| map.get(&jv))
            .copied()
            .unwrap_or(jv);
        let z = iu.min(iv);
        let (u0, u1) = self.top_cofactor(u, z);
        // the cofactor level of `v` is shifted back through the rename
        let vz = jv as isize + z as isize - iv as isize;
        let (v0, v1) = if vz < 0 {
            (v, v)
        } else {
            self.top_cofactor(v, vz as usize)
        };
        let p = self.image_rec(u0, v0, umap, vmap, qlevels, forall, cache)?;
        let q = self.image_rec(u1, v1, umap, vmap, qlevels, forall, cache)?;
        let r = if qlevels.contains(&z) {
            if forall {
                self.ite_rec(p, q, FALSE)?
            } else {
                self.ite_rec(p, TRUE, q)?
            }
        } else {
            let m = umap.and_then(|map| map.get(&z)).copied().unwrap_or(z);
            let g = self.find_or_add(m, FALSE, TRUE)?;
            self.ite_rec(g, q, p)?
        };
        cache.insert((u, v), r);
        Ok(r)
    }
}
