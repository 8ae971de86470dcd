//! The shared BDD manager: node store, unique table, reference counts,
//! variable order bookkeeping.

use std::collections::BTreeSet;
use std::fmt;

use crate::{
    core::{
        bdd_node::{BddNode, Edge, NodeID, FALSE, TERMINAL, TRUE},
        error::{BddError, Result},
    },
    misc::hash_select::{HashMap, HashSet},
};

/// Node count below which automatic reordering never triggers.
pub const REORDER_STARTS: usize = 100;
/// Growth factor over `last_len` that requests a reorder.
pub const REORDER_FACTOR: usize = 2;
/// Growth factor used to re-arm the trigger after a reorder.
pub const GROWTH_FACTOR: usize = 2;

/// Rough per-node footprint across the three tables, used for the
/// `max_memory` soft cap.
const APPROX_NODE_BYTES: usize = 96;

/// Partial update for [`BddManager::configure`]. Absent fields are left
/// unchanged.
#[derive(Debug, Default, Clone)]
pub struct Configure {
    pub reordering: Option<bool>,
    pub max_memory: Option<usize>,
    pub max_cache_hard: Option<usize>,
    pub garbage_collection: Option<bool>,
}

/// Snapshot of the configurable parameters, returned by
/// [`BddManager::configure`] so a caller can restore them later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub reordering: bool,
    pub max_memory: usize,
    pub max_cache_hard: usize,
    pub garbage_collection: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statistics {
    /// Live nodes, terminal included.
    pub n_nodes: usize,
    pub n_vars: usize,
    pub cache_entries: usize,
    pub min_free: i64,
    pub peak_nodes: usize,
}

/// Container combining the node list, the unique table, the reference
/// counters, the computed table and the variable order.
///
/// Nodes are positive integers, edges signed integers; a negative edge is
/// complemented. Values returned by operations are edges.
#[derive(Clone)]
pub struct BddManager {
    /// node -> (level, low, high). The terminal is implicit: it has no
    /// successors and lives at level `vars.len()`.
    pub(crate) nodes: HashMap<NodeID, BddNode>,
    /// (level, low, high) -> node, inverse of `nodes`
    pub(crate) unique: HashMap<BddNode, NodeID>,
    /// Reference counters. The terminal holds a permanent internal
    /// reference, so it is never collected.
    pub(crate) ref_count: HashMap<NodeID, usize>,
    /// Smallest unused positive integer >= 2
    pub(crate) min_free: i64,
    /// Computed table: maps normalized (f, g, h) to ite(f, g, h)
    pub(crate) ite_cache: HashMap<(Edge, Edge, Edge), Edge>,
    /// Variable name -> level
    pub(crate) vars: HashMap<String, usize>,
    /// Level -> variable name, inverse of `vars`
    pub(crate) level_to_var: HashMap<usize, String>,
    /// Node count after the last reorder; `None` disables the automatic
    /// trigger.
    pub(crate) last_len: Option<usize>,
    /// Set by `find_or_add` on growth, served at the next top-level
    /// operator entry.
    pub(crate) reorder_pending: bool,
    pub(crate) in_reorder: bool,
    /// Depth of nested operator entries; requests are only served at
    /// depth zero.
    op_depth: usize,
    pub(crate) max_nodes: usize,
    pub(crate) max_memory: usize,
    pub(crate) max_cache_hard: usize,
    pub(crate) garbage_collection: bool,
    peak_nodes: usize,
}

impl fmt::Debug for BddManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BddManager [{} nodes, {} vars, cache size {}]",
            self.len(),
            self.vars.len(),
            self.ite_cache.len()
        )
    }
}

impl Default for BddManager {
    fn default() -> Self {
        let mut ref_count = HashMap::default();
        // permanent reference: the terminal is immortal
        ref_count.insert(TERMINAL, 1);
        BddManager {
            nodes: Default::default(),
            unique: Default::default(),
            ref_count,
            min_free: 2,
            ite_cache: Default::default(),
            vars: Default::default(),
            level_to_var: Default::default(),
            last_len: None,
            reorder_pending: false,
            in_reorder: false,
            op_depth: 0,
            max_nodes: usize::MAX,
            max_memory: usize::MAX,
            max_cache_hard: 1 << 22,
            garbage_collection: true,
            peak_nodes: 1,
        }
    }
}

impl BddManager {
    pub fn new() -> Self {
        Default::default()
    }

    /// Number of live nodes, terminal included.
    pub fn len(&self) -> usize {
        self.nodes.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, u: Edge) -> bool {
        u.is_terminal() || self.nodes.contains_key(&u.node())
    }

    /// The `(level, low, high)` triple of an interior node.
    pub fn succ(&self, u: Edge) -> Result<BddNode> {
        if u.is_terminal() {
            return Err(BddError::BadArgument(
                "the terminal node has no successors".to_string(),
            ));
        }
        self.nodes
            .get(&u.node())
            .copied()
            .ok_or_else(|| BddError::NotFound(format!("node {} is not in the store", u.node().0)))
    }

    /// Level of the node referenced by `u`; the terminal is at
    /// `vars.len()`.
    pub(crate) fn level(&self, u: Edge) -> usize {
        if u.is_terminal() {
            self.terminal_level()
        } else {
            self.nodes.get(&u.node()).unwrap().level
        }
    }

    pub(crate) fn terminal_level(&self) -> usize {
        self.vars.len()
    }

    /// Topmost level among `edges`.
    pub(crate) fn top_level(&self, edges: &[Edge]) -> usize {
        edges
            .iter()
            .map(|&e| self.level(e))
            .min()
            .unwrap_or_else(|| self.terminal_level())
    }

    //------------------------------------------------------------------------//
    // Variables

    /// Declare variables at the bottom of the current order.
    pub fn declare(&mut self, names: &[&str]) -> Result<()> {
        for name in names {
            self.add_var(name, None)?;
        }
        Ok(())
    }

    /// Declare a variable named `name` at `level`.
    ///
    /// If `level` is absent, the variable is added at the bottom. Levels
    /// stay contiguous: a new variable may only be appended, and an
    /// existing variable may only be confirmed at its current level.
    pub fn add_var(&mut self, name: &str, level: Option<usize>) -> Result<usize> {
        if let Some(&have) = self.vars.get(name) {
            return match level {
                None => Ok(have),
                Some(l) if l == have => Ok(have),
                Some(l) => Err(BddError::BadArgument(format!(
                    "variable {name:?} is declared at level {have}, not {l}"
                ))),
            };
        }
        let next = self.vars.len();
        let level = level.unwrap_or(next);
        if level != next {
            return Err(BddError::BadArgument(format!(
                "level {level} for new variable {name:?} is not the next free level {next}"
            )));
        }
        self.vars.insert(name.to_string(), level);
        self.level_to_var.insert(level, name.to_string());
        Ok(level)
    }

    /// The positive literal of a declared variable.
    pub fn var(&mut self, name: &str) -> Result<Edge> {
        self.wrapped(|man| {
            let j = man.level_of_var(name)?;
            man.find_or_add(j, FALSE, TRUE)
        })
    }

    pub fn level_of_var(&self, name: &str) -> Result<usize> {
        self.vars
            .get(name)
            .copied()
            .ok_or_else(|| BddError::BadArgument(format!("undeclared variable {name:?}")))
    }

    pub fn var_at_level(&self, level: usize) -> Result<&str> {
        self.level_to_var
            .get(&level)
            .map(String::as_str)
            .ok_or_else(|| BddError::NotFound(format!("no variable has level {level}")))
    }

    /// The full name -> level bijection.
    pub fn var_levels(&self) -> HashMap<String, usize> {
        self.vars.clone()
    }

    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    /// Remove unused variables from the order, compacting levels.
    ///
    /// With an empty `names`, every variable whose level holds no nodes is
    /// removed. Naming a variable whose level still holds live nodes is an
    /// [`BddError::InUse`] error.
    pub fn undeclare_vars(&mut self, names: &[&str]) -> Result<Vec<String>> {
        for name in names {
            if !self.vars.contains_key(*name) {
                return Err(BddError::BadArgument(format!(
                    "undeclared variable {name:?}"
                )));
            }
        }
        let mut full_levels: HashSet<usize> = self.nodes.values().map(|n| n.level).collect();
        for name in names {
            let level = self.level_of_var(name)?;
            if full_levels.contains(&level) {
                return Err(BddError::InUse(format!(
                    "variable {name:?} still has live nodes at level {level}"
                )));
            }
        }
        // keep unused variables that were not named
        if !names.is_empty() {
            let keep: HashSet<&str> = names.iter().copied().collect();
            for (var, level) in &self.vars {
                if !keep.contains(var.as_str()) {
                    full_levels.insert(*level);
                }
            }
        }
        // map old levels to the compacted range
        let kept: Vec<usize> = (0..self.vars.len())
            .filter(|i| full_levels.contains(i))
            .collect();
        let new_levels: HashMap<usize, usize> =
            kept.iter().enumerate().map(|(new, &old)| (old, new)).collect();
        let removed: Vec<String> = self
            .vars
            .iter()
            .filter(|(_, level)| !full_levels.contains(level))
            .map(|(var, _)| var.clone())
            .collect();
        let renumbered: HashMap<String, usize> = self
            .vars
            .iter()
            .filter(|(_, level)| full_levels.contains(level))
            .map(|(var, level)| (var.clone(), new_levels[level]))
            .collect();
        self.vars = renumbered;
        self.level_to_var = self
            .vars
            .iter()
            .map(|(var, &level)| (level, var.clone()))
            .collect();
        // renumber node levels and rebuild the unique table
        let nodes: Vec<(NodeID, BddNode)> = self
            .nodes
            .iter()
            .map(|(&id, node)| {
                (
                    id,
                    BddNode {
                        level: new_levels[&node.level],
                        ..*node
                    },
                )
            })
            .collect();
        self.nodes = nodes.iter().copied().collect();
        self.unique = nodes.iter().map(|&(id, node)| (node, id)).collect();
        self.ite_cache.clear();
        Ok(removed)
    }

    //------------------------------------------------------------------------//
    // Node store

    /// Return an edge to the node at `level` with the given children,
    /// interning it if it does not exist yet.
    ///
    /// Pushes the complement bit of `high` into canonical form, applies
    /// the reduction rule, and keeps the reference counters of the
    /// children up to date. Newly created nodes start at reference
    /// count 0.
    pub fn find_or_add(&mut self, level: usize, low: Edge, high: Edge) -> Result<Edge> {
        self.note_growth();
        if level >= self.vars.len() {
            return Err(BddError::BadArgument(format!(
                "level {} is not below the number of declared variables ({})",
                level,
                self.vars.len()
            )));
        }
        if !self.contains(low) {
            return Err(BddError::BadArgument(format!(
                "low edge {low} does not reference an existing node"
            )));
        }
        if !self.contains(high) {
            return Err(BddError::BadArgument(format!(
                "high edge {high} does not reference an existing node"
            )));
        }
        // canonical form: the high edge is regular
        let (low, high, sign) = if high.is_complemented() {
            (-low, -high, FALSE)
        } else {
            (low, high, TRUE)
        };
        // eliminate
        if low == high {
            return Ok(sign.transfer_sign(low));
        }
        let key = BddNode { level, low, high };
        if let Some(&id) = self.unique.get(&key) {
            return Ok(sign.transfer_sign(Edge::from(id)));
        }
        if self.len() >= self.max_nodes {
            return Err(BddError::Exhausted(format!(
                "reached max_nodes ({})",
                self.max_nodes
            )));
        }
        if self.len().saturating_mul(APPROX_NODE_BYTES) >= self.max_memory {
            return Err(BddError::Exhausted(format!(
                "estimated table size exceeds max_memory ({} bytes)",
                self.max_memory
            )));
        }
        let id = NodeID(self.min_free);
        debug_assert!(!self.nodes.contains_key(&id));
        self.nodes.insert(id, key);
        self.unique.insert(key, id);
        self.ref_count.insert(id, 0);
        self.min_free = self.next_free_int(self.min_free);
        self.incref(low);
        self.incref(high);
        self.peak_nodes = self.peak_nodes.max(self.len());
        Ok(sign.transfer_sign(Edge::from(id)))
    }

    /// Smallest unused node index larger than `start`.
    fn next_free_int(&self, start: i64) -> i64 {
        let mut i = start + 1;
        while self.nodes.contains_key(&NodeID(i)) {
            i += 1;
        }
        i
    }

    /// Increment the reference count of the node referenced by `u`.
    pub fn incref(&mut self, u: Edge) {
        match self.ref_count.get_mut(&u.node()) {
            Some(count) => *count += 1,
            None => {
                debug_assert!(false, "incref of unknown node {}", u.node().0);
                log::error!("incref of unknown node {}", u.node().0);
            }
        }
    }

    /// Decrement the reference count of the node referenced by `u`.
    ///
    /// Decrementing a zero count indicates a programming error in the
    /// caller: it is fatal in debug builds and logged and ignored in
    /// release builds.
    pub fn decref(&mut self, u: Edge) {
        match self.ref_count.get_mut(&u.node()) {
            Some(0) => {
                debug_assert!(
                    false,
                    "decref of node {} with reference count 0",
                    u.node().0
                );
                log::error!("decref of node {} with reference count 0", u.node().0);
            }
            Some(count) => *count -= 1,
            None => {
                debug_assert!(false, "decref of unknown node {}", u.node().0);
                log::error!("decref of unknown node {}", u.node().0);
            }
        }
    }

    /// Reference count of the node referenced by `u`.
    pub fn ref_of(&self, u: Edge) -> Result<usize> {
        self.ref_count
            .get(&u.node())
            .copied()
            .ok_or_else(|| BddError::NotFound(format!("node {} is not in the store", u.node().0)))
    }

    //------------------------------------------------------------------------//
    // Cofactors

    /// Restriction of `u` for both values of the variable at level `i`.
    ///
    /// `u` must reference either the terminal or a node at level >= `i`;
    /// an edge above `i` is independent of it and is its own cofactor.
    pub(crate) fn top_cofactor(&self, u: Edge, i: usize) -> (Edge, Edge) {
        if u.is_terminal() {
            return (u, u);
        }
        let node = *self.nodes.get(&u.node()).unwrap();
        if i < node.level {
            return (u, u);
        }
        debug_assert_eq!(node.level, i, "top cofactor requested below the node level");
        if u.is_complemented() {
            (-node.low, -node.high)
        } else {
            (node.low, node.high)
        }
    }

    //------------------------------------------------------------------------//
    // Structure queries

    /// Variables on which the function referenced by `u` depends.
    pub fn support(&self, u: Edge) -> Result<HashSet<String>> {
        Ok(self
            .support_levels(u)?
            .iter()
            .map(|i| self.level_to_var[i].clone())
            .collect())
    }

    /// Levels on which the function referenced by `u` depends, sorted.
    pub fn support_levels(&self, u: Edge) -> Result<BTreeSet<usize>> {
        if !self.contains(u) {
            return Err(BddError::NotFound(format!(
                "node {} is not in the store",
                u.node().0
            )));
        }
        let mut levels = BTreeSet::new();
        let mut visited: HashSet<NodeID> = HashSet::default();
        let mut stack = vec![u.node()];
        while let Some(id) = stack.pop() {
            if id == TERMINAL || !visited.insert(id) {
                continue;
            }
            let node = self.nodes[&id];
            levels.insert(node.level);
            stack.push(node.low.node());
            stack.push(node.high.node());
        }
        Ok(levels)
    }

    /// Nodes reachable from `roots`, the terminal included.
    pub fn descendants(&self, roots: &[Edge]) -> HashSet<NodeID> {
        let mut visited: HashSet<NodeID> = HashSet::default();
        visited.insert(TERMINAL);
        let mut stack: Vec<NodeID> = roots.iter().map(|e| e.node()).collect();
        while let Some(id) = stack.pop() {
            if id == TERMINAL || !visited.insert(id) {
                continue;
            }
            let node = self.nodes[&id];
            stack.push(node.low.node());
            stack.push(node.high.node());
        }
        visited
    }

    /// Whether the function referenced by `u` depends on `var`.
    pub fn is_essential(&self, u: Edge, var: &str) -> bool {
        let Some(&i) = self.vars.get(var) else {
            return false;
        };
        let mut visited: HashSet<NodeID> = HashSet::default();
        let mut stack = vec![u.node()];
        while let Some(id) = stack.pop() {
            if id == TERMINAL || !visited.insert(id) {
                continue;
            }
            let node = self.nodes[&id];
            if node.level == i {
                return true;
            }
            if node.level > i {
                // levels only grow downward, nothing below can be `i`
                continue;
            }
            stack.push(node.low.node());
            stack.push(node.high.node());
        }
        false
    }

    /// Textual rendering of the function referenced by `u`, in terms of
    /// `ite(var, high, low)` with `TRUE`/`FALSE` literals.
    pub fn to_expr(&self, u: Edge) -> Result<String> {
        if !self.contains(u) {
            return Err(BddError::NotFound(format!(
                "node {} is not in the store",
                u.node().0
            )));
        }
        Ok(self.to_expr_rec(u))
    }

    fn to_expr_rec(&self, u: Edge) -> String {
        if u == TRUE {
            return "TRUE".to_string();
        }
        if u == FALSE {
            return "FALSE".to_string();
        }
        let node = self.nodes[&u.node()];
        let var = &self.level_to_var[&node.level];
        let p = self.to_expr_rec(node.low);
        let q = self.to_expr_rec(node.high);
        let s = if p == "FALSE" && q == "TRUE" {
            var.clone()
        } else {
            format!("ite({var}, {q}, {p})")
        };
        if u.is_complemented() {
            format!("(~ {s})")
        } else {
            s
        }
    }

    /// Transfer the BDD rooted at `u` into `other`, by a memoized
    /// traversal. Every support variable must be declared in the target;
    /// levels may differ between the managers.
    pub fn copy_to(&self, u: Edge, other: &mut BddManager) -> Result<Edge> {
        if !self.contains(u) {
            return Err(BddError::BadArgument(format!(
                "edge {u} does not reference an existing node"
            )));
        }
        let level_map: HashMap<usize, usize> = self
            .vars
            .iter()
            .filter_map(|(var, &level)| other.vars.get(var).map(|&target| (level, target)))
            .collect();
        for level in self.support_levels(u)? {
            if !level_map.contains_key(&level) {
                return Err(BddError::NotFound(format!(
                    "variable {:?} is not declared in the target manager",
                    self.level_to_var[&level]
                )));
            }
        }
        let mut cache: HashMap<NodeID, Edge> = HashMap::default();
        self.copy_rec(u, &level_map, other, &mut cache)
    }

    fn copy_rec(
        &self,
        u: Edge,
        level_map: &HashMap<usize, usize>,
        other: &mut BddManager,
        cache: &mut HashMap<NodeID, Edge>,
    ) -> Result<Edge> {
        if u.is_terminal() {
            return Ok(u);
        }
        if let Some(&r) = cache.get(&u.node()) {
            return Ok(u.transfer_sign(r));
        }
        let node = self.nodes[&u.node()];
        let p = self.copy_rec(node.low, level_map, other, cache)?;
        let q = self.copy_rec(node.high, level_map, other, cache)?;
        let g = other.find_or_add(level_map[&node.level], FALSE, TRUE)?;
        let r = other.ite_rec(g, q, p)?;
        cache.insert(u.node(), r);
        Ok(u.transfer_sign(r))
    }

    /// Map from level to the set of node ids at that level, one entry per
    /// declared variable. Shared by swap and sifting.
    pub(crate) fn levels_index(&self) -> Vec<HashSet<NodeID>> {
        let mut levels = vec![HashSet::default(); self.vars.len()];
        for (&id, node) in &self.nodes {
            levels[node.level].insert(id);
        }
        levels
    }

    //------------------------------------------------------------------------//
    // Reorder scheduling

    /// Record growth; the request is served at the next top-level
    /// operator entry, never by unwinding.
    fn note_growth(&mut self) {
        if self.in_reorder {
            return;
        }
        if let Some(n) = self.last_len {
            if self.len() >= REORDER_FACTOR * n {
                self.reorder_pending = true;
            }
        }
    }

    /// Run `f` as a top-level operator: a pending reorder request is
    /// served before entry, and requests raised inside `f` are left for
    /// the next entry.
    pub(crate) fn wrapped<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.enter_op()?;
        let r = f(self);
        self.exit_op();
        r
    }

    fn enter_op(&mut self) -> Result<()> {
        if self.op_depth == 0 && self.reorder_pending && !self.in_reorder {
            self.reorder_pending = false;
            log::info!("reordering needed...");
            // disable requests while swapping, re-arm afterwards
            self.last_len = None;
            self.reorder(None)?;
            self.last_len = Some(GROWTH_FACTOR * self.len());
        }
        self.op_depth += 1;
        Ok(())
    }

    fn exit_op(&mut self) {
        debug_assert!(self.op_depth > 0);
        self.op_depth -= 1;
    }

    //------------------------------------------------------------------------//
    // Configuration and statistics

    /// Read and apply parameter values; the previous values are returned
    /// so they can be restored.
    pub fn configure(&mut self, kw: Configure) -> Settings {
        let prior = Settings {
            reordering: self.last_len.is_some(),
            max_memory: self.max_memory,
            max_cache_hard: self.max_cache_hard,
            garbage_collection: self.garbage_collection,
        };
        if let Some(on) = kw.reordering {
            if on {
                self.last_len = Some(REORDER_STARTS.max(self.len()));
            } else {
                self.last_len = None;
                self.reorder_pending = false;
            }
        }
        if let Some(bytes) = kw.max_memory {
            self.max_memory = bytes;
        }
        if let Some(entries) = kw.max_cache_hard {
            self.max_cache_hard = entries;
        }
        if let Some(on) = kw.garbage_collection {
            self.garbage_collection = on;
        }
        prior
    }

    pub fn statistics(&self) -> Statistics {
        Statistics {
            n_nodes: self.len(),
            n_vars: self.vars.len(),
            cache_entries: self.ite_cache.len(),
            min_free: self.min_free,
            peak_nodes: self.peak_nodes,
        }
    }

    //------------------------------------------------------------------------//
    // Consistency

    /// Check every structural invariant of the manager. Tests and debug
    /// paths call this; a failure is a bug in the engine.
    pub fn assert_consistent(&self) -> Result<()> {
        fn broken(msg: String) -> Result<()> {
            Err(BddError::InvariantViolation(msg))
        }
        if self.nodes.len() != self.unique.len() {
            return broken(format!(
                "node table has {} entries but unique table has {}",
                self.nodes.len(),
                self.unique.len()
            ));
        }
        if self.ref_count.get(&TERMINAL).copied().unwrap_or(0) == 0 {
            return broken("the terminal lost its permanent reference".to_string());
        }
        for (&id, node) in &self.nodes {
            if id.0 <= 1 {
                return broken(format!("interior node with reserved id {}", id.0));
            }
            if node.high.is_complemented() {
                return broken(format!("node {} has a complemented high edge", id.0));
            }
            if node.level >= self.vars.len() {
                return broken(format!(
                    "node {} at level {} but only {} variables are declared",
                    id.0,
                    node.level,
                    self.vars.len()
                ));
            }
            for child in [node.low, node.high] {
                if !self.contains(child) {
                    return broken(format!(
                        "child {} of node {} is not in the store",
                        child,
                        id.0
                    ));
                }
                if self.level(child) <= node.level {
                    return broken(format!(
                        "child {} of node {} does not increase the level",
                        child,
                        id.0
                    ));
                }
            }
            match self.unique.get(node) {
                Some(&back) if back == id => {}
                other => {
                    return broken(format!(
                        "unique table maps the triple of node {} to {:?}",
                        id.0, other
                    ))
                }
            }
            if !self.ref_count.contains_key(&id) {
                return broken(format!("node {} has no reference counter", id.0));
            }
        }
        // the variable order is a bijection onto contiguous levels
        if self.vars.len() != self.level_to_var.len() {
            return broken("vars and level_to_var differ in size".to_string());
        }
        for (var, &level) in &self.vars {
            if self.level_to_var.get(&level) != Some(var) {
                return broken(format!("bijection broken for variable {var:?}"));
            }
            if level >= self.vars.len() {
                return broken(format!("variable {var:?} at non-contiguous level {level}"));
            }
        }
        Ok(())
    }
}
