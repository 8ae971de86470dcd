//! Shared facade over a [`BddManager`] and the user-visible,
//! reference-counted function handles.

use std::{
    fmt,
    hash::{Hash, Hasher},
    io::{BufRead, Write},
    mem::discriminant,
    sync::{Arc, RwLock},
};

use itertools::Itertools;
use num_bigint::BigUint;

use crate::{
    core::{
        bdd_manager::{BddManager, Configure, Settings, Statistics},
        bdd_node::{Edge, FALSE, TRUE},
        error::{BddError, Result},
    },
    misc::hash_select::{HashMap, HashSet},
    util::sat::{Assignment, PickIter},
};

/// Value bound to a variable in [`Bdd::let_`]: a Boolean constant
/// (cofactor), another variable (rename), or a function (compose).
#[derive(Clone)]
pub enum Assign {
    Val(bool),
    Var(String),
    Func(BddFunc),
}

/// Facade owning a shared [`BddManager`]. Cloning shares the manager.
#[derive(Clone, Default)]
pub struct Bdd {
    man: Arc<RwLock<BddManager>>,
}

/// A user-visible reference to an edge of a shared manager.
///
/// Creating or cloning a handle increments the target node's reference
/// count; dropping one decrements it. Handles compare by edge, so, by
/// canonicity, handle equality is function equality. Comparing handles
/// from different managers is an error.
pub struct BddFunc {
    man: Arc<RwLock<BddManager>>,
    edge: Edge,
}

impl Bdd {
    pub fn new() -> Self {
        Default::default()
    }

    fn func(&self, edge: Edge) -> BddFunc {
        BddFunc::new(self.man.clone(), edge)
    }

    fn check_owns(&self, u: &BddFunc) -> Result<()> {
        if Arc::ptr_eq(&self.man, &u.man) {
            Ok(())
        } else {
            Err(BddError::BadArgument(
                "the handle belongs to a different manager".to_string(),
            ))
        }
    }

    //------------------------------------------------------------------------//
    // Variables and constants

    pub fn declare(&self, names: &[&str]) -> Result<()> {
        self.man.write().unwrap().declare(names)
    }

    pub fn add_var(&self, name: &str, level: Option<usize>) -> Result<usize> {
        self.man.write().unwrap().add_var(name, level)
    }

    pub fn var(&self, name: &str) -> Result<BddFunc> {
        let edge = self.man.write().unwrap().var(name)?;
        Ok(self.func(edge))
    }

    /// The constant TRUE.
    pub fn one(&self) -> BddFunc {
        self.func(TRUE)
    }

    /// The constant FALSE.
    pub fn zero(&self) -> BddFunc {
        self.func(FALSE)
    }

    pub fn level_of_var(&self, name: &str) -> Result<usize> {
        self.man.read().unwrap().level_of_var(name)
    }

    pub fn var_at_level(&self, level: usize) -> Result<String> {
        Ok(self.man.read().unwrap().var_at_level(level)?.to_string())
    }

    pub fn var_count(&self) -> usize {
        self.man.read().unwrap().var_count()
    }

    pub fn undeclare_vars(&self, names: &[&str]) -> Result<Vec<String>> {
        self.man.write().unwrap().undeclare_vars(names)
    }

    //------------------------------------------------------------------------//
    // Operators

    pub fn apply(
        &self,
        op: &str,
        u: &BddFunc,
        v: Option<&BddFunc>,
        w: Option<&BddFunc>,
    ) -> Result<BddFunc> {
        self.check_owns(u)?;
        for arg in [v, w].into_iter().flatten() {
            self.check_owns(arg)?;
        }
        let edge = self.man.write().unwrap().apply(
            op,
            u.edge,
            v.map(|f| f.edge),
            w.map(|f| f.edge),
        )?;
        Ok(self.func(edge))
    }

    pub fn ite(&self, f: &BddFunc, g: &BddFunc, h: &BddFunc) -> Result<BddFunc> {
        self.check_owns(f)?;
        self.check_owns(g)?;
        self.check_owns(h)?;
        let edge = self.man.write().unwrap().ite(f.edge, g.edge, h.edge)?;
        Ok(self.func(edge))
    }

    pub fn cube(&self, dvars: &HashMap<String, bool>) -> Result<BddFunc> {
        let edge = self.man.write().unwrap().cube(dvars)?;
        Ok(self.func(edge))
    }

    /// Substitute according to `defs`: Boolean values select cofactor,
    /// variable names select rename, functions select compose. The
    /// definitions must be of one kind.
    pub fn let_(&self, defs: &HashMap<String, Assign>, u: &BddFunc) -> Result<BddFunc> {
        self.check_owns(u)?;
        let Some(first) = defs.values().next() else {
            log::warn!("let with no definitions has no effect");
            return Ok(u.clone());
        };
        if !defs.values().map(discriminant).all_equal() {
            return Err(BddError::BadArgument(
                "let definitions mix values, variables and functions".to_string(),
            ));
        }
        let edge = match first {
            Assign::Val(_) => {
                let values: HashMap<String, bool> = defs
                    .iter()
                    .map(|(var, value)| match value {
                        Assign::Val(b) => (var.clone(), *b),
                        _ => unreachable!(),
                    })
                    .collect();
                self.man.write().unwrap().cofactor(u.edge, &values)?
            }
            Assign::Var(_) => {
                let dvars: HashMap<String, String> = defs
                    .iter()
                    .map(|(var, value)| match value {
                        Assign::Var(name) => (var.clone(), name.clone()),
                        _ => unreachable!(),
                    })
                    .collect();
                self.man.write().unwrap().rename(u.edge, &dvars)?
            }
            Assign::Func(_) => {
                let mut sub: HashMap<String, Edge> = HashMap::default();
                for (var, value) in defs {
                    let Assign::Func(g) = value else { unreachable!() };
                    self.check_owns(g)?;
                    sub.insert(var.clone(), g.edge);
                }
                self.man.write().unwrap().compose(u.edge, &sub)?
            }
        };
        Ok(self.func(edge))
    }

    pub fn exist(&self, qvars: &[&str], u: &BddFunc) -> Result<BddFunc> {
        self.check_owns(u)?;
        let edge = self.man.write().unwrap().exist(qvars, u.edge)?;
        Ok(self.func(edge))
    }

    pub fn forall(&self, qvars: &[&str], u: &BddFunc) -> Result<BddFunc> {
        self.check_owns(u)?;
        let edge = self.man.write().unwrap().forall(qvars, u.edge)?;
        Ok(self.func(edge))
    }

    /// Fused `exists/forall qvars. trans /\ source` followed by `rename`.
    pub fn image(
        &self,
        trans: &BddFunc,
        source: &BddFunc,
        rename: &HashMap<String, String>,
        qvars: &[&str],
        forall: bool,
    ) -> Result<BddFunc> {
        self.check_owns(trans)?;
        self.check_owns(source)?;
        let edge = self
            .man
            .write()
            .unwrap()
            .image(trans.edge, source.edge, rename, qvars, forall)?;
        Ok(self.func(edge))
    }

    pub fn preimage(
        &self,
        trans: &BddFunc,
        target: &BddFunc,
        rename: &HashMap<String, String>,
        qvars: &[&str],
        forall: bool,
    ) -> Result<BddFunc> {
        self.check_owns(trans)?;
        self.check_owns(target)?;
        let edge = self
            .man
            .write()
            .unwrap()
            .preimage(trans.edge, target.edge, rename, qvars, forall)?;
        Ok(self.func(edge))
    }

    //------------------------------------------------------------------------//
    // Queries

    pub fn count(&self, u: &BddFunc, nvars: Option<usize>) -> Result<BigUint> {
        self.check_owns(u)?;
        self.man.read().unwrap().sat_count(u.edge, nvars)
    }

    pub fn pick_iter(&self, u: &BddFunc, care_vars: Option<&[&str]>) -> Result<PickIter> {
        self.check_owns(u)?;
        self.man.read().unwrap().pick_iter(u.edge, care_vars)
    }

    pub fn support(&self, u: &BddFunc) -> Result<HashSet<String>> {
        self.check_owns(u)?;
        self.man.read().unwrap().support(u.edge)
    }

    pub fn to_expr(&self, u: &BddFunc) -> Result<String> {
        self.check_owns(u)?;
        self.man.read().unwrap().to_expr(u.edge)
    }

    /// Recover a handle from the signed id of a live node.
    pub fn func_from_int(&self, id: i64) -> Result<BddFunc> {
        {
            let man = self.man.read().unwrap();
            if id == 0 || !man.contains(Edge(id)) {
                return Err(BddError::NotFound(format!("no live node with id {id}")));
            }
        }
        Ok(self.func(Edge(id)))
    }

    //------------------------------------------------------------------------//
    // Management

    pub fn reorder(&self, order: Option<&HashMap<String, usize>>) -> Result<()> {
        self.man.write().unwrap().reorder(order)
    }

    pub fn configure(&self, kw: Configure) -> Settings {
        self.man.write().unwrap().configure(kw)
    }

    pub fn statistics(&self) -> Statistics {
        self.man.read().unwrap().statistics()
    }

    pub fn collect_garbage(&self) -> usize {
        self.man.write().unwrap().collect_garbage(None)
    }

    pub fn assert_consistent(&self) -> Result<()> {
        self.man.read().unwrap().assert_consistent()
    }

    //------------------------------------------------------------------------//
    // Transfer

    pub fn dump<W: Write>(&self, writer: &mut W, roots: &[&BddFunc]) -> Result<()> {
        let edges: Vec<Edge> = roots
            .iter()
            .map(|&f| {
                self.check_owns(f)?;
                Ok(f.edge)
            })
            .collect::<Result<_>>()?;
        self.man.read().unwrap().dump(writer, &edges)
    }

    pub fn load<R: BufRead>(&self, reader: R, load_order: bool) -> Result<Vec<BddFunc>> {
        let edges = self.man.write().unwrap().load(reader, load_order)?;
        // the loaded roots already carry one reference each
        Ok(edges
            .into_iter()
            .map(|edge| BddFunc::from_owned(self.man.clone(), edge))
            .collect())
    }

    /// Re-create the function of `u` inside `other`, by a memoized
    /// traversal over shared variable names.
    pub fn copy(&self, u: &BddFunc, other: &Bdd) -> Result<BddFunc> {
        self.check_owns(u)?;
        if Arc::ptr_eq(&self.man, &other.man) {
            log::warn!("copying a handle to its own manager");
            return Ok(u.clone());
        }
        let edge = {
            let src = self.man.read().unwrap();
            let mut dst = other.man.write().unwrap();
            src.copy_to(u.edge, &mut dst)?
        };
        Ok(other.func(edge))
    }
}

impl fmt::Debug for Bdd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.man.read().unwrap())
    }
}

impl BddFunc {
    fn new(man: Arc<RwLock<BddManager>>, edge: Edge) -> Self {
        man.write().unwrap().incref(edge);
        BddFunc { man, edge }
    }

    /// Wrap an edge whose reference is already owned by the caller.
    fn from_owned(man: Arc<RwLock<BddManager>>, edge: Edge) -> Self {
        BddFunc { man, edge }
    }

    pub fn edge(&self) -> Edge {
        self.edge
    }

    /// The signed id, the textual form of which is `@<signed-id>`.
    pub fn as_int(&self) -> i64 {
        self.edge.0
    }

    pub fn is_one(&self) -> bool {
        self.edge == TRUE
    }

    pub fn is_zero(&self) -> bool {
        self.edge == FALSE
    }

    pub fn satisfiable(&self) -> bool {
        self.edge != FALSE
    }

    fn binary(
        &self,
        other: &BddFunc,
        f: impl FnOnce(&mut BddManager, Edge, Edge) -> Result<Edge>,
    ) -> Result<BddFunc> {
        if !Arc::ptr_eq(&self.man, &other.man) {
            return Err(BddError::BadArgument(
                "the operands belong to different managers".to_string(),
            ));
        }
        let edge = f(&mut self.man.write().unwrap(), self.edge, other.edge)?;
        Ok(BddFunc::new(self.man.clone(), edge))
    }

    pub fn not(&self) -> BddFunc {
        BddFunc::new(self.man.clone(), -self.edge)
    }

    pub fn and(&self, other: &BddFunc) -> Result<BddFunc> {
        self.binary(other, |man, a, b| man.and(a, b))
    }

    pub fn or(&self, other: &BddFunc) -> Result<BddFunc> {
        self.binary(other, |man, a, b| man.or(a, b))
    }

    pub fn xor(&self, other: &BddFunc) -> Result<BddFunc> {
        self.binary(other, |man, a, b| man.xor(a, b))
    }

    pub fn implies(&self, other: &BddFunc) -> Result<BddFunc> {
        self.binary(other, |man, a, b| man.implies(a, b))
    }

    pub fn equiv(&self, other: &BddFunc) -> Result<BddFunc> {
        self.binary(other, |man, a, b| man.equiv(a, b))
    }

    pub fn diff(&self, other: &BddFunc) -> Result<BddFunc> {
        self.binary(other, |man, a, b| man.diff(a, b))
    }

    pub fn count(&self, nvars: Option<usize>) -> Result<BigUint> {
        self.man.read().unwrap().sat_count(self.edge, nvars)
    }

    pub fn evaluate(&self, assignment: &Assignment) -> Result<bool> {
        self.man.read().unwrap().evaluate(self.edge, assignment)
    }

    pub fn support(&self) -> Result<HashSet<String>> {
        self.man.read().unwrap().support(self.edge)
    }
}

impl Clone for BddFunc {
    fn clone(&self) -> Self {
        BddFunc::new(self.man.clone(), self.edge)
    }
}

impl Drop for BddFunc {
    fn drop(&mut self) {
        if let Ok(mut man) = self.man.write() {
            man.decref(self.edge);
        }
    }
}

impl PartialEq for BddFunc {
    fn eq(&self, other: &Self) -> bool {
        assert!(
            Arc::ptr_eq(&self.man, &other.man),
            "comparing handles from different managers"
        );
        self.edge == other.edge
    }
}

impl Eq for BddFunc {}

impl Hash for BddFunc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.edge.hash(state);
    }
}

impl fmt::Display for BddFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.edge.0)
    }
}

impl fmt::Debug for BddFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BddFunc(@{})", self.edge.0)
    }
}
