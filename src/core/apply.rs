//! Derived Boolean operators and the operator-name dispatch used by the
//! formula front ends.

use crate::{
    core::{
        bdd_manager::BddManager,
        bdd_node::{Edge, FALSE, TRUE},
        error::{BddError, Result},
    },
    misc::hash_select::HashMap,
};

impl BddManager {
    //------------------------------------------------------------------------//
    // Unitary Operations

    /// Negation is edge complementation; no table access.
    pub fn not(&self, f: Edge) -> Edge {
        -f
    }

    //------------------------------------------------------------------------//
    // Binary Operations

    pub fn and(&mut self, f: Edge, g: Edge) -> Result<Edge> {
        self.ite(f, g, FALSE)
    }

    pub fn or(&mut self, f: Edge, g: Edge) -> Result<Edge> {
        self.ite(f, TRUE, g)
    }

    pub fn xor(&mut self, f: Edge, g: Edge) -> Result<Edge> {
        self.ite(f, -g, g)
    }

    pub fn implies(&mut self, f: Edge, g: Edge) -> Result<Edge> {
        self.ite(f, g, TRUE)
    }

    pub fn equiv(&mut self, f: Edge, g: Edge) -> Result<Edge> {
        self.ite(f, g, -g)
    }

    /// Set difference `f /\ ~g`.
    pub fn diff(&mut self, f: Edge, g: Edge) -> Result<Edge> {
        self.ite(f, -g, FALSE)
    }

    //------------------------------------------------------------------------//
    // Operator vocabulary

    /// Apply the operator named `op` to the given edges.
    ///
    /// Accepts the full front-end vocabulary: `not`/`~`/`!`, `and`/`/\`/
    /// `&`/`&&`, `or`/`\/`/`|`/`||`, `xor`/`^`/`#`, `=>`/`->`/`implies`,
    /// `<=>`/`<->`/`equiv`, `-`/`diff`, the quantifiers `\A`/`forall` and
    /// `\E`/`exists` (where `u` carries the quantified variables as its
    /// support), and `ite`.
    pub fn apply(&mut self, op: &str, u: Edge, v: Option<Edge>, w: Option<Edge>) -> Result<Edge> {
        for edge in [Some(u), v, w].into_iter().flatten() {
            if !self.contains(edge) {
                return Err(BddError::BadArgument(format!(
                    "edge {edge} does not reference an existing node"
                )));
            }
        }
        let unary = |v: Option<Edge>, w: Option<Edge>| -> Result<()> {
            if v.is_some() || w.is_some() {
                return Err(BddError::BadArgument(format!(
                    "operator {op:?} takes one argument"
                )));
            }
            Ok(())
        };
        let binary = |v: Option<Edge>, w: Option<Edge>| -> Result<Edge> {
            if w.is_some() {
                return Err(BddError::BadArgument(format!(
                    "operator {op:?} takes two arguments"
                )));
            }
            v.ok_or_else(|| {
                BddError::BadArgument(format!("operator {op:?} takes two arguments"))
            })
        };
        match op {
            "not" | "~" | "!" => {
                unary(v, w)?;
                Ok(self.not(u))
            }
            "and" | "/\\" | "&" | "&&" => {
                let v = binary(v, w)?;
                self.and(u, v)
            }
            "or" | "\\/" | "|" | "||" => {
                let v = binary(v, w)?;
                self.or(u, v)
            }
            "xor" | "^" | "#" => {
                let v = binary(v, w)?;
                self.xor(u, v)
            }
            "=>" | "->" | "implies" => {
                let v = binary(v, w)?;
                self.implies(u, v)
            }
            "<=>" | "<->" | "equiv" => {
                let v = binary(v, w)?;
                self.equiv(u, v)
            }
            "diff" | "-" => {
                let v = binary(v, w)?;
                self.diff(u, v)
            }
            "\\A" | "forall" => {
                let v = binary(v, w)?;
                let qvars: Vec<String> = self.support(u)?.into_iter().collect();
                let names: Vec<&str> = qvars.iter().map(String::as_str).collect();
                self.forall(&names, v)
            }
            "\\E" | "exists" => {
                let v = binary(v, w)?;
                let qvars: Vec<String> = self.support(u)?.into_iter().collect();
                let names: Vec<&str> = qvars.iter().map(String::as_str).collect();
                self.exist(&names, v)
            }
            "ite" => {
                let v = v.ok_or_else(|| {
                    BddError::BadArgument("operator \"ite\" takes three arguments".to_string())
                })?;
                let w = w.ok_or_else(|| {
                    BddError::BadArgument("operator \"ite\" takes three arguments".to_string())
                })?;
                self.ite(u, v, w)
            }
            _ => Err(BddError::BadArgument(format!("unknown operator {op:?}"))),
        }
    }

    /// Conjunction of literals: `true` maps a variable to its positive
    /// literal, `false` to its negation.
    pub fn cube(&mut self, dvars: &HashMap<String, bool>) -> Result<Edge> {
        self.wrapped(|man| {
            let mut r = TRUE;
            for (var, &val) in dvars {
                let mut u = {
                    let j = man.level_of_var(var)?;
                    man.find_or_add(j, FALSE, TRUE)?
                };
                if !val {
                    u = -u;
                }
                r = man.ite_rec(u, r, FALSE)?;
            }
            Ok(r)
        })
    }
}
