//! The ITE operator, the primitive from which every binary and ternary
//! operator derives.

use crate::core::{
    bdd_manager::BddManager,
    bdd_node::{Edge, FALSE, TRUE},
    error::Result,
};

/// Bring ITE calls that compute the same function into one canonical
/// form, so that they share a computed-table entry:
/// ite(f,f,h) = ite(f,1,h) = ite(h,1,f)
/// ite(f,g,f) = ite(f,g,0) = ite(g,f,0)
/// ite(~f,g,h) = ite(f,h,g)
/// ite(f,~g,~h) = ~ite(f,g,h)
///
/// The returned flag says whether the result of the normalized call must
/// be complemented.
fn normalize_ite_args(mut f: Edge, mut g: Edge, mut h: Edge) -> (Edge, Edge, Edge, bool) {
    if f == g {
        g = TRUE;
    } else if f == -g {
        g = FALSE;
    }
    if f == h {
        h = FALSE;
    } else if f == -h {
        h = TRUE;
    }

    let order = |a: Edge, b: Edge| if a.node() < b.node() { (a, b) } else { (b, a) };

    if g == TRUE {
        (f, h) = order(f, h);
    }
    if h == FALSE {
        (f, g) = order(f, g);
    }

    // first argument regular
    if f.is_complemented() {
        f = -f;
        std::mem::swap(&mut g, &mut h);
    }
    // then-branch regular, sign pushed onto the result
    let complement = g.is_complemented();
    if complement {
        g = -g;
        h = -h;
    }

    (f, g, h, complement)
}

impl BddManager {
    /// `if f then g else h`, as a top-level operator entry.
    pub fn ite(&mut self, f: Edge, g: Edge, h: Edge) -> Result<Edge> {
        self.wrapped(|man| man.ite_rec(f, g, h))
    }

    pub(crate) fn ite_rec(&mut self, f: Edge, g: Edge, h: Edge) -> Result<Edge> {
        if f == TRUE {
            return Ok(g);
        }
        if f == FALSE {
            return Ok(h);
        }
        if g == h {
            return Ok(g);
        }
        let (f, g, h, complement) = normalize_ite_args(f, g, h);
        let signed = |e: Edge| if complement { -e } else { e };
        // normalization may have folded arguments to constants
        if f == TRUE {
            return Ok(signed(g));
        }
        if g == h {
            return Ok(signed(g));
        }
        if (g, h) == (TRUE, FALSE) {
            return Ok(signed(f));
        }
        if let Some(&cached) = self.ite_cache.get(&(f, g, h)) {
            return Ok(signed(cached));
        }

        let z = self.top_level(&[f, g, h]);
        let (f0, f1) = self.top_cofactor(f, z);
        let (g0, g1) = self.top_cofactor(g, z);
        let (h0, h1) = self.top_cofactor(h, z);

        let low = self.ite_rec(f0, g0, h0)?;
        let high = self.ite_rec(f1, g1, h1)?;

        let out = self.find_or_add(z, low, high)?;
        self.cache_insert((f, g, h), out);

        Ok(signed(out))
    }

    /// Bounded computed-table insert: when the hard cap is reached the
    /// whole table is dropped and restarted.
    fn cache_insert(&mut self, key: (Edge, Edge, Edge), value: Edge) {
        if self.ite_cache.len() >= self.max_cache_hard {
            log::debug!(
                "computed table reached max_cache_hard ({}), dropping it",
                self.max_cache_hard
            );
            self.ite_cache.clear();
        }
        self.ite_cache.insert(key, value);
    }

    /// Drop the computed table. Called on every level swap and after
    /// garbage collection, since cached edges hold no references.
    pub(crate) fn clear_ite_cache(&mut self) {
        self.ite_cache.clear();
    }
}
