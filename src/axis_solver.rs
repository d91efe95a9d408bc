//! The axis solver: a second, structurally identical union-find pass over
//! the three extent axes that can carry a variable (cardinality,
//! perspective, branch — see `extent.rs`'s `Axis<T>` doc comment).
//! `temporality`/`binding` never appear as `Axis::Var` in practice, so this
//! module only ever runs against the three that do.

use crate::constraints::ConstraintOrigin;
use crate::draft::BlockId;
use crate::extent::AxisVarId;
use rustc_hash::FxHashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// An axis variable alpha-renamed to one block instance, mirroring
/// `vars::ScopedVar` for the payload/unit domain.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ScopedAxisVar {
    pub block: BlockId,
    pub var: AxisVarId,
}

impl ScopedAxisVar {
    pub fn new(block: BlockId, var: AxisVarId) -> Self {
        ScopedAxisVar { block, var }
    }
}

/// A union-find node in one axis's domain: either a port's own slot, or a
/// block-scoped axis variable.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum AxisNode<P: Clone + Eq + Hash> {
    Port(P),
    Var(ScopedAxisVar),
}

#[derive(Clone, Debug)]
pub enum AxisConstraint<P: Clone + Eq + Hash, T: Clone + PartialEq> {
    Concrete {
        node: AxisNode<P>,
        value: T,
        origin: ConstraintOrigin,
    },
    Eq {
        a: AxisNode<P>,
        b: AxisNode<P>,
        origin: ConstraintOrigin,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct AxisSolveError<P: Clone + Eq + Hash> {
    pub node: AxisNode<P>,
    pub message: String,
}

#[derive(Clone, Debug)]
pub struct AxisSolveResult<P: Clone + Eq + Hash, T: Clone + PartialEq> {
    pub resolved: FxHashMap<P, T>,
    pub errors: Vec<AxisSolveError<P>>,
}

struct UnionFind<N: Clone + Eq + Hash, V: Clone + PartialEq> {
    parent: FxHashMap<N, N>,
    rank: FxHashMap<N, u32>,
    value: FxHashMap<N, V>,
}

impl<N: Clone + Eq + Hash, V: Clone + PartialEq> UnionFind<N, V> {
    fn new() -> Self {
        UnionFind {
            parent: FxHashMap::default(),
            rank: FxHashMap::default(),
            value: FxHashMap::default(),
        }
    }

    fn find(&mut self, x: &N) -> N {
        if !self.parent.contains_key(x) {
            self.parent.insert(x.clone(), x.clone());
            return x.clone();
        }
        let p = self.parent.get(x).unwrap().clone();
        if &p == x {
            return p;
        }
        let root = self.find(&p);
        self.parent.insert(x.clone(), root.clone());
        root
    }

    fn union(&mut self, a: &N, b: &N) -> (N, Option<(V, V)>) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return (ra, None);
        }
        let rank_a = *self.rank.get(&ra).unwrap_or(&0);
        let rank_b = *self.rank.get(&rb).unwrap_or(&0);
        let (keep, drop) = if rank_a >= rank_b {
            (ra.clone(), rb.clone())
        } else {
            (rb.clone(), ra.clone())
        };
        self.parent.insert(drop.clone(), keep.clone());
        if rank_a == rank_b {
            *self.rank.entry(keep.clone()).or_insert(0) += 1;
        }
        let va = self.value.remove(&ra);
        let vb = self.value.remove(&rb);
        let conflict = match (&va, &vb) {
            (Some(x), Some(y)) if x != y => Some((x.clone(), y.clone())),
            _ => None,
        };
        if let Some(v) = va.or(vb) {
            self.value.insert(keep.clone(), v);
        }
        (keep, conflict)
    }
}

/// Runs one axis's solve: folds `Concrete`/`Eq` constraints through a
/// union-find, then resolves every port node to a value, defaulting to
/// `default_value` for any node whose group never received a concrete
/// assignment.
pub fn solve_axis<P, T>(
    constraints: &[AxisConstraint<P, T>],
    ports: &[P],
    default_value: T,
) -> AxisSolveResult<P, T>
where
    P: Clone + Eq + Hash + Debug,
    T: Clone + PartialEq + Debug,
{
    let mut uf: UnionFind<AxisNode<P>, T> = UnionFind::new();
    let mut errors = Vec::new();

    for c in constraints {
        match c {
            AxisConstraint::Concrete { node, value, .. } => {
                let root = uf.find(node);
                match uf.value.get(&root).cloned() {
                    Some(existing) if existing != *value => {
                        errors.push(AxisSolveError {
                            node: node.clone(),
                            message: format!(
                                "conflicting axis values: {existing:?} vs {value:?}"
                            ),
                        });
                    }
                    _ => {
                        uf.value.insert(root, value.clone());
                    }
                }
            }
            AxisConstraint::Eq { a, b, .. } => {
                let (_, conflict) = uf.union(a, b);
                if let Some((x, y)) = conflict {
                    errors.push(AxisSolveError {
                        node: a.clone(),
                        message: format!("conflicting axis values across equality: {x:?} vs {y:?}"),
                    });
                }
            }
        }
    }

    let mut resolved = FxHashMap::default();
    for p in ports {
        let node = AxisNode::Port(p.clone());
        let root = uf.find(&node);
        let value = uf.value.get(&root).cloned().unwrap_or_else(|| default_value.clone());
        resolved.insert(p.clone(), value);
    }

    AxisSolveResult { resolved, errors }
}
