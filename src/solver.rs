//! The payload/unit solver: two parallel union-find structures with
//! per-group metadata (allowed sets, unitless flags, contributing origins).
//! Totality is structural: every code path below produces a value or an
//! error, never a panic on user-shaped input.

use crate::constraints::{ConstraintOrigin, PayloadUnitConstraint, TypeNode};
use crate::diagnostics::{DiagnosticCode, ErrorClass};
use crate::draft::PortRef;
use crate::inference::Substitution;
use crate::payload::PayloadType;
use crate::unit::UnitType;
use crate::vars::ScopedVar;
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Default, Clone, Debug)]
struct PayloadMeta {
    concrete: Option<PayloadType>,
    allowed: Option<Vec<PayloadType>>,
    origins: Vec<ConstraintOrigin>,
}

#[derive(Default, Clone, Debug)]
struct UnitMeta {
    concrete: Option<UnitType>,
    must_be_unitless: bool,
    origins: Vec<ConstraintOrigin>,
}

/// A union-find over [`TypeNode`]s, generic in the per-group metadata
/// payload it carries. One instance runs the payload domain, a second
/// structurally identical instance runs the unit domain.
struct UnionFind<M> {
    parent: FxHashMap<TypeNode, TypeNode>,
    rank: FxHashMap<TypeNode, u32>,
    meta: FxHashMap<TypeNode, M>,
}

impl<M: Default + Clone> UnionFind<M> {
    fn new() -> Self {
        UnionFind {
            parent: FxHashMap::default(),
            rank: FxHashMap::default(),
            meta: FxHashMap::default(),
        }
    }

    fn find(&mut self, x: &TypeNode) -> TypeNode {
        if !self.parent.contains_key(x) {
            self.parent.insert(x.clone(), x.clone());
            return x.clone();
        }
        let parent = self.parent.get(x).unwrap().clone();
        if &parent == x {
            return parent;
        }
        let root = self.find(&parent);
        self.parent.insert(x.clone(), root.clone());
        root
    }

    fn meta_entry(&mut self, x: &TypeNode) -> &mut M {
        let root = self.find(x);
        self.meta.entry(root).or_insert_with(M::default)
    }

    fn meta_of(&mut self, x: &TypeNode) -> M {
        let root = self.find(x);
        self.meta.get(&root).cloned().unwrap_or_default()
    }

    /// Merges `b`'s group into `a`'s (or vice versa, by rank), combining
    /// metadata with `merge`. Returns the surviving root.
    fn union(&mut self, a: &TypeNode, b: &TypeNode, merge: impl FnOnce(M, M) -> M) -> TypeNode {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return ra;
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
        let ma = self.meta.remove(&ra).unwrap_or_default();
        let mb = self.meta.remove(&rb).unwrap_or_default();
        self.meta.insert(keep.clone(), merge(ma, mb));
        keep
    }
}

fn intersect_allowed(
    a: Option<Vec<PayloadType>>,
    b: Option<Vec<PayloadType>>,
) -> Option<Vec<PayloadType>> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) | (None, Some(x)) => Some(x),
        (Some(x), Some(y)) => Some(x.into_iter().filter(|v| y.contains(v)).collect()),
    }
}

fn classify(origins: &[ConstraintOrigin]) -> ErrorClass {
    if origins.iter().any(|o| matches!(o, ConstraintOrigin::Edge(_))) {
        ErrorClass::UserPatchTypeError
    } else if origins
        .iter()
        .any(|o| matches!(o, ConstraintOrigin::PayloadMetadata(_)))
    {
        ErrorClass::BlockDefTooSpecific
    } else {
        ErrorClass::Unresolved
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PUSolveError {
    pub code: DiagnosticCode,
    pub class: ErrorClass,
    pub node: TypeNode,
    pub domain: &'static str,
    pub message: String,
}

impl PUSolveError {
    fn sort_key(&self) -> String {
        format!("{}|{:?}", self.node.stable_key(self.domain), self.code)
    }
}

#[derive(Clone, Debug)]
pub struct PayloadUnitSolveResult {
    pub substitution: Substitution<ScopedVar>,
    pub port_payloads: FxHashMap<PortRef, PayloadType>,
    pub port_units: FxHashMap<PortRef, UnitType>,
    pub errors: Vec<PUSolveError>,
}

impl Default for PayloadUnitSolveResult {
    fn default() -> Self {
        PayloadUnitSolveResult {
            substitution: Substitution::new(),
            port_payloads: FxHashMap::default(),
            port_units: FxHashMap::default(),
            errors: Vec::new(),
        }
    }
}

/// Runs the two-phase solve described in §4.5 over a constraint set and the
/// base (pre-solve) inference type of every port.
pub fn solve(
    constraints: &[PayloadUnitConstraint],
    port_base_types: &FxHashMap<PortRef, crate::inference::InferenceCanonicalType<ScopedVar>>,
) -> PayloadUnitSolveResult {
    let mut payload_uf: UnionFind<PayloadMeta> = UnionFind::new();
    let mut unit_uf: UnionFind<UnitMeta> = UnionFind::new();
    let mut errors: Vec<PUSolveError> = Vec::new();

    let mut payload_nodes: FxHashSet<TypeNode> = FxHashSet::default();
    let mut unit_nodes: FxHashSet<TypeNode> = FxHashSet::default();
    let mut payload_var_groups: FxHashSet<TypeNode> = FxHashSet::default();
    let mut unit_var_groups: FxHashSet<TypeNode> = FxHashSet::default();

    for c in constraints {
        match c {
            PayloadUnitConstraint::ConcretePayload { node, payload, origin } => {
                payload_nodes.insert(node.clone());
                let m = payload_uf.meta_entry(node);
                if let Some(existing) = m.concrete {
                    if existing != *payload {
                        let origins = m.origins.clone();
                        errors.push(PUSolveError {
                            code: DiagnosticCode::ConflictingPayloads,
                            class: classify(&origins),
                            node: node.clone(),
                            domain: "payload",
                            message: format!("conflicting concrete payloads: {existing} vs {payload}"),
                        });
                    }
                } else {
                    m.concrete = Some(*payload);
                }
                m.origins.push(origin.clone());
            }
            PayloadUnitConstraint::ConcreteUnit { node, unit, origin } => {
                unit_nodes.insert(node.clone());
                let m = unit_uf.meta_entry(node);
                if let Some(existing) = &m.concrete {
                    if !crate::unit::units_equal(existing, unit) {
                        let origins = m.origins.clone();
                        errors.push(PUSolveError {
                            code: DiagnosticCode::ConflictingUnits,
                            class: classify(&origins),
                            node: node.clone(),
                            domain: "unit",
                            message: format!("conflicting concrete units: {existing} vs {unit}"),
                        });
                    }
                } else {
                    m.concrete = Some(unit.clone());
                }
                m.origins.push(origin.clone());
            }
            PayloadUnitConstraint::PayloadEq { a, b, origin } => {
                payload_nodes.insert(a.clone());
                payload_nodes.insert(b.clone());
                if matches!(a, TypeNode::Var(_)) {
                    payload_var_groups.insert(a.clone());
                }
                if matches!(b, TypeNode::Var(_)) {
                    payload_var_groups.insert(b.clone());
                }
                let ma = payload_uf.meta_of(a);
                let mb = payload_uf.meta_of(b);
                if let (Some(x), Some(y)) = (ma.concrete, mb.concrete) {
                    if x != y {
                        errors.push(PUSolveError {
                            code: DiagnosticCode::ConflictingPayloads,
                            class: classify(&[ma.origins.clone(), mb.origins.clone(), vec![origin.clone()]].concat()),
                            node: a.clone(),
                            domain: "payload",
                            message: format!("conflicting concrete payloads across equality: {x} vs {y}"),
                        });
                    }
                }
                let root = payload_uf.union(a, b, |x, y| PayloadMeta {
                    concrete: x.concrete.or(y.concrete),
                    allowed: intersect_allowed(x.allowed, y.allowed),
                    origins: [x.origins, y.origins].concat(),
                });
                payload_uf.meta_entry(&root).origins.push(origin.clone());
            }
            PayloadUnitConstraint::UnitEq { a, b, origin } => {
                unit_nodes.insert(a.clone());
                unit_nodes.insert(b.clone());
                if matches!(a, TypeNode::Var(_)) {
                    unit_var_groups.insert(a.clone());
                }
                if matches!(b, TypeNode::Var(_)) {
                    unit_var_groups.insert(b.clone());
                }
                let ma = unit_uf.meta_of(a);
                let mb = unit_uf.meta_of(b);
                if let (Some(x), Some(y)) = (&ma.concrete, &mb.concrete) {
                    if !crate::unit::units_equal(x, y) {
                        errors.push(PUSolveError {
                            code: DiagnosticCode::ConflictingUnits,
                            class: classify(&[ma.origins.clone(), mb.origins.clone(), vec![origin.clone()]].concat()),
                            node: a.clone(),
                            domain: "unit",
                            message: format!("conflicting concrete units across equality: {x} vs {y}"),
                        });
                    }
                }
                let root = unit_uf.union(a, b, |x, y| UnitMeta {
                    concrete: x.concrete.or(y.concrete),
                    must_be_unitless: x.must_be_unitless || y.must_be_unitless,
                    origins: [x.origins, y.origins].concat(),
                });
                unit_uf.meta_entry(&root).origins.push(origin.clone());
            }
            PayloadUnitConstraint::RequirePayloadIn { node, allowed, origin } => {
                payload_nodes.insert(node.clone());
                let m = payload_uf.meta_entry(node);
                m.allowed = intersect_allowed(m.allowed.take(), Some(allowed.clone()));
                m.origins.push(origin.clone());
            }
            PayloadUnitConstraint::RequireUnitless { node, origin } => {
                unit_nodes.insert(node.clone());
                let m = unit_uf.meta_entry(node);
                m.must_be_unitless = true;
                m.origins.push(origin.clone());
            }
        }
    }

    // Which roots a variable belongs to, computed once before phase 2
    // starts caching resolved values onto group metadata.
    let payload_var_roots: FxHashSet<TypeNode> = payload_var_groups
        .iter()
        .map(|n| payload_uf.find(n))
        .collect();
    let unit_var_roots: FxHashSet<TypeNode> = unit_var_groups.iter().map(|n| unit_uf.find(n)).collect();

    let mut reported_empty: FxHashSet<TypeNode> = FxHashSet::default();
    let mut reported_unresolved: FxHashSet<TypeNode> = FxHashSet::default();

    let mut sorted_payload_nodes: Vec<TypeNode> = payload_nodes.into_iter().collect();
    sorted_payload_nodes.sort_by_key(|n| n.stable_key("payload"));

    let mut resolved_payload: FxHashMap<PortRef, PayloadType> = FxHashMap::default();
    let mut payload_subst: FxHashMap<ScopedVar, PayloadType> = FxHashMap::default();

    for node in &sorted_payload_nodes {
        let root = payload_uf.find(node);
        let is_var_group = payload_var_roots.contains(&root);
        let m = payload_uf.meta_entry(node);

        let value = if let Some(v) = m.concrete {
            Some(v)
        } else if let Some(allowed) = m.allowed.clone() {
            if allowed.is_empty() {
                if reported_empty.insert(root.clone()) {
                    let origins = m.origins.clone();
                    errors.push(PUSolveError {
                        code: DiagnosticCode::EmptyAllowedSet,
                        class: classify(&origins),
                        node: root.clone(),
                        domain: "payload",
                        message: "allowed-payload intersection is empty".to_string(),
                    });
                }
                None
            } else {
                let v = allowed[0];
                m.concrete = Some(v);
                Some(v)
            }
        } else if is_var_group {
            m.concrete = Some(PayloadType::Float);
            Some(PayloadType::Float)
        } else {
            None
        };

        match value {
            Some(v) => {
                if let Some(allowed) = &m.allowed {
                    if !allowed.contains(&v) {
                        errors.push(PUSolveError {
                            code: DiagnosticCode::PayloadNotInAllowedSet,
                            class: classify(&m.origins),
                            node: node.clone(),
                            domain: "payload",
                            message: format!("resolved payload {v} is outside the allowed set"),
                        });
                    }
                }
                match node {
                    TypeNode::Port(p) => {
                        resolved_payload.insert(p.clone(), v);
                    }
                    TypeNode::Var(var) => {
                        payload_subst.insert(*var, v);
                    }
                }
            }
            None => {
                if reported_unresolved.insert(root.clone()) {
                    errors.push(PUSolveError {
                        code: DiagnosticCode::UnresolvedPayload,
                        class: classify(&m.origins),
                        node: node.clone(),
                        domain: "payload",
                        message: "no payload resolution possible".to_string(),
                    });
                }
            }
        }
    }

    let mut sorted_unit_nodes: Vec<TypeNode> = unit_nodes.into_iter().collect();
    sorted_unit_nodes.sort_by_key(|n| n.stable_key("unit"));

    let mut resolved_unit: FxHashMap<PortRef, UnitType> = FxHashMap::default();
    let mut unit_subst: FxHashMap<ScopedVar, UnitType> = FxHashMap::default();
    let mut reported_empty_unit: FxHashSet<TypeNode> = FxHashSet::default();
    let mut reported_unresolved_unit: FxHashSet<TypeNode> = FxHashSet::default();
    let _ = &mut reported_empty_unit; // unit domain has no allowed-set notion, kept for symmetry

    for node in &sorted_unit_nodes {
        let root = unit_uf.find(node);
        let is_var_group = unit_var_roots.contains(&root);
        let m = unit_uf.meta_entry(node);

        let value = if let Some(v) = m.concrete.clone() {
            Some(v)
        } else if m.must_be_unitless {
            m.concrete = Some(UnitType::None);
            Some(UnitType::None)
        } else if is_var_group {
            m.concrete = Some(UnitType::None);
            Some(UnitType::None)
        } else {
            None
        };

        match value {
            Some(v) => {
                if m.must_be_unitless && !crate::unit::units_equal(&v, &UnitType::None) {
                    errors.push(PUSolveError {
                        code: DiagnosticCode::UnitlessMismatch,
                        class: classify(&m.origins),
                        node: node.clone(),
                        domain: "unit",
                        message: format!("group requires unitless but resolved to {v}"),
                    });
                }
                match node {
                    TypeNode::Port(p) => {
                        resolved_unit.insert(p.clone(), v);
                    }
                    TypeNode::Var(var) => {
                        unit_subst.insert(*var, v);
                    }
                }
            }
            None => {
                if reported_unresolved_unit.insert(root.clone()) {
                    errors.push(PUSolveError {
                        code: DiagnosticCode::UnresolvedUnit,
                        class: classify(&m.origins),
                        node: node.clone(),
                        domain: "unit",
                        message: "no unit resolution possible".to_string(),
                    });
                }
            }
        }
    }

    errors.sort_by_key(|e| e.sort_key());

    PayloadUnitSolveResult {
        substitution: Substitution {
            payloads: payload_subst,
            units: unit_subst,
        },
        port_payloads: resolved_payload,
        port_units: resolved_unit,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::PortRef;
    use crate::extent::Extent;
    use crate::inference::InferenceCanonicalType;
    use crate::vars::VarId;

    fn port(n: u32, name: &str) -> PortRef {
        PortRef::new(crate::draft::BlockId::new(n as usize), name)
    }

    fn base_types_for(ports: &[PortRef]) -> FxHashMap<PortRef, crate::inference::InferenceCanonicalType<ScopedVar>> {
        ports
            .iter()
            .map(|p| {
                (
                    p.clone(),
                    InferenceCanonicalType::<ScopedVar>::concrete(
                        PayloadType::Float,
                        UnitType::Scalar,
                        Extent::default_extent(),
                        None,
                    ),
                )
            })
            .collect()
    }

    #[test]
    fn chain_of_equal_edges_unifies_to_one_payload() {
        let a_out = port(0, "out");
        let b_in = port(1, "in");
        let b_out = port(1, "out");
        let c_in = port(2, "in");

        let constraints = vec![
            PayloadUnitConstraint::ConcretePayload {
                node: TypeNode::Port(a_out.clone()),
                payload: PayloadType::Float,
                origin: ConstraintOrigin::PortDef(a_out.clone()),
            },
            PayloadUnitConstraint::PayloadEq {
                a: TypeNode::Port(a_out.clone()),
                b: TypeNode::Port(b_in.clone()),
                origin: ConstraintOrigin::Edge(crate::draft::EdgeId::new(0)),
            },
            PayloadUnitConstraint::PayloadEq {
                a: TypeNode::Port(b_in.clone()),
                b: TypeNode::Port(b_out.clone()),
                origin: ConstraintOrigin::BlockRule {
                    block: crate::draft::BlockId::new(1),
                    rule: "samePayloadVar",
                },
            },
            PayloadUnitConstraint::PayloadEq {
                a: TypeNode::Port(b_out.clone()),
                b: TypeNode::Port(c_in.clone()),
                origin: ConstraintOrigin::Edge(crate::draft::EdgeId::new(1)),
            },
        ];
        let bases = base_types_for(&[a_out.clone(), b_in.clone(), b_out.clone(), c_in.clone()]);
        let result = solve(&constraints, &bases);
        assert!(result.errors.is_empty());
        let v = result.port_payloads[&a_out];
        assert_eq!(result.port_payloads[&b_in], v);
        assert_eq!(result.port_payloads[&b_out], v);
        assert_eq!(result.port_payloads[&c_in], v);
    }

    #[test]
    fn conflicting_concrete_payloads_report_user_patch_error() {
        let src = port(0, "out");
        let tgt = port(1, "in");
        let constraints = vec![
            PayloadUnitConstraint::ConcretePayload {
                node: TypeNode::Port(src.clone()),
                payload: PayloadType::Float,
                origin: ConstraintOrigin::PortDef(src.clone()),
            },
            PayloadUnitConstraint::ConcretePayload {
                node: TypeNode::Port(tgt.clone()),
                payload: PayloadType::Color,
                origin: ConstraintOrigin::PortDef(tgt.clone()),
            },
            PayloadUnitConstraint::PayloadEq {
                a: TypeNode::Port(src.clone()),
                b: TypeNode::Port(tgt.clone()),
                origin: ConstraintOrigin::Edge(crate::draft::EdgeId::new(0)),
            },
        ];
        let bases = base_types_for(&[src, tgt]);
        let result = solve(&constraints, &bases);
        assert!(result
            .errors
            .iter()
            .any(|e| e.code == DiagnosticCode::ConflictingPayloads
                && e.class == ErrorClass::UserPatchTypeError));
    }

    #[test]
    fn empty_allowed_set_is_reported_once() {
        let p = port(0, "x");
        let constraints = vec![
            PayloadUnitConstraint::RequirePayloadIn {
                node: TypeNode::Port(p.clone()),
                allowed: vec![PayloadType::Float],
                origin: ConstraintOrigin::PayloadMetadata(p.clone()),
            },
            PayloadUnitConstraint::RequirePayloadIn {
                node: TypeNode::Port(p.clone()),
                allowed: vec![PayloadType::Int],
                origin: ConstraintOrigin::PayloadMetadata(p.clone()),
            },
        ];
        let bases = base_types_for(&[p]);
        let result = solve(&constraints, &bases);
        let empty_errors: Vec<_> = result
            .errors
            .iter()
            .filter(|e| e.code == DiagnosticCode::EmptyAllowedSet)
            .collect();
        assert_eq!(empty_errors.len(), 1);
        assert_eq!(empty_errors[0].class, ErrorClass::BlockDefTooSpecific);
    }

    #[test]
    fn require_unitless_with_concrete_radians_is_block_def_too_specific() {
        let p = port(0, "u");
        let constraints = vec![
            PayloadUnitConstraint::ConcreteUnit {
                node: TypeNode::Port(p.clone()),
                unit: UnitType::Angle {
                    unit: crate::unit::AngleUnit::Radians,
                },
                origin: ConstraintOrigin::PortDef(p.clone()),
            },
            PayloadUnitConstraint::RequireUnitless {
                node: TypeNode::Port(p.clone()),
                origin: ConstraintOrigin::BlockRule {
                    block: crate::draft::BlockId::new(0),
                    rule: "requireUnitless",
                },
            },
        ];
        let bases = base_types_for(&[p]);
        let result = solve(&constraints, &bases);
        let mismatch = result
            .errors
            .iter()
            .find(|e| e.code == DiagnosticCode::UnitlessMismatch)
            .unwrap();
        assert_eq!(mismatch.class, ErrorClass::BlockDefTooSpecific);
    }

    #[test]
    fn polymorphic_var_with_wide_allowed_set_defaults_to_first_entry() {
        let const_out = port(0, "out");
        let add_a = port(1, "a");
        let var = VarId::new(0);
        let scoped = ScopedVar::new(crate::draft::BlockId::new(0), var);

        let constraints = vec![
            PayloadUnitConstraint::PayloadEq {
                a: TypeNode::Port(const_out.clone()),
                b: TypeNode::Var(scoped),
                origin: ConstraintOrigin::PortDef(const_out.clone()),
            },
            PayloadUnitConstraint::RequirePayloadIn {
                node: TypeNode::Port(add_a.clone()),
                allowed: vec![PayloadType::Float, PayloadType::Int, PayloadType::Vec2],
                origin: ConstraintOrigin::PayloadMetadata(add_a.clone()),
            },
            PayloadUnitConstraint::PayloadEq {
                a: TypeNode::Port(const_out.clone()),
                b: TypeNode::Port(add_a.clone()),
                origin: ConstraintOrigin::Edge(crate::draft::EdgeId::new(0)),
            },
        ];
        let bases = base_types_for(&[const_out.clone(), add_a.clone()]);
        let result = solve(&constraints, &bases);
        assert!(result.errors.is_empty());
        assert_eq!(result.port_payloads[&const_out], PayloadType::Float);
        assert_eq!(result.substitution.payloads[&scoped], PayloadType::Float);
    }
}
