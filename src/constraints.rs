//! Constraint extraction: walks the draft graph and block definitions,
//! emitting `PayloadUnitConstraint`s the solver consumes.

use crate::draft::{BlockId, DraftGraph, EdgeId, PortRef};
use crate::inference::{InferenceCanonicalType, InferencePayload, InferenceUnit};
use crate::payload::PayloadType;
use crate::registry::BlockRegistry;
use crate::unit::UnitType;
use crate::vars::ScopedVar;
use rustc_hash::FxHashMap;

/// A union-find node in either the payload or the unit domain: either a
/// port's own slot, or a block-scoped variable. Node identity doubles as
/// the solver's node key (`payload:port:{portKey}` / `payload:var:{blockId}:{varId}`,
/// see [`TypeNode::stable_key`]).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeNode {
    Port(PortRef),
    Var(ScopedVar),
}

impl TypeNode {
    /// `domain` is `"payload"` or `"unit"`; produces a stable node key used
    /// for the solver's deterministic lexicographic tie-breaks.
    pub fn stable_key(&self, domain: &str) -> String {
        match self {
            TypeNode::Port(p) => format!("{domain}:port:{}", p.key()),
            TypeNode::Var(v) => format!("{domain}:var:{}:{}", v.block, v.var.index()),
        }
    }
}

/// Discriminates user-caused constraints (`edge`) from definition-caused
/// ones (`portDef`, `payloadMetadata`, `blockRule`). Drives error
/// classification in `solver.rs`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConstraintOrigin {
    Edge(EdgeId),
    PortDef(PortRef),
    PayloadMetadata(PortRef),
    BlockRule { block: BlockId, rule: &'static str },
}

#[derive(Clone, Debug, PartialEq)]
pub enum PayloadUnitConstraint {
    ConcretePayload {
        node: TypeNode,
        payload: PayloadType,
        origin: ConstraintOrigin,
    },
    ConcreteUnit {
        node: TypeNode,
        unit: UnitType,
        origin: ConstraintOrigin,
    },
    PayloadEq {
        a: TypeNode,
        b: TypeNode,
        origin: ConstraintOrigin,
    },
    UnitEq {
        a: TypeNode,
        b: TypeNode,
        origin: ConstraintOrigin,
    },
    RequirePayloadIn {
        node: TypeNode,
        allowed: Vec<PayloadType>,
        origin: ConstraintOrigin,
    },
    RequireUnitless {
        node: TypeNode,
        origin: ConstraintOrigin,
    },
}

/// Renames a definition-scoped var id to a block-instance-scoped
/// [`ScopedVar`], so the solver never unifies variables belonging to two
/// separate instances of the same block type.
fn alpha_rename(
    block: BlockId,
    t: &InferenceCanonicalType<crate::vars::VarId>,
) -> InferenceCanonicalType<ScopedVar> {
    InferenceCanonicalType {
        payload: match t.payload {
            InferencePayload::Concrete(p) => InferencePayload::Concrete(p),
            InferencePayload::Var(v) => InferencePayload::Var(ScopedVar::new(block, v)),
        },
        unit: match &t.unit {
            InferenceUnit::Concrete(u) => InferenceUnit::Concrete(u.clone()),
            InferenceUnit::Var(v) => InferenceUnit::Var(ScopedVar::new(block, *v)),
        },
        extent: t.extent.clone(),
        contract: t.contract,
    }
}

/// The result of a constraint-extraction walk.
pub struct ExtractionResult {
    pub constraints: Vec<PayloadUnitConstraint>,
    pub port_base_types: FxHashMap<PortRef, InferenceCanonicalType<ScopedVar>>,
}

pub fn extract_constraints(draft: &DraftGraph, registry: &BlockRegistry) -> ExtractionResult {
    let mut constraints = Vec::new();
    let mut port_base_types = FxHashMap::default();

    for block in draft.blocks_sorted() {
        let def = match registry.get(&block.block_type) {
            Some(d) => d,
            None => continue,
        };

        let mut payload_var_groups: FxHashMap<ScopedVar, Vec<PortRef>> = FxHashMap::default();
        let mut unit_var_groups: FxHashMap<ScopedVar, Vec<PortRef>> = FxHashMap::default();

        let mut ports: Vec<(PortRef, InferenceCanonicalType<crate::vars::VarId>)> = Vec::new();
        let mut input_ids: Vec<_> = def.inputs.keys().cloned().collect();
        input_ids.sort();
        for port_id in input_ids {
            let input = &def.inputs[&port_id];
            ports.push((PortRef::new(block.id, port_id.0.clone()), input.inference_type.clone()));
        }
        let mut output_ids: Vec<_> = def.outputs.keys().cloned().collect();
        output_ids.sort();
        for port_id in output_ids {
            let output = &def.outputs[&port_id];
            ports.push((PortRef::new(block.id, port_id.0.clone()), output.inference_type.clone()));
        }

        for (port_ref, base) in &ports {
            let renamed = alpha_rename(block.id, base);
            let node = TypeNode::Port(port_ref.clone());

            match &renamed.payload {
                InferencePayload::Concrete(p) => constraints.push(PayloadUnitConstraint::ConcretePayload {
                    node: node.clone(),
                    payload: *p,
                    origin: ConstraintOrigin::PortDef(port_ref.clone()),
                }),
                InferencePayload::Var(v) => {
                    constraints.push(PayloadUnitConstraint::PayloadEq {
                        a: node.clone(),
                        b: TypeNode::Var(*v),
                        origin: ConstraintOrigin::PortDef(port_ref.clone()),
                    });
                    payload_var_groups.entry(*v).or_default().push(port_ref.clone());
                }
            }

            match &renamed.unit {
                InferenceUnit::Concrete(u) => constraints.push(PayloadUnitConstraint::ConcreteUnit {
                    node: node.clone(),
                    unit: u.clone(),
                    origin: ConstraintOrigin::PortDef(port_ref.clone()),
                }),
                InferenceUnit::Var(v) => {
                    constraints.push(PayloadUnitConstraint::UnitEq {
                        a: node.clone(),
                        b: TypeNode::Var(*v),
                        origin: ConstraintOrigin::PortDef(port_ref.clone()),
                    });
                    unit_var_groups.entry(*v).or_default().push(port_ref.clone());
                }
            }

            if let Some(meta) = &def.payload_metadata {
                if let Some(allowed) = meta.allowed_payloads.get(&port_id_of(port_ref)) {
                    constraints.push(PayloadUnitConstraint::RequirePayloadIn {
                        node: node.clone(),
                        allowed: allowed.clone(),
                        origin: ConstraintOrigin::PayloadMetadata(port_ref.clone()),
                    });
                }
                if meta.require_unitless.contains(&port_id_of(port_ref)) {
                    constraints.push(PayloadUnitConstraint::RequireUnitless {
                        node,
                        origin: ConstraintOrigin::BlockRule {
                            block: block.id,
                            rule: "requireUnitless",
                        },
                    });
                }
            }

            port_base_types.insert(port_ref.clone(), renamed);
        }

        for (_, group) in sorted_groups(payload_var_groups) {
            emit_same_var_eqs(&mut constraints, block.id, &group, true);
        }
        for (_, group) in sorted_groups(unit_var_groups) {
            emit_same_var_eqs(&mut constraints, block.id, &group, false);
        }
    }

    for edge in draft.edges_sorted() {
        constraints.push(PayloadUnitConstraint::PayloadEq {
            a: TypeNode::Port(edge.from.clone()),
            b: TypeNode::Port(edge.to.clone()),
            origin: ConstraintOrigin::Edge(edge.id),
        });
        constraints.push(PayloadUnitConstraint::UnitEq {
            a: TypeNode::Port(edge.from.clone()),
            b: TypeNode::Port(edge.to.clone()),
            origin: ConstraintOrigin::Edge(edge.id),
        });
    }

    ExtractionResult {
        constraints,
        port_base_types,
    }
}

fn port_id_of(port: &PortRef) -> crate::draft::PortId {
    port.port.clone()
}

fn sorted_groups(
    groups: FxHashMap<ScopedVar, Vec<PortRef>>,
) -> Vec<(ScopedVar, Vec<PortRef>)> {
    let mut v: Vec<_> = groups.into_iter().collect();
    v.sort_by_key(|(var, _)| (var.block, var.var));
    v
}

fn emit_same_var_eqs(
    constraints: &mut Vec<PayloadUnitConstraint>,
    block: BlockId,
    group: &[PortRef],
    payload: bool,
) {
    if group.len() < 2 {
        return;
    }
    let mut sorted = group.to_vec();
    sorted.sort_by(|a, b| a.key().cmp(&b.key()));
    let anchor = TypeNode::Port(sorted[0].clone());
    for other in &sorted[1..] {
        let origin = ConstraintOrigin::BlockRule {
            block,
            rule: "samePayloadVar",
        };
        let b = TypeNode::Port(other.clone());
        if payload {
            constraints.push(PayloadUnitConstraint::PayloadEq {
                a: anchor.clone(),
                b,
                origin,
            });
        } else {
            constraints.push(PayloadUnitConstraint::UnitEq {
                a: anchor.clone(),
                b,
                origin,
            });
        }
    }
}
