//! Built-in policies (§4.8): the sole structural mutators of the draft
//! graph. Each policy inspects one obligation against the current facts and
//! either proposes an [`ElaborationPlan`], reports `Blocked`, or declines
//! (`Null`) when its preconditions aren't met.

use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::draft::{ConstValue, DefaultSource, DraftGraph, EdgeId, PortId, PortRef};
use crate::facts::{FactSet, PortTypeHint};
use crate::obligations::{Obligation, Subject};
use crate::registry::BlockRegistry;

/// A well-known identity block the core itself assumes exists in any
/// registry it's paired with, used only by `payloadAnchor.v1` to break an
/// otherwise-unconstrained polymorphic chain without silently defaulting.
pub const PAYLOAD_ANCHOR_BLOCK_TYPE: &str = "PayloadAnchorFloat";

/// A well-known single-output block the core assumes exists in any
/// registry it's paired with, used only by `defaultSources.v1` to
/// materialize an inline `Const` default as a real source block. The
/// constant value lives in `params["value"]`.
pub const DEFAULT_CONST_SOURCE_BLOCK_TYPE: &str = "DefaultConstSource";

#[derive(Clone, Debug, PartialEq)]
pub enum ElaborationPlan {
    SpliceAdapter {
        edge: EdgeId,
        adapter_block_type: String,
        in_port: String,
        out_port: String,
    },
    SynthesizeDefaultSource {
        port: PortRef,
        source: DefaultSource,
    },
    SpliceAnchor {
        edge: EdgeId,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum PolicyOutcome {
    Plan(ElaborationPlan),
    Blocked(Diagnostic),
    Null,
}

/// Applies one plan to a draft, returning the extended draft. Plans never
/// fail structurally; a stale edge id (already removed by an earlier plan
/// this same pass) is simply a no-op.
pub fn apply_plan(draft: &DraftGraph, plan: &ElaborationPlan) -> DraftGraph {
    match plan {
        ElaborationPlan::SpliceAdapter {
            edge,
            adapter_block_type,
            in_port,
            out_port,
        } => match draft.insert_adapter_between(*edge, adapter_block_type.clone(), in_port.clone(), out_port.clone()) {
            Some((next, ..)) => next,
            None => draft.clone(),
        },
        ElaborationPlan::SynthesizeDefaultSource { port, source } => {
            draft
                .synthesize_default_source(port, source, DEFAULT_CONST_SOURCE_BLOCK_TYPE)
                .0
        }
        ElaborationPlan::SpliceAnchor { edge } => {
            match draft.insert_adapter_between(*edge, PAYLOAD_ANCHOR_BLOCK_TYPE, "in", "out") {
                Some((next, ..)) => next,
                None => draft.clone(),
            }
        }
    }
}

fn single_port_id(ids: impl Iterator<Item = PortId>) -> Option<PortId> {
    let mut sorted: Vec<PortId> = ids.collect();
    sorted.sort();
    sorted.into_iter().next()
}

/// `adapters.v1` — an edge whose endpoints are both `ok` but inequal.
pub fn adapters_v1(
    obligation: &Obligation,
    draft: &DraftGraph,
    facts: &FactSet,
    registry: &BlockRegistry,
) -> PolicyOutcome {
    let edge_id = match obligation.subject {
        Subject::Edge(e) => e,
        _ => return PolicyOutcome::Null,
    };
    let edge = match draft.edges.get(&edge_id) {
        Some(e) => e,
        None => return PolicyOutcome::Null,
    };
    let (src_ty, tgt_ty) = match (facts.ports.get(&edge.from), facts.ports.get(&edge.to)) {
        (Some(PortTypeHint::Ok(s)), Some(PortTypeHint::Ok(t))) => (s, t),
        _ => return PolicyOutcome::Null,
    };
    if crate::canonical::types_equal(src_ty, tgt_ty) {
        return PolicyOutcome::Null;
    }
    match registry.find_adapter(src_ty, tgt_ty) {
        Some(def) => {
            let in_port = single_port_id(def.inputs.keys().cloned());
            let out_port = single_port_id(def.outputs.keys().cloned());
            match (in_port, out_port) {
                (Some(in_port), Some(out_port)) => PolicyOutcome::Plan(ElaborationPlan::SpliceAdapter {
                    edge: edge_id,
                    adapter_block_type: def.block_type.clone(),
                    in_port: in_port.0,
                    out_port: out_port.0,
                }),
                _ => PolicyOutcome::Blocked(
                    Diagnostic::new(DiagnosticCode::NoAdapter, "adapter block declares no single in/out port pair")
                        .with_edge(edge_id),
                ),
            }
        }
        None => PolicyOutcome::Blocked(
            Diagnostic::new(
                DiagnosticCode::NoAdapter,
                format!("no adapter converts {src_ty} to {tgt_ty}"),
            )
            .with_edge(edge_id),
        ),
    }
}

/// `defaultSources.v1` — an unconnected input port whose declared default
/// source is known, either on the block definition or a per-instance
/// override.
pub fn default_sources_v1(
    obligation: &Obligation,
    draft: &DraftGraph,
    registry: &BlockRegistry,
) -> PolicyOutcome {
    let port = match &obligation.subject {
        Subject::Port(p) => p.clone(),
        _ => return PolicyOutcome::Null,
    };
    if !draft.edges_into(&port).is_empty() {
        return PolicyOutcome::Null;
    }
    let block = match draft.blocks.get(&port.block) {
        Some(b) => b,
        None => return PolicyOutcome::Null,
    };
    let def = match registry.get(&block.block_type) {
        Some(d) => d,
        None => return PolicyOutcome::Null,
    };
    let override_source = block
        .input_configs
        .get(&port.port)
        .and_then(|cfg| cfg.default_source_override.clone());
    let declared = override_source.or_else(|| {
        def.inputs
            .get(&port.port)
            .and_then(|input| input.default_source.clone())
    });
    match declared {
        Some(source) => PolicyOutcome::Plan(ElaborationPlan::SynthesizeDefaultSource { port, source }),
        None => PolicyOutcome::Null,
    }
}

/// `payloadAnchor.v1` — a polymorphic chain with no concrete payload
/// evidence after one solve. Always co-emits a warning.
pub fn payload_anchor_v1(obligation: &Obligation) -> PolicyOutcome {
    let edge_id = match obligation.subject {
        Subject::Edge(e) => e,
        _ => return PolicyOutcome::Null,
    };
    PolicyOutcome::Plan(ElaborationPlan::SpliceAnchor { edge: edge_id })
}

pub fn payload_anchor_warning(edge: EdgeId) -> Diagnostic {
    Diagnostic::new(
        DiagnosticCode::PayloadAnchorApplied,
        "no concrete payload evidence; anchored chain to float",
    )
    .with_edge(edge)
}
