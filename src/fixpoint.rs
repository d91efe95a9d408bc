//! The normalization fixpoint driver (§4.9): iterates solve → derive →
//! plan → apply until either a strict typed graph emerges or the iteration
//! bound is exhausted.

use crate::canonical::{types_equal, CanonicalType};
use crate::config::NormalizeConfig;
use crate::constraints::extract_constraints;
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::draft::{DraftGraph, PortRef};
use crate::facts::{derive_facts, FactSet, PortTypeHint};
use crate::inference::InferencePayload;
use crate::obligations::{FactDependency, Obligation, ObligationStatus, Subject};
use crate::policies::{adapters_v1, apply_plan, default_sources_v1, payload_anchor_v1, payload_anchor_warning, ElaborationPlan, PolicyOutcome};
use crate::registry::BlockRegistry;
use crate::solver::{self, PUSolveError};
use rustc_hash::{FxHashMap, FxHashSet};

/// A draft graph every one of whose ports now has a resolved canonical
/// type. Lowering (`ir::lower::lower_strict_graph`) operates over this.
#[derive(Clone, Debug)]
pub struct StrictTypedGraph {
    pub draft: DraftGraph,
    pub port_types: FxHashMap<PortRef, CanonicalType>,
}

#[derive(Clone, Debug)]
pub struct FixpointOutcome {
    pub draft: DraftGraph,
    pub facts: FactSet,
    pub strict: Option<StrictTypedGraph>,
    pub diagnostics: Vec<Diagnostic>,
    pub iterations: u32,
}

fn pu_error_to_diagnostic(e: &PUSolveError, config: &NormalizeConfig) -> Diagnostic {
    let severity = config.effective_severity(e.code.as_str(), e.code.default_severity());
    let mut d = Diagnostic::new(e.code, e.message.clone())
        .with_class(e.class)
        .with_severity(severity);
    if let crate::constraints::TypeNode::Port(p) = &e.node {
        d = d.with_port(p.clone());
    }
    d
}

/// `deriveObligations(draft, facts)`.
fn derive_obligations(draft: &DraftGraph, facts: &FactSet, registry: &BlockRegistry) -> Vec<Obligation> {
    let mut out = Vec::new();

    for edge in draft.edges_sorted() {
        match (facts.ports.get(&edge.from), facts.ports.get(&edge.to)) {
            (Some(PortTypeHint::Ok(a)), Some(PortTypeHint::Ok(b))) => {
                if !types_equal(a, b) {
                    out.push(Obligation::new(
                        "adapters.v1",
                        Subject::Edge(edge.id),
                        vec![
                            (edge.from.clone(), FactDependency::PortCanonicalizable),
                            (edge.to.clone(), FactDependency::PortCanonicalizable),
                        ],
                    ));
                }
            }
            (Some(PortTypeHint::Unknown(t)), _) | (_, Some(PortTypeHint::Unknown(t))) => {
                if matches!(t.payload, InferencePayload::Var(_)) {
                    out.push(Obligation::new("payloadAnchor.v1", Subject::Edge(edge.id), vec![]));
                }
            }
            _ => {}
        }
    }

    for block in draft.blocks_sorted() {
        let def = match registry.get(&block.block_type) {
            Some(d) => d,
            None => continue,
        };
        let mut port_ids: Vec<_> = def.inputs.keys().cloned().collect();
        port_ids.sort();
        for port_id in port_ids {
            let port = PortRef::new(block.id, port_id.0.clone());
            if draft.edges_into(&port).is_empty() {
                let has_override = block
                    .input_configs
                    .get(&port_id)
                    .map(|c| c.default_source_override.is_some())
                    .unwrap_or(false);
                let has_declared = def.inputs.get(&port_id).map(|i| i.default_source.is_some()).unwrap_or(false);
                if has_override || has_declared {
                    out.push(Obligation::new("defaultSources.v1", Subject::Port(port), vec![]));
                }
            }
        }
    }

    out
}

/// `solveAndComputeFacts(draft)`.
fn solve_and_compute_facts(
    draft: &DraftGraph,
    registry: &BlockRegistry,
) -> (FactSet, Vec<PUSolveError>) {
    let extraction = extract_constraints(draft, registry);
    let solved = solver::solve(&extraction.constraints, &extraction.port_base_types);
    let facts = derive_facts(&extraction.port_base_types, &solved.substitution);
    (facts, solved.errors)
}

/// `tryFinalizeStrict(draft, facts)`: every port must be `ok`, every edge's
/// endpoints must agree (an unresolved adapter obligation means they don't,
/// even though each side individually resolved), and no obligation may be
/// left `blocked` (§8: compilation stays disabled while an error-severity
/// diagnostic remains).
fn try_finalize_strict(draft: &DraftGraph, facts: &FactSet) -> Option<StrictTypedGraph> {
    if !facts.all_resolved() {
        return None;
    }
    if draft.obligations.iter().any(|o| o.status == ObligationStatus::Blocked) {
        return None;
    }
    for edge in draft.edges_sorted() {
        match (facts.ports.get(&edge.from), facts.ports.get(&edge.to)) {
            (Some(PortTypeHint::Ok(a)), Some(PortTypeHint::Ok(b))) => {
                if !types_equal(a, b) {
                    return None;
                }
            }
            _ => return None,
        }
    }
    Some(StrictTypedGraph {
        draft: draft.clone(),
        port_types: facts.port_types(),
    })
}

/// Runs the bounded fixpoint loop described in §4.9.
pub fn run_fixpoint(initial_draft: &DraftGraph, registry: &BlockRegistry, config: &NormalizeConfig) -> FixpointOutcome {
    let mut draft = initial_draft.clone();
    let mut facts = FactSet::default();
    let mut diagnostics = Vec::new();

    for i in 0..config.max_iterations {
        let (new_facts, solve_errors) = solve_and_compute_facts(&draft, registry);
        facts = new_facts;

        let derived = derive_obligations(&draft, &facts, registry);
        let existing_ids: FxHashSet<String> = draft.obligations.iter().map(|o| o.id.clone()).collect();
        let fresh: Vec<Obligation> = derived.into_iter().filter(|o| !existing_ids.contains(&o.id)).collect();
        let added_new = !fresh.is_empty();
        if added_new {
            draft.obligations.extend(fresh);
        }

        let mut plans: Vec<ElaborationPlan> = Vec::new();
        let mut iteration_diagnostics: Vec<Diagnostic> = Vec::new();
        let mut statuses: FxHashMap<String, ObligationStatus> = FxHashMap::default();

        for ob in draft.obligations.iter().filter(|o| o.status == ObligationStatus::Open) {
            if !ob.dependencies_satisfied(&facts) {
                continue;
            }
            let outcome = match ob.policy_name.as_str() {
                "adapters.v1" => adapters_v1(ob, &draft, &facts, registry),
                "defaultSources.v1" => default_sources_v1(ob, &draft, registry),
                "payloadAnchor.v1" => payload_anchor_v1(ob),
                _ => PolicyOutcome::Null,
            };
            match outcome {
                PolicyOutcome::Plan(plan) => {
                    if let ElaborationPlan::SpliceAnchor { edge } = &plan {
                        iteration_diagnostics.push(payload_anchor_warning(*edge));
                    }
                    plans.push(plan);
                    statuses.insert(ob.id.clone(), ObligationStatus::Discharged);
                }
                PolicyOutcome::Blocked(d) => {
                    iteration_diagnostics.push(d);
                    statuses.insert(ob.id.clone(), ObligationStatus::Blocked);
                }
                PolicyOutcome::Null => {}
            }
        }

        if !statuses.is_empty() {
            for ob in draft.obligations.iter_mut() {
                if let Some(s) = statuses.get(&ob.id) {
                    ob.status = *s;
                }
            }
        }

        if plans.is_empty() && !added_new {
            diagnostics.extend(iteration_diagnostics);
            diagnostics.extend(solve_errors.iter().map(|e| pu_error_to_diagnostic(e, config)));
            let strict = try_finalize_strict(&draft, &facts);
            return FixpointOutcome {
                draft,
                facts,
                strict,
                diagnostics,
                iterations: i + 1,
            };
        }

        diagnostics.extend(iteration_diagnostics);
        for plan in &plans {
            draft = apply_plan(&draft, plan);
        }
    }

    diagnostics.push(Diagnostic::new(
        DiagnosticCode::NonConvergence,
        format!("fixpoint did not converge within {} iterations", config.max_iterations),
    ));
    FixpointOutcome {
        draft,
        facts,
        strict: None,
        diagnostics,
        iterations: config.max_iterations,
    }
}
