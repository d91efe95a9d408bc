//! `patchgraph-core`: the graph normalization and type inference pipeline
//! for a visual dataflow programming environment.
//!
//! Out of scope (owned by other crates/processes): editor UI, block
//! registry *contents*, IR execution/rendering, persistence, settings.
//! This crate is a pure, synchronous library — no network, no filesystem
//! access, no global mutable state beyond a read-only registry the caller
//! constructs once.
//!
//! The entry point is [`compile`].

pub mod axis_solver;
pub mod canonical;
pub mod config;
pub mod constraints;
pub mod diagnostics;
pub mod draft;
pub mod extent;
pub mod facts;
pub mod fixpoint;
pub mod inference;
pub mod ir;
pub mod obligations;
pub mod payload;
pub mod policies;
pub mod registry;
pub mod solver;
pub mod unit;
pub mod vars;

use diagnostics::Diagnostic;
use draft::DraftGraph;
use facts::FactSet;
use registry::BlockRegistry;

/// What one `compile` call produced.
#[derive(Debug)]
pub enum CompileOutcome {
    /// The fixpoint converged to a strict typed graph and lowering
    /// succeeded.
    Compiled(Box<ir::CompiledIr>),
    /// The fixpoint converged but lowering itself failed on a gross
    /// internal-invariant violation (§7: "unknown payload kind, malformed
    /// edge referring to nonexistent port").
    LoweringFailed(ir::LoweringError),
    /// The fixpoint did not converge to a strict graph within
    /// `config.max_iterations`, or converged with open/blocked
    /// obligations still outstanding. `draft`/`facts` reflect the last
    /// iteration, for the editor to render diagnostics against.
    Incomplete {
        draft: Box<DraftGraph>,
        facts: Box<FactSet>,
    },
}

/// Normalizes `draft` against `registry` under `config`, then lowers the
/// result to IR if normalization converged. Never panics on user-data
/// shaped input; every failure mode surfaces as a [`Diagnostic`].
pub fn compile(
    draft: &DraftGraph,
    registry: &BlockRegistry,
    config: &config::NormalizeConfig,
) -> (CompileOutcome, Vec<Diagnostic>) {
    let outcome = fixpoint::run_fixpoint(draft, registry, config);

    match outcome.strict {
        Some(strict) => match ir::lower_strict_graph(&strict, registry, config) {
            Ok(compiled) => (CompileOutcome::Compiled(Box::new(compiled)), outcome.diagnostics),
            Err(e) => (CompileOutcome::LoweringFailed(e), outcome.diagnostics),
        },
        None => (
            CompileOutcome::Incomplete {
                draft: Box::new(outcome.draft),
                facts: Box::new(outcome.facts),
            },
            outcome.diagnostics,
        ),
    }
}
