//! Topological lowering driver: walks a converged, strictly-typed graph in
//! dependency order (readers after writers — stateful blocks close cycles
//! through state keys, never through edges) and invokes each block's
//! `lower`.

use super::builder::IrBuilder;
use super::{
    BlockInstanceId, CompiledIr, InstanceContext, LowerCtx, LoweredInput, LoweredOutput, ValueExprId,
};
use crate::canonical::CanonicalType;
use crate::draft::{BlockId, CombineMode, ConstValue, PortId, PortRef};
use crate::fixpoint::StrictTypedGraph;
use crate::ir::OpRef;
use crate::registry::BlockRegistry;
use core::fmt;
use rustc_hash::FxHashMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoweringError {
    MismatchedFieldDomains,
    MissingRequiredInput { block: BlockId, port: PortId },
    UnknownBlockType(String),
    CycleDetected,
}

impl fmt::Display for LoweringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoweringError::MismatchedFieldDomains => write!(f, "cannot align two fields over different instance domains"),
            LoweringError::MissingRequiredInput { block, port } => {
                write!(f, "block {block} is missing required input `{port}`")
            }
            LoweringError::UnknownBlockType(t) => write!(f, "unknown block type `{t}` during lowering"),
            LoweringError::CycleDetected => write!(f, "edge-induced cycle detected during lowering"),
        }
    }
}

impl std::error::Error for LoweringError {}

fn combine_op(mode: &CombineMode) -> Option<OpRef> {
    match mode {
        CombineMode::Last | CombineMode::First => None,
        CombineMode::Sum => Some(OpRef::new("add")),
        CombineMode::Mult => Some(OpRef::new("mul")),
        CombineMode::Custom(name) => Some(OpRef::new(name.clone())),
    }
}

/// Kahn's algorithm over the block dependency graph induced by edges:
/// `tgt.block` depends on `src.block`.
fn topological_block_order(graph: &StrictTypedGraph) -> Result<Vec<BlockId>, LoweringError> {
    let draft = &graph.draft;
    let mut in_degree: FxHashMap<BlockId, usize> = FxHashMap::default();
    let mut dependents: FxHashMap<BlockId, Vec<BlockId>> = FxHashMap::default();

    for block in draft.blocks_sorted() {
        in_degree.entry(block.id).or_insert(0);
    }
    for edge in draft.edges_sorted() {
        if edge.from.block == edge.to.block {
            continue;
        }
        *in_degree.entry(edge.to.block).or_insert(0) += 1;
        dependents.entry(edge.from.block).or_default().push(edge.to.block);
    }

    let mut frontier: Vec<BlockId> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(id, _)| *id)
        .collect();
    frontier.sort();

    let mut order = Vec::with_capacity(in_degree.len());
    while !frontier.is_empty() {
        let id = frontier.remove(0);
        order.push(id);
        if let Some(next) = dependents.get(&id) {
            for &n in next {
                let d = in_degree.get_mut(&n).unwrap();
                *d -= 1;
                if *d == 0 {
                    let pos = frontier.binary_search(&n).unwrap_or_else(|p| p);
                    frontier.insert(pos, n);
                }
            }
        }
    }

    if order.len() != in_degree.len() {
        return Err(LoweringError::CycleDetected);
    }
    Ok(order)
}

/// Reduce every edge feeding `port`, in `sortKey` order, via the target
/// block's configured combine mode.
fn resolve_input(
    graph: &StrictTypedGraph,
    port: &PortRef,
    combine_mode: &CombineMode,
    outputs: &FxHashMap<PortRef, LoweredOutput>,
    builder: &mut IrBuilder,
) -> Option<LoweredInput> {
    let edges = graph.draft.edges_into(port);
    if edges.is_empty() {
        return None;
    }
    let ty = graph.port_types.get(port)?.clone();

    let mut values: Vec<ValueExprId> = Vec::with_capacity(edges.len());
    for e in &edges {
        let out = outputs.get(&e.from)?;
        values.push(out.id);
    }

    let stride = crate::payload::payload_stride(ty.payload) as u32;

    if values.len() == 1 {
        return Some(LoweredInput {
            expr: values[0],
            ty,
            stride,
        });
    }

    match combine_mode {
        CombineMode::First => Some(LoweredInput {
            expr: values[0],
            ty,
            stride,
        }),
        CombineMode::Last => Some(LoweredInput {
            expr: *values.last().unwrap(),
            ty,
            stride,
        }),
        other => {
            let op = combine_op(other).unwrap_or_else(|| OpRef::new("add"));
            let mut acc = values[0];
            for &v in &values[1..] {
                acc = builder.kernel_zip(vec![acc, v], op.clone(), ty.clone());
            }
            Some(LoweredInput {
                expr: acc,
                ty,
                stride,
            })
        }
    }
}

/// Walk blocks in dependency order, calling each one's `lower` and
/// threading results into a single shared arena.
pub fn lower_strict_graph(
    graph: &StrictTypedGraph,
    registry: &BlockRegistry,
    config: &crate::config::NormalizeConfig,
) -> Result<CompiledIr, LoweringError> {
    let order = topological_block_order(graph)?;
    let mut builder = IrBuilder::new();
    let mut outputs: FxHashMap<PortRef, LoweredOutput> = FxHashMap::default();
    let mut compiled = CompiledIr::default();

    for (idx, block_id) in order.into_iter().enumerate() {
        let block = graph
            .draft
            .blocks
            .get(&block_id)
            .expect("topological order only contains live blocks");
        let def = registry
            .get(&block.block_type)
            .ok_or_else(|| LoweringError::UnknownBlockType(block.block_type.clone()))?;

        let mut inputs_by_id: FxHashMap<PortId, LoweredInput> = FxHashMap::default();
        for (port_id, input_def) in &def.inputs {
            let port_ref = PortRef::new(block_id, port_id.0.clone());
            let combine_mode = block.input_config(port_id).combine_mode;
            match resolve_input(graph, &port_ref, &combine_mode, &outputs, &mut builder) {
                Some(resolved) => {
                    inputs_by_id.insert(port_id.clone(), resolved);
                }
                None if input_def.exposed_as_port => {
                    return Err(LoweringError::MissingRequiredInput {
                        block: block_id,
                        port: port_id.clone(),
                    });
                }
                None => {}
            }
        }

        let mut out_types: FxHashMap<PortId, CanonicalType> = FxHashMap::default();
        for port_id in def.outputs.keys() {
            let port_ref = PortRef::new(block_id, port_id.0.clone());
            if let Some(ty) = graph.port_types.get(&port_ref) {
                out_types.insert(port_id.clone(), ty.clone());
            }
        }

        let mut ctx = LowerCtx {
            b: &mut builder,
            out_types,
            instance_id: BlockInstanceId::new(idx),
            inferred_instance: None,
            address_registry: None,
        };

        let result = (def.lower)(&mut ctx, &inputs_by_id, config);

        for (port_id, out) in result.outputs_by_id {
            outputs.insert(PortRef::new(block_id, port_id.0.clone()), out);
        }
        compiled.slot_requests.extend(result.effects.slot_requests);
        compiled.state_decls.extend(result.effects.state_decls);
        compiled.step_requests.extend(result.effects.step_requests);
        if let Some(ctx) = result.effects.instance_context {
            compiled.instance_contexts.insert(block_id, ctx);
        }
    }

    compiled.builder = builder;
    compiled.outputs = outputs;
    Ok(compiled)
}

impl Default for InstanceContext {
    fn default() -> Self {
        InstanceContext {
            instance: crate::extent::InstanceRef {
                domain_type_id: crate::extent::DomainTypeId::new(""),
                instance_id: crate::extent::InstanceId::new(0),
            },
        }
    }
}
