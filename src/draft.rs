//! The draft graph: the mutable authoring model blocks and edges live in
//! while the fixpoint (`fixpoint.rs`) elaborates them. Values here are
//! immutable in the functional sense — every mutation returns a new
//! `DraftGraph` rather than mutating in place, matching §4.3.

use crate::obligations::Obligation;
use cranelift_entity::entity_impl;
use rustc_hash::FxHashMap;
use std::fmt;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct BlockId(u32);
entity_impl!(BlockId, "block");

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct EdgeId(u32);
entity_impl!(EdgeId, "edge");

/// A port name on a block. Ports are named strings rather than another
/// dense entity, since a block's port set is fixed at registry-definition
/// time (`BlockDefinition::inputs`/`outputs`) and read by name from UI code
/// this crate never sees.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct PortId(pub String);

impl PortId {
    pub fn new(s: impl Into<String>) -> Self {
        PortId(s.into())
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A `(blockId, portId)` pair — identifies one endpoint of an edge or a
/// port to operate on.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct PortRef {
    pub block: BlockId,
    pub port: PortId,
}

impl PortRef {
    pub fn new(block: BlockId, port: impl Into<String>) -> Self {
        PortRef {
            block,
            port: PortId::new(port),
        }
    }

    /// The dotted key the solver/facts modules use to address this port,
    /// e.g. `block3.in`.
    pub fn key(&self) -> String {
        format!("{}.{}", self.block, self.port)
    }
}

/// Reduction applied when more than one edge targets the same input port.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum CombineMode {
    Last,
    First,
    Sum,
    Mult,
    /// Escape hatch for registry-defined combine modes this core doesn't
    /// need to understand the semantics of (it only needs to know one was
    /// chosen; lowering of the reduction itself is the block's `lower`'s
    /// problem).
    Custom(String),
}

impl Default for CombineMode {
    fn default() -> Self {
        CombineMode::Last
    }
}

/// A concrete constant value usable as a synthesized default source. Mirrors
/// `PayloadType`'s shapes one-for-one.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum ConstValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Vec2([f64; 2]),
    Vec3([f64; 3]),
    Color([f64; 4]),
}

/// The declared default source for an unconnected input port: either an
/// inline constant, or a reference to a well-known singleton output (e.g.
/// `TimeRoot.phaseA`).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum DefaultSource {
    Const(ConstValue),
    BlockOutput {
        block_type: String,
        output_port: PortId,
    },
}

/// A value-shaping block the user placed on an edge. Lenses are never
/// auto-inserted by policies — only the user's own editor actions create
/// them; this core treats them as opaque extra blocks spliced into the
/// draft, the same as any other block.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Lens {
    pub block_type: String,
    pub params: ParamsMap,
}

/// A free-form parameter value. The narrow escape hatch for `block.params`;
/// validated per-block at the boundary of `lower`, never interpreted by the
/// core itself.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    String(String),
    List(Vec<ParamValue>),
}

pub type ParamsMap = FxHashMap<String, ParamValue>;

/// Per-input-port configuration an instance may override.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct InputPortConfig {
    pub default_source_override: Option<DefaultSource>,
    pub combine_mode: CombineMode,
    pub lenses: Vec<Lens>,
}

/// A node in the draft graph.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Block {
    pub id: BlockId,
    pub block_type: String,
    pub display_name: Option<String>,
    pub params: ParamsMap,
    pub input_configs: FxHashMap<PortId, InputPortConfig>,
    pub domain_id: Option<String>,
    pub role: Option<String>,
}

impl Block {
    pub fn new(id: BlockId, block_type: impl Into<String>) -> Self {
        Block {
            id,
            block_type: block_type.into(),
            display_name: None,
            params: ParamsMap::default(),
            input_configs: FxHashMap::default(),
            domain_id: None,
            role: None,
        }
    }

    pub fn input_config(&self, port: &PortId) -> InputPortConfig {
        self.input_configs.get(port).cloned().unwrap_or_default()
    }
}

/// A directed connection from an output port to an input port.
///
/// Invariant: output ports have unbounded out-degree; input-port multi-edges
/// are reduced by the target block's combine mode; `sort_key` totally
/// orders edges feeding the same input port.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Edge {
    pub id: EdgeId,
    pub from: PortRef,
    pub to: PortRef,
    pub sort_key: u32,
}

/// The authoring-time graph: `(blocks, edges, obligations)`.
#[derive(Clone, Debug, Default)]
pub struct DraftGraph {
    pub blocks: FxHashMap<BlockId, Block>,
    pub edges: FxHashMap<EdgeId, Edge>,
    pub obligations: Vec<Obligation>,
    next_block: u32,
    next_edge: u32,
}

impl DraftGraph {
    pub fn new() -> Self {
        DraftGraph::default()
    }

    /// Ordered blocks, for deterministic iteration ("ids incorporate stable
    /// keys" — see §5 "Ordering guarantees").
    pub fn blocks_sorted(&self) -> Vec<&Block> {
        let mut v: Vec<&Block> = self.blocks.values().collect();
        v.sort_by_key(|b| b.id);
        v
    }

    pub fn edges_sorted(&self) -> Vec<&Edge> {
        let mut v: Vec<&Edge> = self.edges.values().collect();
        v.sort_by_key(|e| e.id);
        v
    }

    /// Edges targeting a given input port, ordered by `sort_key`.
    pub fn edges_into(&self, port: &PortRef) -> Vec<&Edge> {
        let mut v: Vec<&Edge> = self.edges.values().filter(|e| &e.to == port).collect();
        v.sort_by_key(|e| (e.sort_key, e.id));
        v
    }

    pub fn edges_from(&self, port: &PortRef) -> Vec<&Edge> {
        let mut v: Vec<&Edge> = self.edges.values().filter(|e| &e.from == port).collect();
        v.sort_by_key(|e| e.id);
        v
    }

    /// Add a block of the given type, returning the extended draft and the
    /// fresh id.
    pub fn add_block(&self, block_type: impl Into<String>) -> (DraftGraph, BlockId) {
        let mut next = self.clone();
        let id = BlockId::new(next.next_block as usize);
        next.next_block += 1;
        next.blocks.insert(id, Block::new(id, block_type));
        (next, id)
    }

    pub fn with_block(&self, block: Block) -> DraftGraph {
        let mut next = self.clone();
        next.next_block = next.next_block.max(block.id.index() as u32 + 1);
        next.blocks.insert(block.id, block);
        next
    }

    /// `addEdge(from, to)` with an optional `sortKey`; defaults to one past
    /// the highest existing sort key into that input port.
    pub fn add_edge(&self, from: PortRef, to: PortRef, sort_key: Option<u32>) -> (DraftGraph, EdgeId) {
        let mut next = self.clone();
        let id = EdgeId::new(next.next_edge as usize);
        next.next_edge += 1;
        let sort_key = sort_key.unwrap_or_else(|| {
            self.edges_into(&to)
                .last()
                .map(|e| e.sort_key + 1)
                .unwrap_or(0)
        });
        next.edges.insert(
            id,
            Edge {
                id,
                from,
                to,
                sort_key,
            },
        );
        (next, id)
    }

    /// `removeEdge(edgeId)`.
    pub fn remove_edge(&self, edge_id: EdgeId) -> DraftGraph {
        let mut next = self.clone();
        next.edges.remove(&edge_id);
        next
    }

    /// `insertAdapterBetween(edge, adapterBlockType)` — splices a new block
    /// onto an existing edge, rewriting it into two edges:
    /// `src -> adapter.in` and `adapter.out -> tgt`.
    pub fn insert_adapter_between(
        &self,
        edge_id: EdgeId,
        adapter_block_type: impl Into<String>,
        adapter_in_port: impl Into<String>,
        adapter_out_port: impl Into<String>,
    ) -> Option<(DraftGraph, BlockId, EdgeId, EdgeId)> {
        let edge = self.edges.get(&edge_id)?.clone();
        let (next, adapter_id) = self.add_block(adapter_block_type);
        let next = next.remove_edge(edge_id);
        let (next, in_edge) = next.add_edge(
            edge.from.clone(),
            PortRef::new(adapter_id, adapter_in_port),
            Some(edge.sort_key),
        );
        let (next, out_edge) = next.add_edge(
            PortRef::new(adapter_id, adapter_out_port),
            edge.to.clone(),
            Some(edge.sort_key),
        );
        Some((next, adapter_id, in_edge, out_edge))
    }

    /// `attachDefaultSource(port, source)` — records a default-source
    /// override on the target block's input-port config.
    pub fn attach_default_source(&self, port: &PortRef, source: DefaultSource) -> DraftGraph {
        let mut next = self.clone();
        if let Some(block) = next.blocks.get_mut(&port.block) {
            let cfg = block.input_configs.entry(port.port.clone()).or_default();
            cfg.default_source_override = Some(source);
        }
        next
    }

    /// `synthesizeDefaultSource(port, source)` — materializes a declared
    /// default as a real block and edge feeding `port`, on top of recording
    /// the override the same way `attach_default_source` does. Mirrors
    /// `insert_adapter_between`'s splice shape rather than mutating `port`
    /// in place:
    ///
    /// - `Const(value)` splices a fresh instance of `const_source_block_type`
    ///   carrying `value` in `params["value"]`.
    /// - `BlockOutput { block_type, output_port }` reuses the first existing
    ///   instance of `block_type` already in the draft, or splices a new one
    ///   if none exists, and wires its `output_port`.
    pub fn synthesize_default_source(
        &self,
        port: &PortRef,
        source: &DefaultSource,
        const_source_block_type: impl Into<String>,
    ) -> (DraftGraph, EdgeId) {
        let next = self.attach_default_source(port, source.clone());
        let (next, from) = match source {
            DefaultSource::Const(value) => {
                let (next, block_id) = next.add_block(const_source_block_type);
                let mut block = next.blocks[&block_id].clone();
                block.params.insert("value".to_string(), const_value_to_param(value));
                let next = next.with_block(block);
                (next, PortRef::new(block_id, "out"))
            }
            DefaultSource::BlockOutput { block_type, output_port } => {
                let existing = next
                    .blocks_sorted()
                    .iter()
                    .find(|b| &b.block_type == block_type)
                    .map(|b| b.id);
                let (next, block_id) = match existing {
                    Some(id) => (next.clone(), id),
                    None => next.add_block(block_type.clone()),
                };
                (next, PortRef::new(block_id, output_port.clone()))
            }
        };
        next.add_edge(from, port.clone(), None)
    }
}

fn const_value_to_param(value: &ConstValue) -> ParamValue {
    match value {
        ConstValue::Float(f) => ParamValue::Float(*f),
        ConstValue::Int(i) => ParamValue::Int(*i),
        ConstValue::Bool(b) => ParamValue::Bool(*b),
        ConstValue::Vec2(xs) => ParamValue::List(xs.iter().map(|x| ParamValue::Float(*x)).collect()),
        ConstValue::Vec3(xs) => ParamValue::List(xs.iter().map(|x| ParamValue::Float(*x)).collect()),
        ConstValue::Color(xs) => ParamValue::List(xs.iter().map(|x| ParamValue::Float(*x)).collect()),
    }
}
