//! The IR: an SSA-like arena of value expressions plus side-effect
//! requests, built by a single `lower` invocation per block and consumed
//! by a downstream renderer this crate never sees.

pub mod builder;
pub mod helpers;
pub mod lower;

pub use builder::IrBuilder;
pub use lower::{lower_strict_graph, LoweringError};

use crate::canonical::CanonicalType;
use crate::draft::{ConstValue, PortId};
use crate::extent::InstanceRef;
use cranelift_entity::entity_impl;
use rustc_hash::FxHashMap;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct ValueExprId(u32);
entity_impl!(ValueExprId, "v");

/// A stable identity for one block instance during lowering, handed to
/// `lower` as `ctx.instance_id`. Distinct from [`crate::extent::InstanceId`],
/// which anchors a *field/perspective/branch domain* rather than a block.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct BlockInstanceId(u32);
entity_impl!(BlockInstanceId, "blockinst");

/// An opaque reference to a pure function the registry (out of scope)
/// knows how to execute. The core only ever threads this name through the
/// IR, never interprets it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct OpRef(pub String);

impl OpRef {
    pub fn new(s: impl Into<String>) -> Self {
        OpRef(s.into())
    }
}

/// One node in the value-expression arena.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum ValueExpr {
    Constant {
        value: ConstValue,
        ty: CanonicalType,
    },
    Opcode {
        op: OpRef,
        args: Vec<ValueExprId>,
        ty: CanonicalType,
    },
    KernelMap {
        input: ValueExprId,
        op: OpRef,
        out_type: CanonicalType,
    },
    KernelZip {
        inputs: Vec<ValueExprId>,
        op: OpRef,
        out_type: CanonicalType,
    },
    KernelZipSig {
        field: ValueExprId,
        signals: Vec<ValueExprId>,
        op: OpRef,
        out_type: CanonicalType,
    },
    Broadcast {
        signal: ValueExprId,
        field_type: CanonicalType,
    },
    Construct {
        components: Vec<ValueExprId>,
        vec_type: CanonicalType,
    },
    Extract {
        input: ValueExprId,
        index: u32,
        scalar_type: CanonicalType,
    },
    ShapeRef {
        topology_id: String,
        params: Vec<ValueExprId>,
        out_type: CanonicalType,
        control_points: Option<ValueExprId>,
    },
    StateRead {
        state_key: String,
        ty: CanonicalType,
    },
    EventRead {
        event_key: String,
        ty: CanonicalType,
    },
    EventPulse {
        input: ValueExprId,
        ty: CanonicalType,
    },
    PathDerivative {
        input: ValueExprId,
        order: u32,
        ty: CanonicalType,
    },
    Intrinsic {
        name: String,
        args: Vec<ValueExprId>,
        ty: CanonicalType,
    },
    SigTime {
        ty: CanonicalType,
    },
}

impl ValueExpr {
    /// The resolved output type this node produces.
    pub fn ty(&self) -> &CanonicalType {
        match self {
            ValueExpr::Constant { ty, .. }
            | ValueExpr::Opcode { ty, .. }
            | ValueExpr::StateRead { ty, .. }
            | ValueExpr::EventRead { ty, .. }
            | ValueExpr::EventPulse { ty, .. }
            | ValueExpr::PathDerivative { ty, .. }
            | ValueExpr::Intrinsic { ty, .. }
            | ValueExpr::SigTime { ty } => ty,
            ValueExpr::KernelMap { out_type, .. }
            | ValueExpr::KernelZip { out_type, .. }
            | ValueExpr::KernelZipSig { out_type, .. }
            | ValueExpr::ShapeRef { out_type, .. } => out_type,
            ValueExpr::Broadcast { field_type, .. } => field_type,
            ValueExpr::Construct { vec_type, .. } => vec_type,
            ValueExpr::Extract { scalar_type, .. } => scalar_type,
        }
    }
}

/// A request for the runtime to materialize an output value into a slot
/// addressable after lowering.
#[derive(Clone, Debug, PartialEq)]
pub struct SlotRequest {
    pub port: PortId,
    pub expr: ValueExprId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StateDecl {
    pub state_key: String,
    pub ty: CanonicalType,
    pub initial: Option<ConstValue>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StepRequest {
    pub state_key: String,
    pub write: ValueExprId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InstanceContext {
    pub instance: InstanceRef,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LowerEffects {
    pub slot_requests: Vec<SlotRequest>,
    pub state_decls: Vec<StateDecl>,
    pub step_requests: Vec<StepRequest>,
    pub instance_context: Option<InstanceContext>,
}

/// What `lower` resolved one output port to.
#[derive(Clone, Debug, PartialEq)]
pub struct LoweredOutput {
    pub id: ValueExprId,
    pub slot: Option<PortId>,
    pub ty: CanonicalType,
    pub stride: u32,
}

/// What one input port was wired to, handed into `lower` as the
/// `inputsById` map.
#[derive(Clone, Debug, PartialEq)]
pub struct LoweredInput {
    pub expr: ValueExprId,
    pub ty: CanonicalType,
    pub stride: u32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LowerResult {
    pub outputs_by_id: FxHashMap<PortId, LoweredOutput>,
    pub effects: LowerEffects,
}

/// The per-block context `lower` operates against.
pub struct LowerCtx<'a> {
    pub b: &'a mut IrBuilder,
    pub out_types: FxHashMap<PortId, CanonicalType>,
    pub instance_id: BlockInstanceId,
    pub inferred_instance: Option<InstanceRef>,
    /// Only populated for the (out-of-scope) Expression block; opaque to
    /// the core.
    pub address_registry: Option<FxHashMap<String, ValueExprId>>,
}

/// The whole-patch result of [`lower::lower_strict_graph`]: one shared
/// value-expression arena plus every block's accumulated side-effect
/// requests.
#[derive(Default, Debug)]
pub struct CompiledIr {
    pub builder: IrBuilder,
    pub outputs: FxHashMap<crate::draft::PortRef, LoweredOutput>,
    pub slot_requests: Vec<SlotRequest>,
    pub state_decls: Vec<StateDecl>,
    pub step_requests: Vec<StepRequest>,
    pub instance_contexts: FxHashMap<crate::draft::BlockId, InstanceContext>,
}
