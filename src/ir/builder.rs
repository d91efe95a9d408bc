//! Append-only arena for [`ValueExpr`] nodes. Unlike Cranelift's mutable
//! `Function`, a single `lower` call never revisits an earlier
//! instruction, so the builder exposes a cursor-free, push-only API.

use super::{OpRef, ValueExpr, ValueExprId};
use crate::canonical::CanonicalType;
use crate::draft::ConstValue;
use cranelift_entity::PrimaryMap;

#[derive(Default, Debug)]
pub struct IrBuilder {
    exprs: PrimaryMap<ValueExprId, ValueExpr>,
}

impl IrBuilder {
    pub fn new() -> Self {
        IrBuilder::default()
    }

    fn push(&mut self, expr: ValueExpr) -> ValueExprId {
        self.exprs.push(expr)
    }

    pub fn constant(&mut self, value: ConstValue, ty: CanonicalType) -> ValueExprId {
        self.push(ValueExpr::Constant { value, ty })
    }

    pub fn opcode(&mut self, op: OpRef, args: Vec<ValueExprId>, ty: CanonicalType) -> ValueExprId {
        self.push(ValueExpr::Opcode { op, args, ty })
    }

    pub fn kernel_map(&mut self, input: ValueExprId, op: OpRef, out_type: CanonicalType) -> ValueExprId {
        self.push(ValueExpr::KernelMap { input, op, out_type })
    }

    pub fn kernel_zip(
        &mut self,
        inputs: Vec<ValueExprId>,
        op: OpRef,
        out_type: CanonicalType,
    ) -> ValueExprId {
        self.push(ValueExpr::KernelZip { inputs, op, out_type })
    }

    pub fn kernel_zip_sig(
        &mut self,
        field: ValueExprId,
        signals: Vec<ValueExprId>,
        op: OpRef,
        out_type: CanonicalType,
    ) -> ValueExprId {
        self.push(ValueExpr::KernelZipSig {
            field,
            signals,
            op,
            out_type,
        })
    }

    pub fn broadcast(&mut self, signal: ValueExprId, field_type: CanonicalType) -> ValueExprId {
        self.push(ValueExpr::Broadcast { signal, field_type })
    }

    pub fn construct(&mut self, components: Vec<ValueExprId>, vec_type: CanonicalType) -> ValueExprId {
        self.push(ValueExpr::Construct { components, vec_type })
    }

    pub fn extract(&mut self, input: ValueExprId, index: u32, scalar_type: CanonicalType) -> ValueExprId {
        self.push(ValueExpr::Extract {
            input,
            index,
            scalar_type,
        })
    }

    pub fn shape_ref(
        &mut self,
        topology_id: impl Into<String>,
        params: Vec<ValueExprId>,
        out_type: CanonicalType,
        control_points: Option<ValueExprId>,
    ) -> ValueExprId {
        self.push(ValueExpr::ShapeRef {
            topology_id: topology_id.into(),
            params,
            out_type,
            control_points,
        })
    }

    pub fn state_read(&mut self, state_key: impl Into<String>, ty: CanonicalType) -> ValueExprId {
        self.push(ValueExpr::StateRead {
            state_key: state_key.into(),
            ty,
        })
    }

    pub fn event_read(&mut self, event_key: impl Into<String>, ty: CanonicalType) -> ValueExprId {
        self.push(ValueExpr::EventRead {
            event_key: event_key.into(),
            ty,
        })
    }

    pub fn event_pulse(&mut self, input: ValueExprId, ty: CanonicalType) -> ValueExprId {
        self.push(ValueExpr::EventPulse { input, ty })
    }

    pub fn path_derivative(&mut self, input: ValueExprId, order: u32, ty: CanonicalType) -> ValueExprId {
        self.push(ValueExpr::PathDerivative { input, order, ty })
    }

    pub fn intrinsic(&mut self, name: impl Into<String>, args: Vec<ValueExprId>, ty: CanonicalType) -> ValueExprId {
        self.push(ValueExpr::Intrinsic {
            name: name.into(),
            args,
            ty,
        })
    }

    pub fn sig_time(&mut self, ty: CanonicalType) -> ValueExprId {
        self.push(ValueExpr::SigTime { ty })
    }

    pub fn get(&self, id: ValueExprId) -> &ValueExpr {
        &self.exprs[id]
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }
}
