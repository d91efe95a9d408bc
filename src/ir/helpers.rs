//! Cardinality-aware helpers block authors use inside their own `lower`
//! implementations: `alignInputs`, `zipAuto`, `mapAuto` from §4.10.

use super::builder::IrBuilder;
use super::lower::LoweringError;
use super::{OpRef, ValueExprId};
use crate::canonical::CanonicalType;
use crate::extent::Cardinality;

fn cardinality_of(ty: &CanonicalType) -> Option<Cardinality> {
    ty.extent.cardinality.instantiated().copied()
}

fn is_many(ty: &CanonicalType) -> bool {
    cardinality_of(ty) == Some(Cardinality::Many)
}

/// Aligns two inputs of possibly-different cardinality into a shape
/// `outType` can be produced from: signal+signal and field+field pass
/// through unchanged (field+field additionally requires the same instance
/// domain); one signal + one field broadcasts the signal up to the field's
/// extent. Mismatched field domains fail.
pub fn align_inputs(
    a: ValueExprId,
    a_type: &CanonicalType,
    b: ValueExprId,
    b_type: &CanonicalType,
    out_type: &CanonicalType,
    builder: &mut IrBuilder,
) -> Result<(ValueExprId, ValueExprId), LoweringError> {
    match (is_many(a_type), is_many(b_type)) {
        (false, false) => Ok((a, b)),
        (true, true) => {
            if a_type.extent.many_instance != b_type.extent.many_instance {
                return Err(LoweringError::MismatchedFieldDomains);
            }
            Ok((a, b))
        }
        (true, false) => {
            let b_lifted = builder.broadcast(b, out_type.clone());
            Ok((a, b_lifted))
        }
        (false, true) => {
            let a_lifted = builder.broadcast(a, out_type.clone());
            Ok((a_lifted, b))
        }
    }
}

/// Selects `kernelZip`, `kernelZipSig`, or broadcast-then-zip depending on
/// how many of `inputs` are `many`-cardinality.
pub fn zip_auto(
    inputs: &[(ValueExprId, CanonicalType)],
    op: OpRef,
    out_type: CanonicalType,
    builder: &mut IrBuilder,
) -> ValueExprId {
    let many_count = inputs.iter().filter(|(_, t)| is_many(t)).count();

    if !is_many(&out_type) {
        let ids = inputs.iter().map(|(id, _)| *id).collect();
        return builder.kernel_zip(ids, op, out_type);
    }

    if many_count == inputs.len() {
        let ids = inputs.iter().map(|(id, _)| *id).collect();
        return builder.kernel_zip(ids, op, out_type);
    }

    if many_count == 1 {
        let field = inputs.iter().find(|(_, t)| is_many(t)).unwrap().0;
        let signals = inputs
            .iter()
            .filter(|(_, t)| !is_many(t))
            .map(|(id, _)| *id)
            .collect();
        return builder.kernel_zip_sig(field, signals, op, out_type);
    }

    // Multiple `many` inputs alongside signals: broadcast the signals to
    // the field extent, then zip everything as fields.
    let ids = inputs
        .iter()
        .map(|(id, t)| {
            if is_many(t) {
                *id
            } else {
                builder.broadcast(*id, out_type.clone())
            }
        })
        .collect();
    builder.kernel_zip(ids, op, out_type)
}

/// `kernelMap` over whatever cardinality the input carries; no branching
/// needed since `kernelMap` is itself cardinality-agnostic.
pub fn map_auto(
    input: ValueExprId,
    op: OpRef,
    out_type: CanonicalType,
    builder: &mut IrBuilder,
) -> ValueExprId {
    builder.kernel_map(input, op, out_type)
}
