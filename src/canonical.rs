//! `CanonicalType` — the fully resolved value type handed to lowering.
//! Never contains variables; this is the "canonical-world" side of the
//! border `inference::finalize_inference_type` crosses.

use crate::extent::Extent;
use crate::payload::PayloadType;
use crate::unit::{default_unit_for, is_valid_payload_unit, units_equal, UnitType};
use core::fmt;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// Invariants the producer of a value promises the consumer. Declared,
/// never inferred — nothing in this crate derives a contract from a
/// computation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum ValueContract {
    Clamp01,
    Clamp11,
    Wrap01,
}

/// `(payload, unit, extent, optional contract)`, fully resolved.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct CanonicalType {
    pub payload: PayloadType,
    pub unit: UnitType,
    pub extent: Extent,
    pub contract: Option<ValueContract>,
}

/// Thrown when a `CanonicalType` cannot legally be constructed: a gross
/// invariant violation, not user-data shaped, so it is a plain error rather
/// than a `Diagnostic`. See §7: "only gross violations of internal
/// invariants ... are treated as fatal."
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeError {
    /// `(payload, unit)` fails `isValidPayloadUnit`.
    InvalidPayloadUnit { payload: PayloadType, unit: UnitType },
    /// `requireInst` was called on an axis that is still a variable.
    UnresolvedAxis { axis: &'static str },
    /// `finalizeInferenceType` was asked to finalize a type whose payload
    /// variable has no entry in the substitution.
    UnresolvedPayload,
    /// Same, for the unit variable.
    UnresolvedUnit,
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::InvalidPayloadUnit { payload, unit } => {
                write!(f, "invalid payload/unit pairing: {payload} with {unit}")
            }
            TypeError::UnresolvedAxis { axis } => {
                write!(f, "axis `{axis}` is still a variable, expected an instantiated value")
            }
            TypeError::UnresolvedPayload => write!(f, "payload variable has no resolution in the substitution"),
            TypeError::UnresolvedUnit => write!(f, "unit variable has no resolution in the substitution"),
        }
    }
}

impl std::error::Error for TypeError {}

/// `canonicalType(payload, unit?, extentOverrides?, contract?)`. Defaults:
/// unit is derived from payload, extent is `Extent::default_extent()`.
pub fn canonical_type(
    payload: PayloadType,
    unit: Option<UnitType>,
    extent: Option<Extent>,
    contract: Option<ValueContract>,
) -> Result<CanonicalType, TypeError> {
    let unit = unit.unwrap_or_else(|| default_unit_for(payload));
    if !is_valid_payload_unit(payload, &unit) {
        return Err(TypeError::InvalidPayloadUnit { payload, unit });
    }
    Ok(CanonicalType {
        payload,
        unit,
        extent: extent.unwrap_or_else(Extent::default_extent),
        contract,
    })
}

/// `requireInst(axis, name)` — fails with a kind tag when the axis is a
/// variable. Implemented per-axis since each axis carries a distinct
/// instantiated type.
pub fn require_cardinality(
    extent: &Extent,
) -> Result<&crate::extent::Cardinality, TypeError> {
    extent
        .cardinality
        .instantiated()
        .ok_or(TypeError::UnresolvedAxis { axis: "cardinality" })
}

pub fn require_perspective(extent: &Extent) -> Result<&crate::extent::Perspective, TypeError> {
    extent
        .perspective
        .instantiated()
        .ok_or(TypeError::UnresolvedAxis { axis: "perspective" })
}

pub fn require_branch(extent: &Extent) -> Result<&crate::extent::Branch, TypeError> {
    extent
        .branch
        .instantiated()
        .ok_or(TypeError::UnresolvedAxis { axis: "branch" })
}

/// Deep structural equality; rejects (returns `false`) if any axis is still
/// a variable, since a `CanonicalType` that isn't fully resolved can never
/// compare equal to anything under this definition.
pub fn types_equal(a: &CanonicalType, b: &CanonicalType) -> bool {
    if !a.extent.is_fully_resolved() || !b.extent.is_fully_resolved() {
        return false;
    }
    a.payload == b.payload
        && units_equal(&a.unit, &b.unit)
        && a.extent == b.extent
        && a.contract == b.contract
}
