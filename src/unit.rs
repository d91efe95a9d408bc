//! Unit kinds: the semantic annotation layered on top of a payload.

use crate::payload::PayloadType;
use core::fmt;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// Sub-kind of an [`UnitType::Angle`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum AngleUnit {
    Radians,
    Degrees,
    /// A value in `[0, 1)` representing a full turn. This is the single
    /// canonical "phase" unit — see DESIGN.md for why the source
    /// repository's duplicate `phase01`/`turns` adapters collapse to this
    /// one kind here.
    Phase01,
}

/// Sub-kind of an [`UnitType::Time`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum TimeUnit {
    Ms,
    Seconds,
}

/// Sub-kind of an [`UnitType::Space`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum SpaceUnit {
    Ndc,
    World,
    View,
}

/// A closed tagged union with eight top-level kinds (`space`/`angle`/`time`
/// carry a nested sub-kind).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum UnitType {
    None,
    Scalar,
    Norm01,
    Count,
    Angle { unit: AngleUnit },
    Time { unit: TimeUnit },
    /// `dims` is 2 or 3; enforced by `isValidPayloadUnit` rather than by the
    /// type itself, to keep the representation a plain total-sized enum.
    Space { unit: SpaceUnit, dims: u8 },
    /// The only admissible color unit is `rgba01`; kept as a unit struct
    /// variant (rather than a nested sub-kind enum) since there is exactly
    /// one fixed member.
    Color,
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitType::None => write!(f, "none"),
            UnitType::Scalar => write!(f, "scalar"),
            UnitType::Norm01 => write!(f, "norm01"),
            UnitType::Count => write!(f, "count"),
            UnitType::Angle { unit } => write!(f, "angle<{unit:?}>"),
            UnitType::Time { unit } => write!(f, "time<{unit:?}>"),
            UnitType::Space { unit, dims } => write!(f, "space<{unit:?},{dims}>"),
            UnitType::Color => write!(f, "color<rgba01>"),
        }
    }
}

/// Structural equality, recursing into the nested `unit`/`dims` fields of
/// `angle`/`time`/`space`. `UnitType` already derives `PartialEq`
/// structurally, so this is a thin, spec-named alias kept for symmetry with
/// `payloads_equal`.
pub fn units_equal(a: &UnitType, b: &UnitType) -> bool {
    a == b
}

/// `isValidPayloadUnit(payload, unit)` — the `ALLOWED_UNITS[payload]` table
/// from §3. Violations are rejected at construction time by
/// `canonical::canonical_type` and `inference::InferenceCanonicalType`'s
/// constructors.
pub fn is_valid_payload_unit(payload: PayloadType, unit: &UnitType) -> bool {
    use PayloadType::*;
    use UnitType::*;
    match (payload, unit) {
        (Float, None) => true,
        (Float, Scalar) => true,
        (Float, Norm01) => true,
        (Float, Count) => true,
        (Float, Angle { .. }) => true,
        (Float, Time { .. }) => true,
        (Int, None) => true,
        (Int, Scalar) => true,
        (Int, Count) => true,
        (Bool, None) => true,
        (Vec2, None) => true,
        (Vec2, Space { dims: 2, .. }) => true,
        (Vec3, None) => true,
        (Vec3, Space { dims: 3, .. }) => true,
        (Color, UnitType::Color) => true,
        (CameraProjection, None) => true,
        _ => false,
    }
}

/// The default unit derived from a payload alone, used by
/// `canonical::canonical_type` when the caller doesn't specify one.
pub fn default_unit_for(payload: PayloadType) -> UnitType {
    match payload {
        PayloadType::Vec2 => UnitType::Space {
            unit: SpaceUnit::Ndc,
            dims: 2,
        },
        PayloadType::Vec3 => UnitType::Space {
            unit: SpaceUnit::Ndc,
            dims: 3,
        },
        PayloadType::Color => UnitType::Color,
        _ => UnitType::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_always_valid() {
        for p in PayloadType::ALL {
            let u = default_unit_for(p);
            assert!(
                is_valid_payload_unit(p, &u),
                "default unit for {p} ({u}) must be valid"
            );
        }
    }

    #[test]
    fn color_payload_rejects_angle_unit() {
        assert!(!is_valid_payload_unit(
            PayloadType::Color,
            &UnitType::Angle {
                unit: AngleUnit::Radians
            }
        ));
    }

    #[test]
    fn vec_space_dims_must_match_arity() {
        assert!(!is_valid_payload_unit(
            PayloadType::Vec2,
            &UnitType::Space {
                unit: SpaceUnit::Ndc,
                dims: 3
            }
        ));
    }

    #[test]
    fn units_equal_recurses_into_nested_kind() {
        let a = UnitType::Angle {
            unit: AngleUnit::Radians,
        };
        let b = UnitType::Angle {
            unit: AngleUnit::Degrees,
        };
        assert!(!units_equal(&a, &b));
        assert!(units_equal(&a, &a.clone()));
    }
}
