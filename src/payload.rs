//! Payload kinds: the "what" of a value flowing through a patch.

use core::fmt;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// A concrete value shape. Closed tagged union — no subtyping, structural
/// equality via `PartialEq`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum PayloadType {
    Float,
    Int,
    Bool,
    Vec2,
    Vec3,
    Color,
    CameraProjection,
}

impl PayloadType {
    /// All payload kinds, in a stable, arbitrary order. Used by the solver
    /// when it needs to enumerate every kind (e.g. building an unconstrained
    /// allowed set for diagnostics).
    pub const ALL: [PayloadType; 7] = [
        PayloadType::Float,
        PayloadType::Int,
        PayloadType::Bool,
        PayloadType::Vec2,
        PayloadType::Vec3,
        PayloadType::Color,
        PayloadType::CameraProjection,
    ];
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PayloadType::Float => "float",
            PayloadType::Int => "int",
            PayloadType::Bool => "bool",
            PayloadType::Vec2 => "vec2",
            PayloadType::Vec3 => "vec3",
            PayloadType::Color => "color",
            PayloadType::CameraProjection => "cameraProjection",
        };
        f.write_str(s)
    }
}

/// `payloadStride` — a total function of kind. 1 for scalars, 2-4 for
/// vectors. `CameraProjection` is an opaque single-slot handle, not a
/// flattened matrix, so it carries stride 1 like the other scalars.
///
/// Exhaustive over `PayloadType`; there is no fallible path because every
/// variant has a defined stride.
pub fn payload_stride(payload: PayloadType) -> u8 {
    match payload {
        PayloadType::Float => 1,
        PayloadType::Int => 1,
        PayloadType::Bool => 1,
        PayloadType::Vec2 => 2,
        PayloadType::Vec3 => 3,
        PayloadType::Color => 4,
        PayloadType::CameraProjection => 1,
    }
}

/// Structural equality. `PayloadType` already derives `PartialEq`, but we
/// expose this so call sites read the same as `unitsEqual` and the spec's
/// `payloadsEqual`.
pub fn payloads_equal(a: PayloadType, b: PayloadType) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_is_exhaustive_and_in_range() {
        for p in PayloadType::ALL {
            let s = payload_stride(p);
            assert!((1..=4).contains(&s));
        }
    }

    #[test]
    fn scalars_have_stride_one() {
        assert_eq!(payload_stride(PayloadType::Float), 1);
        assert_eq!(payload_stride(PayloadType::Int), 1);
        assert_eq!(payload_stride(PayloadType::Bool), 1);
    }

    #[test]
    fn vectors_scale_with_arity() {
        assert_eq!(payload_stride(PayloadType::Vec2), 2);
        assert_eq!(payload_stride(PayloadType::Vec3), 3);
        assert_eq!(payload_stride(PayloadType::Color), 4);
    }

    #[test]
    fn camera_projection_is_a_single_opaque_slot() {
        assert_eq!(payload_stride(PayloadType::CameraProjection), 1);
    }

    #[test]
    fn payloads_equal_is_structural() {
        assert!(payloads_equal(PayloadType::Float, PayloadType::Float));
        assert!(!payloads_equal(PayloadType::Float, PayloadType::Int));
    }
}
