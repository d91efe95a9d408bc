//! The five-axis extent: cardinality, temporality, binding, perspective,
//! branch — the "where/when/who/which" of a value.

use cranelift_entity::entity_impl;
use core::fmt;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// An opaque handle to a runtime container over a domain (array, control
/// points, ...) that gives a `many` cardinality its identity. Minted by
/// `lower`'s `createInstance` calls; shares lifetime with the IR it anchors.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct InstanceId(u32);
entity_impl!(InstanceId, "instance");

/// Identifies the domain type a given [`InstanceId`] belongs to (e.g. the
/// block type that produced the array/control-point domain). Block registry
/// contents are out of scope, so this is kept as an opaque interned string
/// rather than a closed enum.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct DomainTypeId(pub String);

impl DomainTypeId {
    pub fn new(s: impl Into<String>) -> Self {
        DomainTypeId(s.into())
    }
}

impl fmt::Display for DomainTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which field/perspective/branch a `many`/`specific` value lives in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct InstanceRef {
    pub domain_type_id: DomainTypeId,
    pub instance_id: InstanceId,
}

/// An opaque id for an axis variable, minted while walking block
/// definitions. Axis variables are alpha-renamed per block instance by the
/// axis solver, mirroring the payload/unit solver's `u:{blockId}:{varName}`
/// scheme (see `solver.rs`).
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct AxisVarId(u32);
entity_impl!(AxisVarId, "axisvar");

/// An extent axis: either a fully instantiated value, or a variable waiting
/// on the axis solver (`axis_solver.rs`). Every axis in `Extent` is this
/// shape per §3 ("each axis is either an instantiated value or a variable
/// id"), even though in practice only `cardinality`, `perspective`, and
/// `branch` are ever constructed as `Var` (see SPEC_FULL.md §9
/// Open-Questions note): `temporality` and `binding` have no variable case
/// in the source material, so constraint extraction only ever emits
/// `Axis::Instantiated` for those two.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Axis<T> {
    Instantiated(T),
    Var(AxisVarId),
}

impl<T> Axis<T> {
    pub fn instantiated(&self) -> Option<&T> {
        match self {
            Axis::Instantiated(v) => Some(v),
            Axis::Var(_) => None,
        }
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Axis::Var(_))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Cardinality {
    Zero,
    One,
    Many,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Temporality {
    Continuous,
    Discrete,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Binding {
    Unbound,
    Weak,
    Strong,
    Identity,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Perspective {
    Default,
    Specific(InstanceRef),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Branch {
    Default,
    Specific(InstanceRef),
}

/// `Cardinality::Many` carries its instance out-of-band (in `Extent`'s
/// `many_instance` field below) rather than inline in the enum, because the
/// axis solver needs to union `Many` nodes together before an instance is
/// necessarily known; `Extent::many_instance` is only meaningful when
/// `cardinality` resolves to `Many`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Extent {
    pub cardinality: Axis<Cardinality>,
    pub many_instance: Option<InstanceRef>,
    pub temporality: Axis<Temporality>,
    pub binding: Axis<Binding>,
    pub perspective: Axis<Perspective>,
    pub branch: Axis<Branch>,
}

impl Extent {
    /// The default extent: `(one, continuous, unbound, default, default)`.
    pub fn default_extent() -> Self {
        Extent {
            cardinality: Axis::Instantiated(Cardinality::One),
            many_instance: None,
            temporality: Axis::Instantiated(Temporality::Continuous),
            binding: Axis::Instantiated(Binding::Unbound),
            perspective: Axis::Instantiated(Perspective::Default),
            branch: Axis::Instantiated(Branch::Default),
        }
    }

    /// True iff every axis is instantiated (no open variables).
    pub fn is_fully_resolved(&self) -> bool {
        !self.cardinality.is_var()
            && !self.temporality.is_var()
            && !self.binding.is_var()
            && !self.perspective.is_var()
            && !self.branch.is_var()
    }

    /// Value of cardinality `one` and continuous temporality — a signal.
    pub fn is_signal(&self) -> bool {
        matches!(
            (&self.cardinality, &self.temporality),
            (
                Axis::Instantiated(Cardinality::One),
                Axis::Instantiated(Temporality::Continuous)
            )
        )
    }

    /// Value of cardinality `many` over a specific instance, continuous
    /// temporality — a field.
    pub fn is_field(&self) -> bool {
        matches!(
            (&self.cardinality, &self.temporality),
            (
                Axis::Instantiated(Cardinality::Many),
                Axis::Instantiated(Temporality::Continuous)
            )
        ) && self.many_instance.is_some()
    }

    /// Discrete temporality — an event.
    pub fn is_event(&self) -> bool {
        matches!(self.temporality, Axis::Instantiated(Temporality::Discrete))
    }
}
