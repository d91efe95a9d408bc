//! The inference overlay on top of `canonical.rs`: payload/unit slots that
//! may be variables. Used only inside block definitions (`V = VarId`, a
//! definition-local variable) and the solver (`V = ScopedVar`, a variable
//! alpha-renamed to one block instance).

use crate::canonical::{types_equal, CanonicalType, TypeError, ValueContract};
use crate::extent::Extent;
use crate::payload::PayloadType;
use crate::unit::{is_valid_payload_unit, UnitType};
use rustc_hash::FxHashMap;
use std::hash::Hash;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum InferencePayload<V> {
    Concrete(PayloadType),
    Var(V),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum InferenceUnit<V> {
    Concrete(UnitType),
    Var(V),
}

/// A canonical type where `payload` and `unit` may be variables.
#[derive(Clone, Debug, PartialEq)]
pub struct InferenceCanonicalType<V> {
    pub payload: InferencePayload<V>,
    pub unit: InferenceUnit<V>,
    pub extent: Extent,
    pub contract: Option<ValueContract>,
}

impl<V: Clone + Eq + Hash> InferenceCanonicalType<V> {
    pub fn concrete(
        payload: PayloadType,
        unit: UnitType,
        extent: Extent,
        contract: Option<ValueContract>,
    ) -> Self {
        InferenceCanonicalType {
            payload: InferencePayload::Concrete(payload),
            unit: InferenceUnit::Concrete(unit),
            extent,
            contract,
        }
    }
}

/// `(payloads: map<varId, PayloadType>, units: map<varId, UnitType>)`.
#[derive(Clone, Debug, Default)]
pub struct Substitution<V: Eq + Hash> {
    pub payloads: FxHashMap<V, PayloadType>,
    pub units: FxHashMap<V, UnitType>,
}

impl<V: Eq + Hash> Substitution<V> {
    pub fn new() -> Self {
        Substitution {
            payloads: FxHashMap::default(),
            units: FxHashMap::default(),
        }
    }
}

/// `finalizeInferenceType(t, subst)` — the single border between
/// inference-world and canonical-world. Substitutes every variable; fails
/// if any remains unresolved in `subst`, or if the resulting pairing is
/// invalid, or if the extent still carries an open axis variable.
pub fn finalize_inference_type<V: Clone + Eq + Hash>(
    t: &InferenceCanonicalType<V>,
    subst: &Substitution<V>,
) -> Result<CanonicalType, TypeError> {
    let payload = match &t.payload {
        InferencePayload::Concrete(p) => *p,
        InferencePayload::Var(v) => *subst.payloads.get(v).ok_or(TypeError::UnresolvedPayload)?,
    };
    let unit = match &t.unit {
        InferenceUnit::Concrete(u) => u.clone(),
        InferenceUnit::Var(v) => subst.units.get(v).cloned().ok_or(TypeError::UnresolvedUnit)?,
    };
    if !is_valid_payload_unit(payload, &unit) {
        return Err(TypeError::InvalidPayloadUnit { payload, unit });
    }
    if !t.extent.is_fully_resolved() {
        return Err(TypeError::UnresolvedAxis { axis: "extent" });
    }
    Ok(CanonicalType {
        payload,
        unit,
        extent: t.extent.clone(),
        contract: t.contract,
    })
}

/// `applyPartialSubstitution(t, subst) -> InferenceCanonicalType` —
/// substitutes what it can, leaves variables elsewhere.
pub fn apply_partial_substitution<V: Clone + Eq + Hash>(
    t: &InferenceCanonicalType<V>,
    subst: &Substitution<V>,
) -> InferenceCanonicalType<V> {
    let payload = match &t.payload {
        InferencePayload::Concrete(p) => InferencePayload::Concrete(*p),
        InferencePayload::Var(v) => match subst.payloads.get(v) {
            Some(p) => InferencePayload::Concrete(*p),
            None => InferencePayload::Var(v.clone()),
        },
    };
    let unit = match &t.unit {
        InferenceUnit::Concrete(u) => InferenceUnit::Concrete(u.clone()),
        InferenceUnit::Var(v) => match subst.units.get(v) {
            Some(u) => InferenceUnit::Concrete(u.clone()),
            None => InferenceUnit::Var(v.clone()),
        },
    };
    InferenceCanonicalType {
        payload,
        unit,
        extent: t.extent.clone(),
        contract: t.contract,
    }
}

/// `isInferenceCanonicalizable(t, subst) -> bool` — true iff finalization
/// would succeed.
pub fn is_inference_canonicalizable<V: Clone + Eq + Hash>(
    t: &InferenceCanonicalType<V>,
    subst: &Substitution<V>,
) -> bool {
    finalize_inference_type(t, subst).is_ok()
}

/// Round-trip identity check used by the idempotence property in §8:
/// finalizing an already-canonical type should be bit-identical to the
/// original (modulo the inference/canonical representational wrapper).
pub fn canonical_roundtrips_through_finalize(c: &CanonicalType) -> bool {
    let inference = InferenceCanonicalType::<()>::concrete(
        c.payload,
        c.unit.clone(),
        c.extent.clone(),
        c.contract,
    );
    let subst = Substitution::new();
    match finalize_inference_type(&inference, &subst) {
        Ok(roundtripped) => types_equal(c, &roundtripped),
        Err(_) => false,
    }
}
