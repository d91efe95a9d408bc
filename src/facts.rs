//! Type facts: what constraint extraction plus the solver now know about
//! every port, expressed as either a fully canonical type or a still-open
//! inference type.

use crate::draft::PortRef;
use crate::inference::{apply_partial_substitution, finalize_inference_type, InferenceCanonicalType, Substitution};
use crate::canonical::CanonicalType;
use crate::vars::ScopedVar;
use rustc_hash::FxHashMap;

/// Per-port resolution state after a solver pass.
#[derive(Clone, Debug, PartialEq)]
pub enum PortTypeHint {
    Ok(CanonicalType),
    Unknown(InferenceCanonicalType<ScopedVar>),
}

impl PortTypeHint {
    pub fn is_ok(&self) -> bool {
        matches!(self, PortTypeHint::Ok(_))
    }

    pub fn canonical(&self) -> Option<&CanonicalType> {
        match self {
            PortTypeHint::Ok(c) => Some(c),
            PortTypeHint::Unknown(_) => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FactSet {
    pub ports: FxHashMap<PortRef, PortTypeHint>,
}

impl FactSet {
    /// True once every port in the set resolved to a canonical type —
    /// `tryFinalizeStrict`'s precondition in §4.9.
    pub fn all_resolved(&self) -> bool {
        self.ports.values().all(PortTypeHint::is_ok)
    }

    pub fn port_types(&self) -> FxHashMap<PortRef, CanonicalType> {
        self.ports
            .iter()
            .filter_map(|(p, hint)| hint.canonical().map(|c| (p.clone(), c.clone())))
            .collect()
    }
}

/// Applies a solver substitution onto every port's base inference type,
/// producing either a finalized canonical type or a narrowed-but-still-open
/// one.
pub fn derive_facts(
    port_base_types: &FxHashMap<PortRef, InferenceCanonicalType<ScopedVar>>,
    substitution: &Substitution<ScopedVar>,
) -> FactSet {
    let mut ports = FxHashMap::default();
    for (port, base) in port_base_types {
        let hint = match finalize_inference_type(base, substitution) {
            Ok(canonical) => PortTypeHint::Ok(canonical),
            Err(_) => PortTypeHint::Unknown(apply_partial_substitution(base, substitution)),
        };
        ports.insert(port.clone(), hint);
    }
    FactSet { ports }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::{BlockId, PortRef};
    use crate::extent::Extent;
    use crate::payload::PayloadType;
    use crate::unit::UnitType;
    use crate::vars::VarId;

    #[test]
    fn resolved_substitution_yields_ok_hint() {
        let port = PortRef::new(BlockId::new(0), "out");
        let var = ScopedVar::new(BlockId::new(0), VarId::new(0));
        let mut bases = FxHashMap::default();
        bases.insert(
            port.clone(),
            InferenceCanonicalType {
                payload: crate::inference::InferencePayload::Var(var),
                unit: crate::inference::InferenceUnit::Concrete(UnitType::Scalar),
                extent: Extent::default_extent(),
                contract: None,
            },
        );
        let mut subst = Substitution::new();
        subst.payloads.insert(var, PayloadType::Float);
        let facts = derive_facts(&bases, &subst);
        assert!(facts.all_resolved());
        assert_eq!(
            facts.ports[&port].canonical().unwrap().payload,
            PayloadType::Float
        );
    }

    #[test]
    fn missing_substitution_entry_yields_unknown_hint() {
        let port = PortRef::new(BlockId::new(0), "out");
        let var = ScopedVar::new(BlockId::new(0), VarId::new(0));
        let mut bases = FxHashMap::default();
        bases.insert(
            port.clone(),
            InferenceCanonicalType {
                payload: crate::inference::InferencePayload::Var(var),
                unit: crate::inference::InferenceUnit::Concrete(UnitType::Scalar),
                extent: Extent::default_extent(),
                contract: None,
            },
        );
        let subst = Substitution::new();
        let facts = derive_facts(&bases, &subst);
        assert!(!facts.all_resolved());
        assert!(!facts.ports[&port].is_ok());
    }
}
