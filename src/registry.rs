//! The block registry: a global, immutable (after construction) map from
//! block-type strings to [`BlockDefinition`]s. Registry *contents* — which
//! block types exist, what their `lower` procedures actually do — are out
//! of scope; only the shape of a definition and the registry's query/match
//! surface belong to this crate.

use crate::canonical::{CanonicalType, ValueContract};
use crate::draft::{DefaultSource, PortId};
use crate::inference::InferenceCanonicalType;
use crate::payload::PayloadType;
use crate::unit::UnitType;
use crate::vars::{VarId, VarInterner};
use core::fmt;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// What a block does to the signals flowing through it, as declared by its
/// author. Drives obligation/policy eligibility, not typing directly.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    Pure,
    State,
    Time,
    Identity,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LoweringPurity {
    Pure,
    Stateful,
}

/// Variable-arity aggregator spec — `min`/`max` bound how many edges an
/// input port's collect-spec will gather.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CollectSpec {
    pub min: u32,
    pub max: Option<u32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InputDef {
    pub inference_type: InferenceCanonicalType<VarId>,
    /// Whether this port is exposed to the editor as an editable port
    /// (defaults to `true`, mirroring hidden/internal input ports some
    /// blocks declare).
    pub exposed_as_port: bool,
    pub default_source: Option<DefaultSource>,
    pub ui_hint: Option<String>,
    pub collect: Option<CollectSpec>,
}

impl InputDef {
    pub fn new(inference_type: InferenceCanonicalType<VarId>) -> Self {
        InputDef {
            inference_type,
            exposed_as_port: true,
            default_source: None,
            ui_hint: None,
            collect: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutputDef {
    pub inference_type: InferenceCanonicalType<VarId>,
    pub exposed_as_port: bool,
    pub ui_hint: Option<String>,
}

impl OutputDef {
    pub fn new(inference_type: InferenceCanonicalType<VarId>) -> Self {
        OutputDef {
            inference_type,
            exposed_as_port: true,
            ui_hint: None,
        }
    }
}

/// How an adapter's declared side relates to the conversion it's being
/// matched against.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PayloadCompat {
    Any,
    /// The adapter doesn't change payload: matches only when the requested
    /// conversion's `from.payload == to.payload`.
    Same,
    Concrete(PayloadType),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum UnitCompat {
    Any,
    Same,
    Concrete(UnitType),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ContractCompat {
    Any,
    Concrete(Option<ValueContract>),
}

/// Declares this block as an adapter `from ⇒ to`, matched by
/// [`BlockRegistry::find_adapter`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AdapterSpec {
    pub from_payload: PayloadCompat,
    pub from_unit: UnitCompat,
    pub to_payload: PayloadCompat,
    pub to_unit: UnitCompat,
    pub to_contract: ContractCompat,
    /// Lower wins on tie-break.
    pub priority: u32,
}

/// Per-port allowed-payload enumeration plus the `requireUnitless` block
/// rule, keyed by port.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PayloadMetadata {
    pub allowed_payloads: FxHashMap<PortId, Vec<PayloadType>>,
    pub require_unitless: Vec<PortId>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CardinalityMode {
    Preserve,
    Transform,
    SignalOnly,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BroadcastPolicy {
    Auto,
    Forbid,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CardinalityPolicy {
    pub mode: CardinalityMode,
    pub lane_coupling: bool,
    pub broadcast_policy: BroadcastPolicy,
}

impl Default for CardinalityPolicy {
    fn default() -> Self {
        CardinalityPolicy {
            mode: CardinalityMode::Preserve,
            lane_coupling: true,
            broadcast_policy: BroadcastPolicy::Auto,
        }
    }
}

/// `lower(ctx, inputsById, config) -> LowerResult`. Boxed rather than a
/// bare fn pointer since block authors (out of scope) close over whatever
/// per-block constant data they need.
pub type LowerFn = Box<
    dyn Fn(
            &mut crate::ir::LowerCtx,
            &FxHashMap<PortId, crate::ir::LoweredInput>,
            &crate::config::NormalizeConfig,
        ) -> crate::ir::LowerResult
        + Send
        + Sync,
>;

/// An immutable, declarative block definition. Everything except `lower`
/// is plain data; `lower` is the one procedural hook, and this crate never
/// inspects its body.
pub struct BlockDefinition {
    pub block_type: String,
    pub category: String,
    pub capability: Capability,
    pub lowering_purity: LoweringPurity,
    pub inputs: FxHashMap<PortId, InputDef>,
    pub outputs: FxHashMap<PortId, OutputDef>,
    pub adapter_spec: Option<AdapterSpec>,
    pub payload_metadata: Option<PayloadMetadata>,
    pub cardinality: CardinalityPolicy,
    pub lower: LowerFn,
}

impl fmt::Debug for BlockDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockDefinition")
            .field("block_type", &self.block_type)
            .field("category", &self.category)
            .field("capability", &self.capability)
            .field("lowering_purity", &self.lowering_purity)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("adapter_spec", &self.adapter_spec)
            .field("payload_metadata", &self.payload_metadata)
            .field("cardinality", &self.cardinality)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryError {
    UnknownBlockType(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::UnknownBlockType(t) => write!(f, "unknown block type `{t}`"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// The global map from block-type string to definition, plus the shared
/// variable interner definitions are walked against as they register.
#[derive(Default)]
pub struct BlockRegistry {
    defs: FxHashMap<String, Arc<BlockDefinition>>,
    interner: VarInterner,
}

impl BlockRegistry {
    pub fn new() -> Self {
        BlockRegistry::default()
    }

    /// Intern a var name scoped to `block_type`, minting a fresh [`VarId`]
    /// the first time this pair is walked. Call while building a
    /// definition's port types, before [`BlockRegistry::register`].
    pub fn intern_var(&mut self, block_type: &str, var_name: &str) -> VarId {
        self.interner.intern(block_type, var_name)
    }

    pub fn register(&mut self, def: BlockDefinition) {
        self.defs.insert(def.block_type.clone(), Arc::new(def));
    }

    pub fn get(&self, block_type: &str) -> Option<Arc<BlockDefinition>> {
        let found = self.defs.get(block_type).cloned();
        if found.is_none() {
            log::trace!("block registry miss for type `{block_type}`");
        }
        found
    }

    pub fn require_block_def(&self, block_type: &str) -> Result<Arc<BlockDefinition>, RegistryError> {
        self.get(block_type)
            .ok_or_else(|| RegistryError::UnknownBlockType(block_type.to_string()))
    }

    pub fn get_block_types_by_category(&self, category: &str) -> Vec<String> {
        let mut v: Vec<String> = self
            .defs
            .values()
            .filter(|d| d.category == category)
            .map(|d| d.block_type.clone())
            .collect();
        v.sort();
        v
    }

    /// `findAdapter(from, to)` — scans every registered block with an
    /// `adapterSpec` and returns the best match by source payload
    /// compatibility, source unit compatibility, destination
    /// unit-and-contract compatibility, then ascending `priority`.
    pub fn find_adapter(&self, from: &CanonicalType, to: &CanonicalType) -> Option<Arc<BlockDefinition>> {
        let mut candidates: Vec<&Arc<BlockDefinition>> = self
            .defs
            .values()
            .filter(|d| {
                d.adapter_spec
                    .as_ref()
                    .map(|spec| Self::adapter_matches(spec, from, to))
                    .unwrap_or(false)
            })
            .collect();
        candidates.sort_by(|a, b| {
            let pa = a.adapter_spec.as_ref().map(|s| s.priority).unwrap_or(u32::MAX);
            let pb = b.adapter_spec.as_ref().map(|s| s.priority).unwrap_or(u32::MAX);
            pa.cmp(&pb).then_with(|| a.block_type.cmp(&b.block_type))
        });
        candidates.into_iter().next().cloned()
    }

    fn adapter_matches(spec: &AdapterSpec, from: &CanonicalType, to: &CanonicalType) -> bool {
        let payload_ok = |compat: &PayloadCompat, concrete: PayloadType| match compat {
            PayloadCompat::Any => true,
            PayloadCompat::Concrete(p) => *p == concrete,
            PayloadCompat::Same => from.payload == to.payload,
        };
        let unit_ok = |compat: &UnitCompat, concrete: &UnitType| match compat {
            UnitCompat::Any => true,
            UnitCompat::Concrete(u) => crate::unit::units_equal(u, concrete),
            UnitCompat::Same => crate::unit::units_equal(&from.unit, &to.unit),
        };
        let contract_ok = match &spec.to_contract {
            ContractCompat::Any => true,
            ContractCompat::Concrete(c) => *c == to.contract,
        };
        payload_ok(&spec.from_payload, from.payload)
            && unit_ok(&spec.from_unit, &from.unit)
            && payload_ok(&spec.to_payload, to.payload)
            && unit_ok(&spec.to_unit, &to.unit)
            && contract_ok
    }
}
