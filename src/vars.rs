//! Payload/unit variable identity.
//!
//! "Variables are minted with monotonically increasing counters when block
//! definitions are first walked." A [`VarId`] is scoped to the
//! `(block_type, var_name)` pair that declared it — two different block
//! *types* may both declare a var literally named `"U"` without colliding,
//! since the interner keys on the pair, not the bare name.

use cranelift_entity::entity_impl;
use rustc_hash::FxHashMap;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct VarId(u32);
entity_impl!(VarId, "var");

/// Interns `(block_type, var_name)` pairs into dense [`VarId`]s. One
/// instance lives on the [`crate::registry::BlockRegistry`] and is shared
/// by every block definition it holds.
#[derive(Default, Debug, Clone)]
pub struct VarInterner {
    by_name: FxHashMap<(String, String), VarId>,
    names: Vec<(String, String)>,
}

impl VarInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `var_name` within `block_type`'s namespace, minting a new
    /// `VarId` the first time this pair is seen.
    pub fn intern(&mut self, block_type: &str, var_name: &str) -> VarId {
        if let Some(id) = self.by_name.get(&(block_type.to_string(), var_name.to_string())) {
            return *id;
        }
        let id = VarId::new(self.names.len());
        self.names.push((block_type.to_string(), var_name.to_string()));
        self.by_name
            .insert((block_type.to_string(), var_name.to_string()), id);
        id
    }

    pub fn name_of(&self, id: VarId) -> Option<&(String, String)> {
        self.names.get(id.index())
    }
}

/// A payload/unit variable alpha-renamed to a specific block *instance*
/// (`BlockId`), so the solver never unifies variables belonging to two
/// separate instances of the same block type. Corresponds to the spec's
/// `u:{blockId}:{varName}` scheme and to the solver node key
/// `payload:var:{blockId}:{varId}` / `unit:var:{blockId}:{varId}`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct ScopedVar {
    pub block: crate::draft::BlockId,
    pub var: VarId,
}

impl ScopedVar {
    pub fn new(block: crate::draft::BlockId, var: VarId) -> Self {
        ScopedVar { block, var }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_pair_interns_to_same_id() {
        let mut interner = VarInterner::new();
        let a = interner.intern("Clamp", "U");
        let b = interner.intern("Clamp", "U");
        assert_eq!(a, b);
    }

    #[test]
    fn same_name_different_block_type_is_distinct() {
        let mut interner = VarInterner::new();
        let a = interner.intern("Clamp", "U");
        let b = interner.intern("Remap", "U");
        assert_ne!(a, b);
    }

    #[test]
    fn ids_are_monotonically_increasing() {
        let mut interner = VarInterner::new();
        let a = interner.intern("Clamp", "U");
        let b = interner.intern("Clamp", "V");
        assert!(a.index() < b.index());
    }
}
