//! Stable identifiers for the production graph arena and its referenced
//! catalog data.
//!
//! [`MachineId`] and [`ConduitId`] are [`slotmap`] keys: small, copyable,
//! generation-tagged indices that stay valid across removal because the
//! graph is built in one pass and never removes entries (see spec lifecycle
//! rules) — the generation tag is kept anyway since it is what makes
//! `SlotMap`/`SecondaryMap` lookups panic-free instead of needing manual
//! bounds checks.

slotmap::new_key_type! {
    /// Key for a machine (producer, generator, miner, logistics, storage, transport).
    pub struct MachineId;
    /// Key for a conduit (belt or pipe).
    pub struct ConduitId;
}

/// Identifies a recipe in the loaded recipe database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct RecipeId(pub u32);

/// Identifies an item type by name-interned index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ItemId(pub u32);
