//! Recipe database (spec.md §6 input 4) and the slug-matching algorithm of
//! spec.md §4.1, grounded directly on the original implementation's
//! `load_recipe_db`/`match_recipe_slug` (`graph_analyzer.py`).

use std::collections::BTreeMap;

use crate::catalog;
use crate::id::{ItemId, RecipeId};

/// Interns item names to stable [`ItemId`]s.
#[derive(Debug, Default, Clone)]
pub struct ItemTable {
    names: Vec<String>,
    by_name: BTreeMap<String, ItemId>,
}

impl ItemTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> ItemId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = ItemId(self.names.len() as u32);
        self.names.push(name.to_string());
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn name(&self, id: ItemId) -> &str {
        &self.names[id.0 as usize]
    }

    pub fn lookup(&self, name: &str) -> Option<ItemId> {
        self.by_name.get(name).copied()
    }
}

/// An (item, per-minute rate at clock 1.0) pair.
#[derive(Debug, Clone, Copy)]
pub struct RateEntry {
    pub item: ItemId,
    pub rate_per_min: f64,
}

/// A recipe: name, owning machine class, input/output rates at clock 1.0,
/// and cycle duration (spec.md §3 "Recipe").
#[derive(Debug, Clone)]
pub struct Recipe {
    pub name: String,
    pub building: String,
    pub inputs: Vec<RateEntry>,
    pub outputs: Vec<RateEntry>,
    pub duration_secs: f64,
}

/// The loaded recipe database plus the normalized-name index used for
/// fuzzy slug matching.
#[derive(Debug, Default)]
pub struct RecipeDatabase {
    pub items: ItemTable,
    recipes: Vec<Recipe>,
    by_name: BTreeMap<String, RecipeId>,
    by_normalized: BTreeMap<String, RecipeId>,
}

impl RecipeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: RecipeId) -> &Recipe {
        &self.recipes[id.0 as usize]
    }

    pub fn id_by_name(&self, name: &str) -> Option<RecipeId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Register a recipe; `machines` excludes the building itself being
    /// craftable at a workbench (the original source drops
    /// `{"Crafting Bench", "Equipment Workshop"}` entries as non-automated).
    pub fn register(
        &mut self,
        name: &str,
        building: &str,
        inputs: &[(&str, f64)],
        outputs: &[(&str, f64)],
        duration_secs: f64,
    ) -> RecipeId {
        let cycles_per_min = 60.0 / duration_secs;
        let rate_entries = |pairs: &[(&str, f64)], items: &mut ItemTable| -> Vec<RateEntry> {
            pairs
                .iter()
                .map(|(item_name, qty)| RateEntry {
                    item: items.intern(item_name),
                    rate_per_min: qty * cycles_per_min,
                })
                .collect()
        };
        let recipe = Recipe {
            name: name.to_string(),
            building: building.to_string(),
            inputs: rate_entries(inputs, &mut self.items),
            outputs: rate_entries(outputs, &mut self.items),
            duration_secs,
        };
        let id = RecipeId(self.recipes.len() as u32);
        self.by_name.insert(name.to_string(), id);
        self.by_normalized.insert(normalize(name), id);
        self.recipes.push(recipe);
        id
    }
}

/// Lowercase, alphanumeric-only squash used for fuzzy slug comparisons.
fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Split `CamelCase`/`Snake_Case` into space-separated words: `IngotIron`
/// -> `Ingot Iron`, mirroring the original's
/// `re.sub(r"([a-z])([A-Z])", r"\1 \2", clean).replace("_", " ")`.
fn insert_camel_spaces(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let chars: Vec<char> = s.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' {
            out.push(' ');
            continue;
        }
        if i > 0 {
            let prev = chars[i - 1];
            if prev.is_ascii_lowercase() && c.is_ascii_uppercase() {
                out.push(' ');
            }
        }
        out.push(c);
    }
    out
}

/// Split a `CamelCase` (optionally `Alternate_`-prefixed) identifier into its
/// capitalized-word / digit-run tokens, mirroring
/// `re.findall(r"[A-Z][a-z]*|[0-9]+", base)`.
fn camel_tokens(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            tokens.push(chars[start..i].iter().collect());
        } else if chars[i].is_ascii_uppercase() {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i].is_ascii_lowercase() {
                i += 1;
            }
            tokens.push(chars[start..i].iter().collect());
        } else {
            i += 1;
        }
    }
    tokens
}

/// Match a save-file recipe slug (e.g. `Recipe_IngotIron`,
/// `Recipe_Alternate_Wire_1`) to a database recipe name, in the five-strategy
/// order of spec.md §4.1. Returns the canonical recipe name on a hit.
pub fn match_recipe_slug(slug: &str, db: &RecipeDatabase) -> Option<String> {
    let clean = slug.strip_prefix("Recipe_").unwrap_or(slug);

    // 1. Static override table.
    if let Some(name) = catalog::recipe_slug_override(clean) {
        return Some(name.to_string());
    }

    // 2. Direct normalize.
    let norm = normalize(clean);
    if let Some(id) = db.by_normalized.get(&norm) {
        return Some(db.get(*id).name.clone());
    }

    // 3. Alternate_ prefix rewrite to "Alternate: " display form.
    let clean2 = clean.replacen("Alternate_", "Alternate: ", 1);
    let norm2 = normalize(&clean2);
    if let Some(id) = db.by_normalized.get(&norm2) {
        return Some(db.get(*id).name.clone());
    }

    // 4. CamelCase word-splitting.
    let spaced = insert_camel_spaces(clean);
    let norm3 = normalize(&spaced);
    if let Some(id) = db.by_normalized.get(&norm3) {
        return Some(db.get(*id).name.clone());
    }

    // 5. Reversed CamelCase token order (IngotIron -> IronIngot).
    let base = clean.replacen("Alternate_", "", 1);
    let parts = camel_tokens(&base);
    if parts.len() >= 2 {
        let reversed_name: String = parts.iter().rev().cloned().collect();
        let norm4 = normalize(&reversed_name);
        if let Some(id) = db.by_normalized.get(&norm4) {
            return Some(db.get(*id).name.clone());
        }
        if clean.starts_with("Alternate_") {
            let norm4b = normalize(&format!("alternate{reversed_name}"));
            if let Some(id) = db.by_normalized.get(&norm4b) {
                return Some(db.get(*id).name.clone());
            }
        }
    }

    None
}

#[cfg(feature = "data-loader")]
pub mod data_loader {
    //! JSON ingestion for the recipe database (spec.md §6 input 4):
    //! `{name, machine: [classes], duration, input: [[item, qty], ...],
    //! output: [[item, qty], ...]}` records, with automated-crafting-only
    //! machine entries (the workbench and equipment workshop are excluded,
    //! matching the original's `excluded` set).
    use super::RecipeDatabase;

    #[derive(Debug, thiserror::Error)]
    pub enum RecipeLoadError {
        #[error("JSON parse error: {0}")]
        JsonParse(#[from] serde_json::Error),
    }

    #[derive(Debug, serde::Deserialize)]
    struct RecipeDatabaseFile {
        recipes: Vec<RecipeRecord>,
    }

    #[derive(Debug, serde::Deserialize)]
    struct RecipeRecord {
        name: String,
        machine: Vec<String>,
        duration: f64,
        input: Vec<(String, f64)>,
        output: Vec<(String, f64)>,
    }

    const EXCLUDED_MACHINES: &[&str] = &["Crafting Bench", "Equipment Workshop"];

    pub fn load_recipe_database_json(json: &str) -> Result<RecipeDatabase, RecipeLoadError> {
        let file: RecipeDatabaseFile = serde_json::from_str(json)?;
        let mut db = RecipeDatabase::new();
        // Every miner/extractor without a matched recipe reports its output
        // under this synthetic item (see catalog::MINED_ITEM_PLACEHOLDER);
        // bind_recipe looks it up unconditionally, so it must always be interned.
        db.items.intern(crate::catalog::MINED_ITEM_PLACEHOLDER);
        for record in &file.recipes {
            let machines: Vec<&str> = record
                .machine
                .iter()
                .map(String::as_str)
                .filter(|m| !EXCLUDED_MACHINES.contains(m))
                .collect();
            let Some(&building) = machines.first() else {
                continue;
            };
            let inputs: Vec<(&str, f64)> =
                record.input.iter().map(|(i, q)| (i.as_str(), *q)).collect();
            let outputs: Vec<(&str, f64)> =
                record.output.iter().map(|(i, q)| (i.as_str(), *q)).collect();
            db.register(&record.name, building, &inputs, &outputs, record.duration);
        }
        Ok(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_db() -> RecipeDatabase {
        let mut db = RecipeDatabase::new();
        db.register(
            "Iron Ingot",
            "Smelter",
            &[("Iron Ore", 1.0)],
            &[("Iron Ingot", 1.0)],
            2.0,
        );
        db.register(
            "Alternate: Pure Copper Ingot",
            "Refinery",
            &[("Copper Ore", 1.0), ("Water", 1.0)],
            &[("Copper Ingot", 2.0)],
            12.0,
        );
        db
    }

    #[test]
    fn direct_normalize_matches() {
        let db = sample_db();
        assert_eq!(
            match_recipe_slug("Recipe_IronIngot", &db),
            Some("Iron Ingot".to_string())
        );
    }

    #[test]
    fn override_wins_over_fuzzy_match() {
        let db = sample_db();
        // "Biofuel" has no entry in sample_db, but has a static override;
        // confirm the override path works independent of the db contents.
        assert_eq!(
            match_recipe_slug("Recipe_Biofuel", &db),
            Some("Solid Biofuel".to_string())
        );
    }

    #[test]
    fn alternate_prefix_rewrite_matches() {
        let db = sample_db();
        assert_eq!(
            match_recipe_slug("Recipe_Alternate_PureCopperIngot", &db),
            Some("Alternate: Pure Copper Ingot".to_string())
        );
    }

    #[test]
    fn reversed_camel_tokens_match() {
        let mut db = RecipeDatabase::new();
        // Catalog token order ("Ingot Iron") is reversed vs. the save's
        // slug order ("IronIngot"); strategies 2-4 all fail on this pair,
        // only strategy 5 (token reversal) bridges it.
        db.register("Ingot Iron", "Smelter", &[], &[], 1.0);
        assert_eq!(
            match_recipe_slug("Recipe_IronIngot", &db),
            Some("Ingot Iron".to_string())
        );
    }

    #[test]
    fn no_match_returns_none() {
        let db = sample_db();
        assert_eq!(match_recipe_slug("Recipe_TotallyUnknownThing", &db), None);
    }

    #[test]
    fn rates_scale_by_cycles_per_minute() {
        let db = sample_db();
        let id = db.id_by_name("Iron Ingot").unwrap();
        let recipe = db.get(id);
        // duration 2s -> 30 cycles/min -> 1 qty/cycle -> 30/min
        assert_eq!(recipe.inputs[0].rate_per_min, 30.0);
        assert_eq!(recipe.outputs[0].rate_per_min, 30.0);
    }
}
