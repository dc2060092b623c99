//! Static catalogs embedded in the program (spec.md §6 input 5): machine
//! class → (category, display name), conduit class → (display name,
//! max_rate), miner class → base rate, and the small recipe-slug override
//! table. These mirror the original implementation's module-level dicts
//! (`save_parser.py`'s `*_BUILDINGS`/`BELT_CLASSES`/`PIPE_CLASSES`,
//! `graph_analyzer.py`'s `RECIPE_SLUG_OVERRIDES`/`MINER_BASE_RATES`)
//! one-for-one, since these are exactly the kind of constant the spec
//! defers to "kept in §6" without inlining.

use crate::graph::MachineCategory;

/// One entry of the machine-class catalog.
pub struct MachineClassEntry {
    pub class_name: &'static str,
    pub category: MachineCategory,
    pub display_name: &'static str,
}

/// One entry of the conduit-class catalog.
pub struct ConduitClassEntry {
    pub class_name: &'static str,
    pub display_name: &'static str,
    pub max_rate: f64,
    pub is_pipe: bool,
}

/// Full machine-class catalog, production buildings first.
pub const MACHINE_CLASSES: &[MachineClassEntry] = &[
    // Production
    MachineClassEntry { class_name: "Build_SmelterMk1_C", category: MachineCategory::Producer, display_name: "Smelter" },
    MachineClassEntry { class_name: "Build_ConstructorMk1_C", category: MachineCategory::Producer, display_name: "Constructor" },
    MachineClassEntry { class_name: "Build_AssemblerMk1_C", category: MachineCategory::Producer, display_name: "Assembler" },
    MachineClassEntry { class_name: "Build_FoundryMk1_C", category: MachineCategory::Producer, display_name: "Foundry" },
    MachineClassEntry { class_name: "Build_ManufacturerMk1_C", category: MachineCategory::Producer, display_name: "Manufacturer" },
    MachineClassEntry { class_name: "Build_OilRefinery_C", category: MachineCategory::Producer, display_name: "Refinery" },
    MachineClassEntry { class_name: "Build_Packager_C", category: MachineCategory::Producer, display_name: "Packager" },
    MachineClassEntry { class_name: "Build_Blender_C", category: MachineCategory::Producer, display_name: "Blender" },
    MachineClassEntry { class_name: "Build_HadronCollider_C", category: MachineCategory::Producer, display_name: "Particle Accelerator" },
    MachineClassEntry { class_name: "Build_Converter_C", category: MachineCategory::Producer, display_name: "Converter" },
    MachineClassEntry { class_name: "Build_QuantumEncoder_C", category: MachineCategory::Producer, display_name: "Quantum Encoder" },
    // Generators
    MachineClassEntry { class_name: "Build_GeneratorCoal_C", category: MachineCategory::Generator, display_name: "Coal Generator" },
    MachineClassEntry { class_name: "Build_GeneratorFuel_C", category: MachineCategory::Generator, display_name: "Fuel Generator" },
    MachineClassEntry { class_name: "Build_GeneratorNuclear_C", category: MachineCategory::Generator, display_name: "Nuclear Power Plant" },
    MachineClassEntry { class_name: "Build_GeneratorGeoThermal_C", category: MachineCategory::Generator, display_name: "Geothermal Generator" },
    MachineClassEntry { class_name: "Build_GeneratorBiomass_Automated_C", category: MachineCategory::Generator, display_name: "Biomass Burner" },
    MachineClassEntry { class_name: "Build_GeneratorBiomass_C", category: MachineCategory::Generator, display_name: "Biomass Burner" },
    // Miners / extractors
    MachineClassEntry { class_name: "Build_MinerMk1_C", category: MachineCategory::Miner, display_name: "Miner Mk.1" },
    MachineClassEntry { class_name: "Build_MinerMk2_C", category: MachineCategory::Miner, display_name: "Miner Mk.2" },
    MachineClassEntry { class_name: "Build_MinerMk3_C", category: MachineCategory::Miner, display_name: "Miner Mk.3" },
    MachineClassEntry { class_name: "Build_OilPump_C", category: MachineCategory::Miner, display_name: "Oil Extractor" },
    MachineClassEntry { class_name: "Build_WaterPump_C", category: MachineCategory::Miner, display_name: "Water Extractor" },
    MachineClassEntry { class_name: "Build_FrackingExtractor_C", category: MachineCategory::Miner, display_name: "Resource Well Extractor" },
    MachineClassEntry { class_name: "Build_FrackingSmasher_C", category: MachineCategory::Miner, display_name: "Resource Well Pressurizer" },
    // Logistics
    MachineClassEntry { class_name: "Build_ConveyorAttachmentSplitter_C", category: MachineCategory::Logistics(LogisticKind::Splitter), display_name: "Splitter" },
    MachineClassEntry { class_name: "Build_ConveyorAttachmentSplitterSmart_C", category: MachineCategory::Logistics(LogisticKind::Splitter), display_name: "Smart Splitter" },
    MachineClassEntry { class_name: "Build_ConveyorAttachmentSplitterProgrammable_C", category: MachineCategory::Logistics(LogisticKind::Splitter), display_name: "Programmable Splitter" },
    MachineClassEntry { class_name: "Build_ConveyorAttachmentMerger_C", category: MachineCategory::Logistics(LogisticKind::Merger), display_name: "Merger" },
    MachineClassEntry { class_name: "Build_PipelineJunction_Cross_C", category: MachineCategory::Logistics(LogisticKind::PipeJunction), display_name: "Pipe Junction" },
    MachineClassEntry { class_name: "Build_PipelinePumpMk2_C", category: MachineCategory::Logistics(LogisticKind::PipelinePump), display_name: "Pipeline Pump Mk.2" },
    MachineClassEntry { class_name: "Build_PipelinePump_C", category: MachineCategory::Logistics(LogisticKind::PipelinePump), display_name: "Pipeline Pump" },
    // Storage
    MachineClassEntry { class_name: "Build_StorageContainerMk1_C", category: MachineCategory::Storage, display_name: "Storage Container" },
    MachineClassEntry { class_name: "Build_StorageContainerMk2_C", category: MachineCategory::Storage, display_name: "Industrial Storage" },
    MachineClassEntry { class_name: "Build_CentralStorage_C", category: MachineCategory::Storage, display_name: "Dimensional Depot" },
    MachineClassEntry { class_name: "Build_IndustrialTank_C", category: MachineCategory::Storage, display_name: "Industrial Fluid Buffer" },
    MachineClassEntry { class_name: "Build_PipeStorageTank_C", category: MachineCategory::Storage, display_name: "Fluid Buffer" },
    MachineClassEntry { class_name: "Build_StorageBlueprint_C", category: MachineCategory::Storage, display_name: "Blueprint Storage" },
    // Transport
    MachineClassEntry { class_name: "Build_TruckStation_C", category: MachineCategory::Transport, display_name: "Truck Station" },
    MachineClassEntry { class_name: "Build_DroneStation_C", category: MachineCategory::Transport, display_name: "Drone Port" },
    MachineClassEntry { class_name: "Build_TrainStation_C", category: MachineCategory::Transport, display_name: "Train Station" },
    MachineClassEntry { class_name: "Build_TrainDockingStation_C", category: MachineCategory::Transport, display_name: "Freight Platform" },
    MachineClassEntry { class_name: "Build_TrainDockingStationLiquid_C", category: MachineCategory::Transport, display_name: "Fluid Freight Platform" },
];

/// Logistics building sub-kind, selecting the C3 redistribution rule (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LogisticKind {
    Splitter,
    Merger,
    PipeJunction,
    PipelinePump,
    Default,
}

/// Belt and pipe tiers: display name, capacity in items (or m³) per minute.
pub const CONDUIT_CLASSES: &[ConduitClassEntry] = &[
    ConduitClassEntry { class_name: "Build_ConveyorBeltMk1_C", display_name: "Belt Mk.1", max_rate: 60.0, is_pipe: false },
    ConduitClassEntry { class_name: "Build_ConveyorBeltMk2_C", display_name: "Belt Mk.2", max_rate: 120.0, is_pipe: false },
    ConduitClassEntry { class_name: "Build_ConveyorBeltMk3_C", display_name: "Belt Mk.3", max_rate: 270.0, is_pipe: false },
    ConduitClassEntry { class_name: "Build_ConveyorBeltMk4_C", display_name: "Belt Mk.4", max_rate: 480.0, is_pipe: false },
    ConduitClassEntry { class_name: "Build_ConveyorBeltMk5_C", display_name: "Belt Mk.5", max_rate: 780.0, is_pipe: false },
    ConduitClassEntry { class_name: "Build_ConveyorBeltMk6_C", display_name: "Belt Mk.6", max_rate: 1200.0, is_pipe: false },
    ConduitClassEntry { class_name: "Build_ConveyorLiftMk1_C", display_name: "Lift Mk.1", max_rate: 60.0, is_pipe: false },
    ConduitClassEntry { class_name: "Build_ConveyorLiftMk2_C", display_name: "Lift Mk.2", max_rate: 120.0, is_pipe: false },
    ConduitClassEntry { class_name: "Build_ConveyorLiftMk3_C", display_name: "Lift Mk.3", max_rate: 270.0, is_pipe: false },
    ConduitClassEntry { class_name: "Build_ConveyorLiftMk4_C", display_name: "Lift Mk.4", max_rate: 480.0, is_pipe: false },
    ConduitClassEntry { class_name: "Build_ConveyorLiftMk5_C", display_name: "Lift Mk.5", max_rate: 780.0, is_pipe: false },
    ConduitClassEntry { class_name: "Build_ConveyorLiftMk6_C", display_name: "Lift Mk.6", max_rate: 1200.0, is_pipe: false },
    ConduitClassEntry { class_name: "Build_Pipeline_C", display_name: "Pipe Mk.1", max_rate: 300.0, is_pipe: true },
    ConduitClassEntry { class_name: "Build_Pipeline_NoIndicator_C", display_name: "Pipe Mk.1", max_rate: 300.0, is_pipe: true },
    ConduitClassEntry { class_name: "Build_PipelineMK2_C", display_name: "Pipe Mk.2", max_rate: 600.0, is_pipe: true },
    ConduitClassEntry { class_name: "Build_PipelineMK2_NoIndicator_C", display_name: "Pipe Mk.2", max_rate: 600.0, is_pipe: true },
];

/// Base items/min at 100% clock for a miner/extractor, keyed by display name
/// (Normal-purity resource node; impure halves it, pure doubles it — purity
/// scaling is applied by the caller before handing clock/rate to C1, this
/// table only carries the tier-nominal rate).
pub const MINER_BASE_RATES: &[(&str, f64)] = &[
    ("Miner Mk.1", 60.0),
    ("Miner Mk.2", 120.0),
    ("Miner Mk.3", 240.0),
    ("Oil Extractor", 120.0),
    ("Water Extractor", 120.0),
    ("Resource Well Extractor", 60.0),
    ("Resource Well Pressurizer", 0.0),
];

pub fn miner_base_rate(display_name: &str) -> f64 {
    MINER_BASE_RATES
        .iter()
        .find(|(name, _)| *name == display_name)
        .map(|(_, rate)| *rate)
        .unwrap_or(0.0)
}

/// Recipe slugs (with the `Recipe_` prefix already stripped) that can't be
/// auto-matched against the recipe database by any of the normalization
/// strategies in [`crate::recipe::match_recipe_slug`] — historically-renamed
/// or aliased recipes. Checked first and wins unconditionally on a hit.
pub const RECIPE_SLUG_OVERRIDES: &[(&str, &str)] = &[
    ("Alternate_CircuitBoard_2", "Alternate: Electrode Circuit Board"),
    ("Alternate_IngotSteel_1", "Alternate: Compacted Steel Ingot"),
    ("Alternate_Wire_1", "Alternate: Iron Wire"),
    ("Alternate_Computer_2", "Alternate: Crystal Computer"),
    ("Alternate_CrystalOscillator", "Alternate: Insulated Crystal Oscillator"),
    ("Alternate_EnrichedCoal", "Alternate: Compacted Coal"),
    ("Alternate_ElectroAluminumScrap", "Alternate: Electrode Aluminum Scrap"),
    ("Alternate_Turbofuel", "Turbofuel"),
    ("Alternate_IronIngot_Leached", "Alternate: Leached Iron ingot"),
    ("Alternate_Quartz_Purified", "Alternate: Pure Quartz Crystal"),
    ("Alternate_Silica_Distilled", "Alternate: Distilled Silica"),
    ("AluminumSheet", "Alclad Aluminum Sheet"),
    ("Biofuel", "Solid Biofuel"),
    ("FluidCanister", "Empty Canister"),
    ("IronPlateReinforced", "Reinforced Iron Plate"),
    ("IngotSAM", "Reanimated SAM"),
    ("SpaceElevatorPart_4", "Assembly Director System"),
    ("PowerCrystalShard_1", "Power Shard (1)"),
    ("PowerCrystalShard_2", "Power Shard (2)"),
    ("PowerCrystalShard_3", "Power Shard (5)"),
    ("PackagedBiofuel", "Packaged Liquid Biofuel"),
    ("PackagedNitrogen", "Packaged Nitrogen Gas"),
    ("UnpackageBioFuel", "Unpackage Liquid Biofuel"),
    ("UnpackageNitrogen", "Unpackage Nitrogen Gas"),
    ("Alternate_PureCateriumIngot", "Alternate: Pure Caterium Ingot"),
    ("Alternate_PureCopperIngot", "Alternate: Pure Copper Ingot"),
    ("Alternate_HeavyOilResidue", "Alternate: Heavy Oil Residue"),
    ("Alternate_TurboHeavyFuel", "Alternate: Turbo Heavy Fuel"),
    ("Alternate_SloppyAlumina", "Alternate: Sloppy Alumina"),
];

pub fn recipe_slug_override(clean_slug: &str) -> Option<&'static str> {
    RECIPE_SLUG_OVERRIDES
        .iter()
        .find(|(slug, _)| *slug == clean_slug)
        .map(|(_, name)| *name)
}

/// Placeholder item name for a miner's synthetic output before any
/// downstream inference narrows it to a real ore. Per spec.md §9's Open
/// Question, this is replicated verbatim rather than inferred — see
/// DESIGN.md.
pub const MINED_ITEM_PLACEHOLDER: &str = "(mined item)";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miner_rate_lookup() {
        assert_eq!(miner_base_rate("Miner Mk.1"), 60.0);
        assert_eq!(miner_base_rate("Miner Mk.3"), 240.0);
        assert_eq!(miner_base_rate("Resource Well Pressurizer"), 0.0);
        assert_eq!(miner_base_rate("nonexistent"), 0.0);
    }

    #[test]
    fn override_hit_and_miss() {
        assert_eq!(recipe_slug_override("Biofuel"), Some("Solid Biofuel"));
        assert_eq!(recipe_slug_override("IngotIron"), None);
    }

    #[test]
    fn every_machine_class_is_unique() {
        let mut seen = std::collections::HashSet::new();
        for entry in MACHINE_CLASSES {
            assert!(seen.insert(entry.class_name), "duplicate class {}", entry.class_name);
        }
    }
}
