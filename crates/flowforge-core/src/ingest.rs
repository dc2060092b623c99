//! JSON ingestion for the machine/conduit/connection catalogs (spec.md §6
//! inputs 1-3), feature-gated the same way as [`crate::recipe::data_loader`]
//! handles input 4 (the recipe database).

#![cfg(feature = "data-loader")]

use crate::builder::{RawConduit, RawConnection, RawMachine, RawPort};

#[derive(Debug, thiserror::Error)]
pub enum CatalogLoadError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

#[derive(Debug, serde::Deserialize)]
struct PortRecord {
    port_id: String,
    component: String,
}

impl From<PortRecord> for RawPort {
    fn from(p: PortRecord) -> Self {
        RawPort { port_id: p.port_id, component_name: p.component }
    }
}

fn default_scale() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, serde::Deserialize)]
struct MachineRecord {
    id: String,
    class_name: String,
    #[serde(default)]
    position: (f64, f64, f64),
    #[serde(default)]
    ports: Vec<PortRecord>,
    #[serde(default)]
    recipe_slug: Option<String>,
    #[serde(default = "default_scale")]
    clock: f64,
    #[serde(default = "default_true")]
    producing: bool,
    #[serde(default = "default_scale")]
    productivity: f64,
}

#[derive(Debug, serde::Deserialize)]
struct ConduitRecord {
    id: String,
    class_name: String,
    #[serde(default)]
    ports: Vec<PortRecord>,
}

#[derive(Debug, serde::Deserialize)]
struct ConnectionRecord(String, String);

/// The on-disk shape of one parsed save (spec.md §6 inputs 1-3, bundled
/// together since a caller always has all three or none).
#[derive(Debug, serde::Deserialize)]
struct FactoryFile {
    #[serde(default)]
    machines: Vec<MachineRecord>,
    #[serde(default)]
    conduits: Vec<ConduitRecord>,
    #[serde(default)]
    connections: Vec<ConnectionRecord>,
}

/// Decode a parsed-save JSON document into the raw catalogs C1 consumes.
pub fn load_factory_json(
    json: &str,
) -> Result<(Vec<RawMachine>, Vec<RawConduit>, Vec<RawConnection>), CatalogLoadError> {
    let file: FactoryFile = serde_json::from_str(json)?;

    let machines = file
        .machines
        .into_iter()
        .map(|m| RawMachine {
            id: m.id,
            class_name: m.class_name,
            position: m.position,
            ports: m.ports.into_iter().map(Into::into).collect(),
            recipe_slug: m.recipe_slug,
            clock: m.clock,
            producing: m.producing,
            productivity: m.productivity,
        })
        .collect();

    let conduits = file
        .conduits
        .into_iter()
        .map(|c| RawConduit {
            id: c.id,
            class_name: c.class_name,
            ports: c.ports.into_iter().map(Into::into).collect(),
        })
        .collect();

    let connections = file
        .connections
        .into_iter()
        .map(|c| RawConnection(c.0, c.1))
        .collect();

    Ok((machines, conduits, connections))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_minimal_factory() {
        let json = r#"{
            "machines": [
                {"id": "m1", "class_name": "Build_MinerMk1_C",
                 "ports": [{"port_id": "m1.out", "component": "Output0"}]}
            ],
            "conduits": [
                {"id": "b1", "class_name": "Build_ConveyorBeltMk1_C",
                 "ports": [
                    {"port_id": "b1.in", "component": "ConveyorAny0"},
                    {"port_id": "b1.out", "component": "ConveyorAny1"}
                 ]}
            ],
            "connections": [["m1.out", "b1.in"]]
        }"#;
        let (machines, conduits, connections) = load_factory_json(json).unwrap();
        assert_eq!(machines.len(), 1);
        assert_eq!(conduits.len(), 1);
        assert_eq!(connections.len(), 1);
        assert_eq!(machines[0].clock, 1.0);
        assert!(machines[0].producing);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(load_factory_json("{not json").is_err());
    }
}
