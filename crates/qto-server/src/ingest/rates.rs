//! Cost rate table
//!
//! Read-only external configuration mapping `category.type` to a unit cost
//! and year to a cost escalation percentage, plus the parametric assembly
//! catalog. Loaded once at startup from a JSON document; a compiled-in
//! default table keeps the server usable without one.

use qto_common::types::{AssemblyComponent, ElementCategory, ParametricAssembly};
use qto_common::{QtoError, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct RateTable {
    /// `category.type` → unit cost
    #[serde(default)]
    unit_costs: HashMap<String, f64>,

    /// year → escalation percent
    #[serde(default)]
    escalation: BTreeMap<i32, f64>,

    /// parametric assembly catalog
    #[serde(default)]
    assemblies: Vec<ParametricAssembly>,
}

impl RateTable {
    /// Load a rate table from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let table: RateTable = serde_json::from_str(&raw)?;
        Ok(table)
    }

    /// Unit cost for a `category.type` pair, when the table knows one.
    pub fn unit_cost(&self, category: ElementCategory, element_type: &str) -> Option<f64> {
        self.unit_costs
            .get(&format!("{}.{}", category.as_str(), element_type))
            .copied()
    }

    /// Escalation percentage for a cost year.
    ///
    /// With no year given, the latest known year's factor applies. A year
    /// between table entries resolves to the most recent entry at or before
    /// it. An empty table escalates by zero.
    pub fn escalation_percent(&self, year: Option<i32>) -> f64 {
        let entry = match year {
            Some(year) => self.escalation.range(..=year).next_back(),
            None => self.escalation.iter().next_back(),
        };
        entry.map(|(_, pct)| *pct).unwrap_or(0.0)
    }

    /// Look up a parametric assembly by id.
    pub fn assembly(&self, id: &str) -> Option<&ParametricAssembly> {
        self.assemblies.iter().find(|a| a.id == id)
    }

    /// Validate that the table is internally coherent.
    pub fn validate(&self) -> Result<()> {
        for (key, cost) in &self.unit_costs {
            if *cost < 0.0 {
                return Err(QtoError::Config(format!(
                    "negative unit cost for '{}'",
                    key
                )));
            }
        }
        for assembly in &self.assemblies {
            if assembly.base_unit_cost < 0.0 {
                return Err(QtoError::Config(format!(
                    "negative base unit cost for assembly '{}'",
                    assembly.id
                )));
            }
        }
        Ok(())
    }
}

impl Default for RateTable {
    fn default() -> Self {
        let unit_costs = HashMap::from([
            ("structural.concrete_column".to_string(), 310.0),
            ("structural.steel_beam".to_string(), 185.0),
            ("structural.concrete_slab".to_string(), 96.0),
            ("architectural.partition_wall".to_string(), 64.0),
            ("architectural.window".to_string(), 420.0),
            ("architectural.door".to_string(), 380.0),
            ("mep.duct".to_string(), 52.0),
            ("mep.pipe".to_string(), 34.0),
            ("finishes.floor_tile".to_string(), 48.0),
            ("finishes.suspended_ceiling".to_string(), 41.0),
            ("external.paving".to_string(), 58.0),
        ]);

        let escalation = BTreeMap::from([(2023, 3.4), (2024, 4.1), (2025, 5.0)]);

        let assemblies = vec![
            ParametricAssembly {
                id: "asm-timber-frame-wall".to_string(),
                name: "Timber frame wall system".to_string(),
                base_unit_cost: 1000.0,
                eco_rating: Some("A".to_string()),
                components: vec![
                    AssemblyComponent {
                        material: "timber stud".to_string(),
                        quantity: 8.0,
                        unit: "m".to_string(),
                    },
                    AssemblyComponent {
                        material: "mineral wool insulation".to_string(),
                        quantity: 1.0,
                        unit: "m2".to_string(),
                    },
                    AssemblyComponent {
                        material: "plasterboard".to_string(),
                        quantity: 2.0,
                        unit: "m2".to_string(),
                    },
                ],
            },
            ParametricAssembly {
                id: "asm-curtain-wall".to_string(),
                name: "Unitized curtain wall".to_string(),
                base_unit_cost: 2400.0,
                eco_rating: Some("B".to_string()),
                components: vec![
                    AssemblyComponent {
                        material: "aluminium frame".to_string(),
                        quantity: 4.0,
                        unit: "m".to_string(),
                    },
                    AssemblyComponent {
                        material: "double glazing".to_string(),
                        quantity: 1.0,
                        unit: "m2".to_string(),
                    },
                ],
            },
            ParametricAssembly {
                id: "asm-green-roof".to_string(),
                name: "Extensive green roof build-up".to_string(),
                base_unit_cost: 890.0,
                eco_rating: Some("A+".to_string()),
                components: vec![
                    AssemblyComponent {
                        material: "drainage layer".to_string(),
                        quantity: 1.0,
                        unit: "m2".to_string(),
                    },
                    AssemblyComponent {
                        material: "growing medium".to_string(),
                        quantity: 0.08,
                        unit: "m3".to_string(),
                    },
                    AssemblyComponent {
                        material: "sedum blanket".to_string(),
                        quantity: 1.0,
                        unit: "m2".to_string(),
                    },
                ],
            },
        ];

        Self {
            unit_costs,
            escalation,
            assemblies,
        }
    }
}
