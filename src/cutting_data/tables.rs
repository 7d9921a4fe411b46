//! Base speed, feed and insert-material tables
//!
//! Values come from general turning handbooks for carbide inserts and
//! are expressed in m/min and mm/rev. The tables are parsed from JSON and
//! validated once; lookups afterwards cannot fail.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use super::{MaterialKind, ToolMaterial};
use crate::error::{EngineError, Result};
use crate::models::OperationType;

const BUILTIN_TABLES: &str = r#"{
    "fallback_material": "steel",
    "fallback_operation": "roughing",
    "cutting_speeds": {
        "steel":           { "roughing": 80,  "semi_finishing": 120, "finishing": 150 },
        "aluminum":        { "roughing": 250, "semi_finishing": 350, "finishing": 500 },
        "stainless_steel": { "roughing": 60,  "semi_finishing": 80,  "finishing": 100 },
        "titanium":        { "roughing": 30,  "semi_finishing": 45,  "finishing": 60 },
        "copper":          { "roughing": 150, "semi_finishing": 200, "finishing": 250 }
    },
    "feeds": { "roughing": 0.2, "semi_finishing": 0.1, "finishing": 0.05 },
    "tool_coefficients": {
        "carbide": 1.0,
        "ceramic": 1.5,
        "cbn": 2.0,
        "diamond": 3.0,
        "hss": 0.5
    },
    "default_tool_coefficient": 1.0
}"#;

/// Table layout as written in JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSource {
    pub fallback_material: MaterialKind,
    pub fallback_operation: OperationType,
    pub cutting_speeds: HashMap<MaterialKind, BTreeMap<OperationType, f64>>,
    pub feeds: BTreeMap<OperationType, f64>,
    pub tool_coefficients: HashMap<ToolMaterial, f64>,
    #[serde(default = "default_tool_coefficient")]
    pub default_tool_coefficient: f64,
}

fn default_tool_coefficient() -> f64 {
    1.0
}

/// A validated set of cutting tables
#[derive(Debug, Clone)]
pub struct CuttingTables {
    source: TableSource,
    // Resolved once so lookups always have an answer
    fallback_speed: f64,
    fallback_feed: f64,
}

/// Result of a speed-table lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedLookup {
    /// Row actually used, after the material fallback
    pub material: MaterialKind,
    pub vc_m_min: f64,
}

impl CuttingTables {
    /// Built-in tables, parsed on first use.
    pub fn builtin() -> &'static CuttingTables {
        static TABLES: OnceLock<CuttingTables> = OnceLock::new();
        TABLES.get_or_init(|| {
            // The embedded JSON is covered by tests; a broken literal is a build defect.
            CuttingTables::from_json(BUILTIN_TABLES).expect("built-in cutting tables are valid")
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let source: TableSource = serde_json::from_str(json)?;
        Self::from_source(source)
    }

    /// Validate a table source.
    ///
    /// The fallback material row must hold the fallback operation and so
    /// must the feed table; every value must be positive.
    pub fn from_source(source: TableSource) -> Result<Self> {
        for (material, row) in &source.cutting_speeds {
            for (op, vc) in row {
                if !(*vc > 0.0) {
                    return Err(EngineError::InvalidTable(format!(
                        "cutting speed for {} {} must be positive, got {}",
                        material, op, vc
                    )));
                }
            }
        }
        for (op, feed) in &source.feeds {
            if !(*feed > 0.0) {
                return Err(EngineError::InvalidTable(format!(
                    "feed for {} must be positive, got {}",
                    op, feed
                )));
            }
        }
        for (tool, coeff) in &source.tool_coefficients {
            if !(*coeff > 0.0) {
                return Err(EngineError::InvalidTable(format!(
                    "coefficient for {} must be positive, got {}",
                    tool, coeff
                )));
            }
        }
        if !(source.default_tool_coefficient > 0.0) {
            return Err(EngineError::InvalidTable(
                "default tool coefficient must be positive".to_string(),
            ));
        }

        let fallback_speed = source
            .cutting_speeds
            .get(&source.fallback_material)
            .and_then(|row| row.get(&source.fallback_operation))
            .copied()
            .ok_or_else(|| {
                EngineError::InvalidTable(format!(
                    "fallback row {} has no {} speed",
                    source.fallback_material, source.fallback_operation
                ))
            })?;
        let fallback_feed = source
            .feeds
            .get(&source.fallback_operation)
            .copied()
            .ok_or_else(|| {
                EngineError::InvalidTable(format!(
                    "feed table has no {} entry",
                    source.fallback_operation
                ))
            })?;

        Ok(Self {
            source,
            fallback_speed,
            fallback_feed,
        })
    }

    pub fn source(&self) -> &TableSource {
        &self.source
    }

    /// Base cutting speed for a material and operation.
    ///
    /// Missing materials use the fallback row; missing operations use the
    /// fallback operation within the chosen row.
    pub fn cutting_speed(&self, material: MaterialKind, operation: OperationType) -> SpeedLookup {
        let (resolved, row) = match self.source.cutting_speeds.get(&material) {
            Some(row) => (material, Some(row)),
            None => (
                self.source.fallback_material,
                self.source.cutting_speeds.get(&self.source.fallback_material),
            ),
        };

        let vc = row
            .and_then(|r| {
                r.get(&operation)
                    .or_else(|| r.get(&self.source.fallback_operation))
            })
            .copied()
            .unwrap_or(self.fallback_speed);

        SpeedLookup {
            material: resolved,
            vc_m_min: vc,
        }
    }

    pub fn feed(&self, operation: OperationType) -> f64 {
        self.source
            .feeds
            .get(&operation)
            .copied()
            .unwrap_or(self.fallback_feed)
    }

    pub fn tool_coefficient(&self, tool: ToolMaterial) -> f64 {
        self.source
            .tool_coefficients
            .get(&tool)
            .copied()
            .unwrap_or(self.source.default_tool_coefficient)
    }

    pub fn fallback_material(&self) -> MaterialKind {
        self.source.fallback_material
    }

    /// Materials with their own speed row
    pub fn list_materials(&self) -> Vec<MaterialKind> {
        let mut materials: Vec<_> = self.source.cutting_speeds.keys().copied().collect();
        materials.sort_by_key(|m| m.as_str());
        materials
    }
}
