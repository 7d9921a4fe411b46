//! Cutting data for turning
//!
//! Base speeds and feeds for common workpiece materials plus the empirical
//! models built on top of them:
//! - depth of cut bounded by spindle power, insert strength and setup rigidity
//! - cutting speed corrected for hardness and insert material
//! - feed scaled by nose radius
//! - spindle power from the specific cutting force (kc1) model
//!
//! The coefficients are shop-floor rules of thumb, not metallurgy. They are
//! kept as named, overridable values in [`EmpiricalCoefficients`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

pub mod calculations;
pub mod tables;
pub mod validators;

pub use calculations::*;
pub use tables::*;

/// Insert material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolMaterial {
    #[serde(rename = "hss")]
    HSS, // High Speed Steel
    #[serde(rename = "cobalt")]
    Cobalt, // HSS with cobalt
    #[serde(rename = "carbide")]
    Carbide,
    #[serde(rename = "coated_carbide")]
    CoatedCarbide, // TiAlN, TiN coated
    #[serde(rename = "ceramic")]
    Ceramic,
    #[serde(rename = "cbn")]
    CBN, // Cubic Boron Nitride
    #[serde(rename = "diamond")]
    Diamond, // PCD, non-ferrous only
}

impl fmt::Display for ToolMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolMaterial::HSS => write!(f, "HSS"),
            ToolMaterial::Cobalt => write!(f, "Cobalt"),
            ToolMaterial::Carbide => write!(f, "Carbide"),
            ToolMaterial::CoatedCarbide => write!(f, "Coated Carbide"),
            ToolMaterial::Ceramic => write!(f, "Ceramic"),
            ToolMaterial::CBN => write!(f, "CBN"),
            ToolMaterial::Diamond => write!(f, "Diamond"),
        }
    }
}

impl FromStr for ToolMaterial {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let material = match lower.as_str() {
            "hss" | "high speed steel" => ToolMaterial::HSS,
            "cobalt" | "hss-co" => ToolMaterial::Cobalt,
            "carbide" | "hard alloy" => ToolMaterial::Carbide,
            "coated carbide" | "coated_carbide" => ToolMaterial::CoatedCarbide,
            "ceramic" => ToolMaterial::Ceramic,
            "cbn" => ToolMaterial::CBN,
            "diamond" | "pcd" => ToolMaterial::Diamond,
            _ => {
                return Err(EngineError::UnknownName {
                    kind: "tool material",
                    value: s.to_string(),
                })
            }
        };
        Ok(material)
    }
}

/// Workpiece material family used to select a speed table row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    Steel,
    Aluminum,
    StainlessSteel,
    Titanium,
    Copper,
    CastIron,
}

impl MaterialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialKind::Steel => "steel",
            MaterialKind::Aluminum => "aluminum",
            MaterialKind::StainlessSteel => "stainless_steel",
            MaterialKind::Titanium => "titanium",
            MaterialKind::Copper => "copper",
            MaterialKind::CastIron => "cast_iron",
        }
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaterialKind {
    type Err = EngineError;

    /// Accepts loose names as typed by operators ("aluminium", "stainless",
    /// "brass", ...). Order matters: stainless is checked before steel.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let kind = if lower.contains("stainless") || lower.contains("inox") {
            MaterialKind::StainlessSteel
        } else if lower.contains("alum") {
            MaterialKind::Aluminum
        } else if lower.contains("titan") {
            MaterialKind::Titanium
        } else if lower.contains("cast") {
            MaterialKind::CastIron
        } else if lower.contains("copper") || lower.contains("brass") || lower.contains("bronze")
        {
            MaterialKind::Copper
        } else if lower.contains("steel") {
            MaterialKind::Steel
        } else {
            return Err(EngineError::UnknownName {
                kind: "material",
                value: s.to_string(),
            });
        };
        Ok(kind)
    }
}

/// Empirical constants of the depth, feed and power models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmpiricalCoefficients {
    /// Spindle drive efficiency (η)
    pub spindle_efficiency: f64,
    /// Depth of cut may not exceed this share of the nose radius
    pub nose_radius_depth_ratio: f64,
    /// Depth of cut allowed by a perfectly rigid setup
    pub rigidity_base_ap_mm: f64,
    /// Share of the base depth lost at maximum overhang
    pub rigidity_derating: f64,
    /// Nose radius the base feed table is written for
    pub reference_insert_radius_mm: f64,
    /// Steel hardness the base speed table is written for
    pub reference_hardness_hb: f64,
    /// Softer steel is not sped up beyond this hardness
    pub min_hardness_hb: f64,
}

impl Default for EmpiricalCoefficients {
    fn default() -> Self {
        Self {
            spindle_efficiency: 0.8,
            nose_radius_depth_ratio: 0.67,
            rigidity_base_ap_mm: 4.0,
            rigidity_derating: 0.5,
            reference_insert_radius_mm: 0.8,
            reference_hardness_hb: 200.0,
            min_hardness_hb: 100.0,
        }
    }
}

impl EmpiricalCoefficients {
    pub fn validate(&self) -> Result<(), EngineError> {
        let values = [
            ("spindle_efficiency", self.spindle_efficiency),
            ("nose_radius_depth_ratio", self.nose_radius_depth_ratio),
            ("rigidity_base_ap_mm", self.rigidity_base_ap_mm),
            ("reference_insert_radius_mm", self.reference_insert_radius_mm),
            ("reference_hardness_hb", self.reference_hardness_hb),
            ("min_hardness_hb", self.min_hardness_hb),
        ];
        for (name, value) in values {
            if !(value > 0.0) {
                return Err(EngineError::InvalidTable(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if self.spindle_efficiency > 1.0 {
            return Err(EngineError::InvalidTable(format!(
                "spindle_efficiency must not exceed 1.0, got {}",
                self.spindle_efficiency
            )));
        }
        if !(0.0..1.0).contains(&self.rigidity_derating) {
            return Err(EngineError::InvalidTable(format!(
                "rigidity_derating must be in [0, 1), got {}",
                self.rigidity_derating
            )));
        }
        Ok(())
    }
}
