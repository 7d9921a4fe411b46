//! Engine profiles and calculation requests
//!
//! A profile holds the machine limits, empirical coefficients, correction
//! thresholds and pass-planner template for one shop or machine. It is a
//! JSON document where every field is optional:
//!
//! ```json
//! {
//!   "limits": { "max_power_kw": 7.5, "max_rpm": 2500 },
//!   "coefficients": { "rigidity_derating": 0.6 },
//!   "strategy": { "preferred_max_passes": 10 }
//! }
//! ```
//!
//! A request is the flat record a dialog layer collects from the operator.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::cutting_data::{EmpiricalCoefficients, MaterialKind, ToolMaterial};
use crate::error::{EngineError, Result};
use crate::models::{
    Geometry, Limits, MaterialProperties, OperationType, StrategyConfig, ToolProperties,
};
use crate::recommendation::{Calculator, CorrectionPolicy, Recommendation};

/// Limits, coefficients and thresholds for one machine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineProfile {
    pub limits: Limits,
    pub coefficients: EmpiricalCoefficients,
    pub policy: CorrectionPolicy,
    pub strategy: StrategyConfig,
}

impl EngineProfile {
    pub fn from_json(json: &str) -> Result<Self> {
        let profile: EngineProfile = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| EngineError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let profile = Self::from_json(&content)?;
        info!(path = %path.display(), "loaded engine profile");
        Ok(profile)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.limits.validate()?;
        self.coefficients.validate()?;
        self.policy.validate()?;
        self.strategy.validate()
    }
}

/// Flat calculation input as gathered from an operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculationRequest {
    pub material: String,
    pub hardness_hb: Option<f64>,
    pub diameter_start: f64,
    pub diameter_end: f64,
    pub length: f64,
    pub machine_power: f64,
    pub max_rpm: f64,
    pub max_ap_by_tool: f64,
    pub max_feed: f64,
    pub tool_material: String,
    pub tool_radius: f64,
    pub tool_overhang: f64,
    pub is_coolant_used: bool,
    pub operation: String,
}

impl Default for CalculationRequest {
    fn default() -> Self {
        Self {
            material: "steel".to_string(),
            hardness_hb: None,
            diameter_start: 100.0,
            diameter_end: 90.0,
            length: 50.0,
            machine_power: 15.0,
            max_rpm: 3000.0,
            max_ap_by_tool: 6.0,
            max_feed: 0.4,
            tool_material: "carbide".to_string(),
            tool_radius: 0.8,
            tool_overhang: 30.0,
            is_coolant_used: true,
            operation: "roughing".to_string(),
        }
    }
}

impl CalculationRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Material family; names that match nothing are machined as steel.
    pub fn material_kind(&self) -> MaterialKind {
        self.material.parse().unwrap_or_else(|_| {
            warn!(material = %self.material, "unknown material, using steel");
            MaterialKind::Steel
        })
    }

    /// Insert material; names that match nothing are treated as carbide.
    pub fn tool_material(&self) -> ToolMaterial {
        self.tool_material.parse().unwrap_or_else(|_| {
            warn!(tool = %self.tool_material, "unknown tool material, using carbide");
            ToolMaterial::Carbide
        })
    }

    pub fn operation(&self) -> Result<OperationType> {
        self.operation.parse()
    }

    /// Build a calculator on top of a profile. Machine values in the
    /// request override the profile's limits.
    pub fn into_calculator(self, profile: &EngineProfile) -> Result<Calculator<'static>> {
        let limits = Limits {
            max_ap_by_tool_mm: self.max_ap_by_tool,
            max_feed_by_tool_mm_rev: self.max_feed,
            ..profile.limits.clone()
        }
        .with_max_power(self.machine_power)
        .with_max_rpm(self.max_rpm);

        let mut material = MaterialProperties::new(self.material_kind());
        if let Some(hb) = self.hardness_hb {
            material = material.with_hardness(hb);
        }

        let mut tool = ToolProperties::new(self.tool_material())
            .with_radius(self.tool_radius)
            .with_overhang(self.tool_overhang);
        tool.coolant = self.is_coolant_used;

        let geometry = Geometry::new(self.diameter_start, self.diameter_end, self.length)?;

        let profile = EngineProfile {
            limits,
            ..profile.clone()
        };
        Calculator::from_profile(&profile, material, tool, geometry)
    }

    /// Recommendation for the requested operation under default limits.
    pub fn recommend(self) -> Result<Recommendation> {
        let operation = self.operation()?;
        self.into_calculator(&EngineProfile::default())?
            .recommend(operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_profile_is_default() {
        let profile = EngineProfile::from_json("{}").unwrap();
        assert_eq!(profile, EngineProfile::default());
    }

    #[test]
    fn test_partial_profile() {
        let json = r#"{
            "limits": { "max_power_kw": 7.5, "safe_rpm_range": { "min": 50, "max": 1500 } },
            "coefficients": { "rigidity_derating": 0.6 },
            "strategy": { "preferred_max_passes": 10 }
        }"#;
        let profile = EngineProfile::from_json(json).unwrap();
        assert_eq!(profile.limits.max_power_kw, 7.5);
        assert_eq!(profile.limits.max_rpm, 3000.0);
        assert_eq!(profile.limits.safe_rpm_range.max, 1500.0);
        assert_eq!(profile.coefficients.rigidity_derating, 0.6);
        assert_eq!(profile.coefficients.spindle_efficiency, 0.8);
        assert_eq!(profile.strategy.preferred_max_passes, 10);
        assert_eq!(profile.policy, CorrectionPolicy::default());
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let json = r#"{ "coefficients": { "spindle_efficiency": 1.2 } }"#;
        assert!(matches!(
            EngineProfile::from_json(json),
            Err(EngineError::InvalidTable(_))
        ));
        assert!(matches!(
            EngineProfile::from_json("{ not json"),
            Err(EngineError::Json(_))
        ));
    }

    #[test]
    fn test_missing_profile_file() {
        let err = EngineProfile::from_file("/nonexistent/profile.json").unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
    }

    #[test]
    fn test_profile_json_roundtrip() {
        let profile = EngineProfile {
            limits: Limits::default().with_max_power(11.0),
            ..EngineProfile::default()
        };
        let json = profile.to_json().unwrap();
        assert_eq!(EngineProfile::from_json(&json).unwrap(), profile);
    }

    #[test]
    fn test_request_defaults_and_names() {
        let request = CalculationRequest::from_json(
            r#"{ "material": "Aluminium 7075", "tool_material": "PCD", "operation": "finish" }"#,
        )
        .unwrap();
        assert_eq!(request.diameter_start, 100.0);
        assert_eq!(request.material_kind(), MaterialKind::Aluminum);
        assert_eq!(request.tool_material(), ToolMaterial::Diamond);
        assert_eq!(request.operation().unwrap(), OperationType::Finishing);
    }

    #[test]
    fn test_unknown_material_falls_back_to_steel() {
        let request = CalculationRequest {
            material: "unobtainium".to_string(),
            ..CalculationRequest::default()
        };
        assert_eq!(request.material_kind(), MaterialKind::Steel);
    }

    #[test]
    fn test_request_builds_calculator() {
        let request = CalculationRequest {
            machine_power: 5.5,
            tool_overhang: 20.0,
            hardness_hb: Some(250.0),
            ..CalculationRequest::default()
        };
        let calc = request.into_calculator(&EngineProfile::default()).unwrap();
        assert_eq!(calc.limits().max_power_kw, 5.5);
        assert_eq!(calc.tool().tool_overhang_mm, 20.0);
        assert_eq!(calc.material().hardness_hb, Some(250.0));
        assert_eq!(calc.geometry().stock_per_side_mm(), 5.0);
    }

    #[test]
    fn test_request_rejects_heavy_stock_and_overhang() {
        let request = CalculationRequest {
            diameter_start: 400.0,
            diameter_end: 100.0,
            ..CalculationRequest::default()
        };
        assert!(matches!(
            request.recommend(),
            Err(EngineError::StockTooLarge { .. })
        ));

        let request = CalculationRequest {
            tool_overhang: 75.0,
            ..CalculationRequest::default()
        };
        assert!(matches!(
            request.recommend(),
            Err(EngineError::OverhangExceeded { .. })
        ));
    }

    #[test]
    fn test_request_recommend() {
        let rec = CalculationRequest::default().recommend().unwrap();
        assert_eq!(rec.context.operation, OperationType::Roughing);
        assert_eq!(rec.context.material, MaterialKind::Steel);
        assert!(rec.is_physically_possible);
    }
}
