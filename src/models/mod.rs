//! Value models for a turning calculation
//!
//! Every record here is built fresh per request and is plain data: limits of
//! the machine and tool, the workpiece material, the insert, the part
//! geometry, and the configuration of the pass planner. Units are fixed
//! throughout the crate: mm, mm/rev, m/min, rev/min, kW, N.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::cutting_data::{MaterialKind, ToolMaterial};
use crate::error::{EngineError, Result};

/// Largest stock per side accepted before the input is treated as a typo.
pub const MAX_STOCK_PER_SIDE_MM: f64 = 100.0;

/// Stock above this per side counts as heavy stock.
pub const HEAVY_STOCK_MM: f64 = 10.0;

/// Kind of machining operation requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Roughing,
    SemiFinishing,
    Finishing,
}

impl OperationType {
    pub const ALL: [OperationType; 3] = [
        OperationType::Roughing,
        OperationType::SemiFinishing,
        OperationType::Finishing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Roughing => "roughing",
            OperationType::SemiFinishing => "semi_finishing",
            OperationType::Finishing => "finishing",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase().replace(['-', ' '], "_");
        match lower.as_str() {
            "roughing" | "rough" => Ok(OperationType::Roughing),
            "semi_finishing" | "semi_finish" | "semifinishing" | "semi" => {
                Ok(OperationType::SemiFinishing)
            }
            "finishing" | "finish" => Ok(OperationType::Finishing),
            _ => Err(EngineError::UnknownName {
                kind: "operation type",
                value: s.to_string(),
            }),
        }
    }
}

/// Role of a single pass within a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassType {
    Roughing,
    SemiFinishing,
    Finishing,
}

impl From<OperationType> for PassType {
    fn from(op: OperationType) -> Self {
        match op {
            OperationType::Roughing => PassType::Roughing,
            OperationType::SemiFinishing => PassType::SemiFinishing,
            OperationType::Finishing => PassType::Finishing,
        }
    }
}

impl From<PassType> for OperationType {
    fn from(pass_type: PassType) -> Self {
        match pass_type {
            PassType::Roughing => OperationType::Roughing,
            PassType::SemiFinishing => OperationType::SemiFinishing,
            PassType::Finishing => OperationType::Finishing,
        }
    }
}

impl fmt::Display for PassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassType::Roughing => write!(f, "roughing"),
            PassType::SemiFinishing => write!(f, "semi_finishing"),
            PassType::Finishing => write!(f, "finishing"),
        }
    }
}

/// Closed interval `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafeRange {
    pub min: f64,
    pub max: f64,
}

impl SafeRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    fn check(&self, name: &str) -> Result<()> {
        if !(self.min > 0.0 && self.max > 0.0) {
            return Err(EngineError::InvalidLimits(format!(
                "{} must be positive, got ({}, {})",
                name, self.min, self.max
            )));
        }
        if self.min > self.max {
            return Err(EngineError::InvalidLimits(format!(
                "{} min {} exceeds max {}",
                name, self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Machine, tool and rigidity limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    // Machine
    pub max_power_kw: f64,
    pub max_rpm: f64,
    pub max_cutting_force_n: f64,

    // Tool
    pub max_ap_by_tool_mm: f64,
    pub max_feed_by_tool_mm_rev: f64,
    pub min_insert_radius_mm: f64,

    // Rigidity
    pub max_tool_overhang_mm: f64,
    pub recommended_max_overhang_mm: f64,

    // Safe working ranges
    pub safe_ap_range: SafeRange,
    pub safe_feed_range: SafeRange,
    pub safe_rpm_range: SafeRange,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_power_kw: 15.0,
            max_rpm: 3000.0,
            max_cutting_force_n: 5000.0,
            max_ap_by_tool_mm: 6.0,
            max_feed_by_tool_mm_rev: 0.4,
            min_insert_radius_mm: 0.4,
            max_tool_overhang_mm: 50.0,
            recommended_max_overhang_mm: 30.0,
            safe_ap_range: SafeRange::new(0.5, 6.0),
            safe_feed_range: SafeRange::new(0.05, 0.3),
            safe_rpm_range: SafeRange::new(100.0, 2000.0),
        }
    }
}

impl Limits {
    pub fn with_max_power(mut self, kw: f64) -> Self {
        self.max_power_kw = kw;
        self
    }

    pub fn with_max_rpm(mut self, rpm: f64) -> Self {
        self.max_rpm = rpm;
        self
    }

    pub fn with_max_overhang(mut self, mm: f64) -> Self {
        self.max_tool_overhang_mm = mm;
        self
    }

    /// Check that every value is positive and every range is ordered.
    pub fn validate(&self) -> Result<()> {
        let scalars = [
            ("max_power_kw", self.max_power_kw),
            ("max_rpm", self.max_rpm),
            ("max_cutting_force_n", self.max_cutting_force_n),
            ("max_ap_by_tool_mm", self.max_ap_by_tool_mm),
            ("max_feed_by_tool_mm_rev", self.max_feed_by_tool_mm_rev),
            ("min_insert_radius_mm", self.min_insert_radius_mm),
            ("max_tool_overhang_mm", self.max_tool_overhang_mm),
            ("recommended_max_overhang_mm", self.recommended_max_overhang_mm),
        ];
        for (name, value) in scalars {
            if !(value > 0.0) || !value.is_finite() {
                return Err(EngineError::InvalidLimits(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        self.safe_ap_range.check("safe_ap_range")?;
        self.safe_feed_range.check("safe_feed_range")?;
        self.safe_rpm_range.check("safe_rpm_range")?;
        Ok(())
    }
}

/// Workpiece material as used by the force and speed models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialProperties {
    pub kind: MaterialKind,
    pub hardness_hb: Option<f64>,
    /// Specific cutting force, N/mm²
    pub kc1: f64,
    pub mc: f64,
    pub gamma: f64,
}

impl MaterialProperties {
    pub fn new(kind: MaterialKind) -> Self {
        Self {
            kind,
            hardness_hb: None,
            kc1: 1800.0,
            mc: 0.28,
            gamma: 0.75,
        }
    }

    pub fn with_hardness(mut self, hb: f64) -> Self {
        self.hardness_hb = Some(hb);
        self
    }

    pub fn with_kc1(mut self, kc1: f64) -> Self {
        self.kc1 = kc1;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.kc1 > 0.0) {
            return Err(EngineError::InvalidMaterial(format!(
                "kc1 must be positive, got {}",
                self.kc1
            )));
        }
        if let Some(hb) = self.hardness_hb {
            if !(hb > 0.0) {
                return Err(EngineError::InvalidMaterial(format!(
                    "hardness must be positive, got {} HB",
                    hb
                )));
            }
        }
        Ok(())
    }
}

impl Default for MaterialProperties {
    fn default() -> Self {
        Self::new(MaterialKind::Steel)
    }
}

/// Turning insert and its setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolProperties {
    pub insert_material: ToolMaterial,
    pub insert_radius_mm: f64,
    pub tool_overhang_mm: f64,
    pub tool_angle_deg: f64,
    pub coolant: bool,
}

impl Default for ToolProperties {
    fn default() -> Self {
        Self {
            insert_material: ToolMaterial::Carbide,
            insert_radius_mm: 0.8,
            tool_overhang_mm: 30.0,
            tool_angle_deg: 80.0,
            coolant: true,
        }
    }
}

impl ToolProperties {
    pub fn new(insert_material: ToolMaterial) -> Self {
        Self {
            insert_material,
            ..Self::default()
        }
    }

    pub fn with_radius(mut self, mm: f64) -> Self {
        self.insert_radius_mm = mm;
        self
    }

    pub fn with_overhang(mut self, mm: f64) -> Self {
        self.tool_overhang_mm = mm;
        self
    }

    /// Validate the tool against the machine limits it will run under.
    pub fn validate(&self, limits: &Limits) -> Result<()> {
        if !(self.insert_radius_mm > 0.0) {
            return Err(EngineError::InvalidTool(format!(
                "insert radius must be positive, got {} mm",
                self.insert_radius_mm
            )));
        }
        if !(self.tool_overhang_mm >= 0.0) {
            return Err(EngineError::InvalidTool(format!(
                "overhang must not be negative, got {} mm",
                self.tool_overhang_mm
            )));
        }
        if self.tool_overhang_mm > limits.max_tool_overhang_mm {
            return Err(EngineError::OverhangExceeded {
                overhang: self.tool_overhang_mm,
                max: limits.max_tool_overhang_mm,
            });
        }
        Ok(())
    }
}

/// External turning geometry: the part shrinks from start to end diameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub diameter_start_mm: f64,
    pub diameter_end_mm: f64,
    pub length_mm: f64,
}

impl Geometry {
    pub fn new(diameter_start_mm: f64, diameter_end_mm: f64, length_mm: f64) -> Result<Self> {
        let geometry = Self {
            diameter_start_mm,
            diameter_end_mm,
            length_mm,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    pub fn validate(&self) -> Result<()> {
        if self.diameter_start_mm <= self.diameter_end_mm {
            return Err(EngineError::DiameterOrder {
                start: self.diameter_start_mm,
                end: self.diameter_end_mm,
            });
        }
        if !(self.diameter_end_mm > 0.0) {
            return Err(EngineError::InvalidGeometry(format!(
                "end diameter must be positive, got {} mm",
                self.diameter_end_mm
            )));
        }
        if !(self.length_mm > 0.0) {
            return Err(EngineError::InvalidGeometry(format!(
                "length must be positive, got {} mm",
                self.length_mm
            )));
        }
        check_stock(self.stock_per_side_mm())
    }

    /// Diameter the tool meets first; recommendations are computed here.
    pub fn diameter_current_mm(&self) -> f64 {
        self.diameter_start_mm
    }

    pub fn stock_per_side_mm(&self) -> f64 {
        (self.diameter_start_mm - self.diameter_end_mm) / 2.0
    }

    pub fn stock_volume_mm3(&self) -> f64 {
        let avg_diameter = (self.diameter_start_mm + self.diameter_end_mm) / 2.0;
        self.stock_per_side_mm() * avg_diameter * std::f64::consts::PI * self.length_mm
    }

    pub fn is_heavy_stock(&self) -> bool {
        self.stock_per_side_mm() > HEAVY_STOCK_MM
    }
}

/// Stock must be positive and not absurdly large.
pub(crate) fn check_stock(stock: f64) -> Result<()> {
    if !(stock > 0.0) {
        return Err(EngineError::NonPositiveStock { stock });
    }
    if stock > MAX_STOCK_PER_SIDE_MM {
        return Err(EngineError::StockTooLarge {
            stock,
            max: MAX_STOCK_PER_SIDE_MM,
        });
    }
    Ok(())
}

/// One machining pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pass {
    pub number: u32,
    #[serde(rename = "type")]
    pub pass_type: PassType,
    pub ap_mm: f64,
    pub diameter_before_mm: f64,
    pub diameter_after_mm: f64,

    // Cutting data for this pass, filled in by the recommendation pipeline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vc_m_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_mm_rev: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpm: Option<f64>,
}

impl Pass {
    pub fn new(
        number: u32,
        pass_type: PassType,
        ap_mm: f64,
        diameter_before_mm: f64,
        diameter_after_mm: f64,
    ) -> Self {
        Self {
            number,
            pass_type,
            ap_mm,
            diameter_before_mm,
            diameter_after_mm,
            vc_m_min: None,
            feed_mm_rev: None,
            rpm: None,
        }
    }

    pub fn stock_removed_mm(&self) -> f64 {
        (self.diameter_before_mm - self.diameter_after_mm).abs() / 2.0
    }
}

/// Configuration of the pass planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub operation_type: OperationType,
    pub is_external: bool,

    pub max_ap_rough_mm: f64,
    pub max_ap_finish_mm: f64,
    pub min_ap_mm: f64,

    /// Hard ceiling on the number of passes
    pub max_total_passes: u32,
    /// Soft target; plans above it are flagged as unrealistic
    pub preferred_max_passes: u32,

    pub semi_finish_stock_mm: f64,
    pub require_finish_pass: bool,

    pub tolerance_mm: f64,
    pub surface_roughness_ra: Option<f64>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            operation_type: OperationType::Roughing,
            is_external: true,
            max_ap_rough_mm: 6.0,
            max_ap_finish_mm: 0.8,
            min_ap_mm: 0.1,
            max_total_passes: 20,
            preferred_max_passes: 12,
            semi_finish_stock_mm: 1.0,
            require_finish_pass: true,
            tolerance_mm: 0.05,
            surface_roughness_ra: None,
        }
    }
}

impl StrategyConfig {
    pub fn new(operation_type: OperationType) -> Self {
        Self {
            operation_type,
            ..Self::default()
        }
    }

    pub fn with_max_ap_rough(mut self, mm: f64) -> Self {
        self.max_ap_rough_mm = mm;
        self
    }

    pub fn with_max_ap_finish(mut self, mm: f64) -> Self {
        self.max_ap_finish_mm = mm;
        self
    }

    pub fn with_min_ap(mut self, mm: f64) -> Self {
        self.min_ap_mm = mm;
        self
    }

    pub fn with_max_total_passes(mut self, passes: u32) -> Self {
        self.max_total_passes = passes;
        self
    }

    pub fn with_preferred_max_passes(mut self, passes: u32) -> Self {
        self.preferred_max_passes = passes;
        self
    }

    pub fn with_semi_finish_stock(mut self, mm: f64) -> Self {
        self.semi_finish_stock_mm = mm;
        self
    }

    pub fn with_finish_pass(mut self, required: bool) -> Self {
        self.require_finish_pass = required;
        self
    }

    pub fn with_tolerance(mut self, mm: f64) -> Self {
        self.tolerance_mm = mm;
        self
    }

    pub fn internal(mut self) -> Self {
        self.is_external = false;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let depths = [
            ("max_ap_rough_mm", self.max_ap_rough_mm),
            ("max_ap_finish_mm", self.max_ap_finish_mm),
            ("min_ap_mm", self.min_ap_mm),
            ("semi_finish_stock_mm", self.semi_finish_stock_mm),
            ("tolerance_mm", self.tolerance_mm),
        ];
        for (name, value) in depths {
            if !(value > 0.0) || !value.is_finite() {
                return Err(EngineError::InvalidStrategy(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if self.min_ap_mm > self.max_ap_rough_mm {
            return Err(EngineError::InvalidStrategy(format!(
                "min_ap_mm {} exceeds max_ap_rough_mm {}",
                self.min_ap_mm, self.max_ap_rough_mm
            )));
        }
        if self.max_total_passes == 0 || self.preferred_max_passes == 0 {
            return Err(EngineError::InvalidStrategy(
                "pass limits must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
