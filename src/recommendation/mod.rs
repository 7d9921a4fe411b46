//! Cutting recommendations
//!
//! [`Calculator`] ties the cutting-data models and the pass planner
//! together: it looks up speed and feed for the requested operation,
//! bounds the depth of cut, plans the passes and estimates the spindle
//! power. A fixed sequence of corrections then checks the result against
//! the machine limits. Corrections that only warn leave the values alone;
//! every warning marks the recommendation as not physically possible
//! as-is, and the caller decides what to do with it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, instrument};

use crate::config::EngineProfile;
use crate::cutting_data::validators::{validate_recommendation, ValidationIssue};
use crate::cutting_data::{
    CuttingTables, DepthConstraint, DepthLimiter, EmpiricalCoefficients, MaterialKind,
    PowerEstimator, SpeedFeedSelector, ToolMaterial,
};
use crate::error::{EngineError, Result};
use crate::models::{
    Geometry, Limits, MaterialProperties, OperationType, StrategyConfig, ToolProperties,
};
use crate::passes::{plan, PassPlan, StockSpan};

/// Thresholds of the post-calculation corrections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionPolicy {
    /// Warn and shrink the depth above this share of machine power
    pub power_warning_ratio: f64,
    /// Depth multiplier applied when power is too close to the maximum
    pub ap_shrink_factor: f64,
    /// Warn above this share of machine rpm
    pub rpm_warning_ratio: f64,
    /// Warn above this many passes
    pub pass_warning_count: u32,
    /// A depth above this is treated as bad input
    pub absurd_ap_mm: f64,
    /// ...and clamped to this
    pub absurd_ap_clamp_mm: f64,
    /// Replan with a forced depth above this many passes
    pub pass_backstop_count: u32,
    /// Forced depth is stock per side over this divisor
    pub backstop_stock_divisor: f64,
}

impl Default for CorrectionPolicy {
    fn default() -> Self {
        Self {
            power_warning_ratio: 0.9,
            ap_shrink_factor: 0.7,
            rpm_warning_ratio: 0.9,
            pass_warning_count: 15,
            absurd_ap_mm: 10.0,
            absurd_ap_clamp_mm: 6.0,
            pass_backstop_count: 30,
            backstop_stock_divisor: 10.0,
        }
    }
}

impl CorrectionPolicy {
    pub fn validate(&self) -> Result<()> {
        let ratios = [
            ("power_warning_ratio", self.power_warning_ratio),
            ("ap_shrink_factor", self.ap_shrink_factor),
            ("rpm_warning_ratio", self.rpm_warning_ratio),
        ];
        for (name, value) in ratios {
            if !(value > 0.0 && value <= 1.0) {
                return Err(EngineError::InvalidLimits(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }
        if !(self.absurd_ap_clamp_mm > 0.0 && self.absurd_ap_clamp_mm <= self.absurd_ap_mm) {
            return Err(EngineError::InvalidLimits(format!(
                "absurd_ap_clamp_mm {} must be positive and at most absurd_ap_mm {}",
                self.absurd_ap_clamp_mm, self.absurd_ap_mm
            )));
        }
        if !(self.backstop_stock_divisor >= 1.0) {
            return Err(EngineError::InvalidLimits(format!(
                "backstop_stock_divisor must be at least 1, got {}",
                self.backstop_stock_divisor
            )));
        }
        Ok(())
    }
}

/// Inputs a recommendation was computed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationContext {
    pub material: MaterialKind,
    pub diameter_mm: f64,
    pub stock_per_side_mm: f64,
    pub operation: OperationType,
    pub tool_material: ToolMaterial,
    pub tool_radius_mm: f64,
}

/// Cutting parameters for one operation
///
/// `warnings` and `is_physically_possible` cover the cutting values only.
/// Problems with the pass plan itself, such as a single-pass fallback
/// deeper than the roughing maximum, are reported in
/// `passes_strategy.warnings`; check both lists before using a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "vc")]
    pub vc_m_min: f64,
    pub rpm: f64,
    #[serde(rename = "feed")]
    pub feed_mm_rev: f64,
    #[serde(rename = "ap")]
    pub ap_mm: f64,
    pub power_kw: f64,
    /// Limit that set the depth of cut before corrections
    pub depth_constraint: DepthConstraint,
    pub passes_strategy: PassPlan,
    pub total_passes: u32,
    pub warnings: Vec<String>,
    pub is_physically_possible: bool,
    pub context: RecommendationContext,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cutting speed: {} m/min", self.vc_m_min)?;
        writeln!(f, "Spindle speed: {} rpm", self.rpm)?;
        writeln!(f, "Feed: {} mm/rev", self.feed_mm_rev)?;
        writeln!(f, "Depth of cut: {} mm", self.ap_mm)?;
        writeln!(f, "Power: {} kW", self.power_kw)?;
        writeln!(f)?;
        write!(f, "{}", self.passes_strategy)?;

        if !self.warnings.is_empty() {
            writeln!(f)?;
            writeln!(f, "Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "  - {}", warning)?;
            }
        }
        Ok(())
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Computes recommendations for one setup: machine, material, tool and part
#[derive(Debug, Clone)]
pub struct Calculator<'t> {
    limits: Limits,
    material: MaterialProperties,
    tool: ToolProperties,
    geometry: Geometry,
    coefficients: EmpiricalCoefficients,
    policy: CorrectionPolicy,
    strategy: StrategyConfig,
    tables: &'t CuttingTables,
}

impl Calculator<'static> {
    /// Calculator with built-in tables and default coefficients.
    pub fn new(
        limits: Limits,
        material: MaterialProperties,
        tool: ToolProperties,
        geometry: Geometry,
    ) -> Result<Self> {
        Calculator::with_tables(
            limits,
            material,
            tool,
            geometry,
            EmpiricalCoefficients::default(),
            CuttingTables::builtin(),
        )
    }

    /// Calculator configured from an engine profile.
    pub fn from_profile(
        profile: &EngineProfile,
        material: MaterialProperties,
        tool: ToolProperties,
        geometry: Geometry,
    ) -> Result<Self> {
        profile.validate()?;
        Ok(Calculator::with_tables(
            profile.limits.clone(),
            material,
            tool,
            geometry,
            profile.coefficients.clone(),
            CuttingTables::builtin(),
        )?
        .with_policy(profile.policy.clone())
        .with_strategy(profile.strategy.clone()))
    }
}

impl<'t> Calculator<'t> {
    pub fn with_tables(
        limits: Limits,
        material: MaterialProperties,
        tool: ToolProperties,
        geometry: Geometry,
        coefficients: EmpiricalCoefficients,
        tables: &'t CuttingTables,
    ) -> Result<Self> {
        limits.validate()?;
        material.validate()?;
        tool.validate(&limits)?;
        geometry.validate()?;
        coefficients.validate()?;

        Ok(Self {
            limits,
            material,
            tool,
            geometry,
            coefficients,
            policy: CorrectionPolicy::default(),
            strategy: StrategyConfig::default(),
            tables,
        })
    }

    pub fn with_policy(mut self, policy: CorrectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Template for the pass planner. Operation, side and maximum
    /// roughing depth are set per request.
    pub fn with_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn material(&self) -> &MaterialProperties {
        &self.material
    }

    pub fn tool(&self) -> &ToolProperties {
        &self.tool
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn depth_limiter(&self) -> DepthLimiter<'_> {
        DepthLimiter::new(&self.limits, &self.material, &self.tool, &self.coefficients)
    }

    pub fn speed_feed_selector(&self) -> SpeedFeedSelector<'_> {
        SpeedFeedSelector::new(
            &self.limits,
            &self.material,
            &self.tool,
            &self.coefficients,
            self.tables,
        )
    }

    pub fn power_estimator(&self) -> PowerEstimator<'_> {
        PowerEstimator::new(&self.material, &self.coefficients)
    }

    fn strategy_config(&self, operation: OperationType) -> StrategyConfig {
        let max_ap_rough_mm = self.limits.safe_ap_range.max;
        StrategyConfig {
            operation_type: operation,
            is_external: true,
            max_ap_rough_mm,
            // The safe range may sit entirely below the template minimum
            min_ap_mm: self.strategy.min_ap_mm.min(max_ap_rough_mm),
            ..self.strategy.clone()
        }
    }

    /// Plan passes for the part at a given depth, annotated with the
    /// cutting data of each pass type.
    pub fn pass_strategy(&self, operation: OperationType, target_ap_mm: f64) -> Result<PassPlan> {
        let span = StockSpan::new(self.geometry.diameter_start_mm, self.geometry.diameter_end_mm);
        let target = self.limits.safe_ap_range.clamp(target_ap_mm);
        let mut plan = plan(&span, &self.strategy_config(operation), Some(target))?;

        let selector = self.speed_feed_selector();
        for pass in &mut plan.passes {
            let op = OperationType::from(pass.pass_type);
            let vc = selector.base_cutting_speed(op);
            pass.vc_m_min = Some(round_to(vc, 1));
            pass.feed_mm_rev = Some(round_to(selector.base_feed(op), 3));
            pass.rpm = Some(round_to(selector.rpm(vc, pass.diameter_before_mm), 1));
        }

        Ok(plan)
    }

    /// Recommendation for one operation.
    #[instrument(skip(self), fields(material = %self.material.kind, tool = %self.tool.insert_material))]
    pub fn recommend(&self, operation: OperationType) -> Result<Recommendation> {
        let selector = self.speed_feed_selector();
        let estimator = self.power_estimator();
        let policy = &self.policy;
        let stock = self.geometry.stock_per_side_mm();
        let mut warnings = Vec::new();

        let vc = selector.base_cutting_speed(operation);
        let feed = selector.base_feed(operation);
        let rpm = selector.rpm(vc, self.geometry.diameter_current_mm());
        let (mut ap, depth_constraint) = self.depth_limiter().safe_ap_with_constraint(vc, feed);
        let mut strategy = self.pass_strategy(operation, ap)?;
        let mut power = estimator.power(ap, feed, vc);
        debug!(vc, feed, rpm, ap, power, passes = strategy.total_passes, "base values");

        if power > self.limits.max_power_kw * policy.power_warning_ratio {
            warnings.push(format!(
                "Estimated power {:.2} kW is close to the machine maximum {} kW; depth reduced",
                power, self.limits.max_power_kw
            ));
            ap *= policy.ap_shrink_factor;
            power = estimator.power(ap, feed, vc);
        }

        if rpm > self.limits.max_rpm * policy.rpm_warning_ratio {
            warnings.push(format!(
                "Spindle speed {:.0} rpm is close to the machine maximum {} rpm",
                rpm, self.limits.max_rpm
            ));
        }

        if strategy.total_passes > policy.pass_warning_count {
            warnings.push(format!(
                "{} passes is a lot; consider a tool rated for deeper cuts",
                strategy.total_passes
            ));
        }

        if ap > policy.absurd_ap_mm {
            warnings.push(format!(
                "Depth of cut {:.2} mm is unrealistic; limited to {} mm",
                ap, policy.absurd_ap_clamp_mm
            ));
            ap = ap.min(policy.absurd_ap_clamp_mm);
        }

        if strategy.total_passes > policy.pass_backstop_count {
            warnings.push(format!(
                "{} passes is not workable; replanned with a deeper cut",
                strategy.total_passes
            ));
            ap = self
                .limits
                .safe_ap_range
                .clamp(stock / policy.backstop_stock_divisor);
            strategy = self.pass_strategy(operation, ap)?;
            debug!(ap, passes = strategy.total_passes, "pass backstop replanned");
        }

        let is_physically_possible = warnings.is_empty();
        Ok(Recommendation {
            vc_m_min: round_to(vc, 1),
            rpm: round_to(rpm, 1),
            feed_mm_rev: round_to(feed, 3),
            ap_mm: round_to(ap, 2),
            power_kw: round_to(power, 2),
            depth_constraint,
            total_passes: strategy.total_passes,
            passes_strategy: strategy,
            warnings,
            is_physically_possible,
            context: RecommendationContext {
                material: self.material.kind,
                diameter_mm: self.geometry.diameter_current_mm(),
                stock_per_side_mm: stock,
                operation,
                tool_material: self.tool.insert_material,
                tool_radius_mm: self.tool.insert_radius_mm,
            },
        })
    }

    /// Check a recommendation against this calculator's limits and tool.
    pub fn validate(&self, rec: &Recommendation) -> Vec<ValidationIssue> {
        validate_recommendation(rec, &self.limits, &self.tool, &self.power_estimator())
    }

    /// Recommendations for every operation. A failure in one operation is
    /// kept in its slot and does not stop the others.
    pub fn alternative_recommendations(&self) -> BTreeMap<OperationType, Result<Recommendation>> {
        OperationType::ALL
            .iter()
            .map(|op| (*op, self.recommend(*op)))
            .collect()
    }
}
