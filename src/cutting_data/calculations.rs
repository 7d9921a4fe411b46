//! Depth, speed, feed and power calculations

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use tracing::debug;

use super::*;
use crate::models::{Limits, MaterialProperties, OperationType, ToolProperties};

/// Which limit produced the safe depth of cut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthConstraint {
    Power,
    Tool,
    Rigidity,
    /// All limits fell below the safe minimum and the floor was applied
    SafeMinimum,
}

/// Bounds the depth of cut by spindle power, insert strength and rigidity
#[derive(Debug, Clone, Copy)]
pub struct DepthLimiter<'a> {
    limits: &'a Limits,
    material: &'a MaterialProperties,
    tool: &'a ToolProperties,
    coefficients: &'a EmpiricalCoefficients,
}

impl<'a> DepthLimiter<'a> {
    pub fn new(
        limits: &'a Limits,
        material: &'a MaterialProperties,
        tool: &'a ToolProperties,
        coefficients: &'a EmpiricalCoefficients,
    ) -> Self {
        Self {
            limits,
            material,
            tool,
            coefficients,
        }
    }

    /// Deepest cut the spindle can drive at this speed and feed.
    ///
    /// ap = (P_max · 60000 · η) / (kc1 · f · vc), capped at the safe maximum.
    pub fn by_power(&self, vc: f64, feed: f64) -> f64 {
        if vc <= 0.0 || feed <= 0.0 {
            return self.limits.safe_ap_range.min;
        }

        let ap = (self.limits.max_power_kw * 60000.0 * self.coefficients.spindle_efficiency)
            / (self.material.kc1 * feed * vc);

        ap.min(self.limits.safe_ap_range.max)
    }

    /// Depth allowed by the insert: a share of the nose radius, the tool's
    /// own limit and the safe maximum, whichever is smallest.
    pub fn by_tool(&self) -> f64 {
        let by_radius = self.tool.insert_radius_mm * self.coefficients.nose_radius_depth_ratio;
        by_radius
            .min(self.limits.max_ap_by_tool_mm)
            .min(self.limits.safe_ap_range.max)
    }

    /// Depth allowed by setup rigidity, derated linearly with overhang.
    pub fn by_rigidity(&self) -> f64 {
        let rigidity_factor = 1.0
            - (self.tool.tool_overhang_mm / self.limits.max_tool_overhang_mm)
                * self.coefficients.rigidity_derating;

        self.coefficients.rigidity_base_ap_mm * rigidity_factor
    }

    /// Smallest of the three limits, floored at the safe minimum.
    pub fn safe_ap(&self, vc: f64, feed: f64) -> f64 {
        self.safe_ap_with_constraint(vc, feed).0
    }

    pub fn safe_ap_with_constraint(&self, vc: f64, feed: f64) -> (f64, DepthConstraint) {
        let candidates = [
            (self.by_power(vc, feed), DepthConstraint::Power),
            (self.by_tool(), DepthConstraint::Tool),
            (self.by_rigidity(), DepthConstraint::Rigidity),
        ];

        let (mut ap, mut binding) = candidates[0];
        for (value, constraint) in &candidates[1..] {
            if *value < ap {
                ap = *value;
                binding = *constraint;
            }
        }

        if !(ap >= self.limits.safe_ap_range.min) {
            ap = self.limits.safe_ap_range.min;
            binding = DepthConstraint::SafeMinimum;
        }

        debug!(ap, ?binding, vc, feed, "safe depth of cut");
        (ap, binding)
    }
}

/// Looks up and corrects base cutting speed and feed
#[derive(Debug, Clone, Copy)]
pub struct SpeedFeedSelector<'a> {
    limits: &'a Limits,
    material: &'a MaterialProperties,
    tool: &'a ToolProperties,
    coefficients: &'a EmpiricalCoefficients,
    tables: &'a CuttingTables,
}

impl<'a> SpeedFeedSelector<'a> {
    pub fn new(
        limits: &'a Limits,
        material: &'a MaterialProperties,
        tool: &'a ToolProperties,
        coefficients: &'a EmpiricalCoefficients,
        tables: &'a CuttingTables,
    ) -> Self {
        Self {
            limits,
            material,
            tool,
            coefficients,
            tables,
        }
    }

    /// Cutting speed in m/min for the operation.
    ///
    /// Steel rows are scaled by reference hardness / actual hardness, with
    /// the hardness floored so soft steel is never sped up past 2x. The
    /// result is multiplied by the insert material coefficient.
    pub fn base_cutting_speed(&self, operation: OperationType) -> f64 {
        let lookup = self.tables.cutting_speed(self.material.kind, operation);
        let mut vc = lookup.vc_m_min;

        if lookup.material == MaterialKind::Steel {
            if let Some(hb) = self.material.hardness_hb {
                let hardness_factor =
                    self.coefficients.reference_hardness_hb / hb.max(self.coefficients.min_hardness_hb);
                vc *= hardness_factor;
            }
        }

        vc * self.tables.tool_coefficient(self.tool.insert_material)
    }

    /// Feed in mm/rev, scaled by nose radius and clamped to the tool limit
    /// and then to the safe feed range.
    pub fn base_feed(&self, operation: OperationType) -> f64 {
        let radius_factor =
            self.tool.insert_radius_mm / self.coefficients.reference_insert_radius_mm;
        let feed = self.tables.feed(operation) * radius_factor;

        let feed = feed.min(self.limits.max_feed_by_tool_mm_rev);
        self.limits.safe_feed_range.clamp(feed)
    }

    /// Spindle speed n = 1000·vc / (π·D), clamped to the machine maximum
    /// and the safe rpm range.
    pub fn rpm(&self, vc: f64, diameter_mm: f64) -> f64 {
        if diameter_mm <= 0.0 {
            return self.limits.safe_rpm_range.min;
        }

        let rpm = (1000.0 * vc) / (PI * diameter_mm);
        let rpm = rpm.max(0.0).min(self.limits.max_rpm);

        self.limits.safe_rpm_range.clamp(rpm)
    }
}

/// Spindle power and cutting force from the specific cutting force model
#[derive(Debug, Clone, Copy)]
pub struct PowerEstimator<'a> {
    material: &'a MaterialProperties,
    coefficients: &'a EmpiricalCoefficients,
}

impl<'a> PowerEstimator<'a> {
    pub fn new(material: &'a MaterialProperties, coefficients: &'a EmpiricalCoefficients) -> Self {
        Self {
            material,
            coefficients,
        }
    }

    /// Required spindle power in kW: P = kc1·ap·f·vc / (60000·η).
    pub fn power(&self, ap: f64, feed: f64, vc: f64) -> f64 {
        if ap <= 0.0 || feed <= 0.0 || vc <= 0.0 {
            return 0.0;
        }

        (self.material.kc1 * ap * feed * vc) / (60000.0 * self.coefficients.spindle_efficiency)
    }

    /// Main cutting force in N: Fc = kc1·ap·f.
    pub fn cutting_force(&self, ap: f64, feed: f64) -> f64 {
        if ap <= 0.0 || feed <= 0.0 {
            return 0.0;
        }

        self.material.kc1 * ap * feed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Setup {
        limits: Limits,
        material: MaterialProperties,
        tool: ToolProperties,
        coefficients: EmpiricalCoefficients,
    }

    impl Setup {
        fn new() -> Self {
            Self {
                limits: Limits::default(),
                material: MaterialProperties::new(MaterialKind::Steel),
                tool: ToolProperties::default(),
                coefficients: EmpiricalCoefficients::default(),
            }
        }

        fn limiter(&self) -> DepthLimiter<'_> {
            DepthLimiter::new(&self.limits, &self.material, &self.tool, &self.coefficients)
        }

        fn selector(&self) -> SpeedFeedSelector<'_> {
            SpeedFeedSelector::new(
                &self.limits,
                &self.material,
                &self.tool,
                &self.coefficients,
                CuttingTables::builtin(),
            )
        }
    }

    #[test]
    fn test_ap_by_power() {
        let s = Setup::new();
        // 15 kW · 60000 · 0.8 / (1800 · 0.2 · 80) = 25 mm, capped at 6
        assert_eq!(s.limiter().by_power(80.0, 0.2), 6.0);

        // 15 · 60000 · 0.8 / (1800 · 0.3 · 500) = 2.667
        let ap = s.limiter().by_power(500.0, 0.3);
        assert!((ap - 2.6667).abs() < 1e-3, "got {}", ap);
    }

    #[test]
    fn test_ap_by_power_degenerate_inputs() {
        let s = Setup::new();
        assert_eq!(s.limiter().by_power(0.0, 0.2), 0.5);
        assert_eq!(s.limiter().by_power(80.0, -1.0), 0.5);
    }

    #[test]
    fn test_ap_by_tool_uses_nose_radius() {
        let s = Setup::new();
        assert!((s.limiter().by_tool() - 0.8 * 0.67).abs() < 1e-12);

        let mut big = Setup::new();
        big.tool.insert_radius_mm = 12.0;
        assert_eq!(big.limiter().by_tool(), 6.0);
    }

    #[test]
    fn test_ap_by_rigidity_derates_with_overhang() {
        let mut s = Setup::new();
        // 30 / 50 overhang: 4 · (1 - 0.3) = 2.8
        assert!((s.limiter().by_rigidity() - 2.8).abs() < 1e-12);

        s.tool.tool_overhang_mm = 50.0;
        assert!((s.limiter().by_rigidity() - 2.0).abs() < 1e-12);

        s.tool.tool_overhang_mm = 0.0;
        assert_eq!(s.limiter().by_rigidity(), 4.0);
    }

    #[test]
    fn test_safe_ap_within_range() {
        let s = Setup::new();
        for vc in [1.0, 30.0, 80.0, 250.0, 1500.0] {
            for feed in [0.01, 0.05, 0.2, 0.4, 2.0] {
                let ap = s.limiter().safe_ap(vc, feed);
                assert!(
                    s.limits.safe_ap_range.contains(ap),
                    "ap {} out of range for vc {} feed {}",
                    ap,
                    vc,
                    feed
                );
            }
        }
    }

    #[test]
    fn test_safe_ap_reports_binding_constraint() {
        let mut s = Setup::new();
        s.tool.insert_radius_mm = 2.4;
        // tool: 1.608, rigidity: 2.8, power: 6
        let (ap, binding) = s.limiter().safe_ap_with_constraint(80.0, 0.2);
        assert!((ap - 1.608).abs() < 1e-9);
        assert_eq!(binding, DepthConstraint::Tool);

        s.tool.insert_radius_mm = 0.4;
        let (ap, binding) = s.limiter().safe_ap_with_constraint(80.0, 0.2);
        assert_eq!(ap, 0.5);
        assert_eq!(binding, DepthConstraint::SafeMinimum);
    }

    #[test]
    fn test_safe_ap_falls_back_on_zero_inputs() {
        let s = Setup::new();
        assert_eq!(s.limiter().safe_ap(0.0, 0.2), 0.5);
        assert_eq!(s.limiter().safe_ap(80.0, 0.0), 0.5);
    }

    #[test]
    fn test_steel_speed_hardness_correction() {
        let mut s = Setup::new();
        assert_eq!(s.selector().base_cutting_speed(OperationType::Roughing), 80.0);

        s.material.hardness_hb = Some(400.0);
        assert_eq!(s.selector().base_cutting_speed(OperationType::Roughing), 40.0);

        // Floor at 100 HB: at most doubled
        s.material.hardness_hb = Some(50.0);
        assert_eq!(s.selector().base_cutting_speed(OperationType::Roughing), 160.0);
    }

    #[test]
    fn test_hardness_ignored_for_aluminum() {
        let mut s = Setup::new();
        s.material = MaterialProperties::new(MaterialKind::Aluminum).with_hardness(400.0);
        assert_eq!(s.selector().base_cutting_speed(OperationType::Roughing), 250.0);
    }

    #[test]
    fn test_tool_material_scales_speed() {
        let mut s = Setup::new();
        s.tool.insert_material = ToolMaterial::HSS;
        assert_eq!(s.selector().base_cutting_speed(OperationType::Finishing), 75.0);

        s.tool.insert_material = ToolMaterial::Diamond;
        assert_eq!(s.selector().base_cutting_speed(OperationType::Finishing), 450.0);
    }

    #[test]
    fn test_base_feed_clamping() {
        let mut s = Setup::new();
        assert!((s.selector().base_feed(OperationType::Roughing) - 0.2).abs() < 1e-12);

        // 0.2 · 1.6/0.8 = 0.4, safe range caps at 0.3
        s.tool.insert_radius_mm = 1.6;
        assert_eq!(s.selector().base_feed(OperationType::Roughing), 0.3);

        // 0.05 · 0.4/0.8 = 0.025, floored at 0.05
        s.tool.insert_radius_mm = 0.4;
        assert_eq!(s.selector().base_feed(OperationType::Finishing), 0.05);
    }

    #[test]
    fn test_rpm_formula_and_clamping() {
        let s = Setup::new();
        let rpm = s.selector().rpm(80.0, 50.0);
        assert!((rpm - 1000.0 * 80.0 / (PI * 50.0)).abs() < 1e-9);

        assert_eq!(s.selector().rpm(80.0, 0.0), 100.0);
        assert_eq!(s.selector().rpm(80.0, -10.0), 100.0);
        assert_eq!(s.selector().rpm(500.0, 5.0), 2000.0);
        assert_eq!(s.selector().rpm(10.0, 400.0), 100.0);
    }

    #[test]
    fn test_rpm_monotonic_in_diameter() {
        let s = Setup::new();
        let upper = s.limits.max_rpm.min(s.limits.safe_rpm_range.max);
        let mut previous = f64::INFINITY;
        for d in (1..=500).map(|d| d as f64) {
            let rpm = s.selector().rpm(150.0, d);
            assert!(rpm <= previous, "rpm must not increase with diameter");
            assert!(rpm >= s.limits.safe_rpm_range.min && rpm <= upper);
            previous = rpm;
        }
    }

    #[test]
    fn test_power_estimate() {
        let s = Setup::new();
        let estimator = PowerEstimator::new(&s.material, &s.coefficients);
        // 1800 · 2 · 0.2 · 80 / 48000 = 1.2 kW
        assert!((estimator.power(2.0, 0.2, 80.0) - 1.2).abs() < 1e-12);
        assert_eq!(estimator.power(0.0, 0.2, 80.0), 0.0);
        assert_eq!(estimator.power(2.0, 0.2, -1.0), 0.0);
        assert_eq!(estimator.cutting_force(2.0, 0.2), 720.0);
    }

    #[test]
    fn test_power_and_depth_are_inverse() {
        let s = Setup::new();
        let estimator = PowerEstimator::new(&s.material, &s.coefficients);
        let ap = s.limiter().by_power(500.0, 0.3);
        let power = estimator.power(ap, 0.3, 500.0);
        assert!((power - s.limits.max_power_kw).abs() < 1e-9);
    }
}
