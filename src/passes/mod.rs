//! Pass planning
//!
//! Turns a start/end diameter pair into an ordered list of passes:
//! roughing first, then optional semi-finishing and finishing. The plan is
//! bounded by the configured pass ceiling; when a plan overflows it, the
//! target depth is raised geometrically for a fixed number of rounds before
//! falling back to one pass over all stock.
//!
//! Both the standalone [`PassPlanner`] and the recommendation pipeline go
//! through [`plan`].

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument, warn};

use crate::error::{EngineError, Result};
use crate::models::{check_stock, OperationType, Pass, PassType, StrategyConfig};

mod alternatives;
mod decompose;

pub use alternatives::*;

use decompose::{decompose, STOCK_EPSILON_MM};

/// Growth of the target depth per backoff round
pub const BACKOFF_FACTOR: f64 = 1.5;

/// Backoff rounds before the single-pass fallback
pub const MAX_BACKOFF_ROUNDS: u32 = 16;

/// Passes under this depth are counted as micro-passes
pub const MICRO_PASS_MM: f64 = 0.2;

/// More micro-passes than this produce a warning
const MICRO_PASS_LIMIT: usize = 2;

/// Pass counts above this are impractical regardless of preference
pub const PRACTICAL_PASS_LIMIT: u32 = 15;

/// Diameters bounding the stock to remove
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StockSpan {
    pub diameter_start_mm: f64,
    pub diameter_end_mm: f64,
}

impl StockSpan {
    pub fn new(diameter_start_mm: f64, diameter_end_mm: f64) -> Self {
        Self {
            diameter_start_mm,
            diameter_end_mm,
        }
    }

    pub fn stock_per_side_mm(&self) -> f64 {
        (self.diameter_start_mm - self.diameter_end_mm).abs() / 2.0
    }

    /// Check direction and size of the stock for the given side.
    pub fn validate(&self, is_external: bool) -> Result<()> {
        let (start, end) = (self.diameter_start_mm, self.diameter_end_mm);
        if !(start.is_finite() && end.is_finite()) {
            return Err(EngineError::InvalidGeometry(format!(
                "diameters must be finite, got {} and {}",
                start, end
            )));
        }
        if is_external && start <= end {
            return Err(EngineError::DiameterOrder { start, end });
        }
        if !is_external && start >= end {
            return Err(EngineError::BoreDiameterOrder { start, end });
        }
        if start.min(end) <= 0.0 {
            return Err(EngineError::InvalidGeometry(format!(
                "diameters must be positive, got {} and {}",
                start, end
            )));
        }
        check_stock(self.stock_per_side_mm())
    }
}

/// Summary figures of a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStatistics {
    pub total_machined_stock_mm: f64,
    /// Machined stock over requested stock
    pub efficiency: f64,
    pub rough_passes: u32,
    pub semi_finish_passes: u32,
    pub finish_passes: u32,
    pub avg_ap_mm: f64,
    pub max_ap_mm: f64,
    pub min_ap_mm: f64,
    pub final_diameter_mm: f64,
    /// Residual error after tolerance correction
    pub diameter_error_mm: f64,
    pub is_realistic: bool,
}

/// A complete pass plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassPlan {
    pub passes: Vec<Pass>,
    pub total_passes: u32,
    pub total_stock_mm: f64,
    pub operation_type: OperationType,
    /// Target depth the accepted plan was built with
    pub target_ap_mm: f64,
    pub statistics: PlanStatistics,
    pub warnings: Vec<String>,
    /// Rounds of depth backoff needed to fit under the pass ceiling
    pub backoff_rounds: u32,
    /// The plan is the single-pass fallback
    pub fallback: bool,
    /// Signed change applied to the last pass's depth, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerance_correction_mm: Option<f64>,
}

impl PassPlan {
    pub fn final_diameter_mm(&self) -> f64 {
        self.statistics.final_diameter_mm
    }

    pub fn count(&self, pass_type: PassType) -> u32 {
        self.passes.iter().filter(|p| p.pass_type == pass_type).count() as u32
    }
}

/// Long plans show only their head and tail
const SUMMARY_HEAD: usize = 3;
const SUMMARY_TAIL: usize = 2;
const SUMMARY_FULL_LIMIT: usize = 8;

impl fmt::Display for PassPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Strategy: {}", self.operation_type)?;
        writeln!(f, "Passes: {}", self.total_passes)?;
        writeln!(f, "Stock: {:.1} mm per side", self.total_stock_mm)?;

        let n = self.passes.len();
        for (i, p) in self.passes.iter().enumerate() {
            if n > SUMMARY_FULL_LIMIT && i >= SUMMARY_HEAD && i < n - SUMMARY_TAIL {
                if i == SUMMARY_HEAD {
                    writeln!(f, "  ...")?;
                }
                continue;
            }
            writeln!(
                f,
                "  {:2}. {:<14} | ap: {:5.2} mm | {:6.1} -> {:6.1} mm",
                p.number,
                p.pass_type.to_string(),
                p.ap_mm,
                p.diameter_before_mm,
                p.diameter_after_mm
            )?;
        }

        for warning in &self.warnings {
            writeln!(f, "  ! {}", warning)?;
        }
        if !self.statistics.is_realistic {
            writeln!(f, "Pass count is high; consider an alternative strategy")?;
        }
        Ok(())
    }
}

/// Target depth implied by the operation when the caller gives none.
pub fn default_target_ap(config: &StrategyConfig) -> f64 {
    match config.operation_type {
        OperationType::Roughing => config.max_ap_rough_mm,
        OperationType::SemiFinishing => config.semi_finish_stock_mm,
        OperationType::Finishing => config.max_ap_finish_mm,
    }
}

fn clamp_target(config: &StrategyConfig, target_ap: f64) -> f64 {
    target_ap.min(config.max_ap_rough_mm).max(config.min_ap_mm)
}

/// Plan the passes that take `span` down to its end diameter.
///
/// The result always has between 1 and `max_total_passes` passes and its
/// last pass ends on the requested diameter within `tolerance_mm`.
pub fn plan(span: &StockSpan, config: &StrategyConfig, target_ap: Option<f64>) -> Result<PassPlan> {
    config.validate()?;
    span.validate(config.is_external)?;

    let stock = span.stock_per_side_mm();
    let requested = target_ap
        .filter(|ap| *ap > 0.0 && ap.is_finite())
        .unwrap_or_else(|| default_target_ap(config));

    let mut target = clamp_target(config, requested);
    let mut accepted = None;
    let mut rounds = 0;

    while rounds <= MAX_BACKOFF_ROUNDS {
        let passes = decompose(config, span.diameter_start_mm, stock, target);
        if passes.is_empty() {
            return Err(EngineError::NoPasses { stock });
        }
        if passes.len() as u32 <= config.max_total_passes {
            accepted = Some(passes);
            break;
        }

        let next = clamp_target(config, target * BACKOFF_FACTOR);
        debug!(
            passes = passes.len(),
            ceiling = config.max_total_passes,
            target,
            next,
            "pass ceiling exceeded, raising target depth"
        );
        if next <= target {
            // Depth is already at its maximum; more rounds cannot help
            break;
        }
        target = next;
        rounds += 1;
    }

    let mut warnings = Vec::new();
    let fallback = accepted.is_none();
    let mut passes = match accepted {
        Some(passes) => passes,
        None => {
            warn!(stock, ceiling = config.max_total_passes, "falling back to a single pass");
            warnings.push(format!(
                "No plan within {} passes; using a single {:.2} mm pass over all stock",
                config.max_total_passes, stock
            ));
            target = stock;
            let after = if config.is_external {
                span.diameter_start_mm - 2.0 * stock
            } else {
                span.diameter_start_mm + 2.0 * stock
            };
            vec![Pass::new(
                1,
                PassType::from(config.operation_type),
                stock,
                span.diameter_start_mm,
                after,
            )]
        }
    };

    if rounds > 0 && !fallback {
        warnings.push(format!(
            "Pass count exceeded {}; target depth raised to {:.2} mm",
            config.max_total_passes, target
        ));
    }

    let tolerance_correction_mm = correct_last_pass(&mut passes, span, config);

    let statistics = statistics(&passes, span, stock, config);
    warnings.extend(plan_warnings(&passes, &statistics, config));

    Ok(PassPlan {
        total_passes: passes.len() as u32,
        passes,
        total_stock_mm: stock,
        operation_type: config.operation_type,
        target_ap_mm: target,
        statistics,
        warnings,
        backoff_rounds: rounds,
        fallback,
        tolerance_correction_mm,
    })
}

/// Snap the last pass onto the end diameter when it misses by more than
/// the tolerance. Returns the signed change in depth.
fn correct_last_pass(passes: &mut [Pass], span: &StockSpan, config: &StrategyConfig) -> Option<f64> {
    let last = passes.last_mut()?;
    let error = (last.diameter_after_mm - span.diameter_end_mm).abs();
    if error <= config.tolerance_mm {
        return None;
    }

    let corrected_ap = (last.diameter_before_mm - span.diameter_end_mm).abs() / 2.0;
    let correction = corrected_ap - last.ap_mm;
    debug!(pass = last.number, error, correction, "correcting last pass onto end diameter");

    last.ap_mm = corrected_ap;
    last.diameter_after_mm = span.diameter_end_mm;
    Some(correction)
}

fn statistics(
    passes: &[Pass],
    span: &StockSpan,
    stock: f64,
    config: &StrategyConfig,
) -> PlanStatistics {
    let total = passes.len() as u32;
    let machined: f64 = passes.iter().map(|p| p.stock_removed_mm()).sum();
    let count = |t: PassType| passes.iter().filter(|p| p.pass_type == t).count() as u32;

    let sum_ap: f64 = passes.iter().map(|p| p.ap_mm).sum();
    let max_ap = passes.iter().map(|p| p.ap_mm).fold(f64::MIN, f64::max);
    let min_ap = passes.iter().map(|p| p.ap_mm).fold(f64::MAX, f64::min);

    let final_diameter = passes
        .last()
        .map(|p| p.diameter_after_mm)
        .unwrap_or(span.diameter_end_mm);

    PlanStatistics {
        total_machined_stock_mm: machined,
        efficiency: if stock > 0.0 { machined / stock } else { 1.0 },
        rough_passes: count(PassType::Roughing),
        semi_finish_passes: count(PassType::SemiFinishing),
        finish_passes: count(PassType::Finishing),
        avg_ap_mm: if total > 0 { sum_ap / total as f64 } else { 0.0 },
        max_ap_mm: if total > 0 { max_ap } else { 0.0 },
        min_ap_mm: if total > 0 { min_ap } else { 0.0 },
        final_diameter_mm: final_diameter,
        diameter_error_mm: (final_diameter - span.diameter_end_mm).abs(),
        is_realistic: total <= config.preferred_max_passes,
    }
}

fn plan_warnings(passes: &[Pass], stats: &PlanStatistics, config: &StrategyConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let total = passes.len() as u32;

    if total > config.preferred_max_passes {
        warnings.push(format!(
            "Pass count {} is above the preferred {}. Consider a tool rated for deeper cuts",
            total, config.preferred_max_passes
        ));
    }

    if total > PRACTICAL_PASS_LIMIT {
        warnings.push(format!(
            "{} passes is a lot for practical work. Optimize the strategy",
            total
        ));
    }

    let micro = passes.iter().filter(|p| p.ap_mm < MICRO_PASS_MM).count();
    if micro > MICRO_PASS_LIMIT {
        warnings.push(format!(
            "{} passes are shallower than {} mm. Merge the small passes",
            micro, MICRO_PASS_MM
        ));
    }

    for p in passes
        .iter()
        .filter(|p| p.pass_type == PassType::Roughing && p.ap_mm > config.max_ap_rough_mm + STOCK_EPSILON_MM)
    {
        warnings.push(format!(
            "Roughing pass {} cuts {:.2} mm, above the {:.2} mm roughing maximum",
            p.number, p.ap_mm, config.max_ap_rough_mm
        ));
    }

    if stats.diameter_error_mm > config.tolerance_mm {
        warnings.push(format!(
            "Final diameter error {:.3} mm exceeds tolerance {} mm",
            stats.diameter_error_mm, config.tolerance_mm
        ));
    }

    warnings
}

/// Plans passes for one diameter pair under one configuration
#[derive(Debug, Clone)]
pub struct PassPlanner {
    span: StockSpan,
    config: StrategyConfig,
}

impl PassPlanner {
    pub fn new(diameter_start_mm: f64, diameter_end_mm: f64, config: StrategyConfig) -> Result<Self> {
        let span = StockSpan::new(diameter_start_mm, diameter_end_mm);
        span.validate(config.is_external)?;
        config.validate()?;
        Ok(Self { span, config })
    }

    pub fn span(&self) -> &StockSpan {
        &self.span
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn total_stock_mm(&self) -> f64 {
        self.span.stock_per_side_mm()
    }

    /// Generate the plan, optionally for a caller-chosen target depth.
    #[instrument(skip_all, fields(
        start = self.span.diameter_start_mm,
        end = self.span.diameter_end_mm,
        operation = %self.config.operation_type,
    ))]
    pub fn generate(&self, target_ap_mm: Option<f64>) -> Result<PassPlan> {
        plan(&self.span, &self.config, target_ap_mm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn planner(start: f64, end: f64, config: StrategyConfig) -> PassPlanner {
        PassPlanner::new(start, end, config).expect("valid planner input")
    }

    #[test]
    fn test_small_stock_single_pass() {
        let plan = planner(100.0, 98.0, StrategyConfig::default())
            .generate(None)
            .unwrap();
        assert_eq!(plan.total_passes, 1);
        assert!((plan.passes[0].ap_mm - 1.0).abs() < 1e-9);
        assert!((plan.passes[0].diameter_after_mm - 98.0).abs() < 1e-9);
        assert!(plan.warnings.is_empty());
        assert!(plan.statistics.is_realistic);
    }

    #[test]
    fn test_heavy_stock_within_ceiling_with_finish() {
        let config = StrategyConfig::default().with_preferred_max_passes(12);
        let plan = planner(120.0, 80.0, config).generate(None).unwrap();
        assert!(plan.total_passes <= 20);
        assert!(plan.count(PassType::Finishing) >= 1);
        assert!((plan.final_diameter_mm() - 80.0).abs() <= 0.05);
        assert!((plan.statistics.total_machined_stock_mm - 20.0).abs() <= 0.05);
    }

    #[test]
    fn test_start_below_end_rejected() {
        let err = PassPlanner::new(40.0, 50.0, StrategyConfig::default()).unwrap_err();
        assert_eq!(err, EngineError::DiameterOrder { start: 40.0, end: 50.0 });
    }

    #[test]
    fn test_stock_too_large_rejected() {
        let err = PassPlanner::new(400.0, 100.0, StrategyConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::StockTooLarge { .. }));
        assert!(err.to_string().contains("stock too large"));
    }

    #[test]
    fn test_max_stock_accepted() {
        let plan = planner(400.0, 200.0, StrategyConfig::default())
            .generate(None)
            .unwrap();
        assert!(plan.total_passes >= 1 && plan.total_passes <= 20);
        assert!((plan.final_diameter_mm() - 200.0).abs() <= 0.05);
    }

    #[test]
    fn test_target_clamped_to_config() {
        let plan = planner(100.0, 60.0, StrategyConfig::default())
            .generate(Some(50.0))
            .unwrap();
        assert_eq!(plan.target_ap_mm, 6.0);

        let plan = planner(100.0, 99.0, StrategyConfig::default())
            .generate(Some(0.001))
            .unwrap();
        assert_eq!(plan.target_ap_mm, 0.1);
    }

    #[test]
    fn test_backoff_raises_target() {
        // Preference allows 8 rough passes, ceiling only 5
        let config = StrategyConfig::default()
            .with_finish_pass(false)
            .with_preferred_max_passes(10)
            .with_max_total_passes(5);
        let plan = planner(100.0, 80.0, config).generate(Some(1.0)).unwrap();
        assert!(plan.total_passes <= 5);
        assert!(plan.backoff_rounds > 0);
        assert!(!plan.fallback);
        assert!(plan.target_ap_mm > 1.0);
        assert!(plan.warnings.iter().any(|w| w.contains("target depth raised")));
    }

    #[test]
    fn test_saturated_backoff_falls_back_to_single_pass() {
        // 20 mm at 6 mm max needs at least 4 passes; ceiling is 2
        let config = StrategyConfig::default().with_max_total_passes(2);
        let plan = planner(100.0, 60.0, config).generate(None).unwrap();
        assert!(plan.fallback);
        assert_eq!(plan.total_passes, 1);
        assert_eq!(plan.passes[0].ap_mm, 20.0);
        assert_eq!(plan.passes[0].diameter_after_mm, 60.0);
        assert!(plan.warnings.iter().any(|w| w.contains("single")));
    }

    #[test]
    fn test_tolerance_correction_snaps_last_pass() {
        let span = StockSpan::new(60.0, 40.0);
        let config = StrategyConfig::default();
        let mut passes = vec![
            Pass::new(1, PassType::Roughing, 9.0, 60.0, 42.0),
            Pass::new(2, PassType::Finishing, 0.6, 42.0, 40.8),
        ];

        let correction = correct_last_pass(&mut passes, &span, &config).unwrap();
        assert!((correction - 0.4).abs() < 1e-9);
        let last = &passes[1];
        assert_eq!(last.diameter_after_mm, 40.0);
        assert!((last.ap_mm - 1.0).abs() < 1e-9);
        assert!((last.ap_mm - last.stock_removed_mm()).abs() < 1e-9);
    }

    #[test]
    fn test_tolerance_correction_skipped_within_tolerance() {
        let span = StockSpan::new(60.0, 40.0);
        let config = StrategyConfig::default().with_tolerance(0.05);
        let mut passes = vec![Pass::new(1, PassType::Roughing, 9.99, 60.0, 40.02)];
        assert_eq!(correct_last_pass(&mut passes, &span, &config), None);
        assert_eq!(passes[0].diameter_after_mm, 40.02);
    }

    #[test]
    fn test_thin_stock_merged_not_lost() {
        let plan = planner(100.0, 99.0, StrategyConfig::default())
            .generate(Some(0.001))
            .unwrap();
        assert!((plan.statistics.total_machined_stock_mm - 0.5).abs() < 1e-9);
        assert!(plan.passes.iter().all(|p| p.ap_mm >= 0.1));
        assert_eq!(plan.tolerance_correction_mm, None);
    }

    #[test]
    fn test_internal_bore_plan() {
        let config = StrategyConfig::default().internal();
        let plan = planner(40.0, 60.0, config).generate(None).unwrap();
        assert!((plan.final_diameter_mm() - 60.0).abs() <= 0.05);
        for pair in plan.passes.windows(2) {
            assert!(pair[1].diameter_after_mm > pair[0].diameter_after_mm);
        }

        let err = PassPlanner::new(60.0, 40.0, StrategyConfig::default().internal()).unwrap_err();
        assert!(matches!(err, EngineError::BoreDiameterOrder { .. }));
    }

    #[test]
    fn test_statistics_counts() {
        let plan = planner(120.0, 80.0, StrategyConfig::default())
            .generate(None)
            .unwrap();
        let stats = &plan.statistics;
        assert_eq!(
            stats.rough_passes + stats.semi_finish_passes + stats.finish_passes,
            plan.total_passes
        );
        assert!(stats.min_ap_mm <= stats.avg_ap_mm && stats.avg_ap_mm <= stats.max_ap_mm);
        assert!((stats.efficiency - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_micro_pass_warning() {
        let config = StrategyConfig::new(OperationType::Finishing)
            .with_min_ap(0.05)
            .with_max_ap_rough(0.15)
            .with_max_ap_finish(0.1)
            .with_finish_pass(false);
        let plan = planner(50.0, 49.0, config).generate(None).unwrap();
        assert!(plan.passes.iter().filter(|p| p.ap_mm < MICRO_PASS_MM).count() > 2);
        assert!(plan.warnings.iter().any(|w| w.contains("shallower")));
    }

    #[test]
    fn test_display_elides_long_plans() {
        let config = StrategyConfig::default().with_preferred_max_passes(20);
        let plan = planner(140.0, 80.0, config).generate(Some(2.0)).unwrap();
        assert!(plan.passes.len() > 8);

        let text = plan.to_string();
        assert!(text.contains("Strategy: roughing"));
        assert!(text.contains("  ..."));
        // Three head passes and two tail passes
        assert_eq!(text.lines().filter(|l| l.contains("ap:")).count(), 5);
    }

    #[test]
    fn test_passes_numbered_and_converging() {
        let plan = planner(150.0, 90.0, StrategyConfig::default())
            .generate(None)
            .unwrap();
        for (i, p) in plan.passes.iter().enumerate() {
            assert_eq!(p.number, i as u32 + 1);
            assert!(p.ap_mm > 0.0);
            assert!(p.diameter_after_mm < p.diameter_before_mm);
            assert!(p.diameter_after_mm >= 90.0 - 0.05);
        }
        for pair in plan.passes.windows(2) {
            assert!((pair[1].diameter_before_mm - pair[0].diameter_after_mm).abs() < 1e-9);
        }
    }
}
