//! Splitting stock into roughing and finishing passes

use crate::models::{OperationType, Pass, PassType, StrategyConfig};

/// Stock below this is treated as fully removed
pub(crate) const STOCK_EPSILON_MM: f64 = 1e-9;

/// Remaining share of stock that goes into the semi-finishing pass
const SEMI_FINISH_SHARE: f64 = 0.7;

/// A single finish pass may take up to this multiple of its target depth
const SINGLE_FINISH_FACTOR: f64 = 1.5;

/// Builds passes outward from a start diameter, tracking where the tool is.
pub(crate) struct PassBuilder<'a> {
    config: &'a StrategyConfig,
    current_diameter: f64,
    passes: Vec<Pass>,
}

impl<'a> PassBuilder<'a> {
    pub fn new(config: &'a StrategyConfig, diameter_start: f64) -> Self {
        Self {
            config,
            current_diameter: diameter_start,
            passes: Vec::new(),
        }
    }

    fn diameter_after(&self, before: f64, ap: f64) -> f64 {
        if self.config.is_external {
            before - 2.0 * ap
        } else {
            before + 2.0 * ap
        }
    }

    fn push(&mut self, pass_type: PassType, ap: f64) {
        let before = self.current_diameter;
        let after = self.diameter_after(before, ap);
        let number = self.passes.len() as u32 + 1;
        self.passes.push(Pass::new(number, pass_type, ap, before, after));
        self.current_diameter = after;
    }

    /// Fold stock into the previous pass instead of cutting it separately.
    fn merge_into_last(&mut self, ap: f64) -> bool {
        let is_external = self.config.is_external;
        match self.passes.last_mut() {
            Some(last) => {
                last.ap_mm += ap;
                last.diameter_after_mm = if is_external {
                    last.diameter_before_mm - 2.0 * last.ap_mm
                } else {
                    last.diameter_before_mm + 2.0 * last.ap_mm
                };
                self.current_diameter = last.diameter_after_mm;
                true
            }
            None => false,
        }
    }

    /// Roughing passes for `stock`. Returns the stock left over, which is
    /// always zero: the last roughing pass absorbs any remainder.
    pub fn rough(&mut self, target_ap: f64, stock: f64, single_pass_type: PassType) -> f64 {
        if stock <= target_ap {
            self.push(single_pass_type, stock);
            return 0.0;
        }

        // Keep two slots for finishing within the preferred pass count
        let pass_budget = self.config.preferred_max_passes.saturating_sub(2).max(1);
        let needed = (stock / target_ap).ceil().min(u32::MAX as f64) as u32;
        let rough_passes = needed.min(pass_budget).max(1);

        // Even out the depth across the passes
        let ap_optimized = (stock / rough_passes as f64).min(self.config.max_ap_rough_mm);

        let mut remaining = stock;
        for i in 0..rough_passes {
            if remaining <= STOCK_EPSILON_MM {
                break;
            }

            let ap = if i == rough_passes - 1 {
                remaining
            } else {
                ap_optimized.min(remaining)
            };

            // Everything left is too thin to stand alone; the previous pass takes it
            if ap < self.config.min_ap_mm && self.merge_into_last(remaining) {
                remaining = 0.0;
                break;
            }

            self.push(PassType::Roughing, ap);
            remaining -= ap;
        }

        remaining.max(0.0)
    }

    /// Semi-finishing and finishing passes for what roughing left behind.
    pub fn finish(&mut self, stock: f64) {
        if stock <= STOCK_EPSILON_MM {
            return;
        }

        let config = self.config;
        let finishing_op = config.operation_type == OperationType::Finishing;
        let finish_target = if finishing_op {
            config.max_ap_finish_mm
        } else {
            config.semi_finish_stock_mm
        }
        .min(stock);

        if stock <= finish_target * SINGLE_FINISH_FACTOR {
            let pass_type = if finishing_op || config.require_finish_pass {
                PassType::Finishing
            } else {
                PassType::SemiFinishing
            };
            self.push(pass_type, stock);
            return;
        }

        let semi_ap = config.semi_finish_stock_mm.min(stock * SEMI_FINISH_SHARE);
        self.push(PassType::SemiFinishing, semi_ap);

        let finish_ap = config.max_ap_finish_mm.min(stock - semi_ap);
        if finish_ap > STOCK_EPSILON_MM {
            self.push(PassType::Finishing, finish_ap);
        }
    }

    pub fn into_passes(self) -> Vec<Pass> {
        self.passes
    }
}

/// Stock held back from roughing so finishing passes have material to cut.
pub(crate) fn finish_allowance(config: &StrategyConfig, stock: f64) -> f64 {
    if !config.require_finish_pass && config.operation_type == OperationType::Roughing {
        return 0.0;
    }

    let allowance = match config.operation_type {
        OperationType::Finishing => config.max_ap_finish_mm,
        _ => config.semi_finish_stock_mm + config.max_ap_finish_mm,
    };

    allowance.min(stock / 2.0)
}

/// Full decomposition for one target depth (no ceiling guard).
pub(crate) fn decompose(
    config: &StrategyConfig,
    diameter_start: f64,
    stock: f64,
    target_ap: f64,
) -> Vec<Pass> {
    let mut builder = PassBuilder::new(config, diameter_start);

    if stock <= target_ap {
        builder.rough(target_ap, stock, PassType::from(config.operation_type));
        return builder.into_passes();
    }

    let allowance = finish_allowance(config, stock);
    let remaining = builder.rough(target_ap, stock - allowance, PassType::Roughing);
    builder.finish(remaining + allowance);

    builder.into_passes()
}
