//! Alternative strategies for the same stock

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{plan, PassPlan, PassPlanner};
use crate::error::EngineError;
use crate::models::{OperationType, StrategyConfig};

const AGGRESSIVE_AP_FACTOR: f64 = 1.2;
const AGGRESSIVE_AP_CAP_MM: f64 = 8.0;
const CONSERVATIVE_AP_FACTOR: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyVariant {
    Aggressive,
    Conservative,
    TwoStage,
}

impl StrategyVariant {
    pub const ALL: [StrategyVariant; 3] = [
        StrategyVariant::Aggressive,
        StrategyVariant::Conservative,
        StrategyVariant::TwoStage,
    ];

    pub fn description(&self) -> &'static str {
        match self {
            StrategyVariant::Aggressive => "Fewer, deeper passes for maximum removal rate",
            StrategyVariant::Conservative => "Shallow passes for weak setups and tool life",
            StrategyVariant::TwoStage => "Roughing followed by a light semi-finish and finish",
        }
    }

    /// Derive this variant's configuration from a base configuration.
    /// Side of the part and tolerance are kept. Every variant is a roughing
    /// strategy whatever the base operation is.
    pub fn configure(&self, base: &StrategyConfig) -> StrategyConfig {
        let mut config = StrategyConfig {
            operation_type: OperationType::Roughing,
            is_external: base.is_external,
            tolerance_mm: base.tolerance_mm,
            min_ap_mm: base.min_ap_mm,
            max_total_passes: base.max_total_passes,
            ..StrategyConfig::default()
        };

        match self {
            StrategyVariant::Aggressive => {
                config.max_ap_rough_mm =
                    (base.max_ap_rough_mm * AGGRESSIVE_AP_FACTOR).min(AGGRESSIVE_AP_CAP_MM);
                config.preferred_max_passes = 8;
            }
            StrategyVariant::Conservative => {
                config.max_ap_rough_mm = base.max_ap_rough_mm * CONSERVATIVE_AP_FACTOR;
                config.preferred_max_passes = 15;
            }
            StrategyVariant::TwoStage => {
                config.max_ap_rough_mm = base.max_ap_rough_mm;
                config.require_finish_pass = true;
                config.semi_finish_stock_mm = 0.5;
                config.max_ap_finish_mm = 0.3;
            }
        }

        config
    }
}

impl fmt::Display for StrategyVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyVariant::Aggressive => write!(f, "aggressive"),
            StrategyVariant::Conservative => write!(f, "conservative"),
            StrategyVariant::TwoStage => write!(f, "two_stage"),
        }
    }
}

/// One alternative plan. A variant whose configuration is invalid for the
/// stock carries its error instead of a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct AlternativeStrategy {
    pub variant: StrategyVariant,
    pub description: &'static str,
    pub config: StrategyConfig,
    pub outcome: Result<PassPlan, EngineError>,
}

impl PassPlanner {
    /// Plan the same stock with each strategy variant.
    pub fn alternative_strategies(&self) -> Vec<AlternativeStrategy> {
        StrategyVariant::ALL
            .iter()
            .map(|variant| {
                let config = variant.configure(self.config());
                let outcome = plan(self.span(), &config, None);
                AlternativeStrategy {
                    variant: *variant,
                    description: variant.description(),
                    config,
                    outcome,
                }
            })
            .collect()
    }
}

/// Rule-of-thumb depth of cut for a given stock per side.
pub fn optimal_ap(total_stock_mm: f64, operation: OperationType) -> f64 {
    if total_stock_mm <= 0.0 {
        return 0.0;
    }

    if total_stock_mm <= 2.0 {
        total_stock_mm
    } else if total_stock_mm <= 10.0 {
        match operation {
            OperationType::Roughing => total_stock_mm / 3.0,
            _ => total_stock_mm / 4.0,
        }
    } else {
        let passes = (total_stock_mm / 2.0).floor().clamp(4.0, 8.0);
        total_stock_mm / passes
    }
}
