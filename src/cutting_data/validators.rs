//! Checks of finished recommendations and plans against machine limits
//! and shop practice

use serde::{Deserialize, Serialize};
use std::fmt;

use super::PowerEstimator;
use crate::models::{Limits, OperationType, PassType, ToolProperties};
use crate::passes::PassPlan;
use crate::recommendation::Recommendation;

/// Deepest cut considered normal for turning, mm
const PRACTICAL_MAX_AP_MM: f64 = 6.0;
/// Shallower cuts rub rather than cut, mm
const PRACTICAL_MIN_AP_MM: f64 = 0.05;
const PRACTICAL_MAX_PASSES: u32 = 20;

/// Validation issue with severity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code, self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

/// Check a recommendation against the limits it was computed under.
pub fn validate_recommendation(
    rec: &Recommendation,
    limits: &Limits,
    tool: &ToolProperties,
    estimator: &PowerEstimator<'_>,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if rec.ap_mm > limits.max_ap_by_tool_mm {
        issues.push(ValidationIssue {
            severity: Severity::Error,
            code: "AP_ABOVE_TOOL_LIMIT".to_string(),
            message: format!(
                "Depth of cut {} mm exceeds the tool limit of {} mm",
                rec.ap_mm, limits.max_ap_by_tool_mm
            ),
            suggestion: Some("Split the stock into more passes".to_string()),
        });
    }

    if rec.ap_mm > PRACTICAL_MAX_AP_MM {
        issues.push(ValidationIssue {
            severity: Severity::Warning,
            code: "AP_ABOVE_PRACTICE".to_string(),
            message: format!(
                "Depth of cut {} mm is above typical turning values (2-6 mm)",
                rec.ap_mm
            ),
            suggestion: None,
        });
    }

    if rec.feed_mm_rev > limits.max_feed_by_tool_mm_rev {
        issues.push(ValidationIssue {
            severity: Severity::Error,
            code: "FEED_ABOVE_TOOL_LIMIT".to_string(),
            message: format!(
                "Feed {} mm/rev exceeds the tool limit of {} mm/rev",
                rec.feed_mm_rev, limits.max_feed_by_tool_mm_rev
            ),
            suggestion: Some("Reduce feed or use a larger nose radius".to_string()),
        });
    }

    if rec.power_kw > limits.max_power_kw {
        issues.push(ValidationIssue {
            severity: Severity::Error,
            code: "POWER_EXCEEDED".to_string(),
            message: format!(
                "Required power {} kW exceeds machine power {} kW",
                rec.power_kw, limits.max_power_kw
            ),
            suggestion: Some("Reduce depth of cut or cutting speed".to_string()),
        });
    }

    let force = estimator.cutting_force(rec.ap_mm, rec.feed_mm_rev);
    if force > limits.max_cutting_force_n {
        issues.push(ValidationIssue {
            severity: Severity::Warning,
            code: "CUTTING_FORCE_EXCEEDED".to_string(),
            message: format!(
                "Cutting force {:.0} N exceeds the {} N limit",
                force, limits.max_cutting_force_n
            ),
            suggestion: Some("Reduce depth of cut or feed".to_string()),
        });
    }

    if rec.total_passes > PRACTICAL_MAX_PASSES {
        issues.push(ValidationIssue {
            severity: Severity::Warning,
            code: "TOO_MANY_PASSES".to_string(),
            message: format!("{} passes is too many for practical work", rec.total_passes),
            suggestion: None,
        });
    }

    if rec.total_passes < 1 {
        issues.push(ValidationIssue {
            severity: Severity::Error,
            code: "NO_PASSES".to_string(),
            message: "Recommendation has no passes".to_string(),
            suggestion: None,
        });
    }

    if tool.tool_overhang_mm > limits.recommended_max_overhang_mm {
        issues.push(ValidationIssue {
            severity: Severity::Info,
            code: "OVERHANG_ABOVE_RECOMMENDED".to_string(),
            message: format!(
                "Tool overhang {} mm is above the recommended {} mm",
                tool.tool_overhang_mm, limits.recommended_max_overhang_mm
            ),
            suggestion: Some("Shorten the tool to reduce chatter".to_string()),
        });
    }

    if tool.insert_radius_mm < limits.min_insert_radius_mm {
        issues.push(ValidationIssue {
            severity: Severity::Warning,
            code: "INSERT_RADIUS_TOO_SMALL".to_string(),
            message: format!(
                "Insert radius {} mm is below the minimum {} mm",
                tool.insert_radius_mm, limits.min_insert_radius_mm
            ),
            suggestion: None,
        });
    }

    issues
}

/// Check a pass plan against turning rules of thumb.
pub fn validate_plan_against_practice(plan: &PassPlan) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if plan.total_passes > PRACTICAL_MAX_PASSES {
        issues.push(ValidationIssue {
            severity: Severity::Error,
            code: "UNREALISTIC_PASS_COUNT".to_string(),
            message: format!(
                "{} passes is unrealistic; turning uses 15-20 at most",
                plan.total_passes
            ),
            suggestion: Some("Use a deeper target depth".to_string()),
        });
    }

    if plan.total_stock_mm < 1.0 && plan.total_passes > 2 {
        issues.push(ValidationIssue {
            severity: Severity::Warning,
            code: "TOO_MANY_PASSES_FOR_STOCK".to_string(),
            message: format!(
                "{} passes for {:.1} mm of stock is too many",
                plan.total_passes, plan.total_stock_mm
            ),
            suggestion: Some("Take the stock in one or two passes".to_string()),
        });
    }

    for pass in &plan.passes {
        if pass.ap_mm > PRACTICAL_MAX_AP_MM {
            issues.push(ValidationIssue {
                severity: Severity::Warning,
                code: "PASS_TOO_DEEP".to_string(),
                message: format!(
                    "Pass {} cuts {:.1} mm, above the {} mm roughing maximum",
                    pass.number, pass.ap_mm, PRACTICAL_MAX_AP_MM
                ),
                suggestion: None,
            });
        }
        if pass.ap_mm < PRACTICAL_MIN_AP_MM {
            issues.push(ValidationIssue {
                severity: Severity::Warning,
                code: "PASS_TOO_SHALLOW".to_string(),
                message: format!("Pass {} cuts only {:.2} mm", pass.number, pass.ap_mm),
                suggestion: Some("Merge it into the previous pass".to_string()),
            });
        }
    }

    let has_finish = plan.passes.iter().any(|p| p.pass_type == PassType::Finishing);
    if plan.total_stock_mm > 0.5 && !has_finish && plan.operation_type != OperationType::Roughing {
        issues.push(ValidationIssue {
            severity: Severity::Info,
            code: "FINISH_PASS_RECOMMENDED".to_string(),
            message: "A finishing pass is recommended for surface quality".to_string(),
            suggestion: None,
        });
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cutting_data::EmpiricalCoefficients;
    use crate::models::{Geometry, MaterialProperties, StrategyConfig};
    use crate::passes::PassPlanner;
    use crate::recommendation::Calculator;

    #[test]
    fn test_clean_recommendation_has_no_errors() {
        let calc = Calculator::new(
            Limits::default(),
            MaterialProperties::default(),
            ToolProperties::default(),
            Geometry::new(50.0, 40.0, 100.0).unwrap(),
        )
        .unwrap();
        let rec = calc.recommend(OperationType::Roughing).unwrap();
        let issues = calc.validate(&rec);
        assert!(issues.iter().all(|i| i.severity != Severity::Error));
    }

    #[test]
    fn test_limit_violations_reported() {
        let calc = Calculator::new(
            Limits::default(),
            MaterialProperties::default(),
            ToolProperties::default(),
            Geometry::new(50.0, 40.0, 100.0).unwrap(),
        )
        .unwrap();
        let mut rec = calc.recommend(OperationType::Roughing).unwrap();
        rec.ap_mm = 8.0;
        rec.feed_mm_rev = 0.5;
        rec.power_kw = 20.0;
        rec.total_passes = 25;

        let limits = Limits::default();
        let tool = ToolProperties::default().with_overhang(40.0).with_radius(0.2);
        let material = MaterialProperties::default();
        let coefficients = EmpiricalCoefficients::default();
        let estimator = PowerEstimator::new(&material, &coefficients);

        let issues = validate_recommendation(&rec, &limits, &tool, &estimator);
        let codes: Vec<&str> = issues.iter().map(|i| i.code.as_str()).collect();
        for code in [
            "AP_ABOVE_TOOL_LIMIT",
            "AP_ABOVE_PRACTICE",
            "FEED_ABOVE_TOOL_LIMIT",
            "POWER_EXCEEDED",
            // 1800 * 8 * 0.5 = 7200 N
            "CUTTING_FORCE_EXCEEDED",
            "TOO_MANY_PASSES",
            "OVERHANG_ABOVE_RECOMMENDED",
            "INSERT_RADIUS_TOO_SMALL",
        ] {
            assert!(codes.contains(&code), "missing {}", code);
        }
    }

    #[test]
    fn test_practice_checks_on_fallback_plan() {
        // Ceiling of 1 forces a single 20 mm pass
        let config = StrategyConfig::new(OperationType::SemiFinishing)
            .with_finish_pass(false)
            .with_max_total_passes(1);
        let plan = PassPlanner::new(100.0, 60.0, config)
            .unwrap()
            .generate(None)
            .unwrap();
        assert!(plan.fallback);

        let issues = validate_plan_against_practice(&plan);
        assert!(issues.iter().any(|i| i.code == "PASS_TOO_DEEP"));
        assert!(issues.iter().any(|i| i.code == "FINISH_PASS_RECOMMENDED"));
    }

    #[test]
    fn test_default_plan_passes_practice() {
        let plan = PassPlanner::new(120.0, 80.0, StrategyConfig::default())
            .unwrap()
            .generate(None)
            .unwrap();
        assert!(validate_plan_against_practice(&plan).is_empty());
    }

    #[test]
    fn test_issue_display() {
        let issue = ValidationIssue {
            severity: Severity::Warning,
            code: "PASS_TOO_SHALLOW".to_string(),
            message: "Pass 3 cuts only 0.01 mm".to_string(),
            suggestion: Some("Merge it".to_string()),
        };
        assert_eq!(
            issue.to_string(),
            "[WARNING] PASS_TOO_SHALLOW: Pass 3 cuts only 0.01 mm (Merge it)"
        );
    }
}
