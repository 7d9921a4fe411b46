//! Turning cutting-data engine
//!
//! Computes physically bounded cutting parameters for a lathe operation
//! (cutting speed, spindle speed, feed, depth of cut, spindle power) and
//! splits the stock between start and end diameter into an ordered list of
//! roughing, semi-finishing and finishing passes.
//!
//! ```no_run
//! use turnplan::{Calculator, Geometry, Limits, MaterialProperties, OperationType, ToolProperties};
//!
//! let calc = Calculator::new(
//!     Limits::default(),
//!     MaterialProperties::default(),
//!     ToolProperties::default(),
//!     Geometry::new(50.0, 40.0, 100.0)?,
//! )?;
//! let rec = calc.recommend(OperationType::Roughing)?;
//! println!("{}", rec);
//! # Ok::<(), turnplan::EngineError>(())
//! ```
//!
//! The library never installs a tracing subscriber; diagnostics go through
//! `tracing` and are visible once the host application sets one up.

pub mod config;
pub mod cutting_data;
pub mod error;
pub mod models;
pub mod passes;
pub mod recommendation;

pub use config::{CalculationRequest, EngineProfile};
pub use cutting_data::validators::{Severity, ValidationIssue};
pub use cutting_data::{
    CuttingTables, DepthConstraint, DepthLimiter, EmpiricalCoefficients, MaterialKind,
    PowerEstimator, SpeedFeedSelector, ToolMaterial,
};
pub use error::{EngineError, Result};
pub use models::{
    Geometry, Limits, MaterialProperties, OperationType, Pass, PassType, SafeRange,
    StrategyConfig, ToolProperties,
};
pub use passes::{
    optimal_ap, plan, AlternativeStrategy, PassPlan, PassPlanner, PlanStatistics, StockSpan,
    StrategyVariant,
};
pub use recommendation::{Calculator, CorrectionPolicy, Recommendation, RecommendationContext};
