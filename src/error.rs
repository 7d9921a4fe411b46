use thiserror::Error;

/// Errors raised by the turning engine.
///
/// Only input-validation failures and profile loading abort a call.
/// Degraded inputs inside the formulas fall back to floor values and
/// constraint overflows surface as warnings instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("start diameter {start} mm must exceed end diameter {end} mm")]
    DiameterOrder { start: f64, end: f64 },

    #[error("bore start diameter {start} mm must be below end diameter {end} mm")]
    BoreDiameterOrder { start: f64, end: f64 },

    #[error("stock per side must be positive, got {stock} mm")]
    NonPositiveStock { stock: f64 },

    #[error("stock too large: {stock} mm per side (max {max} mm), check the input diameters")]
    StockTooLarge { stock: f64, max: f64 },

    #[error("tool overhang {overhang} mm exceeds machine maximum {max} mm")]
    OverhangExceeded { overhang: f64, max: f64 },

    #[error("invalid limits: {0}")]
    InvalidLimits(String),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid tool: {0}")]
    InvalidTool(String),

    #[error("invalid material: {0}")]
    InvalidMaterial(String),

    #[error("invalid strategy config: {0}")]
    InvalidStrategy(String),

    #[error("invalid cutting table: {0}")]
    InvalidTable(String),

    #[error("no passes generated for {stock} mm stock")]
    NoPasses { stock: f64 },

    #[error("unknown {kind}: {value}")]
    UnknownName { kind: &'static str, value: String },

    #[error("failed to read profile {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to parse profile: {0}")]
    Json(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Json(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
