pub mod error;
pub mod time_value;
pub mod types;

#[cfg(feature = "underwriting")]
pub mod underwriting;

#[cfg(feature = "waterfall")]
pub mod waterfall;

#[cfg(feature = "scenarios")]
pub mod scenarios;

pub use error::WaterfallError;
pub use types::*;

/// Standard result type for all deal-waterfall operations
pub type EngineResult<T> = Result<T, WaterfallError>;
