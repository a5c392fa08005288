pub mod scenarios;
pub mod underwriting;
pub mod waterfall;
