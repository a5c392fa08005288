pub mod assumptions;
pub mod distribution;
pub mod engine;
pub mod party_flows;
pub mod projection;
pub mod returns;
