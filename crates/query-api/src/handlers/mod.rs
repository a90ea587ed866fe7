//! HTTP handler module (§4.5, §6).

pub mod enrichment;
pub mod health;
pub mod papers;
pub mod stats;
