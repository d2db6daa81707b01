//! Rules core for fleet combat: modifier stacking, the per-fleet status
//! machine, and deterministic round resolution.

pub mod cli;
pub mod combat;
pub mod config;
pub mod data;
pub mod error;
pub mod parallel;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
