//! NutriScan Tools module
//!
//! MCP tool implementations for NutriScan.

pub mod nutrition;
pub mod reports;
pub mod scans;
pub mod status;
pub mod vision;
