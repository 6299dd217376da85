//! NutriScan Library
//!
//! Barcode lookup, Nutri-Score normalization and scan history.

pub mod build_info;
pub mod config;
pub mod db;
pub mod external;
pub mod mcp;
pub mod models;
pub mod nutrition;
pub mod tools;
