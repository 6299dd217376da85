//! Nutrition normalization module
//!
//! Turns a food facts product record into report rows.

pub mod labels;
pub mod normalizer;

pub use labels::{display_label, normalize_separators, title_case};
pub use normalizer::{
    compute_summary, extract_component_rows, extract_nutrient_rows, normalize, round2,
    PER_100G_SUFFIX, UNIT_SUFFIX,
};
