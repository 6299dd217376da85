//! Data models
//!
//! The external product record, the derived report, and persisted entities.

mod object_count;
mod product;
mod report;
mod scan;

pub use object_count::{CachedCount, CountCacheStats};
pub use product::{
    ComponentEntry, ComponentGroups, NutriScoreData, ProductRecord, UNKNOWN_GRADE, UNKNOWN_PRODUCT,
};
pub use report::{
    ComponentKind, ComponentRow, NutrientRow, NutritionReport, ObjectCount, ReportIssue,
    SummaryRecord,
};
pub use scan::{Scan, ScanCreate};
