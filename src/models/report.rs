//! Derived nutrition report model
//!
//! Output of the normalizer. Built once per product and never mutated.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One nutrient per 100g
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutrientRow {
    pub name: String,
    pub value_per_100g: f64,
    pub unit: String,
}

/// Which side of the Nutri-Score a component counts towards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Negative,
    Positive,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Negative => "Negative",
            ComponentKind::Positive => "Positive",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One Nutri-Score component row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRow {
    pub component: String,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub points: Option<f64>,
    pub points_max: Option<f64>,
    pub kind: ComponentKind,
}

/// Nutri-Score totals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub positive_points: f64,
    pub negative_points: f64,
    /// `positive_points - negative_points`
    pub final_score: f64,
    pub is_healthy: bool,
    /// Score precomputed by the food data source, for reference only
    pub api_score: Option<f64>,
}

/// Result of the vision object counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectCount {
    pub object_type: String,
    pub count: u32,
}

/// Input the normalizer could not use as-is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ReportIssue {
    /// A per-100g entry was not numeric; its row was omitted
    MalformedNutrientValue { key: String },
    /// A component lacked a field; it was defaulted
    MissingComponentFields {
        kind: ComponentKind,
        component: String,
        field: String,
    },
}

impl fmt::Display for ReportIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportIssue::MalformedNutrientValue { key } => {
                write!(f, "nutriment '{}' is not numeric, row omitted", key)
            }
            ReportIssue::MissingComponentFields { kind, component, field } => {
                write!(f, "{} component '{}' is missing '{}'", kind, component, field)
            }
        }
    }
}

/// Everything the presentation layer renders for one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionReport {
    pub product_name: String,
    pub nutrition_grade: String,
    pub nutrient_rows: Vec<NutrientRow>,
    pub component_rows: Vec<ComponentRow>,
    pub summary: SummaryRecord,
    pub object_count: Option<ObjectCount>,
    #[serde(default)]
    pub issues: Vec<ReportIssue>,
}

impl NutritionReport {
    pub fn rows_of_kind(&self, kind: ComponentKind) -> impl Iterator<Item = &ComponentRow> {
        self.component_rows.iter().filter(move |r| r.kind == kind)
    }
}
