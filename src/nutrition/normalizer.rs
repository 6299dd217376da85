//! Nutrition normalizer
//!
//! Reshapes a raw product record into nutrient rows, Nutri-Score component
//! rows and a summary. Pure and synchronous: malformed input degrades the
//! report (a row is dropped or a field defaulted) and is recorded as a
//! [`ReportIssue`] instead of failing.

use serde_json::{Map, Value};

use crate::models::{
    ComponentEntry, ComponentGroups, ComponentKind, ComponentRow, NutriScoreData, NutrientRow,
    NutritionReport, ObjectCount, ProductRecord, ReportIssue, SummaryRecord,
};

use super::labels::display_label;

/// Suffix marking a per-100g quantity
pub const PER_100G_SUFFIX: &str = "_100g";
/// Suffix of the sibling key holding a quantity's unit
pub const UNIT_SUFFIX: &str = "_unit";

/// Round to 2 decimals, half away from zero
///
/// Values too large to scale by 100 have no fractional digits left and are
/// returned unchanged.
pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / 100.0
}

/// Nutrient rows, one per `_100g` key, in source order
pub fn extract_nutrient_rows(nutriments: &Map<String, Value>) -> (Vec<NutrientRow>, Vec<ReportIssue>) {
    let mut rows = Vec::new();
    let mut issues = Vec::new();

    for (key, value) in nutriments {
        let Some(base) = key.strip_suffix(PER_100G_SUFFIX) else {
            continue;
        };

        let Some(amount) = value.as_f64().filter(|v| v.is_finite()) else {
            tracing::warn!("Skipping nutriment '{}': non-numeric value {}", key, value);
            issues.push(ReportIssue::MalformedNutrientValue { key: key.clone() });
            continue;
        };

        let unit = nutriments
            .get(&format!("{}{}", base, UNIT_SUFFIX))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        rows.push(NutrientRow {
            name: display_label(base),
            value_per_100g: round2(amount),
            unit,
        });
    }

    (rows, issues)
}

fn component_row(
    entry: &ComponentEntry,
    kind: ComponentKind,
    issues: &mut Vec<ReportIssue>,
) -> ComponentRow {
    let id = entry.id.as_deref().unwrap_or("");
    let component = display_label(id);

    let mut missing = |field: &str| {
        issues.push(ReportIssue::MissingComponentFields {
            kind,
            component: component.clone(),
            field: field.to_string(),
        });
    };
    if entry.id.is_none() {
        missing("id");
    }
    if entry.points.is_none() {
        missing("points");
    }

    ComponentRow {
        component,
        value: entry.value,
        unit: entry.unit.clone(),
        points: entry.points,
        points_max: entry.points_max,
        kind,
    }
}

/// All negative component rows, then all positive ones, each in input order
pub fn extract_component_rows(components: &ComponentGroups) -> (Vec<ComponentRow>, Vec<ReportIssue>) {
    let mut issues = Vec::new();

    let rows: Vec<ComponentRow> = components
        .negative
        .iter()
        .map(|e| (e, ComponentKind::Negative))
        .chain(components.positive.iter().map(|e| (e, ComponentKind::Positive)))
        .map(|(entry, kind)| component_row(entry, kind, &mut issues))
        .collect();

    (rows, issues)
}

/// Totals with missing points treated as zero
pub fn compute_summary(nutri_score: &NutriScoreData) -> SummaryRecord {
    let positive_points = nutri_score.positive_points.unwrap_or(0.0);
    let negative_points = nutri_score.negative_points.unwrap_or(0.0);
    let final_score = positive_points - negative_points;

    SummaryRecord {
        positive_points,
        negative_points,
        final_score,
        is_healthy: final_score > 0.0,
        api_score: nutri_score.score,
    }
}

/// Build the full report for a product
pub fn normalize(product: &ProductRecord, external_count: Option<ObjectCount>) -> NutritionReport {
    let (nutrient_rows, mut issues) = extract_nutrient_rows(&product.nutriments);
    let (component_rows, component_issues) = extract_component_rows(&product.nutri_score.components);
    issues.extend(component_issues);

    NutritionReport {
        product_name: product.display_name().to_string(),
        nutrition_grade: product.display_grade(),
        nutrient_rows,
        component_rows,
        summary: compute_summary(&product.nutri_score),
        object_count: external_count,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nutriments(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn entry(id: &str, points: f64, points_max: f64) -> ComponentEntry {
        ComponentEntry {
            id: Some(id.to_string()),
            value: None,
            unit: None,
            points: Some(points),
            points_max: Some(points_max),
        }
    }

    #[test]
    fn test_energy_row_example() {
        let (rows, issues) = extract_nutrient_rows(&nutriments(json!({
            "energy-kcal_100g": 52.345,
            "energy-kcal_unit": "kcal"
        })));

        assert!(issues.is_empty());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Energy Kcal");
        assert!((rows[0].value_per_100g - 52.35).abs() < 1e-9);
        assert_eq!(rows[0].unit, "kcal");
    }

    #[test]
    fn test_one_row_per_100g_key_in_source_order() {
        let (rows, _) = extract_nutrient_rows(&nutriments(json!({
            "sugars_100g": 10,
            "sugars": 10,
            "sugars_unit": "g",
            "salt_100g": 0.1234,
            "nova-group": 4,
            "fat_100g": 3.0
        })));

        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Sugars", "Salt", "Fat"]);
        assert_eq!(rows[0].unit, "g");
        assert_eq!(rows[1].unit, "");
        assert!((rows[1].value_per_100g - 0.12).abs() < 1e-9);
    }

    #[test]
    fn test_huge_values_stay_finite() {
        let (rows, issues) = extract_nutrient_rows(&nutriments(json!({
            "energy_100g": 1.0e307
        })));

        assert!(issues.is_empty());
        assert_eq!(rows[0].value_per_100g, 1.0e307);
        assert!(rows[0].value_per_100g.is_finite());
    }

    #[test]
    fn test_no_per_100g_keys_gives_no_rows() {
        let (rows, issues) = extract_nutrient_rows(&nutriments(json!({"energy": 120, "energy_unit": "kJ"})));
        assert!(rows.is_empty());
        assert!(issues.is_empty());

        let (rows, issues) = extract_nutrient_rows(&Map::new());
        assert!(rows.is_empty());
        assert!(issues.is_empty());
    }

    #[test]
    fn test_non_numeric_value_is_dropped() {
        let (rows, issues) = extract_nutrient_rows(&nutriments(json!({
            "fiber_100g": "traces",
            "proteins_100g": 8,
            "salt_100g": null
        })));

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Proteins");
        assert_eq!(
            issues,
            vec![
                ReportIssue::MalformedNutrientValue { key: "fiber_100g".to_string() },
                ReportIssue::MalformedNutrientValue { key: "salt_100g".to_string() },
            ]
        );
    }

    #[test]
    fn test_rounding_is_half_away_from_zero() {
        // exact binary midpoints
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(-0.125), -0.13);
        assert_eq!(round2(0.625), 0.63);
        assert_eq!(round2(2.5), 2.5);
        assert_eq!(round2(0.0), 0.0);
        assert_eq!(round2(1.0e307), 1.0e307);
        assert_eq!(round2(-f64::MAX), -f64::MAX);
    }

    #[test]
    fn test_component_rows_example() {
        let groups = ComponentGroups {
            negative: vec![entry("saturated_fat", 3.0, 10.0)],
            positive: vec![entry("fiber", 2.0, 5.0)],
        };

        let (rows, issues) = extract_component_rows(&groups);

        assert!(issues.is_empty());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].component, "Saturated Fat");
        assert_eq!(rows[0].kind, ComponentKind::Negative);
        assert_eq!(rows[0].points, Some(3.0));
        assert_eq!(rows[1].component, "Fiber");
        assert_eq!(rows[1].kind, ComponentKind::Positive);
        assert_eq!(rows[1].points, Some(2.0));
    }

    #[test]
    fn test_negative_rows_precede_positive_rows() {
        let groups = ComponentGroups {
            positive: vec![entry("fiber", 1.0, 5.0), entry("proteins", 2.0, 7.0)],
            negative: vec![entry("energy", 3.0, 10.0), entry("sugars", 4.0, 15.0), entry("salt", 0.0, 20.0)],
        };

        let (rows, _) = extract_component_rows(&groups);
        let order: Vec<(&str, ComponentKind)> = rows.iter().map(|r| (r.component.as_str(), r.kind)).collect();

        assert_eq!(
            order,
            vec![
                ("Energy", ComponentKind::Negative),
                ("Sugars", ComponentKind::Negative),
                ("Salt", ComponentKind::Negative),
                ("Fiber", ComponentKind::Positive),
                ("Proteins", ComponentKind::Positive),
            ]
        );
    }

    #[test]
    fn test_missing_component_fields_are_defaulted() {
        let groups = ComponentGroups {
            positive: vec![ComponentEntry::default()],
            negative: vec![],
        };

        let (rows, issues) = extract_component_rows(&groups);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].component, "");
        assert_eq!(rows[0].points, None);
        assert_eq!(issues.len(), 2);
        assert!(matches!(&issues[0], ReportIssue::MissingComponentFields { field, .. } if field == "id"));
        assert!(matches!(&issues[1], ReportIssue::MissingComponentFields { field, .. } if field == "points"));
    }

    #[test]
    fn test_summary_example() {
        let summary = compute_summary(&NutriScoreData {
            positive_points: Some(7.0),
            negative_points: Some(4.0),
            ..Default::default()
        });

        assert_eq!(summary.final_score, 3.0);
        assert!(summary.is_healthy);
        assert_eq!(summary.api_score, None);
    }

    #[test]
    fn test_summary_difference_holds() {
        for (pos, neg) in [(0.0, 0.0), (1.0, 9.0), (10.0, 2.5), (-3.0, -3.0)] {
            let summary = compute_summary(&NutriScoreData {
                positive_points: Some(pos),
                negative_points: Some(neg),
                score: Some(99.0),
                ..Default::default()
            });
            assert_eq!(summary.final_score, pos - neg);
            assert_eq!(summary.is_healthy, pos - neg > 0.0);
            assert_eq!(summary.api_score, Some(99.0));
        }
    }

    #[test]
    fn test_summary_missing_points_are_zero() {
        let summary = compute_summary(&NutriScoreData {
            negative_points: Some(5.0),
            ..Default::default()
        });
        assert_eq!(summary.positive_points, 0.0);
        assert_eq!(summary.final_score, -5.0);
        assert!(!summary.is_healthy);

        let empty = compute_summary(&NutriScoreData::default());
        assert_eq!(empty.final_score, 0.0);
        assert!(!empty.is_healthy);
    }

    #[test]
    fn test_normalize_empty_product() {
        let report = normalize(&ProductRecord::default(), None);

        assert_eq!(report.product_name, "Unknown Product");
        assert_eq!(report.nutrition_grade, "N/A");
        assert!(report.nutrient_rows.is_empty());
        assert!(report.component_rows.is_empty());
        assert!(report.issues.is_empty());
        assert_eq!(report.object_count, None);
    }

    #[test]
    fn test_normalize_carries_external_count() {
        let product: ProductRecord = serde_json::from_value(json!({
            "product_name": "Granola Bar",
            "nutrition_grades": "b",
            "nutriments": {"fiber_100g": 6.2, "fiber_unit": "g", "sodium_100g": "?"},
            "nutriscore_data": {
                "positive_points": 5,
                "negative_points": 2,
                "components": {"negative": [{"id": "sodium"}], "positive": [{"id": "fiber", "points": 5, "points_max": 5}]}
            }
        }))
        .unwrap();
        let count = ObjectCount { object_type: "granola bar".to_string(), count: 3 };

        let report = normalize(&product, Some(count.clone()));

        assert_eq!(report.product_name, "Granola Bar");
        assert_eq!(report.nutrition_grade, "B");
        assert_eq!(report.nutrient_rows.len(), 1);
        assert_eq!(report.component_rows.len(), 2);
        assert_eq!(report.rows_of_kind(ComponentKind::Positive).count(), 1);
        assert_eq!(report.summary.final_score, 3.0);
        assert_eq!(report.object_count, Some(count));
        assert_eq!(report.issues.len(), 2);
    }
}
