//! Product record model
//!
//! The `product` object returned by the food facts API, read-only.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const UNKNOWN_PRODUCT: &str = "Unknown Product";
pub const UNKNOWN_GRADE: &str = "N/A";

/// A product as returned by the food data lookup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(rename = "product_name", default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(rename = "nutrition_grades", default, deserialize_with = "lenient_string")]
    pub nutrition_grade: Option<String>,
    /// Flat key space, insertion order preserved
    #[serde(default, deserialize_with = "object_or_empty")]
    pub nutriments: Map<String, Value>,
    #[serde(rename = "nutriscore_data", default, deserialize_with = "null_as_default")]
    pub nutri_score: NutriScoreData,
}

impl ProductRecord {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN_PRODUCT)
    }

    /// Grade upper-cased for display, "N/A" when absent
    pub fn display_grade(&self) -> String {
        self.nutrition_grade
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .unwrap_or(UNKNOWN_GRADE)
            .to_uppercase()
    }
}

/// Precomputed Nutri-Score data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NutriScoreData {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub positive_points: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub negative_points: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub components: ComponentGroups,
}

/// Positive and negative Nutri-Score components, in API order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentGroups {
    #[serde(default, deserialize_with = "null_as_default")]
    pub positive: Vec<ComponentEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub negative: Vec<ComponentEntry>,
}

/// One Nutri-Score component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub points: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub points_max: Option<f64>,
}

/// Numbers and numeric strings become `Some`, anything else `None`
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    })
}

/// Strings are kept, numbers are stringified, anything else is `None`
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn object_or_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Object(map) => map,
        _ => Map::new(),
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_full_product() {
        let product: ProductRecord = serde_json::from_value(json!({
            "product_name": "Nutella",
            "nutrition_grades": "e",
            "nutriments": {
                "sugars_100g": 56.3,
                "energy-kcal_100g": 539,
                "energy-kcal_unit": "kcal"
            },
            "nutriscore_data": {
                "score": 26,
                "positive_points": 0,
                "negative_points": 26,
                "components": {
                    "negative": [{"id": "sugars", "value": 56.3, "unit": "g", "points": 12, "points_max": 15}],
                    "positive": [{"id": "fiber", "value": null, "unit": "g", "points": 0, "points_max": 5}]
                }
            }
        }))
        .unwrap();

        assert_eq!(product.display_name(), "Nutella");
        assert_eq!(product.display_grade(), "E");
        let keys: Vec<&String> = product.nutriments.keys().collect();
        assert_eq!(keys, vec!["sugars_100g", "energy-kcal_100g", "energy-kcal_unit"]);
        assert_eq!(product.nutri_score.negative_points, Some(26.0));
        assert_eq!(product.nutri_score.components.negative[0].points_max, Some(15.0));
        assert_eq!(product.nutri_score.components.positive[0].value, None);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let product: ProductRecord = serde_json::from_value(json!({})).unwrap();
        assert_eq!(product.display_name(), UNKNOWN_PRODUCT);
        assert_eq!(product.display_grade(), UNKNOWN_GRADE);
        assert!(product.nutriments.is_empty());
        assert!(product.nutri_score.components.positive.is_empty());
        assert!(product.nutri_score.components.negative.is_empty());
    }

    #[test]
    fn test_nulls_and_wrong_types_do_not_fail() {
        let product: ProductRecord = serde_json::from_value(json!({
            "product_name": null,
            "nutrition_grades": "",
            "nutriments": [],
            "nutriscore_data": {
                "positive_points": "7",
                "negative_points": "n/a",
                "components": {"positive": null, "negative": [{"id": 12, "points": true}]}
            }
        }))
        .unwrap();

        assert_eq!(product.display_name(), UNKNOWN_PRODUCT);
        assert_eq!(product.display_grade(), UNKNOWN_GRADE);
        assert!(product.nutriments.is_empty());
        assert_eq!(product.nutri_score.positive_points, Some(7.0));
        assert_eq!(product.nutri_score.negative_points, None);
        let entry = &product.nutri_score.components.negative[0];
        assert_eq!(entry.id.as_deref(), Some("12"));
        assert_eq!(entry.points, None);
    }
}
