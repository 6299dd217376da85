//! Nutrition report tools
//!
//! Resolve a barcode (typed or read from a photo), fetch the product,
//! normalize it, and optionally record the scan.

use serde::Serialize;

use crate::db::Database;
use crate::external::{BarcodeRecognizer, LookupError, ObjectCounter, ProductLookup};
use crate::models::{NutritionReport, ObjectCount, Scan, ScanCreate};
use crate::nutrition::normalize;

use super::vision;

/// Inputs for a nutrition report
#[derive(Debug, Clone, Default)]
pub struct ReportRequest {
    pub barcode: Option<String>,
    pub barcode_image_path: Option<String>,
    /// Count supplied directly by the caller
    pub object_count: Option<ObjectCount>,
    /// Photo to count objects in when no count is supplied
    pub count_image_path: Option<String>,
    pub record_scan: bool,
}

impl ReportRequest {
    pub fn needs_barcode_recognizer(&self) -> bool {
        self.barcode_is_blank() && self.barcode_image_path.is_some()
    }

    pub fn needs_object_counter(&self) -> bool {
        self.object_count.is_none() && self.count_image_path.is_some()
    }

    fn barcode_is_blank(&self) -> bool {
        self.barcode.as_deref().map_or(true, |b| b.trim().is_empty())
    }
}

/// Response for get_nutrition_report
#[derive(Debug, Serialize)]
pub struct NutritionReportResponse {
    pub barcode: String,
    pub barcode_source: &'static str,
    pub scan_id: Option<i64>,
    pub report: NutritionReport,
}

/// Response when the lookup has no product for the barcode
#[derive(Debug, Serialize)]
pub struct ProductNotFoundResponse {
    pub error: String,
    pub barcode: String,
}

/// Outcome of a report request
#[derive(Debug)]
pub enum ReportOutcome {
    Found(NutritionReportResponse),
    NotFound(ProductNotFoundResponse),
}

fn resolve_barcode(
    request: &ReportRequest,
    recognizer: Option<&dyn BarcodeRecognizer>,
) -> Result<(String, &'static str), String> {
    if let Some(barcode) = request.barcode.as_deref().filter(|b| !b.trim().is_empty()) {
        return Ok((barcode.trim().to_string(), "typed"));
    }

    let path = request
        .barcode_image_path
        .as_deref()
        .ok_or("Either barcode or barcode_image_path is required")?;
    let recognizer = recognizer.ok_or("Barcode recognition is not available")?;

    let decoded = vision::decode_barcode(recognizer, path)?;
    match decoded.barcode {
        Some(barcode) => Ok((barcode, "image")),
        None => Err(format!("No barcode found in image {}", path)),
    }
}

fn resolve_count(
    db: &Database,
    request: &ReportRequest,
    counter: Option<&dyn ObjectCounter>,
) -> Result<Option<ObjectCount>, String> {
    if let Some(count) = &request.object_count {
        return Ok(Some(count.clone()));
    }
    let Some(path) = request.count_image_path.as_deref() else {
        return Ok(None);
    };
    let counter = counter.ok_or("Object counting is not available (set ANTHROPIC_API_KEY)")?;

    let counted = vision::count_objects(db, counter, path, false)?;
    Ok(Some(counted.object_count))
}

/// Build a report for one product
pub fn get_nutrition_report(
    db: &Database,
    lookup: &dyn ProductLookup,
    recognizer: Option<&dyn BarcodeRecognizer>,
    counter: Option<&dyn ObjectCounter>,
    request: &ReportRequest,
) -> Result<ReportOutcome, String> {
    let (barcode, barcode_source) = resolve_barcode(request, recognizer)?;

    let product = match lookup.fetch_product(&barcode) {
        Ok(product) => product,
        Err(LookupError::NotFound(barcode)) => {
            tracing::info!("No product for barcode {}", barcode);
            return Ok(ReportOutcome::NotFound(ProductNotFoundResponse {
                error: "Product not found".to_string(),
                barcode,
            }));
        }
        Err(e) => return Err(e.to_string()),
    };

    // Count only once the product is known to exist
    let object_count = resolve_count(db, request, counter)?;
    let report = normalize(&product, object_count);

    for issue in &report.issues {
        tracing::debug!("Report issue for {}: {}", barcode, issue);
    }

    let scan_id = if request.record_scan {
        let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
        let scan = Scan::create(&conn, &ScanCreate { barcode: &barcode, report: &report })
            .map_err(|e| format!("Failed to record scan: {}", e))?;
        Some(scan.id)
    } else {
        None
    };

    Ok(ReportOutcome::Found(NutritionReportResponse {
        barcode,
        barcode_source,
        scan_id,
        report,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::VisionError;
    use crate::models::ProductRecord;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeLookup;

    impl ProductLookup for FakeLookup {
        fn fetch_product(&self, barcode: &str) -> Result<ProductRecord, LookupError> {
            match barcode {
                "3017624010701" => Ok(serde_json::from_value(json!({
                    "product_name": "Nutella",
                    "nutrition_grades": "e",
                    "nutriments": {"sugars_100g": 56.3, "sugars_unit": "g"},
                    "nutriscore_data": {
                        "positive_points": 0,
                        "negative_points": 26,
                        "components": {"negative": [{"id": "sugars", "points": 10, "points_max": 10}], "positive": []}
                    }
                }))
                .unwrap()),
                "40000000" => Ok(serde_json::from_value(json!({
                    "product_name": "Dense Bar",
                    "nutriments": {"energy_100g": 1.0e307, "energy_unit": "kJ"}
                }))
                .unwrap()),
                other => Err(LookupError::NotFound(other.to_string())),
            }
        }
    }

    struct FakeVision {
        barcode: Option<String>,
        calls: AtomicUsize,
    }

    impl BarcodeRecognizer for FakeVision {
        fn recognize_barcode(&self, _image: &[u8]) -> Result<Option<String>, VisionError> {
            Ok(self.barcode.clone())
        }
    }

    impl ObjectCounter for FakeVision {
        fn count_objects(&self, _image: &[u8]) -> Result<ObjectCount, VisionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ObjectCount { object_type: "jar".to_string(), count: 2 })
        }

        fn counter_name(&self) -> &str {
            "fake"
        }
    }

    fn temp_image(name: &str) -> String {
        let path = std::env::temp_dir().join(format!("nutriscan-{}-{}", std::process::id(), name));
        std::fs::write(&path, name.as_bytes()).unwrap();
        path.display().to_string()
    }

    #[test]
    fn test_typed_barcode_report_is_recorded() {
        let db = Database::in_memory().unwrap();
        let request = ReportRequest {
            barcode: Some(" 3017624010701 ".to_string()),
            record_scan: true,
            ..Default::default()
        };

        let outcome = get_nutrition_report(&db, &FakeLookup, None, None, &request).unwrap();
        let ReportOutcome::Found(response) = outcome else {
            panic!("expected a report");
        };

        assert_eq!(response.barcode, "3017624010701");
        assert_eq!(response.barcode_source, "typed");
        assert_eq!(response.report.product_name, "Nutella");
        assert_eq!(response.report.summary.final_score, -26.0);
        assert!(!response.report.summary.is_healthy);

        let scan_id = response.scan_id.unwrap();
        let conn = db.get_conn().unwrap();
        let scan = Scan::get_by_id(&conn, scan_id).unwrap().unwrap();
        assert_eq!(scan.report, response.report);
    }

    #[test]
    fn test_huge_values_are_recorded_without_breaking_history() {
        let db = Database::in_memory().unwrap();
        for barcode in ["3017624010701", "40000000"] {
            let request = ReportRequest {
                barcode: Some(barcode.to_string()),
                record_scan: true,
                ..Default::default()
            };
            let outcome = get_nutrition_report(&db, &FakeLookup, None, None, &request).unwrap();
            let ReportOutcome::Found(response) = outcome else {
                panic!("expected a report for {}", barcode);
            };
            assert!(response.scan_id.is_some());
            assert!(response.report.nutrient_rows.iter().all(|r| r.value_per_100g.is_finite()));
        }

        let listed = crate::tools::scans::list_scans(&db, None, 10, 0).unwrap();
        assert_eq!(listed.total, 2);
        assert_eq!(listed.scans[0].product_name, "Dense Bar");
    }

    #[test]
    fn test_not_found_is_not_an_error() {
        let db = Database::in_memory().unwrap();
        let request = ReportRequest {
            barcode: Some("00000000".to_string()),
            record_scan: true,
            ..Default::default()
        };

        let outcome = get_nutrition_report(&db, &FakeLookup, None, None, &request).unwrap();
        assert!(matches!(outcome, ReportOutcome::NotFound(ref r) if r.barcode == "00000000"));

        let conn = db.get_conn().unwrap();
        assert_eq!(Scan::count(&conn, None).unwrap(), 0);
    }

    #[test]
    fn test_missing_barcode_inputs() {
        let db = Database::in_memory().unwrap();
        let err = get_nutrition_report(&db, &FakeLookup, None, None, &ReportRequest::default()).unwrap_err();
        assert!(err.contains("barcode"));

        let request = ReportRequest {
            barcode_image_path: Some("/nowhere.png".to_string()),
            ..Default::default()
        };
        assert!(request.needs_barcode_recognizer());
        let err = get_nutrition_report(&db, &FakeLookup, None, None, &request).unwrap_err();
        assert!(err.contains("not available"));
    }

    #[test]
    fn test_barcode_from_image_and_cached_count() {
        let db = Database::in_memory().unwrap();
        let vision = FakeVision { barcode: Some("3017624010701".to_string()), calls: AtomicUsize::new(0) };
        let request = ReportRequest {
            barcode_image_path: Some(temp_image("barcode.png")),
            count_image_path: Some(temp_image("jars.png")),
            record_scan: false,
            ..Default::default()
        };
        assert!(request.needs_object_counter());

        for _ in 0..2 {
            let outcome = get_nutrition_report(&db, &FakeLookup, Some(&vision), Some(&vision), &request).unwrap();
            let ReportOutcome::Found(response) = outcome else {
                panic!("expected a report");
            };
            assert_eq!(response.barcode_source, "image");
            assert_eq!(response.scan_id, None);
            assert_eq!(response.report.object_count, Some(ObjectCount { object_type: "jar".to_string(), count: 2 }));
        }

        // second request served from the hash cache
        assert_eq!(vision.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_explicit_count_skips_counter() {
        let db = Database::in_memory().unwrap();
        let vision = FakeVision { barcode: None, calls: AtomicUsize::new(0) };
        let request = ReportRequest {
            barcode: Some("3017624010701".to_string()),
            object_count: Some(ObjectCount { object_type: "jar".to_string(), count: 5 }),
            count_image_path: Some("/unused.png".to_string()),
            ..Default::default()
        };
        assert!(!request.needs_object_counter());

        let outcome = get_nutrition_report(&db, &FakeLookup, None, Some(&vision), &request).unwrap();
        let ReportOutcome::Found(response) = outcome else {
            panic!("expected a report");
        };
        assert_eq!(response.report.object_count.unwrap().count, 5);
        assert_eq!(vision.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_image_without_barcode() {
        let db = Database::in_memory().unwrap();
        let vision = FakeVision { barcode: None, calls: AtomicUsize::new(0) };
        let request = ReportRequest {
            barcode_image_path: Some(temp_image("blank.png")),
            ..Default::default()
        };

        let err = get_nutrition_report(&db, &FakeLookup, Some(&vision), None, &request).unwrap_err();
        assert!(err.starts_with("No barcode found"));
    }
}
