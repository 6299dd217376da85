//! Scan history tools

use serde::Serialize;

use crate::db::Database;
use crate::models::Scan;

/// Summary of a scan for list results
#[derive(Debug, Serialize)]
pub struct ScanSummary {
    pub id: i64,
    pub barcode: String,
    pub product_name: String,
    pub nutrition_grade: String,
    pub final_score: f64,
    pub is_healthy: bool,
    pub object_count: Option<i64>,
    pub scanned_at: String,
}

impl From<&Scan> for ScanSummary {
    fn from(scan: &Scan) -> Self {
        Self {
            id: scan.id,
            barcode: scan.barcode.clone(),
            product_name: scan.product_name.clone(),
            nutrition_grade: scan.nutrition_grade.clone(),
            final_score: scan.final_score,
            is_healthy: scan.is_healthy,
            object_count: scan.object_count,
            scanned_at: scan.scanned_at.clone(),
        }
    }
}

/// Response for list_scans
#[derive(Debug, Serialize)]
pub struct ListScansResponse {
    pub scans: Vec<ScanSummary>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Response for delete_scan
#[derive(Debug, Serialize)]
pub struct DeleteScanResponse {
    pub success: bool,
    pub deleted_id: i64,
}

/// List recorded scans, newest first
pub fn list_scans(db: &Database, barcode: Option<&str>, limit: i64, offset: i64) -> Result<ListScansResponse, String> {
    let limit = limit.clamp(1, 200);
    let offset = offset.max(0);
    let barcode = barcode.map(str::trim).filter(|b| !b.is_empty());
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let scans = Scan::list(&conn, barcode, limit, offset)
        .map_err(|e| format!("Failed to list scans: {}", e))?;
    let total = Scan::count(&conn, barcode)
        .map_err(|e| format!("Failed to count scans: {}", e))?;

    Ok(ListScansResponse {
        scans: scans.iter().map(ScanSummary::from).collect(),
        total,
        limit,
        offset,
    })
}

/// Get a scan with its full report
pub fn get_scan(db: &Database, id: i64) -> Result<Option<Scan>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    Scan::get_by_id(&conn, id).map_err(|e| format!("Failed to get scan: {}", e))
}

pub fn delete_scan(db: &Database, id: i64) -> Result<DeleteScanResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let deleted = Scan::delete(&conn, id).map_err(|e| format!("Failed to delete scan: {}", e))?;
    if !deleted {
        return Err(format!("Scan {} not found", id));
    }

    Ok(DeleteScanResponse {
        success: true,
        deleted_id: id,
    })
}
