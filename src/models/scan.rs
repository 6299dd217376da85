//! Scan history model
//!
//! One row per nutrition report generated for a barcode.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;
use super::NutritionReport;

/// A recorded scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    pub id: i64,
    pub barcode: String,
    pub product_name: String,
    pub nutrition_grade: String,
    pub final_score: f64,
    pub is_healthy: bool,
    pub object_count: Option<i64>,
    pub report: NutritionReport,
    pub scanned_at: String,
}

/// Data for recording a scan
#[derive(Debug, Clone)]
pub struct ScanCreate<'a> {
    pub barcode: &'a str,
    pub report: &'a NutritionReport,
}

impl Scan {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let report_json: String = row.get("report_json")?;
        let report: NutritionReport = serde_json::from_str(&report_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Self {
            id: row.get("id")?,
            barcode: row.get("barcode")?,
            product_name: row.get("product_name")?,
            nutrition_grade: row.get("nutrition_grade")?,
            final_score: row.get("final_score")?,
            is_healthy: row.get::<_, i32>("is_healthy")? != 0,
            object_count: row.get("object_count")?,
            report,
            scanned_at: row.get("scanned_at")?,
        })
    }

    /// Insert a new scan
    ///
    /// The report must survive a JSON round trip (non-finite numbers do
    /// not), and the insert is rolled back if the row cannot be read back.
    pub fn create(conn: &Connection, data: &ScanCreate) -> DbResult<Self> {
        let report_json = serde_json::to_string(data.report).map_err(|e| {
            rusqlite::Error::ToSqlConversionFailure(Box::new(e))
        })?;
        serde_json::from_str::<NutritionReport>(&report_json).map_err(|e| {
            rusqlite::Error::ToSqlConversionFailure(Box::new(e))
        })?;

        let tx = conn.unchecked_transaction()?;
        tx.execute(
            r#"
            INSERT INTO scans (
                barcode, product_name, nutrition_grade, final_score, is_healthy,
                object_count, report_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                data.barcode,
                data.report.product_name,
                data.report.nutrition_grade,
                data.report.summary.final_score,
                data.report.summary.is_healthy as i32,
                data.report.object_count.as_ref().map(|c| c.count as i64),
                report_json,
            ],
        )?;

        let id = tx.last_insert_rowid();
        let scan = Self::get_by_id(&tx, id)?.ok_or_else(|| {
            crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows)
        })?;
        tx.commit()?;
        Ok(scan)
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM scans WHERE id = ?1")?;

        match stmt.query_row([id], Self::from_row) {
            Ok(scan) => Ok(Some(scan)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Most recent scans first, optionally for a single barcode
    pub fn list(conn: &Connection, barcode: Option<&str>, limit: i64, offset: i64) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM scans
            WHERE ?1 IS NULL OR barcode = ?1
            ORDER BY scanned_at DESC, id DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )?;

        let scans = stmt
            .query_map(params![barcode, limit, offset], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(scans)
    }

    pub fn count(conn: &Connection, barcode: Option<&str>) -> DbResult<i64> {
        let total = conn.query_row(
            "SELECT COUNT(*) FROM scans WHERE ?1 IS NULL OR barcode = ?1",
            params![barcode],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Returns true if a row was deleted
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let affected = conn.execute("DELETE FROM scans WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }
}
