//! Database migrations
//!
//! Schema creation and migration logic.

use rusqlite::Connection;

use super::connection::DbResult;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Run all migrations to bring the database up to the current schema version
pub fn run_migrations(conn: &Connection) -> DbResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (1)", [])?;
    }

    Ok(())
}

/// Migration v1: Initial schema
fn migrate_v1(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- ============================================
        -- SCANS
        -- Every nutrition report generated for a barcode
        -- ============================================
        CREATE TABLE scans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            barcode TEXT NOT NULL,
            product_name TEXT NOT NULL,
            nutrition_grade TEXT NOT NULL,
            final_score REAL NOT NULL,            -- positive_points - negative_points
            is_healthy INTEGER NOT NULL,          -- boolean
            object_count INTEGER,                 -- from the vision counter, if supplied
            report_json TEXT NOT NULL,            -- full serialized report
            scanned_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_scans_barcode ON scans(barcode);
        CREATE INDEX idx_scans_scanned_at ON scans(scanned_at);

        -- ============================================
        -- OBJECT COUNTS
        -- Vision counts keyed by image content hash
        -- ============================================
        CREATE TABLE object_counts (
            image_sha256 TEXT PRIMARY KEY,        -- lowercase hex digest
            object_type TEXT NOT NULL,
            count INTEGER NOT NULL CHECK(count >= 0),
            model TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )?;

    Ok(())
}

/// Get the current schema version
pub fn get_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);
    Ok(version)
}
