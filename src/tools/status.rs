//! NutriScan Status Tool
//!
//! Provides runtime status information about the NutriScan service.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::build_info::BuildInfo;
use crate::config::Config;

/// Scanning instructions for AI assistants
pub const SCAN_INSTRUCTIONS: &str = r#"
# NutriScan Instructions

This guide explains how to produce nutrition reports with the NutriScan tools.

## Overview

A report needs a **barcode**. Everything else is optional:
1. **Barcode** - typed digits (8 to 14) or a photo of the barcode
2. **Object count** - how many items are in a photo of the food
3. **Scan history** - reports are recorded unless `record_scan` is false

---

## Getting a Report

```
get_nutrition_report(barcode: "3017624010701")
```

From photos instead of typed digits:

```
get_nutrition_report(
  barcode_image_path: "/photos/label.jpg",
  count_image_path: "/photos/plate.jpg"
)
```

A count you already know can be passed directly and skips the vision model:

```
get_nutrition_report(barcode: "3017624010701", object_type: "cookie", count: 3)
```

If the product database has no entry, the tool returns
`{"error": "Product not found", "barcode": "..."}`. This is not a failure;
ask the user to check the digits or try another photo.

## Reading the Report

- **nutrient_rows** - every per-100g value, labels title-cased, rounded to 2 decimals
- **component_rows** - Nutri-Score components, negative ones first
- **summary.final_score** - positive points minus negative points
- **summary.is_healthy** - true only when final_score is greater than zero
- **summary.api_score** - the score reported by the product database, for reference
- **issues** - values that could not be used (non-numeric or missing fields)

## Vision Tools

| Task | Tool |
|------|------|
| Read a barcode from a photo | `decode_barcode` |
| Count items in a photo | `count_objects` |
| Inspect the count cache | `count_cache_stats` |
| Empty the count cache | `clear_count_cache` |

Barcodes are decoded locally from the photo. If that finds nothing and
`ANTHROPIC_API_KEY` is set, the vision model is asked to read the digits.
Counting always needs `ANTHROPIC_API_KEY` in the server environment.
Counts are cached by image content. Pass `force_refresh: true` to recount.

## History and Export

| Task | Tool |
|------|------|
| List recorded scans | `list_scans` |
| Full report for a scan | `get_scan` |
| Remove a scan | `delete_scan` |
| PDF report | `export_nutrition_report_pdf` |

## Important Notes

- Nutrition values come from Open Food Facts and may be incomplete
- A missing score component counts as zero points
- The verdict is a summary, not dietary advice
"#;

/// Runtime status of the NutriScan service
#[derive(Debug, Clone, Serialize)]
pub struct NutriScanStatus {
    /// Build information
    pub build_number: u64,
    pub build_timestamp: &'static str,
    pub version: &'static str,

    /// Database information
    pub database_path: String,
    pub database_size_bytes: Option<u64>,

    /// Collaborator configuration
    pub food_facts_url: String,
    pub vision_model: String,
    pub vision_available: bool,
    pub http_timeout_secs: u64,

    /// Process information
    pub uptime_seconds: u64,
    pub process_id: u32,
    pub memory_usage_bytes: u64,
}

/// Status tracker for collecting runtime information
pub struct StatusTracker {
    start_time: Instant,
    database_path: PathBuf,
    config: Config,
}

impl StatusTracker {
    /// Create a new status tracker
    pub fn new(config: Config) -> Self {
        Self {
            start_time: Instant::now(),
            database_path: config.database_path.clone(),
            config,
        }
    }

    /// Get the current status
    pub fn get_status(&self) -> NutriScanStatus {
        let build_info = BuildInfo::current();

        // Get database size if it exists
        let database_size_bytes = std::fs::metadata(&self.database_path)
            .ok()
            .map(|m| m.len());

        // Get process info
        let pid = std::process::id();
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]));

        let memory_usage_bytes = sys
            .process(Pid::from_u32(pid))
            .map(|p| p.memory())
            .unwrap_or(0);

        NutriScanStatus {
            build_number: build_info.build_number,
            build_timestamp: build_info.build_timestamp,
            version: build_info.version,
            database_path: self.database_path.display().to_string(),
            database_size_bytes,
            food_facts_url: self.config.food_facts_url.clone(),
            vision_model: self.config.vision_model.clone(),
            vision_available: self.config.has_vision_key(),
            http_timeout_secs: self.config.http_timeout_secs,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            process_id: pid,
            memory_usage_bytes,
        }
    }
}
