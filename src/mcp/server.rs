//! NutriScan MCP Server Implementation
//!
//! Implements the MCP server with all NutriScan tools.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::db::Database;
use crate::external::{
    BarcodeReader, BarcodeRecognizer, ClaudeVisionClient, LookupError, ObjectCounter, OpenFoodFactsClient,
    ProductLookup,
};
use crate::models::{NutritionReport, ObjectCount};
use crate::nutrition::normalize;
use crate::tools::nutrition::{self, ProductNotFoundResponse, ReportOutcome, ReportRequest};
use crate::tools::reports;
use crate::tools::scans;
use crate::tools::status::StatusTracker;
use crate::tools::vision;

/// Object type used when a count is supplied without one
const DEFAULT_OBJECT_TYPE: &str = "item";

/// NutriScan MCP Service
#[derive(Clone)]
pub struct NutriScanService {
    status_tracker: Arc<Mutex<StatusTracker>>,
    database: Database,
    config: Arc<Config>,
    tool_router: ToolRouter<NutriScanService>,
}

impl NutriScanService {
    pub fn new(config: Config, database: Database) -> Self {
        Self {
            status_tracker: Arc::new(Mutex::new(StatusTracker::new(config.clone()))),
            database,
            config: Arc::new(config),
            tool_router: Self::tool_router(),
        }
    }
}

/// Run blocking work (HTTP, SQLite, rendering) off the async runtime
async fn run_blocking<T, F>(f: F) -> Result<T, McpError>
where
    F: FnOnce() -> Result<T, String> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| McpError::internal_error(format!("Task failed: {}", e), None))?
        .map_err(|e| McpError::internal_error(e, None))
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("Serialization error: {}", e), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

// ============================================================================
// Parameter Structs
// ============================================================================

fn default_true() -> bool { true }
fn default_list_limit() -> i64 { 20 }

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetNutritionReportParams {
    /// Barcode digits (8 to 14). Takes precedence over barcode_image_path.
    pub barcode: Option<String>,
    /// Path to a photo of the barcode, used when no barcode is typed
    pub barcode_image_path: Option<String>,
    /// Known number of items (skips the vision model)
    pub count: Option<u32>,
    /// What was counted (e.g., "cookie"); defaults to "item"
    pub object_type: Option<String>,
    /// Path to a photo of the food to count items in
    pub count_image_path: Option<String>,
    /// Record the report in scan history (default true)
    #[serde(default = "default_true")]
    pub record_scan: bool,
}

impl GetNutritionReportParams {
    fn into_request(self) -> ReportRequest {
        let object_count = self.count.map(|count| ObjectCount {
            object_type: self
                .object_type
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_OBJECT_TYPE.to_string()),
            count,
        });

        ReportRequest {
            barcode: self.barcode,
            barcode_image_path: self.barcode_image_path,
            object_count,
            count_image_path: self.count_image_path,
            record_scan: self.record_scan,
        }
    }
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DecodeBarcodeParams {
    /// Path to the image file
    pub image_path: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CountObjectsParams {
    /// Path to the image file
    pub image_path: String,
    /// Ignore a cached count and ask the vision model again
    #[serde(default)]
    pub force_refresh: bool,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListScansParams {
    /// Only scans of this barcode
    pub barcode: Option<String>,
    #[serde(default = "default_list_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetScanParams {
    /// Scan ID
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteScanParams {
    /// Scan ID
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ExportNutritionReportPdfParams {
    /// Export a recorded scan
    pub scan_id: Option<i64>,
    /// Export a fresh lookup of this barcode (used when scan_id is absent)
    pub barcode: Option<String>,
    /// Output file path (e.g., "C:\\Reports\\nutella.pdf")
    pub output_path: String,
    /// Include the Nutri-Score points chart (default true)
    #[serde(default = "default_true")]
    pub include_chart: bool,
}

/// Report to export, or the payload explaining why there is none
enum ExportSource {
    Report { barcode: String, report: NutritionReport },
    Missing(String),
}

fn resolve_export_source(database: &Database, config: &Config, scan_id: Option<i64>, barcode: Option<String>) -> Result<ExportSource, String> {
    if let Some(id) = scan_id {
        return Ok(match scans::get_scan(database, id)? {
            Some(scan) => ExportSource::Report { barcode: scan.barcode, report: scan.report },
            None => ExportSource::Missing(format!(r#"{{"error": "Scan not found", "id": {}}}"#, id)),
        });
    }

    let barcode = barcode
        .filter(|b| !b.trim().is_empty())
        .ok_or("Either scan_id or barcode is required")?;
    let lookup = OpenFoodFactsClient::from_config(config).map_err(|e| e.to_string())?;

    match lookup.fetch_product(&barcode) {
        Ok(product) => Ok(ExportSource::Report { barcode: barcode.trim().to_string(), report: normalize(&product, None) }),
        Err(LookupError::NotFound(barcode)) => {
            let payload = ProductNotFoundResponse { error: "Product not found".to_string(), barcode };
            serde_json::to_string_pretty(&payload)
                .map(ExportSource::Missing)
                .map_err(|e| e.to_string())
        }
        Err(e) => Err(e.to_string()),
    }
}

// ============================================================================
// Tool Implementations
// ============================================================================

#[tool_router]
impl NutriScanService {
    // --- Status ---

    #[tool(description = "Get the current status of the NutriScan service including build info, database status, collaborator configuration, and process information")]
    async fn nutriscan_status(&self) -> Result<CallToolResult, McpError> {
        let tracker = self.status_tracker.lock().await;
        let status = tracker.get_status();
        json_result(&status)
    }

    #[tool(description = "Get step-by-step instructions for producing nutrition reports. Call this when starting a scanning session or when unsure how to use the NutriScan tools.")]
    fn scan_instructions(&self) -> Result<CallToolResult, McpError> {
        use crate::tools::status::SCAN_INSTRUCTIONS;
        Ok(CallToolResult::success(vec![Content::text(SCAN_INSTRUCTIONS)]))
    }

    // --- Reports ---

    #[tool(description = "Build a nutrition report for a product: per-100g nutrients, Nutri-Score components, and a healthy/unhealthy summary. Give a barcode or a barcode photo; optionally a count or a photo to count items in.")]
    async fn get_nutrition_report(&self, Parameters(p): Parameters<GetNutritionReportParams>) -> Result<CallToolResult, McpError> {
        let request = p.into_request();
        let database = self.database.clone();
        let config = self.config.clone();

        let outcome = run_blocking(move || {
            let lookup = OpenFoodFactsClient::from_config(&config).map_err(|e| e.to_string())?;
            // The vision model reads barcodes only as a fallback, so it is optional there
            let wants_vision = request.needs_object_counter()
                || (request.needs_barcode_recognizer() && config.has_vision_key());
            let vision = if wants_vision {
                Some(ClaudeVisionClient::from_config(&config).map_err(|e| e.to_string())?)
            } else {
                None
            };
            let reader = BarcodeReader::new(vision.as_ref().map(|v| v as &dyn BarcodeRecognizer));
            let counter = vision.as_ref().map(|v| v as &dyn ObjectCounter);
            nutrition::get_nutrition_report(&database, &lookup, Some(&reader), counter, &request)
        })
        .await?;

        match outcome {
            ReportOutcome::Found(response) => json_result(&response),
            ReportOutcome::NotFound(response) => json_result(&response),
        }
    }

    #[tool(description = "Export a nutrition report to PDF, from a recorded scan (scan_id) or a fresh barcode lookup")]
    async fn export_nutrition_report_pdf(&self, Parameters(p): Parameters<ExportNutritionReportPdfParams>) -> Result<CallToolResult, McpError> {
        let database = self.database.clone();
        let config = self.config.clone();

        let result = run_blocking(move || {
            match resolve_export_source(&database, &config, p.scan_id, p.barcode)? {
                ExportSource::Report { barcode, report } => {
                    let response = reports::generate_nutrition_pdf(&report, &barcode, &p.output_path, p.include_chart)?;
                    serde_json::to_string_pretty(&response).map_err(|e| e.to_string())
                }
                ExportSource::Missing(payload) => Ok(payload),
            }
        })
        .await?;

        Ok(CallToolResult::success(vec![Content::text(result)]))
    }

    // --- Vision ---

    #[tool(description = "Read a product barcode (EAN/UPC) from a photo. Decoded locally; the vision model is tried only if that fails and ANTHROPIC_API_KEY is set. Returns barcode: null when none is legible.")]
    async fn decode_barcode(&self, Parameters(p): Parameters<DecodeBarcodeParams>) -> Result<CallToolResult, McpError> {
        let config = self.config.clone();
        let response = run_blocking(move || {
            let fallback = if config.has_vision_key() {
                Some(ClaudeVisionClient::from_config(&config).map_err(|e| e.to_string())?)
            } else {
                None
            };
            let reader = BarcodeReader::new(fallback.as_ref().map(|v| v as &dyn BarcodeRecognizer));
            vision::decode_barcode(&reader, &p.image_path)
        })
        .await?;
        json_result(&response)
    }

    #[tool(description = "Count the items in a photo. Identical images are served from the count cache unless force_refresh=true.")]
    async fn count_objects(&self, Parameters(p): Parameters<CountObjectsParams>) -> Result<CallToolResult, McpError> {
        let database = self.database.clone();
        let config = self.config.clone();
        let response = run_blocking(move || {
            let client = ClaudeVisionClient::from_config(&config).map_err(|e| e.to_string())?;
            vision::count_objects(&database, &client, &p.image_path, p.force_refresh)
        })
        .await?;
        json_result(&response)
    }

    #[tool(description = "Get object count cache statistics (entry count, oldest and newest entries)")]
    fn count_cache_stats(&self) -> Result<CallToolResult, McpError> {
        let result = vision::count_cache_stats(&self.database).map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Delete every cached object count")]
    fn clear_count_cache(&self) -> Result<CallToolResult, McpError> {
        let result = vision::clear_count_cache(&self.database).map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    // --- Scan History ---

    #[tool(description = "List recorded scans, newest first, with optional barcode filter and pagination")]
    fn list_scans(&self, Parameters(p): Parameters<ListScansParams>) -> Result<CallToolResult, McpError> {
        let result = scans::list_scans(&self.database, p.barcode.as_deref(), p.limit, p.offset)
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Get a recorded scan with its full nutrition report")]
    fn get_scan(&self, Parameters(p): Parameters<GetScanParams>) -> Result<CallToolResult, McpError> {
        let result = scans::get_scan(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(scan) => serde_json::to_string_pretty(&scan),
            None => Ok(format!(r#"{{"error": "Scan not found", "id": {}}}"#, p.id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Delete a recorded scan")]
    fn delete_scan(&self, Parameters(p): Parameters<DeleteScanParams>) -> Result<CallToolResult, McpError> {
        let result = scans::delete_scan(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }
}

// ============================================================================
// Server Handler
// ============================================================================

#[tool_handler]
impl ServerHandler for NutriScanService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "nutriscan".into(),
                version: crate::build_info::VERSION.into(),
                title: Some("NutriScan".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "NutriScan - Nutrition reports from product barcodes. \
                 IMPORTANT: Call scan_instructions before the first report. \
                 Reports: get_nutrition_report (barcode or barcode photo, optional item count), export_nutrition_report_pdf. \
                 Vision: decode_barcode, count_objects, count_cache_stats, clear_count_cache. \
                 History: list_scans, get_scan, delete_scan. \
                 A missing product returns {\"error\": \"Product not found\"} rather than failing."
                    .into(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_without_type_defaults_to_item() {
        let params: GetNutritionReportParams =
            serde_json::from_value(serde_json::json!({"barcode": "12345678", "count": 3})).unwrap();
        assert!(params.record_scan);

        let request = params.into_request();
        assert_eq!(request.object_count, Some(ObjectCount { object_type: "item".to_string(), count: 3 }));
        assert!(!request.needs_object_counter());
    }

    #[test]
    fn test_export_requires_a_source() {
        let database = Database::in_memory().unwrap();
        let config = Config::from_lookup(|_| None);

        let err = resolve_export_source(&database, &config, None, Some("  ".to_string())).err().unwrap();
        assert!(err.contains("scan_id or barcode"));

        match resolve_export_source(&database, &config, Some(42), None).unwrap() {
            ExportSource::Missing(payload) => assert!(payload.contains("Scan not found")),
            ExportSource::Report { .. } => panic!("scan 42 does not exist"),
        }
    }
}
