//! Open Food Facts lookup
//!
//! `GET /api/v2/product/{barcode}` restricted to the fields the report needs.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::build_info;
use crate::config::Config;
use crate::models::ProductRecord;

use super::{LookupError, ProductLookup};

/// Fields requested from the API
pub const PRODUCT_FIELDS: &str = "product_name,nutriscore_data,nutriments,nutrition_grades";

/// Envelope of a product lookup response
#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    status: Option<i64>,
    #[serde(default)]
    product: Option<ProductRecord>,
}

/// Trim and check a barcode: 8 to 14 ASCII digits (EAN-8 up to GTIN-14)
pub fn validate_barcode(raw: &str) -> Result<String, LookupError> {
    let barcode = raw.trim();
    let valid = (8..=14).contains(&barcode.len()) && barcode.bytes().all(|b| b.is_ascii_digit());
    if valid {
        Ok(barcode.to_string())
    } else {
        Err(LookupError::InvalidBarcode(barcode.to_string()))
    }
}

/// Decode a lookup response body; anything but `status == 1` with a product is not found
pub fn parse_lookup_response(barcode: &str, body: &str) -> Result<ProductRecord, LookupError> {
    let response: LookupResponse = serde_json::from_str(body)?;
    match (response.status, response.product) {
        (Some(1), Some(product)) => Ok(product),
        _ => Err(LookupError::NotFound(barcode.to_string())),
    }
}

/// Blocking Open Food Facts client
pub struct OpenFoodFactsClient {
    client: Client,
    base_url: String,
}

impl OpenFoodFactsClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LookupError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("{}/{} (nutrition report)", build_info::NAME, build_info::VERSION))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, LookupError> {
        Self::new(&config.food_facts_url, config.http_timeout())
    }

    pub fn product_url(&self, barcode: &str) -> String {
        format!("{}/api/v2/product/{}?fields={}", self.base_url, barcode, PRODUCT_FIELDS)
    }
}

impl ProductLookup for OpenFoodFactsClient {
    fn fetch_product(&self, barcode: &str) -> Result<ProductRecord, LookupError> {
        let barcode = validate_barcode(barcode)?;
        let url = self.product_url(&barcode);
        tracing::debug!("Fetching product: {}", url);

        let response = self.client.get(&url).send()?;
        let status = response.status();
        // The API answers 404 with a normal JSON envelope for unknown products
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound(barcode));
        }
        let body = response.error_for_status()?.text()?;

        let product = parse_lookup_response(&barcode, &body)?;
        tracing::info!("Found product {} for barcode {}", product.display_name(), barcode);
        Ok(product)
    }
}
