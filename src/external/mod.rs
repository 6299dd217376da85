//! External collaborators
//!
//! Capability traits for the services the report depends on, plus the
//! concrete implementations: HTTP clients and a local barcode decoder.
//! Every trait is synchronous; async callers run them on a blocking thread.

pub mod barcode;
pub mod food_facts;
pub mod image_prep;
pub mod vision;

use thiserror::Error;

use crate::models::{ObjectCount, ProductRecord};

pub use barcode::{BarcodeReader, RxingBarcodeDecoder};
pub use food_facts::{validate_barcode, OpenFoodFactsClient};
pub use image_prep::{image_sha256, prepare_image, PreparedImage};
pub use vision::{extract_json_from_response, ClaudeVisionClient};

/// Food data lookup failures
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Invalid barcode '{0}': expected 8 to 14 digits")]
    InvalidBarcode(String),

    #[error("Product not found for barcode {0}")]
    NotFound(String),

    #[error("Food data request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Food data response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Vision model and image failures
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("ANTHROPIC_API_KEY is not set")]
    MissingApiKey,

    #[error("Unsupported or corrupt image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Vision request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Vision API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The model answered, but not with the expected JSON object
    #[error("Vision response could not be parsed: {reason} - response: {response}")]
    Unparsable { reason: String, response: String },
}

/// Given a barcode, return the product record or a not-found signal
pub trait ProductLookup: Send + Sync {
    fn fetch_product(&self, barcode: &str) -> Result<ProductRecord, LookupError>;
}

/// Given image bytes, return the decoded barcode if one is visible
pub trait BarcodeRecognizer: Send + Sync {
    fn recognize_barcode(&self, image: &[u8]) -> Result<Option<String>, VisionError>;
}

/// Given image bytes, count the dominant object type in the picture
pub trait ObjectCounter: Send + Sync {
    fn count_objects(&self, image: &[u8]) -> Result<ObjectCount, VisionError>;

    /// Identifies the counter in cached results
    fn counter_name(&self) -> &str;
}
