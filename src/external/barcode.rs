//! Barcode decoding from photos
//!
//! Product barcodes are decoded locally with rxing. A second recognizer (the
//! vision model) is consulted only when the local decoder finds nothing.

use image::{imageops, GrayImage};

use super::food_facts::validate_barcode;
use super::{BarcodeRecognizer, VisionError};

/// Local EAN/UPC decoder
#[derive(Debug, Default, Clone, Copy)]
pub struct RxingBarcodeDecoder;

impl RxingBarcodeDecoder {
    fn decode_luma(luma: &GrayImage) -> Option<String> {
        let (width, height) = luma.dimensions();

        match rxing::helpers::detect_in_luma(luma.as_raw().clone(), width, height, None) {
            Ok(result) => match validate_barcode(result.getText()) {
                Ok(barcode) => Some(barcode),
                Err(e) => {
                    tracing::debug!("Ignoring decoded symbol: {}", e);
                    None
                }
            },
            Err(e) => {
                tracing::debug!("No barcode decoded ({}x{}): {:?}", width, height, e);
                None
            }
        }
    }
}

impl BarcodeRecognizer for RxingBarcodeDecoder {
    fn recognize_barcode(&self, image: &[u8]) -> Result<Option<String>, VisionError> {
        let luma = image::load_from_memory(image)?.to_luma8();

        // Upright first, then a quarter turn for portrait photos
        if let Some(barcode) = Self::decode_luma(&luma) {
            return Ok(Some(barcode));
        }
        Ok(Self::decode_luma(&imageops::rotate90(&luma)))
    }
}

/// Local decoder with an optional fallback recognizer
pub struct BarcodeReader<'a> {
    decoder: RxingBarcodeDecoder,
    fallback: Option<&'a dyn BarcodeRecognizer>,
}

impl<'a> BarcodeReader<'a> {
    pub fn new(fallback: Option<&'a dyn BarcodeRecognizer>) -> Self {
        Self {
            decoder: RxingBarcodeDecoder,
            fallback,
        }
    }
}

impl BarcodeRecognizer for BarcodeReader<'_> {
    fn recognize_barcode(&self, image: &[u8]) -> Result<Option<String>, VisionError> {
        if let Some(barcode) = self.decoder.recognize_barcode(image)? {
            tracing::info!("Decoded barcode {} locally", barcode);
            return Ok(Some(barcode));
        }

        match self.fallback {
            Some(fallback) => {
                tracing::info!("No barcode decoded locally; asking the vision model");
                fallback.recognize_barcode(image)
            }
            None => Ok(None),
        }
    }
}
