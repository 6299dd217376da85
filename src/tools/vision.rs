//! Vision tools
//!
//! Barcode decoding and object counting from image files, with counts cached
//! by image content hash.

use std::path::Path;

use serde::Serialize;

use crate::db::Database;
use crate::external::{image_sha256, BarcodeRecognizer, ObjectCounter};
use crate::models::{CachedCount, CountCacheStats, ObjectCount};

/// Response for decode_barcode
#[derive(Debug, Serialize)]
pub struct DecodeBarcodeResponse {
    pub image_path: String,
    /// `None` when no legible barcode was found
    pub barcode: Option<String>,
}

/// Response for count_objects
#[derive(Debug, Serialize)]
pub struct CountObjectsResponse {
    pub image_path: String,
    pub image_sha256: String,
    pub object_count: ObjectCount,
    pub cached: bool,
    pub counted_by: String,
}

/// Response for clear_count_cache
#[derive(Debug, Serialize)]
pub struct ClearCountCacheResponse {
    pub success: bool,
    pub entries_removed: usize,
}

fn read_image(image_path: &str) -> Result<Vec<u8>, String> {
    let path = Path::new(image_path);
    if !path.is_file() {
        return Err(format!("Image not found: {}", image_path));
    }
    std::fs::read(path).map_err(|e| format!("Failed to read {}: {}", image_path, e))
}

/// Read a barcode from an image file
pub fn decode_barcode(recognizer: &dyn BarcodeRecognizer, image_path: &str) -> Result<DecodeBarcodeResponse, String> {
    let bytes = read_image(image_path)?;
    let barcode = recognizer.recognize_barcode(&bytes).map_err(|e| e.to_string())?;

    Ok(DecodeBarcodeResponse {
        image_path: image_path.to_string(),
        barcode,
    })
}

/// Count objects in an image file, reusing a cached count for identical bytes
pub fn count_objects(
    db: &Database,
    counter: &dyn ObjectCounter,
    image_path: &str,
    force_refresh: bool,
) -> Result<CountObjectsResponse, String> {
    let bytes = read_image(image_path)?;
    let hash = image_sha256(&bytes);

    if !force_refresh {
        let cached = db
            .with_conn(|conn| CachedCount::get(conn, &hash))
            .map_err(|e| format!("Database error: {}", e))?;
        if let Some(cached) = cached {
            tracing::info!("Count cache hit for {}", &hash[..12]);
            return Ok(CountObjectsResponse {
                image_path: image_path.to_string(),
                object_count: cached.as_object_count(),
                image_sha256: hash,
                cached: true,
                counted_by: cached.model,
            });
        }
    }

    let object_count = counter.count_objects(&bytes).map_err(|e| e.to_string())?;

    let stored = db
        .with_conn(|conn| CachedCount::upsert(conn, &hash, &object_count, counter.counter_name()))
        .map_err(|e| format!("Failed to cache count: {}", e))?;

    Ok(CountObjectsResponse {
        image_path: image_path.to_string(),
        image_sha256: hash,
        object_count,
        cached: false,
        counted_by: stored.model,
    })
}

pub fn count_cache_stats(db: &Database) -> Result<CountCacheStats, String> {
    db.with_conn(CachedCount::stats)
        .map_err(|e| format!("Database error: {}", e))
}

pub fn clear_count_cache(db: &Database) -> Result<ClearCountCacheResponse, String> {
    let entries_removed = db
        .with_conn(CachedCount::clear)
        .map_err(|e| format!("Database error: {}", e))?;

    Ok(ClearCountCacheResponse {
        success: true,
        entries_removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::VisionError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SequenceCounter {
        calls: AtomicUsize,
        fail: bool,
    }

    impl ObjectCounter for SequenceCounter {
        fn count_objects(&self, _image: &[u8]) -> Result<ObjectCount, VisionError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as u32;
            if self.fail {
                return Err(VisionError::Unparsable {
                    reason: "no JSON object in response".to_string(),
                    response: "three apples".to_string(),
                });
            }
            Ok(ObjectCount { object_type: "apple".to_string(), count: call })
        }

        fn counter_name(&self) -> &str {
            "sequence"
        }
    }

    fn temp_image(name: &str, contents: &[u8]) -> String {
        let path = std::env::temp_dir().join(format!("nutriscan-vision-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path.display().to_string()
    }

    #[test]
    fn test_count_is_cached_by_content() {
        let db = Database::in_memory().unwrap();
        let counter = SequenceCounter { calls: AtomicUsize::new(0), fail: false };
        let first_path = temp_image("a.jpg", b"photo-bytes-1");
        let copy_path = temp_image("copy.jpg", b"photo-bytes-1");

        let first = count_objects(&db, &counter, &first_path, false).unwrap();
        assert!(!first.cached);
        // a zero count is a real answer and is cached like any other
        assert_eq!(first.object_count.count, 0);

        let again = count_objects(&db, &counter, &copy_path, false).unwrap();
        assert!(again.cached);
        assert_eq!(again.image_sha256, first.image_sha256);
        assert_eq!(again.counted_by, "sequence");
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);

        let refreshed = count_objects(&db, &counter, &first_path, true).unwrap();
        assert!(!refreshed.cached);
        assert_eq!(refreshed.object_count.count, 1);
    }

    #[test]
    fn test_unparsable_reply_is_an_error_not_zero() {
        let db = Database::in_memory().unwrap();
        let counter = SequenceCounter { calls: AtomicUsize::new(0), fail: true };
        let path = temp_image("b.jpg", b"photo-bytes-2");

        let err = count_objects(&db, &counter, &path, false).unwrap_err();
        assert!(err.contains("could not be parsed"));
        assert_eq!(count_cache_stats(&db).unwrap().entry_count, 0);
    }

    #[test]
    fn test_missing_image() {
        let db = Database::in_memory().unwrap();
        let counter = SequenceCounter { calls: AtomicUsize::new(0), fail: false };
        let err = count_objects(&db, &counter, "/definitely/not/here.jpg", false).unwrap_err();
        assert!(err.starts_with("Image not found"));
    }

    #[test]
    fn test_clear_cache() {
        let db = Database::in_memory().unwrap();
        let counter = SequenceCounter { calls: AtomicUsize::new(0), fail: false };
        count_objects(&db, &counter, &temp_image("c.jpg", b"photo-bytes-3"), false).unwrap();

        let cleared = clear_count_cache(&db).unwrap();
        assert_eq!(cleared.entries_removed, 1);
        assert_eq!(count_cache_stats(&db).unwrap().entry_count, 0);
    }
}
