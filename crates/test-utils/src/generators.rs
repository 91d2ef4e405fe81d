//! Test data generators for synthetic dataset files.
//!
//! These generators write files in the on-disk dataset layout
//! (`[JSON header][0x00][f32 payload]`) without going through the
//! dataset crate, so tests can exercise the reader against
//! independently produced bytes.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Creates a payload whose sample at flat index `i` is `i as f32`.
///
/// This makes it easy to verify that a read at a given grid index
/// lands on the expected row-major position.
///
/// # Example
///
/// ```
/// use test_utils::ramp_payload;
///
/// let payload = ramp_payload(6);
/// assert_eq!(payload, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
/// ```
pub fn ramp_payload(element_count: usize) -> Vec<f32> {
    (0..element_count).map(|i| i as f32).collect()
}

/// Creates a payload of wind-like values in m/s, in the range -50..50.
pub fn wind_payload(element_count: usize) -> Vec<f32> {
    (0..element_count)
        .map(|i| ((i as f32) * 0.37).sin() * 50.0)
        .collect()
}

/// Encodes samples as little-endian bytes.
pub fn payload_bytes(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Frames `header_text` and `payload` into dataset file bytes.
pub fn dataset_bytes(header_text: &str, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(header_text.len() + 1 + payload.len());
    bytes.extend_from_slice(header_text.as_bytes());
    bytes.push(0);
    bytes.extend_from_slice(payload);
    bytes
}

/// Writes raw dataset bytes to `dir/name`, returning the path.
pub fn write_raw_dataset(dir: &Path, name: &str, header_text: &str, payload: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, dataset_bytes(header_text, payload)).expect("Failed to write test dataset");
    path
}

/// Writes a complete dataset for `forecast_time` with a ramp payload of
/// `element_count` samples.
pub fn write_dataset_file(
    dir: &Path,
    forecast_time: DateTime<Utc>,
    suffix: &str,
    header: &Value,
    element_count: usize,
) -> PathBuf {
    let name = format!("{}{}", forecast_time.format("%Y%m%d%H"), suffix);
    let header_text = serde_json::to_string(header).expect("Failed to serialize test header");
    write_raw_dataset(
        dir,
        &name,
        &header_text,
        &payload_bytes(&ramp_payload(element_count)),
    )
}
