//! Common test fixtures for wind dataset tests.
//!
//! This module provides pre-defined test data that represents common
//! scenarios in dataset storage and discovery.

/// Common forecast times for testing.
pub mod time {
    use chrono::{DateTime, TimeZone, Utc};

    /// A fixed reference time for tests (2024-01-15T12:00:00Z)
    pub const REFERENCE_TIME: &str = "2024-01-15T12:00:00Z";

    /// Model run hours of a 4x daily model
    pub const RUN_HOURS: [u32; 4] = [0, 6, 12, 18];

    /// The reference time as a `DateTime`.
    pub fn reference_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    /// Forecast time of the model run `hour` on 2024-01-15.
    pub fn run(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, hour, 0, 0).unwrap()
    }
}

/// Small grid shapes that keep test files tiny.
pub mod shape {
    /// (hour, pressure, variable, latitude, longitude)
    pub const SMALL: [usize; 5] = [2, 3, 4, 5, 6];

    /// Single-sample grid (except for the four variables)
    pub const MINIMAL: [usize; 5] = [1, 1, 4, 1, 1];

    /// Number of `f32` samples in a grid of `shape`.
    pub fn element_count(shape: [usize; 5]) -> usize {
        shape.iter().product()
    }
}

/// Common dataset headers.
pub mod headers {
    use serde_json::{json, Value};

    /// Header as written by the ingester for a MEPS run.
    pub fn meps_header() -> Value {
        json!({
            "model": "meps",
            "run": "2024011512",
            "source": "https://thredds.met.no/thredds/dodsC/meps25epsarchive",
            "levels": "model",
            "variables": ["height", "wind_u", "wind_v", "wind_w"]
        })
    }

    /// A header large enough to span several 4 KiB read chunks.
    pub fn large_header() -> Value {
        let history: Vec<String> = (0..1000).map(|i| format!("step {:04} complete", i)).collect();
        json!({ "model": "meps", "history": history })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_count() {
        assert_eq!(shape::element_count(shape::SMALL), 720);
        assert_eq!(shape::element_count(shape::MINIMAL), 4);
    }

    #[test]
    fn test_run_times() {
        assert_eq!(time::run(12), time::reference_time());
        assert!(time::RUN_HOURS.windows(2).all(|w| time::run(w[0]) < time::run(w[1])));
    }

    #[test]
    fn test_large_header_spans_chunks() {
        let text = serde_json::to_string(&headers::large_header()).unwrap();
        assert!(text.len() > 3 * 4096);
    }
}
