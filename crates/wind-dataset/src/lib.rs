//! Memory-mapped wind forecast datasets.
//!
//! Wind datasets downloaded from forecast providers are stored as large
//! binary files which are memory-mapped into the predictor process and
//! treated like one huge array. This crate provides:
//!
//! - **Grid schemas**: shape and axis coordinates of the 5-D payload
//! - **Naming**: `<YYYYMMDDHH><suffix>` filenames and directory scanning
//! - **Header framing**: a JSON header terminated by a NUL byte
//! - **Datasets**: open (read-only) or create (read-write) mapped files
//! - **Latest cache**: reuse of the newest dataset with TTL invalidation
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use wind_dataset::LatestDatasetCache;
//!
//! # async fn run() -> wind_dataset::Result<()> {
//! let cache = LatestDatasetCache::global();
//! let dataset = cache.get_latest(Path::new("/srv/tawhiri-datasets"), true).await?;
//!
//! let u = dataset.value([0, 10, 1, 14, 40])?;
//! println!("u = {u}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod header;
pub mod latest;
pub mod naming;
pub mod schema;

// Re-export commonly used types at crate root
pub use config::DatasetConfig;
pub use dataset::{Dataset, DatasetOptions, OpenMode};
pub use error::{DatasetError, Result};
pub use header::{read_header, write_header};
pub use latest::{open_latest, LatestCacheStats, LatestDatasetCache};
pub use naming::{
    dataset_path, decode_filename, encode_filename, latest_entry, scan, DatasetListing,
    DirectoryEntry, DEFAULT_DIRECTORY, SUFFIX_GRIBMIRROR, SUFFIX_READY,
};
pub use schema::{Axes, GridSchema, ModelGrid, Variable, ELEMENT_SIZE, RANK};
