//! Dataset file naming and directory discovery.
//!
//! Datasets live at `<directory>/<YYYYMMDDHH><suffix>`, where the 10
//! character prefix is the forecast time at hour resolution. Files whose
//! names do not start with such a timestamp are ignored.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};
use tracing::debug;

use crate::error::{DatasetError, Result};

/// Suffix of fully assembled, ready-to-use datasets.
pub const SUFFIX_READY: &str = ".tawhiri";

/// Suffix of raw GRIB mirror files produced by the downloader.
pub const SUFFIX_GRIBMIRROR: &str = ".gribmirror";

/// Default location of wind data.
pub const DEFAULT_DIRECTORY: &str = "/srv/tawhiri-datasets";

/// Length of the timestamp prefix of a dataset filename.
pub const TIMESTAMP_LEN: usize = 10;

/// A dataset file found by scanning a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub forecast_time: DateTime<Utc>,
    pub suffix: String,
    pub filename: String,
    pub path: PathBuf,
}

/// Render the filename for `forecast_time` with `suffix`.
///
/// Minutes and seconds are dropped; forecast times are hourly.
pub fn encode_filename(forecast_time: &DateTime<Utc>, suffix: &str) -> String {
    format!(
        "{:04}{:02}{:02}{:02}{}",
        forecast_time.year(),
        forecast_time.month(),
        forecast_time.day(),
        forecast_time.hour(),
        suffix
    )
}

/// Full path of the dataset for `forecast_time` in `directory`.
pub fn dataset_path(forecast_time: &DateTime<Utc>, directory: &Path, suffix: &str) -> PathBuf {
    directory.join(encode_filename(forecast_time, suffix))
}

/// Split a filename into its forecast time and suffix.
///
/// Returns `None` for names that are not dataset files.
pub fn decode_filename(name: &str) -> Option<(DateTime<Utc>, String)> {
    let prefix = name.get(..TIMESTAMP_LEN)?;
    let forecast_time = parse_timestamp(prefix)?;
    Some((forecast_time, name[TIMESTAMP_LEN..].to_string()))
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let year: i32 = s[0..4].parse().ok()?;
    let month: u32 = s[4..6].parse().ok()?;
    let day: u32 = s[6..8].parse().ok()?;
    let hour: u32 = s[8..10].parse().ok()?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, 0, 0)?;
    Some(Utc.from_utc_datetime(&naive))
}

/// A lazy, restartable listing of the dataset files in a directory.
///
/// Every call to [`DatasetListing::iter`] reads the directory afresh, so
/// files appearing between iterations are picked up.
#[derive(Debug, Clone)]
pub struct DatasetListing {
    directory: PathBuf,
    suffixes: Option<Vec<String>>,
}

impl DatasetListing {
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Start a new pass over the directory.
    pub fn iter(&self) -> Result<ListingIter<'_>> {
        let read_dir =
            fs::read_dir(&self.directory).map_err(|e| DatasetError::from_io(e, &self.directory))?;
        Ok(ListingIter {
            listing: self,
            read_dir,
        })
    }

    fn accepts(&self, suffix: &str) -> bool {
        match &self.suffixes {
            Some(filter) => filter.iter().any(|s| s == suffix),
            None => true,
        }
    }
}

/// Iterator over one pass of a [`DatasetListing`]. Order is unspecified.
pub struct ListingIter<'a> {
    listing: &'a DatasetListing,
    read_dir: fs::ReadDir,
}

impl Iterator for ListingIter<'_> {
    type Item = DirectoryEntry;

    fn next(&mut self) -> Option<Self::Item> {
        for dir_entry in self.read_dir.by_ref() {
            let dir_entry = match dir_entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(directory = %self.listing.directory.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            let filename = match os_to_string(dir_entry.file_name()) {
                Some(name) => name,
                None => continue,
            };

            let Some((forecast_time, suffix)) = decode_filename(&filename) else {
                continue;
            };

            if !self.listing.accepts(&suffix) {
                continue;
            }

            return Some(DirectoryEntry {
                forecast_time,
                suffix,
                path: self.listing.directory.join(&filename),
                filename,
            });
        }
        None
    }
}

fn os_to_string(name: OsString) -> Option<String> {
    name.into_string().ok()
}

/// Scan `directory` for dataset files, optionally keeping only those whose
/// suffix is in `suffixes`.
pub fn scan(directory: impl Into<PathBuf>, suffixes: Option<&[&str]>) -> DatasetListing {
    DatasetListing {
        directory: directory.into(),
        suffixes: suffixes.map(|s| s.iter().map(|x| x.to_string()).collect()),
    }
}

/// The entry with the greatest forecast time carrying `suffix`.
pub fn latest_entry(directory: &Path, suffix: &str) -> Result<DirectoryEntry> {
    let listing = scan(directory, Some(&[suffix][..]));
    listing
        .iter()?
        .max_by(|a, b| a.forecast_time.cmp(&b.forecast_time))
        .ok_or_else(|| DatasetError::no_dataset_found(directory.display().to_string()))
}
