//! Memory-mapped wind datasets.
//!
//! A [`Dataset`] maps the payload of one dataset file into memory so the
//! whole grid can be addressed like an in-memory array without reading it.
//! The file descriptor is closed as soon as the mapping exists; the mapping
//! itself lives until [`Dataset::close`] or drop.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use memmap2::{Mmap, MmapMut, MmapOptions};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::DatasetConfig;
use crate::error::{DatasetError, Result};
use crate::header;
use crate::naming::dataset_path;
use crate::schema::{GridSchema, ELEMENT_SIZE, RANK};

/// How a dataset file was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing file, mapped read-only.
    Read,
    /// New file (truncating any existing one), mapped read-write.
    Create,
}

impl OpenMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "truncate and write",
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parameters shared by every dataset opened from one deployment.
#[derive(Debug, Clone)]
pub struct DatasetOptions {
    pub schema: Arc<GridSchema>,
    /// Filename suffix of ready datasets
    pub suffix: String,
    pub header_chunk_size: usize,
    pub enforce_payload_size: bool,
}

impl DatasetOptions {
    /// Default options with a custom grid schema.
    pub fn with_schema(schema: GridSchema) -> Self {
        Self {
            schema: Arc::new(schema),
            ..Self::default()
        }
    }
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self::from(&DatasetConfig::default())
    }
}

impl From<&DatasetConfig> for DatasetOptions {
    fn from(config: &DatasetConfig) -> Self {
        Self {
            schema: Arc::new(config.schema().clone()),
            suffix: config.ready_suffix.clone(),
            header_chunk_size: config.header_chunk_size,
            enforce_payload_size: config.enforce_payload_size,
        }
    }
}

#[derive(Debug)]
enum MappedView {
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
}

impl MappedView {
    fn as_slice(&self) -> &[u8] {
        match self {
            Self::ReadOnly(map) => &map[..],
            Self::ReadWrite(map) => &map[..],
        }
    }
}

/// A wind dataset, memory-mapped from disk.
#[derive(Debug)]
pub struct Dataset {
    forecast_time: DateTime<Utc>,
    directory: PathBuf,
    path: PathBuf,
    header: Value,
    payload_offset: u64,
    payload_len: usize,
    schema: Arc<GridSchema>,
    mode: OpenMode,
    view: Option<MappedView>,
}

impl Dataset {
    /// Open the existing dataset for `forecast_time` in `directory`.
    ///
    /// Fails with `NotFound` when there is no such file and with `Format`
    /// when its header cannot be parsed or its payload has the wrong size.
    pub fn open(
        forecast_time: DateTime<Utc>,
        directory: impl Into<PathBuf>,
        options: &DatasetOptions,
    ) -> Result<Self> {
        let directory = directory.into();
        let path = dataset_path(&forecast_time, &directory, &options.suffix);
        info!(
            forecast_time = %forecast_time,
            path = %path.display(),
            mode = OpenMode::Read.as_str(),
            "Opening dataset"
        );

        let mut file = File::open(&path).map_err(|e| DatasetError::from_io(e, &path))?;
        let (header, payload_offset) = header::read_header(&mut file, options.header_chunk_size)?;

        let file_size = file
            .metadata()
            .map_err(|e| DatasetError::from_io(e, &path))?
            .len();
        let payload_len = checked_payload_len(&path, file_size, payload_offset, options)?;

        // SAFETY: the mapping is shared and read-only. Datasets are written
        // once by the ingester and published by rename, never modified in place.
        let map = unsafe {
            MmapOptions::new()
                .offset(payload_offset)
                .len(payload_len)
                .map(&file)
        }
        .map_err(|e| DatasetError::io(format!("failed to map {}: {}", path.display(), e)))?;
        drop(file);

        debug!(
            path = %path.display(),
            header = %header,
            payload_offset = payload_offset,
            payload_len = payload_len,
            "Opened dataset"
        );

        Ok(Self {
            forecast_time,
            directory,
            path,
            header,
            payload_offset,
            payload_len,
            schema: Arc::clone(&options.schema),
            mode: OpenMode::Read,
            view: Some(MappedView::ReadOnly(map)),
        })
    }

    /// Create a blank dataset for `forecast_time` in `directory`,
    /// overwriting any file already there.
    ///
    /// `header` is written at the start of the file and the payload region
    /// is sized to exactly the schema payload size, initially zeroed.
    pub fn create(
        forecast_time: DateTime<Utc>,
        directory: impl Into<PathBuf>,
        header: Value,
        options: &DatasetOptions,
    ) -> Result<Self> {
        let directory = directory.into();
        let path = dataset_path(&forecast_time, &directory, &options.suffix);
        info!(
            forecast_time = %forecast_time,
            path = %path.display(),
            mode = OpenMode::Create.as_str(),
            "Opening dataset"
        );

        let io_err = |e: std::io::Error| DatasetError::io(format!("{}: {}", path.display(), e));

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(io_err)?;

        let payload_offset = header::write_header(&mut file, &header)?;
        let payload_len = options.schema.payload_size();
        file.set_len(payload_offset + payload_len as u64)
            .map_err(io_err)?;

        // SAFETY: the file was just truncated by us; concurrent readers of a
        // file under construction are unsupported and may see partial data.
        let map = unsafe {
            MmapOptions::new()
                .offset(payload_offset)
                .len(payload_len)
                .map_mut(&file)
        }
        .map_err(|e| DatasetError::io(format!("failed to map {}: {}", path.display(), e)))?;
        drop(file);

        Ok(Self {
            forecast_time,
            directory,
            path,
            header,
            payload_offset,
            payload_len,
            schema: Arc::clone(&options.schema),
            mode: OpenMode::Create,
            view: Some(MappedView::ReadWrite(map)),
        })
    }

    /// Release the mapping. Calling this more than once is a no-op.
    pub fn close(&mut self) {
        if let Some(view) = self.view.take() {
            info!(
                forecast_time = %self.forecast_time,
                path = %self.path.display(),
                "Closing dataset"
            );
            drop(view);
        }
    }

    pub fn is_open(&self) -> bool {
        self.view.is_some()
    }

    pub fn forecast_time(&self) -> DateTime<Utc> {
        self.forecast_time
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parsed header metadata, passed through as-is.
    pub fn header(&self) -> &Value {
        &self.header
    }

    /// Byte offset of the payload within the file.
    pub fn payload_offset(&self) -> u64 {
        self.payload_offset
    }

    /// Length in bytes of the mapped payload.
    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn schema(&self) -> &GridSchema {
        &self.schema
    }

    /// The mapped payload bytes.
    pub fn payload(&self) -> Result<&[u8]> {
        match &self.view {
            Some(view) => Ok(view.as_slice()),
            None => Err(self.closed()),
        }
    }

    /// The mapped payload bytes, writable for created datasets only.
    pub fn payload_mut(&mut self) -> Result<&mut [u8]> {
        let closed = self.closed();
        match &mut self.view {
            Some(MappedView::ReadWrite(map)) => Ok(&mut map[..]),
            Some(MappedView::ReadOnly(_)) => {
                Err(DatasetError::ReadOnly(self.path.display().to_string()))
            }
            None => Err(closed),
        }
    }

    /// Sample at `[hour, pressure, variable, latitude, longitude]`.
    pub fn value(&self, index: [usize; RANK]) -> Result<f32> {
        let offset = self.element_offset(index)?;
        let payload = self.payload()?;
        let bytes = payload
            .get(offset..offset + ELEMENT_SIZE)
            .ok_or_else(|| self.out_of_bounds(index))?;

        let mut buf = [0u8; ELEMENT_SIZE];
        buf.copy_from_slice(bytes);
        Ok(f32::from_le_bytes(buf))
    }

    /// Overwrite the sample at `index`.
    pub fn set_value(&mut self, index: [usize; RANK], value: f32) -> Result<()> {
        let offset = self.element_offset(index)?;
        let oob = self.out_of_bounds(index);
        let payload = self.payload_mut()?;
        let bytes = payload
            .get_mut(offset..offset + ELEMENT_SIZE)
            .ok_or(oob)?;

        bytes.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Flush outstanding writes of a created dataset to disk.
    pub fn flush(&self) -> Result<()> {
        match &self.view {
            Some(MappedView::ReadWrite(map)) => map
                .flush()
                .map_err(|e| DatasetError::io(format!("{}: {}", self.path.display(), e))),
            Some(MappedView::ReadOnly(_)) => Ok(()),
            None => Err(self.closed()),
        }
    }

    fn element_offset(&self, index: [usize; RANK]) -> Result<usize> {
        self.schema
            .byte_offset(index)
            .ok_or_else(|| self.out_of_bounds(index))
    }

    fn out_of_bounds(&self, index: [usize; RANK]) -> DatasetError {
        DatasetError::OutOfBounds {
            index,
            shape: self.schema.shape(),
        }
    }

    fn closed(&self) -> DatasetError {
        DatasetError::Closed(self.path.display().to_string())
    }
}

impl Drop for Dataset {
    fn drop(&mut self) {
        self.close();
    }
}

fn checked_payload_len(
    path: &Path,
    file_size: u64,
    payload_offset: u64,
    options: &DatasetOptions,
) -> Result<usize> {
    let expected = options.schema.payload_size() as u64;
    let actual = file_size.saturating_sub(payload_offset);

    if options.enforce_payload_size && actual != expected {
        return Err(DatasetError::format(format!(
            "{}: payload should be {} bytes (was {})",
            path.display(),
            expected,
            actual
        )));
    }

    if actual == 0 {
        return Err(DatasetError::format(format!(
            "{}: dataset has no payload",
            path.display()
        )));
    }

    usize::try_from(actual).map_err(|_| {
        DatasetError::format(format!(
            "{}: payload of {} bytes cannot be mapped",
            path.display(),
            actual
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Axes, Variable};
    use chrono::TimeZone;
    use serde_json::json;
    use std::fs;

    fn small_options() -> DatasetOptions {
        let axes = Axes {
            hour: vec![0, 1],
            pressure: vec![1000.0, 500.0, 250.0],
            variable: Variable::ALL.to_vec(),
            latitude: vec![50.0, 51.0],
            longitude: vec![0.0, 1.0, 2.0],
        };
        DatasetOptions::with_schema(GridSchema::new(axes).unwrap())
    }

    fn forecast_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 6, 0, 0).unwrap()
    }

    #[test]
    fn test_create_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let options = small_options();
        let header = json!({"model": "test", "run": "2024011506"});

        let mut created =
            Dataset::create(forecast_time(), dir.path(), header.clone(), &options).unwrap();
        assert_eq!(created.mode(), OpenMode::Create);
        assert_eq!(created.payload_len(), options.schema.payload_size());
        created.set_value([1, 2, 3, 1, 2], 42.5).unwrap();
        created.set_value([0, 0, 0, 0, 0], -1.25).unwrap();
        created.flush().unwrap();
        created.close();

        let opened = Dataset::open(forecast_time(), dir.path(), &options).unwrap();
        assert_eq!(opened.mode(), OpenMode::Read);
        assert_eq!(opened.header(), &header);
        assert_eq!(
            opened.payload_offset(),
            serde_json::to_vec(&header).unwrap().len() as u64 + 1
        );
        assert_eq!(opened.value([1, 2, 3, 1, 2]).unwrap(), 42.5);
        assert_eq!(opened.value([0, 0, 0, 0, 0]).unwrap(), -1.25);
        assert_eq!(opened.value([0, 1, 0, 0, 0]).unwrap(), 0.0);
        assert_eq!(opened.path(), dir.path().join("2024011506.tawhiri"));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Dataset::open(forecast_time(), dir.path(), &small_options()).unwrap_err();
        assert!(matches!(err, DatasetError::NotFound(_)));
    }

    #[test]
    fn test_open_without_terminator() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2024011506.tawhiri"), vec![b'{'; 300]).unwrap();
        let err = Dataset::open(forecast_time(), dir.path(), &small_options()).unwrap_err();
        assert!(matches!(err, DatasetError::Format(_)));
    }

    #[test]
    fn test_payload_size_enforcement() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = b"{}\0".to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        fs::write(dir.path().join("2024011506.tawhiri"), &bytes).unwrap();

        let mut options = small_options();
        let err = Dataset::open(forecast_time(), dir.path(), &options).unwrap_err();
        assert!(matches!(err, DatasetError::Format(_)));

        options.enforce_payload_size = false;
        let dataset = Dataset::open(forecast_time(), dir.path(), &options).unwrap();
        assert_eq!(dataset.payload_len(), 16);
        assert_eq!(dataset.payload_offset(), 3);
        assert!(matches!(
            dataset.value([1, 0, 0, 0, 0]),
            Err(DatasetError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let options = small_options();
        let mut dataset = Dataset::create(forecast_time(), dir.path(), json!({}), &options).unwrap();

        dataset.close();
        dataset.close();
        assert!(!dataset.is_open());
        assert!(matches!(dataset.payload(), Err(DatasetError::Closed(_))));
        assert!(matches!(dataset.value([0; 5]), Err(DatasetError::Closed(_))));
        drop(dataset);
    }

    #[test]
    fn test_read_mode_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let options = small_options();
        Dataset::create(forecast_time(), dir.path(), json!({}), &options).unwrap();

        let mut dataset = Dataset::open(forecast_time(), dir.path(), &options).unwrap();
        assert!(matches!(
            dataset.set_value([0; 5], 1.0),
            Err(DatasetError::ReadOnly(_))
        ));
    }

    #[test]
    fn test_index_out_of_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let options = small_options();
        let dataset = Dataset::create(forecast_time(), dir.path(), json!({}), &options).unwrap();
        assert!(matches!(
            dataset.value([0, 3, 0, 0, 0]),
            Err(DatasetError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_create_in_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let err = Dataset::create(forecast_time(), missing, json!({}), &small_options()).unwrap_err();
        assert!(matches!(err, DatasetError::Io(_)));
    }

    #[test]
    fn test_create_truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let options = small_options();
        fs::write(dir.path().join("2024011506.tawhiri"), vec![7u8; 100_000]).unwrap();

        let dataset = Dataset::create(forecast_time(), dir.path(), json!({"v": 2}), &options).unwrap();
        let size = fs::metadata(dataset.path()).unwrap().len();
        assert_eq!(size, dataset.payload_offset() + options.schema.payload_size() as u64);
        assert!(dataset.payload().unwrap().iter().all(|&b| b == 0));
    }
}
