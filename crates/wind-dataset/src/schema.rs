//! Grid schemas describing the shape and axes of a wind dataset.
//!
//! A dataset payload is a flat, row-major array of `f32` samples indexed by
//! five axes in the fixed order (hour, pressure level, variable, latitude,
//! longitude). The schema is static for a deployment: every dataset in a
//! directory shares it.

use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};

/// Number of grid dimensions.
pub const RANK: usize = 5;

/// Size in bytes of one sample (`f32`).
pub const ELEMENT_SIZE: usize = 4;

/// A variable stored on the variable axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    /// Geopotential height
    Height,
    /// Eastward wind component
    WindU,
    /// Northward wind component
    WindV,
    /// Vertical wind component
    WindW,
}

impl Variable {
    /// All variables in their on-disk order.
    pub const ALL: [Variable; 4] = [
        Variable::Height,
        Variable::WindU,
        Variable::WindV,
        Variable::WindW,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Height => "height",
            Self::WindU => "wind_u",
            Self::WindV => "wind_v",
            Self::WindW => "wind_w",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "height" => Some(Self::Height),
            "wind_u" => Some(Self::WindU),
            "wind_v" => Some(Self::WindV),
            "wind_w" => Some(Self::WindW),
            _ => None,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coordinate values along each grid axis.
///
/// For example `axes.pressure[4]` is the level of every sample at
/// `[_, 4, _, _, _]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axes {
    /// Forecast hour offsets
    pub hour: Vec<u32>,
    /// Pressure levels in hPa (model level numbers for MEPS)
    pub pressure: Vec<f64>,
    pub variable: Vec<Variable>,
    pub latitude: Vec<f64>,
    pub longitude: Vec<f64>,
}

impl Axes {
    /// Number of coordinate values on each axis, in grid order.
    pub fn lengths(&self) -> [usize; RANK] {
        [
            self.hour.len(),
            self.pressure.len(),
            self.variable.len(),
            self.latitude.len(),
            self.longitude.len(),
        ]
    }
}

/// Numerical weather model whose grid layout is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelGrid {
    /// MetCoOp Ensemble Prediction System (projected 2.5km grid subset)
    Meps,
    /// NOAA Global Forecast System (0.25 degree)
    Gfs,
    /// ECMWF open data (0.25 degree)
    Ecmwf,
}

impl Default for ModelGrid {
    fn default() -> Self {
        Self::Meps
    }
}

impl ModelGrid {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "meps" => Some(Self::Meps),
            "gfs" => Some(Self::Gfs),
            "ecmwf" => Some(Self::Ecmwf),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meps => "meps",
            Self::Gfs => "gfs",
            Self::Ecmwf => "ecmwf",
        }
    }

    /// The static schema for this model.
    pub fn schema(&self) -> &'static GridSchema {
        match self {
            Self::Meps => &MEPS,
            Self::Gfs => &GFS,
            Self::Ecmwf => &ECMWF,
        }
    }
}

impl fmt::Display for ModelGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pressure levels contained in a NOAA "pgrb2f" file.
pub const PRESSURES_PGRB2F: [u32; 28] = [
    10, 15, 20, 30, 40, 50, 70, 100, 150, 200, 250, 300, 350, 400, 450, 500, 550, 600, 650, 700,
    750, 800, 850, 900, 925, 950, 975, 1000,
];

/// Pressure levels contained in a NOAA "pgrb2bf" file.
pub const PRESSURES_PGRB2BF: [u32; 21] = [
    1, 2, 3, 5, 7, 125, 175, 225, 275, 325, 375, 425, 475, 525, 575, 625, 675, 725, 775, 825, 875,
];

/// Pressure levels published in ECMWF open data.
pub const PRESSURES_ECMWF: [u32; 13] = [
    1000, 925, 850, 700, 600, 500, 400, 300, 250, 200, 150, 100, 50,
];

static MEPS: Lazy<GridSchema> = Lazy::new(|| {
    // MEPS uses model levels; the per-point pressure differs, so the level
    // axis only carries the level number.
    let axes = Axes {
        hour: (0..4).collect(),
        pressure: (0..65).map(f64::from).collect(),
        variable: Variable::ALL.to_vec(),
        latitude: (0..28).map(|i| -472517.90625 + i as f64 * 2500.0).collect(),
        longitude: (0..88).map(|i| -565084.0625 + i as f64 * 2500.0).collect(),
    };
    GridSchema::from_shape_and_axes([4, 65, 4, 28, 88], axes)
        .expect("built-in MEPS axes disagree with its shape")
});

static GFS: Lazy<GridSchema> = Lazy::new(|| {
    let axes = Axes {
        hour: (0..2).collect(),
        pressure: descending_levels(PRESSURES_PGRB2F.iter().chain(PRESSURES_PGRB2BF.iter())),
        variable: Variable::ALL.to_vec(),
        latitude: quarter_degrees(-360..=360),
        longitude: quarter_degrees(-720..720),
    };
    GridSchema::from_shape_and_axes([2, 49, 4, 721, 1440], axes)
        .expect("built-in GFS axes disagree with its shape")
});

static ECMWF: Lazy<GridSchema> = Lazy::new(|| {
    let axes = Axes {
        hour: (0..9).step_by(3).collect(),
        pressure: descending_levels(PRESSURES_ECMWF.iter()),
        variable: Variable::ALL.to_vec(),
        latitude: quarter_degrees(-360..=360),
        longitude: quarter_degrees(-720..720),
    };
    GridSchema::from_shape_and_axes([3, 13, 4, 721, 1440], axes)
        .expect("built-in ECMWF axes disagree with its shape")
});

fn descending_levels<'a>(levels: impl Iterator<Item = &'a u32>) -> Vec<f64> {
    let mut levels: Vec<u32> = levels.copied().collect();
    levels.sort_unstable_by(|a, b| b.cmp(a));
    levels.into_iter().map(f64::from).collect()
}

fn quarter_degrees(range: impl Iterator<Item = i32>) -> Vec<f64> {
    range.map(|x| x as f64 / 4.0).collect()
}

/// Shape and axes of the gridded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSchema {
    shape: [usize; RANK],
    axes: Axes,
    payload_size: usize,
}

impl GridSchema {
    /// Build a schema whose shape is taken from the axis lengths.
    pub fn new(axes: Axes) -> Result<Self> {
        Self::from_shape_and_axes(axes.lengths(), axes)
    }

    /// Build a schema from an explicit shape, checking that
    /// `len(axes[i]) == shape[i]` for every axis.
    pub fn from_shape_and_axes(shape: [usize; RANK], axes: Axes) -> Result<Self> {
        let lengths = axes.lengths();
        if lengths != shape {
            return Err(DatasetError::invalid_schema(format!(
                "shape {:?} does not match axis lengths {:?}",
                shape, lengths
            )));
        }

        if let Some(axis) = shape.iter().position(|&n| n == 0) {
            return Err(DatasetError::invalid_schema(format!(
                "axis {} has no coordinate values",
                axis
            )));
        }

        let payload_size = shape
            .iter()
            .try_fold(ELEMENT_SIZE, |acc, &n| acc.checked_mul(n))
            .ok_or_else(|| {
                DatasetError::invalid_schema(format!("payload of shape {:?} overflows", shape))
            })?;

        Ok(Self {
            shape,
            axes,
            payload_size,
        })
    }

    /// Built-in MEPS schema.
    pub fn meps() -> &'static GridSchema {
        &MEPS
    }

    /// Built-in GFS schema.
    pub fn gfs() -> &'static GridSchema {
        &GFS
    }

    /// Built-in ECMWF schema.
    pub fn ecmwf() -> &'static GridSchema {
        &ECMWF
    }

    pub fn shape(&self) -> [usize; RANK] {
        self.shape
    }

    pub fn axes(&self) -> &Axes {
        &self.axes
    }

    pub fn element_size(&self) -> usize {
        ELEMENT_SIZE
    }

    /// Number of samples in the payload.
    pub fn element_count(&self) -> usize {
        self.payload_size / ELEMENT_SIZE
    }

    /// Exact byte length of the payload region.
    pub fn payload_size(&self) -> usize {
        self.payload_size
    }

    /// Row-major position of `index` in the flat payload, or `None` when
    /// any component is out of range.
    pub fn flat_index(&self, index: [usize; RANK]) -> Option<usize> {
        let mut flat = 0;
        for (i, n) in index.iter().zip(self.shape.iter()) {
            if i >= n {
                return None;
            }
            flat = flat * n + i;
        }
        Some(flat)
    }

    /// Byte offset of `index` within the payload region.
    pub fn byte_offset(&self, index: [usize; RANK]) -> Option<usize> {
        self.flat_index(index).map(|flat| flat * ELEMENT_SIZE)
    }
}
