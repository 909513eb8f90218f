use chrono::NaiveDate;

use crate::{crs_geo::CrsGeometryError, intersection::IntersectionError};

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    CrsGeometryError(#[from] CrsGeometryError),
    #[error(transparent)]
    GdalError(#[from] gdal::errors::GdalError),
    #[error(transparent)]
    NdarrayError(#[from] ndarray::ShapeError),
    #[error(transparent)]
    CsvError(#[from] csv::Error),
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    NoIntersection(#[from] IntersectionError),
    #[error("Band {band} not found in {raster}")]
    MissingBand { band: String, raster: String },
    #[error("Band {0} is already present")]
    DuplicateBand(String),
    #[error("Band {band} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        band: String,
        found: (usize, usize),
        expected: (usize, usize),
    },
    #[error("Rasters do not share the same grid")]
    GridMismatch,
    #[error("Malformed geometry: {0}")]
    MalformedGeometry(String),
    #[error("Date range {start} .. {end} is empty")]
    EmptyDateRange { start: NaiveDate, end: NaiveDate },
    #[error("Export of {pixels} pixels exceeds maxPixels {max}")]
    MaxPixelsExceeded { pixels: u64, max: u64 },
    #[error("Class value {0} is not a populated land cover class")]
    UnknownClass(i64),
    #[error("Collection {0} is not known")]
    UnknownCollection(String),
    #[error("Column {0} is not in the feature table")]
    UnknownColumn(String),
    #[error("Product id {0} is not a Landsat Collection 2 id")]
    MalformedProductId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
