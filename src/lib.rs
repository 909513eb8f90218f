//! Land cover training datasets from Landsat 8/9.
//!
//! A cloud free median composite over a region of interest is extended with
//! spectral indices and elevation, then sampled inside buffered label points
//! that are split into train and test sets per class.

pub mod cloud_mask;
pub mod components;
pub mod composite;
pub mod config;
pub mod crs_geo;
pub mod errors;
pub mod export;
pub mod features;
pub mod fusion;
pub mod indices;
pub mod intersection;
pub mod pipeline;
pub mod samples;
pub mod sensors;
pub mod sources;
pub mod taxonomy;

pub use cloud_mask::CloudMask;
pub use components::{Band, Grid, Raster, Roi, Scene};
pub use composite::CompositeBuilder;
pub use config::{DateRange, ExportConfig, PipelineConfig, SamplingConfig};
pub use errors::{PipelineError, Result};
pub use export::{CsvSink, ExportAdapter, FolderSink, MemorySink, TABLE_COLUMNS};
pub use features::{FeatureExtractor, FeatureRow, FeatureTable};
pub use fusion::{AnalysisStack, AuxiliaryFusion};
pub use indices::{BandBinding, IndexEngine};
pub use pipeline::{Pipeline, PipelineOutput};
pub use samples::{LabelPoint, SampleCurator, SampleSet, SampleTag};
pub use sensors::Sensor;
pub use taxonomy::LandCoverClass;
