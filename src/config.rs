//! Run configuration.
//!
//! Everything a run needs besides the data itself: region, dates, band
//! binding, sampling and export settings. Built (or deserialized) once,
//! validated, then only borrowed by the components.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::{
    components::roi::{Roi, GEOGRAPHIC_CRS},
    errors::{PipelineError, Result},
    indices::BandBinding,
    sensors::Sensor,
};

pub const DEFAULT_SCALE: f64 = 30.;

/// Inclusive acquisition date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(PipelineError::EmptyDateRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    pub fn contains(&self, date: &NaiveDate) -> bool {
        (self.start..=self.end).contains(date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Buffer radius around label points, in working crs units.
    pub buffer_radius: f64,
    pub buffer_segments: usize,
    /// Draws `<=` this go to train, the rest to test.
    pub train_fraction: f64,
    pub seed: u64,
    /// Crs of the label point coordinates.
    pub label_crs: String,
    /// Skip sampled pixels where any band is masked.
    pub drop_masked: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            buffer_radius: 30.,
            buffer_segments: 32,
            train_fraction: 0.8,
            seed: 42,
            label_crs: GEOGRAPHIC_CRS.to_string(),
            drop_masked: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub crs: String,
    /// Pixel size in meters.
    pub scale: f64,
    pub max_pixels: u64,
    pub folder: String,
    pub image_description: String,
    pub table_description: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            crs: GEOGRAPHIC_CRS.to_string(),
            scale: DEFAULT_SCALE,
            max_pixels: 10_000_000_000_000,
            folder: "DL".to_string(),
            image_description: "Landsat_2024".to_string(),
            table_description: "Samples_LC_2024".to_string(),
        }
    }
}

fn default_collections() -> Vec<String> {
    Sensor::ALL
        .iter()
        .map(|sensor| sensor.collection_id().to_string())
        .collect()
}

fn default_scale() -> f64 {
    DEFAULT_SCALE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub roi: Roi,
    /// Metric crs the composite grid, buffers and sampling live in.
    pub working_crs: String,
    pub dates: DateRange,
    #[serde(default = "default_collections")]
    pub collections: Vec<String>,
    /// Composite and sampling pixel size, in working crs units.
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub binding: BandBinding,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl PipelineConfig {
    pub fn new(roi: Roi, working_crs: impl Into<String>, dates: DateRange) -> Self {
        Self {
            roi,
            working_crs: working_crs.into(),
            dates,
            collections: default_collections(),
            scale: DEFAULT_SCALE,
            binding: BandBinding::default(),
            sampling: SamplingConfig::default(),
            export: ExportConfig::default(),
        }
    }

    pub fn from_reader(reader: impl std::io::Read) -> Result<Self> {
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_reader(fs::File::open(path)?)
    }

    pub fn sensors(&self) -> Result<Vec<Sensor>> {
        self.collections
            .iter()
            .map(|collection_id| Sensor::from_collection_id(collection_id))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        self.dates.validate()?;
        if self.collections.is_empty() {
            return Err(PipelineError::InvalidConfig("no collections configured".into()));
        }
        self.sensors()?;
        positive("scale", self.scale)?;
        positive("export.scale", self.export.scale)?;
        positive("sampling.buffer_radius", self.sampling.buffer_radius)?;
        if self.sampling.buffer_segments < 4 {
            return Err(PipelineError::InvalidConfig(format!(
                "sampling.buffer_segments must be at least 4, got {}",
                self.sampling.buffer_segments
            )));
        }
        if !(0. ..=1.).contains(&self.sampling.train_fraction) {
            return Err(PipelineError::InvalidConfig(format!(
                "sampling.train_fraction must be in [0, 1], got {}",
                self.sampling.train_fraction
            )));
        }
        if self.export.max_pixels == 0 {
            return Err(PipelineError::InvalidConfig("export.max_pixels is 0".into()));
        }
        Ok(())
    }
}

fn positive(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0. {
        Ok(())
    } else {
        Err(PipelineError::InvalidConfig(format!(
            "{field} must be positive, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const CONFIG: &str = r#"{
        "roi": {"vertices": [[80.70, 7.20], [80.85, 7.20], [80.85, 7.30], [80.70, 7.30]]},
        "working_crs": "EPSG:32644",
        "dates": {"start": "2024-01-01", "end": "2024-12-31"},
        "sampling": {"seed": 7}
    }"#;

    #[rstest]
    fn defaults_fill_missing_fields() {
        let config = PipelineConfig::from_reader(CONFIG.as_bytes()).unwrap();
        assert_eq!(config.roi.crs(), GEOGRAPHIC_CRS);
        assert_eq!(config.scale, 30.);
        assert_eq!(config.sensors().unwrap(), vec![Sensor::Landsat8, Sensor::Landsat9]);
        assert_eq!(config.sampling.seed, 7);
        assert_eq!(config.sampling.buffer_radius, 30.);
        assert_eq!(config.sampling.train_fraction, 0.8);
        assert_eq!(config.export.crs, "EPSG:4326");
        assert_eq!(config.export.max_pixels, 10_000_000_000_000);
        assert_eq!(config.binding, BandBinding::default());
    }

    #[rstest]
    fn reversed_dates_are_empty() {
        let config = CONFIG.replace("2024-01-01", "2025-01-01");
        assert!(matches!(
            PipelineConfig::from_reader(config.as_bytes()),
            Err(PipelineError::EmptyDateRange { .. })
        ));
    }

    #[rstest]
    fn unknown_collection_is_rejected() {
        let config = CONFIG.replace(
            r#""sampling""#,
            r#""collections": ["LANDSAT/LT05/C02/T1_L2"], "sampling""#,
        );
        assert!(matches!(
            PipelineConfig::from_reader(config.as_bytes()),
            Err(PipelineError::UnknownCollection(_))
        ));
    }

    #[rstest]
    #[case(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), true)]
    #[case(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(), true)]
    #[case(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), false)]
    fn date_range_is_inclusive(#[case] date: NaiveDate, #[case] inside: bool) {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
        .unwrap();
        assert_eq!(range.contains(&date), inside);
    }
}
