use geo::{BoundingRect, Polygon, Rect};
use log::info;
use rayon::prelude::*;
use std::collections::BTreeMap;

use crate::{
    components::Grid,
    crs_geo::Reprojector,
    errors::{PipelineError, Result},
    fusion::AnalysisStack,
    samples::{SampleSet, SampleTag, SplitCounts},
    taxonomy::LandCoverClass,
};

pub const CLASS_COLUMN: &str = "classvalue";
pub const SAMPLE_COLUMN: &str = "sample";

/// Values of every stack band at one sampled pixel, `None` where masked.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub values: Vec<Option<f64>>,
    pub class: LandCoverClass,
    pub sample: SampleTag,
}

/// Where a named column of a [FeatureTable] comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Band(usize),
    Class,
    Sample,
}

/// Rows sharing one schema: the stack bands, then [CLASS_COLUMN] and [SAMPLE_COLUMN].
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    bands: Vec<String>,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(bands: Vec<String>, rows: Vec<FeatureRow>) -> Result<Self> {
        if let Some(row) = rows.iter().find(|row| row.values.len() != bands.len()) {
            return Err(PipelineError::InvalidConfig(format!(
                "feature row has {} values for {} bands",
                row.values.len(),
                bands.len()
            )));
        }
        Ok(Self { bands, rows })
    }

    pub fn bands(&self) -> &[String] {
        &self.bands
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> Vec<&str> {
        self.bands
            .iter()
            .map(String::as_str)
            .chain([CLASS_COLUMN, SAMPLE_COLUMN])
            .collect()
    }

    pub fn column(&self, name: &str) -> Result<Column> {
        match name {
            CLASS_COLUMN => Ok(Column::Class),
            SAMPLE_COLUMN => Ok(Column::Sample),
            _ => self
                .bands
                .iter()
                .position(|band| band == name)
                .map(Column::Band)
                .ok_or_else(|| PipelineError::UnknownColumn(name.to_string())),
        }
    }

    /// Rows tagged `tag`, same schema.
    pub fn partition(&self, tag: SampleTag) -> FeatureTable {
        Self {
            bands: self.bands.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| row.sample == tag)
                .cloned()
                .collect(),
        }
    }

    pub fn train(&self) -> FeatureTable {
        self.partition(SampleTag::Train)
    }

    pub fn test(&self) -> FeatureTable {
        self.partition(SampleTag::Test)
    }

    pub fn counts(&self) -> BTreeMap<LandCoverClass, SplitCounts> {
        let mut counts: BTreeMap<LandCoverClass, SplitCounts> = BTreeMap::new();
        for row in &self.rows {
            counts.entry(row.class).or_default().add(row.sample);
        }
        counts
    }
}

/// Samples an analysis stack at the pixels inside each sample region.
#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor {
    scale: f64,
    drop_masked: bool,
}

impl FeatureExtractor {
    pub fn new(scale: f64) -> Self {
        Self {
            scale,
            drop_masked: true,
        }
    }

    pub fn with_drop_masked(mut self, drop_masked: bool) -> Self {
        self.drop_masked = drop_masked;
        self
    }

    /// One row per pixel of a `scale` grid snapped in the stack crs whose
    /// centre lies in a region, regions in set order.
    pub fn extract(&self, stack: &AnalysisStack, samples: &SampleSet) -> Result<FeatureTable> {
        let bands: Vec<String> = stack.band_names().into_iter().map(String::from).collect();
        let crs = stack.grid().crs();
        let reprojector = Reprojector::new(samples.crs(), crs)?;
        let polygons = samples
            .regions()
            .iter()
            .map(|region| reprojector.geometry(&region.polygon))
            .collect::<std::result::Result<Vec<Polygon>, _>>()?;
        let Some(bounds) = union_bounds(&polygons) else {
            return FeatureTable::new(bands, Vec::new());
        };
        let grid = Grid::covering(&bounds, crs, self.scale)?;
        let aligned = stack.aligned(&grid)?;
        let rows: Vec<FeatureRow> = polygons
            .par_iter()
            .zip(samples.regions())
            .map(|(polygon, region)| -> Result<Vec<FeatureRow>> {
                let Some(region_bounds) = polygon.bounding_rect() else {
                    return Ok(Vec::new());
                };
                let window = grid.window(&region_bounds)?;
                let coverage = grid.sub_grid(&window)?.coverage(polygon)?;
                let (col_offset, row_offset) = window.offset();
                Ok(coverage
                    .indexed_iter()
                    .filter(|(_, inside)| **inside)
                    .map(|((row, col), _)| {
                        aligned
                            .bands()
                            .iter()
                            .map(|band| band.get(row + row_offset, col + col_offset))
                            .collect::<Vec<_>>()
                    })
                    .filter(|values| !self.drop_masked || values.iter().all(Option::is_some))
                    .map(|values| FeatureRow {
                        values,
                        class: region.class,
                        sample: region.sample,
                    })
                    .collect::<Vec<_>>())
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();
        let table = FeatureTable::new(bands, rows)?;
        info!(
            "extracted {} rows ({} train, {} test) from {} regions",
            table.len(),
            table.rows().iter().filter(|row| row.sample == SampleTag::Train).count(),
            table.rows().iter().filter(|row| row.sample == SampleTag::Test).count(),
            samples.len()
        );
        Ok(table)
    }
}

fn union_bounds(polygons: &[Polygon]) -> Option<Rect> {
    polygons
        .iter()
        .filter_map(|polygon| polygon.bounding_rect())
        .reduce(|acc, rect| {
            Rect::new(
                (acc.min().x.min(rect.min().x), acc.min().y.min(rect.min().y)),
                (acc.max().x.max(rect.max().x), acc.max().y.max(rect.max().y)),
            )
        })
}
