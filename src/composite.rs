use itertools::Itertools;
use log::{info, warn};
use ndarray::Array2;
use rayon::prelude::*;

use crate::{
    cloud_mask::{CloudMask, CANONICAL_BANDS},
    components::{Band, Grid, Raster, Scene},
    config::PipelineConfig,
    errors::{PipelineError, Result},
    sources::SceneSource,
};

/// Median of `values`, mean of the two middle values for even counts.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.)
    } else {
        Some(values[mid])
    }
}

/// Per pixel, per band median over the valid observations on `grid`.
///
/// A pixel is masked only when no observation is valid there.
pub fn median_composite<S: AsRef<str> + Sync>(
    grid: &Grid,
    observations: &[Raster],
    names: &[S],
) -> Result<Raster> {
    if observations.iter().any(|raster| raster.grid() != grid) {
        return Err(PipelineError::GridMismatch);
    }
    let cols = grid.cols();
    let bands = names
        .iter()
        .map(|name| {
            let stack = observations
                .iter()
                .map(|raster| raster.band(name.as_ref()))
                .collect::<Result<Vec<&Band>>>()?;
            let (values, valid): (Vec<f64>, Vec<bool>) = (0..grid.len())
                .into_par_iter()
                .map(|idx| {
                    let (row, col) = (idx / cols, idx % cols);
                    let mut pixel_values: Vec<f64> =
                        stack.iter().filter_map(|band| band.get(row, col)).collect();
                    match median(&mut pixel_values) {
                        Some(value) => (value, true),
                        None => (f64::NAN, false),
                    }
                })
                .unzip();
            Band::new(
                name.as_ref(),
                Array2::from_shape_vec(grid.shape(), values)?,
                Array2::from_shape_vec(grid.shape(), valid)?,
            )
        })
        .collect::<Result<Vec<_>>>()?;
    Raster::new(grid.clone(), bands)
}

/// Cloud free median composite of every scene of every source over the
/// region of interest.
pub struct CompositeBuilder<'a> {
    config: &'a PipelineConfig,
    sources: Vec<&'a dyn SceneSource>,
    mask: CloudMask,
}

impl<'a> CompositeBuilder<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self {
            config,
            sources: Vec::new(),
            mask: CloudMask::default(),
        }
    }

    pub fn with_source(mut self, source: &'a dyn SceneSource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_sources(mut self, sources: impl IntoIterator<Item = &'a dyn SceneSource>) -> Self {
        self.sources.extend(sources);
        self
    }

    pub fn with_mask(mut self, mask: CloudMask) -> Self {
        self.mask = mask;
        self
    }

    /// Output grid: `scale` pixels in the working crs covering the region of interest.
    pub fn grid(&self) -> Result<Grid> {
        let crs = self.config.working_crs.as_str();
        Grid::covering(&self.config.roi.bounds_in(crs)?, crs, self.config.scale)
    }

    /// Filtered scenes of every source, in source order.
    pub fn scenes(&self) -> Result<Vec<Scene>> {
        self.config.dates.validate()?;
        let per_source = self
            .sources
            .par_iter()
            .map(|source| source.query(&self.config.roi, &self.config.dates))
            .collect::<Result<Vec<_>>>()?;
        for (source, scenes) in self.sources.iter().zip(&per_source) {
            info!("{}: {} scenes", source.collection_id(), scenes.len());
        }
        Ok(per_source.into_iter().flatten().collect())
    }

    pub fn build(&self) -> Result<Raster> {
        if self.sources.is_empty() {
            return Err(PipelineError::InvalidConfig("no scene sources".into()));
        }
        let grid = self.grid()?;
        let scenes = self.scenes()?;
        let observations = scenes
            .par_iter()
            .map(|scene| self.mask.apply(scene)?.resample(&grid))
            .collect::<Result<Vec<_>>>()?;
        if observations.is_empty() {
            warn!("no scenes matched, composite is fully masked");
        }
        let composite = median_composite(&grid, &observations, &CANONICAL_BANDS)?
            .clip(&self.config.roi)?;
        info!(
            "composite of {} scenes ({}) has {} valid pixels",
            scenes.len(),
            scenes.iter().map(|scene| scene.sensor).unique().map(|s| format!("{s:?}")).join(", "),
            composite.valid_pixel_count()
        );
        Ok(composite)
    }
}
