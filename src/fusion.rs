use log::info;
use std::collections::HashSet;

use crate::{
    components::{Grid, Raster, Roi},
    errors::{PipelineError, Result},
};

pub const ELEVATION_BAND: &str = "elevation";

/// Composite bands plus auxiliary layers that keep their own grid.
///
/// Layers are only brought onto a common grid when sampled or exported,
/// see [AnalysisStack::aligned].
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisStack {
    base: Raster,
    layers: Vec<Raster>,
}

impl AnalysisStack {
    pub fn new(base: Raster) -> Self {
        Self {
            base,
            layers: Vec::new(),
        }
    }

    pub fn base(&self) -> &Raster {
        &self.base
    }

    pub fn layers(&self) -> &[Raster] {
        &self.layers
    }

    pub fn grid(&self) -> &Grid {
        self.base.grid()
    }

    /// Base bands first, then layer bands in insertion order.
    pub fn band_names(&self) -> Vec<&str> {
        std::iter::once(&self.base)
            .chain(&self.layers)
            .flat_map(Raster::band_names)
            .collect()
    }

    pub fn with_layer(mut self, layer: Raster) -> Result<Self> {
        let names: HashSet<&str> = self.band_names().into_iter().collect();
        if let Some(duplicate) = layer.band_names().into_iter().find(|name| names.contains(name)) {
            return Err(PipelineError::DuplicateBand(duplicate.to_string()));
        }
        self.layers.push(layer);
        Ok(self)
    }

    /// Every band resampled (nearest neighbour) onto `grid`.
    pub fn aligned(&self, grid: &Grid) -> Result<Raster> {
        let rasters = std::iter::once(&self.base)
            .chain(&self.layers)
            .map(|raster| raster.resample(grid))
            .collect::<Result<Vec<_>>>()?;
        Raster::stack(rasters)
    }
}

/// Appends clipped elevation to an analysis stack.
#[derive(Debug, Clone, Copy)]
pub struct AuxiliaryFusion<'a> {
    roi: &'a Roi,
}

impl<'a> AuxiliaryFusion<'a> {
    pub fn new(roi: &'a Roi) -> Self {
        Self { roi }
    }

    /// First band of `elevation`, clipped and renamed to [ELEVATION_BAND].
    pub fn fuse(&self, stack: AnalysisStack, elevation: Raster) -> Result<AnalysisStack> {
        let band = elevation
            .bands()
            .first()
            .ok_or_else(|| PipelineError::MissingBand {
                band: ELEVATION_BAND.to_string(),
                raster: "elevation source".to_string(),
            })?
            .clone()
            .renamed(ELEVATION_BAND);
        let layer = Raster::new(elevation.grid().clone(), vec![band])?.clip(self.roi)?;
        info!(
            "elevation layer {:?} with {} valid pixels",
            layer.grid().shape(),
            layer.valid_pixel_count()
        );
        stack.with_layer(layer)
    }
}
