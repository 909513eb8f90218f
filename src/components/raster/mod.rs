pub mod band;

use log::debug;
use ndarray::Array2;
use std::{collections::HashSet, fmt::Debug};

use crate::{
    components::{grid::Grid, roi::Roi},
    errors::{PipelineError, Result},
};

pub use band::Band;

/// Collection of bands that share one [Grid].
#[derive(Clone, PartialEq)]
pub struct Raster {
    grid: Grid,
    bands: Vec<Band>,
}

impl Debug for Raster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let f = &mut f.debug_struct("Raster");
        f.field("crs", &self.grid.crs())
            .field("shape", &self.grid.shape())
            .field("resolution", &self.grid.transform().resolution())
            .field("bands", &self.band_names())
            .finish()
    }
}

impl Raster {
    fn init(grid: Grid, bands: Vec<Band>) -> Self {
        let raster = Self { grid, bands };
        debug!("new {raster:?}");
        raster
    }

    pub fn new(grid: Grid, bands: Vec<Band>) -> Result<Self> {
        let mut names = HashSet::new();
        for band in &bands {
            if band.shape() != grid.shape() {
                return Err(PipelineError::ShapeMismatch {
                    band: band.name().to_string(),
                    found: band.shape(),
                    expected: grid.shape(),
                });
            }
            if !names.insert(band.name()) {
                return Err(PipelineError::DuplicateBand(band.name().to_string()));
            }
        }
        Ok(Self::init(grid, bands))
    }

    /// Raster with every pixel of every band masked.
    pub fn fully_masked<S: AsRef<str>>(grid: Grid, names: &[S]) -> Result<Self> {
        let shape = grid.shape();
        let bands = names
            .iter()
            .map(|name| Band::masked(name.as_ref(), shape))
            .collect();
        Self::new(grid, bands)
    }

    /// Concatenates the bands of rasters sharing a grid.
    pub fn stack(rasters: Vec<Raster>) -> Result<Raster> {
        let mut stack_iter = rasters.into_iter();
        let mut stack = stack_iter
            .next()
            .ok_or_else(|| PipelineError::InvalidConfig("nothing to stack".into()))?;
        for raster in stack_iter {
            stack = stack.add_bands(raster)?;
        }
        Ok(stack)
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(Band::name).collect()
    }

    pub fn band(&self, name: &str) -> Result<&Band> {
        self.bands
            .iter()
            .find(|band| band.name() == name)
            .ok_or_else(|| PipelineError::MissingBand {
                band: name.to_string(),
                raster: format!("{:?}", self.band_names()),
            })
    }

    /// Bands `names` in the given order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Raster> {
        let bands = names
            .iter()
            .map(|name| self.band(name.as_ref()).cloned())
            .collect::<Result<Vec<_>>>()?;
        Self::new(self.grid.clone(), bands)
    }

    /// Bands `names` renamed to `renames`, pairwise.
    pub fn select_renamed<S: AsRef<str>, R: AsRef<str>>(
        &self,
        names: &[S],
        renames: &[R],
    ) -> Result<Raster> {
        if names.len() != renames.len() {
            return Err(PipelineError::InvalidConfig(format!(
                "{} bands selected but {} names given",
                names.len(),
                renames.len()
            )));
        }
        let bands = names
            .iter()
            .zip(renames)
            .map(|(name, rename)| Ok(self.band(name.as_ref())?.clone().renamed(rename.as_ref())))
            .collect::<Result<Vec<_>>>()?;
        Self::new(self.grid.clone(), bands)
    }

    pub fn add_bands(self, other: Raster) -> Result<Raster> {
        if self.grid != other.grid {
            return Err(PipelineError::GridMismatch);
        }
        let mut bands = self.bands;
        bands.extend(other.bands);
        Self::new(self.grid, bands)
    }

    pub fn update_mask(self, mask: &Array2<bool>) -> Result<Raster> {
        let bands = self
            .bands
            .into_iter()
            .map(|band| band.update_mask(mask))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::init(self.grid, bands))
    }

    pub fn map_values(self, f: impl Fn(f64) -> f64 + Copy) -> Raster {
        let bands = self
            .bands
            .into_iter()
            .map(|band| band.map_values(f))
            .collect();
        Self::init(self.grid, bands)
    }

    /// Masks pixels whose centre falls outside `roi`.
    pub fn clip(self, roi: &Roi) -> Result<Raster> {
        let polygon = roi.polygon_in(self.grid.crs())?;
        let coverage = self.grid.coverage(&polygon)?;
        self.update_mask(&coverage)
    }

    /// Nearest neighbour resampling onto `target`.
    pub fn resample(&self, target: &Grid) -> Result<Raster> {
        if self.grid.eq(target) {
            return Ok(self.clone());
        }
        let lookup = target.nearest_in(&self.grid)?;
        let bands = self
            .bands
            .iter()
            .map(|band| band.resample(&lookup, target.shape()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(target.clone(), bands)
    }

    /// Pixels valid in at least one band.
    pub fn valid_pixel_count(&self) -> usize {
        let (rows, cols) = self.grid.shape();
        (0..rows)
            .flat_map(|row| (0..cols).map(move |col| (row, col)))
            .filter(|(row, col)| self.bands.iter().any(|band| band.get(*row, *col).is_some()))
            .count()
    }
}
