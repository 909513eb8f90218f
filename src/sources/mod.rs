//! Boundary to the raster store.
//!
//! Sources answer collection queries with [Scene]s and terrain queries with
//! [Raster]s; everything downstream only sees these values.

pub mod gdal_source;
pub mod memory;

pub use gdal_source::{LandsatCollection, SrtmFile};
pub use memory::{MemoryCollection, MemoryElevation};

use geo::Intersects;

use crate::{
    components::{Raster, Roi, Scene},
    config::DateRange,
    errors::Result,
    sensors::Sensor,
};

pub trait SceneSource: Send + Sync {
    fn sensor(&self) -> Sensor;

    fn collection_id(&self) -> &'static str {
        self.sensor().collection_id()
    }

    /// Scenes whose footprint intersects `roi` acquired within `dates`.
    fn query(&self, roi: &Roi, dates: &DateRange) -> Result<Vec<Scene>>;
}

pub trait ElevationSource: Send + Sync {
    /// Terrain heights covering `roi`, single band.
    fn elevation(&self, roi: &Roi) -> Result<Raster>;
}

/// Whether `footprint`, given in `crs`, intersects `roi`.
pub(crate) fn footprint_intersects(roi: &Roi, crs: &str, footprint: &geo::Rect) -> Result<bool> {
    Ok(roi.polygon_in(crs)?.intersects(footprint))
}
