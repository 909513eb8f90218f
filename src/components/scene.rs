use chrono::NaiveDate;
use geo::Rect;

use crate::{
    components::raster::Raster,
    sensors::{BandLayout, Sensor},
};

/// One acquisition of one sensor, still in digital numbers and carrying its QA band.
#[derive(Debug, Clone)]
pub struct Scene {
    pub id: String,
    pub sensor: Sensor,
    pub acquired: NaiveDate,
    pub raster: Raster,
}

impl Scene {
    pub fn new(id: impl Into<String>, sensor: Sensor, acquired: NaiveDate, raster: Raster) -> Self {
        Self {
            id: id.into(),
            sensor,
            acquired,
            raster,
        }
    }

    pub fn layout(&self) -> &'static BandLayout {
        self.sensor.layout()
    }

    /// Extent in the scene crs.
    pub fn footprint(&self) -> Rect {
        self.raster.grid().bounds()
    }
}
