use log::debug;

use crate::{
    components::{Raster, Roi, Scene},
    config::DateRange,
    errors::Result,
    sensors::Sensor,
    sources::{footprint_intersects, ElevationSource, SceneSource},
};

/// Scenes already held in memory.
#[derive(Debug, Clone)]
pub struct MemoryCollection {
    sensor: Sensor,
    scenes: Vec<Scene>,
}

impl MemoryCollection {
    pub fn new(sensor: Sensor, scenes: Vec<Scene>) -> Self {
        Self { sensor, scenes }
    }
}

impl SceneSource for MemoryCollection {
    fn sensor(&self) -> Sensor {
        self.sensor
    }

    fn query(&self, roi: &Roi, dates: &DateRange) -> Result<Vec<Scene>> {
        let mut matching = Vec::new();
        for scene in self.scenes.iter().filter(|scene| dates.contains(&scene.acquired)) {
            if footprint_intersects(roi, scene.raster.grid().crs(), &scene.footprint())? {
                matching.push(scene.clone());
            } else {
                debug!("{} does not intersect the region of interest", scene.id);
            }
        }
        Ok(matching)
    }
}

#[derive(Debug, Clone)]
pub struct MemoryElevation(pub Raster);

impl ElevationSource for MemoryElevation {
    fn elevation(&self, _roi: &Roi) -> Result<Raster> {
        Ok(self.0.clone())
    }
}
