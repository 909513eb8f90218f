use log::debug;
use ndarray::Zip;

use crate::{
    components::{Raster, Scene},
    errors::Result,
};

/// Canonical names the reflective bands are renamed to.
pub const CANONICAL_BANDS: [&str; 7] = ["B1", "B2", "B3", "B4", "B5", "B6", "B7"];

/// Bits of the `QA_PIXEL` band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QaFlag {
    DilatedCloud = 1,
    Cirrus = 2,
    Cloud = 3,
    Shadow = 4,
}

impl QaFlag {
    pub const ALL: [QaFlag; 4] = [
        QaFlag::DilatedCloud,
        QaFlag::Cirrus,
        QaFlag::Cloud,
        QaFlag::Shadow,
    ];

    pub fn bit(self) -> u16 {
        1 << self as u16
    }
}

/// Masks flagged pixels of a scene and converts digital numbers to reflectance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloudMask {
    flags: u16,
}

impl Default for CloudMask {
    fn default() -> Self {
        Self::new(&QaFlag::ALL)
    }
}

impl CloudMask {
    pub fn new(flags: &[QaFlag]) -> Self {
        let flags = flags.iter().fold(0, |bits, flag| bits | flag.bit());
        Self { flags }
    }

    pub fn is_clear(&self, qa: f64) -> bool {
        (qa as u16) & self.flags == 0
    }

    /// Bands `B1..B7` in reflectance, masked wherever a flag is set or the QA
    /// pixel itself is masked.
    pub fn apply(&self, scene: &Scene) -> Result<Raster> {
        let layout = scene.layout();
        let qa = scene.raster.band(layout.qa_band)?;
        let clear = Zip::from(qa.values())
            .and(qa.valid())
            .map_collect(|value, valid| *valid && self.is_clear(*value));
        let masked = scene
            .raster
            .select_renamed(&layout.reflective_bands, &CANONICAL_BANDS)?
            .update_mask(&clear)?
            .map_values(|value| value * layout.scale + layout.offset);
        debug!(
            "{} keeps {} of {} pixels",
            scene.id,
            masked.valid_pixel_count(),
            masked.grid().len()
        );
        Ok(masked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        components::{Band, Grid, PixelGeoTransform},
        errors::PipelineError,
        sensors::{Sensor, LANDSAT_C2_L2},
    };
    use chrono::NaiveDate;
    use geo::Coord;
    use ndarray::{array, Array2};
    use rstest::{fixture, rstest};

    const QA: [f64; 7] = [0., 2., 4., 8., 16., 33., 21824.];
    const RAW: [f64; 7] = [7273., 8000., 9000., 10000., 12000., 20000., 43636.];

    #[fixture]
    fn scene() -> Scene {
        let transform = PixelGeoTransform::north_up(Coord { x: 0., y: 30. }, 30.);
        let grid = Grid::new("EPSG:32644", transform, (1, QA.len())).unwrap();
        let mut bands: Vec<Band> = LANDSAT_C2_L2
            .reflective_bands
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let values = Array2::from_shape_fn((1, RAW.len()), |(_, col)| RAW[col] + idx as f64);
                Band::from_values(*name, values)
            })
            .collect();
        bands.push(Band::from_values(
            "QA_PIXEL",
            Array2::from_shape_vec((1, QA.len()), QA.to_vec()).unwrap(),
        ));
        let raster = Raster::new(grid, bands).unwrap();
        let acquired = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        Scene::new("LC08_test", Sensor::Landsat8, acquired, raster)
    }

    #[rstest]
    fn keeps_and_renames_reflective_bands(scene: Scene) {
        let masked = CloudMask::default().apply(&scene).unwrap();
        assert_eq!(masked.band_names(), CANONICAL_BANDS.to_vec());
    }

    #[rstest]
    fn masked_iff_any_flag_set(scene: Scene) {
        let masked = CloudMask::default().apply(&scene).unwrap();
        let expected_clear = [true, false, false, false, false, true, true];
        for band in masked.bands() {
            for (col, clear) in expected_clear.iter().enumerate() {
                assert_eq!(band.get(0, col).is_some(), *clear, "{} col {col}", band.name());
            }
        }
    }

    #[rstest]
    fn rescales_exactly(scene: Scene) {
        let masked = CloudMask::default().apply(&scene).unwrap();
        let b5 = masked.band("B5").unwrap();
        for col in [0, 5, 6] {
            let raw = RAW[col] + 4.;
            assert_eq!(b5.get(0, col), Some(raw * 2.75e-5 - 0.2));
        }
    }

    #[rstest]
    fn masked_qa_pixels_are_not_clear(scene: Scene) {
        let qa = scene.raster.band("QA_PIXEL").unwrap().clone();
        let qa = qa.update_mask(&array![[false, true, true, true, true, true, true]]).unwrap();
        let mut bands: Vec<Band> = scene.raster.bands()[..7].to_vec();
        bands.push(qa);
        let raster = Raster::new(scene.raster.grid().clone(), bands).unwrap();
        let scene = Scene::new("masked_qa", scene.sensor, scene.acquired, raster);
        let masked = CloudMask::default().apply(&scene).unwrap();
        assert_eq!(masked.band("B1").unwrap().get(0, 0), None);
    }

    #[rstest]
    fn missing_qa_band_fails_fast(scene: Scene) {
        let raster = scene.raster.select(&LANDSAT_C2_L2.reflective_bands).unwrap();
        let scene = Scene::new("no_qa", scene.sensor, scene.acquired, raster);
        assert!(matches!(
            CloudMask::default().apply(&scene),
            Err(PipelineError::MissingBand { band, .. }) if band == "QA_PIXEL"
        ));
    }

    #[rstest]
    fn single_flag_mask() {
        let mask = CloudMask::new(&[QaFlag::Cloud]);
        assert!(mask.is_clear(2.));
        assert!(!mask.is_clear(8.));
    }
}
