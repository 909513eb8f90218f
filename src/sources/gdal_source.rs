//! Implementations for gdal readable files.

use gdal::{raster::RasterBand, Dataset as GdalDataset};
use itertools::Itertools;
use log::{debug, info};
use ndarray::Array2;
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    components::{Band, Grid, PixelGeoTransform, PixelWindow, Raster, Roi, Scene},
    config::DateRange,
    errors::{PipelineError, Result},
    sensors::{ProductId, Sensor},
    sources::{footprint_intersects, ElevationSource, SceneSource},
};

const QA_SUFFIX: &str = "_QA_PIXEL";

/// Crs as `AUTHORITY:CODE` when gdal knows it, wkt otherwise.
fn dataset_crs(dataset: &GdalDataset) -> String {
    dataset
        .spatial_ref()
        .ok()
        .and_then(|srs| match (srs.auth_name(), srs.auth_code()) {
            (Some(name), Ok(code)) => Some(format!("{name}:{code}")),
            _ => None,
        })
        .unwrap_or_else(|| dataset.projection())
}

fn dataset_grid(dataset: &GdalDataset) -> Result<Grid> {
    let transform = PixelGeoTransform::from_gdal(dataset.geo_transform()?);
    let (cols, rows) = dataset.raster_size();
    Grid::new(dataset_crs(dataset), transform, (rows, cols))
}

/// Reads `window` of `rasterband`, masking `nodata` or, when absent, the file's own nodata.
fn read_window(
    rasterband: &RasterBand,
    name: &str,
    window: &PixelWindow,
    nodata: Option<f64>,
) -> Result<Band> {
    let (col, row) = window.offset();
    let (cols, rows) = window.size();
    let buffer =
        rasterband.read_as::<f64>((col as isize, row as isize), (cols, rows), (cols, rows), None)?;
    let values = Array2::from_shape_vec((rows, cols), buffer.data().to_vec())?;
    Ok(Band::from_nodata(name, values, nodata.or(rasterband.no_data_value())))
}

/// Directory of Landsat Collection 2 Level 2 scenes, one GeoTIFF per band
/// named `<product id>_<band>.TIF`.
#[derive(Debug, Clone)]
pub struct LandsatCollection {
    sensor: Sensor,
    scenes: Vec<(ProductId, PathBuf)>,
}

impl LandsatCollection {
    pub fn open(root: impl AsRef<Path>, sensor: Sensor) -> Result<Self> {
        let scenes: Vec<(ProductId, PathBuf)> = fs::read_dir(root.as_ref())?
            .map_ok(|entry| entry.path())
            .process_results(|paths| {
                paths
                    .filter_map(|path| {
                        let stem = path.file_stem()?.to_str()?;
                        let product_id = stem.strip_suffix(QA_SUFFIX)?;
                        let prefix = path.with_file_name(product_id);
                        Some((product_id.parse::<ProductId>(), prefix))
                    })
                    .filter_map(|(product_id, prefix)| match product_id {
                        Ok(product_id) if product_id.sensor == sensor => Some((product_id, prefix)),
                        Ok(_) => None,
                        Err(err) => {
                            debug!("skipping {prefix:?}: {err}");
                            None
                        }
                    })
                    .sorted_by_key(|(product_id, _)| product_id.acquired)
                    .collect()
            })?;
        info!(
            "found {} {:?} scenes in {:?}",
            scenes.len(),
            sensor,
            root.as_ref()
        );
        Ok(Self { sensor, scenes })
    }

    fn band_path(prefix: &Path, band: &str) -> PathBuf {
        let mut path = prefix.as_os_str().to_owned();
        path.push(format!("_{band}.TIF"));
        PathBuf::from(path)
    }

    fn read_scene(&self, product_id: &ProductId, prefix: &Path, roi: &Roi) -> Result<Option<Scene>> {
        let layout = self.sensor.layout();
        let qa_dataset = GdalDataset::open(Self::band_path(prefix, layout.qa_band))?;
        let grid = dataset_grid(&qa_dataset)?;
        if !footprint_intersects(roi, grid.crs(), &grid.bounds())? {
            return Ok(None);
        }
        let window = match grid.window(&roi.bounds_in(grid.crs())?) {
            Ok(window) => window,
            Err(PipelineError::NoIntersection(_)) => {
                debug!("{prefix:?} only touches the region of interest");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let mut bands = Vec::with_capacity(layout.reflective_bands.len() + 1);
        for band_name in layout.reflective_bands {
            let dataset = GdalDataset::open(Self::band_path(prefix, band_name))?;
            bands.push(read_window(
                &dataset.rasterband(1)?,
                band_name,
                &window,
                Some(layout.nodata),
            )?);
        }
        bands.push(read_window(&qa_dataset.rasterband(1)?, layout.qa_band, &window, None)?);
        let raster = Raster::new(grid.sub_grid(&window)?, bands)?;
        let id = prefix
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Some(Scene::new(id, self.sensor, product_id.acquired, raster)))
    }
}

impl SceneSource for LandsatCollection {
    fn sensor(&self) -> Sensor {
        self.sensor
    }

    fn query(&self, roi: &Roi, dates: &DateRange) -> Result<Vec<Scene>> {
        let scenes = self
            .scenes
            .par_iter()
            .filter(|(product_id, _)| dates.contains(&product_id.acquired))
            .map(|(product_id, prefix)| self.read_scene(product_id, prefix, roi))
            .collect::<Result<Vec<_>>>()?;
        let scenes: Vec<Scene> = scenes.into_iter().flatten().collect();
        info!("{} returned {} scenes", self.collection_id(), scenes.len());
        Ok(scenes)
    }
}

/// Single band elevation model such as SRTM GL1.
#[derive(Debug, Clone)]
pub struct SrtmFile {
    path: PathBuf,
}

impl SrtmFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ElevationSource for SrtmFile {
    fn elevation(&self, roi: &Roi) -> Result<Raster> {
        let dataset = GdalDataset::open(&self.path)?;
        let grid = dataset_grid(&dataset)?;
        let window = grid.window(&roi.bounds_in(grid.crs())?)?;
        let band = read_window(&dataset.rasterband(1)?, "elevation", &window, None)?;
        Raster::new(grid.sub_grid(&window)?, vec![band])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdal::{
        raster::{Buffer, GdalType},
        spatial_ref::SpatialRef,
        DriverManager,
    };
    use rstest::{fixture, rstest};

    const PRODUCT: &str = "LC08_L2SP_141055_20240115_20240124_02_T1";
    const ORIGIN: (f64, f64) = (500_000., 800_180.);
    const SHAPE: (usize, usize) = (6, 8);

    fn write_tif<T: GdalType + Copy>(path: &Path, values: Vec<T>, nodata: Option<f64>) {
        let (rows, cols) = SHAPE;
        let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
        let mut dataset = driver
            .create_with_band_type::<T, _>(path, cols, rows, 1)
            .unwrap();
        dataset
            .set_geo_transform(&[ORIGIN.0, 30., 0., ORIGIN.1, 0., -30.])
            .unwrap();
        dataset
            .set_spatial_ref(&SpatialRef::from_epsg(32644).unwrap())
            .unwrap();
        let mut band = dataset.rasterband(1).unwrap();
        band.write((0, 0), (cols, rows), &mut Buffer::new((cols, rows), values))
            .unwrap();
        if nodata.is_some() {
            band.set_no_data_value(nodata).unwrap();
        }
    }

    /// Surface reflectance digital numbers `100 * row + col + 1`, zero at `[2, 2]`.
    fn digital_numbers() -> Vec<u16> {
        let (rows, cols) = SHAPE;
        (0..rows * cols)
            .map(|idx| match (idx / cols, idx % cols) {
                (2, 2) => 0,
                (row, col) => (100 * row + col + 1) as u16,
            })
            .collect()
    }

    #[fixture]
    fn collection_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for band in Sensor::Landsat8.layout().reflective_bands {
            write_tif(
                &dir.path().join(format!("{PRODUCT}_{band}.TIF")),
                digital_numbers(),
                None,
            );
        }
        let (rows, cols) = SHAPE;
        let qa: Vec<u16> = (0..rows * cols)
            .map(|idx| if idx == 3 * cols + 3 { 1 } else { 21824 })
            .collect();
        write_tif(&dir.path().join(format!("{PRODUCT}_QA_PIXEL.TIF")), qa, Some(1.));
        dir
    }

    fn dates() -> DateRange {
        DateRange::new(
            chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
        .unwrap()
    }

    fn roi(min: (f64, f64), max: (f64, f64)) -> Roi {
        Roi::new(
            "EPSG:32644",
            [min, (max.0, min.1), max, (min.0, max.1)],
        )
        .unwrap()
    }

    #[test]
    fn band_paths_follow_product_naming() {
        let prefix = Path::new("/data/LC08_L2SP_141055_20240115_20240124_02_T1");
        assert_eq!(
            LandsatCollection::band_path(prefix, "SR_B5"),
            PathBuf::from("/data/LC08_L2SP_141055_20240115_20240124_02_T1_SR_B5.TIF")
        );
    }

    #[test]
    fn open_keeps_only_matching_sensor() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "LC08_L2SP_141055_20240115_20240124_02_T1_QA_PIXEL.TIF",
            "LC09_L2SP_141055_20240123_20240125_02_T1_QA_PIXEL.TIF",
            "LC08_L2SP_141055_20240115_20240124_02_T1_SR_B1.TIF",
            "notes_QA_PIXEL.TIF",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let collection = LandsatCollection::open(dir.path(), Sensor::Landsat8).unwrap();
        assert_eq!(collection.scenes.len(), 1);
        assert_eq!(
            collection.scenes[0].0.acquired,
            chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
    }

    #[rstest]
    fn query_reads_only_the_window(collection_dir: tempfile::TempDir) {
        let collection = LandsatCollection::open(collection_dir.path(), Sensor::Landsat8).unwrap();
        let scenes = collection
            .query(&roi((500_030., 800_060.), (500_100., 800_130.)), &dates())
            .unwrap();
        assert_eq!(scenes.len(), 1);
        let scene = &scenes[0];
        assert_eq!(scene.id, PRODUCT);
        assert_eq!(scene.raster.grid().crs(), "EPSG:32644");
        assert_eq!(scene.raster.grid().shape(), (3, 3));
        assert_eq!(
            scene.raster.grid().transform().to_gdal(),
            [500_030., 30., 0., 800_150., 0., -30.]
        );
        let b5 = scene.raster.band("SR_B5").unwrap();
        assert_eq!(b5.get(0, 0), Some(102.));
        assert_eq!(b5.get(2, 2), Some(304.));
        assert_eq!(b5.get(1, 1), None);
        let qa = scene.raster.band("QA_PIXEL").unwrap();
        assert_eq!(qa.get(0, 0), Some(21824.));
        assert_eq!(qa.get(2, 2), None);
        assert_eq!(qa.valid_count(), 8);
    }

    #[rstest]
    #[case::elsewhere((600_000., 900_000.), (600_100., 900_100.))]
    #[case::touching_right_edge((500_240., 800_060.), (500_300., 800_130.))]
    #[case::touching_bottom_edge((500_030., 799_900.), (500_100., 800_000.))]
    fn query_skips_scenes_without_overlap(
        collection_dir: tempfile::TempDir,
        #[case] min: (f64, f64),
        #[case] max: (f64, f64),
    ) {
        let collection = LandsatCollection::open(collection_dir.path(), Sensor::Landsat8).unwrap();
        assert!(collection.query(&roi(min, max), &dates()).unwrap().is_empty());
    }

    #[rstest]
    fn query_filters_dates(collection_dir: tempfile::TempDir) {
        let collection = LandsatCollection::open(collection_dir.path(), Sensor::Landsat8).unwrap();
        let dates = DateRange::new(
            chrono::NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        )
        .unwrap();
        let scenes = collection
            .query(&roi((500_030., 800_060.), (500_100., 800_130.)), &dates)
            .unwrap();
        assert!(scenes.is_empty());
    }

    #[test]
    fn srtm_reads_window_with_file_nodata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("srtm.tif");
        let (rows, cols) = SHAPE;
        let heights: Vec<i16> = (0..rows * cols)
            .map(|idx| if idx == 0 { -32768 } else { 400 + idx as i16 })
            .collect();
        write_tif(&path, heights, Some(-32768.));
        let elevation = SrtmFile::new(&path)
            .elevation(&roi((500_010., 800_100.), (500_050., 800_170.)))
            .unwrap();
        assert_eq!(elevation.band_names(), vec!["elevation"]);
        assert_eq!(elevation.grid().shape(), (3, 2));
        assert_eq!(
            elevation.grid().transform().to_gdal(),
            [500_000., 30., 0., 800_180., 0., -30.]
        );
        let band = elevation.band("elevation").unwrap();
        assert_eq!(band.get(0, 0), None);
        assert_eq!(band.get(0, 1), Some(401.));
        assert_eq!(band.get(2, 1), Some(417.));
    }
}
