//! Raster and table exports.
//!
//! Nothing is handed to a sink before the whole output is materialized and
//! its size checked.

use gdal::{raster::Buffer, spatial_ref::SpatialRef, DriverManager, Metadata};
use log::info;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::{
    components::{roi::GEOGRAPHIC_CRS, Grid, Raster, Roi},
    config::ExportConfig,
    errors::{PipelineError, Result},
    features::{Column, FeatureTable},
    fusion::AnalysisStack,
};

/// Meters per degree of latitude at the equator.
pub const METERS_PER_DEGREE: f64 = 111_319.49;

pub const TABLE_COLUMNS: [&str; 16] = [
    "B1",
    "B2",
    "B3",
    "B4",
    "B5",
    "B6",
    "B7",
    "EVI",
    "NBR",
    "NDMI",
    "NDWI",
    "NDBI",
    "NDBaI",
    "elevation",
    "classvalue",
    "sample",
];

pub trait RasterSink {
    fn write_raster(&mut self, description: &str, raster: &Raster) -> Result<()>;
}

pub trait TableSink {
    fn write_table(
        &mut self,
        description: &str,
        columns: &[&str],
        records: &[Vec<String>],
    ) -> Result<()>;
}

/// Writes `<folder>/<description>.tif` and `<folder>/<description>.csv`.
#[derive(Debug, Clone)]
pub struct FolderSink {
    folder: PathBuf,
}

impl FolderSink {
    pub fn new(folder: impl AsRef<Path>) -> Self {
        Self {
            folder: folder.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self, description: &str, extension: &str) -> PathBuf {
        self.folder.join(format!("{description}.{extension}"))
    }
}

impl RasterSink for FolderSink {
    /// Float32 GeoTIFF, masked pixels as NaN nodata.
    fn write_raster(&mut self, description: &str, raster: &Raster) -> Result<()> {
        fs::create_dir_all(&self.folder)?;
        let path = self.path(description, "tif");
        let (rows, cols) = raster.grid().shape();
        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let mut dataset =
            driver.create_with_band_type::<f32, _>(&path, cols, rows, raster.bands().len())?;
        dataset.set_geo_transform(&raster.grid().transform().to_gdal())?;
        dataset.set_spatial_ref(&SpatialRef::from_definition(raster.grid().crs())?)?;
        for (idx, band) in raster.bands().iter().enumerate() {
            let values: Vec<f32> = band
                .values()
                .iter()
                .zip(band.valid())
                .map(|(value, valid)| {
                    if *valid {
                        num_traits::cast(*value).unwrap_or(f32::NAN)
                    } else {
                        f32::NAN
                    }
                })
                .collect();
            let mut rasterband = dataset.rasterband(idx + 1)?;
            rasterband.write((0, 0), (cols, rows), &mut Buffer::new((cols, rows), values))?;
            rasterband.set_no_data_value(Some(f64::NAN))?;
            rasterband.set_description(band.name())?;
        }
        info!("wrote {path:?}");
        Ok(())
    }
}

impl TableSink for FolderSink {
    fn write_table(
        &mut self,
        description: &str,
        columns: &[&str],
        records: &[Vec<String>],
    ) -> Result<()> {
        fs::create_dir_all(&self.folder)?;
        let path = self.path(description, "csv");
        CsvSink::new(fs::File::create(&path)?).write_table(description, columns, records)?;
        info!("wrote {path:?}");
        Ok(())
    }
}

/// Csv table over any writer.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
        }
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|err| PipelineError::IoError(err.into_error()))
    }
}

impl<W: Write> TableSink for CsvSink<W> {
    fn write_table(&mut self, _: &str, columns: &[&str], records: &[Vec<String>]) -> Result<()> {
        self.writer.write_record(columns)?;
        for record in records {
            self.writer.write_record(record)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps written outputs in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub rasters: Vec<(String, Raster)>,
    pub tables: Vec<(String, Vec<String>, Vec<Vec<String>>)>,
}

impl RasterSink for MemorySink {
    fn write_raster(&mut self, description: &str, raster: &Raster) -> Result<()> {
        self.rasters.push((description.to_string(), raster.clone()));
        Ok(())
    }
}

impl TableSink for MemorySink {
    fn write_table(
        &mut self,
        description: &str,
        columns: &[&str],
        records: &[Vec<String>],
    ) -> Result<()> {
        self.tables.push((
            description.to_string(),
            columns.iter().map(|column| column.to_string()).collect(),
            records.to_vec(),
        ));
        Ok(())
    }
}

pub struct ExportAdapter<'a> {
    config: &'a ExportConfig,
    roi: &'a Roi,
}

impl<'a> ExportAdapter<'a> {
    pub fn new(config: &'a ExportConfig, roi: &'a Roi) -> Self {
        Self { config, roi }
    }

    /// Pixel size in export crs units.
    pub fn pixel_size(&self) -> f64 {
        if self.config.crs == GEOGRAPHIC_CRS {
            self.config.scale / METERS_PER_DEGREE
        } else {
            self.config.scale
        }
    }

    /// Grid covering the region of interest in the export crs.
    pub fn grid(&self) -> Result<Grid> {
        let crs = self.config.crs.as_str();
        Grid::covering(&self.roi.bounds_in(crs)?, crs, self.pixel_size())
    }

    pub fn check_capacity(&self, grid: &Grid) -> Result<()> {
        let pixels = grid.rows() as u64 * grid.cols() as u64;
        if pixels > self.config.max_pixels {
            return Err(PipelineError::MaxPixelsExceeded {
                pixels,
                max: self.config.max_pixels,
            });
        }
        Ok(())
    }

    /// Stack resampled onto [ExportAdapter::grid] and clipped, after the capacity check.
    pub fn prepare_raster(&self, stack: &AnalysisStack) -> Result<Raster> {
        let grid = self.grid()?;
        self.check_capacity(&grid)?;
        stack.aligned(&grid)?.clip(self.roi)
    }

    pub fn export_raster(&self, stack: &AnalysisStack, sink: &mut dyn RasterSink) -> Result<()> {
        let raster = self.prepare_raster(stack)?;
        sink.write_raster(&self.config.image_description, &raster)
    }

    pub fn export_table(
        &self,
        table: &FeatureTable,
        columns: &[&str],
        sink: &mut dyn TableSink,
    ) -> Result<()> {
        let records = table_records(table, columns)?;
        sink.write_table(&self.config.table_description, columns, &records)
    }
}

/// Rows of `table` as strings in `columns` order, masked values left empty.
pub fn table_records(table: &FeatureTable, columns: &[&str]) -> Result<Vec<Vec<String>>> {
    let columns = columns
        .iter()
        .map(|name| table.column(name))
        .collect::<Result<Vec<_>>>()?;
    Ok(table
        .rows()
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| match column {
                    Column::Band(idx) => row.values[*idx]
                        .map(|value| value.to_string())
                        .unwrap_or_default(),
                    Column::Class => row.class.code().to_string(),
                    Column::Sample => row.sample.to_string(),
                })
                .collect()
        })
        .collect())
}
