use log::info;

use crate::{
    composite::CompositeBuilder,
    config::PipelineConfig,
    errors::{PipelineError, Result},
    export::{table_records, ExportAdapter, RasterSink, TableSink, TABLE_COLUMNS},
    features::{FeatureExtractor, FeatureTable},
    fusion::{AnalysisStack, AuxiliaryFusion},
    indices::IndexEngine,
    samples::{LabelPoint, SampleCurator, SampleSet},
    sources::{ElevationSource, SceneSource},
};

/// Everything a run materializes before export.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub stack: AnalysisStack,
    pub samples: SampleSet,
    pub table: FeatureTable,
}

/// Wires sources, compositing, indices, elevation, sampling and extraction.
///
/// The spectral branch and sample curation do not depend on each other and
/// run concurrently.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Composite with indices and elevation over the region of interest.
    ///
    /// Every source must serve one of the configured collections.
    pub fn analysis_stack(
        &self,
        sources: &[&dyn SceneSource],
        elevation: &dyn ElevationSource,
    ) -> Result<AnalysisStack> {
        if let Some(source) = sources.iter().find(|source| {
            !self
                .config
                .collections
                .iter()
                .any(|collection| collection == source.collection_id())
        }) {
            return Err(PipelineError::UnknownCollection(
                source.collection_id().to_string(),
            ));
        }
        let composite = CompositeBuilder::new(&self.config)
            .with_sources(sources.iter().copied())
            .build()?;
        let spectral = IndexEngine::new(&self.config.binding).append(composite)?;
        AuxiliaryFusion::new(&self.config.roi).fuse(
            AnalysisStack::new(spectral),
            elevation.elevation(&self.config.roi)?,
        )
    }

    pub fn run(
        &self,
        sources: &[&dyn SceneSource],
        elevation: &dyn ElevationSource,
        labels: &[LabelPoint],
    ) -> Result<PipelineOutput> {
        let (stack, samples) = rayon::join(
            || self.analysis_stack(sources, elevation),
            || SampleCurator::new(&self.config.sampling, &self.config.working_crs).curate(labels),
        );
        let (stack, samples) = (stack?, samples?);
        let table = FeatureExtractor::new(self.config.scale)
            .with_drop_masked(self.config.sampling.drop_masked)
            .extract(&stack, &samples)?;
        for (class, counts) in table.counts() {
            info!(
                "{class}: {} train rows, {} test rows",
                counts.train, counts.test
            );
        }
        Ok(PipelineOutput {
            stack,
            samples,
            table,
        })
    }

    /// Writes the stack and the feature table once both are prepared.
    ///
    /// Neither sink is called when either output fails to prepare.
    pub fn export(
        &self,
        output: &PipelineOutput,
        raster_sink: &mut dyn RasterSink,
        table_sink: &mut dyn TableSink,
    ) -> Result<()> {
        let adapter = ExportAdapter::new(&self.config.export, &self.config.roi);
        let raster = adapter.prepare_raster(&output.stack)?;
        let records = table_records(&output.table, &TABLE_COLUMNS)?;
        raster_sink.write_raster(&self.config.export.image_description, &raster)?;
        table_sink.write_table(&self.config.export.table_description, &TABLE_COLUMNS, &records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        components::{Band, Grid, PixelGeoTransform, Raster, Roi},
        config::DateRange,
        export::MemorySink,
        sensors::Sensor,
        sources::{MemoryCollection, MemoryElevation},
    };
    use chrono::NaiveDate;
    use geo::Coord;
    use ndarray::Array2;
    use rstest::{fixture, rstest};

    const CRS: &str = "EPSG:32644";

    #[fixture]
    fn config() -> PipelineConfig {
        let roi = Roi::new(CRS, [(0., 0.), (300., 0.), (300., 300.), (0., 300.)]).unwrap();
        let dates = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
        .unwrap();
        let mut config = PipelineConfig::new(roi, CRS, dates);
        config.sampling.label_crs = CRS.to_string();
        config.export.crs = CRS.to_string();
        config
    }

    fn raster(names: &[&str], value: f64) -> Raster {
        let transform = PixelGeoTransform::north_up(Coord { x: 0., y: 300. }, 30.);
        let grid = Grid::new(CRS, transform, (10, 10)).unwrap();
        let bands = names
            .iter()
            .map(|name| Band::from_values(*name, Array2::from_elem((10, 10), value)))
            .collect();
        Raster::new(grid, bands).unwrap()
    }

    #[rstest]
    fn unconfigured_collection_is_rejected(mut config: PipelineConfig) {
        config.collections = vec![Sensor::Landsat8.collection_id().to_string()];
        let pipeline = Pipeline::new(config).unwrap();
        let landsat9 = MemoryCollection::new(Sensor::Landsat9, vec![]);
        let elevation = MemoryElevation(raster(&["elevation"], 540.));
        let sources: [&dyn SceneSource; 1] = [&landsat9];
        let result = pipeline.analysis_stack(&sources, &elevation);
        assert!(matches!(
            result,
            Err(PipelineError::UnknownCollection(id)) if id == "LANDSAT/LC09/C02/T1_L2"
        ));
    }

    #[rstest]
    fn export_writes_nothing_when_table_is_incomplete(config: PipelineConfig) {
        let pipeline = Pipeline::new(config).unwrap();
        let output = PipelineOutput {
            stack: AnalysisStack::new(raster(&["B1", "B2"], 0.1)),
            samples: SampleSet::new(CRS, vec![]),
            table: FeatureTable::new(vec!["B1".to_string()], vec![]).unwrap(),
        };
        let mut rasters = MemorySink::default();
        let mut tables = MemorySink::default();
        let result = pipeline.export(&output, &mut rasters, &mut tables);
        assert!(matches!(result, Err(PipelineError::UnknownColumn(column)) if column == "B2"));
        assert!(rasters.rasters.is_empty());
        assert!(tables.tables.is_empty());
    }

    #[rstest]
    fn export_writes_nothing_over_capacity(mut config: PipelineConfig) {
        config.export.max_pixels = 4;
        let pipeline = Pipeline::new(config).unwrap();
        let output = PipelineOutput {
            stack: AnalysisStack::new(raster(&["B1"], 0.1)),
            samples: SampleSet::new(CRS, vec![]),
            table: FeatureTable::new(
                TABLE_COLUMNS[..14].iter().map(|name| name.to_string()).collect(),
                vec![],
            )
            .unwrap(),
        };
        let mut sink = MemorySink::default();
        let mut tables = MemorySink::default();
        assert!(matches!(
            pipeline.export(&output, &mut sink, &mut tables),
            Err(PipelineError::MaxPixelsExceeded { .. })
        ));
        assert!(sink.rasters.is_empty());
        assert!(tables.tables.is_empty());
    }
}
