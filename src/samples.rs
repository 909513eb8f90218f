//! Labelled sample regions and their train/test partition.
//!
//! Every label point is buffered into a small polygon in the working crs and
//! tagged by a uniform draw from a per class random stream, so the split of
//! one class never depends on how many points the other classes have.

use geo::{Coord, LineString, Polygon};
use itertools::Itertools;
use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, f64::consts::PI, fmt::Display, fs, path::Path, sync::Arc};

use crate::{
    components::roi::GEOGRAPHIC_CRS,
    config::SamplingConfig,
    crs_geo::Reprojector,
    errors::{PipelineError, Result},
    taxonomy::LandCoverClass,
};

/// Labelled location, coordinates in the label crs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelPoint {
    pub location: Coord,
    pub class: LandCoverClass,
}

impl LabelPoint {
    pub fn new(x: f64, y: f64, class: LandCoverClass) -> Self {
        Self {
            location: Coord { x, y },
            class,
        }
    }
}

#[derive(Deserialize)]
struct LabelRecord {
    lon: f64,
    lat: f64,
    classvalue: i64,
}

/// Label points from a csv with `lon,lat,classvalue` columns.
pub fn read_labels(reader: impl std::io::Read) -> Result<Vec<LabelPoint>> {
    csv::Reader::from_reader(reader)
        .deserialize::<LabelRecord>()
        .map(|record| {
            let record = record?;
            if !(record.lon.is_finite() && record.lat.is_finite()) {
                return Err(PipelineError::MalformedGeometry(format!(
                    "label point ({}, {}) is not finite",
                    record.lon, record.lat
                )));
            }
            Ok(LabelPoint::new(
                record.lon,
                record.lat,
                LandCoverClass::from_code(record.classvalue)?,
            ))
        })
        .collect()
}

pub fn read_labels_path(path: impl AsRef<Path>) -> Result<Vec<LabelPoint>> {
    read_labels(fs::File::open(path)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleTag {
    Train,
    Test,
}

impl SampleTag {
    pub fn as_str(self) -> &'static str {
        match self {
            SampleTag::Train => "train",
            SampleTag::Test => "test",
        }
    }
}

impl Display for SampleTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Buffered label point with its draw and partition tag.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassSampleRegion {
    pub polygon: Polygon,
    pub class: LandCoverClass,
    pub random: f64,
    pub sample: SampleTag,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitCounts {
    pub train: usize,
    pub test: usize,
}

impl SplitCounts {
    pub fn add(&mut self, tag: SampleTag) {
        match tag {
            SampleTag::Train => self.train += 1,
            SampleTag::Test => self.test += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.train + self.test
    }
}

/// Regions of every class, grouped by class in code order.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSet {
    crs: Arc<str>,
    regions: Vec<ClassSampleRegion>,
}

impl SampleSet {
    pub fn new(crs: impl Into<Arc<str>>, regions: Vec<ClassSampleRegion>) -> Self {
        Self {
            crs: crs.into(),
            regions,
        }
    }

    /// Crs of the region polygons.
    pub fn crs(&self) -> &str {
        &self.crs
    }

    pub fn regions(&self) -> &[ClassSampleRegion] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn tagged(&self, tag: SampleTag) -> impl Iterator<Item = &ClassSampleRegion> {
        self.regions.iter().filter(move |region| region.sample == tag)
    }

    pub fn counts(&self) -> BTreeMap<LandCoverClass, SplitCounts> {
        let mut counts: BTreeMap<LandCoverClass, SplitCounts> = BTreeMap::new();
        for region in &self.regions {
            counts.entry(region.class).or_default().add(region.sample);
        }
        counts
    }
}

/// Circle of `radius` around `center` approximated by `segments` vertices.
pub fn buffer_point(center: Coord, radius: f64, segments: usize) -> Polygon {
    let n = segments.max(4);
    let ring: Vec<Coord> = (0..=n)
        .map(|i| {
            let angle = 2. * PI * (i % n) as f64 / n as f64;
            Coord {
                x: center.x + radius * angle.cos(),
                y: center.y + radius * angle.sin(),
            }
        })
        .collect();
    Polygon::new(LineString::from(ring), vec![])
}

/// Seed of the random stream of `class`, derived from the global seed.
pub fn class_seed(seed: u64, class: LandCoverClass) -> u64 {
    seed ^ (class.code() as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

pub struct SampleCurator<'a> {
    config: &'a SamplingConfig,
    working_crs: &'a str,
}

impl<'a> SampleCurator<'a> {
    pub fn new(config: &'a SamplingConfig, working_crs: &'a str) -> Self {
        Self {
            config,
            working_crs,
        }
    }

    /// Buffers and partitions `labels`, class by class.
    ///
    /// Geographic labels must lie within longitude -180..180 and latitude -90..90.
    pub fn curate(&self, labels: &[LabelPoint]) -> Result<SampleSet> {
        if self.config.label_crs == GEOGRAPHIC_CRS {
            if let Some(label) = labels.iter().find(|label| {
                !((-180. ..=180.).contains(&label.location.x)
                    && (-90. ..=90.).contains(&label.location.y))
            }) {
                return Err(PipelineError::MalformedGeometry(format!(
                    "label point ({}, {}) is outside longitude/latitude range",
                    label.location.x, label.location.y
                )));
            }
        }
        let reprojector = Reprojector::new(&self.config.label_crs, self.working_crs)?;
        let by_class = labels
            .iter()
            .map(|label| -> Result<(LandCoverClass, Coord)> {
                Ok((label.class, reprojector.coord(label.location)?))
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .into_group_map();
        let regions: Vec<ClassSampleRegion> = LandCoverClass::ALL
            .par_iter()
            .map(|class| match by_class.get(class) {
                Some(centers) => self.partition(*class, centers),
                None => Vec::new(),
            })
            .flatten()
            .collect();
        let set = SampleSet::new(self.working_crs, regions);
        for (class, counts) in set.counts() {
            info!(
                "class {} {class}: {} train, {} test",
                class.code(),
                counts.train,
                counts.test
            );
        }
        Ok(set)
    }

    fn partition(&self, class: LandCoverClass, centers: &[Coord]) -> Vec<ClassSampleRegion> {
        let mut rng = StdRng::seed_from_u64(class_seed(self.config.seed, class));
        centers
            .iter()
            .map(|center| {
                let random: f64 = rng.gen();
                let sample = if random <= self.config.train_fraction {
                    SampleTag::Train
                } else {
                    SampleTag::Test
                };
                ClassSampleRegion {
                    polygon: buffer_point(
                        *center,
                        self.config.buffer_radius,
                        self.config.buffer_segments,
                    ),
                    class,
                    random,
                    sample,
                }
            })
            .collect()
    }
}
