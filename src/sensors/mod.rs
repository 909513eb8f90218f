mod landsat;
pub use landsat::{ProductId, LANDSAT_C2_L2};

use crate::errors::{PipelineError, Result};

/// Band naming and digital number encoding of a surface reflectance product.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandLayout {
    pub qa_band: &'static str,
    /// Reflective bands in canonical `B1..B7` order.
    pub reflective_bands: [&'static str; 7],
    pub scale: f64,
    pub offset: f64,
    /// Nodata value of the reflective and QA files.
    pub nodata: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Sensor {
    Landsat8,
    Landsat9,
}

impl Sensor {
    pub const ALL: [Sensor; 2] = [Sensor::Landsat8, Sensor::Landsat9];

    pub fn collection_id(&self) -> &'static str {
        match self {
            Sensor::Landsat8 => "LANDSAT/LC08/C02/T1_L2",
            Sensor::Landsat9 => "LANDSAT/LC09/C02/T1_L2",
        }
    }

    /// Leading field of the product id.
    pub fn product_prefix(&self) -> &'static str {
        match self {
            Sensor::Landsat8 => "LC08",
            Sensor::Landsat9 => "LC09",
        }
    }

    pub fn layout(&self) -> &'static BandLayout {
        &LANDSAT_C2_L2
    }

    pub fn from_collection_id(collection_id: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|sensor| sensor.collection_id() == collection_id)
            .ok_or_else(|| PipelineError::UnknownCollection(collection_id.to_string()))
    }

    pub fn from_product_prefix(prefix: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|sensor| sensor.product_prefix() == prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("LANDSAT/LC08/C02/T1_L2", Sensor::Landsat8)]
    #[case("LANDSAT/LC09/C02/T1_L2", Sensor::Landsat9)]
    fn known_collections(#[case] collection_id: &str, #[case] sensor: Sensor) {
        assert_eq!(Sensor::from_collection_id(collection_id).unwrap(), sensor);
    }

    #[rstest]
    fn unknown_collection() {
        assert!(matches!(
            Sensor::from_collection_id("COPERNICUS/S2_SR"),
            Err(PipelineError::UnknownCollection(_))
        ));
    }
}
