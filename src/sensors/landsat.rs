use chrono::NaiveDate;
use std::str::FromStr;

use crate::{
    errors::{PipelineError, Result},
    sensors::{BandLayout, Sensor},
};

/// Landsat 8/9 OLI Collection 2 Level 2 surface reflectance.
pub const LANDSAT_C2_L2: BandLayout = BandLayout {
    qa_band: "QA_PIXEL",
    reflective_bands: [
        "SR_B1", "SR_B2", "SR_B3", "SR_B4", "SR_B5", "SR_B6", "SR_B7",
    ],
    scale: 2.75e-5,
    offset: -0.2,
    nodata: 0.,
};

/// Parsed `LXSS_LLLL_PPPRRR_YYYYMMDD_yyyymmdd_CC_TX` product id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductId {
    pub sensor: Sensor,
    pub level: String,
    pub path: u16,
    pub row: u16,
    pub acquired: NaiveDate,
    pub processed: NaiveDate,
    pub collection: u8,
    pub tier: String,
}

impl FromStr for ProductId {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || PipelineError::MalformedProductId(s.to_string());
        let fields: Vec<&str> = s.split('_').collect();
        let &[sensor, level, path_row, acquired, processed, collection, tier] = fields.as_slice() else {
            return Err(malformed());
        };
        let sensor = Sensor::from_product_prefix(sensor).ok_or_else(malformed)?;
        if path_row.len() != 6 {
            return Err(malformed());
        }
        let path = path_row[..3].parse().map_err(|_| malformed())?;
        let row = path_row[3..].parse().map_err(|_| malformed())?;
        let parse_date =
            |date: &str| NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| malformed());
        Ok(Self {
            sensor,
            level: level.to_string(),
            path,
            row,
            acquired: parse_date(acquired)?,
            processed: parse_date(processed)?,
            collection: collection.parse().map_err(|_| malformed())?,
            tier: tier.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn parses_landsat9_id() {
        let id: ProductId = "LC09_L2SP_141055_20240307_20240309_02_T1".parse().unwrap();
        assert_eq!(id.sensor, Sensor::Landsat9);
        assert_eq!((id.path, id.row), (141, 55));
        assert_eq!(id.acquired, NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
        assert_eq!(id.processed, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        assert_eq!(id.collection, 2);
        assert_eq!(id.tier, "T1");
    }

    #[rstest]
    #[case("LC08_L2SP_141055_20240307_20240309_02")]
    #[case("LT05_L2SP_141055_20240307_20240309_02_T1")]
    #[case("LC08_L2SP_14105_20240307_20240309_02_T1")]
    #[case("LC08_L2SP_141055_20241307_20240309_02_T1")]
    fn rejects_malformed_ids(#[case] id: &str) {
        assert!(matches!(
            id.parse::<ProductId>(),
            Err(PipelineError::MalformedProductId(_))
        ));
    }
}
