use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::errors::{PipelineError, Result};

/// Land cover classes with stable codes.
///
/// Code 10 is reserved and never populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum LandCoverClass {
    BuiltUp = 1,
    Bareland = 2,
    Water = 3,
    Wetland = 4,
    RicePaddy = 5,
    TeaPlantation = 6,
    Shrubland = 7,
    Forest = 8,
    OtherPlantation = 9,
}

impl LandCoverClass {
    pub const ALL: [LandCoverClass; 9] = [
        LandCoverClass::BuiltUp,
        LandCoverClass::Bareland,
        LandCoverClass::Water,
        LandCoverClass::Wetland,
        LandCoverClass::RicePaddy,
        LandCoverClass::TeaPlantation,
        LandCoverClass::Shrubland,
        LandCoverClass::Forest,
        LandCoverClass::OtherPlantation,
    ];

    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|class| class.code() == code)
            .ok_or(PipelineError::UnknownClass(code))
    }

    pub fn name(self) -> &'static str {
        match self {
            LandCoverClass::BuiltUp => "Built-up",
            LandCoverClass::Bareland => "Bareland",
            LandCoverClass::Water => "Water",
            LandCoverClass::Wetland => "Wetland",
            LandCoverClass::RicePaddy => "Rice paddy",
            LandCoverClass::TeaPlantation => "Tea plantation",
            LandCoverClass::Shrubland => "Shrubland",
            LandCoverClass::Forest => "Forest",
            LandCoverClass::OtherPlantation => "Other Plantation",
        }
    }

    /// Display color as `RRGGBB`.
    pub fn color(self) -> &'static str {
        match self {
            LandCoverClass::BuiltUp => "F08080",
            LandCoverClass::Bareland => "D2B48C",
            LandCoverClass::Water => "87CEFA",
            LandCoverClass::Wetland => "008080",
            LandCoverClass::RicePaddy => "90EE90",
            LandCoverClass::TeaPlantation => "228B22",
            LandCoverClass::Shrubland => "808000",
            LandCoverClass::Forest => "006400",
            LandCoverClass::OtherPlantation => "FF8C00",
        }
    }
}

impl TryFrom<i64> for LandCoverClass {
    type Error = PipelineError;
    fn try_from(code: i64) -> Result<Self> {
        Self::from_code(code)
    }
}

impl From<LandCoverClass> for i64 {
    fn from(class: LandCoverClass) -> Self {
        class.code()
    }
}

impl Display for LandCoverClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn codes_are_stable() {
        let codes: Vec<i64> = LandCoverClass::ALL.iter().map(|class| class.code()).collect();
        assert_eq!(codes, (1..=9).collect::<Vec<_>>());
    }

    #[rstest]
    #[case(3, Some(LandCoverClass::Water))]
    #[case(9, Some(LandCoverClass::OtherPlantation))]
    #[case(10, None)]
    #[case(0, None)]
    fn from_code(#[case] code: i64, #[case] expected: Option<LandCoverClass>) {
        match expected {
            Some(class) => assert_eq!(LandCoverClass::from_code(code).unwrap(), class),
            None => assert!(matches!(
                LandCoverClass::from_code(code),
                Err(PipelineError::UnknownClass(c)) if c == code
            )),
        }
    }

    #[test]
    fn serde_uses_codes() {
        assert_eq!(serde_json::to_string(&LandCoverClass::Forest).unwrap(), "8");
        assert!(serde_json::from_str::<LandCoverClass>("10").is_err());
    }

    #[rstest]
    #[case(LandCoverClass::Water, "87CEFA")]
    #[case(LandCoverClass::Forest, "006400")]
    #[case(LandCoverClass::OtherPlantation, "FF8C00")]
    fn palette_colors(#[case] class: LandCoverClass, #[case] expected: &str) {
        assert_eq!(class.color(), expected);
    }

    #[test]
    fn palette_is_distinct_hex() {
        let colors: std::collections::HashSet<&str> =
            LandCoverClass::ALL.iter().map(|class| class.color()).collect();
        assert_eq!(colors.len(), 9);
        for color in colors {
            assert_eq!(color.len(), 6);
            assert!(u32::from_str_radix(color, 16).is_ok(), "{color}");
        }
    }
}
