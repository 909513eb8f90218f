use geo::{Area, BoundingRect, Coord, Intersects, Line, LineString, Polygon, Rect};
use serde::{Deserialize, Serialize};
use shrinkwraprs::Shrinkwrap;

use crate::{
    crs_geo::CrsGeometry,
    errors::{PipelineError, Result},
};

pub const GEOGRAPHIC_CRS: &str = "EPSG:4326";

#[derive(Serialize, Deserialize)]
struct RoiDef {
    #[serde(default = "default_crs")]
    crs: String,
    vertices: Vec<[f64; 2]>,
}

fn default_crs() -> String {
    GEOGRAPHIC_CRS.to_string()
}

/// Region of interest: a simple closed polygon.
///
/// Bounds every raster query and clips composite output.
#[derive(Shrinkwrap, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RoiDef", into = "RoiDef")]
pub struct Roi(CrsGeometry<Polygon>);

impl TryFrom<RoiDef> for Roi {
    type Error = PipelineError;
    fn try_from(value: RoiDef) -> Result<Self> {
        Roi::new(value.crs, value.vertices.into_iter().map(|[x, y]| (x, y)))
    }
}

impl From<Roi> for RoiDef {
    fn from(value: Roi) -> Self {
        let crs = value.crs().to_string();
        let exterior = value.0.into_geometry().into_inner().0;
        let mut vertices: Vec<[f64; 2]> = exterior.0.iter().map(|coord| [coord.x, coord.y]).collect();
        vertices.pop();
        RoiDef { crs, vertices }
    }
}

impl Roi {
    /// Vertices in ring order; the ring is closed implicitly.
    pub fn new(crs: impl AsRef<str>, vertices: impl IntoIterator<Item = (f64, f64)>) -> Result<Self> {
        let mut coords: Vec<Coord> = vertices.into_iter().map(Coord::from).collect();
        if coords.iter().any(|coord| !(coord.x.is_finite() && coord.y.is_finite())) {
            return Err(PipelineError::MalformedGeometry(
                "region of interest has non finite vertices".into(),
            ));
        }
        coords.dedup();
        if coords.len() > 1 && coords.first() == coords.last() {
            coords.pop();
        }
        if coords.len() < 3 {
            return Err(PipelineError::MalformedGeometry(format!(
                "region of interest needs at least 3 distinct vertices, got {}",
                coords.len()
            )));
        }
        let polygon = Polygon::new(LineString::from(coords), vec![]);
        if polygon.unsigned_area() == 0. {
            return Err(PipelineError::MalformedGeometry(
                "region of interest has no area".into(),
            ));
        }
        if is_self_intersecting(&polygon) {
            return Err(PipelineError::MalformedGeometry(
                "region of interest is self intersecting".into(),
            ));
        }
        Ok(Self(CrsGeometry::new(crs.as_ref(), polygon)))
    }

    pub fn polygon(&self) -> &Polygon {
        self.0.geometry()
    }

    pub fn polygon_in(&self, crs: &str) -> Result<Polygon> {
        Ok(self.0.projected_geometry(crs)?)
    }

    pub fn bounds_in(&self, crs: &str) -> Result<Rect> {
        self.polygon_in(crs)?
            .bounding_rect()
            .ok_or_else(|| PipelineError::MalformedGeometry("empty region of interest".into()))
    }
}

fn is_self_intersecting(polygon: &Polygon) -> bool {
    let edges: Vec<Line> = polygon.exterior().lines().collect();
    let last = edges.len() - 1;
    edges.iter().enumerate().any(|(i, edge)| {
        edges
            .iter()
            .enumerate()
            .skip(i + 2)
            .filter(|(j, _)| !(i == 0 && *j == last))
            .any(|(_, other)| edge.intersects(other))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn ring_is_closed_implicitly() {
        let roi = Roi::new(GEOGRAPHIC_CRS, [(80., 7.), (80.1, 7.), (80.1, 7.1), (80., 7.1)]).unwrap();
        assert_eq!(roi.polygon().exterior().0.len(), 5);
        assert!(roi.polygon().exterior().is_closed());
        let closed =
            Roi::new(GEOGRAPHIC_CRS, [(80., 7.), (80.1, 7.), (80.1, 7.1), (80., 7.1), (80., 7.)])
                .unwrap();
        assert_eq!(roi, closed);
    }

    #[rstest]
    #[case(vec![(0., 0.), (1., 1.)])]
    #[case(vec![(0., 0.), (1., 1.), (2., 2.)])]
    #[case(vec![(0., 0.), (1., 1.), (1., 0.), (0., 1.)])]
    #[case(vec![(0., 0.), (f64::NAN, 1.), (1., 0.)])]
    fn malformed_regions(#[case] vertices: Vec<(f64, f64)>) {
        assert!(matches!(
            Roi::new(GEOGRAPHIC_CRS, vertices),
            Err(PipelineError::MalformedGeometry(_))
        ));
    }

    #[rstest]
    fn bounds_in_own_crs() {
        let roi = Roi::new("EPSG:32644", [(0., 0.), (90., 0.), (90., 60.)]).unwrap();
        assert_eq!(roi.bounds_in("EPSG:32644").unwrap(), Rect::new((0., 0.), (90., 60.)));
    }

    #[rstest]
    fn deserialize_from_vertices() {
        let roi: Roi = serde_json::from_str(
            r#"{"crs": "EPSG:32644", "vertices": [[0, 0], [90, 0], [90, 60]]}"#,
        )
        .unwrap();
        assert_eq!(roi.crs(), "EPSG:32644");
        let json = serde_json::to_value(&roi).unwrap();
        assert_eq!(json["vertices"].as_array().unwrap().len(), 3);
        let bowtie = serde_json::from_str::<Roi>(r#"{"vertices": [[0, 0], [1, 1], [1, 0], [0, 1]]}"#);
        assert!(bowtie.is_err());
    }
}
