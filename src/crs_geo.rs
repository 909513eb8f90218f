use std::sync::Arc;

use geo::{Coord, MapCoords};
use proj::Proj;
use shrinkwraprs::Shrinkwrap;

#[derive(thiserror::Error, Debug)]
pub enum CrsGeometryError {
    #[error(transparent)]
    ProjError(#[from] proj::ProjError),
    #[error(transparent)]
    ProjCreateError(#[from] proj::ProjCreateError),
}

/// Geometry tagged with the crs its coordinates are expressed in.
#[derive(Shrinkwrap, Debug, Clone, PartialEq)]
pub struct CrsGeometry<G> {
    crs: Arc<str>,
    #[shrinkwrap(main_field)]
    geometry: G,
}

impl<G> CrsGeometry<G> {
    pub fn new(crs: impl Into<Arc<str>>, geometry: G) -> Self {
        Self {
            crs: crs.into(),
            geometry,
        }
    }

    pub fn crs(&self) -> &str {
        self.crs.as_ref()
    }

    pub fn geometry(&self) -> &G {
        &self.geometry
    }

    pub fn into_geometry(self) -> G {
        self.geometry
    }
}

impl<G: MapCoords<f64, f64, Output = G> + Clone> CrsGeometry<G> {
    pub fn with_crs(self, crs: &str) -> Result<Self, CrsGeometryError> {
        let geometry = self.projected_geometry(crs)?;
        Ok(Self::new(crs, geometry))
    }

    /// Clones if crs is same.
    pub fn projected_geometry(&self, crs: &str) -> Result<G, CrsGeometryError> {
        Reprojector::new(self.crs(), crs)?.geometry(&self.geometry)
    }
}

/// Coordinate conversion between two crs, a no-op when both are equal.
pub struct Reprojector(Option<Proj>);

impl std::fmt::Debug for Reprojector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Reprojector")
            .field(&self.0.as_ref().map(|_| "proj"))
            .finish()
    }
}

impl Reprojector {
    pub fn new(from: &str, to: &str) -> Result<Self, CrsGeometryError> {
        if from.eq(to) {
            Ok(Self(None))
        } else {
            Ok(Self(Some(Proj::new_known_crs(from, to, None)?)))
        }
    }

    pub fn is_identity(&self) -> bool {
        self.0.is_none()
    }

    pub fn coord(&self, coord: Coord) -> Result<Coord, CrsGeometryError> {
        match &self.0 {
            None => Ok(coord),
            Some(proj) => {
                let (x, y) = proj.convert((coord.x, coord.y))?;
                Ok(Coord { x, y })
            }
        }
    }

    pub fn geometry<G: MapCoords<f64, f64, Output = G> + Clone>(
        &self,
        geometry: &G,
    ) -> Result<G, CrsGeometryError> {
        match self.0 {
            None => Ok(geometry.clone()),
            Some(_) => geometry.try_map_coords(|coord| self.coord(coord)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, polygon};

    #[test]
    fn same_crs_is_identity() {
        let geometry = CrsGeometry::new("EPSG:32644", point!(x: 500_000., y: 800_000.));
        let reprojector = Reprojector::new("EPSG:32644", "EPSG:32644").unwrap();
        assert!(reprojector.is_identity());
        assert_eq!(
            geometry.projected_geometry("EPSG:32644").unwrap(),
            *geometry.geometry()
        );
    }

    #[test]
    fn with_crs_keeps_geometry_when_crs_matches() {
        let square = polygon![(x: 0., y: 0.), (x: 1., y: 0.), (x: 1., y: 1.), (x: 0., y: 1.)];
        let geometry = CrsGeometry::new("EPSG:4326", square.clone());
        let same = geometry.with_crs("EPSG:4326").unwrap();
        assert_eq!(same.crs(), "EPSG:4326");
        assert_eq!(*same, square);
    }

    #[test]
    fn geographic_to_utm_and_back() {
        let forward = Reprojector::new("EPSG:4326", "EPSG:32644").unwrap();
        assert!(!forward.is_identity());
        let utm = forward.coord(Coord { x: 80.75, y: 7.25 }).unwrap();
        assert!((utm.x - 472_402.115).abs() < 1., "easting {}", utm.x);
        assert!((utm.y - 801_393.245).abs() < 1., "northing {}", utm.y);

        let back = Reprojector::new("EPSG:32644", "EPSG:4326")
            .unwrap()
            .coord(utm)
            .unwrap();
        assert!((back.x - 80.75).abs() < 1e-7 && (back.y - 7.25).abs() < 1e-7, "{back:?}");
    }
}
