use std::sync::Arc;

use geo::{AffineTransform, Coord, Intersects, Polygon, Rect};
use ndarray::Array2;
use rayon::prelude::*;
use shrinkwraprs::Shrinkwrap;

use crate::{
    crs_geo::Reprojector,
    errors::{PipelineError, Result},
    intersection::{Intersection, IntersectionError},
};

/// Transform from pixel `(col, row)` space to crs coordinates.
#[derive(Shrinkwrap, Debug, Clone, Copy, PartialEq)]
pub struct PixelGeoTransform(AffineTransform);

impl PixelGeoTransform {
    /// From a gdal `[xoff, a, b, yoff, d, e]` transform.
    pub fn from_gdal(gdal_transform: [f64; 6]) -> Self {
        Self(AffineTransform::new(
            gdal_transform[1],
            gdal_transform[2],
            gdal_transform[0],
            gdal_transform[4],
            gdal_transform[5],
            gdal_transform[3],
        ))
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.xoff(),
            self.a(),
            self.b(),
            self.yoff(),
            self.d(),
            self.e(),
        ]
    }

    /// North up transform with square pixels and `origin` at the top left corner.
    pub fn north_up(origin: Coord, pixel_size: f64) -> Self {
        Self(AffineTransform::new(
            pixel_size, 0., origin.x, 0., -pixel_size, origin.y,
        ))
    }

    /// Pixel size along x and y.
    pub fn resolution(&self) -> (f64, f64) {
        (self.a().hypot(self.d()), self.b().hypot(self.e()))
    }
}

/// Pixel window of a [Grid], `x` along columns and `y` along rows.
#[derive(Shrinkwrap, Debug, Clone, Copy, PartialEq)]
pub struct PixelWindow(Rect<usize>);

impl PixelWindow {
    /// (col, row) of the top left pixel.
    pub fn offset(&self) -> (usize, usize) {
        self.0.min().x_y()
    }

    /// (cols, rows), the order gdal reads windows in.
    pub fn size(&self) -> (usize, usize) {
        (self.0.width(), self.0.height())
    }
}

/// Georeferenced pixel lattice shared by all bands of a raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    crs: Arc<str>,
    transform: PixelGeoTransform,
    inverse: AffineTransform,
    /// (rows, cols)
    shape: (usize, usize),
}

impl Grid {
    pub fn new(
        crs: impl Into<Arc<str>>,
        transform: PixelGeoTransform,
        shape: (usize, usize),
    ) -> Result<Self> {
        let inverse = transform.inverse().ok_or_else(|| {
            PipelineError::MalformedGeometry(format!("transform {transform:?} is not invertible"))
        })?;
        Ok(Self {
            crs: crs.into(),
            transform,
            inverse,
            shape,
        })
    }

    /// Smallest north up grid with `scale` sized pixels snapped to multiples
    /// of `scale` that covers `bounds`.
    pub fn covering(bounds: &Rect, crs: impl Into<Arc<str>>, scale: f64) -> Result<Self> {
        if !(scale.is_finite() && scale > 0.) {
            return Err(PipelineError::InvalidConfig(format!(
                "scale must be positive, got {scale}"
            )));
        }
        let min_x = (bounds.min().x / scale).floor() * scale;
        let max_y = (bounds.max().y / scale).ceil() * scale;
        let cols = (((bounds.max().x - min_x) / scale).ceil() as usize).max(1);
        let rows = (((max_y - bounds.min().y) / scale).ceil() as usize).max(1);
        let transform = PixelGeoTransform::north_up(Coord { x: min_x, y: max_y }, scale);
        Self::new(crs, transform, (rows, cols))
    }

    pub fn crs(&self) -> &str {
        self.crs.as_ref()
    }

    pub fn transform(&self) -> &PixelGeoTransform {
        &self.transform
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn rows(&self) -> usize {
        self.shape.0
    }

    pub fn cols(&self) -> usize {
        self.shape.1
    }

    pub fn len(&self) -> usize {
        self.shape.0 * self.shape.1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pixel_center(&self, row: usize, col: usize) -> Coord {
        self.transform.apply(Coord {
            x: col as f64 + 0.5,
            y: row as f64 + 0.5,
        })
    }

    /// `[row, col]` of the pixel containing `coord`.
    pub fn pixel_of(&self, coord: Coord) -> Option<[usize; 2]> {
        let pixel = self.inverse.apply(coord);
        let (col, row) = (pixel.x.floor(), pixel.y.floor());
        if col < 0. || row < 0. || !col.is_finite() || !row.is_finite() {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        (row < self.rows() && col < self.cols()).then_some([row, col])
    }

    /// Extent in crs coordinates.
    pub fn bounds(&self) -> Rect {
        let (rows, cols) = (self.rows() as f64, self.cols() as f64);
        let corners = [(0., 0.), (cols, 0.), (0., rows), (cols, rows)]
            .map(|(x, y)| self.transform.apply(Coord { x, y }));
        let (mut min, mut max) = (corners[0], corners[0]);
        for corner in &corners[1..] {
            min = Coord {
                x: min.x.min(corner.x),
                y: min.y.min(corner.y),
            };
            max = Coord {
                x: max.x.max(corner.x),
                y: max.y.max(corner.y),
            };
        }
        Rect::new(min, max)
    }

    pub fn footprint(&self) -> Polygon {
        self.bounds().to_polygon()
    }

    /// Window of pixels touching `bounds` (given in this grid's crs).
    ///
    /// Bounds that only share an edge with the grid have no window.
    pub fn window(&self, bounds: &Rect) -> Result<PixelWindow> {
        let corners = [
            bounds.min(),
            bounds.max(),
            Coord {
                x: bounds.min().x,
                y: bounds.max().y,
            },
            Coord {
                x: bounds.max().x,
                y: bounds.min().y,
            },
        ]
        .map(|corner| self.inverse.apply(corner));
        let min = corners.iter().fold(corners[0], |acc, c| Coord {
            x: acc.x.min(c.x),
            y: acc.y.min(c.y),
        });
        let max = corners.iter().fold(corners[0], |acc, c| Coord {
            x: acc.x.max(c.x),
            y: acc.y.max(c.y),
        });
        let full = Rect::new((0., 0.), (self.cols() as f64, self.rows() as f64));
        let pixels = Rect::new(min, max).intersection(&full)?;
        if pixels.width() <= 0. || pixels.height() <= 0. {
            return Err(IntersectionError::NoIntersection.into());
        }
        let min = Coord {
            x: pixels.min().x.floor() as usize,
            y: pixels.min().y.floor() as usize,
        };
        if min.x >= self.cols() || min.y >= self.rows() {
            return Err(IntersectionError::NoIntersection.into());
        }
        let max = Coord {
            x: (pixels.max().x.ceil() as usize).max(min.x + 1).min(self.cols()),
            y: (pixels.max().y.ceil() as usize).max(min.y + 1).min(self.rows()),
        };
        Ok(PixelWindow(Rect::new(min, max)))
    }

    /// Grid restricted to `window`.
    pub fn sub_grid(&self, window: &PixelWindow) -> Result<Self> {
        let (col, row) = window.offset();
        let origin = self.transform.apply(Coord {
            x: col as f64,
            y: row as f64,
        });
        let transform = PixelGeoTransform(AffineTransform::new(
            self.transform.a(),
            self.transform.b(),
            origin.x,
            self.transform.d(),
            self.transform.e(),
            origin.y,
        ));
        let (cols, rows) = window.size();
        Self::new(Arc::clone(&self.crs), transform, (rows, cols))
    }

    /// Pixels whose centre lies inside or on `polygon` (given in this grid's crs).
    pub fn coverage(&self, polygon: &Polygon) -> Result<Array2<bool>> {
        let cols = self.cols();
        let inside: Vec<bool> = (0..self.len())
            .into_par_iter()
            .map(|idx| polygon.intersects(&self.pixel_center(idx / cols, idx % cols)))
            .collect();
        Ok(Array2::from_shape_vec(self.shape, inside)?)
    }

    /// For every pixel of this grid, the nearest `[row, col]` of `source`.
    pub fn nearest_in(&self, source: &Grid) -> Result<Vec<Option<[usize; 2]>>> {
        let cols = self.cols();
        let reprojector = Reprojector::new(self.crs(), source.crs())?;
        if reprojector.is_identity() {
            Ok((0..self.len())
                .into_par_iter()
                .map(|idx| source.pixel_of(self.pixel_center(idx / cols, idx % cols)))
                .collect())
        } else {
            (0..self.len())
                .map(|idx| {
                    let center = reprojector.coord(self.pixel_center(idx / cols, idx % cols))?;
                    Ok(source.pixel_of(center))
                })
                .collect()
        }
    }
}
