pub mod grid;
pub mod raster;
pub mod roi;
pub mod scene;

pub use grid::{Grid, PixelGeoTransform, PixelWindow};
pub use raster::{Band, Raster};
pub use roi::Roi;
pub use scene::Scene;
