//! Spectral indices as a compiled formula table.
//!
//! Formulas read a [Reflectance] record through the symbolic band names
//! (BLUE, GREEN, RED, NIR, SWIR1, SWIR2); a [BandBinding] says which raster
//! band backs each symbol.

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{
    components::{Band, Raster},
    errors::Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpectralBand {
    Blue,
    Green,
    Red,
    Nir,
    Swir1,
    Swir2,
}

impl SpectralBand {
    pub const ALL: [SpectralBand; 6] = [
        SpectralBand::Blue,
        SpectralBand::Green,
        SpectralBand::Red,
        SpectralBand::Nir,
        SpectralBand::Swir1,
        SpectralBand::Swir2,
    ];
}

/// Concrete band behind each symbolic band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", default)]
pub struct BandBinding {
    pub blue: String,
    pub green: String,
    pub red: String,
    pub nir: String,
    pub swir1: String,
    pub swir2: String,
}

impl Default for BandBinding {
    fn default() -> Self {
        Self {
            blue: "B2".to_string(),
            green: "B3".to_string(),
            red: "B4".to_string(),
            nir: "B5".to_string(),
            swir1: "B6".to_string(),
            swir2: "B7".to_string(),
        }
    }
}

impl BandBinding {
    pub fn band(&self, symbol: SpectralBand) -> &str {
        match symbol {
            SpectralBand::Blue => &self.blue,
            SpectralBand::Green => &self.green,
            SpectralBand::Red => &self.red,
            SpectralBand::Nir => &self.nir,
            SpectralBand::Swir1 => &self.swir1,
            SpectralBand::Swir2 => &self.swir2,
        }
    }
}

/// Values of the symbolic bands at one pixel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Reflectance {
    pub blue: f64,
    pub green: f64,
    pub red: f64,
    pub nir: f64,
    pub swir1: f64,
    pub swir2: f64,
}

impl Reflectance {
    fn set(&mut self, symbol: SpectralBand, value: f64) {
        match symbol {
            SpectralBand::Blue => self.blue = value,
            SpectralBand::Green => self.green = value,
            SpectralBand::Red => self.red = value,
            SpectralBand::Nir => self.nir = value,
            SpectralBand::Swir1 => self.swir1 = value,
            SpectralBand::Swir2 => self.swir2 = value,
        }
    }
}

/// Ratio index producing one band named `name`.
///
/// Only `inputs` are read, so only their masks propagate to the output.
#[derive(Debug, Clone, Copy)]
pub struct IndexFormula {
    pub name: &'static str,
    pub inputs: &'static [SpectralBand],
    pub numerator: fn(&Reflectance) -> f64,
    pub denominator: fn(&Reflectance) -> f64,
}

impl IndexFormula {
    /// `None` when the denominator is exactly zero.
    pub fn evaluate(&self, pixel: &Reflectance) -> Option<f64> {
        let denominator = (self.denominator)(pixel);
        if denominator == 0. {
            None
        } else {
            Some((self.numerator)(pixel) / denominator)
        }
    }
}

use SpectralBand::{Blue, Green, Nir, Red, Swir1, Swir2};

pub const INDEX_FORMULAS: [IndexFormula; 6] = [
    IndexFormula {
        name: "EVI",
        inputs: &[Nir, Red, Blue],
        numerator: |p| 2.5 * (p.nir - p.red),
        denominator: |p| p.nir + 6. * p.red - 7.5 * p.blue + 1.,
    },
    IndexFormula {
        name: "NBR",
        inputs: &[Nir, Swir2],
        numerator: |p| p.nir - p.swir2,
        denominator: |p| p.nir + p.swir2,
    },
    IndexFormula {
        name: "NDMI",
        inputs: &[Nir, Swir1],
        numerator: |p| p.nir - p.swir1,
        denominator: |p| p.nir + p.swir1,
    },
    IndexFormula {
        name: "NDWI",
        inputs: &[Green, Nir],
        numerator: |p| p.green - p.nir,
        denominator: |p| p.green + p.nir,
    },
    IndexFormula {
        name: "NDBI",
        inputs: &[Swir1, Nir],
        numerator: |p| p.swir1 - p.nir,
        denominator: |p| p.swir1 + p.nir,
    },
    IndexFormula {
        name: "NDBaI",
        inputs: &[Swir1, Swir2],
        numerator: |p| p.swir1 - p.swir2,
        denominator: |p| p.swir1 + p.swir2,
    },
];

pub fn index_names() -> impl Iterator<Item = &'static str> {
    INDEX_FORMULAS.iter().map(|formula| formula.name)
}

/// Evaluates a formula table over a raster.
#[derive(Debug, Clone)]
pub struct IndexEngine<'a> {
    binding: &'a BandBinding,
    formulas: &'a [IndexFormula],
}

impl<'a> IndexEngine<'a> {
    pub fn new(binding: &'a BandBinding) -> Self {
        Self {
            binding,
            formulas: &INDEX_FORMULAS,
        }
    }

    pub fn with_formulas(mut self, formulas: &'a [IndexFormula]) -> Self {
        self.formulas = formulas;
        self
    }

    /// One band per formula on the grid of `raster`.
    pub fn compute(&self, raster: &Raster) -> Result<Raster> {
        let mut bound: HashMap<SpectralBand, &Band> = HashMap::new();
        for symbol in self.formulas.iter().flat_map(|formula| formula.inputs) {
            if !bound.contains_key(symbol) {
                bound.insert(*symbol, raster.band(self.binding.band(*symbol))?);
            }
        }
        let grid = raster.grid();
        let cols = grid.cols();
        let bands = self
            .formulas
            .iter()
            .map(|formula| {
                let inputs: Vec<(SpectralBand, &Band)> = formula
                    .inputs
                    .iter()
                    .map(|symbol| (*symbol, bound[symbol]))
                    .collect();
                let (values, valid): (Vec<f64>, Vec<bool>) = (0..grid.len())
                    .into_par_iter()
                    .map(|idx| {
                        let (row, col) = (idx / cols, idx % cols);
                        let mut pixel = Reflectance::default();
                        for (symbol, band) in &inputs {
                            match band.get(row, col) {
                                Some(value) => pixel.set(*symbol, value),
                                None => return (f64::NAN, false),
                            }
                        }
                        match formula.evaluate(&pixel) {
                            Some(value) => (value, true),
                            None => (f64::NAN, false),
                        }
                    })
                    .unzip();
                Band::new(
                    formula.name,
                    Array2::from_shape_vec(grid.shape(), values)?,
                    Array2::from_shape_vec(grid.shape(), valid)?,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        Raster::new(grid.clone(), bands)
    }

    /// `raster` followed by its index bands.
    pub fn append(&self, raster: Raster) -> Result<Raster> {
        let indices = self.compute(&raster)?;
        Raster::stack(vec![raster, indices])
    }
}
