use ndarray::Array2;

use crate::errors::{PipelineError, Result};

/// Named band values with a per pixel validity mask.
///
/// Masked pixels keep whatever value they had, readers must go through
/// [Band::get] or check [Band::valid].
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    name: String,
    values: Array2<f64>,
    valid: Array2<bool>,
}

impl Band {
    pub fn new(name: impl Into<String>, values: Array2<f64>, valid: Array2<bool>) -> Result<Self> {
        let name = name.into();
        if values.dim() != valid.dim() {
            return Err(PipelineError::ShapeMismatch {
                band: name,
                found: valid.dim(),
                expected: values.dim(),
            });
        }
        Ok(Self {
            name,
            values,
            valid,
        })
    }

    /// Band without masked pixels.
    pub fn from_values(name: impl Into<String>, values: Array2<f64>) -> Self {
        let valid = Array2::from_elem(values.dim(), true);
        Self {
            name: name.into(),
            values,
            valid,
        }
    }

    /// Pixels equal to `nodata` (or NaN) are masked.
    pub fn from_nodata(name: impl Into<String>, values: Array2<f64>, nodata: Option<f64>) -> Self {
        let valid = values.mapv(|value| !value.is_nan() && Some(value) != nodata);
        Self {
            name: name.into(),
            values,
            valid,
        }
    }

    /// Band with every pixel masked.
    pub fn masked(name: impl Into<String>, shape: (usize, usize)) -> Self {
        Self {
            name: name.into(),
            values: Array2::from_elem(shape, f64::NAN),
            valid: Array2::from_elem(shape, false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn valid(&self) -> &Array2<bool> {
        &self.valid
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        match self.valid.get((row, col)) {
            Some(true) => Some(self.values[(row, col)]),
            _ => None,
        }
    }

    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|valid| **valid).count()
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Masks every pixel where `mask` is false, never unmasks.
    pub fn update_mask(mut self, mask: &Array2<bool>) -> Result<Self> {
        if mask.dim() != self.shape() {
            return Err(PipelineError::ShapeMismatch {
                band: self.name,
                found: mask.dim(),
                expected: self.values.dim(),
            });
        }
        self.valid.zip_mut_with(mask, |valid, keep| *valid &= *keep);
        Ok(self)
    }

    pub fn map_values(mut self, f: impl Fn(f64) -> f64) -> Self {
        self.values.mapv_inplace(f);
        self
    }

    /// Nearest neighbour resampling through a lookup of source pixels.
    pub fn resample(&self, lookup: &[Option<[usize; 2]>], shape: (usize, usize)) -> Result<Self> {
        let (values, valid): (Vec<f64>, Vec<bool>) = lookup
            .iter()
            .map(|source| match source.and_then(|[row, col]| self.get(row, col)) {
                Some(value) => (value, true),
                None => (f64::NAN, false),
            })
            .unzip();
        Self::new(
            self.name.clone(),
            Array2::from_shape_vec(shape, values)?,
            Array2::from_shape_vec(shape, valid)?,
        )
    }
}
