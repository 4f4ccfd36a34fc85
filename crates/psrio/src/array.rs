//! `ndarray` views of decoded arrays.

use ndarray::{Array2, Array3, ArrayView2, ArrayView3};

use crate::error::{Error, Result};
use crate::sigproc::Spectra;
use crate::value::Cube;

fn shape_error(e: ndarray::ShapeError, expected: usize, found: usize, context: &str) -> Error {
    log::debug!("ndarray rejected {context}: {e}");
    Error::ShapeMismatch {
        expected: expected as u64,
        found: found as u64,
        context: context.into(),
    }
}

impl Cube {
    /// Borrow the cube as a `[i, j, k]` array.
    pub fn view(&self) -> Result<ArrayView3<'_, f64>> {
        let [a, b, c] = self.shape;
        ArrayView3::from_shape((a, b, c), &self.data)
            .map_err(|e| shape_error(e, self.len(), self.data.len(), "cube"))
    }

    pub fn to_array(&self) -> Result<Array3<f64>> {
        self.view().map(|v| v.to_owned())
    }

    /// Build a cube from any 3-D array, copying into row-major order.
    pub fn from_array(array: &Array3<f64>) -> Self {
        let (a, b, c) = array.dim();
        Cube {
            shape: [a, b, c],
            data: array.iter().copied().collect(),
        }
    }
}

impl Spectra {
    /// Borrow the block as a `[spectrum, sample]` array.
    pub fn view(&self) -> Result<ArrayView2<'_, f32>> {
        ArrayView2::from_shape((self.nspectra, self.width), &self.data).map_err(|e| {
            shape_error(e, self.nspectra * self.width, self.data.len(), "spectra")
        })
    }

    pub fn to_array(&self) -> Result<Array2<f32>> {
        self.view().map(|v| v.to_owned())
    }
}
