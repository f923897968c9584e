//! Fixed-size two-dimensional pixel grids.
//!
//! Grids are addressed by `(column, row)` the way images are described; the
//! backing `ndarray::Array2` is stored row-major as `[row, column]`. Floating point
//! grids use NaN to mark pixels with no defined value.

use ndarray::Array2;
use std::ops::Index;
use thiserror::Error;

use crate::image_size::ImageSize;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("expected {expected} values for a {size} grid, got {actual}")]
    LengthMismatch {
        size: ImageSize,
        expected: usize,
        actual: usize,
    },
    #[error("grid sizes differ: {0} vs {1}")]
    SizeMismatch(ImageSize, ImageSize),
}

/// Owned rectangular grid of pixel values
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    data: Array2<T>,
}

impl<T: Clone> Grid<T> {
    /// Grid of the given size with every pixel set to `value`
    pub fn filled(size: ImageSize, value: T) -> Self {
        Self {
            data: Array2::from_elem((size.height, size.width), value),
        }
    }

    /// Build a grid from row-major values
    pub fn from_row_major(size: ImageSize, values: Vec<T>) -> Result<Self, GridError> {
        let expected = size.pixel_count();
        if values.len() != expected {
            return Err(GridError::LengthMismatch {
                size,
                expected,
                actual: values.len(),
            });
        }
        let data = Array2::from_shape_vec((size.height, size.width), values).map_err(|_| {
            GridError::LengthMismatch {
                size,
                expected,
                actual: expected,
            }
        })?;
        Ok(Self { data })
    }
}

impl<T> Grid<T> {
    pub fn size(&self) -> ImageSize {
        let (height, width) = self.data.dim();
        ImageSize::from_width_height(width, height)
    }

    /// Value at (column, row), or `None` outside the grid
    pub fn get(&self, column: usize, row: usize) -> Option<&T> {
        self.data.get((row, column))
    }

    pub fn get_mut(&mut self, column: usize, row: usize) -> Option<&mut T> {
        self.data.get_mut((row, column))
    }

    /// Iterate `((column, row), &value)` in row-major order
    pub fn indexed_iter(&self) -> impl Iterator<Item = ((usize, usize), &T)> {
        self.data
            .indexed_iter()
            .map(|((row, column), value)| ((column, row), value))
    }

    /// Combine two grids of equal size pixel by pixel
    pub fn zip_map<U, V, F>(&self, other: &Grid<U>, mut f: F) -> Result<Grid<V>, GridError>
    where
        F: FnMut(&T, &U) -> V,
    {
        if self.size() != other.size() {
            return Err(GridError::SizeMismatch(self.size(), other.size()));
        }
        let values: Vec<V> = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| f(a, b))
            .collect();
        let (height, width) = self.data.dim();
        let data = Array2::from_shape_vec((height, width), values)
            .map_err(|_| GridError::SizeMismatch(self.size(), other.size()))?;
        Ok(Grid { data })
    }

    /// Borrow the backing array, indexed `[row, column]`
    pub fn as_array(&self) -> &Array2<T> {
        &self.data
    }
}

impl<T> Index<(usize, usize)> for Grid<T> {
    type Output = T;

    /// Index by `(column, row)`; panics outside the grid like slice indexing
    fn index(&self, (column, row): (usize, usize)) -> &T {
        &self.data[(row, column)]
    }
}
