//! Dense two-dimensional float arrays.
//!
//! Element (x, y) is stored at `x + y * width`, so a row is a contiguous run
//! of `width` floats. This is the layout used when edge and position matrices
//! are exported from a layer: one row per neuron.

use serde::{Deserialize, Serialize};

/// An owned, row-major 2D array of `f32`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawF2DArray")]
pub struct F2DArray {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

/// Unchecked wire form of [`F2DArray`].
#[derive(Serialize, Deserialize)]
struct RawF2DArray {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl TryFrom<RawF2DArray> for F2DArray {
    type Error = String;

    fn try_from(raw: RawF2DArray) -> Result<Self, Self::Error> {
        // The empty default array is the only one with zero extents.
        let extents_ok = (raw.width > 0) == (raw.height > 0);
        if !extents_ok || raw.data.len() != raw.width * raw.height {
            return Err(format!(
                "{}x{} array cannot hold {} values",
                raw.width,
                raw.height,
                raw.data.len()
            ));
        }
        Ok(Self { width: raw.width, height: raw.height, data: raw.data })
    }
}

impl F2DArray {
    /// Creates a zero-filled array of the given extents.
    pub fn new(width: usize, height: usize) -> Self {
        let mut array = Self::default();
        array.alloc(width, height);
        array
    }

    /// Wraps an existing buffer. Panics if the length does not match.
    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Self {
        assert!(width > 0 && height > 0, "extents must be positive");
        assert_eq!(data.len(), width * height, "buffer length does not match extents");
        Self { width, height, data }
    }

    /// Replaces the buffer with a zero-filled block of the given extents.
    pub fn alloc(&mut self, width: usize, height: usize) {
        assert!(width > 0, "width must be positive");
        assert!(height > 0, "height must be positive");
        self.width = width;
        self.height = height;
        self.data = vec![0.0; width * height];
    }

    /// Width (number of columns).
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height (number of rows).
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of elements.
    #[inline]
    pub fn total_size(&self) -> usize {
        self.data.len()
    }

    /// Reads element (x, y).
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[self.index(x, y)]
    }

    /// Writes element (x, y).
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    /// Copy of row `y`.
    pub fn row(&self, y: usize) -> Vec<f32> {
        self.row_slice(y).to_vec()
    }

    /// Borrowed row `y`.
    #[inline]
    pub fn row_slice(&self, y: usize) -> &[f32] {
        assert!(y < self.height, "row {} out of range {}", y, self.height);
        &self.data[y * self.width..(y + 1) * self.width]
    }

    /// Mutable row `y`.
    #[inline]
    pub fn row_slice_mut(&mut self, y: usize) -> &mut [f32] {
        assert!(y < self.height, "row {} out of range {}", y, self.height);
        &mut self.data[y * self.width..(y + 1) * self.width]
    }

    /// Copy of column `x`.
    pub fn column(&self, x: usize) -> Vec<f32> {
        assert!(x < self.width, "column {} out of range {}", x, self.width);
        (0..self.height).map(|y| self.data[x + y * self.width]).collect()
    }

    /// The first `len` elements starting at (x, y), in row-major order,
    /// returned as a single-row array.
    pub fn subarray(&self, x: usize, y: usize, len: usize) -> F2DArray {
        let start = self.index(x, y);
        assert!(start + len <= self.data.len(), "subarray runs past the end of the buffer");
        F2DArray::from_vec(len, 1, self.data[start..start + len].to_vec())
    }

    /// The whole buffer.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// The whole buffer, mutable.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Borrows the array as a read-only view.
    pub fn view(&self) -> Array2DView<'_> {
        Array2DView::new(&self.data, self.width, self.height)
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> usize {
        assert!(x < self.width, "x {} out of range {}", x, self.width);
        assert!(y < self.height, "y {} out of range {}", y, self.height);
        x + y * self.width
    }
}

/// A non-owning 2D view into someone else's buffer.
#[derive(Debug, Clone, Copy)]
pub struct Array2DView<'a> {
    width: usize,
    height: usize,
    data: &'a [f32],
}

impl<'a> Array2DView<'a> {
    /// Views `data` as a `width` x `height` array.
    pub fn new(data: &'a [f32], width: usize, height: usize) -> Self {
        assert!(width > 0 && height > 0, "extents must be positive");
        assert_eq!(data.len(), width * height, "buffer length does not match extents");
        Self { width, height, data }
    }

    /// Width (number of columns).
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height (number of rows).
    pub fn height(&self) -> usize {
        self.height
    }

    /// Reads element (x, y).
    pub fn get(&self, x: usize, y: usize) -> f32 {
        assert!(x < self.width && y < self.height, "({}, {}) out of range", x, y);
        self.data[x + y * self.width]
    }

    /// Copies the view into an owned array.
    pub fn to_owned(&self) -> F2DArray {
        F2DArray::from_vec(self.width, self.height, self.data.to_vec())
    }
}

/// A mutable non-owning 2D view into someone else's buffer.
#[derive(Debug)]
pub struct Array2DViewMut<'a> {
    width: usize,
    height: usize,
    data: &'a mut [f32],
}

impl<'a> Array2DViewMut<'a> {
    /// Views `data` as a mutable `width` x `height` array.
    pub fn new(data: &'a mut [f32], width: usize, height: usize) -> Self {
        assert!(width > 0 && height > 0, "extents must be positive");
        assert_eq!(data.len(), width * height, "buffer length does not match extents");
        Self { width, height, data }
    }

    /// Width (number of columns).
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height (number of rows).
    pub fn height(&self) -> usize {
        self.height
    }

    /// Reads element (x, y).
    pub fn get(&self, x: usize, y: usize) -> f32 {
        assert!(x < self.width && y < self.height, "({}, {}) out of range", x, y);
        self.data[x + y * self.width]
    }

    /// Writes element (x, y) through to the backing buffer.
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        assert!(x < self.width && y < self.height, "({}, {}) out of range", x, y);
        self.data[x + y * self.width] = value;
    }
}
