//! Dense three-dimensional float arrays.

use super::array2d::{Array2DView, Array2DViewMut, F2DArray};
use serde::{Deserialize, Serialize};

/// An owned 3D array of `f32`; element (x, y, z) lives at
/// `x + y * width + z * width * height`.
///
/// XY planes are contiguous, so [`F3DArray::plane_xy`] hands out a borrowed
/// view. YZ and XZ planes are strided and are returned as owned copies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawF3DArray")]
pub struct F3DArray {
    width: usize,
    height: usize,
    depth: usize,
    data: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct RawF3DArray {
    width: usize,
    height: usize,
    depth: usize,
    data: Vec<f32>,
}

impl TryFrom<RawF3DArray> for F3DArray {
    type Error = String;

    fn try_from(raw: RawF3DArray) -> Result<Self, Self::Error> {
        let extents = [raw.width, raw.height, raw.depth];
        let extents_ok = extents.iter().all(|&e| e > 0) || extents.iter().all(|&e| e == 0);
        if !extents_ok || raw.data.len() != raw.width * raw.height * raw.depth {
            return Err(format!(
                "{}x{}x{} array cannot hold {} values",
                raw.width,
                raw.height,
                raw.depth,
                raw.data.len()
            ));
        }
        Ok(Self { width: raw.width, height: raw.height, depth: raw.depth, data: raw.data })
    }
}

impl F3DArray {
    /// Creates a zero-filled array of the given extents.
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        let mut array = Self::default();
        array.alloc(width, height, depth);
        array
    }

    /// Replaces the buffer with a zero-filled block of the given extents.
    pub fn alloc(&mut self, width: usize, height: usize, depth: usize) {
        assert!(width > 0, "width must be positive");
        assert!(height > 0, "height must be positive");
        assert!(depth > 0, "depth must be positive");
        self.width = width;
        self.height = height;
        self.depth = depth;
        self.data = vec![0.0; width * height * depth];
    }

    /// Extent along x.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Extent along y.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Extent along z.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of elements.
    pub fn total_size(&self) -> usize {
        self.data.len()
    }

    /// Reads element (x, y, z).
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> f32 {
        self.data[self.index(x, y, z)]
    }

    /// Writes element (x, y, z).
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, value: f32) {
        let idx = self.index(x, y, z);
        self.data[idx] = value;
    }

    /// Copy of the YZ plane at `x` (width = height, height = depth).
    pub fn plane_yz(&self, x: usize) -> F2DArray {
        assert!(x < self.width, "x {} out of range {}", x, self.width);
        let mut plane = F2DArray::new(self.height, self.depth);
        for y in 0..self.height {
            for z in 0..self.depth {
                plane.set(y, z, self.get(x, y, z));
            }
        }
        plane
    }

    /// Copy of the XZ plane at `y` (width = width, height = depth).
    pub fn plane_xz(&self, y: usize) -> F2DArray {
        assert!(y < self.height, "y {} out of range {}", y, self.height);
        let mut plane = F2DArray::new(self.width, self.depth);
        for x in 0..self.width {
            for z in 0..self.depth {
                plane.set(x, z, self.get(x, y, z));
            }
        }
        plane
    }

    /// Borrowed view of the XY plane at `z`.
    pub fn plane_xy(&self, z: usize) -> Array2DView<'_> {
        let range = self.plane_range(z);
        Array2DView::new(&self.data[range], self.width, self.height)
    }

    /// Mutable borrowed view of the XY plane at `z`; writes land in this array.
    pub fn plane_xy_mut(&mut self, z: usize) -> Array2DViewMut<'_> {
        let range = self.plane_range(z);
        let (width, height) = (self.width, self.height);
        Array2DViewMut::new(&mut self.data[range], width, height)
    }

    /// The whole buffer.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    fn plane_range(&self, z: usize) -> std::ops::Range<usize> {
        assert!(z < self.depth, "z {} out of range {}", z, self.depth);
        let plane = self.width * self.height;
        z * plane..(z + 1) * plane
    }

    #[inline]
    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        assert!(x < self.width, "x {} out of range {}", x, self.width);
        assert!(y < self.height, "y {} out of range {}", y, self.height);
        assert!(z < self.depth, "z {} out of range {}", z, self.depth);
        x + y * self.width + z * self.width * self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> F3DArray {
        let mut array = F3DArray::new(2, 3, 4);
        for z in 0..4 {
            for y in 0..3 {
                for x in 0..2 {
                    array.set(x, y, z, (100 * z + 10 * y + x) as f32);
                }
            }
        }
        array
    }

    #[test]
    fn test_set_get() {
        let array = filled();
        assert_eq!(array.get(1, 2, 3), 321.0);
        assert_eq!(array.total_size(), 24);
    }

    #[test]
    fn test_xy_plane_aliases_source() {
        let mut array = filled();
        {
            let mut plane = array.plane_xy_mut(2);
            assert_eq!(plane.get(1, 1), 211.0);
            plane.set(1, 1, -5.0);
        }
        assert_eq!(array.get(1, 1, 2), -5.0);
        assert_eq!(array.plane_xy(2).get(1, 1), -5.0);
    }

    #[test]
    fn test_yz_and_xz_planes_are_copies() {
        let mut array = filled();
        let yz = array.plane_yz(1);
        let xz = array.plane_xz(2);
        assert_eq!(yz.get(2, 3), 321.0);
        assert_eq!(xz.get(1, 3), 321.0);

        array.set(1, 2, 3, 0.0);
        assert_eq!(yz.get(2, 3), 321.0);
        assert_eq!(xz.get(1, 3), 321.0);
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_plane_panics() {
        let array = filled();
        array.plane_xy(4);
    }

    #[test]
    fn test_deserialize_checks_extents() {
        let array = filled();
        let bytes = bincode::serialize(&array).unwrap();
        assert_eq!(bincode::deserialize::<F3DArray>(&bytes).unwrap(), array);

        let raw = RawF3DArray { width: 2, height: 2, depth: 2, data: vec![1.0; 7] };
        let bytes = bincode::serialize(&raw).unwrap();
        assert!(bincode::deserialize::<F3DArray>(&bytes).is_err());
    }
}
