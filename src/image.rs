// image.rs — Runtime-sized raster, generic over pixel type.
//
// The low-poly pipeline handles three kinds of raster:
//
//   Image<Rgb>   source picture and rendered output
//   Image<u8>    grayscale copy fed to the gradient
//   Image<f32>   normalised gradient magnitude (the edge map)
//
// All are row-major with no padding: pixel (x, y) lives at y * width + x.
// Width is the column count and height the row count, so an image matches
// an ownership map with rows = height and cols = width.
//
// Decoding and encoding files is left to the caller (the demo uses the
// `image` crate); this type only holds pixels.

use std::fmt;

use crate::error::{Result, TriangulationError};

// ---------------------------------------------------------------------------
// Pixel trait
// ---------------------------------------------------------------------------

/// Types that can be stored in an [`Image`].
pub trait Pixel: Copy + Default + Send + Sync + PartialEq + 'static {
    /// Intensity as f32: the raw value for scalars, luma for colour.
    fn to_f32(self) -> f32;

    /// Build a pixel from an intensity, clamping and rounding as needed.
    fn from_f32(v: f32) -> Self;
}

impl Pixel for u8 {
    #[inline]
    fn to_f32(self) -> f32 {
        self as f32
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        v.clamp(0.0, 255.0).round() as u8
    }
}

impl Pixel for f32 {
    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        v
    }
}

/// 8-bit RGB colour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };
    pub const WHITE: Rgb = Rgb { r: 255, g: 255, b: 255 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// ITU-R BT.601 luma, in 0..=255.
    #[inline]
    pub fn luma(self) -> f32 {
        0.299 * self.r as f32 + 0.587 * self.g as f32 + 0.114 * self.b as f32
    }
}

impl Pixel for Rgb {
    #[inline]
    fn to_f32(self) -> f32 {
        self.luma()
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        let g = u8::from_f32(v);
        Rgb { r: g, g, b: g }
    }
}

// ---------------------------------------------------------------------------
// Image<T>
// ---------------------------------------------------------------------------

/// A 2D raster with runtime dimensions.
#[derive(Clone, PartialEq)]
pub struct Image<T: Pixel> {
    data: Vec<T>,
    width: usize,
    height: usize,
}

impl<T: Pixel> Image<T> {
    /// A `width × height` image filled with `T::default()`.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, T::default())
    }

    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Image { data: vec![value; width * height], width, height }
    }

    /// Wrap an existing row-major buffer.
    ///
    /// Fails with `BufferSizeMismatch` unless `data.len() == width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Result<Self> {
        let expected = width * height;
        if data.len() != expected {
            return Err(TriangulationError::BufferSizeMismatch { expected, actual: data.len() });
        }
        Ok(Image { data, width, height })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// # Panics
    /// Panics (in debug builds) if (x, y) is out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        debug_assert!(x < self.width && y < self.height, "({x}, {y}) out of bounds");
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        debug_assert!(x < self.width && y < self.height, "({x}, {y}) out of bounds");
        self.data[y * self.width + x] = value;
    }

    /// Bounds-checked read with signed coordinates.
    #[inline]
    pub fn get_checked(&self, x: i64, y: i64) -> Option<T> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some(self.data[y as usize * self.width + x as usize])
    }

    /// Clamp-to-edge read: out-of-range coordinates use the nearest border
    /// pixel.
    #[inline]
    pub fn get_clamped(&self, x: i64, y: i64) -> T {
        let cx = x.clamp(0, self.width as i64 - 1) as usize;
        let cy = y.clamp(0, self.height as i64 - 1) as usize;
        self.data[cy * self.width + cx]
    }

    pub fn row(&self, y: usize) -> &[T] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Iterate over `(x, y, value)` in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        let w = self.width;
        self.data.iter().enumerate().map(move |(i, &v)| (i % w, i / w, v))
    }

    /// Apply `f` to every pixel, producing an image of another pixel type.
    pub fn map<U: Pixel>(&self, f: impl Fn(T) -> U) -> Image<U> {
        Image { data: self.data.iter().map(|&v| f(v)).collect(), width: self.width, height: self.height }
    }

    /// Grayscale copy via [`Pixel::to_f32`].
    pub fn to_gray(&self) -> Image<u8> {
        self.map(|v| u8::from_f32(v.to_f32()))
    }
}

impl<T: Pixel> fmt::Debug for Image<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image<{}>({}×{})", std::any::type_name::<T>(), self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_size_checked() {
        assert!(Image::<u8>::from_vec(3, 2, vec![0; 6]).is_ok());
        let err = Image::<u8>::from_vec(3, 2, vec![0; 5]).unwrap_err();
        assert!(matches!(err, TriangulationError::BufferSizeMismatch { expected: 6, actual: 5 }));
    }

    #[test]
    fn test_get_set_row_major() {
        let mut img = Image::<u8>::new(4, 3);
        img.set(3, 1, 9);
        assert_eq!(img.get(3, 1), 9);
        assert_eq!(img.as_slice()[7], 9);
        assert_eq!(img.row(1), &[0, 0, 0, 9]);
    }

    #[test]
    fn test_clamped_and_checked_reads() {
        let img = Image::<u8>::from_vec(2, 2, vec![1, 2, 3, 4]).unwrap();
        assert_eq!(img.get_clamped(-5, -5), 1);
        assert_eq!(img.get_clamped(9, 9), 4);
        assert_eq!(img.get_checked(2, 0), None);
        assert_eq!(img.get_checked(1, 1), Some(4));
    }

    #[test]
    fn test_to_gray_uses_luma() {
        let img = Image::from_vec(
            3,
            1,
            vec![Rgb::WHITE, Rgb::BLACK, Rgb::new(255, 0, 0)],
        )
        .unwrap();
        let gray = img.to_gray();
        assert_eq!(gray.as_slice(), &[255, 0, 76]);
    }

    #[test]
    fn test_pixels_coordinates() {
        let img = Image::<u8>::from_vec(2, 2, vec![1, 2, 3, 4]).unwrap();
        let v: Vec<_> = img.pixels().collect();
        assert_eq!(v[3], (1, 1, 4));
        assert_eq!(v[1], (1, 0, 2));
    }
}
