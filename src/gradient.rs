// gradient.rs — Edge strength map for vertex sampling.
//
// Sobel kernels, applied directly as 3×3 stencils with clamp-to-edge
// borders:
//
//   Sobel_x = [-1 0 1]        Sobel_y = [-1 -2 -1]
//             [-2 0 2]                  [ 0  0  0]
//             [-1 0 1]                  [ 1  2  1]
//
// The sampler wants one number per pixel in [0, 1], so the magnitude
// sqrt(Ix² + Iy²) is divided by its maximum over the image. A flat image
// has maximum 0 and yields an all-zero map.

use crate::image::{Image, Pixel};

/// (Ix, Iy) at one pixel. Ix is positive where intensity increases to the
/// right, Iy where it increases downward.
#[inline]
fn sobel_at<T: Pixel>(src: &Image<T>, x: usize, y: usize) -> (f32, f32) {
    let (x, y) = (x as i64, y as i64);
    let p = |dx: i64, dy: i64| src.get_clamped(x + dx, y + dy).to_f32();
    let ix = (p(1, -1) + 2.0 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1));
    let iy = (p(-1, 1) + 2.0 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2.0 * p(0, -1) + p(1, -1));
    (ix, iy)
}

/// Unnormalised gradient magnitude.
pub fn magnitude<T: Pixel>(src: &Image<T>) -> Image<f32> {
    let mut out = Image::new(src.width(), src.height());
    for y in 0..src.height() {
        for x in 0..src.width() {
            let (ix, iy) = sobel_at(src, x, y);
            out.set(x, y, (ix * ix + iy * iy).sqrt());
        }
    }
    out
}

/// Gradient magnitude scaled so its maximum is 1.
pub fn edge_map<T: Pixel>(src: &Image<T>) -> Image<f32> {
    let mag = magnitude(src);
    let max = mag.as_slice().iter().copied().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return mag;
    }
    mag.map(|v| v / max)
}

/// Number of pixels at or above `threshold`.
pub fn count_edges(edges: &Image<f32>, threshold: f32) -> usize {
    edges.as_slice().iter().filter(|&&v| v >= threshold).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertical_step() -> Image<u8> {
        // Left half 0, right half 100.
        let mut img = Image::<u8>::new(20, 10);
        for y in 0..10 {
            for x in 10..20 {
                img.set(x, y, 100);
            }
        }
        img
    }

    #[test]
    fn test_horizontal_gradient() {
        let img = vertical_step();
        let (edge_response, iy) = sobel_at(&img, 10, 5);
        assert!(edge_response > 50.0, "expected strong positive Ix at edge, got {edge_response}");
        assert!(iy.abs() < 1.0);
        assert!(sobel_at(&img, 5, 5).0.abs() < 1.0);
    }

    #[test]
    fn test_vertical_gradient() {
        let mut img = Image::<u8>::new(10, 20);
        for y in 10..20 {
            for x in 0..10 {
                img.set(x, y, 100);
            }
        }
        assert!(sobel_at(&img, 5, 10).1 > 50.0);
        assert!(sobel_at(&img, 5, 5).1.abs() < 1.0);
    }

    #[test]
    fn test_linear_ramp() {
        // f(x) = x: the derivative row gives 2, the smoothing column sums to 4.
        let mut img = Image::<f32>::new(20, 10);
        for y in 0..10 {
            for x in 0..20 {
                img.set(x, y, x as f32);
            }
        }
        let mag = magnitude(&img);
        for y in 1..9 {
            for x in 1..19 {
                let (ix, iy) = sobel_at(&img, x, y);
                assert!((ix - 8.0).abs() < 1e-3);
                assert!(iy.abs() < 1e-3);
                assert!((mag.get(x, y) - 8.0).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn test_edge_map_normalised() {
        let edges = edge_map(&vertical_step());
        let max = edges.as_slice().iter().copied().fold(0.0f32, f32::max);
        assert!((max - 1.0).abs() < 1e-6);
        assert!(edges.as_slice().iter().all(|&v| (0.0..=1.0).contains(&v)));
        // Only the two columns either side of the step respond.
        assert_eq!(count_edges(&edges, 0.1), 2 * 10);
    }

    #[test]
    fn test_flat_image_has_no_edges() {
        let img = Image::filled(8, 8, 128u8);
        let edges = edge_map(&img);
        assert_eq!(count_edges(&edges, 0.1), 0);
        assert!(edges.as_slice().iter().all(|&v| v == 0.0));
    }
}
