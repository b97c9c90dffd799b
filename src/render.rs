// render.rs — Drawing the triangulation.
//
//   paint_triangles      the low-poly image: every facet filled with the
//                        source colour at its centroid
//   draw_voronoi         ownership map, one pseudo-random colour per region
//   draw_triangle_edges  facet outlines over any canvas
//   draw_points          white dots on black, for checking the sampler
//
// Facets are rasterised with integer edge functions over their bounding
// box. A pixel on a shared edge belongs to both neighbours and ends up with
// whichever was painted last; at one pixel wide the seam is not visible.

use crate::geometry::{cross, Point, TriangleSet};
use crate::image::{Image, Rgb};
use crate::ownership::{OwnershipMap, UNSET_OWNER};

/// Fill every triangle of `triangles` with the colour of `source` at the
/// triangle's centroid. Pixels no triangle covers keep their source colour.
pub fn paint_triangles(source: &Image<Rgb>, vertices: &[Point], triangles: &TriangleSet) -> Image<Rgb> {
    let mut out = source.clone();
    for t in triangles {
        let (cx, cy) = t.centroid(vertices);
        let colour = source.get_clamped(cx.round() as i64, cy.round() as i64);
        fill_triangle(&mut out, t.points(vertices), colour);
    }
    out
}

fn fill_triangle(canvas: &mut Image<Rgb>, [a, b, c]: [Point; 3], colour: Rgb) {
    if canvas.is_empty() {
        return;
    }
    let max_x = canvas.width() as i32 - 1;
    let max_y = canvas.height() as i32 - 1;
    let x0 = a.x.min(b.x).min(c.x).clamp(0, max_x);
    let x1 = a.x.max(b.x).max(c.x).clamp(0, max_x);
    let y0 = a.y.min(b.y).min(c.y).clamp(0, max_y);
    let y1 = a.y.max(b.y).max(c.y).clamp(0, max_y);

    for y in y0..=y1 {
        for x in x0..=x1 {
            let p = Point::new(x, y);
            let w0 = cross(b, c, p);
            let w1 = cross(c, a, p);
            let w2 = cross(a, b, p);
            let inside = (w0 >= 0 && w1 >= 0 && w2 >= 0) || (w0 <= 0 && w1 <= 0 && w2 <= 0);
            if inside {
                canvas.set(x as usize, y as usize, colour);
            }
        }
    }
}

/// Colour for region `id`: a fixed integer hash, so the same ID always
/// gets the same colour and neighbours rarely look alike.
pub fn region_colour(id: u32) -> Rgb {
    let mut h = id.wrapping_add(1).wrapping_mul(0x9e37_79b9);
    h ^= h >> 15;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    Rgb::new(h as u8, (h >> 8) as u8, (h >> 16) as u8)
}

/// Paint the ownership map. Unset cells are black.
pub fn draw_voronoi(map: &OwnershipMap) -> Image<Rgb> {
    let mut out = Image::new(map.cols(), map.rows());
    for y in 0..map.rows() {
        for x in 0..map.cols() {
            let id = map.get(x, y);
            if id != UNSET_OWNER {
                out.set(x, y, region_colour(id));
            }
        }
    }
    out
}

/// Draw the outline of every triangle onto `canvas`.
pub fn draw_triangle_edges(canvas: &mut Image<Rgb>, vertices: &[Point], triangles: &TriangleSet, colour: Rgb) {
    for t in triangles {
        let [a, b, c] = t.points(vertices);
        draw_line(canvas, a, b, colour);
        draw_line(canvas, b, c, colour);
        draw_line(canvas, c, a, colour);
    }
}

/// Bresenham line, clipped per pixel.
pub fn draw_line(canvas: &mut Image<Rgb>, from: Point, to: Point, colour: Rgb) {
    let (mut x, mut y) = (from.x as i64, from.y as i64);
    let (x1, y1) = (to.x as i64, to.y as i64);
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        if canvas.get_checked(x, y).is_some() {
            canvas.set(x as usize, y as usize, colour);
        }
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// White pixels at each vertex on a black `width × height` canvas.
pub fn draw_points(vertices: &[Point], width: usize, height: usize) -> Image<u8> {
    let mut out = Image::new(width, height);
    for p in vertices {
        if p.in_bounds(height, width) {
            out.set(p.x as usize, p.y as usize, 255);
        }
    }
    out
}
