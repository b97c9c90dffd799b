// ownership.rs — Discrete Voronoi ownership map (CPU builders).
//
// For every pixel p of a `rows × cols` raster, the ownership map stores the
// ID of the vertex nearest to p. IDs are positions in the caller's vertex
// slice. When several vertices are equidistant the lowest ID wins; every
// builder in this crate (CPU brute force, CPU grid, CPU jump flood, GPU jump
// flood) applies the same rule so their outputs can be compared directly.
//
// Two exact builders live here:
//
//   build_brute_force  O(rows·cols·|V|). Every pixel scans every vertex.
//                      This is the oracle the other builders are tested
//                      against.
//
//   build_grid         Buckets the vertices into a uniform grid with about
//                      one vertex per cell and searches rings of cells
//                      outward from the pixel's own cell. A ring is only
//                      skipped once its closest possible point is strictly
//                      farther than the best distance so far, so a tie in an
//                      outer ring is still seen and the result is identical
//                      to the brute-force map.
//
// The approximate jump-flood builder lives in jfa.rs.
//
// MEMORY
// ──────
// The map is a heap `Vec<u32>` of exactly rows·cols cells. The size is
// computed with checked multiplication at construction, so an absurd extent
// fails with an error instead of wrapping.

use std::fmt;

use crate::error::{Result, TriangulationError};
use crate::geometry::Point;

/// Cell value meaning "no owner yet".
pub const UNSET_OWNER: u32 = u32::MAX;

/// Which algorithm fills the ownership map on the CPU path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OwnershipMethod {
    /// Linear scan over all vertices per pixel.
    BruteForce,
    /// Uniform bucket grid with ring search. Exact.
    #[default]
    Grid,
    /// CPU run of the GPU jump-flood schedule plus fallback fill. Approximate.
    JumpFlood,
}

impl fmt::Display for OwnershipMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnershipMethod::BruteForce => write!(f, "brute-force"),
            OwnershipMethod::Grid => write!(f, "grid"),
            OwnershipMethod::JumpFlood => write!(f, "jump-flood"),
        }
    }
}

// ---------------------------------------------------------------------------
// OwnershipMap
// ---------------------------------------------------------------------------

/// Dense per-pixel owner IDs, row-major.
#[derive(Clone, PartialEq, Eq)]
pub struct OwnershipMap {
    owners: Vec<u32>,
    rows: usize,
    cols: usize,
}

impl OwnershipMap {
    /// Allocate a map with every cell unset.
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        let len = checked_area(rows, cols)?;
        Ok(OwnershipMap { owners: vec![UNSET_OWNER; len], rows, cols })
    }

    /// Wrap an existing row-major buffer (e.g. a GPU readback).
    pub fn from_vec(rows: usize, cols: usize, owners: Vec<u32>) -> Result<Self> {
        let len = checked_area(rows, cols)?;
        if owners.len() != len {
            return Err(TriangulationError::BufferSizeMismatch {
                expected: len,
                actual: owners.len(),
            });
        }
        Ok(OwnershipMap { owners, rows, cols })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Owner of pixel (x, y). x is the column, y the row.
    ///
    /// # Panics
    /// Panics if (x, y) is outside the raster.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u32 {
        assert!(
            x < self.cols && y < self.rows,
            "pixel ({x},{y}) out of bounds for ownership map {}×{}",
            self.rows,
            self.cols,
        );
        self.owners[y * self.cols + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, owner: u32) {
        assert!(
            x < self.cols && y < self.rows,
            "pixel ({x},{y}) out of bounds for ownership map {}×{}",
            self.rows,
            self.cols,
        );
        self.owners[y * self.cols + x] = owner;
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.owners
    }

    pub fn as_mut_slice(&mut self) -> &mut [u32] {
        &mut self.owners
    }

    pub fn into_vec(self) -> Vec<u32> {
        self.owners
    }

    pub fn unset_count(&self) -> usize {
        self.owners.iter().filter(|&&o| o == UNSET_OWNER).count()
    }

    /// True once no cell holds `UNSET_OWNER`.
    pub fn is_complete(&self) -> bool {
        self.owners.iter().all(|&o| o != UNSET_OWNER)
    }

    /// Pixel count per vertex ID. Unset cells are not counted.
    pub fn region_sizes(&self, num_vertices: usize) -> Vec<usize> {
        let mut sizes = vec![0usize; num_vertices];
        for &o in &self.owners {
            if let Some(s) = sizes.get_mut(o as usize) {
                *s += 1;
            }
        }
        sizes
    }

    /// Fraction of cells on which `self` and `other` agree.
    ///
    /// # Panics
    /// Panics if the extents differ.
    pub fn agreement(&self, other: &OwnershipMap) -> f64 {
        assert_eq!(
            (self.rows, self.cols),
            (other.rows, other.cols),
            "cannot compare ownership maps of different extents"
        );
        let same = self.owners.iter().zip(&other.owners).filter(|(a, b)| a == b).count();
        same as f64 / self.owners.len() as f64
    }
}

impl fmt::Debug for OwnershipMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "OwnershipMap {{ {}×{} }}", self.rows, self.cols)?;
        for y in 0..self.rows.min(8) {
            write!(f, "  row {y}: [")?;
            for x in 0..self.cols.min(16) {
                if x > 0 {
                    write!(f, ", ")?;
                }
                match self.get(x, y) {
                    UNSET_OWNER => write!(f, "-")?,
                    o => write!(f, "{o}")?,
                }
            }
            if self.cols > 16 {
                write!(f, ", ...")?;
            }
            writeln!(f, "]")?;
        }
        if self.rows > 8 {
            writeln!(f, "  ...")?;
        }
        Ok(())
    }
}

fn checked_area(rows: usize, cols: usize) -> Result<usize> {
    if rows == 0 || cols == 0 {
        return Err(TriangulationError::EmptyRaster { rows, cols });
    }
    rows.checked_mul(cols)
        .filter(|&n| n <= u32::MAX as usize)
        .ok_or(TriangulationError::RasterTooLarge { rows, cols, max: u32::MAX as usize })
}

// ---------------------------------------------------------------------------
// Input validation
// ---------------------------------------------------------------------------

/// Check the builder's input constraints: a non-empty vertex set, a
/// non-zero raster, every vertex inside the raster, and few enough vertices
/// that every ID fits below `UNSET_OWNER`.
pub fn validate(vertices: &[Point], rows: usize, cols: usize) -> Result<()> {
    if rows == 0 || cols == 0 {
        return Err(TriangulationError::EmptyRaster { rows, cols });
    }
    if vertices.is_empty() {
        return Err(TriangulationError::EmptyVertexSet);
    }
    if vertices.len() >= UNSET_OWNER as usize {
        return Err(TriangulationError::TooManyVertices { count: vertices.len() });
    }
    for (index, p) in vertices.iter().enumerate() {
        if !p.in_bounds(rows, cols) {
            return Err(TriangulationError::VertexOutOfBounds {
                index,
                x: p.x,
                y: p.y,
                rows,
                cols,
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Build an ownership map with the chosen method.
pub fn build(
    vertices: &[Point],
    rows: usize,
    cols: usize,
    method: OwnershipMethod,
) -> Result<OwnershipMap> {
    match method {
        OwnershipMethod::BruteForce => build_brute_force(vertices, rows, cols),
        OwnershipMethod::Grid => build_grid(vertices, rows, cols),
        OwnershipMethod::JumpFlood => crate::jfa::build_jump_flood(vertices, rows, cols),
    }
}

/// Nearest vertex to `p` by full scan, lowest ID on ties.
///
/// # Panics
/// Panics if `vertices` is empty.
#[inline]
pub fn nearest_vertex(vertices: &[Point], p: Point) -> u32 {
    assert!(!vertices.is_empty(), "nearest_vertex on an empty vertex set");
    let mut best = 0u32;
    let mut best_d = p.dist_sq(vertices[0]);
    for (id, v) in vertices.iter().enumerate().skip(1) {
        let d = p.dist_sq(*v);
        // Strict `<` keeps the earlier (lower) ID on ties.
        if d < best_d {
            best_d = d;
            best = id as u32;
        }
    }
    best
}

/// Exact ownership by linear scan over all vertices for every pixel.
pub fn build_brute_force(vertices: &[Point], rows: usize, cols: usize) -> Result<OwnershipMap> {
    validate(vertices, rows, cols)?;
    let mut map = OwnershipMap::new(rows, cols)?;
    for y in 0..rows {
        let row = &mut map.owners[y * cols..(y + 1) * cols];
        for (x, cell) in row.iter_mut().enumerate() {
            *cell = nearest_vertex(vertices, Point::new(x as i32, y as i32));
        }
    }
    Ok(map)
}

/// Vertices bucketed into square cells, stored CSR-style: the IDs in
/// cell `c` are `ids[starts[c]..starts[c + 1]]`, ascending.
struct BucketGrid {
    cell: usize,
    grid_w: usize,
    grid_h: usize,
    starts: Vec<usize>,
    ids: Vec<u32>,
}

impl BucketGrid {
    fn new(vertices: &[Point], rows: usize, cols: usize) -> Self {
        // About one vertex per cell.
        let area = rows as f64 * cols as f64;
        let cell = ((area / vertices.len() as f64).sqrt().ceil() as usize).max(1);
        let grid_w = (cols + cell - 1) / cell;
        let grid_h = (rows + cell - 1) / cell;

        let cell_of = |p: &Point| (p.y as usize / cell) * grid_w + p.x as usize / cell;

        let mut counts = vec![0usize; grid_w * grid_h + 1];
        for v in vertices {
            counts[cell_of(v) + 1] += 1;
        }
        for i in 1..counts.len() {
            counts[i] += counts[i - 1];
        }
        let starts = counts.clone();
        let mut fill = counts;
        let mut ids = vec![0u32; vertices.len()];
        // IDs are visited in ascending order, so each bucket ends up sorted.
        for (id, v) in vertices.iter().enumerate() {
            let c = cell_of(v);
            ids[fill[c]] = id as u32;
            fill[c] += 1;
        }
        BucketGrid { cell, grid_w, grid_h, starts, ids }
    }

    #[inline]
    fn bucket(&self, gx: usize, gy: usize) -> &[u32] {
        let c = gy * self.grid_w + gx;
        &self.ids[self.starts[c]..self.starts[c + 1]]
    }

    /// Nearest vertex to `p`, lowest ID on ties.
    fn nearest(&self, vertices: &[Point], p: Point) -> u32 {
        let cx = p.x as i64 / self.cell as i64;
        let cy = p.y as i64 / self.cell as i64;
        let gw = self.grid_w as i64;
        let gh = self.grid_h as i64;
        let max_ring = gw.max(gh);

        let mut best = UNSET_OWNER;
        let mut best_d = i64::MAX;

        for r in 0..=max_ring {
            if r > 0 {
                // Any pixel in a ring-r cell is at least (r-1)·cell + 1 away
                // along one axis. Stop only when that bound is strictly worse.
                let lower = (r - 1) * self.cell as i64 + 1;
                if lower * lower > best_d {
                    break;
                }
            }
            for gy in (cy - r).max(0)..=(cy + r).min(gh - 1) {
                let on_edge_row = (gy - cy).abs() == r;
                let mut gx = (cx - r).max(0);
                while gx <= (cx + r).min(gw - 1) {
                    for &id in self.bucket(gx as usize, gy as usize) {
                        let d = p.dist_sq(vertices[id as usize]);
                        if d < best_d || (d == best_d && id < best) {
                            best_d = d;
                            best = id;
                        }
                    }
                    // Interior rows only touch the two ring columns.
                    if on_edge_row || gx == cx + r {
                        gx += 1;
                    } else {
                        gx = cx + r;
                    }
                }
            }
        }
        best
    }
}

/// Exact ownership via a bucket grid. Produces the same map as
/// [`build_brute_force`], including tie-breaks.
pub fn build_grid(vertices: &[Point], rows: usize, cols: usize) -> Result<OwnershipMap> {
    validate(vertices, rows, cols)?;
    let grid = BucketGrid::new(vertices, rows, cols);
    log::debug!(
        "ownership grid: {} vertices in {}×{} cells of {} px",
        vertices.len(),
        grid.grid_w,
        grid.grid_h,
        grid.cell
    );
    let mut map = OwnershipMap::new(rows, cols)?;
    for y in 0..rows {
        for x in 0..cols {
            map.owners[y * cols + x] = grid.nearest(vertices, Point::new(x as i32, y as i32));
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lcg_points(n: usize, rows: usize, cols: usize, seed: u32) -> Vec<Point> {
        let mut rng = seed;
        let mut next = || {
            rng = rng.wrapping_mul(1664525).wrapping_add(1013904223);
            rng >> 8
        };
        (0..n)
            .map(|_| Point::new((next() as usize % cols) as i32, (next() as usize % rows) as i32))
            .collect()
    }

    #[test]
    fn test_new_is_unset() {
        let map = OwnershipMap::new(3, 4).unwrap();
        assert_eq!(map.unset_count(), 12);
        assert!(!map.is_complete());
    }

    #[test]
    fn test_zero_extent_rejected() {
        assert!(matches!(
            OwnershipMap::new(0, 5),
            Err(TriangulationError::EmptyRaster { rows: 0, cols: 5 })
        ));
    }

    #[test]
    fn test_overflowing_extent_rejected() {
        assert!(matches!(
            OwnershipMap::new(usize::MAX, 2),
            Err(TriangulationError::RasterTooLarge { .. })
        ));
    }

    #[test]
    fn test_validate_errors() {
        assert!(matches!(validate(&[], 4, 4), Err(TriangulationError::EmptyVertexSet)));
        assert!(matches!(
            validate(&[Point::new(0, 0), Point::new(4, 0)], 4, 4),
            Err(TriangulationError::VertexOutOfBounds { index: 1, x: 4, y: 0, .. })
        ));
        assert!(validate(&[Point::new(3, 3)], 4, 4).is_ok());
    }

    #[test]
    fn test_tie_breaks_to_lowest_id() {
        // Pixel (2, 0) is equidistant from both vertices.
        let verts = [Point::new(4, 0), Point::new(0, 0)];
        let map = build_brute_force(&verts, 1, 5).unwrap();
        assert_eq!(map.get(2, 0), 0);
        assert_eq!(map.get(1, 0), 1);
        assert_eq!(map.get(3, 0), 0);
    }

    #[test]
    fn test_vertex_owns_itself() {
        let verts = lcg_points(40, 30, 50, 7);
        let map = build_brute_force(&verts, 30, 50).unwrap();
        for (id, v) in verts.iter().enumerate() {
            let owner = map.get(v.x as usize, v.y as usize);
            // A duplicate pixel is owned by the lowest ID sharing it.
            assert_eq!(verts[owner as usize], *v, "vertex {id} lost its own pixel");
            assert!(owner as usize <= id);
        }
    }

    #[test]
    fn test_grid_matches_brute_force() {
        for (n, rows, cols, seed) in [(1, 9, 13, 1), (5, 20, 20, 2), (37, 41, 29, 3), (200, 64, 80, 4)] {
            let verts = lcg_points(n, rows, cols, seed);
            let brute = build_brute_force(&verts, rows, cols).unwrap();
            let grid = build_grid(&verts, rows, cols).unwrap();
            assert_eq!(brute, grid, "grid builder diverged for n={n} {rows}×{cols}");
        }
    }

    #[test]
    fn test_grid_ties_across_cells() {
        // Symmetric layout: many pixels sit on exact bisectors.
        let verts = [
            Point::new(10, 10),
            Point::new(0, 0),
            Point::new(20, 0),
            Point::new(0, 20),
            Point::new(20, 20),
        ];
        let brute = build_brute_force(&verts, 21, 21).unwrap();
        let grid = build_grid(&verts, 21, 21).unwrap();
        assert_eq!(brute, grid);
    }

    #[test]
    fn test_region_sizes_sum_to_area() {
        let verts = lcg_points(12, 16, 16, 9);
        let map = build_grid(&verts, 16, 16).unwrap();
        let sizes = map.region_sizes(verts.len());
        assert_eq!(sizes.iter().sum::<usize>(), 256);
    }
}
