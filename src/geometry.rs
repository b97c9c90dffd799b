// geometry.rs — Points, triangles and the predicates the engine needs.
//
// Coordinates are integer pixel positions: x is the column, y is the row,
// matching `Image::get(x, y)`. All arithmetic is done in i64 so squared
// distances and cross products are exact for any raster that fits in memory.
//
// A triangle is identified by its three vertex IDs, stored sorted. Sorting
// at construction makes equality, hashing and ordering independent of the
// order in which a triangle was discovered, which is what deduplication
// relies on.

use std::collections::BTreeSet;
use std::fmt;

/// A pixel position. `Point::UNSET` marks "no vertex".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const UNSET: Point = Point { x: -1, y: -1 };

    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        *self != Point::UNSET
    }

    /// True if the point lies inside a `rows × cols` raster.
    #[inline]
    pub fn in_bounds(&self, rows: usize, cols: usize) -> bool {
        self.x >= 0 && self.y >= 0 && (self.x as usize) < cols && (self.y as usize) < rows
    }

    /// Squared Euclidean distance. Comparing squared distances gives the
    /// same ordering as Euclidean distance without a square root.
    #[inline]
    pub fn dist_sq(&self, other: Point) -> i64 {
        let dx = self.x as i64 - other.x as i64;
        let dy = self.y as i64 - other.y as i64;
        dx * dx + dy * dy
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Twice the signed area of triangle (a, b, c).
/// Positive when a → b → c turns counter-clockwise in a y-up frame
/// (clockwise on screen, where y grows downward). Zero when collinear.
#[inline]
pub fn cross(a: Point, b: Point, c: Point) -> i64 {
    let abx = b.x as i64 - a.x as i64;
    let aby = b.y as i64 - a.y as i64;
    let acx = c.x as i64 - a.x as i64;
    let acy = c.y as i64 - a.y as i64;
    abx * acy - aby * acx
}

/// Default threshold on `|cross|` below which a triangle counts as
/// collinear. Integer points give integer cross products, so anything
/// under 1 is exactly zero.
pub const DEGENERACY_TOLERANCE: f64 = 0.5;

// ---------------------------------------------------------------------------
// Triangle
// ---------------------------------------------------------------------------

/// Three distinct vertex IDs, sorted ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Triangle {
    ids: [u32; 3],
}

impl Triangle {
    /// Build a triangle from three IDs in any order.
    /// Returns `None` if any two IDs coincide.
    pub fn new(a: u32, b: u32, c: u32) -> Option<Self> {
        let mut ids = [a, b, c];
        ids.sort_unstable();
        if ids[0] == ids[1] || ids[1] == ids[2] {
            return None;
        }
        Some(Triangle { ids })
    }

    #[inline]
    pub fn ids(&self) -> [u32; 3] {
        self.ids
    }

    /// Vertex coordinates, in ID order.
    ///
    /// # Panics
    /// Panics if an ID does not index `vertices`.
    pub fn points(&self, vertices: &[Point]) -> [Point; 3] {
        self.ids.map(|id| vertices[id as usize])
    }

    /// Twice the signed area, in ID order.
    pub fn signed_area2(&self, vertices: &[Point]) -> i64 {
        let [a, b, c] = self.points(vertices);
        cross(a, b, c)
    }

    /// True if the three vertices are collinear within `tolerance`
    /// (measured on the doubled area).
    pub fn is_degenerate(&self, vertices: &[Point], tolerance: f64) -> bool {
        (self.signed_area2(vertices).abs() as f64) <= tolerance
    }

    /// Centroid in floating-point pixel coordinates (x, y).
    pub fn centroid(&self, vertices: &[Point]) -> (f32, f32) {
        let [a, b, c] = self.points(vertices);
        (
            (a.x + b.x + c.x) as f32 / 3.0,
            (a.y + b.y + c.y) as f32 / 3.0,
        )
    }

    /// True if every ID indexes a vertex in a set of `n` vertices.
    pub fn is_valid_for(&self, n: usize) -> bool {
        self.ids.iter().all(|&id| (id as usize) < n)
    }
}

impl fmt::Display for Triangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.ids[0], self.ids[1], self.ids[2])
    }
}

// ---------------------------------------------------------------------------
// TriangleSet
// ---------------------------------------------------------------------------

/// Deduplicated collection of triangles.
///
/// Backed by a `BTreeSet`, so iteration order is the sorted ID-triple order
/// regardless of the order triangles were found in. Two sets built from the
/// same ownership map compare equal whichever engine produced them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriangleSet {
    triangles: BTreeSet<Triangle>,
}

impl TriangleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a triangle. Returns `false` if it was already present.
    pub fn insert(&mut self, t: Triangle) -> bool {
        self.triangles.insert(t)
    }

    pub fn contains(&self, t: &Triangle) -> bool {
        self.triangles.contains(t)
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triangle> + '_ {
        self.triangles.iter()
    }

    pub fn to_vec(&self) -> Vec<Triangle> {
        self.triangles.iter().copied().collect()
    }
}

impl FromIterator<Triangle> for TriangleSet {
    fn from_iter<I: IntoIterator<Item = Triangle>>(iter: I) -> Self {
        TriangleSet { triangles: iter.into_iter().collect() }
    }
}

impl Extend<Triangle> for TriangleSet {
    fn extend<I: IntoIterator<Item = Triangle>>(&mut self, iter: I) {
        self.triangles.extend(iter);
    }
}

impl<'a> IntoIterator for &'a TriangleSet {
    type Item = &'a Triangle;
    type IntoIter = std::collections::btree_set::Iter<'a, Triangle>;

    fn into_iter(self) -> Self::IntoIter {
        self.triangles.iter()
    }
}
