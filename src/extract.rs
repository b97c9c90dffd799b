// extract.rs — Triangle extraction from an ownership map (CPU).
//
// Voronoi regions meet three (or more) at a time at the Voronoi vertices,
// and each such meeting point is dual to a triangle of the triangulation.
// On a discrete map the meeting points show up as 2×2 pixel windows that
// contain three or four different owners.
//
// WINDOW RULE
// ───────────
// The window's owners are read in cyclic order around its centre:
//
//     tl ── tr
//      │     │        order: tl, tr, br, bl
//     bl ── br
//
// and duplicates are dropped keeping first appearance. Regions around a
// meeting point appear in the same angular order as their vertices, so
//
//   3 owners [a, b, c]     → triangle (a, b, c)
//   4 owners [a, b, c, d]  → split along diagonal ac or bd
//
// Four owners in one window means four vertices that are (nearly)
// cocircular, and the window sits on the short Voronoi edge between the
// two triangles. Along the Voronoi edge of diagonal ac, a and c are the
// nearest owners, so with w the window centre
//
//   |a-w|² + |c-w|² < |b-w|² + |d-w|²
//
// holds there. Both sides differ by a linear function of w, and at the
// circumcentre of (a, b, c) the test reduces to "d outside the
// circumcircle", the in-circle test. Ties take ac.
//
// The split is chosen per window. Faces found by neighbouring 3-owner
// windows come from the discrete map and can still cross a face from
// another window by a pixel or so near cocircular clusters.
//
// Candidates whose vertices are collinear are discarded, and the rest go
// into a `TriangleSet`, which makes repeated discoveries of the same face
// at neighbouring windows harmless.

use crate::geometry::{Point, Triangle, TriangleSet, DEGENERACY_TOLERANCE};
use crate::ownership::{OwnershipMap, UNSET_OWNER};

/// Distinct owners of the 2×2 window whose top-left pixel is (x, y), in
/// cyclic order. Returns the owners array and how many are valid.
#[inline]
pub fn window_owners(map: &OwnershipMap, x: usize, y: usize) -> ([u32; 4], usize) {
    let cyclic = [
        map.get(x, y),
        map.get(x + 1, y),
        map.get(x + 1, y + 1),
        map.get(x, y + 1),
    ];
    let mut ids = [UNSET_OWNER; 4];
    let mut n = 0;
    for id in cyclic {
        if id != UNSET_OWNER && !ids[..n].contains(&id) {
            ids[n] = id;
            n += 1;
        }
    }
    (ids, n)
}

/// Squared distance from `v` to the centre of window (x, y), in doubled
/// coordinates so it stays integral.
#[inline]
fn window_dist2(v: Point, x: usize, y: usize) -> i64 {
    let dx = 2 * v.x as i64 - (2 * x as i64 + 1);
    let dy = 2 * v.y as i64 - (2 * y as i64 + 1);
    dx * dx + dy * dy
}

/// Index in `ids` of the owner the fan starts from: 0 splits a four-owner
/// window along ids[0]-ids[2], 1 along ids[1]-ids[3].
pub fn fan_start(ids: &[u32], vertices: &[Point], x: usize, y: usize) -> usize {
    if ids.len() != 4 || ids.iter().any(|&id| id as usize >= vertices.len()) {
        return 0;
    }
    let d = |i: usize| window_dist2(vertices[ids[i] as usize], x, y);
    if d(0) + d(2) <= d(1) + d(3) {
        0
    } else {
        1
    }
}

/// Candidate triangles for the distinct owners of window (x, y).
/// Yields nothing for fewer than three owners.
pub fn window_candidates<'a>(
    ids: &'a [u32],
    vertices: &[Point],
    x: usize,
    y: usize,
) -> impl Iterator<Item = Triangle> + 'a {
    let fan: &[(usize, usize, usize)] = match ids.len() {
        3 => &[(0, 1, 2)],
        4 => &[(0, 1, 2), (0, 2, 3)],
        _ => &[],
    };
    let k = fan_start(ids, vertices, x, y);
    let n = ids.len().max(1);
    let at = move |i: usize| ids[(i + k) % n];
    fan.iter().filter_map(move |&(a, b, c)| Triangle::new(at(a), at(b), at(c)))
}

/// Triangle extractor configuration.
#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    /// Candidates with `|2·area|` at or below this are discarded.
    pub degeneracy_tolerance: f64,
}

impl Default for Extractor {
    fn default() -> Self {
        Extractor { degeneracy_tolerance: DEGENERACY_TOLERANCE }
    }
}

impl Extractor {
    pub fn new(degeneracy_tolerance: f64) -> Self {
        Extractor { degeneracy_tolerance }
    }

    /// Scan every 2×2 window of `map` and collect the deduplicated,
    /// non-degenerate triangles.
    ///
    /// Every triangle's IDs index `vertices`; the map must have been built
    /// from the same vertex set.
    pub fn extract(&self, map: &OwnershipMap, vertices: &[Point]) -> TriangleSet {
        self.extract_counted(map, vertices).0
    }

    /// [`extract`](Self::extract), also reporting how many candidates the
    /// windows produced and how many the degeneracy filter dropped.
    pub fn extract_counted(&self, map: &OwnershipMap, vertices: &[Point]) -> (TriangleSet, ExtractStats) {
        let mut set = TriangleSet::new();
        let mut stats = ExtractStats::default();
        if map.rows() < 2 || map.cols() < 2 {
            return (set, stats);
        }
        for y in 0..map.rows() - 1 {
            for x in 0..map.cols() - 1 {
                let (ids, n) = window_owners(map, x, y);
                for t in window_candidates(&ids[..n], vertices, x, y) {
                    stats.candidates += 1;
                    if !t.is_valid_for(vertices.len())
                        || t.is_degenerate(vertices, self.degeneracy_tolerance)
                    {
                        stats.rejected += 1;
                        continue;
                    }
                    set.insert(t);
                }
            }
        }
        log::debug!(
            "extract: {} candidates, {} rejected, {} unique triangles",
            stats.candidates,
            stats.rejected,
            set.len()
        );
        (set, stats)
    }
}

/// Candidate counts from one extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub candidates: usize,
    /// Candidates dropped as degenerate or out of range.
    pub rejected: usize,
}

/// Extract with the default tolerance.
pub fn extract(map: &OwnershipMap, vertices: &[Point]) -> TriangleSet {
    Extractor::default().extract(map, vertices)
}
