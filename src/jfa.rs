// jfa.rs — Jump flooding, CPU reference.
//
// This is the exact algorithm the GPU flood kernel (shaders/jump_flood.wgsl)
// runs, written as plain loops. The GPU output is validated against it
// pixel-for-pixel; it is also selectable as a CPU ownership method.
//
// ALGORITHM
// ─────────
// 1. Seed: each vertex's own pixel holds its ID, everything else is unset.
// 2. For each step k in flood_steps(rows, cols), every pixel p looks at
//    itself and its 8 neighbours at offset ±k and keeps whichever candidate
//    owner's vertex is nearest to p (unset counts as infinitely far, ties go
//    to the lower ID).
// 3. Fallback: any cell still unset is filled by a full scan.
//
// Each pass reads only the previous pass's buffer and writes only its own
// cell of the next buffer (ping-pong). An in-place update would let a pixel
// see values written earlier in the same pass, making the result depend on
// traversal order.
//
// Jump flooding is approximate: a pixel can end up with a vertex that is
// not its true nearest when the true owner's region is "shadowed" at the
// sampled offsets. The extra step-1 pass at the end removes most of these.

use crate::error::Result;
use crate::geometry::Point;
use crate::ownership::{nearest_vertex, validate, OwnershipMap, UNSET_OWNER};

/// Offsets visited by every pass, in units of the step size.
pub const NEIGHBOURHOOD: [(i32, i32); 9] = [
    (-1, -1), (0, -1), (1, -1),
    (-1,  0), (0,  0), (1,  0),
    (-1,  1), (0,  1), (1,  1),
];

/// Step sizes for a `rows × cols` raster: ⌈log2(max)⌉ + 1 passes, halving
/// from half the next power of two down to 1, followed by one more pass at
/// step 1.
///
/// ```
/// assert_eq!(lowpoly::jfa::flood_steps(10, 10), vec![8, 4, 2, 1, 1]);
/// assert_eq!(lowpoly::jfa::flood_steps(1, 1), vec![1]);
/// ```
pub fn flood_steps(rows: usize, cols: usize) -> Vec<u32> {
    let n = rows.max(cols).max(1);
    let mut steps = Vec::new();
    let mut k = n.next_power_of_two() / 2;
    while k >= 1 {
        steps.push(k as u32);
        k /= 2;
    }
    steps.push(1);
    steps
}

/// Build the initial seed map: every vertex pixel holds its ID. When two
/// vertices share a pixel the lower ID is kept.
pub fn seed_map(vertices: &[Point], rows: usize, cols: usize) -> Result<OwnershipMap> {
    validate(vertices, rows, cols)?;
    let mut map = OwnershipMap::new(rows, cols)?;
    for (id, v) in vertices.iter().enumerate().rev() {
        map.set(v.x as usize, v.y as usize, id as u32);
    }
    Ok(map)
}

/// One flood pass at `step`, reading `src` and writing every cell of `dst`.
///
/// # Panics
/// Panics if the two maps have different extents.
pub fn flood_pass(src: &OwnershipMap, dst: &mut OwnershipMap, vertices: &[Point], step: u32) {
    assert_eq!((src.rows(), src.cols()), (dst.rows(), dst.cols()));
    let rows = src.rows() as i64;
    let cols = src.cols() as i64;
    let step = step as i64;
    let owners = src.as_slice();
    let out = dst.as_mut_slice();

    for y in 0..rows {
        for x in 0..cols {
            let p = Point::new(x as i32, y as i32);
            let mut best = UNSET_OWNER;
            let mut best_d = i64::MAX;
            for &(dx, dy) in &NEIGHBOURHOOD {
                let nx = x + dx as i64 * step;
                let ny = y + dy as i64 * step;
                if nx < 0 || ny < 0 || nx >= cols || ny >= rows {
                    continue;
                }
                let cand = owners[(ny * cols + nx) as usize];
                if cand == UNSET_OWNER {
                    continue;
                }
                let d = p.dist_sq(vertices[cand as usize]);
                if d < best_d || (d == best_d && cand < best) {
                    best = cand;
                    best_d = d;
                }
            }
            out[(y * cols + x) as usize] = best;
        }
    }
}

/// Run the full pass schedule on a seed map. The fallback fill is not
/// applied; see [`fill_unset`].
pub fn jump_flood(seeds: &OwnershipMap, vertices: &[Point]) -> OwnershipMap {
    let mut src = seeds.clone();
    let mut dst = seeds.clone();
    for step in flood_steps(seeds.rows(), seeds.cols()) {
        flood_pass(&src, &mut dst, vertices, step);
        std::mem::swap(&mut src, &mut dst);
    }
    src
}

/// Fill every unset cell with its exact nearest vertex. Returns the number
/// of cells filled.
pub fn fill_unset(map: &mut OwnershipMap, vertices: &[Point]) -> usize {
    let cols = map.cols();
    let mut filled = 0;
    for (i, cell) in map.as_mut_slice().iter_mut().enumerate() {
        if *cell == UNSET_OWNER {
            let p = Point::new((i % cols) as i32, (i / cols) as i32);
            *cell = nearest_vertex(vertices, p);
            filled += 1;
        }
    }
    filled
}

/// Seed, flood and fill: the CPU twin of the GPU ownership builder.
pub fn build_jump_flood(vertices: &[Point], rows: usize, cols: usize) -> Result<OwnershipMap> {
    let seeds = seed_map(vertices, rows, cols)?;
    let mut map = jump_flood(&seeds, vertices);
    let filled = fill_unset(&mut map, vertices);
    if filled > 0 {
        log::debug!("jump flood left {filled} unset cells; filled by full scan");
    }
    Ok(map)
}
