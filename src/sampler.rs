// sampler.rs — Edge-weighted vertex selection.
//
// Facets look best when their corners sit on image edges, so most vertices
// are drawn from pixels with a strong gradient and the rest are spread over
// flat areas to keep large regions from becoming slivers.
//
// With E edge pixels (edge map ≥ threshold) out of P total and a budget
// of N vertices:
//
//   edge vertices      Ne = min(⌊N · edge_portion⌋, E)
//   non-edge vertices  Nn = N − Ne
//   edge probability      pe = Ne / E
//   non-edge probability  pn = Nn / (P − E)
//
// Every pixel is then kept independently with its class probability, so
// the expected count is N. The raster corners are optionally added first;
// without them the outer band of the image has no facet covering it.
// If the draw overshoots, a random subset is kept so the result never
// exceeds N.

use crate::geometry::Point;
use crate::gradient::count_edges;
use crate::image::Image;

/// Vertex sampler settings.
#[derive(Debug, Clone, Copy)]
pub struct SamplerConfig {
    /// Upper bound on the number of vertices returned.
    pub num_vertices: usize,
    /// Fraction of the budget placed on edge pixels.
    pub edge_portion: f32,
    /// Edge map value at or above which a pixel counts as an edge.
    pub edge_threshold: f32,
    /// RNG seed; the same seed and image give the same vertices.
    pub seed: u64,
    /// Add the four raster corners before sampling.
    pub include_corners: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            num_vertices: 1000,
            edge_portion: 0.8,
            edge_threshold: 0.1,
            seed: 0x10_0b01,
            include_corners: true,
        }
    }
}

/// Per-class keep probabilities for a raster of `total` pixels, `edges` of
/// which are edge pixels. Returns `(edge_p, non_edge_p)`.
pub fn keep_probabilities(config: &SamplerConfig, edges: usize, total: usize) -> (f32, f32) {
    let budget = (config.num_vertices as f32 * config.edge_portion) as usize;
    let edge_v = budget.min(edges);
    let non_edge_v = config.num_vertices.saturating_sub(edge_v);
    let edge_p = if edges == 0 { 0.0 } else { edge_v as f32 / edges as f32 };
    let flat = total - edges;
    let non_edge_p = if flat == 0 { 0.0 } else { non_edge_v as f32 / flat as f32 };
    (edge_p.min(1.0), non_edge_p.min(1.0))
}

/// Draw vertices from a normalised edge map.
///
/// The result is duplicate-free, inside the raster and at most
/// `config.num_vertices` long.
pub fn sample_vertices(edges: &Image<f32>, config: &SamplerConfig) -> Vec<Point> {
    let (w, h) = (edges.width(), edges.height());
    if w == 0 || h == 0 || config.num_vertices == 0 {
        return Vec::new();
    }
    let mut rng = fastrand::Rng::with_seed(config.seed);

    let mut vertices = Vec::with_capacity(config.num_vertices);
    if config.include_corners {
        let (r, b) = (w as i32 - 1, h as i32 - 1);
        for c in [Point::new(0, 0), Point::new(r, 0), Point::new(0, b), Point::new(r, b)] {
            if !vertices.contains(&c) {
                vertices.push(c);
            }
        }
        vertices.truncate(config.num_vertices);
    }

    let n_edges = count_edges(edges, config.edge_threshold);
    let (edge_p, non_edge_p) = keep_probabilities(config, n_edges, w * h);

    let mut drawn: Vec<Point> = edges
        .pixels()
        .filter(|&(_, _, v)| {
            let p = if v >= config.edge_threshold { edge_p } else { non_edge_p };
            rng.f32() < p
        })
        .map(|(x, y, _)| Point::new(x as i32, y as i32))
        .filter(|p| !vertices.contains(p))
        .collect();

    let room = config.num_vertices - vertices.len();
    if drawn.len() > room {
        rng.shuffle(&mut drawn);
        drawn.truncate(room);
        drawn.sort_by_key(|p| (p.y, p.x));
    }
    log::debug!(
        "sampler: {n_edges} edge pixels of {}, p_edge {edge_p:.4}, p_flat {non_edge_p:.6}, {} corners + {} drawn",
        w * h,
        vertices.len(),
        drawn.len()
    );
    vertices.extend(drawn);
    vertices
}
