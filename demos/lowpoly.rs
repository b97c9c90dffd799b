// demos/lowpoly.rs
//
// Turn a picture into a low-poly image, or triangulate a vertex file.
//
// Usage:
//   cargo run --example lowpoly --release -- -i photo.jpg [-v 1000] [-e 0.8] [-c] [-o out]
//   cargo run --example lowpoly --release -- -f points.txt [-c] [-o out]
//
//   -i <image>   source image (PNG/JPEG)
//   -f <file>    vertex file: "n rows cols" then n "x y" lines
//   -v <n>       vertex budget (default 1000)
//   -e <p>       fraction of vertices placed on edges (default 0.8)
//   -c           use the CPU engine (default: GPU)
//   -o <dir>     output directory (default: current directory)
//
// Output (in <dir>):
//   triangle.png         low-poly rendering                (image input)
//   edges.png, points.png  edge map and sampled vertices   (image input)
//   voronoi.png          ownership map                     (CPU engine)
//   triangle_lines.png   triangle outlines over voronoi    (CPU engine)
//   stdout               timing summary

use lowpoly::engine::{triangulate_cpu_with, EngineConfig};
use lowpoly::gpu::{GpuDevice, GpuSeedMap, GpuTriangulator};
use lowpoly::image::{Image, Pixel, Rgb};
use lowpoly::lowpoly::{generate, Backend, LowPolyConfig};
use lowpoly::points_file::VertexInput;
use lowpoly::render::{draw_points, draw_triangle_edges, draw_voronoi};
use lowpoly::sampler::SamplerConfig;
use lowpoly::{OwnershipMap, Point, TriangleSet};

use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

struct Args {
    image: Option<PathBuf>,
    points: Option<PathBuf>,
    num_vertices: usize,
    edge_portion: f32,
    cpu: bool,
    out_dir: PathBuf,
}

fn usage(program: &str) -> ! {
    eprintln!("Usage: {program} (-i <image> | -f <points file>) [-v n] [-e portion] [-c] [-o dir]");
    std::process::exit(1);
}

fn parse_args() -> Args {
    let argv: Vec<String> = env::args().collect();
    let program = argv[0].clone();
    let mut args = Args {
        image: None,
        points: None,
        num_vertices: SamplerConfig::default().num_vertices,
        edge_portion: SamplerConfig::default().edge_portion,
        cpu: false,
        out_dir: PathBuf::from("."),
    };
    let mut it = argv.into_iter().skip(1);
    while let Some(flag) = it.next() {
        let mut value = || it.next().unwrap_or_else(|| usage(&program));
        match flag.as_str() {
            "-i" => args.image = Some(PathBuf::from(value())),
            "-f" => args.points = Some(PathBuf::from(value())),
            "-v" => args.num_vertices = value().parse().unwrap_or_else(|_| usage(&program)),
            "-e" => args.edge_portion = value().parse().unwrap_or_else(|_| usage(&program)),
            "-o" => args.out_dir = PathBuf::from(value()),
            "-c" => args.cpu = true,
            other => {
                eprintln!("Unrecognized argument: {other}");
                usage(&program);
            }
        }
    }
    if args.image.is_none() == args.points.is_none() {
        usage(&program);
    }
    args
}

fn main() {
    let start = Instant::now();
    let args = parse_args();
    std::fs::create_dir_all(&args.out_dir).expect("create output directory");
    println!("Using {}", if args.cpu { "CPU" } else { "GPU" });

    match (&args.image, &args.points) {
        (Some(path), _) => run_image(&args, path),
        (None, Some(path)) => run_points(&args, path),
        (None, None) => unreachable!(),
    }

    println!("Total time: {:.2} ms", start.elapsed().as_secs_f64() * 1e3);
}

fn run_image(args: &Args, path: &Path) {
    let img = load_rgb(path);
    println!("Image: {} ({}×{})", path.display(), img.width(), img.height());

    let config = LowPolyConfig {
        sampler: SamplerConfig {
            num_vertices: args.num_vertices,
            edge_portion: args.edge_portion,
            ..Default::default()
        },
        engine: EngineConfig::default(),
        backend: if args.cpu { Backend::Cpu } else { Backend::Gpu },
    };
    let out = generate(&img, &config).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
    println!(
        "Vertices: {}  Triangles: {}  Triangulation time: {:.2} ms",
        out.vertices.len(),
        out.triangles.len(),
        out.triangulation_time.as_secs_f64() * 1e3
    );

    save_gray(&out.edges.map(|v| u8::from_f32(v * 255.0)), &args.out_dir.join("edges.png"));
    save_gray(&draw_points(&out.vertices, img.width(), img.height()), &args.out_dir.join("points.png"));
    if let Some(map) = &out.ownership {
        save_debug(map, &out.vertices, &out.triangles, &args.out_dir);
    }
    save_rgb(&out.image, &args.out_dir.join("triangle.png"));
}

fn run_points(args: &Args, path: &Path) {
    let input = VertexInput::from_file(path).unwrap_or_else(|e| {
        eprintln!("Error loading {}: {e}", path.display());
        std::process::exit(1);
    });
    println!("Vertices: {} on {}×{}", input.vertices.len(), input.rows, input.cols);

    let comp_start = Instant::now();
    if args.cpu {
        let result = triangulate_cpu_with(&EngineConfig::default(), &input.vertices, input.rows, input.cols);
        let (triangles, map) = result.unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            std::process::exit(1);
        });
        report(&triangles, comp_start);
        save_debug(&map, &input.vertices, &triangles, &args.out_dir);
    } else {
        let gpu = GpuDevice::new().unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            std::process::exit(1);
        });
        let engine = GpuTriangulator::new(&gpu);
        let result = GpuSeedMap::prepare(&gpu, &input.vertices, input.rows, input.cols)
            .and_then(|seeds| engine.triangulate(&gpu, &seeds));
        let triangles = result.unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            std::process::exit(1);
        });
        report(&triangles, comp_start);
    }
}

fn report(triangles: &TriangleSet, since: Instant) {
    println!(
        "Triangles: {}  Delaunay time: {:.2} ms",
        triangles.len(),
        since.elapsed().as_secs_f64() * 1e3
    );
}

fn save_debug(map: &OwnershipMap, vertices: &[Point], triangles: &TriangleSet, dir: &Path) {
    let mut voronoi = draw_voronoi(map);
    save_rgb(&voronoi, &dir.join("voronoi.png"));
    draw_triangle_edges(&mut voronoi, vertices, triangles, Rgb::WHITE);
    save_rgb(&voronoi, &dir.join("triangle_lines.png"));
}

// ---------------------------------------------------------------------------
// Image I/O
// ---------------------------------------------------------------------------

fn load_rgb(path: &Path) -> Image<Rgb> {
    let img = image::open(path)
        .unwrap_or_else(|e| panic!("Failed to load {}: {}", path.display(), e))
        .to_rgb8();
    let (w, h) = img.dimensions();
    let pixels = img.pixels().map(|p| Rgb::new(p[0], p[1], p[2])).collect();
    Image::from_vec(w as usize, h as usize, pixels).expect("decoder returned w*h pixels")
}

fn save_rgb(img: &Image<Rgb>, path: &Path) {
    let raw: Vec<u8> = img.as_slice().iter().flat_map(|p| [p.r, p.g, p.b]).collect();
    image::RgbImage::from_raw(img.width() as u32, img.height() as u32, raw)
        .expect("buffer matches dimensions")
        .save(path)
        .unwrap_or_else(|e| panic!("Failed to save {}: {}", path.display(), e));
    println!("Wrote {}", path.display());
}

fn save_gray(img: &Image<u8>, path: &Path) {
    image::GrayImage::from_raw(img.width() as u32, img.height() as u32, img.as_slice().to_vec())
        .expect("buffer matches dimensions")
        .save(path)
        .unwrap_or_else(|e| panic!("Failed to save {}: {}", path.display(), e));
    println!("Wrote {}", path.display());
}
