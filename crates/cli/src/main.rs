//! canopygap CLI - canopy and canopy-gap delineation

mod geojson_io;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use canopygap_algorithms::classification::canopy_height_model;
use canopygap_algorithms::morphology::MorphOp;
use canopygap_algorithms::pipeline::{run_imagery_pipeline, run_lidar_pipeline, PipelineConfig, PipelineOutput};
use canopygap_algorithms::segmentation::{segment_image, segment_mean_raster, SegmentSource};
use canopygap_core::io::{read_geotiff, read_geotiff_band, write_geotiff};
use canopygap_core::vector::{LinearUnit, PolygonCollection};
use canopygap_core::{MultiBandRaster, Raster, CRS};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "canopygap")]
#[command(author, version, about = "Canopy and canopy-gap delineation", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Common {
    /// Study boundary (GeoJSON); defaults to the raster footprint
    #[arg(short, long)]
    boundary: Option<PathBuf>,
    /// CRS of the boundary when the file does not name one (default EPSG:4326)
    #[arg(long)]
    boundary_crs: Option<String>,
    /// Output directory for GeoJSON and summary files
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,
    /// Pipeline configuration (JSON); flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Canopy buffer distance in CRS linear units
    #[arg(long, allow_hyphen_values = true)]
    buffer: Option<f64>,
    /// CRS linear unit for acreage: feet or metre
    #[arg(long)]
    unit: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Canopy gaps from a LiDAR canopy height raster
    Lidar {
        /// Canopy height raster, or first-return surface with --ground
        input: PathBuf,
        /// Ground surface; canopy height is input minus ground
        #[arg(short, long)]
        ground: Option<PathBuf>,
        /// Minimum canopy height
        #[arg(long)]
        canopy_height: Option<f64>,
        /// Mask cleaning: opening or closing
        #[arg(long)]
        operation: Option<String>,
        /// Structuring element size (odd)
        #[arg(long)]
        size: Option<usize>,
        #[command(flatten)]
        common: Common,
    },
    /// Canopy gaps from four-band (red, green, blue, NIR) imagery
    Imagery {
        /// Four-band image
        input: PathBuf,
        /// Segmentation source: ndvi or spectral
        #[arg(long)]
        source: Option<String>,
        /// Number of k-means clusters
        #[arg(short = 'k', long)]
        clusters: Option<usize>,
        /// Also write the per-segment mean raster here
        #[arg(long)]
        segment_means: Option<PathBuf>,
        #[command(flatten)]
        common: Common,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_band(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> = read_geotiff_band(path)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn read_image(path: &Path) -> Result<MultiBandRaster<f64>> {
    let pb = spinner("Reading image...");
    let image: MultiBandRaster<f64> =
        read_geotiff(path).with_context(|| format!("Failed to read image {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}, {} band(s)", image.cols(), image.rows(), image.band_count());
    Ok(image)
}

fn read_boundary(common: &Common) -> Result<Option<PolygonCollection>> {
    let Some(path) = &common.boundary else {
        return Ok(None);
    };
    let default_crs = match &common.boundary_crs {
        Some(s) => s.parse::<CRS>().context("Invalid --boundary-crs")?,
        None => CRS::wgs84(),
    };
    let boundary = geojson_io::read_polygons(path, Some(default_crs))?;
    info!("Boundary: {} polygon(s)", boundary.len());
    Ok(Some(boundary))
}

fn load_config(common: &Common) -> Result<PipelineConfig> {
    let mut config = match &common.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&text).context("Invalid pipeline configuration")?
        }
        None => PipelineConfig::default(),
    };
    if let Some(distance) = common.buffer {
        config.gaps.buffer_distance = distance;
    }
    if let Some(unit) = &common.unit {
        config.gaps.unit = unit.parse::<LinearUnit>()?;
    }
    Ok(config)
}

fn write_outputs(output: &PipelineOutput, out_dir: &Path) -> Result<()> {
    let pb = spinner("Writing outputs...");
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    geojson_io::write_polygons(&output.canopy, &out_dir.join("canopy.geojson"))?;
    geojson_io::write_polygons(&output.buffered_canopy, &out_dir.join("buffered_canopy.geojson"))?;
    geojson_io::write_polygons(&output.gaps, &out_dir.join("gaps.geojson"))?;

    let summary = serde_json::to_string_pretty(&output.summary).context("Failed to serialize summary")?;
    std::fs::write(out_dir.join("summary.json"), summary).context("Failed to write summary")?;
    pb.finish_and_clear();
    Ok(())
}

fn report(output: &PipelineOutput, out_dir: &Path, elapsed: std::time::Duration) {
    let s = &output.summary;
    println!("Canopy polygons: {}", output.canopy.len());
    println!("Gaps: {} ({:.3} acres total)", s.count, s.total_acres);
    for bucket in &s.by_size_class {
        println!("  {:<16} {:>6}  {:>10.3} acres", bucket.label, bucket.count, bucket.acres);
    }
    println!("Outputs saved to: {}", out_dir.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Info { input } => {
            let image = read_image(&input)?;
            let band = image.band(0)?;
            let stats = band.statistics();

            println!("File: {}", input.display());
            println!(
                "Dimensions: {} x {} ({} cells), {} band(s)",
                image.cols(),
                image.rows(),
                band.len(),
                image.band_count()
            );
            if let Some(t) = image.transform() {
                println!("Cell size: {} x {}", t.pixel_width, t.pixel_height.abs());
            }
            if let Some((min_x, min_y, max_x, max_y)) = band.bounds() {
                println!("Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})", min_x, min_y, max_x, max_y);
            }
            match image.crs() {
                Some(crs) => println!("CRS: {}", crs),
                None => println!("CRS: (none)"),
            }
            println!("\nBand 1 statistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / band.len().max(1) as f64
            );
        }

        Commands::Lidar {
            input,
            ground,
            canopy_height,
            operation,
            size,
            common,
        } => {
            let mut config = load_config(&common)?;
            if let Some(h) = canopy_height {
                config.threshold.canopy_height = h;
            }
            if let Some(op) = operation {
                config.clean.operation = op.parse::<MorphOp>()?;
            }
            if let Some(size) = size {
                config.clean.size = size;
            }

            let surface = read_band(&input)?;
            let height = match ground {
                Some(path) => canopy_height_model(&surface, &read_band(&path)?)
                    .context("Failed to build canopy height model")?,
                None => surface,
            };
            let boundary = read_boundary(&common)?;

            let start = Instant::now();
            let output = run_lidar_pipeline(&height, boundary.as_ref(), &config)
                .context("LiDAR pipeline failed")?;
            let elapsed = start.elapsed();

            write_outputs(&output, &common.out_dir)?;
            report(&output, &common.out_dir, elapsed);
        }

        Commands::Imagery {
            input,
            source,
            clusters,
            segment_means,
            common,
        } => {
            let mut config = load_config(&common)?;
            if let Some(source) = source {
                config.segment.source = source.parse::<SegmentSource>()?;
            }
            if let Some(k) = clusters {
                config.segment.kmeans.k = k;
            }

            let image = read_image(&input)?;
            let boundary = read_boundary(&common)?;

            let start = Instant::now();
            let output = run_imagery_pipeline(&image, boundary.as_ref(), &config)
                .context("Imagery pipeline failed")?;
            let means = match &segment_means {
                Some(_) => Some(segment_mean_raster(&segment_image(&image, &config.segment)?)?),
                None => None,
            };
            let elapsed = start.elapsed();

            write_outputs(&output, &common.out_dir)?;
            if let (Some(path), Some(raster)) = (&segment_means, &means) {
                write_geotiff(raster, path).context("Failed to write segment means")?;
            }
            report(&output, &common.out_dir, elapsed);
        }
    }

    Ok(())
}
