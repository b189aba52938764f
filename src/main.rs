//! Piranesi - map an image onto a quadrilateral with Piranesi's perspective
//!
//! Reads an image, warps it onto the four corners given on the command line
//! (or in a configuration file) and writes the result. Pixels outside the
//! quadrilateral are transparent, or black for formats without alpha.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use piranesi::{image_io, Config, GeometryReport, PiranesiTransform, Point};

/// Piranesi perspective transformation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input image filename
    #[arg(required_unless_present = "geometry")]
    input: Option<PathBuf>,

    /// Output image filename
    #[arg(required_unless_present = "geometry")]
    output: Option<PathBuf>,

    /// Output width
    #[arg(long)]
    width: Option<u32>,

    /// Output height
    #[arg(long)]
    height: Option<u32>,

    /// Bottom-left X coordinate
    #[arg(long, allow_negative_numbers = true)]
    x1: Option<f64>,

    /// Bottom-left Y coordinate
    #[arg(long, allow_negative_numbers = true)]
    y1: Option<f64>,

    /// Bottom-right X coordinate
    #[arg(long, allow_negative_numbers = true)]
    x2: Option<f64>,

    /// Bottom-right Y coordinate
    #[arg(long, allow_negative_numbers = true)]
    y2: Option<f64>,

    /// Top-right X coordinate
    #[arg(long, allow_negative_numbers = true)]
    x3: Option<f64>,

    /// Top-right Y coordinate
    #[arg(long, allow_negative_numbers = true)]
    y3: Option<f64>,

    /// Top-left X coordinate
    #[arg(long, allow_negative_numbers = true)]
    x4: Option<f64>,

    /// Top-left Y coordinate
    #[arg(long, allow_negative_numbers = true)]
    y4: Option<f64>,

    /// Sampling grid cells per axis
    #[arg(long)]
    grid_size: Option<u32>,

    /// Configuration file path (created with defaults if missing)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the solved vanishing points and scale factors as JSON and exit
    #[arg(long)]
    geometry: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Command-line values take precedence over the configuration file
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(width) = self.width {
            config.canvas.width = width;
        }
        if let Some(height) = self.height {
            config.canvas.height = height;
        }
        if let Some(size) = self.grid_size {
            config.grid.size = size;
        }

        let corners = [
            (&mut config.corners.a, self.x1, self.y1),
            (&mut config.corners.b, self.x2, self.y2),
            (&mut config.corners.c, self.x3, self.y3),
            (&mut config.corners.d, self.x4, self.y4),
        ];
        for (corner, x, y) in corners {
            *corner = Point::new(x.unwrap_or(corner.x), y.unwrap_or(corner.y));
        }
    }
}

/// Log level used when RUST_LOG is not set
fn default_directive(verbose: bool) -> String {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    level.to_string().to_lowercase()
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over --verbose when set
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(args.verbose)));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load_or_create(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::default(),
    };
    args.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    let transform =
        PiranesiTransform::from_config(&config).context("Failed to set up transform")?;

    if args.geometry {
        let report = GeometryReport::new(&transform);
        let json = serde_json::to_string_pretty(&report).context("Failed to encode geometry")?;
        println!("{}", json);
        return Ok(());
    }

    // Both are required by clap unless --geometry is given
    let (Some(input), Some(output)) = (&args.input, &args.output) else {
        anyhow::bail!("Input and output filenames are required");
    };

    info!("Piranesi v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Canvas {}x{}, grid {}",
        config.canvas.width, config.canvas.height, config.grid.size
    );

    let source = image_io::load_rgba(input)
        .with_context(|| format!("Failed to read input image {:?}", input))?;
    info!("Input {:?}: {}x{}", input, source.width(), source.height());

    let started = Instant::now();
    let warped = piranesi::warp(&source, &transform, config.grid.size)
        .context("Failed to warp image")?;
    info!("Warped in {:.1?}", started.elapsed());

    image_io::save(&warped, output)
        .with_context(|| format!("Failed to write output image {:?}", output))?;
    info!("Wrote {:?}", output);

    Ok(())
}
