//! eyefeat CLI: pupil / corneal-reflection finding on image sequences.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use eyefeat::{
    CompositeFeatureFinder, Disk, ExtremumStrategy, FeatureFinderConfig, FeatureRecord,
    FitAlgorithm, Frame, RecordStatus, SyntheticEye,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "eyefeat")]
#[command(about = "Find pupil and corneal reflection in eye-camera frames")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one image or an ordered sequence of frames.
    Analyze(CliAnalyzeArgs),

    /// Print the default finder configuration as JSON.
    DefaultConfig,

    /// Render a synthetic eye image.
    Synth(CliSynthArgs),
}

#[derive(Debug, Clone, Args)]
struct CliAnalyzeArgs {
    /// Input frames, analyzed in the given order.
    #[arg(long, required = true, num_args = 1..)]
    image: Vec<PathBuf>,

    /// Path to write the feature records (JSON array).
    #[arg(long)]
    out: PathBuf,

    /// Finder configuration (JSON); defaults are used for missing fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run the coarse pass on every frame instead of tracking.
    #[arg(long)]
    no_tracking: bool,

    /// Frame rate used to stamp frames (Hz).
    #[arg(long, default_value = "60.0")]
    frame_rate: f64,

    /// Store starburst boundary points in each record.
    #[arg(long)]
    keep_boundary: bool,

    /// Use the connected-component extremum search with this score threshold.
    #[arg(long)]
    albino_threshold: Option<f32>,

    /// Shape model for the boundary points.
    #[arg(long, value_enum)]
    fit: Option<FitArg>,

    /// Mark the records as taken during calibration.
    #[arg(long)]
    calibrating: bool,

    /// Directory to write each reseeded frame's symmetry map (normalized PNG).
    #[arg(long)]
    symmetry_map_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FitArg {
    Circle,
    CircleRansac,
    Ellipse,
    Mean,
}

impl FitArg {
    fn to_core(self) -> FitAlgorithm {
        match self {
            Self::Circle => FitAlgorithm::CircleLeastSquares,
            Self::CircleRansac => FitAlgorithm::CircleLeastSquaresRansac,
            Self::Ellipse => FitAlgorithm::EllipseLeastSquares,
            Self::Mean => FitAlgorithm::Mean,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct CliSynthArgs {
    /// Path to write the PNG.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, default_value = "160")]
    width: usize,

    #[arg(long, default_value = "120")]
    height: usize,

    #[arg(long, default_value = "60.0")]
    pupil_x: f32,

    #[arg(long, default_value = "40.0")]
    pupil_y: f32,

    #[arg(long, default_value = "10.0")]
    pupil_radius: f32,

    #[arg(long, default_value = "58.0")]
    cr_x: f32,

    #[arg(long, default_value = "35.0")]
    cr_y: f32,

    /// CR radius; zero renders no reflection.
    #[arg(long, default_value = "3.0")]
    cr_radius: f32,

    /// Gaussian blur sigma applied after drawing.
    #[arg(long)]
    blur: Option<f32>,
}

impl CliAnalyzeArgs {
    fn build_config(&self) -> CliResult<FeatureFinderConfig> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!("Loading config: {}", path.display());
                FeatureFinderConfig::from_json_file(path)?
            }
            None => FeatureFinderConfig::default(),
        };

        if self.symmetry_map_dir.is_some() {
            config.diagnostics.keep_symmetry_map = true;
        }
        if self.keep_boundary {
            config.diagnostics.keep_boundary_points = true;
        }
        if let Some(threshold) = self.albino_threshold {
            config.radial.extremum = ExtremumStrategy::Albino { threshold };
        }
        if let Some(fit) = self.fit {
            config.fitting.algorithm = fit.to_core();
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => run_analyze(&args),
        Commands::DefaultConfig => run_default_config(),
        Commands::Synth(args) => run_synth(&args),
    }
}

// ── default-config ─────────────────────────────────────────────────────

fn run_default_config() -> CliResult<()> {
    let json = serde_json::to_string_pretty(&FeatureFinderConfig::default())?;
    println!("{json}");
    Ok(())
}

// ── synth ──────────────────────────────────────────────────────────────

fn run_synth(args: &CliSynthArgs) -> CliResult<()> {
    let base = SyntheticEye::default();
    let eye = SyntheticEye {
        width: args.width,
        height: args.height,
        pupil: Disk {
            center: [args.pupil_x, args.pupil_y],
            radius: args.pupil_radius,
            ..base.pupil
        },
        cr: base.cr.filter(|_| args.cr_radius > 0.0).map(|cr| Disk {
            center: [args.cr_x, args.cr_y],
            radius: args.cr_radius,
            ..cr
        }),
        blur_sigma: args.blur,
        ..base
    };
    if eye.width == 0 || eye.height == 0 {
        return Err("synthetic image must be at least 1x1".into());
    }

    eye.render_gray().save(&args.out)?;
    tracing::info!(
        "Synthetic {}x{} eye written to {}",
        eye.width,
        eye.height,
        args.out.display()
    );
    Ok(())
}

// ── analyze ────────────────────────────────────────────────────────────

fn run_analyze(args: &CliAnalyzeArgs) -> CliResult<()> {
    if !(args.frame_rate.is_finite() && args.frame_rate > 0.0) {
        return Err(format!("--frame-rate must be positive, got {}", args.frame_rate).into());
    }
    let config = args.build_config()?;
    if let Some(dir) = &args.symmetry_map_dir {
        std::fs::create_dir_all(dir)?;
    }
    let mut finder = CompositeFeatureFinder::with_config(config);
    finder.set_calibrating(args.calibrating);

    let mut records: Vec<FeatureRecord> = Vec::with_capacity(args.image.len());
    for (i, path) in args.image.iter().enumerate() {
        let img = image::open(path).map_err(|e| -> CliError {
            format!("Failed to open image {}: {}", path.display(), e).into()
        })?;
        let gray = img.to_luma8();
        tracing::debug!("Frame {}: {} ({}x{})", i, path.display(), gray.width(), gray.height());

        let frame = Frame::from_gray(&gray)
            .with_frame_number(i as u64)
            .with_timestamp(i as f64 / args.frame_rate);
        let guess = if args.no_tracking {
            None
        } else {
            records.last()
        };
        let mut record = finder.analyze(&frame, guess)?;
        if let (Some(dir), Some(map)) = (&args.symmetry_map_dir, record.symmetry_map.take()) {
            let map_path = dir.join(format!("frame_{i:05}.png"));
            map.scores.to_gray_normalized().save(&map_path)?;
            tracing::debug!("Symmetry map written to {}", map_path.display());
        }
        records.push(record);
    }

    let complete = count_status(&records, RecordStatus::Complete);
    let partial = count_status(&records, RecordStatus::Partial);
    let stats = finder.stats();
    tracing::info!(
        "Analyzed {} frames: {} complete, {} partial, {} failed",
        records.len(),
        complete,
        partial,
        records.len() - complete - partial,
    );
    tracing::info!(
        "Reseeds: {}, tracked: {}, patch fallbacks: {}, full-frame fallbacks: {}",
        stats.reseeds,
        stats.tracked_frames,
        stats.patch_fallbacks,
        stats.full_frame_fallbacks,
    );

    let json = serde_json::to_string_pretty(&records)?;
    std::fs::write(&args.out, &json)?;
    tracing::info!("Results written to {}", args.out.display());

    Ok(())
}

fn count_status(records: &[FeatureRecord], status: RecordStatus) -> usize {
    records.iter().filter(|r| r.status == status).count()
}
