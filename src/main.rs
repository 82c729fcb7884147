use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};

use ball_tracker_rs::analysis::analyze_trajectory;
use ball_tracker_rs::config::{load_config, PipelineConfig};
use ball_tracker_rs::frames::{list_frame_files, load_gray_frame, FrameRange, Roi};
use ball_tracker_rs::physics::{compute_viscosity, ArrheniusCalibration, StokesParameters};
use ball_tracker_rs::pipeline::TrajectoryEstimator;
use ball_tracker_rs::session::{SessionExport, SessionMetadata};

#[derive(Parser, Debug)]
#[command(name = "ball_tracker")]
#[command(about = "Falling-ball viscometer - track a dark ball and estimate viscosity", long_about = None)]
struct Args {
    /// Directory of extracted frames, processed in file-name order
    #[arg(long)]
    frames_dir: PathBuf,

    /// Frames per second of the recording
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// Region of interest as x1 y1 x2 y2 (full frame when omitted)
    #[arg(long, num_args = 4, value_names = ["X1", "Y1", "X2", "Y2"], allow_negative_numbers = true)]
    roi: Option<Vec<i64>>,

    /// First frame index (0-based)
    #[arg(long, default_value_t = 0)]
    start: usize,

    /// End frame index, exclusive (defaults to the number of frames)
    #[arg(long)]
    end: Option<usize>,

    /// JSON pipeline config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Session output (.json or .json.gz)
    #[arg(long, default_value = "ball_tracker_session.json")]
    output: PathBuf,

    /// Also write the track as CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Real ball diameter in mm, enables the viscosity estimate
    #[arg(long)]
    ball_diameter_mm: Option<f64>,

    /// Local gravitational acceleration (m/s²)
    #[arg(long, default_value_t = 9.81)]
    gravity: f64,

    /// Ball density (kg/m³)
    #[arg(long)]
    ball_density: Option<f64>,

    /// Liquid density (kg/m³)
    #[arg(long)]
    liquid_density: Option<f64>,

    /// Liquid temperature for the Arrhenius comparison (°C)
    #[arg(long)]
    calibration_temp_c: Option<f64>,

    /// Manufacturer viscosity at 40 °C (cP)
    #[arg(long)]
    visc_40c_cp: Option<f64>,

    /// Manufacturer viscosity at 100 °C (cP)
    #[arg(long)]
    visc_100c_cp: Option<f64>,
}

impl Args {
    fn stokes_parameters(&self) -> Result<Option<StokesParameters>> {
        let Some(ball_diameter_mm) = self.ball_diameter_mm else {
            return Ok(None);
        };
        match (self.ball_density, self.liquid_density) {
            (Some(ball_density), Some(liquid_density)) => Ok(Some(StokesParameters {
                ball_diameter_mm,
                gravity: self.gravity,
                ball_density,
                liquid_density,
            })),
            _ => bail!("--ball-diameter-mm requires --ball-density and --liquid-density"),
        }
    }

    fn calibration(&self) -> Option<(f64, f64, f64)> {
        Some((self.calibration_temp_c?, self.visc_40c_cp?, self.visc_100c_cp?))
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if !(args.fps > 0.0) {
        bail!("--fps must be positive, got {}", args.fps);
    }
    let stokes = args.stokes_parameters()?;
    if let Some(params) = &stokes {
        params.validate().context("invalid physical parameters")?;
    }

    let mut config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.dt = 1.0 / args.fps;

    let files = list_frame_files(&args.frames_dir)
        .with_context(|| format!("failed to list frames in {}", args.frames_dir.display()))?;
    let range = FrameRange::new(args.start, args.end.unwrap_or(files.len()));
    range.validate(files.len())?;
    let roi = args
        .roi
        .as_deref()
        .map(|c| Roi::from_corners(c[0], c[1], c[2], c[3]))
        .transpose()?;

    info!("Ball Tracker Starting");
    info!("  Frames: {} ({}..{})", args.frames_dir.display(), range.start, range.end);
    info!("  FPS: {}", args.fps);
    info!("  ROI: {:?}", roi);

    let mut metadata = SessionMetadata::new(args.fps);
    metadata.roi = roi;
    metadata.frame_range = Some(range);

    let mut estimator = TrajectoryEstimator::new(config.clone());
    for (index, path) in files.iter().enumerate().take(range.end).skip(range.start) {
        let frame = load_gray_frame(path)
            .with_context(|| format!("failed to load frame {}", path.display()))?;
        let region = match &roi {
            Some(roi) => roi.crop(&frame)?,
            None => frame.view(),
        };
        estimator.process_frame(index, region)?;
        metadata.frames_processed += 1;
        if metadata.frames_processed % 50 == 0 {
            info!("Processed {}/{} frames", metadata.frames_processed, range.len());
        }
    }
    metadata.frames_skipped = estimator.skipped_frames();
    metadata.frames_predicted = estimator.predicted_frames();
    info!(
        "Tracked {} of {} frames ({} predicted, {} skipped)",
        estimator.track_points().len(),
        metadata.frames_processed,
        metadata.frames_predicted,
        metadata.frames_skipped
    );

    let tracker_state = estimator.tracker().map(|t| t.get_state());
    let mut session = SessionExport::new(metadata, config, estimator.into_track_points());
    session.tracker_state = tracker_state;
    let analysis = analyze_trajectory(&session.track_points, args.fps)
        .context("no usable trajectory, check the ROI and frame range")?;

    if let Some(params) = &stokes {
        let result = compute_viscosity(
            params,
            analysis.terminal_velocity_px_s,
            analysis.average_diameter_px,
        )?;
        info!(
            "Viscosity {:.5} Pa·s ({:.3} mm/px, {:.3} mm/s)",
            result.viscosity_pa_s, result.mm_per_pixel, result.velocity_mm_s
        );
        if let Some((temperature_c, cp40, cp100)) = args.calibration() {
            let report = ArrheniusCalibration::from_reference(cp40, cp100)?
                .report(temperature_c, result.viscosity_pa_s);
            info!(
                "Expected {:.5} Pa·s at {:.1} °C, relative error {:.1}%",
                report.expected_viscosity_pa_s,
                temperature_c,
                report.relative_error * 100.0
            );
            session.calibration = Some(report);
        }
        session.viscosity = Some(result);
    } else if args.calibration().is_some() {
        warn!("Calibration needs --ball-diameter-mm, skipping");
    }
    session.analysis = Some(analysis);

    session
        .write(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    if let Some(csv) = &args.csv {
        session
            .write_csv(csv)
            .with_context(|| format!("failed to write {}", csv.display()))?;
    }

    Ok(())
}
