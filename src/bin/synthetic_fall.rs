/// Synthetic fall: render a dark ball sinking at constant speed over a noisy
/// background, track it, and compare the estimated terminal velocity with the
/// true one.
///
/// Pass `--save-frames <dir>` to keep the rendered PNGs, which the
/// `ball_tracker` binary can then process.
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use image::GrayImage;
use log::info;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ball_tracker_rs::analysis::analyze_trajectory;
use ball_tracker_rs::config::PipelineConfig;
use ball_tracker_rs::pipeline::TrajectoryEstimator;

#[derive(Parser, Debug)]
#[command(name = "synthetic_fall")]
#[command(about = "Track a rendered falling ball and report velocity error", long_about = None)]
struct Args {
    #[arg(long, default_value_t = 60)]
    frames: usize,

    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// True fall speed (pixels per frame)
    #[arg(long, default_value_t = 4.0)]
    speed: f64,

    #[arg(long, default_value_t = 12, value_parser = clap::value_parser!(u32).range(1..))]
    radius: u32,

    /// Uniform background noise amplitude (gray levels)
    #[arg(long, default_value_t = 8)]
    noise: u8,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long)]
    save_frames: Option<PathBuf>,
}

const WIDTH: usize = 160;
const BACKGROUND: u8 = 150;
const BALL: u8 = 30;
const START_Y: f64 = 40.0;

fn render(
    rng: &mut StdRng,
    height: usize,
    center: (f64, f64),
    radius: u32,
    noise: u8,
) -> Array2<u8> {
    let r2 = (radius as f64).powi(2);
    Array2::from_shape_fn((height, WIDTH), |(row, col)| {
        let dx = col as f64 - center.0;
        let dy = row as f64 - center.1;
        let base = if dx * dx + dy * dy <= r2 { BALL } else { BACKGROUND };
        let jitter: i16 = if noise == 0 {
            0
        } else {
            rng.gen_range(-(noise as i16)..=noise as i16)
        };
        (base as i16 + jitter).clamp(0, 255) as u8
    })
}

fn to_image(frame: &Array2<u8>) -> GrayImage {
    let (height, width) = frame.dim();
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        image::Luma([frame[[y as usize, x as usize]]])
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let fall = (START_Y + args.speed * args.frames as f64) as usize;
    let height = fall + 2 * args.radius as usize + 40;
    let mut rng = StdRng::seed_from_u64(args.seed);
    if let Some(dir) = &args.save_frames {
        std::fs::create_dir_all(dir)?;
    }

    let config = PipelineConfig {
        radius_range: (8, (args.radius + 4).max(8)),
        ..PipelineConfig::with_fps(args.fps)
    };
    let mut estimator = TrajectoryEstimator::new(config);

    for k in 0..args.frames {
        let center = (WIDTH as f64 / 2.0, START_Y + args.speed * k as f64);
        let frame = render(&mut rng, height, center, args.radius, args.noise);
        if let Some(dir) = &args.save_frames {
            let path = dir.join(format!("frame_{k:05}.png"));
            to_image(&frame)
                .save(&path)
                .with_context(|| format!("failed to save {}", path.display()))?;
        }
        estimator.process_frame(k, frame.view())?;
    }

    let points = estimator.into_track_points();
    let analysis = analyze_trajectory(&points, args.fps)?;
    let true_velocity = args.speed * args.fps;
    let error = (analysis.terminal_velocity_px_s - true_velocity) / true_velocity;

    info!("Tracked {} of {} frames", points.len(), args.frames);
    println!("\n=== Synthetic Fall ===");
    println!("True velocity:      {:.2} px/s", true_velocity);
    println!("Estimated velocity: {:.2} px/s", analysis.terminal_velocity_px_s);
    println!("Relative error:     {:.2}%", error * 100.0);
    println!(
        "Average diameter:   {:.2} px (true {})",
        analysis.average_diameter_px,
        2 * args.radius
    );
    println!("Mean confidence:    {:.2}", analysis.mean_confidence);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radius_must_be_positive() {
        assert!(Args::try_parse_from(["synthetic_fall", "--radius", "0"]).is_err());
        assert!(Args::try_parse_from(["synthetic_fall", "--radius", "-3"]).is_err());

        let args = Args::try_parse_from(["synthetic_fall", "--radius", "15"]).unwrap();
        assert_eq!(args.radius, 15);
    }

    #[test]
    fn test_render_draws_ball_inside_frame() {
        let mut rng = StdRng::seed_from_u64(7);
        let frame = render(&mut rng, 100, (80.0, 50.0), 10, 0);
        assert_eq!(frame.dim(), (100, WIDTH));
        assert_eq!(frame[[50, 80]], BALL);
        assert_eq!(frame[[5, 5]], BACKGROUND);
    }
}
