//! Session export: everything a run produced, as JSON (optionally gzipped) or CSV.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::info;
use serde::{Deserialize, Serialize};

use crate::analysis::TrajectoryAnalysis;
use crate::config::PipelineConfig;
use crate::error::TrackResult;
use crate::filters::KalmanCvState;
use crate::frames::{FrameRange, Roi};
use crate::physics::{CalibrationReport, ViscosityResult};
use crate::types::{DetectionSource, TrackPoint};

const CSV_HEADER: &str =
    "frame,x,y,filtered_x,filtered_y,predicted_x,predicted_y,diameter,confidence,source";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    /// RFC 3339
    pub created_at: String,
    pub fps: f64,
    pub roi: Option<Roi>,
    pub frame_range: Option<FrameRange>,
    pub frames_processed: usize,
    pub frames_skipped: usize,
    pub frames_predicted: usize,
}

impl SessionMetadata {
    pub fn new(fps: f64) -> Self {
        let now = Utc::now();
        Self {
            session_id: format!("session_{}", now.timestamp_millis()),
            created_at: now.to_rfc3339(),
            fps,
            roi: None,
            frame_range: None,
            frames_processed: 0,
            frames_skipped: 0,
            frames_predicted: 0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionExport {
    pub metadata: SessionMetadata,
    pub config: PipelineConfig,
    pub track_points: Vec<TrackPoint>,
    pub analysis: Option<TrajectoryAnalysis>,
    pub viscosity: Option<ViscosityResult>,
    pub calibration: Option<CalibrationReport>,
    /// Final tracker snapshot, absent when nothing was tracked
    pub tracker_state: Option<KalmanCvState>,
}

impl SessionExport {
    pub fn new(
        metadata: SessionMetadata,
        config: PipelineConfig,
        track_points: Vec<TrackPoint>,
    ) -> Self {
        Self {
            metadata,
            config,
            track_points,
            analysis: None,
            viscosity: None,
            calibration: None,
            tracker_state: None,
        }
    }

    pub fn to_json(&self) -> TrackResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// One row per track point; predicted columns are empty before the tracker exists
    pub fn to_csv(&self) -> String {
        let mut out = String::with_capacity(64 * (self.track_points.len() + 1));
        out.push_str(CSV_HEADER);
        out.push('\n');
        for p in &self.track_points {
            let (px, py) = match p.predicted {
                Some((x, y)) => (format!("{x:.3}"), format!("{y:.3}")),
                None => (String::new(), String::new()),
            };
            let source = match p.source {
                DetectionSource::Detected => "detected",
                DetectionSource::Predicted => "predicted",
            };
            out.push_str(&format!(
                "{},{:.3},{:.3},{:.3},{:.3},{},{},{:.3},{:.3},{}\n",
                p.frame,
                p.x,
                p.y,
                p.filtered_x,
                p.filtered_y,
                px,
                py,
                p.diameter,
                p.confidence,
                source
            ));
        }
        out
    }

    /// Write JSON to `path`, gzip-compressed when the path ends in `.gz`
    pub fn write(&self, path: &Path) -> TrackResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = self.to_json()?;
        if is_gzip(path) {
            let file = File::create(path)?;
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder.write_all(json.as_bytes())?;
            encoder.finish()?;
        } else {
            fs::write(path, json)?;
        }
        info!(
            "Saved session {} ({} points) to {}",
            self.metadata.session_id,
            self.track_points.len(),
            path.display()
        );
        Ok(())
    }

    pub fn write_csv(&self, path: &Path) -> TrackResult<()> {
        fs::write(path, self.to_csv())?;
        Ok(())
    }

    /// Read back a session written by [`SessionExport::write`]
    pub fn load(path: &Path) -> TrackResult<Self> {
        let file = File::open(path)?;
        if is_gzip(path) {
            Ok(serde_json::from_reader(std::io::BufReader::new(GzDecoder::new(file)))?)
        } else {
            Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
        }
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().map(|e| e == "gz").unwrap_or(false)
}
