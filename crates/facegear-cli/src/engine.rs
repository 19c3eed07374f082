//! Replay engine: a detector thread publishes observations while an async
//! render loop redraws from the latest one.
//!
//! Each redraw reads the slot's generation and observation together, then
//! rasterizes and encodes that snapshot on the blocking pool.

use facegear_core::{FaceGraphic, FaceObservation, Graphic, RenderOutcome, RgbaSurface};
use image::RgbaImage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to spawn detector thread: {0}")]
    Spawn(std::io::Error),
    #[error("detector thread exited without reporting")]
    DetectorExited,
    #[error("failed to write frame: {0}")]
    Image(#[from] image::ImageError),
    #[error("frame writer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub struct ReplayOptions {
    pub detector_interval: Duration,
    pub render_interval: Duration,
    pub out_dir: PathBuf,
}

/// Counts from one replay run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Observations the detector thread published.
    pub published: u64,
    /// Frames written to disk.
    pub frames: u64,
    /// Frames with glasses drawn.
    pub drawn: u64,
    /// Frames left undecorated (incomplete observation or yaw gate).
    pub skipped: u64,
    /// Observations superseded before any render pass saw them.
    pub dropped: u64,
}

/// Replay `observations` through `graphic`, writing a PNG per redraw.
pub async fn run_replay(
    graphic: Arc<FaceGraphic>,
    observations: Vec<FaceObservation>,
    background: RgbaImage,
    opts: &ReplayOptions,
) -> Result<ReplaySummary, EngineError> {
    let (done_tx, mut done_rx) = oneshot::channel::<u64>();
    let detector_interval = opts.detector_interval;

    {
        let graphic = Arc::clone(&graphic);
        std::thread::Builder::new()
            .name("facegear-detector".into())
            .spawn(move || {
                tracing::info!(count = observations.len(), "detector thread started");
                let mut published = 0u64;
                for observation in observations {
                    graphic.update(observation);
                    published += 1;
                    if !detector_interval.is_zero() {
                        std::thread::sleep(detector_interval);
                    }
                }
                tracing::info!(published, "detector thread exiting");
                let _ = done_tx.send(published);
            })
            .map_err(EngineError::Spawn)?;
    }

    let mut ticker = tokio::time::interval(opts.render_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut summary = ReplaySummary::default();
    let mut producer_done = false;
    let mut last_generation = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = &mut done_rx, if !producer_done => {
                summary.published = result.map_err(|_| EngineError::DetectorExited)?;
                producer_done = true;
            }
        }

        let (generation, snapshot) = graphic.slot().snapshot();
        if generation != last_generation {
            summary.dropped += generation - last_generation - 1;
            last_generation = generation;

            let path = opts.out_dir.join(format!("frame_{:05}.png", summary.frames));
            summary.frames += 1;
            let graphic = Arc::clone(&graphic);
            let mut surface = RgbaSurface::new(background.clone());
            let outcome = tokio::task::spawn_blocking(move || {
                let outcome = graphic.render_snapshot(snapshot.as_deref(), &mut surface);
                surface.into_frame().save(path)?;
                Ok::<_, image::ImageError>(outcome)
            })
            .await??;

            match outcome {
                RenderOutcome::Drawn(_) => summary.drawn += 1,
                RenderOutcome::NoObservation => {}
                RenderOutcome::Incomplete(_) | RenderOutcome::YawOutOfRange { .. } => summary.skipped += 1,
            }
        }

        if producer_done && generation == last_generation {
            break;
        }
    }

    tracing::info!(
        published = summary.published,
        frames = summary.frames,
        drawn = summary.drawn,
        skipped = summary.skipped,
        dropped = summary.dropped,
        "replay finished"
    );
    Ok(summary)
}
