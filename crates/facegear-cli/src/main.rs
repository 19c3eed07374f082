use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facegear_core::{
    CoordinateMapper, FaceGraphic, FaceObservation, GlassesAsset, Graphic, RenderOutcome, RgbaSurface,
};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;

use config::Config;
use engine::{run_replay, ReplayOptions};

#[derive(Parser)]
#[command(name = "facegear", about = "Face-tracked glasses overlay")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Draw glasses onto a single frame
    Render {
        /// Background frame (any format the image crate decodes)
        #[arg(short, long)]
        frame: PathBuf,
        /// Observation JSON file
        #[arg(short, long)]
        observation: PathBuf,
        /// Output image path
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the computed placement for an observation as JSON
    ///
    /// Without --frame-size the observation is taken to be in surface
    /// coordinates already and no mapping is applied.
    Place {
        /// Observation JSON file
        #[arg(short, long)]
        observation: PathBuf,
        /// Glasses bitmap size as WxH instead of loading the image
        #[arg(long, value_parser = parse_size)]
        glasses_size: Option<(u32, u32)>,
        /// Surface size as WxH; maps the observation the way `render` would
        #[arg(long, value_parser = parse_size)]
        frame_size: Option<(u32, u32)>,
    },
    /// Replay a JSON-lines observation stream through the render loop
    Replay {
        /// Observation stream, one JSON object per line
        #[arg(short, long)]
        observations: PathBuf,
        /// Background frame reused for every redraw
        #[arg(short, long)]
        frame: PathBuf,
        /// Directory for numbered output frames
        #[arg(long)]
        out_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Render { frame, observation, out } => {
            let background = load_frame(&frame)?;
            let graphic = build_graphic(&config, background.dimensions())?;
            graphic.update(read_observation(&observation)?);

            let mut surface = RgbaSurface::new(background);
            let outcome = graphic.render(&mut surface);
            report(&outcome);
            surface
                .into_frame()
                .save(&out)
                .with_context(|| format!("writing {}", out.display()))?;
            println!("{}", out.display());
        }
        Commands::Place { observation, glasses_size, frame_size } => {
            let glasses = match glasses_size {
                Some((w, h)) => GlassesAsset::from_image(RgbaImage::new(w, h))?,
                None => GlassesAsset::load(&config.glasses_path)?,
            };
            let observation = read_observation(&observation)?;
            let graphic = FaceGraphic::new(glasses).with_mapper(place_mapper(&config, frame_size));

            let eye_metrics = observation.landmarks().ok().map(|lm| lm.eye_metrics());
            let geometry = graphic.place(&observation)?.map(|p| p.geometry);
            let doc = serde_json::json!({
                "geometry": geometry,
                "eye_metrics": eye_metrics,
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        Commands::Replay { observations, frame, out_dir } => {
            let background = load_frame(&frame)?;
            let graphic = Arc::new(build_graphic(&config, background.dimensions())?);
            let observations = read_observation_stream(&observations)?;
            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("creating {}", out_dir.display()))?;

            let opts = ReplayOptions {
                detector_interval: Duration::from_millis(config.detector_interval_ms),
                render_interval: Duration::from_secs_f64(1.0 / config.render_fps as f64),
                out_dir,
            };
            let summary = run_replay(graphic, observations, background, &opts).await?;
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                "published": summary.published,
                "frames": summary.frames,
                "drawn": summary.drawn,
                "skipped": summary.skipped,
                "dropped": summary.dropped,
            }))?);
        }
    }

    Ok(())
}

fn build_graphic(config: &Config, surface: (u32, u32)) -> Result<FaceGraphic> {
    let glasses = GlassesAsset::load(&config.glasses_path)?;
    Ok(FaceGraphic::new(glasses).with_mapper(config.mapper(surface)))
}

/// The configured mapper for a known surface size, otherwise pass-through.
fn place_mapper(config: &Config, frame_size: Option<(u32, u32)>) -> CoordinateMapper {
    match frame_size {
        Some(size) => config.mapper(size),
        None => CoordinateMapper::identity(),
    }
}

fn load_frame(path: &Path) -> Result<RgbaImage> {
    let frame = image::open(path).with_context(|| format!("opening frame {}", path.display()))?;
    Ok(frame.into_rgba8())
}

fn read_observation(path: &Path) -> Result<FaceObservation> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing observation {}", path.display()))
}

fn read_observation_stream(path: &Path) -> Result<Vec<FaceObservation>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("{}:{}: bad observation", path.display(), i + 1))
        })
        .collect()
}

fn report(outcome: &RenderOutcome) {
    match outcome {
        RenderOutcome::Drawn(g) => tracing::info!(
            width = g.scaled_size.0,
            height = g.scaled_size.1,
            "glasses drawn"
        ),
        RenderOutcome::NoObservation => tracing::warn!("no observation to draw"),
        RenderOutcome::Incomplete(err) => tracing::warn!(error = %err, "observation skipped"),
        RenderOutcome::YawOutOfRange { yaw } => tracing::info!(yaw, "face turned too far; not decorated"),
    }
}

fn parse_size(s: &str) -> Result<(u32, u32)> {
    let Some((w, h)) = s.split_once(['x', 'X']) else {
        bail!("expected WxH, got {s:?}");
    };
    let size: (u32, u32) = (w.trim().parse()?, h.trim().parse()?);
    if size.0 == 0 || size.1 == 0 {
        bail!("size must be non-zero");
    }
    Ok(size)
}
