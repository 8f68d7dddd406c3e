use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use tracing::{debug, error, info, trace};

use tilebrot_core::{Fractal, Frame, Viewport};
use tilebrot_render::{
    export_png, Engine, EngineConfig, EngineEvent, ExportMetadata, FrameSnapshot,
    GrayscalePalette,
};

type DynError = Box<dyn std::error::Error>;

/// How often the host logs while waiting for the frame to finish.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(author, version, about = "Render one Mandelbrot frame to PNG")]
struct Cli {
    /// Output PNG file
    #[arg(short, long)]
    output: PathBuf,

    /// JSON settings file: engine fields plus an optional `viewport` object
    #[arg(long)]
    config: Option<PathBuf>,

    /// Plane rectangle as X,Y,WIDTH,HEIGHT
    #[arg(long, value_parser = parse_quad::<f64>, allow_hyphen_values = true)]
    viewport: Option<[f64; 4]>,

    /// Raster size as WIDTHxHEIGHT
    #[arg(short, long, default_value = "1600x900", value_parser = parse_size)]
    size: (u32, u32),

    /// Iteration cap
    #[arg(short = 'i', long)]
    max_iterations: Option<u32>,

    /// Worker threads (defaults to available parallelism)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Zoom into a pixel rectangle LEFT,TOP,WIDTH,HEIGHT of the first frame,
    /// widened to its aspect ratio
    #[arg(long, value_parser = parse_quad::<u32>)]
    select: Option<[u32; 4]>,

    /// Also write the coarse preview of the first frame, as it looks right
    /// after dispatch
    #[arg(long)]
    preview: Option<PathBuf>,
}

/// On-disk settings. Engine fields sit at the top level.
#[derive(Debug, Default, Deserialize)]
struct Settings {
    #[serde(flatten)]
    engine: EngineConfig,
    viewport: Option<Viewport>,
}

fn parse_quad<T: FromStr + Copy + Default>(s: &str) -> Result<[T; 4], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(format!("expected four comma-separated values, got `{s}`"));
    }
    let mut out = [T::default(); 4];
    for (slot, part) in out.iter_mut().zip(&parts) {
        *slot = part.parse().map_err(|_| format!("`{part}` is not a number"))?;
    }
    Ok(out)
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{s}`"))?;
    let w = w.trim().parse().map_err(|_| format!("bad width `{w}`"))?;
    let h = h.trim().parse().map_err(|_| format!("bad height `{h}`"))?;
    Ok((w, h))
}

fn load_settings(path: Option<&Path>) -> Result<Settings, DynError> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let data = std::fs::read_to_string(path)?;
    let settings = serde_json::from_str(&data)?;
    debug!(path = %path.display(), "Loaded settings");
    Ok(settings)
}

fn write_png(
    snapshot: &FrameSnapshot,
    frame: &Frame,
    config: &EngineConfig,
    path: &Path,
) -> Result<(), DynError> {
    let image = GrayscalePalette::new(config.color_buckets).colorize(snapshot);
    let meta = ExportMetadata {
        viewport: frame.viewport,
        max_iterations: config.max_iterations,
        color_buckets: config.color_buckets,
        epoch: snapshot.epoch,
    };
    export_png(&image, path, &meta)?;
    Ok(())
}

/// Drain engine events until `target` completes, logging tile progress.
fn wait_for_frame(events: &Receiver<EngineEvent>, target: u64) -> Result<(), DynError> {
    loop {
        match events.recv_timeout(PROGRESS_INTERVAL) {
            Ok(EngineEvent::TileDone {
                epoch,
                remaining,
                total,
                ..
            }) => trace!(epoch, remaining, total, "Tile done"),
            Ok(EngineEvent::FrameComplete(done)) if done.epoch == target => {
                info!(
                    epoch = done.epoch,
                    elapsed_ms = done.elapsed.as_millis(),
                    "Frame ready"
                );
                return Ok(());
            }
            Ok(EngineEvent::FrameComplete(done)) => {
                debug!(epoch = done.epoch, "Superseded frame finished")
            }
            Err(RecvTimeoutError::Timeout) => info!(epoch = target, "Still computing"),
            Err(RecvTimeoutError::Disconnected) => {
                return Err("engine stopped before the frame completed".into());
            }
        }
    }
}

fn run(cli: Cli) -> Result<(), DynError> {
    let settings = load_settings(cli.config.as_deref())?;
    let mut config = settings.engine;
    if let Some(n) = cli.max_iterations {
        config.max_iterations = n;
    }
    if cli.threads.is_some() {
        config.worker_threads = cli.threads;
    }

    let viewport = match cli.viewport {
        Some([x, y, w, h]) => Viewport::new(x, y, w, h)?,
        None => settings.viewport.unwrap_or_default(),
    };
    let (width, height) = cli.size;
    let frame = Frame::new(viewport, width, height)?;

    let fractal = config.mandelbrot()?;
    info!(
        x = viewport.x,
        y = viewport.y,
        w = viewport.width,
        h = viewport.height,
        width,
        height,
        max_iterations = fractal.max_iterations(),
        "Rendering"
    );
    let (mut engine, events) = Engine::start(fractal, config.clone(), frame)?;

    if let Some(path) = &cli.preview {
        write_png(&engine.request_frame(), &engine.frame(), &config, path)?;
        info!(path = %path.display(), "Wrote coarse preview");
    }

    wait_for_frame(&events, engine.epoch())?;

    if let Some([left, top, w, h]) = cli.select {
        if let Some(epoch) = engine.zoom_to_selection(left, top, w, h)? {
            info!(epoch, viewport = ?engine.frame().viewport, "Zooming into selection");
            wait_for_frame(&events, epoch)?;
        }
    }

    let snapshot = engine.request_frame();
    info!(
        distinct = snapshot.normalization.len(),
        buckets = snapshot.normalization.buckets_used(),
        "Normalized"
    );
    write_png(&snapshot, &engine.frame(), &config, &cli.output)?;
    info!(path = %cli.output.display(), "Saved");

    engine.shutdown();
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_parsing() {
        assert_eq!(
            parse_quad::<f64>("-2.5,-1.125, 4, 2.5").unwrap(),
            [-2.5, -1.125, 4.0, 2.5]
        );
        assert_eq!(parse_quad::<u32>("1,2,3,4").unwrap(), [1, 2, 3, 4]);
        assert!(parse_quad::<u32>("1,2,3").is_err());
        assert!(parse_quad::<u32>("1,2,x,4").is_err());
    }

    #[test]
    fn size_parsing() {
        assert_eq!(parse_size("1600x900").unwrap(), (1600, 900));
        assert!(parse_size("1600").is_err());
        assert!(parse_size("ax9").is_err());
    }

    #[test]
    fn settings_file_layout() {
        let s: Settings = serde_json::from_str(
            r#"{"max_iterations": 900, "viewport": {"x": -1, "y": -1, "width": 2, "height": 2}}"#,
        )
        .unwrap();
        assert_eq!(s.engine.max_iterations, 900);
        assert_eq!(s.engine.color_buckets, 150);
        assert_eq!(s.viewport.unwrap().width, 2.0);

        let bad = serde_json::from_str::<Settings>(
            r#"{"viewport": {"x": 0, "y": 0, "width": -1, "height": 2}}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn cli_parses() {
        let cli = Cli::try_parse_from([
            "tilebrot",
            "-o",
            "out.png",
            "--viewport",
            "-0.75,0.1,0.01,0.01",
            "--size",
            "320x180",
            "--select",
            "10,10,100,50",
        ])
        .unwrap();
        assert_eq!(cli.size, (320, 180));
        assert_eq!(cli.viewport, Some([-0.75, 0.1, 0.01, 0.01]));
        assert_eq!(cli.select, Some([10, 10, 100, 50]));
    }
}
