use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use ghibli_showcase::{
    config::Configuration,
    events::{SectionStatus, StepIntent, ViewerCommand},
    processing::ripple::{PanelShading, render_panel},
    tasks::{loader, viewer},
};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

#[derive(Debug, Parser)]
#[command(
    name = "showcase",
    version,
    about = "scroll-driven section showcase with a shaded image carousel"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Jump to this section once the opening transition finishes
    #[arg(long = "start-section", value_name = "INDEX")]
    start_section: Option<usize>,
    /// Deterministic RNG seed for the particle field
    #[arg(long = "particle-seed", value_name = "SEED")]
    particle_seed: Option<u64>,
    /// Shade one carousel image to a PNG without opening a window
    #[arg(long = "preview-panel", value_name = "INDEX", requires = "preview_out")]
    preview_panel: Option<usize>,
    /// Output path for --preview-panel
    #[arg(long = "preview-out", value_name = "PNG")]
    preview_out: Option<PathBuf>,
    /// Seconds since a centred ripple started, for --preview-panel
    #[arg(long = "preview-elapsed", value_name = "SECS", default_value_t = 0.5)]
    preview_elapsed: f32,
}

#[tokio::main]
async fn main() -> Result<()> {
    // init tracing (RUST_LOG controls level, default = info)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let Args {
        config,
        start_section,
        particle_seed,
        preview_panel,
        preview_out,
        preview_elapsed,
    } = Args::parse();

    let cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?
        .validated()
        .context("invalid configuration values")?;
    tracing::info!(
        "Loaded configuration from {}:\n{:#?}",
        config.display(),
        cfg
    );

    if let (Some(index), Some(out)) = (preview_panel, preview_out) {
        return run_panel_preview(&cfg, index, &out, preview_elapsed).await;
    }

    if let Some(index) = start_section {
        if index >= cfg.sections.len() {
            bail!(
                "--start-section {index} is out of range ({} sections configured)",
                cfg.sections.len()
            );
        }
    }

    let (command_tx, command_rx) = mpsc::channel::<ViewerCommand>(16); // External -> Viewer
    let (status_tx, mut status_rx) = watch::channel(SectionStatus::default()); // Viewer -> observers

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    // SIGUSR1/SIGUSR2 step forward/backward, for kiosk remotes
    #[cfg(unix)]
    {
        let cancel = cancel.clone();
        let control = command_tx.clone();
        tokio::spawn(async move {
            let (mut forward, mut backward) = match (
                signal(SignalKind::user_defined1()),
                signal(SignalKind::user_defined2()),
            ) {
                (Ok(forward), Ok(backward)) => (forward, backward),
                (Err(err), _) | (_, Err(err)) => {
                    tracing::warn!("failed to register step signal handlers: {err}");
                    return;
                }
            };
            loop {
                let intent = tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = forward.recv() => received.map(|_| StepIntent::Forward),
                    received = backward.recv() => received.map(|_| StepIntent::Backward),
                };
                let Some(intent) = intent else {
                    break;
                };
                tracing::info!(?intent, "step signal received");
                if let Err(err) = control.send(ViewerCommand::Step(intent)).await {
                    tracing::warn!("failed to forward step request: {err}");
                    break;
                }
            }
        });
    }

    let status_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = status_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let status = *status_rx.borrow_and_update();
                        tracing::debug!(
                            index = ?status.index,
                            animating = status.animating,
                            sub_phase = status.sub_phase,
                            "section status"
                        );
                    }
                }
            }
        })
    };

    // Run the windowed viewer on the main thread (blocking) until the window
    // closes or cancellation occurs
    let options = viewer::ViewerOptions {
        start_section,
        particle_seed,
    };
    let result = viewer::run_windowed(cfg, options, cancel.clone(), command_rx, status_tx)
        .context("viewer failed");

    drop(command_tx);
    cancel.cancel();
    let _ = status_task.await;
    result
}

async fn run_panel_preview(
    cfg: &Configuration,
    index: usize,
    out: &Path,
    elapsed: f32,
) -> Result<()> {
    let sources = cfg.carousel_sources();
    let Some(source) = sources.get(index).cloned() else {
        bail!(
            "--preview-panel {index} is out of range ({} carousel images configured)",
            sources.len()
        );
    };
    let texture = loader::load_single(source, CancellationToken::new()).await?;
    let Some(base) = texture.mips.into_iter().next() else {
        bail!("decoded texture has no pixels");
    };
    let image = image::RgbaImage::from_raw(base.width, base.height, base.pixels)
        .context("decoded texture has an unexpected buffer size")?;

    let shading = PanelShading {
        time: elapsed,
        ripple_origin: [0.5, 0.5],
        ripple_start: 0.0,
        ripple: cfg.carousel.ripple,
        opacity: cfg.carousel.opacity,
        panel_width: cfg.carousel.panel_width,
    };
    let shaded = render_panel(&image, &shading);
    shaded
        .save(out)
        .with_context(|| format!("failed to write {}", out.display()))?;
    tracing::info!(
        index,
        elapsed,
        out = %out.display(),
        width = shaded.width(),
        height = shaded.height(),
        "panel preview written"
    );
    Ok(())
}
