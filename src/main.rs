//! Binary entrypoint for inkframe.
//!
//! Delegates all logic to the library crate; no local modules here.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use inkframe::config::Configuration;
use inkframe::events::FrameEvent;
use inkframe::frame::Frame;
use inkframe::processing::layout::{PREVIEW_HEIGHT, PREVIEW_WIDTH};
use inkframe::tasks;

#[derive(Debug, Parser)]
#[command(
    name = "inkframe",
    version,
    about = "E-ink photo frame: ingest, rotate and preview photos"
)]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Watch the inbox, ingest new photos and rotate on a timer
    Run,
    /// Ingest one raw image, make it current and display it
    Ingest {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Display the next photo in rotation
    Next,
    /// Delete the current photo and display the next one
    DeleteCurrent,
    /// Print the current photo's file name
    Current,
    /// List library photos, oldest first
    List,
    /// Dither any image to the configured palette
    Dither {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        /// Output path (PNG keeps the palette exact)
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
        #[arg(long, default_value_t = PREVIEW_WIDTH)]
        width: u32,
        #[arg(long, default_value_t = PREVIEW_HEIGHT)]
        height: u32,
    },
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(format!("inkframe={level}").parse()?);
    fmt().with_env_filter(filter).with_target(false).compact().init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cfg = Configuration::from_yaml_file(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?
        .validated()
        .context("invalid configuration values")?;
    tracing::debug!("Loaded configuration from {}:\n{:#?}", cli.config.display(), cfg);

    match cli.command {
        Command::Run => run(cfg).await,
        Command::Ingest { file } => {
            let mut frame = Frame::from_config(&cfg)?;
            let ingested = frame
                .ingest_and_show(&file)
                .with_context(|| format!("failed to ingest {}", file.display()))?;
            println!("{}", ingested.photo.name);
            if let Some(preview) = ingested.preview {
                println!("{}", preview.display());
            }
            Ok(())
        }
        Command::Next => {
            let photo = Frame::from_config(&cfg)?.show_next()?;
            println!("{}", photo.name);
            Ok(())
        }
        Command::DeleteCurrent => {
            let photo = Frame::from_config(&cfg)?.delete_current_and_show_next()?;
            println!("{}", photo.name);
            Ok(())
        }
        Command::Current => {
            let frame = Frame::from_config(&cfg)?;
            match frame.library().pointer() {
                Some(name) => {
                    if frame.library().current().is_none() {
                        warn!(pointer = %name, "current photo no longer exists");
                    }
                    println!("{name}");
                }
                None => info!("no current photo"),
            }
            Ok(())
        }
        Command::List => {
            let frame = Frame::from_config(&cfg)?;
            let current = frame.library().pointer();
            for photo in frame.library().list_ordered()? {
                let mark = if current.as_deref() == Some(photo.name.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("{mark} {}", photo.name);
            }
            Ok(())
        }
        Command::Dither {
            input,
            output,
            width,
            height,
        } => {
            let palette = cfg.palette()?;
            let img = inkframe::processing::decode::Decoder::new()
                .with_heif_converter(cfg.heif_converter.clone())
                .decode(&input)?;
            let out = inkframe::dither::dither(&img, &palette, (width, height))?;
            out.save(&output)
                .with_context(|| format!("failed to write {}", output.display()))?;
            info!(output = %output.display(), width, height, "dithered");
            Ok(())
        }
    }
}

async fn run(cfg: Configuration) -> Result<()> {
    let Some(inbox) = cfg.inbox_path.clone() else {
        bail!("`run` requires inbox-path to be configured");
    };
    let frame = Frame::from_config(&cfg)?;
    let waiting = tasks::inbox::scan_ready(&inbox, cfg.inbox_settle);
    info!(
        inbox = %inbox.display(),
        library = %cfg.library_path.display(),
        waiting = waiting.len(),
        "rotating every {}",
        humantime::format_duration(cfg.display_interval)
    );

    let (frame_tx, frame_rx) = mpsc::channel::<FrameEvent>(16); // Inbox/signals -> Frame
    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("ctrl-c handler failed: {err}");
                return;
            }
            info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    #[cfg(unix)]
    for (kind, event) in [
        (SignalKind::user_defined1(), FrameEvent::ShowNext),
        (SignalKind::user_defined2(), FrameEvent::DeleteCurrent),
    ] {
        let cancel = cancel.clone();
        let control = frame_tx.clone();
        tokio::spawn(async move {
            match signal(kind) {
                Ok(mut stream) => loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        received = stream.recv() => {
                            if received.is_none() {
                                break;
                            }
                            info!(?event, "signal received");
                            if let Err(err) = control.send(event.clone()).await {
                                warn!("failed to forward frame command: {err}");
                                break;
                            }
                        }
                    }
                },
                Err(err) => warn!("failed to register signal handler: {err}"),
            }
        });
    }

    let mut tasks = JoinSet::new();

    tasks.spawn({
        let cancel = cancel.clone();
        let settle = cfg.inbox_settle;
        let check = cfg.check_interval;
        async move {
            tasks::inbox::run(inbox, settle, check, frame_tx, cancel)
                .await
                .context("inbox task failed")
        }
    });

    tasks.spawn({
        let cancel = cancel.clone();
        let interval = cfg.display_interval;
        let quarantine = cfg.quarantine_path();
        async move {
            tasks::frame::run(frame, frame_rx, waiting, interval, quarantine, cancel)
                .await
                .context("frame task failed")
        }
    });

    let mut result = Ok(());
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined.context("task panicked").and_then(|r| r);
        if let Err(err) = outcome {
            tracing::error!("{err:#}");
            cancel.cancel();
            if result.is_ok() {
                result = Err(err);
            }
        }
    }
    info!("shutdown complete");
    result
}
