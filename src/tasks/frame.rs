use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc::Receiver;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::events::FrameEvent;
use crate::frame::Frame;

/// Serializes every library mutation: ingests, timed rotation and manual
/// commands all run one after another on a blocking worker.
///
/// `startup` holds inputs that were already waiting in the inbox; they are
/// ingested before the first timed rotation, so an empty library can still
/// get its first photo. Returns an error (and stops) when there is nothing at
/// all to display.
pub async fn run(
    frame: Frame,
    mut events: Receiver<FrameEvent>,
    startup: Vec<PathBuf>,
    display_interval: Duration,
    quarantine: Option<PathBuf>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut frame = frame;
    let mut shown = false;
    for raw in startup {
        if cancel.is_cancelled() {
            return Ok(());
        }
        let (next, displayed) = step(frame, FrameEvent::Arrived(raw), quarantine.clone()).await?;
        frame = next;
        shown |= displayed;
    }

    let mut ticker = interval(display_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    if shown {
        // Keep the freshly ingested photo up for a full period.
        ticker.reset();
    }

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting frame task");
                break;
            }
            _ = ticker.tick() => FrameEvent::ShowNext,
            maybe = events.recv() => match maybe {
                Some(event) => {
                    // Anything shown on request restarts the display period.
                    ticker.reset();
                    event
                }
                None => break,
            },
        };
        frame = step(frame, event, quarantine.clone()).await?.0;
    }
    Ok(())
}

async fn step(
    mut frame: Frame,
    event: FrameEvent,
    quarantine: Option<PathBuf>,
) -> Result<(Frame, bool)> {
    tokio::task::spawn_blocking(move || -> Result<(Frame, bool)> {
        let displayed = perform(&mut frame, &event, quarantine.as_deref())?;
        Ok((frame, displayed))
    })
    .await
    .context("frame worker panicked")?
}

/// Apply one event and report whether a photo was put on screen. Only an
/// empty library is fatal; everything else is logged and the loop carries on.
fn perform(frame: &mut Frame, event: &FrameEvent, quarantine: Option<&Path>) -> Result<bool> {
    let res = match event {
        FrameEvent::ShowNext => frame.show_next().map(|_| true),
        FrameEvent::DeleteCurrent => frame.delete_current_and_show_next().map(|_| true),
        // Already handled at startup, or removed by hand.
        FrameEvent::Arrived(raw) if !raw.exists() => {
            debug!(path = %raw.display(), "input gone; skipping");
            Ok(false)
        }
        FrameEvent::Arrived(raw) => match frame.ingest_and_show(raw) {
            Ok(_) => Ok(true),
            Err(err) => {
                error!(path = %raw.display(), "ingest failed: {err}");
                if raw.exists()
                    && let Some(dir) = quarantine
                {
                    quarantine_file(raw, dir);
                }
                Ok(false)
            }
        },
    };
    match res {
        Err(Error::EmptyLibrary) => Err(Error::EmptyLibrary).context("nothing to display"),
        Err(err) => {
            error!(?event, "frame action failed: {err}");
            Ok(false)
        }
        Ok(displayed) => Ok(displayed),
    }
}

/// Move a rejected input out of the inbox so it is not retried.
pub fn quarantine_file(raw: &Path, dir: &Path) {
    let Some(name) = raw.file_name() else {
        return;
    };
    if let Err(err) = fs::create_dir_all(dir) {
        warn!(dir = %dir.display(), "cannot create quarantine: {err}");
        return;
    }
    let mut dest = dir.join(name);
    if dest.exists() {
        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
        dest = dir.join(format!("{stamp}-{}", name.to_string_lossy()));
    }
    match fs::rename(raw, &dest) {
        Ok(()) => info!(from = %raw.display(), to = %dest.display(), "quarantined"),
        Err(err) => warn!(path = %raw.display(), "quarantine failed: {err}"),
    }
}
