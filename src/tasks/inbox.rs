use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher, recommended_watcher};
use tokio::sync::mpsc::{self, Sender};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};
use walkdir::WalkDir;

use crate::events::FrameEvent;

/// Visible regular files directly in `inbox` that have not been modified for
/// at least `settle`, oldest first.
pub fn scan_ready(inbox: &Path, settle: Duration) -> Vec<PathBuf> {
    let now = SystemTime::now();
    let mut ready: Vec<(SystemTime, PathBuf)> = WalkDir::new(inbox)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|e| {
            let modified = e.metadata().ok()?.modified().ok()?;
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            (age >= settle).then(|| (modified, e.into_path()))
        })
        .collect();
    ready.sort();
    ready.into_iter().map(|(_, p)| p).collect()
}

/// Watch the drop folder and hand settled files to the frame task, once each.
///
/// Filesystem notifications trigger an early rescan; the periodic rescan
/// catches files that were still being written when their event fired.
#[instrument(skip(to_frame, cancel), fields(inbox = %inbox.display()))]
pub async fn run(
    inbox: PathBuf,
    settle: Duration,
    check_interval: Duration,
    to_frame: Sender<FrameEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    std::fs::create_dir_all(&inbox)
        .with_context(|| format!("failed to create inbox {}", inbox.display()))?;

    // Bridge notify callback -> async channel
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Result<Event>>(128);
    let mut watcher = recommended_watcher(move |res| {
        let _ = watch_tx.blocking_send(res);
    })?;
    watcher.watch(&inbox, RecursiveMode::NonRecursive)?;
    info!("inbox watcher initialized");

    let mut ticker = interval(check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut announced: HashSet<PathBuf> = HashSet::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting inbox task");
                break;
            }

            _ = ticker.tick() => {}

            Some(res) = watch_rx.recv() => match res {
                Ok(event) => {
                    debug!(kind = ?event.kind, paths = ?event.paths, "notify event");
                    if !matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    ) {
                        continue;
                    }
                }
                Err(err) => {
                    error!("watch error: {err}");
                    continue;
                }
            },
        }

        // Forget files that are gone (ingested or quarantined).
        announced.retain(|p| p.exists());
        for path in scan_ready(&inbox, settle) {
            if announced.contains(&path) {
                continue;
            }
            info!(path = %path.display(), "inbox: new file");
            if to_frame.send(FrameEvent::Arrived(path.clone())).await.is_err() {
                debug!("frame task gone; exiting inbox task");
                return Ok(());
            }
            announced.insert(path);
        }
    }
    Ok(())
}
