//! Seams to the hardware: the panel that shows a photo and the status light.
//!
//! Both are handles owned by whoever drives the frame; nothing here is global.

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, anyhow, ensure};
use tracing::{debug, info};

/// Something that can put a library photo on screen.
pub trait Display: Send {
    fn show(&mut self, photo: &Path) -> Result<()>;
}

/// Activity light shown while the frame is busy.
pub trait Indicator: Send {
    fn set_busy(&mut self, busy: bool);
}

/// Logs instead of driving a panel. Used when no display command is configured.
#[derive(Debug, Default)]
pub struct LogDisplay;

impl Display for LogDisplay {
    fn show(&mut self, photo: &Path) -> Result<()> {
        ensure!(photo.is_file(), "{} does not exist", photo.display());
        info!(photo = %photo.display(), "display (log only)");
        Ok(())
    }
}

/// Runs `<program> [args..] <photo>` and treats a zero exit status as success.
#[derive(Debug, Clone)]
pub struct CommandDisplay {
    program: String,
    args: Vec<String>,
}

impl CommandDisplay {
    pub fn new(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow!("display command must name a program"))?;
        ensure!(!program.trim().is_empty(), "display command must not be blank");
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl Display for CommandDisplay {
    fn show(&mut self, photo: &Path) -> Result<()> {
        ensure!(photo.is_file(), "{} does not exist", photo.display());
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(photo)
            .status()
            .with_context(|| format!("failed to spawn display command {}", self.program))?;
        if status.success() {
            info!(photo = %photo.display(), "displayed");
            Ok(())
        } else {
            Err(anyhow!(
                "display command exited with status {}: {}",
                status.code().unwrap_or(-1),
                self.program
            ))
        }
    }
}

#[derive(Debug, Default)]
pub struct NoIndicator;

impl Indicator for NoIndicator {
    fn set_busy(&mut self, busy: bool) {
        debug!(busy, "indicator");
    }
}

/// Pick the display named by the configuration.
pub fn from_config(command: Option<&[String]>) -> Result<Box<dyn Display>> {
    Ok(match command {
        Some(cmd) => Box::new(CommandDisplay::new(cmd)?),
        None => Box::new(LogDisplay),
    })
}
