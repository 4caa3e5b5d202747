//! Frame actions: the synchronous operations behind the buttons and the timer.
//!
//! Every action persists the pointer before touching the panel, so a display
//! failure never leaves the pointer behind what was attempted.

use std::path::Path;

use tracing::{error, info};

use crate::config::Configuration;
use crate::display::{self, Display, Indicator, NoIndicator};
use crate::error::Result;
use crate::ingest::{Ingested, IngestionPipeline};
use crate::library::{LibraryStore, Photo};

pub struct Frame {
    pipeline: IngestionPipeline,
    display: Box<dyn Display>,
    indicator: Box<dyn Indicator>,
}

impl Frame {
    pub fn new(
        pipeline: IngestionPipeline,
        display: Box<dyn Display>,
        indicator: Box<dyn Indicator>,
    ) -> Self {
        Self {
            pipeline,
            display,
            indicator,
        }
    }

    pub fn from_config(cfg: &Configuration) -> anyhow::Result<Self> {
        let pipeline = IngestionPipeline::from_config(cfg)?;
        let display = display::from_config(cfg.display_command.as_deref())?;
        Ok(Self::new(pipeline, display, Box::new(NoIndicator)))
    }

    pub fn library(&self) -> &LibraryStore {
        self.pipeline.library()
    }

    /// Rotate to the next photo, persist it as current and display it.
    pub fn show_next(&mut self) -> Result<Photo> {
        self.indicator.set_busy(true);
        let res = self.rotate();
        self.indicator.set_busy(false);
        res
    }

    /// Delete the current photo, then rotate as [`Frame::show_next`] does.
    pub fn delete_current_and_show_next(&mut self) -> Result<Photo> {
        self.indicator.set_busy(true);
        if !self.library().delete_current() {
            info!("nothing deleted; rotating anyway");
        }
        let res = self.rotate();
        self.indicator.set_busy(false);
        res
    }

    /// Ingest `raw` and show the result right away.
    pub fn ingest_and_show(&mut self, raw: &Path) -> Result<Ingested> {
        self.indicator.set_busy(true);
        let res = self.pipeline.ingest(raw);
        if let Ok(ingested) = &res {
            self.display_photo(&ingested.photo);
        }
        self.indicator.set_busy(false);
        res
    }

    fn rotate(&mut self) -> Result<Photo> {
        let photo = self.library().advance()?;
        self.library().set_current(&photo)?;
        self.display_photo(&photo);
        Ok(photo)
    }

    fn display_photo(&mut self, photo: &Photo) {
        if let Err(err) = self.display.show(&photo.path) {
            error!(photo = %photo.name, "display failed: {err:#}");
        }
    }
}
