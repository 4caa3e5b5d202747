use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::Configuration;
use crate::error::Result;
use crate::library::{LibraryStore, Photo, RetentionReport};
use crate::normalize::{Normalized, Normalizer};

/// What an ingest produced.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub photo: Photo,
    pub preview: Option<PathBuf>,
    pub retention: Option<RetentionReport>,
}

/// Normalize -> make current -> enforce retention.
#[derive(Debug, Clone)]
pub struct IngestionPipeline {
    normalizer: Normalizer,
    library: LibraryStore,
    keep_count: usize,
}

impl IngestionPipeline {
    pub fn new(normalizer: Normalizer, library: LibraryStore, keep_count: usize) -> Self {
        Self {
            normalizer,
            library,
            keep_count,
        }
    }

    pub fn from_config(cfg: &Configuration) -> anyhow::Result<Self> {
        let library = LibraryStore::open(&cfg.library_path, cfg.pointer_file())?
            .with_placeholder(cfg.placeholder_path.clone());
        let normalizer = Normalizer::from_config(cfg)?;
        Ok(Self::new(normalizer, library, cfg.keep_count))
    }

    pub fn library(&self) -> &LibraryStore {
        &self.library
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Ingest one raw image and make it the current photo.
    ///
    /// When normalization fails nothing in the library changes and `raw` is
    /// left for the caller. A retention pass that cannot delete everything is
    /// logged but does not fail the ingest.
    pub fn ingest(&self, raw: &Path) -> Result<Ingested> {
        let Normalized { photo, preview } = self.normalizer.normalize(raw)?;
        self.library.set_current(&photo)?;

        let retention = match self.library.enforce_retention(self.keep_count) {
            Ok(report) => {
                if !report.all_deleted() {
                    warn!(failed = report.failed.len(), "retention left files behind");
                }
                Some(report)
            }
            Err(err) => {
                warn!("retention pass failed: {err}");
                None
            }
        };

        info!(photo = %photo.name, preview = preview.is_some(), "ingested");
        Ok(Ingested {
            photo,
            preview,
            retention,
        })
    }
}
