use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::error::Error;
use crate::palette::{Palette, SPECTRA6};

/// What to do with images whose width-fitted height is below the frame height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum ShortImagePolicy {
    /// Centre the image vertically on a canvas of `color`.
    Pad {
        #[serde(default = "ShortImagePolicy::default_color")]
        color: [u8; 3],
    },
    /// Refuse the input; nothing is written.
    Reject,
}

impl ShortImagePolicy {
    const fn default_color() -> [u8; 3] {
        [0, 0, 0]
    }
}

impl Default for ShortImagePolicy {
    fn default() -> Self {
        Self::Pad {
            color: Self::default_color(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Directory holding the normalized photos.
    pub library_path: PathBuf,
    /// File holding the current photo's name. Defaults to a hidden file in the library.
    pub pointer_file: Option<PathBuf>,
    /// Drop folder watched by `run` for new raw images.
    pub inbox_path: Option<PathBuf>,
    /// Where inputs that failed ingestion are moved. Defaults to `<inbox>/.rejected`.
    pub quarantine_path: Option<PathBuf>,
    /// Dithered preview written on every ingest (PNG only).
    pub preview_path: Option<PathBuf>,
    /// Image copied into an empty library so there is always something to show.
    pub placeholder_path: Option<PathBuf>,
    /// External `<program> <input> <output.png>` converter for HEIC/HEIF input.
    pub heif_converter: Option<PathBuf>,
    /// Number of most recent photos retained.
    pub keep_count: usize,
    /// Display colours as `[r, g, b]`, in tie-breaking order.
    pub palette: Vec<[u8; 3]>,
    /// Handling of images too short to fill the frame after width fitting.
    pub short_image: ShortImagePolicy,
    /// JPEG quality for library files.
    pub jpeg_quality: u8,
    /// How long a photo stays up before `run` rotates to the next one.
    #[serde(with = "humantime_serde")]
    pub display_interval: Duration,
    /// How often `run` rescans the inbox.
    #[serde(with = "humantime_serde")]
    pub check_interval: Duration,
    /// Minimum age of an inbox file before it is considered complete.
    #[serde(with = "humantime_serde")]
    pub inbox_settle: Duration,
    /// Program and arguments that put a photo on the panel; the path is appended.
    pub display_command: Option<Vec<String>>,
}

impl Configuration {
    pub const DEFAULT_POINTER_NAME: &'static str = ".current_photo";
    pub const DEFAULT_QUARANTINE_NAME: &'static str = ".rejected";

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|err| Error::fs(path, err))?;
        Ok(serde_yaml::from_str(&s).map_err(Error::Config)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            !self.library_path.as_os_str().is_empty(),
            "library-path must be set"
        );
        ensure!(self.keep_count > 0, "keep-count must be greater than zero");
        ensure!(
            (1..=100).contains(&self.jpeg_quality),
            "jpeg-quality must be within 1..=100"
        );
        ensure!(
            self.display_interval > Duration::ZERO,
            "display-interval must be positive"
        );
        ensure!(
            self.check_interval > Duration::ZERO,
            "check-interval must be positive"
        );
        self.palette().context("invalid palette")?;
        if let Some(preview) = &self.preview_path {
            let is_png = preview
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("png"));
            ensure!(
                is_png,
                "preview-path must end in .png so the palette survives encoding"
            );
        }
        if let Some(cmd) = &self.display_command {
            ensure!(!cmd.is_empty(), "display-command must name a program");
        }
        Ok(self)
    }

    pub fn pointer_file(&self) -> PathBuf {
        self.pointer_file
            .clone()
            .unwrap_or_else(|| self.library_path.join(Self::DEFAULT_POINTER_NAME))
    }

    pub fn quarantine_path(&self) -> Option<PathBuf> {
        self.quarantine_path.clone().or_else(|| {
            self.inbox_path
                .as_ref()
                .map(|inbox| inbox.join(Self::DEFAULT_QUARANTINE_NAME))
        })
    }

    pub fn palette(&self) -> Result<Palette> {
        Ok(Palette::new(&self.palette)?)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            library_path: PathBuf::new(),
            pointer_file: None,
            inbox_path: None,
            quarantine_path: None,
            preview_path: None,
            placeholder_path: None,
            heif_converter: None,
            keep_count: 5,
            palette: SPECTRA6.to_vec(),
            short_image: ShortImagePolicy::default(),
            jpeg_quality: 90,
            display_interval: Duration::from_secs(60 * 60),
            check_interval: Duration::from_secs(10),
            inbox_settle: Duration::from_secs(2),
            display_command: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_frame_setup() {
        let cfg = Configuration::default();
        assert_eq!(cfg.keep_count, 5);
        assert_eq!(cfg.palette.len(), 6);
        assert_eq!(cfg.display_interval, Duration::from_secs(3600));
        assert_eq!(cfg.check_interval, Duration::from_secs(10));
    }

    #[test]
    fn pointer_defaults_to_hidden_file_in_library() {
        let cfg = Configuration {
            library_path: PathBuf::from("/photos"),
            ..Default::default()
        };
        assert_eq!(cfg.pointer_file(), PathBuf::from("/photos/.current_photo"));
    }

    #[test]
    fn quarantine_follows_inbox() {
        let cfg = Configuration {
            inbox_path: Some(PathBuf::from("/inbox")),
            ..Default::default()
        };
        assert_eq!(
            cfg.quarantine_path(),
            Some(PathBuf::from("/inbox/.rejected"))
        );
        assert_eq!(Configuration::default().quarantine_path(), None);
    }
}
