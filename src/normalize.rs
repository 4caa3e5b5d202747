//! Raw image -> fixed 800x480 library frame (+ optional dithered preview).

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage, imageops};
use tracing::{debug, info, warn};

use crate::config::{Configuration, ShortImagePolicy};
use crate::dither::dither;
use crate::error::{Error, IoContext, Result};
use crate::library::{Photo, write_then_rename};
use crate::palette::Palette;
use crate::processing::decode::Decoder;
use crate::processing::layout::{
    FRAME_HEIGHT, FRAME_WIDTH, PREVIEW_HEIGHT, PREVIEW_WIDTH, VerticalFit, fit_width,
    vertical_fit,
};
use crate::processing::resize::resize_rgb;

/// Extension of every normalized library file.
pub const LIBRARY_EXTENSION: &str = "jpg";

/// `YYYY-MM-DD-HHMMSS.<ext>` in local time.
pub fn timestamped_name(modified: SystemTime, ext: &str) -> String {
    let local: DateTime<Local> = modified.into();
    format!("{}.{ext}", local.format("%Y-%m-%d-%H%M%S"))
}

#[derive(Debug, Clone)]
struct PreviewTarget {
    path: PathBuf,
    palette: Palette,
}

/// Result of a successful [`Normalizer::normalize`].
#[derive(Debug, Clone)]
pub struct Normalized {
    pub photo: Photo,
    pub preview: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    library_dir: PathBuf,
    decoder: Decoder,
    preview: Option<PreviewTarget>,
    short_image: ShortImagePolicy,
    jpeg_quality: u8,
}

impl Normalizer {
    pub fn new(library_dir: impl Into<PathBuf>) -> Self {
        Self {
            library_dir: library_dir.into(),
            decoder: Decoder::new().with_min_width(FRAME_WIDTH),
            preview: None,
            short_image: ShortImagePolicy::default(),
            jpeg_quality: 90,
        }
    }

    pub fn from_config(cfg: &Configuration) -> anyhow::Result<Self> {
        let mut normalizer = Self::new(&cfg.library_path)
            .with_decoder(
                Decoder::new()
                    .with_min_width(FRAME_WIDTH)
                    .with_heif_converter(cfg.heif_converter.clone()),
            )
            .with_short_image(cfg.short_image)
            .with_jpeg_quality(cfg.jpeg_quality);
        if let Some(preview) = &cfg.preview_path {
            normalizer = normalizer.with_preview(preview.clone(), cfg.palette()?);
        }
        Ok(normalizer)
    }

    pub fn with_decoder(mut self, decoder: Decoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Also write a dithered 400x240 preview to `path` on every call.
    pub fn with_preview(mut self, path: PathBuf, palette: Palette) -> Self {
        self.preview = Some(PreviewTarget { path, palette });
        self
    }

    pub fn with_short_image(mut self, policy: ShortImagePolicy) -> Self {
        self.short_image = policy;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn library_dir(&self) -> &Path {
        &self.library_dir
    }

    /// Decode, orient, fit and persist `raw` into the library, then delete `raw`.
    ///
    /// Any failure aborts the remaining steps. The library file only appears
    /// under its final name once completely written.
    pub fn normalize(&self, raw: &Path) -> Result<Normalized> {
        let decoded = self.decoder.decode(raw)?;
        debug!(
            source = %raw.display(),
            width = decoded.width(),
            height = decoded.height(),
            "decoded"
        );

        let modified = fs::metadata(raw).and_then(|m| m.modified()).at(raw)?;
        let framed = self.frame(&decoded, raw)?;
        drop(decoded);

        let dest = self
            .library_dir
            .join(timestamped_name(modified, LIBRARY_EXTENSION));
        write_then_rename(&dest, |tmp| save_jpeg(&framed, tmp, self.jpeg_quality))?;
        if raw != dest {
            fs::remove_file(raw).at(raw)?;
        }
        let photo = Photo::from_path(&dest)?;
        info!(source = %raw.display(), photo = %photo.name, "normalized into library");

        // The photo is already published; a missing preview must not undo that.
        let preview = self
            .preview
            .as_ref()
            .and_then(|target| match write_preview(&framed, target) {
                Ok(path) => Some(path),
                Err(err) => {
                    warn!(path = %target.path.display(), "preview not written: {err}");
                    None
                }
            });

        Ok(Normalized { photo, preview })
    }

    /// Scale to the frame width, then crop (or pad) to the frame height.
    pub fn frame(&self, img: &RgbImage, source: &Path) -> Result<RgbImage> {
        let (w, h) = fit_width(img.width(), img.height(), FRAME_WIDTH);
        let fit = vertical_fit(h, FRAME_HEIGHT);
        let pad_color = match (fit, self.short_image) {
            (VerticalFit::Pad { .. }, ShortImagePolicy::Reject) => {
                return Err(Error::decode(
                    source,
                    format!("image is too short for the frame ({w}x{h} after fitting)"),
                ));
            }
            (_, ShortImagePolicy::Pad { color }) => image::Rgb(color),
            (VerticalFit::Crop { .. }, ShortImagePolicy::Reject) => image::Rgb([0, 0, 0]),
        };

        debug!(width = w, height = h, ?fit, "fitted");
        let framed = match fit {
            VerticalFit::Crop { top } => {
                // Resample only the source rows behind the window.
                let (y0, rows) = source_window(img.height(), h, top, FRAME_HEIGHT);
                let window = imageops::crop_imm(img, 0, y0, img.width(), rows).to_image();
                resize_rgb(&window, FRAME_WIDTH, FRAME_HEIGHT)?
            }
            VerticalFit::Pad { top } => {
                let resized = resize_rgb(img, w, h)?;
                let mut canvas = RgbImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, pad_color);
                imageops::overlay(&mut canvas, &resized, 0, top as i64);
                canvas
            }
        };
        Ok(framed)
    }
}

/// Source rows `[y0, y0 + rows)` covering fitted rows `[top, top + window_h)`
/// of an image scaled from `src_h` to `fitted_h` rows.
fn source_window(src_h: u32, fitted_h: u32, top: u32, window_h: u32) -> (u32, u32) {
    let (src_h, fitted_h) = (src_h as u64, fitted_h.max(1) as u64);
    let y0 = (top as u64 * src_h / fitted_h).min(src_h.saturating_sub(1));
    let y1 = ((top as u64 + window_h as u64) * src_h).div_ceil(fitted_h);
    let y1 = y1.clamp(y0 + 1, src_h);
    (y0 as u32, (y1 - y0) as u32)
}

fn write_preview(framed: &RgbImage, target: &PreviewTarget) -> Result<PathBuf> {
    let preview = dither(framed, &target.palette, (PREVIEW_WIDTH, PREVIEW_HEIGHT))?;
    if let Some(parent) = target.path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).at(parent)?;
    }
    write_then_rename(&target.path, |tmp| {
        preview
            .save_with_format(tmp, ImageFormat::Png)
            .map_err(|err| Error::fs(tmp, std::io::Error::other(err)))
    })?;
    debug!(path = %target.path.display(), "preview written");
    Ok(target.path.clone())
}

fn save_jpeg(img: &RgbImage, path: &Path, quality: u8) -> Result<()> {
    let file = File::create(path).at(path)?;
    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, quality)
        .encode_image(img)
        .map_err(|err| Error::fs(path, std::io::Error::other(err)))?;
    writer.flush().at(path)
}
