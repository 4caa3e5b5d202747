//! Input gate and decoding: accepted extensions, EXIF orientation, alpha removal.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Command;

use image::{DynamicImage, ImageFormat, ImageReader, RgbImage, imageops};
use jpeg_decoder::{Decoder as JpegDecoder, PixelFormat};
use tracing::debug;

use crate::error::{Error, IoContext, Result};

/// Extensions accepted as raw input (lowercase, without dot).
pub const ACCEPTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "heic", "heif"];

const HEIF_EXTENSIONS: &[&str] = &["heic", "heif"];

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
}

/// Return `true` if `path` has an accepted raw-image extension.
#[must_use]
pub fn is_accepted(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()))
}

fn is_heif(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| HEIF_EXTENSIONS.contains(&ext.as_str()))
}

/// Decodes raw inputs into upright, opaque RGB buffers.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    heif_converter: Option<PathBuf>,
    min_width: Option<u32>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// External program used for HEIC/HEIF (`<program> <input> <output.png>`),
    /// e.g. libheif's `heif-convert`.
    pub fn with_heif_converter(mut self, program: Option<PathBuf>) -> Self {
        self.heif_converter = program;
        self
    }

    /// Lets JPEGs decode at a reduced DCT scale as long as both sides stay at
    /// least `width` pixels, so the upright width never drops below it.
    pub fn with_min_width(mut self, width: u32) -> Self {
        self.min_width = Some(width);
        self
    }

    /// Decode `path`, apply its EXIF orientation and drop any alpha channel.
    ///
    /// # Errors
    /// [`Error::UnsupportedFormat`] before touching the file when the extension
    /// is not accepted, [`Error::Decode`] when the content is not a readable image.
    pub fn decode(&self, path: &Path) -> Result<RgbImage> {
        if !is_accepted(path) {
            return Err(Error::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        }
        let meta = fs::metadata(path).at(path)?;
        if !meta.is_file() {
            return Err(Error::decode(path, "not a regular file"));
        }

        if is_heif(path) {
            // libheif already applies the container's rotation; EXIF would double it.
            return self.decode_heif(path).map(|img| img.to_rgb8());
        }

        let img = self.decode_raster(path)?;
        let rgb = img.to_rgb8();
        if rgb.width() == 0 || rgb.height() == 0 {
            return Err(Error::decode(path, "image has no pixels"));
        }
        let orientation = read_orientation(path).unwrap_or(1);
        Ok(apply_orientation(rgb, orientation))
    }

    fn decode_raster(&self, path: &Path) -> Result<DynamicImage> {
        let reader = ImageReader::open(path)
            .at(path)?
            .with_guessed_format()
            .at(path)?;
        let format = reader.format();

        if matches!(format, Some(ImageFormat::Jpeg))
            && let Some(min) = self.min_width
        {
            match decode_jpeg_scaled(path, min) {
                Ok(img) => return Ok(img),
                Err(err) => {
                    debug!(
                        path = %path.display(),
                        "scaled JPEG decode failed ({err}); falling back"
                    );
                }
            }
        }

        reader.decode().map_err(|err| Error::decode(path, err))
    }

    fn decode_heif(&self, path: &Path) -> Result<DynamicImage> {
        let Some(program) = self.heif_converter.as_ref() else {
            return Err(Error::decode(
                path,
                "HEIC/HEIF input needs `heif-converter` to be configured",
            ));
        };
        let out = sibling_temp(path, "png");
        let status = Command::new(program)
            .arg(path)
            .arg(&out)
            .status()
            .map_err(|err| {
                Error::decode(path, format!("failed to run {}: {err}", program.display()))
            })?;
        let decoded = if status.success() {
            image::open(&out).map_err(|err| Error::decode(path, err))
        } else {
            Err(Error::decode(
                path,
                format!("{} exited with {status}", program.display()),
            ))
        };
        if out.exists()
            && let Err(err) = fs::remove_file(&out)
        {
            debug!(path = %out.display(), "could not remove HEIF scratch file: {err}");
        }
        decoded
    }
}

fn sibling_temp(path: &Path, ext: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.decoded.{ext}"))
}

fn decode_jpeg_scaled(path: &Path, min_side: u32) -> Result<DynamicImage> {
    use jpeg_decoder::Error as JpegError;

    let describe = |err: JpegError| match err {
        JpegError::Unsupported(feature) => format!("unsupported JPEG feature: {feature:?}"),
        other => other.to_string(),
    };

    let file = File::open(path).at(path)?;
    let mut decoder = JpegDecoder::new(BufReader::new(file));
    let request = min_side.clamp(1, u16::MAX as u32) as u16;
    decoder
        .scale(request, request)
        .map_err(|err| Error::decode(path, describe(err)))?;
    let pixels = decoder
        .decode()
        .map_err(|err| Error::decode(path, describe(err)))?;
    let info = decoder
        .info()
        .ok_or_else(|| Error::decode(path, "missing JPEG frame info"))?;
    let width = info.width as u32;
    let height = info.height as u32;

    let rgb = match info.pixel_format {
        PixelFormat::RGB24 => pixels,
        PixelFormat::L8 => pixels.iter().flat_map(|&v| [v, v, v]).collect(),
        PixelFormat::CMYK32 => {
            let mut rgb = Vec::with_capacity(pixels.len() / 4 * 3);
            for chunk in pixels.chunks_exact(4) {
                let k = chunk[3] as f32 / 255.0;
                for &ink in &chunk[..3] {
                    let ink = ink as f32 / 255.0;
                    let ink = ink * (1.0 - k) + k;
                    rgb.push(((1.0 - ink) * 255.0).round().clamp(0.0, 255.0) as u8);
                }
            }
            rgb
        }
        PixelFormat::L16 => {
            return Err(Error::decode(
                path,
                "16-bit grayscale JPEGs are not supported by the scaled decoder",
            ));
        }
    };

    RgbImage::from_raw(width, height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| Error::decode(path, "JPEG buffer does not match its dimensions"))
}

/// EXIF orientation tag (1..=8) of the primary image, if present.
pub fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let o = field.value.get_uint(0)? as u16;
    debug!(path = %path.display(), orientation = o, "exif orientation");
    Some(o)
}

/// Rotate/flip so the buffer matches the intended visual orientation.
pub fn apply_orientation(img: RgbImage, orientation: u16) -> RgbImage {
    match orientation {
        2 => imageops::flip_horizontal(&img),
        3 => imageops::rotate180(&img),
        4 => imageops::flip_vertical(&img),
        // transpose
        5 => imageops::flip_horizontal(&imageops::rotate90(&img)),
        6 => imageops::rotate90(&img),
        // transverse
        7 => imageops::flip_horizontal(&imageops::rotate270(&img)),
        8 => imageops::rotate270(&img),
        _ => img,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn marked() -> RgbImage {
        // 3x2, red marker in the top-left corner.
        let mut img = RgbImage::from_pixel(3, 2, Rgb([0, 0, 0]));
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img
    }

    fn marker_at(img: &RgbImage) -> (u32, u32) {
        img.enumerate_pixels()
            .find(|(_, _, p)| **p == Rgb([255, 0, 0]))
            .map(|(x, y, _)| (x, y))
            .unwrap()
    }

    #[test]
    fn accepted_extensions_are_case_insensitive() {
        assert!(is_accepted(Path::new("a/photo.JPG")));
        assert!(is_accepted(Path::new("b.heic")));
        assert!(is_accepted(Path::new("c.WebP")));
        assert!(!is_accepted(Path::new("d.tiff")));
        assert!(!is_accepted(Path::new("noext")));
    }

    #[test]
    fn orientation_transforms_move_the_corner() {
        assert_eq!(marker_at(&apply_orientation(marked(), 1)), (0, 0));
        assert_eq!(marker_at(&apply_orientation(marked(), 2)), (2, 0));
        assert_eq!(marker_at(&apply_orientation(marked(), 3)), (2, 1));
        assert_eq!(marker_at(&apply_orientation(marked(), 4)), (0, 1));
        assert_eq!(marker_at(&apply_orientation(marked(), 5)), (0, 0));
        assert_eq!(marker_at(&apply_orientation(marked(), 6)), (1, 0));
        assert_eq!(marker_at(&apply_orientation(marked(), 7)), (1, 2));
        assert_eq!(marker_at(&apply_orientation(marked(), 8)), (0, 2));
    }

    #[test]
    fn quarter_turns_swap_dimensions() {
        for o in 5..=8 {
            assert_eq!(apply_orientation(marked(), o).dimensions(), (2, 3));
        }
        assert_eq!(apply_orientation(marked(), 9).dimensions(), (3, 2));
    }

    #[test]
    fn unsupported_extension_is_rejected_before_io() {
        let err = Decoder::new()
            .decode(Path::new("/definitely/missing/file.bmp"))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
    }

    #[test]
    fn heif_without_converter_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("x.heic");
        fs::write(&p, b"not really heif").unwrap();
        let err = Decoder::new().decode(&p).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }
}
