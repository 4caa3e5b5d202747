use fast_image_resize as fir;
use image::{Rgb, RgbImage, Rgba, RgbaImage};

use crate::error::{Error, Result};

/// Resample an RGB image to exactly `target_w` x `target_h` with Lanczos3.
pub fn resize_rgb(source: &RgbImage, target_w: u32, target_h: u32) -> Result<RgbImage> {
    if target_w == 0 || target_h == 0 {
        return Err(Error::Precondition(
            "resize dimensions must be positive".into(),
        ));
    }
    if source.width() == 0 || source.height() == 0 {
        return Err(Error::Precondition("cannot resize an empty image".into()));
    }
    if source.width() == target_w && source.height() == target_h {
        return Ok(source.clone());
    }

    let rgba = to_rgba(source);
    let resized = resize_rgba(&rgba, target_w, target_h)?;
    Ok(to_rgb(&resized))
}

fn resize_rgba(source: &RgbaImage, target_w: u32, target_h: u32) -> Result<RgbaImage> {
    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .map_err(|err| Error::Precondition(format!("invalid resize source: {err}")))?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .map_err(|err| Error::Precondition(format!("resize failed: {err}")))?;
    let buffer = dst_image.into_vec();
    RgbaImage::from_raw(target_w, target_h, buffer)
        .ok_or_else(|| Error::Precondition("failed to construct resized image".into()))
}

// fast_image_resize is built with only the U8x4 pixel type; alpha is opaque.
fn to_rgba(source: &RgbImage) -> RgbaImage {
    RgbaImage::from_fn(source.width(), source.height(), |x, y| {
        let [r, g, b] = source.get_pixel(x, y).0;
        Rgba([r, g, b, 255])
    })
}

fn to_rgb(source: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(source.width(), source.height(), |x, y| {
        let [r, g, b, _] = source.get_pixel(x, y).0;
        Rgb([r, g, b])
    })
}
