//! Floyd–Steinberg error diffusion onto a fixed palette.
//!
//! The scan is strictly raster order (row-major, left to right, no serpentine)
//! and single-threaded: every pixel's decision depends on the error pushed by
//! the pixels before it.

use image::{Rgb, RgbImage};

use crate::error::{Error, Result};
use crate::palette::Palette;
use crate::processing::resize::resize_rgb;

/// A diffusion target relative to the current pixel, with its weight.
#[derive(Debug, Clone, Copy)]
pub struct KernelTap {
    pub dx: i32,
    pub dy: i32,
    pub weight: f32,
}

/// Classic Floyd–Steinberg kernel:
///
/// ```text
///        X   7
///    3   5   1     (/16)
/// ```
pub const FLOYD_STEINBERG: [KernelTap; 4] = [
    KernelTap { dx: 1, dy: 0, weight: 7.0 / 16.0 },
    KernelTap { dx: -1, dy: 1, weight: 3.0 / 16.0 },
    KernelTap { dx: 0, dy: 1, weight: 5.0 / 16.0 },
    KernelTap { dx: 1, dy: 1, weight: 1.0 / 16.0 },
];

/// Working copy of the image during a single dither call.
///
/// Values are kept as `f32` so diffused error can be applied before being
/// clamped back into `[0, 255]`.
#[derive(Debug)]
pub struct DitherBuffer {
    width: usize,
    height: usize,
    pixels: Vec<[f32; 3]>,
}

impl DitherBuffer {
    pub fn from_image(img: &RgbImage) -> Self {
        let pixels = img
            .pixels()
            .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
            .collect();
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            pixels,
        }
    }

    #[inline]
    fn idx(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> [f32; 3] {
        self.pixels[self.idx(x, y)]
    }

    #[inline]
    fn set(&mut self, x: usize, y: usize, value: [f32; 3]) {
        let i = self.idx(x, y);
        self.pixels[i] = value;
    }

    /// Push `weight * error` into the pixel at `(x + dx, y + dy)` and clamp it.
    ///
    /// Targets outside the image are skipped; their share of the error is lost.
    #[inline]
    fn diffuse(&mut self, x: usize, y: usize, tap: KernelTap, error: [f32; 3]) {
        let nx = x as i64 + tap.dx as i64;
        let ny = y as i64 + tap.dy as i64;
        if nx < 0 || ny < 0 || nx >= self.width as i64 || ny >= self.height as i64 {
            return;
        }
        let i = self.idx(nx as usize, ny as usize);
        let px = &mut self.pixels[i];
        for c in 0..3 {
            px[c] = (px[c] + error[c] * tap.weight).clamp(0.0, 255.0);
        }
    }
}

/// Per-row quantization statistics, useful for spotting diffusion bugs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DitherStats {
    /// Sum of `|working - chosen|` over all channels of each row.
    pub row_abs_error: Vec<f64>,
}

/// Downscale `image` to `target` with a quality filter, then quantize it to
/// `palette` with Floyd–Steinberg error diffusion.
///
/// Every output pixel is a palette member. Output is bit-exact for a given
/// input, palette and target size.
///
/// # Errors
/// [`Error::Precondition`] for a zero-sized image or target.
pub fn dither(image: &RgbImage, palette: &Palette, target: (u32, u32)) -> Result<RgbImage> {
    dither_with_stats(image, palette, target).map(|(img, _)| img)
}

/// Like [`dither`], also returning per-row error statistics.
pub fn dither_with_stats(
    image: &RgbImage,
    palette: &Palette,
    target: (u32, u32),
) -> Result<(RgbImage, DitherStats)> {
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::Precondition("cannot dither an empty image".into()));
    }
    if palette.is_empty() {
        return Err(Error::Precondition("palette must not be empty".into()));
    }
    let (tw, th) = target;
    let scaled = resize_rgb(image, tw, th)?;
    let mut buf = DitherBuffer::from_image(&scaled);
    let stats = quantize(&mut buf, palette, &FLOYD_STEINBERG);

    let mut out = RgbImage::new(tw, th);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let [r, g, b] = buf.get(x as usize, y as usize);
        *px = Rgb([r as u8, g as u8, b as u8]);
    }
    Ok((out, stats))
}

/// Quantize `buf` in place. After this every pixel holds an exact palette colour.
///
/// Error is only ever pushed to pixels east of or below the current one, so
/// finalized pixels are never touched again.
pub fn quantize(buf: &mut DitherBuffer, palette: &Palette, kernel: &[KernelTap]) -> DitherStats {
    debug_assert!(kernel.iter().all(|t| t.dy > 0 || (t.dy == 0 && t.dx > 0)));

    let mut stats = DitherStats {
        row_abs_error: Vec::with_capacity(buf.height),
    };
    for y in 0..buf.height {
        let mut row_error = 0.0f64;
        for x in 0..buf.width {
            let old = buf.get(x, y);
            let chosen = palette.color(palette.closest_index(old));
            let new = [chosen[0] as f32, chosen[1] as f32, chosen[2] as f32];
            let error = [old[0] - new[0], old[1] - new[1], old[2] - new[2]];
            buf.set(x, y, new);
            row_error += error.iter().map(|e| e.abs() as f64).sum::<f64>();
            for &tap in kernel {
                buf.diffuse(x, y, tap, error);
            }
        }
        stats.row_abs_error.push(row_error);
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bw() -> Palette {
        Palette::new(&[[0, 0, 0], [255, 255, 255]]).unwrap()
    }

    #[test]
    fn kernel_weights_sum_to_one() {
        let total: f32 = FLOYD_STEINBERG.iter().map(|t| t.weight).sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn flat_palette_colour_is_preserved() {
        let palette = Palette::default();
        let img = RgbImage::from_pixel(8, 6, Rgb([60, 180, 100]));
        let out = dither(&img, &palette, (8, 6)).unwrap();
        assert!(out.pixels().all(|p| *p == Rgb([60, 180, 100])));
    }

    #[test]
    fn mid_gray_becomes_a_checker_mix() {
        let img = RgbImage::from_pixel(10, 10, Rgb([128, 128, 128]));
        let out = dither(&img, &bw(), (10, 10)).unwrap();
        let white = out.pixels().filter(|p| p[0] == 255).count();
        assert!((35..=65).contains(&white), "white count {white}");
    }

    #[test]
    fn first_row_error_goes_east() {
        // 3x1 of value 100: 100 -> black (err 100), east gets 143.75 -> white
        // (err -111.25), east gets 100 - 48.67 = 51.33 -> black.
        let img = RgbImage::from_pixel(3, 1, Rgb([100, 100, 100]));
        let out = dither(&img, &bw(), (3, 1)).unwrap();
        let row: Vec<u8> = out.pixels().map(|p| p[0]).collect();
        assert_eq!(row, vec![0, 255, 0]);
    }

    #[test]
    fn diffusion_clamps_neighbours() {
        let mut buf = DitherBuffer::from_image(&RgbImage::from_pixel(2, 1, Rgb([250, 250, 250])));
        buf.diffuse(0, 0, FLOYD_STEINBERG[0], [100.0, 100.0, 100.0]);
        assert_eq!(buf.get(1, 0), [255.0, 255.0, 255.0]);
        buf.diffuse(0, 0, FLOYD_STEINBERG[0], [-1000.0, -1000.0, -1000.0]);
        assert_eq!(buf.get(1, 0), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn out_of_bounds_taps_are_skipped() {
        let mut buf = DitherBuffer::from_image(&RgbImage::from_pixel(1, 1, Rgb([10, 10, 10])));
        for tap in FLOYD_STEINBERG {
            buf.diffuse(0, 0, tap, [50.0, 50.0, 50.0]);
        }
        assert_eq!(buf.get(0, 0), [10.0, 10.0, 10.0]);
    }

    #[test]
    fn empty_image_is_a_precondition_error() {
        let img = RgbImage::new(0, 0);
        assert!(matches!(
            dither(&img, &bw(), (4, 4)),
            Err(Error::Precondition(_))
        ));
    }

    #[test]
    fn zero_target_is_a_precondition_error() {
        let img = RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]));
        assert!(matches!(
            dither(&img, &bw(), (0, 4)),
            Err(Error::Precondition(_))
        ));
    }
}
