use image::{Rgb, RgbImage};
use inkframe::dither::{DitherBuffer, FLOYD_STEINBERG, dither, dither_with_stats, quantize};
use inkframe::error::Error;
use inkframe::palette::Palette;

fn gradient(w: u32, h: u32) -> RgbImage {
    RgbImage::from_fn(w, h, |x, y| {
        Rgb([
            (x * 255 / w.max(1)) as u8,
            (y * 255 / h.max(1)) as u8,
            ((x * 7 + y * 13) % 256) as u8,
        ])
    })
}

#[test]
fn output_uses_only_palette_colors() {
    let palette = Palette::default();
    let out = dither(&gradient(640, 480), &palette, (400, 240)).unwrap();
    assert_eq!(out.dimensions(), (400, 240));
    assert!(out.pixels().all(|p| palette.contains(*p)));
}

#[test]
fn output_is_deterministic() {
    let palette = Palette::default();
    let img = gradient(300, 200);
    let a = dither(&img, &palette, (150, 100)).unwrap();
    let b = dither(&img, &palette, (150, 100)).unwrap();
    assert_eq!(a.as_raw(), b.as_raw());
}

#[test]
fn palette_image_passes_through_unchanged() {
    let palette = Palette::default();
    let colors = palette.colors().to_vec();
    let img = RgbImage::from_fn(60, 30, |x, y| colors[((x / 10 + y) as usize) % colors.len()]);
    let (out, stats) = dither_with_stats(&img, &palette, (60, 30)).unwrap();
    assert_eq!(out.as_raw(), img.as_raw());
    assert!(stats.row_abs_error.iter().all(|&e| e == 0.0));
}

#[test]
fn mid_grey_keeps_its_average_tone() {
    let palette = Palette::new(&[[0, 0, 0], [255, 255, 255]]).unwrap();
    let img = RgbImage::from_pixel(64, 64, Rgb([128, 128, 128]));
    let out = dither(&img, &palette, (64, 64)).unwrap();
    let white = out.pixels().filter(|p| p[0] == 255).count() as f64;
    let ratio = white / (64.0 * 64.0);
    assert!((ratio - 128.0 / 255.0).abs() < 0.05, "white ratio {ratio}");
}

fn band_tone_error(img: &RgbImage, buf: &DitherBuffer, band: u32) -> f64 {
    let (w, h) = img.dimensions();
    let mut worst = 0.0f64;
    for x0 in (0..w).step_by(band as usize) {
        let (mut input, mut output) = (0.0, 0.0);
        for y in 0..h {
            for x in x0..x0 + band {
                input += img.get_pixel(x, y)[0] as f64;
                output += buf.get(x as usize, y as usize)[0] as f64;
            }
        }
        let n = (band * h) as f64;
        worst = worst.max(((output - input) / n).abs());
    }
    worst
}

#[test]
fn diffusion_preserves_tone_along_a_ramp() {
    let palette = Palette::new(&[[0, 0, 0], [255, 255, 255]]).unwrap();
    let ramp = RgbImage::from_fn(256, 64, |x, _| Rgb([x as u8; 3]));

    let mut diffused = DitherBuffer::from_image(&ramp);
    let stats = quantize(&mut diffused, &palette, &FLOYD_STEINBERG);
    let mut nearest = DitherBuffer::from_image(&ramp);
    let reference = quantize(&mut nearest, &palette, &[]);

    let fs_err = band_tone_error(&ramp, &diffused, 32);
    let nearest_err = band_tone_error(&ramp, &nearest, 32);
    assert!(fs_err < 4.0, "diffused band tone off by {fs_err}");
    assert!(nearest_err > 100.0, "reference band tone off by {nearest_err}");
    assert_eq!(stats.row_abs_error.len(), 64);
    assert_eq!(reference.row_abs_error.len(), 64);
}

#[test]
fn small_image_matches_hand_computed_diffusion() {
    // Every decision sits at least 4 levels away from the 127.5 threshold, so
    // a wrong tap offset, weight or sign flips at least one pixel.
    let palette = Palette::new(&[[0, 0, 0], [255, 255, 255]]).unwrap();
    let input = [[210, 100, 110, 140], [50, 20, 200, 230], [60, 110, 180, 90]];
    let expected = [[255, 0, 255, 0], [0, 0, 255, 255], [0, 255, 0, 255]];
    let img = RgbImage::from_fn(4, 3, |x, y| Rgb([input[y as usize][x as usize]; 3]));

    let out = dither(&img, &palette, (4, 3)).unwrap();
    for (x, y, p) in out.enumerate_pixels() {
        assert_eq!(p[0], expected[y as usize][x as usize], "pixel ({x}, {y})");
    }
}

#[test]
fn zero_sized_target_is_rejected() {
    let palette = Palette::default();
    let err = dither(&gradient(10, 10), &palette, (0, 10)).unwrap_err();
    assert!(matches!(err, Error::Precondition(_)));
}
