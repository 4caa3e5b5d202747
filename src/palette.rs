//! Nearest-colour matching against the display's fixed palette.
//!
//! Distance is a luminance-weighted Euclidean metric over squared sRGB channel
//! differences (0.30 red, 0.59 green, 0.11 blue). It is not a CIE distance;
//! the weights are part of the output format and must not drift.

use image::Rgb;

use crate::error::{Error, Result};

pub const RED_WEIGHT: f32 = 0.30;
pub const GREEN_WEIGHT: f32 = 0.59;
pub const BLUE_WEIGHT: f32 = 0.11;

/// Simulated Spectra 6 colours as they appear on the panel.
pub const SPECTRA6: [[u8; 3]; 6] = [
    [230, 45, 45],   // soft red
    [60, 180, 100],  // pastel green
    [50, 100, 190],  // soft blue
    [255, 220, 60],  // pale yellow
    [20, 20, 20],    // black
    [245, 245, 245], // off-white
];

/// A non-empty, ordered set of reference colours.
///
/// Order matters: when two entries are equally close to a pixel the earlier
/// one wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Rgb<u8>>,
}

impl Palette {
    /// Build a palette from RGB triples.
    ///
    /// # Errors
    /// Returns [`Error::Precondition`] when `colors` is empty.
    pub fn new(colors: &[[u8; 3]]) -> Result<Self> {
        if colors.is_empty() {
            return Err(Error::Precondition("palette must not be empty".into()));
        }
        Ok(Self {
            colors: colors.iter().map(|&c| Rgb(c)).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn colors(&self) -> &[Rgb<u8>] {
        &self.colors
    }

    pub fn contains(&self, color: Rgb<u8>) -> bool {
        self.colors.contains(&color)
    }

    /// Closest palette entry to an 8-bit pixel.
    #[inline]
    pub fn closest(&self, pixel: Rgb<u8>) -> Rgb<u8> {
        let [r, g, b] = pixel.0;
        self.colors[self.closest_index([r as f32, g as f32, b as f32])]
    }

    /// Index of the closest entry to a working-precision pixel.
    ///
    /// Linear scan; the first entry with the minimal distance wins.
    #[inline]
    pub fn closest_index(&self, pixel: [f32; 3]) -> usize {
        let mut best_idx = 0;
        let mut best_dist = f32::MAX;
        for (i, color) in self.colors.iter().enumerate() {
            let dist = weighted_distance(pixel, *color);
            if dist < best_dist {
                best_dist = dist;
                best_idx = i;
            }
        }
        best_idx
    }

    #[inline]
    pub fn color(&self, idx: usize) -> Rgb<u8> {
        self.colors[idx]
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: SPECTRA6.iter().map(|&c| Rgb(c)).collect(),
        }
    }
}

/// Luminance-weighted squared distance between a pixel and a palette entry.
#[inline]
pub fn weighted_distance(pixel: [f32; 3], color: Rgb<u8>) -> f32 {
    let dr = pixel[0] - color[0] as f32;
    let dg = pixel[1] - color[1] as f32;
    let db = pixel[2] - color[2] as f32;
    RED_WEIGHT * dr * dr + GREEN_WEIGHT * dg * dg + BLUE_WEIGHT * db * db
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_entries_map_to_themselves() {
        let palette = Palette::default();
        for &c in &SPECTRA6 {
            assert_eq!(palette.closest(Rgb(c)), Rgb(c));
        }
    }

    #[test]
    fn closest_is_deterministic() {
        let palette = Palette::default();
        let px = Rgb([123, 77, 201]);
        assert_eq!(palette.closest(px), palette.closest(px));
    }

    #[test]
    fn ties_prefer_first_entry() {
        // Mid-gray is exactly between black and white in every channel.
        let palette = Palette::new(&[[0, 0, 0], [254, 254, 254]]).unwrap();
        assert_eq!(palette.closest_index([127.0, 127.0, 127.0]), 0);

        let flipped = Palette::new(&[[254, 254, 254], [0, 0, 0]]).unwrap();
        assert_eq!(flipped.closest_index([127.0, 127.0, 127.0]), 0);
    }

    #[test]
    fn green_dominates_the_metric() {
        // Same absolute error, but green is weighted far more than blue.
        let palette = Palette::new(&[[100, 140, 100], [100, 100, 140]]).unwrap();
        assert_eq!(palette.closest(Rgb([100, 100, 100])), Rgb([100, 100, 140]));
    }

    #[test]
    fn weights_follow_luma_convention() {
        let d = weighted_distance([10.0, 0.0, 0.0], Rgb([0, 0, 0]));
        assert!((d - 30.0).abs() < 1e-4);
        let d = weighted_distance([0.0, 10.0, 0.0], Rgb([0, 0, 0]));
        assert!((d - 59.0).abs() < 1e-4);
        let d = weighted_distance([0.0, 0.0, 10.0], Rgb([0, 0, 0]));
        assert!((d - 11.0).abs() < 1e-4);
    }

    #[test]
    fn empty_palette_is_rejected() {
        assert!(matches!(Palette::new(&[]), Err(Error::Precondition(_))));
    }

    #[test]
    fn saturated_red_maps_to_soft_red() {
        let palette = Palette::default();
        assert_eq!(palette.closest(Rgb([255, 0, 0])), Rgb([230, 45, 45]));
    }
}
