/// Fixed geometry of a library frame.
pub const FRAME_WIDTH: u32 = 800;
pub const FRAME_HEIGHT: u32 = 480;

/// Fixed geometry of the dithered preview.
pub const PREVIEW_WIDTH: u32 = 400;
pub const PREVIEW_HEIGHT: u32 = 240;

/// Size after scaling `src_w` x `src_h` to exactly `target_w` wide.
///
/// Height is `round(src_h * target_w / src_w)`, never below one pixel.
pub fn fit_width(src_w: u32, src_h: u32, target_w: u32) -> (u32, u32) {
    let sw = src_w.max(1) as f64;
    let sh = src_h.max(1) as f64;
    let h = (sh * target_w as f64 / sw).round().max(1.0);
    (target_w, h.min(u32::MAX as f64) as u32)
}

/// Where a `window_h` tall window sits inside `inner_h` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalFit {
    /// Source is at least as tall as the window: crop rows `[top, top + window_h)`.
    Crop { top: u32 },
    /// Source is shorter: it is placed `top` rows down on a `window_h` canvas.
    Pad { top: u32 },
}

/// Centre a window of `window_h` rows over an image `inner_h` rows tall.
///
/// Crop offset is `(inner_h - window_h) / 2` with floor division. For short
/// images the window would overrun the source, so the image is centred instead.
pub fn vertical_fit(inner_h: u32, window_h: u32) -> VerticalFit {
    if inner_h >= window_h {
        VerticalFit::Crop {
            top: (inner_h - window_h) / 2,
        }
    } else {
        VerticalFit::Pad {
            top: center_offset(inner_h, window_h),
        }
    }
}

pub fn center_offset(inner: u32, outer: u32) -> u32 {
    outer.saturating_sub(inner) / 2
}
