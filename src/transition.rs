// SPDX-License-Identifier: MPL-2.0

//! Transition effects between composited frames.
//!
//! Both endpoints are full canvas-sized frames, so every effect is a pure
//! function of `(from, to, progress)`. Progress arrives raw from the
//! playback engine and is eased here.

use hearthview_config::{EaseKind, TransitionKind};
use image::{RgbImage, imageops};

/// Apply an easing curve to raw progress in `0.0..=1.0`.
#[must_use]
pub fn ease(kind: EaseKind, t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    match kind {
        EaseKind::Linear => t,
        EaseKind::EaseIn => t * t,
        EaseKind::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
        EaseKind::EaseInOut => {
            if t < 0.5 {
                2.0 * t * t
            } else {
                1.0 - 2.0 * (1.0 - t) * (1.0 - t)
            }
        }
    }
}

/// Compose the transition frame at eased progress `t`.
///
/// `from` and `to` must share dimensions; the scaler guarantees that by
/// always compositing onto the full canvas.
#[must_use]
pub fn compose(kind: TransitionKind, from: &RgbImage, to: &RgbImage, t: f32) -> RgbImage {
    let t = t.clamp(0.0, 1.0);
    match kind {
        TransitionKind::None => to.clone(),
        TransitionKind::Crossfade => crossfade(from, to, t),
        TransitionKind::Fade => fade_through_black(from, to, t),
        TransitionKind::Slide => slide(from, to, t),
        TransitionKind::Zoom => zoom(from, to, t),
    }
}

fn lerp(a: u8, b: u8, t: f32) -> u8 {
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let v = (f32::from(a) + (f32::from(b) - f32::from(a)) * t).round() as u8;
    v
}

fn crossfade(from: &RgbImage, to: &RgbImage, t: f32) -> RgbImage {
    let mut out = from.clone();
    for (dst, src) in out.pixels_mut().zip(to.pixels()) {
        dst.0[0] = lerp(dst.0[0], src.0[0], t);
        dst.0[1] = lerp(dst.0[1], src.0[1], t);
        dst.0[2] = lerp(dst.0[2], src.0[2], t);
    }
    out
}

/// Fade the old frame to black over the first half, then the new frame up
/// from black over the second half.
fn fade_through_black(from: &RgbImage, to: &RgbImage, t: f32) -> RgbImage {
    let (source, level) = if t < 0.5 {
        (from, 1.0 - t * 2.0)
    } else {
        (to, (t - 0.5) * 2.0)
    };
    let mut out = source.clone();
    for pixel in out.pixels_mut() {
        pixel.0[0] = lerp(0, pixel.0[0], level);
        pixel.0[1] = lerp(0, pixel.0[1], level);
        pixel.0[2] = lerp(0, pixel.0[2], level);
    }
    out
}

/// The new frame slides in from the right edge.
fn slide(from: &RgbImage, to: &RgbImage, t: f32) -> RgbImage {
    let width = i64::from(from.width());
    #[allow(clippy::cast_possible_truncation)]
    let offset = ((1.0 - t) * width as f32).round() as i64;
    let mut out = from.clone();
    imageops::overlay(&mut out, to, offset, 0);
    out
}

/// The new frame grows from the center over the old one.
fn zoom(from: &RgbImage, to: &RgbImage, t: f32) -> RgbImage {
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let w = (to.width() as f32 * t).round() as u32;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let h = (to.height() as f32 * t).round() as u32;
    if w == 0 || h == 0 {
        return from.clone();
    }
    if w >= to.width() && h >= to.height() {
        return to.clone();
    }
    let scaled = imageops::resize(to, w, h, imageops::FilterType::Triangle);
    let mut out = from.clone();
    let x = i64::from((from.width() - w) / 2);
    let y = i64::from((from.height() - h) / 2);
    imageops::overlay(&mut out, &scaled, x, y);
    out
}
