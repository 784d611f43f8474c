// SPDX-License-Identifier: MPL-2.0

//! Scaling of decoded media onto the display canvas: fit, stretch, zoom.
//!
//! Every mode produces a frame at exactly the canvas size, so transitions
//! and the presenter never deal with mismatched dimensions.

use hearthview_config::ScalingMode;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};

/// Scale `img` onto a `width` x `height` canvas according to `mode`,
/// filling any letterbox area with `color`.
#[must_use]
pub fn composite(
    img: &DynamicImage,
    mode: ScalingMode,
    color: &[f32; 3],
    width: u32,
    height: u32,
) -> RgbImage {
    match mode {
        ScalingMode::Fit => fit(img, color, width, height),
        ScalingMode::Zoom => zoom(img, width, height),
        ScalingMode::Stretch => stretch(img, width, height),
    }
}

fn background(color: &[f32; 3]) -> Rgb<u8> {
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    Rgb(color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
}

pub fn fit(img: &DynamicImage, color: &[f32; 3], layer_width: u32, layer_height: u32) -> RgbImage {
    let mut filled_image = RgbImage::from_pixel(layer_width, layer_height, background(color));

    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return filled_image;
    }

    let ratio = (f64::from(layer_width) / f64::from(w)).min(f64::from(layer_height) / f64::from(h));

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let (new_width, new_height) = (
        (f64::from(w) * ratio).round() as u32,
        (f64::from(h) * ratio).round() as u32,
    );

    let resized_image = img.resize(new_width, new_height, FilterType::Lanczos3);

    image::imageops::replace(
        &mut filled_image,
        &resized_image.to_rgb8(),
        ((layer_width - resized_image.width()) / 2).into(),
        ((layer_height - resized_image.height()) / 2).into(),
    );

    filled_image
}

pub fn stretch(img: &DynamicImage, layer_width: u32, layer_height: u32) -> RgbImage {
    img.resize_exact(layer_width, layer_height, FilterType::Lanczos3)
        .to_rgb8()
}

pub fn zoom(img: &DynamicImage, layer_width: u32, layer_height: u32) -> RgbImage {
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return RgbImage::new(layer_width, layer_height);
    }

    let ratio = (f64::from(layer_width) / f64::from(w)).max(f64::from(layer_height) / f64::from(h));

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let (new_width, new_height) = (
        (f64::from(w) * ratio).round() as u32,
        (f64::from(h) * ratio).round() as u32,
    );

    let mut new_image =
        image::imageops::resize(&img.to_rgb8(), new_width, new_height, FilterType::Lanczos3);

    image::imageops::crop(
        &mut new_image,
        (new_width.saturating_sub(layer_width)) / 2,
        (new_height.saturating_sub(layer_height)) / 2,
        layer_width,
        layer_height,
    )
    .to_image()
}
