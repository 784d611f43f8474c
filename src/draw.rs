// SPDX-License-Identifier: MPL-2.0

//! Pixel format conversion for presentation.

use image::RgbImage;

/// Bytes per pixel of the XRGB8888 canvas layout.
pub const BYTES_PER_PIXEL: usize = 4;

/// Draws the image on an 8-bit XRGB canvas.
///
/// The canvas must hold `width * height * 4` bytes; little-endian
/// XRGB8888 is what dumb framebuffers and wl_shm both speak.
pub fn xrgb888_canvas(canvas: &mut [u8], image: &RgbImage) {
    for (pos, pixel) in image.pixels().enumerate() {
        let indice = pos * BYTES_PER_PIXEL;

        let [r, g, b] = pixel.0;

        let r = u32::from(r) << 16;
        let g = u32::from(g) << 8;
        let b = u32::from(b);

        canvas[indice..indice + 4].copy_from_slice(&(r | g | b).to_le_bytes());
    }
}

/// Required canvas size in bytes for a frame of the given dimensions.
#[must_use]
pub fn canvas_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}
