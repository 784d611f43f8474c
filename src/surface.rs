// SPDX-License-Identifier: MPL-2.0

//! Presentation targets.
//!
//! The engine renders full frames and hands them to a [`Surface`]. The
//! production target is a linux framebuffer device; the headless target
//! keeps the engine honest in tests and lets the daemon run without a
//! display attached.

use std::{
    fs::{File, OpenOptions},
    io::{Seek, SeekFrom, Write},
    path::Path,
};

use eyre::WrapErr;
use image::RgbImage;

use crate::draw;

pub trait Surface {
    fn size(&self) -> (u32, u32);

    /// Show a frame. The frame's dimensions must match `size`.
    fn present(&mut self, frame: &RgbImage) -> eyre::Result<()>;
}

/// Writes XRGB8888 frames straight into a framebuffer device.
pub struct Framebuffer {
    device: File,
    width: u32,
    height: u32,
    // Conversion scratch, reused across frames.
    canvas: Vec<u8>,
}

impl Framebuffer {
    pub fn open(path: &Path, width: u32, height: u32) -> eyre::Result<Self> {
        let device = OpenOptions::new()
            .write(true)
            .open(path)
            .wrap_err_with(|| format!("opening framebuffer device {}", path.display()))?;
        Ok(Self {
            device,
            width,
            height,
            canvas: vec![0u8; draw::canvas_len(width, height)],
        })
    }
}

impl Surface for Framebuffer {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn present(&mut self, frame: &RgbImage) -> eyre::Result<()> {
        draw::xrgb888_canvas(&mut self.canvas, frame);
        self.device
            .seek(SeekFrom::Start(0))
            .wrap_err("seeking framebuffer")?;
        self.device
            .write_all(&self.canvas)
            .wrap_err("writing frame to framebuffer")?;
        Ok(())
    }
}

/// A surface that swallows frames, remembering only the last one.
pub struct Headless {
    width: u32,
    height: u32,
    pub presented: u64,
    pub last_frame: Option<RgbImage>,
}

impl Headless {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            presented: 0,
            last_frame: None,
        }
    }
}

impl Drop for Headless {
    fn drop(&mut self) {
        tracing::debug!(
            frames = self.presented,
            holding = self.last_frame.is_some(),
            "headless surface dropped"
        );
    }
}

impl Surface for Headless {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn present(&mut self, frame: &RgbImage) -> eyre::Result<()> {
        self.presented += 1;
        self.last_frame = Some(frame.clone());
        Ok(())
    }
}
