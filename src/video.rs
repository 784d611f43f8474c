// SPDX-License-Identifier: MPL-2.0

//! Video decoding through an external ffmpeg process.
//!
//! ffmpeg writes raw RGB frames to a pipe and we pull them on demand. A
//! whole video is compressed into one slide slot: the stream is probed for
//! its frame count and frames are skipped at a fixed interval so playback
//! spans the configured display duration.

use std::{
    io::Read,
    path::Path,
    process::{Child, Command, Stdio},
    time::Duration,
};

use eyre::{OptionExt, WrapErr, eyre};
use hearthview_config::VideoConfig;
use image::RgbImage;

/// Locate a usable ffmpeg binary.
///
/// An explicitly configured path must exist; otherwise common install
/// locations are probed with `-version`.
pub fn find_ffmpeg(custom_path: Option<&str>) -> eyre::Result<String> {
    if let Some(path) = custom_path {
        if Path::new(path).exists() {
            return Ok(path.to_string());
        }
        return Err(eyre!("ffmpeg not found at configured path {path}"));
    }

    let candidates = [
        "ffmpeg",
        "/usr/bin/ffmpeg",
        "/usr/local/bin/ffmpeg",
        "/opt/homebrew/bin/ffmpeg",
    ];
    for candidate in candidates {
        if Command::new(candidate)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
        {
            return Ok(candidate.to_string());
        }
    }

    Err(eyre!("ffmpeg not found on PATH"))
}

#[derive(Debug, Clone, Copy)]
pub struct VideoProbe {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: u64,
}

/// Query stream geometry and length with ffprobe.
pub fn probe(path: &Path, ffmpeg: &str) -> eyre::Result<VideoProbe> {
    let ffprobe = sibling_ffprobe(ffmpeg);

    let output = Command::new(&ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,nb_frames",
            "-of",
            "csv=p=0",
        ])
        .arg(path)
        .output()
        .wrap_err_with(|| format!("running ffprobe on {}", path.display()))?;

    let text = String::from_utf8_lossy(&output.stdout);
    let mut info = parse_probe_line(text.trim())
        .ok_or_else(|| eyre!("unparseable ffprobe output for {}: {text:?}", path.display()))?;

    // Some containers omit nb_frames; fall back to duration * fps.
    if info.total_frames == 0 {
        let duration = Command::new(&ffprobe)
            .args(["-v", "error", "-show_entries", "format=duration", "-of", "csv=p=0"])
            .arg(path)
            .output()
            .ok()
            .map(|out| String::from_utf8_lossy(&out.stdout).trim().parse::<f64>().unwrap_or(0.0))
            .unwrap_or(0.0);
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        {
            info.total_frames = (duration * info.fps).ceil() as u64;
        }
    }

    Ok(info)
}

fn sibling_ffprobe(ffmpeg: &str) -> String {
    if ffmpeg.ends_with("ffmpeg") {
        ffmpeg.replace("ffmpeg", "ffprobe")
    } else {
        "ffprobe".to_string()
    }
}

fn parse_probe_line(line: &str) -> Option<VideoProbe> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < 3 {
        return None;
    }
    let width: u32 = parts[0].parse().ok()?;
    let height: u32 = parts[1].parse().ok()?;
    let fps = parse_fps(parts[2]);
    let total_frames: u64 = parts.get(3).and_then(|s| s.parse().ok()).unwrap_or(0);
    Some(VideoProbe {
        width,
        height,
        fps,
        total_frames,
    })
}

/// Frame rates come back as fractions like `30000/1001`.
fn parse_fps(raw: &str) -> f64 {
    if let Some((num, den)) = raw.split_once('/') {
        let num: f64 = num.parse().unwrap_or(30.0);
        let den: f64 = den.parse().unwrap_or(1.0);
        if den > 0.0 { num / den } else { 30.0 }
    } else {
        raw.parse().unwrap_or(30.0)
    }
}

/// How many source frames each presented frame consumes when squeezing the
/// whole video into `display_secs` of wall time at `target_fps`.
#[must_use]
pub fn frame_interval(total_frames: u64, target_fps: u32, display_secs: u64) -> u64 {
    let budget = u64::from(target_fps) * display_secs;
    if budget == 0 {
        return 1;
    }
    (total_frames / budget).max(1)
}

/// A running ffmpeg decode pipe.
struct VideoStream {
    child: Child,
    width: u32,
    height: u32,
    buffer: Vec<u8>,
    finished: bool,
}

impl VideoStream {
    fn open(path: &Path, ffmpeg: &str, mute: bool) -> eyre::Result<(Self, VideoProbe)> {
        let info = probe(path, ffmpeg)?;

        let mut command = Command::new(ffmpeg);
        command.arg("-i").arg(path);
        if mute {
            command.arg("-an");
        }
        let child = command
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .wrap_err_with(|| format!("spawning ffmpeg for {}", path.display()))?;

        let stream = Self {
            child,
            width: info.width,
            height: info.height,
            buffer: vec![0u8; info.width as usize * info.height as usize * 3],
            finished: false,
        };
        Ok((stream, info))
    }

    /// Read the next frame, or `None` once the stream is drained.
    fn next_frame(&mut self) -> eyre::Result<Option<RgbImage>> {
        if self.finished {
            return Ok(None);
        }
        let stdout = self
            .child
            .stdout
            .as_mut()
            .ok_or_eyre("ffmpeg stdout was not piped")?;

        match stdout.read_exact(&mut self.buffer) {
            Ok(()) => Ok(RgbImage::from_raw(self.width, self.height, self.buffer.clone())),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.finished = true;
                Ok(None)
            }
            Err(e) => Err(e).wrap_err("reading frame from ffmpeg"),
        }
    }

    /// Skip `count` frames without materializing them.
    fn skip_frames(&mut self, count: u64) -> eyre::Result<()> {
        if self.finished {
            return Ok(());
        }
        let stdout = self
            .child
            .stdout
            .as_mut()
            .ok_or_eyre("ffmpeg stdout was not piped")?;
        for _ in 0..count {
            match stdout.read_exact(&mut self.buffer) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    self.finished = true;
                    return Ok(());
                }
                Err(e) => return Err(e).wrap_err("skipping frame from ffmpeg"),
            }
        }
        Ok(())
    }
}

impl Drop for VideoStream {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Playback of one video item across one slide slot.
///
/// `frame_at` maps elapsed wall time to a presented frame index at the
/// configured target rate and decodes just far enough to serve it. Past the
/// end of the stream the last decoded frame stays up.
pub struct VideoSession {
    stream: VideoStream,
    interval: u64,
    target_fps: u32,
    emitted: u64,
    current: Option<RgbImage>,
}

impl VideoSession {
    pub fn open(
        path: &Path,
        config: &VideoConfig,
        ffmpeg: &str,
        display_secs: u64,
    ) -> eyre::Result<Self> {
        let (stream, info) = VideoStream::open(path, ffmpeg, config.mute_audio)?;
        let interval = frame_interval(info.total_frames, config.target_fps, display_secs);
        tracing::debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = info.fps,
            total_frames = info.total_frames,
            interval,
            "opened video session"
        );
        Ok(Self {
            stream,
            interval,
            target_fps: config.target_fps,
            emitted: 0,
            current: None,
        })
    }

    /// The frame that should be on screen after `elapsed` in the video
    /// phase. Returns `None` only before the first frame decodes.
    pub fn frame_at(&mut self, elapsed: Duration) -> eyre::Result<Option<&RgbImage>> {
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let due = (elapsed.as_secs_f64() * f64::from(self.target_fps)) as u64;

        while self.emitted <= due {
            if self.emitted > 0 {
                self.stream.skip_frames(self.interval - 1)?;
            }
            match self.stream.next_frame()? {
                Some(frame) => self.current = Some(frame),
                None => break,
            }
            self.emitted += 1;
        }
        Ok(self.current.as_ref())
    }
}

/// Decode the first frame of a video, used as a still when video playback
/// is disabled.
pub fn poster(path: &Path, ffmpeg: &str) -> eyre::Result<RgbImage> {
    let output = Command::new(ffmpeg)
        .arg("-i")
        .arg(path)
        .args(["-frames:v", "1", "-f", "image2", "-vcodec", "png", "pipe:1"])
        .stderr(Stdio::null())
        .output()
        .wrap_err_with(|| format!("extracting poster frame from {}", path.display()))?;

    let image = image::load_from_memory(&output.stdout)
        .wrap_err_with(|| format!("decoding poster frame from {}", path.display()))?;
    Ok(image.into_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_squeezes_long_videos() {
        // A 60 second clip at 30 fps shown for 10 seconds at 30 fps keeps
        // every sixth frame.
        assert_eq!(frame_interval(1800, 30, 10), 6);
    }

    #[test]
    fn interval_never_drops_below_one() {
        assert_eq!(frame_interval(90, 30, 10), 1);
        assert_eq!(frame_interval(0, 30, 10), 1);
        assert_eq!(frame_interval(1800, 0, 10), 1);
    }

    #[test]
    fn probe_line_parses_csv_fields() {
        let info = parse_probe_line("1920,1080,30000/1001,900").unwrap();
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert!((info.fps - 29.97).abs() < 0.01);
        assert_eq!(info.total_frames, 900);
    }

    #[test]
    fn probe_line_tolerates_missing_frame_count() {
        let info = parse_probe_line("640,480,25/1").unwrap();
        assert_eq!(info.total_frames, 0);
        assert!(parse_probe_line("garbage").is_none());
    }

    #[test]
    fn fps_fractions_and_plain_numbers_parse() {
        assert!((parse_fps("30/1") - 30.0).abs() < f64::EPSILON);
        assert!((parse_fps("24") - 24.0).abs() < f64::EPSILON);
        assert!((parse_fps("bad") - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn configured_ffmpeg_path_must_exist() {
        assert!(find_ffmpeg(Some("/nonexistent/ffmpeg")).is_err());
    }
}
