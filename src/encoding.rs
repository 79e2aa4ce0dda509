use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};

use crate::error::{ScrollError, ScrollResult};
use crate::frames::Frame;
use crate::params::Canvas;

/// Ordered consumer of rendered frames.
pub trait FrameSink {
    fn write_frame(&mut self, frame: Frame) -> ScrollResult<()>;
}

impl FrameSink for Vec<Frame> {
    fn write_frame(&mut self, frame: Frame) -> ScrollResult<()> {
        self.push(frame);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    /// MPEG-4 Part 2 (`mp4v`), built into every ffmpeg.
    #[default]
    Mpeg4,
    #[serde(alias = "libx264")]
    H264,
}

impl VideoCodec {
    pub fn output_args(self) -> Vec<String> {
        let args: &[&str] = match self {
            Self::Mpeg4 => &["-c:v", "mpeg4", "-q:v", "2"],
            Self::H264 => &["-c:v", "libx264", "-preset", "medium", "-crf", "18"],
        };
        args.iter().map(|arg| (*arg).to_owned()).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FfmpegMode {
    #[default]
    Auto,
    System,
    Sidecar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeConfig {
    pub canvas: Canvas,
    pub fps: u32,
    pub codec: VideoCodec,
    pub mode: FfmpegMode,
}

impl EncodeConfig {
    pub fn validate(&self) -> ScrollResult<()> {
        self.canvas.validate()?;
        if self.fps == 0 {
            return Err(ScrollError::invalid_input("encode fps must be > 0"));
        }
        Ok(())
    }
}

/// Feeds RGBA frames to an ffmpeg child process from a dedicated writer thread.
pub struct FfmpegPipe {
    sender: Option<mpsc::SyncSender<Vec<u8>>>,
    worker: Option<JoinHandle<ScrollResult<()>>>,
    canvas: Canvas,
    frames_sent: u64,
}

trait VideoEncoderBackend: Send {
    fn mode_label(&self) -> &'static str;
    fn run(self: Box<Self>, receiver: mpsc::Receiver<Vec<u8>>) -> ScrollResult<()>;
}

struct SystemFfmpegBackend {
    args: Vec<String>,
}

#[cfg(feature = "sidecar_ffmpeg")]
struct SidecarFfmpegBackend {
    args: Vec<String>,
}

impl FfmpegPipe {
    pub fn spawn(config: &EncodeConfig, output_path: &Path) -> ScrollResult<Self> {
        config.validate()?;
        let args = ffmpeg_args(config, output_path)?;
        let (sender, receiver) = mpsc::sync_channel::<Vec<u8>>(4);
        let backend = select_backend(config.mode, args)?;
        let worker_name = format!("scroll-text-ffmpeg-{}", backend.mode_label());

        let worker = thread::Builder::new()
            .name(worker_name)
            .spawn(move || backend.run(receiver))
            .map_err(|error| {
                ScrollError::encoding(format!("failed to spawn ffmpeg writer thread: {error}"))
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            canvas: config.canvas,
            frames_sent: 0,
        })
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn write_rgba(&mut self, rgba_frame: Vec<u8>) -> ScrollResult<()> {
        if rgba_frame.len() != self.canvas.frame_len() {
            return Err(ScrollError::encoding(format!(
                "frame buffer is {} bytes, expected {} for {}",
                rgba_frame.len(),
                self.canvas.frame_len(),
                self.canvas
            )));
        }
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| ScrollError::encoding("encoder has already been finalized"))?;
        if sender.send(rgba_frame).is_err() {
            // The worker hung up early; its result carries the real cause.
            drop(self.sender.take());
            return Err(match self.join_worker() {
                Err(error) => error,
                Ok(()) => ScrollError::encoding("ffmpeg stopped accepting frames"),
            });
        }
        self.frames_sent += 1;
        Ok(())
    }

    /// Closes stdin and waits for ffmpeg to write the container trailer.
    pub fn finish(mut self) -> ScrollResult<()> {
        drop(self.sender.take());
        self.join_worker()
    }

    fn join_worker(&mut self) -> ScrollResult<()> {
        let handle = self
            .worker
            .take()
            .ok_or_else(|| ScrollError::encoding("ffmpeg worker thread missing"))?;
        match handle.join() {
            Ok(result) => result,
            Err(_) => Err(ScrollError::encoding("ffmpeg worker thread panicked")),
        }
    }
}

impl FrameSink for FfmpegPipe {
    fn write_frame(&mut self, frame: Frame) -> ScrollResult<()> {
        if frame.width != self.canvas.width || frame.height != self.canvas.height {
            return Err(ScrollError::encoding(format!(
                "frame size mismatch: got {}x{}, expected {}",
                frame.width, frame.height, self.canvas
            )));
        }
        self.write_rgba(frame.data)
    }
}

impl Drop for FfmpegPipe {
    fn drop(&mut self) {
        drop(self.sender.take());
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

fn select_backend(mode: FfmpegMode, args: Vec<String>) -> ScrollResult<Box<dyn VideoEncoderBackend>> {
    match mode {
        FfmpegMode::Auto | FfmpegMode::System => Ok(Box::new(SystemFfmpegBackend { args })),
        FfmpegMode::Sidecar => {
            #[cfg(feature = "sidecar_ffmpeg")]
            {
                Ok(Box::new(SidecarFfmpegBackend { args }))
            }
            #[cfg(not(feature = "sidecar_ffmpeg"))]
            {
                let _ = args;
                Err(ScrollError::encoding(
                    "ffmpeg sidecar mode requested but scroll-text was built without `sidecar_ffmpeg`. Rebuild with `--features sidecar_ffmpeg`.",
                ))
            }
        }
    }
}

impl VideoEncoderBackend for SystemFfmpegBackend {
    fn mode_label(&self) -> &'static str {
        "system"
    }

    fn run(self: Box<Self>, receiver: mpsc::Receiver<Vec<u8>>) -> ScrollResult<()> {
        run_ffmpeg_process(Path::new("ffmpeg"), receiver, &self.args, self.mode_label())
    }
}

#[cfg(feature = "sidecar_ffmpeg")]
impl VideoEncoderBackend for SidecarFfmpegBackend {
    fn mode_label(&self) -> &'static str {
        "sidecar"
    }

    fn run(self: Box<Self>, receiver: mpsc::Receiver<Vec<u8>>) -> ScrollResult<()> {
        let path = ffmpeg_sidecar::paths::ffmpeg_path();
        if !path.exists() {
            ffmpeg_sidecar::download::auto_download().map_err(|error| {
                ScrollError::encoding(format!(
                    "failed to auto-download ffmpeg sidecar binary: {error}"
                ))
            })?;
        }
        run_ffmpeg_process(&path, receiver, &self.args, self.mode_label())
    }
}

fn run_ffmpeg_process(
    ffmpeg_path: &Path,
    receiver: mpsc::Receiver<Vec<u8>>,
    args: &[String],
    mode_label: &str,
) -> ScrollResult<()> {
    let mut child = Command::new(ffmpeg_path)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|error| {
            if error.kind() == ErrorKind::NotFound {
                ScrollError::encoding(format!(
                    "ffmpeg executable not found (mode={mode_label}, resolved_path={}). Install ffmpeg or build with `--features sidecar_ffmpeg`.",
                    ffmpeg_path.display()
                ))
            } else {
                ScrollError::encoding(format!(
                    "failed to spawn ffmpeg process (mode={mode_label}, resolved_path={}): {error}",
                    ffmpeg_path.display()
                ))
            }
        })?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| ScrollError::encoding("failed to capture ffmpeg stdin"))?;
    let mut stderr_pipe = child.stderr.take();

    // stderr is drained after exit; `-loglevel error` keeps it well under the
    // pipe buffer.
    let mut write_error = None;
    while let Ok(frame) = receiver.recv() {
        if let Err(error) = stdin.write_all(&frame) {
            write_error = Some(error);
            break;
        }
    }
    if write_error.is_none() {
        if let Err(error) = stdin.flush() {
            write_error = Some(error);
        }
    }
    drop(stdin);
    drop(receiver);

    let status = child
        .wait()
        .map_err(|error| ScrollError::encoding(format!("failed waiting for ffmpeg process: {error}")))?;
    let stderr_tail = read_stderr_tail(&mut stderr_pipe)?;

    if !status.success() {
        return Err(ScrollError::encoding(format!(
            "ffmpeg failed with status {status} (mode={mode_label}, args='{}', stderr_tail='{}')",
            args.join(" "),
            stderr_tail
        )));
    }
    if let Some(error) = write_error {
        return Err(ScrollError::encoding(format!(
            "failed to write frame to ffmpeg stdin: {error} (stderr_tail='{stderr_tail}')"
        )));
    }

    Ok(())
}

pub fn ffmpeg_args(config: &EncodeConfig, output_path: &Path) -> ScrollResult<Vec<String>> {
    let path_str = output_path.to_string_lossy();
    if path_str.len() > 1024 {
        return Err(ScrollError::encoding("output path is suspiciously long"));
    }
    if path_str.chars().any(|c| c.is_control()) {
        return Err(ScrollError::encoding(
            "output path contains invalid control characters",
        ));
    }

    let mut args = ffmpeg_rawvideo_input_args(&config.canvas.to_string(), &config.fps.to_string());
    args.extend(config.codec.output_args());
    args.extend(ffmpeg_container_output_args());
    args.push(path_str.into_owned());
    Ok(args)
}

pub fn ffmpeg_rawvideo_input_args(size: &str, fps: &str) -> Vec<String> {
    vec![
        "-hide_banner".to_owned(),
        "-loglevel".to_owned(),
        "error".to_owned(),
        "-y".to_owned(),
        "-f".to_owned(),
        "rawvideo".to_owned(),
        "-pix_fmt".to_owned(),
        "rgba".to_owned(),
        "-s:v".to_owned(),
        size.to_owned(),
        "-r".to_owned(),
        fps.to_owned(),
        "-i".to_owned(),
        "-".to_owned(),
        "-an".to_owned(),
    ]
}

/// The output is written to a `.partial` name, so the muxer is named
/// explicitly instead of inferred from the extension.
pub fn ffmpeg_container_output_args() -> Vec<String> {
    vec![
        "-pix_fmt".to_owned(),
        "yuv420p".to_owned(),
        "-movflags".to_owned(),
        "+faststart".to_owned(),
        "-f".to_owned(),
        "mp4".to_owned(),
    ]
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Counts video frames in a finished file with ffprobe, when it is installed.
pub fn probe_frame_count(path: &Path) -> Option<u64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-count_frames",
            "-show_entries",
            "stream=nb_read_frames",
            "-of",
            "default=nokey=1:noprint_wrappers=1",
        ])
        .arg(path)
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout).trim().parse().ok()
}

fn read_stderr_tail(stderr: &mut Option<std::process::ChildStderr>) -> ScrollResult<String> {
    let Some(mut pipe) = stderr.take() else {
        return Ok(String::new());
    };
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf)
        .map_err(|error| ScrollError::encoding(format!("failed reading ffmpeg stderr: {error}")))?;
    let text = String::from_utf8_lossy(&buf).to_string();
    Ok(last_n_chars(&text, 500))
}

fn last_n_chars(s: &str, max_chars: usize) -> String {
    let count = s.chars().count();
    s.chars()
        .skip(count.saturating_sub(max_chars))
        .collect::<String>()
        .trim()
        .to_owned()
}
