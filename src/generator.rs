use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, info_span, warn};

use crate::encoding::{EncodeConfig, FfmpegMode, FfmpegPipe, FrameSink, VideoCodec};
use crate::error::{ScrollError, ScrollResult};
use crate::frames::{Frame, FrameRenderer};
use crate::naming::{random_suffix, video_file_name, SlugStem, StemGenerator};
use crate::params::{GenerationRequest, RenderParameters};
use crate::text::{FontConfig, TextRasterizer};

const MAX_RESERVE_ATTEMPTS: usize = 16;
const PARTIAL_SUFFIX: &str = "partial";

/// Everything the renderer needs for one request, prepared before any file
/// is touched.
pub struct PreparedRender {
    pub params: RenderParameters,
    pub renderer: FrameRenderer,
}

impl PreparedRender {
    pub fn new(request: &GenerationRequest, font: FontConfig) -> ScrollResult<Self> {
        let mut rasterizer = TextRasterizer::new(font)?;
        rasterizer.ensure_supported(&request.text)?;
        let params = RenderParameters::derive(request, &rasterizer);
        let strip = rasterizer.rasterize_line(&request.text);
        let renderer =
            FrameRenderer::new(&params, strip, request.text_color, request.background_color)?;
        Ok(Self { params, renderer })
    }

    pub fn frame_at(&self, index: u64) -> Option<Frame> {
        let text_x = self.params.positions().nth(usize::try_from(index).ok()?)?;
        Some(self.renderer.render_at(index, text_x))
    }

    /// Pushes every frame into `sink` in order. Cancellation is observed only
    /// between frames.
    pub fn render_into<S: FrameSink>(
        &self,
        sink: &mut S,
        cancel: Option<&AtomicBool>,
    ) -> ScrollResult<u64> {
        let progress_every = (self.params.frame_count / 10).max(1);
        let mut written = 0_u64;
        for frame in self.renderer.frames(&self.params) {
            if is_cancelled(cancel) {
                return Err(ScrollError::Cancelled {
                    frames_written: written,
                });
            }
            sink.write_frame(frame)?;
            written += 1;
            if written % progress_every == 0 {
                debug!(frame = written, total = self.params.frame_count, "rendered frame");
            }
        }
        Ok(written)
    }
}

/// A claimed output name. The partial file exists from reservation until
/// `commit` renames it; dropping without commit removes it.
#[derive(Debug)]
pub struct ReservedOutput {
    final_path: PathBuf,
    partial_path: PathBuf,
    committed: bool,
}

impl ReservedOutput {
    pub fn reserve(dir: &Path, stem: &str) -> ScrollResult<Self> {
        fs::create_dir_all(dir).map_err(|error| {
            ScrollError::encoding(format!(
                "failed to create output directory '{}': {error}",
                dir.display()
            ))
        })?;

        for _ in 0..MAX_RESERVE_ATTEMPTS {
            let file_name = video_file_name(stem, &random_suffix());
            let final_path = dir.join(&file_name);
            if final_path.exists() {
                continue;
            }
            let partial_path = dir.join(format!(".{file_name}.{PARTIAL_SUFFIX}"));
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&partial_path)
            {
                Ok(_) => {
                    return Ok(Self {
                        final_path,
                        partial_path,
                        committed: false,
                    })
                }
                Err(error) if error.kind() == ErrorKind::AlreadyExists => continue,
                Err(error) => {
                    return Err(ScrollError::encoding(format!(
                        "failed to create '{}': {error}",
                        partial_path.display()
                    )))
                }
            }
        }

        Err(ScrollError::collision(format!(
            "no free output name for stem '{stem}' in '{}' after {MAX_RESERVE_ATTEMPTS} attempts",
            dir.display()
        )))
    }

    pub fn partial_path(&self) -> &Path {
        &self.partial_path
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Publishes the finished file under its final name without clobbering.
    pub fn commit(mut self) -> ScrollResult<PathBuf> {
        match fs::hard_link(&self.partial_path, &self.final_path) {
            Ok(()) => {
                if let Err(error) = fs::remove_file(&self.partial_path) {
                    warn!(path = %self.partial_path.display(), %error, "failed to remove partial video after commit");
                }
            }
            Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                return Err(ScrollError::collision(format!(
                    "'{}' appeared while encoding",
                    self.final_path.display()
                )));
            }
            Err(_) => {
                // Filesystems without hard links.
                if self.final_path.exists() {
                    return Err(ScrollError::collision(format!(
                        "'{}' appeared while encoding",
                        self.final_path.display()
                    )));
                }
                fs::rename(&self.partial_path, &self.final_path).map_err(|error| {
                    ScrollError::encoding(format!(
                        "failed to move '{}' into place: {error}",
                        self.partial_path.display()
                    ))
                })?;
            }
        }
        self.committed = true;
        Ok(self.final_path.clone())
    }
}

impl Drop for ReservedOutput {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(error) = fs::remove_file(&self.partial_path) {
            if error.kind() != ErrorKind::NotFound {
                warn!(path = %self.partial_path.display(), %error, "failed to remove partial video");
            }
        }
    }
}

/// Renders and encodes scrolling-text videos into unique files.
pub struct Generator {
    stems: Box<dyn StemGenerator>,
    font: FontConfig,
    codec: VideoCodec,
    mode: FfmpegMode,
}

impl Default for Generator {
    fn default() -> Self {
        Self {
            stems: Box::new(SlugStem),
            font: FontConfig::default(),
            codec: VideoCodec::default(),
            mode: FfmpegMode::default(),
        }
    }
}

impl Generator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stem_generator(mut self, stems: impl StemGenerator + 'static) -> Self {
        self.stems = Box::new(stems);
        self
    }

    pub fn with_codec(mut self, codec: VideoCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_ffmpeg_mode(mut self, mode: FfmpegMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_font(mut self, font: FontConfig) -> Self {
        self.font = font;
        self
    }

    pub fn generate(&self, request: &GenerationRequest, output_dir: &Path) -> ScrollResult<PathBuf> {
        self.generate_with_cancel(request, output_dir, None)
    }

    pub fn generate_with_cancel(
        &self,
        request: &GenerationRequest,
        output_dir: &Path,
        cancel: Option<&AtomicBool>,
    ) -> ScrollResult<PathBuf> {
        request.validate()?;
        let span = info_span!(
            "generate",
            text_chars = request.text.chars().count(),
            frames = request.frame_count(),
            canvas = %request.canvas,
            fps = request.fps,
        );
        let _enter = span.enter();

        let prepared = PreparedRender::new(request, self.font)?;
        if is_cancelled(cancel) {
            return Err(ScrollError::Cancelled { frames_written: 0 });
        }
        let reserved = ReservedOutput::reserve(output_dir, &self.stems.stem(&request.text))?;
        let config = EncodeConfig {
            canvas: request.canvas,
            fps: request.fps,
            codec: self.codec,
            mode: self.mode,
        };
        let mut pipe = FfmpegPipe::spawn(&config, reserved.partial_path())?;
        prepared.render_into(&mut pipe, cancel)?;
        let frames = pipe.frames_sent();
        pipe.finish()?;

        let path = reserved.commit()?;
        info!(path = %path.display(), frames, "video written");
        Ok(path)
    }
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
}

/// Convenience entry point with the default generator.
pub fn generate(request: &GenerationRequest, output_dir: &Path) -> ScrollResult<PathBuf> {
    Generator::default().generate(request, output_dir)
}
