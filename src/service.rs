use std::fs;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::{RequestDefaults, Settings};
use crate::error::{ScrollError, ScrollResult};
use crate::generator::Generator;
use crate::library::{NewVideoRecord, VideoLibrary, VideoRecord};
use crate::params::GenerationRequest;

pub const MISSING_TEXT_MESSAGE: &str = "Missing 'text' parameter";

#[derive(Debug, Clone)]
pub struct CreatedVideo {
    pub record: VideoRecord,
    pub path: PathBuf,
}

/// Validates incoming text, generates the video, and records it.
pub struct ScrollTextService {
    defaults: RequestDefaults,
    generator: Generator,
    library: VideoLibrary,
}

impl ScrollTextService {
    pub fn new(settings: &Settings) -> Self {
        let generator = Generator::new()
            .with_codec(settings.encoder.codec)
            .with_ffmpeg_mode(settings.encoder.ffmpeg);
        Self::from_parts(
            settings.defaults,
            generator,
            VideoLibrary::open(&settings.media_root),
        )
    }

    pub fn from_parts(defaults: RequestDefaults, generator: Generator, library: VideoLibrary) -> Self {
        Self {
            defaults,
            generator,
            library,
        }
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    pub fn library(&self) -> &VideoLibrary {
        &self.library
    }

    /// Builds a request from the configured defaults. Missing or empty text is
    /// rejected before anything is rendered.
    pub fn request_for(&self, text: Option<&str>) -> ScrollResult<GenerationRequest> {
        match text {
            Some(text) if !text.is_empty() => Ok(self.defaults.request_for(text)),
            _ => Err(ScrollError::invalid_input(MISSING_TEXT_MESSAGE)),
        }
    }

    pub fn create(&self, text: Option<&str>) -> ScrollResult<CreatedVideo> {
        let request = self.request_for(text)?;
        self.create_with(&request)
    }

    /// Generates and records one video. If the record cannot be stored the
    /// fresh file is removed so no orphan is left behind.
    pub fn create_with(&self, request: &GenerationRequest) -> ScrollResult<CreatedVideo> {
        request.validate()?;
        let path = self.generator.generate(request, &self.library.videos_dir())?;

        let new = NewVideoRecord {
            text: request.text.clone(),
            video_path: path.clone(),
            frames: request.frame_count(),
            fps: request.fps,
            width: request.canvas.width,
            height: request.canvas.height,
        };
        match self.library.insert(new) {
            Ok(record) => {
                info!(id = record.id, path = %path.display(), "video recorded");
                Ok(CreatedVideo { record, path })
            }
            Err(error) => {
                if let Err(remove_error) = fs::remove_file(&path) {
                    warn!(path = %path.display(), %remove_error, "failed to remove unrecorded video");
                }
                Err(error)
            }
        }
    }
}
