use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::encoding::{FfmpegMode, VideoCodec};
use crate::error::{ScrollError, ScrollResult};
use crate::params::{Canvas, GenerationRequest, Rgb8};

pub const MEDIA_ROOT_ENV: &str = "SCROLL_TEXT_MEDIA_ROOT";
pub const BIND_ENV: &str = "SCROLL_TEXT_BIND";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,
    #[serde(default)]
    pub defaults: RequestDefaults,
    #[serde(default)]
    pub encoder: EncoderSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            media_root: default_media_root(),
            defaults: RequestDefaults::default(),
            encoder: EncoderSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

/// Parameters applied to every request that only supplies text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequestDefaults {
    pub duration_seconds: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub text_color: Rgb8,
    pub background_color: Rgb8,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            duration_seconds: 3,
            width: 100,
            height: 100,
            fps: 24,
            text_color: Rgb8::BLACK,
            background_color: Rgb8::new(195, 255, 170),
        }
    }
}

impl RequestDefaults {
    pub fn canvas(&self) -> Canvas {
        Canvas::new(self.width, self.height)
    }

    pub fn request_for(&self, text: impl Into<String>) -> GenerationRequest {
        GenerationRequest {
            text: text.into(),
            duration_seconds: self.duration_seconds,
            canvas: self.canvas(),
            fps: self.fps,
            text_color: self.text_color,
            background_color: self.background_color,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncoderSettings {
    #[serde(default)]
    pub codec: VideoCodec,
    #[serde(default)]
    pub ffmpeg: FfmpegMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_media_root() -> PathBuf {
    PathBuf::from("media")
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_owned()
}

impl Settings {
    /// Built-in defaults, then the YAML file if given, then environment.
    pub fn load(path: Option<&Path>) -> ScrollResult<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> ScrollResult<Self> {
        let contents = fs::read_to_string(path).map_err(|error| {
            ScrollError::invalid_input(format!("failed to read config {}: {error}", path.display()))
        })?;
        Self::from_yaml(&contents).map_err(|error| {
            ScrollError::invalid_input(format!("{} ({})", error, path.display()))
        })
    }

    pub fn from_yaml(contents: &str) -> Result<Self, String> {
        serde_yaml::from_str(contents).map_err(|error| {
            let location = error
                .location()
                .map(|location| format!("line {}, column {}", location.line(), location.column()))
                .unwrap_or_else(|| "unknown location".to_owned());
            format!("failed to parse config yaml at {location}: {error}")
        })
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(root) = lookup(MEDIA_ROOT_ENV).filter(|value| !value.trim().is_empty()) {
            self.media_root = PathBuf::from(root);
        }
        if let Some(bind) = lookup(BIND_ENV).filter(|value| !value.trim().is_empty()) {
            self.server.bind = bind;
        }
    }

    /// Checks the defaults as if they were a request with placeholder text.
    pub fn validate(&self) -> ScrollResult<()> {
        self.defaults
            .request_for("x")
            .validate()
            .map_err(|error| match error {
                ScrollError::InvalidInput(message) => {
                    ScrollError::invalid_input(format!("config defaults: {message}"))
                }
                other => other,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_view() {
        let settings = Settings::default();
        assert_eq!(settings.media_root, PathBuf::from("media"));
        let request = settings.defaults.request_for("hi");
        assert_eq!(request.duration_seconds, 3);
        assert_eq!(request.canvas, Canvas::new(100, 100));
        assert_eq!(request.fps, 24);
        assert_eq!(request.text_color, Rgb8::BLACK);
        assert_eq!(request.background_color.to_string(), "#C3FFAA");
        assert_eq!(request.frame_count(), 72);
    }

    #[test]
    fn yaml_overrides_and_fills_missing_sections() {
        let settings = Settings::from_yaml(
            r##"
media_root: /tmp/scroll
defaults:
  duration_seconds: 2
  width: 320
  height: 180
  fps: 30
  text_color: "#FFFFFF"
  background_color: "000000"
encoder:
  codec: h264
"##,
        )
        .unwrap();
        assert_eq!(settings.media_root, PathBuf::from("/tmp/scroll"));
        assert_eq!(settings.defaults.canvas(), Canvas::new(320, 180));
        assert_eq!(settings.defaults.text_color, Rgb8::WHITE);
        assert_eq!(settings.encoder.codec, VideoCodec::H264);
        assert_eq!(settings.encoder.ffmpeg, FfmpegMode::Auto);
        assert_eq!(settings.server.bind, "127.0.0.1:8000");
    }

    #[test]
    fn unknown_keys_and_bad_colors_are_rejected() {
        let error = Settings::from_yaml("media_rot: x\n").unwrap_err();
        assert!(error.contains("line 1"));

        assert!(Settings::from_yaml(
            "defaults: { duration_seconds: 1, width: 2, height: 2, fps: 1, text_color: red, background_color: '#000000' }\n"
        )
        .is_err());
    }

    #[test]
    fn partial_defaults_keep_remaining_values() {
        let settings = Settings::from_yaml("defaults:\n  fps: 12\n").unwrap();
        assert_eq!(settings.defaults.fps, 12);
        assert_eq!(settings.defaults.duration_seconds, 3);
        assert_eq!(settings.defaults.canvas(), Canvas::new(100, 100));
    }

    #[test]
    fn env_overrides_apply() {
        let mut settings = Settings::default();
        settings.apply_env(|key| match key {
            MEDIA_ROOT_ENV => Some("/srv/media".to_owned()),
            BIND_ENV => Some("0.0.0.0:9000".to_owned()),
            _ => None,
        });
        assert_eq!(settings.media_root, PathBuf::from("/srv/media"));
        assert_eq!(settings.server.bind, "0.0.0.0:9000");
    }

    #[test]
    fn odd_default_canvas_fails_validation() {
        let mut settings = Settings::default();
        settings.defaults.width = 99;
        assert!(matches!(
            settings.validate(),
            Err(ScrollError::InvalidInput(_))
        ));
    }
}
