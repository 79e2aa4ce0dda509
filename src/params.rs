use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ScrollError, ScrollResult};

/// Largest accepted canvas edge. Keeps a single RGBA frame well under 256 MiB.
pub const MAX_CANVAS_DIMENSION: u32 = 8192;

/// 8-bit color in RGB channel order.
///
/// The raster surface and the encoder input (`rawvideo rgba`) both expect RGB
/// ordering, so this is the only color layout the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb8 {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RRGGBB` or `RRGGBB`.
    pub fn parse_hex(raw: &str) -> ScrollResult<Self> {
        let trimmed = raw.trim();
        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ScrollError::invalid_input(format!(
                "invalid color '{raw}': expected #RRGGBB"
            )));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .map_err(|error| ScrollError::invalid_input(format!("invalid color '{raw}': {error}")))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }
}

impl fmt::Display for Rgb8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb8 {
    type Err = ScrollError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_hex(s)
    }
}

impl TryFrom<String> for Rgb8 {
    type Error = ScrollError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_hex(&value)
    }
}

impl From<Rgb8> for String {
    fn from(value: Rgb8) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn validate(&self) -> ScrollResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ScrollError::invalid_input(format!(
                "canvas must be positive, got {self}"
            )));
        }
        if self.width > MAX_CANVAS_DIMENSION || self.height > MAX_CANVAS_DIMENSION {
            return Err(ScrollError::invalid_input(format!(
                "canvas {self} exceeds the {MAX_CANVAS_DIMENSION}px limit"
            )));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            // yuv420p output subsamples chroma 2x2.
            return Err(ScrollError::invalid_input(format!(
                "canvas {self} must have even width and height for yuv420p output"
            )));
        }
        Ok(())
    }

    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

impl fmt::Display for Canvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Canvas {
    type Err = ScrollError;

    /// Parses `WIDTHxHEIGHT`, e.g. `1280x720`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, height) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| ScrollError::invalid_input(format!("invalid size '{s}': expected WxH")))?;
        let parse = |raw: &str| {
            raw.trim()
                .parse::<u32>()
                .map_err(|error| ScrollError::invalid_input(format!("invalid size '{s}': {error}")))
        };
        Ok(Self::new(parse(width)?, parse(height)?))
    }
}

/// Everything needed to produce one scrolling-text video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub text: String,
    pub duration_seconds: u32,
    pub canvas: Canvas,
    pub fps: u32,
    pub text_color: Rgb8,
    pub background_color: Rgb8,
}

impl GenerationRequest {
    pub fn validate(&self) -> ScrollResult<()> {
        if self.text.is_empty() {
            return Err(ScrollError::invalid_input("text must not be empty"));
        }
        if self.text.contains(['\n', '\r']) {
            return Err(ScrollError::invalid_input("text must be a single line"));
        }
        if self.duration_seconds == 0 {
            return Err(ScrollError::invalid_input("duration must be > 0 seconds"));
        }
        if self.fps == 0 {
            return Err(ScrollError::invalid_input("fps must be > 0"));
        }
        self.canvas.validate()
    }

    pub fn frame_count(&self) -> u64 {
        u64::from(self.duration_seconds) * u64::from(self.fps)
    }
}

/// Pixel size of a rendered string: full advance width, and ink height above
/// the baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextExtent {
    pub width: u32,
    pub height: u32,
}

pub trait TextMeasure {
    fn measure(&self, text: &str) -> TextExtent;
}

/// Numeric plan for one video, derived once from a request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParameters {
    pub frame_count: u64,
    pub canvas: Canvas,
    pub text_extent: TextExtent,
    pub start_x: f64,
    pub baseline_y: i32,
    pub travel_distance: f64,
    /// Leftward shift per frame. Zero when there are no frames.
    pub velocity: f64,
}

impl RenderParameters {
    pub fn derive(request: &GenerationRequest, measure: &impl TextMeasure) -> Self {
        let text_extent = measure.measure(&request.text);
        let canvas = request.canvas;
        let frame_count = request.frame_count();
        let start_x = f64::from(canvas.width);
        let travel_distance = f64::from(canvas.width) + f64::from(text_extent.width);
        let baseline_y = (canvas.height / 2 + text_extent.height / 2) as i32;

        let velocity = if frame_count == 0 {
            0.0
        } else {
            travel_distance / frame_count as f64
        };

        Self {
            frame_count,
            canvas,
            text_extent,
            start_x,
            baseline_y,
            travel_distance,
            velocity,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }

    /// Left edge once the text has fully left the canvas.
    pub fn end_x(&self) -> f64 {
        self.start_x - self.travel_distance
    }

    pub fn positions(&self) -> TextPositions {
        TextPositions {
            x: self.start_x,
            velocity: self.velocity,
            remaining: self.frame_count,
        }
    }
}

/// Per-frame left edge of the text, stepped from a floating running position
/// and rounded only when yielded.
#[derive(Debug, Clone)]
pub struct TextPositions {
    x: f64,
    velocity: f64,
    remaining: u64,
}

impl TextPositions {
    pub fn running_x(&self) -> f64 {
        self.x
    }
}

impl Iterator for TextPositions {
    type Item = i32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let pixel = self.x.round() as i32;
        self.x -= self.velocity;
        Some(pixel)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}
