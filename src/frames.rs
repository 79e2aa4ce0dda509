use tiny_skia::{Color, Pixmap};

use crate::error::{ScrollError, ScrollResult};
use crate::params::{Canvas, RenderParameters, Rgb8, TextPositions};
use crate::text::TextStrip;

/// One opaque RGBA8 raster of the output sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub text_x: i32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * self.width + x) * 4) as usize;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }
}

/// Composes the text strip over a solid background at a given left edge.
pub struct FrameRenderer {
    canvas: Canvas,
    background: Pixmap,
    strip: TextStrip,
    baseline_y: i32,
    text_color: [u8; 4],
}

impl FrameRenderer {
    pub fn new(
        params: &RenderParameters,
        strip: TextStrip,
        text_color: Rgb8,
        background_color: Rgb8,
    ) -> ScrollResult<Self> {
        let canvas = params.canvas;
        let mut background = Pixmap::new(canvas.width, canvas.height).ok_or_else(|| {
            ScrollError::render_backend(format!("failed to allocate {canvas} raster surface"))
        })?;
        background.fill(Color::from_rgba8(
            background_color.r,
            background_color.g,
            background_color.b,
            255,
        ));

        Ok(Self {
            canvas,
            background,
            strip,
            baseline_y: params.baseline_y,
            text_color: text_color.to_rgba(),
        })
    }

    /// Renders the frame whose text left edge sits at `text_x`. Coverage that
    /// falls outside the canvas is clipped.
    pub fn render_at(&self, index: u64, text_x: i32) -> Frame {
        let mut pixmap = self.background.clone();
        blend_strip(
            pixmap.data_mut(),
            self.canvas.width,
            self.canvas.height,
            text_x + self.strip.left,
            self.baseline_y - self.strip.ascent,
            &self.strip,
            self.text_color,
        );

        Frame {
            index,
            width: self.canvas.width,
            height: self.canvas.height,
            text_x,
            data: pixmap.take(),
        }
    }

    /// Fresh lazy sequence starting from the right edge.
    pub fn frames(&self, params: &RenderParameters) -> FrameSequence<'_> {
        FrameSequence {
            renderer: self,
            positions: params.positions(),
            next_index: 0,
        }
    }
}

pub struct FrameSequence<'a> {
    renderer: &'a FrameRenderer,
    positions: TextPositions,
    next_index: u64,
}

impl Iterator for FrameSequence<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Self::Item> {
        let text_x = self.positions.next()?;
        let index = self.next_index;
        self.next_index += 1;
        Some(self.renderer.render_at(index, text_x))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.positions.size_hint()
    }
}

impl ExactSizeIterator for FrameSequence<'_> {}

fn blend_strip(
    frame: &mut [u8],
    frame_width: u32,
    frame_height: u32,
    x: i32,
    y: i32,
    strip: &TextStrip,
    color: [u8; 4],
) {
    if strip.is_empty() {
        return;
    }

    let first_col = (-x).max(0) as usize;
    let last_col = (i64::from(frame_width) - i64::from(x)).clamp(0, strip.width as i64) as usize;
    if first_col >= last_col {
        return;
    }

    for row in 0..strip.height {
        let py = y + row as i32;
        if py < 0 || py >= frame_height as i32 {
            continue;
        }
        let coverage = strip.row(row);
        for col in first_col..last_col {
            let mask = coverage[col];
            if mask == 0 {
                continue;
            }
            let px = (x + col as i32) as u32;
            let idx = ((py as u32 * frame_width + px) * 4) as usize;
            blend_pixel(frame, idx, [color[0], color[1], color[2], mask]);
        }
    }
}

fn blend_pixel(frame: &mut [u8], idx: usize, src: [u8; 4]) {
    let alpha = u16::from(src[3]);
    let inv_alpha = 255_u16 - alpha;
    for channel in 0..3 {
        let dst = u16::from(frame[idx + channel]);
        let src_c = u16::from(src[channel]);
        frame[idx + channel] = ((src_c * alpha + dst * inv_alpha + 127) / 255) as u8;
    }
    frame[idx + 3] = 255;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::TextExtent;

    fn params(frame_count: u64, width: u32, height: u32) -> RenderParameters {
        let travel = f64::from(width) + 4.0;
        RenderParameters {
            frame_count,
            canvas: Canvas::new(width, height),
            text_extent: TextExtent {
                width: 4,
                height: 2,
            },
            start_x: f64::from(width),
            baseline_y: (height / 2 + 1) as i32,
            travel_distance: travel,
            velocity: if frame_count == 0 {
                0.0
            } else {
                travel / frame_count as f64
            },
        }
    }

    fn block_strip() -> TextStrip {
        TextStrip {
            width: 4,
            height: 2,
            left: 0,
            ascent: 2,
            coverage: vec![255; 8],
        }
    }

    const BG: Rgb8 = Rgb8::new(10, 20, 30);
    const FG: Rgb8 = Rgb8::new(200, 100, 50);

    #[test]
    fn first_frame_is_pure_background() {
        let params = params(4, 8, 6);
        let renderer = FrameRenderer::new(&params, block_strip(), FG, BG).unwrap();
        let frame = renderer.frames(&params).next().unwrap();
        assert_eq!(frame.text_x, 8);
        assert!(frame.data.chunks_exact(4).all(|px| px == [10, 20, 30, 255]));
    }

    #[test]
    fn text_is_drawn_at_rounded_position_and_clipped() {
        let params = params(4, 8, 6);
        let renderer = FrameRenderer::new(&params, block_strip(), FG, BG).unwrap();

        let frame = renderer.render_at(0, 6);
        // rows 2..4 (baseline 4, ascent 2), cols 6..8 visible, 8..10 clipped
        assert_eq!(frame.pixel(6, 2), [200, 100, 50, 255]);
        assert_eq!(frame.pixel(7, 3), [200, 100, 50, 255]);
        assert_eq!(frame.pixel(5, 2), [10, 20, 30, 255]);
        assert_eq!(frame.pixel(6, 4), [10, 20, 30, 255]);

        let left = renderer.render_at(1, -2);
        assert_eq!(left.pixel(0, 2), [200, 100, 50, 255]);
        assert_eq!(left.pixel(1, 3), [200, 100, 50, 255]);
        assert_eq!(left.pixel(2, 2), [10, 20, 30, 255]);
    }

    #[test]
    fn sequence_has_exact_length_and_dimensions() {
        let params = params(7, 8, 6);
        let renderer = FrameRenderer::new(&params, block_strip(), FG, BG).unwrap();
        let frames = renderer.frames(&params).collect::<Vec<_>>();
        assert_eq!(frames.len(), 7);
        for (expected, frame) in frames.iter().enumerate() {
            assert_eq!(frame.index, expected as u64);
            assert_eq!((frame.width, frame.height), (8, 6));
            assert_eq!(frame.data.len(), 8 * 6 * 4);
        }
        assert!(frames.windows(2).all(|pair| pair[1].text_x <= pair[0].text_x));
    }

    #[test]
    fn each_call_restarts_from_the_right_edge() {
        let params = params(3, 8, 6);
        let renderer = FrameRenderer::new(&params, block_strip(), FG, BG).unwrap();
        let first = renderer.frames(&params).collect::<Vec<_>>();
        let second = renderer.frames(&params).collect::<Vec<_>>();
        assert_eq!(first, second);
    }

    #[test]
    fn zero_frames_produce_empty_sequence() {
        let params = params(0, 8, 6);
        let renderer = FrameRenderer::new(&params, block_strip(), FG, BG).unwrap();
        assert_eq!(renderer.frames(&params).count(), 0);
    }

    #[test]
    fn partial_coverage_blends_toward_text_color() {
        let mut frame = vec![0_u8, 0, 0, 255];
        blend_pixel(&mut frame, 0, [255, 255, 255, 128]);
        assert_eq!(frame, vec![128, 128, 128, 255]);
    }
}
