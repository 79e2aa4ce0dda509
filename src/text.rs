use std::collections::HashMap;

use fontdue::Font;

use crate::error::ScrollResult;
use crate::font_assets::{ensure_supported_codepoints, load_bundled_font};
use crate::params::{TextExtent, TextMeasure};

/// Pixel size of the bundled face at `scale == 1.0`.
pub const BASE_PIXEL_SIZE: f32 = 30.0;

/// Fixed typographic settings shared by measurement and rasterization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontConfig {
    pub scale: f32,
    /// Stroke weight in pixels. `1` is the face's natural weight; each extra
    /// unit widens every stroke by one pixel right and down.
    pub thickness: u32,
}

impl FontConfig {
    pub const fn new(scale: f32, thickness: u32) -> Self {
        Self { scale, thickness }
    }

    pub fn pixel_size(&self) -> f32 {
        BASE_PIXEL_SIZE * self.scale
    }

    fn growth(&self) -> u32 {
        self.thickness.saturating_sub(1)
    }
}

impl Default for FontConfig {
    fn default() -> Self {
        Self::new(1.0, 2)
    }
}

#[derive(Debug, Clone)]
struct GlyphBitmap {
    xmin: i32,
    ymin: i32,
    width: usize,
    height: usize,
    bitmap: Vec<u8>,
}

impl GlyphBitmap {
    fn has_ink(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    fn top(&self) -> i32 {
        self.ymin + self.height as i32
    }
}

/// Anti-aliased coverage for a full line of text, tight to its ink bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextStrip {
    pub width: usize,
    pub height: usize,
    /// Horizontal offset of column 0 from the left edge of the text box.
    /// Never negative: ink left of the pen origin widens the box instead.
    pub left: i32,
    /// Rows of coverage above the baseline.
    pub ascent: i32,
    pub coverage: Vec<u8>,
}

impl TextStrip {
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            left: 0,
            ascent: 0,
            coverage: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn row(&self, y: usize) -> &[u8] {
        &self.coverage[y * self.width..(y + 1) * self.width]
    }
}

struct PenLayout {
    glyphs: Vec<(char, f32)>,
    advance: f32,
}

pub struct TextRasterizer {
    font: Font,
    config: FontConfig,
    glyph_cache: HashMap<char, GlyphBitmap>,
}

impl TextRasterizer {
    pub fn new(config: FontConfig) -> ScrollResult<Self> {
        Ok(Self::with_font(load_bundled_font()?, config))
    }

    pub fn with_font(font: Font, config: FontConfig) -> Self {
        Self {
            font,
            config,
            glyph_cache: HashMap::new(),
        }
    }

    pub fn ensure_supported(&self, text: &str) -> ScrollResult<()> {
        ensure_supported_codepoints(&self.font, text)
    }

    /// Pen-relative `[left, right)` of the unemboldened ink, placed the same
    /// way `rasterize_line` places bitmaps.
    fn ink_span(&self, layout: &PenLayout) -> Option<(i32, i32)> {
        let px = self.config.pixel_size();
        layout
            .glyphs
            .iter()
            .map(|(ch, pen)| (self.font.metrics(*ch, px), *pen))
            .filter(|(metrics, _)| metrics.width > 0 && metrics.height > 0)
            .map(|(metrics, pen)| {
                let x = (pen + metrics.xmin as f32).round() as i32;
                (x, x + metrics.width as i32)
            })
            .reduce(|(lo, hi), (x0, x1)| (lo.min(x0), hi.max(x1)))
    }

    fn pen_layout(&self, text: &str) -> PenLayout {
        let px = self.config.pixel_size();
        let mut glyphs = Vec::with_capacity(text.len());
        let mut pen = 0.0_f32;
        let mut previous = None;
        for ch in text.chars() {
            if let Some(left) = previous {
                pen += self.font.horizontal_kern(left, ch, px).unwrap_or(0.0);
            }
            glyphs.push((ch, pen));
            pen += self.font.metrics(ch, px).advance_width;
            previous = Some(ch);
        }
        PenLayout {
            glyphs,
            advance: pen,
        }
    }

    /// Rasterizes `text` once into a coverage strip. Glyph bitmaps are cached
    /// per character for the lifetime of the rasterizer.
    pub fn rasterize_line(&mut self, text: &str) -> TextStrip {
        let layout = self.pen_layout(text);
        let px = self.config.pixel_size();

        for (ch, _) in &layout.glyphs {
            if !self.glyph_cache.contains_key(ch) {
                let (metrics, bitmap) = self.font.rasterize(*ch, px);
                self.glyph_cache.insert(
                    *ch,
                    GlyphBitmap {
                        xmin: metrics.xmin,
                        ymin: metrics.ymin,
                        width: metrics.width,
                        height: metrics.height,
                        bitmap,
                    },
                );
            }
        }

        let placed = layout
            .glyphs
            .iter()
            .filter_map(|(ch, pen)| {
                let glyph = self.glyph_cache.get(ch)?;
                glyph
                    .has_ink()
                    .then(|| ((pen + glyph.xmin as f32).round() as i32, glyph))
            })
            .collect::<Vec<_>>();

        let Some(min_x) = placed.iter().map(|(x, _)| *x).min() else {
            return TextStrip::empty();
        };
        let max_x = placed
            .iter()
            .map(|(x, glyph)| x + glyph.width as i32)
            .max()
            .unwrap_or(min_x);
        let top = placed.iter().map(|(_, glyph)| glyph.top()).max().unwrap_or(0);
        let bottom = placed
            .iter()
            .map(|(_, glyph)| glyph.ymin)
            .min()
            .unwrap_or(top);

        let width = (max_x - min_x) as usize;
        let height = (top - bottom) as usize;
        let mut coverage = vec![0_u8; width * height];
        for (x, glyph) in &placed {
            let origin_x = (x - min_x) as usize;
            let origin_y = (top - glyph.top()) as usize;
            for row in 0..glyph.height {
                let dst = (origin_y + row) * width + origin_x;
                let src = row * glyph.width;
                for col in 0..glyph.width {
                    let value = glyph.bitmap[src + col];
                    let cell = &mut coverage[dst + col];
                    *cell = (*cell).max(value);
                }
            }
        }

        let (coverage, width, height) = embolden(&coverage, width, height, self.config.thickness);
        TextStrip {
            width,
            height,
            left: min_x.max(0),
            ascent: top,
            coverage,
        }
    }
}

impl TextMeasure for TextRasterizer {
    /// Width covers both the pen advance and every inked column, so a glyph
    /// with a negative bearing (`j`) or an overhang (`ƒ`) stays inside it.
    fn measure(&self, text: &str) -> TextExtent {
        if text.is_empty() {
            return TextExtent::default();
        }
        let layout = self.pen_layout(text);
        let px = self.config.pixel_size();
        let ascent = layout
            .glyphs
            .iter()
            .map(|(ch, _)| self.font.metrics(*ch, px))
            .filter(|metrics| metrics.width > 0 && metrics.height > 0)
            .map(|metrics| metrics.ymin + metrics.height as i32)
            .max()
            .unwrap_or(0)
            .max(0);

        let advance = layout.advance.ceil().max(0.0) as i32;
        let (ink_left, ink_right) = self.ink_span(&layout).unwrap_or((0, advance));
        let width = advance.max(ink_right) - ink_left.min(0);

        TextExtent {
            width: width.max(0) as u32 + self.config.growth(),
            height: ascent as u32,
        }
    }
}

/// Max-filters coverage over a `thickness x thickness` window, growing the
/// mask by `thickness - 1` to the right and downward.
fn embolden(src: &[u8], width: usize, height: usize, thickness: u32) -> (Vec<u8>, usize, usize) {
    let grow = thickness.saturating_sub(1) as usize;
    if grow == 0 || width == 0 || height == 0 {
        return (src.to_vec(), width, height);
    }

    let out_width = width + grow;
    let out_height = height + grow;

    let mut horizontal = vec![0_u8; out_width * height];
    for y in 0..height {
        let row = &src[y * width..(y + 1) * width];
        for x in 0..out_width {
            let lo = x.saturating_sub(grow);
            let hi = x.min(width - 1);
            if lo <= hi {
                horizontal[y * out_width + x] = row[lo..=hi].iter().copied().max().unwrap_or(0);
            }
        }
    }

    let mut out = vec![0_u8; out_width * out_height];
    for y in 0..out_height {
        let lo = y.saturating_sub(grow);
        let hi = y.min(height - 1);
        if lo > hi {
            continue;
        }
        for x in 0..out_width {
            out[y * out_width + x] = (lo..=hi)
                .map(|source_y| horizontal[source_y * out_width + x])
                .max()
                .unwrap_or(0);
        }
    }

    (out, out_width, out_height)
}
