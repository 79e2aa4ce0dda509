use fontdue::{Font, FontSettings};
use sha2::{Digest, Sha256};

use crate::error::{ScrollError, ScrollResult};

pub const FONT_ASSET_HASH_MISMATCH: &str = "FONT_ASSET_HASH_MISMATCH";
pub const BUNDLED_FONT_REL_PATH: &str = "assets/fonts/dejavu/DejaVuSerif.ttf";
pub const BUNDLED_FONT_NAME: &str = "DejaVu Serif";
pub const BUNDLED_FONT_SHA256: &str =
    "13e61509f5c81d7c3132810f4f903e3523df89c802bf6e0674621e8f659cdfe1";

static BUNDLED_FONT_BYTES: &[u8] = include_bytes!("../assets/fonts/dejavu/DejaVuSerif.ttf");

pub fn bundled_font_bytes() -> &'static [u8] {
    BUNDLED_FONT_BYTES
}

pub fn verify_font_bytes(bytes: &[u8], expected_hash: &str) -> ScrollResult<()> {
    let actual_hash = sha256_hex(bytes);
    if actual_hash != expected_hash {
        return Err(ScrollError::render_backend(format!(
            "{}: {} expected sha256={} actual sha256={}",
            FONT_ASSET_HASH_MISMATCH, BUNDLED_FONT_NAME, expected_hash, actual_hash
        )));
    }
    Ok(())
}

pub fn load_bundled_font() -> ScrollResult<Font> {
    verify_font_bytes(BUNDLED_FONT_BYTES, BUNDLED_FONT_SHA256)?;
    Font::from_bytes(BUNDLED_FONT_BYTES, FontSettings::default()).map_err(|error| {
        ScrollError::render_backend(format!(
            "failed to parse bundled font {}: {error}",
            BUNDLED_FONT_REL_PATH
        ))
    })
}

/// Fails on the first character the font has no glyph for. Whitespace is
/// exempt since it only advances the pen.
pub fn ensure_supported_codepoints(font: &Font, text: &str) -> ScrollResult<()> {
    for ch in text.chars() {
        if ch.is_whitespace() {
            continue;
        }
        if font.lookup_glyph_index(ch) == 0 {
            return Err(ScrollError::render_backend(format!(
                "unsupported codepoint U+{:04X} ({}) in {}",
                ch as u32,
                ch.escape_default(),
                BUNDLED_FONT_NAME
            )));
        }
    }
    Ok(())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
