use std::fs;
use std::path::Path;

use scroll_text::font_assets::{
    bundled_font_bytes, load_bundled_font, sha256_hex, BUNDLED_FONT_REL_PATH, BUNDLED_FONT_SHA256,
};

#[test]
fn bundled_font_on_disk_matches_pinned_hash() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(BUNDLED_FONT_REL_PATH);
    let bytes = fs::read(&path).expect("read bundled font");
    assert_eq!(sha256_hex(&bytes), BUNDLED_FONT_SHA256);
    assert_eq!(bytes.as_slice(), bundled_font_bytes());
}

#[test]
fn bundled_font_license_is_shipped() {
    let font_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(BUNDLED_FONT_REL_PATH);
    let license = font_path
        .parent()
        .expect("font directory")
        .join("LICENSE");
    assert!(license.is_file(), "missing {}", license.display());
}

#[test]
fn bundled_font_covers_latin_and_cyrillic() {
    let font = load_bundled_font().expect("load bundled font");
    for ch in "HELLO world тестовый ТЕКСТ 0123456789".chars() {
        if ch.is_whitespace() {
            continue;
        }
        assert_ne!(font.lookup_glyph_index(ch), 0, "no glyph for {ch:?}");
    }
}
