use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

/// Characters of the input text that contribute to a file stem.
pub const STEM_SOURCE_CHARS: usize = 10;
pub const SUFFIX_LEN: usize = 6;
pub const VIDEO_EXTENSION: &str = "mp4";
const FALLBACK_STEM: &str = "video";

/// Maps user text to a filesystem-safe file stem. The renderer never sees
/// this; only the output writer uses it.
pub trait StemGenerator: Send + Sync {
    fn stem(&self, text: &str) -> String;
}

/// Lowercase ASCII slug of the first characters of the text, with Russian
/// Cyrillic transliterated to Latin.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlugStem;

impl StemGenerator for SlugStem {
    fn stem(&self, text: &str) -> String {
        slugify(&text.chars().take(STEM_SOURCE_CHARS).collect::<String>())
    }
}

pub fn slugify(text: &str) -> String {
    static NON_SLUG_RE: OnceLock<Regex> = OnceLock::new();
    let non_slug = NON_SLUG_RE
        .get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("slug regex should compile"));

    let mut latin = String::with_capacity(text.len());
    for ch in text.chars().flat_map(char::to_lowercase) {
        match transliterate_ru(ch) {
            Some(replacement) => latin.push_str(replacement),
            None => latin.push(ch),
        }
    }

    let slug = non_slug.replace_all(&latin, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        FALLBACK_STEM.to_owned()
    } else {
        slug.to_owned()
    }
}

fn transliterate_ru(ch: char) -> Option<&'static str> {
    let latin = match ch {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' | 'ё' | 'э' => "e",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "j",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "sch",
        'ъ' | 'ь' => "",
        'ы' => "y",
        'ю' => "ju",
        'я' => "ja",
        _ => return None,
    };
    Some(latin)
}

/// Short random hex suffix. Collisions are resolved by the output writer's
/// reservation, not by the suffix length.
pub fn random_suffix() -> String {
    let mut hex = Uuid::new_v4().simple().to_string();
    hex.truncate(SUFFIX_LEN);
    hex
}

pub fn video_file_name(stem: &str, suffix: &str) -> String {
    format!("{stem}-{suffix}.{VIDEO_EXTENSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_lowercases_and_collapses_separators() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  a  b  "), "a-b");
        assert_eq!(slugify("HELLO"), "hello");
    }

    #[test]
    fn slug_transliterates_russian() {
        assert_eq!(slugify("тестовый т"), "testovyj-t");
        assert_eq!(slugify("Щука ёж"), "schuka-ezh");
    }

    #[test]
    fn slug_falls_back_when_nothing_survives() {
        assert_eq!(slugify("!!!"), "video");
        assert_eq!(slugify("日本語"), "video");
    }

    #[test]
    fn stem_uses_first_ten_characters() {
        assert_eq!(SlugStem.stem("тестовый текст"), "testovyj-t");
        assert_eq!(SlugStem.stem("abcdefghijklmnop"), "abcdefghij");
    }

    #[test]
    fn suffix_is_short_lowercase_hex() {
        let suffix = random_suffix();
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(video_file_name("hello", "abc123"), "hello-abc123.mp4");
    }
}
