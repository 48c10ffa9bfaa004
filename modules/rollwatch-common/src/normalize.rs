use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Punctuation that commonly varies between renditions of the same series
/// title. Folded to a space before whitespace collapse.
static SERIES_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[/\\()\[\]{},;"’‘*+?·••:]"#).unwrap());

/// Trailing grammatical particle "wo" (or its native form を), optionally
/// followed by exclamation marks or spaces. Fixed special case; titles ending
/// in the particle and titles without it must normalize identically.
static TRAILING_PARTICLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\bwo\b|を)[\s!！]*$").unwrap());

static TRAILING_BANG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[!！\?？]+$").unwrap());

/// Conservative normalization for character names. Keeps punctuation, which
/// can be a meaningful part of a name.
pub fn normalize_name(text: &str) -> String {
    let s = text.trim();
    if s.is_empty() {
        return String::new();
    }
    let s: String = s.nfkc().collect::<String>().to_lowercase();
    WHITESPACE_RUN.replace_all(&s, " ").trim().to_string()
}

/// Loose normalization for series titles, used for the stored key. Folds the
/// punctuation and dash variants that differ between list pages and live
/// embeds, and strips the trailing particle so e.g.
/// "Kono Subarashii Sekai ni Shukufuku wo!" and
/// "Kono Subarashii Sekai ni Shukufuku" produce the same key.
/// Empty input maps to the literal key "unknown".
pub fn normalize_series_loose(series: &str) -> String {
    let s = series.trim();
    if s.is_empty() {
        return "unknown".to_string();
    }
    let s: String = s.nfkc().collect::<String>().to_lowercase();
    let s = SERIES_PUNCT.replace_all(&s, " ");
    let s = s.replace('—', "-").replace('–', "-");
    let s = WHITESPACE_RUN.replace_all(&s, " ");
    let s = s.trim();
    let s = TRAILING_PARTICLE.replace(s, "");
    let s = TRAILING_BANG.replace(s.trim(), "");
    s.trim().to_string()
}
