//! Heuristic extraction of a single character record from a game embed.
//!
//! Best-effort by design: the source format drifts, so extraction is an
//! ordered ladder of patterns with a positional fallback, and anything that
//! fails to convert degrades to a missing field rather than an error.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use rollwatch_common::{ChatEmbed, ParsedCharacter};

/// Embeds whose title mentions any of these are list/summary output, not a
/// single character.
const TITLE_NOISE: [&str; 6] = ["top", "roulette", "daily", "ranking", "claim rank", "like rank"];
const AUTHOR_NOISE: [&str; 4] = ["top", "roulette", "daily", "ranking"];

/// Keywords disqualifying a description line as a series title.
const SERIES_LINE_NOISE: [&str; 5] = ["roulette", "claim", "rank", "like", "kakera"];

/// Inline emoji tags plus the decorative currency/gender glyphs.
static EMOJI_AND_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<:[^>]+>|[💎♦♂♀]").unwrap());

/// A platform entity id: a bare 17-20 digit run.
static ENTITY_ID_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{17,20}\b").unwrap());

/// Value extraction ladder, first match wins.
static KAKERA_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)(\d{1,3}(?:,\d{3})*)\s*[💎♦]").unwrap(),
        Regex::new(r"(?i)[💎♦]\s*(\d{1,3}(?:,\d{3})*)").unwrap(),
        Regex::new(r"(?i)(\d{1,3}(?:,\d{3})*)\s*<:kakera:").unwrap(),
        Regex::new(r"(?i)roulette\s*[•-]?\s*(\d{1,3}(?:,\d{3})*)").unwrap(),
    ]
});

static CLAIM_RANK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Claim\s*Rank\s*:\s*#?\s*([\d,]+)").unwrap());
static LIKE_RANK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Like\s*Rank\s*:\s*#?\s*([\d,]+)").unwrap());

static BARE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,3}(?:,\d{3})*|\d{1,4}").unwrap());

/// Strip inline emoji tags and symbol glyphs, preserving punctuation.
fn clean_emoji_and_tags(s: &str) -> String {
    EMOJI_AND_TAGS.replace_all(s, "").trim().to_string()
}

/// "6,000" or "1000" to an integer; anything unconvertible is `None`.
fn parse_int_with_commas(s: &str) -> Option<i64> {
    s.replace(',', "").trim().parse::<i64>().ok()
}

fn has_alpha(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_alphabetic())
}

/// Scan a ±30-character window around the first value glyph for any bare
/// number in the plausible kakera range.
fn kakera_near_glyph(desc: &str) -> Option<i64> {
    let chars: Vec<char> = desc.chars().collect();
    let pos = chars.iter().position(|&c| c == '💎' || c == '♦')?;
    let window: String = chars[pos.saturating_sub(30)..(pos + 30).min(chars.len())]
        .iter()
        .collect();
    for m in BARE_NUMBER.find_iter(&window) {
        if let Some(val) = parse_int_with_commas(m.as_str()) {
            if (10..=50000).contains(&val) {
                return Some(val);
            }
        }
    }
    None
}

/// Extract a character record from one embed. Returns `None` for anything
/// that is recognizably not a single-character embed, including list output
/// and embeds whose extracted name never materializes.
pub fn parse_character_embed(embed: &ChatEmbed) -> Option<ParsedCharacter> {
    let title_text = embed.title.as_deref().unwrap_or("");
    let author_text = embed.author_line.as_deref().unwrap_or("");
    let title_low = title_text.trim().to_lowercase();
    let author_low = author_text.trim().to_lowercase();

    if TITLE_NOISE.iter().any(|k| title_low.contains(k)) {
        debug!(title = title_text, "Rejected non-character embed by title");
        return None;
    }
    if AUTHOR_NOISE.iter().any(|k| author_low.contains(k)) {
        debug!(author = author_text, "Rejected non-character embed by author");
        return None;
    }

    // Name: prefer the author line over the title.
    let name = if !author_text.is_empty() {
        clean_emoji_and_tags(author_text)
    } else {
        clean_emoji_and_tags(title_text)
    };

    let desc = embed.description.as_deref().unwrap_or("");

    // Series candidate: the first non-empty description line, unless it looks
    // like rank noise, an entity id, or just repeats the name.
    let mut series = String::new();
    if let Some(first_line) = desc.lines().map(str::trim).find(|l| !l.is_empty()) {
        let first_line = clean_emoji_and_tags(first_line);
        let line_low = first_line.to_lowercase();
        if first_line.chars().count() > 2
            && !SERIES_LINE_NOISE.iter().any(|k| line_low.contains(k))
            && !ENTITY_ID_RUN.is_match(&first_line)
        {
            if line_low != name.to_lowercase() {
                series = first_line;
            } else {
                debug!("Series line equals character name, treating as self-titled");
            }
        }
    }

    // Value: pattern ladder, then the glyph-window fallback.
    let mut kakera_value = KAKERA_PATTERNS
        .iter()
        .find_map(|pat| pat.captures(desc))
        .and_then(|caps| parse_int_with_commas(&caps[1]));
    if kakera_value.is_none() {
        kakera_value = kakera_near_glyph(desc);
    }

    let claim_rank = CLAIM_RANK
        .captures(desc)
        .and_then(|caps| parse_int_with_commas(&caps[1]));
    let like_rank = LIKE_RANK
        .captures(desc)
        .and_then(|caps| parse_int_with_commas(&caps[1]));

    // Self-titled fallback for characters whose embed has no usable series.
    if series.is_empty() || !has_alpha(&series) {
        series = name.clone();
    }

    if name.is_empty() || series.is_empty() || !has_alpha(&name) {
        debug!(name = %name, series = %series, "Rejected invalid or empty embed");
        return None;
    }

    debug!(
        name = %name,
        series = %series,
        kakera = ?kakera_value,
        claim = ?claim_rank,
        like = ?like_rank,
        "Parsed character embed"
    );

    Some(ParsedCharacter {
        name: name.trim().to_string(),
        series: series.trim().to_string(),
        kakera_value,
        claim_rank,
        like_rank,
    })
}
