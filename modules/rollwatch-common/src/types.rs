use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel meta-rank for records with no rank data. Sorts after every real rank.
pub const UNRANKED_META_RANK: f64 = 9999.0;

// --- Provenance ---

/// Where a stored record last came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    /// Seen organically in channel traffic.
    Organic,
    /// Imported from a claimed-ranking list page.
    TopClaimed,
    /// Imported from a liked-ranking list page.
    TopLiked,
    /// Written by a live info-update embed.
    InfoUpdate,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Organic => "organic",
            SourceTag::TopClaimed => "top_claimed",
            SourceTag::TopLiked => "top_liked",
            SourceTag::InfoUpdate => "im",
        }
    }

    pub fn parse(s: &str) -> SourceTag {
        match s {
            "top_claimed" => SourceTag::TopClaimed,
            "top_liked" => SourceTag::TopLiked,
            "im" => SourceTag::InfoUpdate,
            _ => SourceTag::Organic,
        }
    }
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// --- Tiers ---

/// Quantile-relative series grade, best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    S,
    A,
    B,
    C,
    D,
}

impl Tier {
    /// Numeric strength for threshold comparisons (S highest).
    pub fn strength(&self) -> u8 {
        match self {
            Tier::S => 5,
            Tier::A => 4,
            Tier::B => 3,
            Tier::C => 2,
            Tier::D => 1,
        }
    }

    pub fn parse(s: &str) -> Option<Tier> {
        match s.trim().to_ascii_uppercase().as_str() {
            "S" => Some(Tier::S),
            "A" => Some(Tier::A),
            "B" => Some(Tier::B),
            "C" => Some(Tier::C),
            "D" => Some(Tier::D),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::S => "S",
            Tier::A => "A",
            Tier::B => "B",
            Tier::C => "C",
            Tier::D => "D",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// --- Records ---

/// A stored character row. `normalized_name` is the stable key; display fields
/// carry the latest observed casing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterRecord {
    pub display_name: String,
    pub normalized_name: String,
    pub display_series: String,
    pub normalized_series: String,
    pub kakera_value: Option<i64>,
    pub claim_rank: Option<i64>,
    pub like_rank: Option<i64>,
    pub times_seen: i64,
    pub source: SourceTag,
    pub last_updated: DateTime<Utc>,
}

/// Output of the embed parser. A rejected embed produces no value at all,
/// never a partially-filled one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCharacter {
    pub name: String,
    pub series: String,
    pub kakera_value: Option<i64>,
    pub claim_rank: Option<i64>,
    pub like_rank: Option<i64>,
}

impl ParsedCharacter {
    /// True when the embed carried at least one value/rank field. Used to
    /// distinguish info-update embeds from plain roll embeds.
    pub fn has_stat_data(&self) -> bool {
        self.kakera_value.is_some() || self.claim_rank.is_some() || self.like_rank.is_some()
    }
}

/// Result of a direct-update merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcome {
    /// No prior row existed.
    New,
    /// A prior row existed and was overwritten.
    Updated,
    /// Input failed normalization; nothing written.
    Skipped,
}

/// One series' aggregate from the last ranking rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesAggregate {
    pub series: String,
    pub avg_meta_rank: f64,
    pub members_in_top: i64,
    pub score: f64,
    /// Score min-max normalized to 0-100 across the rebuild batch.
    pub tier_score: f64,
    pub tier: Tier,
}

// --- Chat platform surface ---

/// One name/value field of a delivered embed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
}

/// An embed as delivered by the chat platform. Every sub-field is optional;
/// presence is checked explicitly, never assumed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatEmbed {
    pub title: Option<String>,
    pub author_line: Option<String>,
    pub description: Option<String>,
    pub footer_text: Option<String>,
    pub accent_color: Option<u32>,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub fields: Vec<EmbedField>,
}

/// A delivered chat message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayMessage {
    pub author_id: i64,
    pub author_name: String,
    pub is_bot: bool,
    pub content: String,
    pub embeds: Vec<ChatEmbed>,
}

/// Combined rank: average when both are known, the known one otherwise,
/// `None` when neither is.
pub fn meta_rank(claim_rank: Option<i64>, like_rank: Option<i64>) -> Option<f64> {
    match (claim_rank, like_rank) {
        (Some(c), Some(l)) => Some((c + l) as f64 / 2.0),
        (Some(c), None) => Some(c as f64),
        (None, Some(l)) => Some(l as f64),
        (None, None) => None,
    }
}
