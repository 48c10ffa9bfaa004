//! Manual paged-list scrape session.
//!
//! The flow is human-driven: an owner starts a session, types the list
//! command in the game channel page by page, and the session ingests each
//! list embed the game bot returns. An expected-page gate makes retries safe:
//! an embed for any other page is skipped and the expectation stays armed.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use rollwatch_common::{ChatEmbed, SourceTag};
use rollwatch_store::{ImportObservation, StoreWriter};

/// Which ranked list a session is scraping. Decides the rank slot each entry
/// lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Claimed,
    Liked,
}

impl ListKind {
    fn source_tag(self) -> SourceTag {
        match self {
            ListKind::Claimed => SourceTag::TopClaimed,
            ListKind::Liked => SourceTag::TopLiked,
        }
    }
}

/// One parsed list line, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub rank: i64,
    pub name: String,
    pub series: String,
}

/// "`<page> / <total>`" (or "of") in a list footer.
static PAGE_FOOTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,3})\s*(?:/|of)\s*(\d{1,3})").unwrap());

/// List line variants: "#1 - Name - Series", "1. Name — Series",
/// "1) Name – Series". Dash glyphs vary between pages.
static ENTRY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"^#?\s*(\d{1,4})\s*[-.)]\s*(.*?)\s*[-–—]\s*(.+)$").unwrap(),
        Regex::new(r"^\s*(\d{1,4})\.\s*(.*?)\s*[-–—]\s*(.+)$").unwrap(),
        Regex::new(r"^\s*(\d{1,4})\s*-\s*(.*?)\s*-\s*(.+)$").unwrap(),
    ]
});

static INLINE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<:[^>]+>").unwrap());

const DEFAULT_TOTAL_PAGES: i64 = 100;

/// Paged-scrape session over the game's ranked lists. Single-writer: one
/// session at a time, driven by the message handler.
pub struct TopListScraper {
    writer: StoreWriter,
    active: bool,
    list_kind: ListKind,
    total_pages: i64,
    expected_page: Option<i64>,
    pending: Vec<PendingEntry>,
}

impl TopListScraper {
    pub fn new(writer: StoreWriter) -> Self {
        Self {
            writer,
            active: false,
            list_kind: ListKind::Claimed,
            total_pages: DEFAULT_TOTAL_PAGES,
            expected_page: None,
            pending: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn pending(&self) -> &[PendingEntry] {
        &self.pending
    }

    pub fn expected_page(&self) -> Option<i64> {
        self.expected_page
    }

    /// Begin a session. Refused while one is already running.
    pub fn start(&mut self, kind: ListKind, total_pages: i64) -> bool {
        if self.active {
            warn!("Scrape session already running");
            return false;
        }
        self.active = true;
        self.list_kind = kind;
        self.total_pages = total_pages;
        self.expected_page = None;
        self.pending.clear();
        info!(kind = ?kind, total_pages, "Scrape session started");
        true
    }

    /// Arm the gate for the next manually requested page.
    pub fn set_expected_page(&mut self, page: i64) {
        self.expected_page = Some(page);
    }

    /// Ingest one list embed. Returns false when the embed was skipped by the
    /// page gate. Parsed entries are flushed to the store immediately;
    /// entries whose upsert fails stay buffered for the next flush.
    pub async fn process_list_embed(&mut self, embed: &ChatEmbed) -> bool {
        let mut page = None;
        if let Some(footer) = embed.footer_text.as_deref() {
            if let Some(caps) = PAGE_FOOTER.captures(footer) {
                page = caps[1].parse::<i64>().ok();
                if let Ok(total) = caps[2].parse::<i64>() {
                    self.total_pages = total;
                }
            }
        }

        // Manual flow: when a specific page is expected, anything else is a
        // stale or duplicate embed. Leave the expectation armed for retries.
        if let Some(expected) = self.expected_page {
            if page != Some(expected) {
                debug!(?page, expected, "List embed did not match expected page, skipping");
                return false;
            }
            self.expected_page = None;
        }

        let mut joined = String::new();
        if let Some(title) = embed.title.as_deref() {
            joined.push_str(title);
            joined.push('\n');
        }
        if let Some(desc) = embed.description.as_deref() {
            joined.push_str(desc);
            joined.push('\n');
        }
        for field in &embed.fields {
            joined.push_str(&field.name);
            joined.push('\n');
            joined.push_str(&field.value);
            joined.push('\n');
        }
        let joined = joined.replace('\u{200b}', "").replace('\u{a0}', " ");

        let mut found = 0;
        for line in joined.lines().map(str::trim).filter(|l| !l.is_empty()) {
            // Too short to hold "#n - x - y".
            if line.chars().count() < 6 {
                continue;
            }
            if let Some(entry) = parse_entry_line(line) {
                self.pending.push(entry);
                found += 1;
            }
        }

        info!(
            ?page,
            found,
            buffered = self.pending.len(),
            "Processed list embed"
        );

        if found > 0 {
            let saved = self.flush().await;
            debug!(saved, ?page, "Flushed list entries");
        }

        true
    }

    /// Finish the session: flush what is left and go idle unconditionally.
    pub async fn complete(&mut self) -> usize {
        if !self.active {
            return 0;
        }
        let leftovers = self.flush().await;
        self.active = false;
        self.expected_page = None;
        info!(leftovers, "Scrape session complete");
        leftovers
    }

    /// Upsert every buffered entry. Saved entries leave the buffer as they
    /// go, so a failure mid-flush never replays what was already written.
    async fn flush(&mut self) -> usize {
        let mut saved = 0;
        let entries = std::mem::take(&mut self.pending);
        for entry in entries {
            let (claim_rank, like_rank) = match self.list_kind {
                ListKind::Claimed => (Some(entry.rank), None),
                ListKind::Liked => (None, Some(entry.rank)),
            };
            let obs = ImportObservation {
                name: entry.name.clone(),
                series: entry.series.clone(),
                kakera_value: None,
                claim_rank,
                like_rank,
                source: self.list_kind.source_tag(),
            };
            match self.writer.upsert_import(&obs).await {
                Ok(()) => saved += 1,
                Err(e) => {
                    warn!(name = %entry.name, error = %e, "Failed saving list entry, keeping buffered");
                    self.pending.push(entry);
                }
            }
        }
        saved
    }
}

/// Try each line pattern in order; first match wins.
fn parse_entry_line(line: &str) -> Option<PendingEntry> {
    for pat in ENTRY_PATTERNS.iter() {
        if let Some(caps) = pat.captures(line) {
            let rank = caps[1].parse::<i64>().ok()?;
            let name = INLINE_TAG.replace_all(caps[2].trim(), "").trim().to_string();
            let series = INLINE_TAG.replace_all(caps[3].trim(), "").trim().to_string();
            return Some(PendingEntry { rank, name, series });
        }
    }
    None
}
