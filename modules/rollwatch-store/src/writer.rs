use tracing::{debug, warn};

use rollwatch_common::{
    normalize_name, normalize_series_loose, MergeOutcome, ParsedCharacter, SourceTag,
};

use crate::error::Result;
use crate::StoreClient;

/// One entry from a ranked-list import.
#[derive(Debug, Clone)]
pub struct ImportObservation {
    pub name: String,
    pub series: String,
    pub kakera_value: Option<i64>,
    pub claim_rank: Option<i64>,
    pub like_rank: Option<i64>,
    pub source: SourceTag,
}

/// Write-side wrapper for the character store. Holds the only two upsert
/// policies; the live decision path never goes through here for rolls.
pub struct StoreWriter {
    client: StoreClient,
}

impl StoreWriter {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    /// Import-merge: keyed on normalized name. Display fields overwrite only
    /// when non-empty, kakera only ever goes up, and a rank slot changes only
    /// when the import actually carries that rank. Safe to replay list pages.
    pub async fn upsert_import(&self, obs: &ImportObservation) -> Result<()> {
        let name_norm = normalize_name(&obs.name);
        if name_norm.is_empty() {
            warn!("Skipping import upsert: empty normalized name");
            return Ok(());
        }
        let series_norm = normalize_series_loose(&obs.series);

        sqlx::query(
            r#"
            INSERT INTO characters (
                name_display, name_normalized, series_display, series_normalized,
                kakera_value, claim_rank, like_rank, times_seen, data_source
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?)
            ON CONFLICT(name_normalized)
            DO UPDATE SET
                name_display = excluded.name_display,
                series_display = COALESCE(NULLIF(excluded.series_display, ''), characters.series_display),
                series_normalized = CASE
                    WHEN excluded.series_display != '' THEN excluded.series_normalized
                    ELSE characters.series_normalized END,
                kakera_value = CASE
                    WHEN excluded.kakera_value IS NOT NULL
                         AND (characters.kakera_value IS NULL OR excluded.kakera_value > characters.kakera_value)
                    THEN excluded.kakera_value
                    ELSE characters.kakera_value END,
                claim_rank = COALESCE(excluded.claim_rank, characters.claim_rank),
                like_rank = COALESCE(excluded.like_rank, characters.like_rank),
                times_seen = characters.times_seen + 1,
                data_source = excluded.data_source,
                last_updated = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&obs.name)
        .bind(&name_norm)
        .bind(&obs.series)
        .bind(&series_norm)
        .bind(obs.kakera_value)
        .bind(obs.claim_rank)
        .bind(obs.like_rank)
        .bind(obs.source.as_str())
        .execute(self.client.pool())
        .await?;

        debug!(name = %obs.name, series = %obs.series, source = %obs.source, "Import upsert");
        Ok(())
    }

    /// Direct-update merge for live info-update embeds: the latest observation
    /// wins on every field. Returns whether a row was created, overwritten, or
    /// the input was unusable.
    pub async fn upsert_direct(&self, parsed: &ParsedCharacter) -> Result<MergeOutcome> {
        let name_norm = normalize_name(&parsed.name);
        if name_norm.is_empty() {
            warn!("Skipping direct upsert: empty normalized name");
            return Ok(MergeOutcome::Skipped);
        }
        let series_norm = normalize_series_loose(&parsed.series);

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM characters WHERE name_normalized = ?")
                .bind(&name_norm)
                .fetch_optional(self.client.pool())
                .await?;

        sqlx::query(
            r#"
            INSERT INTO characters (
                name_display, name_normalized, series_display, series_normalized,
                kakera_value, claim_rank, like_rank, times_seen, data_source
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, 1, 'im')
            ON CONFLICT(name_normalized)
            DO UPDATE SET
                name_display = excluded.name_display,
                series_display = excluded.series_display,
                series_normalized = excluded.series_normalized,
                kakera_value = excluded.kakera_value,
                claim_rank = excluded.claim_rank,
                like_rank = excluded.like_rank,
                times_seen = characters.times_seen + 1,
                data_source = 'im',
                last_updated = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&parsed.name)
        .bind(&name_norm)
        .bind(&parsed.series)
        .bind(&series_norm)
        .bind(parsed.kakera_value)
        .bind(parsed.claim_rank)
        .bind(parsed.like_rank)
        .execute(self.client.pool())
        .await?;

        Ok(if existing.is_some() {
            MergeOutcome::Updated
        } else {
            MergeOutcome::New
        })
    }
}
