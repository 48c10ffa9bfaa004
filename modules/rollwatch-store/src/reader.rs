use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::debug;

use rollwatch_common::{normalize_name, CharacterRecord, SourceTag, UNRANKED_META_RANK};

use crate::error::Result;
use crate::StoreClient;

#[derive(Debug, Clone, sqlx::FromRow)]
struct CharacterRow {
    name_display: String,
    name_normalized: String,
    series_display: String,
    series_normalized: String,
    kakera_value: Option<i64>,
    claim_rank: Option<i64>,
    like_rank: Option<i64>,
    times_seen: i64,
    data_source: String,
    last_updated: NaiveDateTime,
}

impl From<CharacterRow> for CharacterRecord {
    fn from(row: CharacterRow) -> Self {
        CharacterRecord {
            display_name: row.name_display,
            normalized_name: row.name_normalized,
            display_series: row.series_display,
            normalized_series: row.series_normalized,
            kakera_value: row.kakera_value,
            claim_rank: row.claim_rank,
            like_rank: row.like_rank,
            times_seen: row.times_seen,
            source: SourceTag::parse(&row.data_source),
            last_updated: row.last_updated.and_utc(),
        }
    }
}

/// A record through the meta-rank projection. Unranked rows carry the
/// sentinel and sort last.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CharacterMeta {
    pub name_display: String,
    pub series_display: String,
    pub kakera_value: Option<i64>,
    pub claim_rank: Option<i64>,
    pub like_rank: Option<i64>,
    pub meta_rank: f64,
}

impl CharacterMeta {
    pub fn is_ranked(&self) -> bool {
        self.meta_rank < UNRANKED_META_RANK
    }
}

/// A fully-ranked record for the series rebuild.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RankedCharacter {
    pub name_display: String,
    pub series_display: String,
    pub claim_rank: i64,
    pub like_rank: i64,
}

/// Read-only wrapper for the character store. The live roll path uses only
/// this; rolls never write.
pub struct StoreReader {
    client: StoreClient,
}

impl StoreReader {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    /// Fetch by normalized name, optionally narrowed by a case-insensitive
    /// series match.
    pub async fn get_by_name(
        &self,
        name: &str,
        series: Option<&str>,
    ) -> Result<Option<CharacterRecord>> {
        let name_norm = normalize_name(name);
        if name_norm.is_empty() {
            debug!(name, "Lookup skipped: empty normalized name");
            return Ok(None);
        }

        let row: Option<CharacterRow> = match series {
            Some(series) => {
                sqlx::query_as(
                    r#"
                    SELECT name_display, name_normalized, series_display, series_normalized,
                           kakera_value, claim_rank, like_rank, times_seen, data_source, last_updated
                    FROM characters
                    WHERE name_normalized = ? AND LOWER(series_display) = LOWER(?)
                    LIMIT 1
                    "#,
                )
                .bind(&name_norm)
                .bind(series)
                .fetch_optional(self.client.pool())
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT name_display, name_normalized, series_display, series_normalized,
                           kakera_value, claim_rank, like_rank, times_seen, data_source, last_updated
                    FROM characters
                    WHERE name_normalized = ?
                    LIMIT 1
                    "#,
                )
                .bind(&name_norm)
                .fetch_optional(self.client.pool())
                .await?
            }
        };

        Ok(row.map(CharacterRecord::from))
    }

    /// Fetch by normalized name through the meta-rank projection.
    pub async fn get_meta(&self, name: &str) -> Result<Option<CharacterMeta>> {
        let name_norm = normalize_name(name);
        if name_norm.is_empty() {
            return Ok(None);
        }

        let row = sqlx::query_as::<_, CharacterMeta>(
            r#"
            SELECT name_display, series_display, kakera_value, claim_rank, like_rank, meta_rank
            FROM characters_meta
            WHERE name_normalized = ?
            LIMIT 1
            "#,
        )
        .bind(&name_norm)
        .fetch_optional(self.client.pool())
        .await?;

        Ok(row)
    }

    /// The top fully-ranked records by ascending meta-rank, for the series
    /// rebuild. Requires both rank fields and a non-empty series.
    pub async fn top_ranked(&self, limit: i64) -> Result<Vec<RankedCharacter>> {
        let rows = sqlx::query_as::<_, RankedCharacter>(
            r#"
            SELECT name_display, series_display, claim_rank, like_rank
            FROM characters
            WHERE series_display IS NOT NULL
              AND TRIM(series_display) != ''
              AND claim_rank IS NOT NULL
              AND like_rank IS NOT NULL
            ORDER BY (claim_rank + like_rank) / 2.0 ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self.client.pool())
        .await?;

        Ok(rows)
    }

    /// Globally best characters by meta-rank; falls back to highest kakera
    /// when nothing is ranked yet.
    pub async fn top_characters(&self, limit: i64) -> Result<Vec<CharacterMeta>> {
        let ranked = sqlx::query_as::<_, CharacterMeta>(
            r#"
            SELECT name_display, series_display, kakera_value, claim_rank, like_rank, meta_rank
            FROM characters_meta
            WHERE meta_rank < 9999
            ORDER BY meta_rank ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self.client.pool())
        .await?;

        if !ranked.is_empty() {
            return Ok(ranked);
        }

        let rows = sqlx::query_as::<_, CharacterMeta>(
            r#"
            SELECT name_display, series_display, kakera_value, claim_rank, like_rank, meta_rank
            FROM characters_meta
            WHERE kakera_value IS NOT NULL
            ORDER BY kakera_value DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self.client.pool())
        .await?;

        Ok(rows)
    }
}
