use tracing::info;

use rollwatch_common::{SeriesAggregate, Tier};

use crate::error::Result;
use crate::StoreClient;

#[derive(Debug, Clone, sqlx::FromRow)]
struct SeriesRankRow {
    series: String,
    avg_meta_rank: f64,
    characters_in_top: i64,
    series_score: f64,
    tier_score: f64,
    tier: String,
}

impl From<SeriesRankRow> for SeriesAggregate {
    fn from(row: SeriesRankRow) -> Self {
        SeriesAggregate {
            series: row.series,
            avg_meta_rank: row.avg_meta_rank,
            members_in_top: row.characters_in_top,
            score: row.series_score,
            tier_score: row.tier_score,
            tier: Tier::parse(&row.tier).unwrap_or(Tier::D),
        }
    }
}

/// Persistence for the series ranking snapshot. The table is rewritten
/// wholesale on each rebuild and read-only in between; queries against an
/// empty table report "nothing known" rather than triggering a rebuild.
pub struct SeriesRankStore {
    client: StoreClient,
}

impl SeriesRankStore {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    /// Replace the whole snapshot with a freshly-scored batch.
    pub async fn replace_ranking(&self, ranking: &[SeriesAggregate]) -> Result<()> {
        let mut tx = self.client.pool().begin().await?;

        sqlx::query("DELETE FROM series_rank").execute(&mut *tx).await?;
        for agg in ranking {
            sqlx::query(
                r#"
                INSERT INTO series_rank
                    (series, avg_meta_rank, characters_in_top, series_score, tier_score, tier)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&agg.series)
            .bind(agg.avg_meta_rank)
            .bind(agg.members_in_top)
            .bind(agg.score)
            .bind(agg.tier_score)
            .bind(agg.tier.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(entries = ranking.len(), "Series ranking replaced");
        Ok(())
    }

    /// Case-insensitive exact-match lookup against the last snapshot.
    pub async fn series_info(&self, series: &str) -> Result<Option<SeriesAggregate>> {
        let row = sqlx::query_as::<_, SeriesRankRow>(
            r#"
            SELECT series, avg_meta_rank, characters_in_top, series_score, tier_score, tier
            FROM series_rank
            WHERE LOWER(series) = LOWER(?)
            LIMIT 1
            "#,
        )
        .bind(series.trim())
        .fetch_optional(self.client.pool())
        .await?;

        Ok(row.map(SeriesAggregate::from))
    }

    /// Best series by score from the last snapshot.
    pub async fn top_series(&self, limit: i64) -> Result<Vec<SeriesAggregate>> {
        let rows = sqlx::query_as::<_, SeriesRankRow>(
            r#"
            SELECT series, avg_meta_rank, characters_in_top, series_score, tier_score, tier
            FROM series_rank
            ORDER BY series_score DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self.client.pool())
        .await?;

        Ok(rows.into_iter().map(SeriesAggregate::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agg(series: &str, score: f64, tier: Tier) -> SeriesAggregate {
        SeriesAggregate {
            series: series.to_string(),
            avg_meta_rank: 100.0,
            members_in_top: 5,
            score,
            tier_score: score,
            tier,
        }
    }

    async fn store() -> SeriesRankStore {
        let client = StoreClient::connect_in_memory().await.unwrap();
        client.migrate().await.unwrap();
        SeriesRankStore::new(client)
    }

    #[tokio::test]
    async fn empty_snapshot_reports_nothing() {
        let store = store().await;
        assert!(store.series_info("hololive").await.unwrap().is_none());
        assert!(store.top_series(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive() {
        let store = store().await;
        store
            .replace_ranking(&[agg("Hololive", 80.0, Tier::S)])
            .await
            .unwrap();

        let hit = store.series_info("  hololive ").await.unwrap().unwrap();
        assert_eq!(hit.tier, Tier::S);
    }

    #[tokio::test]
    async fn replace_discards_previous_snapshot() {
        let store = store().await;
        store
            .replace_ranking(&[agg("Old Series", 10.0, Tier::D)])
            .await
            .unwrap();
        store
            .replace_ranking(&[agg("New Series", 90.0, Tier::S), agg("Mid", 50.0, Tier::B)])
            .await
            .unwrap();

        assert!(store.series_info("Old Series").await.unwrap().is_none());
        let top = store.top_series(10).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].series, "New Series");
    }
}
