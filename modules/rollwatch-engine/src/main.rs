use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rollwatch_common::Config;
use rollwatch_engine::SeriesScorer;
use rollwatch_store::{SeriesRankStore, StoreClient, StoreReader};

/// Maintenance entry point: rebuild the series ranking from the stored
/// character history and log the resulting snapshot.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("rollwatch=info".parse()?))
        .init();

    info!("rollwatch maintenance starting");

    let config = Config::from_env()?;
    config.log_summary();

    let client = StoreClient::connect(&config.database_url).await?;
    client.migrate().await?;

    let scorer = SeriesScorer::new(
        StoreReader::new(client.clone()),
        SeriesRankStore::new(client.clone()),
        config.rank_top_limit,
    );
    let aggregates = scorer.rebuild().await?;
    if aggregates.is_empty() {
        info!("Nothing to rank yet; import a ranked list first");
        return Ok(());
    }

    let ranks = SeriesRankStore::new(client.clone());
    for agg in ranks.top_series(config.top_series_limit).await? {
        info!(
            series = %agg.series,
            tier = %agg.tier,
            score = agg.tier_score,
            members = agg.members_in_top,
            avg_meta_rank = agg.avg_meta_rank,
            "Top series"
        );
    }

    let reader = StoreReader::new(client);
    for rec in reader.top_characters(config.top_series_limit).await? {
        info!(
            name = %rec.name_display,
            series = %rec.series_display,
            meta_rank = rec.meta_rank,
            kakera = rec.kakera_value,
            "Top character"
        );
    }

    Ok(())
}
