//! Series scoring: pure functions over a batch of ranked characters, plus
//! the rebuild wrapper that persists the snapshot.
//!
//! Tiers are quantile-relative to the batch being scored, so a series' tier
//! can move between rebuilds even if its own characters never change. That
//! drift is inherent to the design and left as-is.

use std::collections::BTreeMap;

use tracing::{info, warn};

use rollwatch_common::{SeriesAggregate, Tier};
use rollwatch_store::{RankedCharacter, Result, SeriesRankStore, StoreReader};

/// Weight on inverse average meta-rank: rewards series whose characters sit
/// high in the rankings.
const RANK_WEIGHT: f64 = 5e4;
/// Weight on member count, applied super-linearly: broad representation in
/// the top set counts for more than one standout character.
const COUNT_WEIGHT: f64 = 250.0;

/// Score a batch of fully-ranked characters into per-series aggregates,
/// sorted by score descending. Tier boundaries sit at the 90/75/50/25
/// percentiles of the batch's normalized scores.
pub fn score_batch(records: &[RankedCharacter]) -> Vec<SeriesAggregate> {
    if records.is_empty() {
        return Vec::new();
    }

    // Group by the raw series string, as listed.
    let mut grouped: BTreeMap<&str, (f64, i64)> = BTreeMap::new();
    for rec in records {
        let meta = (rec.claim_rank + rec.like_rank) as f64 / 2.0;
        let entry = grouped.entry(rec.series_display.as_str()).or_insert((0.0, 0));
        entry.0 += meta;
        entry.1 += 1;
    }

    let mut aggregates: Vec<SeriesAggregate> = grouped
        .into_iter()
        .map(|(series, (meta_sum, count))| {
            let avg_meta_rank = meta_sum / count as f64;
            let score =
                (1.0 / avg_meta_rank) * RANK_WEIGHT + (count as f64).powf(1.5) * COUNT_WEIGHT;
            SeriesAggregate {
                series: series.to_string(),
                avg_meta_rank,
                members_in_top: count,
                score,
                tier_score: 0.0,
                tier: Tier::D,
            }
        })
        .collect();

    // Min-max normalize to 0-100 across this batch.
    let min = aggregates.iter().map(|a| a.score).fold(f64::INFINITY, f64::min);
    let max = aggregates.iter().map(|a| a.score).fold(f64::NEG_INFINITY, f64::max);
    for agg in &mut aggregates {
        agg.tier_score = if max > min {
            100.0 * (agg.score - min) / (max - min)
        } else {
            100.0
        };
    }

    let mut sorted_scores: Vec<f64> = aggregates.iter().map(|a| a.tier_score).collect();
    sorted_scores.sort_by(|a, b| a.total_cmp(b));
    let q90 = quantile(&sorted_scores, 0.90);
    let q75 = quantile(&sorted_scores, 0.75);
    let q50 = quantile(&sorted_scores, 0.50);
    let q25 = quantile(&sorted_scores, 0.25);

    for agg in &mut aggregates {
        agg.tier = assign_tier(agg.tier_score, q90, q75, q50, q25);
    }

    aggregates.sort_by(|a, b| b.score.total_cmp(&a.score));
    aggregates
}

/// Linear-interpolated quantile of an ascending-sorted slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

fn assign_tier(score: f64, q90: f64, q75: f64, q50: f64, q25: f64) -> Tier {
    if score >= q90 {
        Tier::S
    } else if score >= q75 {
        Tier::A
    } else if score >= q50 {
        Tier::B
    } else if score >= q25 {
        Tier::C
    } else {
        Tier::D
    }
}

/// Rebuilds the persisted series ranking from the top ranked characters.
/// Idempotent; safe to run at any time.
pub struct SeriesScorer {
    reader: StoreReader,
    ranks: SeriesRankStore,
    top_limit: i64,
}

impl SeriesScorer {
    pub fn new(reader: StoreReader, ranks: SeriesRankStore, top_limit: i64) -> Self {
        Self {
            reader,
            ranks,
            top_limit,
        }
    }

    /// Score the current top set and replace the snapshot. An empty top set
    /// leaves any previous snapshot in place.
    pub async fn rebuild(&self) -> Result<Vec<SeriesAggregate>> {
        let records = self.reader.top_ranked(self.top_limit).await?;
        if records.is_empty() {
            warn!("No fully-ranked characters, skipping series rank rebuild");
            return Ok(Vec::new());
        }

        let aggregates = score_batch(&records);
        self.ranks.replace_ranking(&aggregates).await?;

        let mut tier_counts = [0usize; 5];
        for agg in &aggregates {
            tier_counts[(5 - agg.tier.strength()) as usize] += 1;
        }
        info!(
            characters = records.len(),
            series = aggregates.len(),
            s = tier_counts[0],
            a = tier_counts[1],
            b = tier_counts[2],
            c = tier_counts[3],
            d = tier_counts[4],
            "Series ranking rebuilt"
        );

        Ok(aggregates)
    }
}
