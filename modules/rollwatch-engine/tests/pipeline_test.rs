//! End-to-end pipeline: scrape a ranked-list page, rebuild the series
//! ranking, then process a live roll for a character from that list.

use std::sync::Mutex;

use async_trait::async_trait;

use rollwatch_common::{ChatEmbed, Config, GatewayMessage, Tier};
use rollwatch_engine::{
    AlertPayload, DecisionEngine, DirectMessenger, ListKind, MessageOutcome, NotifyError,
    SeriesScorer, TopListScraper,
};
use rollwatch_store::{SeriesRankStore, StoreClient, StoreReader, StoreWriter};

#[derive(Default)]
struct RecordingMessenger {
    sent: Mutex<Vec<(i64, AlertPayload)>>,
}

#[async_trait]
impl DirectMessenger for RecordingMessenger {
    async fn send_direct_message(
        &self,
        user_id: i64,
        payload: &AlertPayload,
    ) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((user_id, payload.clone()));
        Ok(())
    }
}

fn config() -> Config {
    Config {
        database_url: String::new(),
        owner_ids: vec![42],
        game_bot_name: "mudae".to_string(),
        kakera_threshold: 100,
        meta_rank_threshold: 5000,
        min_tier: Tier::B,
        owner_only_dm: false,
        rank_top_limit: 1000,
        top_series_limit: 10,
    }
}

fn list_page(description: &str, footer: &str) -> ChatEmbed {
    ChatEmbed {
        description: Some(description.to_string()),
        footer_text: Some(footer.to_string()),
        ..Default::default()
    }
}

fn roll_message(name: &str, description: &str) -> GatewayMessage {
    GatewayMessage {
        author_id: 999,
        author_name: "Mudae#0807".to_string(),
        is_bot: true,
        content: String::new(),
        embeds: vec![ChatEmbed {
            author_line: Some(name.to_string()),
            description: Some(description.to_string()),
            ..Default::default()
        }],
    }
}

#[tokio::test]
async fn scraped_list_feeds_live_roll_decision() {
    let client = StoreClient::connect_in_memory().await.unwrap();
    client.migrate().await.unwrap();

    // Import one claimed-list page and one liked-list page, so the top
    // characters end up fully ranked.
    let mut scraper = TopListScraper::new(StoreWriter::new(client.clone()));
    assert!(scraper.start(ListKind::Claimed, 1));
    assert!(
        scraper
            .process_list_embed(&list_page(
                "#1 - Rem - Re:Zero\n#2 - Emilia - Re:Zero\n#3 - Bocchi - Lonely Rock",
                "1 / 1",
            ))
            .await
    );
    scraper.complete().await;

    assert!(scraper.start(ListKind::Liked, 1));
    scraper
        .process_list_embed(&list_page(
            "#1 - Rem - Re:Zero\n#4 - Emilia - Re:Zero\n#900 - Bocchi - Lonely Rock",
            "1 / 1",
        ))
        .await;
    scraper.complete().await;

    // Rebuild the series ranking from the imported rows.
    let scorer = SeriesScorer::new(
        StoreReader::new(client.clone()),
        SeriesRankStore::new(client.clone()),
        1000,
    );
    let aggregates = scorer.rebuild().await.unwrap();
    assert_eq!(aggregates.len(), 2);
    assert_eq!(aggregates[0].series, "Re:Zero", "two members, top ranks");

    // A live roll of an imported character: its stored meta-rank clears the
    // threshold, so the single owner gets exactly one alert.
    let mut engine = DecisionEngine::new(
        config(),
        StoreReader::new(client.clone()),
        StoreWriter::new(client.clone()),
        SeriesRankStore::new(client.clone()),
        RecordingMessenger::default(),
    );
    let outcome = engine
        .handle_message(&roll_message(
            "Rem",
            "Re:Zero\nReact with any emoji to claim!",
        ))
        .await;

    match outcome {
        MessageOutcome::RollProcessed(report) => {
            assert_eq!(report.meta_rank, Some(1.0));
            assert_eq!(report.tier, Some(aggregates[0].tier));
            assert!(report.eligible);
            assert_eq!(report.delivered, 1);
        }
        other => panic!("expected roll report, got {other:?}"),
    }

    // Rolls never write: Rem's import-sourced row is untouched.
    let reader = StoreReader::new(client);
    let rem = reader.get_by_name("Rem", Some("Re:Zero")).await.unwrap().unwrap();
    assert_eq!(rem.times_seen, 2, "one claimed import + one liked import");
}
