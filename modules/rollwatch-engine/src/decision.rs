//! Per-message classification and alert decision.
//!
//! Rules run in a fixed order; each either settles the message or falls
//! through to the next. The order is load-bearing: info-updates must be
//! written (and never alerted) before roll detection runs, and the kakera
//! floor applies before any of the positive checks except a claimed marker.

use tracing::{debug, info, warn};

use rollwatch_common::{meta_rank, Config, GatewayMessage, MergeOutcome, Tier};
use rollwatch_store::{SeriesRankStore, StoreReader, StoreWriter};

use crate::embed::parse_character_embed;
use crate::notify::{build_alert, dispatch_alerts, AlertContext, DirectMessenger};

/// Roll command prefixes the privileged users issue.
const ROLL_COMMANDS: [&str; 8] = ["$wa", "$wg", "$ha", "$hg", "$ma", "$mg", "$mx", "$waifu"];

/// Commands whose bot output is never a single-character embed.
const UTILITY_PREFIXES: [&str; 9] = [
    "$top", "$mm", "$tu", "$help", "$info", "$note", "$bonus", "$dk", "$rt",
];

/// Ownership markers that identify a claimed roll in description or footer.
const CLAIMED_MARKERS: [&str; 3] = ["belongs to", "is married to", "claimed by"];

/// Wider marker set used for the unconditional-alert override.
const CLAIMED_MARKERS_EXTENDED: [&str; 5] =
    ["belongs to", "is married to", "claimed by", "has claimed", "💍"];

const NEW_ROLL_MARKER: &str = "react with any emoji to claim";

/// Accent color band the game uses on claimed embeds.
const CLAIMED_COLOR_MIN: u32 = 0xf47ff0;
const CLAIMED_COLOR_MAX: u32 = 0xf480ff;

/// Why a message was dropped without producing a roll report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Not from the game bot, or no embed attached.
    NotGameOutput,
    /// Output of a utility command.
    UtilityCommand,
    /// An embed that matches no roll/claim pattern.
    NotRollOrClaim,
    /// Owner-only mode is on and this was someone else's roll.
    NotOwnersRoll,
}

/// What the pipeline decided for one roll embed.
#[derive(Debug, Clone)]
pub struct RollReport {
    pub name: String,
    pub series: String,
    pub kakera_value: Option<i64>,
    pub claim_rank: Option<i64>,
    pub like_rank: Option<i64>,
    pub meta_rank: Option<f64>,
    pub tier: Option<Tier>,
    pub claimed: bool,
    pub eligible: bool,
    /// Failed checks, for the no-alert log line. Empty when claimed.
    pub reasons: Vec<String>,
    pub delivered: usize,
}

/// Terminal outcome of one message.
#[derive(Debug)]
pub enum MessageOutcome {
    /// An owner's roll command; the roller is now tracked.
    RollCommandTracked,
    Ignored(IgnoreReason),
    /// An info-update embed was written (or the write was lost and will be
    /// retried by the next observation). Never alerts.
    InfoUpdate { outcome: Option<MergeOutcome> },
    RollProcessed(RollReport),
}

/// The per-message decision pipeline. Holds the only cross-message mutable
/// state on the live path: which privileged user rolled last.
pub struct DecisionEngine<M: DirectMessenger> {
    config: Config,
    reader: StoreReader,
    writer: StoreWriter,
    ranks: SeriesRankStore,
    messenger: M,
    last_roller: Option<String>,
}

impl<M: DirectMessenger> DecisionEngine<M> {
    pub fn new(
        config: Config,
        reader: StoreReader,
        writer: StoreWriter,
        ranks: SeriesRankStore,
        messenger: M,
    ) -> Self {
        Self {
            config,
            reader,
            writer,
            ranks,
            messenger,
            last_roller: None,
        }
    }

    pub fn last_roller(&self) -> Option<&str> {
        self.last_roller.as_deref()
    }

    /// Classify and fully process one message.
    pub async fn handle_message(&mut self, msg: &GatewayMessage) -> MessageOutcome {
        let content_lower = msg.content.to_lowercase();

        // 1. An owner's roll command: remember who rolled, wait for the embed.
        if self.config.owner_ids.contains(&msg.author_id)
            && ROLL_COMMANDS.iter().any(|cmd| content_lower.contains(cmd))
        {
            let roller = msg.author_name.to_lowercase();
            info!(roller = %roller, "Owner rolled, awaiting embed");
            self.last_roller = Some(roller);
            return MessageOutcome::RollCommandTracked;
        }

        // 2. Only embeds from the game bot are game output.
        if !msg.is_bot
            || !msg.author_name.to_lowercase().contains(&self.config.game_bot_name)
            || msg.embeds.is_empty()
        {
            return MessageOutcome::Ignored(IgnoreReason::NotGameOutput);
        }

        // 3. Utility command output.
        if UTILITY_PREFIXES.iter().any(|cmd| content_lower.starts_with(cmd)) {
            debug!(content = %msg.content, "Ignored utility message");
            return MessageOutcome::Ignored(IgnoreReason::UtilityCommand);
        }

        let embed = &msg.embeds[0];
        let parsed = parse_character_embed(embed);

        // 4. Any embed carrying stat data is an info-update: write it through
        // the direct policy and stop. Info-updates never alert.
        if let Some(p) = parsed.as_ref().filter(|p| p.has_stat_data()) {
            return match self.writer.upsert_direct(p).await {
                Ok(outcome) => {
                    info!(
                        name = %p.name,
                        series = %p.series,
                        ?outcome,
                        "Stored info-update"
                    );
                    MessageOutcome::InfoUpdate {
                        outcome: Some(outcome),
                    }
                }
                Err(e) => {
                    warn!(name = %p.name, error = %e, "Info-update write lost");
                    MessageOutcome::InfoUpdate { outcome: None }
                }
            };
        }

        let desc_lower = embed.description.as_deref().unwrap_or("").to_lowercase();
        let footer_lower = embed.footer_text.as_deref().unwrap_or("").to_lowercase();
        let title_lower = embed.title.as_deref().unwrap_or("").to_lowercase();

        // 5. Roll/claim detection: an ownership marker, a fresh-roll prompt,
        // or the tracked roller's name somewhere in the embed.
        let claimed_marker = CLAIMED_MARKERS
            .iter()
            .any(|m| desc_lower.contains(m) || footer_lower.contains(m));
        let new_roll = desc_lower.contains(NEW_ROLL_MARKER);
        let roller_mentioned = self
            .last_roller
            .as_deref()
            .is_some_and(|r| desc_lower.contains(r) || footer_lower.contains(r));
        if !(claimed_marker || new_roll || roller_mentioned) {
            debug!("Ignored embed: not a roll/claim pattern");
            return MessageOutcome::Ignored(IgnoreReason::NotRollOrClaim);
        }

        // 6. Merge parsed fields with stored history; parsed wins per field.
        let (name, series, parsed_kakera, parsed_claim, parsed_like) = match parsed {
            Some(p) => (p.name, p.series, p.kakera_value, p.claim_rank, p.like_rank),
            None => ("Unknown".to_string(), "Unknown".to_string(), None, None, None),
        };

        let stored = match self.reader.get_meta(&name).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(name = %name, error = %e, "Store lookup failed, continuing without history");
                None
            }
        };
        let kakera_value = parsed_kakera.or(stored.as_ref().and_then(|s| s.kakera_value));
        let claim_rank = parsed_claim.or(stored.as_ref().and_then(|s| s.claim_rank));
        let like_rank = parsed_like.or(stored.as_ref().and_then(|s| s.like_rank));
        let meta = meta_rank(claim_rank, like_rank);

        // 7. Eligibility. A claimed marker (wide set, any text block) or the
        // claimed accent color forces an alert past every other check.
        let claimed = claimed_marker
            || CLAIMED_MARKERS_EXTENDED.iter().any(|m| {
                desc_lower.contains(m) || footer_lower.contains(m) || title_lower.contains(m)
            })
            || embed
                .accent_color
                .is_some_and(|c| (CLAIMED_COLOR_MIN..=CLAIMED_COLOR_MAX).contains(&c));

        let mut eligible = claimed;
        let mut reasons: Vec<String> = Vec::new();
        let mut tier: Option<Tier> = None;

        let kakera_low = kakera_value.is_some_and(|k| k < self.config.kakera_threshold);
        if kakera_low && !claimed {
            // Hard floor: a known-cheap character alerts only when claimed.
            reasons.push(format!(
                "kakera below threshold ({} < {})",
                kakera_value.unwrap_or_default(),
                self.config.kakera_threshold
            ));
            eligible = false;
        } else {
            let meta_ok = meta.is_some_and(|m| m <= self.config.meta_rank_threshold as f64);
            let kakera_ok = kakera_value.is_some_and(|k| k >= self.config.kakera_threshold);

            tier = match self.ranks.series_info(&series).await {
                Ok(info) => info.map(|agg| agg.tier),
                Err(e) => {
                    warn!(series = %series, error = %e, "Series tier lookup failed");
                    None
                }
            };
            let tier_ok =
                tier.is_some_and(|t| t.strength() >= self.config.min_tier.strength());

            if !eligible {
                eligible = meta_ok || tier_ok || kakera_ok;
            }
            if !meta_ok {
                reasons.push(format!(
                    "meta rank above threshold ({:?} > {})",
                    meta, self.config.meta_rank_threshold
                ));
            }
            if !tier_ok {
                reasons.push(format!(
                    "series tier below {} ({:?})",
                    self.config.min_tier, tier
                ));
            }
            if !kakera_ok {
                reasons.push(format!(
                    "kakera below threshold ({:?} < {})",
                    kakera_value, self.config.kakera_threshold
                ));
            }
        }

        // A claimed roll overrides every failure reason.
        if claimed {
            eligible = true;
            reasons.clear();
        }

        // 8. Owner-only gating. The roll context is consumed here whether or
        // not the gate passes.
        if self.config.owner_only_dm {
            let owners_roll = self
                .last_roller
                .take()
                .is_some_and(|r| desc_lower.contains(&r) || footer_lower.contains(&r));
            if !owners_roll {
                debug!("Ignored alert: not the tracked owner's roll");
                return MessageOutcome::Ignored(IgnoreReason::NotOwnersRoll);
            }
        }

        let mut report = RollReport {
            name,
            series,
            kakera_value,
            claim_rank,
            like_rank,
            meta_rank: meta,
            tier,
            claimed,
            eligible,
            reasons,
            delivered: 0,
        };

        if !report.eligible {
            info!(
                name = %report.name,
                series = %report.series,
                reasons = ?report.reasons,
                "Roll below alert bar"
            );
            return MessageOutcome::RollProcessed(report);
        }

        // 9. Dispatch, one recipient at a time; failures stay isolated.
        let payload = build_alert(&AlertContext {
            name: report.name.clone(),
            series: report.series.clone(),
            meta_rank: report.meta_rank,
            kakera_value: report.kakera_value,
            claimed: report.claimed,
            tier: report.tier,
            image_url: embed.image_url.clone(),
            thumbnail_url: embed.thumbnail_url.clone(),
        });
        report.delivered =
            dispatch_alerts(&self.messenger, &self.config.owner_ids, &payload).await;
        self.last_roller = None;

        info!(
            name = %report.name,
            series = %report.series,
            tier = ?report.tier,
            claimed = report.claimed,
            delivered = report.delivered,
            "Roll alert dispatched"
        );
        MessageOutcome::RollProcessed(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollwatch_common::{ChatEmbed, ParsedCharacter, SeriesAggregate};
    use rollwatch_store::StoreClient;

    use crate::fixtures::{embed, game_message, user_message, MockMessenger};

    fn test_config() -> Config {
        Config {
            database_url: String::new(),
            owner_ids: vec![1, 2],
            game_bot_name: "mudae".to_string(),
            kakera_threshold: 100,
            meta_rank_threshold: 5000,
            min_tier: Tier::B,
            owner_only_dm: false,
            rank_top_limit: 1000,
            top_series_limit: 10,
        }
    }

    async fn engine_with(config: Config) -> (DecisionEngine<MockMessenger>, StoreClient) {
        let client = StoreClient::connect_in_memory().await.unwrap();
        client.migrate().await.unwrap();
        let engine = DecisionEngine::new(
            config,
            StoreReader::new(client.clone()),
            StoreWriter::new(client.clone()),
            SeriesRankStore::new(client.clone()),
            MockMessenger::new(),
        );
        (engine, client)
    }

    async fn engine() -> (DecisionEngine<MockMessenger>, StoreClient) {
        engine_with(test_config()).await
    }

    fn roll_embed(name: &str, series: &str) -> ChatEmbed {
        embed(name, &format!("{series}\nReact with any emoji to claim!"))
    }

    #[tokio::test]
    async fn owner_roll_command_is_tracked() {
        let (mut engine, _) = engine().await;
        let outcome = engine
            .handle_message(&user_message(1, "Alice", "$wa"))
            .await;
        assert!(matches!(outcome, MessageOutcome::RollCommandTracked));
        assert_eq!(engine.last_roller(), Some("alice"));
    }

    #[tokio::test]
    async fn non_owner_roll_command_is_not_tracked() {
        let (mut engine, _) = engine().await;
        let outcome = engine
            .handle_message(&user_message(77, "Mallory", "$wa"))
            .await;
        assert!(matches!(
            outcome,
            MessageOutcome::Ignored(IgnoreReason::NotGameOutput)
        ));
        assert_eq!(engine.last_roller(), None);
    }

    #[tokio::test]
    async fn non_game_sender_ignored() {
        let (mut engine, _) = engine().await;
        let mut msg = game_message(roll_embed("Rem", "Re:Zero"));
        msg.author_name = "SomeOtherBot".to_string();
        assert!(matches!(
            engine.handle_message(&msg).await,
            MessageOutcome::Ignored(IgnoreReason::NotGameOutput)
        ));
    }

    #[tokio::test]
    async fn embedless_game_message_ignored() {
        let (mut engine, _) = engine().await;
        let mut msg = game_message(roll_embed("Rem", "Re:Zero"));
        msg.embeds.clear();
        assert!(matches!(
            engine.handle_message(&msg).await,
            MessageOutcome::Ignored(IgnoreReason::NotGameOutput)
        ));
    }

    #[tokio::test]
    async fn utility_output_ignored() {
        let (mut engine, _) = engine().await;
        let mut msg = game_message(roll_embed("Rem", "Re:Zero"));
        msg.content = "$tu".to_string();
        assert!(matches!(
            engine.handle_message(&msg).await,
            MessageOutcome::Ignored(IgnoreReason::UtilityCommand)
        ));
    }

    #[tokio::test]
    async fn info_update_is_stored_and_never_alerts() {
        let (mut engine, client) = engine().await;
        // Track a roller first: the info-update rule must still win.
        engine.handle_message(&user_message(1, "Alice", "$wa")).await;

        let msg = game_message(embed(
            "Rem",
            "Re:Zero\nClaim Rank: #12\nLike Rank: #34\n6,000💎",
        ));
        let outcome = engine.handle_message(&msg).await;
        assert!(matches!(
            outcome,
            MessageOutcome::InfoUpdate {
                outcome: Some(MergeOutcome::New)
            }
        ));
        assert!(engine.messenger.sent_to().is_empty(), "info-updates never alert");

        let reader = StoreReader::new(client);
        let rec = reader.get_by_name("Rem", None).await.unwrap().unwrap();
        assert_eq!(rec.kakera_value, Some(6000));
    }

    #[tokio::test]
    async fn unrecognized_embed_ignored() {
        let (mut engine, _) = engine().await;
        // No claim marker, no roll prompt, no tracked roller.
        let msg = game_message(embed("Rem", "Re:Zero"));
        assert!(matches!(
            engine.handle_message(&msg).await,
            MessageOutcome::Ignored(IgnoreReason::NotRollOrClaim)
        ));
    }

    #[tokio::test]
    async fn unknown_everything_is_ineligible() {
        let (mut engine, _) = engine().await;
        let msg = game_message(roll_embed("Nobody", "Nowhere"));
        match engine.handle_message(&msg).await {
            MessageOutcome::RollProcessed(report) => {
                assert!(!report.eligible);
                assert_eq!(report.delivered, 0);
                assert_eq!(report.reasons.len(), 3);
            }
            other => panic!("expected roll report, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn claimed_marker_overrides_low_kakera() {
        let (mut engine, client) = engine().await;
        let writer = StoreWriter::new(client);
        writer
            .upsert_direct(&ParsedCharacter {
                name: "Cheapo".to_string(),
                series: "Minor Series".to_string(),
                kakera_value: Some(30),
                claim_rank: None,
                like_rank: None,
            })
            .await
            .unwrap();

        let msg = game_message(embed("Cheapo", "Minor Series\nBelongs to Bob"));
        match engine.handle_message(&msg).await {
            MessageOutcome::RollProcessed(report) => {
                assert!(report.claimed);
                assert!(report.eligible, "claimed overrides the kakera floor");
                assert!(report.reasons.is_empty());
                assert_eq!(report.delivered, 2);
            }
            other => panic!("expected roll report, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn claimed_accent_color_forces_eligibility() {
        let (mut engine, _) = engine().await;
        let mut e = roll_embed("Nobody", "Nowhere");
        e.accent_color = Some(0xf47fff);
        match engine.handle_message(&game_message(e)).await {
            MessageOutcome::RollProcessed(report) => {
                assert!(report.claimed);
                assert!(report.eligible);
            }
            other => panic!("expected roll report, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn low_kakera_blocks_good_meta_rank() {
        let (mut engine, client) = engine().await;
        let writer = StoreWriter::new(client);
        writer
            .upsert_direct(&ParsedCharacter {
                name: "Cheapo".to_string(),
                series: "Minor Series".to_string(),
                kakera_value: Some(30),
                claim_rank: Some(1),
                like_rank: Some(1),
            })
            .await
            .unwrap();

        let msg = game_message(roll_embed("Cheapo", "Minor Series"));
        match engine.handle_message(&msg).await {
            MessageOutcome::RollProcessed(report) => {
                assert_eq!(report.meta_rank, Some(1.0));
                assert!(!report.eligible, "kakera floor is hard unless claimed");
            }
            other => panic!("expected roll report, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stored_meta_rank_triggers_alert() {
        let (mut engine, client) = engine().await;
        let writer = StoreWriter::new(client);
        writer
            .upsert_direct(&ParsedCharacter {
                name: "Rem".to_string(),
                series: "Re:Zero".to_string(),
                kakera_value: Some(450),
                claim_rank: Some(12),
                like_rank: Some(34),
            })
            .await
            .unwrap();

        let msg = game_message(roll_embed("Rem", "Re:Zero"));
        match engine.handle_message(&msg).await {
            MessageOutcome::RollProcessed(report) => {
                assert_eq!(report.meta_rank, Some(23.0));
                assert!(report.eligible);
                assert_eq!(report.delivered, 2);
            }
            other => panic!("expected roll report, got {other:?}"),
        }
        assert_eq!(engine.messenger.sent_to(), vec![1, 2]);
    }

    #[tokio::test]
    async fn series_tier_alone_triggers_alert() {
        let (mut engine, client) = engine().await;
        let ranks = SeriesRankStore::new(client);
        ranks
            .replace_ranking(&[SeriesAggregate {
                series: "Hot Series".to_string(),
                avg_meta_rank: 40.0,
                members_in_top: 9,
                score: 95.0,
                tier_score: 95.0,
                tier: Tier::S,
            }])
            .await
            .unwrap();

        let msg = game_message(roll_embed("Newcomer", "Hot Series"));
        match engine.handle_message(&msg).await {
            MessageOutcome::RollProcessed(report) => {
                assert_eq!(report.tier, Some(Tier::S));
                assert!(report.eligible);
            }
            other => panic!("expected roll report, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn owner_only_mode_gates_on_tracked_roller() {
        let mut config = test_config();
        config.owner_only_dm = true;
        let (mut engine, _) = engine_with(config).await;

        // Eligible embed, but nobody's roll is tracked.
        let mut e = roll_embed("Nobody", "Nowhere");
        e.accent_color = Some(0xf47fff);
        assert!(matches!(
            engine.handle_message(&game_message(e.clone())).await,
            MessageOutcome::Ignored(IgnoreReason::NotOwnersRoll)
        ));

        // Same embed right after the owner rolled, with their name in it.
        engine.handle_message(&user_message(1, "Alice", "$wa")).await;
        let mut e = embed("Nobody", "Nowhere\nReact with any emoji to claim!\nRolled by alice");
        e.accent_color = Some(0xf47fff);
        match engine.handle_message(&game_message(e.clone())).await {
            MessageOutcome::RollProcessed(report) => assert!(report.eligible),
            other => panic!("expected roll report, got {other:?}"),
        }

        // The context was consumed: an identical embed is gated again.
        assert!(matches!(
            engine.handle_message(&game_message(e)).await,
            MessageOutcome::Ignored(IgnoreReason::NotOwnersRoll)
        ));
    }

    #[tokio::test]
    async fn roll_context_cleared_after_dispatch() {
        let (mut engine, _) = engine().await;
        engine.handle_message(&user_message(1, "Alice", "$wa")).await;
        let mut e = roll_embed("Nobody", "Nowhere");
        e.accent_color = Some(0xf47fff);
        engine.handle_message(&game_message(e)).await;
        assert_eq!(engine.last_roller(), None);
    }
}
