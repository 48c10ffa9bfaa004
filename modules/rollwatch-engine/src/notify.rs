//! Direct-message alert dispatch.
//!
//! The chat transport lives behind `DirectMessenger`; the engine only builds
//! the payload and fans it out. A failure for one recipient is logged and
//! never blocks the rest.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use rollwatch_common::Tier;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("user not found: {0}")]
    UserNotFound(i64),

    #[error("forbidden for user {0}")]
    Forbidden(i64),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Outbound direct-message channel to the chat platform.
#[async_trait]
pub trait DirectMessenger: Send + Sync {
    async fn send_direct_message(&self, user_id: i64, payload: &AlertPayload)
        -> Result<(), NotifyError>;
}

/// The embed sent to each recipient for an eligible roll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertPayload {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// Inputs to the payload builder, straight from the decision pipeline.
#[derive(Debug, Clone)]
pub struct AlertContext {
    pub name: String,
    pub series: String,
    pub meta_rank: Option<f64>,
    pub kakera_value: Option<i64>,
    pub claimed: bool,
    pub tier: Option<Tier>,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

fn tier_emoji(tier: Option<Tier>) -> &'static str {
    match tier {
        Some(Tier::S) => "💎",
        Some(Tier::A) => "🌟",
        Some(Tier::B) => "⭐",
        Some(Tier::C) => "✨",
        Some(Tier::D) => "💤",
        None => "🎯",
    }
}

fn tier_color(tier: Option<Tier>) -> u32 {
    match tier {
        Some(Tier::S) => 0xF1C40F,  // gold
        Some(Tier::A) => 0x9B59B6,  // purple
        Some(Tier::B) => 0x3498DB,  // blue
        Some(Tier::C) => 0x1ABC9C,  // teal
        Some(Tier::D) | None => 0x607D8B,
    }
}

/// Flavor line for a tier, used in alert text.
pub fn tier_flavor_label(tier: Option<Tier>) -> &'static str {
    match tier {
        Some(Tier::S) => "🌟 **S-TIER Series!** 🌟",
        Some(Tier::A) => "🔥 **A-TIER Series!** 🔥",
        Some(Tier::B) => "⭐ **B-TIER Series** ⭐",
        Some(Tier::C) => "✨ **C-TIER Series** ✨",
        Some(Tier::D) => "💤 **D-TIER Series** 💤",
        None => "❔ **Unknown Tier** ❔",
    }
}

fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "❔".to_string())
}

/// Build the alert embed for an eligible roll.
pub fn build_alert(ctx: &AlertContext) -> AlertPayload {
    let tier_label = ctx.tier.map(|t| t.as_str()).unwrap_or("Unknown");
    AlertPayload {
        title: format!("{} {} — {}-Tier", tier_emoji(ctx.tier), ctx.name, tier_label),
        description: format!(
            "{}\n**Series:** {}\n**Meta Rank:** {}\n**Kakera:** {}\n**Claimed:** {}",
            tier_flavor_label(ctx.tier),
            ctx.series,
            fmt_opt(ctx.meta_rank),
            fmt_opt(ctx.kakera_value),
            if ctx.claimed { "✅" } else { "❌" },
        ),
        color: tier_color(ctx.tier),
        image_url: ctx.image_url.clone(),
        thumbnail_url: if ctx.image_url.is_none() {
            ctx.thumbnail_url.clone()
        } else {
            None
        },
    }
}

/// Send the payload to every recipient. Failures are isolated per recipient;
/// returns how many sends succeeded.
pub async fn dispatch_alerts(
    messenger: &dyn DirectMessenger,
    recipients: &[i64],
    payload: &AlertPayload,
) -> usize {
    let mut delivered = 0;
    for &recipient in recipients {
        match messenger.send_direct_message(recipient, payload).await {
            Ok(()) => {
                info!(recipient, title = %payload.title, "Alert sent");
                delivered += 1;
            }
            Err(e) => {
                warn!(recipient, error = %e, "Alert dispatch failed");
            }
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::MockMessenger;

    fn ctx() -> AlertContext {
        AlertContext {
            name: "Rem".to_string(),
            series: "Re:Zero".to_string(),
            meta_rank: Some(120.0),
            kakera_value: Some(450),
            claimed: false,
            tier: Some(Tier::A),
            image_url: None,
            thumbnail_url: Some("https://cdn.example/thumb.png".to_string()),
        }
    }

    #[test]
    fn alert_carries_tier_and_stats() {
        let payload = build_alert(&ctx());
        assert!(payload.title.contains("Rem"));
        assert!(payload.title.contains("A-Tier"));
        assert!(payload.description.contains(tier_flavor_label(Some(Tier::A))));
        assert!(payload.description.contains("120"));
        assert!(payload.description.contains("450"));
        assert_eq!(payload.color, 0x9B59B6);
    }

    #[test]
    fn unknown_fields_render_placeholders() {
        let mut c = ctx();
        c.meta_rank = None;
        c.kakera_value = None;
        c.tier = None;
        let payload = build_alert(&c);
        assert!(payload.title.contains("Unknown-Tier"));
        assert!(payload.description.contains("❔"));
    }

    #[test]
    fn image_preferred_over_thumbnail() {
        let mut c = ctx();
        c.image_url = Some("https://cdn.example/full.png".to_string());
        let payload = build_alert(&c);
        assert_eq!(payload.image_url.as_deref(), Some("https://cdn.example/full.png"));
        assert_eq!(payload.thumbnail_url, None);

        let payload = build_alert(&ctx());
        assert_eq!(payload.thumbnail_url.as_deref(), Some("https://cdn.example/thumb.png"));
    }

    #[tokio::test]
    async fn failing_recipient_does_not_block_the_rest() {
        let messenger = MockMessenger::failing_for(2);
        let payload = build_alert(&ctx());
        let delivered = dispatch_alerts(&messenger, &[1, 2, 3], &payload).await;
        assert_eq!(delivered, 2);
        assert_eq!(messenger.sent_to(), vec![1, 3]);
    }
}
