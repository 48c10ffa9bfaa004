pub mod decision;
pub mod embed;
pub mod notify;
pub mod scorer;
pub mod scrape;

#[cfg(test)]
pub(crate) mod fixtures;

pub use decision::{DecisionEngine, IgnoreReason, MessageOutcome, RollReport};
pub use embed::parse_character_embed;
pub use notify::{build_alert, dispatch_alerts, AlertContext, AlertPayload, DirectMessenger, NotifyError};
pub use scorer::{score_batch, SeriesScorer};
pub use scrape::{ListKind, TopListScraper};
