use std::env;

use tracing::info;

use crate::error::ConfigError;
use crate::types::Tier;

/// Application configuration loaded from environment variables. Immutable
/// after load; components receive it by reference at construction.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection string.
    pub database_url: String,

    /// Privileged user ids: their roll commands are tracked and they receive
    /// the direct-message alerts.
    pub owner_ids: Vec<i64>,

    /// Lowercased substring identifying the game bot's account name.
    pub game_bot_name: String,

    // Alert thresholds
    pub kakera_threshold: i64,
    pub meta_rank_threshold: i64,
    pub min_tier: Tier,
    pub owner_only_dm: bool,

    // Ranking rebuild
    pub rank_top_limit: i64,
    pub top_series_limit: i64,
}

impl Config {
    /// Load configuration from environment variables, with defaults for
    /// everything except genuinely malformed values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://rollwatch.db?mode=rwc".to_string()),
            owner_ids: parse_id_list(
                &env::var("OWNER_IDS")
                    .or_else(|_| env::var("OWNER_ID"))
                    .unwrap_or_default(),
            ),
            game_bot_name: env::var("GAME_BOT_NAME")
                .unwrap_or_else(|_| "mudae".to_string())
                .to_lowercase(),
            kakera_threshold: int_env("KAKERA_THRESHOLD", 100)?,
            meta_rank_threshold: int_env("META_RANK_THRESHOLD", 5000)?,
            min_tier: tier_env("DM_TIER_THRESHOLD", Tier::B)?,
            owner_only_dm: bool_env("OWNER_ONLY_DM", true),
            rank_top_limit: int_env("RANK_TOP_LIMIT", 1000)?,
            top_series_limit: int_env("TOP_SERIES_LIMIT", 10)?,
        })
    }

    /// Log the effective thresholds at startup.
    pub fn log_summary(&self) {
        info!(
            owners = self.owner_ids.len(),
            kakera_threshold = self.kakera_threshold,
            meta_rank_threshold = self.meta_rank_threshold,
            min_tier = %self.min_tier,
            owner_only_dm = self.owner_only_dm,
            rank_top_limit = self.rank_top_limit,
            "Configuration loaded"
        );
    }
}

/// Parse a comma-separated id list, ignoring anything non-numeric.
fn parse_id_list(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .collect()
}

fn int_env(key: &str, default: i64) -> Result<i64, ConfigError> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| ConfigError::InvalidInteger {
                key: key.to_string(),
                value: raw,
            }),
    }
}

fn bool_env(key: &str, default: bool) -> bool {
    match env::var(key) {
        Err(_) => default,
        Ok(raw) => raw.trim().eq_ignore_ascii_case("true"),
    }
}

fn tier_env(key: &str, default: Tier) -> Result<Tier, ConfigError> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => Tier::parse(&raw).ok_or(ConfigError::InvalidTier {
            key: key.to_string(),
            value: raw,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_list_ignores_junk() {
        assert_eq!(parse_id_list("123, 456"), vec![123, 456]);
        assert_eq!(parse_id_list("123,abc,789"), vec![123, 789]);
        assert_eq!(parse_id_list(""), Vec::<i64>::new());
    }
}
