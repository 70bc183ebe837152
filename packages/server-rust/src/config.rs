//! Service configuration and its command-line/environment surface.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use clap::{Parser, ValueEnum};

use crate::telemetry::LogFormat;

/// Top-level configuration for the like and user services.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Logical database name. Also the prefix of search index names.
    pub database: String,
    pub cache: CacheConfig,
    pub reward: RewardConfig,
    pub notify: NotifyConfig,
    /// Avatar assigned to synthesized profiles.
    pub default_avatar_url: String,
    /// Prefix of synthesized nicknames; the last six id characters follow it.
    pub default_nickname_prefix: String,
    /// Upper bound on each service call, in milliseconds.
    pub operation_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database: "pawprint".to_string(),
            cache: CacheConfig::default(),
            reward: RewardConfig::default(),
            notify: NotifyConfig::default(),
            default_avatar_url: "https://static.pawprint.app/avatar/default.png".to_string(),
            default_nickname_prefix: "cat_".to_string(),
            operation_timeout_ms: 30_000,
        }
    }
}

impl ServiceConfig {
    /// Search index name for a collection: `<database>.<collection>-alias`.
    #[must_use]
    pub fn index_name(&self, collection: &str) -> String {
        format!("{}.{collection}-alias", self.database)
    }
}

/// Record cache settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// First segment of every cache key.
    pub prefix: String,
    /// Maximum number of cached records.
    pub capacity: usize,
    /// Lifetime of a cache entry.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: "cache".to_string(),
            capacity: 10_000,
            ttl: Duration::from_secs(600),
        }
    }
}

/// Streak reward settings.
#[derive(Debug, Clone)]
pub struct RewardConfig {
    /// Daily cap on rewarded likes.
    pub like_times: i64,
    /// Offset of the reference timezone used for all calendar comparisons.
    pub utc_offset_secs: i32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            like_times: 3,
            utc_offset_secs: 0,
        }
    }
}

impl RewardConfig {
    /// Reference timezone. Out-of-range offsets fall back to UTC.
    #[must_use]
    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_secs).unwrap_or_else(|| Utc.fix())
    }
}

/// Outbound message bus settings.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub notification_topic: String,
    /// Topic receiving avatar URLs that became referenced by a profile.
    pub used_url_topic: String,
    /// Extra publish attempts after the first failure.
    pub retries: u32,
    /// Bounded queue between request handlers and the publish worker.
    pub queue_capacity: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            notification_topic: "notification".to_string(),
            used_url_topic: "sts_used_url".to_string(),
            retries: 2,
            queue_capacity: 256,
        }
    }
}

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// Document store backend selectable at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    Memory,
    Redb,
}

/// Arguments of the `pawprint-server` binary.
#[derive(Debug, Clone, Parser)]
#[command(name = "pawprint-server", version, about)]
pub struct ServiceArgs {
    #[arg(long, env = "PAWPRINT_DATABASE", default_value = "pawprint")]
    pub database: String,

    #[arg(long, env = "PAWPRINT_STORE", value_enum, default_value_t = StoreBackend::Memory)]
    pub store: StoreBackend,

    /// Database file, required for the redb backend.
    #[arg(long, env = "PAWPRINT_DATA_PATH")]
    pub data_path: Option<PathBuf>,

    /// Search index directory; in memory when absent.
    #[arg(long, env = "PAWPRINT_INDEX_PATH")]
    pub index_path: Option<PathBuf>,

    #[arg(long, env = "PAWPRINT_CACHE_CAPACITY", default_value_t = 10_000)]
    pub cache_capacity: usize,

    #[arg(long, env = "PAWPRINT_CACHE_TTL_SECS", default_value_t = 600)]
    pub cache_ttl_secs: u64,

    #[arg(long, env = "PAWPRINT_LIKE_TIMES", default_value_t = 3)]
    pub like_times: i64,

    #[arg(long, env = "PAWPRINT_UTC_OFFSET_SECS", default_value_t = 0, allow_hyphen_values = true)]
    pub utc_offset_secs: i32,

    #[arg(long, env = "PAWPRINT_TIMEOUT_MS", default_value_t = 30_000)]
    pub timeout_ms: u64,

    #[arg(long, env = "PAWPRINT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl From<&ServiceArgs> for ServiceConfig {
    fn from(args: &ServiceArgs) -> Self {
        let defaults = Self::default();
        Self {
            database: args.database.clone(),
            cache: CacheConfig {
                capacity: args.cache_capacity,
                ttl: Duration::from_secs(args.cache_ttl_secs),
                ..defaults.cache
            },
            reward: RewardConfig {
                like_times: args.like_times,
                utc_offset_secs: args.utc_offset_secs,
            },
            operation_timeout_ms: args.timeout_ms,
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_config_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.cache.prefix, "cache");
        assert_eq!(config.reward.like_times, 3);
        assert_eq!(config.notify.notification_topic, "notification");
        assert_eq!(config.notify.used_url_topic, "sts_used_url");
        assert_eq!(config.notify.retries, 2);
        assert_eq!(config.notify.queue_capacity, 256);
        assert_eq!(config.operation_timeout_ms, 30_000);
    }

    #[test]
    fn index_name_uses_alias_suffix() {
        let config = ServiceConfig::default();
        assert_eq!(config.index_name("user"), "pawprint.user-alias");
    }

    #[test]
    fn timezone_falls_back_to_utc() {
        let reward = RewardConfig {
            like_times: 1,
            utc_offset_secs: 100_000,
        };
        assert_eq!(reward.timezone().local_minus_utc(), 0);

        let east8 = RewardConfig {
            like_times: 1,
            utc_offset_secs: 8 * 3600,
        };
        assert_eq!(east8.timezone().local_minus_utc(), 28_800);
    }

    #[test]
    fn args_override_defaults() {
        let args = ServiceArgs::parse_from([
            "pawprint-server",
            "--database",
            "meowchat",
            "--like-times",
            "5",
            "--utc-offset-secs",
            "-3600",
        ]);
        let config = ServiceConfig::from(&args);
        assert_eq!(config.database, "meowchat");
        assert_eq!(config.reward.like_times, 5);
        assert_eq!(config.reward.utc_offset_secs, -3600);
        assert_eq!(config.cache.prefix, "cache");
        assert_eq!(args.store, StoreBackend::Memory);
    }
}
