//! Depot configuration

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::share::code::{DEFAULT_CODE_LENGTH, MAX_CODE_LENGTH, MIN_CODE_LENGTH};
use crate::transport::ChatId;

use super::error::ConfigError;

/// Configuration for the Depot service
#[derive(Clone)]
pub struct DepotConfig {
    /// Path to the database file
    /// If None, the caller picks a default (the CLI uses `depot.db`)
    pub db_path: Option<PathBuf>,

    /// Bot username used to build retrieval links
    pub bot_username: String,

    /// Storage channel holding all shared items (must be non-zero)
    pub channel_id: ChatId,

    /// Principals allowed to manage any share, bypassing rate limits and verification
    pub operators: Vec<i64>,

    /// Channels a principal must have joined before retrieving anything
    /// Default: none (operators are never checked)
    pub force_sub_channels: Vec<ChatId>,

    /// Length of generated share codes
    /// Default: 8 (accepted range 6..=12)
    pub share_code_length: usize,

    /// Collision retries before share creation gives up
    /// Default: 16
    pub max_code_attempts: u32,

    /// Quiet period after the last album item before the album is finalized (ms)
    /// Default: 2000
    pub album_quiet_period_ms: u64,

    /// Retrievals allowed per principal per window
    /// Default: 10
    pub rate_limit_max: usize,

    /// Rate limit window (seconds)
    /// Default: 60
    pub rate_limit_window_secs: u64,

    /// Require recipients to pass a verification challenge
    /// Default: false
    pub verify_enabled: bool,

    /// How long a confirmed verification stays valid (seconds)
    /// Default: 86400 (24 hours)
    pub verify_expire_secs: u64,

    /// Length of verification challenge tokens
    /// Default: 10
    pub verify_token_length: usize,

    /// Delete delivered items after this many seconds (0 disables)
    /// Default: 0
    pub auto_delete_secs: u64,

    /// Default `protected` flag for new manual sessions
    /// Default: false
    pub protect_content: bool,

    /// Never edit channel posts; always announce links as replies
    /// Default: false
    pub disable_channel_button: bool,

    /// Maximum shares returned by a keyword lookup
    /// Default: 6
    pub keyword_result_limit: usize,

    /// Largest range a link token may select
    /// Default: 200
    pub max_link_range: u64,

    /// Shares per page when listing an owner's shares
    /// Default: 5
    pub shares_per_page: u32,

    /// Capacity of the event channel
    /// Default: 256
    pub event_buffer: usize,
}

impl fmt::Debug for DepotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DepotConfig")
            .field("db_path", &self.db_path)
            .field("bot_username", &self.bot_username)
            .field("channel_id", &self.channel_id)
            .field("operators", &self.operators.len())
            .field("force_sub_channels", &self.force_sub_channels)
            .field("share_code_length", &self.share_code_length)
            .field("max_code_attempts", &self.max_code_attempts)
            .field("album_quiet_period_ms", &self.album_quiet_period_ms)
            .field("rate_limit_max", &self.rate_limit_max)
            .field("rate_limit_window_secs", &self.rate_limit_window_secs)
            .field("verify_enabled", &self.verify_enabled)
            .field("verify_expire_secs", &self.verify_expire_secs)
            .field("auto_delete_secs", &self.auto_delete_secs)
            .field("protect_content", &self.protect_content)
            .field("disable_channel_button", &self.disable_channel_button)
            .field("keyword_result_limit", &self.keyword_result_limit)
            .field("max_link_range", &self.max_link_range)
            .finish_non_exhaustive()
    }
}

impl Default for DepotConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            bot_username: String::new(),
            channel_id: 0,
            operators: Vec::new(),
            force_sub_channels: Vec::new(),
            share_code_length: DEFAULT_CODE_LENGTH,
            max_code_attempts: 16,
            album_quiet_period_ms: 2000,
            rate_limit_max: 10,
            rate_limit_window_secs: 60,
            verify_enabled: false,
            verify_expire_secs: 86400,
            verify_token_length: 10,
            auto_delete_secs: 0,
            protect_content: false,
            disable_channel_button: false,
            keyword_result_limit: 6,
            max_link_range: 200,
            shares_per_page: 5,
            event_buffer: 256,
        }
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T::Err: fmt::Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|e: T::Err| ConfigError::Invalid {
            option: name,
            reason: e.to_string(),
        }),
    }
}

fn parse_flag(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<bool>, ConfigError> {
    match lookup(name).map(|raw| raw.trim().to_ascii_lowercase()) {
        None => Ok(None),
        Some(raw) => match raw.as_str() {
            "" => Ok(None),
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::Invalid {
                option: name,
                reason: format!("expected a boolean, got {:?}", raw),
            }),
        },
    }
}

/// Comma- or space-separated list of ids
fn parse_ids(option: &'static str, raw: &str) -> Result<Vec<i64>, ConfigError> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| ConfigError::Invalid {
                option,
                reason: format!("not an id: {}", s),
            })
        })
        .collect()
}

impl DepotConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `DEPOT_*` environment variables on top of the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source and validate
    ///
    /// Unset or blank variables keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = parse_var::<String>(&lookup, "DEPOT_DB_PATH")? {
            config.db_path = Some(PathBuf::from(path));
        }
        if let Some(username) = parse_var::<String>(&lookup, "DEPOT_BOT_USERNAME")? {
            config.bot_username = username;
        }
        if let Some(channel) = parse_var(&lookup, "DEPOT_CHANNEL_ID")? {
            config.channel_id = channel;
        }
        if let Some(raw) = lookup("DEPOT_OPERATORS") {
            config.operators = parse_ids("DEPOT_OPERATORS", &raw)?;
        }
        if let Some(raw) = lookup("DEPOT_FORCE_SUB_CHANNELS") {
            config.force_sub_channels = parse_ids("DEPOT_FORCE_SUB_CHANNELS", &raw)?;
        }
        if let Some(v) = parse_var(&lookup, "DEPOT_SHARE_CODE_LENGTH")? {
            config.share_code_length = v;
        }
        if let Some(v) = parse_var(&lookup, "DEPOT_MAX_CODE_ATTEMPTS")? {
            config.max_code_attempts = v;
        }
        if let Some(v) = parse_var(&lookup, "DEPOT_ALBUM_QUIET_PERIOD_MS")? {
            config.album_quiet_period_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "DEPOT_RATE_LIMIT_MAX")? {
            config.rate_limit_max = v;
        }
        if let Some(v) = parse_var(&lookup, "DEPOT_RATE_LIMIT_WINDOW_SECS")? {
            config.rate_limit_window_secs = v;
        }
        if let Some(v) = parse_flag(&lookup, "DEPOT_VERIFY_ENABLED")? {
            config.verify_enabled = v;
        }
        if let Some(v) = parse_var(&lookup, "DEPOT_VERIFY_EXPIRE_SECS")? {
            config.verify_expire_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "DEPOT_VERIFY_TOKEN_LENGTH")? {
            config.verify_token_length = v;
        }
        if let Some(v) = parse_var(&lookup, "DEPOT_AUTO_DELETE_SECS")? {
            config.auto_delete_secs = v;
        }
        if let Some(v) = parse_flag(&lookup, "DEPOT_PROTECT_CONTENT")? {
            config.protect_content = v;
        }
        if let Some(v) = parse_flag(&lookup, "DEPOT_DISABLE_CHANNEL_BUTTON")? {
            config.disable_channel_button = v;
        }
        if let Some(v) = parse_var(&lookup, "DEPOT_KEYWORD_RESULT_LIMIT")? {
            config.keyword_result_limit = v;
        }
        if let Some(v) = parse_var(&lookup, "DEPOT_MAX_LINK_RANGE")? {
            config.max_link_range = v;
        }
        if let Some(v) = parse_var(&lookup, "DEPOT_SHARES_PER_PAGE")? {
            config.shares_per_page = v;
        }
        if let Some(v) = parse_var(&lookup, "DEPOT_EVENT_BUFFER")? {
            config.event_buffer = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check every option for a usable value
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(option: &'static str, reason: &str) -> ConfigError {
            ConfigError::Invalid {
                option,
                reason: reason.to_string(),
            }
        }

        if self.channel_id == 0 {
            return Err(ConfigError::Missing("channel_id"));
        }
        if self.bot_username.trim().is_empty() {
            return Err(ConfigError::Missing("bot_username"));
        }
        if self.force_sub_channels.contains(&0) {
            return Err(invalid("force_sub_channels", "channel id cannot be 0"));
        }
        if !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&self.share_code_length) {
            return Err(invalid("share_code_length", "must be between 6 and 12"));
        }
        if self.max_code_attempts == 0 {
            return Err(invalid("max_code_attempts", "must be at least 1"));
        }
        if self.album_quiet_period_ms == 0 {
            return Err(invalid("album_quiet_period_ms", "must be positive"));
        }
        if self.rate_limit_max == 0 {
            return Err(invalid("rate_limit_max", "must be at least 1"));
        }
        if self.rate_limit_window_secs == 0 {
            return Err(invalid("rate_limit_window_secs", "must be positive"));
        }
        if !(4..=64).contains(&self.verify_token_length) {
            return Err(invalid("verify_token_length", "must be between 4 and 64"));
        }
        if self.verify_enabled && self.verify_expire_secs == 0 {
            return Err(invalid("verify_expire_secs", "must be positive when verification is on"));
        }
        if self.keyword_result_limit == 0 {
            return Err(invalid("keyword_result_limit", "must be at least 1"));
        }
        if self.max_link_range == 0 {
            return Err(invalid("max_link_range", "must be at least 1"));
        }
        if self.shares_per_page == 0 {
            return Err(invalid("shares_per_page", "must be at least 1"));
        }
        if self.event_buffer == 0 {
            return Err(invalid("event_buffer", "must be at least 1"));
        }
        Ok(())
    }

    /// Configuration for testing (short quiet period, small windows)
    pub fn for_testing() -> Self {
        Self {
            db_path: None,
            bot_username: "depot_test_bot".to_string(),
            channel_id: -1001000000001,
            operators: vec![1],
            album_quiet_period_ms: 200,
            rate_limit_max: 3,
            rate_limit_window_secs: 60,
            event_buffer: 64,
            ..Self::default()
        }
    }

    /// Set the database path
    pub fn with_db_path(mut self, path: PathBuf) -> Self {
        self.db_path = Some(path);
        self
    }

    /// Set the bot username used in links
    pub fn with_bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = username.into();
        self
    }

    /// Set the storage channel
    pub fn with_channel_id(mut self, channel_id: ChatId) -> Self {
        self.channel_id = channel_id;
        self
    }

    /// Add an operator
    pub fn with_operator(mut self, principal: i64) -> Self {
        self.operators.push(principal);
        self
    }

    /// Require membership in `channel` before retrieval
    pub fn with_force_sub_channel(mut self, channel: ChatId) -> Self {
        self.force_sub_channels.push(channel);
        self
    }

    /// Set the share code length
    pub fn with_share_code_length(mut self, length: usize) -> Self {
        self.share_code_length = length;
        self
    }

    /// Set the collision retry cap
    pub fn with_max_code_attempts(mut self, attempts: u32) -> Self {
        self.max_code_attempts = attempts;
        self
    }

    /// Set the album quiet period
    pub fn with_album_quiet_period(mut self, ms: u64) -> Self {
        self.album_quiet_period_ms = ms;
        self
    }

    /// Set the rate limit
    pub fn with_rate_limit(mut self, max: usize, window_secs: u64) -> Self {
        self.rate_limit_max = max;
        self.rate_limit_window_secs = window_secs;
        self
    }

    /// Require verification, valid for `expire_secs` once confirmed
    pub fn with_verification(mut self, expire_secs: u64) -> Self {
        self.verify_enabled = true;
        self.verify_expire_secs = expire_secs;
        self
    }

    /// Delete delivered items after `secs` (0 disables)
    pub fn with_auto_delete(mut self, secs: u64) -> Self {
        self.auto_delete_secs = secs;
        self
    }

    /// Never edit channel posts
    pub fn without_channel_button(mut self) -> Self {
        self.disable_channel_button = true;
        self
    }

    /// Set the largest selectable link range
    pub fn with_max_link_range(mut self, max: u64) -> Self {
        self.max_link_range = max;
        self
    }

    pub fn album_quiet_period(&self) -> Duration {
        Duration::from_millis(self.album_quiet_period_ms)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// Auto-delete delay, `None` when disabled
    pub fn auto_delete_delay(&self) -> Option<Duration> {
        (self.auto_delete_secs > 0).then(|| Duration::from_secs(self.auto_delete_secs))
    }

    pub fn is_operator(&self, principal: i64) -> bool {
        self.operators.contains(&principal)
    }
}
