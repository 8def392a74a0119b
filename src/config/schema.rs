//! Configuration model.
//!
//! Every field has a default so an empty file, or no file at all, yields a
//! runnable configuration once secrets are provided through the environment.

use crate::pipeline::{
    PipelineSettings, RetryPolicy, Temperatures, Thresholds, WalletPolicy,
};
use crate::scheduler::{ScheduleBounds, Span};
use anyhow::{bail, Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snow_memory::MemoryConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ── Identity ────────────────────────────────────────────────────

/// Config directory name under `$HOME`.
pub const APP_DIR_NAME: &str = ".snowpost";

/// `~/.snowpost/config.toml`, or a relative fallback without a home dir.
pub fn default_config_path() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(APP_DIR_NAME))
        .join("config.toml")
}

// ── Root ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Config {
    /// Directory holding the SQLite databases.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub nostr: NostrConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            agent: AgentConfig::default(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            memory: MemoryConfig::default(),
            nostr: NostrConfig::default(),
            wallet: WalletConfig::default(),
            thresholds: ThresholdsConfig::default(),
            scheduler: SchedulerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ── Sections ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AgentConfig {
    /// Name of the local user that authors published posts.
    #[serde(default = "default_username")]
    pub username: String,
    /// How many of our own recent posts feed the prompts.
    #[serde(default = "default_recent_posts_limit")]
    pub recent_posts_limit: usize,
    /// Publish the wallet address once at startup.
    #[serde(default)]
    pub announce_wallet: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            recent_posts_limit: default_recent_posts_limit(),
            announce_wallet: false,
        }
    }
}

/// Chat-completion provider (OpenAI-compatible).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Falls back to `OPENROUTER_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default)]
    pub temperatures: TemperatureConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: None,
            model: default_llm_model(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            temperatures: TemperatureConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct TemperatureConfig {
    #[serde(default = "default_short_term_temperature")]
    pub short_term: f32,
    #[serde(default = "default_post_temperature")]
    pub post: f32,
    #[serde(default = "default_score_temperature")]
    pub score: f32,
    #[serde(default = "default_decision_temperature")]
    pub decisions: f32,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            short_term: default_short_term_temperature(),
            post: default_post_temperature(),
            score: default_score_temperature(),
            decisions: default_decision_temperature(),
        }
    }
}

/// Embedding provider (OpenAI-compatible). The vector size is `memory.dimension`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    /// Falls back to `OPENAI_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_embedding_model")]
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_base_url(),
            api_key: None,
            model: default_embedding_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct NostrConfig {
    /// Secret key (nsec1... or hex). Falls back to `SNOWPOST_NSEC`.
    #[serde(default)]
    pub nsec: Option<String>,
    #[serde(default = "default_nostr_relays")]
    pub relays: Vec<String>,
    /// Max mentions fetched per cycle.
    #[serde(default = "default_notification_limit")]
    pub notification_limit: usize,
    /// How far back each fetch looks.
    #[serde(default = "default_lookback_secs")]
    pub lookback_secs: u64,
    /// Also read notes from followed accounts.
    #[serde(default = "default_true")]
    pub include_timeline: bool,
}

impl Default for NostrConfig {
    fn default() -> Self {
        Self {
            nsec: None,
            relays: default_nostr_relays(),
            notification_limit: default_notification_limit(),
            lookback_secs: default_lookback_secs(),
            include_timeline: true,
        }
    }
}

/// Node-managed Ethereum account reached over JSON-RPC.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct WalletConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_min_balance")]
    pub min_balance: f64,
    /// Refuse transfers to unmentioned addresses or beyond the balance.
    #[serde(default = "default_true")]
    pub enforce_balance: bool,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rpc_url: default_rpc_url(),
            address: None,
            min_balance: default_min_balance(),
            enforce_balance: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ThresholdsConfig {
    /// Store the post as a long-term memory at or above this score.
    #[serde(default = "default_persist_threshold")]
    pub persist: u8,
    /// Publish the post at or above this score.
    #[serde(default = "default_publish_threshold")]
    pub publish: u8,
    /// Follow identities scored strictly above this.
    #[serde(default = "default_follow_threshold")]
    pub follow: f64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            persist: default_persist_threshold(),
            publish: default_publish_threshold(),
            follow: default_follow_threshold(),
        }
    }
}

/// Randomised schedule bounds, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub activation_delay_min_secs: u64,
    #[serde(default = "default_activation_delay_max_secs")]
    pub activation_delay_max_secs: u64,
    #[serde(default = "default_active_min_secs")]
    pub active_min_secs: u64,
    #[serde(default = "default_active_max_secs")]
    pub active_max_secs: u64,
    #[serde(default = "default_interval_min_secs")]
    pub interval_min_secs: u64,
    #[serde(default = "default_interval_max_secs")]
    pub interval_max_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            activation_delay_min_secs: 0,
            activation_delay_max_secs: default_activation_delay_max_secs(),
            active_min_secs: default_active_min_secs(),
            active_max_secs: default_active_max_secs(),
            interval_min_secs: default_interval_min_secs(),
            interval_max_secs: default_interval_max_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn bounds(&self) -> ScheduleBounds {
        ScheduleBounds {
            activation_delay: Span::secs(
                self.activation_delay_min_secs,
                self.activation_delay_max_secs,
            ),
            active: Span::secs(self.active_min_secs, self.active_max_secs),
            interval: Span::secs(self.interval_min_secs, self.interval_max_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ── Defaults ────────────────────────────────────────────────────

fn default_data_dir() -> String {
    format!("~/{APP_DIR_NAME}")
}
fn default_username() -> String {
    "snowpost".into()
}
fn default_recent_posts_limit() -> usize {
    10
}
fn default_llm_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_llm_model() -> String {
    "meta-llama/llama-3.1-70b-instruct".into()
}
fn default_max_attempts() -> u32 {
    5
}
fn default_retry_backoff_ms() -> u64 {
    250
}
fn default_short_term_temperature() -> f32 {
    0.7
}
fn default_post_temperature() -> f32 {
    0.8
}
fn default_score_temperature() -> f32 {
    0.3
}
fn default_decision_temperature() -> f32 {
    0.7
}
fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
pub fn default_nostr_relays() -> Vec<String> {
    vec![
        "wss://relay.damus.io".to_string(),
        "wss://nos.lol".to_string(),
        "wss://relay.primal.net".to_string(),
    ]
}
fn default_notification_limit() -> usize {
    50
}
fn default_lookback_secs() -> u64 {
    86_400
}
fn default_true() -> bool {
    true
}
fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".into()
}
fn default_min_balance() -> f64 {
    0.0001
}
fn default_persist_threshold() -> u8 {
    7
}
fn default_publish_threshold() -> u8 {
    3
}
fn default_follow_threshold() -> f64 {
    0.98
}
fn default_activation_delay_max_secs() -> u64 {
    30 * 60
}
fn default_active_min_secs() -> u64 {
    15 * 60
}
fn default_active_max_secs() -> u64 {
    20 * 60
}
fn default_interval_min_secs() -> u64 {
    30
}
fn default_interval_max_secs() -> u64 {
    180
}
fn default_log_level() -> String {
    "info".into()
}

// ── Loading ─────────────────────────────────────────────────────

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).to_string();
        let content = std::fs::read_to_string(&expanded)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_fallbacks();
        Ok(config)
    }

    /// Fill unset secrets from the environment.
    pub fn apply_env_fallbacks(&mut self) {
        fill_from_env(&mut self.llm.api_key, "OPENROUTER_API_KEY");
        fill_from_env(&mut self.embedding.api_key, "OPENAI_API_KEY");
        fill_from_env(&mut self.nostr.nsec, "SNOWPOST_NSEC");
    }

    pub fn expand_paths(&mut self) {
        self.data_dir = shellexpand::tilde(&self.data_dir).to_string();
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).as_ref())
    }

    pub fn validate(&self) -> Result<()> {
        if self.nostr.relays.is_empty() {
            bail!("At least one relay is required");
        }
        for relay in &self.nostr.relays {
            if !relay.starts_with("wss://") && !relay.starts_with("ws://") {
                bail!("Relay URL must start with ws:// or wss://: {relay}");
            }
        }

        check_http_url("LLM base URL", &self.llm.base_url)?;
        check_http_url("Embedding base URL", &self.embedding.base_url)?;
        if self.wallet.enabled {
            check_http_url("Wallet RPC URL", &self.wallet.rpc_url)?;
            if self.wallet.address.as_deref().is_none_or(str::is_empty) {
                bail!("Wallet is enabled but no address is configured");
            }
        }

        let t = &self.thresholds;
        for (name, value) in [("persist", t.persist), ("publish", t.publish)] {
            if !(1..=10).contains(&value) {
                bail!("Threshold {name} must be between 1 and 10, got {value}");
            }
        }
        if !(0.0..=1.0).contains(&t.follow) {
            bail!("Follow threshold must be between 0 and 1, got {}", t.follow);
        }

        if self.llm.max_attempts == 0 {
            bail!("llm.max_attempts must be at least 1");
        }
        if self.memory.dimension == 0 {
            bail!("memory.dimension must be greater than 0");
        }
        if self.memory.top_k == 0 {
            bail!("memory.top_k must be greater than 0");
        }

        let s = &self.scheduler;
        for (name, min, max) in [
            ("activation delay", s.activation_delay_min_secs, s.activation_delay_max_secs),
            ("active window", s.active_min_secs, s.active_max_secs),
            ("run interval", s.interval_min_secs, s.interval_max_secs),
        ] {
            if min > max {
                bail!("Scheduler {name} range is inverted: {min} > {max}");
            }
        }
        if s.interval_min_secs == 0 {
            bail!("Scheduler run interval must be at least one second");
        }

        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        let temps = &self.llm.temperatures;
        PipelineSettings {
            username: self.agent.username.clone(),
            recent_posts_limit: self.agent.recent_posts_limit,
            top_k: self.memory.top_k,
            thresholds: Thresholds {
                persist: self.thresholds.persist,
                publish: self.thresholds.publish,
                follow: self.thresholds.follow,
            },
            retry: RetryPolicy::new(
                self.llm.max_attempts,
                Duration::from_millis(self.llm.retry_backoff_ms),
            ),
            temperatures: Temperatures {
                short_term: temps.short_term,
                post: temps.post,
                score: temps.score,
                decisions: temps.decisions,
            },
            wallet_policy: WalletPolicy {
                min_balance: self.wallet.min_balance,
                enforce_balance: self.wallet.enforce_balance,
            },
        }
    }
}

fn fill_from_env(slot: &mut Option<String>, var: &str) {
    if slot.as_deref().is_none_or(str::is_empty) {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                *slot = Some(value);
            }
        }
    }
}

fn check_http_url(name: &str, url: &str) -> Result<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        bail!("{name} must start with http:// or https://: {url}");
    }
    Ok(())
}
