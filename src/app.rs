//! Wire concrete capabilities and stores from a [`Config`].

use crate::config::Config;
use crate::pipeline::{Capabilities, Pipeline, Stores};
use crate::platform::NostrPlatform;
use crate::providers::{OpenAiChat, OpenAiEmbedder};
use crate::store::{IdentityStore, PostStore, SeenNotificationStore};
use crate::wallet::{DisabledWallet, JsonRpcWallet, Wallet};
use anyhow::{Context, Result};
use nostr_core::nostr_sdk::Keys;
use nostr_core::RelayClient;
use snow_memory::SqliteMemoryStore;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub const MEMORY_DB: &str = "memory.db";

/// Parse the configured secret key.
pub fn load_keys(config: &Config) -> Result<Keys> {
    let nsec = config
        .nostr
        .nsec
        .as_deref()
        .filter(|s| !s.is_empty())
        .context("No Nostr secret key: set nostr.nsec or SNOWPOST_NSEC")?;
    Keys::parse(nsec).context("Failed to parse Nostr secret key")
}

/// Open every local store under `data_dir`, creating it if needed.
pub fn open_stores(config: &Config, data_dir: &Path) -> Result<Stores> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;

    let seen = SeenNotificationStore::open(data_dir)?;
    let warmed = seen.load_recent()?;
    info!(warmed, "Seen-notification cache loaded");

    let memory = SqliteMemoryStore::open(&data_dir.join(MEMORY_DB), config.memory.dimension)
        .context("Failed to open memory store")?;

    Ok(Stores {
        seen: Arc::new(seen),
        posts: Arc::new(PostStore::open(data_dir)?),
        identities: Arc::new(IdentityStore::open(data_dir)?),
        memory: Arc::new(memory),
    })
}

pub fn build_wallet(config: &Config) -> Result<Arc<dyn Wallet>> {
    if !config.wallet.enabled {
        return Ok(Arc::new(DisabledWallet));
    }
    let address = config
        .wallet
        .address
        .as_deref()
        .context("Wallet is enabled but no address is configured")?;
    Ok(Arc::new(JsonRpcWallet::new(&config.wallet.rpc_url, address)?))
}

/// Connect to relays and providers and assemble the pipeline.
pub async fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let keys = load_keys(config)?;
    let relay = RelayClient::new(keys, config.nostr.relays.clone())
        .await
        .context("Failed to connect to relays")?;
    info!(npub = %relay.npub(), "Loaded identity");

    let platform = NostrPlatform::new(
        relay,
        config.nostr.notification_limit,
        config.nostr.lookback_secs,
        config.nostr.include_timeline,
    );
    let llm = OpenAiChat::new(&config.llm.base_url, &config.llm.model, config.llm.api_key.clone())?;
    let embedder = OpenAiEmbedder::new(
        &config.embedding.base_url,
        &config.embedding.model,
        config.embedding.api_key.clone(),
    )?;

    let capabilities = Capabilities {
        llm: Arc::new(llm),
        embedder: Arc::new(embedder),
        platform: Arc::new(platform),
        wallet: build_wallet(config)?,
    };
    let stores = open_stores(config, &config.data_dir())?;

    Ok(Pipeline::new(config.pipeline_settings(), capabilities, stores))
}
