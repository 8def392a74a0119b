//! Shared fakes for the integration tests.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use nostr_core::{Notification, Origin};
use parking_lot::Mutex;
use snow_memory::SqliteMemoryStore;
use snowpost::pipeline::{Capabilities, Pipeline, PipelineSettings, RetryPolicy, Stores};
use snowpost::platform::SocialPlatform;
use snowpost::providers::{CompletionRequest, Embedder, LanguageModel, ProviderError};
use snowpost::store::{IdentityStore, PostStore, SeenNotificationStore};
use snowpost::wallet::Wallet;
use std::collections::VecDeque;
use std::sync::Arc;
use tempfile::TempDir;

pub const DIMENSION: usize = 8;
pub const OWN_NPUB: &str = "npub1snowpostagent";
pub const WALLET_ADDRESS: &str = "0x00000000000000000000000000000000000000aa";

/// Answers completions from a queue, in call order. An exhausted queue
/// behaves like a provider returning nothing.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, reply: &str) {
        self.replies.lock().push_back(reply.to_string());
    }

    /// Every prompt seen so far, messages joined with newlines.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().push(prompt);
        self.replies
            .lock()
            .pop_front()
            .ok_or(ProviderError::EmptyResponse)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Byte-bucket embedding: same text, same vector; never all zeros.
pub struct HashEmbedder {
    pub dimension: usize,
    pub calls: Mutex<Vec<String>>,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: Mutex::new(Vec::new()),
        }
    }
}

pub fn embed_text(text: &str, dimension: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dimension];
    v[0] = 1.0;
    for (i, b) in text.bytes().enumerate() {
        v[i % dimension] += f32::from(b) / 255.0;
    }
    v
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.lock().push(text.to_string());
        Ok(embed_text(text, self.dimension))
    }
}

/// In-memory platform that records what the agent does.
pub struct RecordingPlatform {
    pub notifications: Mutex<Vec<Notification>>,
    pub published: Mutex<Vec<String>>,
    pub follows: Mutex<Vec<String>>,
    pub fail_fetch: Mutex<bool>,
    pub fail_publish: Mutex<bool>,
    pub fail_follow: Mutex<bool>,
}

impl RecordingPlatform {
    pub fn new(notifications: Vec<Notification>) -> Self {
        Self {
            notifications: Mutex::new(notifications),
            published: Mutex::new(Vec::new()),
            follows: Mutex::new(Vec::new()),
            fail_fetch: Mutex::new(false),
            fail_publish: Mutex::new(false),
            fail_follow: Mutex::new(false),
        }
    }

    pub fn published(&self) -> Vec<String> {
        self.published.lock().clone()
    }

    pub fn follows(&self) -> Vec<String> {
        self.follows.lock().clone()
    }
}

#[async_trait]
impl SocialPlatform for RecordingPlatform {
    async fn fetch_notifications(&self) -> Result<Vec<Notification>> {
        if *self.fail_fetch.lock() {
            anyhow::bail!("relay unreachable");
        }
        Ok(self.notifications.lock().clone())
    }

    async fn publish(&self, content: &str) -> Result<String> {
        if *self.fail_publish.lock() {
            anyhow::bail!("publish rejected");
        }
        let mut published = self.published.lock();
        published.push(content.to_string());
        Ok(format!("event-{}", published.len()))
    }

    async fn follow(&self, identity: &str) -> Result<()> {
        if *self.fail_follow.lock() {
            anyhow::bail!("cannot resolve {identity}");
        }
        self.follows.lock().push(identity.to_string());
        Ok(())
    }

    fn own_identity(&self) -> String {
        OWN_NPUB.to_string()
    }
}

/// Wallet with a fixed balance that records transfers.
pub struct RecordingWallet {
    pub balance: f64,
    pub transfers: Mutex<Vec<(String, f64)>>,
    pub fail_transfers: bool,
}

impl RecordingWallet {
    pub fn new(balance: f64) -> Self {
        Self {
            balance,
            transfers: Mutex::new(Vec::new()),
            fail_transfers: false,
        }
    }

    pub fn transfers(&self) -> Vec<(String, f64)> {
        self.transfers.lock().clone()
    }

    pub fn total_sent(&self) -> f64 {
        self.transfers.lock().iter().map(|(_, amount)| amount).sum()
    }
}

#[async_trait]
impl Wallet for RecordingWallet {
    async fn balance(&self) -> Result<f64> {
        Ok(self.balance)
    }

    async fn transfer(&self, target: &str, amount: f64) -> Result<String> {
        if self.fail_transfers {
            anyhow::bail!("node refused transaction");
        }
        let mut transfers = self.transfers.lock();
        transfers.push((target.to_string(), amount));
        Ok(format!("0xtx{}", transfers.len()))
    }

    fn address(&self) -> Option<&str> {
        Some(WALLET_ADDRESS)
    }
}

pub fn notification(id: &str, author: &str, content: &str, created_at: u64) -> Notification {
    Notification {
        external_id: id.to_string(),
        author: author.to_string(),
        content: content.to_string(),
        parent_ref: None,
        origin: Origin::Mention,
        created_at,
    }
}

/// A pipeline over fakes, with real SQLite stores in a temp dir.
pub struct Harness {
    pub pipeline: Pipeline,
    pub llm: Arc<ScriptedLlm>,
    pub embedder: Arc<HashEmbedder>,
    pub platform: Arc<RecordingPlatform>,
    pub wallet: Arc<RecordingWallet>,
    pub posts: Arc<PostStore>,
    pub identities: Arc<IdentityStore>,
    pub memory: Arc<SqliteMemoryStore>,
    pub dir: TempDir,
}

pub fn settings() -> PipelineSettings {
    PipelineSettings {
        username: "snowpost".into(),
        retry: RetryPolicy::immediate(3),
        ..PipelineSettings::default()
    }
}

pub fn harness(replies: &[&str], notifications: Vec<Notification>, balance: f64) -> Harness {
    harness_with(settings(), replies, notifications, balance)
}

pub fn harness_with(
    settings: PipelineSettings,
    replies: &[&str],
    notifications: Vec<Notification>,
    balance: f64,
) -> Harness {
    let dir = TempDir::new().unwrap();
    let llm = Arc::new(ScriptedLlm::new(replies.iter().copied()));
    let embedder = Arc::new(HashEmbedder::new(DIMENSION));
    let platform = Arc::new(RecordingPlatform::new(notifications));
    let wallet = Arc::new(RecordingWallet::new(balance));
    let posts = Arc::new(PostStore::open(dir.path()).unwrap());
    let identities = Arc::new(IdentityStore::open(dir.path()).unwrap());
    let memory = Arc::new(SqliteMemoryStore::open_in_memory(DIMENSION).unwrap());
    let seen = Arc::new(SeenNotificationStore::open(dir.path()).unwrap());

    let pipeline = Pipeline::new(
        settings,
        Capabilities {
            llm: llm.clone(),
            embedder: embedder.clone(),
            platform: platform.clone(),
            wallet: wallet.clone(),
        },
        Stores {
            seen,
            posts: posts.clone(),
            identities: identities.clone(),
            memory: memory.clone(),
        },
    );

    Harness {
        pipeline,
        llm,
        embedder,
        platform,
        wallet,
        posts,
        identities,
        memory,
        dir,
    }
}
