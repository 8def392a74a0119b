//! The per-cycle state machine.

use super::aggregator::ContextAggregator;
use super::dispatcher::{ActionDispatcher, DispatchReport, WalletPolicy};
use super::generation::{GenerationTemperatures, Generator};
use super::retry::RetryPolicy;
use super::significance::SignificanceEvaluator;
use crate::error::CycleError;
use crate::platform::SocialPlatform;
use crate::providers::{Embedder, LanguageModel};
use crate::store::{IdentityStore, PostStore, SeenLedger};
use crate::wallet::Wallet;
use snow_memory::{format_memories, SqliteMemoryStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Score gates. Persist and publish compare with `>=`, follow with `>`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub persist: u8,
    pub publish: u8,
    pub follow: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            persist: 7,
            publish: 3,
            follow: 0.98,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temperatures {
    pub short_term: f32,
    pub post: f32,
    pub score: f32,
    pub decisions: f32,
}

impl Default for Temperatures {
    fn default() -> Self {
        Self {
            short_term: 0.7,
            post: 0.8,
            score: 0.3,
            decisions: 0.7,
        }
    }
}

/// Tunables for one pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub username: String,
    pub recent_posts_limit: usize,
    pub top_k: usize,
    pub thresholds: Thresholds,
    pub retry: RetryPolicy,
    pub temperatures: Temperatures,
    pub wallet_policy: WalletPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            username: "snowpost".into(),
            recent_posts_limit: 10,
            top_k: 5,
            thresholds: Thresholds::default(),
            retry: RetryPolicy::default(),
            temperatures: Temperatures::default(),
            wallet_policy: WalletPolicy::default(),
        }
    }
}

/// External capabilities, injected once for the process lifetime.
#[derive(Clone)]
pub struct Capabilities {
    pub llm: Arc<dyn LanguageModel>,
    pub embedder: Arc<dyn Embedder>,
    pub platform: Arc<dyn SocialPlatform>,
    pub wallet: Arc<dyn Wallet>,
}

/// Durable stores shared across cycles.
#[derive(Clone)]
pub struct Stores {
    pub seen: Arc<dyn SeenLedger>,
    pub posts: Arc<PostStore>,
    pub identities: Arc<IdentityStore>,
    pub memory: Arc<SqliteMemoryStore>,
}

/// What one successful cycle did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub novel_notifications: usize,
    pub dispatch: Option<DispatchReport>,
    pub short_term_memory: String,
    pub post: String,
    pub score: u8,
    /// Long-term memory id when the post cleared the persist gate.
    pub memory_id: Option<i64>,
    /// Local post id when the post cleared the publish gate.
    pub post_id: Option<i64>,
    pub external_id: Option<String>,
}

pub struct Pipeline {
    settings: PipelineSettings,
    capabilities: Capabilities,
    stores: Stores,
    aggregator: ContextAggregator,
    generator: Generator,
    evaluator: SignificanceEvaluator,
    dispatcher: ActionDispatcher,
}

impl Pipeline {
    pub fn new(settings: PipelineSettings, capabilities: Capabilities, stores: Stores) -> Self {
        let aggregator = ContextAggregator::new(
            stores.seen.clone(),
            capabilities.platform.own_identity(),
            settings.username.clone(),
        );
        let generator = Generator::new(
            capabilities.llm.clone(),
            settings.retry,
            GenerationTemperatures {
                short_term: settings.temperatures.short_term,
                post: settings.temperatures.post,
            },
            settings.username.clone(),
        );
        let evaluator = SignificanceEvaluator::new(
            capabilities.llm.clone(),
            settings.retry,
            settings.temperatures.score,
        );
        let dispatcher = ActionDispatcher::new(
            capabilities.llm.clone(),
            capabilities.wallet.clone(),
            capabilities.platform.clone(),
            stores.identities.clone(),
            settings.retry,
            settings.temperatures.decisions,
            settings.thresholds.follow,
            settings.wallet_policy,
        );

        Self {
            settings,
            capabilities,
            stores,
            aggregator,
            generator,
            evaluator,
            dispatcher,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run one cycle. Any error aborts this cycle only.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let recent_posts = self
            .stores
            .posts
            .recent(self.settings.recent_posts_limit)
            .map_err(CycleError::Store)?;
        let notifications = self
            .capabilities
            .platform
            .fetch_notifications()
            .await
            .map_err(CycleError::Fetch)?;

        let context = self.aggregator.aggregate(recent_posts, notifications);
        info!(novel = context.novel.len(), "Context aggregated");

        let dispatch = if context.has_new_notifications() {
            Some(self.dispatcher.dispatch(&context).await)
        } else {
            None
        };

        let short_term_memory = self.generator.generate_short_term_memory(&context).await?;

        let query = self.capabilities.embedder.embed(&short_term_memory).await?;
        let recalled = self.stores.memory.rank(&query, self.settings.top_k)?;
        debug!(recalled = recalled.len(), "Recalled long-term memories");
        let long_term_memories = format_memories(&recalled);

        let post = self
            .generator
            .generate_post(
                &short_term_memory,
                &long_term_memories,
                &context.recent_posts,
                &context,
            )
            .await?;

        let score = self.evaluator.score(&post).await?;
        info!(score, "Post scored");

        let thresholds = self.settings.thresholds;
        let memory_id = if score >= thresholds.persist {
            let embedding = self.capabilities.embedder.embed(&post).await?;
            let id = self
                .stores
                .memory
                .store(&post, &embedding, f64::from(score))?;
            info!(memory_id = id, "Stored long-term memory");
            Some(id)
        } else {
            None
        };

        let (post_id, external_id) = if score >= thresholds.publish {
            let (post_id, external_id) = self.publish(&post).await?;
            (Some(post_id), Some(external_id))
        } else {
            debug!(score, publish = thresholds.publish, "Post below publish threshold");
            (None, None)
        };

        Ok(CycleReport {
            novel_notifications: context.novel.len(),
            dispatch,
            short_term_memory,
            post,
            score,
            memory_id,
            post_id,
            external_id,
        })
    }

    /// Record the post locally, publish it, then attach the platform id.
    async fn publish(&self, content: &str) -> Result<(i64, String), CycleError> {
        let posts = &self.stores.posts;
        let user = posts
            .user_by_name_or_create(&self.settings.username)
            .map_err(CycleError::Store)?;
        let post_id = posts.insert_post(&user, content).map_err(CycleError::Store)?;

        let external_id = self
            .capabilities
            .platform
            .publish(content)
            .await
            .map_err(CycleError::Publish)?;
        posts
            .set_external_id(post_id, &external_id)
            .map_err(CycleError::Store)?;

        info!(post_id, external_id = %external_id, "Published post");
        Ok((post_id, external_id))
    }

    /// Score, embed, and store each non-empty line as a long-term memory.
    ///
    /// Lines that fail are logged and skipped. Returns how many were stored.
    pub async fn seed<'a>(&self, lines: impl IntoIterator<Item = &'a str>) -> usize {
        let mut stored = 0;
        for line in lines.into_iter().map(str::trim).filter(|l| !l.is_empty()) {
            let score = match self.evaluator.score(line).await {
                Ok(score) => score,
                Err(e) => {
                    warn!("Skipping seed line: {e}");
                    continue;
                }
            };
            let embedding = match self.capabilities.embedder.embed(line).await {
                Ok(embedding) => embedding,
                Err(e) => {
                    warn!("Skipping seed line, embedding failed: {e}");
                    continue;
                }
            };
            match self.stores.memory.store(line, &embedding, f64::from(score)) {
                Ok(id) => {
                    debug!(memory_id = id, score, "Seeded memory");
                    stored += 1;
                }
                Err(e) => warn!("Skipping seed line, store failed: {e}"),
            }
        }
        info!(stored, "Seeding finished");
        stored
    }

    /// Publish the wallet address once, if there is one.
    pub async fn announce_wallet(&self) -> anyhow::Result<Option<String>> {
        let Some(address) = self.capabilities.wallet.address() else {
            return Ok(None);
        };
        let external_id = self
            .capabilities
            .platform
            .publish(&format!("My wallet is {address}"))
            .await?;
        info!(external_id = %external_id, "Announced wallet address");
        Ok(Some(external_id))
    }
}
