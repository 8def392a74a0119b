//! The memory-and-decision pipeline.

pub mod aggregator;
pub mod decision;
pub mod dispatcher;
pub mod generation;
pub mod orchestrator;
pub mod prompts;
pub mod retry;
pub mod significance;

pub use aggregator::{Context, ContextAggregator};
pub use decision::{DecisionOutcome, FollowReport, TransferProposal, TransferReport};
pub use dispatcher::{ActionDispatcher, DispatchReport, WalletPolicy};
pub use orchestrator::{
    Capabilities, CycleReport, Pipeline, PipelineSettings, Stores, Temperatures, Thresholds,
};
pub use retry::RetryPolicy;
