//! Action dispatcher: LLM-driven transfer and follow decisions.

use super::aggregator::Context;
use super::decision::{
    guard_transfers, parse_follow_scores, parse_transfers, DecisionOutcome, FollowReport,
    TransferReport,
};
use super::prompts;
use super::retry::{with_retries, RetryPolicy};
use crate::platform::SocialPlatform;
use crate::providers::{CompletionRequest, LanguageModel};
use crate::store::IdentityStore;
use crate::wallet::Wallet;
use nostr_core::{detect_addresses, detect_handles};
use std::sync::Arc;
use tracing::{info, warn};

/// Balance rules for the transfer decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalletPolicy {
    /// Below this balance the transfer decision is skipped.
    pub min_balance: f64,
    /// Refuse proposals that overspend or target unmentioned addresses.
    pub enforce_balance: bool,
}

impl Default for WalletPolicy {
    fn default() -> Self {
        Self {
            min_balance: 0.0001,
            enforce_balance: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub transfer: DecisionOutcome<TransferReport>,
    pub follow: DecisionOutcome<FollowReport>,
}

pub struct ActionDispatcher {
    llm: Arc<dyn LanguageModel>,
    wallet: Arc<dyn Wallet>,
    platform: Arc<dyn SocialPlatform>,
    identities: Arc<IdentityStore>,
    policy: RetryPolicy,
    temperature: f32,
    follow_threshold: f64,
    wallet_policy: WalletPolicy,
}

impl ActionDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        wallet: Arc<dyn Wallet>,
        platform: Arc<dyn SocialPlatform>,
        identities: Arc<IdentityStore>,
        policy: RetryPolicy,
        temperature: f32,
        follow_threshold: f64,
        wallet_policy: WalletPolicy,
    ) -> Self {
        Self {
            llm,
            wallet,
            platform,
            identities,
            policy,
            temperature,
            follow_threshold,
            wallet_policy,
        }
    }

    /// Run both sub-decisions. Neither can fail the caller.
    pub async fn dispatch(&self, context: &Context) -> DispatchReport {
        let transfer = self.decide_transfers(context).await;
        log_outcome("transfer", &transfer);
        let follow = self.decide_follows(context).await;
        log_outcome("follow", &follow);
        DispatchReport { transfer, follow }
    }

    pub async fn decide_transfers(&self, context: &Context) -> DecisionOutcome<TransferReport> {
        let text = context.notification_text();
        let addresses = detect_addresses(&text);
        if addresses.is_empty() {
            return DecisionOutcome::Skipped("no addresses mentioned".into());
        }

        let balance = match self.wallet.balance().await {
            Ok(balance) => balance,
            Err(e) => return DecisionOutcome::Skipped(format!("balance unavailable: {e:#}")),
        };
        if balance < self.wallet_policy.min_balance {
            return DecisionOutcome::Skipped(format!(
                "balance {balance} is below minimum {}",
                self.wallet_policy.min_balance
            ));
        }

        let request = CompletionRequest::new(
            prompts::transfer_decision(&text, &addresses, balance),
            self.temperature,
        );
        let llm = self.llm.as_ref();
        let proposals = match with_retries(self.policy, "transfer decision", |_| {
            let request = &request;
            async move { parse_transfers(&llm.complete(request).await?) }
        })
        .await
        {
            Ok(proposals) => proposals,
            Err(e) => return DecisionOutcome::Abandoned(e.to_string()),
        };

        let (approved, rejected) = guard_transfers(
            &proposals,
            &addresses,
            balance,
            self.wallet_policy.enforce_balance,
        );
        for r in &rejected {
            warn!(address = %r.proposal.address, amount = r.proposal.amount, "Transfer refused: {}", r.reason);
        }

        let mut report = TransferReport {
            proposed: proposals.len(),
            rejected,
            ..Default::default()
        };
        for proposal in approved {
            match self
                .wallet
                .transfer(proposal.address.trim(), proposal.amount)
                .await
            {
                Ok(tx) => {
                    info!(address = %proposal.address, amount = proposal.amount, tx = %tx, "Transfer sent");
                    report.sent.push((proposal, tx));
                }
                Err(e) => {
                    warn!(address = %proposal.address, amount = proposal.amount, "Transfer failed: {e:#}");
                    report.failed.push((proposal, format!("{e:#}")));
                }
            }
        }
        DecisionOutcome::Completed(report)
    }

    pub async fn decide_follows(&self, context: &Context) -> DecisionOutcome<FollowReport> {
        let text = context.notification_text();
        let own = self.platform.own_identity();

        let candidates: Vec<String> = detect_handles(&text)
            .into_iter()
            .filter(|h| *h != own)
            .filter(|h| match self.identities.is_known(h) {
                Ok(known) => !known,
                Err(e) => {
                    warn!(identity = %h, "Identity lookup failed, treating as new: {e:#}");
                    true
                }
            })
            .collect();
        if candidates.is_empty() {
            return DecisionOutcome::Skipped("no new identities".into());
        }

        let request = CompletionRequest::new(
            prompts::follow_decision(&text, &candidates),
            self.temperature,
        );
        let llm = self.llm.as_ref();
        let scores = match with_retries(self.policy, "follow decision", |_| {
            let request = &request;
            async move { parse_follow_scores(&llm.complete(request).await?) }
        })
        .await
        {
            Ok(scores) => scores,
            Err(e) => return DecisionOutcome::Abandoned(e.to_string()),
        };

        let mut report = FollowReport::default();
        for scored in scores {
            let identity = scored.identity.trim().trim_start_matches('@');
            if !candidates.iter().any(|c| c == identity) {
                warn!(identity, "Ignoring score for an identity that was not offered");
                continue;
            }
            report.evaluated += 1;

            let mut followed = false;
            if scored.score > self.follow_threshold {
                match self.platform.follow(identity).await {
                    Ok(()) => {
                        info!(identity, score = scored.score, "Followed");
                        followed = true;
                        report.followed.push(identity.to_string());
                    }
                    Err(e) => {
                        warn!(identity, "Follow failed: {e:#}");
                        report.failed.push((identity.to_string(), format!("{e:#}")));
                    }
                }
            }

            if let Err(e) = self
                .identities
                .record_evaluation(identity, scored.score, followed)
            {
                warn!(identity, "Failed to record evaluation: {e:#}");
            }
        }
        DecisionOutcome::Completed(report)
    }
}

fn log_outcome<R: std::fmt::Debug>(decision: &str, outcome: &DecisionOutcome<R>) {
    match outcome {
        DecisionOutcome::Completed(report) => info!(decision, ?report, "Decision completed"),
        DecisionOutcome::Skipped(reason) => info!(decision, reason = %reason, "Decision skipped"),
        DecisionOutcome::Abandoned(reason) => {
            warn!(decision, reason = %reason, "Decision abandoned")
        }
    }
}
