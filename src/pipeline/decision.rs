//! Structured LLM decisions: strict schemas, parsing, and outcomes.

use crate::error::AttemptError;
use serde::{Deserialize, Serialize};

/// Result of one dispatcher sub-decision. Never escalates to the cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionOutcome<R> {
    /// The decision ran; the report says what happened.
    Completed(R),
    /// Preconditions were not met, so the LLM was not consulted.
    Skipped(String),
    /// The LLM never produced a usable answer within the retry budget.
    Abandoned(String),
}

impl<R> DecisionOutcome<R> {
    pub fn label(&self) -> &'static str {
        match self {
            DecisionOutcome::Completed(_) => "completed",
            DecisionOutcome::Skipped(_) => "skipped",
            DecisionOutcome::Abandoned(_) => "abandoned",
        }
    }

    pub fn report(&self) -> Option<&R> {
        match self {
            DecisionOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferProposal {
    pub address: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowScore {
    #[serde(alias = "username", alias = "handle")]
    pub identity: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedTransfer {
    pub proposal: TransferProposal,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransferReport {
    pub proposed: usize,
    /// `(proposal, tx reference)` for each transfer the wallet accepted.
    pub sent: Vec<(TransferProposal, String)>,
    /// Proposals the balance guard refused to execute.
    pub rejected: Vec<RejectedTransfer>,
    /// `(proposal, error)` for transfers the wallet failed.
    pub failed: Vec<(TransferProposal, String)>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FollowReport {
    pub evaluated: usize,
    pub followed: Vec<String>,
    /// `(identity, error)` for follows the platform failed.
    pub failed: Vec<(String, String)>,
}

/// Slice out the JSON array in an LLM reply, tolerating code fences and
/// surrounding prose.
pub fn extract_json_array(text: &str) -> Result<&str, AttemptError> {
    let start = text
        .find('[')
        .ok_or_else(|| AttemptError::Malformed("no JSON array in response".into()))?;
    let end = text
        .rfind(']')
        .filter(|&end| end > start)
        .ok_or_else(|| AttemptError::Malformed("unterminated JSON array".into()))?;
    Ok(&text[start..=end])
}

/// Parse `[{"address": ..., "amount": ...}]`.
pub fn parse_transfers(text: &str) -> Result<Vec<TransferProposal>, AttemptError> {
    let proposals: Vec<TransferProposal> = serde_json::from_str(extract_json_array(text)?)
        .map_err(|e| AttemptError::Malformed(e.to_string()))?;

    for p in &proposals {
        if p.address.trim().is_empty() {
            return Err(AttemptError::Malformed("transfer with empty address".into()));
        }
        if !p.amount.is_finite() || p.amount <= 0.0 {
            return Err(AttemptError::Malformed(format!(
                "transfer to {} has invalid amount {}",
                p.address, p.amount
            )));
        }
    }
    Ok(proposals)
}

/// Parse `[{"identity": ..., "score": ...}]` with scores in [0, 1].
pub fn parse_follow_scores(text: &str) -> Result<Vec<FollowScore>, AttemptError> {
    let scores: Vec<FollowScore> = serde_json::from_str(extract_json_array(text)?)
        .map_err(|e| AttemptError::Malformed(e.to_string()))?;

    for s in &scores {
        if s.identity.trim().is_empty() {
            return Err(AttemptError::Malformed("score with empty identity".into()));
        }
        if !s.score.is_finite() || !(0.0..=1.0).contains(&s.score) {
            return Err(AttemptError::Malformed(format!(
                "score {} for {} is outside [0, 1]",
                s.score, s.identity
            )));
        }
    }
    Ok(scores)
}

/// Split proposals into those allowed to execute and those refused.
///
/// With `enforce` set, a proposal is refused when its address was not among
/// `detected`, or when it would take the running total past `balance`.
/// Without it every proposal passes.
pub fn guard_transfers(
    proposals: &[TransferProposal],
    detected: &[String],
    balance: f64,
    enforce: bool,
) -> (Vec<TransferProposal>, Vec<RejectedTransfer>) {
    if !enforce {
        return (proposals.to_vec(), Vec::new());
    }

    let mut approved = Vec::new();
    let mut rejected = Vec::new();
    let mut committed = 0.0;

    for proposal in proposals {
        let address = proposal.address.trim();
        if !detected.iter().any(|d| d.eq_ignore_ascii_case(address)) {
            rejected.push(RejectedTransfer {
                proposal: proposal.clone(),
                reason: "address was not mentioned in notifications".into(),
            });
            continue;
        }
        if committed + proposal.amount > balance {
            rejected.push(RejectedTransfer {
                proposal: proposal.clone(),
                reason: format!(
                    "would exceed balance ({} committed of {balance})",
                    committed
                ),
            });
            continue;
        }
        committed += proposal.amount;
        approved.push(proposal.clone());
    }
    (approved, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal(address: &str, amount: f64) -> TransferProposal {
        TransferProposal {
            address: address.into(),
            amount,
        }
    }

    #[test]
    fn parses_fenced_transfer_list() {
        let text = "Sure!\n```json\n[{\"address\": \"0xabc\", \"amount\": 0.5}]\n```";
        assert_eq!(parse_transfers(text).unwrap(), vec![proposal("0xabc", 0.5)]);
    }

    #[test]
    fn empty_list_is_valid() {
        assert!(parse_transfers("[]").unwrap().is_empty());
        assert!(parse_follow_scores(" [ ] ").unwrap().is_empty());
    }

    #[test]
    fn missing_keys_and_bad_values_are_malformed() {
        assert!(matches!(
            parse_transfers("[{\"address\": \"0xabc\"}]"),
            Err(AttemptError::Malformed(_))
        ));
        assert!(matches!(
            parse_transfers("[{\"address\": \"0xabc\", \"amount\": -1}]"),
            Err(AttemptError::Malformed(_))
        ));
        assert!(matches!(
            parse_transfers("[{\"address\": \"  \", \"amount\": 1}]"),
            Err(AttemptError::Malformed(_))
        ));
        assert!(matches!(
            parse_transfers("no thanks"),
            Err(AttemptError::Malformed(_))
        ));
        assert!(matches!(
            parse_follow_scores("[{\"identity\": \"bob\", \"score\": 1.5}]"),
            Err(AttemptError::Malformed(_))
        ));
    }

    #[test]
    fn follow_scores_accept_username_alias() {
        let scores = parse_follow_scores("[{\"username\": \"alice\", \"score\": 0.99}]").unwrap();
        assert_eq!(scores[0].identity, "alice");
    }

    #[test]
    fn guard_stops_overspending() {
        let detected = vec!["0xA".to_string(), "0xB".to_string(), "0xC".to_string()];
        let proposals = vec![
            proposal("0xa", 0.6),
            proposal("0xB", 0.6),
            proposal("0xC", 0.3),
        ];

        let (approved, rejected) = guard_transfers(&proposals, &detected, 1.0, true);
        assert_eq!(approved, vec![proposal("0xa", 0.6), proposal("0xC", 0.3)]);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].proposal.address, "0xB");
        let total: f64 = approved.iter().map(|p| p.amount).sum();
        assert!(total <= 1.0);
    }

    #[test]
    fn guard_refuses_unmentioned_addresses() {
        let (approved, rejected) =
            guard_transfers(&[proposal("0xEVIL", 0.1)], &["0xA".to_string()], 10.0, true);
        assert!(approved.is_empty());
        assert_eq!(rejected.len(), 1);
    }

    #[test]
    fn soft_mode_passes_everything() {
        let proposals = vec![proposal("0xA", 5.0), proposal("0xB", 5.0)];
        let (approved, rejected) = guard_transfers(&proposals, &[], 1.0, false);
        assert_eq!(approved.len(), 2);
        assert!(rejected.is_empty());
    }
}
