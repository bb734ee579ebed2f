use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{BetPlacer, PlacementRequest};
use crate::error::PlacementError;
use crate::state::Selection;

/// What happens to the slip after a batch with failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Slip is cleared whatever the outcome; failures are only reported
    #[default]
    ClearAll,
    /// Failed selections go back into the slip for retry (same round only)
    RetainFailed,
}

/// Result of one placement call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum Outcome {
    Placed { bet_id: Option<String> },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub selection: Selection,
    pub outcome: Outcome,
}

impl ItemOutcome {
    pub fn is_placed(&self) -> bool {
        matches!(self.outcome, Outcome::Placed { .. })
    }
}

/// Per-selection outcomes of one submit, in slip order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReport {
    pub round_id: String,
    pub items: Vec<ItemOutcome>,
    pub submitted_at: DateTime<Utc>,
}

impl SubmissionReport {
    pub fn placed_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_placed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.items.len() - self.placed_count()
    }

    pub fn all_placed(&self) -> bool {
        self.failed_count() == 0
    }

    /// One line per failure: which market and why.
    pub fn failure_reasons(&self) -> Vec<String> {
        self.items
            .iter()
            .filter_map(|item| match &item.outcome {
                Outcome::Failed { reason } => Some(format!(
                    "{} ({}): {}",
                    item.selection.market_id, item.selection.label, reason
                )),
                Outcome::Placed { .. } => None,
            })
            .collect()
    }

    pub fn failed_selections(&self) -> impl Iterator<Item = &Selection> {
        self.items
            .iter()
            .filter(|i| !i.is_placed())
            .map(|i| &i.selection)
    }
}

/// Selections taken out of the slip, bound to the round they were built in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBatch {
    pub round_id: String,
    pub selections: Vec<Selection>,
}

impl PendingBatch {
    /// Place every selection, one call at a time, in slip order.
    /// A failed call never stops the rest; nothing is retried here.
    pub async fn run(self, placer: &dyn BetPlacer) -> SubmissionReport {
        let submitted_at = Utc::now();
        let mut items = Vec::with_capacity(self.selections.len());

        for selection in self.selections {
            let request = PlacementRequest {
                market_id: selection.market_id.clone(),
                round_id: self.round_id.clone(),
                label: selection.label.clone(),
                price: selection.price,
                stake: selection.stake,
            };

            let outcome = match placer.place_bet(&request).await {
                Ok(receipt) => {
                    info!(
                        round_id = %self.round_id,
                        market_id = %selection.market_id,
                        stake = %selection.stake,
                        price = %selection.price,
                        bet_id = ?receipt.bet_id,
                        "bet placed"
                    );
                    Outcome::Placed {
                        bet_id: receipt.bet_id,
                    }
                }
                Err(err) => {
                    if let PlacementError::Transport { detail } = &err {
                        warn!(market_id = %selection.market_id, %detail, "placement transport failure");
                    }
                    warn!(
                        round_id = %self.round_id,
                        market_id = %selection.market_id,
                        stake = %selection.stake,
                        reason = %err,
                        "bet failed"
                    );
                    Outcome::Failed {
                        reason: err.to_string(),
                    }
                }
            };

            items.push(ItemOutcome { selection, outcome });
        }

        SubmissionReport {
            round_id: self.round_id,
            items,
            submitted_at,
        }
    }
}
