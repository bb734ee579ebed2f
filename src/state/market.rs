use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Whether a market currently accepts new bets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Active,
    Suspended,
}

/// One bettable outcome within a round (e.g. "Dragon wins").
/// Replaced wholesale on every snapshot; only `id` is stable within a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    /// Opaque id, unique within a round
    pub id: String,
    /// Display name of the selection
    pub label: String,
    /// Decimal odds (>= 1.0)
    pub price: Decimal,
    pub status: MarketStatus,
    #[serde(default)]
    pub min_stake: Option<Decimal>,
    #[serde(default)]
    pub max_stake: Option<Decimal>,
}

impl Market {
    pub fn is_suspended(&self) -> bool {
        self.status == MarketStatus::Suspended
    }

    /// Check a stake against the optional min/max bounds (inclusive).
    pub fn stake_in_range(&self, stake: Decimal) -> bool {
        let above_min = self.min_stake.map_or(true, |min| stake >= min);
        let below_max = self.max_stake.map_or(true, |max| stake <= max);
        above_min && below_max
    }
}

/// Lifecycle phase of a round as reported by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundPhase {
    #[serde(alias = "open")]
    Betting,
    Suspended,
    Settled,
}

/// Round identity plus its current phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub id: String,
    pub phase: RoundPhase,
}

/// A full live-market snapshot for one round, as delivered by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub round_id: String,
    pub phase: RoundPhase,
    #[serde(default)]
    pub markets: Vec<Market>,
}

impl Snapshot {
    pub fn round(&self) -> Round {
        Round {
            id: self.round_id.clone(),
            phase: self.phase,
        }
    }
}
