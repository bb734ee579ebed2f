use rust_decimal::Decimal;
use thiserror::Error;

/// Why a market refused a new bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosedReason {
    /// The market itself is suspended
    MarketSuspended,
    /// The whole round is suspended
    RoundSuspended,
    /// The round has settled and the next one has not opened yet
    RoundSettling,
}

impl std::fmt::Display for ClosedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MarketSuspended => "market suspended",
            Self::RoundSuspended => "round suspended",
            Self::RoundSettling => "round settling",
        };
        f.write_str(s)
    }
}

/// Rejections from the session API. All are recoverable; none touch the slip.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("market {market_id} is no longer available")]
    MarketGone { market_id: String },

    #[error("betting closed{}: {reason}", format_market(.market_id))]
    BettingClosed {
        /// None when the whole round is closed
        market_id: Option<String>,
        reason: ClosedReason,
    },

    #[error("stake {stake} on market {market_id} outside allowed range {}", format_bounds(.min, .max))]
    StakeOutOfRange {
        market_id: String,
        stake: Decimal,
        min: Option<Decimal>,
        max: Option<Decimal>,
    },

    /// Non-positive, or too large for the slip totals to be represented
    #[error("invalid stake {value}: must be positive and small enough to total")]
    InvalidStake { value: Decimal },
}

fn format_market(market_id: &Option<String>) -> String {
    market_id
        .as_ref()
        .map(|id| format!(" on market {}", id))
        .unwrap_or_default()
}

fn format_bounds(min: &Option<Decimal>, max: &Option<Decimal>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("[{}, {}]", min, max),
        (Some(min), None) => format!("[{}, ..)", min),
        (None, Some(max)) => format!("(.., {}]", max),
        (None, None) => "(unbounded)".to_string(),
    }
}

/// Failure of a single call to the bet placement service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlacementError {
    /// The service answered and refused the bet.
    #[error("{0}")]
    Rejected(String),

    /// The service could not be reached or answered garbage.
    /// The detail goes to the log; users only see "transport error".
    #[error("transport error")]
    Transport { detail: String },
}

impl PlacementError {
    pub fn transport(detail: impl Into<String>) -> Self {
        Self::Transport {
            detail: detail.into(),
        }
    }
}
