mod market;
mod slip;
mod snapshot;

pub use market::{Market, MarketStatus, Round, RoundPhase, Snapshot};
pub use slip::{BetSlip, Selection, Totals};
pub use snapshot::{Replaced, SnapshotStore};
