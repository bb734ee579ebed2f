pub mod market;

pub use market::{parse_snapshot, MarketFeed};
