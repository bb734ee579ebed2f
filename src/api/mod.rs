pub mod placement;

pub use placement::{BetPlacer, HttpPlacer, PlacementReceipt, PlacementRequest};
