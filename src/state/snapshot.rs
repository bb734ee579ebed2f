use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;

use super::market::{Market, Round, Snapshot};

/// What changed when a snapshot was swapped in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replaced {
    /// Round id held before the swap (None on the very first snapshot)
    pub previous_round: Option<String>,
    /// True when the new snapshot belongs to a different round
    pub round_changed: bool,
}

/// Holds exactly one current snapshot with O(1) lookup by market id.
///
/// Replacement is wholesale: the new index is built before the swap, so readers
/// never see markets from two snapshots at once. Every replacement is also
/// published on a watch channel for independent observers.
#[derive(Debug)]
pub struct SnapshotStore {
    current: Option<Arc<Snapshot>>,
    /// market id → position in `current.markets`
    index: HashMap<String, usize>,
    publisher: watch::Sender<Option<Arc<Snapshot>>>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (publisher, _) = watch::channel(None);
        Self {
            current: None,
            index: HashMap::new(),
            publisher,
        }
    }

    /// Swap in a new snapshot. Markets absent from it are gone.
    pub fn replace(&mut self, snapshot: Snapshot) -> Replaced {
        let mut index = HashMap::with_capacity(snapshot.markets.len());
        for (pos, market) in snapshot.markets.iter().enumerate() {
            if index.contains_key(&market.id) {
                warn!(
                    round_id = %snapshot.round_id,
                    market_id = %market.id,
                    "duplicate market id in snapshot, keeping first"
                );
                continue;
            }
            index.insert(market.id.clone(), pos);
        }

        let previous_round = self.current.as_ref().map(|s| s.round_id.clone());
        let round_changed = previous_round
            .as_deref()
            .is_some_and(|prev| prev != snapshot.round_id);

        let snapshot = Arc::new(snapshot);
        self.current = Some(Arc::clone(&snapshot));
        self.index = index;
        self.publisher.send_replace(Some(snapshot));

        Replaced {
            previous_round,
            round_changed,
        }
    }

    /// Look up a market in the current snapshot.
    /// None means the selection is no longer valid, not an error.
    pub fn get(&self, market_id: &str) -> Option<&Market> {
        let snapshot = self.current.as_ref()?;
        self.index
            .get(market_id)
            .and_then(|&pos| snapshot.markets.get(pos))
    }

    pub fn current_round(&self) -> Option<Round> {
        self.current.as_ref().map(|s| s.round())
    }

    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.clone()
    }

    /// Markets in feed order.
    pub fn markets(&self) -> &[Market] {
        self.current
            .as_ref()
            .map(|s| s.markets.as_slice())
            .unwrap_or(&[])
    }

    /// Observe every future replacement.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.publisher.subscribe()
    }
}
