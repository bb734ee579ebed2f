mod submit;

pub use submit::{FailurePolicy, ItemOutcome, Outcome, PendingBatch, SubmissionReport};

#[cfg(test)]
pub(crate) use submit::testing;

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::BetPlacer;
use crate::error::{ClosedReason, SessionError};
use crate::state::{BetSlip, Market, Replaced, Round, RoundPhase, Selection, Snapshot, SnapshotStore, Totals};

/// Betting state of the session, driven by round phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// Bets may be added
    Open,
    /// Round suspended: adds rejected, slip kept for display
    Locked,
    /// Round settled: waiting for the next round id
    Settling,
}

impl SessionPhase {
    /// Phase after a snapshot with `round_phase` arrives.
    /// Settling only ends when a new round id shows up.
    fn next(self, round_phase: RoundPhase, new_round: bool) -> SessionPhase {
        match (self, round_phase) {
            (SessionPhase::Settling, _) if !new_round => SessionPhase::Settling,
            (_, RoundPhase::Betting) => SessionPhase::Open,
            (_, RoundPhase::Suspended) => SessionPhase::Locked,
            (_, RoundPhase::Settled) => SessionPhase::Settling,
        }
    }

    fn closed_reason(self) -> Option<ClosedReason> {
        match self {
            SessionPhase::Open => None,
            SessionPhase::Locked => Some(ClosedReason::RoundSuspended),
            SessionPhase::Settling => Some(ClosedReason::RoundSettling),
        }
    }
}

/// Read-only view for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub game_id: String,
    pub round: Option<Round>,
    pub phase: SessionPhase,
    /// False while the market feed is unreachable; everything else is last-known
    pub connected: bool,
    pub selections: Vec<Selection>,
    pub totals: Totals,
    pub batches_in_flight: usize,
}

/// Live betting session for one game screen.
///
/// Owns the current market snapshot and the bet slip. Feed snapshots and user
/// actions are applied in arrival order from a single task; only placement
/// calls are awaited.
#[derive(Debug)]
pub struct Session {
    game_id: String,
    policy: FailurePolicy,
    store: SnapshotStore,
    slip: BetSlip,
    phase: SessionPhase,
    connected: bool,
    in_flight: usize,
}

impl Session {
    pub fn new(game_id: impl Into<String>, policy: FailurePolicy) -> Self {
        Self {
            game_id: game_id.into(),
            policy,
            store: SnapshotStore::new(),
            slip: BetSlip::new(),
            phase: SessionPhase::Open,
            connected: false,
            in_flight: 0,
        }
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn slip(&self) -> &BetSlip {
        &self.slip
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Observe every snapshot the session applies.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.store.subscribe()
    }

    // =========================================================================
    // FEED
    // =========================================================================

    /// Apply a feed snapshot. A new round id clears the slip.
    pub fn on_snapshot(&mut self, snapshot: Snapshot) -> Replaced {
        let round_phase = snapshot.phase;
        let replaced = self.store.replace(snapshot);
        let new_round = replaced.round_changed || replaced.previous_round.is_none();

        if replaced.round_changed {
            if !self.slip.is_empty() {
                info!(
                    game_id = %self.game_id,
                    previous_round = ?replaced.previous_round,
                    dropped = self.slip.len(),
                    "new round, clearing stale slip"
                );
            }
            self.slip.clear();
        }

        let next = self.phase.next(round_phase, new_round);
        if next != self.phase {
            info!(
                game_id = %self.game_id,
                round_id = ?self.store.current_round().map(|r| r.id),
                from = ?self.phase,
                to = ?next,
                "session phase changed"
            );
            self.phase = next;
        }

        replaced
    }

    /// Record feed connectivity. Last-known snapshot and slip are kept either way.
    pub fn set_feed_connected(&mut self, connected: bool) {
        if self.connected != connected {
            if connected {
                info!(game_id = %self.game_id, "market feed connected");
            } else {
                warn!(game_id = %self.game_id, "market feed lost, keeping last-known state");
            }
        }
        self.connected = connected;
    }

    // =========================================================================
    // SLIP ACTIONS
    // =========================================================================

    /// Validate a click against the live market and add it to the slip.
    /// The market's label and price are copied into the selection.
    pub fn request_add(&mut self, market_id: &str, stake: Decimal) -> Result<Selection, SessionError> {
        let result = self.try_add(market_id, stake);
        match &result {
            Ok(selection) => debug!(
                game_id = %self.game_id,
                market_id,
                stake = %selection.stake,
                price = %selection.price,
                "selection added"
            ),
            Err(err) => info!(game_id = %self.game_id, market_id, %stake, reason = %err, "add rejected"),
        }
        result
    }

    fn try_add(&mut self, market_id: &str, stake: Decimal) -> Result<Selection, SessionError> {
        let market = self.validate(market_id, stake, self.phase.closed_reason())?;
        let label = market.label.clone();
        let price = market.price;
        self.slip.add(market_id, &label, price, stake)
    }

    /// Check `stake` more on `market_id` against the live market and the line
    /// already on the slip. `closed` is the session-level reason, if any.
    fn validate(
        &self,
        market_id: &str,
        stake: Decimal,
        closed: Option<ClosedReason>,
    ) -> Result<&Market, SessionError> {
        let market = self
            .store
            .get(market_id)
            .ok_or_else(|| SessionError::MarketGone {
                market_id: market_id.to_string(),
            })?;

        let closed = if market.is_suspended() {
            Some(ClosedReason::MarketSuspended)
        } else {
            closed
        };
        if let Some(reason) = closed {
            return Err(SessionError::BettingClosed {
                market_id: Some(market_id.to_string()),
                reason,
            });
        }

        let out_of_range = |stake| SessionError::StakeOutOfRange {
            market_id: market_id.to_string(),
            stake,
            min: market.min_stake,
            max: market.max_stake,
        };
        if !market.stake_in_range(stake) {
            return Err(out_of_range(stake));
        }
        // A merge must not push the line past the market maximum either.
        if let Some(existing) = self.slip.get(market_id) {
            let merged = existing
                .stake
                .checked_add(stake)
                .ok_or(SessionError::InvalidStake { value: stake })?;
            if !market.stake_in_range(merged) {
                return Err(out_of_range(merged));
            }
        }

        Ok(market)
    }

    /// Remove a selection. Allowed in any phase.
    pub fn remove_selection(&mut self, market_id: &str) -> Option<Selection> {
        self.slip.remove(market_id)
    }

    /// Multiply all stakes by `factor`. Rejected without change if any scaled
    /// stake leaves its market's bounds.
    pub fn scale_stakes(&mut self, factor: Decimal) -> Result<(), SessionError> {
        if factor > Decimal::ZERO {
            for selection in self.slip.selections() {
                let Some(market) = self.store.get(&selection.market_id) else {
                    continue;
                };
                let scaled = selection
                    .stake
                    .checked_mul(factor)
                    .ok_or(SessionError::InvalidStake { value: factor })?;
                if !market.stake_in_range(scaled) {
                    return Err(SessionError::StakeOutOfRange {
                        market_id: selection.market_id.clone(),
                        stake: scaled,
                        min: market.min_stake,
                        max: market.max_stake,
                    });
                }
            }
        }
        self.slip.scale(factor)
    }

    pub fn clear_slip(&mut self) {
        self.slip.clear();
    }

    /// Re-request every selection of the last cleared/submitted slip against
    /// the current snapshot. Each one is validated like a fresh click.
    pub fn repeat_last(&mut self) -> Vec<(String, Result<Selection, SessionError>)> {
        let last: Vec<(String, Decimal)> = self
            .slip
            .last()
            .iter()
            .map(|s| (s.market_id.clone(), s.stake))
            .collect();

        last.into_iter()
            .map(|(market_id, stake)| {
                let result = self.request_add(&market_id, stake);
                (market_id, result)
            })
            .collect()
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            game_id: self.game_id.clone(),
            round: self.store.current_round(),
            phase: self.phase,
            connected: self.connected,
            selections: self.slip.selections().to_vec(),
            totals: self.slip.totals(),
            batches_in_flight: self.in_flight,
        }
    }

    // =========================================================================
    // SUBMIT
    // =========================================================================

    /// Take the slip out for placement. Returns None for an empty slip.
    ///
    /// The batch keeps the round it was built in; later snapshots never cancel it.
    pub fn begin_submit(&mut self) -> Result<Option<PendingBatch>, SessionError> {
        if let Some(reason) = self.phase.closed_reason() {
            return Err(SessionError::BettingClosed {
                market_id: None,
                reason,
            });
        }
        let Some(round) = self.store.current_round() else {
            return Ok(None);
        };
        if self.slip.is_empty() {
            return Ok(None);
        }

        let selections = self.slip.drain();
        self.in_flight += 1;
        info!(
            game_id = %self.game_id,
            round_id = %round.id,
            count = selections.len(),
            "submitting slip"
        );
        Ok(Some(PendingBatch {
            round_id: round.id,
            selections,
        }))
    }

    /// Apply the failure policy once a batch has finished.
    pub fn finish_submit(&mut self, report: &SubmissionReport) {
        self.in_flight = self.in_flight.saturating_sub(1);
        info!(
            game_id = %self.game_id,
            round_id = %report.round_id,
            placed = report.placed_count(),
            failed = report.failed_count(),
            "submission finished"
        );

        if self.policy != FailurePolicy::RetainFailed || report.all_placed() {
            return;
        }

        let same_round = self
            .store
            .current_round()
            .is_some_and(|r| r.id == report.round_id);
        if !same_round {
            info!(
                game_id = %self.game_id,
                round_id = %report.round_id,
                "round moved on, not retaining failed selections"
            );
            return;
        }

        // Retained lines merge into whatever the user added meanwhile, so they
        // go through the same market checks as a click (phase aside).
        for s in report.failed_selections() {
            let retained = self
                .validate(&s.market_id, s.stake, None)
                .map(|_| ())
                .and_then(|()| self.slip.add(&s.market_id, &s.label, s.price, s.stake));
            if let Err(err) = retained {
                warn!(game_id = %self.game_id, market_id = %s.market_id, %err, "could not retain failed selection");
            }
        }
    }

    /// Place the whole slip, one call per selection, then apply the failure policy.
    pub async fn submit(&mut self, placer: &dyn BetPlacer) -> Result<SubmissionReport, SessionError> {
        let round_id = self.store.current_round().map(|r| r.id).unwrap_or_default();
        let Some(batch) = self.begin_submit()? else {
            return Ok(SubmissionReport {
                round_id,
                items: Vec::new(),
                submitted_at: chrono::Utc::now(),
            });
        };

        let report = batch.run(placer).await;
        self.finish_submit(&report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedPlacer;
    use super::*;
    use crate::error::PlacementError;
    use crate::state::MarketStatus;
    use rust_decimal_macros::dec;

    fn market(id: &str, price: Decimal) -> Market {
        Market {
            id: id.to_string(),
            label: format!("label-{}", id),
            price,
            status: MarketStatus::Active,
            min_stake: Some(dec!(10)),
            max_stake: Some(dec!(1000)),
        }
    }

    fn unbounded(id: &str, price: Decimal) -> Market {
        Market {
            min_stake: None,
            max_stake: None,
            ..market(id, price)
        }
    }

    fn snapshot(round: &str, phase: RoundPhase, markets: Vec<Market>) -> Snapshot {
        Snapshot {
            round_id: round.to_string(),
            phase,
            markets,
        }
    }

    fn open_session(markets: Vec<Market>) -> Session {
        let mut session = Session::new("dragon-tiger", FailurePolicy::ClearAll);
        session.on_snapshot(snapshot("R1", RoundPhase::Betting, markets));
        session
    }

    #[test]
    fn test_scenario_merge_then_new_round() {
        let mut session = open_session(vec![market("A", dec!(2.0))]);

        session.request_add("A", dec!(100)).unwrap();
        let state = session.state();
        assert_eq!(state.selections.len(), 1);
        assert_eq!(state.selections[0].stake, dec!(100));
        assert_eq!(state.selections[0].price, dec!(2.0));
        assert_eq!(state.totals.stake, dec!(100));
        assert_eq!(state.totals.potential_return, dec!(200));

        session.request_add("A", dec!(50)).unwrap();
        let state = session.state();
        assert_eq!(state.selections.len(), 1);
        assert_eq!(state.selections[0].stake, dec!(150));
        assert_eq!(state.totals.stake, dec!(150));
        assert_eq!(state.totals.potential_return, dec!(300));

        session.on_snapshot(snapshot("R2", RoundPhase::Betting, vec![market("A", dec!(2.0))]));
        assert!(session.state().selections.is_empty());
        assert_eq!(session.state().totals, Totals::default());
    }

    #[test]
    fn test_stake_below_min_rejected() {
        let mut session = open_session(vec![market("A", dec!(2.0))]);

        let err = session.request_add("A", dec!(5)).unwrap_err();
        assert_eq!(
            err,
            SessionError::StakeOutOfRange {
                market_id: "A".to_string(),
                stake: dec!(5),
                min: Some(dec!(10)),
                max: Some(dec!(1000)),
            }
        );
        assert!(session.slip().is_empty());
    }

    #[test]
    fn test_merge_past_max_rejected() {
        let mut session = open_session(vec![market("A", dec!(2.0))]);
        session.request_add("A", dec!(600)).unwrap();

        let err = session.request_add("A", dec!(600)).unwrap_err();
        assert!(matches!(err, SessionError::StakeOutOfRange { stake, .. } if stake == dec!(1200)));
        assert_eq!(session.slip().get("A").unwrap().stake, dec!(600));
    }

    #[test]
    fn test_overflowing_amounts_rejected() {
        let mut session = open_session(vec![unbounded("A", dec!(8.5))]);

        // potential return would not fit
        let huge = Decimal::MAX / dec!(8);
        assert_eq!(
            session.request_add("A", huge),
            Err(SessionError::InvalidStake { value: huge })
        );
        assert!(session.slip().is_empty());

        session.request_add("A", dec!(100)).unwrap();
        assert_eq!(
            session.request_add("A", Decimal::MAX),
            Err(SessionError::InvalidStake { value: Decimal::MAX })
        );
        assert_eq!(
            session.scale_stakes(Decimal::MAX),
            Err(SessionError::InvalidStake { value: Decimal::MAX })
        );

        let state = session.state();
        assert_eq!(state.selections.len(), 1);
        assert_eq!(state.selections[0].stake, dec!(100));
        assert_eq!(state.totals.potential_return, dec!(850));
    }

    #[test]
    fn test_unknown_market_is_gone() {
        let mut session = open_session(vec![market("A", dec!(2.0))]);
        assert_eq!(
            session.request_add("Z", dec!(50)),
            Err(SessionError::MarketGone {
                market_id: "Z".to_string()
            })
        );

        // Before any snapshot every market is gone
        let mut fresh = Session::new("g", FailurePolicy::ClearAll);
        assert!(matches!(fresh.request_add("A", dec!(50)), Err(SessionError::MarketGone { .. })));
    }

    #[test]
    fn test_market_dropped_from_snapshot_is_gone() {
        let mut session = open_session(vec![market("A", dec!(2.0)), market("B", dec!(3.0))]);
        session.on_snapshot(snapshot("R1", RoundPhase::Betting, vec![market("A", dec!(2.0))]));

        assert!(matches!(session.request_add("B", dec!(50)), Err(SessionError::MarketGone { .. })));
    }

    #[test]
    fn test_suspended_market_rejects_without_touching_slip() {
        let mut session = open_session(vec![market("A", dec!(2.0)), market("B", dec!(3.0))]);
        session.request_add("A", dec!(100)).unwrap();

        let mut suspended = market("B", dec!(3.0));
        suspended.status = MarketStatus::Suspended;
        session.on_snapshot(snapshot("R1", RoundPhase::Betting, vec![market("A", dec!(2.0)), suspended]));

        let before = session.slip().selections().to_vec();
        assert_eq!(
            session.request_add("B", dec!(50)),
            Err(SessionError::BettingClosed {
                market_id: Some("B".to_string()),
                reason: ClosedReason::MarketSuspended,
            })
        );
        assert_eq!(session.slip().selections(), before.as_slice());

        // market-level suspension does not lock the session
        assert_eq!(session.phase(), SessionPhase::Open);
        session.request_add("A", dec!(10)).unwrap();
    }

    #[test]
    fn test_round_lifecycle() {
        let mut session = open_session(vec![market("A", dec!(2.0))]);
        session.request_add("A", dec!(100)).unwrap();
        assert_eq!(session.phase(), SessionPhase::Open);

        session.on_snapshot(snapshot("R1", RoundPhase::Suspended, vec![market("A", dec!(2.0))]));
        assert_eq!(session.phase(), SessionPhase::Locked);
        // slip preserved for display
        assert_eq!(session.slip().len(), 1);
        assert_eq!(
            session.request_add("A", dec!(10)),
            Err(SessionError::BettingClosed {
                market_id: Some("A".to_string()),
                reason: ClosedReason::RoundSuspended,
            })
        );

        session.on_snapshot(snapshot("R1", RoundPhase::Settled, vec![market("A", dec!(2.0))]));
        assert_eq!(session.phase(), SessionPhase::Settling);
        assert_eq!(session.slip().len(), 1);
        assert!(matches!(
            session.request_add("A", dec!(10)),
            Err(SessionError::BettingClosed {
                reason: ClosedReason::RoundSettling,
                ..
            })
        ));

        // Same round id cannot reopen a settled round
        session.on_snapshot(snapshot("R1", RoundPhase::Betting, vec![market("A", dec!(2.0))]));
        assert_eq!(session.phase(), SessionPhase::Settling);

        session.on_snapshot(snapshot("R2", RoundPhase::Betting, vec![market("A", dec!(2.0))]));
        assert_eq!(session.phase(), SessionPhase::Open);
        assert!(session.slip().is_empty());
        session.request_add("A", dec!(10)).unwrap();
    }

    #[test]
    fn test_locked_round_reopens_on_same_id() {
        let mut session = open_session(vec![market("A", dec!(2.0))]);
        session.on_snapshot(snapshot("R1", RoundPhase::Suspended, vec![market("A", dec!(2.0))]));
        assert_eq!(session.phase(), SessionPhase::Locked);

        session.on_snapshot(snapshot("R1", RoundPhase::Betting, vec![market("A", dec!(2.0))]));
        assert_eq!(session.phase(), SessionPhase::Open);
    }

    #[test]
    fn test_price_captured_at_selection_time() {
        let mut session = open_session(vec![market("A", dec!(2.0))]);
        session.request_add("A", dec!(100)).unwrap();

        // price moves; slip keeps the captured one
        session.on_snapshot(snapshot("R1", RoundPhase::Betting, vec![market("A", dec!(1.5))]));
        let line = session.slip().get("A").unwrap();
        assert_eq!(line.price, dec!(2.0));
        assert_eq!(session.state().totals.potential_return, dec!(200));
    }

    #[test]
    fn test_scale_stakes() {
        let mut session = open_session(vec![market("A", dec!(2.0)), market("B", dec!(4.0))]);
        session.request_add("A", dec!(100)).unwrap();
        session.request_add("B", dec!(20)).unwrap();

        session.scale_stakes(dec!(2)).unwrap();
        assert_eq!(session.slip().get("A").unwrap().stake, dec!(200));
        assert_eq!(session.slip().get("B").unwrap().stake, dec!(40));

        // 40 * 0.2 = 8 < min 10
        let before = session.slip().selections().to_vec();
        assert!(matches!(
            session.scale_stakes(dec!(0.2)),
            Err(SessionError::StakeOutOfRange { ref market_id, .. }) if market_id == "B"
        ));
        assert!(matches!(session.scale_stakes(dec!(0)), Err(SessionError::InvalidStake { .. })));
        assert_eq!(session.slip().selections(), before.as_slice());
    }

    #[test]
    fn test_remove_and_clear() {
        let mut session = open_session(vec![market("A", dec!(2.0)), market("B", dec!(4.0))]);
        session.request_add("A", dec!(100)).unwrap();
        session.request_add("B", dec!(20)).unwrap();

        assert!(session.remove_selection("A").is_some());
        assert!(session.remove_selection("A").is_none());
        assert_eq!(session.slip().len(), 1);

        session.clear_slip();
        assert!(session.slip().is_empty());
    }

    #[test]
    fn test_repeat_last_revalidates() {
        let mut session = open_session(vec![market("A", dec!(2.0)), market("B", dec!(4.0))]);
        session.request_add("A", dec!(100)).unwrap();
        session.request_add("B", dec!(20)).unwrap();

        // next round: B gone, A repriced
        session.on_snapshot(snapshot("R2", RoundPhase::Betting, vec![market("A", dec!(2.2))]));
        assert!(session.slip().is_empty());

        let results = session.repeat_last();
        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_ok());
        assert!(matches!(results[1].1, Err(SessionError::MarketGone { .. })));

        let line = session.slip().get("A").unwrap();
        assert_eq!(line.stake, dec!(100));
        assert_eq!(line.price, dec!(2.2));
        assert!(!session.slip().contains("B"));
    }

    #[test]
    fn test_disconnect_keeps_state() {
        let mut session = open_session(vec![market("A", dec!(2.0))]);
        session.set_feed_connected(true);
        session.request_add("A", dec!(100)).unwrap();

        session.set_feed_connected(false);
        let state = session.state();
        assert!(!state.connected);
        assert_eq!(state.selections.len(), 1);
        assert_eq!(state.round.unwrap().id, "R1");
        assert!(session.store().get("A").is_some());
    }

    #[test]
    fn test_state_serializes_for_presentation() {
        let mut session = open_session(vec![market("A", dec!(2.0))]);
        session.request_add("A", dec!(100)).unwrap();

        let json = serde_json::to_value(session.state()).unwrap();
        assert_eq!(json["gameId"], "dragon-tiger");
        assert_eq!(json["phase"], "open");
        assert_eq!(json["round"]["id"], "R1");
        assert_eq!(json["selections"][0]["marketId"], "A");
    }

    #[tokio::test]
    async fn test_submit_partial_failure_clears_slip() {
        let mut session = open_session(vec![
            market("A", dec!(2.0)),
            market("B", dec!(3.0)),
            market("C", dec!(4.0)),
        ]);
        session.request_add("A", dec!(10)).unwrap();
        session.request_add("B", dec!(20)).unwrap();
        session.request_add("C", dec!(30)).unwrap();

        let placer = ScriptedPlacer::new().fail("B", PlacementError::Rejected("exposure limit".to_string()));
        let report = session.submit(&placer).await.unwrap();

        assert_eq!(placer.called_markets(), vec!["A", "B", "C"]);
        assert_eq!(report.round_id, "R1");
        assert_eq!(report.placed_count(), 2);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.failure_reasons(), vec!["B (label-B): exposure limit"]);
        assert!(session.slip().is_empty());
        assert_eq!(session.state().batches_in_flight, 0);
    }

    #[tokio::test]
    async fn test_submit_retain_failed_policy() {
        let mut session = Session::new("roulette", FailurePolicy::RetainFailed);
        session.on_snapshot(snapshot(
            "R1",
            RoundPhase::Betting,
            vec![market("A", dec!(2.0)), market("B", dec!(3.0))],
        ));
        session.request_add("A", dec!(10)).unwrap();
        session.request_add("B", dec!(20)).unwrap();

        let placer = ScriptedPlacer::new().fail("B", PlacementError::transport("reset by peer"));
        let report = session.submit(&placer).await.unwrap();

        assert_eq!(report.failed_count(), 1);
        assert_eq!(session.slip().len(), 1);
        let kept = session.slip().get("B").unwrap();
        assert_eq!(kept.stake, dec!(20));
        assert_eq!(kept.price, dec!(3.0));
    }

    #[tokio::test]
    async fn test_retained_failures_are_revalidated() {
        let mut session = Session::new("roulette", FailurePolicy::RetainFailed);
        session.on_snapshot(snapshot(
            "R1",
            RoundPhase::Betting,
            vec![market("A", dec!(2.0)), market("B", dec!(3.0)), market("C", dec!(4.0))],
        ));
        session.request_add("A", dec!(600)).unwrap();
        session.request_add("B", dec!(100)).unwrap();
        session.request_add("C", dec!(20)).unwrap();

        let batch = session.begin_submit().unwrap().unwrap();
        // user keeps clicking while the batch is out
        session.request_add("A", dec!(600)).unwrap();
        session.request_add("B", dec!(50)).unwrap();
        let mut suspended = market("C", dec!(4.0));
        suspended.status = MarketStatus::Suspended;
        session.on_snapshot(snapshot(
            "R1",
            RoundPhase::Betting,
            vec![market("A", dec!(2.0)), market("B", dec!(3.0)), suspended],
        ));

        let placer = ScriptedPlacer::new()
            .fail("A", PlacementError::transport("timeout"))
            .fail("B", PlacementError::transport("timeout"))
            .fail("C", PlacementError::transport("timeout"));
        let report = batch.run(&placer).await;
        assert_eq!(report.failed_count(), 3);
        session.finish_submit(&report);

        // 600 + 600 would pass max 1000: the failed A line is dropped
        assert_eq!(session.slip().get("A").unwrap().stake, dec!(600));
        assert_eq!(session.slip().get("B").unwrap().stake, dec!(150));
        assert!(!session.slip().contains("C"));
        assert_eq!(session.slip().len(), 2);
    }

    #[tokio::test]
    async fn test_round_change_mid_flight_does_not_cancel_batch() {
        let mut session = Session::new("roulette", FailurePolicy::RetainFailed);
        session.on_snapshot(snapshot(
            "R1",
            RoundPhase::Betting,
            vec![market("A", dec!(2.0)), market("B", dec!(3.0))],
        ));
        session.request_add("A", dec!(10)).unwrap();
        session.request_add("B", dec!(20)).unwrap();

        let batch = session.begin_submit().unwrap().unwrap();
        assert!(session.slip().is_empty());
        assert_eq!(session.state().batches_in_flight, 1);

        // next round arrives while calls are out; user starts a new slip
        session.on_snapshot(snapshot("R2", RoundPhase::Betting, vec![market("A", dec!(2.0))]));
        session.request_add("A", dec!(15)).unwrap();

        let placer = ScriptedPlacer::new().fail("B", PlacementError::Rejected("late".to_string()));
        let report = batch.run(&placer).await;
        assert_eq!(report.round_id, "R1");
        assert_eq!(placer.called_markets(), vec!["A", "B"]);

        session.finish_submit(&report);
        // R1 failure not carried into R2; new slip untouched
        assert_eq!(session.slip().len(), 1);
        assert_eq!(session.slip().get("A").unwrap().stake, dec!(15));
        assert_eq!(session.state().batches_in_flight, 0);
    }

    #[tokio::test]
    async fn test_submit_empty_slip() {
        let mut session = open_session(vec![market("A", dec!(2.0))]);
        let placer = ScriptedPlacer::new();

        let report = session.submit(&placer).await.unwrap();
        assert!(report.items.is_empty());
        assert_eq!(report.round_id, "R1");
        assert!(placer.called_markets().is_empty());
    }

    #[tokio::test]
    async fn test_submit_rejected_while_locked() {
        let mut session = open_session(vec![market("A", dec!(2.0))]);
        session.request_add("A", dec!(100)).unwrap();
        session.on_snapshot(snapshot("R1", RoundPhase::Suspended, vec![market("A", dec!(2.0))]));

        let placer = ScriptedPlacer::new();
        let err = session.submit(&placer).await.unwrap_err();
        assert_eq!(
            err,
            SessionError::BettingClosed {
                market_id: None,
                reason: ClosedReason::RoundSuspended,
            }
        );
        assert!(placer.called_markets().is_empty());
        assert_eq!(session.slip().len(), 1);
    }

    #[tokio::test]
    async fn test_repeat_after_submit() {
        let mut session = open_session(vec![market("A", dec!(2.0))]);
        session.request_add("A", dec!(100)).unwrap();
        session.submit(&ScriptedPlacer::new()).await.unwrap();
        assert!(session.slip().is_empty());

        let results = session.repeat_last();
        assert_eq!(results.len(), 1);
        assert_eq!(session.slip().get("A").unwrap().stake, dec!(100));
    }
}
