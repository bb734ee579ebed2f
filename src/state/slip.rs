use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::SessionError;

/// One line of the bet slip.
/// `label` and `price` are copies taken when the market was selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    /// Key into the current snapshot, looked up on demand
    pub market_id: String,
    pub label: String,
    /// Requested price (decimal odds) at selection time
    pub price: Decimal,
    /// Always > 0
    pub stake: Decimal,
}

impl Selection {
    pub fn potential_return(&self) -> Decimal {
        self.stake.saturating_mul(self.price)
    }
}

/// Slip totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub stake: Decimal,
    pub potential_return: Decimal,
}

/// Pending selections in insertion order, at most one per market.
#[derive(Debug, Clone, Default)]
pub struct BetSlip {
    selections: Vec<Selection>,
    /// Contents of the last slip that was cleared or drained for submission
    last: Vec<Selection>,
}

impl BetSlip {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, market_id: &str) -> Option<usize> {
        self.selections.iter().position(|s| s.market_id == market_id)
    }

    fn check_positive(value: Decimal) -> Result<(), SessionError> {
        if value <= Decimal::ZERO {
            return Err(SessionError::InvalidStake { value });
        }
        Ok(())
    }

    /// Totals over `(stake, price)` lines, or None if any sum or product overflows.
    fn checked_totals(lines: impl IntoIterator<Item = (Decimal, Decimal)>) -> Option<Totals> {
        lines.into_iter().try_fold(Totals::default(), |acc, (stake, price)| {
            Some(Totals {
                stake: acc.stake.checked_add(stake)?,
                potential_return: acc.potential_return.checked_add(stake.checked_mul(price)?)?,
            })
        })
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Add a selection, or merge into the existing one for the same market by
    /// increasing its stake. The stored label/price are kept on merge.
    ///
    /// Rejected without change if the slip totals would no longer fit in a Decimal.
    pub fn add(
        &mut self,
        market_id: &str,
        label: &str,
        price: Decimal,
        stake: Decimal,
    ) -> Result<Selection, SessionError> {
        Self::check_positive(stake)?;
        let overflow = || SessionError::InvalidStake { value: stake };

        let idx = self.position(market_id);
        let line_stake = match idx {
            Some(i) => self.selections[i].stake.checked_add(stake).ok_or_else(overflow)?,
            None => stake,
        };
        let lines = self
            .selections
            .iter()
            .enumerate()
            .map(|(i, s)| if Some(i) == idx { (line_stake, s.price) } else { (s.stake, s.price) })
            .chain(idx.is_none().then_some((stake, price)));
        Self::checked_totals(lines).ok_or_else(overflow)?;

        match idx {
            Some(i) => {
                let existing = &mut self.selections[i];
                existing.stake = line_stake;
                Ok(existing.clone())
            }
            None => {
                let selection = Selection {
                    market_id: market_id.to_string(),
                    label: label.to_string(),
                    price,
                    stake,
                };
                self.selections.push(selection.clone());
                Ok(selection)
            }
        }
    }

    /// Remove the selection for a market. Returns it, or None if absent.
    /// Single removals are not remembered for `repeat_last`.
    pub fn remove(&mut self, market_id: &str) -> Option<Selection> {
        self.position(market_id).map(|idx| self.selections.remove(idx))
    }

    /// Multiply every stake by `factor` (e.g. 2 for "double").
    /// Rejected without change unless factor > 0 and the scaled slip still totals.
    pub fn scale(&mut self, factor: Decimal) -> Result<(), SessionError> {
        Self::check_positive(factor)?;
        let overflow = || SessionError::InvalidStake { value: factor };
        let scaled: Vec<Decimal> = self
            .selections
            .iter()
            .map(|s| s.stake.checked_mul(factor))
            .collect::<Option<_>>()
            .ok_or_else(overflow)?;
        // Decimal rounding can underflow a tiny stake to zero.
        if let Some(&bad) = scaled.iter().find(|v| **v <= Decimal::ZERO) {
            return Err(SessionError::InvalidStake { value: bad });
        }
        let prices = self.selections.iter().map(|s| s.price);
        Self::checked_totals(scaled.iter().copied().zip(prices)).ok_or_else(overflow)?;
        for (selection, stake) in self.selections.iter_mut().zip(scaled) {
            selection.stake = stake;
        }
        Ok(())
    }

    /// Re-add copies of the last cleared/submitted slip, merging as `add` does.
    /// Returns how many selections were re-added.
    pub fn repeat_last(&mut self) -> Result<usize, SessionError> {
        let last = self.last.clone();
        for s in &last {
            self.add(&s.market_id, &s.label, s.price, s.stake)?;
        }
        Ok(last.len())
    }

    /// Remove everything. A non-empty slip becomes the new "last" slip.
    pub fn clear(&mut self) {
        if !self.selections.is_empty() {
            self.last = std::mem::take(&mut self.selections);
        }
    }

    /// Take all selections out for submission, leaving the slip empty.
    pub fn drain(&mut self) -> Vec<Selection> {
        let taken = std::mem::take(&mut self.selections);
        if !taken.is_empty() {
            self.last = taken.clone();
        }
        taken
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Every mutation checks that these sums fit, so saturation never kicks in.
    pub fn totals(&self) -> Totals {
        self.selections.iter().fold(Totals::default(), |acc, s| Totals {
            stake: acc.stake.saturating_add(s.stake),
            potential_return: acc.potential_return.saturating_add(s.potential_return()),
        })
    }

    pub fn selections(&self) -> &[Selection] {
        &self.selections
    }

    pub fn get(&self, market_id: &str) -> Option<&Selection> {
        self.selections.iter().find(|s| s.market_id == market_id)
    }

    pub fn contains(&self, market_id: &str) -> bool {
        self.position(market_id).is_some()
    }

    /// Selections that `repeat_last` would re-add.
    pub fn last(&self) -> &[Selection] {
        &self.last
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }
}
