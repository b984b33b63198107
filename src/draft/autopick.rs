// Fallback selection when a team fails to act on its turn.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::draft::submit::PickValidator;
use crate::draft::turn::derive_turn;
use crate::error::{CoreError, Result};
use crate::model::{AutoPickStrategyKind, DraftPick, Driver, DriverId, EventId, LeagueId};
use crate::ports::Repository;

/// A fallback selection policy over the remaining driver pool.
///
/// `available` is the undrafted pool in ascending id order; implementations
/// must pick from it (or decline with `None` when it is empty).
pub trait AutoPickStrategy: Send + Sync {
    fn select(&self, available: &[Driver]) -> Option<DriverId>;
}

/// The original placeholder policy: the highest driver id still available.
pub struct HighestAvailableId;

impl AutoPickStrategy for HighestAvailableId {
    fn select(&self, available: &[Driver]) -> Option<DriverId> {
        available.iter().map(|d| d.id).max()
    }
}

/// The best remaining driver by derived season total, with id as a
/// deterministic tiebreak.
pub struct HighestRankedBySeasonPoints;

impl AutoPickStrategy for HighestRankedBySeasonPoints {
    fn select(&self, available: &[Driver]) -> Option<DriverId> {
        available
            .iter()
            .max_by_key(|d| (d.total_points, d.id))
            .map(|d| d.id)
    }
}

/// Uniform random choice over the remaining pool.
pub struct RandomPick {
    rng: Mutex<StdRng>,
}

impl RandomPick {
    pub fn new() -> Self {
        RandomPick {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Seeded constructor for deterministic tests.
    pub fn with_seed(seed: u64) -> Self {
        RandomPick {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomPick {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoPickStrategy for RandomPick {
    fn select(&self, available: &[Driver]) -> Option<DriverId> {
        let mut rng = self.rng.lock().expect("auto-pick rng poisoned");
        available.choose(&mut *rng).map(|d| d.id)
    }
}

/// Resolve a league's configured strategy.
pub fn strategy_for(kind: AutoPickStrategyKind) -> Box<dyn AutoPickStrategy> {
    match kind {
        AutoPickStrategyKind::HighestAvailableId => Box::new(HighestAvailableId),
        AutoPickStrategyKind::HighestRankedBySeasonPoints => {
            Box::new(HighestRankedBySeasonPoints)
        }
        AutoPickStrategyKind::Random => Box::new(RandomPick::new()),
    }
}

/// Applies a league's strategy and commits the resulting pick through the
/// same validation path (and lock) as user submissions.
pub struct AutoPicker {
    repo: Arc<dyn Repository>,
    validator: Arc<PickValidator>,
}

impl AutoPicker {
    pub fn new(repo: Arc<dyn Repository>, validator: Arc<PickValidator>) -> Self {
        AutoPicker { repo, validator }
    }

    /// Choose a fallback driver for the draft's current turn.
    ///
    /// Returns `None` when the draft is complete or no drivers remain —
    /// both are normal outcomes, not errors.
    pub fn select(&self, league: LeagueId, event: EventId) -> Result<Option<DriverId>> {
        let league_record = self
            .repo
            .league(league)?
            .ok_or_else(|| CoreError::not_found("league", league))?;
        let order = self
            .repo
            .draft_order(league, event)?
            .ok_or_else(|| CoreError::not_found("draft order", league))?;

        let picks = self.repo.picks(league, event)?;
        if derive_turn(&order, picks.len() as u32).next.is_none() {
            debug!(league = %league, event = %event, "auto-pick skipped: draft complete");
            return Ok(None);
        }

        let taken: std::collections::HashSet<DriverId> =
            picks.iter().map(|p| p.driver).collect();
        let available: Vec<Driver> = self
            .repo
            .drivers()?
            .into_iter()
            .filter(|d| !taken.contains(&d.id))
            .collect();
        if available.is_empty() {
            debug!(league = %league, event = %event, "auto-pick skipped: pool exhausted");
            return Ok(None);
        }

        let strategy = strategy_for(league_record.auto_pick_strategy);
        Ok(strategy.select(&available))
    }

    /// Select and commit an auto-pick for the team currently on the clock.
    /// Returns the committed pick, or `None` when nothing can be picked.
    pub fn auto_pick(&self, league: LeagueId, event: EventId) -> Result<Option<DraftPick>> {
        let driver = match self.select(league, event)? {
            Some(driver) => driver,
            None => return Ok(None),
        };
        let order = self
            .repo
            .draft_order(league, event)?
            .ok_or_else(|| CoreError::not_found("draft order", league))?;
        let pick_count = self.repo.count_picks(league, event)?;
        let slot = match derive_turn(&order, pick_count).next {
            Some(slot) => slot,
            None => return Ok(None),
        };

        let pick = self
            .validator
            .submit_pick(league, event, slot.team, driver, None)?;
        info!(
            league = %league,
            event = %event,
            team = %pick.team,
            driver = %pick.driver,
            "auto-pick committed"
        );
        Ok(Some(pick))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::ConstructorId;

    fn driver(id: i64, total_points: i64) -> Driver {
        Driver {
            id: DriverId(id),
            name: format!("Driver {id}"),
            constructor: ConstructorId(1),
            price: 10,
            total_points,
            average_points: 0.0,
        }
    }

    #[test]
    fn highest_available_id_picks_max_id() {
        let pool = vec![driver(3, 50), driver(7, 10), driver(5, 99)];
        assert_eq!(HighestAvailableId.select(&pool), Some(DriverId(7)));
    }

    #[test]
    fn highest_available_id_empty_pool_is_none() {
        assert_eq!(HighestAvailableId.select(&[]), None);
    }

    #[test]
    fn highest_ranked_picks_best_season_total() {
        let pool = vec![driver(3, 50), driver(7, 10), driver(5, 99)];
        assert_eq!(
            HighestRankedBySeasonPoints.select(&pool),
            Some(DriverId(5))
        );
    }

    #[test]
    fn highest_ranked_breaks_ties_by_id() {
        let pool = vec![driver(3, 50), driver(7, 50), driver(5, 50)];
        assert_eq!(
            HighestRankedBySeasonPoints.select(&pool),
            Some(DriverId(7))
        );
    }

    #[test]
    fn random_pick_is_deterministic_with_seed_and_stays_in_pool() {
        let pool = vec![driver(3, 0), driver(7, 0), driver(5, 0)];
        let first = RandomPick::with_seed(11).select(&pool).unwrap();
        let second = RandomPick::with_seed(11).select(&pool).unwrap();
        assert_eq!(first, second);
        assert!(pool.iter().any(|d| d.id == first));
    }

    #[test]
    fn random_pick_empty_pool_is_none() {
        assert_eq!(RandomPick::with_seed(1).select(&[]), None);
    }
}
