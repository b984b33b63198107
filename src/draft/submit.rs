// Pick submission: turn and uniqueness validation ahead of the append.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::info;

use crate::draft::turn::derive_turn;
use crate::error::{CoreError, Result};
use crate::model::{DraftPick, DriverId, EventId, LeagueId, TeamId, UserId};
use crate::ports::Repository;

/// One mutex per (league, event) draft. The submit path holds the draft's
/// mutex across the whole read-check-append sequence so two racing
/// submissions cannot both observe the same pick count; auto-picks go
/// through the same path and therefore the same lock.
pub struct DraftLocks {
    inner: Mutex<HashMap<(LeagueId, EventId), Arc<Mutex<()>>>>,
}

impl DraftLocks {
    pub fn new() -> Self {
        DraftLocks {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch (or create) the lock for one draft.
    pub fn for_draft(&self, league: LeagueId, event: EventId) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().expect("draft lock registry poisoned");
        map.entry((league, event))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl Default for DraftLocks {
    fn default() -> Self {
        Self::new()
    }
}

/// Validates and commits picks. Stateless apart from the lock registry.
pub struct PickValidator {
    repo: Arc<dyn Repository>,
    locks: Arc<DraftLocks>,
}

impl PickValidator {
    pub fn new(repo: Arc<dyn Repository>, locks: Arc<DraftLocks>) -> Self {
        PickValidator { repo, locks }
    }

    /// Validate and commit one pick.
    ///
    /// `acting_user` absent marks the pick as an auto-pick. Checks run in a
    /// fixed order: order exists, team belongs to the order, driver exists,
    /// driver not already taken, and it is actually this team's turn. The
    /// storage layer's unique pick-number index backstops any submission
    /// that slips past the lock.
    pub fn submit_pick(
        &self,
        league: LeagueId,
        event: EventId,
        team: TeamId,
        driver: DriverId,
        acting_user: Option<UserId>,
    ) -> Result<DraftPick> {
        let lock = self.locks.for_draft(league, event);
        let _guard = lock.lock().expect("draft lock poisoned");

        let order = self
            .repo
            .draft_order(league, event)?
            .ok_or_else(|| CoreError::not_found("draft order", league))?;

        if !order.sequence.contains(&team) {
            return Err(CoreError::Validation(format!(
                "team {team} is not part of this draft"
            )));
        }

        self.repo
            .driver(driver)?
            .ok_or_else(|| CoreError::not_found("driver", driver))?;

        let picks = self.repo.picks(league, event)?;
        if picks.iter().any(|p| p.driver == driver) {
            return Err(CoreError::Conflict(format!(
                "driver {driver} has already been picked in this draft"
            )));
        }

        let info = derive_turn(&order, picks.len() as u32);
        let slot = match info.next {
            Some(slot) => slot,
            None => {
                return Err(CoreError::Validation(
                    "draft is complete; no picks remain".to_string(),
                ))
            }
        };
        if slot.team != team {
            return Err(CoreError::Validation(format!(
                "not your turn: team {} is on the clock",
                slot.team
            )));
        }

        let pick = DraftPick {
            league,
            event,
            pick_number: slot.pick_number,
            round: slot.round,
            position: slot.position,
            team,
            driver,
            is_auto_pick: acting_user.is_none(),
            picked_at: Utc::now(),
        };
        self.repo.append_pick(&pick)?;
        info!(
            league = %league,
            event = %event,
            pick = pick.pick_number,
            team = %team,
            driver = %driver,
            auto = pick.is_auto_pick,
            "pick committed"
        );
        Ok(pick)
    }
}
