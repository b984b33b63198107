// Turn derivation: whose pick is next, from the count of picks already made.

use std::sync::Arc;

use crate::error::{CoreError, Result};
use crate::model::{DraftMethod, DraftOrder, EventId, LeagueId, TeamId, ROUNDS_PER_DRAFT};
use crate::ports::Repository;

/// Where a draft is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftPhase {
    NotStarted,
    InProgress,
    Complete,
}

/// The slot the next pick will occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickSlot {
    pub team: TeamId,
    /// 1-based overall pick number.
    pub pick_number: u32,
    pub round: u32,
    /// 1-based slot within the round (independent of snake direction).
    pub position: u32,
}

/// Phase plus the next slot. `next` is `None` exactly when the draft is
/// complete — a normal terminal condition, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnInfo {
    pub phase: DraftPhase,
    pub next: Option<PickSlot>,
}

/// Derives turn state for a draft. Stateless; holds only the repository.
pub struct TurnTracker {
    repo: Arc<dyn Repository>,
}

impl TurnTracker {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        TurnTracker { repo }
    }

    /// Compute whose turn it is for (league, event). Fails with `NotFound`
    /// when no draft order exists yet.
    pub fn next_turn(&self, league: LeagueId, event: EventId) -> Result<TurnInfo> {
        let order = self
            .repo
            .draft_order(league, event)?
            .ok_or_else(|| CoreError::not_found("draft order", league))?;
        let pick_count = self.repo.count_picks(league, event)?;
        Ok(derive_turn(&order, pick_count))
    }
}

/// Pure turn derivation from an order and the number of recorded picks.
///
/// The stored sequence is the base round-1 order. For snake drafts the
/// traversal direction reverses on even rounds; the slot `position` keeps
/// the plain in-round formula either way.
pub fn derive_turn(order: &DraftOrder, pick_count: u32) -> TurnInfo {
    let team_count = order.sequence.len() as u32;
    if team_count == 0 {
        // An empty sequence cannot accept picks; treat as complete.
        return TurnInfo {
            phase: DraftPhase::Complete,
            next: None,
        };
    }

    let total_picks = team_count * ROUNDS_PER_DRAFT;
    if pick_count >= total_picks {
        return TurnInfo {
            phase: DraftPhase::Complete,
            next: None,
        };
    }

    let phase = if pick_count == 0 {
        DraftPhase::NotStarted
    } else {
        DraftPhase::InProgress
    };

    let slot_index = pick_count % team_count;
    let round = pick_count / team_count + 1;
    let team_index = match order.method {
        DraftMethod::Snake if round % 2 == 0 => team_count - 1 - slot_index,
        _ => slot_index,
    };

    TurnInfo {
        phase,
        next: Some(PickSlot {
            team: order.sequence[team_index as usize],
            pick_number: pick_count + 1,
            round,
            position: slot_index + 1,
        }),
    }
}
