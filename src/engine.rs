// The public operation surface: one facade over the draft and scoring
// engines. Every write that changes a TeamPick's points goes through
// `score_event` here, which always ends by invalidating the affected
// league's cached leaderboards — callers cannot forget the invalidation.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::draft::autopick::AutoPicker;
use crate::draft::order::DraftOrderGenerator;
use crate::draft::submit::{DraftLocks, PickValidator};
use crate::draft::turn::{TurnInfo, TurnTracker};
use crate::error::{CoreError, Result};
use crate::model::{
    DraftMethod, DraftOrder, DraftPick, DriverId, EventId, LeaderboardEntry, LeagueId,
    PickSelection, TeamId, TeamPick, UserId,
};
use crate::ports::{LeaderboardCache, Repository};
use crate::scoring::leaderboard::LeaderboardRanker;
use crate::scoring::points::{parse_scoring_override, ScoringCalculator, SeasonSummary};

pub struct Engine {
    repo: Arc<dyn Repository>,
    orders: DraftOrderGenerator,
    turns: TurnTracker,
    validator: Arc<PickValidator>,
    autopicker: AutoPicker,
    scoring: ScoringCalculator,
    ranker: LeaderboardRanker,
}

impl Engine {
    pub fn new(
        repo: Arc<dyn Repository>,
        cache: Arc<dyn LeaderboardCache>,
        leaderboard_ttl: Duration,
    ) -> Self {
        let locks = Arc::new(DraftLocks::new());
        let validator = Arc::new(PickValidator::new(repo.clone(), locks));
        Engine {
            orders: DraftOrderGenerator::new(repo.clone()),
            turns: TurnTracker::new(repo.clone()),
            autopicker: AutoPicker::new(repo.clone(), validator.clone()),
            scoring: ScoringCalculator::new(repo.clone()),
            ranker: LeaderboardRanker::new(repo.clone(), cache, leaderboard_ttl),
            validator,
            repo,
        }
    }

    pub(crate) fn repo(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    // -- draft --------------------------------------------------------------

    pub fn create_draft_order(
        &self,
        league: LeagueId,
        event: EventId,
        method: DraftMethod,
        explicit_order: Option<Vec<TeamId>>,
    ) -> Result<DraftOrder> {
        self.orders.create(league, event, method, explicit_order)
    }

    pub fn regenerate_draft_order(
        &self,
        league: LeagueId,
        event: EventId,
        method: DraftMethod,
        explicit_order: Option<Vec<TeamId>>,
        actor: UserId,
    ) -> Result<DraftOrder> {
        self.orders
            .regenerate(league, event, method, explicit_order, actor)
    }

    pub fn next_pick_info(&self, league: LeagueId, event: EventId) -> Result<TurnInfo> {
        self.turns.next_turn(league, event)
    }

    /// Commit a user-submitted pick and register the matching scoring record.
    pub fn submit_pick(
        &self,
        league: LeagueId,
        event: EventId,
        team: TeamId,
        driver: DriverId,
        acting_user: UserId,
    ) -> Result<DraftPick> {
        let pick = self
            .validator
            .submit_pick(league, event, team, driver, Some(acting_user))?;
        self.record_scoring_pick(&pick)?;
        Ok(pick)
    }

    /// Fallback pick for the team on the clock. `None` when the draft is
    /// complete or no drivers remain.
    pub fn auto_pick(&self, league: LeagueId, event: EventId) -> Result<Option<DraftPick>> {
        match self.autopicker.auto_pick(league, event)? {
            Some(pick) => {
                self.record_scoring_pick(&pick)?;
                Ok(Some(pick))
            }
            None => Ok(None),
        }
    }

    /// A committed draft pick becomes the team's scoring record for the
    /// event. Membership of the event-scoped board changed, so its cached
    /// copy is dropped.
    fn record_scoring_pick(&self, pick: &DraftPick) -> Result<()> {
        self.repo.insert_team_pick(&TeamPick {
            id: 0,
            team: pick.team,
            event: pick.event,
            selection: PickSelection::Driver(pick.driver),
            points: 0,
            active: true,
        })?;
        if let Err(err) = self.ranker.invalidate(pick.league, Some(pick.event)) {
            warn!(league = %pick.league, "leaderboard invalidation failed: {err}");
        }
        Ok(())
    }

    // -- scoring ------------------------------------------------------------

    pub fn get_leaderboard(
        &self,
        league: LeagueId,
        event: Option<EventId>,
        use_cache: bool,
    ) -> Result<Vec<LeaderboardEntry>> {
        self.ranker.get_leaderboard(league, event, use_cache)
    }

    pub fn invalidate_leaderboard(&self, league: LeagueId, event: Option<EventId>) -> Result<()> {
        self.ranker.invalidate(league, event)
    }

    pub fn recompute_season_standings(&self) -> Result<SeasonSummary> {
        self.scoring.season_recompute()
    }

    /// Re-score every team pick a league fielded for one event and refresh
    /// the affected teams' season totals. This is the only path that writes
    /// TeamPick points; it finishes by invalidating the league's cached
    /// boards. Returns the number of picks updated.
    pub fn score_event(&self, league: LeagueId, event: EventId) -> Result<usize> {
        let league_record = self
            .repo
            .league(league)?
            .ok_or_else(|| CoreError::not_found("league", league))?;
        self.repo
            .event(event)?
            .ok_or_else(|| CoreError::not_found("event", event))?;

        let override_table = league_record
            .scoring_override
            .as_deref()
            .and_then(parse_scoring_override);

        let picks = self.repo.league_team_picks_for_event(league, event)?;
        let mut updated = 0;
        let mut touched_teams = std::collections::BTreeSet::new();
        for pick in picks.iter().filter(|p| p.active) {
            let points =
                self.scoring
                    .selection_points(event, pick.selection, override_table.as_ref())?;
            self.repo.set_team_pick_points(pick.id, points)?;
            touched_teams.insert(pick.team);
            updated += 1;
        }

        // Season totals follow from the stored pick points.
        for team in touched_teams {
            let total = self
                .repo
                .team_picks(team, None)?
                .iter()
                .filter(|p| p.active)
                .map(|p| p.points)
                .sum();
            self.repo.update_team_total(team, total)?;
        }

        if let Err(err) = self.ranker.invalidate(league, Some(event)) {
            warn!(league = %league, "leaderboard invalidation failed: {err}");
        }
        Ok(updated)
    }
}
