// Ports consumed by the core engines: durable storage and the leaderboard
// cache. Engines hold `Arc<dyn Repository>` / `Arc<dyn LeaderboardCache>` so
// tests can substitute in-memory fakes.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{
    Constructor, ConstructorId, DraftOrder, DraftPick, Driver, DriverId, EventId, EventResult,
    FantasyTeam, League, LeagueId, RaceEvent, TeamId, TeamPick,
};

/// Durable storage for league, draft, and scoring records.
///
/// All calls are synchronous request/response; implementations are expected
/// to be quick (in-memory or database-bound). Infrastructure failures map to
/// `CoreError::Storage`.
pub trait Repository: Send + Sync {
    // -- reference data -----------------------------------------------------

    fn league(&self, id: LeagueId) -> Result<Option<League>>;
    fn leagues(&self) -> Result<Vec<League>>;
    fn event(&self, id: EventId) -> Result<Option<RaceEvent>>;
    /// Completed events in round order.
    fn completed_events(&self) -> Result<Vec<RaceEvent>>;
    fn driver(&self, id: DriverId) -> Result<Option<Driver>>;
    /// All drivers in ascending id order.
    fn drivers(&self) -> Result<Vec<Driver>>;
    /// All constructors in ascending id order.
    fn constructors(&self) -> Result<Vec<Constructor>>;
    /// Active teams of a league in creation (ascending id) order.
    fn active_teams(&self, league: LeagueId) -> Result<Vec<FantasyTeam>>;

    // -- draft --------------------------------------------------------------

    fn draft_order(&self, league: LeagueId, event: EventId) -> Result<Option<DraftOrder>>;
    /// Every stored draft order (the scheduled draft tick scans these).
    fn draft_orders(&self) -> Result<Vec<DraftOrder>>;
    /// Insert a new order. Fails with `Conflict` if one already exists for
    /// the (league, event).
    fn insert_draft_order(&self, order: &DraftOrder) -> Result<()>;
    /// Overwrite the existing order for (league, event).
    fn replace_draft_order(&self, order: &DraftOrder) -> Result<()>;
    fn count_picks(&self, league: LeagueId, event: EventId) -> Result<u32>;
    /// Picks in pick_number order.
    fn picks(&self, league: LeagueId, event: EventId) -> Result<Vec<DraftPick>>;
    /// Append one pick. Fails with `Conflict` if the pick_number is already
    /// taken for the (league, event) — the backstop for racing submissions.
    fn append_pick(&self, pick: &DraftPick) -> Result<()>;

    /// Timestamp of the most recent pick, if any.
    fn latest_pick_time(&self, league: LeagueId, event: EventId) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .picks(league, event)?
            .into_iter()
            .map(|p| p.picked_at)
            .max())
    }

    // -- scoring ------------------------------------------------------------

    /// A team's scoring picks, optionally narrowed to one event.
    fn team_picks(&self, team: TeamId, event: Option<EventId>) -> Result<Vec<TeamPick>>;
    /// Every team pick for one event across a league's teams.
    fn league_team_picks_for_event(
        &self,
        league: LeagueId,
        event: EventId,
    ) -> Result<Vec<TeamPick>>;
    fn insert_team_pick(&self, pick: &TeamPick) -> Result<i64>;
    fn set_team_pick_points(&self, id: i64, points: i64) -> Result<()>;
    fn update_team_total(&self, team: TeamId, total_points: i64) -> Result<()>;
    fn update_driver_season(
        &self,
        driver: DriverId,
        total_points: i64,
        average_points: f64,
    ) -> Result<()>;
    fn update_constructor_season(&self, constructor: ConstructorId, total_points: i64)
        -> Result<()>;
    fn set_event_winner(&self, event: EventId, constructor: ConstructorId) -> Result<()>;
    fn results_for_event(&self, event: EventId) -> Result<Vec<EventResult>>;
    /// Insert or replace one official result row (idempotent re-import).
    fn insert_result(&self, result: &EventResult) -> Result<()>;
}

/// Best-effort TTL cache for rendered leaderboards. Every failure is
/// recoverable: callers degrade to a direct recompute.
pub trait LeaderboardCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}
