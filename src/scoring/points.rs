// Points computation: per-driver, per-constructor, per-team, and the
// season-wide rebuild.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::{
    ConstructorId, DriverId, EventId, EventResult, PickSelection, TeamId,
};
use crate::ports::Repository;

/// Points for a classified finishing position under the default table.
/// Positions outside the top ten score zero.
pub fn position_points(position: u32) -> i64 {
    match position {
        1 => 25,
        2 => 18,
        3 => 15,
        4 => 12,
        5 => 10,
        6 => 8,
        7 => 6,
        8 => 4,
        9 => 2,
        10 => 1,
        _ => 0,
    }
}

/// Decode a league's scoring override (a JSON object mapping finishing
/// position to points). Returns `None` — falling back to the default table —
/// when the JSON is malformed, a key is not a position number, or a value is
/// not an integer. A bad override never fails the computation.
pub fn parse_scoring_override(raw: &str) -> Option<HashMap<u32, i64>> {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            warn!("ignoring malformed scoring override: {err}");
            return None;
        }
    };
    let object = match value.as_object() {
        Some(object) => object,
        None => {
            warn!("ignoring scoring override: not a JSON object");
            return None;
        }
    };

    let mut table = HashMap::with_capacity(object.len());
    for (key, val) in object {
        let position: u32 = match key.parse() {
            Ok(position) => position,
            Err(_) => {
                warn!("ignoring scoring override: bad position key `{key}`");
                return None;
            }
        };
        let points = match val.as_i64() {
            Some(points) => points,
            None => {
                warn!("ignoring scoring override: non-integer points for position {position}");
                return None;
            }
        };
        table.insert(position, points);
    }
    Some(table)
}

/// Points one driver's result is worth.
///
/// Non-classified results (DNF/DNS/DSQ) keep their raw recorded points
/// unmodified. Classified results use the override table when one is given
/// (missing positions score zero), otherwise the default table, plus the +1
/// fastest-lap bonus.
pub fn competitor_points(result: &EventResult, override_table: Option<&HashMap<u32, i64>>) -> i64 {
    if result.status.is_non_classified() {
        return result.points;
    }
    let base = match override_table {
        Some(table) => table.get(&result.position).copied().unwrap_or(0),
        None => position_points(result.position),
    };
    base + if result.fastest_lap { 1 } else { 0 }
}

/// Outcome of one season rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonSummary {
    pub events_processed: usize,
    pub constructors_updated: usize,
    pub drivers_updated: usize,
}

/// Converts official results into points. Stateless; holds only the
/// repository handle.
pub struct ScoringCalculator {
    repo: Arc<dyn Repository>,
}

impl ScoringCalculator {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        ScoringCalculator { repo }
    }

    /// Sum of `competitor_points` over every driver currently associated
    /// with `constructor` that has a result at `event`. A constructor with
    /// no matched drivers yields 0.
    pub fn organization_points(
        &self,
        event: EventId,
        constructor: ConstructorId,
        override_table: Option<&HashMap<u32, i64>>,
    ) -> Result<i64> {
        let results = self.repo.results_for_event(event)?;
        let members: std::collections::HashSet<DriverId> = self
            .repo
            .drivers()?
            .into_iter()
            .filter(|d| d.constructor == constructor)
            .map(|d| d.id)
            .collect();
        Ok(results
            .iter()
            .filter(|r| members.contains(&r.driver))
            .map(|r| competitor_points(r, override_table))
            .sum())
    }

    /// Points one team-pick selection is worth at `event`. A drafted driver
    /// with no result there scores zero.
    pub fn selection_points(
        &self,
        event: EventId,
        selection: PickSelection,
        override_table: Option<&HashMap<u32, i64>>,
    ) -> Result<i64> {
        match selection {
            PickSelection::Driver(driver) => {
                let results = self.repo.results_for_event(event)?;
                Ok(results
                    .iter()
                    .find(|r| r.driver == driver)
                    .map(|r| competitor_points(r, override_table))
                    .unwrap_or(0))
            }
            PickSelection::Constructor(constructor) => {
                self.organization_points(event, constructor, override_table)
            }
        }
    }

    /// Sum over the team's active picks for `event`, by pick kind.
    pub fn team_points(
        &self,
        team: TeamId,
        event: EventId,
        override_table: Option<&HashMap<u32, i64>>,
    ) -> Result<i64> {
        let picks = self.repo.team_picks(team, Some(event))?;
        let mut total = 0;
        for pick in picks.iter().filter(|p| p.active) {
            total += self.selection_points(event, pick.selection, override_table)?;
        }
        Ok(total)
    }

    /// Full season rebuild over every completed event: per-event constructor
    /// points and winners, season constructor totals, and driver season
    /// totals/averages. Safe to re-run at any time; the rebuild always
    /// starts from zero.
    pub fn season_recompute(&self) -> Result<SeasonSummary> {
        let events = self.repo.completed_events()?;
        let constructors = self.repo.constructors()?;
        let drivers = self.repo.drivers()?;
        let constructor_of: HashMap<DriverId, ConstructorId> =
            drivers.iter().map(|d| (d.id, d.constructor)).collect();

        let mut constructor_totals: HashMap<ConstructorId, i64> =
            constructors.iter().map(|c| (c.id, 0)).collect();
        let mut driver_totals: HashMap<DriverId, (i64, u32)> = HashMap::new();
        let mut events_processed = 0;

        for event in &events {
            let results = self.repo.results_for_event(event.id)?;
            if results.is_empty() {
                debug!(event = %event.id, "season recompute: no results yet");
                continue;
            }

            // Per-event constructor points; the first constructor seen with
            // the strictly highest score keeps the event win.
            let mut winner: Option<(ConstructorId, i64)> = None;
            for constructor in &constructors {
                let points: i64 = results
                    .iter()
                    .filter(|r| constructor_of.get(&r.driver) == Some(&constructor.id))
                    .map(|r| competitor_points(r, None))
                    .sum();
                if let Some(total) = constructor_totals.get_mut(&constructor.id) {
                    *total += points;
                }
                match winner {
                    Some((_, best)) if points <= best => {}
                    _ => winner = Some((constructor.id, points)),
                }
            }
            if let Some((org, _)) = winner {
                self.repo.set_event_winner(event.id, org)?;
            }

            for result in &results {
                let entry = driver_totals.entry(result.driver).or_insert((0, 0));
                entry.0 += competitor_points(result, None);
                entry.1 += 1;
            }
            events_processed += 1;
        }

        for constructor in &constructors {
            let total = constructor_totals.get(&constructor.id).copied().unwrap_or(0);
            self.repo.update_constructor_season(constructor.id, total)?;
        }
        for driver in &drivers {
            let (total, counted) = driver_totals.get(&driver.id).copied().unwrap_or((0, 0));
            let average = if counted > 0 {
                total as f64 / counted as f64
            } else {
                0.0
            };
            self.repo.update_driver_season(driver.id, total, average)?;
        }

        let summary = SeasonSummary {
            events_processed,
            constructors_updated: constructors.len(),
            drivers_updated: drivers.len(),
        };
        info!(
            events = summary.events_processed,
            constructors = summary.constructors_updated,
            drivers = summary.drivers_updated,
            "season recompute finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Constructor, Driver, EventStatus, RaceEvent, ResultStatus,
    };
    use crate::store::SqliteStore;
    use chrono::{TimeZone, Utc};

    fn result(driver: i64, position: u32, status: ResultStatus, fastest_lap: bool) -> EventResult {
        EventResult {
            event: EventId(1),
            driver: DriverId(driver),
            position,
            status,
            points: 0,
            fastest_lap,
        }
    }

    // ------------------------------------------------------------------
    // competitor_points
    // ------------------------------------------------------------------

    #[test]
    fn winner_with_fastest_lap_scores_26() {
        let r = result(1, 1, ResultStatus::Finished, true);
        assert_eq!(competitor_points(&r, None), 26);
    }

    #[test]
    fn default_table_values() {
        let expected = [
            (1, 25),
            (2, 18),
            (3, 15),
            (4, 12),
            (5, 10),
            (6, 8),
            (7, 6),
            (8, 4),
            (9, 2),
            (10, 1),
        ];
        for (position, points) in expected {
            let r = result(1, position, ResultStatus::Finished, false);
            assert_eq!(competitor_points(&r, None), points, "position {position}");
        }
    }

    #[test]
    fn position_outside_table_scores_zero_plus_bonus() {
        let r = result(1, 11, ResultStatus::Finished, false);
        assert_eq!(competitor_points(&r, None), 0);
        let r = result(1, 11, ResultStatus::Finished, true);
        assert_eq!(competitor_points(&r, None), 1);
    }

    #[test]
    fn non_classified_keeps_raw_points() {
        for status in [ResultStatus::Dnf, ResultStatus::Dns, ResultStatus::Dsq] {
            let r = EventResult {
                points: 3,
                fastest_lap: true,
                ..result(1, 1, status, true)
            };
            // Raw points come back unmodified regardless of position or
            // fastest lap.
            assert_eq!(competitor_points(&r, None), 3);
        }
    }

    #[test]
    fn override_takes_precedence_and_missing_positions_score_zero() {
        let table: HashMap<u32, i64> = [(1, 30), (2, 20)].into_iter().collect();
        let first = result(1, 1, ResultStatus::Finished, false);
        assert_eq!(competitor_points(&first, Some(&table)), 30);
        let third = result(1, 3, ResultStatus::Finished, false);
        assert_eq!(competitor_points(&third, Some(&table)), 0);
        let first_fl = result(1, 1, ResultStatus::Finished, true);
        assert_eq!(competitor_points(&first_fl, Some(&table)), 31);
    }

    // ------------------------------------------------------------------
    // parse_scoring_override
    // ------------------------------------------------------------------

    #[test]
    fn override_parses_well_formed_json() {
        let table = parse_scoring_override(r#"{"1": 30, "2": 20}"#).unwrap();
        assert_eq!(table.get(&1), Some(&30));
        assert_eq!(table.get(&2), Some(&20));
    }

    #[test]
    fn override_rejects_malformed_input() {
        assert!(parse_scoring_override("not json").is_none());
        assert!(parse_scoring_override(r#"[1, 2]"#).is_none());
        assert!(parse_scoring_override(r#"{"abc": 10}"#).is_none());
        assert!(parse_scoring_override(r#"{"1": "ten"}"#).is_none());
        assert!(parse_scoring_override(r#"{"1": 1.5}"#).is_none());
    }

    // ------------------------------------------------------------------
    // Repository-backed computations
    // ------------------------------------------------------------------

    fn seeded_store() -> Arc<SqliteStore> {
        let store = Arc::new(SqliteStore::open(":memory:").unwrap());
        for (id, name) in [(1, "Apex GP"), (2, "Velo Corse")] {
            store
                .insert_constructor(&Constructor {
                    id: ConstructorId(id),
                    name: name.into(),
                    price: 30,
                    total_points: 0,
                })
                .unwrap();
        }
        // Drivers 1,2 race for constructor 1; drivers 3,4 for constructor 2.
        for id in 1..=4 {
            store
                .insert_driver(&Driver {
                    id: DriverId(id),
                    name: format!("Driver {id}"),
                    constructor: ConstructorId(if id <= 2 { 1 } else { 2 }),
                    price: 10,
                    total_points: 0,
                    average_points: 0.0,
                })
                .unwrap();
        }
        store
            .insert_event(&RaceEvent {
                id: EventId(1),
                name: "Round 1".into(),
                round: 1,
                status: EventStatus::Completed,
                starts_at: Utc.timestamp_opt(1_750_000_000, 0).unwrap(),
                winning_constructor: None,
            })
            .unwrap();
        store
    }

    fn seed_round_one_results(store: &SqliteStore) {
        // P1 driver 1 (fastest lap), P2 driver 3, P3 driver 2, DNF driver 4.
        store
            .insert_result(&result(1, 1, ResultStatus::Finished, true))
            .unwrap();
        store
            .insert_result(&result(3, 2, ResultStatus::Finished, false))
            .unwrap();
        store
            .insert_result(&result(2, 3, ResultStatus::Finished, false))
            .unwrap();
        store
            .insert_result(&result(4, 18, ResultStatus::Dnf, false))
            .unwrap();
    }

    #[test]
    fn organization_points_sums_member_drivers() {
        let store = seeded_store();
        seed_round_one_results(&store);
        let calc = ScoringCalculator::new(store);

        // Constructor 1: 26 (P1 + FL) + 15 (P3) = 41.
        assert_eq!(
            calc.organization_points(EventId(1), ConstructorId(1), None)
                .unwrap(),
            41
        );
        // Constructor 2: 18 (P2) + 0 (DNF raw) = 18.
        assert_eq!(
            calc.organization_points(EventId(1), ConstructorId(2), None)
                .unwrap(),
            18
        );
    }

    #[test]
    fn organization_with_no_matched_drivers_scores_zero() {
        let store = seeded_store();
        seed_round_one_results(&store);
        let calc = ScoringCalculator::new(store);
        assert_eq!(
            calc.organization_points(EventId(1), ConstructorId(99), None)
                .unwrap(),
            0
        );
    }

    #[test]
    fn selection_points_for_driver_without_result_is_zero() {
        let store = seeded_store();
        let calc = ScoringCalculator::new(store);
        assert_eq!(
            calc.selection_points(EventId(1), PickSelection::Driver(DriverId(1)), None)
                .unwrap(),
            0
        );
    }

    #[test]
    fn team_points_sums_active_picks_by_kind() {
        let store = seeded_store();
        seed_round_one_results(&store);
        use crate::ports::Repository;
        store
            .insert_league(&crate::model::League {
                id: crate::model::LeagueId(1),
                name: "League".into(),
                max_teams: 10,
                draft_method: crate::model::DraftMethod::Sequential,
                draft_close: crate::model::DraftCloseRule::Manual,
                auto_pick_strategy: crate::model::AutoPickStrategyKind::HighestAvailableId,
                commissioner: crate::model::UserId(1),
                scoring_override: None,
            })
            .unwrap();
        store
            .insert_team(&crate::model::FantasyTeam {
                id: TeamId(1),
                owner: crate::model::UserId(1),
                league: crate::model::LeagueId(1),
                name: "Aurora".into(),
                total_points: 0,
                budget_remaining: 100,
                active: true,
            })
            .unwrap();
        // One driver pick (P1 + FL = 26), one constructor pick (Velo
        // Corse = 18), and one inactive pick that must not count.
        for (selection, active) in [
            (PickSelection::Driver(DriverId(1)), true),
            (PickSelection::Constructor(ConstructorId(2)), true),
            (PickSelection::Driver(DriverId(3)), false),
        ] {
            store
                .insert_team_pick(&crate::model::TeamPick {
                    id: 0,
                    team: TeamId(1),
                    event: EventId(1),
                    selection,
                    points: 0,
                    active,
                })
                .unwrap();
        }

        let calc = ScoringCalculator::new(store);
        assert_eq!(calc.team_points(TeamId(1), EventId(1), None).unwrap(), 44);
    }

    #[test]
    fn season_recompute_updates_totals_and_winner() {
        let store = seeded_store();
        seed_round_one_results(&store);
        let calc = ScoringCalculator::new(store.clone());

        let summary = calc.season_recompute().unwrap();
        assert_eq!(summary.events_processed, 1);
        assert_eq!(summary.constructors_updated, 2);
        assert_eq!(summary.drivers_updated, 4);

        use crate::ports::Repository;
        let constructors = store.constructors().unwrap();
        assert_eq!(constructors[0].total_points, 41);
        assert_eq!(constructors[1].total_points, 18);

        let event = store.event(EventId(1)).unwrap().unwrap();
        assert_eq!(event.winning_constructor, Some(ConstructorId(1)));

        let driver1 = store.driver(DriverId(1)).unwrap().unwrap();
        assert_eq!(driver1.total_points, 26);
        assert!((driver1.average_points - 26.0).abs() < f64::EPSILON);
    }

    #[test]
    fn season_recompute_is_idempotent() {
        let store = seeded_store();
        seed_round_one_results(&store);
        let calc = ScoringCalculator::new(store.clone());

        calc.season_recompute().unwrap();
        calc.season_recompute().unwrap();

        use crate::ports::Repository;
        let constructors = store.constructors().unwrap();
        assert_eq!(constructors[0].total_points, 41);
        assert_eq!(constructors[1].total_points, 18);
    }

    #[test]
    fn season_recompute_first_seen_keeps_win_on_tie() {
        let store = Arc::new(SqliteStore::open(":memory:").unwrap());
        for id in [1, 2] {
            store
                .insert_constructor(&Constructor {
                    id: ConstructorId(id),
                    name: format!("Constructor {id}"),
                    price: 30,
                    total_points: 0,
                })
                .unwrap();
            store
                .insert_driver(&Driver {
                    id: DriverId(id),
                    name: format!("Driver {id}"),
                    constructor: ConstructorId(id),
                    price: 10,
                    total_points: 0,
                    average_points: 0.0,
                })
                .unwrap();
        }
        store
            .insert_event(&RaceEvent {
                id: EventId(1),
                name: "Round 1".into(),
                round: 1,
                status: EventStatus::Completed,
                starts_at: Utc.timestamp_opt(1_750_000_000, 0).unwrap(),
                winning_constructor: None,
            })
            .unwrap();
        // Both drivers DNF with equal raw points: a points tie between the
        // two constructors.
        for driver in [1, 2] {
            store
                .insert_result(&EventResult {
                    event: EventId(1),
                    driver: DriverId(driver),
                    position: 15,
                    status: ResultStatus::Dnf,
                    points: 5,
                    fastest_lap: false,
                })
                .unwrap();
        }

        ScoringCalculator::new(store.clone()).season_recompute().unwrap();

        use crate::ports::Repository;
        let event = store.event(EventId(1)).unwrap().unwrap();
        assert_eq!(event.winning_constructor, Some(ConstructorId(1)));
    }

    #[test]
    fn season_recompute_with_no_completed_events_is_success() {
        let store = Arc::new(SqliteStore::open(":memory:").unwrap());
        let summary = ScoringCalculator::new(store).season_recompute().unwrap();
        assert_eq!(summary.events_processed, 0);
    }
}
