// SQLite implementation of the Repository port.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode};

use crate::error::{CoreError, Result};
use crate::model::{
    AutoPickStrategyKind, Constructor, ConstructorId, DraftCloseRule, DraftMethod, DraftOrder,
    DraftPick, Driver, DriverId, EventId, EventResult, EventStatus, FantasyTeam, League, LeagueId,
    PickSelection, RaceEvent, ResultStatus, TeamId, TeamPick, UserId,
};
use crate::ports::Repository;

/// SQLite-backed store for leagues, drafts, picks, and results.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database at `path` and ensure all tables exist.
    /// Pass `":memory:"` for an ephemeral in-memory database (useful for
    /// tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| storage(format!("failed to open database at {path}"), e))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(|e| storage("failed to set database pragmas", e))?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS leagues (
                id                 INTEGER PRIMARY KEY,
                name               TEXT NOT NULL,
                max_teams          INTEGER NOT NULL,
                draft_method       TEXT NOT NULL,
                draft_close        TEXT NOT NULL,
                auto_pick_strategy TEXT NOT NULL,
                commissioner       INTEGER NOT NULL,
                scoring_override   TEXT
            );

            CREATE TABLE IF NOT EXISTS events (
                id                  INTEGER PRIMARY KEY,
                name                TEXT NOT NULL,
                round               INTEGER NOT NULL,
                status              TEXT NOT NULL,
                starts_at           TEXT NOT NULL,
                winning_constructor INTEGER
            );

            CREATE TABLE IF NOT EXISTS constructors (
                id           INTEGER PRIMARY KEY,
                name         TEXT NOT NULL,
                price        INTEGER NOT NULL,
                total_points INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS drivers (
                id             INTEGER PRIMARY KEY,
                name           TEXT NOT NULL,
                constructor    INTEGER NOT NULL REFERENCES constructors(id),
                price          INTEGER NOT NULL,
                total_points   INTEGER NOT NULL DEFAULT 0,
                average_points REAL NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS teams (
                id               INTEGER PRIMARY KEY,
                owner            INTEGER NOT NULL,
                league           INTEGER NOT NULL REFERENCES leagues(id),
                name             TEXT NOT NULL,
                total_points     INTEGER NOT NULL DEFAULT 0,
                budget_remaining INTEGER NOT NULL DEFAULT 0,
                active           INTEGER NOT NULL DEFAULT 1,
                UNIQUE(owner, league)
            );

            CREATE TABLE IF NOT EXISTS draft_orders (
                league     INTEGER NOT NULL,
                event      INTEGER NOT NULL,
                sequence   TEXT NOT NULL,
                method     TEXT NOT NULL,
                locked     INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                PRIMARY KEY (league, event)
            );

            CREATE TABLE IF NOT EXISTS draft_picks (
                league       INTEGER NOT NULL,
                event        INTEGER NOT NULL,
                pick_number  INTEGER NOT NULL,
                round        INTEGER NOT NULL,
                position     INTEGER NOT NULL,
                team         INTEGER NOT NULL,
                driver       INTEGER NOT NULL,
                is_auto_pick INTEGER NOT NULL,
                picked_at    TEXT NOT NULL,
                PRIMARY KEY (league, event, pick_number),
                UNIQUE (league, event, driver)
            );

            CREATE TABLE IF NOT EXISTS team_picks (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                team      INTEGER NOT NULL REFERENCES teams(id),
                event     INTEGER NOT NULL,
                kind      TEXT NOT NULL,
                selection INTEGER NOT NULL,
                points    INTEGER NOT NULL DEFAULT 0,
                active    INTEGER NOT NULL DEFAULT 1
            );

            CREATE INDEX IF NOT EXISTS idx_team_picks_team_event
                ON team_picks(team, event);

            CREATE TABLE IF NOT EXISTS event_results (
                event       INTEGER NOT NULL,
                driver      INTEGER NOT NULL,
                position    INTEGER NOT NULL,
                status      TEXT NOT NULL,
                points      INTEGER NOT NULL,
                fastest_lap INTEGER NOT NULL,
                PRIMARY KEY (event, driver)
            );
            ",
        )
        .map_err(|e| storage("failed to create database schema", e))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Seeding (admin surface and tests)
    // ------------------------------------------------------------------

    pub fn insert_league(&self, league: &League) -> Result<()> {
        let close_json = serde_json::to_string(&league.draft_close)
            .map_err(|e| CoreError::Storage(format!("failed to encode draft_close: {e}")))?;
        self.conn()
            .execute(
                "INSERT INTO leagues
                    (id, name, max_teams, draft_method, draft_close, auto_pick_strategy,
                     commissioner, scoring_override)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    league.id.0,
                    league.name,
                    league.max_teams,
                    league.draft_method.as_str(),
                    close_json,
                    league.auto_pick_strategy.as_str(),
                    league.commissioner.0,
                    league.scoring_override,
                ],
            )
            .map_err(|e| map_insert_err("league", e))?;
        Ok(())
    }

    pub fn insert_event(&self, event: &RaceEvent) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO events (id, name, round, status, starts_at, winning_constructor)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    event.id.0,
                    event.name,
                    event.round,
                    event.status.as_str(),
                    event.starts_at.to_rfc3339(),
                    event.winning_constructor.map(|c| c.0),
                ],
            )
            .map_err(|e| map_insert_err("event", e))?;
        Ok(())
    }

    pub fn insert_constructor(&self, constructor: &Constructor) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO constructors (id, name, price, total_points)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    constructor.id.0,
                    constructor.name,
                    constructor.price,
                    constructor.total_points,
                ],
            )
            .map_err(|e| map_insert_err("constructor", e))?;
        Ok(())
    }

    pub fn insert_driver(&self, driver: &Driver) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO drivers (id, name, constructor, price, total_points, average_points)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    driver.id.0,
                    driver.name,
                    driver.constructor.0,
                    driver.price,
                    driver.total_points,
                    driver.average_points,
                ],
            )
            .map_err(|e| map_insert_err("driver", e))?;
        Ok(())
    }

    /// Insert a team. The `(owner, league)` unique index enforces one team
    /// per user per league; a duplicate maps to `Conflict`.
    pub fn insert_team(&self, team: &FantasyTeam) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO teams (id, owner, league, name, total_points, budget_remaining, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    team.id.0,
                    team.owner.0,
                    team.league.0,
                    team.name,
                    team.total_points,
                    team.budget_remaining,
                    team.active,
                ],
            )
            .map_err(|e| map_insert_err("team", e))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error mapping and row decoding helpers
// ---------------------------------------------------------------------------

fn storage(context: impl Into<String>, err: rusqlite::Error) -> CoreError {
    CoreError::Storage(format!("{}: {err}", context.into()))
}

/// Constraint violations on insert are conflicts (duplicate key); anything
/// else is a storage failure.
fn map_insert_err(entity: &str, err: rusqlite::Error) -> CoreError {
    if let rusqlite::Error::SqliteFailure(code, _) = &err {
        if code.code == ErrorCode::ConstraintViolation {
            return CoreError::Conflict(format!("duplicate {entity}: {err}"));
        }
    }
    storage(format!("failed to insert {entity}"), err)
}

fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn parse_enum<T>(raw: &str, parse: fn(&str) -> Option<T>, what: &str) -> std::result::Result<T, rusqlite::Error> {
    parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unrecognized {what}: {raw}").into(),
        )
    })
}

fn league_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<League, rusqlite::Error> {
    let method_raw: String = row.get(3)?;
    let close_raw: String = row.get(4)?;
    let strategy_raw: String = row.get(5)?;
    let draft_close: DraftCloseRule = serde_json::from_str(&close_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(League {
        id: LeagueId(row.get(0)?),
        name: row.get(1)?,
        max_teams: row.get(2)?,
        draft_method: parse_enum(&method_raw, DraftMethod::parse, "draft method")?,
        draft_close,
        auto_pick_strategy: parse_enum(
            &strategy_raw,
            AutoPickStrategyKind::parse,
            "auto-pick strategy",
        )?,
        commissioner: UserId(row.get(6)?),
        scoring_override: row.get(7)?,
    })
}

fn event_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<RaceEvent, rusqlite::Error> {
    let status_raw: String = row.get(3)?;
    let starts_raw: String = row.get(4)?;
    let winner: Option<i64> = row.get(5)?;
    Ok(RaceEvent {
        id: EventId(row.get(0)?),
        name: row.get(1)?,
        round: row.get(2)?,
        status: parse_enum(&status_raw, EventStatus::parse, "event status")?,
        starts_at: parse_timestamp(&starts_raw)?,
        winning_constructor: winner.map(ConstructorId),
    })
}

fn team_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<FantasyTeam, rusqlite::Error> {
    Ok(FantasyTeam {
        id: TeamId(row.get(0)?),
        owner: UserId(row.get(1)?),
        league: LeagueId(row.get(2)?),
        name: row.get(3)?,
        total_points: row.get(4)?,
        budget_remaining: row.get(5)?,
        active: row.get(6)?,
    })
}

fn driver_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<Driver, rusqlite::Error> {
    Ok(Driver {
        id: DriverId(row.get(0)?),
        name: row.get(1)?,
        constructor: ConstructorId(row.get(2)?),
        price: row.get(3)?,
        total_points: row.get(4)?,
        average_points: row.get(5)?,
    })
}

fn pick_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<DraftPick, rusqlite::Error> {
    let picked_raw: String = row.get(8)?;
    Ok(DraftPick {
        league: LeagueId(row.get(0)?),
        event: EventId(row.get(1)?),
        pick_number: row.get(2)?,
        round: row.get(3)?,
        position: row.get(4)?,
        team: TeamId(row.get(5)?),
        driver: DriverId(row.get(6)?),
        is_auto_pick: row.get(7)?,
        picked_at: parse_timestamp(&picked_raw)?,
    })
}

fn team_pick_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<TeamPick, rusqlite::Error> {
    let kind: String = row.get(3)?;
    let raw_id: i64 = row.get(4)?;
    let selection = match kind.as_str() {
        "driver" => PickSelection::Driver(DriverId(raw_id)),
        "constructor" => PickSelection::Constructor(ConstructorId(raw_id)),
        other => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unrecognized pick kind: {other}").into(),
            ))
        }
    };
    Ok(TeamPick {
        id: row.get(0)?,
        team: TeamId(row.get(1)?),
        event: EventId(row.get(2)?),
        selection,
        points: row.get(5)?,
        active: row.get(6)?,
    })
}

fn result_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<EventResult, rusqlite::Error> {
    let status_raw: String = row.get(3)?;
    Ok(EventResult {
        event: EventId(row.get(0)?),
        driver: DriverId(row.get(1)?),
        position: row.get(2)?,
        status: parse_enum(&status_raw, ResultStatus::parse, "result status")?,
        points: row.get(4)?,
        fastest_lap: row.get(5)?,
    })
}

fn selection_columns(selection: PickSelection) -> (&'static str, i64) {
    match selection {
        PickSelection::Driver(id) => ("driver", id.0),
        PickSelection::Constructor(id) => ("constructor", id.0),
    }
}

// ---------------------------------------------------------------------------
// Repository implementation
// ---------------------------------------------------------------------------

const LEAGUE_COLUMNS: &str = "id, name, max_teams, draft_method, draft_close, \
                              auto_pick_strategy, commissioner, scoring_override";
const EVENT_COLUMNS: &str = "id, name, round, status, starts_at, winning_constructor";
const TEAM_COLUMNS: &str = "id, owner, league, name, total_points, budget_remaining, active";
const DRIVER_COLUMNS: &str = "id, name, constructor, price, total_points, average_points";
const PICK_COLUMNS: &str =
    "league, event, pick_number, round, position, team, driver, is_auto_pick, picked_at";
const TEAM_PICK_COLUMNS: &str = "id, team, event, kind, selection, points, active";
const RESULT_COLUMNS: &str = "event, driver, position, status, points, fastest_lap";

impl Repository for SqliteStore {
    fn league(&self, id: LeagueId) -> Result<Option<League>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!("SELECT {LEAGUE_COLUMNS} FROM leagues WHERE id = ?1"))
            .map_err(|e| storage("failed to prepare league query", e))?;
        let mut rows = stmt
            .query_map(params![id.0], league_from_row)
            .map_err(|e| storage("failed to query league", e))?;
        rows.next()
            .transpose()
            .map_err(|e| storage("failed to decode league row", e))
    }

    fn leagues(&self) -> Result<Vec<League>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!("SELECT {LEAGUE_COLUMNS} FROM leagues ORDER BY id"))
            .map_err(|e| storage("failed to prepare leagues query", e))?;
        let leagues = stmt
            .query_map([], league_from_row)
            .map_err(|e| storage("failed to query leagues", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| storage("failed to decode league rows", e))?;
        Ok(leagues)
    }

    fn event(&self, id: EventId) -> Result<Option<RaceEvent>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"))
            .map_err(|e| storage("failed to prepare event query", e))?;
        let mut rows = stmt
            .query_map(params![id.0], event_from_row)
            .map_err(|e| storage("failed to query event", e))?;
        rows.next()
            .transpose()
            .map_err(|e| storage("failed to decode event row", e))
    }

    fn completed_events(&self) -> Result<Vec<RaceEvent>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM events WHERE status = 'completed' ORDER BY round"
            ))
            .map_err(|e| storage("failed to prepare completed events query", e))?;
        let events = stmt
            .query_map([], event_from_row)
            .map_err(|e| storage("failed to query completed events", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| storage("failed to decode event rows", e))?;
        Ok(events)
    }

    fn driver(&self, id: DriverId) -> Result<Option<Driver>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!("SELECT {DRIVER_COLUMNS} FROM drivers WHERE id = ?1"))
            .map_err(|e| storage("failed to prepare driver query", e))?;
        let mut rows = stmt
            .query_map(params![id.0], driver_from_row)
            .map_err(|e| storage("failed to query driver", e))?;
        rows.next()
            .transpose()
            .map_err(|e| storage("failed to decode driver row", e))
    }

    fn drivers(&self) -> Result<Vec<Driver>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!("SELECT {DRIVER_COLUMNS} FROM drivers ORDER BY id"))
            .map_err(|e| storage("failed to prepare drivers query", e))?;
        let drivers = stmt
            .query_map([], driver_from_row)
            .map_err(|e| storage("failed to query drivers", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| storage("failed to decode driver rows", e))?;
        Ok(drivers)
    }

    fn constructors(&self) -> Result<Vec<Constructor>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, name, price, total_points FROM constructors ORDER BY id")
            .map_err(|e| storage("failed to prepare constructors query", e))?;
        let constructors = stmt
            .query_map([], |row| {
                Ok(Constructor {
                    id: ConstructorId(row.get(0)?),
                    name: row.get(1)?,
                    price: row.get(2)?,
                    total_points: row.get(3)?,
                })
            })
            .map_err(|e| storage("failed to query constructors", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| storage("failed to decode constructor rows", e))?;
        Ok(constructors)
    }

    fn active_teams(&self, league: LeagueId) -> Result<Vec<FantasyTeam>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TEAM_COLUMNS} FROM teams WHERE league = ?1 AND active = 1 ORDER BY id"
            ))
            .map_err(|e| storage("failed to prepare active teams query", e))?;
        let teams = stmt
            .query_map(params![league.0], team_from_row)
            .map_err(|e| storage("failed to query active teams", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| storage("failed to decode team rows", e))?;
        Ok(teams)
    }

    fn draft_order(&self, league: LeagueId, event: EventId) -> Result<Option<DraftOrder>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT sequence, method, locked, created_at
                 FROM draft_orders WHERE league = ?1 AND event = ?2",
            )
            .map_err(|e| storage("failed to prepare draft order query", e))?;
        let mut rows = stmt
            .query_map(params![league.0, event.0], |row| {
                let sequence_json: String = row.get(0)?;
                let method_raw: String = row.get(1)?;
                let created_raw: String = row.get(3)?;
                // Decode the JSON sequence once, here at the boundary.
                let raw_ids: Vec<i64> = serde_json::from_str(&sequence_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(DraftOrder {
                    league,
                    event,
                    sequence: raw_ids.into_iter().map(TeamId).collect(),
                    method: parse_enum(&method_raw, DraftMethod::parse, "draft method")?,
                    locked: row.get(2)?,
                    created_at: parse_timestamp(&created_raw)?,
                })
            })
            .map_err(|e| storage("failed to query draft order", e))?;
        rows.next()
            .transpose()
            .map_err(|e| storage("failed to decode draft order row", e))
    }

    fn draft_orders(&self) -> Result<Vec<DraftOrder>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT league, event, sequence, method, locked, created_at
                 FROM draft_orders ORDER BY league, event",
            )
            .map_err(|e| storage("failed to prepare draft orders query", e))?;
        let orders = stmt
            .query_map([], |row| {
                let league = LeagueId(row.get(0)?);
                let event = EventId(row.get(1)?);
                let sequence_json: String = row.get(2)?;
                let method_raw: String = row.get(3)?;
                let created_raw: String = row.get(5)?;
                let raw_ids: Vec<i64> = serde_json::from_str(&sequence_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        2,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(DraftOrder {
                    league,
                    event,
                    sequence: raw_ids.into_iter().map(TeamId).collect(),
                    method: parse_enum(&method_raw, DraftMethod::parse, "draft method")?,
                    locked: row.get(4)?,
                    created_at: parse_timestamp(&created_raw)?,
                })
            })
            .map_err(|e| storage("failed to query draft orders", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| storage("failed to decode draft order rows", e))?;
        Ok(orders)
    }

    fn insert_draft_order(&self, order: &DraftOrder) -> Result<()> {
        let sequence_json = encode_sequence(&order.sequence)?;
        self.conn()
            .execute(
                "INSERT INTO draft_orders (league, event, sequence, method, locked, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    order.league.0,
                    order.event.0,
                    sequence_json,
                    order.method.as_str(),
                    order.locked,
                    order.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| map_insert_err("draft order", e))?;
        Ok(())
    }

    fn replace_draft_order(&self, order: &DraftOrder) -> Result<()> {
        let sequence_json = encode_sequence(&order.sequence)?;
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO draft_orders
                    (league, event, sequence, method, locked, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    order.league.0,
                    order.event.0,
                    sequence_json,
                    order.method.as_str(),
                    order.locked,
                    order.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| storage("failed to replace draft order", e))?;
        Ok(())
    }

    fn count_picks(&self, league: LeagueId, event: EventId) -> Result<u32> {
        let count: i64 = self
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM draft_picks WHERE league = ?1 AND event = ?2",
                params![league.0, event.0],
                |row| row.get(0),
            )
            .map_err(|e| storage("failed to count draft picks", e))?;
        Ok(count as u32)
    }

    fn picks(&self, league: LeagueId, event: EventId) -> Result<Vec<DraftPick>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {PICK_COLUMNS} FROM draft_picks
                 WHERE league = ?1 AND event = ?2 ORDER BY pick_number"
            ))
            .map_err(|e| storage("failed to prepare picks query", e))?;
        let picks = stmt
            .query_map(params![league.0, event.0], pick_from_row)
            .map_err(|e| storage("failed to query picks", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| storage("failed to decode pick rows", e))?;
        Ok(picks)
    }

    fn append_pick(&self, pick: &DraftPick) -> Result<()> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO draft_picks ({PICK_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    pick.league.0,
                    pick.event.0,
                    pick.pick_number,
                    pick.round,
                    pick.position,
                    pick.team.0,
                    pick.driver.0,
                    pick.is_auto_pick,
                    pick.picked_at.to_rfc3339(),
                ],
            )
            .map_err(|e| map_insert_err("draft pick", e))?;
        Ok(())
    }

    fn team_picks(&self, team: TeamId, event: Option<EventId>) -> Result<Vec<TeamPick>> {
        let conn = self.conn();
        let picks = match event {
            Some(event) => {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {TEAM_PICK_COLUMNS} FROM team_picks
                         WHERE team = ?1 AND event = ?2 ORDER BY id"
                    ))
                    .map_err(|e| storage("failed to prepare team picks query", e))?;
                let rows = stmt
                    .query_map(params![team.0, event.0], team_pick_from_row)
                    .map_err(|e| storage("failed to query team picks", e))?
                    .collect::<std::result::Result<Vec<_>, _>>();
                rows
            }
            None => {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {TEAM_PICK_COLUMNS} FROM team_picks WHERE team = ?1 ORDER BY id"
                    ))
                    .map_err(|e| storage("failed to prepare team picks query", e))?;
                let rows = stmt
                    .query_map(params![team.0], team_pick_from_row)
                    .map_err(|e| storage("failed to query team picks", e))?
                    .collect::<std::result::Result<Vec<_>, _>>();
                rows
            }
        }
        .map_err(|e| storage("failed to decode team pick rows", e))?;
        Ok(picks)
    }

    fn league_team_picks_for_event(
        &self,
        league: LeagueId,
        event: EventId,
    ) -> Result<Vec<TeamPick>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT tp.id, tp.team, tp.event, tp.kind, tp.selection, tp.points, tp.active
                 FROM team_picks tp JOIN teams t ON t.id = tp.team
                 WHERE t.league = ?1 AND tp.event = ?2 ORDER BY tp.id"
            ))
            .map_err(|e| storage("failed to prepare league team picks query", e))?;
        let picks = stmt
            .query_map(params![league.0, event.0], team_pick_from_row)
            .map_err(|e| storage("failed to query league team picks", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| storage("failed to decode team pick rows", e))?;
        Ok(picks)
    }

    fn insert_team_pick(&self, pick: &TeamPick) -> Result<i64> {
        let (kind, selection_id) = selection_columns(pick.selection);
        let conn = self.conn();
        conn.execute(
            "INSERT INTO team_picks (team, event, kind, selection, points, active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                pick.team.0,
                pick.event.0,
                kind,
                selection_id,
                pick.points,
                pick.active,
            ],
        )
        .map_err(|e| map_insert_err("team pick", e))?;
        Ok(conn.last_insert_rowid())
    }

    fn set_team_pick_points(&self, id: i64, points: i64) -> Result<()> {
        self.conn()
            .execute(
                "UPDATE team_picks SET points = ?2 WHERE id = ?1",
                params![id, points],
            )
            .map_err(|e| storage("failed to update team pick points", e))?;
        Ok(())
    }

    fn update_team_total(&self, team: TeamId, total_points: i64) -> Result<()> {
        self.conn()
            .execute(
                "UPDATE teams SET total_points = ?2 WHERE id = ?1",
                params![team.0, total_points],
            )
            .map_err(|e| storage("failed to update team total", e))?;
        Ok(())
    }

    fn update_driver_season(
        &self,
        driver: DriverId,
        total_points: i64,
        average_points: f64,
    ) -> Result<()> {
        self.conn()
            .execute(
                "UPDATE drivers SET total_points = ?2, average_points = ?3 WHERE id = ?1",
                params![driver.0, total_points, average_points],
            )
            .map_err(|e| storage("failed to update driver season totals", e))?;
        Ok(())
    }

    fn update_constructor_season(
        &self,
        constructor: ConstructorId,
        total_points: i64,
    ) -> Result<()> {
        self.conn()
            .execute(
                "UPDATE constructors SET total_points = ?2 WHERE id = ?1",
                params![constructor.0, total_points],
            )
            .map_err(|e| storage("failed to update constructor season totals", e))?;
        Ok(())
    }

    fn set_event_winner(&self, event: EventId, constructor: ConstructorId) -> Result<()> {
        self.conn()
            .execute(
                "UPDATE events SET winning_constructor = ?2 WHERE id = ?1",
                params![event.0, constructor.0],
            )
            .map_err(|e| storage("failed to set event winner", e))?;
        Ok(())
    }

    fn results_for_event(&self, event: EventId) -> Result<Vec<EventResult>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {RESULT_COLUMNS} FROM event_results WHERE event = ?1 ORDER BY position"
            ))
            .map_err(|e| storage("failed to prepare results query", e))?;
        let results = stmt
            .query_map(params![event.0], result_from_row)
            .map_err(|e| storage("failed to query results", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| storage("failed to decode result rows", e))?;
        Ok(results)
    }

    fn insert_result(&self, result: &EventResult) -> Result<()> {
        self.conn()
            .execute(
                &format!(
                    "INSERT OR REPLACE INTO event_results ({RESULT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                ),
                params![
                    result.event.0,
                    result.driver.0,
                    result.position,
                    result.status.as_str(),
                    result.points,
                    result.fastest_lap,
                ],
            )
            .map_err(|e| storage("failed to insert event result", e))?;
        Ok(())
    }
}

fn encode_sequence(sequence: &[TeamId]) -> Result<String> {
    let raw: Vec<i64> = sequence.iter().map(|t| t.0).collect();
    serde_json::to_string(&raw)
        .map_err(|e| CoreError::Storage(format!("failed to encode order sequence: {e}")))
}
