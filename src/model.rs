// Domain records shared by the draft and scoring engines.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of rounds in every draft. The total pick count for a draft is
/// always `active team count * ROUNDS_PER_DRAFT`.
pub const ROUNDS_PER_DRAFT: u32 = 5;

// ---------------------------------------------------------------------------
// Id newtypes
// ---------------------------------------------------------------------------

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

id_type!(
    /// A league: one competition instance containing multiple fantasy teams.
    LeagueId
);
id_type!(
    /// A race event (one real-world round producing official results).
    EventId
);
id_type!(
    /// A fantasy team within a league.
    TeamId
);
id_type!(
    /// A real-world driver, draftable onto fantasy teams.
    DriverId
);
id_type!(
    /// A real-world constructor (the drivers' organization).
    ConstructorId
);
id_type!(
    /// The account that owns a fantasy team. Accounts themselves live
    /// outside this crate.
    UserId
);

// ---------------------------------------------------------------------------
// Enums persisted as text
// ---------------------------------------------------------------------------

/// How a league's draft order is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftMethod {
    Sequential,
    Snake,
    Random,
}

impl DraftMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftMethod::Sequential => "sequential",
            DraftMethod::Snake => "snake",
            DraftMethod::Random => "random",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sequential" => Some(DraftMethod::Sequential),
            "snake" => Some(DraftMethod::Snake),
            "random" => Some(DraftMethod::Random),
            _ => None,
        }
    }
}

impl fmt::Display for DraftMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// When a league's draft is closed out for teams that fail to act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftCloseRule {
    /// The commissioner closes the draft by hand; no timer runs.
    Manual,
    /// Each turn has a time limit; the scheduled draft tick auto-picks for
    /// any team whose turn has been open longer than `seconds`.
    PickTimer { seconds: u32 },
}

/// Which fallback selection policy a league uses when a team fails to act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoPickStrategyKind {
    HighestAvailableId,
    HighestRankedBySeasonPoints,
    Random,
}

impl AutoPickStrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutoPickStrategyKind::HighestAvailableId => "highest_available_id",
            AutoPickStrategyKind::HighestRankedBySeasonPoints => {
                "highest_ranked_by_season_points"
            }
            AutoPickStrategyKind::Random => "random",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "highest_available_id" => Some(AutoPickStrategyKind::HighestAvailableId),
            "highest_ranked_by_season_points" => {
                Some(AutoPickStrategyKind::HighestRankedBySeasonPoints)
            }
            "random" => Some(AutoPickStrategyKind::Random),
            _ => None,
        }
    }
}

/// Lifecycle status of a race event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Upcoming,
    Completed,
    Cancelled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Upcoming => "upcoming",
            EventStatus::Completed => "completed",
            EventStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "upcoming" => Some(EventStatus::Upcoming),
            "completed" => Some(EventStatus::Completed),
            "cancelled" => Some(EventStatus::Cancelled),
            _ => None,
        }
    }
}

/// How a driver's race ended. Anything other than `Finished` keeps its raw
/// recorded points instead of the position table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Finished,
    Dnf,
    Dns,
    Dsq,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Finished => "finished",
            ResultStatus::Dnf => "dnf",
            ResultStatus::Dns => "dns",
            ResultStatus::Dsq => "dsq",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "finished" => Some(ResultStatus::Finished),
            "dnf" => Some(ResultStatus::Dnf),
            "dns" => Some(ResultStatus::Dns),
            "dsq" => Some(ResultStatus::Dsq),
            _ => None,
        }
    }

    /// True for DNF/DNS/DSQ — results that bypass the position table.
    pub fn is_non_classified(&self) -> bool {
        !matches!(self, ResultStatus::Finished)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A competition instance containing multiple fantasy teams.
///
/// `scoring_override` is a raw JSON object string mapping finishing position
/// to points (e.g. `{"1": 30, "2": 20}`). It is decoded leniently at scoring
/// time; a malformed override falls back to the default table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct League {
    pub id: LeagueId,
    pub name: String,
    pub max_teams: u32,
    pub draft_method: DraftMethod,
    pub draft_close: DraftCloseRule,
    pub auto_pick_strategy: AutoPickStrategyKind,
    /// The user allowed to regenerate draft orders.
    pub commissioner: UserId,
    #[serde(default)]
    pub scoring_override: Option<String>,
}

/// A single real-world race round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceEvent {
    pub id: EventId,
    pub name: String,
    pub round: u32,
    pub status: EventStatus,
    pub starts_at: DateTime<Utc>,
    /// Constructor with the highest points at this event, written by the
    /// season recompute. None until the event has been processed.
    #[serde(default)]
    pub winning_constructor: Option<ConstructorId>,
}

/// One user's team within a league. A user has at most one team per league.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FantasyTeam {
    pub id: TeamId,
    pub owner: UserId,
    pub league: LeagueId,
    pub name: String,
    pub total_points: i64,
    pub budget_remaining: i64,
    pub active: bool,
}

/// A real-world driver. `total_points`/`average_points` are derived season
/// aggregates overwritten by the scoring engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    pub name: String,
    pub constructor: ConstructorId,
    pub price: i64,
    pub total_points: i64,
    pub average_points: f64,
}

/// A real-world constructor. `total_points` is a derived season aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constructor {
    pub id: ConstructorId,
    pub name: String,
    pub price: i64,
    pub total_points: i64,
}

/// The ordered team sequence for one league+event draft.
///
/// The sequence is always the base (round 1) order; snake reversal is
/// applied at turn-derivation time, never baked into the stored sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftOrder {
    pub league: LeagueId,
    pub event: EventId,
    pub sequence: Vec<TeamId>,
    pub method: DraftMethod,
    /// A locked order cannot be regenerated.
    pub locked: bool,
    pub created_at: DateTime<Utc>,
}

/// One committed selection within a draft. Append-only during an active
/// draft; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftPick {
    pub league: LeagueId,
    pub event: EventId,
    /// Dense 1..N sequence per (league, event).
    pub pick_number: u32,
    pub round: u32,
    /// 1-based position within the round.
    pub position: u32,
    pub team: TeamId,
    pub driver: DriverId,
    pub is_auto_pick: bool,
    pub picked_at: DateTime<Utc>,
}

impl DraftPick {
    /// Round for a given 1-based pick number: ceil(pick_number / team_count).
    pub fn round_for(pick_number: u32, team_count: u32) -> u32 {
        pick_number.div_ceil(team_count)
    }

    /// 1-based position within the round for a given 1-based pick number.
    pub fn position_for(pick_number: u32, team_count: u32) -> u32 {
        (pick_number - 1) % team_count + 1
    }
}

/// What a TeamPick scores on: a drafted driver or a constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PickSelection {
    Driver(DriverId),
    Constructor(ConstructorId),
}

/// The scoring unit linking a fantasy team to a driver or constructor for a
/// specific event. `points` is overwritten whenever results are reprocessed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamPick {
    pub id: i64,
    pub team: TeamId,
    pub event: EventId,
    pub selection: PickSelection,
    pub points: i64,
    pub active: bool,
}

/// One driver's official outcome at one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventResult {
    pub event: EventId,
    pub driver: DriverId,
    /// Finishing position. Meaningful only when `status` is `Finished`.
    pub position: u32,
    pub status: ResultStatus,
    /// Raw recorded points. This is the value returned unmodified for
    /// non-classified results.
    pub points: i64,
    pub fastest_lap: bool,
}

/// A ranked row of the leaderboard. Derived, never persisted; rebuilt on
/// demand or served from cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub team: TeamId,
    pub team_name: String,
    pub points: i64,
    pub wins: u32,
    pub podiums: u32,
    pub tied: bool,
}
