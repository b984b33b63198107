// Clock-triggered batch operations. The scheduler itself lives outside the
// core (paddockd's interval loops, or anything else that can call on a
// timer); these functions only need to be safe to re-run. A tick that finds
// nothing to do is a success, and a single failing item never aborts the
// rest of the tick.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::engine::Engine;
use crate::model::DraftCloseRule;
use crate::scoring::points::SeasonSummary;

/// Outcome of one scoring tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoringTickSummary {
    pub season: Option<SeasonSummary>,
    pub events_scored: usize,
    pub failures: usize,
}

/// Outcome of one draft tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DraftTickSummary {
    pub auto_picks: usize,
    pub failures: usize,
}

/// Rebuild season standings, then re-score every completed event for every
/// league. The full rebuild is idempotent, so retrying after a partial
/// failure on the next tick is always safe.
pub fn run_scoring_tick(engine: &Engine) -> ScoringTickSummary {
    let mut summary = ScoringTickSummary::default();

    match engine.recompute_season_standings() {
        Ok(season) => summary.season = Some(season),
        Err(err) => {
            error!("season recompute failed: {err}");
            summary.failures += 1;
        }
    }

    let leagues = match engine.repo().leagues() {
        Ok(leagues) => leagues,
        Err(err) => {
            error!("scoring tick cannot list leagues: {err}");
            summary.failures += 1;
            return summary;
        }
    };
    let events = match engine.repo().completed_events() {
        Ok(events) => events,
        Err(err) => {
            error!("scoring tick cannot list completed events: {err}");
            summary.failures += 1;
            return summary;
        }
    };

    for league in &leagues {
        for event in &events {
            match engine.score_event(league.id, event.id) {
                Ok(updated) => {
                    if updated > 0 {
                        summary.events_scored += 1;
                    }
                }
                Err(err) => {
                    warn!(league = %league.id, event = %event.id, "event scoring failed: {err}");
                    summary.failures += 1;
                }
            }
        }
    }

    info!(
        events_scored = summary.events_scored,
        failures = summary.failures,
        "scoring tick finished"
    );
    summary
}

/// Auto-pick for any pick-timer league whose current turn has been open
/// longer than the configured limit, measured from the later of order
/// creation and the latest pick. One pick per stale draft per tick; an
/// unresponsive team is drained one turn at a time rather than in a burst.
pub fn run_draft_tick(engine: &Engine, now: DateTime<Utc>) -> DraftTickSummary {
    let mut summary = DraftTickSummary::default();

    let orders = match engine.repo().draft_orders() {
        Ok(orders) => orders,
        Err(err) => {
            error!("draft tick cannot list draft orders: {err}");
            summary.failures += 1;
            return summary;
        }
    };

    for order in orders {
        let league = match engine.repo().league(order.league) {
            Ok(Some(league)) => league,
            Ok(None) => continue,
            Err(err) => {
                warn!(league = %order.league, "draft tick cannot load league: {err}");
                summary.failures += 1;
                continue;
            }
        };
        let limit_secs = match league.draft_close {
            DraftCloseRule::PickTimer { seconds } => i64::from(seconds),
            DraftCloseRule::Manual => continue,
        };

        let last_activity = match engine.repo().latest_pick_time(order.league, order.event) {
            Ok(latest) => latest.unwrap_or(order.created_at),
            Err(err) => {
                warn!(league = %order.league, "draft tick cannot read picks: {err}");
                summary.failures += 1;
                continue;
            }
        };
        if (now - last_activity).num_seconds() < limit_secs {
            continue;
        }

        match engine.auto_pick(order.league, order.event) {
            Ok(Some(pick)) => {
                info!(
                    league = %order.league,
                    event = %order.event,
                    team = %pick.team,
                    driver = %pick.driver,
                    "turn timer expired; auto-picked"
                );
                summary.auto_picks += 1;
            }
            Ok(None) => {
                debug!(league = %order.league, event = %order.event, "stale draft has nothing to pick");
            }
            Err(err) => {
                warn!(league = %order.league, event = %order.event, "auto-pick failed: {err}");
                summary.failures += 1;
            }
        }
    }

    summary
}
