// Leaderboard ranking: sort, tie-aware ranks, and the cache read-through.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{CoreError, Result};
use crate::model::{EventId, LeaderboardEntry, LeagueId, TeamId};
use crate::ports::{LeaderboardCache, Repository};

/// Cache key for a league's board: `leaderboard:league:{id}` for the season
/// view, with an `:event:{id}` suffix for the event-scoped view.
pub fn cache_key(league: LeagueId, event: Option<EventId>) -> String {
    match event {
        Some(event) => format!("leaderboard:league:{league}:event:{event}"),
        None => format!("leaderboard:league:{league}"),
    }
}

/// A single TeamPick worth at least this much counts as a win. An
/// approximation of true finishing-position tracking.
const WIN_THRESHOLD: i64 = 25;
/// A single TeamPick worth at least this much counts as a podium.
const PODIUM_THRESHOLD: i64 = 10;

/// One team's figures before ranks are assigned.
#[derive(Debug, Clone)]
struct UnrankedEntry {
    team: TeamId,
    team_name: String,
    points: i64,
    wins: u32,
    podiums: u32,
}

/// Ranks teams and serves the result through the cache port.
pub struct LeaderboardRanker {
    repo: Arc<dyn Repository>,
    cache: Arc<dyn LeaderboardCache>,
    ttl: Duration,
}

impl LeaderboardRanker {
    pub fn new(
        repo: Arc<dyn Repository>,
        cache: Arc<dyn LeaderboardCache>,
        ttl: Duration,
    ) -> Self {
        LeaderboardRanker { repo, cache, ttl }
    }

    /// Build (or fetch) the board for a league, optionally scoped to one
    /// event. Cache failures degrade to a direct recompute, never an error.
    pub fn get_leaderboard(
        &self,
        league: LeagueId,
        event: Option<EventId>,
        use_cache: bool,
    ) -> Result<Vec<LeaderboardEntry>> {
        let key = cache_key(league, event);

        if use_cache {
            match self.cache.get(&key) {
                Ok(Some(raw)) => match serde_json::from_str(&raw) {
                    Ok(entries) => {
                        debug!(%key, "leaderboard cache hit");
                        return Ok(entries);
                    }
                    Err(err) => warn!(%key, "discarding undecodable cached leaderboard: {err}"),
                },
                Ok(None) => {}
                Err(err) => warn!(%key, "leaderboard cache read failed: {err}"),
            }
        }

        let entries = self.compute(league, event)?;

        if use_cache {
            match serde_json::to_string(&entries) {
                Ok(raw) => {
                    if let Err(err) = self.cache.set_with_ttl(&key, &raw, self.ttl) {
                        warn!(%key, "leaderboard cache write failed: {err}");
                    }
                }
                Err(err) => warn!(%key, "failed to encode leaderboard for cache: {err}"),
            }
        }
        Ok(entries)
    }

    /// Drop the cached board(s) for a league. Always removes the season key;
    /// an event scope removes that event's key as well.
    pub fn invalidate(&self, league: LeagueId, event: Option<EventId>) -> Result<()> {
        self.cache.delete(&cache_key(league, None))?;
        if event.is_some() {
            self.cache.delete(&cache_key(league, event))?;
        }
        debug!(league = %league, "leaderboard invalidated");
        Ok(())
    }

    fn compute(&self, league: LeagueId, event: Option<EventId>) -> Result<Vec<LeaderboardEntry>> {
        self.repo
            .league(league)?
            .ok_or_else(|| CoreError::not_found("league", league))?;

        let mut rows = Vec::new();
        for team in self.repo.active_teams(league)? {
            let picks = self.repo.team_picks(team.id, event)?;
            let active: Vec<_> = picks.into_iter().filter(|p| p.active).collect();

            // An event-scoped board lists only teams that actually fielded
            // picks for that event; they are excluded, not scored as zero.
            if event.is_some() && active.is_empty() {
                continue;
            }

            let points = match event {
                Some(_) => active.iter().map(|p| p.points).sum(),
                None => team.total_points,
            };
            let wins = active.iter().filter(|p| p.points >= WIN_THRESHOLD).count() as u32;
            let podiums = active
                .iter()
                .filter(|p| p.points >= PODIUM_THRESHOLD)
                .count() as u32;

            rows.push(UnrankedEntry {
                team: team.id,
                team_name: team.name,
                points,
                wins,
                podiums,
            });
        }

        Ok(rank(rows))
    }
}

/// Sort and assign ranks with standard competition ranking ("1-2-2-4"):
/// a tie group shares the rank of its first member, every member of the
/// group is flagged tied, and the entry after the group takes `index + 1`.
fn rank(mut rows: Vec<UnrankedEntry>) -> Vec<LeaderboardEntry> {
    rows.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then(b.wins.cmp(&a.wins))
            .then(b.podiums.cmp(&a.podiums))
            .then_with(|| a.team_name.to_lowercase().cmp(&b.team_name.to_lowercase()))
    });

    let mut entries: Vec<LeaderboardEntry> = Vec::with_capacity(rows.len());
    let mut group_rank = 0;
    for (index, row) in rows.into_iter().enumerate() {
        let mut tied = false;
        if let Some(prev) = entries.last_mut() {
            if prev.points == row.points && prev.wins == row.wins && prev.podiums == row.podiums {
                prev.tied = true;
                tied = true;
            }
        }
        if !tied {
            group_rank = index as u32 + 1;
        }
        entries.push(LeaderboardEntry {
            rank: group_rank,
            team: row.team,
            team_name: row.team_name,
            points: row.points,
            wins: row.wins,
            podiums: row.podiums,
            tied,
        });
    }
    entries
}
