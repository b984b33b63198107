// Draft order generation: the ordered team sequence for one league+event.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::error::{CoreError, Result};
use crate::model::{DraftMethod, DraftOrder, EventId, FantasyTeam, LeagueId, TeamId, UserId};
use crate::ports::Repository;

/// Builds draft orders. Stateless; holds only the repository handle.
pub struct DraftOrderGenerator {
    repo: Arc<dyn Repository>,
}

impl DraftOrderGenerator {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        DraftOrderGenerator { repo }
    }

    /// Create the draft order for (league, event).
    ///
    /// Fails with `Conflict` if an order already exists, `NotFound` if the
    /// league or event is missing, and `Validation` if the league has no
    /// active teams or an explicit order does not match the active team set.
    pub fn create(
        &self,
        league_id: LeagueId,
        event_id: EventId,
        method: DraftMethod,
        explicit_order: Option<Vec<TeamId>>,
    ) -> Result<DraftOrder> {
        self.create_with_rng(league_id, event_id, method, explicit_order, &mut rand::thread_rng())
    }

    /// `create` with an injectable RNG so random orders are testable.
    pub fn create_with_rng<R: Rng>(
        &self,
        league_id: LeagueId,
        event_id: EventId,
        method: DraftMethod,
        explicit_order: Option<Vec<TeamId>>,
        rng: &mut R,
    ) -> Result<DraftOrder> {
        let teams = self.load_context(league_id, event_id)?;

        if self.repo.draft_order(league_id, event_id)?.is_some() {
            return Err(CoreError::Conflict(format!(
                "draft order already exists for league {league_id}, event {event_id}"
            )));
        }

        let sequence = build_sequence(&teams, method, explicit_order, rng)?;
        let order = DraftOrder {
            league: league_id,
            event: event_id,
            sequence,
            method,
            locked: false,
            created_at: Utc::now(),
        };
        self.repo.insert_draft_order(&order)?;
        info!(
            league = %league_id,
            event = %event_id,
            method = %method,
            teams = order.sequence.len(),
            "draft order created"
        );
        Ok(order)
    }

    /// Replace an existing order. Only the league commissioner may do this,
    /// and only while the order is unlocked and no picks have been made.
    pub fn regenerate(
        &self,
        league_id: LeagueId,
        event_id: EventId,
        method: DraftMethod,
        explicit_order: Option<Vec<TeamId>>,
        actor: UserId,
    ) -> Result<DraftOrder> {
        let league = self
            .repo
            .league(league_id)?
            .ok_or_else(|| CoreError::not_found("league", league_id))?;
        if league.commissioner != actor {
            return Err(CoreError::PermissionDenied(format!(
                "user {actor} may not regenerate the draft order for league {league_id}"
            )));
        }

        let existing = self
            .repo
            .draft_order(league_id, event_id)?
            .ok_or_else(|| CoreError::not_found("draft order", league_id))?;
        if existing.locked {
            return Err(CoreError::Conflict("draft order is locked".to_string()));
        }
        if self.repo.count_picks(league_id, event_id)? > 0 {
            return Err(CoreError::Conflict(
                "draft order cannot be regenerated after picks have been made".to_string(),
            ));
        }

        let teams = self.load_context(league_id, event_id)?;
        let sequence = build_sequence(&teams, method, explicit_order, &mut rand::thread_rng())?;
        let order = DraftOrder {
            league: league_id,
            event: event_id,
            sequence,
            method,
            locked: false,
            created_at: Utc::now(),
        };
        self.repo.replace_draft_order(&order)?;
        info!(league = %league_id, event = %event_id, "draft order regenerated");
        Ok(order)
    }

    /// Common existence checks; returns the league's active teams.
    fn load_context(&self, league_id: LeagueId, event_id: EventId) -> Result<Vec<FantasyTeam>> {
        self.repo
            .league(league_id)?
            .ok_or_else(|| CoreError::not_found("league", league_id))?;
        self.repo
            .event(event_id)?
            .ok_or_else(|| CoreError::not_found("event", event_id))?;
        let teams = self.repo.active_teams(league_id)?;
        if teams.is_empty() {
            return Err(CoreError::Validation(format!(
                "league {league_id} has no active teams"
            )));
        }
        Ok(teams)
    }
}

/// Produce the stored (round 1) sequence. Snake reversal is never baked in
/// here; the turn tracker applies it per round.
fn build_sequence<R: Rng>(
    teams: &[FantasyTeam],
    method: DraftMethod,
    explicit_order: Option<Vec<TeamId>>,
    rng: &mut R,
) -> Result<Vec<TeamId>> {
    let team_ids: Vec<TeamId> = teams.iter().map(|t| t.id).collect();

    if let Some(explicit) = explicit_order {
        validate_explicit(&explicit, &team_ids)?;
        return Ok(explicit);
    }

    match method {
        // Teams come back from the repository in creation order already.
        DraftMethod::Sequential | DraftMethod::Snake => Ok(team_ids),
        DraftMethod::Random => {
            let mut shuffled = team_ids;
            shuffled.shuffle(rng);
            Ok(shuffled)
        }
    }
}

/// An explicit order must be a permutation of exactly the active team set.
fn validate_explicit(explicit: &[TeamId], active: &[TeamId]) -> Result<()> {
    if explicit.len() != active.len() {
        return Err(CoreError::Validation(format!(
            "explicit order has {} teams, league has {} active teams",
            explicit.len(),
            active.len()
        )));
    }
    let explicit_set: HashSet<TeamId> = explicit.iter().copied().collect();
    if explicit_set.len() != explicit.len() {
        return Err(CoreError::Validation(
            "explicit order contains duplicate teams".to_string(),
        ));
    }
    let active_set: HashSet<TeamId> = active.iter().copied().collect();
    if explicit_set != active_set {
        return Err(CoreError::Validation(
            "explicit order does not match the league's active teams".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AutoPickStrategyKind, DraftCloseRule, EventStatus, League, RaceEvent,
    };
    use crate::store::SqliteStore;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn seeded_store(team_count: i64) -> Arc<SqliteStore> {
        let store = Arc::new(SqliteStore::open(":memory:").unwrap());
        store
            .insert_league(&League {
                id: LeagueId(1),
                name: "Test League".into(),
                max_teams: 10,
                draft_method: DraftMethod::Sequential,
                draft_close: DraftCloseRule::Manual,
                auto_pick_strategy: AutoPickStrategyKind::HighestAvailableId,
                commissioner: UserId(100),
                scoring_override: None,
            })
            .unwrap();
        store
            .insert_event(&RaceEvent {
                id: EventId(2),
                name: "Season Opener".into(),
                round: 1,
                status: EventStatus::Upcoming,
                starts_at: Utc.timestamp_opt(1_750_000_000, 0).unwrap(),
                winning_constructor: None,
            })
            .unwrap();
        for i in 1..=team_count {
            store
                .insert_team(&FantasyTeam {
                    id: TeamId(i),
                    owner: UserId(i * 10),
                    league: LeagueId(1),
                    name: format!("Team {i}"),
                    total_points: 0,
                    budget_remaining: 100,
                    active: true,
                })
                .unwrap();
        }
        store
    }

    fn generator(store: &Arc<SqliteStore>) -> DraftOrderGenerator {
        DraftOrderGenerator::new(store.clone())
    }

    #[test]
    fn sequential_order_is_creation_order_permutation() {
        let store = seeded_store(4);
        let order = generator(&store)
            .create(LeagueId(1), EventId(2), DraftMethod::Sequential, None)
            .unwrap();
        assert_eq!(
            order.sequence,
            vec![TeamId(1), TeamId(2), TeamId(3), TeamId(4)]
        );
        assert_eq!(order.method, DraftMethod::Sequential);
        assert!(!order.locked);
    }

    #[test]
    fn random_order_is_permutation_of_active_teams() {
        let store = seeded_store(6);
        let mut rng = StdRng::seed_from_u64(42);
        let order = generator(&store)
            .create_with_rng(LeagueId(1), EventId(2), DraftMethod::Random, None, &mut rng)
            .unwrap();

        let mut sorted = order.sequence.clone();
        sorted.sort();
        assert_eq!(
            sorted,
            (1..=6).map(TeamId).collect::<Vec<_>>(),
            "random order must be a permutation of the active teams"
        );
    }

    #[test]
    fn random_order_deterministic_with_seed() {
        let store_a = seeded_store(6);
        let store_b = seeded_store(6);
        let order_a = generator(&store_a)
            .create_with_rng(
                LeagueId(1),
                EventId(2),
                DraftMethod::Random,
                None,
                &mut StdRng::seed_from_u64(7),
            )
            .unwrap();
        let order_b = generator(&store_b)
            .create_with_rng(
                LeagueId(1),
                EventId(2),
                DraftMethod::Random,
                None,
                &mut StdRng::seed_from_u64(7),
            )
            .unwrap();
        assert_eq!(order_a.sequence, order_b.sequence);
    }

    #[test]
    fn explicit_order_accepted_when_exact_permutation() {
        let store = seeded_store(3);
        let explicit = vec![TeamId(3), TeamId(1), TeamId(2)];
        let order = generator(&store)
            .create(
                LeagueId(1),
                EventId(2),
                DraftMethod::Sequential,
                Some(explicit.clone()),
            )
            .unwrap();
        assert_eq!(order.sequence, explicit);
    }

    #[test]
    fn explicit_order_wrong_length_rejected() {
        let store = seeded_store(3);
        let err = generator(&store)
            .create(
                LeagueId(1),
                EventId(2),
                DraftMethod::Sequential,
                Some(vec![TeamId(1), TeamId(2)]),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn explicit_order_wrong_membership_rejected() {
        let store = seeded_store(3);
        let err = generator(&store)
            .create(
                LeagueId(1),
                EventId(2),
                DraftMethod::Sequential,
                Some(vec![TeamId(1), TeamId(2), TeamId(9)]),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn explicit_order_with_duplicates_rejected() {
        let store = seeded_store(3);
        let err = generator(&store)
            .create(
                LeagueId(1),
                EventId(2),
                DraftMethod::Sequential,
                Some(vec![TeamId(1), TeamId(2), TeamId(2)]),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn second_create_is_conflict() {
        let store = seeded_store(3);
        let gen = generator(&store);
        gen.create(LeagueId(1), EventId(2), DraftMethod::Sequential, None)
            .unwrap();
        let err = gen
            .create(LeagueId(1), EventId(2), DraftMethod::Sequential, None)
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn missing_league_or_event_is_not_found() {
        let store = seeded_store(3);
        let gen = generator(&store);
        let err = gen
            .create(LeagueId(9), EventId(2), DraftMethod::Sequential, None)
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity: "league", .. }));
        let err = gen
            .create(LeagueId(1), EventId(9), DraftMethod::Sequential, None)
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity: "event", .. }));
    }

    #[test]
    fn league_without_active_teams_is_validation() {
        let store = seeded_store(1);
        // Deactivate the only team by seeding a fresh league with none.
        let gen = generator(&store);
        store
            .insert_league(&League {
                id: LeagueId(5),
                name: "Empty".into(),
                max_teams: 10,
                draft_method: DraftMethod::Sequential,
                draft_close: DraftCloseRule::Manual,
                auto_pick_strategy: AutoPickStrategyKind::HighestAvailableId,
                commissioner: UserId(100),
                scoring_override: None,
            })
            .unwrap();
        let err = gen
            .create(LeagueId(5), EventId(2), DraftMethod::Sequential, None)
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    // ------------------------------------------------------------------
    // Regeneration
    // ------------------------------------------------------------------

    #[test]
    fn regenerate_requires_commissioner() {
        let store = seeded_store(3);
        let gen = generator(&store);
        gen.create(LeagueId(1), EventId(2), DraftMethod::Sequential, None)
            .unwrap();

        let err = gen
            .regenerate(LeagueId(1), EventId(2), DraftMethod::Random, None, UserId(999))
            .unwrap_err();
        assert!(matches!(err, CoreError::PermissionDenied(_)));
    }

    #[test]
    fn regenerate_replaces_sequence() {
        let store = seeded_store(3);
        let gen = generator(&store);
        gen.create(LeagueId(1), EventId(2), DraftMethod::Sequential, None)
            .unwrap();

        let explicit = vec![TeamId(2), TeamId(3), TeamId(1)];
        let order = gen
            .regenerate(
                LeagueId(1),
                EventId(2),
                DraftMethod::Sequential,
                Some(explicit.clone()),
                UserId(100),
            )
            .unwrap();
        assert_eq!(order.sequence, explicit);

        let stored = store.draft_order(LeagueId(1), EventId(2)).unwrap().unwrap();
        assert_eq!(stored.sequence, explicit);
    }

    #[test]
    fn regenerate_without_existing_order_is_not_found() {
        let store = seeded_store(3);
        let err = generator(&store)
            .regenerate(LeagueId(1), EventId(2), DraftMethod::Sequential, None, UserId(100))
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn regenerate_after_picks_is_conflict() {
        let store = seeded_store(3);
        let gen = generator(&store);
        gen.create(LeagueId(1), EventId(2), DraftMethod::Sequential, None)
            .unwrap();
        store
            .append_pick(&crate::model::DraftPick {
                league: LeagueId(1),
                event: EventId(2),
                pick_number: 1,
                round: 1,
                position: 1,
                team: TeamId(1),
                driver: crate::model::DriverId(1),
                is_auto_pick: false,
                picked_at: Utc::now(),
            })
            .unwrap();

        let err = gen
            .regenerate(LeagueId(1), EventId(2), DraftMethod::Random, None, UserId(100))
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }
}
