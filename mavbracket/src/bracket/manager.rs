//! Bracket manager: the entry points that generate brackets and resolve
//! matches against a [`BracketStore`].

use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use super::builder::{self, MIN_TEAMS};
use super::errors::{BracketError, BracketResult};
use super::models::{
    Match, MatchId, PersistedBracket, Team, TeamId, Tournament, TournamentConfig, TournamentId,
    TournamentStatus,
};
use super::resolver::{MatchResolver, Resolution};
use super::seeding::SeedMethod;
use super::tree::MatchKey;
use crate::db::{BracketStore, BracketTransaction};

/// Outcome of a bracket generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateSummary {
    pub tournament_id: TournamentId,
    pub seed_method: String,
    pub teams: usize,
    pub rounds: usize,
    pub matches: usize,
    pub byes: usize,
    pub status: TournamentStatus,
}

/// Bracket manager
#[derive(Clone)]
pub struct BracketManager {
    store: Arc<dyn BracketStore>,
    rng: Arc<Mutex<StdRng>>,
}

impl BracketManager {
    /// Create a manager whose random seeding draws from OS entropy
    pub fn new(store: Arc<dyn BracketStore>) -> Self {
        Self {
            store,
            rng: Arc::new(Mutex::new(StdRng::from_os_rng())),
        }
    }

    /// Create a manager with a reproducible random source
    pub fn with_seed(store: Arc<dyn BracketStore>, seed: u64) -> Self {
        Self {
            store,
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<dyn BracketStore> {
        &self.store
    }

    /// Create a tournament in DRAFT
    pub async fn create_tournament(&self, config: &TournamentConfig) -> BracketResult<Tournament> {
        let tournament = self.store.create_tournament(config).await?;
        info!(
            "Created tournament {} '{}' (cap {} teams of {})",
            tournament.id, tournament.name, tournament.team_cap, tournament.default_team_size
        );
        Ok(tournament)
    }

    pub async fn tournament(&self, tournament_id: TournamentId) -> BracketResult<Tournament> {
        self.store.get_tournament(tournament_id).await
    }

    /// Teams in registry order
    pub async fn teams(&self, tournament_id: TournamentId) -> BracketResult<Vec<Team>> {
        self.store.list_teams(tournament_id).await
    }

    /// Build a fresh bracket for `teams`, replacing any previous one.
    ///
    /// Team win/loss counters are reset, first-round byes are resolved, and
    /// the tournament becomes ACTIVE. With fewer than two teams nothing is
    /// written and `BracketError::NotEnoughTeams` is returned.
    pub async fn generate(
        &self,
        tournament_id: TournamentId,
        teams: &[TeamId],
        method: SeedMethod,
    ) -> BracketResult<GenerateSummary> {
        let mut tx = self.store.begin(tournament_id).await?;

        if teams.len() < MIN_TEAMS {
            info!(
                "Tournament {tournament_id}: not generating, {} team(s) registered",
                teams.len()
            );
            return Err(BracketError::NotEnoughTeams {
                needed: MIN_TEAMS,
                current: teams.len(),
            });
        }

        let registered: HashSet<TeamId> = tx.teams().await?.into_iter().map(|t| t.id).collect();
        if let Some(&team) = teams.iter().find(|team| !registered.contains(team)) {
            return Err(BracketError::UnknownTeam {
                tournament_id,
                team,
            });
        }

        let generated = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            builder::build(teams, &method, &mut *rng)?
        };

        tx.clear_bracket().await?;
        tx.reset_records().await?;
        let persisted = tx.insert_bracket(&generated.bracket).await?;
        let status = apply_records(&mut *tx, &generated.resolution, true).await?;
        tx.commit().await?;

        let summary = GenerateSummary {
            tournament_id,
            seed_method: method.to_string(),
            teams: teams.len(),
            rounds: persisted.bracket.round_count(),
            matches: persisted.bracket.matches().count(),
            byes: persisted.bracket.bye_count(),
            status,
        };
        info!(
            "Tournament {tournament_id}: generated {} bracket for {} teams ({} rounds, {} matches, {} byes)",
            summary.seed_method, summary.teams, summary.rounds, summary.matches, summary.byes
        );
        Ok(summary)
    }

    /// Generate from every registered team, in registry order
    pub async fn generate_from_registry(
        &self,
        tournament_id: TournamentId,
        method: SeedMethod,
    ) -> BracketResult<GenerateSummary> {
        let teams: Vec<TeamId> = self
            .store
            .list_teams(tournament_id)
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();
        self.generate(tournament_id, &teams, method).await
    }

    /// Record `winner` for a match and return the updated match.
    ///
    /// With `cascade` the winner moves forward and any byes that creates are
    /// resolved too. The tournament becomes FINISHED when the final is
    /// decided. Rejected calls change nothing.
    pub async fn set_winner(
        &self,
        match_id: MatchId,
        winner: TeamId,
        cascade: bool,
    ) -> BracketResult<Match> {
        let (mut tx, mut persisted, key) = self.open_match(match_id).await?;

        let mut resolver = MatchResolver::new(&mut persisted.bracket);
        if let Err(e) = resolver.set_winner(key, winner, cascade) {
            warn!("Rejected winner {winner} for match {match_id} ({key}): {e}");
            return Err(e);
        }
        let resolution = resolver.finish();

        self.publish(&mut *tx, &persisted, &resolution).await?;
        tx.commit().await?;

        info!(
            "Match {match_id} ({key}) won by team {winner}; {} match(es) decided",
            resolution.decided.len()
        );
        persisted
            .match_record(key)
            .ok_or(BracketError::MatchNotFound(match_id))
    }

    /// Move the winner of a match decided without cascading into its forward
    /// match and return that match. The final has nowhere to advance to.
    pub async fn advance(&self, match_id: MatchId) -> BracketResult<Match> {
        let (mut tx, mut persisted, key) = self.open_match(match_id).await?;

        let mut resolver = MatchResolver::new(&mut persisted.bracket);
        if let Err(e) = resolver.advance(key) {
            warn!("Cannot advance match {match_id} ({key}): {e}");
            return Err(e);
        }
        let resolution = resolver.finish();

        self.publish(&mut *tx, &persisted, &resolution).await?;
        tx.commit().await?;

        let target = persisted
            .bracket
            .get(key)
            .and_then(|m| m.next_win)
            .ok_or(BracketError::UnknownMatchKey(key))?;
        info!("Match {match_id} ({key}) advanced to {target}");
        persisted
            .match_record(target)
            .ok_or(BracketError::MatchNotFound(match_id))
    }

    /// Current bracket with storage ids
    pub async fn bracket(&self, tournament_id: TournamentId) -> BracketResult<PersistedBracket> {
        // Surfaces TournamentNotFound before an empty bracket.
        self.store.get_tournament(tournament_id).await?;
        self.store.load_bracket(tournament_id).await
    }

    /// Winner of the final, once decided
    pub async fn champion(&self, tournament_id: TournamentId) -> BracketResult<Option<Team>> {
        let persisted = self.bracket(tournament_id).await?;
        let Some(champion) = persisted.bracket.champion() else {
            return Ok(None);
        };
        let teams = self.store.list_teams(tournament_id).await?;
        Ok(teams.into_iter().find(|t| t.id == champion))
    }

    /// Matches with two teams and no winner yet
    pub async fn pending_matches(&self, tournament_id: TournamentId) -> BracketResult<Vec<Match>> {
        let persisted = self.bracket(tournament_id).await?;
        let keys: Vec<MatchKey> = persisted.bracket.pending().map(|m| m.key).collect();
        Ok(keys
            .into_iter()
            .filter_map(|key| persisted.match_record(key))
            .collect())
    }

    async fn open_match(
        &self,
        match_id: MatchId,
    ) -> BracketResult<(Box<dyn BracketTransaction>, PersistedBracket, MatchKey)> {
        let tournament_id = self
            .store
            .match_tournament(match_id)
            .await?
            .ok_or(BracketError::MatchNotFound(match_id))?;

        let mut tx = self.store.begin(tournament_id).await?;
        let persisted = tx.load_bracket().await?;
        // A regeneration may have replaced the match before the lock was taken.
        let key = persisted
            .key_of(match_id)
            .ok_or(BracketError::MatchNotFound(match_id))?;
        Ok((tx, persisted, key))
    }

    async fn publish(
        &self,
        tx: &mut dyn BracketTransaction,
        persisted: &PersistedBracket,
        resolution: &Resolution,
    ) -> BracketResult<()> {
        let changed: Vec<Match> = resolution
            .touched
            .iter()
            .map(|key| {
                persisted
                    .match_record(*key)
                    .ok_or(BracketError::UnknownMatchKey(*key))
            })
            .collect::<BracketResult<_>>()?;
        tx.save_matches(&changed).await?;

        let status = apply_records(tx, resolution, false).await?;
        if status == TournamentStatus::Finished {
            info!("Tournament {} finished", persisted.tournament_id);
        }
        Ok(())
    }
}

/// Apply record changes and the resulting status; returns the status.
///
/// Only generation (`reopen`) may move a FINISHED tournament back to ACTIVE.
async fn apply_records(
    tx: &mut dyn BracketTransaction,
    resolution: &Resolution,
    reopen: bool,
) -> BracketResult<TournamentStatus> {
    for delta in resolution.record_deltas() {
        tx.adjust_record(delta).await?;
    }
    let current = tx.tournament().status;
    let status = if resolution.finished || (current == TournamentStatus::Finished && !reopen) {
        TournamentStatus::Finished
    } else {
        TournamentStatus::Active
    };
    if current != status {
        tx.set_status(status).await?;
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryBracketStore;

    async fn setup(names: &[&str]) -> (BracketManager, TournamentId, Vec<Team>) {
        let store = Arc::new(MemoryBracketStore::new());
        let manager = BracketManager::with_seed(store, 7);
        let tournament = manager
            .create_tournament(&TournamentConfig::new("Unit Cup"))
            .await
            .unwrap();
        for name in names {
            manager
                .store()
                .add_team(tournament.id, name, None)
                .await
                .unwrap();
        }
        let teams = manager.teams(tournament.id).await.unwrap();
        (manager, tournament.id, teams)
    }

    #[tokio::test]
    async fn test_generate_sets_active() {
        let (manager, tid, _) = setup(&["A", "B", "C", "D"]).await;
        let summary = manager
            .generate_from_registry(tid, SeedMethod::POWER)
            .await
            .unwrap();
        assert_eq!(summary.rounds, 2);
        assert_eq!(summary.matches, 3);
        assert_eq!(summary.byes, 0);
        assert_eq!(summary.status, TournamentStatus::Active);
        assert_eq!(
            manager.tournament(tid).await.unwrap().status,
            TournamentStatus::Active
        );
    }

    #[tokio::test]
    async fn test_generate_rejects_foreign_team() {
        let (manager, tid, teams) = setup(&["A", "B"]).await;
        let err = manager
            .generate(tid, &[teams[0].id, 999], SeedMethod::POWER)
            .await
            .unwrap_err();
        assert!(matches!(err, BracketError::UnknownTeam { team: 999, .. }));
        assert!(manager.bracket(tid).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_winner_on_unknown_match() {
        let (manager, _, _) = setup(&["A", "B"]).await;
        let err = manager.set_winner(12345, 1, true).await.unwrap_err();
        assert!(matches!(err, BracketError::MatchNotFound(12345)));
    }

    #[tokio::test]
    async fn test_generate_unknown_tournament() {
        let (manager, _, _) = setup(&["A", "B"]).await;
        let err = manager
            .generate(4242, &[1, 2], SeedMethod::POWER)
            .await
            .unwrap_err();
        assert!(matches!(err, BracketError::TournamentNotFound(4242)));
    }

    #[tokio::test]
    async fn test_two_team_final_finishes() {
        let (manager, tid, teams) = setup(&["A", "B"]).await;
        manager
            .generate_from_registry(tid, SeedMethod::POWER)
            .await
            .unwrap();
        let final_match = manager.bracket(tid).await.unwrap().final_match().unwrap();

        let decided = manager
            .set_winner(final_match.id, teams[1].id, true)
            .await
            .unwrap();
        assert_eq!(decided.winner, Some(teams[1].id));
        assert_eq!(decided.loser, Some(teams[0].id));
        assert_eq!(
            manager.tournament(tid).await.unwrap().status,
            TournamentStatus::Finished
        );
        let champion = manager.champion(tid).await.unwrap().unwrap();
        assert_eq!(champion.id, teams[1].id);
        assert!(manager.pending_matches(tid).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_advance_from_final_is_rejected() {
        let (manager, tid, teams) = setup(&["A", "B"]).await;
        manager
            .generate_from_registry(tid, SeedMethod::POWER)
            .await
            .unwrap();
        let final_match = manager.bracket(tid).await.unwrap().final_match().unwrap();
        manager
            .set_winner(final_match.id, teams[0].id, false)
            .await
            .unwrap();

        let err = manager.advance(final_match.id).await.unwrap_err();
        assert!(matches!(err, BracketError::NoForwardMatch(_)));
        assert_eq!(
            manager.tournament(tid).await.unwrap().status,
            TournamentStatus::Finished
        );
    }

    #[tokio::test]
    async fn test_regeneration_reopens_finished_tournament() {
        let (manager, tid, teams) = setup(&["A", "B"]).await;
        manager
            .generate_from_registry(tid, SeedMethod::POWER)
            .await
            .unwrap();
        let final_match = manager.bracket(tid).await.unwrap().final_match().unwrap();
        manager
            .set_winner(final_match.id, teams[0].id, true)
            .await
            .unwrap();

        let summary = manager
            .generate_from_registry(tid, SeedMethod::POWER)
            .await
            .unwrap();
        assert_eq!(summary.status, TournamentStatus::Active);
        assert!(manager.champion(tid).await.unwrap().is_none());
    }
}
