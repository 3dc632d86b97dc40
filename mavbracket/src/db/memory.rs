//! In-process bracket store.
//!
//! A transaction holds the store's owned mutex guard and works on a staged
//! copy of one tournament; `commit` swaps the copy in.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::repository::{BracketStore, BracketTransaction};
use crate::bracket::{
    Bracket, BracketError, BracketResult, EliminationType, Match, MatchId, PersistedBracket,
    RecordDelta, Team, TeamId, TeamMember, Tournament, TournamentConfig, TournamentId,
    TournamentStatus, slugify,
};

#[derive(Debug, Clone)]
struct TournamentState {
    tournament: Tournament,
    teams: BTreeMap<TeamId, Team>,
    bracket: PersistedBracket,
}

impl TournamentState {
    fn sorted_teams(&self) -> Vec<Team> {
        let mut teams: Vec<Team> = self.teams.values().cloned().collect();
        teams.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        teams
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    tournaments: BTreeMap<TournamentId, TournamentState>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn tournament_mut(&mut self, id: TournamentId) -> BracketResult<&mut TournamentState> {
        self.tournaments
            .get_mut(&id)
            .ok_or(BracketError::TournamentNotFound(id))
    }

    fn team_mut(&mut self, team_id: TeamId) -> BracketResult<&mut Team> {
        self.tournaments
            .values_mut()
            .find_map(|state| state.teams.get_mut(&team_id))
            .ok_or(BracketError::TeamNotFound(team_id))
    }
}

/// Bracket store kept in process memory
#[derive(Clone, Default)]
pub struct MemoryBracketStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBracketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BracketStore for MemoryBracketStore {
    async fn create_tournament(&self, config: &TournamentConfig) -> BracketResult<Tournament> {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        let tournament = Tournament {
            id,
            name: config.name.clone(),
            elimination_type: EliminationType::Single,
            team_cap: config.team_cap,
            default_team_size: config.default_team_size,
            status: TournamentStatus::Draft,
            created_at: Utc::now(),
        };
        state.tournaments.insert(
            id,
            TournamentState {
                tournament: tournament.clone(),
                teams: BTreeMap::new(),
                bracket: PersistedBracket::empty(id),
            },
        );
        Ok(tournament)
    }

    async fn get_tournament(&self, tournament_id: TournamentId) -> BracketResult<Tournament> {
        let state = self.state.lock().await;
        state
            .tournaments
            .get(&tournament_id)
            .map(|t| t.tournament.clone())
            .ok_or(BracketError::TournamentNotFound(tournament_id))
    }

    async fn find_tournament_by_name(&self, name: &str) -> BracketResult<Option<Tournament>> {
        let state = self.state.lock().await;
        Ok(state
            .tournaments
            .values()
            .rev()
            .find(|t| t.tournament.name == name)
            .map(|t| t.tournament.clone()))
    }

    async fn add_team(
        &self,
        tournament_id: TournamentId,
        name: &str,
        max_players: Option<usize>,
    ) -> BracketResult<Team> {
        let mut state = self.state.lock().await;
        let id = state.next_id + 1;
        let entry = state.tournament_mut(tournament_id)?;

        if entry.teams.len() >= entry.tournament.team_cap {
            return Err(BracketError::TournamentFull {
                cap: entry.tournament.team_cap,
            });
        }
        let name = name.trim();
        if entry.teams.values().any(|t| t.name == name) {
            return Err(BracketError::TeamNameTaken(name.to_string()));
        }

        let team = Team {
            id,
            tournament_id,
            name: name.to_string(),
            search_slug: slugify(name),
            max_players: max_players.unwrap_or(entry.tournament.default_team_size),
            wins: 0,
            losses: 0,
            members: Vec::new(),
        };
        entry.teams.insert(id, team.clone());
        state.next_id = id;
        Ok(team)
    }

    async fn add_member(
        &self,
        team_id: TeamId,
        username: &str,
        role: &str,
    ) -> BracketResult<Team> {
        let mut state = self.state.lock().await;
        let team = state.team_mut(team_id)?;

        if team.is_member(username) {
            return Err(BracketError::AlreadyMember(username.to_string()));
        }
        if !team.can_add(1) {
            return Err(BracketError::TeamFull {
                current: team.player_count(),
                max: team.max_players,
            });
        }

        team.members.push(TeamMember {
            username: username.to_string(),
            role: role.to_string(),
        });
        Ok(team.clone())
    }

    async fn list_teams(&self, tournament_id: TournamentId) -> BracketResult<Vec<Team>> {
        let state = self.state.lock().await;
        state
            .tournaments
            .get(&tournament_id)
            .map(TournamentState::sorted_teams)
            .ok_or(BracketError::TournamentNotFound(tournament_id))
    }

    async fn remove_teams(&self, tournament_id: TournamentId) -> BracketResult<u64> {
        let mut state = self.state.lock().await;
        let entry = state.tournament_mut(tournament_id)?;
        let removed = entry.teams.len() as u64;
        entry.teams.clear();
        entry.bracket = PersistedBracket::empty(tournament_id);
        entry.tournament.status = TournamentStatus::Draft;
        Ok(removed)
    }

    async fn match_tournament(&self, match_id: MatchId) -> BracketResult<Option<TournamentId>> {
        let state = self.state.lock().await;
        Ok(state
            .tournaments
            .iter()
            .find(|(_, t)| t.bracket.key_of(match_id).is_some())
            .map(|(id, _)| *id))
    }

    async fn load_bracket(&self, tournament_id: TournamentId) -> BracketResult<PersistedBracket> {
        let state = self.state.lock().await;
        state
            .tournaments
            .get(&tournament_id)
            .map(|t| t.bracket.clone())
            .ok_or(BracketError::TournamentNotFound(tournament_id))
    }

    async fn begin(
        &self,
        tournament_id: TournamentId,
    ) -> BracketResult<Box<dyn BracketTransaction>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard
            .tournaments
            .get(&tournament_id)
            .cloned()
            .ok_or(BracketError::TournamentNotFound(tournament_id))?;
        let next_id = guard.next_id;

        Ok(Box::new(MemoryBracketTransaction {
            guard,
            staged,
            next_id,
        }))
    }
}

/// Staged changes to one tournament, published on commit
pub struct MemoryBracketTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    staged: TournamentState,
    next_id: i64,
}

impl MemoryBracketTransaction {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[async_trait]
impl BracketTransaction for MemoryBracketTransaction {
    fn tournament(&self) -> &Tournament {
        &self.staged.tournament
    }

    async fn teams(&mut self) -> BracketResult<Vec<Team>> {
        Ok(self.staged.sorted_teams())
    }

    async fn load_bracket(&mut self) -> BracketResult<PersistedBracket> {
        Ok(self.staged.bracket.clone())
    }

    async fn clear_bracket(&mut self) -> BracketResult<()> {
        self.staged.bracket = PersistedBracket::empty(self.staged.tournament.id);
        Ok(())
    }

    async fn insert_bracket(&mut self, bracket: &Bracket) -> BracketResult<PersistedBracket> {
        let round_ids = (0..bracket.round_count())
            .map(|_| self.allocate_id())
            .collect();
        let keys: Vec<_> = bracket.matches().map(|m| m.key).collect();
        let match_ids = keys
            .into_iter()
            .map(|key| (key, self.allocate_id()))
            .collect();

        let persisted = PersistedBracket::new(
            self.staged.tournament.id,
            bracket.clone(),
            round_ids,
            match_ids,
        )?;
        self.staged.bracket = persisted.clone();
        Ok(persisted)
    }

    async fn save_matches(&mut self, matches: &[Match]) -> BracketResult<()> {
        for record in matches {
            let key = self
                .staged
                .bracket
                .key_of(record.id)
                .ok_or(BracketError::MatchNotFound(record.id))?;
            let m = self
                .staged
                .bracket
                .bracket
                .get_mut(key)
                .ok_or(BracketError::UnknownMatchKey(key))?;
            m.team1 = record.team1;
            m.team2 = record.team2;
            m.winner = record.winner;
            m.loser = record.loser;
            m.is_bye = record.is_bye;
        }
        Ok(())
    }

    async fn reset_records(&mut self) -> BracketResult<()> {
        for team in self.staged.teams.values_mut() {
            team.wins = 0;
            team.losses = 0;
        }
        Ok(())
    }

    async fn adjust_record(&mut self, delta: &RecordDelta) -> BracketResult<()> {
        let team = self
            .staged
            .teams
            .get_mut(&delta.team)
            .ok_or(BracketError::TeamNotFound(delta.team))?;
        team.wins += delta.wins;
        team.losses += delta.losses;
        Ok(())
    }

    async fn set_status(&mut self, status: TournamentStatus) -> BracketResult<()> {
        self.staged.tournament.status = status;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> BracketResult<()> {
        let MemoryBracketTransaction {
            mut guard,
            staged,
            next_id,
        } = *self;
        guard.next_id = guard.next_id.max(next_id);
        guard.tournaments.insert(staged.tournament.id, staged);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_teams(names: &[&str]) -> (MemoryBracketStore, Tournament) {
        let store = MemoryBracketStore::new();
        let tournament = store
            .create_tournament(&TournamentConfig::new("Test Cup"))
            .await
            .unwrap();
        for name in names {
            store.add_team(tournament.id, name, None).await.unwrap();
        }
        (store, tournament)
    }

    #[tokio::test]
    async fn test_teams_listed_by_name() {
        let (store, tournament) = store_with_teams(&["Snakes", "Beavers", "Falcons"]).await;
        let names: Vec<String> = store
            .list_teams(tournament.id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["Beavers", "Falcons", "Snakes"]);
    }

    #[tokio::test]
    async fn test_team_name_unique_within_tournament() {
        let (store, tournament) = store_with_teams(&["Beavers"]).await;
        let err = store
            .add_team(tournament.id, "Beavers", None)
            .await
            .unwrap_err();
        assert!(matches!(err, BracketError::TeamNameTaken(_)));
    }

    #[tokio::test]
    async fn test_team_cap_enforced() {
        let store = MemoryBracketStore::new();
        let tournament = store
            .create_tournament(&TournamentConfig::new("Tiny").with_team_cap(2))
            .await
            .unwrap();
        store.add_team(tournament.id, "A", None).await.unwrap();
        store.add_team(tournament.id, "B", None).await.unwrap();
        let err = store.add_team(tournament.id, "C", None).await.unwrap_err();
        assert!(matches!(err, BracketError::TournamentFull { cap: 2 }));
    }

    #[tokio::test]
    async fn test_member_capacity() {
        let (store, tournament) = store_with_teams(&["Beavers"]).await;
        let team = &store.list_teams(tournament.id).await.unwrap()[0];
        assert_eq!(team.search_slug, "beavers");
        assert_eq!(team.max_players, 2);

        store.add_member(team.id, "player1", "player").await.unwrap();
        let err = store
            .add_member(team.id, "player1", "player")
            .await
            .unwrap_err();
        assert!(matches!(err, BracketError::AlreadyMember(_)));

        let team = store.add_member(team.id, "player2", "captain").await.unwrap();
        assert_eq!(team.player_count(), 2);
        let err = store
            .add_member(team.id, "player3", "player")
            .await
            .unwrap_err();
        assert!(matches!(err, BracketError::TeamFull { current: 2, max: 2 }));
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let (store, tournament) = store_with_teams(&["A", "B"]).await;
        {
            let mut tx = store.begin(tournament.id).await.unwrap();
            tx.set_status(TournamentStatus::Active).await.unwrap();
            let bracket = Bracket::from_pairings(vec![(Some(1), Some(2))]).unwrap();
            tx.insert_bracket(&bracket).await.unwrap();
        }
        let after = store.get_tournament(tournament.id).await.unwrap();
        assert_eq!(after.status, TournamentStatus::Draft);
        assert!(store.load_bracket(tournament.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_committed_transaction_publishes_writes() {
        let (store, tournament) = store_with_teams(&["A", "B"]).await;
        let teams = store.list_teams(tournament.id).await.unwrap();

        let mut tx = store.begin(tournament.id).await.unwrap();
        let bracket =
            Bracket::from_pairings(vec![(Some(teams[0].id), Some(teams[1].id))]).unwrap();
        let persisted = tx.insert_bracket(&bracket).await.unwrap();
        tx.adjust_record(&RecordDelta {
            team: teams[0].id,
            wins: 1,
            losses: 0,
        })
        .await
        .unwrap();
        tx.set_status(TournamentStatus::Active).await.unwrap();
        tx.commit().await.unwrap();

        let match_id = persisted.matches()[0].id;
        assert_eq!(
            store.match_tournament(match_id).await.unwrap(),
            Some(tournament.id)
        );
        assert_eq!(store.list_teams(tournament.id).await.unwrap()[0].wins, 1);
        assert_eq!(
            store.get_tournament(tournament.id).await.unwrap().status,
            TournamentStatus::Active
        );
    }

    #[tokio::test]
    async fn test_remove_teams_resets_tournament() {
        let (store, tournament) = store_with_teams(&["A", "B", "C"]).await;
        let mut tx = store.begin(tournament.id).await.unwrap();
        tx.set_status(TournamentStatus::Active).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.remove_teams(tournament.id).await.unwrap(), 3);
        assert!(store.list_teams(tournament.id).await.unwrap().is_empty());
        assert_eq!(
            store.get_tournament(tournament.id).await.unwrap().status,
            TournamentStatus::Draft
        );
    }

    #[tokio::test]
    async fn test_unknown_tournament() {
        let store = MemoryBracketStore::new();
        assert!(matches!(
            store.begin(42).await.err(),
            Some(BracketError::TournamentNotFound(42))
        ));
    }
}
