//! Storage traits for tournaments, teams and brackets, plus the PostgreSQL
//! implementation.
//!
//! Every bracket mutation goes through a [`BracketTransaction`]: it holds the
//! tournament lock for its whole lifetime and publishes writes only on
//! [`BracketTransaction::commit`]. Dropping it rolls everything back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::bracket::{
    Bracket, BracketBranch, BracketError, BracketResult, EliminationType, Match, MatchId,
    PersistedBracket, RecordDelta, Round, Team, TeamId, TeamMember, Tournament, TournamentConfig,
    TournamentId, TournamentStatus, slugify,
};

/// Tournament and team registry plus bracket storage
#[async_trait]
pub trait BracketStore: Send + Sync {
    /// Create a tournament in DRAFT
    async fn create_tournament(&self, config: &TournamentConfig) -> BracketResult<Tournament>;

    /// Find tournament by ID
    async fn get_tournament(&self, tournament_id: TournamentId) -> BracketResult<Tournament>;

    /// Find the most recent tournament with this name
    async fn find_tournament_by_name(&self, name: &str) -> BracketResult<Option<Tournament>>;

    /// Register a team; `max_players` defaults to the tournament's team size
    async fn add_team(
        &self,
        tournament_id: TournamentId,
        name: &str,
        max_players: Option<usize>,
    ) -> BracketResult<Team>;

    /// Add a player to a team roster
    async fn add_member(&self, team_id: TeamId, username: &str, role: &str)
    -> BracketResult<Team>;

    /// Teams of a tournament in registry order (by name)
    async fn list_teams(&self, tournament_id: TournamentId) -> BracketResult<Vec<Team>>;

    /// Delete all teams, the bracket, and put the tournament back to DRAFT
    async fn remove_teams(&self, tournament_id: TournamentId) -> BracketResult<u64>;

    /// Tournament owning a match
    async fn match_tournament(&self, match_id: MatchId) -> BracketResult<Option<TournamentId>>;

    /// Read-only snapshot of the current bracket
    async fn load_bracket(&self, tournament_id: TournamentId) -> BracketResult<PersistedBracket>;

    /// Lock the tournament and open a unit of work
    async fn begin(
        &self,
        tournament_id: TournamentId,
    ) -> BracketResult<Box<dyn BracketTransaction>>;
}

/// All-or-nothing unit of work scoped to one locked tournament
#[async_trait]
pub trait BracketTransaction: Send {
    /// The locked tournament as of the start of the transaction
    fn tournament(&self) -> &Tournament;

    /// Teams of the tournament in registry order
    async fn teams(&mut self) -> BracketResult<Vec<Team>>;

    async fn load_bracket(&mut self) -> BracketResult<PersistedBracket>;

    /// Delete every round and match of the tournament
    async fn clear_bracket(&mut self) -> BracketResult<()>;

    /// Insert rounds and matches, assigning ids
    async fn insert_bracket(&mut self, bracket: &Bracket) -> BracketResult<PersistedBracket>;

    /// Write back the listed matches
    async fn save_matches(&mut self, matches: &[Match]) -> BracketResult<()>;

    /// Zero every team's win/loss counters
    async fn reset_records(&mut self) -> BracketResult<()>;

    async fn adjust_record(&mut self, delta: &RecordDelta) -> BracketResult<()>;

    async fn set_status(&mut self, status: TournamentStatus) -> BracketResult<()>;

    async fn commit(self: Box<Self>) -> BracketResult<()>;
}

/// PostgreSQL implementation of [`BracketStore`]
#[derive(Clone)]
pub struct PgBracketStore {
    pool: Arc<PgPool>,
}

impl PgBracketStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

const TOURNAMENT_COLUMNS: &str =
    "id, name, elimination_type, team_cap, default_team_size, status, created_at";

fn tournament_from_row(row: &PgRow) -> BracketResult<Tournament> {
    let status: String = row.get("status");
    let status: TournamentStatus = status.parse().map_err(BracketError::corrupt)?;
    let team_cap: i32 = row.get("team_cap");
    let default_team_size: i16 = row.get("default_team_size");

    Ok(Tournament {
        id: row.get("id"),
        name: row.get("name"),
        elimination_type: EliminationType::Single,
        team_cap: team_cap.max(0) as usize,
        default_team_size: default_team_size.max(0) as usize,
        status,
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    })
}

fn team_from_row(row: &PgRow) -> Team {
    let max_players: i16 = row.get("max_players");
    Team {
        id: row.get("id"),
        tournament_id: row.get("tournament_id"),
        name: row.get("name"),
        search_slug: row.get("search_slug"),
        max_players: max_players.max(0) as usize,
        wins: row.get("wins"),
        losses: row.get("losses"),
        members: Vec::new(),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

async fn fetch_teams(
    conn: &mut sqlx::PgConnection,
    tournament_id: TournamentId,
) -> BracketResult<Vec<Team>> {
    let rows = sqlx::query(
        r#"
        SELECT id, tournament_id, name, search_slug, max_players, wins, losses
        FROM teams
        WHERE tournament_id = $1
        ORDER BY name
        "#,
    )
    .bind(tournament_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut teams: Vec<Team> = rows.iter().map(team_from_row).collect();

    let member_rows = sqlx::query(
        r#"
        SELECT m.team_id, m.username, m.role
        FROM team_members m
        JOIN teams t ON t.id = m.team_id
        WHERE t.tournament_id = $1
        ORDER BY m.joined_at, m.username
        "#,
    )
    .bind(tournament_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut rosters: BTreeMap<TeamId, Vec<TeamMember>> = BTreeMap::new();
    for row in member_rows {
        rosters
            .entry(row.get("team_id"))
            .or_default()
            .push(TeamMember {
                username: row.get("username"),
                role: row.get("role"),
            });
    }
    for team in &mut teams {
        team.members = rosters.remove(&team.id).unwrap_or_default();
    }

    Ok(teams)
}

async fn fetch_bracket(
    conn: &mut sqlx::PgConnection,
    tournament_id: TournamentId,
) -> BracketResult<PersistedBracket> {
    let round_rows = sqlx::query(
        r#"
        SELECT id, round_index
        FROM rounds
        WHERE tournament_id = $1 AND bracket = $2
        ORDER BY round_index
        "#,
    )
    .bind(tournament_id)
    .bind(BracketBranch::Winners.as_str())
    .fetch_all(&mut *conn)
    .await?;

    let rounds: Vec<Round> = round_rows
        .iter()
        .map(|row| Round {
            id: row.get("id"),
            tournament_id,
            branch: BracketBranch::Winners,
            index: row.get::<i32, _>("round_index").max(0) as u32,
        })
        .collect();

    let match_rows = sqlx::query(
        r#"
        SELECT m.id, m.round_id, r.round_index, m.slot, m.team1_id, m.team2_id,
               m.winner_id, m.loser_id, m.next_win_id, m.is_bye
        FROM matches m
        JOIN rounds r ON r.id = m.round_id
        WHERE m.tournament_id = $1
        ORDER BY r.round_index, m.slot
        "#,
    )
    .bind(tournament_id)
    .fetch_all(&mut *conn)
    .await?;

    let matches = match_rows
        .iter()
        .map(|row| Match {
            id: row.get("id"),
            tournament_id,
            round_id: row.get("round_id"),
            round_index: row.get::<i32, _>("round_index").max(0) as u32,
            slot: row.get::<i32, _>("slot").max(0) as u32,
            team1: row.get("team1_id"),
            team2: row.get("team2_id"),
            winner: row.get("winner_id"),
            loser: row.get("loser_id"),
            next_win: row.get("next_win_id"),
            is_bye: row.get("is_bye"),
        })
        .collect();

    PersistedBracket::from_records(tournament_id, rounds, matches)
}

#[async_trait]
impl BracketStore for PgBracketStore {
    async fn create_tournament(&self, config: &TournamentConfig) -> BracketResult<Tournament> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO tournaments (name, elimination_type, team_cap, default_team_size, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {TOURNAMENT_COLUMNS}
            "#
        ))
        .bind(&config.name)
        .bind(EliminationType::Single.as_str())
        .bind(config.team_cap as i32)
        .bind(config.default_team_size as i16)
        .bind(TournamentStatus::Draft.as_str())
        .fetch_one(self.pool.as_ref())
        .await?;

        tournament_from_row(&row)
    }

    async fn get_tournament(&self, tournament_id: TournamentId) -> BracketResult<Tournament> {
        let row = sqlx::query(&format!(
            "SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1"
        ))
        .bind(tournament_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(BracketError::TournamentNotFound(tournament_id))?;

        tournament_from_row(&row)
    }

    async fn find_tournament_by_name(&self, name: &str) -> BracketResult<Option<Tournament>> {
        let row = sqlx::query(&format!(
            "SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE name = $1 ORDER BY id DESC LIMIT 1"
        ))
        .bind(name)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.as_ref().map(tournament_from_row).transpose()
    }

    async fn add_team(
        &self,
        tournament_id: TournamentId,
        name: &str,
        max_players: Option<usize>,
    ) -> BracketResult<Team> {
        let mut tx = self.pool.begin().await?;

        let tournament = sqlx::query(&format!(
            "SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1 FOR UPDATE"
        ))
        .bind(tournament_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(BracketError::TournamentNotFound(tournament_id))?;
        let tournament = tournament_from_row(&tournament)?;

        let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM teams WHERE tournament_id = $1")
            .bind(tournament_id)
            .fetch_one(&mut *tx)
            .await?
            .get("count");
        if count as usize >= tournament.team_cap {
            return Err(BracketError::TournamentFull {
                cap: tournament.team_cap,
            });
        }

        let name = name.trim();
        let max_players = max_players.unwrap_or(tournament.default_team_size);
        let row = sqlx::query(
            r#"
            INSERT INTO teams (tournament_id, name, search_slug, max_players)
            VALUES ($1, $2, $3, $4)
            RETURNING id, tournament_id, name, search_slug, max_players, wins, losses
            "#,
        )
        .bind(tournament_id)
        .bind(name)
        .bind(slugify(name))
        .bind(max_players as i16)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                BracketError::TeamNameTaken(name.to_string())
            } else {
                BracketError::Database(e)
            }
        })?;

        tx.commit().await?;
        Ok(team_from_row(&row))
    }

    async fn add_member(
        &self,
        team_id: TeamId,
        username: &str,
        role: &str,
    ) -> BracketResult<Team> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT id, tournament_id, name, search_slug, max_players, wins, losses
            FROM teams
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(team_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(BracketError::TeamNotFound(team_id))?;
        let mut team = team_from_row(&row);

        let members = sqlx::query(
            "SELECT username, role FROM team_members WHERE team_id = $1 ORDER BY joined_at, username",
        )
        .bind(team_id)
        .fetch_all(&mut *tx)
        .await?;
        team.members = members
            .iter()
            .map(|r| TeamMember {
                username: r.get("username"),
                role: r.get("role"),
            })
            .collect();

        if team.is_member(username) {
            return Err(BracketError::AlreadyMember(username.to_string()));
        }
        if !team.can_add(1) {
            return Err(BracketError::TeamFull {
                current: team.player_count(),
                max: team.max_players,
            });
        }

        sqlx::query("INSERT INTO team_members (team_id, username, role) VALUES ($1, $2, $3)")
            .bind(team_id)
            .bind(username)
            .bind(role)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        team.members.push(TeamMember {
            username: username.to_string(),
            role: role.to_string(),
        });
        Ok(team)
    }

    async fn list_teams(&self, tournament_id: TournamentId) -> BracketResult<Vec<Team>> {
        let mut conn = self.pool.acquire().await?;
        fetch_teams(&mut conn, tournament_id).await
    }

    async fn remove_teams(&self, tournament_id: TournamentId) -> BracketResult<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT id FROM tournaments WHERE id = $1 FOR UPDATE")
            .bind(tournament_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(BracketError::TournamentNotFound(tournament_id))?;

        sqlx::query("DELETE FROM rounds WHERE tournament_id = $1")
            .bind(tournament_id)
            .execute(&mut *tx)
            .await?;

        let removed = sqlx::query("DELETE FROM teams WHERE tournament_id = $1")
            .bind(tournament_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("UPDATE tournaments SET status = $1 WHERE id = $2")
            .bind(TournamentStatus::Draft.as_str())
            .bind(tournament_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(removed)
    }

    async fn match_tournament(&self, match_id: MatchId) -> BracketResult<Option<TournamentId>> {
        let row = sqlx::query("SELECT tournament_id FROM matches WHERE id = $1")
            .bind(match_id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(row.map(|r| r.get("tournament_id")))
    }

    async fn load_bracket(&self, tournament_id: TournamentId) -> BracketResult<PersistedBracket> {
        let mut conn = self.pool.acquire().await?;
        fetch_bracket(&mut conn, tournament_id).await
    }

    async fn begin(
        &self,
        tournament_id: TournamentId,
    ) -> BracketResult<Box<dyn BracketTransaction>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1 FOR UPDATE"
        ))
        .bind(tournament_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(BracketError::TournamentNotFound(tournament_id))?;

        let tournament = tournament_from_row(&row)?;
        Ok(Box::new(PgBracketTransaction { tx, tournament }))
    }
}

/// Open PostgreSQL transaction holding the tournament row lock
pub struct PgBracketTransaction {
    tx: Transaction<'static, Postgres>,
    tournament: Tournament,
}

#[async_trait]
impl BracketTransaction for PgBracketTransaction {
    fn tournament(&self) -> &Tournament {
        &self.tournament
    }

    async fn teams(&mut self) -> BracketResult<Vec<Team>> {
        fetch_teams(&mut self.tx, self.tournament.id).await
    }

    async fn load_bracket(&mut self) -> BracketResult<PersistedBracket> {
        fetch_bracket(&mut self.tx, self.tournament.id).await
    }

    async fn clear_bracket(&mut self) -> BracketResult<()> {
        // Matches go with their rounds.
        sqlx::query("DELETE FROM rounds WHERE tournament_id = $1")
            .bind(self.tournament.id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_bracket(&mut self, bracket: &Bracket) -> BracketResult<PersistedBracket> {
        let tournament_id = self.tournament.id;

        let mut round_ids = Vec::with_capacity(bracket.round_count());
        for index in 0..bracket.round_count() {
            let id: i64 = sqlx::query(
                "INSERT INTO rounds (tournament_id, bracket, round_index) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(tournament_id)
            .bind(BracketBranch::Winners.as_str())
            .bind(index as i32)
            .fetch_one(&mut *self.tx)
            .await?
            .get("id");
            round_ids.push(id);
        }

        let mut match_ids = BTreeMap::new();
        for m in bracket.matches() {
            let id: MatchId = sqlx::query(
                r#"
                INSERT INTO matches (tournament_id, round_id, slot, team1_id, team2_id,
                                     winner_id, loser_id, is_bye)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING id
                "#,
            )
            .bind(tournament_id)
            .bind(round_ids[m.key.round as usize])
            .bind(m.key.slot as i32)
            .bind(m.team1)
            .bind(m.team2)
            .bind(m.winner)
            .bind(m.loser)
            .bind(m.is_bye)
            .fetch_one(&mut *self.tx)
            .await?
            .get("id");
            match_ids.insert(m.key, id);
        }

        let persisted =
            PersistedBracket::new(tournament_id, bracket.clone(), round_ids, match_ids)?;

        for m in persisted.matches() {
            if let Some(next_win) = m.next_win {
                sqlx::query("UPDATE matches SET next_win_id = $1 WHERE id = $2")
                    .bind(next_win)
                    .bind(m.id)
                    .execute(&mut *self.tx)
                    .await?;
            }
        }

        Ok(persisted)
    }

    async fn save_matches(&mut self, matches: &[Match]) -> BracketResult<()> {
        for m in matches {
            let result = sqlx::query(
                r#"
                UPDATE matches
                SET team1_id = $1, team2_id = $2, winner_id = $3, loser_id = $4, is_bye = $5
                WHERE id = $6 AND tournament_id = $7
                "#,
            )
            .bind(m.team1)
            .bind(m.team2)
            .bind(m.winner)
            .bind(m.loser)
            .bind(m.is_bye)
            .bind(m.id)
            .bind(self.tournament.id)
            .execute(&mut *self.tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(BracketError::MatchNotFound(m.id));
            }
        }
        Ok(())
    }

    async fn reset_records(&mut self) -> BracketResult<()> {
        sqlx::query("UPDATE teams SET wins = 0, losses = 0 WHERE tournament_id = $1")
            .bind(self.tournament.id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn adjust_record(&mut self, delta: &RecordDelta) -> BracketResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE teams
            SET wins = wins + $1, losses = losses + $2
            WHERE id = $3 AND tournament_id = $4
            "#,
        )
        .bind(delta.wins)
        .bind(delta.losses)
        .bind(delta.team)
        .bind(self.tournament.id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BracketError::TeamNotFound(delta.team));
        }
        Ok(())
    }

    async fn set_status(&mut self, status: TournamentStatus) -> BracketResult<()> {
        sqlx::query("UPDATE tournaments SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(self.tournament.id)
            .execute(&mut *self.tx)
            .await?;
        self.tournament.status = status;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> BracketResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
