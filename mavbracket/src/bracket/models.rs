//! Bracket data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::errors::{BracketError, BracketResult};
use super::tree::{Bracket, BracketMatch, MatchKey};

/// Tournament ID type
pub type TournamentId = i64;
/// Team ID type
pub type TeamId = i64;
/// Round ID type
pub type RoundId = i64;
/// Match ID type
pub type MatchId = i64;

/// Default maximum number of teams per tournament
pub const DEFAULT_TEAM_CAP: usize = 32;
/// Default roster size for new teams
pub const DEFAULT_TEAM_SIZE: usize = 2;
/// Default roster role
pub const DEFAULT_ROLE: &str = "player";

/// Tournament status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TournamentStatus {
    /// Teams are being assembled, no bracket yet
    Draft,
    /// Bracket generated, matches being played
    Active,
    /// Final match has a winner
    Finished,
}

impl TournamentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentStatus::Draft => "DRAFT",
            TournamentStatus::Active => "ACTIVE",
            TournamentStatus::Finished => "FINISHED",
        }
    }
}

impl fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TournamentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(TournamentStatus::Draft),
            "ACTIVE" => Ok(TournamentStatus::Active),
            "FINISHED" => Ok(TournamentStatus::Finished),
            other => Err(format!("unknown tournament status: {other}")),
        }
    }
}

/// Elimination format. Only single elimination is supported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EliminationType {
    #[default]
    Single,
}

impl EliminationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EliminationType::Single => "SINGLE",
        }
    }
}

/// Bracket branch a round belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BracketBranch {
    #[default]
    Winners,
}

impl BracketBranch {
    pub fn as_str(&self) -> &'static str {
        match self {
            BracketBranch::Winners => "WINNERS",
        }
    }
}

/// Settings for a new tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentConfig {
    /// Tournament name
    pub name: String,
    /// Maximum number of teams
    pub team_cap: usize,
    /// Roster size new teams default to
    pub default_team_size: usize,
}

impl TournamentConfig {
    /// Create a configuration with the standard cap and team size
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            team_cap: DEFAULT_TEAM_CAP,
            default_team_size: DEFAULT_TEAM_SIZE,
        }
    }

    pub fn with_team_cap(mut self, team_cap: usize) -> Self {
        self.team_cap = team_cap;
        self
    }

    pub fn with_team_size(mut self, default_team_size: usize) -> Self {
        self.default_team_size = default_team_size;
        self
    }
}

/// Tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub elimination_type: EliminationType,
    pub team_cap: usize,
    pub default_team_size: usize,
    pub status: TournamentStatus,
    pub created_at: DateTime<Utc>,
}

/// Roster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub username: String,
    pub role: String,
}

/// Team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub tournament_id: TournamentId,
    pub name: String,
    /// Slugified name used for lookups
    pub search_slug: String,
    pub max_players: usize,
    pub wins: i32,
    pub losses: i32,
    pub members: Vec<TeamMember>,
}

impl Team {
    pub fn player_count(&self) -> usize {
        self.members.len()
    }

    pub fn has_capacity(&self) -> bool {
        self.player_count() < self.max_players
    }

    /// Whether `n` more players fit on the roster
    pub fn can_add(&self, n: usize) -> bool {
        self.player_count() + n <= self.max_players
    }

    pub fn is_member(&self, username: &str) -> bool {
        self.members.iter().any(|m| m.username == username)
    }
}

/// Lowercase, ASCII-alphanumeric slug with single hyphens between words
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' {
            pending_dash = true;
        }
    }
    slug
}

/// Round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub tournament_id: TournamentId,
    pub branch: BracketBranch,
    /// Zero-based round index
    pub index: u32,
}

impl Round {
    pub fn label(&self) -> String {
        format!("R{}", self.index + 1)
    }
}

/// Match as seen by storage and callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    pub round_id: RoundId,
    pub round_index: u32,
    /// Zero-based position within the round
    pub slot: u32,
    pub team1: Option<TeamId>,
    pub team2: Option<TeamId>,
    pub winner: Option<TeamId>,
    pub loser: Option<TeamId>,
    /// Match receiving the winner
    pub next_win: Option<MatchId>,
    pub is_bye: bool,
}

impl Match {
    pub fn key(&self) -> MatchKey {
        MatchKey::new(self.round_index, self.slot)
    }

    pub fn label(&self) -> String {
        self.key().to_string()
    }
}

/// Win/loss change for one team
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDelta {
    pub team: TeamId,
    pub wins: i32,
    pub losses: i32,
}

/// A bracket together with the storage identifiers of its rounds and matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedBracket {
    pub tournament_id: TournamentId,
    pub bracket: Bracket,
    round_ids: Vec<RoundId>,
    match_ids: BTreeMap<MatchKey, MatchId>,
}

impl PersistedBracket {
    /// Tournament without a generated bracket
    pub fn empty(tournament_id: TournamentId) -> Self {
        Self {
            tournament_id,
            bracket: Bracket::default(),
            round_ids: Vec::new(),
            match_ids: BTreeMap::new(),
        }
    }

    /// Attach ids to a bracket; every round and match must have one.
    pub fn new(
        tournament_id: TournamentId,
        bracket: Bracket,
        round_ids: Vec<RoundId>,
        match_ids: BTreeMap<MatchKey, MatchId>,
    ) -> BracketResult<Self> {
        if round_ids.len() != bracket.round_count() {
            return Err(BracketError::corrupt(format!(
                "{} round ids for {} rounds",
                round_ids.len(),
                bracket.round_count()
            )));
        }
        if let Some(m) = bracket.matches().find(|m| !match_ids.contains_key(&m.key)) {
            return Err(BracketError::corrupt(format!("match {} has no id", m.key)));
        }
        Ok(Self {
            tournament_id,
            bracket,
            round_ids,
            match_ids,
        })
    }

    /// Rebuild from stored rows, translating id pointers into arena keys.
    pub fn from_records(
        tournament_id: TournamentId,
        rounds: Vec<Round>,
        matches: Vec<Match>,
    ) -> BracketResult<Self> {
        let mut rounds = rounds;
        rounds.sort_by_key(|r| r.index);
        for (position, round) in rounds.iter().enumerate() {
            if round.index as usize != position {
                return Err(BracketError::corrupt(format!(
                    "round index {} out of sequence",
                    round.index
                )));
            }
        }

        let keys: BTreeMap<MatchId, MatchKey> = matches.iter().map(|m| (m.id, m.key())).collect();
        let mut match_ids = BTreeMap::new();
        let mut arena = Vec::with_capacity(matches.len());
        for m in matches {
            let next_win = match m.next_win {
                Some(id) => Some(*keys.get(&id).ok_or_else(|| {
                    BracketError::corrupt(format!("match {} points to missing match {id}", m.label()))
                })?),
                None => None,
            };
            match_ids.insert(m.key(), m.id);
            arena.push(BracketMatch {
                key: m.key(),
                team1: m.team1,
                team2: m.team2,
                winner: m.winner,
                loser: m.loser,
                next_win,
                is_bye: m.is_bye,
            });
        }

        let bracket = Bracket::from_matches(arena)?;
        let round_ids = rounds.into_iter().map(|r| r.id).collect();
        Self::new(tournament_id, bracket, round_ids, match_ids)
    }

    pub fn is_empty(&self) -> bool {
        self.bracket.is_empty()
    }

    pub fn key_of(&self, id: MatchId) -> Option<MatchKey> {
        self.match_ids
            .iter()
            .find_map(|(key, match_id)| (*match_id == id).then_some(*key))
    }

    pub fn id_of(&self, key: MatchKey) -> Option<MatchId> {
        self.match_ids.get(&key).copied()
    }

    pub fn round_id(&self, index: u32) -> Option<RoundId> {
        self.round_ids.get(index as usize).copied()
    }

    /// Storage view of the match at `key`
    pub fn match_record(&self, key: MatchKey) -> Option<Match> {
        let m = self.bracket.get(key)?;
        Some(Match {
            id: self.id_of(key)?,
            tournament_id: self.tournament_id,
            round_id: self.round_id(key.round)?,
            round_index: key.round,
            slot: key.slot,
            team1: m.team1,
            team2: m.team2,
            winner: m.winner,
            loser: m.loser,
            next_win: m.next_win.and_then(|next| self.id_of(next)),
            is_bye: m.is_bye,
        })
    }

    /// All matches ordered by round, then slot
    pub fn matches(&self) -> Vec<Match> {
        self.bracket
            .matches()
            .filter_map(|m| self.match_record(m.key))
            .collect()
    }

    pub fn rounds(&self) -> Vec<Round> {
        self.round_ids
            .iter()
            .enumerate()
            .map(|(index, id)| Round {
                id: *id,
                tournament_id: self.tournament_id,
                branch: BracketBranch::Winners,
                index: index as u32,
            })
            .collect()
    }

    /// The unique match of the last round
    pub fn final_match(&self) -> Option<Match> {
        self.bracket
            .final_key()
            .and_then(|key| self.match_record(key))
    }
}
