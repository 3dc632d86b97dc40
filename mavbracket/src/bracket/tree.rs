//! In-memory bracket arena.
//!
//! Matches live in a `Vec` per round and are addressed by [`MatchKey`]
//! (round index, slot). Forward pointers are keys into the same arena and
//! always point exactly one round up, so the graph is a converging in-tree
//! with no ownership cycles.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::{BracketError, BracketResult};
use super::models::TeamId;

/// A first-round pairing; `None` is an absent slot.
pub type Pairing = (Option<TeamId>, Option<TeamId>);

/// Position of a match inside the bracket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchKey {
    /// Zero-based round index
    pub round: u32,
    /// Zero-based slot within the round
    pub slot: u32,
}

impl MatchKey {
    pub const fn new(round: u32, slot: u32) -> Self {
        Self { round, slot }
    }

    /// Key of the match that receives this match's winner
    pub const fn forward(&self) -> MatchKey {
        MatchKey::new(self.round + 1, self.slot / 2)
    }

    /// Keys of the two matches feeding this one, `None` for the first round
    pub fn feeders(&self) -> Option<[MatchKey; 2]> {
        if self.round == 0 {
            return None;
        }
        let round = self.round - 1;
        Some([
            MatchKey::new(round, self.slot * 2),
            MatchKey::new(round, self.slot * 2 + 1),
        ])
    }

    /// The other match feeding the same forward match
    pub const fn sibling(&self) -> MatchKey {
        MatchKey::new(self.round, self.slot ^ 1)
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}-M{}", self.round + 1, self.slot + 1)
    }
}

/// A match inside the arena
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketMatch {
    pub key: MatchKey,
    pub team1: Option<TeamId>,
    pub team2: Option<TeamId>,
    pub winner: Option<TeamId>,
    pub loser: Option<TeamId>,
    /// Match receiving the winner, `None` only for the final
    pub next_win: Option<MatchKey>,
    pub is_bye: bool,
}

impl BracketMatch {
    /// Create an undecided match
    pub fn new(key: MatchKey, team1: Option<TeamId>, team2: Option<TeamId>) -> Self {
        Self {
            key,
            team1,
            team2,
            winner: None,
            loser: None,
            next_win: None,
            is_bye: false,
        }
    }

    /// Teams currently placed in the match
    pub fn teams(&self) -> impl Iterator<Item = TeamId> + '_ {
        self.team1.iter().chain(self.team2.iter()).copied()
    }

    pub fn team_count(&self) -> usize {
        self.teams().count()
    }

    pub fn has_team(&self, team: TeamId) -> bool {
        self.team1 == Some(team) || self.team2 == Some(team)
    }

    /// The team facing `team`, if any
    pub fn opponent_of(&self, team: TeamId) -> Option<TeamId> {
        if self.team1 == Some(team) {
            self.team2
        } else {
            self.team1
        }
    }

    /// Lone team of a one-sided match
    pub fn lone_team(&self) -> Option<TeamId> {
        match (self.team1, self.team2) {
            (Some(team), None) | (None, Some(team)) => Some(team),
            _ => None,
        }
    }

    pub fn is_decided(&self) -> bool {
        self.winner.is_some()
    }

    /// Both teams known and no result yet
    pub fn is_ready(&self) -> bool {
        self.team1.is_some() && self.team2.is_some() && self.winner.is_none()
    }

    /// Put `team` into the first open slot (team1, then team2)
    pub(crate) fn place(&mut self, team: TeamId) -> BracketResult<()> {
        if self.team1.is_none() {
            self.team1 = Some(team);
        } else if self.team2.is_none() {
            self.team2 = Some(team);
        } else {
            return Err(BracketError::corrupt(format!(
                "match {} has no open slot for team {team}",
                self.key
            )));
        }
        Ok(())
    }
}

/// Single-elimination bracket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bracket {
    rounds: Vec<Vec<BracketMatch>>,
}

impl Bracket {
    /// Build the full tree from first-round pairings.
    ///
    /// `pairings.len()` must be a power of two. A pairing with both slots
    /// absent is rejected.
    pub fn from_pairings(pairings: Vec<Pairing>) -> BracketResult<Self> {
        let first_len = pairings.len();
        if first_len == 0 || !first_len.is_power_of_two() {
            return Err(BracketError::corrupt(format!(
                "first round needs a power-of-two number of matches, got {first_len}"
            )));
        }

        let mut first = Vec::with_capacity(first_len);
        for (slot, (team1, team2)) in pairings.into_iter().enumerate() {
            let key = MatchKey::new(0, slot as u32);
            if team1.is_none() && team2.is_none() {
                return Err(BracketError::corrupt(format!(
                    "match {key} was created with both slots empty"
                )));
            }
            let mut m = BracketMatch::new(key, team1, team2);
            m.is_bye = team1.is_some() != team2.is_some();
            first.push(m);
        }

        let mut rounds = vec![first];
        let mut len = first_len / 2;
        while len > 0 {
            let round = rounds.len() as u32;
            rounds.push(
                (0..len as u32)
                    .map(|slot| BracketMatch::new(MatchKey::new(round, slot), None, None))
                    .collect(),
            );
            len /= 2;
        }

        let last = rounds.len() - 1;
        for round in &mut rounds[..last] {
            for m in round.iter_mut() {
                m.next_win = Some(m.key.forward());
            }
        }

        Ok(Self { rounds })
    }

    /// Rebuild a bracket from stored matches, validating the tree.
    pub fn from_matches(mut matches: Vec<BracketMatch>) -> BracketResult<Self> {
        if matches.is_empty() {
            return Ok(Self::default());
        }
        matches.sort_by_key(|m| m.key);

        let mut rounds: Vec<Vec<BracketMatch>> = Vec::new();
        for m in matches {
            let round = m.key.round as usize;
            if round > rounds.len() {
                return Err(BracketError::corrupt(format!("round {round} is missing")));
            }
            if round == rounds.len() {
                rounds.push(Vec::new());
            }
            rounds[round].push(m);
        }

        let bracket = Self { rounds };
        bracket.validate()?;
        Ok(bracket)
    }

    /// Check the converging-tree invariants.
    pub fn validate(&self) -> BracketResult<()> {
        if self.rounds.is_empty() {
            return Ok(());
        }

        let first_len = self.rounds[0].len();
        if !first_len.is_power_of_two() {
            return Err(BracketError::corrupt(format!(
                "first round has {first_len} matches"
            )));
        }
        let expected_rounds = first_len.trailing_zeros() as usize + 1;
        if self.rounds.len() != expected_rounds {
            return Err(BracketError::corrupt(format!(
                "expected {expected_rounds} rounds, found {}",
                self.rounds.len()
            )));
        }

        let last = self.rounds.len() - 1;
        for (index, round) in self.rounds.iter().enumerate() {
            let expected = first_len >> index;
            if round.len() != expected {
                return Err(BracketError::corrupt(format!(
                    "round {} has {} matches, expected {expected}",
                    index + 1,
                    round.len()
                )));
            }

            for (slot, m) in round.iter().enumerate() {
                let key = MatchKey::new(index as u32, slot as u32);
                if m.key != key {
                    return Err(BracketError::corrupt(format!(
                        "match {} stored at {key}",
                        m.key
                    )));
                }

                let expected_next = (index < last).then(|| key.forward());
                if m.next_win != expected_next {
                    return Err(BracketError::corrupt(format!(
                        "match {key} points to {:?}, expected {:?}",
                        m.next_win, expected_next
                    )));
                }

                if index == 0 && m.team1.is_none() && m.team2.is_none() {
                    return Err(BracketError::corrupt(format!(
                        "first-round match {key} has no teams"
                    )));
                }

                if let Some(winner) = m.winner {
                    if !m.has_team(winner) {
                        return Err(BracketError::corrupt(format!(
                            "winner {winner} of {key} is not in the match"
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Whether a bracket has been generated
    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }

    /// Number of team slots in the first round
    pub fn size(&self) -> usize {
        self.rounds.first().map_or(0, |round| round.len() * 2)
    }

    pub fn round(&self, index: usize) -> Option<&[BracketMatch]> {
        self.rounds.get(index).map(Vec::as_slice)
    }

    pub fn rounds(&self) -> impl Iterator<Item = &[BracketMatch]> {
        self.rounds.iter().map(Vec::as_slice)
    }

    /// All matches ordered by round, then slot
    pub fn matches(&self) -> impl Iterator<Item = &BracketMatch> {
        self.rounds.iter().flatten()
    }

    pub fn get(&self, key: MatchKey) -> Option<&BracketMatch> {
        self.rounds
            .get(key.round as usize)
            .and_then(|round| round.get(key.slot as usize))
    }

    pub(crate) fn get_mut(&mut self, key: MatchKey) -> Option<&mut BracketMatch> {
        self.rounds
            .get_mut(key.round as usize)
            .and_then(|round| round.get_mut(key.slot as usize))
    }

    pub fn final_key(&self) -> Option<MatchKey> {
        self.rounds
            .len()
            .checked_sub(1)
            .map(|last| MatchKey::new(last as u32, 0))
    }

    pub fn final_match(&self) -> Option<&BracketMatch> {
        self.final_key().and_then(|key| self.get(key))
    }

    /// Winner of the final
    pub fn champion(&self) -> Option<TeamId> {
        self.final_match().and_then(|m| m.winner)
    }

    /// First-round byes
    pub fn bye_count(&self) -> usize {
        self.rounds
            .first()
            .map_or(0, |round| round.iter().filter(|m| m.is_bye).count())
    }

    /// Matches waiting for a result
    pub fn pending(&self) -> impl Iterator<Item = &BracketMatch> {
        self.matches().filter(|m| m.is_ready())
    }

    /// A match is dead when no team can ever reach it: it holds no team, has
    /// no winner, and every feeder is dead too.
    pub fn is_dead(&self, key: MatchKey) -> bool {
        let Some(m) = self.get(key) else {
            return true;
        };
        if m.winner.is_some() || m.team_count() > 0 {
            return false;
        }
        match key.feeders() {
            None => true,
            Some(feeders) => feeders.iter().all(|&feeder| self.is_dead(feeder)),
        }
    }
}
