//! Match resolution and winner propagation.
//!
//! [`MatchResolver`] mutates a [`Bracket`] in place and collects the side
//! effects storage has to apply: touched matches, win/loss changes, and
//! whether the final was decided. Nothing is persisted here.

use log::debug;
use std::collections::{BTreeMap, BTreeSet};

use super::errors::{BracketError, BracketResult};
use super::models::{RecordDelta, TeamId};
use super::tree::{Bracket, MatchKey};

/// Side effects of one or more resolutions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Matches that received a winner, in resolution order
    pub decided: Vec<MatchKey>,
    /// Every match whose stored row changed
    pub touched: BTreeSet<MatchKey>,
    /// The final received its winner
    pub finished: bool,
    records: BTreeMap<TeamId, RecordDelta>,
}

impl Resolution {
    /// Per-team record changes, ordered by team id
    pub fn record_deltas(&self) -> impl Iterator<Item = &RecordDelta> {
        self.records.values()
    }

    pub fn record_for(&self, team: TeamId) -> Option<&RecordDelta> {
        self.records.get(&team)
    }

    fn credit_win(&mut self, team: TeamId) {
        self.entry(team).wins += 1;
    }

    fn charge_loss(&mut self, team: TeamId) {
        self.entry(team).losses += 1;
    }

    fn entry(&mut self, team: TeamId) -> &mut RecordDelta {
        self.records.entry(team).or_insert(RecordDelta {
            team,
            wins: 0,
            losses: 0,
        })
    }
}

/// Applies winner decisions to a bracket
pub struct MatchResolver<'a> {
    bracket: &'a mut Bracket,
    resolution: Resolution,
}

impl<'a> MatchResolver<'a> {
    pub fn new(bracket: &'a mut Bracket) -> Self {
        Self {
            bracket,
            resolution: Resolution::default(),
        }
    }

    /// Record `winner` for the match at `key`.
    ///
    /// The winner must be one of the match's teams, the match must not be
    /// decided yet, and a match that is not a bye needs both teams. All
    /// checks run before anything changes. With `cascade`
    /// the winner moves into the forward match, and forward matches whose
    /// other side can never be filled are resolved as byes in turn.
    pub fn set_winner(&mut self, key: MatchKey, winner: TeamId, cascade: bool) -> BracketResult<()> {
        let m = self
            .bracket
            .get(key)
            .ok_or(BracketError::UnknownMatchKey(key))?;
        if m.is_decided() {
            return Err(BracketError::MatchAlreadyDecided(key.to_string()));
        }
        if !m.has_team(winner) {
            return Err(BracketError::InvalidWinner {
                label: key.to_string(),
                team: winner,
            });
        }
        // Only a bye may be decided without an opponent.
        if !m.is_bye && m.team_count() < 2 {
            return Err(BracketError::MatchNotReady(key.to_string()));
        }

        self.decide(key, winner)?;
        if cascade {
            self.cascade_from(key, winner)?;
        }
        Ok(())
    }

    /// Push the winner of an already decided match into its forward match.
    pub fn advance(&mut self, key: MatchKey) -> BracketResult<()> {
        let m = self
            .bracket
            .get(key)
            .ok_or(BracketError::UnknownMatchKey(key))?;
        let winner = m
            .winner
            .ok_or_else(|| BracketError::MatchUndecided(key.to_string()))?;
        let next = m
            .next_win
            .ok_or_else(|| BracketError::NoForwardMatch(key.to_string()))?;
        let target = self
            .bracket
            .get(next)
            .ok_or(BracketError::UnknownMatchKey(next))?;
        if target.has_team(winner) {
            return Err(BracketError::AlreadyAdvanced(key.to_string()));
        }
        self.cascade_from(key, winner)
    }

    /// Effects collected so far
    pub fn finish(self) -> Resolution {
        self.resolution
    }

    fn decide(&mut self, key: MatchKey, winner: TeamId) -> BracketResult<()> {
        let is_final = self.bracket.final_key() == Some(key);
        let m = self
            .bracket
            .get_mut(key)
            .ok_or(BracketError::UnknownMatchKey(key))?;
        let loser = m.opponent_of(winner);
        m.winner = Some(winner);
        m.loser = loser;

        self.resolution.credit_win(winner);
        if let Some(loser) = loser {
            self.resolution.charge_loss(loser);
        }
        self.resolution.decided.push(key);
        self.resolution.touched.insert(key);
        if is_final {
            self.resolution.finished = true;
        }
        debug!("Match {key} won by team {winner}");
        Ok(())
    }

    /// Walk the winner up the tree. Each hop climbs one round, so the loop
    /// runs at most `round_count` times.
    fn cascade_from(&mut self, key: MatchKey, winner: TeamId) -> BracketResult<()> {
        let max_hops = self.bracket.round_count();
        let mut hops = 0;
        let mut work = vec![(key, winner)];

        while let Some((from, team)) = work.pop() {
            hops += 1;
            if hops > max_hops {
                return Err(BracketError::corrupt(format!(
                    "cascade from {key} exceeded {max_hops} hops"
                )));
            }
            if let Some((next, lone)) = self.place_forward(from, team)? {
                self.decide(next, lone)?;
                work.push((next, lone));
            }
        }
        Ok(())
    }

    /// Place `team` into the forward match of `from`. Returns the forward
    /// match when it became a bye that must be resolved next.
    fn place_forward(
        &mut self,
        from: MatchKey,
        team: TeamId,
    ) -> BracketResult<Option<(MatchKey, TeamId)>> {
        let Some(next) = self
            .bracket
            .get(from)
            .ok_or(BracketError::UnknownMatchKey(from))?
            .next_win
        else {
            return Ok(None);
        };
        if next.round <= from.round {
            return Err(BracketError::corrupt(format!(
                "match {from} points to {next}, which is not a later round"
            )));
        }

        let other_side_dead = self.bracket.is_dead(from.sibling());
        let target = self
            .bracket
            .get_mut(next)
            .ok_or(BracketError::UnknownMatchKey(next))?;
        target.place(team)?;
        self.resolution.touched.insert(next);
        debug!("Team {team} advanced from {from} to {next}");

        if target.winner.is_none() && other_side_dead {
            if let Some(lone) = target.lone_team() {
                target.is_bye = true;
                debug!("Match {next} became a bye for team {lone}");
                return Ok(Some((next, lone)));
            }
        }
        Ok(None)
    }
}
