//! Bracket error types.

use thiserror::Error;

use super::models::{MatchId, TeamId, TournamentId};
use super::tree::MatchKey;

/// Bracket errors
#[derive(Debug, Error)]
pub enum BracketError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Fewer teams than a bracket needs
    #[error("Not enough teams: need {needed}, have {current}")]
    NotEnoughTeams { needed: usize, current: usize },

    /// Winner is not one of the two teams in the match
    #[error("Team {team} is not playing in match {label}")]
    InvalidWinner { label: String, team: TeamId },

    /// Tournament not found
    #[error("Tournament not found: {0}")]
    TournamentNotFound(TournamentId),

    /// Match not found
    #[error("Match not found: {0}")]
    MatchNotFound(MatchId),

    /// Team not found
    #[error("Team not found: {0}")]
    TeamNotFound(TeamId),

    /// Match position outside the generated bracket
    #[error("No match at {0} in this bracket")]
    UnknownMatchKey(MatchKey),

    /// Team passed to generation does not belong to the tournament
    #[error("Team {team} is not registered in tournament {tournament_id}")]
    UnknownTeam {
        tournament_id: TournamentId,
        team: TeamId,
    },

    /// Team passed to generation more than once
    #[error("Team {0} appears more than once")]
    DuplicateTeam(TeamId),

    /// Match already has a winner
    #[error("Match {0} already has a winner")]
    MatchAlreadyDecided(String),

    /// Match is waiting for its opponent
    #[error("Match {0} is still waiting for an opponent")]
    MatchNotReady(String),

    /// Match has no winner to advance
    #[error("Match {0} has no winner yet")]
    MatchUndecided(String),

    /// Winner already sits in the forward match
    #[error("Winner of match {0} has already advanced")]
    AlreadyAdvanced(String),

    /// The final has no forward match
    #[error("Match {0} is the final; there is no match to advance to")]
    NoForwardMatch(String),

    /// Team name already used in the tournament
    #[error("Team name already taken in this tournament: {0}")]
    TeamNameTaken(String),

    /// Tournament reached its team cap
    #[error("Tournament is full: cap of {cap} teams reached")]
    TournamentFull { cap: usize },

    /// Team roster reached its capacity
    #[error("Team is full: {current}/{max} players")]
    TeamFull { current: usize, max: usize },

    /// Player already on the roster
    #[error("Player already on team: {0}")]
    AlreadyMember(String),

    /// Stored or generated bracket breaks the tree invariants
    #[error("Bracket structure is corrupt: {0}")]
    StructuralInvariantViolation(String),
}

impl BracketError {
    /// Get a client-safe error message that doesn't leak storage internals
    pub fn client_message(&self) -> String {
        match self {
            BracketError::Database(_) => "Internal server error".to_string(),
            BracketError::StructuralInvariantViolation(_) => {
                "Bracket is in an inconsistent state".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Whether the caller should surface this as an informational message
    /// rather than a failure.
    pub fn is_informational(&self) -> bool {
        matches!(self, BracketError::NotEnoughTeams { .. })
    }

    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        BracketError::StructuralInvariantViolation(reason.into())
    }
}

/// Result type for bracket operations
pub type BracketResult<T> = Result<T, BracketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_hides_database_details() {
        let err = BracketError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.client_message(), "Internal server error");
    }

    #[test]
    fn test_client_message_hides_corruption_details() {
        let err = BracketError::corrupt("match R2-M1 points backwards");
        assert_eq!(err.client_message(), "Bracket is in an inconsistent state");
        assert!(err.to_string().contains("R2-M1"));
    }

    #[test]
    fn test_not_enough_teams_is_informational() {
        let err = BracketError::NotEnoughTeams {
            needed: 2,
            current: 1,
        };
        assert!(err.is_informational());
        assert_eq!(err.client_message(), "Not enough teams: need 2, have 1");
        assert!(!BracketError::MatchNotFound(7).is_informational());
    }
}
