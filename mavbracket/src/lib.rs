//! # Mavbracket
//!
//! Single-elimination tournament brackets: teams are mapped onto a
//! power-of-two tree, byes are resolved automatically, and winners are
//! propagated round by round until a champion is decided.
//!
//! ## Core Modules
//!
//! - [`bracket`]: Bracket tree, seeding, match resolution and the manager
//! - [`db`]: PostgreSQL pool, schema, and the bracket stores
//!
//! ## Example
//!
//! ```
//! use mavbracket::{Bracket, MatchKey};
//!
//! let bracket = Bracket::from_pairings(vec![(Some(1), Some(4)), (Some(2), Some(3))]).unwrap();
//! assert_eq!(bracket.round_count(), 2);
//! assert_eq!(bracket.final_key(), Some(MatchKey::new(1, 0)));
//! ```

/// Bracket generation, seeding and match resolution.
pub mod bracket;
pub use bracket::{
    Bracket, BracketError, BracketManager, BracketMatch, BracketResult, GenerateSummary, Match,
    MatchId, MatchKey, PersistedBracket, SeedMethod, Team, TeamId, Tournament, TournamentConfig,
    TournamentId, TournamentStatus,
};

/// Database connection pooling and bracket storage.
pub mod db;
pub use db::{BracketStore, BracketTransaction, Database, DatabaseConfig, MemoryBracketStore};
