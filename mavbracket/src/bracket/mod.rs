//! Single-elimination brackets.
//!
//! This module provides:
//! - A bracket tree sized to the next power of two, with byes for the gaps
//! - POWER and RANDOM first-round seeding
//! - Match resolution with winner propagation and bye cascades
//! - A manager that runs each operation in one storage transaction
//!
//! ## Example
//!
//! ```no_run
//! use mavbracket::bracket::{BracketManager, SeedMethod, TournamentConfig};
//! use mavbracket::db::MemoryBracketStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = BracketManager::new(Arc::new(MemoryBracketStore::new()));
//!     let tournament = manager
//!         .create_tournament(&TournamentConfig::new("Friday Cup"))
//!         .await?;
//!
//!     for name in ["Beavers", "Snakes", "Falcons"] {
//!         manager.store().add_team(tournament.id, name, None).await?;
//!     }
//!
//!     let summary = manager
//!         .generate_from_registry(tournament.id, SeedMethod::POWER)
//!         .await?;
//!     println!("{} rounds, {} byes", summary.rounds, summary.byes);
//!
//!     for m in manager.pending_matches(tournament.id).await? {
//!         if let Some(team) = m.team1 {
//!             manager.set_winner(m.id, team, true).await?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod errors;
pub mod manager;
pub mod models;
pub mod resolver;
pub mod seeding;
pub mod tree;

pub use builder::{GeneratedBracket, MIN_TEAMS, build};
pub use errors::{BracketError, BracketResult};
pub use manager::{BracketManager, GenerateSummary};
pub use models::{
    BracketBranch, DEFAULT_ROLE, DEFAULT_TEAM_CAP, DEFAULT_TEAM_SIZE, EliminationType, Match,
    MatchId, PersistedBracket, RecordDelta, Round, RoundId, Team, TeamId, TeamMember, Tournament,
    TournamentConfig, TournamentId, TournamentStatus, slugify,
};
pub use resolver::{MatchResolver, Resolution};
pub use seeding::{
    PowerSeeding, RandomSeeding, SeedMethod, SeedingStrategy, bracket_size, round_count,
};
pub use tree::{Bracket, BracketMatch, MatchKey, Pairing};
