//! PostgreSQL connection pooling, schema bootstrap and bracket storage.
//!
//! [`Database`] owns the pool. [`PgBracketStore`] and [`MemoryBracketStore`]
//! implement the [`BracketStore`] trait the bracket manager works against.

use log::info;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;

pub mod config;
pub mod memory;
pub mod repository;

pub use config::{DatabaseConfig, DatabaseConfigError};
pub use memory::MemoryBracketStore;
pub use repository::{BracketStore, BracketTransaction, PgBracketStore, PgBracketTransaction};

/// Schema statements, applied in order. Every statement is idempotent.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tournaments (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(200) NOT NULL,
        elimination_type VARCHAR(16) NOT NULL DEFAULT 'SINGLE',
        team_cap INTEGER NOT NULL DEFAULT 32 CHECK (team_cap > 0),
        default_team_size SMALLINT NOT NULL DEFAULT 2 CHECK (default_team_size > 0),
        status VARCHAR(16) NOT NULL DEFAULT 'DRAFT'
            CHECK (status IN ('DRAFT', 'ACTIVE', 'FINISHED')),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS teams (
        id BIGSERIAL PRIMARY KEY,
        tournament_id BIGINT NOT NULL REFERENCES tournaments(id) ON DELETE CASCADE,
        name VARCHAR(200) NOT NULL,
        search_slug VARCHAR(200) NOT NULL,
        max_players SMALLINT NOT NULL DEFAULT 2,
        wins INTEGER NOT NULL DEFAULT 0,
        losses INTEGER NOT NULL DEFAULT 0,
        UNIQUE (tournament_id, name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS team_members (
        team_id BIGINT NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
        username VARCHAR(150) NOT NULL,
        role VARCHAR(32) NOT NULL DEFAULT 'player',
        joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (team_id, username)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS rounds (
        id BIGSERIAL PRIMARY KEY,
        tournament_id BIGINT NOT NULL REFERENCES tournaments(id) ON DELETE CASCADE,
        bracket VARCHAR(16) NOT NULL DEFAULT 'WINNERS',
        round_index INTEGER NOT NULL CHECK (round_index >= 0),
        UNIQUE (tournament_id, bracket, round_index)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS matches (
        id BIGSERIAL PRIMARY KEY,
        tournament_id BIGINT NOT NULL REFERENCES tournaments(id) ON DELETE CASCADE,
        round_id BIGINT NOT NULL REFERENCES rounds(id) ON DELETE CASCADE,
        slot INTEGER NOT NULL CHECK (slot >= 0),
        team1_id BIGINT REFERENCES teams(id) ON DELETE SET NULL,
        team2_id BIGINT REFERENCES teams(id) ON DELETE SET NULL,
        winner_id BIGINT REFERENCES teams(id) ON DELETE SET NULL,
        loser_id BIGINT REFERENCES teams(id) ON DELETE SET NULL,
        next_win_id BIGINT REFERENCES matches(id) ON DELETE SET NULL,
        is_bye BOOLEAN NOT NULL DEFAULT FALSE,
        UNIQUE (round_id, slot)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_matches_tournament ON matches(tournament_id)",
    "CREATE INDEX IF NOT EXISTS idx_teams_tournament ON teams(tournament_id)",
];

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: Arc<PgPool>,
}

impl Database {
    /// Create a new database connection pool
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mavbracket::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), sqlx::Error> {
    ///     let db = Database::new(&DatabaseConfig::development()).await?;
    ///     db.migrate().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Bracket store sharing this pool
    pub fn bracket_store(&self) -> PgBracketStore {
        PgBracketStore::new(Arc::clone(&self.pool))
    }

    /// Create the bracket tables if they don't exist yet
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        info!("Database schema is up to date ({} statements)", SCHEMA.len());
        Ok(())
    }

    /// Check if the database connection is healthy
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(self.pool.as_ref()).await?;
        Ok(())
    }

    /// Close the database connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}
