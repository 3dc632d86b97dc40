//! Integration tests for the PostgreSQL bracket store.
//!
//! Needs a reachable database (`DATABASE_URL`, defaulting to the local
//! development database). Run with `cargo test -- --ignored`.

use mavbracket::bracket::{
    BracketError, BracketManager, SeedMethod, TournamentConfig, TournamentStatus,
};
use mavbracket::db::{BracketStore, Database, DatabaseConfig};
use serial_test::serial;
use std::sync::Arc;

/// Helper to connect and bootstrap the schema
async fn setup_test_db() -> Database {
    let mut config = DatabaseConfig::development();
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config = config.with_url(url);
    }
    config.max_connections = 5;

    let db = Database::new(&config)
        .await
        .expect("Failed to create test database");
    db.migrate().await.expect("Failed to migrate test database");
    db
}

/// Unique tournament name per run
fn unique_name(prefix: &str) -> String {
    format!(
        "{}_{}",
        prefix,
        chrono::Utc::now().timestamp_nanos_opt().unwrap()
    )
}

/// Helper to cleanup a test tournament
async fn cleanup(db: &Database, tournament_id: i64) {
    let _ = sqlx::query("DELETE FROM tournaments WHERE id = $1")
        .bind(tournament_id)
        .execute(db.pool())
        .await;
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL server"]
async fn test_pg_generate_and_finish() {
    let db = setup_test_db().await;
    let store: Arc<dyn BracketStore> = Arc::new(db.bracket_store());
    let manager = BracketManager::with_seed(store, 11);

    let tournament = manager
        .create_tournament(&TournamentConfig::new(unique_name("pg_finish")))
        .await
        .unwrap();
    for name in ["Beavers", "Snakes", "Falcons"] {
        manager
            .store()
            .add_team(tournament.id, name, None)
            .await
            .unwrap();
    }

    let summary = manager
        .generate_from_registry(tournament.id, SeedMethod::POWER)
        .await
        .unwrap();
    assert_eq!(summary.rounds, 2);
    assert_eq!(summary.byes, 1);

    loop {
        let pending = manager.pending_matches(tournament.id).await.unwrap();
        let Some(m) = pending.first() else { break };
        manager
            .set_winner(m.id, m.team1.unwrap(), true)
            .await
            .unwrap();
    }

    let finished = manager.tournament(tournament.id).await.unwrap();
    assert_eq!(finished.status, TournamentStatus::Finished);
    assert!(manager.champion(tournament.id).await.unwrap().is_some());

    cleanup(&db, tournament.id).await;
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL server"]
async fn test_pg_rejected_winner_rolls_back() {
    let db = setup_test_db().await;
    let store: Arc<dyn BracketStore> = Arc::new(db.bracket_store());
    let manager = BracketManager::with_seed(store, 11);

    let tournament = manager
        .create_tournament(&TournamentConfig::new(unique_name("pg_rollback")))
        .await
        .unwrap();
    let mut teams = Vec::new();
    for name in ["A", "B", "C", "D"] {
        teams.push(
            manager
                .store()
                .add_team(tournament.id, name, None)
                .await
                .unwrap(),
        );
    }
    manager
        .generate_from_registry(tournament.id, SeedMethod::POWER)
        .await
        .unwrap();

    let before = manager.bracket(tournament.id).await.unwrap();
    let first = before.matches()[0].clone();
    let outsider = teams
        .iter()
        .find(|t| Some(t.id) != first.team1 && Some(t.id) != first.team2)
        .unwrap();

    let err = manager
        .set_winner(first.id, outsider.id, true)
        .await
        .unwrap_err();
    assert!(matches!(err, BracketError::InvalidWinner { .. }));
    assert_eq!(manager.bracket(tournament.id).await.unwrap(), before);

    let err = manager
        .store()
        .add_team(tournament.id, "A", None)
        .await
        .unwrap_err();
    assert!(matches!(err, BracketError::TeamNameTaken(_)));

    cleanup(&db, tournament.id).await;
}
