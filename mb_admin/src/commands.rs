//! Admin commands. Each one is a thin call into [`BracketManager`].

use mavbracket::bracket::{
    BracketManager, BracketResult, DEFAULT_ROLE, GenerateSummary, Match, MatchId,
    PersistedBracket, SeedMethod, Team, TeamId, Tournament, TournamentConfig, TournamentId,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;

/// Name of the demo tournament
pub const DEMO_TOURNAMENT: &str = "Demo Bracket";

/// Demo team names, registered in this order
pub const TEAM_NAMES: [&str; 32] = [
    "Beavers", "Snakes", "Falcons", "Cyclones", "Badgers", "Dragons", "Wolves", "Marlins",
    "Panthers", "Comets", "Sharks", "Ravens", "Coyotes", "Spartans", "Mustangs", "Knights",
    "Jets", "Titans", "Vikings", "Pirates", "Lions", "Eagles", "Tigers", "Hawks", "Bulls",
    "Raiders", "Warriors", "Pythons", "Cobras", "Rockets", "Thunder", "Storm",
];

/// Result of seeding the demo tournament
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoSummary {
    pub tournament_id: TournamentId,
    pub teams: usize,
    pub players: usize,
}

/// Create (or reset) the demo tournament with 32 teams of `team_size`
/// players, named `player1`, `player2`, ... across the whole roster.
pub async fn seed_demo(
    manager: &BracketManager,
    team_size: usize,
) -> BracketResult<DemoSummary> {
    let store = manager.store();
    let tournament = match store.find_tournament_by_name(DEMO_TOURNAMENT).await? {
        Some(existing) => {
            let removed = store.remove_teams(existing.id).await?;
            log::info!("Removed {removed} team(s) from tournament {}", existing.id);
            existing
        }
        None => {
            let config = TournamentConfig::new(DEMO_TOURNAMENT)
                .with_team_cap(TEAM_NAMES.len())
                .with_team_size(team_size);
            manager.create_tournament(&config).await?
        }
    };

    let mut players = 0;
    for (i, name) in TEAM_NAMES.iter().enumerate() {
        let team = store
            .add_team(tournament.id, name, Some(team_size))
            .await?;
        for n in 1..=team_size {
            let username = format!("player{}", team_size * i + n);
            store.add_member(team.id, &username, DEFAULT_ROLE).await?;
            players += 1;
        }
    }

    Ok(DemoSummary {
        tournament_id: tournament.id,
        teams: TEAM_NAMES.len(),
        players,
    })
}

/// Generate a bracket from every registered team
pub async fn generate(
    manager: &BracketManager,
    tournament_id: TournamentId,
    method: SeedMethod,
) -> BracketResult<GenerateSummary> {
    manager.generate_from_registry(tournament_id, method).await
}

pub async fn set_winner(
    manager: &BracketManager,
    match_id: MatchId,
    team_id: TeamId,
    cascade: bool,
) -> BracketResult<Match> {
    manager.set_winner(match_id, team_id, cascade).await
}

pub async fn advance(manager: &BracketManager, match_id: MatchId) -> BracketResult<Match> {
    manager.advance(match_id).await
}

/// Everything `show` prints
#[derive(Debug, Clone, Serialize)]
pub struct BracketView {
    pub tournament: Tournament,
    pub teams: Vec<Team>,
    pub rounds: Vec<RoundView>,
    pub champion: Option<TeamId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundView {
    pub label: String,
    pub matches: Vec<Match>,
}

/// Load the tournament, its teams and its bracket
pub async fn load_view(
    manager: &BracketManager,
    tournament_id: TournamentId,
) -> BracketResult<BracketView> {
    let tournament = manager.tournament(tournament_id).await?;
    let teams = manager.teams(tournament_id).await?;
    let persisted = manager.bracket(tournament_id).await?;
    Ok(view(tournament, teams, &persisted))
}

fn view(tournament: Tournament, teams: Vec<Team>, persisted: &PersistedBracket) -> BracketView {
    let matches = persisted.matches();
    let rounds = persisted
        .rounds()
        .into_iter()
        .map(|round| RoundView {
            label: round.label(),
            matches: matches
                .iter()
                .filter(|m| m.round_id == round.id)
                .cloned()
                .collect(),
        })
        .collect();

    BracketView {
        tournament,
        teams,
        rounds,
        champion: persisted.bracket.champion(),
    }
}

/// Plain-text bracket, one match per line
pub fn render_text(view: &BracketView) -> String {
    let names: HashMap<TeamId, &str> = view
        .teams
        .iter()
        .map(|t| (t.id, t.name.as_str()))
        .collect();
    let name = |team: Option<TeamId>| match team {
        Some(id) => names.get(&id).copied().unwrap_or("?").to_string(),
        None => "-".to_string(),
    };

    let mut out = String::new();
    let t = &view.tournament;
    let _ = writeln!(
        out,
        "{} (#{}) [{}] {} team(s)",
        t.name,
        t.id,
        t.status,
        view.teams.len()
    );

    if view.rounds.is_empty() {
        let _ = writeln!(out, "  no bracket generated");
        return out;
    }

    for round in &view.rounds {
        let _ = writeln!(out, "{}", round.label);
        for m in &round.matches {
            let opponent = if m.is_bye && m.team2.is_none() {
                "(bye)".to_string()
            } else {
                name(m.team2)
            };
            let _ = write!(out, "  {:<7} #{:<6} {} vs {}", m.label(), m.id, name(m.team1), opponent);
            if m.winner.is_some() {
                let _ = write!(out, "  -> {}", name(m.winner));
            }
            let _ = writeln!(out);
        }
    }

    if let Some(champion) = view.champion {
        let _ = writeln!(out, "Champion: {}", name(Some(champion)));
    }
    out
}

/// Pretty JSON for `show --json`
pub fn render_json(view: &BracketView) -> serde_json::Result<String> {
    serde_json::to_string_pretty(view)
}
