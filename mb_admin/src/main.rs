//! Operator tool for single-elimination brackets.
//!
//! Bootstraps the schema, seeds a demo tournament, and drives bracket
//! generation and match results against PostgreSQL.

mod commands;
mod config;
mod logging;

use std::sync::Arc;

use anyhow::{Context, Error, bail};
use ctrlc::set_handler;
use log::info;
use mavbracket::bracket::{BracketError, BracketManager, SeedMethod};
use mavbracket::db::Database;
use pico_args::Arguments;

use config::AdminConfig;

const HELP: &str = "\
Manage single-elimination tournament brackets

USAGE:
  mb_admin [OPTIONS] <COMMAND>

COMMANDS:
  migrate                                  Create the database schema
  seed-demo                                Create or reset the 32-team \"Demo Bracket\"
  generate   --tournament ID [--seed M]    Generate the bracket from registered teams
  set-winner --match ID --team ID          Record a match winner
             [--no-cascade]                  without moving it forward
  advance    --match ID                    Move a decided winner forward
  show       --tournament ID [--json]      Print the bracket

OPTIONS:
  --db-url     URL         Database connection string  [default: env DATABASE_URL or postgres://postgres@localhost/mavbracket]
  --rng-seed   N           Seed for RANDOM seeding      [default: env BRACKET_RNG_SEED or OS entropy]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  DATABASE_URL             PostgreSQL connection string
  DEFAULT_SEED_METHOD      power or random  [default: power]
  DEFAULT_TEAM_SIZE        Players per demo team  [default: 2]
  RUST_LOG                 Log filter  [default: info,sqlx=warn]
";

enum Command {
    Migrate,
    SeedDemo,
    Generate {
        tournament: i64,
        seed: Option<SeedMethod>,
    },
    SetWinner {
        match_id: i64,
        team: i64,
        cascade: bool,
    },
    Advance {
        match_id: i64,
    },
    Show {
        tournament: i64,
        json: bool,
    },
}

struct Args {
    database_url: Option<String>,
    rng_seed: Option<u64>,
    command: Command,
}

fn parse_args(mut pargs: Arguments) -> Result<Args, Error> {
    let database_url = pargs.opt_value_from_str("--db-url")?;
    let rng_seed = pargs.opt_value_from_str("--rng-seed")?;

    let Some(name) = pargs.subcommand()? else {
        bail!("missing command, see --help");
    };
    let command = match name.as_str() {
        "migrate" => Command::Migrate,
        "seed-demo" => Command::SeedDemo,
        "generate" => Command::Generate {
            tournament: pargs.value_from_str("--tournament")?,
            seed: pargs.opt_value_from_str("--seed")?,
        },
        "set-winner" => Command::SetWinner {
            cascade: !pargs.contains("--no-cascade"),
            match_id: pargs.value_from_str("--match")?,
            team: pargs.value_from_str("--team")?,
        },
        "advance" => Command::Advance {
            match_id: pargs.value_from_str("--match")?,
        },
        "show" => Command::Show {
            json: pargs.contains("--json"),
            tournament: pargs.value_from_str("--tournament")?,
        },
        other => bail!("unknown command: {other}"),
    };

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        bail!("unexpected arguments: {remaining:?}");
    }

    Ok(Args {
        database_url,
        rng_seed,
        command,
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = parse_args(pargs)?;

    // Catching signals for exit.
    set_handler(|| std::process::exit(130))?;

    logging::init();

    let config = AdminConfig::from_env(args.database_url, args.rng_seed)?;
    config.validate()?;

    info!("Connecting to database");
    let db = Database::new(&config.database)
        .await
        .context("Failed to connect to database")?;

    let store = Arc::new(db.bracket_store());
    let manager = match config.rng_seed {
        Some(seed) => BracketManager::with_seed(store, seed),
        None => BracketManager::new(store),
    };

    let result = run(&db, &manager, &config, args.command).await;
    db.close().await;
    result
}

async fn run(
    db: &Database,
    manager: &BracketManager,
    config: &AdminConfig,
    command: Command,
) -> Result<(), Error> {
    match command {
        Command::Migrate => {
            db.migrate().await.context("Migration failed")?;
            println!("Schema is up to date");
        }
        Command::SeedDemo => {
            let demo = commands::seed_demo(manager, config.team_size).await?;
            logging::log_bracket_event(
                "seed_demo",
                demo.tournament_id,
                None,
                &format!("Seeded {} teams, {} players", demo.teams, demo.players),
            );
            println!(
                "Seeded {} (#{}) with {} teams",
                commands::DEMO_TOURNAMENT,
                demo.tournament_id,
                demo.teams
            );
        }
        Command::Generate { tournament, seed } => {
            let method = seed.unwrap_or(config.seed_method);
            match commands::generate(manager, tournament, method).await {
                Ok(summary) => {
                    logging::log_bracket_event(
                        "generate",
                        tournament,
                        None,
                        &format!("{} rounds, {} byes", summary.rounds, summary.byes),
                    );
                    println!(
                        "Generated {} bracket: {} teams, {} rounds, {} matches, {} byes",
                        summary.seed_method,
                        summary.teams,
                        summary.rounds,
                        summary.matches,
                        summary.byes
                    );
                }
                Err(e) if e.is_informational() => println!("{}", e.client_message()),
                Err(e) => return Err(rejected("generate", e)),
            }
        }
        Command::SetWinner {
            match_id,
            team,
            cascade,
        } => {
            let m = commands::set_winner(manager, match_id, team, cascade)
                .await
                .map_err(|e| rejected("set-winner", e))?;
            logging::log_bracket_event(
                "set_winner",
                m.tournament_id,
                Some(m.id),
                &format!("{} won by team {team}", m.label()),
            );
            println!("Match {} (#{}) won by team {team}", m.label(), m.id);
        }
        Command::Advance { match_id } => {
            let m = commands::advance(manager, match_id)
                .await
                .map_err(|e| rejected("advance", e))?;
            logging::log_bracket_event(
                "advance",
                m.tournament_id,
                Some(match_id),
                &format!("winner moved to {}", m.label()),
            );
            println!("Winner of #{match_id} moved to {} (#{})", m.label(), m.id);
        }
        Command::Show { tournament, json } => {
            let view = commands::load_view(manager, tournament).await?;
            if json {
                println!("{}", commands::render_json(&view)?);
            } else {
                print!("{}", commands::render_text(&view));
            }
        }
    }
    Ok(())
}

fn rejected(command: &str, err: BracketError) -> Error {
    logging::log_rejected(command, &err.to_string());
    anyhow::anyhow!(err.client_message())
}
