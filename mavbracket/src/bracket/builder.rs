//! Bracket generation.

use log::debug;
use rand::RngCore;
use std::collections::HashSet;

use super::errors::{BracketError, BracketResult};
use super::models::TeamId;
use super::resolver::{MatchResolver, Resolution};
use super::seeding::{SeedMethod, SeedingStrategy, bracket_size, round_count};
use super::tree::{Bracket, MatchKey};

/// Minimum teams for a bracket
pub const MIN_TEAMS: usize = 2;

/// A freshly built bracket and the effects of its automatic bye resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedBracket {
    pub bracket: Bracket,
    pub resolution: Resolution,
}

/// Build a complete bracket for `teams`.
///
/// Seeds the first round with `method`, wires every match to the one a
/// round ahead, and resolves first-round byes (cascading further byes when
/// they appear).
///
/// # Errors
///
/// * `BracketError::NotEnoughTeams` - fewer than two teams
/// * `BracketError::DuplicateTeam` - a team listed twice
/// * `BracketError::StructuralInvariantViolation` - the strategy produced an
///   unusable pairing list
pub fn build(
    teams: &[TeamId],
    method: &SeedMethod,
    rng: &mut dyn RngCore,
) -> BracketResult<GeneratedBracket> {
    if teams.len() < MIN_TEAMS {
        return Err(BracketError::NotEnoughTeams {
            needed: MIN_TEAMS,
            current: teams.len(),
        });
    }

    let mut seen = HashSet::with_capacity(teams.len());
    if let Some(&dup) = teams.iter().find(|&&team| !seen.insert(team)) {
        return Err(BracketError::DuplicateTeam(dup));
    }

    let size = bracket_size(teams.len());
    let pairings = method.pairings(teams, rng);
    if pairings.len() != size / 2 {
        return Err(BracketError::corrupt(format!(
            "{method} seeding produced {} pairings for a bracket of {size}",
            pairings.len()
        )));
    }

    let mut bracket = Bracket::from_pairings(pairings)?;
    debug_assert_eq!(bracket.round_count(), round_count(size));

    let byes: Vec<(MatchKey, TeamId)> = bracket
        .round(0)
        .unwrap_or_default()
        .iter()
        .filter(|m| m.is_bye)
        .filter_map(|m| m.lone_team().map(|team| (m.key, team)))
        .collect();

    let mut resolver = MatchResolver::new(&mut bracket);
    for (key, team) in byes {
        resolver.set_winner(key, team, true)?;
    }
    let resolution = resolver.finish();

    debug!(
        "Built {method} bracket: {} teams, size {size}, {} rounds, {} byes",
        teams.len(),
        bracket.round_count(),
        bracket.bye_count()
    );

    Ok(GeneratedBracket {
        bracket,
        resolution,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn build_power(n: i64) -> GeneratedBracket {
        let teams: Vec<TeamId> = (1..=n).collect();
        build(&teams, &SeedMethod::POWER, &mut StdRng::seed_from_u64(0)).unwrap()
    }

    #[test]
    fn test_four_teams_no_byes() {
        let generated = build_power(4);
        let b = &generated.bracket;
        assert_eq!(b.round_count(), 2);
        assert_eq!(b.bye_count(), 0);

        let first = b.round(0).unwrap();
        assert_eq!((first[0].team1, first[0].team2), (Some(1), Some(4)));
        assert_eq!((first[1].team1, first[1].team2), (Some(2), Some(3)));
        assert!(generated.resolution.decided.is_empty());
    }

    #[test]
    fn test_three_teams_bye_advances_top_seed() {
        let generated = build_power(3);
        let b = &generated.bracket;
        let first = b.round(0).unwrap();
        assert!(first[0].is_bye);
        assert_eq!(first[0].winner, Some(1));
        assert_eq!((first[1].team1, first[1].team2), (Some(2), Some(3)));
        assert_eq!(b.final_match().unwrap().team1, Some(1));
        assert_eq!(b.final_match().unwrap().winner, None);
        assert!(!generated.resolution.finished);
    }

    #[test]
    fn test_five_teams() {
        let generated = build_power(5);
        let b = &generated.bracket;
        assert_eq!(b.round_count(), 3);
        assert_eq!(b.bye_count(), 3);
        // Seeds 1 and 2 both had byes and meet in the second round.
        let semi = b.get(MatchKey::new(1, 0)).unwrap();
        assert_eq!((semi.team1, semi.team2), (Some(1), Some(2)));
        let semi = b.get(MatchKey::new(1, 1)).unwrap();
        assert_eq!((semi.team1, semi.team2), (Some(3), None));
    }

    #[test]
    fn test_seventeen_teams_doubles_size() {
        let generated = build_power(17);
        assert_eq!(generated.bracket.size(), 32);
        assert_eq!(generated.bracket.round_count(), 5);
        assert_eq!(generated.bracket.bye_count(), 15);
    }

    #[test]
    fn test_two_teams_single_final() {
        let generated = build_power(2);
        assert_eq!(generated.bracket.round_count(), 1);
        assert_eq!(generated.bracket.final_match().unwrap().next_win, None);
    }

    #[test]
    fn test_not_enough_teams() {
        let mut rng = StdRng::seed_from_u64(0);
        for teams in [vec![], vec![1]] {
            let err = build(&teams, &SeedMethod::POWER, &mut rng).unwrap_err();
            assert!(matches!(err, BracketError::NotEnoughTeams { needed: 2, .. }));
        }
    }

    #[test]
    fn test_duplicate_team() {
        let err = build(&[1, 2, 1], &SeedMethod::POWER, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, BracketError::DuplicateTeam(1)));
    }

    #[test]
    fn test_random_build_is_reproducible() {
        let teams: Vec<TeamId> = (1..=9).collect();
        let first = build(&teams, &SeedMethod::RANDOM, &mut StdRng::seed_from_u64(99)).unwrap();
        let second = build(&teams, &SeedMethod::RANDOM, &mut StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.bracket.bye_count(), 7);
    }
}
