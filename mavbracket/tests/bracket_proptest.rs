/// Property-based tests for bracket generation and resolution using proptest
///
/// These tests check the structural guarantees of generated brackets across
/// team counts and seeds, and that resolving every match always crowns
/// exactly one champion.
use mavbracket::bracket::{
    Bracket, MatchKey, MatchResolver, SeedMethod, TeamId, bracket_size, build,
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

// Strategy for a seeding method
fn method_strategy() -> impl Strategy<Value = SeedMethod> {
    prop_oneof![Just(SeedMethod::POWER), Just(SeedMethod::RANDOM)]
}

fn teams(n: usize) -> Vec<TeamId> {
    (1..=n as i64).collect()
}

fn generate(n: usize, method: SeedMethod, seed: u64) -> Bracket {
    build(&teams(n), &method, &mut StdRng::seed_from_u64(seed))
        .unwrap()
        .bracket
}

// Resolve every ready match, always picking team1, until nothing is pending
fn play_out(bracket: &mut Bracket) -> usize {
    let mut finals = 0;
    loop {
        let ready: Vec<(MatchKey, TeamId)> = bracket
            .pending()
            .filter_map(|m| m.team1.map(|t| (m.key, t)))
            .collect();
        if ready.is_empty() {
            return finals;
        }
        for (key, winner) in ready {
            let mut resolver = MatchResolver::new(bracket);
            resolver.set_winner(key, winner, true).unwrap();
            if resolver.finish().finished {
                finals += 1;
            }
        }
    }
}

proptest! {
    #[test]
    fn test_round_count_and_shape(n in 2usize..=64, method in method_strategy(), seed in any::<u64>()) {
        let bracket = generate(n, method, seed);
        let size = bracket_size(n);

        prop_assert_eq!(bracket.size(), size);
        prop_assert_eq!(bracket.round_count(), size.trailing_zeros() as usize);
        prop_assert_eq!(bracket.round(0).unwrap().len(), size / 2);
        prop_assert_eq!(bracket.round(bracket.round_count() - 1).unwrap().len(), 1);
        prop_assert!(bracket.validate().is_ok());
    }

    #[test]
    fn test_bye_count(n in 2usize..=64, method in method_strategy(), seed in any::<u64>()) {
        let bracket = generate(n, method, seed);
        let first_round_byes = bracket.round(0).unwrap().iter().filter(|m| m.is_bye).count();
        prop_assert_eq!(first_round_byes, bracket_size(n) - n);
    }

    #[test]
    fn test_every_team_seeded_once(n in 2usize..=64, method in method_strategy(), seed in any::<u64>()) {
        let bracket = generate(n, method, seed);
        let mut seeded: Vec<TeamId> = bracket
            .round(0)
            .unwrap()
            .iter()
            .flat_map(|m| m.teams().collect::<Vec<_>>())
            .collect();
        seeded.sort_unstable();
        prop_assert_eq!(seeded, teams(n));
    }

    #[test]
    fn test_generation_is_deterministic(n in 2usize..=48, method in method_strategy(), seed in any::<u64>()) {
        prop_assert_eq!(generate(n, method, seed), generate(n, method, seed));
    }

    #[test]
    fn test_full_resolution_finishes_once(n in 2usize..=40, method in method_strategy(), seed in any::<u64>()) {
        let mut bracket = generate(n, method, seed);
        let finals = play_out(&mut bracket);

        prop_assert_eq!(finals, 1);
        prop_assert!(bracket.matches().all(|m| m.winner.is_some()));

        // The champion is reachable by following forward pointers from
        // one of its first-round matches.
        let champion = bracket.champion().unwrap();
        let mut key = bracket
            .round(0)
            .unwrap()
            .iter()
            .find(|m| m.has_team(champion))
            .map(|m| m.key)
            .unwrap();
        while let Some(next) = bracket.get(key).unwrap().next_win {
            prop_assert_eq!(bracket.get(key).unwrap().winner, Some(champion));
            key = next;
        }
        prop_assert_eq!(Some(key), bracket.final_key());
    }
}
