//! First-round seeding strategies.
//!
//! A strategy turns an ordered team list into `bracket_size / 2` pairings.
//! Every pairing holds at least one team, so the bracket ends up with
//! exactly `bracket_size - teams` byes.

use enum_dispatch::enum_dispatch;
use rand::RngCore;
use rand::seq::SliceRandom;
use std::fmt;
use std::str::FromStr;

use super::models::TeamId;
use super::tree::Pairing;

/// Smallest power of two that fits `teams` (at least 1)
pub fn bracket_size(teams: usize) -> usize {
    teams.max(1).next_power_of_two()
}

/// Rounds needed for a bracket of `size` slots
pub fn round_count(size: usize) -> usize {
    size.max(1).trailing_zeros() as usize
}

/// Produces first-round pairings
#[enum_dispatch]
pub trait SeedingStrategy {
    fn pairings(&self, teams: &[TeamId], rng: &mut dyn RngCore) -> Vec<Pairing>;
}

/// Rank `r` meets rank `size + 1 - r`; ranks follow input order and ranks
/// past the team count are byes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PowerSeeding;

impl SeedingStrategy for PowerSeeding {
    fn pairings(&self, teams: &[TeamId], _rng: &mut dyn RngCore) -> Vec<Pairing> {
        if teams.len() < 2 {
            return Vec::new();
        }
        let size = bracket_size(teams.len());
        let seed = |rank: usize| teams.get(rank - 1).copied();
        (1..=size / 2)
            .map(|rank| (seed(rank), seed(size + 1 - rank)))
            .collect()
    }
}

/// Uniform shuffle, then consecutive pairs; the trailing teams that don't
/// fill a pair each get an absent opponent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RandomSeeding;

impl SeedingStrategy for RandomSeeding {
    fn pairings(&self, teams: &[TeamId], rng: &mut dyn RngCore) -> Vec<Pairing> {
        if teams.len() < 2 {
            return Vec::new();
        }
        let mut shuffled = teams.to_vec();
        shuffled.shuffle(rng);

        let byes = bracket_size(teams.len()) - teams.len();
        let (paired, rest) = shuffled.split_at(teams.len() - byes);
        paired
            .chunks_exact(2)
            .map(|pair| (Some(pair[0]), Some(pair[1])))
            .chain(rest.iter().map(|&team| (Some(team), None)))
            .collect()
    }
}

/// Seeding method selected by the caller
#[enum_dispatch(SeedingStrategy)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedMethod {
    Power(PowerSeeding),
    Random(RandomSeeding),
}

impl SeedMethod {
    pub const POWER: SeedMethod = SeedMethod::Power(PowerSeeding);
    pub const RANDOM: SeedMethod = SeedMethod::Random(RandomSeeding);

    pub fn as_str(&self) -> &'static str {
        match self {
            SeedMethod::Power(_) => "POWER",
            SeedMethod::Random(_) => "RANDOM",
        }
    }
}

impl Default for SeedMethod {
    fn default() -> Self {
        Self::POWER
    }
}

impl fmt::Display for SeedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeedMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "POWER" => Ok(Self::POWER),
            "RANDOM" => Ok(Self::RANDOM),
            other => Err(format!("unknown seed method: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn ids(n: i64) -> Vec<TeamId> {
        (1..=n).collect()
    }

    fn byes(pairs: &[Pairing]) -> usize {
        pairs
            .iter()
            .filter(|(a, b)| a.is_some() != b.is_some())
            .count()
    }

    #[test]
    fn test_bracket_size_and_rounds() {
        assert_eq!(bracket_size(0), 1);
        assert_eq!(bracket_size(2), 2);
        assert_eq!(bracket_size(3), 4);
        assert_eq!(bracket_size(8), 8);
        assert_eq!(bracket_size(17), 32);
        assert_eq!(round_count(1), 0);
        assert_eq!(round_count(2), 1);
        assert_eq!(round_count(32), 5);
    }

    #[test]
    fn test_power_seeding_four_teams() {
        let mut rng = StdRng::seed_from_u64(0);
        let pairs = PowerSeeding.pairings(&ids(4), &mut rng);
        assert_eq!(pairs, vec![(Some(1), Some(4)), (Some(2), Some(3))]);
    }

    #[test]
    fn test_power_seeding_three_teams() {
        let mut rng = StdRng::seed_from_u64(0);
        let pairs = PowerSeeding.pairings(&ids(3), &mut rng);
        assert_eq!(pairs, vec![(Some(1), None), (Some(2), Some(3))]);
    }

    #[test]
    fn test_power_seeding_top_seeds_get_byes() {
        let mut rng = StdRng::seed_from_u64(0);
        let pairs = PowerSeeding.pairings(&ids(5), &mut rng);
        assert_eq!(
            pairs,
            vec![
                (Some(1), None),
                (Some(2), None),
                (Some(3), None),
                (Some(4), Some(5)),
            ]
        );
    }

    #[test]
    fn test_random_seeding_is_reproducible() {
        let teams = ids(11);
        let first = RandomSeeding.pairings(&teams, &mut StdRng::seed_from_u64(42));
        let second = RandomSeeding.pairings(&teams, &mut StdRng::seed_from_u64(42));
        assert_eq!(first, second);
    }

    #[test]
    fn test_random_seeding_uses_every_team_once() {
        let teams = ids(13);
        let pairs = RandomSeeding.pairings(&teams, &mut StdRng::seed_from_u64(7));
        assert_eq!(pairs.len(), 8);
        assert_eq!(byes(&pairs), 3);

        let mut seen: Vec<TeamId> = pairs
            .iter()
            .flat_map(|(a, b)| a.iter().chain(b.iter()).copied())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, teams);
    }

    #[test]
    fn test_random_seeding_odd_count_leaves_trailing_bye() {
        let pairs = RandomSeeding.pairings(&ids(7), &mut StdRng::seed_from_u64(1));
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[3].1, None);
        assert!(pairs[..3].iter().all(|(a, b)| a.is_some() && b.is_some()));
    }

    #[test]
    fn test_fewer_than_two_teams_yields_nothing() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(SeedMethod::POWER.pairings(&ids(1), &mut rng).is_empty());
        assert!(SeedMethod::RANDOM.pairings(&[], &mut rng).is_empty());
    }

    #[test]
    fn test_seed_method_parsing() {
        assert_eq!("power".parse::<SeedMethod>(), Ok(SeedMethod::POWER));
        assert_eq!("RANDOM".parse::<SeedMethod>(), Ok(SeedMethod::RANDOM));
        assert!("swiss".parse::<SeedMethod>().is_err());
        assert_eq!(SeedMethod::default().to_string(), "POWER");
    }
}
