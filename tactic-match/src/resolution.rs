//! Tactic domain and the fixed payoff table.

use crate::error::MatchError;
use crate::session::Side;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tactical formation a player commits to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Tactic {
    Defensive = 0,
    Balanced = 1,
    Aggressive = 2,
    AllOut = 3,
}

impl Tactic {
    pub const ALL: [Tactic; 4] = [
        Tactic::Defensive,
        Tactic::Balanced,
        Tactic::Aggressive,
        Tactic::AllOut,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for Tactic {
    type Error = MatchError;

    fn try_from(value: u8) -> Result<Self, MatchError> {
        Tactic::ALL
            .get(value as usize)
            .copied()
            .ok_or(MatchError::InvalidTactic(value as u32))
    }
}

impl fmt::Display for Tactic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tactic::Defensive => "defensive",
            Tactic::Balanced => "balanced",
            Tactic::Aggressive => "aggressive",
            Tactic::AllOut => "all-out",
        };
        f.write_str(name)
    }
}

impl FromStr for Tactic {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, MatchError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "defensive" => Ok(Tactic::Defensive),
            "1" | "balanced" => Ok(Tactic::Balanced),
            "2" | "aggressive" => Ok(Tactic::Aggressive),
            "3" | "all-out" | "allout" | "all_out" => Ok(Tactic::AllOut),
            other => Err(MatchError::malformed(format!("unknown tactic '{}'", other))),
        }
    }
}

/// `PAYOFF[a][b] = (score_a, score_b)`. Mirrored: `PAYOFF[b][a]` is the
/// same pair swapped.
const PAYOFF: [[(u32, u32); 4]; 4] = [
    // Defensive vs Defensive / Balanced / Aggressive / AllOut
    [(0, 0), (0, 1), (1, 1), (2, 2)],
    // Balanced
    [(1, 0), (1, 1), (2, 3), (2, 3)],
    // Aggressive
    [(1, 1), (3, 2), (2, 2), (3, 3)],
    // AllOut
    [(2, 2), (3, 2), (3, 3), (4, 4)],
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub score_a: u32,
    pub score_b: u32,
    pub winner: Side,
}

pub fn payoff(a: Tactic, b: Tactic) -> (u32, u32) {
    PAYOFF[a.index()][b.index()]
}

/// Scores both choices; equal scores go to player A.
pub fn resolve(a: Tactic, b: Tactic) -> Outcome {
    let (score_a, score_b) = payoff(a, b);
    let winner = if score_a >= score_b { Side::A } else { Side::B };

    Outcome {
        score_a,
        score_b,
        winner,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggressive_beats_balanced() {
        let outcome = resolve(Tactic::Aggressive, Tactic::Balanced);
        assert_eq!((outcome.score_a, outcome.score_b), (3, 2));
        assert_eq!(outcome.winner, Side::A);

        let outcome = resolve(Tactic::Balanced, Tactic::Aggressive);
        assert_eq!((outcome.score_a, outcome.score_b), (2, 3));
        assert_eq!(outcome.winner, Side::B);
    }

    #[test]
    fn test_diagonal_ties_go_to_player_a() {
        for tactic in Tactic::ALL {
            let outcome = resolve(tactic, tactic);
            assert_eq!(outcome.score_a, outcome.score_b);
            assert_eq!(outcome.winner, Side::A);
        }
        assert_eq!(payoff(Tactic::Defensive, Tactic::Defensive), (0, 0));
    }

    #[test]
    fn test_table_is_mirrored() {
        for a in Tactic::ALL {
            for b in Tactic::ALL {
                let (x, y) = payoff(a, b);
                assert_eq!(payoff(b, a), (y, x), "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_resolution_is_pure() {
        for a in Tactic::ALL {
            for b in Tactic::ALL {
                assert_eq!(resolve(a, b), resolve(a, b));
            }
        }
    }

    #[test]
    fn test_parse_tactic() {
        assert_eq!("aggressive".parse::<Tactic>().unwrap(), Tactic::Aggressive);
        assert_eq!("3".parse::<Tactic>().unwrap(), Tactic::AllOut);
        assert_eq!(Tactic::try_from(1u8).unwrap(), Tactic::Balanced);
        assert!(matches!(
            Tactic::try_from(4u8).unwrap_err(),
            MatchError::InvalidTactic(4)
        ));
        assert!("yolo".parse::<Tactic>().is_err());
    }
}
