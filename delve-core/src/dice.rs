//! Dice rolling.
//!
//! Supports the notation used by monster and weapon tables: `XdY+Z`, `dY`,
//! `XdY-Z` and bare integers. Every random number in the crate is drawn
//! through the [`Roller`] trait so that tests can script exact rolls.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::error;

/// Error type for dice parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("No dice specified")]
    NoDice,
}

/// Source of uniform die results.
pub trait Roller {
    /// Roll one die with the given number of sides, returning a value in `1..=sides`.
    fn die(&mut self, sides: u32) -> u32;

    /// Roll a d20.
    fn d20(&mut self) -> u32 {
        self.die(20)
    }

    /// Roll percentile dice (1..=100).
    fn d100(&mut self) -> u32 {
        self.die(100)
    }
}

impl<R: Rng + ?Sized> Roller for R {
    fn die(&mut self, sides: u32) -> u32 {
        self.gen_range(1..=sides.max(1))
    }
}

/// A parsed dice expression (e.g. `2d6+3`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub count: u32,
    /// Die size, or `None` for a flat number.
    pub sides: Option<u32>,
    pub modifier: i32,
    pub original: String,
}

impl DiceExpression {
    /// Parse a dice notation string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let original: String = notation
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        if original.is_empty() {
            return Err(DiceError::NoDice);
        }

        let Some(d_pos) = original.find('d') else {
            let value: i32 = original
                .parse()
                .map_err(|_| DiceError::InvalidNotation(original.clone()))?;
            return Ok(DiceExpression {
                count: 0,
                sides: None,
                modifier: value,
                original,
            });
        };

        let count_str = &original[..d_pos];
        let tail = &original[d_pos + 1..];

        let count: u32 = if count_str.is_empty() {
            1
        } else {
            count_str
                .parse()
                .map_err(|_| DiceError::InvalidNotation(original.clone()))?
        };

        let (sides_str, modifier) = match tail.find(['+', '-']) {
            Some(pos) => {
                let magnitude: i32 = tail[pos + 1..]
                    .parse()
                    .map_err(|_| DiceError::InvalidNotation(original.clone()))?;
                let sign = if tail.as_bytes()[pos] == b'-' { -1 } else { 1 };
                (&tail[..pos], sign * magnitude)
            }
            None => (tail, 0),
        };

        let sides: u32 = sides_str
            .parse()
            .map_err(|_| DiceError::InvalidNotation(original.clone()))?;
        if sides == 0 {
            return Err(DiceError::InvalidDieSize(sides));
        }

        Ok(DiceExpression {
            count: count.max(1),
            sides: Some(sides),
            modifier,
            original,
        })
    }

    /// Roll the expression.
    pub fn roll<R: Roller + ?Sized>(&self, roller: &mut R) -> RollResult {
        let rolls: Vec<u32> = match self.sides {
            Some(sides) => (0..self.count).map(|_| roller.die(sides)).collect(),
            None => Vec::new(),
        };
        let dice_total: i32 = rolls.iter().map(|&r| r as i32).sum();

        RollResult {
            rolls,
            modifier: self.modifier,
            total: dice_total + self.modifier,
        }
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Result of rolling an expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResult {
    pub rolls: Vec<u32>,
    pub modifier: i32,
    pub total: i32,
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dice = self
            .rolls
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        match self.modifier {
            0 => write!(f, "[{dice}] = {}", self.total),
            m if m > 0 => write!(f, "[{dice}] + {m} = {}", self.total),
            m => write!(f, "[{dice}] - {} = {}", m.abs(), self.total),
        }
    }
}

/// Roll a notation string from static game data.
///
/// A malformed expression is a bug in the tables, not a player error: it is
/// logged and a 1-point result is substituted so the action can finish.
pub fn roll_expression<R: Roller + ?Sized>(notation: &str, roller: &mut R) -> i32 {
    match DiceExpression::parse(notation) {
        Ok(expr) => expr.roll(roller).total,
        Err(e) => {
            error!(notation, error = %e, "malformed dice expression in game data");
            1
        }
    }
}

/// Outcome of a d20 check against a difficulty class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub roll: u32,
    pub success: bool,
    /// Natural 20 or natural 1.
    pub critical: bool,
}

impl Check {
    pub fn natural_20(&self) -> bool {
        self.roll == 20
    }

    pub fn natural_1(&self) -> bool {
        self.roll == 1
    }
}

/// Roll a d20 against `dc`. Natural 20 always succeeds, natural 1 always fails.
pub fn d20_check<R: Roller + ?Sized>(modifier: i32, dc: i32, roller: &mut R) -> Check {
    let roll = roller.d20();
    match roll {
        20 => Check {
            roll,
            success: true,
            critical: true,
        },
        1 => Check {
            roll,
            success: false,
            critical: true,
        },
        _ => Check {
            roll,
            success: roll as i32 + modifier >= dc,
            critical: false,
        },
    }
}

/// Ability-score modifier, rounding toward negative infinity.
pub fn modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDice;
    use proptest::prelude::*;

    #[test]
    fn test_parse_simple() {
        let expr = DiceExpression::parse("1d20").unwrap();
        assert_eq!(expr.count, 1);
        assert_eq!(expr.sides, Some(20));
        assert_eq!(expr.modifier, 0);
    }

    #[test]
    fn test_parse_with_modifier() {
        let expr = DiceExpression::parse("1d8+2").unwrap();
        assert_eq!(expr.modifier, 2);

        let expr = DiceExpression::parse("2d6-2").unwrap();
        assert_eq!(expr.count, 2);
        assert_eq!(expr.modifier, -2);
    }

    #[test]
    fn test_parse_implicit_count_and_flat() {
        let expr = DiceExpression::parse("d6").unwrap();
        assert_eq!(expr.count, 1);
        assert_eq!(expr.sides, Some(6));

        let expr = DiceExpression::parse(" 7 ").unwrap();
        assert_eq!(expr.sides, None);
        assert_eq!(expr.modifier, 7);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(DiceExpression::parse(""), Err(DiceError::NoDice));
        assert!(matches!(
            DiceExpression::parse("2dx"),
            Err(DiceError::InvalidNotation(_))
        ));
        assert_eq!(
            DiceExpression::parse("1d0"),
            Err(DiceError::InvalidDieSize(0))
        );
    }

    #[test]
    fn test_scripted_roll() {
        let mut dice = ScriptedDice::new([3, 5]);
        let result = DiceExpression::parse("2d6+1").unwrap().roll(&mut dice);
        assert_eq!(result.rolls, vec![3, 5]);
        assert_eq!(result.total, 9);
        assert_eq!(result.to_string(), "[3, 5] + 1 = 9");
    }

    #[test]
    fn test_malformed_expression_substitutes_one() {
        let mut rng = rand::thread_rng();
        assert_eq!(roll_expression("not dice", &mut rng), 1);
    }

    #[test]
    fn test_natural_rolls_override_modifiers() {
        let mut dice = ScriptedDice::new([20, 1]);
        let nat20 = d20_check(-10, 40, &mut dice);
        assert!(nat20.success && nat20.critical);

        let nat1 = d20_check(50, 2, &mut dice);
        assert!(!nat1.success && nat1.critical);
    }

    #[test]
    fn test_check_uses_total() {
        let mut dice = ScriptedDice::new([12, 12]);
        assert!(d20_check(3, 15, &mut dice).success);
        assert!(!d20_check(2, 15, &mut dice).success);
    }

    #[test]
    fn test_modifier_floors() {
        assert_eq!(modifier(10), 0);
        assert_eq!(modifier(15), 2);
        assert_eq!(modifier(5), -3);
        assert_eq!(modifier(3), -4);
    }

    proptest! {
        #[test]
        fn roll_stays_in_range(
            count in 1u32..6,
            sides in 1u32..20,
            m in -5i32..5,
            seed in any::<u64>(),
        ) {
            use rand::SeedableRng;
            let notation = if m < 0 {
                format!("{count}d{sides}{m}")
            } else {
                format!("{count}d{sides}+{m}")
            };
            let expr = DiceExpression::parse(&notation).unwrap();
            let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
            let total = expr.roll(&mut rng).total;
            prop_assert!(total >= count as i32 + m);
            prop_assert!(total <= (count * sides) as i32 + m);
        }
    }
}
