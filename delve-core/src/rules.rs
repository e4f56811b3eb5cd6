//! Action/Effect rules pipeline.
//!
//! 1. The player sends an [`Action`]
//! 2. [`RulesEngine::resolve`] checks it against the current [`CombatPhase`]
//! 3. The matching transition mutates the player and records [`Effect`]s
//! 4. The session persists the player, then renders the effects
//!
//! Everything in here is synchronous and takes its randomness from a
//! [`Roller`], so every transition can be replayed with scripted dice.

use crate::abilities::{self, ChargeStatus};
use crate::combat::{self, CombatOutcome, CombatPhase};
use crate::config::DungeonConfig;
use crate::dice::Roller;
use crate::dungeon;
use crate::monsters;
use crate::player::Player;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

/// A refused action. Nothing is written when one of these is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// The action does not fit the current state (e.g. `attack` outside combat).
    #[error("{0}")]
    InvalidState(String),

    /// The action fits, but a required resource is missing.
    #[error("{0}")]
    ResourceUnavailable(String),
}

impl ActionError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ActionError::InvalidState(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        ActionError::ResourceUnavailable(message.into())
    }
}

/// Input that did not parse as an action.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseActionError {
    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),

    #[error("Not an ability number: {0}")]
    BadIndex(String),
}

/// Everything a player can do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Travel to a dungeon of the given theme.
    Enter { theme: String },
    Search,
    Advance,
    Camp,
    Escape,
    EscapeConfirm,
    EscapeCancel,
    Attack,
    Defend,
    Flee,
    /// Cast an ability by its zero-based position in the available list.
    CastAbility(usize),
}

impl FromStr for Action {
    type Err = ParseActionError;

    /// Parse a command token. `cast N` is one-based, as shown to players.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        let (head, rest) = match input.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (input, ""),
        };

        match head.to_lowercase().as_str() {
            "enter" => {
                if rest.is_empty() {
                    return Err(ParseActionError::MissingArgument("enter"));
                }
                Ok(Action::Enter {
                    theme: rest.to_string(),
                })
            }
            "search" => Ok(Action::Search),
            "advance" => Ok(Action::Advance),
            "camp" => Ok(Action::Camp),
            "escape" => Ok(Action::Escape),
            "escape_confirm" => Ok(Action::EscapeConfirm),
            "escape_cancel" => Ok(Action::EscapeCancel),
            "attack" => Ok(Action::Attack),
            "defend" => Ok(Action::Defend),
            "flee" => Ok(Action::Flee),
            "cast" => {
                if rest.is_empty() {
                    return Err(ParseActionError::MissingArgument("cast"));
                }
                match rest.parse::<usize>() {
                    Ok(n) if n >= 1 => Ok(Action::CastAbility(n - 1)),
                    _ => Err(ParseActionError::BadIndex(rest.to_string())),
                }
            }
            _ => Err(ParseActionError::Unknown(input.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Enter { theme } => write!(f, "enter {theme}"),
            Action::Search => write!(f, "search"),
            Action::Advance => write!(f, "advance"),
            Action::Camp => write!(f, "camp"),
            Action::Escape => write!(f, "escape"),
            Action::EscapeConfirm => write!(f, "escape_confirm"),
            Action::EscapeCancel => write!(f, "escape_cancel"),
            Action::Attack => write!(f, "attack"),
            Action::Defend => write!(f, "defend"),
            Action::Flee => write!(f, "flee"),
            Action::CastAbility(index) => write!(f, "cast {}", index + 1),
        }
    }
}

/// A record of something that happened while resolving an action.
///
/// Effects carry the numbers the presentation layer shows; state has already
/// been changed by the time they are produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    DungeonEntered {
        theme: String,
    },
    ChargesRestored {
        charges: Vec<ChargeStatus>,
    },
    RoadHealed {
        amount: i32,
        hp: i32,
        max_hp: i32,
    },
    RoadRobbed {
        gold: u32,
        total_gold: u32,
    },
    RoadFound {
        gold: u32,
        total_gold: u32,
    },
    FloorDescended {
        floor: u32,
    },
    RoomEntered {
        floor: u32,
        room: u32,
        found_exit: bool,
    },
    TrapSprung {
        roll: u32,
        dc: i32,
        success: bool,
        critical: bool,
        damage: i32,
        hp: i32,
        max_hp: i32,
    },
    /// `item` is the display name and whether it fit in the inventory.
    TreasureFound {
        gold: u32,
        total_gold: u32,
        item: Option<(String, bool)>,
    },
    RoomEmpty,
    EnemyAppeared {
        enemy: String,
        hp: i32,
        armor_class: i32,
        enemy_first: bool,
    },
    PlayerAttacked {
        roll: u32,
        total: i32,
        target_ac: i32,
        hit: bool,
        critical: bool,
        damage: i32,
        enemy_hp: i32,
    },
    PlayerDefended {
        armor_class: i32,
    },
    AbilityCast {
        ability: String,
        charges_left: u8,
        roll: u32,
        total: i32,
        target_ac: i32,
        hit: bool,
        critical: bool,
        damage: i32,
        enemy_hp: i32,
    },
    FleeAttempted {
        roll: u32,
        total: i32,
        dc: i32,
        success: bool,
        damage: i32,
        hp: i32,
    },
    EnemyAttacked {
        enemy: String,
        roll: u32,
        total: i32,
        target_ac: i32,
        hit: bool,
        damage: i32,
        hp: i32,
        max_hp: i32,
    },
    Victory {
        enemy: String,
        experience: u32,
        gold: u32,
    },
    Defeat {
        gold_lost: u32,
        experience_lost: u32,
        items_lost: u32,
    },
    SearchedNothing,
    SearchFoundGold {
        gold: u32,
        total_gold: u32,
    },
    SearchFoundItem {
        item: String,
        stored: bool,
    },
    Camped {
        healed: i32,
        hp: i32,
        max_hp: i32,
        charges: Vec<ChargeStatus>,
    },
    Rested {
        healed: i32,
        hp: i32,
        max_hp: i32,
    },
    EscapePrompted,
    EscapeCancelled,
    LeftDungeon {
        floor: u32,
        room: u32,
    },
}

impl Effect {
    /// Plain-text log line for this effect.
    pub fn describe(&self) -> String {
        match self {
            Effect::DungeonEntered { theme } => format!("🏰 You set out for the {theme}."),
            Effect::ChargesRestored { charges } => {
                if charges.is_empty() {
                    "Your abilities are ready.".to_string()
                } else {
                    format!("Abilities ready: {}", join(charges))
                }
            }
            Effect::RoadHealed { amount, hp, max_hp } => {
                format!("🌿 A quiet stretch of road. You recover {amount} HP ({hp}/{max_hp}).")
            }
            Effect::RoadRobbed { gold, total_gold } => {
                format!("🗡️ Bandits on the road! You lose {gold} gold ({total_gold} left).")
            }
            Effect::RoadFound { gold, total_gold } => {
                format!("💰 You find a dropped purse with {gold} gold ({total_gold} total).")
            }
            Effect::FloorDescended { floor } => {
                format!("⬇️ Stairs lead down to floor {floor}.")
            }
            Effect::RoomEntered {
                floor,
                room,
                found_exit,
            } => {
                let exit = if *found_exit {
                    " You notice a way out."
                } else {
                    ""
                };
                format!("🚪 Floor {floor}, room {room}.{exit}")
            }
            Effect::TrapSprung {
                roll,
                dc,
                success,
                damage,
                hp,
                max_hp,
                ..
            } => {
                if *success {
                    format!("🪤 A trap! Dexterity d20={roll} vs DC {dc}: you dodge it.")
                } else {
                    format!(
                        "🪤 A trap! Dexterity d20={roll} vs DC {dc}: you take {damage} damage ({hp}/{max_hp})."
                    )
                }
            }
            Effect::TreasureFound {
                gold,
                total_gold,
                item,
            } => {
                let mut line = format!("💰 Treasure! +{gold} gold ({total_gold} total).");
                match item {
                    Some((name, true)) => line.push_str(&format!(" You also find {name}.")),
                    Some((name, false)) => {
                        line.push_str(&format!(" You find {name}, but your pack is full."))
                    }
                    None => {}
                }
                line
            }
            Effect::RoomEmpty => "The room is empty.".to_string(),
            Effect::EnemyAppeared {
                enemy,
                hp,
                armor_class,
                enemy_first,
            } => {
                let first = if *enemy_first {
                    "It strikes first!"
                } else {
                    "You act first."
                };
                format!("⚔️ {enemy} appears! HP {hp}, AC {armor_class}. {first}")
            }
            Effect::PlayerAttacked {
                roll,
                total,
                target_ac,
                hit,
                critical,
                damage,
                enemy_hp,
            } => attack_line(
                "🗡️ Attack",
                *roll,
                *total,
                *target_ac,
                *hit,
                *critical,
                *damage,
                *enemy_hp,
            ),
            Effect::PlayerDefended { armor_class } => {
                format!(
                    "🛡️ You raise your guard (AC {armor_class} until the enemy's next attack)."
                )
            }
            Effect::AbilityCast {
                ability,
                charges_left,
                roll,
                total,
                target_ac,
                hit,
                critical,
                damage,
                enemy_hp,
            } => {
                let head = format!(
                    "{} ({charges_left} left)",
                    abilities::ability_label(ability)
                );
                attack_line(&head, *roll, *total, *target_ac, *hit, *critical, *damage, *enemy_hp)
            }
            Effect::FleeAttempted {
                roll,
                total,
                dc,
                success,
                damage,
                hp,
            } => {
                if *success {
                    format!("🏃 Flee: d20={roll} → {total} vs DC {dc}. You get away!")
                } else {
                    format!(
                        "🏃 Flee: d20={roll} → {total} vs DC {dc}. You stumble and take {damage} damage (HP {hp})."
                    )
                }
            }
            Effect::EnemyAttacked {
                enemy,
                roll,
                total,
                target_ac,
                hit,
                damage,
                hp,
                max_hp,
            } => {
                if *hit {
                    format!(
                        "{enemy} attacks: d20={roll} → {total} vs AC {target_ac}. Hit for {damage} ({hp}/{max_hp})."
                    )
                } else {
                    format!("{enemy} attacks: d20={roll} → {total} vs AC {target_ac}. Miss.")
                }
            }
            Effect::Victory {
                enemy,
                experience,
                gold,
            } => format!("🏆 {enemy} is defeated! +{experience} XP, +{gold} gold."),
            Effect::Defeat {
                gold_lost,
                experience_lost,
                items_lost,
            } => format!(
                "☠️ You fall. Carried back to town, you lose {gold_lost} gold, {experience_lost} XP and {items_lost} items."
            ),
            Effect::SearchedNothing => "🔎 You search the room but find nothing.".to_string(),
            Effect::SearchFoundGold { gold, total_gold } => {
                format!("🔎 You find {gold} gold ({total_gold} total).")
            }
            Effect::SearchFoundItem { item, stored } => {
                if *stored {
                    format!("🔎 You find {item}.")
                } else {
                    format!("🔎 You find {item}, but your pack is full.")
                }
            }
            Effect::Camped {
                healed,
                hp,
                max_hp,
                charges,
            } => {
                let mut line =
                    format!("🔥 You make camp and recover {healed} HP ({hp}/{max_hp}).");
                if !charges.is_empty() {
                    line.push_str(&format!(" Charges: {}", join(charges)));
                }
                line
            }
            Effect::Rested { healed, hp, max_hp } => {
                format!("🛏️ You rest at the inn, recovering {healed} HP ({hp}/{max_hp}).")
            }
            Effect::EscapePrompted => {
                "🚪 Leave the dungeon? (escape_confirm / escape_cancel)".to_string()
            }
            Effect::EscapeCancelled => "You decide to keep exploring.".to_string(),
            Effect::LeftDungeon { floor, room } => {
                format!(
                    "🏙️ You leave the dungeon from floor {floor}, room {room} and return to town."
                )
            }
        }
    }
}

fn join(charges: &[ChargeStatus]) -> String {
    charges
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[allow(clippy::too_many_arguments)]
fn attack_line(
    head: &str,
    roll: u32,
    total: i32,
    target_ac: i32,
    hit: bool,
    critical: bool,
    damage: i32,
    enemy_hp: i32,
) -> String {
    let mut line = format!("{head}: d20={roll} → {total} vs AC {target_ac}. ");
    match (hit, critical) {
        (true, true) => line.push_str(&format!("CRITICAL HIT! {damage} damage.")),
        (true, false) => line.push_str(&format!("Hit for {damage}.")),
        (false, true) => line.push_str("Critical miss."),
        (false, false) => line.push_str("Miss."),
    }
    if hit {
        line.push_str(&format!(" Enemy HP: {enemy_hp}."));
    }
    line
}

/// The result of resolving an action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub effects: Vec<Effect>,
    /// Set when a fight ended during this action.
    pub outcome: Option<CombatOutcome>,
}

impl Resolution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_outcome(mut self, outcome: CombatOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn push(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    /// Append another resolution's effects. Its outcome, if any, wins.
    pub fn absorb(&mut self, other: Resolution) {
        self.effects.extend(other.effects);
        if other.outcome.is_some() {
            self.outcome = other.outcome;
        }
    }

    /// Whether the player walked out through an exit.
    pub fn left_dungeon(&self) -> bool {
        self.effects
            .iter()
            .any(|e| matches!(e, Effect::LeftDungeon { .. }))
    }

    pub fn describe(&self) -> Vec<String> {
        self.effects.iter().map(Effect::describe).collect()
    }
}

/// Resolves actions against a player using the configured rules.
#[derive(Debug, Clone, Default)]
pub struct RulesEngine {
    config: DungeonConfig,
}

impl RulesEngine {
    pub fn new(config: DungeonConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DungeonConfig {
        &self.config
    }

    /// Run one action. On error the player may be partially modified and
    /// must be discarded by the caller.
    pub fn resolve<R: Roller + ?Sized>(
        &self,
        player: &mut Player,
        action: &Action,
        roller: &mut R,
    ) -> Result<Resolution, ActionError> {
        let config = &self.config;
        let phase = player.dungeon.phase();
        debug!(player = %player.id, ?phase, %action, "resolving action");

        if !matches!(action, Action::EscapeConfirm | Action::EscapeCancel) {
            player.dungeon.escape_pending = false;
        }

        let result = match (phase, action) {
            (_, Action::Enter { .. }) if player.dungeon.active => Err(ActionError::invalid(
                "You are already inside a dungeon.",
            )),
            (CombatPhase::Idle, Action::Enter { theme }) => {
                Ok(dungeon::enter_dungeon(config, player, theme, roller))
            }
            (_, _) if !player.dungeon.active => Err(ActionError::invalid(
                "You are not in a dungeon. Use `enter <theme>` first.",
            )),
            (CombatPhase::Idle, Action::Search) => Ok(dungeon::search(config, player, roller)),
            (CombatPhase::Idle, Action::Advance) => {
                Ok(dungeon::enter_next_room(config, player, roller))
            }
            (CombatPhase::Idle, Action::Camp) => dungeon::camp(config, player),
            (CombatPhase::Idle, Action::Escape) => dungeon::escape(player),
            (CombatPhase::Idle, Action::EscapeConfirm) => dungeon::escape_confirm(player),
            (CombatPhase::Idle, Action::EscapeCancel) => dungeon::escape_cancel(player),
            (CombatPhase::Idle, _) => Err(ActionError::invalid("There is nothing to fight here.")),
            (CombatPhase::PlayerTurn, Action::Attack) => combat::attack(config, player, roller),
            (CombatPhase::PlayerTurn, Action::Defend) => combat::defend(config, player, roller),
            (CombatPhase::PlayerTurn, Action::Flee) => combat::flee(config, player, roller),
            (CombatPhase::PlayerTurn, Action::CastAbility(index)) => {
                combat::cast_ability(config, player, *index, roller)
            }
            (CombatPhase::PlayerTurn, _) => {
                Err(ActionError::invalid("You're in the middle of a fight!"))
            }
            (CombatPhase::EnemyTurn, _) => Err(ActionError::invalid("Wait for the enemy to act.")),
            (CombatPhase::Resolved(_), _) => Err(ActionError::invalid("That fight is over.")),
        };

        if let Err(e) = &result {
            warn!(player = %player.id, %action, error = %e, "action refused");
        }
        result
    }

    /// Actions that would be accepted right now.
    pub fn available_actions(&self, player: &Player) -> Vec<Action> {
        let state = &player.dungeon;
        if !state.active {
            return monsters::theme_names()
                .into_iter()
                .map(|theme| Action::Enter {
                    theme: theme.to_string(),
                })
                .collect();
        }

        match state.phase() {
            CombatPhase::PlayerTurn => {
                let mut actions = vec![Action::Attack, Action::Defend, Action::Flee];
                actions.extend(
                    (0..abilities::available(player).len()).map(Action::CastAbility),
                );
                actions
            }
            CombatPhase::Idle if state.escape_pending => {
                vec![Action::EscapeConfirm, Action::EscapeCancel]
            }
            CombatPhase::Idle => {
                let mut actions = vec![Action::Search, Action::Advance];
                if !state.camped_in_room
                    && player.inventory.count(&self.config.camp_supply) > 0
                {
                    actions.push(Action::Camp);
                }
                if state.found_exit {
                    actions.push(Action::Escape);
                }
                actions
            }
            CombatPhase::EnemyTurn | CombatPhase::Resolved(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDice;

    #[test]
    fn test_parse_tokens() {
        assert_eq!("search".parse::<Action>().unwrap(), Action::Search);
        assert_eq!(" ATTACK ".parse::<Action>().unwrap(), Action::Attack);
        assert_eq!("cast 2".parse::<Action>().unwrap(), Action::CastAbility(1));
        assert_eq!(
            "enter Caverns of Silence".parse::<Action>().unwrap(),
            Action::Enter {
                theme: "Caverns of Silence".to_string()
            }
        );
        assert_eq!(
            "cast 0".parse::<Action>(),
            Err(ParseActionError::BadIndex("0".to_string()))
        );
        assert_eq!(
            "enter".parse::<Action>(),
            Err(ParseActionError::MissingArgument("enter"))
        );
        assert!(matches!(
            "dance".parse::<Action>(),
            Err(ParseActionError::Unknown(_))
        ));
    }

    #[test]
    fn test_display_round_trips_tokens() {
        for action in [Action::EscapeConfirm, Action::CastAbility(0), Action::Flee] {
            assert_eq!(action.to_string().parse::<Action>().unwrap(), action);
        }
    }

    #[test]
    fn test_actions_outside_dungeon_are_invalid() {
        let engine = RulesEngine::default();
        let mut player = Player::new("Ash", "thief");
        let mut dice = ScriptedDice::default();
        for action in [Action::Search, Action::Attack, Action::Camp] {
            assert!(matches!(
                engine.resolve(&mut player, &action, &mut dice),
                Err(ActionError::InvalidState(_))
            ));
        }
        assert_eq!(engine.available_actions(&player).len(), 3);
    }

    #[test]
    fn test_combat_actions_refused_when_idle() {
        let engine = RulesEngine::default();
        let mut player = Player::new("Ash", "thief");
        player.dungeon = crate::dungeon::DungeonState::new("Castle of Shadows");
        player.dungeon.room = 1;
        let mut dice = ScriptedDice::default();
        assert_eq!(
            engine.resolve(&mut player, &Action::Defend, &mut dice),
            Err(ActionError::invalid("There is nothing to fight here."))
        );
        assert_eq!(
            engine.available_actions(&player),
            vec![Action::Search, Action::Advance]
        );
    }

    #[test]
    fn test_resolution_absorb_keeps_outcome() {
        let mut res = Resolution::new().with_effect(Effect::RoomEmpty);
        res.absorb(Resolution::new().with_outcome(CombatOutcome::Fled));
        res.absorb(Resolution::new());
        assert_eq!(res.outcome, Some(CombatOutcome::Fled));
        assert_eq!(res.describe(), vec!["The room is empty.".to_string()]);
    }
}
