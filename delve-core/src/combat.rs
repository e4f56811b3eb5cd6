//! Turn-based fight loop.
//!
//! A fight is one player against one [`Enemy`]. Each player action either
//! ends the fight or hands the turn to the enemy, whose turn runs inside the
//! same call, so a saved state is always the player's turn or no fight.

use crate::abilities;
use crate::config::DungeonConfig;
use crate::dice::{self, roll_expression, Check, Roller};
use crate::dungeon::{DungeonState, Turn};
use crate::monsters::Enemy;
use crate::player::{Attribute, Player};
use crate::rewards;
use crate::rules::{ActionError, Effect, Resolution};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How a fight ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatOutcome {
    Victory,
    Defeat,
    Fled,
}

/// Where the fight loop stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatPhase {
    Idle,
    PlayerTurn,
    EnemyTurn,
    Resolved(CombatOutcome),
}

fn current_enemy(state: &mut DungeonState) -> Result<&mut Enemy, ActionError> {
    state
        .enemy
        .as_mut()
        .ok_or_else(|| ActionError::invalid("There is nothing to fight here."))
}

/// Damage for a successful hit, with the critical die on a natural 20.
fn roll_damage<R: Roller + ?Sized>(
    config: &DungeonConfig,
    expression: &str,
    bonus: i32,
    critical: bool,
    roller: &mut R,
) -> i32 {
    let mut damage = roll_expression(expression, roller) + bonus;
    if critical {
        damage += roll_expression(&config.critical_bonus, roller);
    }
    damage.max(0)
}

/// The enemy's attack roll. A natural 20 always lands; any other roll,
/// natural 1 included, lands when `roll + to_hit` reaches the target.
fn enemy_check<R: Roller + ?Sized>(to_hit: i32, target_ac: i32, roller: &mut R) -> Check {
    let roll = roller.d20();
    Check {
        roll,
        success: roll == 20 || roll as i32 + to_hit >= target_ac,
        critical: roll == 20 || roll == 1,
    }
}

/// Begin a fight. The side that acts first is a coin flip; if the enemy
/// wins it, its attack is resolved here.
pub fn start_combat<R: Roller + ?Sized>(
    config: &DungeonConfig,
    player: &mut Player,
    enemy: Enemy,
    roller: &mut R,
) -> Resolution {
    let enemy_first = roller.die(2) == 2;
    debug!(enemy = %enemy.name, enemy_first, "combat started");

    let mut resolution = Resolution::new().with_effect(Effect::EnemyAppeared {
        enemy: enemy.label(),
        hp: enemy.hp,
        armor_class: enemy.armor_class,
        enemy_first,
    });
    let turn = if enemy_first { Turn::Enemy } else { Turn::Player };
    player.dungeon.begin_combat(enemy, turn);

    if enemy_first {
        resolution.absorb(enemy_turn(config, player, roller));
    }
    resolution
}

/// After the player hits or misses: victory if the enemy dropped, otherwise
/// the enemy acts.
fn finish_player_turn<R: Roller + ?Sized>(
    config: &DungeonConfig,
    player: &mut Player,
    mut resolution: Resolution,
    roller: &mut R,
) -> Resolution {
    let defeated = player.dungeon.enemy.as_ref().filter(|e| e.is_defeated()).cloned();
    match defeated {
        Some(enemy) => resolution.absorb(rewards::apply_victory(config, player, &enemy, roller)),
        None => {
            player.dungeon.turn = Turn::Enemy;
            resolution.absorb(enemy_turn(config, player, roller));
        }
    }
    resolution
}

/// Weapon attack against the current enemy.
pub fn attack<R: Roller + ?Sized>(
    config: &DungeonConfig,
    player: &mut Player,
    roller: &mut R,
) -> Result<Resolution, ActionError> {
    let to_hit = player.weapon_bonus();
    let damage_roll = player.weapon_damage();
    let enemy = current_enemy(&mut player.dungeon)?;

    let check = dice::d20_check(to_hit, enemy.armor_class, roller);
    let critical = check.natural_20();
    let damage = if check.success {
        roll_damage(config, &damage_roll, 0, critical, roller)
    } else {
        0
    };
    let dealt = enemy.take_damage(damage);
    debug!(roll = check.roll, hit = check.success, dealt, "player attack");

    let resolution = Resolution::new().with_effect(Effect::PlayerAttacked {
        roll: check.roll,
        total: check.roll as i32 + to_hit,
        target_ac: enemy.armor_class,
        hit: check.success,
        critical: check.critical,
        damage: dealt,
        enemy_hp: enemy.hp,
    });
    Ok(finish_player_turn(config, player, resolution, roller))
}

/// Raise the guard for the enemy's next attack.
pub fn defend<R: Roller + ?Sized>(
    config: &DungeonConfig,
    player: &mut Player,
    roller: &mut R,
) -> Result<Resolution, ActionError> {
    current_enemy(&mut player.dungeon)?;
    player.dungeon.player_defending = true;
    player.dungeon.turn = Turn::Enemy;

    let mut resolution = Resolution::new().with_effect(Effect::PlayerDefended {
        armor_class: player.armor_class() + config.defend_bonus,
    });
    resolution.absorb(enemy_turn(config, player, roller));
    Ok(resolution)
}

/// Dexterity check to get away. A failed attempt hurts and gives the enemy
/// a free turn.
pub fn flee<R: Roller + ?Sized>(
    config: &DungeonConfig,
    player: &mut Player,
    roller: &mut R,
) -> Result<Resolution, ActionError> {
    current_enemy(&mut player.dungeon)?;
    let modifier = player.attributes.modifier(Attribute::Dexterity);
    let check = dice::d20_check(modifier, config.flee_dc, roller);
    let total = check.roll as i32 + modifier;

    if check.success {
        player.dungeon.end_combat();
        return Ok(Resolution::new()
            .with_effect(Effect::FleeAttempted {
                roll: check.roll,
                total,
                dc: config.flee_dc,
                success: true,
                damage: 0,
                hp: player.hit_points.current,
            })
            .with_outcome(CombatOutcome::Fled));
    }

    let rolled = roll_expression(&config.flee_damage, roller).max(0);
    let damage = player.hit_points.take_damage(rolled);
    let mut resolution = Resolution::new().with_effect(Effect::FleeAttempted {
        roll: check.roll,
        total,
        dc: config.flee_dc,
        success: false,
        damage,
        hp: player.hit_points.current,
    });

    if player.hit_points.is_down() {
        resolution.absorb(rewards::apply_defeat(config, player));
    } else {
        player.dungeon.turn = Turn::Enemy;
        resolution.absorb(enemy_turn(config, player, roller));
    }
    Ok(resolution)
}

/// Cast the ability at `index` in [`abilities::available`]. The charge is
/// spent whether or not the spell lands.
pub fn cast_ability<R: Roller + ?Sized>(
    config: &DungeonConfig,
    player: &mut Player,
    index: usize,
    roller: &mut R,
) -> Result<Resolution, ActionError> {
    current_enemy(&mut player.dungeon)?;
    let available = abilities::available(player);
    if available.is_empty() {
        return Err(ActionError::unavailable("You have no ability charges left."));
    }
    let name = available
        .get(index)
        .cloned()
        .ok_or_else(|| ActionError::invalid(format!("There is no ability number {}.", index + 1)))?;

    let charges_left = abilities::consume(player, &name)?;
    let info = abilities::ability_info(&name);
    let bonus = player.attributes.modifier(Attribute::Intellect).max(0);
    let enemy = current_enemy(&mut player.dungeon)?;

    let check = dice::d20_check(bonus, enemy.armor_class, roller);
    let critical = check.natural_20();
    let damage = if check.success {
        roll_damage(config, info.damage, bonus, critical, roller)
    } else {
        0
    };
    let dealt = enemy.take_damage(damage);

    let resolution = Resolution::new().with_effect(Effect::AbilityCast {
        ability: name,
        charges_left,
        roll: check.roll,
        total: check.roll as i32 + bonus,
        target_ac: enemy.armor_class,
        hit: check.success,
        critical: check.critical,
        damage: dealt,
        enemy_hp: enemy.hp,
    });
    Ok(finish_player_turn(config, player, resolution, roller))
}

/// The enemy's attack. Clears the defend bonus and returns the turn to the
/// player, or runs the death handler if the player drops.
pub fn enemy_turn<R: Roller + ?Sized>(
    config: &DungeonConfig,
    player: &mut Player,
    roller: &mut R,
) -> Resolution {
    let Some(enemy) = player.dungeon.enemy.clone() else {
        return Resolution::new();
    };
    let target_ac = player.armor_class()
        + if player.dungeon.player_defending {
            config.defend_bonus
        } else {
            0
        };

    let check = enemy_check(enemy.to_hit, target_ac, roller);
    let damage = if check.success {
        let rolled = roll_expression(&enemy.attack, roller).max(0);
        player.hit_points.take_damage(rolled)
    } else {
        0
    };
    debug!(enemy = %enemy.name, roll = check.roll, hit = check.success, damage, "enemy attack");

    player.dungeon.player_defending = false;
    player.dungeon.turn = Turn::Player;

    let mut resolution = Resolution::new().with_effect(Effect::EnemyAttacked {
        enemy: enemy.label(),
        roll: check.roll,
        total: check.roll as i32 + enemy.to_hit,
        target_ac,
        hit: check.success,
        damage,
        hp: player.hit_points.current,
        max_hp: player.hit_points.maximum,
    });

    if player.hit_points.is_down() {
        resolution.absorb(rewards::apply_defeat(config, player));
    }
    resolution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monsters;
    use crate::player::Attributes;
    use crate::testing::ScriptedDice;

    fn skeleton() -> Enemy {
        Enemy::from_template(&monsters::theme("Castle of Shadows").monsters[0], 1)
    }

    fn fighter_in_combat() -> Player {
        let mut player = Player::new("Vera", "swordsman")
            .with_attributes(Attributes::new(14, 12, 10, 9))
            .with_weapon("Sabre");
        player.dungeon = DungeonState::new("Castle of Shadows");
        player.dungeon.room = 1;
        player.dungeon.begin_combat(skeleton(), Turn::Player);
        player
    }

    #[test]
    fn test_player_first_waits_for_input() {
        let config = DungeonConfig::default();
        let mut player = fighter_in_combat();
        player.dungeon.end_combat();
        let mut dice = ScriptedDice::new([1]);
        let res = start_combat(&config, &mut player, skeleton(), &mut dice);
        assert_eq!(player.dungeon.phase(), CombatPhase::PlayerTurn);
        assert_eq!(res.effects.len(), 1);
    }

    #[test]
    fn test_enemy_first_attacks_immediately() {
        let config = DungeonConfig::default();
        let mut player = fighter_in_combat();
        player.dungeon.end_combat();
        // Enemy first, d20 = 15 hits AC 13, 1d6+1 with a 3.
        let mut dice = ScriptedDice::new([2, 15, 3]);
        let res = start_combat(&config, &mut player, skeleton(), &mut dice);
        assert_eq!(player.dungeon.phase(), CombatPhase::PlayerTurn);
        assert_eq!(player.hit_points.current, 6);
        assert!(matches!(res.effects[1], Effect::EnemyAttacked { hit: true, damage: 4, .. }));
    }

    #[test]
    fn test_attack_rolls_weapon_damage_with_bonus() {
        let config = DungeonConfig::default();
        let mut player = fighter_in_combat();
        assert_eq!(player.weapon_damage(), "1d8+2");
        // 15 + 2 hits AC 11, 1d8 = 3 plus 2, then the enemy misses.
        let mut dice = ScriptedDice::new([15, 3, 1]);
        let res = attack(&config, &mut player, &mut dice).unwrap();
        assert!(matches!(
            res.effects[0],
            Effect::PlayerAttacked { hit: true, critical: false, damage: 5, enemy_hp: 5, .. }
        ));
    }

    #[test]
    fn test_natural_one_misses() {
        let config = DungeonConfig::default();
        let mut player = fighter_in_combat();
        // Natural 1, then the enemy misses with a natural 1.
        let mut dice = ScriptedDice::new([1, 1]);
        let res = attack(&config, &mut player, &mut dice).unwrap();
        assert!(matches!(
            res.effects[0],
            Effect::PlayerAttacked { hit: false, critical: true, damage: 0, .. }
        ));
        assert_eq!(player.dungeon.enemy.as_ref().unwrap().hp, 10);
    }

    #[test]
    fn test_defend_bonus_lasts_one_turn() {
        let config = DungeonConfig::default();
        let mut player = fighter_in_combat();
        // AC 13 + 2 = 15. Skeleton rolls 11 + 3 = 14: a miss only because of the guard.
        let mut dice = ScriptedDice::new([11]);
        let res = defend(&config, &mut player, &mut dice).unwrap();
        assert!(matches!(
            res.effects[1],
            Effect::EnemyAttacked { hit: false, target_ac: 15, .. }
        ));
        assert!(!player.dungeon.player_defending);
        assert_eq!(player.dungeon.turn, Turn::Player);
    }

    #[test]
    fn test_cast_spends_charge_even_on_miss() {
        let config = DungeonConfig::default();
        let mut player = fighter_in_combat().with_ability("Power Strike", 1);
        abilities::reset_for_dungeon(&mut player);
        // Cast misses (2 + 0 < 11), enemy misses with a 1.
        let mut dice = ScriptedDice::new([2, 1]);
        cast_ability(&config, &mut player, 0, &mut dice).unwrap();
        assert_eq!(player.ability_charges["Power Strike"], 2);
    }

    #[test]
    fn test_cast_natural_twenty_adds_critical_die() {
        let config = DungeonConfig::default();
        let mut player = fighter_in_combat().with_ability("Power Strike", 1);
        abilities::reset_for_dungeon(&mut player);
        // Natural 20, 1d10 = 5, critical 1d6 = 4, then the enemy misses.
        let mut dice = ScriptedDice::new([20, 5, 4, 1]);
        let res = cast_ability(&config, &mut player, 0, &mut dice).unwrap();
        assert!(matches!(
            res.effects[0],
            Effect::AbilityCast { hit: true, critical: true, damage: 9, enemy_hp: 1, .. }
        ));
        assert_eq!(dice.remaining(), 0);
    }

    #[test]
    fn test_cast_natural_one_misses_low_armor() {
        let config = DungeonConfig::default();
        let mut player = fighter_in_combat().with_ability("Power Strike", 1);
        abilities::reset_for_dungeon(&mut player);
        player.dungeon.enemy.as_mut().unwrap().armor_class = 2;
        let mut dice = ScriptedDice::new([1, 1]);
        let res = cast_ability(&config, &mut player, 0, &mut dice).unwrap();
        assert!(matches!(
            res.effects[0],
            Effect::AbilityCast { hit: false, damage: 0, enemy_hp: 10, charges_left: 2, .. }
        ));
    }

    #[test]
    fn test_enemy_natural_one_can_still_hit() {
        let config = DungeonConfig::default();
        let mut player = fighter_in_combat();
        player.dungeon.enemy.as_mut().unwrap().to_hit = 15;
        player.dungeon.turn = Turn::Enemy;
        // 1 + 15 = 16 against AC 13, then 1d6+1 with a 3.
        let mut dice = ScriptedDice::new([1, 3]);
        let res = enemy_turn(&config, &mut player, &mut dice);
        assert!(matches!(
            res.effects[0],
            Effect::EnemyAttacked { roll: 1, total: 16, target_ac: 13, hit: true, damage: 4, .. }
        ));
        assert_eq!(player.hit_points.current, 6);
    }

    #[test]
    fn test_enemy_natural_twenty_always_hits() {
        let mut config = DungeonConfig::default();
        config.defend_bonus = 30;
        let mut player = fighter_in_combat();
        player.dungeon.player_defending = true;
        player.dungeon.turn = Turn::Enemy;
        let mut dice = ScriptedDice::new([20, 2]);
        let res = enemy_turn(&config, &mut player, &mut dice);
        assert!(matches!(
            res.effects[0],
            Effect::EnemyAttacked { target_ac: 43, hit: true, damage: 3, .. }
        ));
    }

    #[test]
    fn test_cast_without_charges_is_refused() {
        let config = DungeonConfig::default();
        let mut player = fighter_in_combat().with_ability("Power Strike", 1);
        let mut dice = ScriptedDice::default();
        assert!(matches!(
            cast_ability(&config, &mut player, 0, &mut dice),
            Err(ActionError::ResourceUnavailable(_))
        ));
    }

    #[test]
    fn test_successful_flee_ends_combat() {
        let config = DungeonConfig::default();
        let mut player = fighter_in_combat();
        let mut dice = ScriptedDice::new([20]);
        let res = flee(&config, &mut player, &mut dice).unwrap();
        assert_eq!(res.outcome, Some(CombatOutcome::Fled));
        assert_eq!(player.dungeon.phase(), CombatPhase::Idle);
        assert!(player.dungeon.enemy.is_none());
        assert_eq!(player.experience, 0);
    }

    #[test]
    fn test_failed_flee_gives_enemy_a_turn() {
        let config = DungeonConfig::default();
        let mut player = fighter_in_combat();
        // Flee 5 + 1 < 17, 1d6+2 = 3; enemy 15 + 3 hits AC 13 for 1d6+1 = 3.
        let mut dice = ScriptedDice::new([5, 1, 15, 2]);
        let res = flee(&config, &mut player, &mut dice).unwrap();
        assert!(matches!(
            res.effects[0],
            Effect::FleeAttempted { success: false, damage: 3, hp: 7, .. }
        ));
        assert!(matches!(
            res.effects[1],
            Effect::EnemyAttacked { hit: true, damage: 3, hp: 4, .. }
        ));
        assert_eq!(res.outcome, None);
        assert_eq!(player.dungeon.phase(), CombatPhase::PlayerTurn);
        assert!(player.dungeon.enemy.is_some());
    }
}
