//! Victory rewards and the death penalty.

use crate::combat::CombatOutcome;
use crate::config::DungeonConfig;
use crate::dice::{roll_expression, Roller};
use crate::dungeon::DungeonState;
use crate::monsters::Enemy;
use crate::player::Player;
use crate::rules::{Effect, Resolution};
use tracing::info;

/// Gold and experience lost on death, as `(gold, experience)`.
pub fn death_penalty(config: &DungeonConfig, gold: u32, experience: u32) -> (u32, u32) {
    let gold_lost = gold.min(
        config
            .death_gold_floor
            .max(gold / config.death_gold_divisor.max(1)),
    );
    let experience_lost = experience / config.death_exp_divisor.max(1);
    (gold_lost, experience_lost)
}

/// Grant the enemy's experience and a gold purse, and close the fight.
pub fn apply_victory<R: Roller + ?Sized>(
    config: &DungeonConfig,
    player: &mut Player,
    enemy: &Enemy,
    roller: &mut R,
) -> Resolution {
    let gold = roll_expression(&config.victory_gold, roller).max(0) as u32;
    player.experience += enemy.xp;
    player.gold += gold;
    player.dungeon.end_combat();
    info!(player = %player.id, enemy = %enemy.name, xp = enemy.xp, gold, "victory");

    Resolution::new()
        .with_effect(Effect::Victory {
            enemy: enemy.label(),
            experience: enemy.xp,
            gold,
        })
        .with_outcome(CombatOutcome::Victory)
}

/// Take the death penalty, empty the pack and send the player back to town.
pub fn apply_defeat(config: &DungeonConfig, player: &mut Player) -> Resolution {
    let (gold_lost, experience_lost) = death_penalty(config, player.gold, player.experience);
    let items_lost: u32 = player.inventory.items.values().sum();

    player.gold -= gold_lost;
    player.experience -= experience_lost;
    player.inventory.clear();
    player.dungeon = DungeonState::default();
    player.hit_points.current = config
        .death_revive_hp
        .clamp(1, player.hit_points.maximum.max(1));
    info!(player = %player.id, gold_lost, experience_lost, items_lost, "defeat");

    Resolution::new()
        .with_effect(Effect::Defeat {
            gold_lost,
            experience_lost,
            items_lost,
        })
        .with_outcome(CombatOutcome::Defeat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::CAMP_KIT;
    use crate::monsters;
    use crate::testing::ScriptedDice;

    #[test]
    fn test_death_penalty_floor_and_cap() {
        let config = DungeonConfig::default();
        assert_eq!(death_penalty(&config, 90, 100), (30, 20));
        assert_eq!(death_penalty(&config, 12, 4), (5, 0));
        assert_eq!(death_penalty(&config, 3, 9), (3, 1));
        assert_eq!(death_penalty(&config, 0, 0), (0, 0));
    }

    #[test]
    fn test_victory_pays_once() {
        let config = DungeonConfig::default();
        let mut player = Player::new("Vera", "swordsman");
        let zombie = &monsters::theme("Castle of Shadows").monsters[1];
        let enemy = monsters::Enemy::from_template(zombie, 1);
        player.dungeon = DungeonState::new("Castle of Shadows");
        player.dungeon.begin_combat(enemy.clone(), crate::dungeon::Turn::Player);
        player.inventory.add(CAMP_KIT, 1);

        let mut dice = ScriptedDice::new([4]);
        let res = apply_victory(&config, &mut player, &enemy, &mut dice);
        assert_eq!(player.experience, 90);
        assert_eq!(player.gold, 57);
        assert!(!player.dungeon.in_combat);
        assert_eq!(player.inventory.count(CAMP_KIT), 1);
        assert_eq!(res.outcome, Some(CombatOutcome::Victory));
    }

    #[test]
    fn test_defeat_resets_everything() {
        let config = DungeonConfig::default();
        let mut player = Player::new("Vera", "swordsman");
        player.experience = 50;
        player.inventory.add(CAMP_KIT, 2);
        player.inventory.add("Gemstone", 1);
        player.dungeon = DungeonState::new("Castle of Shadows");
        player.hit_points.current = 0;

        let res = apply_defeat(&config, &mut player);
        assert_eq!(player.gold, 34);
        assert_eq!(player.experience, 40);
        assert!(player.inventory.is_empty());
        assert_eq!(player.dungeon, DungeonState::default());
        assert_eq!(player.hit_points.current, 1);
        assert!(matches!(res.effects[0], Effect::Defeat { items_lost: 3, .. }));
    }
}
