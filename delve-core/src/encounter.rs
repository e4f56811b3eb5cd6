//! Room contents: monsters, traps, treasure or nothing at all.

use crate::config::DungeonConfig;
use crate::dice::{self, roll_expression, Roller};
use crate::items::{self, TREASURE_POOL};
use crate::monsters::{self, Enemy};
use crate::player::{Attribute, Player};
use crate::rules::Effect;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What a freshly entered room holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomOutcome {
    Monster(Enemy),
    Trap { dc: i32 },
    Treasure,
    Empty,
}

/// Pick a random monster from the theme's pool, scaled for depth.
pub fn roll_monster<R: Roller + ?Sized>(theme: &str, depth: u32, roller: &mut R) -> Enemy {
    let pool = &monsters::theme(theme).monsters;
    let index = roller.die(pool.len() as u32) as usize - 1;
    Enemy::from_template(&pool[index], depth)
}

/// Up to `n` distinct theme names in random order, for the dungeon picker.
pub fn theme_choices<R: Roller + ?Sized>(n: usize, roller: &mut R) -> Vec<&'static str> {
    let mut names = monsters::theme_names();
    for i in (1..names.len()).rev() {
        let j = roller.die(i as u32 + 1) as usize - 1;
        names.swap(i, j);
    }
    names.truncate(n);
    names
}

/// Decide what the room at `floor`/`room` contains.
pub fn roll_room<R: Roller + ?Sized>(
    config: &DungeonConfig,
    theme: &str,
    floor: u32,
    room: u32,
    roller: &mut R,
) -> RoomOutcome {
    let weights = config.encounter_weights;
    let kind = roller.d100();
    let outcome = if kind <= weights.monster {
        RoomOutcome::Monster(roll_monster(theme, config.depth(floor, room), roller))
    } else if kind <= weights.monster + weights.trap {
        RoomOutcome::Trap {
            dc: config.trap_dc(floor),
        }
    } else if kind <= weights.monster + weights.trap + weights.treasure {
        RoomOutcome::Treasure
    } else {
        RoomOutcome::Empty
    };
    debug!(kind, ?outcome, "room rolled");
    outcome
}

/// Dexterity check against a trap. Damage is rolled up front and applied
/// only on failure.
pub fn spring_trap<R: Roller + ?Sized>(
    config: &DungeonConfig,
    player: &mut Player,
    dc: i32,
    roller: &mut R,
) -> Effect {
    let modifier = player.attributes.modifier(Attribute::Dexterity);
    let check = dice::d20_check(modifier, dc, roller);
    let rolled = roll_expression(&config.trap_damage, roller).max(0);
    let damage = if check.success {
        0
    } else {
        player.hit_points.take_damage(rolled)
    };
    Effect::TrapSprung {
        roll: check.roll,
        dc,
        success: check.success,
        critical: check.critical,
        damage,
        hp: player.hit_points.current,
        max_hp: player.hit_points.maximum,
    }
}

/// Gold plus a chance at a bonus item.
pub fn collect_treasure<R: Roller + ?Sized>(
    config: &DungeonConfig,
    player: &mut Player,
    roller: &mut R,
) -> Effect {
    let gold = roll_expression(&config.treasure_gold, roller).max(0) as u32;
    player.gold += gold;

    let mut item = None;
    if roller.d100() <= config.treasure_item_chance {
        let name = TREASURE_POOL[roller.die(TREASURE_POOL.len() as u32) as usize - 1];
        if let Some(found) = items::find_item(name) {
            let stored = player.give_item(found);
            item = Some((found.display_name(), stored));
        }
    }

    Effect::TreasureFound {
        gold,
        total_gold: player.gold,
        item,
    }
}
