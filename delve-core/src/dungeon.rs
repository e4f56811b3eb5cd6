//! Dungeon state and room progression.

use crate::abilities;
use crate::combat::{self, CombatPhase};
use crate::config::DungeonConfig;
use crate::dice::{roll_expression, Roller};
use crate::encounter::{self, RoomOutcome};
use crate::items::{self, SEARCH_POOL};
use crate::monsters::{self, Enemy};
use crate::player::Player;
use crate::rewards;
use crate::rules::{ActionError, Effect, Resolution};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Whose move it is during a fight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Turn {
    #[default]
    Player,
    Enemy,
}

/// Per-player dungeon progress. The default value is "in town".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DungeonState {
    pub active: bool,
    pub theme: String,
    pub floor: u32,
    /// 1-based room on the current floor; 0 only before the first room.
    pub room: u32,
    pub found_exit: bool,
    pub camped_in_room: bool,
    /// An `escape` is waiting for confirmation.
    pub escape_pending: bool,
    pub in_combat: bool,
    pub enemy: Option<Enemy>,
    pub turn: Turn,
    pub player_defending: bool,
}

impl DungeonState {
    /// Fresh state at the dungeon gate, before room 1.
    pub fn new(theme: impl Into<String>) -> Self {
        Self {
            active: true,
            theme: theme.into(),
            floor: 1,
            ..Default::default()
        }
    }

    pub fn phase(&self) -> CombatPhase {
        match (self.in_combat, self.turn) {
            (false, _) => CombatPhase::Idle,
            (true, Turn::Player) => CombatPhase::PlayerTurn,
            (true, Turn::Enemy) => CombatPhase::EnemyTurn,
        }
    }

    pub fn begin_combat(&mut self, enemy: Enemy, turn: Turn) {
        self.in_combat = true;
        self.enemy = Some(enemy);
        self.turn = turn;
        self.player_defending = false;
    }

    pub fn end_combat(&mut self) {
        self.in_combat = false;
        self.enemy = None;
        self.turn = Turn::Player;
        self.player_defending = false;
    }

    /// Check the structural invariants, returning the first violation.
    pub fn validate(&self, config: &DungeonConfig) -> Result<(), String> {
        if self.in_combat != self.enemy.is_some() {
            return Err("in_combat does not match enemy presence".to_string());
        }
        if !self.active {
            return if *self == DungeonState::default() {
                Ok(())
            } else {
                Err("inactive state carries dungeon progress".to_string())
            };
        }
        if self.floor == 0 {
            return Err("floor 0".to_string());
        }
        if self.room > config.rooms_per_floor {
            return Err(format!(
                "room {} beyond floor size {}",
                self.room, config.rooms_per_floor
            ));
        }
        if self.in_combat && self.turn == Turn::Enemy {
            return Err("saved on the enemy's turn".to_string());
        }
        Ok(())
    }

    /// Reset to the town state if the invariants fail. Returns true when a
    /// repair happened.
    pub fn repair(&mut self, config: &DungeonConfig) -> bool {
        match self.validate(config) {
            Ok(()) => false,
            Err(reason) => {
                error!(%reason, "corrupted dungeon state, returning player to town");
                *self = DungeonState::default();
                true
            }
        }
    }
}

/// Road event on the way to the dungeon.
fn road_event<R: Roller + ?Sized>(
    config: &DungeonConfig,
    player: &mut Player,
    roller: &mut R,
) -> Effect {
    if roller.d100() <= config.road_heal_chance {
        let amount = player
            .hit_points
            .heal(roll_expression(&config.road_heal, roller));
        return Effect::RoadHealed {
            amount,
            hp: player.hit_points.current,
            max_hp: player.hit_points.maximum,
        };
    }
    if roller.d100() <= config.road_robbery_chance {
        let rolled = roll_expression(&config.road_robbery, roller).max(0) as u32;
        let gold = rolled.min(player.gold);
        player.gold -= gold;
        return Effect::RoadRobbed {
            gold,
            total_gold: player.gold,
        };
    }
    let gold = roll_expression(&config.road_find, roller).max(0) as u32;
    player.gold += gold;
    Effect::RoadFound {
        gold,
        total_gold: player.gold,
    }
}

/// Travel to a dungeon and enter its first room.
pub fn enter_dungeon<R: Roller + ?Sized>(
    config: &DungeonConfig,
    player: &mut Player,
    theme: &str,
    roller: &mut R,
) -> Resolution {
    let theme = monsters::theme(theme).name;
    info!(player = %player.id, theme, "entering dungeon");

    player.dungeon = DungeonState::new(theme);
    let charges = abilities::reset_for_dungeon(player);

    let mut resolution = Resolution::new()
        .with_effect(Effect::DungeonEntered {
            theme: theme.to_string(),
        })
        .with_effect(Effect::ChargesRestored { charges });
    resolution.push(road_event(config, player, roller));
    resolution.absorb(enter_next_room(config, player, roller));
    resolution
}

/// Move to the next room (or the first room of the next floor) and roll
/// what it holds.
pub fn enter_next_room<R: Roller + ?Sized>(
    config: &DungeonConfig,
    player: &mut Player,
    roller: &mut R,
) -> Resolution {
    let mut resolution = Resolution::new();
    let state = &mut player.dungeon;

    if state.room >= config.rooms_per_floor {
        state.floor += 1;
        state.room = 1;
        resolution.push(Effect::FloorDescended { floor: state.floor });
    } else {
        state.room += 1;
    }
    state.camped_in_room = false;
    state.escape_pending = false;
    state.found_exit =
        state.room < config.rooms_per_floor && roller.d100() <= config.exit_chance;

    resolution.push(Effect::RoomEntered {
        floor: state.floor,
        room: state.room,
        found_exit: state.found_exit,
    });

    let theme = state.theme.clone();
    let (floor, room) = (state.floor, state.room);
    match encounter::roll_room(config, &theme, floor, room, roller) {
        RoomOutcome::Monster(enemy) => {
            resolution.absorb(combat::start_combat(config, player, enemy, roller));
        }
        RoomOutcome::Trap { dc } => {
            resolution.push(encounter::spring_trap(config, player, dc, roller));
            if player.hit_points.is_down() {
                resolution.absorb(rewards::apply_defeat(config, player));
            }
        }
        RoomOutcome::Treasure => {
            resolution.push(encounter::collect_treasure(config, player, roller));
        }
        RoomOutcome::Empty => resolution.push(Effect::RoomEmpty),
    }
    resolution
}

/// Search the current room. Repeatable; never changes the room.
pub fn search<R: Roller + ?Sized>(
    config: &DungeonConfig,
    player: &mut Player,
    roller: &mut R,
) -> Resolution {
    let effect = if roller.d100() <= config.search_nothing_chance {
        Effect::SearchedNothing
    } else if roller.d100() <= config.search_gold_chance {
        let gold = roll_expression(&config.search_gold, roller).max(0) as u32;
        player.gold += gold;
        Effect::SearchFoundGold {
            gold,
            total_gold: player.gold,
        }
    } else {
        let name = SEARCH_POOL[roller.die(SEARCH_POOL.len() as u32) as usize - 1];
        match items::find_item(name) {
            Some(item) => Effect::SearchFoundItem {
                item: item.display_name(),
                stored: player.give_item(item),
            },
            None => Effect::SearchedNothing,
        }
    };
    Resolution::new().with_effect(effect)
}

/// Spend a camp supply to heal and recover one charge per ability. Once per room.
pub fn camp(config: &DungeonConfig, player: &mut Player) -> Result<Resolution, ActionError> {
    if player.dungeon.camped_in_room {
        return Err(ActionError::unavailable(
            "You have already camped in this room.",
        ));
    }
    if !player.inventory.remove_one(&config.camp_supply) {
        return Err(ActionError::unavailable(format!(
            "You need a {} to make camp.",
            config.camp_supply
        )));
    }
    player.dungeon.camped_in_room = true;

    let amount = (player.hit_points.missing() / 2).max(1);
    let healed = player.hit_points.heal(amount);
    let charges = abilities::camp_recharge(player);

    Ok(Resolution::new().with_effect(Effect::Camped {
        healed,
        hp: player.hit_points.current,
        max_hp: player.hit_points.maximum,
        charges,
    }))
}

/// Ask to leave through the room's exit.
pub fn escape(player: &mut Player) -> Result<Resolution, ActionError> {
    if !player.dungeon.found_exit {
        return Err(ActionError::unavailable("There is no way out of this room."));
    }
    player.dungeon.escape_pending = true;
    Ok(Resolution::new().with_effect(Effect::EscapePrompted))
}

/// Leave the dungeon. The session invalidates the shop afterwards.
pub fn escape_confirm(player: &mut Player) -> Result<Resolution, ActionError> {
    let state = &player.dungeon;
    if !state.escape_pending || !state.found_exit || state.in_combat {
        return Err(ActionError::invalid("There is nothing to confirm."));
    }
    let (floor, room) = (state.floor, state.room);
    info!(player = %player.id, floor, room, "left dungeon");
    player.dungeon = DungeonState::default();
    Ok(Resolution::new().with_effect(Effect::LeftDungeon { floor, room }))
}

pub fn escape_cancel(player: &mut Player) -> Result<Resolution, ActionError> {
    if !player.dungeon.escape_pending {
        return Err(ActionError::invalid("There is nothing to cancel."));
    }
    player.dungeon.escape_pending = false;
    Ok(Resolution::new().with_effect(Effect::EscapeCancelled))
}
