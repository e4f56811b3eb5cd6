//! Tunable rules constants.
//!
//! Everything the dungeon rolls against lives here so balancing never
//! touches the state machine.

use serde::{Deserialize, Serialize};

/// Percent weights for what a freshly entered room contains.
///
/// The remainder up to 100 is an empty room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterWeights {
    pub monster: u32,
    pub trap: u32,
    pub treasure: u32,
}

impl Default for EncounterWeights {
    fn default() -> Self {
        Self {
            monster: 45,
            trap: 20,
            treasure: 15,
        }
    }
}

/// Rules configuration for a dungeon run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DungeonConfig {
    /// Rooms on each floor before the stairs lead down.
    pub rooms_per_floor: u32,

    /// Percent chance that a room (other than the last on a floor) has an exit.
    pub exit_chance: u32,

    pub encounter_weights: EncounterWeights,

    /// Base DC for trap dexterity checks, raised by one for every two floors.
    pub trap_base_dc: i32,
    pub trap_damage: String,

    pub treasure_gold: String,
    /// Percent chance of a bonus item in a treasure room.
    pub treasure_item_chance: u32,

    /// Percent chance that a search turns up nothing.
    pub search_nothing_chance: u32,
    /// Of successful searches, percent that yield gold rather than an item.
    pub search_gold_chance: u32,
    pub search_gold: String,

    pub flee_dc: i32,
    pub flee_damage: String,

    /// Armor class bonus while defending.
    pub defend_bonus: i32,

    /// Extra die added to damage on a natural 20.
    pub critical_bonus: String,

    pub victory_gold: String,

    /// Minimum gold lost on death (capped at what the player carries).
    pub death_gold_floor: u32,
    /// Divisor for gold lost on death (`gold / divisor`).
    pub death_gold_divisor: u32,
    /// Divisor for experience lost on death (`exp / divisor`).
    pub death_exp_divisor: u32,
    /// Hit points a defeated player is carried back to town with.
    pub death_revive_hp: i32,

    /// Name of the inventory item consumed by camping.
    pub camp_supply: String,

    /// Percent chance that the road to the dungeon heals the player.
    pub road_heal_chance: u32,
    pub road_heal: String,
    /// Of the remaining road events, percent that are a robbery rather than a find.
    pub road_robbery_chance: u32,
    pub road_robbery: String,
    pub road_find: String,
}

impl Default for DungeonConfig {
    fn default() -> Self {
        Self {
            rooms_per_floor: 10,
            exit_chance: 18,
            encounter_weights: EncounterWeights::default(),
            trap_base_dc: 12,
            trap_damage: "1d6+1".to_string(),
            treasure_gold: "1d12+4".to_string(),
            treasure_item_chance: 30,
            search_nothing_chance: 45,
            search_gold_chance: 55,
            search_gold: "1d12+4".to_string(),
            flee_dc: 17,
            flee_damage: "1d6+2".to_string(),
            defend_bonus: 2,
            critical_bonus: "1d6".to_string(),
            victory_gold: "1d10+3".to_string(),
            death_gold_floor: 5,
            death_gold_divisor: 3,
            death_exp_divisor: 5,
            death_revive_hp: 1,
            camp_supply: crate::items::CAMP_KIT.to_string(),
            road_heal_chance: 40,
            road_heal: "1d6+2".to_string(),
            road_robbery_chance: 50,
            road_robbery: "1d12+6".to_string(),
            road_find: "1d10+5".to_string(),
        }
    }
}

impl DungeonConfig {
    /// Set the number of rooms per floor.
    pub fn with_rooms_per_floor(mut self, rooms: u32) -> Self {
        self.rooms_per_floor = rooms.max(1);
        self
    }

    /// Set the exit discovery chance (percent).
    pub fn with_exit_chance(mut self, percent: u32) -> Self {
        self.exit_chance = percent.min(100);
        self
    }

    /// Set the encounter weights.
    pub fn with_encounter_weights(mut self, weights: EncounterWeights) -> Self {
        self.encounter_weights = weights;
        self
    }

    /// Set the flee difficulty class.
    pub fn with_flee_dc(mut self, dc: i32) -> Self {
        self.flee_dc = dc;
        self
    }

    /// Depth of a room for monster scaling.
    pub fn depth(&self, floor: u32, room: u32) -> u32 {
        floor.saturating_sub(1) * self.rooms_per_floor + room
    }

    /// Trap DC on the given floor.
    pub fn trap_dc(&self, floor: u32) -> i32 {
        self.trap_base_dc + (floor / 2) as i32
    }
}
