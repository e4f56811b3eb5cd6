//! Ability catalog and charge bookkeeping.
//!
//! Charges are keyed by ability name. Entering a dungeon resets every known
//! ability to its maximum, camping adds one charge each, and a rest in town
//! restores everything.

use crate::player::Player;
use crate::rules::ActionError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Static metadata for an ability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbilityInfo {
    pub title: &'static str,
    pub emoji: &'static str,
    /// Base damage die before the intellect bonus.
    pub damage: &'static str,
}

impl AbilityInfo {
    pub fn label(&self) -> String {
        format!("{} {}", self.emoji, self.title)
    }
}

/// Damage die for abilities missing from the catalog.
pub const DEFAULT_ABILITY_DAMAGE: &str = "1d8";

lazy_static::lazy_static! {
    pub static ref ABILITIES: HashMap<&'static str, AbilityInfo> = {
        let mut m = HashMap::new();
        for (title, emoji, damage) in [
            ("Power Strike", "🗡️", "1d10"),
            ("Fireball", "🔥", "1d10"),
            ("Shadow Strike", "🔪", "1d8"),
            ("Holy Light", "✨", "1d6"),
            ("Precise Shot", "🏹", "1d8"),
            ("Trade Trick", "💼", "1d6"),
        ] {
            m.insert(title, AbilityInfo { title, emoji, damage });
        }
        m
    };
}

/// Catalog entry for an ability, or a generic entry for unknown names.
pub fn ability_info(name: &str) -> AbilityInfo {
    ABILITIES.get(name).cloned().unwrap_or(AbilityInfo {
        title: "Ability",
        emoji: "✨",
        damage: DEFAULT_ABILITY_DAMAGE,
    })
}

/// Display label for an ability, keeping the player's own name for unknown ones.
pub fn ability_label(name: &str) -> String {
    match ABILITIES.get(name) {
        Some(info) => info.label(),
        None => format!("✨ {name}"),
    }
}

/// The ability each class starts with.
pub fn starting_ability(class_key: &str) -> &'static str {
    match class_key {
        "swordsman" => "Power Strike",
        "mage" => "Fireball",
        "thief" => "Shadow Strike",
        "acolyte" => "Holy Light",
        "archer" => "Precise Shot",
        _ => "Trade Trick",
    }
}

/// Maximum charges for an ability at the given level.
///
/// The class key is accepted so class-specific tables can be added without
/// changing callers; every class currently shares one table.
pub fn max_charges(_ability: &str, level: u8, _class_key: &str) -> u8 {
    match level {
        0 => 0,
        l => l.min(3) + 2,
    }
}

/// One ability's charge count after a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeStatus {
    pub ability: String,
    pub current: u8,
    pub maximum: u8,
}

impl fmt::Display for ChargeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/{}",
            ability_label(&self.ability),
            self.current,
            self.maximum
        )
    }
}

fn maximum_for(player: &Player, ability: &str) -> u8 {
    let level = player.abilities_known.get(ability).copied().unwrap_or(0);
    max_charges(ability, level, &player.class_key)
}

/// Snapshot of every known ability's charges.
pub fn charge_status(player: &Player) -> Vec<ChargeStatus> {
    player
        .abilities_known
        .keys()
        .map(|name| ChargeStatus {
            ability: name.clone(),
            current: player.ability_charges.get(name).copied().unwrap_or(0),
            maximum: maximum_for(player, name),
        })
        .collect()
}

/// Set every known ability to its maximum. Abilities with no uses at their
/// level are dropped from the charge table.
pub fn reset_for_dungeon(player: &mut Player) -> Vec<ChargeStatus> {
    let charges = player
        .abilities_known
        .keys()
        .filter_map(|name| {
            let max = maximum_for(player, name);
            (max > 0).then(|| (name.clone(), max))
        })
        .collect();
    player.ability_charges = charges;
    charge_status(player)
}

/// Full restore outside the dungeon.
pub fn rest_restore(player: &mut Player) -> Vec<ChargeStatus> {
    reset_for_dungeon(player)
}

/// +1 charge to each known ability, never above its maximum.
pub fn camp_recharge(player: &mut Player) -> Vec<ChargeStatus> {
    let names: Vec<String> = player.abilities_known.keys().cloned().collect();
    for name in names {
        let max = maximum_for(player, &name);
        let current = player.ability_charges.get(&name).copied().unwrap_or(0);
        let next = current.saturating_add(1).min(max);
        if next > 0 {
            player.ability_charges.insert(name, next);
        }
    }
    charge_status(player)
}

/// Abilities with at least one charge left, in name order. Cast indices
/// refer to this list.
pub fn available(player: &Player) -> Vec<String> {
    player
        .ability_charges
        .iter()
        .filter(|(_, &charges)| charges > 0)
        .map(|(name, _)| name.clone())
        .collect()
}

/// Spend one charge. Returns the charges left.
pub fn consume(player: &mut Player, ability: &str) -> Result<u8, ActionError> {
    match player.ability_charges.get_mut(ability) {
        Some(charges) if *charges > 0 => {
            *charges -= 1;
            Ok(*charges)
        }
        _ => Err(ActionError::ResourceUnavailable(format!(
            "{} has no charges left.",
            ability_label(ability)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caster() -> Player {
        Player::new("Ilya", "mage")
            .with_ability("Fireball", 2)
            .with_ability("Holy Light", 1)
    }

    #[test]
    fn test_charge_table() {
        assert_eq!(max_charges("Fireball", 0, "mage"), 0);
        assert_eq!(max_charges("Fireball", 1, "mage"), 3);
        assert_eq!(max_charges("Fireball", 2, "mage"), 4);
        assert_eq!(max_charges("Fireball", 3, "mage"), 5);
        assert_eq!(max_charges("Fireball", 9, "mage"), 5);
    }

    #[test]
    fn test_reset_and_consume() {
        let mut player = caster();
        reset_for_dungeon(&mut player);
        assert_eq!(player.ability_charges["Fireball"], 4);
        assert_eq!(player.ability_charges["Holy Light"], 3);

        assert_eq!(consume(&mut player, "Fireball").unwrap(), 3);
        player.ability_charges.insert("Holy Light".into(), 0);
        assert!(matches!(
            consume(&mut player, "Holy Light"),
            Err(ActionError::ResourceUnavailable(_))
        ));
        assert_eq!(available(&player), vec!["Fireball".to_string()]);
    }

    #[test]
    fn test_camp_recharge_caps() {
        let mut player = caster();
        reset_for_dungeon(&mut player);
        player.ability_charges.insert("Fireball".into(), 1);

        let status = camp_recharge(&mut player);
        assert_eq!(player.ability_charges["Fireball"], 2);
        assert_eq!(player.ability_charges["Holy Light"], 3);
        assert!(status.iter().all(|s| s.current <= s.maximum));
    }

    #[test]
    fn test_unknown_ability_defaults() {
        assert_eq!(ability_info("Mystery").damage, DEFAULT_ABILITY_DAMAGE);
        assert_eq!(ability_label("Mystery"), "✨ Mystery");
        assert_eq!(ability_info("Fireball").damage, "1d10");
        assert_eq!(starting_ability("archer"), "Precise Shot");
    }
}
