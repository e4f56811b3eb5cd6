//! Item catalog.
//!
//! Static data the dungeon hands out as loot and the combat rules look up
//! when resolving equipped gear.

use crate::player::Attribute;
use serde::{Deserialize, Serialize};

/// Inventory name of the consumable that allows camping in a room.
pub const CAMP_KIT: &str = "Camp Kit";

/// Weapon families. The family decides which attribute drives to-hit and damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponCategory {
    Sword,
    Axe,
    Mace,
    Dagger,
    Bow,
    Staff,
    Wand,
}

impl WeaponCategory {
    pub fn attack_attribute(&self) -> Attribute {
        match self {
            WeaponCategory::Bow | WeaponCategory::Dagger => Attribute::Dexterity,
            WeaponCategory::Staff | WeaponCategory::Wand => Attribute::Intellect,
            WeaponCategory::Sword | WeaponCategory::Axe | WeaponCategory::Mace => {
                Attribute::Strength
            }
        }
    }

    pub fn base_damage(&self) -> &'static str {
        match self {
            WeaponCategory::Dagger => "1d6",
            WeaponCategory::Axe => "1d10",
            _ => "1d8",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weapon {
    pub name: String,
    pub category: WeaponCategory,
    /// Base damage dice before the attribute bonus.
    pub damage: String,
}

impl Weapon {
    pub fn new(name: impl Into<String>, category: WeaponCategory) -> Self {
        Self {
            name: name.into(),
            category,
            damage: category.base_damage().to_string(),
        }
    }

    /// Bare hands: hits like a blade, driven by strength.
    pub fn unarmed() -> Self {
        Self::new("Fists", WeaponCategory::Sword)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmorWeight {
    Light,
    Medium,
    Heavy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Armor {
    pub name: String,
    pub weight: ArmorWeight,
    /// Armor class bonus while worn.
    pub defense: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsumableKind {
    Ration,
    CampSupply,
    Material,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumable {
    pub name: String,
    pub kind: ConsumableKind,
}

/// Anything that can sit in an inventory slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Item {
    Weapon(Weapon),
    Armor(Armor),
    Consumable(Consumable),
}

impl Item {
    pub fn name(&self) -> &str {
        match self {
            Item::Weapon(w) => &w.name,
            Item::Armor(a) => &a.name,
            Item::Consumable(c) => &c.name,
        }
    }

    /// Emoji shown next to the item in loot messages.
    pub fn emoji(&self) -> &'static str {
        match self {
            Item::Weapon(w) => match w.category {
                WeaponCategory::Bow => "🏹",
                WeaponCategory::Staff | WeaponCategory::Wand => "🪄",
                WeaponCategory::Dagger => "🗡️",
                _ => "⚔️",
            },
            Item::Armor(_) => "🛡️",
            Item::Consumable(c) => match c.kind {
                ConsumableKind::Ration => "🍖",
                ConsumableKind::CampSupply => "🔥",
                ConsumableKind::Material => "💎",
            },
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.emoji(), self.name())
    }
}

fn consumable(name: &str, kind: ConsumableKind) -> Item {
    Item::Consumable(Consumable {
        name: name.to_string(),
        kind,
    })
}

fn armor(name: &str, weight: ArmorWeight, defense: i32) -> Item {
    Item::Armor(Armor {
        name: name.to_string(),
        weight,
        defense,
    })
}

lazy_static::lazy_static! {
    /// Every item the dungeon knows about.
    pub static ref CATALOG: Vec<Item> = vec![
        consumable("Rations", ConsumableKind::Ration),
        consumable(CAMP_KIT, ConsumableKind::CampSupply),
        consumable("Iron Ore", ConsumableKind::Material),
        consumable("Gemstone", ConsumableKind::Material),
        Item::Weapon(Weapon::new("Sabre", WeaponCategory::Sword)),
        Item::Weapon(Weapon::new("Dagger", WeaponCategory::Dagger)),
        Item::Weapon(Weapon::new("Shortbow", WeaponCategory::Bow)),
        Item::Weapon(Weapon::new("Wooden Staff", WeaponCategory::Staff)),
        Item::Weapon(Weapon::new("Ember Wand", WeaponCategory::Wand)),
        Item::Weapon(Weapon::new("Acolyte Mace", WeaponCategory::Mace)),
        Item::Weapon(Weapon::new("Hand Axe", WeaponCategory::Axe)),
        armor("Leather Armor", ArmorWeight::Light, 1),
        armor("Chain Mail", ArmorWeight::Medium, 2),
        armor("Plate Armor", ArmorWeight::Heavy, 2),
    ];

    /// Bonus items found in treasure rooms.
    pub static ref TREASURE_POOL: Vec<&'static str> = vec![
        "Rations",
        CAMP_KIT,
        "Dagger",
        "Leather Armor",
        "Wooden Staff",
    ];

    /// Items a room search can turn up.
    pub static ref SEARCH_POOL: Vec<&'static str> = vec![
        "Rations",
        CAMP_KIT,
        "Dagger",
        "Leather Armor",
        "Wooden Staff",
        "Iron Ore",
        "Gemstone",
    ];
}

/// Find a catalog item by name (case-insensitive).
pub fn find_item(name: &str) -> Option<&'static Item> {
    CATALOG.iter().find(|i| i.name().eq_ignore_ascii_case(name))
}

/// Look up a weapon by name.
pub fn get_weapon(name: &str) -> Option<&'static Weapon> {
    match find_item(name)? {
        Item::Weapon(w) => Some(w),
        _ => None,
    }
}

/// Look up armor by name.
pub fn get_armor(name: &str) -> Option<&'static Armor> {
    match find_item(name)? {
        Item::Armor(a) => Some(a),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert!(find_item("camp kit").is_some());
        assert_eq!(get_weapon("SHORTBOW").unwrap().category, WeaponCategory::Bow);
        assert!(get_weapon("Leather Armor").is_none());
        assert_eq!(get_armor("chain mail").unwrap().defense, 2);
    }

    #[test]
    fn test_pools_reference_catalog() {
        for name in TREASURE_POOL.iter().chain(SEARCH_POOL.iter()) {
            assert!(find_item(name).is_some(), "{name} missing from catalog");
        }
    }

    #[test]
    fn test_category_attributes() {
        assert_eq!(WeaponCategory::Bow.attack_attribute(), Attribute::Dexterity);
        assert_eq!(WeaponCategory::Dagger.attack_attribute(), Attribute::Dexterity);
        assert_eq!(WeaponCategory::Wand.attack_attribute(), Attribute::Intellect);
        assert_eq!(WeaponCategory::Axe.attack_attribute(), Attribute::Strength);
        assert_eq!(WeaponCategory::Dagger.base_damage(), "1d6");
        assert_eq!(WeaponCategory::Axe.base_damage(), "1d10");
    }
}
