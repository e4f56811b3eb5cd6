//! Player record.
//!
//! The player store owns these; an action borrows one for its duration and
//! writes it back when the transition is complete.

use crate::abilities;
use crate::dice;
use crate::dungeon::DungeonState;
use crate::items::{self, Item, Weapon};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Maximum number of distinct item stacks a player can carry.
pub const MAX_INVENTORY_SLOTS: usize = 10;

/// Class keys a new character can be created with.
pub const CLASSES: &[&str] = &["swordsman", "mage", "archer", "thief", "acolyte", "merchant"];

/// Opaque player identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four player attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attribute {
    Strength,
    Dexterity,
    Intellect,
    Endurance,
}

impl Attribute {
    pub fn name(&self) -> &'static str {
        match self {
            Attribute::Strength => "Strength",
            Attribute::Dexterity => "Dexterity",
            Attribute::Intellect => "Intellect",
            Attribute::Endurance => "Endurance",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub strength: i32,
    pub dexterity: i32,
    pub intellect: i32,
    pub endurance: i32,
}

impl Attributes {
    pub fn new(strength: i32, dexterity: i32, intellect: i32, endurance: i32) -> Self {
        Self {
            strength,
            dexterity,
            intellect,
            endurance,
        }
    }

    pub fn get(&self, attribute: Attribute) -> i32 {
        match attribute {
            Attribute::Strength => self.strength,
            Attribute::Dexterity => self.dexterity,
            Attribute::Intellect => self.intellect,
            Attribute::Endurance => self.endurance,
        }
    }

    pub fn modifier(&self, attribute: Attribute) -> i32 {
        dice::modifier(self.get(attribute))
    }
}

impl Default for Attributes {
    fn default() -> Self {
        Self::new(5, 5, 3, 3)
    }
}

/// Hit points, always kept within `0..=maximum`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: i32,
    pub maximum: i32,
}

impl HitPoints {
    pub fn new(maximum: i32) -> Self {
        Self {
            current: maximum,
            maximum,
        }
    }

    /// Apply damage and return how much was actually lost.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        let old = self.current;
        self.current = (self.current - amount.max(0)).max(0);
        old - self.current
    }

    /// Heal and return how much was actually restored.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let old = self.current;
        self.current = (self.current + amount.max(0)).min(self.maximum);
        self.current - old
    }

    pub fn is_down(&self) -> bool {
        self.current <= 0
    }

    pub fn missing(&self) -> i32 {
        self.maximum - self.current
    }
}

/// Item name -> count, at most [`MAX_INVENTORY_SLOTS`] distinct names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub items: BTreeMap<String, u32>,
}

impl Inventory {
    /// Add items. Returns false (and adds nothing) when a new stack would
    /// not fit.
    pub fn add(&mut self, name: &str, count: u32) -> bool {
        if count == 0 {
            return true;
        }
        if !self.items.contains_key(name) && self.items.len() >= MAX_INVENTORY_SLOTS {
            return false;
        }
        *self.items.entry(name.to_string()).or_insert(0) += count;
        true
    }

    /// Remove one item. Returns false if none was held.
    pub fn remove_one(&mut self, name: &str) -> bool {
        match self.items.get_mut(name) {
            Some(count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    self.items.remove(name);
                }
                true
            }
            _ => false,
        }
    }

    pub fn count(&self, name: &str) -> u32 {
        self.items.get(name).copied().unwrap_or(0)
    }

    pub fn slots_used(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Names of equipped catalog items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    pub weapon: Option<String>,
    pub armor: Option<String>,
}

/// Maximum hit points for a class at a level.
pub fn max_hp_for(class_key: &str, level: u32) -> i32 {
    let (base, per_level) = match class_key {
        "swordsman" | "archer" => (10, 6),
        "mage" => (6, 6),
        _ => (8, 5),
    };
    base + per_level * (level.max(1) as i32 - 1)
}

/// Starting attributes for a class: the class's main attribute is highest.
pub fn starting_attributes(class_key: &str) -> Attributes {
    match class_key {
        "swordsman" => Attributes::new(15, 12, 8, 12),
        "mage" => Attributes::new(8, 12, 15, 10),
        "archer" | "thief" => Attributes::new(10, 15, 10, 11),
        "acolyte" => Attributes::new(10, 10, 14, 13),
        _ => Attributes::new(10, 12, 13, 11),
    }
}

/// Weapon each class starts with equipped.
pub fn starting_weapon(class_key: &str) -> &'static str {
    match class_key {
        "swordsman" => "Sabre",
        "mage" => "Ember Wand",
        "archer" => "Shortbow",
        "thief" => "Dagger",
        "acolyte" => "Acolyte Mace",
        _ => "Hand Axe",
    }
}

/// A player character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub class_key: String,
    pub level: u32,
    pub experience: u32,
    pub gold: u32,
    pub hit_points: HitPoints,
    pub attributes: Attributes,
    pub equipment: Equipment,
    pub inventory: Inventory,
    /// Ability name -> ability level.
    pub abilities_known: BTreeMap<String, u8>,
    /// Ability name -> remaining uses.
    pub ability_charges: BTreeMap<String, u8>,
    #[serde(default)]
    pub dungeon: DungeonState,
}

impl Player {
    pub fn new(name: impl Into<String>, class_key: impl Into<String>) -> Self {
        let class_key = class_key.into();
        let max_hp = max_hp_for(&class_key, 1);
        Self {
            id: PlayerId::new(),
            name: name.into(),
            class_key,
            level: 1,
            experience: 0,
            gold: 50,
            hit_points: HitPoints::new(max_hp),
            attributes: Attributes::default(),
            equipment: Equipment::default(),
            inventory: Inventory::default(),
            abilities_known: BTreeMap::new(),
            ability_charges: BTreeMap::new(),
            dungeon: DungeonState::default(),
        }
    }

    /// A fresh character with the class's attributes, weapon, starting
    /// ability and one camp kit.
    pub fn for_class(name: impl Into<String>, class_key: &str) -> Self {
        let mut player = Self::new(name, class_key)
            .with_attributes(starting_attributes(class_key))
            .with_weapon(starting_weapon(class_key))
            .with_ability(abilities::starting_ability(class_key), 1);
        abilities::rest_restore(&mut player);
        player.inventory.add(items::CAMP_KIT, 1);
        player
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_weapon(mut self, name: impl Into<String>) -> Self {
        self.equipment.weapon = Some(name.into());
        self
    }

    pub fn with_armor(mut self, name: impl Into<String>) -> Self {
        self.equipment.armor = Some(name.into());
        self
    }

    pub fn with_ability(mut self, name: impl Into<String>, level: u8) -> Self {
        self.abilities_known.insert(name.into(), level);
        self
    }

    /// The equipped weapon, or bare hands when nothing (or an unknown name)
    /// is equipped.
    pub fn weapon(&self) -> Weapon {
        self.equipment
            .weapon
            .as_deref()
            .and_then(items::get_weapon)
            .cloned()
            .unwrap_or_else(Weapon::unarmed)
    }

    /// Attribute-derived bonus for the equipped weapon, floored at zero.
    pub fn weapon_bonus(&self) -> i32 {
        let attribute = self.weapon().category.attack_attribute();
        self.attributes.modifier(attribute).max(0)
    }

    /// Damage expression for the equipped weapon (e.g. `1d8+2`).
    pub fn weapon_damage(&self) -> String {
        let weapon = self.weapon();
        match self.weapon_bonus() {
            0 => weapon.damage,
            bonus => format!("{}+{bonus}", weapon.damage),
        }
    }

    /// Armor class without temporary bonuses.
    pub fn armor_class(&self) -> i32 {
        let armor = self
            .equipment
            .armor
            .as_deref()
            .and_then(items::get_armor)
            .map(|a| a.defense)
            .unwrap_or(0);
        10 + (self.attributes.endurance / 3).max(0) + armor
    }

    /// Add a catalog item to the inventory.
    pub fn give_item(&mut self, item: &Item) -> bool {
        self.inventory.add(item.name(), 1)
    }
}
