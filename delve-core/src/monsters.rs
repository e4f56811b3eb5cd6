//! Monster tables, grouped by dungeon theme.

use serde::{Deserialize, Serialize};

/// A static monster entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonsterTemplate {
    pub name: &'static str,
    pub emoji: &'static str,
    pub level: u32,
    pub hp: i32,
    pub armor_class: i32,
    pub attack: &'static str,
    pub to_hit: i32,
    pub xp: u32,
}

/// A dungeon theme and the monsters that live there.
#[derive(Debug, Clone)]
pub struct Theme {
    pub name: &'static str,
    pub monsters: Vec<MonsterTemplate>,
}

/// Snapshot of a monster at encounter time. Only `hp` changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enemy {
    pub name: String,
    pub emoji: String,
    pub level: u32,
    pub hp: i32,
    pub max_hp: i32,
    pub armor_class: i32,
    pub attack: String,
    pub to_hit: i32,
    pub xp: u32,
}

impl Enemy {
    /// Copy a template, scaled for how deep the room is.
    pub fn from_template(template: &MonsterTemplate, depth: u32) -> Self {
        let extra = depth / 3;
        let hp = template.hp + 2 * extra as i32;
        Self {
            name: template.name.to_string(),
            emoji: template.emoji.to_string(),
            level: template.level + extra,
            hp,
            max_hp: hp,
            armor_class: template.armor_class + extra.min(1) as i32,
            attack: template.attack.to_string(),
            to_hit: template.to_hit + extra as i32,
            xp: template.xp + 20 * extra,
        }
    }

    /// Apply damage, clamped at zero. Returns the damage actually dealt.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        let old = self.hp;
        self.hp = (self.hp - amount.max(0)).max(0);
        old - self.hp
    }

    pub fn is_defeated(&self) -> bool {
        self.hp <= 0
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.emoji, self.name)
    }
}

#[allow(clippy::too_many_arguments)]
const fn monster(
    name: &'static str,
    emoji: &'static str,
    level: u32,
    hp: i32,
    armor_class: i32,
    attack: &'static str,
    to_hit: i32,
    xp: u32,
) -> MonsterTemplate {
    MonsterTemplate {
        name,
        emoji,
        level,
        hp,
        armor_class,
        attack,
        to_hit,
        xp,
    }
}

lazy_static::lazy_static! {
    pub static ref THEMES: Vec<Theme> = vec![
        Theme {
            name: "Castle of Shadows",
            monsters: vec![
                monster("Skeleton", "💀", 1, 10, 11, "1d6+1", 3, 60),
                monster("Zombie", "🧟", 2, 14, 10, "1d8+1", 2, 90),
                monster("Gloom Demon", "😈", 3, 18, 12, "1d10+2", 4, 140),
            ],
        },
        Theme {
            name: "Caverns of Silence",
            monsters: vec![
                monster("Cave Spider", "🕷️", 1, 9, 12, "1d6+1", 3, 55),
                monster("Stone Golem", "🗿", 3, 20, 13, "1d10+2", 5, 150),
                monster("Shade", "🌫️", 2, 12, 12, "1d8+0", 4, 100),
            ],
        },
        Theme {
            name: "Catacombs of the Ancestors",
            monsters: vec![
                monster("Wraith", "👻", 2, 12, 12, "1d8+1", 4, 110),
                monster("Mummy", "🤐", 3, 18, 12, "1d10+1", 4, 150),
                monster("Bone Mage", "🦴", 3, 16, 11, "1d8+3", 5, 160),
            ],
        },
    ];
}

/// Look up a theme by name, falling back to the first theme.
pub fn theme(name: &str) -> &'static Theme {
    THEMES
        .iter()
        .find(|t| t.name.eq_ignore_ascii_case(name))
        .unwrap_or(&THEMES[0])
}

pub fn theme_names() -> Vec<&'static str> {
    THEMES.iter().map(|t| t.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaling_by_depth() {
        let skeleton = &theme("Castle of Shadows").monsters[0];

        let shallow = Enemy::from_template(skeleton, 2);
        assert_eq!(shallow.level, 1);
        assert_eq!(shallow.hp, 10);
        assert_eq!(shallow.armor_class, 11);

        let deep = Enemy::from_template(skeleton, 9);
        assert_eq!(deep.level, 4);
        assert_eq!(deep.hp, 16);
        assert_eq!(deep.max_hp, 16);
        assert_eq!(deep.armor_class, 12);
        assert_eq!(deep.to_hit, 6);
        assert_eq!(deep.xp, 120);
    }

    #[test]
    fn test_enemy_damage_clamps() {
        let mut enemy = Enemy::from_template(&theme("x").monsters[1], 1);
        assert_eq!(enemy.take_damage(100), 14);
        assert_eq!(enemy.hp, 0);
        assert!(enemy.is_defeated());
    }

    #[test]
    fn test_unknown_theme_falls_back() {
        assert_eq!(theme("Nowhere").name, "Castle of Shadows");
        assert_eq!(theme("caverns of silence").name, "Caverns of Silence");
        assert_eq!(theme_names().len(), 3);
    }
}
