//! QA tests for the fight loop, driven through the session with scripted dice.
//!
//! Run with: `cargo test -p delve-core --test qa_combat`

use delve_core::combat::{self, CombatOutcome, CombatPhase};
use delve_core::dungeon::Turn;
use delve_core::monsters::{self, Enemy};
use delve_core::player::{Attributes, Player};
use delve_core::rules::{Action, Effect};
use delve_core::testing::{
    assert_hp, assert_in_combat, assert_not_in_combat, assert_phase, player_in_room, ScriptedDice,
    TestHarness,
};
use delve_core::DungeonConfig;
use proptest::prelude::*;

fn skeleton(hp: i32, armor_class: i32) -> Enemy {
    let mut enemy = Enemy::from_template(&monsters::theme("Castle of Shadows").monsters[0], 1);
    enemy.hp = hp;
    enemy.max_hp = hp;
    enemy.armor_class = armor_class;
    enemy
}

/// Swordsman with strength 14 (+2 to hit with a Sabre), 10/10 hp.
fn fighter() -> Player {
    Player::new("Vera", "swordsman")
        .with_attributes(Attributes::new(14, 12, 8, 9))
        .with_weapon("Sabre")
}

fn fighter_facing(enemy: Enemy) -> Player {
    let mut player = player_in_room(fighter(), "Castle of Shadows", 2);
    player.dungeon.begin_combat(enemy, Turn::Player);
    player
}

async fn harness_facing(enemy: Enemy) -> TestHarness {
    TestHarness::new(fighter_facing(enemy)).await.unwrap()
}

// =============================================================================
// TEST 1: Natural 20 finishes a weak enemy
// =============================================================================

#[tokio::test]
async fn test_natural_twenty_wins_and_rewards_once() {
    let harness = harness_facing(skeleton(5, 12)).await;
    assert_in_combat(&harness.player().await.unwrap());

    // d20 = 20, weapon 1d8 = 3 (+2), crit 1d6 = 4, purse 1d10+3 = 5 + 3.
    harness.script([20, 3, 4, 5]).await;
    let response = harness.act(Action::Attack).await.unwrap();

    assert_phase(&response, CombatPhase::Resolved(CombatOutcome::Victory));
    assert!(matches!(
        response.effects[0],
        Effect::PlayerAttacked {
            hit: true,
            critical: true,
            damage: 5,
            enemy_hp: 0,
            ..
        }
    ));
    let victories = response
        .effects
        .iter()
        .filter(|e| matches!(e, Effect::Victory { .. }))
        .count();
    assert_eq!(victories, 1);

    let player = harness.player().await.unwrap();
    assert_not_in_combat(&player);
    assert_hp(&player, 10, 10);
    assert_eq!(player.gold, 58);
    assert_eq!(player.experience, 60);
    assert_eq!(harness.remaining_rolls().await, 0);

    // The fight is over: attacking again is refused and changes nothing.
    let err = harness.act(Action::Attack).await.unwrap_err();
    assert!(err.is_refusal());
    assert_eq!(harness.player().await.unwrap(), player);
}

// =============================================================================
// TEST 2: Natural 1 misses no matter the armor
// =============================================================================

#[tokio::test]
async fn test_natural_one_always_misses() {
    let harness = harness_facing(skeleton(10, 2)).await;

    // Player natural 1 (3 would beat AC 2), enemy natural 1.
    harness.script([1, 1]).await;
    let response = harness.act(Action::Attack).await.unwrap();

    assert_phase(&response, CombatPhase::PlayerTurn);
    assert!(matches!(
        response.effects[0],
        Effect::PlayerAttacked {
            hit: false,
            damage: 0,
            enemy_hp: 10,
            ..
        }
    ));
    assert!(matches!(
        response.effects[1],
        Effect::EnemyAttacked { hit: false, .. }
    ));
    assert_hp(&harness.player().await.unwrap(), 10, 10);
}

// =============================================================================
// TEST 3: Wounded enemy reacts, and defending blunts the counterattack
// =============================================================================

#[tokio::test]
async fn test_hit_triggers_enemy_reaction_narration() {
    let harness = harness_facing(skeleton(10, 11)).await;

    // Hit with 15, 1d8 = 2 (+2), enemy misses with a 2.
    harness.script([15, 2, 2]).await;
    let response = harness.act(Action::Attack).await.unwrap();

    assert!(response.text().contains("[EnemyReaction]"));
    let player = harness.player().await.unwrap();
    assert_eq!(player.dungeon.enemy.as_ref().unwrap().hp, 6);
}

#[tokio::test]
async fn test_defend_raises_armor_for_one_attack() {
    let harness = harness_facing(skeleton(10, 11)).await;

    // AC 13 + 2. Skeleton rolls 11 + 3 = 14, which would hit an unguarded 13.
    harness.script([11]).await;
    let response = harness.act(Action::Defend).await.unwrap();
    assert!(matches!(
        response.effects[1],
        Effect::EnemyAttacked {
            hit: false,
            target_ac: 15,
            ..
        }
    ));

    // Same roll next turn lands: the guard is gone.
    harness.script([1, 11, 3]).await;
    let response = harness.act(Action::Attack).await.unwrap();
    assert!(matches!(
        response.effects[1],
        Effect::EnemyAttacked {
            hit: true,
            target_ac: 13,
            damage: 4,
            ..
        }
    ));
    assert_hp(&harness.player().await.unwrap(), 6, 10);
}

// =============================================================================
// TEST 4: Abilities
// =============================================================================

#[tokio::test]
async fn test_cast_lists_only_charged_abilities() {
    let mut player = fighter_facing(skeleton(20, 11)).with_ability("Power Strike", 1);
    player.ability_charges.insert("Power Strike".to_string(), 1);
    let harness = TestHarness::new(player).await.unwrap();

    let actions = harness
        .session
        .available_actions(&harness.player().await.unwrap());
    assert!(actions.contains(&Action::CastAbility(0)));

    // Cast hits with 18, 1d10 = 5, enemy misses.
    harness.script([18, 5, 1]).await;
    let response = harness.act(Action::CastAbility(0)).await.unwrap();
    assert!(matches!(
        response.effects[0],
        Effect::AbilityCast {
            charges_left: 0,
            hit: true,
            damage: 5,
            ..
        }
    ));
    assert!(!response.available_actions.contains(&Action::CastAbility(0)));

    let err = harness.act(Action::CastAbility(0)).await.unwrap_err();
    assert!(err.is_refusal());
}

// =============================================================================
// TEST 5: Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_flee_success_is_monotonic_in_dexterity(
        roll in 1u32..=20,
        low in 1i32..=30,
        raise in 0i32..=10,
    ) {
        let config = DungeonConfig::default();
        let flees = |dexterity: i32| {
            let mut player = fighter_facing(skeleton(10, 11));
            player.attributes.dexterity = dexterity;
            let mut dice = ScriptedDice::new([roll]);
            let resolution = combat::flee(&config, &mut player, &mut dice).unwrap();
            resolution.outcome == Some(CombatOutcome::Fled)
        };
        prop_assert!(!flees(low) || flees(low + raise));
    }

    #[test]
    fn prop_attack_damage_is_never_negative(
        rolls in proptest::collection::vec(1u32..=20, 1..8),
        strength in 1i32..=20,
    ) {
        let config = DungeonConfig::default();
        let mut player = fighter_facing(skeleton(30, 12));
        player.attributes.strength = strength;
        let mut dice = ScriptedDice::new(rolls);
        let resolution = combat::attack(&config, &mut player, &mut dice).unwrap();
        match resolution.effects[0] {
            Effect::PlayerAttacked { hit, damage, .. } => {
                prop_assert!(damage >= 0);
                if !hit {
                    prop_assert_eq!(damage, 0);
                }
            }
            ref other => prop_assert!(false, "unexpected effect {:?}", other),
        }
        prop_assert!(player.hit_points.current >= 0);
        prop_assert!(player.hit_points.current <= player.hit_points.maximum);
    }
}
