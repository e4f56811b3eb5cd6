//! Testing utilities for the dungeon crawl.
//!
//! This module provides tools for integration testing:
//! - `ScriptedDice` for exact, replayable rolls
//! - `MockNarrator`, `FailingNarrator` and `RecordingShop` collaborators
//! - `TestHarness` for scripted game scenarios
//! - Assertion helpers for verifying player state

use crate::combat::CombatPhase;
use crate::config::DungeonConfig;
use crate::dice::Roller;
use crate::dungeon::DungeonState;
use crate::narrative::{NarrativeContext, NarrativeError, NarrativeKind, NarrativeProvider};
use crate::player::{Player, PlayerId};
use crate::rules::{Action, ActionError};
use crate::session::{DungeonSession, Response, SessionConfig, SessionError, ShopInvalidator};
use crate::store::{MemoryStore, PlayerStore};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Dice that return scripted values in order.
///
/// Each value is clamped into the requested die's range. Once the script
/// runs out, rolls come from a fixed-seed generator so tests stay
/// deterministic.
#[derive(Debug, Clone)]
pub struct ScriptedDice {
    script: VecDeque<u32>,
    fallback: StdRng,
    unscripted: usize,
}

impl ScriptedDice {
    pub fn new(rolls: impl IntoIterator<Item = u32>) -> Self {
        Self {
            script: rolls.into_iter().collect(),
            fallback: StdRng::seed_from_u64(7),
            unscripted: 0,
        }
    }

    /// Queue more rolls after the current script.
    pub fn push(&mut self, rolls: impl IntoIterator<Item = u32>) {
        self.script.extend(rolls);
    }

    /// Scripted rolls not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    /// How many rolls fell back to the seeded generator.
    pub fn unscripted(&self) -> usize {
        self.unscripted
    }
}

impl Default for ScriptedDice {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Roller for ScriptedDice {
    fn die(&mut self, sides: u32) -> u32 {
        let sides = sides.max(1);
        match self.script.pop_front() {
            Some(value) => value.clamp(1, sides),
            None => {
                self.unscripted += 1;
                self.fallback.die(sides)
            }
        }
    }
}

/// Narrator returning canned text per kind and recording every request.
#[derive(Debug, Default)]
pub struct MockNarrator {
    texts: HashMap<NarrativeKind, String>,
    requests: Mutex<Vec<NarrativeContext>>,
}

impl MockNarrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to `kind` with `text` instead of the fallback.
    pub fn with_text(mut self, kind: NarrativeKind, text: impl Into<String>) -> Self {
        self.texts.insert(kind, text.into());
        self
    }

    pub fn requests(&self) -> Vec<NarrativeContext> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn kinds(&self) -> Vec<NarrativeKind> {
        self.requests().into_iter().map(|c| c.kind).collect()
    }
}

#[async_trait]
impl NarrativeProvider for MockNarrator {
    async fn describe(&self, context: &NarrativeContext) -> Result<String, NarrativeError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(context.clone());
        }
        Ok(self
            .texts
            .get(&context.kind)
            .cloned()
            .unwrap_or_else(|| format!("[{:?}]", context.kind)))
    }
}

/// Narrator that always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingNarrator;

#[async_trait]
impl NarrativeProvider for FailingNarrator {
    async fn describe(&self, _context: &NarrativeContext) -> Result<String, NarrativeError> {
        Err(NarrativeError::Network("connection refused".to_string()))
    }
}

/// Shop hook that counts invalidations per player.
#[derive(Debug, Default)]
pub struct RecordingShop {
    calls: Mutex<Vec<PlayerId>>,
}

impl RecordingShop {
    pub fn count(&self, player: PlayerId) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.iter().filter(|&&id| id == player).count())
            .unwrap_or(0)
    }
}

impl ShopInvalidator for RecordingShop {
    fn mark_shop_dirty(&self, player: PlayerId) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(player);
        }
    }
}

/// Test harness for scripted dungeon runs.
///
/// Wraps a session over a memory store with scripted dice, a mock narrator
/// and a recording shop, plus one player to act as.
pub struct TestHarness {
    pub session: DungeonSession<MemoryStore, ScriptedDice>,
    pub narrator: Arc<MockNarrator>,
    pub shop: Arc<RecordingShop>,
    pub player_id: PlayerId,
}

impl TestHarness {
    /// Harness with default rules around the given player.
    pub async fn new(player: Player) -> Result<Self, SessionError> {
        Self::with_config(player, DungeonConfig::default()).await
    }

    pub async fn with_config(player: Player, config: DungeonConfig) -> Result<Self, SessionError> {
        let narrator = Arc::new(MockNarrator::new());
        let shop = Arc::new(RecordingShop::default());
        let session = DungeonSession::with_roller(MemoryStore::new(), ScriptedDice::default())
            .with_config(SessionConfig::new().with_dungeon(config))
            .with_narrator(Box::new(narrator.clone()))
            .with_shop(Box::new(shop.clone()));

        let player_id = player.id;
        session.store().save(&player).await?;

        Ok(Self {
            session,
            narrator,
            shop,
            player_id,
        })
    }

    /// Queue dice rolls for the next actions.
    pub async fn script(&self, rolls: impl IntoIterator<Item = u32>) {
        self.session.roller().lock().await.push(rolls);
    }

    /// Scripted rolls still unused.
    pub async fn remaining_rolls(&self) -> usize {
        self.session.roller().lock().await.remaining()
    }

    pub async fn act(&self, action: Action) -> Result<Response, SessionError> {
        self.session.handle(self.player_id, action).await
    }

    /// Parse and run a command token. Unparsable input is an invalid action.
    pub async fn command(&self, input: &str) -> Result<Response, SessionError> {
        let action = input
            .parse::<Action>()
            .map_err(|e| ActionError::invalid(e.to_string()))?;
        self.act(action).await
    }

    pub async fn player(&self) -> Result<Player, SessionError> {
        self.session.player(self.player_id).await
    }

    /// Overwrite the stored player, e.g. to force a state.
    pub async fn update(&self, f: impl FnOnce(&mut Player)) -> Result<(), SessionError> {
        let mut player = self.player().await?;
        f(&mut player);
        self.session.store().save(&player).await?;
        Ok(())
    }
}

/// A player standing in `room` of floor 1 of `theme`, out of combat.
pub fn player_in_room(mut player: Player, theme: &str, room: u32) -> Player {
    player.dungeon = DungeonState::new(theme);
    player.dungeon.room = room;
    player
}

/// Assert player HP is at expected values.
#[track_caller]
pub fn assert_hp(player: &Player, current: i32, max: i32) {
    let (actual_current, actual_max) = (player.hit_points.current, player.hit_points.maximum);
    assert_eq!(
        (actual_current, actual_max),
        (current, max),
        "Expected HP {current}/{max}, got {actual_current}/{actual_max}"
    );
}

/// Assert player is in combat.
#[track_caller]
pub fn assert_in_combat(player: &Player) {
    assert!(player.dungeon.in_combat, "Expected to be in combat");
    assert!(player.dungeon.enemy.is_some(), "Combat without an enemy");
}

/// Assert player is NOT in combat.
#[track_caller]
pub fn assert_not_in_combat(player: &Player) {
    assert!(!player.dungeon.in_combat, "Expected to NOT be in combat");
    assert!(player.dungeon.enemy.is_none(), "Enemy left over after combat");
}

/// Assert the player is back in town with a clean dungeon state.
#[track_caller]
pub fn assert_in_town(player: &Player) {
    assert_eq!(
        player.dungeon,
        DungeonState::default(),
        "Expected a reset dungeon state"
    );
}

/// Assert the player carries nothing.
#[track_caller]
pub fn assert_inventory_empty(player: &Player) {
    assert!(
        player.inventory.is_empty(),
        "Expected an empty inventory, got {:?}",
        player.inventory.items
    );
}

/// Assert a response ended in the given phase.
#[track_caller]
pub fn assert_phase(response: &Response, phase: CombatPhase) {
    assert_eq!(response.phase, phase, "Unexpected phase after action");
}
