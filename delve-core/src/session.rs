//! DungeonSession - the primary public API for playing.
//!
//! Each call takes the player's lock, loads the player, runs the rules,
//! saves, and only then asks the narrative provider for flavor text.

use crate::abilities;
use crate::combat::{CombatOutcome, CombatPhase};
use crate::config::DungeonConfig;
use crate::dice::Roller;
use crate::encounter;
use crate::monsters::Enemy;
use crate::narrative::{
    narrate_or_fallback, NarrativeContext, NarrativeKind, NarrativeProvider, StaticNarrator,
};
use crate::player::{Player, PlayerId};
use crate::rules::{Action, ActionError, Effect, Resolution, RulesEngine};
use crate::store::{KeyedLocks, PlayerStore, StoreError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Errors from DungeonSession operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Action(#[from] ActionError),
}

impl SessionError {
    /// Whether this is a refused action rather than a failure.
    pub fn is_refusal(&self) -> bool {
        matches!(self, SessionError::Action(_))
    }
}

/// Told when a player comes back from a dungeon so the shop can restock.
pub trait ShopInvalidator: Send + Sync {
    fn mark_shop_dirty(&self, player: PlayerId);
}

/// Shop hook that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoShop;

impl ShopInvalidator for NoShop {
    fn mark_shop_dirty(&self, _player: PlayerId) {}
}

impl<T: ShopInvalidator + ?Sized> ShopInvalidator for Arc<T> {
    fn mark_shop_dirty(&self, player: PlayerId) {
        (**self).mark_shop_dirty(player)
    }
}

/// Configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Rules constants.
    pub dungeon: DungeonConfig,

    /// Whether to request flavor text at all.
    pub narration: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dungeon: DungeonConfig::default(),
            narration: true,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rules constants.
    pub fn with_dungeon(mut self, dungeon: DungeonConfig) -> Self {
        self.dungeon = dungeon;
        self
    }

    /// Turn flavor text on or off.
    pub fn with_narration(mut self, narration: bool) -> Self {
        self.narration = narration;
        self
    }
}

/// Response from a player action.
#[derive(Debug, Clone)]
pub struct Response {
    /// Text to show, narration interleaved with the effect log.
    pub lines: Vec<String>,

    /// Effects that were applied.
    pub effects: Vec<Effect>,

    /// What the player can do next.
    pub available_actions: Vec<Action>,

    /// Combat phase after the action; `Resolved` when a fight just ended.
    pub phase: CombatPhase,
}

impl Response {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn outcome(&self) -> Option<CombatOutcome> {
        match self.phase {
            CombatPhase::Resolved(outcome) => Some(outcome),
            _ => None,
        }
    }
}

/// A dungeon-crawl session over a player store.
pub struct DungeonSession<S, R = StdRng> {
    store: S,
    rules: RulesEngine,
    narrator: Box<dyn NarrativeProvider>,
    shop: Box<dyn ShopInvalidator>,
    locks: KeyedLocks<PlayerId>,
    roller: Mutex<R>,
    narration: bool,
}

impl<S: PlayerStore> DungeonSession<S, StdRng> {
    /// Session with an entropy-seeded roller.
    pub fn new(store: S) -> Self {
        Self::with_roller(store, StdRng::from_entropy())
    }
}

impl<S: PlayerStore, R: Roller + Send> DungeonSession<S, R> {
    pub fn with_roller(store: S, roller: R) -> Self {
        Self {
            store,
            rules: RulesEngine::default(),
            narrator: Box::new(StaticNarrator),
            shop: Box::new(NoShop),
            locks: KeyedLocks::new(),
            roller: Mutex::new(roller),
            narration: true,
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.rules = RulesEngine::new(config.dungeon);
        self.narration = config.narration;
        self
    }

    pub fn with_narrator(mut self, narrator: Box<dyn NarrativeProvider>) -> Self {
        self.narrator = narrator;
        self
    }

    pub fn with_shop(mut self, shop: Box<dyn ShopInvalidator>) -> Self {
        self.shop = shop;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn rules(&self) -> &RulesEngine {
        &self.rules
    }

    /// The shared roller, for tests that script dice between actions.
    pub fn roller(&self) -> &Mutex<R> {
        &self.roller
    }

    /// Create and save a new character.
    pub async fn create_player(
        &self,
        name: impl Into<String>,
        class_key: &str,
    ) -> Result<Player, SessionError> {
        let player = Player::for_class(name, class_key);
        self.store.save(&player).await?;
        info!(player = %player.id, name = %player.name, class = class_key, "player created");
        Ok(player)
    }

    /// Load a player, resetting a corrupted dungeon state.
    pub async fn player(&self, id: PlayerId) -> Result<Player, SessionError> {
        let _guard = self.locks.lock(&id).await;
        self.load_checked(id).await
    }

    async fn load_checked(&self, id: PlayerId) -> Result<Player, SessionError> {
        let mut player = self.store.load(id).await?;
        if player.dungeon.repair(self.rules.config()) {
            self.store.save(&player).await?;
        }
        Ok(player)
    }

    /// Up to `n` dungeon themes in random order, for the picker in town.
    pub async fn dungeon_choices(&self, n: usize) -> Vec<&'static str> {
        let mut roller = self.roller.lock().await;
        encounter::theme_choices(n, &mut *roller)
    }

    /// Actions the player could take right now.
    pub fn available_actions(&self, player: &Player) -> Vec<Action> {
        self.rules.available_actions(player)
    }

    /// Process one player action.
    pub async fn handle(&self, id: PlayerId, action: Action) -> Result<Response, SessionError> {
        let _guard = self.locks.lock(&id).await;
        let mut player = self.load_checked(id).await?;

        let theme = player.dungeon.theme.clone();
        let enemy = player.dungeon.enemy.clone();

        let resolution = {
            let mut roller = self.roller.lock().await;
            self.rules.resolve(&mut player, &action, &mut *roller)?
        };

        self.store.save(&player).await?;
        if resolution.left_dungeon() {
            self.shop.mark_shop_dirty(id);
        }

        let lines = self
            .render(&player, &action, &resolution, theme, enemy.as_ref())
            .await;
        let phase = match resolution.outcome {
            Some(outcome) => CombatPhase::Resolved(outcome),
            None => player.dungeon.phase(),
        };
        Ok(Response {
            lines,
            effects: resolution.effects,
            available_actions: self.rules.available_actions(&player),
            phase,
        })
    }

    /// Rest in town: full hit points and ability charges.
    pub async fn rest(&self, id: PlayerId) -> Result<Response, SessionError> {
        let _guard = self.locks.lock(&id).await;
        let mut player = self.load_checked(id).await?;
        if player.dungeon.active {
            warn!(player = %id, "rest refused inside dungeon");
            return Err(ActionError::invalid("You can only rest in town.").into());
        }

        let healed = player.hit_points.heal(player.hit_points.missing());
        let charges = abilities::rest_restore(&mut player);
        self.store.save(&player).await?;

        let effects = vec![
            Effect::Rested {
                healed,
                hp: player.hit_points.current,
                max_hp: player.hit_points.maximum,
            },
            Effect::ChargesRestored { charges },
        ];
        Ok(Response {
            lines: effects.iter().map(Effect::describe).collect(),
            effects,
            available_actions: self.rules.available_actions(&player),
            phase: CombatPhase::Idle,
        })
    }

    async fn narrate(&self, context: NarrativeContext) -> String {
        narrate_or_fallback(self.narrator.as_ref(), &context).await
    }

    /// Effect log with narration woven in.
    async fn render(
        &self,
        player: &Player,
        action: &Action,
        resolution: &Resolution,
        mut theme: String,
        enemy: Option<&Enemy>,
    ) -> Vec<String> {
        let mut lines = Vec::new();
        for effect in &resolution.effects {
            if !self.narration {
                lines.push(effect.describe());
                continue;
            }
            match effect {
                Effect::DungeonEntered { theme: entered } => {
                    theme = entered.clone();
                    for kind in [NarrativeKind::Travel, NarrativeKind::Intro] {
                        lines.push(
                            self.narrate(NarrativeContext::new(kind, &theme, &player.name))
                                .await,
                        );
                    }
                    lines.push(effect.describe());
                }
                Effect::RoomEntered { room, .. } => {
                    lines.push(effect.describe());
                    if *action == Action::Advance {
                        lines.push(
                            self.narrate(NarrativeContext::new(
                                NarrativeKind::Advance,
                                &theme,
                                &player.name,
                            ))
                            .await,
                        );
                    }
                    lines.push(
                        self.narrate(
                            NarrativeContext::new(NarrativeKind::Room, &theme, &player.name)
                                .with_room(*room),
                        )
                        .await,
                    );
                }
                Effect::EnemyAppeared { enemy: label, .. } => {
                    lines.push(
                        self.narrate(NarrativeContext::new(
                            NarrativeKind::EnemyAppears,
                            &theme,
                            label,
                        ))
                        .await,
                    );
                    lines.push(effect.describe());
                }
                Effect::PlayerAttacked {
                    hit: true,
                    enemy_hp,
                    ..
                }
                | Effect::AbilityCast {
                    hit: true,
                    enemy_hp,
                    ..
                } if *enemy_hp > 0 => {
                    lines.push(effect.describe());
                    if let Some(enemy) = enemy {
                        lines.push(
                            self.narrate(NarrativeContext::new(
                                NarrativeKind::EnemyReaction,
                                &theme,
                                &enemy.name,
                            ))
                            .await,
                        );
                    }
                }
                Effect::SearchedNothing
                | Effect::SearchFoundGold { .. }
                | Effect::SearchFoundItem { .. } => {
                    lines.push(
                        self.narrate(NarrativeContext::new(
                            NarrativeKind::Search,
                            &theme,
                            &player.name,
                        ))
                        .await,
                    );
                    lines.push(effect.describe());
                }
                Effect::Camped { .. } => {
                    lines.push(
                        self.narrate(NarrativeContext::new(
                            NarrativeKind::Camp,
                            &theme,
                            &player.name,
                        ))
                        .await,
                    );
                    lines.push(effect.describe());
                }
                _ => lines.push(effect.describe()),
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{RecordingShop, ScriptedDice};

    #[tokio::test]
    async fn test_refused_action_writes_nothing() {
        let session = DungeonSession::with_roller(MemoryStore::new(), ScriptedDice::default());
        let player = session.create_player("Ash", "thief").await.unwrap();

        let err = session.handle(player.id, Action::Attack).await.unwrap_err();
        assert!(err.is_refusal());
        assert_eq!(session.player(player.id).await.unwrap(), player);
    }

    #[tokio::test]
    async fn test_unknown_player_is_store_error() {
        let session = DungeonSession::new(MemoryStore::new());
        let err = session
            .handle(PlayerId::new(), Action::Search)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Store(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_corrupted_state_is_repaired_on_load() {
        let session = DungeonSession::new(MemoryStore::new());
        let mut player = session.create_player("Ash", "thief").await.unwrap();
        player.dungeon.active = true;
        player.dungeon.in_combat = true;
        session.store().save(&player).await.unwrap();

        let loaded = session.player(player.id).await.unwrap();
        assert!(!loaded.dungeon.active);
        assert!(!loaded.dungeon.in_combat);
    }

    #[tokio::test]
    async fn test_rest_only_in_town() {
        let shop = Arc::new(RecordingShop::default());
        let session = DungeonSession::with_roller(MemoryStore::new(), ScriptedDice::default())
            .with_shop(Box::new(shop.clone()));
        let mut player = session.create_player("Ash", "thief").await.unwrap();
        player.hit_points.current = 1;
        player.ability_charges.clear();
        session.store().save(&player).await.unwrap();

        let response = session.rest(player.id).await.unwrap();
        assert_eq!(response.phase, CombatPhase::Idle);
        let rested = session.player(player.id).await.unwrap();
        assert_eq!(rested.hit_points.current, rested.hit_points.maximum);
        assert_eq!(rested.ability_charges["Shadow Strike"], 3);
        assert_eq!(shop.count(player.id), 0);
    }

    #[tokio::test]
    async fn test_dungeon_choices_use_session_dice() {
        let session = DungeonSession::with_roller(MemoryStore::new(), ScriptedDice::new([1, 1]));
        assert_eq!(
            session.dungeon_choices(3).await,
            vec!["Caverns of Silence", "Catacombs of the Ancestors", "Castle of Shadows"]
        );
        assert_eq!(session.roller().lock().await.remaining(), 0);
    }
}
