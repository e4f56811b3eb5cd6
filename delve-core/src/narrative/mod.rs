//! Flavor text.
//!
//! The rules never wait on narration: the session asks for text only after
//! the player has been saved, and any failure falls back to a fixed line.

mod claude;

pub use claude::ClaudeNarrator;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Errors from narrative providers. Never shown to players.
#[derive(Debug, Error)]
pub enum NarrativeError {
    #[error("Narrative generation is disabled")]
    Disabled,

    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Empty response")]
    Empty,
}

/// What the text is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NarrativeKind {
    /// The road from town to the dungeon.
    Travel,
    /// Standing at the dungeon entrance.
    Intro,
    /// Walking on to the next room.
    Advance,
    /// What a room looks like.
    Room,
    Search,
    Camp,
    EnemyAppears,
    /// An enemy reacting to being hit.
    EnemyReaction,
}

/// Everything a provider gets to work with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrativeContext {
    pub kind: NarrativeKind,
    pub theme: String,
    /// The player's name, or the enemy's for enemy kinds.
    pub actor: String,
    pub room: u32,
}

impl NarrativeContext {
    pub fn new(kind: NarrativeKind, theme: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            kind,
            theme: theme.into(),
            actor: actor.into(),
            room: 0,
        }
    }

    pub fn with_room(mut self, room: u32) -> Self {
        self.room = room;
        self
    }

    /// Fixed text used when no provider is available or it fails.
    pub fn fallback(&self) -> String {
        let (theme, actor) = (&self.theme, &self.actor);
        match self.kind {
            NarrativeKind::Travel => format!(
                "🚶 The road to the {theme} winds through gloomy woods. {actor} walks alone, listening to every rustle."
            ),
            NarrativeKind::Intro => format!(
                "🏰 At the mouth of the {theme} the darkness stirs as if alive. The stone is cold and the air is thick."
            ),
            NarrativeKind::Advance => {
                format!("{actor} moves deeper, torchlight shivering on the walls.")
            }
            NarrativeKind::Room => {
                "Dust, claw marks on the walls and ancient cobwebs fill the room.".to_string()
            }
            NarrativeKind::Search => {
                "You probe the niches and cracks; mostly dust and a bent nail.".to_string()
            }
            NarrativeKind::Camp => format!(
                "🔥 {actor} lights a small fire and, wrapped in a cloak, listens to the hum of the depths."
            ),
            NarrativeKind::EnemyAppears => format!("{actor} steps out of the shadows."),
            NarrativeKind::EnemyReaction => format!("{actor} staggers back with a snarl."),
        }
    }

    /// System and user prompts for language-model providers.
    pub fn prompt(&self) -> (&'static str, String) {
        let system = match self.kind {
            NarrativeKind::Travel => {
                "Describe in 2-4 sentences the road of a LONE hero from town to a dungeon. Third person singular. No Markdown."
            }
            NarrativeKind::Intro => {
                "Describe in 2-3 sentences the atmosphere at the entrance of the given dungeon. No Markdown."
            }
            NarrativeKind::Advance => {
                "Describe in one sentence a lone hero moving on to the next dungeon room. No Markdown."
            }
            NarrativeKind::Room => {
                "Briefly (1-3 sentences) describe a dungeon room: details, smells, sounds. No Markdown."
            }
            NarrativeKind::Search => {
                "Write a short literary result of searching a room, 1-2 sentences. No Markdown."
            }
            NarrativeKind::Camp => {
                "Describe a short rest scene of a LONE hero in a grim dungeon (1-3 sentences). No Markdown."
            }
            NarrativeKind::EnemyAppears => {
                "Describe in one sentence a monster appearing before the hero. No Markdown."
            }
            NarrativeKind::EnemyReaction => {
                "Write a short monster reaction to a hit (1 sentence). No Markdown."
            }
        };
        let user = match self.kind {
            NarrativeKind::EnemyAppears | NarrativeKind::EnemyReaction => {
                format!("Monster: {}\nDungeon: {}", self.actor, self.theme)
            }
            NarrativeKind::Room => format!("Dungeon: {}\nRoom: {}", self.theme, self.room),
            _ => format!("Hero: {}\nDungeon: {}", self.actor, self.theme),
        };
        (system, user)
    }
}

/// Source of flavor text.
#[async_trait]
pub trait NarrativeProvider: Send + Sync {
    async fn describe(&self, context: &NarrativeContext) -> Result<String, NarrativeError>;
}

#[async_trait]
impl<T: NarrativeProvider + ?Sized> NarrativeProvider for Arc<T> {
    async fn describe(&self, context: &NarrativeContext) -> Result<String, NarrativeError> {
        (**self).describe(context).await
    }
}

/// Always returns the fixed fallback text.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticNarrator;

#[async_trait]
impl NarrativeProvider for StaticNarrator {
    async fn describe(&self, context: &NarrativeContext) -> Result<String, NarrativeError> {
        Ok(context.fallback())
    }
}

/// Ask the provider, falling back to fixed text on any error.
pub async fn narrate_or_fallback(
    provider: &dyn NarrativeProvider,
    context: &NarrativeContext,
) -> String {
    match provider.describe(context).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            warn!(kind = ?context.kind, "empty narrative, using fallback");
            context.fallback()
        }
        Err(e) => {
            warn!(kind = ?context.kind, error = %e, "narrative failed, using fallback");
            context.fallback()
        }
    }
}

/// Narrative generation settings.
#[derive(Debug, Clone)]
pub struct NarrativeConfig {
    /// The model to use (defaults to the client's model).
    pub model: Option<String>,

    /// Maximum tokens per description.
    pub max_tokens: usize,

    /// Temperature for generation.
    pub temperature: Option<f32>,

    /// When false, only fallback text is used.
    pub enabled: bool,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 200,
            temperature: Some(0.9),
            enabled: true,
        }
    }
}

impl NarrativeConfig {
    /// Defaults, with `enabled` read from `DELVE_NARRATIVE` (`0`, `off`,
    /// `false` or `no` disable it).
    pub fn from_env() -> Self {
        let enabled = std::env::var("DELVE_NARRATIVE")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "off" | "false" | "no"))
            .unwrap_or(true);
        Self::default().with_enabled(enabled)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Pick a provider: Claude when enabled and `ANTHROPIC_API_KEY` is set,
/// otherwise fixed text.
pub fn provider_from_env(config: NarrativeConfig) -> Box<dyn NarrativeProvider> {
    if !config.enabled {
        info!("narrative disabled, using static text");
        return Box::new(StaticNarrator);
    }
    match ClaudeNarrator::from_env(config) {
        Ok(narrator) => Box::new(narrator),
        Err(e) => {
            info!(error = %e, "no narrative provider, using static text");
            Box::new(StaticNarrator)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FailingNarrator;

    #[test]
    fn test_fallback_mentions_actor() {
        let ctx =
            NarrativeContext::new(NarrativeKind::EnemyReaction, "Castle of Shadows", "Zombie");
        assert_eq!(ctx.fallback(), "Zombie staggers back with a snarl.");
        let (_, user) = ctx.prompt();
        assert!(user.contains("Monster: Zombie"));
    }

    #[tokio::test]
    async fn test_failing_provider_falls_back() {
        let ctx = NarrativeContext::new(NarrativeKind::Camp, "Caverns of Silence", "Ash");
        let text = narrate_or_fallback(&FailingNarrator, &ctx).await;
        assert_eq!(text, ctx.fallback());
    }

    #[tokio::test]
    async fn test_disabled_config_gives_static_provider() {
        let provider = provider_from_env(NarrativeConfig::default().with_enabled(false));
        let ctx =
            NarrativeContext::new(NarrativeKind::Room, "Caverns of Silence", "Ash").with_room(4);
        assert_eq!(provider.describe(&ctx).await.unwrap(), ctx.fallback());
    }
}
