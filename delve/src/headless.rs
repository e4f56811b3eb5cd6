//! Line-oriented driver for the dungeon crawl.
//!
//! Designed for terminals, scripts and automated agents alike:
//! - Lines starting with `#` are commands (quit, status, rest, actions, help)
//! - Any other line is parsed as a game action (`search`, `cast 1`, ...)
//! - Output lines are tagged (`[STATUS]`, `[ERROR]`, ...) or plain narrative

use delve_core::abilities;
use delve_core::narrative::{provider_from_env, NarrativeConfig};
use delve_core::player::{Player, PlayerId};
use delve_core::{Action, CombatOutcome, DungeonSession, JsonStore, PlayerStore, Response};
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{debug, info};

/// Settings for a headless run.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    pub name: String,
    pub class: String,
    pub save_dir: PathBuf,
    pub narration: bool,
}

impl HeadlessConfig {
    pub fn quick_start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: "swordsman".to_string(),
            save_dir: PathBuf::from("saves"),
            narration: true,
        }
    }
}

/// Find a saved character by name, or create one.
async fn find_or_create(
    session: &DungeonSession<JsonStore>,
    config: &HeadlessConfig,
) -> Result<Player, Box<dyn Error>> {
    let existing = session
        .store()
        .list()
        .await?
        .into_iter()
        .find(|summary| summary.name.eq_ignore_ascii_case(&config.name));

    match existing {
        Some(summary) => {
            info!(player = %summary.id, "resuming saved character");
            Ok(session.player(summary.id).await?)
        }
        None => Ok(session.create_player(&config.name, &config.class).await?),
    }
}

fn print_status(player: &Player) {
    let state = &player.dungeon;
    println!("[STATUS]");
    println!(
        "  Character: {} ({}, level {})",
        player.name, player.class_key, player.level
    );
    println!(
        "  HP: {}/{}",
        player.hit_points.current, player.hit_points.maximum
    );
    println!("  Gold: {}  XP: {}", player.gold, player.experience);
    if state.active {
        println!(
            "  Dungeon: {}, floor {}, room {}",
            state.theme, state.floor, state.room
        );
        if let Some(enemy) = &state.enemy {
            println!("  Fighting: {} ({}/{} HP)", enemy.label(), enemy.hp, enemy.max_hp);
        }
    } else {
        println!("  In town");
    }
    let charges = abilities::charge_status(player);
    if !charges.is_empty() {
        let charges: Vec<String> = charges.iter().map(ToString::to_string).collect();
        println!("  Abilities: {}", charges.join(", "));
    }
    if !player.inventory.is_empty() {
        let items: Vec<String> = player
            .inventory
            .items
            .iter()
            .map(|(name, count)| format!("{name} x{count}"))
            .collect();
        println!("  Pack: {}", items.join(", "));
    }
}

/// Dungeons offered from town.
const DUNGEON_CHOICES: usize = 3;

async fn print_dungeons(session: &DungeonSession<JsonStore>) {
    let choices = session.dungeon_choices(DUNGEON_CHOICES).await;
    println!("[DUNGEONS] {}", choices.join(" | "));
}

fn in_town(actions: &[Action]) -> bool {
    matches!(actions.first(), Some(Action::Enter { .. }))
}

fn print_actions(actions: &[Action]) {
    let tokens: Vec<String> = actions.iter().map(ToString::to_string).collect();
    println!("[ACTIONS] {}", tokens.join(" | "));
}

fn print_help() {
    println!("[HELP]");
    println!("  #quit     - Exit the game");
    println!("  #status   - Show your character");
    println!("  #rest     - Rest at the inn (town only)");
    println!("  #actions  - List what you can do now");
    println!("  #help     - Show this help");
    println!("  Actions: enter <theme>, search, advance, camp, escape,");
    println!("           escape_confirm, escape_cancel, attack, defend, flee, cast <n>");
}

fn print_response(response: &Response) {
    for line in &response.lines {
        println!("{line}");
    }
    match response.outcome() {
        Some(CombatOutcome::Victory) => println!("[VICTORY]"),
        Some(CombatOutcome::Defeat) => println!("[DEFEAT] You wake up in town."),
        Some(CombatOutcome::Fled) => println!("[FLED]"),
        None => {}
    }
    println!();
    print_actions(&response.available_actions);
}

/// Run the game loop on stdin/stdout until `#quit` or end of input.
pub async fn run_headless(config: HeadlessConfig) -> Result<(), Box<dyn Error>> {
    let mut narrative = NarrativeConfig::from_env();
    narrative.enabled &= config.narration;
    let session = DungeonSession::new(JsonStore::new(&config.save_dir))
        .with_narrator(provider_from_env(narrative));
    let player = find_or_create(&session, &config).await?;
    let id: PlayerId = player.id;

    println!("=== Delve ===");
    print_status(&player);
    if !player.dungeon.active {
        print_dungeons(&session).await;
    }
    println!();
    print_help();
    println!();
    print_actions(&session.available_actions(&player));

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('#') {
            match command.trim() {
                "quit" | "exit" => {
                    println!("Goodbye!");
                    break;
                }
                "status" => match session.player(id).await {
                    Ok(player) => {
                        print_status(&player);
                        if !player.dungeon.active {
                            print_dungeons(&session).await;
                        }
                    }
                    Err(e) => println!("[ERROR] {e}"),
                },
                "rest" => match session.rest(id).await {
                    Ok(response) => print_response(&response),
                    Err(e) => println!("[ERROR] {e}"),
                },
                "actions" => match session.player(id).await {
                    Ok(player) => print_actions(&session.available_actions(&player)),
                    Err(e) => println!("[ERROR] {e}"),
                },
                "help" => print_help(),
                _ => println!("[ERROR] Unknown command. Type #help for help."),
            }
            stdout.flush().ok();
            continue;
        }

        let action: Action = match line.parse() {
            Ok(action) => action,
            Err(e) => {
                println!("[ERROR] {e}");
                continue;
            }
        };
        debug!(%action, "player input");

        print!("[PROCESSING]");
        stdout.flush().ok();
        let result = session.handle(id, action).await;
        print!("\r            \r");
        stdout.flush().ok();

        match result {
            Ok(response) => {
                print_response(&response);
                if in_town(&response.available_actions) {
                    print_dungeons(&session).await;
                }
            }
            Err(e) if e.is_refusal() => println!("[REFUSED] {e}"),
            Err(e) => println!("[ERROR] {e}"),
        }
        stdout.flush().ok();
    }

    Ok(())
}
