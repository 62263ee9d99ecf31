//! Headless driver: reads console commands from stdin, ticks the session at
//! a fixed rate, and logs what a renderer would draw.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use sprout_quest::config::{EngineConfig, StoreBackend};
use sprout_quest::console::{self, Command};
use sprout_quest::feedback::SoundCue;
use sprout_quest::level::LevelRegistry;
use sprout_quest::persistence::{JsonFileStore, MemoryStore, Persistence, PlayerState, PlayerStore, SqliteStore};
use sprout_quest::quest::QuestRegistry;
use sprout_quest::render::{Renderer, TraceRenderer, placements};
use sprout_quest::scenario::{FileScenarioProvider, Scenario, ScenarioProvider, UnconfiguredProvider, generate_or_fallback};
use sprout_quest::session::{GameSession, ScenarioTicket, SessionHooks};

// ============================================================================
// Host plumbing
// ============================================================================

/// Session callbacks, forwarded to the driver loop
#[derive(Debug)]
enum HostEvent {
    UpdateUser(u32),
    Exit,
    NextLevel,
    Save(PlayerState),
    Sound(SoundCue),
    ScenarioRequested(ScenarioTicket),
}

#[derive(Clone)]
struct ChannelHooks {
    tx: mpsc::UnboundedSender<HostEvent>,
}

impl ChannelHooks {
    fn send(&self, event: HostEvent) {
        if self.tx.send(event).is_err() {
            warn!("Driver loop is gone; dropping session event");
        }
    }
}

impl SessionHooks for ChannelHooks {
    fn on_update_user(&mut self, coins_earned: u32) {
        self.send(HostEvent::UpdateUser(coins_earned));
    }

    fn on_exit(&mut self) {
        self.send(HostEvent::Exit);
    }

    fn on_next_level(&mut self) {
        self.send(HostEvent::NextLevel);
    }

    fn on_player_state_changed(&mut self, state: &PlayerState) {
        self.send(HostEvent::Save(state.clone()));
    }

    fn on_sound(&mut self, cue: SoundCue) {
        self.send(HostEvent::Sound(cue));
    }

    fn on_scenario_requested(&mut self, ticket: ScenarioTicket) {
        self.send(HostEvent::ScenarioRequested(ticket));
    }
}

type Session = GameSession<ChannelHooks>;

// ============================================================================
// Startup
// ============================================================================

fn load_levels(dir: &Path) -> LevelRegistry {
    let mut registry = LevelRegistry::new();
    match registry.load_from_directory(dir) {
        Ok(count) if count > 0 => return registry,
        Ok(_) => info!("No level files in {:?}, using built-in levels", dir),
        Err(e) => error!("Failed to load levels from {:?}: {}; using built-in levels", dir, e),
    }
    LevelRegistry::builtin().unwrap_or_else(|e| {
        error!("Built-in levels are invalid: {}", e);
        LevelRegistry::new()
    })
}

fn load_quests(dir: &Path) -> QuestRegistry {
    let mut registry = QuestRegistry::new();
    match registry.load_from_directory(dir) {
        Ok(count) if count > 0 => return registry,
        Ok(_) => info!("No quest files in {:?}, using built-in quests", dir),
        Err(e) => error!("Failed to load quests from {:?}: {}; using built-in quests", dir, e),
    }
    QuestRegistry::builtin().unwrap_or_else(|e| {
        error!("Built-in quests are invalid: {}", e);
        QuestRegistry::new()
    })
}

async fn open_store(config: &EngineConfig) -> Arc<dyn PlayerStore> {
    match config.store.backend {
        StoreBackend::Json => Arc::new(JsonFileStore::new(config.store.path.clone())),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Sqlite => match SqliteStore::new(&config.store.database_url).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!("Failed to open {}: {}; progress will not be kept", config.store.database_url, e);
                Arc::new(MemoryStore::new())
            }
        },
    }
}

fn open_session(
    levels: &LevelRegistry,
    quests: &Arc<QuestRegistry>,
    config: &EngineConfig,
    level_id: u32,
    player: PlayerState,
    hooks: ChannelHooks,
) -> Option<Session> {
    let level = levels.get(level_id)?;
    Some(GameSession::new(
        level,
        quests.clone(),
        config.locomotion(),
        config.timing,
        player,
        hooks,
    ))
}

// ============================================================================
// Main loop
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sprout_quest=info")))
        .init();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let levels = load_levels(&config.levels_dir());
    let quests = Arc::new(load_quests(&config.quests_dir()));
    info!("Ready with {} levels and {} quests", levels.len(), quests.len());

    let persistence = Persistence::new(open_store(&config).await);
    let player = persistence.load().await;
    let (saves, save_writer) = persistence.spawn_writer();

    let provider: Arc<dyn ScenarioProvider> = match &config.scenario.file {
        Some(path) => Arc::new(FileScenarioProvider::new(path.clone())),
        None => Arc::new(UnconfiguredProvider),
    };

    let (host_tx, mut host_rx) = mpsc::unbounded_channel::<HostEvent>();
    let (scenario_tx, mut scenario_rx) = mpsc::unbounded_channel::<(ScenarioTicket, Scenario)>();
    let hooks = ChannelHooks { tx: host_tx };

    let mut level_id = config.level;
    let Some(mut session) = open_session(&levels, &quests, &config, level_id, player, hooks.clone()) else {
        error!("Level {} does not exist", level_id);
        std::process::exit(1);
    };

    let clock = Instant::now();
    let now_ms = || clock.elapsed().as_millis() as u64;
    let period = Duration::from_millis(1000 / u64::from(config.tick_hz.max(1)));
    let dt = period.as_secs_f32();
    let mut interval = tokio::time::interval(period);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut renderer = TraceRenderer::new();
    let tile_size = config.free_roam.tile_size;

    println!("{}", console::HELP);

    'driver: loop {
        tokio::select! {
            _ = interval.tick() => {
                session.tick(now_ms(), dt);
                let snapshot = session.snapshot();
                renderer.render(&snapshot, &placements(&snapshot, tile_size));
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break 'driver,
                    Err(e) => {
                        error!("Failed to read stdin: {}", e);
                        break 'driver;
                    }
                };
                match console::parse_command(&line) {
                    Command::Inputs(inputs) => {
                        for input in inputs {
                            if let Err(rejection) = session.handle(input, now_ms()) {
                                let notice = session.quest().and_then(|engine| rejection.notice(engine.quest()));
                                println!("{}", notice.unwrap_or_else(|| rejection.to_string()));
                            }
                        }
                    }
                    Command::Status => match serde_json::to_string_pretty(&session.snapshot()) {
                        Ok(json) => println!("{}", json),
                        Err(e) => error!("Failed to encode snapshot: {}", e),
                    },
                    Command::Save => {
                        saves.queue(session.player().clone());
                        if !saves.flush().await {
                            println!("Progress could not be saved");
                        }
                    }
                    Command::Help => println!("{}", console::HELP),
                    Command::Quit => break 'driver,
                    Command::Unknown(text) if text.is_empty() => {}
                    Command::Unknown(text) => println!("Unknown command: {} (try help)", text),
                }
            }
            Some((ticket, scenario)) = scenario_rx.recv() => {
                session.scenario_ready(ticket, scenario, now_ms());
            }
        }

        while let Ok(event) = host_rx.try_recv() {
            match event {
                HostEvent::UpdateUser(coins) => info!("Player earned {} coins", coins),
                HostEvent::Sound(cue) => debug!("Sound: {}", cue.as_str()),
                HostEvent::Save(state) => saves.queue(state),
                HostEvent::ScenarioRequested(ticket) => {
                    let provider = provider.clone();
                    let tx = scenario_tx.clone();
                    tokio::spawn(async move {
                        let scenario = generate_or_fallback(provider.as_ref()).await;
                        // Receiver only closes on shutdown
                        let _ = tx.send((ticket, scenario));
                    });
                }
                HostEvent::NextLevel => {
                    let next = level_id + 1;
                    let player = session.player().clone();
                    match open_session(&levels, &quests, &config, next, player, hooks.clone()) {
                        Some(next_session) => {
                            level_id = next;
                            session = next_session;
                        }
                        None => println!("That was the last level!"),
                    }
                }
                HostEvent::Exit => break 'driver,
            }
        }
    }

    saves.queue(session.player().clone());
    saves.flush().await;
    drop(saves);
    if let Err(e) = save_writer.await {
        error!("Save writer failed: {}", e);
    }
    info!("Goodbye");
}
