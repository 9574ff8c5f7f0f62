use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use std::rc::Rc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use itertools::Itertools;
use log::{debug, info};

use memory_match::destroyable::Destroyable;
use memory_match::events::{attach_handler, Channel, EventHandler};
use memory_match::game::{default_data_dir, GameEngine, JsonFileStorage, ProgressStore, Settings};
use memory_match::helpers::{format_time, Capitalize};
use memory_match::model::{
    Card, Difficulty, GameEngineCommand, GameEngineEvent, GameSession, GameSummary, Phase,
    PowerUpKind, SettingsChange,
};

const FACES: [&str; 24] = [
    "🐶", "🐱", "🦊", "🐻", "🐼", "🐨", "🐯", "🦁", "🐮", "🐷", "🐸", "🐵", "🐔", "🐧", "🐦",
    "🦄", "🐝", "🦋", "🐢", "🐙", "🦀", "🐬", "🐳", "🦉",
];

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const MAX_WAIT: Duration = Duration::from_secs(60);

fn face_glyph(card: &Card) -> String {
    usize::from(card.face_value.0)
        .checked_sub(1)
        .and_then(|index| FACES.get(index))
        .map(|glyph| glyph.to_string())
        .unwrap_or_else(|| card.face_value.to_string())
}

/// Prints engine notifications as they arrive.
struct TerminalView {
    debug_mode: bool,
}

impl TerminalView {
    fn print_summary(&self, summary: &GameSummary) {
        let stars = "★".repeat(summary.stars as usize) + &"☆".repeat(3 - summary.stars as usize);
        println!();
        println!("🎉 You won! {}", stars);
        println!(
            "   score {} / {}  |  {} moves  |  {}",
            summary.record.score,
            summary.max_possible_score,
            summary.record.moves,
            format_time(summary.record.elapsed_seconds)
        );
        if summary.new_best_moves {
            println!("   New best for {}!", summary.record.difficulty.to_string().capitalize());
        }
        if let Some(rank) = summary.leaderboard_rank {
            println!("   Leaderboard position #{}", rank + 1);
        }
    }
}

impl EventHandler<GameEngineEvent> for TerminalView {
    fn handle_event(&mut self, event: &GameEngineEvent) {
        match event {
            GameEngineEvent::AchievementUnlocked(id) => {
                println!("{} Achievement unlocked: {} {}", id.icon(), id.title(), id.description());
            }
            GameEngineEvent::GameWon(summary) => self.print_summary(summary),
            GameEngineEvent::PowerUpUsed {
                kind,
                uses_remaining,
            } => println!("✨ {} ({} left)", kind.name(), uses_remaining),
            GameEngineEvent::PhaseChanged(Phase::Paused) => println!("⏸  Paused"),
            GameEngineEvent::PersistenceFailed(reason) => {
                println!("⚠  Progress was not saved: {}", reason)
            }
            GameEngineEvent::SettingsChanged(settings) if self.debug_mode => {
                println!("settings: {:?}", settings)
            }
            _ => (),
        }
    }
}

/// Stand-in for an audio backend.
struct SoundLog;

impl EventHandler<GameEngineEvent> for SoundLog {
    fn handle_event(&mut self, event: &GameEngineEvent) {
        if let GameEngineEvent::Sound(sound) = event {
            debug!(target: "sound", "♪ {} ({} Hz)", sound.name(), sound.frequency_hz());
        }
    }
}

fn render_board(session: &GameSession, debug_mode: bool) {
    println!();
    println!(
        "{}  |  moves {}  |  {}  |  score {}  |  pairs {}/{}{}",
        session.difficulty.to_string().capitalize(),
        session.moves,
        format_time(session.elapsed_seconds),
        session.score,
        session.matched_pair_count,
        session.pairs,
        match session.phase {
            Phase::Paused => "  |  PAUSED",
            Phase::Won => "  |  WON",
            _ => "",
        }
    );
    let columns = session.grid_columns.max(1) as usize;
    for row in &session.cards.iter().chunks(columns) {
        let line = row
            .map(|card| {
                let cell = if session.phase == Phase::Paused && !card.matched {
                    " ?? ".to_string()
                } else if card.is_face_up() || debug_mode {
                    format!(" {} ", face_glyph(card))
                } else {
                    format!("[{:>2}]", card.id)
                };
                let marker = if card.shaking {
                    "!"
                } else if card.hinted {
                    "*"
                } else if card.matched {
                    "✓"
                } else {
                    " "
                };
                format!("{}{}", cell, marker)
            })
            .join(" ");
        println!("  {}", line);
    }
}

fn print_stats(progress: &ProgressStore) {
    println!();
    println!("Best moves:");
    for difficulty in Difficulty::all() {
        let stats = progress.stats(difficulty);
        println!(
            "  {:<7} {:>5}   ({} won, {} played)",
            difficulty.to_string().capitalize(),
            progress
                .best_moves(difficulty)
                .map(|moves| moves.to_string())
                .unwrap_or_else(|| "-".to_string()),
            stats.games_won,
            format_time(u32::try_from(stats.total_seconds_played).unwrap_or(u32::MAX))
        );
    }

    println!("High scores:");
    if progress.high_scores().is_empty() {
        println!("  none yet");
    }
    for (rank, record) in progress.high_scores().iter().enumerate() {
        let when: DateTime<Local> = record.timestamp.into();
        println!(
            "  {:>2}. {:>6}  {:<6} {:>3} moves {:>6}  {}",
            rank + 1,
            record.score,
            record.difficulty.to_string(),
            record.moves,
            format_time(record.elapsed_seconds),
            when.format("%Y-%m-%d %H:%M")
        );
    }

    println!("Achievements:");
    for achievement in progress.achievements() {
        let id = achievement.id;
        let status = match achievement.unlocked_at {
            Some(at) => DateTime::<Local>::from(at).format("%Y-%m-%d").to_string(),
            None if achievement.unlocked => "unlocked".to_string(),
            None => "locked".to_string(),
        };
        println!("  {} {:<24} {}", id.icon(), id.title(), status);
    }

    println!(
        "Power-ups: {}",
        progress
            .power_ups()
            .iter()
            .map(|power_up| format!("{} x{}", power_up.kind.name(), power_up.uses_remaining))
            .join(", ")
    );
}

fn print_help() {
    println!("Commands:");
    println!("  n [easy|medium|hard]   new game");
    println!("  <id> | s <id>          turn over a card");
    println!("  p                      pause / resume");
    println!("  u reveal|shuffle|hint  use a power-up");
    println!("  w <ms>                 wait (up to a minute)");
    println!("  sound on|off           toggle sound cues");
    println!("  stats                  best scores and achievements");
    println!("  reset                  forget all progress");
    println!("  q                      quit");
}

enum Input {
    Command(GameEngineCommand),
    Wait(Duration),
    Stats,
    Help,
    Quit,
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Input::Help;
    };
    let arg = words.next();
    if let Ok(card_id) = head.parse::<usize>() {
        return Input::Command(GameEngineCommand::SelectCard(card_id));
    }
    match (head.to_ascii_lowercase().as_str(), arg) {
        ("n" | "new", None) => Input::Command(GameEngineCommand::NewGame(None)),
        ("n" | "new", Some(name)) => match Difficulty::parse(name) {
            Some(difficulty) => Input::Command(GameEngineCommand::NewGame(Some(difficulty))),
            None => Input::Unknown(format!("unknown difficulty '{}'", name)),
        },
        ("s" | "select", Some(id)) => match id.parse::<usize>() {
            Ok(card_id) => Input::Command(GameEngineCommand::SelectCard(card_id)),
            Err(_) => Input::Unknown(format!("'{}' is not a card", id)),
        },
        ("p" | "pause", _) => Input::Command(GameEngineCommand::TogglePause),
        ("u" | "use", Some(name)) => match PowerUpKind::parse(name) {
            Some(kind) => Input::Command(GameEngineCommand::ActivatePowerUp(kind)),
            None => Input::Unknown(format!("unknown power-up '{}'", name)),
        },
        ("w" | "wait", Some(ms)) => match ms.parse::<u64>() {
            Ok(ms) => Input::Wait(Duration::from_millis(ms).min(MAX_WAIT)),
            Err(_) => Input::Unknown(format!("'{}' is not a number of milliseconds", ms)),
        },
        ("sound", Some(state)) => match state.to_ascii_lowercase().as_str() {
            "on" | "off" => Input::Command(GameEngineCommand::ChangeSettings(SettingsChange {
                sound_enabled: Some(state.eq_ignore_ascii_case("on")),
                ..Default::default()
            })),
            _ => Input::Unknown(format!("sound is either 'on' or 'off', not '{}'", state)),
        },
        ("stats", _) => Input::Stats,
        ("reset", _) => Input::Command(GameEngineCommand::ResetProgress),
        ("h" | "help" | "?", _) => Input::Help,
        ("q" | "quit" | "exit", _) => Input::Quit,
        _ => Input::Unknown(format!("unknown command '{}'", line.trim())),
    }
}

/// Feeds wall-clock time into the engine's logical clock.
struct Clock {
    last: Instant,
}

impl Clock {
    fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    fn catch_up(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now - self.last;
        self.last = now;
        elapsed
    }
}

fn is_locked(engine: &Rc<RefCell<GameEngine>>) -> bool {
    engine
        .borrow()
        .session()
        .is_some_and(|session| session.is_locked() && session.phase == Phase::Playing)
}

fn main() {
    env_logger::init();

    let debug_mode = Settings::is_debug_mode();
    let data_dir = default_data_dir();
    let storage = JsonFileStorage::in_dir(&data_dir);
    info!("Progress file: {:?}", storage.path());
    let progress = ProgressStore::load(Box::new(storage));

    let (command_emitter, command_observer) = Channel::<GameEngineCommand>::new();
    let (event_emitter, event_observer) = Channel::<GameEngineEvent>::new();
    let engine = GameEngine::new(command_observer, event_emitter, progress);

    let view_subscription = attach_handler(
        &event_observer,
        Rc::new(RefCell::new(TerminalView { debug_mode })),
    );
    let sound_subscription = attach_handler(&event_observer, Rc::new(RefCell::new(SoundLog)));

    let mut clock = Clock::new();
    command_emitter.emit(GameEngineCommand::NewGame(None));
    print_help();
    if let Some(session) = engine.borrow().session() {
        render_board(session, debug_mode);
    }

    let stdin = io::stdin();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => (),
        }
        command_emitter.emit(GameEngineCommand::Advance(clock.catch_up()));

        match parse_input(&line) {
            Input::Command(command) => command_emitter.emit(command),
            Input::Wait(duration) => {
                std::thread::sleep(duration);
                command_emitter.emit(GameEngineCommand::Advance(clock.catch_up()));
            }
            Input::Stats => {
                print_stats(engine.borrow().progress());
                continue;
            }
            Input::Help => {
                print_help();
                continue;
            }
            Input::Quit => break,
            Input::Unknown(message) => {
                println!("{} (type 'h' for help)", message);
                continue;
            }
        }

        // let the comparison play out before asking for more input
        if is_locked(&engine) {
            if let Some(session) = engine.borrow().session() {
                render_board(session, debug_mode);
            }
            while is_locked(&engine) {
                std::thread::sleep(POLL_INTERVAL);
                command_emitter.emit(GameEngineCommand::Advance(clock.catch_up()));
            }
        }
        if let Some(session) = engine.borrow().session() {
            render_board(session, debug_mode);
        }
    }

    view_subscription.unsubscribe();
    sound_subscription.unsubscribe();
    engine.borrow_mut().destroy();
}
