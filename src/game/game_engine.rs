use log::{debug, error, info, trace, warn};
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::SeedableRng;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, SystemTime};

use itertools::Itertools;

use super::deck_generator::{generate_deck, random_seed, FacePool};
use super::error::Result;
use super::progress_store::ProgressStore;
use super::scheduler::Scheduler;
use super::scoring::{max_possible_score, score_for_completion, score_for_match, star_rating};
use super::settings::Settings;
use crate::destroyable::Destroyable;
use crate::events::{EventEmitter, EventObserver, Unsubscriber};
use crate::model::{
    AchievementId, CardId, Difficulty, DifficultyConfig, GameEngineCommand, GameEngineEvent,
    GameSession, GameSummary, PauseOutcome, Phase, PowerUpKind, PowerUpOutcome, Rejection,
    ScoreRecord, SelectOutcome, SettingsChange, SoundEvent,
};

const TICK_INTERVAL: Duration = Duration::from_secs(1);
const SPEED_DEMON_SECONDS: u32 = 30;
const MARATHON_WINS: u32 = 10;
const COLLECTOR_UNLOCKS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineTask {
    ResolveComparison,
    FlipBack,
    EndReveal,
    EndHint,
}

impl EngineTask {
    fn is_power_up_effect(self) -> bool {
        matches!(self, EngineTask::EndReveal | EngineTask::EndHint)
    }
}

/// Delayed mutation stamped with the session it was scheduled for.
#[derive(Debug, Clone, Copy)]
struct ScheduledEffect {
    generation: u64,
    task: EngineTask,
}

/// Owns the current session and the progress store. Every mutation happens
/// inside a public call or inside `advance`; nothing runs in the background.
pub struct GameEngine {
    session: Option<GameSession>,
    generation: u64,
    scheduler: Scheduler<ScheduledEffect>,
    next_tick_at: Option<Duration>,
    progress: ProgressStore,
    face_pool: FacePool,
    pinned_seed: Option<u64>,
    rng: StdRng,
    subscription_id: Option<Unsubscriber<GameEngineCommand>>,
    game_engine_event_emitter: EventEmitter<GameEngineEvent>,
}

impl Destroyable for GameEngine {
    fn destroy(&mut self) {
        if let Some(subscription_id) = self.subscription_id.take() {
            subscription_id.unsubscribe();
        }
    }
}

impl GameEngine {
    pub fn new(
        game_engine_command_observer: EventObserver<GameEngineCommand>,
        game_engine_event_emitter: EventEmitter<GameEngineEvent>,
        progress: ProgressStore,
    ) -> Rc<RefCell<Self>> {
        let engine = Self::with_progress(progress, game_engine_event_emitter);
        let refcell = Rc::new(RefCell::new(engine));
        GameEngine::wire_subscription(refcell.clone(), game_engine_command_observer);
        refcell
    }

    /// An engine nobody sends commands to; callers drive it directly.
    pub fn with_progress(
        progress: ProgressStore,
        game_engine_event_emitter: EventEmitter<GameEngineEvent>,
    ) -> Self {
        Self {
            session: None,
            generation: 0,
            scheduler: Scheduler::new(),
            next_tick_at: None,
            progress,
            face_pool: FacePool::default(),
            pinned_seed: Settings::seed_from_env(),
            rng: StdRng::seed_from_u64(random_seed()),
            subscription_id: None,
            game_engine_event_emitter,
        }
    }

    fn wire_subscription(
        engine: Rc<RefCell<Self>>,
        game_engine_command_observer: EventObserver<GameEngineCommand>,
    ) {
        let engine_handler = engine.clone();
        let subscription_id = game_engine_command_observer.subscribe(move |command| {
            let mut engine = engine_handler.borrow_mut();
            engine.handle_command(command.clone());
        });
        engine.borrow_mut().subscription_id = Some(subscription_id);
    }

    pub fn handle_command(&mut self, command: GameEngineCommand) {
        trace!(target: "game_engine", "Handling command: {:?}", command);
        match command {
            GameEngineCommand::NewGame(difficulty) => {
                let difficulty = difficulty.unwrap_or(self.progress.settings().difficulty);
                if let Err(err) = self.start_session(difficulty) {
                    error!(target: "game_engine", "Could not start a new game: {}", err);
                }
            }
            GameEngineCommand::SelectCard(card_id) => {
                let outcome = self.select_card(card_id);
                if !outcome.is_accepted() {
                    debug!(target: "game_engine", "Selection of card {} rejected: {:?}", card_id, outcome);
                }
            }
            GameEngineCommand::Pause => {
                self.pause();
            }
            GameEngineCommand::Resume => {
                self.resume();
            }
            GameEngineCommand::TogglePause => {
                self.toggle_pause();
            }
            GameEngineCommand::Advance(delta) => self.advance(delta),
            GameEngineCommand::ActivatePowerUp(kind) => {
                let outcome = self.activate_power_up(kind);
                if !outcome.is_accepted() {
                    debug!(target: "game_engine", "Power-up {:?} rejected: {:?}", kind, outcome);
                }
            }
            GameEngineCommand::ChangeSettings(change) => self.change_settings(&change),
            GameEngineCommand::ResetProgress => self.reset_progress(),
        }
    }

    pub fn session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }

    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    pub fn settings(&self) -> &Settings {
        self.progress.settings()
    }

    /// Logical time since the engine was created.
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    /// Pins every following deck to `seed`; `None` goes back to random decks.
    pub fn set_pinned_seed(&mut self, seed: Option<u64>) {
        self.pinned_seed = seed;
    }

    pub fn set_face_pool(&mut self, face_pool: FacePool) {
        self.face_pool = face_pool;
    }

    pub fn start_session(&mut self, difficulty: Difficulty) -> Result<()> {
        let seed = self.pinned_seed.unwrap_or_else(random_seed);
        self.start_session_with(difficulty, difficulty.config(), seed)
    }

    pub fn start_session_with_seed(&mut self, difficulty: Difficulty, seed: u64) -> Result<()> {
        self.start_session_with(difficulty, difficulty.config(), seed)
    }

    /// Replaces the current session. The deck is built first, so a failure
    /// leaves whatever was running untouched.
    pub fn start_session_with(
        &mut self,
        difficulty: Difficulty,
        config: DifficultyConfig,
        seed: u64,
    ) -> Result<()> {
        let cards = generate_deck(&config, &self.face_pool, seed)?;

        let cancelled = self.scheduler.cancel_all();
        self.generation += 1;
        self.next_tick_at = None;
        self.rng = StdRng::seed_from_u64(seed.wrapping_add(1));
        self.session = Some(GameSession::new(difficulty, config, cards, seed));

        info!(
            target: "game_engine",
            "New game; difficulty: {}; seed: {}; cancelled {} pending tasks",
            difficulty.to_string(),
            seed,
            cancelled
        );
        self.emit_sound(SoundEvent::Shuffle);
        self.game_engine_event_emitter
            .emit(GameEngineEvent::PhaseChanged(Phase::Ready));
        self.sync_session();
        Ok(())
    }

    pub fn select_card(&mut self, card_id: CardId) -> SelectOutcome {
        let Some(session) = self.session.as_mut() else {
            return SelectOutcome::Rejected(Rejection::NoSession);
        };
        if !session.phase.accepts_input() {
            let rejection = if session.phase.is_finished() {
                Rejection::Finished
            } else {
                Rejection::Paused
            };
            return SelectOutcome::Rejected(rejection);
        }
        if session.is_locked() {
            return SelectOutcome::Rejected(Rejection::Locked);
        }
        let Some(card) = session.card_mut(card_id) else {
            return SelectOutcome::Rejected(Rejection::UnknownCard);
        };
        if card.flipped || card.matched {
            return SelectOutcome::Rejected(Rejection::AlreadyFaceUp);
        }

        card.flipped = true;
        session.selection.push(card_id);
        let started = session.phase == Phase::Ready;
        if started {
            session.phase = Phase::Playing;
        }
        let locked = session.is_locked();

        if started {
            self.next_tick_at = Some(self.scheduler.now() + TICK_INTERVAL);
            self.game_engine_event_emitter
                .emit(GameEngineEvent::PhaseChanged(Phase::Playing));
        }
        self.emit_sound(SoundEvent::Flip);

        let outcome = if locked {
            let delay = self.progress.settings().comparison_delay();
            self.schedule(delay, EngineTask::ResolveComparison);
            SelectOutcome::ComparisonPending
        } else {
            SelectOutcome::Flipped
        };
        self.sync_session();
        outcome
    }

    pub fn pause(&mut self) -> PauseOutcome {
        let Some(session) = self.session.as_mut() else {
            return PauseOutcome::Rejected(Rejection::NoSession);
        };
        match session.phase {
            Phase::Playing => (),
            Phase::Won => return PauseOutcome::Rejected(Rejection::Finished),
            Phase::Paused => return PauseOutcome::Rejected(Rejection::Paused),
            Phase::Ready => return PauseOutcome::Rejected(Rejection::NotPlaying),
        }
        if session.is_locked() {
            return PauseOutcome::Rejected(Rejection::Locked);
        }
        session.phase = Phase::Paused;
        self.next_tick_at = None;
        self.clear_power_up_effects();

        self.game_engine_event_emitter
            .emit(GameEngineEvent::PhaseChanged(Phase::Paused));
        self.sync_session();
        PauseOutcome::Paused
    }

    pub fn resume(&mut self) -> PauseOutcome {
        let Some(session) = self.session.as_mut() else {
            return PauseOutcome::Rejected(Rejection::NoSession);
        };
        if session.phase != Phase::Paused {
            return PauseOutcome::Rejected(Rejection::NotPaused);
        }
        session.phase = Phase::Playing;
        self.next_tick_at = Some(self.scheduler.now() + TICK_INTERVAL);

        self.game_engine_event_emitter
            .emit(GameEngineEvent::PhaseChanged(Phase::Playing));
        self.sync_session();
        PauseOutcome::Resumed
    }

    pub fn toggle_pause(&mut self) -> PauseOutcome {
        match self.session.as_ref().map(|session| session.phase) {
            Some(Phase::Paused) => self.resume(),
            _ => self.pause(),
        }
    }

    /// One second of play. No-op unless playing.
    pub fn tick(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if session.phase == Phase::Playing {
                session.elapsed_seconds += 1;
                self.sync_session();
            }
        }
    }

    /// Moves logical time forward by `delta`, firing due tasks and one-second
    /// ticks in time order. A task and a tick due at the same instant run task first.
    pub fn advance(&mut self, delta: Duration) {
        let target = self.scheduler.now() + delta;
        loop {
            let next_task = self.scheduler.next_due().filter(|due| *due <= target);
            let next_tick = self.next_tick_at.filter(|due| *due <= target);
            match (next_task, next_tick) {
                (Some(task_due), Some(tick_due)) if tick_due < task_due => self.run_tick(tick_due),
                (Some(_), _) => {
                    if let Some((due, effect)) = self.scheduler.pop_due(target) {
                        self.scheduler.set_now(due);
                        self.run_effect(effect);
                    }
                }
                (None, Some(tick_due)) => self.run_tick(tick_due),
                (None, None) => break,
            }
        }
        self.scheduler.set_now(target);
    }

    pub fn activate_power_up(&mut self, kind: PowerUpKind) -> PowerUpOutcome {
        if let Err(rejection) = self.check_power_up(kind) {
            return PowerUpOutcome::Rejected(rejection);
        }
        let Some(uses_remaining) = self.progress.consume_power_up(kind) else {
            return PowerUpOutcome::Rejected(Rejection::NoUsesLeft);
        };

        match kind {
            PowerUpKind::Reveal => self.apply_reveal(),
            PowerUpKind::Shuffle => self.apply_shuffle(),
            PowerUpKind::Hint => self.apply_hint(),
        }
        if let Some(duration) = kind.effect_duration() {
            let task = match kind {
                PowerUpKind::Hint => EngineTask::EndHint,
                _ => EngineTask::EndReveal,
            };
            self.schedule(duration, task);
        }

        info!(target: "game_engine", "Power-up {} used, {} left", kind.id(), uses_remaining);
        self.game_engine_event_emitter.emit(GameEngineEvent::PowerUpUsed {
            kind,
            uses_remaining,
        });
        self.emit_sound(SoundEvent::PowerUp);
        if kind == PowerUpKind::Shuffle {
            self.emit_sound(SoundEvent::Shuffle);
        }
        self.sync_session();
        self.persist();
        PowerUpOutcome::Activated { uses_remaining }
    }

    pub fn change_settings(&mut self, change: &SettingsChange) {
        self.progress.settings_mut().apply(change);
        self.game_engine_event_emitter
            .emit(GameEngineEvent::SettingsChanged(self.progress.settings().clone()));
        self.persist();
    }

    /// Wipes stored progress; the running session is left alone.
    pub fn reset_progress(&mut self) {
        self.progress.reset_to_defaults();
        self.game_engine_event_emitter
            .emit(GameEngineEvent::SettingsChanged(self.progress.settings().clone()));
        self.persist();
    }

    fn check_power_up(&self, kind: PowerUpKind) -> std::result::Result<(), Rejection> {
        let session = self.session.as_ref().ok_or(Rejection::NoSession)?;
        match session.phase {
            Phase::Paused => return Err(Rejection::Paused),
            Phase::Won => return Err(Rejection::Finished),
            Phase::Ready | Phase::Playing => (),
        }
        if session.is_locked() {
            return Err(Rejection::Locked);
        }
        let hidden = session.hidden_cards().count();
        match kind {
            PowerUpKind::Reveal => {
                if session.cards.iter().any(|card| card.revealed) {
                    return Err(Rejection::EffectActive);
                }
                if hidden == 0 {
                    return Err(Rejection::NoTarget);
                }
            }
            PowerUpKind::Shuffle => {
                if hidden < 2 {
                    return Err(Rejection::NoTarget);
                }
            }
            PowerUpKind::Hint => {
                if session.cards.iter().any(|card| card.hinted) {
                    return Err(Rejection::EffectActive);
                }
                if hidden_pairs(session).is_empty() {
                    return Err(Rejection::NoTarget);
                }
            }
        }
        if self.progress.uses_remaining(kind) == 0 {
            return Err(Rejection::NoUsesLeft);
        }
        Ok(())
    }

    fn apply_reveal(&mut self) {
        if let Some(session) = self.session.as_mut() {
            for card in session.cards.iter_mut().filter(|card| card.is_hidden()) {
                card.revealed = true;
            }
        }
    }

    /// Permutes face values among face-down cards only, so every face keeps
    /// exactly two cards and ids stay put.
    fn apply_shuffle(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let hidden_ids = session.hidden_cards().map(|card| card.id).collect_vec();
        let mut faces = hidden_ids
            .iter()
            .map(|&id| session.cards[id].face_value)
            .collect_vec();
        faces.shuffle(&mut self.rng);
        for (id, face_value) in hidden_ids.into_iter().zip(faces) {
            session.cards[id].face_value = face_value;
        }
        // a hint pointing at the old layout would now be wrong
        for card in session.cards.iter_mut() {
            card.hinted = false;
        }
        self.scheduler
            .cancel_where(|effect| effect.task == EngineTask::EndHint);
        trace!(target: "game_engine", "Shuffled hidden cards: {:?}", session.cards);
    }

    fn apply_hint(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let pairs = hidden_pairs(session);
        if let Some(&(first, second)) = pairs.choose(&mut self.rng) {
            session.cards[first].hinted = true;
            session.cards[second].hinted = true;
            debug!(target: "game_engine", "Hinting pair {} / {}", first, second);
        }
    }

    fn clear_power_up_effects(&mut self) {
        self.scheduler
            .cancel_where(|effect| effect.task.is_power_up_effect());
        if let Some(session) = self.session.as_mut() {
            for card in session.cards.iter_mut() {
                card.revealed = false;
                card.hinted = false;
            }
        }
    }

    fn schedule(&mut self, delay: Duration, task: EngineTask) {
        let effect = ScheduledEffect {
            generation: self.generation,
            task,
        };
        self.scheduler.schedule(delay, effect);
    }

    fn run_tick(&mut self, at: Duration) {
        self.scheduler.set_now(at);
        self.next_tick_at = Some(at + TICK_INTERVAL);
        self.tick();
    }

    fn run_effect(&mut self, effect: ScheduledEffect) {
        if effect.generation != self.generation {
            trace!(target: "game_engine", "Discarding stale task {:?}", effect);
            return;
        }
        match effect.task {
            EngineTask::ResolveComparison => self.resolve_comparison(),
            EngineTask::FlipBack => self.flip_back(),
            EngineTask::EndReveal => {
                if let Some(session) = self.session.as_mut() {
                    for card in session.cards.iter_mut() {
                        card.revealed = false;
                    }
                }
                self.sync_session();
            }
            EngineTask::EndHint => {
                if let Some(session) = self.session.as_mut() {
                    for card in session.cards.iter_mut() {
                        card.hinted = false;
                    }
                }
                self.sync_session();
            }
        }
    }

    fn resolve_comparison(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let &[first, second] = session.selection.as_slice() else {
            warn!(target: "game_engine", "Comparison fired without two selected cards: {:?}", session.selection);
            return;
        };

        if session.cards[first].matches(&session.cards[second]) {
            for id in [first, second] {
                session.cards[id].matched = true;
                session.cards[id].flipped = true;
            }
            session.matched_pair_count += 1;
            session.moves += 1;
            session.score += score_for_match(session.difficulty, session.elapsed_seconds, session.moves);
            session.selection.clear();
            let won = session.is_won();
            trace!(target: "game_engine", "Matched {} and {}", first, second);

            self.emit_sound(SoundEvent::Match);
            if self.progress.unlock(AchievementId::FirstMatch) {
                self.announce_achievement(AchievementId::FirstMatch);
                if !won {
                    self.persist();
                }
            }
            if won {
                self.finish_game();
            }
        } else {
            for id in [first, second] {
                session.cards[id].shaking = true;
            }
            trace!(target: "game_engine", "Mismatch between {} and {}", first, second);
            self.emit_sound(SoundEvent::Mismatch);
            let delay = self.progress.settings().flip_back_delay();
            self.schedule(delay, EngineTask::FlipBack);
        }
        self.sync_session();
    }

    fn flip_back(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        for id in session.selection.drain(..) {
            if let Some(card) = session.cards.get_mut(id) {
                card.flipped = false;
                card.shaking = false;
            }
        }
        session.moves += 1;
        self.sync_session();
    }

    fn finish_game(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.phase = Phase::Won;
        session.score +=
            score_for_completion(session.difficulty, session.elapsed_seconds, session.moves);
        for card in session.cards.iter_mut() {
            card.revealed = false;
            card.hinted = false;
        }

        let max_possible = max_possible_score(session.difficulty, session.pairs);
        let record = ScoreRecord {
            score: session.score,
            moves: session.moves,
            elapsed_seconds: session.elapsed_seconds,
            difficulty: session.difficulty,
            timestamp: SystemTime::now(),
            playthrough_id: session.playthrough_id,
        };
        let perfect = session.moves == session.pairs;
        let fast = session.elapsed_seconds < SPEED_DEMON_SECONDS;
        let on_hard = session.difficulty == Difficulty::Hard;

        self.next_tick_at = None;
        self.scheduler
            .cancel_where(|effect| effect.task.is_power_up_effect());

        let outcome = self.progress.record_win(&record);
        info!(
            target: "game_engine",
            "Game won: score {} in {} moves, {}s",
            record.score,
            record.moves,
            record.elapsed_seconds
        );

        let mut earned = Vec::new();
        if fast {
            earned.push(AchievementId::SpeedDemon);
        }
        if perfect {
            earned.push(AchievementId::PerfectGame);
        }
        if on_hard {
            earned.push(AchievementId::Master);
        }
        if self.progress.games_won() >= MARATHON_WINS {
            earned.push(AchievementId::Marathon);
        }
        for id in earned {
            if self.progress.unlock(id) {
                self.announce_achievement(id);
            }
        }
        if self.progress.unlocked_count() >= COLLECTOR_UNLOCKS
            && self.progress.unlock(AchievementId::Collector)
        {
            self.announce_achievement(AchievementId::Collector);
        }

        let summary = GameSummary {
            stars: star_rating(record.score, max_possible),
            max_possible_score: max_possible,
            new_best_moves: outcome.new_best_moves,
            leaderboard_rank: outcome.leaderboard_rank,
            record,
        };
        self.game_engine_event_emitter
            .emit(GameEngineEvent::PhaseChanged(Phase::Won));
        self.emit_sound(SoundEvent::Win);
        self.game_engine_event_emitter
            .emit(GameEngineEvent::GameWon(summary));
        self.persist();
    }

    fn announce_achievement(&self, id: AchievementId) {
        self.game_engine_event_emitter
            .emit(GameEngineEvent::AchievementUnlocked(id));
        self.emit_sound(SoundEvent::Achievement);
    }

    fn emit_sound(&self, sound: SoundEvent) {
        if self.progress.settings().sound_enabled {
            self.game_engine_event_emitter
                .emit(GameEngineEvent::Sound(sound));
        }
    }

    fn sync_session(&self) {
        if let Some(session) = &self.session {
            self.game_engine_event_emitter
                .emit(GameEngineEvent::SessionUpdated(session.clone()));
        }
    }

    fn persist(&self) {
        if let Err(err) = self.progress.persist() {
            warn!(target: "game_engine", "Could not save progress: {}", err);
            self.game_engine_event_emitter
                .emit(GameEngineEvent::PersistenceFailed(err.to_string()));
        }
    }
}

/// Face-down pairs, as (lower id, higher id), in id order.
fn hidden_pairs(session: &GameSession) -> Vec<(CardId, CardId)> {
    session
        .hidden_cards()
        .map(|card| (card.face_value, card.id))
        .into_group_map()
        .into_values()
        .filter_map(|ids| match ids.as_slice() {
            &[first, second] => Some((first.min(second), first.max(second))),
            _ => None,
        })
        .sorted()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Channel;
    use crate::game::storage::MemoryStorage;
    use crate::model::FaceValue;
    use crate::tests::UsingLogger;
    use test_context::test_context;

    const COMPARISON: Duration = Duration::from_millis(1000);
    const FLIP_BACK: Duration = Duration::from_millis(800);

    struct Harness {
        engine: GameEngine,
        events: Rc<RefCell<Vec<GameEngineEvent>>>,
        storage: MemoryStorage,
        _subscription: Unsubscriber<GameEngineEvent>,
    }

    fn harness() -> Harness {
        let storage = MemoryStorage::new();
        let progress = ProgressStore::load(Box::new(storage.clone()));
        let (emitter, observer) = Channel::<GameEngineEvent>::new();
        let events = Rc::new(RefCell::new(Vec::new()));
        let events_clone = events.clone();
        let subscription = observer.subscribe(move |event: &GameEngineEvent| {
            events_clone.borrow_mut().push(event.clone());
        });
        let mut engine = GameEngine::with_progress(progress, emitter);
        engine.set_pinned_seed(Some(7));
        Harness {
            engine,
            events,
            storage,
            _subscription: subscription,
        }
    }

    fn started(difficulty: Difficulty) -> Harness {
        let mut harness = harness();
        harness.engine.start_session_with_seed(difficulty, 42).unwrap();
        harness.events.borrow_mut().clear();
        harness
    }

    fn session(engine: &GameEngine) -> &GameSession {
        engine.session().unwrap()
    }

    fn pairs(engine: &GameEngine) -> Vec<(CardId, CardId)> {
        session(engine)
            .cards
            .iter()
            .map(|card| (card.face_value, card.id))
            .into_group_map()
            .into_values()
            .map(|ids| (ids[0], ids[1]))
            .sorted()
            .collect()
    }

    fn mismatched(engine: &GameEngine) -> (CardId, CardId) {
        let cards = &session(engine).cards;
        let second = cards
            .iter()
            .find(|card| card.face_value != cards[0].face_value)
            .unwrap();
        (0, second.id)
    }

    /// Arranges for cards 0 and 1 to share a face.
    fn pair_first_two(engine: &mut GameEngine) {
        let session = engine.session.as_mut().unwrap();
        let face = session.cards[0].face_value;
        let partner = session
            .cards
            .iter()
            .skip(1)
            .find(|card| card.face_value == face)
            .unwrap()
            .id;
        let displaced = session.cards[1].face_value;
        session.cards[1].face_value = face;
        session.cards[partner].face_value = displaced;
    }

    fn play_pair(engine: &mut GameEngine, (first, second): (CardId, CardId)) {
        assert_eq!(engine.select_card(first), SelectOutcome::Flipped);
        assert_eq!(engine.select_card(second), SelectOutcome::ComparisonPending);
        engine.advance(COMPARISON);
    }

    fn unlocked_events(harness: &Harness, id: AchievementId) -> usize {
        harness
            .events
            .borrow()
            .iter()
            .filter(|event| **event == GameEngineEvent::AchievementUnlocked(id))
            .count()
    }

    #[test_context(UsingLogger)]
    #[test]
    fn test_new_session_is_ready_and_face_down(_: &mut UsingLogger) {
        let mut harness = harness();
        harness.engine.start_session(Difficulty::Easy).unwrap();

        let session = session(&harness.engine);
        assert_eq!(session.phase, Phase::Ready);
        assert_eq!(session.cards.len(), 12);
        assert_eq!(session.seed, 7);
        assert!(session.cards.iter().all(|card| !card.is_face_up()));
        assert!(harness
            .events
            .borrow()
            .contains(&GameEngineEvent::Sound(SoundEvent::Shuffle)));
    }

    #[test_context(UsingLogger)]
    #[test]
    fn test_matching_pair_resolves_after_delay(_: &mut UsingLogger) {
        let mut harness = started(Difficulty::Easy);
        let engine = &mut harness.engine;
        pair_first_two(engine);

        assert_eq!(engine.select_card(0), SelectOutcome::Flipped);
        assert_eq!(session(engine).phase, Phase::Playing);
        assert_eq!(engine.select_card(1), SelectOutcome::ComparisonPending);

        engine.advance(COMPARISON - Duration::from_millis(1));
        assert_eq!(session(engine).moves, 0);
        assert!(!session(engine).cards[0].matched);

        engine.advance(Duration::from_millis(1));
        let session = session(engine);
        assert!(session.cards[0].matched && session.cards[1].matched);
        assert!(session.cards[0].flipped && session.cards[1].flipped);
        assert_eq!(session.moves, 1);
        assert_eq!(session.matched_pair_count, 1);
        assert!(session.selection.is_empty());
        assert!(session.score > 0);
        assert_eq!(unlocked_events(&harness, AchievementId::FirstMatch), 1);
    }

    #[test_context(UsingLogger)]
    #[test]
    fn test_mismatch_flips_back_after_both_delays(_: &mut UsingLogger) {
        let mut harness = started(Difficulty::Easy);
        let engine = &mut harness.engine;
        let (first, second) = mismatched(engine);

        engine.select_card(first);
        engine.select_card(second);
        engine.advance(COMPARISON);

        let cards = &session(engine).cards;
        assert!(cards[first].shaking && cards[second].shaking);
        assert!(cards[first].flipped);
        assert_eq!(session(engine).moves, 0);
        let third = pairs(engine)[5].0;
        assert_eq!(
            engine.select_card(third),
            SelectOutcome::Rejected(Rejection::Locked)
        );

        engine.advance(FLIP_BACK);
        let session = session(engine);
        for id in [first, second] {
            assert!(!session.cards[id].flipped);
            assert!(!session.cards[id].matched);
            assert!(!session.cards[id].shaking);
        }
        assert_eq!(session.moves, 1);
        assert!(!session.is_locked());
    }

    #[test_context(UsingLogger)]
    #[test]
    fn test_perfect_fast_game_unlocks_once(_: &mut UsingLogger) {
        let mut harness = started(Difficulty::Easy);
        for pair in pairs(&harness.engine) {
            play_pair(&mut harness.engine, pair);
        }

        let session = session(&harness.engine).clone();
        assert_eq!(session.phase, Phase::Won);
        assert_eq!(session.moves, 6);
        assert_eq!(session.matched_pair_count, 6);
        assert!(session.elapsed_seconds < 25);
        assert_eq!(unlocked_events(&harness, AchievementId::PerfectGame), 1);
        assert_eq!(unlocked_events(&harness, AchievementId::SpeedDemon), 1);
        assert_eq!(unlocked_events(&harness, AchievementId::Master), 0);

        let progress = harness.engine.progress();
        assert!(progress.is_unlocked(AchievementId::PerfectGame));
        assert_eq!(progress.best_moves(Difficulty::Easy), Some(6));
        assert_eq!(progress.high_scores().len(), 1);

        let summary = harness
            .events
            .borrow()
            .iter()
            .find_map(|event| match event {
                GameEngineEvent::GameWon(summary) => Some(summary.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(summary.record.score, session.score);
        assert_eq!(summary.leaderboard_rank, Some(0));
        assert!(summary.new_best_moves);
        assert!(summary.stars >= 2);

        let saved = harness.storage.snapshot().unwrap();
        assert_eq!(saved.best_moves.get(&Difficulty::Easy), Some(&6));

        // a second perfect game must not announce the same achievements again
        harness.events.borrow_mut().clear();
        harness.engine.start_session_with_seed(Difficulty::Easy, 43).unwrap();
        for pair in pairs(&harness.engine) {
            play_pair(&mut harness.engine, pair);
        }
        assert_eq!(unlocked_events(&harness, AchievementId::PerfectGame), 0);
        assert_eq!(unlocked_events(&harness, AchievementId::FirstMatch), 0);
    }

    #[test_context(UsingLogger)]
    #[test]
    fn test_win_only_when_all_pairs_matched(_: &mut UsingLogger) {
        let mut harness = started(Difficulty::Easy);
        let all_pairs = pairs(&harness.engine);
        for pair in &all_pairs[..5] {
            play_pair(&mut harness.engine, *pair);
            assert_ne!(session(&harness.engine).phase, Phase::Won);
        }
        play_pair(&mut harness.engine, all_pairs[5]);
        assert_eq!(session(&harness.engine).phase, Phase::Won);
        assert_eq!(
            harness.engine.select_card(0),
            SelectOutcome::Rejected(Rejection::Finished)
        );
    }

    #[test_context(UsingLogger)]
    #[test]
    fn test_stale_flip_back_never_touches_new_session(_: &mut UsingLogger) {
        let mut harness = started(Difficulty::Easy);
        let engine = &mut harness.engine;
        let (first, second) = mismatched(engine);
        engine.select_card(first);
        engine.select_card(second);
        engine.advance(COMPARISON);

        engine.start_session_with_seed(Difficulty::Easy, 99).unwrap();
        let fresh = session(engine).clone();
        engine.advance(Duration::from_secs(5));

        assert_eq!(session(engine), &fresh);
        assert_eq!(session(engine).moves, 0);
    }

    #[test_context(UsingLogger)]
    #[test]
    fn test_stale_generation_is_ignored(_: &mut UsingLogger) {
        let mut harness = started(Difficulty::Easy);
        let engine = &mut harness.engine;
        let (first, second) = mismatched(engine);
        engine.select_card(first);
        engine.select_card(second);
        engine.scheduler.schedule(
            Duration::ZERO,
            ScheduledEffect {
                generation: engine.generation - 1,
                task: EngineTask::FlipBack,
            },
        );

        engine.advance(Duration::from_millis(10));
        assert!(session(engine).cards[first].flipped);
        assert_eq!(session(engine).moves, 0);
    }

    #[test_context(UsingLogger)]
    #[test]
    fn test_lock_and_move_count_hold_under_rapid_input(_: &mut UsingLogger) {
        let mut harness = started(Difficulty::Hard);
        let engine = &mut harness.engine;
        let card_count = session(engine).cards.len();
        let mut comparisons = 0;

        for step in 0..400 {
            if engine.select_card((step * 7) % card_count) == SelectOutcome::ComparisonPending {
                comparisons += 1;
            }
            assert!(session(engine).pending_count() <= 2);
            engine.advance(Duration::from_millis(150));
            assert!(session(engine).pending_count() <= 2);
        }
        engine.advance(Duration::from_secs(5));

        assert!(comparisons > 0);
        assert_eq!(session(engine).moves, comparisons);
    }

    #[test_context(UsingLogger)]
    #[test]
    fn test_single_selection_is_not_a_move(_: &mut UsingLogger) {
        let mut harness = started(Difficulty::Easy);
        let engine = &mut harness.engine;

        engine.select_card(3);
        assert_eq!(
            engine.select_card(3),
            SelectOutcome::Rejected(Rejection::AlreadyFaceUp)
        );
        engine.advance(Duration::from_secs(10));

        assert_eq!(session(engine).moves, 0);
        assert_eq!(session(engine).selection, vec![3]);
    }

    #[test_context(UsingLogger)]
    #[test]
    fn test_timer_runs_only_while_playing(_: &mut UsingLogger) {
        let mut harness = started(Difficulty::Easy);
        let engine = &mut harness.engine;

        engine.advance(Duration::from_secs(3));
        assert_eq!(session(engine).elapsed_seconds, 0);

        engine.select_card(0);
        engine.advance(Duration::from_millis(2500));
        assert_eq!(session(engine).elapsed_seconds, 2);

        assert_eq!(engine.pause(), PauseOutcome::Paused);
        engine.advance(Duration::from_secs(10));
        assert_eq!(session(engine).elapsed_seconds, 2);
        assert_eq!(
            engine.select_card(1),
            SelectOutcome::Rejected(Rejection::Paused)
        );

        assert_eq!(engine.resume(), PauseOutcome::Resumed);
        assert_eq!(engine.resume(), PauseOutcome::Rejected(Rejection::NotPaused));
        engine.advance(Duration::from_secs(1));
        assert_eq!(session(engine).elapsed_seconds, 3);
    }

    #[test_context(UsingLogger)]
    #[test]
    fn test_pause_rejected_while_locked(_: &mut UsingLogger) {
        let mut harness = started(Difficulty::Easy);
        let engine = &mut harness.engine;
        assert_eq!(engine.pause(), PauseOutcome::Rejected(Rejection::NotPlaying));

        let (first, second) = mismatched(engine);
        engine.select_card(first);
        engine.select_card(second);
        assert_eq!(engine.pause(), PauseOutcome::Rejected(Rejection::Locked));

        engine.advance(COMPARISON + FLIP_BACK);
        assert_eq!(engine.toggle_pause(), PauseOutcome::Paused);
        assert_eq!(engine.toggle_pause(), PauseOutcome::Resumed);
    }

    #[test_context(UsingLogger)]
    #[test]
    fn test_reveal_is_temporary_and_costs_one_use(_: &mut UsingLogger) {
        let mut harness = started(Difficulty::Easy);
        let engine = &mut harness.engine;

        assert_eq!(
            engine.activate_power_up(PowerUpKind::Reveal),
            PowerUpOutcome::Activated { uses_remaining: 2 }
        );
        assert!(session(engine).cards.iter().all(|card| card.is_face_up()));
        assert_eq!(session(engine).pending_count(), 0);
        assert_eq!(
            engine.activate_power_up(PowerUpKind::Reveal),
            PowerUpOutcome::Rejected(Rejection::EffectActive)
        );

        engine.advance(Duration::from_secs(2));
        let session = session(engine);
        assert!(session.cards.iter().all(|card| !card.is_face_up()));
        assert_eq!(session.moves, 0);
        assert_eq!(session.phase, Phase::Ready);
        assert_eq!(engine.progress().uses_remaining(PowerUpKind::Reveal), 2);
    }

    #[test_context(UsingLogger)]
    #[test]
    fn test_hint_marks_a_real_pair(_: &mut UsingLogger) {
        let mut harness = started(Difficulty::Medium);
        let engine = &mut harness.engine;

        assert!(engine.activate_power_up(PowerUpKind::Hint).is_accepted());
        let hinted = session(engine)
            .cards
            .iter()
            .filter(|card| card.hinted)
            .collect_vec();
        assert_eq!(hinted.len(), 2);
        assert_eq!(hinted[0].face_value, hinted[1].face_value);

        engine.advance(Duration::from_secs(3));
        assert!(session(engine).cards.iter().all(|card| !card.hinted));
    }

    #[test_context(UsingLogger)]
    #[test]
    fn test_shuffle_keeps_pairs_and_face_up_cards(_: &mut UsingLogger) {
        let mut harness = started(Difficulty::Hard);
        let engine = &mut harness.engine;
        let first_pair = pairs(engine)[0];
        play_pair(engine, first_pair);
        let lone = pairs(engine)[1].0;
        engine.select_card(lone);
        let before = session(engine).clone();

        assert!(engine.activate_power_up(PowerUpKind::Shuffle).is_accepted());
        let after = session(engine);

        for (old, new) in before.cards.iter().zip(&after.cards) {
            assert_eq!(old.id, new.id);
            if !old.is_hidden() {
                assert_eq!(old, new);
            }
        }
        let counts = after.cards.iter().counts_by(|card| card.face_value);
        assert!(counts.values().all(|&count| count == 2));
        assert_eq!(after.moves, before.moves);
        assert_eq!(after.matched_pair_count, before.matched_pair_count);
    }

    #[test_context(UsingLogger)]
    #[test]
    fn test_power_up_rejections_do_not_consume(_: &mut UsingLogger) {
        let mut harness = started(Difficulty::Easy);
        let engine = &mut harness.engine;
        let (first, second) = mismatched(engine);
        engine.select_card(first);
        engine.select_card(second);

        assert_eq!(
            engine.activate_power_up(PowerUpKind::Hint),
            PowerUpOutcome::Rejected(Rejection::Locked)
        );
        assert_eq!(engine.progress().uses_remaining(PowerUpKind::Hint), 5);

        engine.advance(COMPARISON + FLIP_BACK);
        assert!(engine.activate_power_up(PowerUpKind::Shuffle).is_accepted());
        assert!(engine.activate_power_up(PowerUpKind::Shuffle).is_accepted());
        assert_eq!(
            engine.activate_power_up(PowerUpKind::Shuffle),
            PowerUpOutcome::Rejected(Rejection::NoUsesLeft)
        );
    }

    #[test_context(UsingLogger)]
    #[test]
    fn test_pause_clears_power_up_effects(_: &mut UsingLogger) {
        let mut harness = started(Difficulty::Easy);
        let engine = &mut harness.engine;
        engine.select_card(0);
        engine.activate_power_up(PowerUpKind::Hint);

        engine.pause();
        assert!(session(engine).cards.iter().all(|card| !card.hinted));
        assert_eq!(
            engine.activate_power_up(PowerUpKind::Reveal),
            PowerUpOutcome::Rejected(Rejection::Paused)
        );
    }

    #[test_context(UsingLogger)]
    #[test]
    fn test_failed_start_keeps_current_session(_: &mut UsingLogger) {
        let mut harness = started(Difficulty::Easy);
        let engine = &mut harness.engine;
        let before = session(engine).clone();
        engine.set_face_pool(FacePool::new(vec![FaceValue(1), FaceValue(2)]).unwrap());

        assert!(engine.start_session(Difficulty::Easy).is_err());
        assert_eq!(session(engine), &before);
    }

    #[test_context(UsingLogger)]
    #[test]
    fn test_hard_win_unlocks_master(_: &mut UsingLogger) {
        let mut harness = started(Difficulty::Hard);
        for pair in pairs(&harness.engine) {
            play_pair(&mut harness.engine, pair);
        }

        assert_eq!(unlocked_events(&harness, AchievementId::Master), 1);
        // first match, speed demon, perfect game, master
        assert_eq!(harness.engine.progress().unlocked_count(), 4);
        assert!(!harness.engine.progress().is_unlocked(AchievementId::Collector));
    }

    #[test_context(UsingLogger)]
    #[test]
    fn test_sound_follows_settings(_: &mut UsingLogger) {
        let mut harness = started(Difficulty::Easy);
        harness.engine.change_settings(&SettingsChange {
            sound_enabled: Some(false),
            ..Default::default()
        });
        harness.events.borrow_mut().clear();

        harness.engine.select_card(0);
        assert!(!harness
            .events
            .borrow()
            .iter()
            .any(|event| matches!(event, GameEngineEvent::Sound(_))));
        assert!(!harness.storage.snapshot().unwrap().settings.sound_enabled);
    }

    fn take_sounds(harness: &Harness) -> Vec<SoundEvent> {
        harness
            .events
            .borrow_mut()
            .drain(..)
            .filter_map(|event| match event {
                GameEngineEvent::Sound(sound) => Some(sound),
                _ => None,
            })
            .collect()
    }

    #[test_context(UsingLogger)]
    #[test]
    fn test_sound_cues_follow_play(_: &mut UsingLogger) {
        use SoundEvent::*;

        let mut harness = started(Difficulty::Easy);
        let (first, second) = mismatched(&harness.engine);
        harness.engine.select_card(first);
        harness.engine.select_card(second);
        harness.engine.advance(COMPARISON + FLIP_BACK);
        assert_eq!(take_sounds(&harness), vec![Flip, Flip, Mismatch]);

        harness.engine.start_session_with_seed(Difficulty::Easy, 42).unwrap();
        assert_eq!(take_sounds(&harness), vec![Shuffle]);
        for pair in pairs(&harness.engine) {
            play_pair(&mut harness.engine, pair);
        }
        let mut expected = vec![Flip, Flip, Match, Achievement];
        for _ in 0..4 {
            expected.extend([Flip, Flip, Match]);
        }
        // first match, then speed demon and perfect game at the win
        expected.extend([Flip, Flip, Match, Achievement, Achievement, Win]);
        assert_eq!(take_sounds(&harness), expected);

        harness.engine.start_session_with_seed(Difficulty::Easy, 43).unwrap();
        harness.events.borrow_mut().clear();
        assert!(harness.engine.activate_power_up(PowerUpKind::Hint).is_accepted());
        assert_eq!(take_sounds(&harness), vec![PowerUp]);
    }

    #[test_context(UsingLogger)]
    #[test]
    fn test_unavailable_storage_is_reported_not_fatal(_: &mut UsingLogger) {
        let (emitter, observer) = Channel::<GameEngineEvent>::new();
        let failures = Rc::new(RefCell::new(0));
        let failures_clone = failures.clone();
        let _subscription = observer.subscribe(move |event: &GameEngineEvent| {
            if matches!(event, GameEngineEvent::PersistenceFailed(_)) {
                *failures_clone.borrow_mut() += 1;
            }
        });
        let progress = ProgressStore::load(Box::new(MemoryStorage::unavailable()));
        let mut engine = GameEngine::with_progress(progress, emitter);

        engine.start_session_with_seed(Difficulty::Easy, 1).unwrap();
        assert!(engine.activate_power_up(PowerUpKind::Hint).is_accepted());
        assert_eq!(*failures.borrow(), 1);
    }

    #[test_context(UsingLogger)]
    #[test]
    fn test_commands_drive_wired_engine(_: &mut UsingLogger) {
        let (command_emitter, command_observer) = Channel::<GameEngineCommand>::new();
        let (event_emitter, _event_observer) = Channel::<GameEngineEvent>::new();
        let engine = GameEngine::new(command_observer, event_emitter, ProgressStore::in_memory());

        command_emitter.emit(GameEngineCommand::NewGame(Some(Difficulty::Medium)));
        command_emitter.emit(GameEngineCommand::SelectCard(0));
        command_emitter.emit(GameEngineCommand::Advance(Duration::from_millis(1500)));
        {
            let engine = engine.borrow();
            let session = engine.session().unwrap();
            assert_eq!(session.difficulty, Difficulty::Medium);
            assert_eq!(session.elapsed_seconds, 1);
            assert!(session.cards[0].flipped);
        }

        engine.borrow_mut().destroy();
        command_emitter.emit(GameEngineCommand::SelectCard(1));
        assert!(!engine.borrow().session().unwrap().cards[1].flipped);
    }
}
