use fixed::types::U32F32;

use crate::model::Difficulty;

const BASE_MATCH: u32 = 100;
const COMPLETION_BONUS: u32 = 1000;
const TIME_BONUS_PER_SECOND: u32 = 2;
const MOVE_BONUS_PER_MOVE: u32 = 50;

const MATCH_TIME_WINDOW: u32 = 30;
const MATCH_MOVE_WINDOW: u32 = 10;
const COMPLETION_TIME_WINDOW: u32 = 120;
const COMPLETION_MOVE_WINDOW: u32 = 20;

struct ScoreShape {
    base: u32,
    time_window: u32,
    move_window: u32,
}

const MATCH: ScoreShape = ScoreShape {
    base: BASE_MATCH,
    time_window: MATCH_TIME_WINDOW,
    move_window: MATCH_MOVE_WINDOW,
};

const COMPLETION: ScoreShape = ScoreShape {
    base: COMPLETION_BONUS,
    time_window: COMPLETION_TIME_WINDOW,
    move_window: COMPLETION_MOVE_WINDOW,
};

fn shaped_score(shape: &ScoreShape, difficulty: Difficulty, elapsed_seconds: u32, moves: u32) -> u32 {
    let time_bonus = TIME_BONUS_PER_SECOND * shape.time_window.saturating_sub(elapsed_seconds);
    let move_bonus = MOVE_BONUS_PER_MOVE * shape.move_window.saturating_sub(moves);
    let raw = U32F32::from_num(shape.base + time_bonus + move_bonus);
    (raw * difficulty.multiplier()).floor().to_num::<u32>()
}

/// Points for one resolved pair. Bonuses shrink with time and moves and bottom
/// out at zero before the difficulty multiplier is applied.
pub fn score_for_match(difficulty: Difficulty, elapsed_seconds: u32, moves: u32) -> u32 {
    shaped_score(&MATCH, difficulty, elapsed_seconds, moves)
}

/// One-off bonus awarded when the board is cleared.
pub fn score_for_completion(difficulty: Difficulty, elapsed_seconds: u32, moves: u32) -> u32 {
    shaped_score(&COMPLETION, difficulty, elapsed_seconds, moves)
}

/// Score of a flawless game finished at zero seconds: the k-th match lands on move k.
pub fn max_possible_score(difficulty: Difficulty, pairs: u32) -> u32 {
    let matches: u32 = (1..=pairs)
        .map(|moves| score_for_match(difficulty, 0, moves))
        .sum();
    matches + score_for_completion(difficulty, 0, pairs)
}

/// 0..=3 stars at 50%, 70% and 90% of the best achievable score.
pub fn star_rating(score: u32, max_possible_score: u32) -> u8 {
    if max_possible_score == 0 {
        return 0;
    }
    let percentage = u64::from(score) * 100 / u64::from(max_possible_score);
    match percentage {
        90.. => 3,
        70..=89 => 2,
        50..=69 => 1,
        _ => 0,
    }
}
