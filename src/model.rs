use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::token::GameToken;

/// Time budget given to answer a single question, in seconds.
pub const TIME_LIMIT: u64 = 30;
/// Number of attempts permitted on a single question before it is marked wrong.
pub const NUM_ATTEMPTS: u32 = 2;
/// Maximum points a perfectly-timed, first-attempt answer is worth.
pub const MAX_POINTS: f64 = 1000.0;

/// A single multiple-choice question. `options` maps an option key (all
/// sharing one case, typically "A".."D") to its display text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub options: HashMap<String, String>,
    pub answer: String,
}

/// The immutable header for a game, stored under the `game` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub code: GameToken,
    pub questions: Vec<Question>,
    pub start_time: Option<f64>,
}

/// Game lifecycle state, stored under the `state` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GameState {
    Waiting,
    Started,
    Paused,
    Ended,
}

/// A single player's progress through the game, stored under the `players`
/// key as part of a name -> Player map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: uuid::Uuid,
    pub score: i64,
    pub remaining_questions: Vec<usize>,
    pub correct_questions: Vec<usize>,
    pub incorrect_questions: Vec<usize>,
    pub current_question_index: i64,
    pub question_start_time: Option<f64>,
    pub question_attempt: u32,
    pub websocket_id: Option<uuid::Uuid>,
    pub github_avatar: Option<String>,
}

impl Player {
    /// Registers a fresh player with a shuffled question order, as per the
    /// source's `random.sample(range(len(questions)), len(questions))`.
    pub fn new(num_questions: usize, github_avatar: Option<String>) -> Self {
        use rand::seq::SliceRandom;

        let mut remaining_questions: Vec<usize> = (0..num_questions).collect();
        remaining_questions.shuffle(&mut rand::thread_rng());

        Self {
            id: uuid::Uuid::new_v4(),
            score: 0,
            remaining_questions,
            correct_questions: Vec::new(),
            incorrect_questions: Vec::new(),
            current_question_index: -1,
            question_start_time: None,
            question_attempt: 0,
            websocket_id: None,
            github_avatar,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.current_question_index == -1
    }

    /// `score / (correct + incorrect)` truncating, 0 when there have been no
    /// answered questions yet.
    pub fn avg_score(&self) -> i64 {
        let answered = (self.correct_questions.len() + self.incorrect_questions.len()) as i64;
        if answered == 0 {
            0
        } else {
            self.score / answered
        }
    }
}

pub type Players = HashMap<String, Player>;

/// Per-game cache of hint text, keyed by question index then wrong option key.
pub type AiCache = HashMap<usize, HashMap<String, String>>;
