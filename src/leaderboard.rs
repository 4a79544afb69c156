use serde::Serialize;

use crate::model::Players;

/// Aggregate metrics for one player, as pushed to the host on each tick.
#[derive(Debug, Serialize)]
pub struct PlayerMetrics {
    pub score: i64,
    pub avg_score: i64,
    pub correct_questions: Vec<usize>,
    pub incorrect_questions: Vec<usize>,
    pub remaining_questions: Vec<usize>,
    pub github_avatar: Option<String>,
}

/// Builds the `player_metrics` map pushed to the host, grounded on the
/// original's `get_players_metrics`.
pub fn players_metrics(players: &Players) -> std::collections::HashMap<String, PlayerMetrics> {
    players
        .iter()
        .map(|(name, player)| {
            (
                name.clone(),
                PlayerMetrics {
                    score: player.score,
                    avg_score: player.avg_score(),
                    correct_questions: player.correct_questions.clone(),
                    incorrect_questions: player.incorrect_questions.clone(),
                    remaining_questions: player.remaining_questions.clone(),
                    github_avatar: player.github_avatar.clone(),
                },
            )
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct LeaderboardNeighbor {
    pub player_name: String,
    pub avg_score: i64,
    pub github_avatar: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RelativeLeaderboard {
    pub ahead: Option<LeaderboardNeighbor>,
    pub behind: Option<LeaderboardNeighbor>,
    pub place: usize,
    pub score: i64,
    pub avg_score: i64,
}

/// The per-player relative leaderboard view: nearest-ahead, nearest-behind,
/// and rank. Grounded on the original's `get_relative_leaderboard`.
pub fn relative_leaderboard(players: &Players, for_player: &str) -> Option<RelativeLeaderboard> {
    let me = players.get(for_player)?;
    let my_avg = me.avg_score();

    let mut ahead: Option<(&str, i64, Option<String>)> = None;
    let mut behind: Option<(&str, i64, Option<String>)> = None;
    let mut place = 1usize;

    for (name, other) in players.iter() {
        if name == for_player {
            continue;
        }
        let their_avg = other.avg_score();

        if their_avg > my_avg {
            place += 1;
            if ahead.map_or(true, |(_, avg, _)| their_avg < avg) {
                ahead = Some((name, their_avg, other.github_avatar.clone()));
            }
        } else if their_avg < my_avg && behind.map_or(true, |(_, avg, _)| their_avg > avg) {
            behind = Some((name, their_avg, other.github_avatar.clone()));
        }
    }

    Some(RelativeLeaderboard {
        ahead: ahead.map(|(name, avg_score, github_avatar)| LeaderboardNeighbor {
            player_name: name.to_string(),
            avg_score,
            github_avatar,
        }),
        behind: behind.map(|(name, avg_score, github_avatar)| LeaderboardNeighbor {
            player_name: name.to_string(),
            avg_score,
            github_avatar,
        }),
        place,
        score: me.score,
        avg_score: my_avg,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Player;

    fn player_with(score: i64, correct: usize, incorrect: usize) -> Player {
        let mut p = Player::new(10, None);
        p.score = score;
        p.correct_questions = (0..correct).collect();
        p.incorrect_questions = (0..incorrect).collect();
        p
    }

    #[test]
    fn avg_score_is_zero_with_no_answers() {
        let p = player_with(0, 0, 0);
        assert_eq!(p.avg_score(), 0);
    }

    #[test]
    fn avg_score_truncates() {
        let p = player_with(10, 3, 0);
        assert_eq!(p.avg_score(), 3);
    }

    #[test]
    fn place_counts_strictly_greater_players() {
        let mut players = Players::new();
        players.insert("alice".into(), player_with(900, 1, 0));
        players.insert("bob".into(), player_with(500, 1, 0));
        players.insert("carol".into(), player_with(100, 1, 0));

        let board = relative_leaderboard(&players, "bob").unwrap();
        assert_eq!(board.place, 2);
        assert_eq!(board.ahead.unwrap().player_name, "alice");
        assert_eq!(board.behind.unwrap().player_name, "carol");
    }

    #[test]
    fn top_player_has_no_one_ahead() {
        let mut players = Players::new();
        players.insert("alice".into(), player_with(900, 1, 0));
        players.insert("bob".into(), player_with(500, 1, 0));

        let board = relative_leaderboard(&players, "alice").unwrap();
        assert!(board.ahead.is_none());
        assert_eq!(board.place, 1);
    }

    #[test]
    fn computing_twice_is_idempotent() {
        let mut players = Players::new();
        players.insert("alice".into(), player_with(900, 1, 0));
        players.insert("bob".into(), player_with(500, 1, 0));

        let a = relative_leaderboard(&players, "bob").unwrap();
        let b = relative_leaderboard(&players, "bob").unwrap();
        assert_eq!(a.place, b.place);
        assert_eq!(a.avg_score, b.avg_score);
    }
}
