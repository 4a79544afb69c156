use crate::model::{MAX_POINTS, TIME_LIMIT};

const WRONG_MULTIPLIER: f64 = 0.65;
const TIME_MULTIPLIER: f64 = 0.75;
const SCALING_FACTOR: f64 = 0.025;

/// Points awarded for an answer, as a function of how long it took to
/// arrive and which attempt (0-based) it was.
///
/// Grounded on the original's `get_score`: a logarithmic time-decay term
/// combined with an exponential per-attempt decay term.
pub fn score(attempt_index: u32, elapsed_secs: f64) -> i64 {
    let time_limit = TIME_LIMIT as f64;
    let t = elapsed_secs.clamp(0.0, time_limit);

    let time_coef = TIME_MULTIPLIER
        + (1.0 - TIME_MULTIPLIER) * (1.0 + SCALING_FACTOR * (time_limit - t)).ln()
            / (1.0 + SCALING_FACTOR * time_limit).ln();
    let wrong_coef = WRONG_MULTIPLIER.powi(attempt_index as i32);

    (MAX_POINTS * (wrong_coef * time_coef).max(0.0)).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_marks_for_instant_first_attempt() {
        assert_eq!(score(0, 0.0), MAX_POINTS as i64);
    }

    #[test]
    fn time_decay_at_full_window_matches_time_multiplier() {
        assert_eq!(score(0, 30.0), (MAX_POINTS * TIME_MULTIPLIER).round() as i64);
    }

    #[test]
    fn second_attempt_at_zero_elapsed_matches_wrong_multiplier() {
        assert_eq!(score(1, 0.0), (MAX_POINTS * WRONG_MULTIPLIER).round() as i64);
    }

    #[test]
    fn monotonic_non_increasing_in_elapsed_time() {
        let mut previous = score(0, 0.0);
        for t in 1..=30 {
            let current = score(0, t as f64);
            assert!(current <= previous, "score increased at t={t}");
            previous = current;
        }
    }

    #[test]
    fn monotonic_non_increasing_in_attempt_index() {
        assert!(score(1, 5.0) <= score(0, 5.0));
    }

    #[test]
    fn elapsed_past_limit_is_clamped() {
        assert_eq!(score(0, 45.0), score(0, 30.0));
    }
}
