//! Pure volleyball scoring rules and input checks. No state in here; the
//! store and adapters call these to decide transitions.

use super::team::{MAX_SCORE, ROTATION_SLOTS};

pub const TEAM_NAME_MAX_LEN: usize = 30;

/// A set is won once a side reaches the target with the required advantage.
pub fn check_set_win(score_a: u8, score_b: u8, target_points: u8, min_advantage: u8) -> bool {
    let max = score_a.max(score_b);
    let min = score_a.min(score_b);
    max >= target_points && max - min >= min_advantage
}

/// The match is won once a side holds the majority of `max_sets`.
pub fn check_game_win(sets_a: u8, sets_b: u8, max_sets: u8) -> bool {
    sets_a.max(sets_b) >= (max_sets + 1) / 2
}

pub fn validate_score(score: u8) -> bool {
    score <= MAX_SCORE
}

/// True iff `rotation` is a permutation of 1..=6.
pub fn validate_rotation(rotation: &[u8; ROTATION_SLOTS]) -> bool {
    let mut seen = [false; ROTATION_SLOTS];
    for &player in rotation {
        if !(1..=ROTATION_SLOTS as u8).contains(&player) {
            return false;
        }
        let slot = (player - 1) as usize;
        if seen[slot] {
            return false;
        }
        seen[slot] = true;
    }
    true
}

/// Hex color in `#RGB` or `#RRGGBB` form.
pub fn validate_color(color: &str) -> bool {
    let Some(digits) = color.strip_prefix('#') else {
        return false;
    };
    (digits.len() == 3 || digits.len() == 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

/// Trim, collapse internal whitespace, and cap the length. May return an
/// empty string; callers reject that case.
pub fn sanitize_team_name(name: &str) -> String {
    let collapsed: Vec<&str> = name.split_whitespace().collect();
    let mut sanitized = collapsed.join(" ");
    if sanitized.chars().count() > TEAM_NAME_MAX_LEN {
        sanitized = sanitized.chars().take(TEAM_NAME_MAX_LEN).collect();
    }
    sanitized
}

/// One point away from taking the set.
pub fn is_set_point(team_score: u8, opponent_score: u8, target_points: u8, min_advantage: u8) -> bool {
    team_score + 1 >= target_points
        && i16::from(team_score) - i16::from(opponent_score) >= i16::from(min_advantage) - 1
}

/// Set point in a set that would also close out the match.
pub fn is_match_point(
    team_sets: u8,
    max_sets: u8,
    team_score: u8,
    opponent_score: u8,
    target_points: u8,
    min_advantage: u8,
) -> bool {
    let sets_to_win = (max_sets + 1) / 2;
    team_sets + 1 == sets_to_win
        && is_set_point(team_score, opponent_score, target_points, min_advantage)
}
