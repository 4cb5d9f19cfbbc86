//! Answer comparison for quiz submissions.
//!
//! A string consisting only of `0`/`1` is read as binary; anything else is
//! read as decimal; two parsed values compare numerically. If either side
//! fails to parse at all, comparison falls back to case-insensitive string
//! equality. A purely binary-looking decimal (e.g. `"10"`) is therefore
//! read as binary on both sides; that asymmetry is intentional, long-lived
//! grading behavior and must not be "fixed".

fn looks_binary(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b == b'0' || b == b'1')
}

fn parse_answer(s: &str) -> Option<i64> {
    if looks_binary(s) {
        i64::from_str_radix(s, 2).ok()
    } else {
        s.parse::<i64>().ok()
    }
}

/// Compares a provided answer against the expected canonical answer.
#[must_use]
pub fn answers_match(expected: &str, provided: &str) -> bool {
    let expected = expected.trim();
    let provided = provided.trim();

    match (parse_answer(expected), parse_answer(provided)) {
        (Some(e), Some(p)) => e == p,
        _ => expected.eq_ignore_ascii_case(provided),
    }
}
