use std::time::Duration;

pub(crate) fn retriable_status(code: u16) -> bool {
    (500..600).contains(&code)
}

/// `base * 2^attempt`, capped at `max`.
pub(crate) fn backoff(base: Duration, attempt: usize, max: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.min(31) as u32);
    base.checked_mul(factor).map_or(max, |d| d.min(max))
}

/// Shortens a response body for log lines.
pub(crate) fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
