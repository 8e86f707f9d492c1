use std::sync::LazyLock;

use regex::Regex;

/// Placeholder shown when nothing usable survives cleanup.
pub const UNTITLED: &str = "Untitled File";

/// Group key used when a caption scrubs down to nothing.
pub const UNKNOWN_GROUP: &str = "unknown";

/// Promotional banner stripped verbatim before the general rules run.
const BANNER: &str = "⭕️ Main Channel : @Handle ⭕️";

static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@\w+").unwrap());
static PROMO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:main channel|join channel)[^\n]*").unwrap());

/// Strip promotional boilerplate from a caption. May return an empty string.
///
/// Rule order is load-bearing: the exact banner literal first, then generic
/// `@mention` tokens, then anything from a promotional keyword to the end of
/// its line.
fn scrub(text: &str) -> String {
    let cleaned = text.replace(BANNER, "");
    let cleaned = MENTION_RE.replace_all(&cleaned, "");
    let cleaned = PROMO_RE.replace_all(&cleaned, "");
    cleaned.trim().to_string()
}

/// Normalize a free-form caption for display. Never returns an empty string.
pub fn normalize(raw: Option<&str>) -> String {
    let cleaned = raw.map(scrub).unwrap_or_default();
    if cleaned.is_empty() {
        UNTITLED.to_string()
    } else {
        cleaned
    }
}

/// Derive a consolidation key: the first two scrubbed words, lower-cased and
/// space-joined; one word stands alone; nothing at all maps to the
/// [`UNKNOWN_GROUP`] sentinel.
///
/// Lossy on purpose: titles sharing a two-word prefix collide, which is
/// exactly what batch consolidation wants.
pub fn group_key(raw: Option<&str>) -> String {
    let cleaned = raw.map(scrub).unwrap_or_default();
    let mut words = cleaned.split_whitespace();
    match (words.next(), words.next()) {
        (Some(first), Some(second)) => {
            format!("{} {}", first.to_lowercase(), second.to_lowercase())
        }
        (Some(first), None) => first.to_lowercase(),
        _ => UNKNOWN_GROUP.to_string(),
    }
}
