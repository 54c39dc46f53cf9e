use std::sync::LazyLock;

use regex::Regex;

/// Longest deployment name telepresence accepts.
pub const MAX_NAME_LENGTH: usize = 57;

/// Anything that can never appear inside a DNS-1123 label.
static INVALID_CHAR_RX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^-a-z0-9]").expect("static regex"));

static DELIMITER_RX: LazyLock<Regex> = LazyLock::new(|| Regex::new("-+").expect("static regex"));

/// Characters that must be quoted before a token is forwarded to `bash -c`.
static SPECIAL_CHAR_RX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\]\^\\\[.()\-]").expect("static regex"));

/// Converts an arbitrary string into a name usable as a telepresence deployment.
///
/// The result is either empty or matches `[a-z0-9]([-a-z0-9]*[a-z0-9])?`
/// and is at most [`MAX_NAME_LENGTH`] characters long. Applying it twice
/// gives the same result as applying it once.
pub fn to_valid_name(raw: &str) -> String {
    let lowered = raw.to_lowercase();

    // Alphanumerics always belong to some label match and interior hyphens
    // are kept, so every other character is replaced one by one.
    let replaced = INVALID_CHAR_RX.replace_all(&lowered, "-");
    let collapsed = DELIMITER_RX.replace_all(&replaced, "-");
    let collapsed: &str = &collapsed;

    // Only ASCII survives the replacement, so byte slicing is safe.
    let truncated = if collapsed.len() > MAX_NAME_LENGTH {
        &collapsed[..MAX_NAME_LENGTH]
    } else {
        collapsed
    };

    truncated.trim_matches('-').to_string()
}

/// Wraps `s` in single quotes when it contains a shell-special character.
pub fn special_str(s: &str) -> String {
    if SPECIAL_CHAR_RX.is_match(s) {
        format!("'{}'", s)
    } else {
        s.to_string()
    }
}
