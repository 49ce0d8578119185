//! Input handling.
//!
//! A graphical client would capture arrow keys from its window. The console
//! client maps typed words instead; both end up as a [`KeyCode`] that the
//! session turns into a `press_key` message.

use sync_shared::protocol::KeyCode;

/// Maps one console token to a key. Accepts the wire names, arrow words and
/// WASD, case-insensitively.
pub fn parse_key(token: &str) -> Option<KeyCode> {
    if let Some(key) = KeyCode::from_code(token) {
        return Some(key);
    }
    match token.to_ascii_lowercase().as_str() {
        "up" | "w" => Some(KeyCode::ArrowUp),
        "down" | "s" => Some(KeyCode::ArrowDown),
        "left" | "a" => Some(KeyCode::ArrowLeft),
        "right" | "d" => Some(KeyCode::ArrowRight),
        _ => None,
    }
}

/// Maps a whole line such as `up up right` to keys, stopping at the first
/// unknown token.
pub fn parse_keys(line: &str) -> Result<Vec<KeyCode>, String> {
    line.split_whitespace()
        .map(|t| parse_key(t).ok_or_else(|| t.to_string()))
        .collect()
}
