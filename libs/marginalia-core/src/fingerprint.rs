//! Content fingerprinting for duplicate detection.
//!
//! Imports from e-readers re-deliver the same passages over and over, so
//! every highlight carries a short fingerprint of its opening text. The hash
//! is intentionally lossy: collisions and near-duplicates that differ past
//! the sampled prefix are accepted in exchange for a cheap, index-friendly
//! key. Clients compute the same value, so the algorithm must stay fixed:
//! no platform string hashing, no randomized seeds.

/// Number of leading characters sampled into the fingerprint.
const PREFIX_LEN: usize = 100;

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Fingerprint a highlight's content.
///
/// The first [`PREFIX_LEN`] characters are lowercased, whitespace runs are
/// collapsed to single spaces and the result is trimmed, then folded into a
/// wrapping 32-bit `hash * 31 + char` accumulator and base-36 encoded.
/// Two highlights are treated as the same passage iff their fingerprints
/// match.
pub fn fingerprint(content: &str) -> String {
    let prefix: String = content.chars().take(PREFIX_LEN).collect();
    let normalized = normalize(&prefix);

    let mut hash: i32 = 0;
    for ch in normalized.chars() {
        hash = hash.wrapping_mul(31).wrapping_add(ch as i32);
    }
    encode_base36(hash)
}

/// Lowercase, collapse whitespace runs to a single space, trim both ends.
fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_space = false;
    for ch in lowered.chars() {
        if ch.is_whitespace() {
            pending_space = true;
        } else {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(ch);
        }
    }
    out
}

/// Base-36 encode a signed 32-bit value, `-` prefixed when negative.
fn encode_base36(value: i32) -> String {
    if value == 0 {
        return "0".to_string();
    }
    // Widen before abs so i32::MIN encodes cleanly.
    let mut magnitude = (value as i64).unsigned_abs();
    let mut digits = String::new();
    while magnitude > 0 {
        digits.push(BASE36_DIGITS[(magnitude % 36) as usize] as char);
        magnitude /= 36;
    }
    if value < 0 {
        digits.push('-');
    }
    digits.chars().rev().collect()
}
