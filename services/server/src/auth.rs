//! Token validation against the single configured shared secret. Every
//! authenticated session shares the same secret; there is no per-device
//! claim to look up.

/// Compares in constant time so that response latency cannot be used to
/// probe the configured token one byte at a time.
pub fn token_matches(configured: &str, candidate: &str) -> bool {
    let configured = configured.as_bytes();
    let candidate = candidate.as_bytes();
    if configured.len() != candidate.len() {
        return false;
    }
    let mut diff = 0u8;
    for (a, b) in configured.iter().zip(candidate.iter()) {
        diff |= a ^ b;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_tokens_compare_equal() {
        assert!(token_matches("secret", "secret"));
    }

    #[test]
    fn mismatched_tokens_compare_unequal() {
        assert!(!token_matches("secret", "wrong"));
    }

    #[test]
    fn different_lengths_compare_unequal() {
        assert!(!token_matches("secret", "secretlonger"));
    }
}
