//! Cache key builders
//!
//! Keys are plain strings chosen by the caller; these helpers keep the
//! formats used across the application in one place.

use sha2::{Digest, Sha256};

/// Key for an exchange rate pair, e.g. `rate:USD:EUR`
pub fn exchange_rate_key(from: &str, to: &str) -> String {
    format!(
        "rate:{}:{}",
        from.trim().to_uppercase(),
        to.trim().to_uppercase()
    )
}

/// Key for a corridor cost baseline, e.g. `corridor:NG:CA`
pub fn corridor_key(origin: &str, destination: &str) -> String {
    format!(
        "corridor:{}:{}",
        origin.trim().to_uppercase(),
        destination.trim().to_uppercase()
    )
}

/// Key for a memoised translation: target language plus a SHA-256 of the source text
pub fn translation_key(text: &str, target_lang: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!(
        "translation:{}:{}",
        target_lang.trim().to_lowercase(),
        hex::encode(digest)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_rate_key() {
        assert_eq!(exchange_rate_key("usd", " eur "), "rate:USD:EUR");
    }

    #[test]
    fn test_corridor_key() {
        assert_eq!(corridor_key("ng", "CA"), "corridor:NG:CA");
    }

    #[test]
    fn test_translation_key_is_stable_and_distinct() {
        let a = translation_key("Where do I apply?", "DE");
        let b = translation_key("Where do I apply?", "de");
        let c = translation_key("Where do I apply?", "fr");
        let d = translation_key("Where do I apply!", "de");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert!(a.starts_with("translation:de:"));
        // 64 hex chars of SHA-256
        assert_eq!(a.len(), "translation:de:".len() + 64);
    }
}
