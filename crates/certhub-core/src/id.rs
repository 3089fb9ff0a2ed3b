//! Short certificate-identifier generation.
//!
//! A certificate identifier is `{event_code}-{shortcode}` where the short
//! code is 6-8 lowercase base-36 characters derived by hashing the mint
//! context together with a timestamp and a random nonce. The generator is
//! probabilistic only; actual uniqueness is the uniqueness resolver's job.

use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn to_base36(mut n: u32) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    // Only ASCII digits/letters end up in the buffer
    String::from_utf8(digits).unwrap_or_default()
}

/// Derive a short lowercase code (6-8 characters) from input data.
///
/// The first four bytes of the SHA-256 digest, re-encoded in base 36 and
/// left-padded with zeros to at least six characters.
pub fn short_code(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let n = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    let mut code = to_base36(n);
    code.truncate(8);
    format!("{code:0>6}")
}

/// Generate a candidate certificate identifier, e.g. `mun24-sbsj23`.
///
/// The context fields namespace the code per event and add variability; the
/// timestamp and nonce make two calls differ even for identical context.
pub fn generate(event_code: &str, year: i64, participant_name: &str, school: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let nonce: u64 = rand::random();
    let input = format!("{event_code}-{year}-{participant_name}-{school}-{millis}-{nonce}");
    format!("{}-{}", event_code.to_lowercase(), short_code(&input))
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn short_code_is_deterministic() {
        assert_eq!(short_code("hello"), short_code("hello"));
        assert_ne!(short_code("hello"), short_code("world"));
    }

    #[test]
    fn short_code_length_and_charset() {
        for input in ["a", "some longer input", "", "MUN24-2024-Jane Doe-N/A"] {
            let code = short_code(input);
            assert!((6..=8).contains(&code.len()), "code: {code}");
            assert!(
                code.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()),
                "code: {code}"
            );
        }
    }

    #[test]
    fn generate_prefixes_lowercased_event_code() {
        let id = generate("MUN24", 2024, "Jane Doe", "Springfield High");
        assert!(id.starts_with("mun24-"), "id: {id}");
    }

    #[test]
    fn generate_is_url_safe() {
        let id = generate("MUN24", 2024, "Jane Doe", "Springfield High");
        assert!(
            id.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'),
            "id: {id}"
        );
    }

    #[test]
    fn generate_differs_across_calls() {
        let a = generate("mun24", 2024, "Jane", "School");
        let b = generate("mun24", 2024, "Jane", "School");
        assert_ne!(a, b);
    }
}
