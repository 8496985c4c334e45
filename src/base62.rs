//! Base62 text encoding of 64-bit values over `A-Z`, `a-z`, `0-9`.

use crate::Error;

/// The digit alphabet; index 0 is `A`.
pub const ALPHABET: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

const BASE: u64 = 62;

// Longest base62 rendering of a u64 ("V8qRkBGKRiP").
const MAX_DIGITS: usize = 11;

/// Encodes `num` most significant digit first, without padding. Zero is `"A"`.
pub fn encode(mut num: u64) -> String {
    let mut digits = [0u8; MAX_DIGITS];
    let mut start = MAX_DIGITS;
    loop {
        start -= 1;
        digits[start] = ALPHABET[(num % BASE) as usize];
        num /= BASE;
        if num == 0 {
            break;
        }
    }
    digits[start..].iter().map(|&b| b as char).collect()
}

/// Decodes a base62 string.
///
/// The whole string is checked before any digit is consumed. Only canonical encodings
/// are accepted, so every value has exactly one string.
///
/// # Errors
///
/// - [`Error::EmptyInput`] for an empty string.
/// - [`Error::InvalidCharacter`] for the first character outside the alphabet.
/// - [`Error::CorruptedId`] for a leading zero digit (`A`) or a value that does not fit
///   in 64 bits.
pub fn decode(encoded: &str) -> Result<u64, Error> {
    if encoded.is_empty() {
        return Err(Error::EmptyInput);
    }
    let invalid = encoded.chars().enumerate().find(|(_, c)| digit(*c).is_none());
    if let Some((position, character)) = invalid {
        return Err(Error::InvalidCharacter {
            character,
            position,
        });
    }
    if encoded.len() > 1 && encoded.starts_with('A') {
        return Err(Error::CorruptedId);
    }

    encoded.bytes().try_fold(0u64, |acc, b| {
        let value = digit(b as char).ok_or(Error::CorruptedId)?;
        acc.checked_mul(BASE)
            .and_then(|acc| acc.checked_add(value))
            .ok_or(Error::CorruptedId)
    })
}

/// Returns `true` if every character of `encoded` is in the alphabet.
pub fn is_valid(encoded: &str) -> bool {
    encoded.chars().all(|c| digit(c).is_some())
}

fn digit(c: char) -> Option<u64> {
    let value = match c {
        'A'..='Z' => c as u64 - 'A' as u64,
        'a'..='z' => c as u64 - 'a' as u64 + 26,
        '0'..='9' => c as u64 - '0' as u64 + 52,
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        let test_cases = vec![
            (0, "A"),
            (1, "B"),
            (25, "Z"),
            (26, "a"),
            (52, "0"),
            (61, "9"),
            (62, "BA"),
            (u64::MAX, "V8qRkBGKRiP"),
        ];

        for (input, expected) in test_cases {
            assert_eq!(encode(input), expected);
            assert_eq!(decode(expected).unwrap(), input);
        }
    }

    #[test]
    fn test_alphabet_matches_digits() {
        for (i, &b) in ALPHABET.iter().enumerate() {
            assert_eq!(digit(b as char), Some(i as u64));
        }
    }

    #[test]
    fn test_leading_zero_digits_rejected() {
        assert_eq!(decode("A").unwrap(), 0);
        assert_eq!(decode("AB"), Err(Error::CorruptedId));
        assert_eq!(decode("AAAA"), Err(Error::CorruptedId));
        assert_eq!(decode("AUzJkGbZokgp"), Err(Error::CorruptedId));
        // Invalid characters are still reported first.
        assert_eq!(
            decode("AB!"),
            Err(Error::InvalidCharacter {
                character: '!',
                position: 2
            })
        );
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(decode(""), Err(Error::EmptyInput));
        assert_eq!(
            decode("abc!def"),
            Err(Error::InvalidCharacter {
                character: '!',
                position: 3
            })
        );
        // The first offending character is reported, even after valid-looking input.
        assert_eq!(
            decode("ab-c+"),
            Err(Error::InvalidCharacter {
                character: '-',
                position: 2
            })
        );
        assert_eq!(
            decode("Aé"),
            Err(Error::InvalidCharacter {
                character: 'é',
                position: 1
            })
        );

        // One past u64::MAX.
        assert_eq!(decode("V8qRkBGKRiQ"), Err(Error::CorruptedId));
        assert_eq!(decode("BAAAAAAAAAAA"), Err(Error::CorruptedId));
    }

    #[test]
    fn test_is_valid() {
        assert!(is_valid("UzJkGbZojcM"));
        assert!(is_valid(""));
        assert!(!is_valid("abc!def"));
        assert!(!is_valid("with space"));
        assert!(!is_valid("under_score"));
    }
}
