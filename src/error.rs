use crate::config::ConfigError;

/// Error returned by ID generation, encoding and decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Startup configuration was rejected. Fatal: the process should not start.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// The clock reported a time earlier than the last generated ID.
    #[error("clock moved backwards by {millis} ms")]
    ClockRegressed { millis: u64 },

    #[error("encoded id is empty")]
    EmptyInput,

    #[error("invalid character {character:?} at position {position}")]
    InvalidCharacter { character: char, position: usize },

    /// Valid base62 that does not correspond to any 64-bit value.
    #[error("encoded id is corrupted")]
    CorruptedId,

    /// Encode and decode disagreed. Only raised by explicit round-trip checks.
    #[error("id {id} decoded back as {decoded}")]
    RoundTripFailure { id: u64, decoded: u64 },
}

impl Error {
    /// Returns `true` for errors caused by a malformed identifier supplied from outside.
    ///
    /// Request boundaries should map these to a "not found" or "bad request" response and
    /// must not reveal which of them occurred.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::EmptyInput | Error::InvalidCharacter { .. } | Error::CorruptedId
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Identity;

    #[test]
    fn test_client_errors() {
        assert!(Error::EmptyInput.is_client_error());
        assert!(Error::CorruptedId.is_client_error());
        assert!(Error::InvalidCharacter {
            character: '!',
            position: 3
        }
        .is_client_error());

        assert!(!Error::ClockRegressed { millis: 5 }.is_client_error());
        assert!(!Error::RoundTripFailure { id: 1, decoded: 2 }.is_client_error());
        assert!(!Error::from(ConfigError::InvalidKeyLength { length: 16 }).is_client_error());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Error::ClockRegressed { millis: 12 }.to_string(),
            "clock moved backwards by 12 ms"
        );
        assert_eq!(
            Error::InvalidCharacter {
                character: '!',
                position: 3
            }
            .to_string(),
            "invalid character '!' at position 3"
        );
        assert_eq!(
            Error::from(ConfigError::InvalidIdentity {
                field: Identity::Worker,
                value: 32
            })
            .to_string(),
            "worker id 32 is out of range 0..=31"
        );
    }
}
