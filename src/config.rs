use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;

/// Required length of the encryption key in bytes (AES-256).
pub const KEY_LENGTH: usize = 32;

/// Environment variable read by [`Config::from_env`].
pub const DEFAULT_SECRET_VAR: &str = "OPAQUE_ID_SECRET";

const HEX_PREFIX: &str = "hex:";
const BASE64_PREFIX: &str = "base64:";

static GLOBAL_CONFIG: Lazy<Mutex<Option<Config>>> = Lazy::new(|| Mutex::new(None));
static GLOBAL_GENERATION: AtomicU64 = AtomicU64::new(0);

/// Which generator identity failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Worker,
    Datacenter,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Identity::Worker => write!(f, "worker"),
            Identity::Datacenter => write!(f, "datacenter"),
        }
    }
}

/// Startup configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} id {value} is out of range 0..=31")]
    InvalidIdentity { field: Identity, value: u32 },

    #[error("secret key is not valid {scheme}")]
    InvalidKeyEncoding { scheme: &'static str },

    #[error("secret key must be 32 bytes, got {length}")]
    InvalidKeyLength { length: usize },

    #[error("environment variable {var} is not set")]
    MissingKey { var: String },

    #[error("no global id configuration has been set")]
    NotConfigured,
}

/// Configuring the ID codec.
///
/// Holds the validated AES-256 key. All validation happens here, so that a process
/// with a bad secret fails at startup instead of on its first request.
#[derive(Clone)]
pub struct Config {
    pub(crate) key: [u8; KEY_LENGTH],
}

impl Config {
    /// Creates a configuration from raw key bytes, which must be exactly 32 bytes long.
    pub fn new(key: &[u8]) -> Result<Self, ConfigError> {
        let key: [u8; KEY_LENGTH] = key
            .try_into()
            .map_err(|_| ConfigError::InvalidKeyLength { length: key.len() })?;
        Ok(Config { key })
    }

    /// Creates a configuration from a textual secret.
    ///
    /// The secret is either `hex:<hex>`, `base64:<base64>`, or bare hex.
    ///
    /// ```
    /// use opaque_id::Config;
    ///
    /// let secret = "base64:AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=";
    /// assert!(Config::from_secret(secret).is_ok());
    /// assert!(Config::from_secret("hex:0011").is_err());
    /// ```
    pub fn from_secret(secret: &str) -> Result<Self, ConfigError> {
        let secret = secret.trim();
        let bytes = if let Some(rest) = secret.strip_prefix(BASE64_PREFIX) {
            STANDARD
                .decode(rest)
                .map_err(|_| ConfigError::InvalidKeyEncoding { scheme: "base64" })?
        } else {
            let rest = secret.strip_prefix(HEX_PREFIX).unwrap_or(secret);
            hex::decode(rest).map_err(|_| ConfigError::InvalidKeyEncoding { scheme: "hex" })?
        };
        Config::new(&bytes)
    }

    /// Reads the secret from the `OPAQUE_ID_SECRET` environment variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::from_env_var(DEFAULT_SECRET_VAR)
    }

    /// Reads the secret from the named environment variable.
    pub fn from_env_var(var: &str) -> Result<Self, ConfigError> {
        let secret = std::env::var(var).map_err(|_| ConfigError::MissingKey {
            var: var.to_string(),
        })?;
        let config = Config::from_secret(&secret)?;
        log::debug!("loaded id secret from {}", var);
        Ok(config)
    }

    /// Sets the global configuration. This should be called before the `SecureId` type
    /// methods are called.
    pub fn set_global(config: Config) {
        let mut global_config = GLOBAL_CONFIG.lock().unwrap_or_else(PoisonError::into_inner);
        *global_config = Some(config);
        GLOBAL_GENERATION.fetch_add(1, Ordering::SeqCst);
    }

    /// Accesses the global configuration, if set.
    pub fn global() -> Option<Config> {
        GLOBAL_CONFIG
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Bumped on every `set_global`, so cached codecs can tell they are stale.
    pub(crate) fn global_generation() -> u64 {
        GLOBAL_GENERATION.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Config").field("key", &"<redacted>").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
    const KEY_BASE64: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=";

    fn expected_key() -> [u8; KEY_LENGTH] {
        let mut key = [0u8; KEY_LENGTH];
        for (i, b) in key.iter_mut().enumerate() {
            *b = i as u8;
        }
        key
    }

    #[test]
    fn test_secret_forms() {
        let with_prefix = Config::from_secret(&format!("hex:{}", KEY_HEX)).unwrap();
        let bare = Config::from_secret(KEY_HEX).unwrap();
        let base64 = Config::from_secret(&format!("base64:{}", KEY_BASE64)).unwrap();

        assert_eq!(with_prefix.key, expected_key());
        assert_eq!(bare.key, expected_key());
        assert_eq!(base64.key, expected_key());
    }

    #[test]
    fn test_key_lengths() {
        for length in [16, 31, 33] {
            let secret = format!("hex:{}", "ab".repeat(length));
            assert_eq!(
                Config::from_secret(&secret).unwrap_err(),
                ConfigError::InvalidKeyLength { length }
            );
        }
        assert!(Config::from_secret(&"ab".repeat(32)).is_ok());
        assert_eq!(
            Config::new(&[]).unwrap_err(),
            ConfigError::InvalidKeyLength { length: 0 }
        );
    }

    #[test]
    fn test_bad_encoding() {
        assert_eq!(
            Config::from_secret("hex:not hex").unwrap_err(),
            ConfigError::InvalidKeyEncoding { scheme: "hex" }
        );
        assert_eq!(
            Config::from_secret("base64:***").unwrap_err(),
            ConfigError::InvalidKeyEncoding { scheme: "base64" }
        );
        // Unknown prefixes fall through to hex.
        assert_eq!(
            Config::from_secret("raw:abcd").unwrap_err(),
            ConfigError::InvalidKeyEncoding { scheme: "hex" }
        );
    }

    #[test]
    fn test_from_env_var() {
        let var = "OPAQUE_ID_TEST_SECRET_CONFIG";
        std::env::remove_var(var);
        assert_eq!(
            Config::from_env_var(var).unwrap_err(),
            ConfigError::MissingKey {
                var: var.to_string()
            }
        );

        std::env::set_var(var, format!(" base64:{}\n", KEY_BASE64));
        assert_eq!(Config::from_env_var(var).unwrap().key, expected_key());
        std::env::remove_var(var);
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = Config::from_secret(KEY_HEX).unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("redacted"));
        assert!(!debug.contains("0, 1, 2"));
    }
}
