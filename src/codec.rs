use std::fmt;

use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};

use crate::{base62, Config, Error};

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

// Every ID is encrypted under the same all-zero IV, i.e. the same keystream.
const ZERO_IV: [u8; 16] = [0; 16];

/// Encrypts 64-bit IDs into opaque base62 strings and back.
///
/// An ID is written as 8 big-endian bytes, encrypted with AES-256-CTR and the result is
/// base62 encoded. Decoding reverses the steps. Under a fixed key this is a bijection
/// between `u64` and canonical base62 strings.
///
/// **Security note:** the IV is fixed, so every ID is XORed with the same 8 keystream
/// bytes. This hides the numbers from casual guessing, but anyone holding two encoded IDs
/// learns the XOR of the plaintexts, and adjacent IDs encode to similar strings. The
/// scheme is kept because already issued identifiers must keep decoding. There is no
/// integrity check either: every canonical base62 string that fits in 64 bits decodes to
/// some value.
///
/// The codec holds no mutable state and can be shared freely between threads.
#[derive(Clone)]
pub struct SecureIdCodec {
    cipher: Aes256Ctr,
}

impl SecureIdCodec {
    /// Creates a codec from a validated configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use opaque_id::{Config, SecureIdCodec};
    ///
    /// let config = Config::from_secret(
    ///     "hex:000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
    /// ).unwrap();
    /// let codec = SecureIdCodec::new(&config);
    /// ```
    pub fn new(config: &Config) -> SecureIdCodec {
        log::debug!("id codec initialized");
        SecureIdCodec {
            cipher: Aes256Ctr::new(&config.key.into(), &ZERO_IV.into()),
        }
    }

    /// Creates a codec straight from a `hex:`, `base64:` or bare hex secret.
    pub fn from_secret(secret: &str) -> Result<SecureIdCodec, Error> {
        let config = Config::from_secret(secret)?;
        Ok(SecureIdCodec::new(&config))
    }

    /// Encodes an ID into an opaque string.
    ///
    /// # Examples
    ///
    /// ```
    /// use opaque_id::SecureIdCodec;
    ///
    /// let codec = SecureIdCodec::from_secret(
    ///     "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
    /// ).unwrap();
    /// assert_eq!(codec.encode(12345), "UzJkGbZokgp");
    /// ```
    pub fn encode(&self, id: u64) -> String {
        let mut bytes = id.to_be_bytes();
        self.apply_keystream(&mut bytes);
        base62::encode(u64::from_be_bytes(bytes))
    }

    /// Encodes the low 64 bits of `id`. Higher bits are discarded and do not round-trip.
    pub fn encode_wide(&self, id: u128) -> String {
        self.encode((id & u64::MAX as u128) as u64)
    }

    /// Decodes a string produced by [`encode`](Self::encode) back into the ID.
    ///
    /// # Examples
    ///
    /// ```
    /// use opaque_id::{Error, SecureIdCodec};
    ///
    /// let codec = SecureIdCodec::from_secret(
    ///     "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
    /// ).unwrap();
    /// assert_eq!(codec.decode("UzJkGbZokgp"), Ok(12345));
    /// assert_eq!(codec.decode(""), Err(Error::EmptyInput));
    /// ```
    pub fn decode(&self, encoded: &str) -> Result<u64, Error> {
        let mut bytes = base62::decode(encoded)?.to_be_bytes();
        self.apply_keystream(&mut bytes);
        Ok(u64::from_be_bytes(bytes))
    }

    /// Encodes each ID in order.
    pub fn encode_batch(&self, ids: &[u64]) -> Vec<String> {
        ids.iter().map(|&id| self.encode(id)).collect()
    }

    /// Decodes each string in order. The first failure fails the whole batch.
    pub fn decode_batch<S: AsRef<str>>(&self, encoded: &[S]) -> Result<Vec<u64>, Error> {
        encoded.iter().map(|s| self.decode(s.as_ref())).collect()
    }

    /// Returns `true` if `encoded` consists only of base62 characters.
    pub fn is_valid_base62(encoded: &str) -> bool {
        base62::is_valid(encoded)
    }

    /// Checks that `id` survives an encode/decode round trip.
    pub fn check_round_trip(&self, id: u64) -> Result<(), Error> {
        let decoded = self.decode(&self.encode(id))?;
        if decoded != id {
            return Err(Error::RoundTripFailure { id, decoded });
        }
        Ok(())
    }

    fn apply_keystream(&self, bytes: &mut [u8; 8]) {
        let mut cipher = self.cipher.clone();
        cipher.apply_keystream(bytes);
    }
}

impl fmt::Debug for SecureIdCodec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SecureIdCodec").finish_non_exhaustive()
    }
}
