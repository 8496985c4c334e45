//! `opaque-id` mints unique 64-bit IDs and turns them into opaque, URL-safe strings and back.
//!
//! Resources keyed by sequential or time-ordered integers are easy to enumerate when the
//! integers appear in URLs. This crate keeps the integers as primary keys and only exposes
//! an encrypted form of them, so neighbouring IDs cannot be guessed from an observed one.
//!
//! It has two independent halves:
//!
//! - [`IdGenerator`] produces Snowflake-style IDs from a millisecond timestamp, a datacenter
//!   id, a worker id and a per-millisecond sequence. It refuses to run when the clock
//!   moves backwards.
//! - [`SecureIdCodec`] encrypts an ID with AES-256-CTR and writes the ciphertext in base62
//!   (`A-Z`, `a-z`, `0-9`). Decoding reverses it.
//!
//! Please note that leaking the encryption key means you lose all the security benefits.
//! You also cannot change the key unless it's OK that all exposed identifiers change.
//!
//! # Usage
//!
//! ```
//! use opaque_id::{Config, IdGenerator, SecureIdCodec};
//!
//! // At startup. Both steps fail fast on bad configuration.
//! let generator = IdGenerator::new(1, 1).unwrap();
//! let config = Config::from_secret(
//!     "hex:000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
//! ).unwrap();
//! let codec = SecureIdCodec::new(&config);
//!
//! // When a row is created, and when it is exposed.
//! let id = generator.generate().unwrap();
//! let public = codec.encode(id);
//! assert_eq!(codec.decode(&public).unwrap(), id);
//! ```
//!
//! ## Typed fields
//!
//! [`SecureId`] wraps an ID with a marker type per resource, encodes itself when
//! serialized with Serde and maps to a Postgres `BigInt` column with Diesel. It uses the
//! codec for the configuration registered with [`Config::set_global`].

pub mod base62;
pub mod clock;
mod codec;
mod config;
mod error;
mod field;
mod generator;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::SecureIdCodec;
pub use config::{Config, ConfigError, Identity, DEFAULT_SECRET_VAR, KEY_LENGTH};
pub use error::Error;
pub use field::{SecureId, TypeMarker};
pub use generator::{BitLayout, IdGenerator, IdParts, DEFAULT_EPOCH_MS, MAX_IDENTITY};
