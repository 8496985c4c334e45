//! Snowflake-style 64-bit ID generation.
//!
//! An ID packs a millisecond timestamp (relative to a custom epoch), a datacenter id,
//! a worker id and a per-millisecond sequence counter:
//!
//! ```text
//! | 42 bits: timestamp | 5 bits: datacenter | 5 bits: worker | 12 bits: sequence |
//! ```
//!
//! IDs issued by older deployments used different shifts for the datacenter and worker
//! fields, which overlap the sequence bits. [`BitLayout::Legacy`] can read those IDs, but
//! the generator never issues new ones in that layout.

use std::sync::{Mutex, PoisonError};

use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, Identity};
use crate::Error;

/// Default custom epoch: 2020-01-01 00:00:00 UTC (milliseconds since Unix epoch).
pub const DEFAULT_EPOCH_MS: u64 = 1_577_836_800_000;

/// Largest accepted worker or datacenter id.
pub const MAX_IDENTITY: u32 = 31;

const SEQUENCE_BITS: u32 = 12;
const IDENTITY_BITS: u32 = 5;
const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + 2 * IDENTITY_BITS;

const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;
const IDENTITY_MASK: u64 = (1 << IDENTITY_BITS) - 1;

/// Bit positions of the datacenter and worker fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitLayout {
    /// Non-overlapping: worker at bit 12, datacenter at bit 17.
    #[default]
    Classic,
    /// Datacenter at bit 5 and worker at bit 10, overlapping the sequence field.
    ///
    /// Only for reading IDs that are already stored. Composing in this layout is not
    /// injective: once the sequence passes 31 its bits collide with the identity fields,
    /// so the generator always issues [`BitLayout::Classic`] IDs.
    Legacy,
}

/// The fields of a composite ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdParts {
    /// Milliseconds since the generator's epoch.
    pub timestamp: u64,
    pub datacenter_id: u32,
    pub worker_id: u32,
    pub sequence: u32,
}

impl BitLayout {
    /// Returns the (datacenter, worker) shifts.
    const fn shifts(self) -> (u32, u32) {
        match self {
            BitLayout::Classic => (SEQUENCE_BITS + IDENTITY_BITS, SEQUENCE_BITS),
            BitLayout::Legacy => (5, 10),
        }
    }

    /// Packs `parts` into a 64-bit ID.
    pub fn compose(self, parts: IdParts) -> u64 {
        let (datacenter_shift, worker_shift) = self.shifts();
        (parts.timestamp << TIMESTAMP_SHIFT)
            | ((parts.datacenter_id as u64 & IDENTITY_MASK) << datacenter_shift)
            | ((parts.worker_id as u64 & IDENTITY_MASK) << worker_shift)
            | (parts.sequence as u64 & SEQUENCE_MASK)
    }

    /// Splits an ID into its fields.
    ///
    /// Exact for [`BitLayout::Classic`]. For [`BitLayout::Legacy`] only the timestamp is
    /// exact; the other fields are read from overlapping bits.
    pub fn decompose(self, id: u64) -> IdParts {
        let (datacenter_shift, worker_shift) = self.shifts();
        IdParts {
            timestamp: id >> TIMESTAMP_SHIFT,
            datacenter_id: ((id >> datacenter_shift) & IDENTITY_MASK) as u32,
            worker_id: ((id >> worker_shift) & IDENTITY_MASK) as u32,
            sequence: (id & SEQUENCE_MASK) as u32,
        }
    }
}

#[derive(Debug, Default)]
struct GeneratorState {
    sequence: u64,
    last_timestamp: Option<u64>,
}

/// Generates unique, time-ordered 64-bit IDs in the [`BitLayout::Classic`] layout.
///
/// One instance should be created at process startup and shared (it is `Send + Sync`)
/// with everything that mints IDs. Two instances with the same worker and datacenter
/// ids can produce the same ID.
///
/// ```
/// use opaque_id::IdGenerator;
///
/// let generator = IdGenerator::new(1, 1).unwrap();
/// let first = generator.generate().unwrap();
/// let second = generator.generate().unwrap();
/// assert!(second > first);
/// ```
#[derive(Debug)]
pub struct IdGenerator<C = SystemClock> {
    worker_id: u32,
    datacenter_id: u32,
    epoch: u64,
    clock: C,
    state: Mutex<GeneratorState>,
}

impl IdGenerator<SystemClock> {
    /// Creates a generator reading the system clock.
    ///
    /// Fails with [`ConfigError::InvalidIdentity`] if either id is above 31.
    pub fn new(worker_id: u32, datacenter_id: u32) -> Result<Self, Error> {
        IdGenerator::with_clock(worker_id, datacenter_id, SystemClock)
    }
}

impl<C: Clock> IdGenerator<C> {
    /// Creates a generator reading the given clock.
    pub fn with_clock(worker_id: u32, datacenter_id: u32, clock: C) -> Result<Self, Error> {
        check_identity(Identity::Worker, worker_id)?;
        check_identity(Identity::Datacenter, datacenter_id)?;
        log::debug!(
            "id generator created for worker {} datacenter {}",
            worker_id,
            datacenter_id
        );
        Ok(IdGenerator {
            worker_id,
            datacenter_id,
            epoch: DEFAULT_EPOCH_MS,
            clock,
            state: Mutex::new(GeneratorState::default()),
        })
    }

    /// Sets the custom epoch, in milliseconds since the Unix epoch.
    pub fn epoch(mut self, epoch_ms: u64) -> Self {
        self.epoch = epoch_ms;
        self
    }

    pub fn worker_id(&self) -> u32 {
        self.worker_id
    }

    pub fn datacenter_id(&self) -> u32 {
        self.datacenter_id
    }

    /// Returns the next ID.
    ///
    /// If more than 4096 IDs are requested within one millisecond, this spins until the
    /// clock moves on.
    ///
    /// # Errors
    ///
    /// [`Error::ClockRegressed`] if the clock reads earlier than the previous call. The
    /// generator state is left untouched, so a later call succeeds once the clock catches up.
    pub fn generate(&self) -> Result<u64, Error> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now_millis();

        let (timestamp, sequence) = match state.last_timestamp {
            Some(last) if now < last => return Err(regressed(last, now)),
            Some(last) if now == last => {
                let sequence = (state.sequence + 1) & SEQUENCE_MASK;
                if sequence == 0 {
                    log::debug!("sequence exhausted at {} ms, waiting for next millisecond", last);
                    (self.wait_next_millis(last)?, 0)
                } else {
                    (now, sequence)
                }
            }
            _ => (now, 0),
        };

        state.last_timestamp = Some(timestamp);
        state.sequence = sequence;

        Ok(BitLayout::Classic.compose(IdParts {
            timestamp: timestamp.saturating_sub(self.epoch),
            datacenter_id: self.datacenter_id,
            worker_id: self.worker_id,
            sequence: sequence as u32,
        }))
    }

    /// Returns the creation time of `id` in milliseconds since the Unix epoch.
    ///
    /// Both layouts keep the timestamp in the same bits, so this also reads legacy IDs.
    pub fn timestamp_millis(&self, id: u64) -> u64 {
        BitLayout::Classic
            .decompose(id)
            .timestamp
            .saturating_add(self.epoch)
    }

    fn wait_next_millis(&self, last: u64) -> Result<u64, Error> {
        loop {
            let now = self.clock.now_millis();
            if now > last {
                return Ok(now);
            }
            if now < last {
                return Err(regressed(last, now));
            }
            std::hint::spin_loop();
        }
    }
}

fn check_identity(field: Identity, value: u32) -> Result<(), ConfigError> {
    if value > MAX_IDENTITY {
        return Err(ConfigError::InvalidIdentity { field, value });
    }
    Ok(())
}

fn regressed(last: u64, now: u64) -> Error {
    let millis = last - now;
    log::warn!("clock moved backwards by {} ms, refusing to generate id", millis);
    Error::ClockRegressed { millis }
}
