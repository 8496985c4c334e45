use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use diesel::deserialize::{self, FromSql, Queryable};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::BigInt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Config, ConfigError, Error, SecureIdCodec};

thread_local! {
    static CODEC_CACHE: RefCell<Option<(u64, Arc<SecureIdCodec>)>> = const { RefCell::new(None) };
}

/// Returns the codec for the global configuration, or `None` if none has been set.
fn global_codec() -> Option<Arc<SecureIdCodec>> {
    let generation = Config::global_generation();
    CODEC_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if let Some((cached, codec)) = cache.as_ref() {
            if *cached == generation {
                return Some(codec.clone());
            }
        }
        let codec = Arc::new(SecureIdCodec::new(&Config::global()?));
        *cache = Some((generation, codec.clone()));
        Some(codec)
    })
}

/// Names the kind of resource a [`SecureId`] refers to.
pub trait TypeMarker: fmt::Debug {
    fn name() -> &'static str;
}

/// A type-safe resource ID (a wrapped u64).
///
/// When serialized with Serde, the number is encrypted and encoded into an opaque string.
/// Deserialization decodes the string back to the integer; any malformed input is
/// reported as the same "invalid identifier" error. The codec comes from the global
/// configuration, see [`Config::set_global`].
///
/// Traits are also provided for Diesel compatibility with Postgres BigInt fields, where
/// the raw integer is stored.
///
/// # Examples
///
/// ```
/// use opaque_id::{Config, SecureId, TypeMarker};
///
/// #[derive(Clone, Copy, Debug)]
/// pub struct AlbumMarker;
/// impl TypeMarker for AlbumMarker {
///     fn name() -> &'static str { "album" }
/// }
///
/// type AlbumId = SecureId<AlbumMarker>;
///
/// #[derive(serde::Serialize)]
/// struct Album {
///     pub id: AlbumId,
/// }
///
/// Config::set_global(Config::from_secret(
///     "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
/// ).unwrap());
/// let album = Album { id: AlbumId::from(12345) };
/// let json = serde_json::to_string(&album).unwrap();
/// assert_eq!(json, "{\"id\":\"UzJkGbZokgp\"}");
/// ```
#[derive(AsExpression, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[diesel(sql_type = BigInt)]
pub struct SecureId<T: TypeMarker> {
    id: u64,
    _marker: PhantomData<T>,
}

impl<T: TypeMarker> From<SecureId<T>> for u64 {
    /// Returns the raw `u64` value.
    fn from(field: SecureId<T>) -> Self {
        field.id
    }
}

impl<T: TypeMarker> From<u64> for SecureId<T> {
    fn from(id: u64) -> Self {
        SecureId {
            id,
            _marker: PhantomData,
        }
    }
}

impl<T: TypeMarker> fmt::Display for SecureId<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}#{}", T::name(), self.id)
    }
}

impl<T: TypeMarker> SecureId<T> {
    pub fn value(self) -> u64 {
        self.id
    }

    /// Encodes the ID with the global codec. Returns `None` if no configuration is set.
    pub fn encode(self) -> Option<String> {
        global_codec().map(|codec| codec.encode(self.id))
    }

    /// Decodes an opaque string with the global codec.
    pub fn parse(encoded: &str) -> Result<Self, Error> {
        let codec = global_codec().ok_or(ConfigError::NotConfigured)?;
        Ok(SecureId::from(codec.decode(encoded)?))
    }
}

impl<T: TypeMarker> Serialize for SecureId<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let codec = global_codec()
            .ok_or_else(|| serde::ser::Error::custom("id codec is not configured"))?;
        serializer.serialize_str(&codec.encode(self.id))
    }
}

impl<'de, T: TypeMarker> Deserialize<'de> for SecureId<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let codec = global_codec()
            .ok_or_else(|| serde::de::Error::custom("id codec is not configured"))?;
        let id = codec.decode(&encoded).map_err(|e| {
            log::debug!("rejected {} id: {}", T::name(), e);
            serde::de::Error::custom("invalid identifier")
        })?;
        Ok(SecureId::from(id))
    }
}

impl<T: TypeMarker> ToSql<BigInt, Pg> for SecureId<T> {
    fn to_sql(&self, out: &mut Output<'_, '_, Pg>) -> serialize::Result {
        <i64 as ToSql<BigInt, Pg>>::to_sql(&(self.id as i64), &mut out.reborrow())
    }
}

impl<T: TypeMarker> FromSql<BigInt, Pg> for SecureId<T> {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let id = <i64 as FromSql<BigInt, Pg>>::from_sql(bytes)?;
        Ok(SecureId::from(id as u64))
    }
}

impl<T> Queryable<BigInt, Pg> for SecureId<T>
where
    T: TypeMarker,
{
    type Row = <i64 as Queryable<BigInt, Pg>>::Row;

    fn build(row: Self::Row) -> deserialize::Result<Self> {
        let id = i64::build(row)?;
        Ok(SecureId::from(id as u64))
    }
}
