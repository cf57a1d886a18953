//! Capability of a value to be cached, and the admission decision made before
//! every `put`.
//!
//! A value that cannot be encoded can still live in primary storage; it just
//! never reaches secondary storage, and caches that must persist refuse it.

use crate::cache::CacheConfig;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A result type that may be stored by the cache.
///
/// The defaults describe a value that is never empty and cannot be encoded.
pub trait Cacheable: Clone + Send + Sync + 'static {
    /// Empty results are never cached.
    fn is_empty_result(&self) -> bool {
        false
    }

    /// Bytes for secondary storage, or `None` when the value has no encoding.
    fn encode(&self) -> Option<Vec<u8>> {
        None
    }

    fn decode(_bytes: &[u8]) -> Option<Self> {
        None
    }
}

/// bincode encoding for any serde type; helper for `Cacheable` impls.
pub fn encode_with_bincode<T: Serialize>(value: &T) -> Option<Vec<u8>> {
    encode_to_vec(value, standard()).ok()
}

pub fn decode_with_bincode<T: DeserializeOwned>(bytes: &[u8]) -> Option<T> {
    decode_from_slice::<T, _>(bytes, standard()).ok().map(|(v, _)| v)
}

/// Implements [`Cacheable`] for serde types through bincode.
#[macro_export]
macro_rules! persistable {
    ($($t:ty),+ $(,)?) => {$(
        impl $crate::cacheable::Cacheable for $t {
            fn encode(&self) -> Option<Vec<u8>> {
                $crate::cacheable::encode_with_bincode(self)
            }

            fn decode(bytes: &[u8]) -> Option<Self> {
                $crate::cacheable::decode_with_bincode(bytes)
            }
        }
    )+};
}

persistable!(bool, char, i8, i16, i32, i64, i128, u8, u16, u32, u64, u128, isize, usize, f32, f64);
persistable!(DateTime<Utc>);

impl Cacheable for String {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }

    fn encode(&self) -> Option<Vec<u8>> {
        encode_with_bincode(self)
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        decode_with_bincode(bytes)
    }
}

impl<T: Cacheable> Cacheable for Option<T> {
    fn is_empty_result(&self) -> bool {
        self.as_ref().is_none_or(Cacheable::is_empty_result)
    }

    fn encode(&self) -> Option<Vec<u8>> {
        self.as_ref().and_then(Cacheable::encode)
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        T::decode(bytes).map(Some)
    }
}

// Elements are encoded individually so that a Vec is encodable exactly when its
// element type is.
impl<T: Cacheable> Cacheable for Vec<T> {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }

    fn encode(&self) -> Option<Vec<u8>> {
        let parts: Option<Vec<Vec<u8>>> = self.iter().map(Cacheable::encode).collect();
        encode_with_bincode(&parts?)
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        let parts: Vec<Vec<u8>> = decode_with_bincode(bytes)?;
        parts.iter().map(|p| T::decode(p)).collect()
    }
}

/// Outcome of the cacheability filter for one computed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Store it; `encoded` is present when the cache overflows or persists.
    Admit { encoded: Option<Vec<u8>> },
    /// Null/empty result.
    Empty,
    /// The cache persists to disk and the value has no encoding.
    SerializationIneligible,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admit { .. })
    }
}

/// Decides whether `value` may be cached under `config`. Encodes at most once.
pub fn admit<V: Cacheable>(value: &V, config: &CacheConfig) -> Admission {
    if value.is_empty_result() {
        return Admission::Empty;
    }
    if !config.wants_encoding() {
        return Admission::Admit { encoded: None };
    }
    match value.encode() {
        Some(bytes) => Admission::Admit { encoded: Some(bytes) },
        None if config.requires_serialization() => Admission::SerializationIneligible,
        None => Admission::Admit { encoded: None },
    }
}
