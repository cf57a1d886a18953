//! Cache key derivation from call arguments.
//!
//! A single string argument is used verbatim. Anything else is reduced to a
//! structural hash: a SHA-256 digest over a tagged, length-prefixed encoding of
//! every argument, truncated to 64 bits. Distinct argument lists can collide;
//! that trade-off is accepted.

mod argument;

pub use argument::{Argument, Arguments, ToArgument};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKey {
    /// Shared by every zero-argument call to the same cache.
    NoArguments,
    Text(String),
    Structural(u64),
}

impl CacheKey {
    /// Stable textual form, used for overflow file naming and inspection.
    pub fn canonical(&self) -> String {
        match self {
            CacheKey::NoArguments => "n:".to_string(),
            CacheKey::Text(s) => format!("t:{s}"),
            CacheKey::Structural(h) => format!("h:{h:016x}"),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::NoArguments => write!(f, "<no-arguments>"),
            CacheKey::Text(s) => write!(f, "{s}"),
            CacheKey::Structural(h) => write!(f, "#{h:016x}"),
        }
    }
}

/// Derives the lookup key for an ordered argument list.
pub fn derive_key(arguments: &[Argument]) -> CacheKey {
    match arguments {
        [] => CacheKey::NoArguments,
        [Argument::Text(s)] => CacheKey::Text(s.clone()),
        _ => CacheKey::Structural(structural_hash(arguments)),
    }
}

/// Deep hash of an argument sequence. Position matters; object identity does not.
pub fn structural_hash(arguments: &[Argument]) -> u64 {
    let mut hasher = Sha256::new();
    feed_len(&mut hasher, arguments.len());
    for arg in arguments {
        feed(&mut hasher, arg);
    }
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

fn feed_len(hasher: &mut Sha256, len: usize) {
    hasher.update(crate::utils::num::usize_to_u64(len).to_le_bytes());
}

fn feed(hasher: &mut Sha256, arg: &Argument) {
    match arg {
        Argument::Null => hasher.update([0u8]),
        Argument::Bool(b) => hasher.update([1u8, u8::from(*b)]),
        Argument::Int(i) => {
            hasher.update([2u8]);
            hasher.update(i.to_le_bytes());
        }
        Argument::UInt(u) => {
            hasher.update([3u8]);
            hasher.update(u.to_le_bytes());
        }
        Argument::Float(f) => {
            hasher.update([4u8]);
            hasher.update(f.0.to_bits().to_le_bytes());
        }
        Argument::Text(s) => {
            hasher.update([5u8]);
            feed_len(hasher, s.len());
            hasher.update(s.as_bytes());
        }
        Argument::Bytes(b) => {
            hasher.update([6u8]);
            feed_len(hasher, b.len());
            hasher.update(b);
        }
        Argument::Timestamp(t) => {
            hasher.update([7u8]);
            hasher.update(t.timestamp().to_le_bytes());
            hasher.update(t.timestamp_subsec_nanos().to_le_bytes());
        }
        Argument::Seq(items) => {
            hasher.update([8u8]);
            feed_len(hasher, items.len());
            for item in items {
                feed(hasher, item);
            }
        }
        Argument::Map(entries) => {
            hasher.update([9u8]);
            feed_len(hasher, entries.len());
            for (k, v) in entries {
                feed(hasher, k);
                feed(hasher, v);
            }
        }
    }
}
