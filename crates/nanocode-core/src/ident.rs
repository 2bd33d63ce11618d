// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identifier and hashing utilities.
use std::fmt;
use std::str::FromStr;

use blake3::Hasher;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Canonical 256-bit hash used throughout the engine for addressing terms,
/// rules, programs and store digests.
pub type Hash = [u8; 32];

/// Content-addressed identifier for an interned term.
///
/// A `TermId` is the BLAKE3 digest of the canonical encoding of
/// `(sym, scale, child_ids)` (see [`term_key_hash`]). Structurally identical
/// terms always map to the same id, in any store, on any platform.
///
/// Renders and serializes as 64 lowercase hex characters.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermId(pub Hash);

impl TermId {
    /// Returns the canonical byte representation of this id.
    #[must_use]
    pub fn as_bytes(&self) -> &Hash {
        &self.0
    }

    /// Returns the first eight bytes as hex, for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TermId({})", self.short())
    }
}

/// Failure to parse a [`TermId`] from its hex form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseTermIdError {
    /// Input was not valid hex.
    #[error("invalid hex in term id: {0}")]
    Hex(String),
    /// Input decoded to the wrong number of bytes.
    #[error("term id must be 32 bytes, got {0}")]
    Length(usize),
}

impl FromStr for TermId {
    type Err = ParseTermIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| ParseTermIdError::Hex(e.to_string()))?;
        let len = bytes.len();
        let hash: Hash = bytes
            .try_into()
            .map_err(|_| ParseTermIdError::Length(len))?;
        Ok(Self(hash))
    }
}

impl Serialize for TermId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TermId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Computes the content hash for a term key.
///
/// Canonical encoding (v0), all integers little-endian:
/// - `b"term:"`
/// - `u64(len(sym))`, `sym` bytes
/// - `u64(scale)`
/// - `u64(child_count)`, then each child id (32 raw bytes)
/// - when `attempt > 0`: `b"probe:"`, `u32(attempt)`
///
/// `attempt` is only non-zero when the store resolves a digest collision; the
/// first attempt is the plain content hash.
pub fn term_key_hash(sym: &str, scale: u32, children: &[TermId], attempt: u32) -> TermId {
    let mut hasher = Hasher::new();
    hasher.update(b"term:");
    hasher.update(&(sym.len() as u64).to_le_bytes());
    hasher.update(sym.as_bytes());
    hasher.update(&u64::from(scale).to_le_bytes());
    hasher.update(&(children.len() as u64).to_le_bytes());
    for child in children {
        hasher.update(&child.0);
    }
    if attempt > 0 {
        hasher.update(b"probe:");
        hasher.update(&attempt.to_le_bytes());
    }
    TermId(hasher.finalize().into())
}

/// Produces a stable, domain-separated rule identifier (prefix `b"rule:"`).
pub fn make_rule_id(name: &str) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(b"rule:");
    hasher.update(name.as_bytes());
    hasher.finalize().into()
}
