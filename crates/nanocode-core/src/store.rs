// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Content-addressed, append-only term store.
//!
//! Determinism contract
//! - Ids are content hashes ([`term_key_hash`]) of `(sym, scale, child_ids)`;
//!   children are interned before their parent.
//! - Records are never replaced or removed. An id, once assigned, resolves to
//!   the same record for the lifetime of the store.
//! - Records live in a `BTreeMap`, so exports and digests iterate in ascending
//!   id order regardless of insertion history.
use std::collections::BTreeMap;

use blake3::Hasher;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::ident::{term_key_hash, Hash, TermId};
use crate::term::Term;

/// Stored form of a term: children are referenced by id, not by value.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct TermRecord {
    /// Symbol label.
    pub sym: String,
    /// Scale of the term.
    pub scale: u32,
    /// Ordered child ids.
    #[serde(default)]
    pub children: Vec<TermId>,
}

/// Errors emitted by the term store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested id is not present in the store.
    #[error("term not found: {0}")]
    NotFound(TermId),
    /// An imported record references a child that is not part of the import.
    #[error("record {parent} references missing child {child}")]
    DanglingChild {
        /// Record that carries the reference.
        parent: TermId,
        /// Child id that could not be resolved.
        child: TermId,
    },
    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// CBOR encoding or decoding failed.
    #[error("cbor error: {0}")]
    Cbor(String),
}

/// Persistent term store with structural sharing.
///
/// This is the arena for the engine: [`TermId`] is the index, [`TermRecord`]
/// the slot. The structural index (`record -> id`) is rebuilt on import so
/// later [`TermStore::add`] calls deduplicate against restored records.
#[derive(Default, Clone, Debug)]
pub struct TermStore {
    records: BTreeMap<TermId, TermRecord>,
    index: FxHashMap<TermRecord, TermId>,
}

impl TermStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `term` (children first) and returns its stable id.
    ///
    /// Idempotent: structurally equal input yields the same id and does not
    /// grow the store.
    pub fn add(&mut self, term: &Term) -> TermId {
        let children: Vec<TermId> = term.children.iter().map(|c| self.add(c)).collect();
        self.intern(TermRecord {
            sym: term.sym.clone(),
            scale: term.scale,
            children,
        })
    }

    /// Interns a record whose children are already in the store.
    pub(crate) fn intern(&mut self, record: TermRecord) -> TermId {
        if let Some(id) = self.index.get(&record) {
            return *id;
        }
        let mut attempt = 0u32;
        loop {
            let id = term_key_hash(&record.sym, record.scale, &record.children, attempt);
            match self.records.get(&id) {
                None => {
                    self.records.insert(id, record.clone());
                    self.index.insert(record, id);
                    return id;
                }
                Some(existing) if *existing == record => {
                    self.index.insert(record, id);
                    return id;
                }
                Some(_) => {
                    warn!(id = %id.short(), attempt, "term digest collision; probing");
                    attempt = attempt.wrapping_add(1);
                }
            }
        }
    }

    /// Returns the record stored under `id`.
    pub fn get(&self, id: &TermId) -> Result<&TermRecord, StoreError> {
        self.records.get(id).ok_or(StoreError::NotFound(*id))
    }

    /// Rebuilds the full term tree rooted at `id`. O(subtree size).
    pub fn materialize(&self, id: &TermId) -> Result<Term, StoreError> {
        let record = self.get(id)?;
        let children = record
            .children
            .iter()
            .map(|child| self.materialize(child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Term {
            sym: record.sym.clone(),
            scale: record.scale,
            children,
        })
    }

    /// Immediate child ids of `id` without materializing.
    pub fn children_of(&self, id: &TermId) -> Result<&[TermId], StoreError> {
        self.get(id).map(|record| record.children.as_slice())
    }

    /// Returns `true` when `id` is stored.
    pub fn contains(&self, id: &TermId) -> bool {
        self.records.contains_key(id)
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` when the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates records in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (&TermId, &TermRecord)> {
        self.records.iter()
    }

    /// Borrow of the flat `id -> record` mapping.
    pub fn records(&self) -> &BTreeMap<TermId, TermRecord> {
        &self.records
    }

    /// Rehydrates a store from a flat `id -> record` mapping.
    ///
    /// Ids are trusted as given; every child reference must resolve within
    /// the mapping.
    pub fn from_records(records: BTreeMap<TermId, TermRecord>) -> Result<Self, StoreError> {
        for (id, record) in &records {
            if let Some(child) = record.children.iter().find(|c| !records.contains_key(c)) {
                return Err(StoreError::DanglingChild {
                    parent: *id,
                    child: *child,
                });
            }
        }
        let mut index = FxHashMap::default();
        for (id, record) in &records {
            index.entry(record.clone()).or_insert(*id);
        }
        Ok(Self { records, index })
    }

    /// JSON value export: `{"records": {id: {sym, scale, children}}}`.
    pub fn to_json_value(&self) -> Result<serde_json::Value, StoreError> {
        let records = serde_json::to_value(&self.records)?;
        Ok(serde_json::json!({ "records": records }))
    }

    /// Compact rendering of [`TermStore::to_json_value`].
    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(&self.to_json_value()?)?)
    }

    /// JSON import. Accepts the wrapped form produced by [`TermStore::to_json`]
    /// or a bare `id -> record` mapping.
    pub fn from_json(text: &str) -> Result<Self, StoreError> {
        let mut value: serde_json::Value = serde_json::from_str(text)?;
        let records = if value
            .get("records")
            .is_some_and(serde_json::Value::is_object)
        {
            value["records"].take()
        } else {
            value
        };
        let records: BTreeMap<TermId, TermRecord> = serde_json::from_value(records)?;
        Self::from_records(records)
    }

    /// Deterministic CBOR export of the record mapping.
    pub fn to_cbor(&self) -> Result<Vec<u8>, StoreError> {
        let mut out = Vec::new();
        ciborium::into_writer(&self.records, &mut out)
            .map_err(|e| StoreError::Cbor(e.to_string()))?;
        Ok(out)
    }

    /// CBOR import; see [`TermStore::to_cbor`].
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, StoreError> {
        let records: BTreeMap<TermId, TermRecord> =
            ciborium::from_reader(bytes).map_err(|e| StoreError::Cbor(e.to_string()))?;
        Self::from_records(records)
    }

    /// Canonical digest of the whole store.
    ///
    /// `blake3(b"store:" || u64(len) || for each record in ascending id order:
    /// id || u64(len(sym)) || sym || u64(scale) || u64(child_count) || child ids)`.
    pub fn digest(&self) -> Hash {
        let mut hasher = Hasher::new();
        hasher.update(b"store:");
        hasher.update(&(self.records.len() as u64).to_le_bytes());
        for (id, record) in &self.records {
            hasher.update(&id.0);
            hasher.update(&(record.sym.len() as u64).to_le_bytes());
            hasher.update(record.sym.as_bytes());
            hasher.update(&u64::from(record.scale).to_le_bytes());
            hasher.update(&(record.children.len() as u64).to_le_bytes());
            for child in &record.children {
                hasher.update(&child.0);
            }
        }
        hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Term {
        Term::new("A", 0, vec![Term::leaf("B", 1), Term::leaf("C", 1)])
    }

    #[test]
    fn deduplicates_structurally_equal_terms() {
        let mut store = TermStore::new();
        let id1 = store.add(&sample());
        let id2 = store.add(&sample());
        assert_eq!(id1, id2);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn shares_repeated_subterms() {
        let mut store = TermStore::new();
        let t = Term::new("p", 0, vec![Term::leaf("x", 0), Term::leaf("x", 0)]);
        let id = store.add(&t);
        assert_eq!(store.len(), 2);
        let children = store.children_of(&id).expect("children");
        assert_eq!(children[0], children[1]);
    }

    #[test]
    fn materialize_round_trip() {
        let mut store = TermStore::new();
        let root = Term::new("root", 0, vec![Term::leaf("leaf", 1)]);
        let id = store.add(&root);
        assert_eq!(store.materialize(&id).expect("materialize"), root);
    }

    #[test]
    fn missing_ids_are_not_found() {
        let store = TermStore::new();
        let id = term_key_hash("ghost", 0, &[], 0);
        assert!(matches!(store.get(&id), Err(StoreError::NotFound(x)) if x == id));
        assert!(!store.contains(&id));
    }

    #[test]
    fn json_round_trip_preserves_dedup_index() {
        let mut store = TermStore::new();
        let id = store.add(&sample());
        let text = store.to_json().expect("to_json");
        let mut restored = TermStore::from_json(&text).expect("from_json");
        assert_eq!(restored.len(), store.len());
        assert_eq!(restored.add(&sample()), id);
        assert_eq!(restored.len(), store.len());
        assert_eq!(restored.digest(), store.digest());
    }

    #[test]
    fn from_json_accepts_flat_mapping() {
        let mut store = TermStore::new();
        let id = store.add(&Term::leaf("solo", 2));
        let flat = serde_json::to_string(store.records()).expect("flat");
        let restored = TermStore::from_json(&flat).expect("from_json");
        assert_eq!(restored.get(&id).expect("get").sym, "solo");
    }

    #[test]
    fn import_rejects_dangling_children() {
        let ghost = term_key_hash("ghost", 0, &[], 0);
        let parent = term_key_hash("p", 0, &[ghost], 0);
        let mut records = BTreeMap::new();
        records.insert(
            parent,
            TermRecord {
                sym: "p".into(),
                scale: 0,
                children: vec![ghost],
            },
        );
        let res = TermStore::from_records(records);
        assert!(matches!(res, Err(StoreError::DanglingChild { .. })));
    }

    #[test]
    fn cbor_round_trip() {
        let mut store = TermStore::new();
        store.add(&sample());
        let bytes = store.to_cbor().expect("cbor");
        let restored = TermStore::from_cbor(&bytes).expect("decode");
        assert_eq!(restored.digest(), store.digest());
        assert_eq!(bytes, restored.to_cbor().expect("cbor again"));
    }

    #[test]
    fn intern_probes_past_foreign_record_on_digest_clash() {
        // Simulate a collision: an imported record squats on the digest that
        // `x@0` would hash to, but with different content.
        let squatted = term_key_hash("x", 0, &[], 0);
        let mut records = BTreeMap::new();
        records.insert(
            squatted,
            TermRecord {
                sym: "other".into(),
                scale: 9,
                children: Vec::new(),
            },
        );
        let mut store = TermStore::from_records(records).expect("import");
        let id = store.add(&Term::leaf("x", 0));
        assert_ne!(id, squatted);
        assert_eq!(id, term_key_hash("x", 0, &[], 1));
        assert_eq!(store.materialize(&id).expect("materialize"), Term::leaf("x", 0));
        assert_eq!(store.add(&Term::leaf("x", 0)), id);
    }
}
