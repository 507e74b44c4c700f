//! LOUDS trie with per-terminal term ids.
//!
//! Layout is identical to [`Louds`] plus a dense array indexed by BFS node
//! order (root excluded) holding the terminal's id or −1. The reader maps an
//! LBS position to that array with `rank1(pos) − 2`, skipping the two dummy
//! label slots.

use std::fs;
use std::path::Path;

use memmap2::Mmap;

use crate::dict::DictError;
use crate::serial::{self, ByteReader};

use super::Louds;

/// A prefix of a query that is a stored key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixHit {
    /// Length of the matched prefix in code units.
    pub len: usize,
    /// Term id at the terminal, when one is stored and non-negative.
    pub term_id: Option<u32>,
}

/// Read-only LOUDS trie whose terminals carry dense term ids.
#[derive(Debug, Clone)]
pub struct LoudsWithTermId {
    trie: Louds,
    term_ids: Vec<i32>,
}

impl LoudsWithTermId {
    pub(crate) fn from_parts(trie: Louds, term_ids: Vec<i32>) -> Self {
        Self { trie, term_ids }
    }

    /// The underlying plain trie.
    pub fn trie(&self) -> &Louds {
        &self.trie
    }

    pub fn key_count(&self) -> usize {
        self.trie.key_count()
    }

    pub(crate) fn term_id_count(&self) -> usize {
        self.term_ids.len()
    }

    /// Term id stored at the node addressed by LBS position `pos`.
    ///
    /// Returns `None` for out-of-range positions, non-terminals, and
    /// negative stored values.
    pub fn term_id_at(&self, pos: usize) -> Option<u32> {
        let node_id = self.trie.lbs.rank1(pos).checked_sub(2)?;
        match self.term_ids.get(node_id) {
            Some(&id) if id >= 0 => Some(id as u32),
            _ => None,
        }
    }

    /// Term id for an exact key, or `None` if the key is absent or not a
    /// terminal with a valid id.
    pub fn term_id(&self, key: &[u16]) -> Option<u32> {
        self.term_id_at(self.trie.node_index(key)?)
    }

    /// Longest prefix of `key` whose node has a valid term id, as
    /// `(prefix_len, term_id)`.
    pub fn longest_prefix_term_id(&self, key: &[u16]) -> Option<(usize, u32)> {
        let mut best = None;
        let mut pos = 0usize;
        for (i, &unit) in key.iter().enumerate() {
            pos = match self.trie.traverse(pos, unit) {
                Some(p) => p,
                None => break,
            };
            if let Some(id) = self.term_id_at(pos) {
                best = Some((i + 1, id));
            }
        }
        best
    }

    /// Every stored-key prefix of `key`, shortest to longest, with its term
    /// id. A hit with `term_id: None` marks a terminal whose stored id is
    /// invalid; callers skip it but it still counts as a dictionary hit.
    pub fn prefix_hits(&self, key: &[u16]) -> Vec<PrefixHit> {
        let mut out = Vec::new();
        let mut pos = 0usize;
        for (i, &unit) in key.iter().enumerate() {
            pos = match self.trie.traverse(pos, unit) {
                Some(p) => p,
                None => break,
            };
            if self.trie.is_leaf.get(pos) {
                out.push(PrefixHit {
                    len: i + 1,
                    term_id: self.term_id_at(pos),
                });
            }
        }
        out
    }

    /// All stored keys that are prefixes of `key`, shortest to longest.
    pub fn common_prefix_search(&self, key: &[u16]) -> Vec<Vec<u16>> {
        self.trie.common_prefix_search(key)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.trie.write_into(&mut out);
        serial::put_u64(&mut out, self.term_ids.len() as u64);
        for &id in &self.term_ids {
            serial::put_i32(&mut out, id);
        }
        out
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, DictError> {
        let mut r = ByteReader::new(data);
        let trie = Louds::read_from(&mut r)?;
        let term_count = r.read_u64()? as usize;
        let term_ids = r.read_i32_vec(term_count)?;
        r.finish()?;
        Ok(Self { trie, term_ids })
    }

    pub fn save(&self, path: &Path) -> Result<(), DictError> {
        Ok(fs::write(path, self.to_bytes())?)
    }

    pub fn open(path: &Path) -> Result<Self, DictError> {
        let file = fs::File::open(path)?;
        // SAFETY: read-only mapping, dropped after parsing.
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_bytes(&mmap)
    }
}
