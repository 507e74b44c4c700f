//! LOUDS succinct tries.
//!
//! A [`Louds`] encodes an ordered labeled tree in BFS order. For each node
//! visited, the level-bit sequence (LBS) holds one '1' per child followed by
//! a '0' terminator; two dummy bits `1,0` are prepended so the root is
//! addressable. Edge labels align with the 1-bits of the LBS (indexed by
//! `rank1`), with two dummy label slots before the real labels. `is_leaf`
//! marks LBS positions whose node terminates a stored key.
//!
//! Nodes are addressed by their LBS position. The first child of the node at
//! `pos` is `select0(rank1(pos)) + 1`; siblings follow while the bit stays
//! '1'; the parent is recovered with `select1(rank0(pos))`.

mod builder;
mod term_id;

pub use builder::{PrefixTree, PrefixTreeWithTermId};
pub use term_id::{LoudsWithTermId, PrefixHit};

use std::fs;
use std::path::Path;

use memmap2::Mmap;

use crate::bits::{BitVector, SuccinctBitVector};
use crate::dict::DictError;
use crate::serial::{self, ByteReader};

/// Label stored in the two dummy slots; skipped during reconstruction.
pub(crate) const DUMMY_LABEL: u16 = b' ' as u16;

/// A read-only LOUDS trie keyed by UTF-16 code units.
#[derive(Debug, Clone)]
pub struct Louds {
    pub(crate) lbs: SuccinctBitVector,
    pub(crate) is_leaf: SuccinctBitVector,
    pub(crate) labels: Vec<u16>,
}

impl Louds {
    pub(crate) fn from_parts(lbs: BitVector, is_leaf: BitVector, labels: Vec<u16>) -> Self {
        Self {
            lbs: SuccinctBitVector::new(lbs),
            is_leaf: SuccinctBitVector::new(is_leaf),
            labels,
        }
    }

    /// Number of stored keys.
    pub fn key_count(&self) -> usize {
        self.is_leaf.count_ones()
    }

    /// LBS position of the first child of the node at `pos`, if any.
    pub fn first_child(&self, pos: usize) -> Option<usize> {
        let y = self.lbs.select0(self.lbs.rank1(pos))? + 1;
        if y < self.lbs.len() && self.lbs.get(y) {
            Some(y)
        } else {
            None
        }
    }

    /// Child of the node at `pos` whose edge label is `label`.
    pub fn traverse(&self, pos: usize, label: u16) -> Option<usize> {
        let mut child = self.first_child(pos)?;
        while child < self.lbs.len() && self.lbs.get(child) {
            if self.labels[self.lbs.rank1(child)] == label {
                return Some(child);
            }
            child += 1;
        }
        None
    }

    /// All stored keys that are prefixes of `key`, shortest to longest.
    pub fn common_prefix_search(&self, key: &[u16]) -> Vec<Vec<u16>> {
        let mut acc = Vec::new();
        let mut out = Vec::new();
        let mut pos = 0usize;
        for &unit in key {
            pos = match self.traverse(pos, unit) {
                Some(p) => p,
                None => break,
            };
            acc.push(self.labels[self.lbs.rank1(pos)]);
            if self.is_leaf.get(pos) {
                out.push(acc.clone());
            }
        }
        out
    }

    /// LBS position of the node spelling out `key`, or `None` if absent.
    ///
    /// Descends from position 2 (the first child of the root), scanning
    /// siblings at each level.
    pub fn node_index(&self, key: &[u16]) -> Option<usize> {
        if key.is_empty() {
            return None;
        }
        let mut pos = 2usize;
        for (depth, &unit) in key.iter().enumerate() {
            loop {
                if pos >= self.lbs.len() || !self.lbs.get(pos) {
                    return None;
                }
                if self.labels[self.lbs.rank1(pos)] == unit {
                    break;
                }
                pos += 1;
            }
            if depth + 1 == key.len() {
                return Some(pos);
            }
            pos = self.lbs.select0(self.lbs.rank1(pos))? + 1;
        }
        None
    }

    /// BFS node number for `key` (the rank0 of its LBS position).
    pub fn node_id(&self, key: &[u16]) -> Option<usize> {
        Some(self.lbs.rank0(self.node_index(key)?))
    }

    /// Reconstruct the key ending at the node at `pos` by walking up to the
    /// root, collecting edge labels.
    pub fn label_of_node(&self, pos: usize) -> Vec<u16> {
        let mut out = Vec::new();
        if pos >= self.lbs.len() {
            return out;
        }
        let mut cur = pos;
        loop {
            let label_index = self.lbs.rank1(cur);
            if label_index >= self.labels.len() {
                break;
            }
            let label = self.labels[label_index];
            if label != DUMMY_LABEL {
                out.push(label);
            }
            if label_index == 0 {
                break;
            }
            match self.lbs.select1(self.lbs.rank0(cur)) {
                Some(parent) => cur = parent,
                None => break,
            }
        }
        out.reverse();
        out
    }

    pub(crate) fn write_into(&self, out: &mut Vec<u8>) {
        serial::put_bitvec(out, self.lbs.bits());
        serial::put_bitvec(out, self.is_leaf.bits());
        serial::put_u64(out, self.labels.len() as u64);
        for &label in &self.labels {
            serial::put_u16(out, label);
        }
    }

    pub(crate) fn read_from(r: &mut ByteReader<'_>) -> Result<Self, DictError> {
        let lbs = serial::read_bitvec(r)?;
        let is_leaf = serial::read_bitvec(r)?;
        let label_count = r.read_u64()? as usize;
        let labels = r.read_u16_vec(label_count)?;
        Ok(Self::from_parts(lbs, is_leaf, labels))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_into(&mut out);
        out
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, DictError> {
        let mut r = ByteReader::new(data);
        let louds = Self::read_from(&mut r)?;
        r.finish()?;
        Ok(louds)
    }

    pub fn save(&self, path: &Path) -> Result<(), DictError> {
        Ok(fs::write(path, self.to_bytes())?)
    }

    /// Open a serialized trie, using mmap so parsing reads straight from the
    /// page cache.
    pub fn open(path: &Path) -> Result<Self, DictError> {
        let file = fs::File::open(path)?;
        // SAFETY: the file is opened read-only and the mapping is dropped
        // after parsing completes.
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_bytes(&mmap)
    }
}
