//! Token array: per-term posting lists of conversion candidates.
//!
//! Three parallel payload arrays hold one entry per token; a delimiter bit
//! vector encodes list boundaries as `0 1*` runs, one run per term id in
//! order. For term id `t`, the tokens live between the `(t+1)`-th and
//! `(t+2)`-th zero bits.

use std::fs;
use std::path::Path;

use memmap2::Mmap;

use crate::bits::{BitVector, SuccinctBitVector};
use crate::serial::{self, ByteReader};

use super::DictError;

/// `node_index` value meaning "surface equals the reading as hiragana".
pub const HIRAGANA_SENTINEL: i32 = -2;
/// `node_index` value meaning "surface is the katakana form of the reading".
pub const KATAKANA_SENTINEL: i32 = -1;

/// One conversion candidate for a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    /// Index into the POS table.
    pub pos_index: u16,
    /// Word cost (lower is preferred).
    pub word_cost: i16,
    /// Surface-trie LBS position, or one of the kana sentinels.
    pub node_index: i32,
}

/// Read-only posting-list store.
#[derive(Debug, Clone)]
pub struct TokenArray {
    pos_index: Vec<u16>,
    word_cost: Vec<i16>,
    node_index: Vec<i32>,
    postings: SuccinctBitVector,
}

impl TokenArray {
    pub(crate) fn from_parts(
        pos_index: Vec<u16>,
        word_cost: Vec<i16>,
        node_index: Vec<i32>,
        postings: BitVector,
    ) -> Self {
        debug_assert_eq!(pos_index.len(), word_cost.len());
        debug_assert_eq!(pos_index.len(), node_index.len());
        Self {
            pos_index,
            word_cost,
            node_index,
            postings: SuccinctBitVector::new(postings),
        }
    }

    /// Total number of tokens across all terms.
    pub fn len(&self) -> usize {
        self.pos_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pos_index.is_empty()
    }

    /// Posting list for a term id; empty when the id is out of range.
    pub fn tokens_for(&self, term_id: usize) -> Vec<Token> {
        let Some(p0) = self.postings.select0(term_id + 1) else {
            return Vec::new();
        };
        let Some(p1) = self.postings.select0(term_id + 2) else {
            return Vec::new();
        };
        let end = self.postings.rank1(p1).min(self.pos_index.len());
        let begin = self.postings.rank1(p0).min(end);
        (begin..end)
            .map(|i| Token {
                pos_index: self.pos_index[i],
                word_cost: self.word_cost[i],
                node_index: self.node_index[i],
            })
            .collect()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        serial::put_u32(&mut out, self.pos_index.len() as u32);
        for &v in &self.pos_index {
            serial::put_u16(&mut out, v);
        }
        serial::put_u32(&mut out, self.word_cost.len() as u32);
        for &v in &self.word_cost {
            serial::put_i16(&mut out, v);
        }
        serial::put_u32(&mut out, self.node_index.len() as u32);
        for &v in &self.node_index {
            serial::put_i32(&mut out, v);
        }
        serial::put_bitvec(&mut out, self.postings.bits());
        out
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, DictError> {
        let mut r = ByteReader::new(data);
        let n1 = r.read_u32()? as usize;
        let pos_index = r.read_u16_vec(n1)?;
        let n2 = r.read_u32()? as usize;
        let word_cost = r.read_i16_vec(n2)?;
        let n3 = r.read_u32()? as usize;
        let node_index = r.read_i32_vec(n3)?;
        if n1 != n2 || n1 != n3 {
            return Err(DictError::Parse(format!(
                "token payload arrays disagree: {n1}/{n2}/{n3}"
            )));
        }
        let postings = serial::read_bitvec(&mut r)?;
        r.finish()?;
        Ok(Self::from_parts(pos_index, word_cost, node_index, postings))
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

/// Incremental builder used by the dictionary compiler: call
/// [`TokenBuilder::begin_term`] once per term id in order, then
/// [`TokenBuilder::push`] for each of its tokens.
#[derive(Debug, Default)]
pub(crate) struct TokenBuilder {
    pos_index: Vec<u16>,
    word_cost: Vec<i16>,
    node_index: Vec<i32>,
    postings: BitVector,
}

impl TokenBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_term(&mut self) {
        self.postings.push(false);
    }

    pub fn push(&mut self, pos_index: u16, word_cost: i16, node_index: i32) {
        self.postings.push(true);
        self.pos_index.push(pos_index);
        self.word_cost.push(word_cost);
        self.node_index.push(node_index);
    }

    pub fn finish(self) -> TokenArray {
        TokenArray::from_parts(
            self.pos_index,
            self.word_cost,
            self.node_index,
            self.postings,
        )
    }
}
