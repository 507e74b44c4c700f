//! Dictionary storage: token-array posting lists, POS table, connection
//! matrix, and the bundle of all query-time structures.
//!
//! Everything here is immutable after build and loaded once per process;
//! query paths return empty results or fallbacks instead of erroring.

mod builder;
mod connection;
mod pos_table;
pub mod source;
mod token_array;

pub use builder::{build_dictionary, DictRow};
pub use connection::ConnectionMatrix;
pub use pos_table::PosTable;
pub use token_array::{Token, TokenArray, HIRAGANA_SENTINEL, KATAKANA_SENTINEL};

use std::io;
use std::path::Path;

use crate::louds::{Louds, LoudsWithTermId};

/// Unified error type for dictionary binary I/O and the offline builder.
///
/// Format errors are fatal and surfaced to the caller; query-time lookups
/// never produce them.
#[derive(Debug, thiserror::Error)]
pub enum DictError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unexpected end of data")]
    Truncated,

    #[error("{0} trailing bytes after structure")]
    TrailingBytes(usize),

    #[error("bit vector length {bits} does not match word count {words}")]
    WordCountMismatch { bits: u64, words: u64 },

    #[error("connection stream has odd byte count {0}")]
    OddByteCount(usize),

    #[error("connection stream length {0} is not a perfect square")]
    NotSquare(usize),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("surface not present in surface trie: {0}")]
    UnresolvedSurface(String),
}

/// File names used by [`DictionarySet::save_dir`] / [`DictionarySet::load_dir`].
pub const READING_TRIE_FILE: &str = "reading.louds";
pub const SURFACE_TRIE_FILE: &str = "surface.louds";
pub const TOKEN_ARRAY_FILE: &str = "token_array.bin";
pub const POS_TABLE_FILE: &str = "pos_table.bin";
pub const CONNECTION_FILE: &str = "connection.bin";

/// The five read-only structures a conversion engine needs.
pub struct DictionarySet {
    /// Reading trie; terminals carry term ids into the token array.
    pub reading: LoudsWithTermId,
    /// Surface trie over non-kana-only surface forms.
    pub surface: Louds,
    /// Per-term posting lists.
    pub tokens: TokenArray,
    /// posIndex → (leftId, rightId).
    pub pos: PosTable,
    /// Pairwise POS transition costs.
    pub connection: ConnectionMatrix,
}

impl DictionarySet {
    /// Write all five structures into `dir` under their fixed names.
    pub fn save_dir(&self, dir: &Path) -> Result<(), DictError> {
        std::fs::create_dir_all(dir)?;
        self.reading.save(&dir.join(READING_TRIE_FILE))?;
        self.surface.save(&dir.join(SURFACE_TRIE_FILE))?;
        self.tokens.save(&dir.join(TOKEN_ARRAY_FILE))?;
        self.pos.save(&dir.join(POS_TABLE_FILE))?;
        self.connection.save(&dir.join(CONNECTION_FILE))?;
        Ok(())
    }

    /// Load all five structures from `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self, DictError> {
        Ok(Self {
            reading: LoudsWithTermId::open(&dir.join(READING_TRIE_FILE))?,
            surface: Louds::open(&dir.join(SURFACE_TRIE_FILE))?,
            tokens: TokenArray::open(&dir.join(TOKEN_ARRAY_FILE))?,
            pos: PosTable::open(&dir.join(POS_TABLE_FILE))?,
            connection: ConnectionMatrix::open(&dir.join(CONNECTION_FILE))?,
        })
    }
}
