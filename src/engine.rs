//! The conversion engine handle.

use std::path::Path;

use crate::converter::{self, Candidate};
use crate::dict::{DictError, DictionarySet};
use crate::utf16;

/// Result of one conversion call.
#[derive(Debug, Clone)]
pub struct Conversion {
    /// Ranked candidates, best first.
    pub candidates: Vec<Candidate>,
    /// Phrase-boundary positions (code units) of the best path.
    pub bunsetsu_positions: Vec<usize>,
}

impl Conversion {
    fn empty() -> Self {
        Self {
            candidates: Vec::new(),
            bunsetsu_positions: Vec::new(),
        }
    }
}

/// An engine holds the immutable dictionaries; queries are synchronous and
/// never mutate shared state, so several engines may share dictionaries if
/// the host arranges it.
pub struct Engine {
    dict: DictionarySet,
}

impl Engine {
    pub fn new(dict: DictionarySet) -> Self {
        Self { dict }
    }

    /// Load the compiled dictionary set from a directory.
    pub fn load(dir: &Path) -> Result<Self, DictError> {
        Ok(Self::new(DictionarySet::load_dir(dir)?))
    }

    pub fn dictionary(&self) -> &DictionarySet {
        &self.dict
    }

    /// Convert a hiragana reading into up to `n_best` candidates.
    ///
    /// Empty input or `n_best == 0` yields an empty result; `beam_width == 0`
    /// disables pruning. Query time never errors: a reading with no
    /// dictionary hits falls back to per-unit unknown arcs whose
    /// concatenation reproduces the input.
    pub fn convert(&self, reading: &str, n_best: usize, beam_width: usize) -> Conversion {
        self.convert_units(&utf16::encode(reading), n_best, beam_width)
    }

    /// As [`Engine::convert`], for input already in UTF-16 code units.
    pub fn convert_units(&self, reading: &[u16], n_best: usize, beam_width: usize) -> Conversion {
        if reading.is_empty() || n_best == 0 {
            return Conversion::empty();
        }
        let (candidates, bunsetsu_positions) =
            converter::convert(&self.dict, reading, n_best, beam_width);
        Conversion {
            candidates,
            bunsetsu_positions,
        }
    }
}
