//! Lattice construction and N-best path search.

pub mod explain;
mod lattice;
mod search;

pub use lattice::{build_lattice, Lattice, LatticeNode, UNKNOWN_WORD_COST};
pub use search::{
    best_forward_path, forward_dp, is_independent_word, nbest, Candidate, CandidateKind,
};

use crate::dict::DictionarySet;

/// Convert a reading into up to `n_best` ranked candidates plus the
/// bunsetsu positions of the best path.
///
/// `beam_width == 0` disables per-column pruning.
pub fn convert(
    dict: &DictionarySet,
    reading: &[u16],
    n_best: usize,
    beam_width: usize,
) -> (Vec<Candidate>, Vec<usize>) {
    let mut lattice = build_lattice(dict, reading);
    nbest(&mut lattice, &dict.connection, n_best, beam_width)
}
