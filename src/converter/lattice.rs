use tracing::{debug, debug_span};

use crate::dict::{DictionarySet, HIRAGANA_SENTINEL, KATAKANA_SENTINEL};
use crate::unicode::hiragana_to_katakana;

/// Cost of the 1-unit fallback arc inserted when a position has no
/// dictionary hit at all.
pub const UNKNOWN_WORD_COST: i64 = 10000;

/// An arc in the conversion lattice, spanning `len` code units of the input
/// starting at `start_pos`.
#[derive(Debug, Clone)]
pub struct LatticeNode {
    /// Left POS id.
    pub left_id: i16,
    /// Right POS id.
    pub right_id: i16,
    /// Word cost (lower = more preferred).
    pub word_cost: i64,
    /// Best BOS→node cost; word cost until forward DP overwrites it.
    pub f: i64,
    /// Surface form in UTF-16 code units. Empty for BOS/EOS.
    pub surface: Vec<u16>,
    /// Span in input code units.
    pub len: usize,
    /// Start position in the input.
    pub start_pos: usize,
    /// Forward-DP back-pointer: `(column, index)` of the best predecessor.
    pub prev: Option<(usize, usize)>,
}

impl LatticeNode {
    fn sentinel(start_pos: usize) -> Self {
        Self {
            left_id: 0,
            right_id: 0,
            word_cost: 0,
            f: 0,
            surface: Vec::new(),
            len: 0,
            start_pos,
            prev: None,
        }
    }
}

/// The word lattice over one reading.
///
/// `columns[end_pos]` holds the arcs ending at `end_pos` (exclusive);
/// `columns[0]` is BOS only and `columns[n + 1]` is EOS only, so the vector
/// has `n + 2` entries for an input of `n` code units.
pub struct Lattice {
    pub(crate) columns: Vec<Vec<LatticeNode>>,
}

impl Lattice {
    /// Input length in code units.
    pub fn input_len(&self) -> usize {
        self.columns.len() - 2
    }

    pub fn columns(&self) -> &[Vec<LatticeNode>] {
        &self.columns
    }

    /// Total arc count including BOS and EOS.
    pub fn node_count(&self) -> usize {
        self.columns.iter().map(|c| c.len()).sum()
    }
}

/// Build the lattice for a reading.
///
/// One common-prefix search per start position finds every dictionary hit;
/// each hit expands to one arc per token in its posting list. A position
/// with no hit at all gets a single high-cost 1-unit fallback arc so the
/// lattice always stays connected.
pub fn build_lattice(dict: &DictionarySet, reading: &[u16]) -> Lattice {
    let n = reading.len();
    let _span = debug_span!("build_lattice", units = n).entered();

    let mut columns: Vec<Vec<LatticeNode>> = vec![Vec::new(); n + 2];
    columns[0].push(LatticeNode::sentinel(0));
    columns[n + 1].push(LatticeNode::sentinel(n + 1));

    for start in 0..n {
        let hits = dict.reading.prefix_hits(&reading[start..]);

        if hits.is_empty() {
            columns[start + 1].push(LatticeNode {
                left_id: 0,
                right_id: 0,
                word_cost: UNKNOWN_WORD_COST,
                f: UNKNOWN_WORD_COST,
                surface: reading[start..start + 1].to_vec(),
                len: 1,
                start_pos: start,
                prev: None,
            });
            continue;
        }

        for hit in hits {
            let Some(term_id) = hit.term_id else {
                continue;
            };
            let yomi = &reading[start..start + hit.len];

            for token in dict.tokens.tokens_for(term_id as usize) {
                let surface = match token.node_index {
                    HIRAGANA_SENTINEL => yomi.to_vec(),
                    KATAKANA_SENTINEL => hiragana_to_katakana(yomi),
                    node_index => {
                        if node_index < 0 {
                            continue;
                        }
                        let surface = dict.surface.label_of_node(node_index as usize);
                        if surface.is_empty() {
                            // A node index that fails to resolve cannot occur
                            // in a well-formed dictionary; drop the arc.
                            continue;
                        }
                        surface
                    }
                };

                let (left_id, right_id) = dict.pos.get(token.pos_index);
                let cost = i64::from(token.word_cost);
                add_or_update(
                    &mut columns[start + hit.len],
                    LatticeNode {
                        left_id,
                        right_id,
                        word_cost: cost,
                        f: cost,
                        surface,
                        len: hit.len,
                        start_pos: start,
                        prev: None,
                    },
                );
            }
        }
    }

    let lattice = Lattice { columns };
    debug!(nodes = lattice.node_count(), "lattice built");
    lattice
}

/// Insert an arc, de-duplicating on `(left_id, right_id, surface)` and
/// keeping the cheaper copy in place.
fn add_or_update(column: &mut Vec<LatticeNode>, node: LatticeNode) {
    if let Some(existing) = column.iter_mut().find(|x| {
        x.left_id == node.left_id && x.right_id == node.right_id && x.surface == node.surface
    }) {
        if node.word_cost < existing.word_cost {
            *existing = node;
        }
    } else {
        column.push(node);
    }
}
