//! Offline dictionary compiler.
//!
//! Groups source rows by reading, assigns dense term ids (readings sorted by
//! length then code units), builds the reading and surface tries, the POS
//! table, and the token array. Build-time problems are fatal; the query side
//! never sees a partially built set.

use std::collections::HashMap;

use tracing::{debug, debug_span};

use crate::louds::{PrefixTree, PrefixTreeWithTermId};
use crate::unicode::{is_hiragana_only, is_katakana_only};
use crate::utf16;

use super::token_array::TokenBuilder;
use super::{
    ConnectionMatrix, DictError, DictionarySet, PosTable, HIRAGANA_SENTINEL, KATAKANA_SENTINEL,
};

/// One source-dictionary row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictRow {
    pub reading: Vec<u16>,
    pub left_id: i16,
    pub right_id: i16,
    pub cost: i16,
    pub surface: Vec<u16>,
}

/// Compile source rows and a connection matrix into a [`DictionarySet`].
///
/// Building twice from the same rows yields byte-identical structures: the
/// grouping preserves row order within each reading, term ids follow the
/// sorted reading order, and posIndex assignment is a deterministic function
/// of the same traversal.
pub fn build_dictionary(
    rows: Vec<DictRow>,
    connection: ConnectionMatrix,
) -> Result<DictionarySet, DictError> {
    let _span = debug_span!("build_dictionary", rows = rows.len()).entered();

    // Group rows by reading, preserving source order within each group.
    let mut grouped: HashMap<Vec<u16>, Vec<DictRow>> = HashMap::new();
    for row in rows {
        grouped.entry(row.reading.clone()).or_default().push(row);
    }

    // Sort readings by length ascending, then lexicographic on code units;
    // the position in this order is the term id.
    let mut keys: Vec<Vec<u16>> = grouped.keys().cloned().collect();
    keys.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

    let pos_index_by_pair = assign_pos_indexes(&keys, &grouped);
    let pos = pos_table_from_assignment(&pos_index_by_pair);

    // Tries. Surfaces that are kana-only (or equal to their reading) are
    // represented by sentinels instead of surface-trie nodes.
    let mut reading_tree = PrefixTreeWithTermId::new();
    let mut surface_tree = PrefixTree::new();
    for (term_id, key) in keys.iter().enumerate() {
        reading_tree.insert(key, term_id as u32);
        for row in &grouped[key] {
            if !is_kana_only(&row.surface) {
                surface_tree.insert(&row.surface);
            }
        }
    }
    let reading = reading_tree.to_louds();
    let surface = surface_tree.to_louds();

    // Token array, one posting run per term id.
    let mut tokens = TokenBuilder::new();
    for key in &keys {
        tokens.begin_term();
        for row in &grouped[key] {
            let pair = (row.left_id, row.right_id);
            let pos_index = *pos_index_by_pair
                .get(&pair)
                .ok_or_else(|| DictError::Parse(format!("posIndex missing for {pair:?}")))?;

            let node_index = if row.surface == *key || is_hiragana_only(&row.surface) {
                HIRAGANA_SENTINEL
            } else if is_katakana_only(&row.surface) {
                KATAKANA_SENTINEL
            } else {
                let node_pos = surface.node_index(&row.surface).ok_or_else(|| {
                    DictError::UnresolvedSurface(
                        utf16::decode(&row.surface).unwrap_or_default(),
                    )
                })?;
                node_pos as i32
            };

            tokens.push(pos_index, row.cost, node_index);
        }
    }
    let tokens = tokens.finish();

    debug!(
        terms = keys.len(),
        tokens = tokens.len(),
        pos_pairs = pos.len(),
        "dictionary built"
    );

    Ok(DictionarySet {
        reading,
        surface,
        tokens,
        pos,
        connection,
    })
}

/// Walk the rows in canonical (term id) order and give each new
/// `(left_id, right_id)` pair a first-seen counter; the final posIndex is
/// the pair's position when sorted by counter descending, so the
/// latest-discovered pair becomes posIndex 0.
fn assign_pos_indexes(
    keys: &[Vec<u16>],
    grouped: &HashMap<Vec<u16>, Vec<DictRow>>,
) -> HashMap<(i16, i16), u16> {
    let mut first_seen: HashMap<(i16, i16), usize> = HashMap::new();
    let mut counter = 0usize;
    for key in keys {
        for row in &grouped[key] {
            first_seen.entry((row.left_id, row.right_id)).or_insert_with(|| {
                let c = counter;
                counter += 1;
                c
            });
        }
    }

    let mut pairs: Vec<((i16, i16), usize)> = first_seen.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1));
    pairs
        .into_iter()
        .enumerate()
        .map(|(index, (pair, _))| (pair, index as u16))
        .collect()
}

fn pos_table_from_assignment(pos_index_by_pair: &HashMap<(i16, i16), u16>) -> PosTable {
    let n = pos_index_by_pair.len();
    let mut left_ids = vec![0i16; n];
    let mut right_ids = vec![0i16; n];
    for (&(l, r), &index) in pos_index_by_pair {
        left_ids[index as usize] = l;
        right_ids[index as usize] = r;
    }
    PosTable::new(left_ids, right_ids)
}

fn is_kana_only(surface: &[u16]) -> bool {
    is_hiragana_only(surface) || is_katakana_only(surface)
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{flat_connection, rows};
    use super::*;
    use crate::utf16::encode;

    fn sample_rows() -> Vec<DictRow> {
        rows(&[
            ("きょう", 100, 100, 3000, "今日"),
            ("きょう", 100, 100, 5000, "京"),
            ("きょう", 200, 200, 5500, "キョウ"),
            ("き", 300, 300, 4500, "木"),
            ("き", 300, 300, 4800, "き"),
            ("は", 400, 410, 2000, "は"),
        ])
    }

    fn build() -> DictionarySet {
        build_dictionary(sample_rows(), flat_connection(500)).unwrap()
    }

    #[test]
    fn test_term_ids_follow_sorted_readings() {
        let dict = build();
        // Sorted by (length, code units): き < は < きょう.
        assert_eq!(dict.reading.term_id(&encode("き")), Some(0));
        assert_eq!(dict.reading.term_id(&encode("は")), Some(1));
        assert_eq!(dict.reading.term_id(&encode("きょう")), Some(2));
    }

    #[test]
    fn test_posting_lists() {
        let dict = build();
        let kyou = dict.tokens.tokens_for(2);
        assert_eq!(kyou.len(), 3);
        // Source order within the group is preserved.
        assert_eq!(kyou[0].word_cost, 3000);
        assert_eq!(kyou[1].word_cost, 5000);
        assert_eq!(kyou[2].word_cost, 5500);
    }

    #[test]
    fn test_sentinel_assignment() {
        let dict = build();
        let ki = dict.tokens.tokens_for(0);
        // 木 is kanji: a real surface-trie node.
        assert!(ki[0].node_index >= 0);
        // き equals its reading.
        assert_eq!(ki[1].node_index, HIRAGANA_SENTINEL);
        // キョウ is katakana-only.
        let kyou = dict.tokens.tokens_for(2);
        assert_eq!(kyou[2].node_index, KATAKANA_SENTINEL);
    }

    #[test]
    fn test_surface_trie_excludes_kana_only() {
        let dict = build();
        assert!(dict.surface.node_index(&encode("今日")).is_some());
        assert!(dict.surface.node_index(&encode("キョウ")).is_none());
        assert!(dict.surface.node_index(&encode("き")).is_none());
    }

    #[test]
    fn test_surface_resolves_back() {
        let dict = build();
        let kyou = dict.tokens.tokens_for(2);
        let pos = kyou[0].node_index as usize;
        assert_eq!(dict.surface.label_of_node(pos), encode("今日"));
    }

    #[test]
    fn test_pos_table_relabel_descending() {
        let dict = build();
        // First-seen order over sorted readings: (300,300), (400,410),
        // (100,100), (200,200). Re-labelled descending, the last discovered
        // pair gets posIndex 0.
        assert_eq!(dict.pos.get(0), (200, 200));
        assert_eq!(dict.pos.get(1), (100, 100));
        assert_eq!(dict.pos.get(2), (400, 410));
        assert_eq!(dict.pos.get(3), (300, 300));
        assert_eq!(dict.pos.len(), 4);
    }

    #[test]
    fn test_tokens_reference_pos_table() {
        let dict = build();
        for term in 0..3usize {
            for token in dict.tokens.tokens_for(term) {
                let (l, r) = dict.pos.get(token.pos_index);
                assert!(l != 0 || r != 0, "every token maps to a real POS pair");
            }
        }
    }

    #[test]
    fn test_build_idempotent() {
        let a = build();
        let b = build();
        assert_eq!(a.reading.to_bytes(), b.reading.to_bytes());
        assert_eq!(a.surface.to_bytes(), b.surface.to_bytes());
        assert_eq!(a.tokens.to_bytes(), b.tokens.to_bytes());
        assert_eq!(a.pos.to_bytes(), b.pos.to_bytes());
        assert_eq!(a.connection.to_bytes(), b.connection.to_bytes());
    }

    #[test]
    fn test_empty_rows() {
        let dict = build_dictionary(Vec::new(), flat_connection(2)).unwrap();
        assert_eq!(dict.reading.key_count(), 0);
        assert!(dict.tokens.is_empty());
        assert!(dict.pos.is_empty());
    }
}
