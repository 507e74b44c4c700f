//! Shortest-path search over the lattice.
//!
//! Forward DP fills each arc's best BOS-rooted cost `f` with per-column beam
//! pruning; backward A* then enumerates N-best paths from EOS, using `f` as
//! the heuristic. Both passes price an edge as
//! `connection(prev.right_id, node.left_id)`, so `f` is exact and paths come
//! out in non-decreasing total cost.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::rc::Rc;

use tracing::{debug, debug_span};

use crate::dict::ConnectionMatrix;
use crate::unicode::{any_digit, is_all_fullwidth_numeric_symbol, is_all_halfwidth_numeric_symbol};

use super::lattice::{Lattice, LatticeNode};

const INF: i64 = i64::MAX / 4;

/// Score penalty for candidates containing any ASCII or fullwidth digit.
const DIGIT_PENALTY: i64 = 2000;

/// Surface-shape class of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    Normal = 1,
    /// Fullwidth numeric/symbol only.
    FullwidthNumeric = 30,
    /// Halfwidth numeric/symbol only.
    HalfwidthNumeric = 31,
}

impl CandidateKind {
    pub fn code(self) -> u8 {
        self as u8
    }

    fn classify(surface: &[u16]) -> Self {
        if is_all_fullwidth_numeric_symbol(surface) {
            CandidateKind::FullwidthNumeric
        } else if is_all_halfwidth_numeric_symbol(surface) {
            CandidateKind::HalfwidthNumeric
        } else {
            CandidateKind::Normal
        }
    }
}

/// One ranked conversion result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub surface: String,
    pub kind: CandidateKind,
    /// Input length in code units, clamped to 255.
    pub length: u8,
    pub score: i64,
    /// `(left_id, right_id)` of the first arc after BOS, when present.
    pub pos_ids: Option<(i16, i16)>,
}

/// Fill `f` and `prev` for every arc, strictly left to right.
///
/// `beam_width == 0` disables pruning; otherwise each column except EOS is
/// cut to the `beam_width` arcs with smallest `f`, stably ordered.
pub fn forward_dp(lattice: &mut Lattice, conn: &ConnectionMatrix, beam_width: usize) {
    let n = lattice.input_len();
    let _span = debug_span!("forward_dp", units = n, beam_width).entered();

    for col in 1..=n + 1 {
        for idx in 0..lattice.columns[col].len() {
            let (start_pos, word_cost, left_id) = {
                let arc = &lattice.columns[col][idx];
                (arc.start_pos, arc.word_cost, arc.left_id)
            };
            let pred_col = if col == n + 1 { n } else { start_pos };

            let mut best = INF;
            let mut best_prev = None;
            for (pidx, pred) in lattice.columns[pred_col].iter().enumerate() {
                let edge = i64::from(conn.get(pred.right_id, left_id));
                let total = pred.f + word_cost + edge;
                if total < best {
                    best = total;
                    best_prev = Some((pred_col, pidx));
                }
            }

            let arc = &mut lattice.columns[col][idx];
            arc.f = best;
            arc.prev = best_prev;
        }

        if col <= n && beam_width > 0 && lattice.columns[col].len() > beam_width {
            lattice.columns[col].sort_by_key(|a| a.f);
            lattice.columns[col].truncate(beam_width);
        }
    }
}

/// The 1-best path according to the forward-DP back-pointers, BOS and EOS
/// excluded. Empty until [`forward_dp`] has run.
pub fn best_forward_path(lattice: &Lattice) -> Vec<&LatticeNode> {
    let eos_col = lattice.columns.len() - 1;
    let mut out = Vec::new();
    let mut cur = lattice.columns[eos_col][0].prev;
    while let Some((col, idx)) = cur {
        if col == 0 {
            break;
        }
        let node = &lattice.columns[col][idx];
        out.push(node);
        cur = node.prev;
    }
    out.reverse();
    out
}

/// A complete BOS→EOS path with its total cost. Arcs are `(column, index)`
/// pairs in left-to-right order, sentinels excluded.
#[derive(Debug, Clone)]
pub(crate) struct RankedPath {
    pub arcs: Vec<(usize, usize)>,
    pub total: i64,
}

impl RankedPath {
    pub(crate) fn surface_units(&self, lattice: &Lattice) -> Vec<u16> {
        let mut out = Vec::new();
        for &(col, idx) in &self.arcs {
            out.extend_from_slice(&lattice.columns[col][idx].surface);
        }
        out
    }
}

/// Backward A* state: `g` accumulates cost from this arc toward EOS and
/// `next` links the reconstruction chain. States are reference-counted so a
/// popped state can be shared as the suffix of many pushed states.
struct SearchState {
    col: usize,
    idx: usize,
    g: i64,
    next: Option<Rc<SearchState>>,
}

/// Heap entry ordered by `(total, start_pos, len, seq)` ascending. The
/// insertion sequence makes ties deterministic.
struct HeapEntry {
    total: i64,
    start_pos: usize,
    len: usize,
    seq: u64,
    state: Rc<SearchState>,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap pops the minimum key.
        other
            .total
            .cmp(&self.total)
            .then_with(|| other.start_pos.cmp(&self.start_pos))
            .then_with(|| other.len.cmp(&self.len))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Enumerate up to `n_best` surface-distinct paths in non-decreasing total
/// cost. [`forward_dp`] must have run on the lattice.
fn astar(lattice: &Lattice, conn: &ConnectionMatrix, n_best: usize) -> Vec<RankedPath> {
    let n = lattice.input_len();
    let eos_col = n + 1;
    let _span = debug_span!("backward_astar", units = n, n_best).entered();

    let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();
    let mut seq = 0u64;
    heap.push(HeapEntry {
        total: 0,
        start_pos: eos_col,
        len: 0,
        seq,
        state: Rc::new(SearchState {
            col: eos_col,
            idx: 0,
            g: 0,
            next: None,
        }),
    });

    let mut paths: Vec<RankedPath> = Vec::new();
    let mut seen: HashSet<Vec<u16>> = HashSet::new();

    while let Some(entry) = heap.pop() {
        let state = entry.state;

        if state.col == 0 {
            // Reached BOS: the chain spells a complete path.
            let mut arcs = Vec::new();
            let mut cur = state.next.clone();
            while let Some(link) = cur {
                if link.col == eos_col {
                    break;
                }
                arcs.push((link.col, link.idx));
                cur = link.next.clone();
            }
            let path = RankedPath {
                arcs,
                total: entry.total,
            };
            if seen.insert(path.surface_units(lattice)) {
                paths.push(path);
                if paths.len() >= n_best {
                    debug!(emitted = paths.len(), "n-best reached");
                    return paths;
                }
            }
            continue;
        }

        let (start_pos, left_id, word_cost) = {
            let node = &lattice.columns[state.col][state.idx];
            (node.start_pos, node.left_id, node.word_cost)
        };
        let pred_col = if state.col == eos_col { n } else { start_pos };

        for (pidx, pred) in lattice.columns[pred_col].iter().enumerate() {
            let edge = i64::from(conn.get(pred.right_id, left_id));
            let g = state.g + edge + word_cost;
            seq += 1;
            heap.push(HeapEntry {
                total: g + pred.f,
                start_pos: pred.start_pos,
                len: pred.len,
                seq,
                state: Rc::new(SearchState {
                    col: pred_col,
                    idx: pidx,
                    g,
                    next: Some(Rc::clone(&state)),
                }),
            });
        }
    }

    debug!(emitted = paths.len(), "queue exhausted");
    paths
}

/// Run forward DP then backward A* and return the raw ranked paths.
pub(crate) fn ranked_paths(
    lattice: &mut Lattice,
    conn: &ConnectionMatrix,
    n_best: usize,
    beam_width: usize,
) -> Vec<RankedPath> {
    if n_best == 0 {
        return Vec::new();
    }
    forward_dp(lattice, conn, beam_width);
    astar(lattice, conn, n_best)
}

/// Run forward DP then backward A*, returning up to `n_best` candidates in
/// non-decreasing cost order plus the bunsetsu positions of the first
/// emitted path. Duplicate surfaces are skipped.
pub fn nbest(
    lattice: &mut Lattice,
    conn: &ConnectionMatrix,
    n_best: usize,
    beam_width: usize,
) -> (Vec<Candidate>, Vec<usize>) {
    let paths = ranked_paths(lattice, conn, n_best, beam_width);

    let bunsetsu = paths
        .first()
        .map(|p| bunsetsu_positions(lattice, p))
        .unwrap_or_default();

    let exhausted = paths.len() < n_best;
    let mut candidates: Vec<Candidate> =
        paths.iter().map(|p| make_candidate(lattice, p)).collect();
    if exhausted {
        // The queue ran dry before n_best distinct surfaces; present what we
        // have sorted by final score.
        candidates.sort_by_key(|c| c.score);
    }
    (candidates, bunsetsu)
}

fn make_candidate(lattice: &Lattice, path: &RankedPath) -> Candidate {
    let surface = path.surface_units(lattice);

    let mut score = path.total;
    if any_digit(&surface) {
        score += DIGIT_PENALTY;
    }

    let pos_ids = path.arcs.first().map(|&(col, idx)| {
        let node = &lattice.columns[col][idx];
        (node.left_id, node.right_id)
    });

    Candidate {
        surface: String::from_utf16_lossy(&surface),
        kind: CandidateKind::classify(&surface),
        length: lattice.input_len().min(255) as u8,
        score,
        pos_ids,
    }
}

/// Phrase boundaries of a path: positions (> 0) where an independent word
/// starts.
fn bunsetsu_positions(lattice: &Lattice, path: &RankedPath) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut current_pos = 0usize;
    for &(col, idx) in &path.arcs {
        let node = &lattice.columns[col][idx];
        if current_pos > 0 && is_independent_word(node.left_id) {
            positions.push(current_pos);
        }
        current_pos += node.len;
    }
    positions
}

/// Whether a left POS id opens a bunsetsu. The integer ranges are part of
/// the dictionary contract: adverbs, conjunctions, interjections, prefixes
/// and adnominals (12–28, 2590–2670), independent verbs (577–856),
/// independent adjectives (2390–2471), and common nouns (1842–2195
/// excluding the suffix range 1937–2040).
pub fn is_independent_word(id: i16) -> bool {
    let x = i32::from(id);
    if (12..=28).contains(&x) || (2590..=2670).contains(&x) {
        return true;
    }
    if (577..=856).contains(&x) {
        return true;
    }
    if (2390..=2471).contains(&x) {
        return true;
    }
    if (1842..=2195).contains(&x) {
        return !(1937..=2040).contains(&x);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::lattice::build_lattice;
    use crate::dict::testutil::{build_dictionary_rows, flat_connection, rows, sample_dictionary};
    use crate::dict::{build_dictionary, ConnectionMatrix, DictionarySet};
    use crate::utf16::encode;

    fn run(dict: &DictionarySet, reading: &str, n_best: usize) -> (Vec<Candidate>, Vec<usize>) {
        let mut lattice = build_lattice(dict, &encode(reading));
        nbest(&mut lattice, &dict.connection, n_best, 20)
    }

    fn surfaces(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.surface.as_str()).collect()
    }

    #[test]
    fn test_one_best() {
        let dict = sample_dictionary();
        let (candidates, _) = run(&dict, "きょう", 1);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].surface, "今日");
        assert_eq!(candidates[0].kind, CandidateKind::Normal);
        assert_eq!(candidates[0].length, 3);
        assert_eq!(candidates[0].pos_ids, Some((1900, 1900)));
        assert!(candidates[0].score > 0);
    }

    #[test]
    fn test_nbest_ordering_and_dedup() {
        let dict = sample_dictionary();
        let (candidates, _) = run(&dict, "きょう", 10);
        // 今日 (3000), 京 (5000), きょう (5500), plus composites like 木+…
        assert!(candidates.len() >= 3);
        assert_eq!(candidates[0].surface, "今日");
        for pair in candidates.windows(2) {
            assert!(pair[0].score <= pair[1].score, "scores must be monotone");
        }
        let unique: HashSet<&str> = surfaces(&candidates).into_iter().collect();
        assert_eq!(unique.len(), candidates.len(), "surfaces must be unique");
    }

    #[test]
    fn test_deterministic() {
        let dict = sample_dictionary();
        let first = run(&dict, "きょうはいいてんき", 8);
        for _ in 0..5 {
            let again = run(&dict, "きょうはいいてんき", 8);
            assert_eq!(surfaces(&again.0), surfaces(&first.0));
            assert_eq!(
                again.0.iter().map(|c| c.score).collect::<Vec<_>>(),
                first.0.iter().map(|c| c.score).collect::<Vec<_>>()
            );
            assert_eq!(again.1, first.1);
        }
    }

    #[test]
    fn test_tie_break_deterministic() {
        let dict = build_dictionary_rows(&[
            ("あ", 10, 10, 5000, "亜"),
            ("あ", 10, 10, 5000, "阿"),
        ]);
        let first = run(&dict, "あ", 2);
        assert_eq!(first.0.len(), 2);
        assert_eq!(first.0[0].score, first.0[1].score);
        for _ in 0..5 {
            assert_eq!(surfaces(&run(&dict, "あ", 2).0), surfaces(&first.0));
        }
    }

    #[test]
    fn test_nbest_zero() {
        let dict = sample_dictionary();
        let (candidates, bunsetsu) = run(&dict, "きょう", 0);
        assert!(candidates.is_empty());
        assert!(bunsetsu.is_empty());
    }

    #[test]
    fn test_connection_costs_change_winner() {
        // Without connection costs 京 (4900) beats 今日 (5000); penalizing
        // the 20→30 transition flips the ranking.
        let entries = [
            ("きょう", 10, 10, 5000, "今日"),
            ("きょう", 20, 20, 4900, "京"),
            ("は", 30, 30, 2000, "は"),
        ];

        let flat = build_dictionary(rows(&entries), flat_connection(31)).unwrap();
        let (candidates, _) = run(&flat, "きょうは", 1);
        assert_eq!(candidates[0].surface, "京は");

        let dim = 31;
        let mut costs = vec![0i16; dim * dim];
        costs[20 * dim + 30] = 500;
        let conn = ConnectionMatrix::from_values(costs).unwrap();
        let biased = build_dictionary(rows(&entries), conn).unwrap();
        let (candidates, _) = run(&biased, "きょうは", 1);
        assert_eq!(candidates[0].surface, "今日は");
    }

    #[test]
    fn test_forward_dp_matches_exhaustive_recursion() {
        fn exhaustive_f(
            lattice: &Lattice,
            conn: &ConnectionMatrix,
            col: usize,
            idx: usize,
        ) -> i64 {
            if col == 0 {
                return 0;
            }
            let node = &lattice.columns[col][idx];
            let n = lattice.input_len();
            let pred_col = if col == n + 1 { n } else { node.start_pos };
            let mut best = INF;
            for (pidx, pred) in lattice.columns[pred_col].iter().enumerate() {
                let edge = i64::from(conn.get(pred.right_id, node.left_id));
                let via = exhaustive_f(lattice, conn, pred_col, pidx) + node.word_cost + edge;
                best = best.min(via);
            }
            best
        }

        let dict = sample_dictionary();
        let mut lattice = build_lattice(&dict, &encode("きょうはいいてんき"));
        forward_dp(&mut lattice, &dict.connection, 0);
        for col in 1..lattice.columns.len() {
            for idx in 0..lattice.columns[col].len() {
                assert_eq!(
                    lattice.columns[col][idx].f,
                    exhaustive_f(&lattice, &dict.connection, col, idx),
                    "f mismatch at column {col} index {idx}"
                );
            }
        }
    }

    #[test]
    fn test_astar_total_matches_forward_best() {
        // The best path's A* total must equal the EOS forward cost.
        let dict = sample_dictionary();
        let mut lattice = build_lattice(&dict, &encode("きょうはてんき"));
        let paths = ranked_paths(&mut lattice, &dict.connection, 1, 0);
        let eos = lattice.columns.last().unwrap().first().unwrap();
        assert_eq!(paths[0].total, eos.f);
    }

    #[test]
    fn test_best_forward_path_matches_first_candidate() {
        let dict = sample_dictionary();
        let mut lattice = build_lattice(&dict, &encode("きょうはいいてんき"));
        let (candidates, _) = nbest(&mut lattice, &dict.connection, 1, 0);

        let path = best_forward_path(&lattice);
        let path_surface: String = path
            .iter()
            .map(|a| String::from_utf16_lossy(&a.surface))
            .collect();
        assert_eq!(path_surface, candidates[0].surface);
        // Spans tile the input.
        let mut pos = 0;
        for arc in &path {
            assert_eq!(arc.start_pos, pos);
            pos += arc.len;
        }
        assert_eq!(pos, lattice.input_len());
    }

    #[test]
    fn test_beam_pruning_caps_columns() {
        let dict = build_dictionary_rows(&[
            ("あ", 10, 10, 5000, "亜"),
            ("あ", 11, 11, 5100, "阿"),
            ("あ", 12, 12, 5200, "吾"),
            ("あ", 13, 13, 5300, "唖"),
        ]);
        let mut lattice = build_lattice(&dict, &encode("ああ"));
        forward_dp(&mut lattice, &dict.connection, 2);
        assert_eq!(lattice.columns[1].len(), 2, "column cut to beam width");
        assert!(lattice.columns[1][0].f <= lattice.columns[1][1].f);

        // Beam width 0 disables pruning.
        let mut lattice = build_lattice(&dict, &encode("ああ"));
        forward_dp(&mut lattice, &dict.connection, 0);
        assert_eq!(lattice.columns[1].len(), 4);
    }

    #[test]
    fn test_halfwidth_digits() {
        let dict = sample_dictionary();
        let (candidates, _) = run(&dict, "2024", 1);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].surface, "2024");
        assert_eq!(candidates[0].kind, CandidateKind::HalfwidthNumeric);
        assert_eq!(candidates[0].kind.code(), 31);
        // Four fallback arcs at 10000 each plus the digit penalty.
        assert_eq!(candidates[0].score, 42000);
        assert_eq!(candidates[0].length, 4);
    }

    #[test]
    fn test_fullwidth_digits() {
        let dict = sample_dictionary();
        let (candidates, _) = run(&dict, "２０２４", 1);
        assert_eq!(candidates[0].surface, "２０２４");
        assert_eq!(candidates[0].kind, CandidateKind::FullwidthNumeric);
        assert_eq!(candidates[0].kind.code(), 30);
        assert_eq!(candidates[0].score, 42000);
    }

    #[test]
    fn test_no_hits_anywhere_returns_input() {
        let dict = sample_dictionary();
        let (candidates, bunsetsu) = run(&dict, "ぬるぽ", 3);
        assert_eq!(candidates.len(), 1, "only the fallback path exists");
        assert_eq!(candidates[0].surface, "ぬるぽ");
        assert!(bunsetsu.is_empty());
    }

    #[test]
    fn test_bunsetsu_positions() {
        let dict = sample_dictionary();
        // 今日(noun, independent) | は(particle) | 天気(noun).
        let (candidates, bunsetsu) = run(&dict, "きょうはてんき", 1);
        assert_eq!(candidates[0].surface, "今日は天気");
        // てんき starts at unit 4 with an independent-noun left id; は is not
        // independent, so only position 4 is a boundary.
        assert_eq!(bunsetsu, vec![4]);
    }

    #[test]
    fn test_is_independent_word_ranges() {
        assert!(is_independent_word(12));
        assert!(is_independent_word(28));
        assert!(!is_independent_word(29));
        assert!(is_independent_word(600));
        assert!(is_independent_word(2400));
        assert!(is_independent_word(2600));
        assert!(is_independent_word(1900));
        assert!(!is_independent_word(1999), "noun suffix range is excluded");
        assert!(is_independent_word(2041));
        assert!(!is_independent_word(0));
        assert!(!is_independent_word(300));
        assert!(!is_independent_word(-5));
    }

    #[test]
    fn test_exhausted_queue_returns_everything() {
        let dict = build_dictionary_rows(&[("あ", 10, 10, 5000, "亜")]);
        let (candidates, _) = run(&dict, "あ", 100);
        assert_eq!(surfaces(&candidates), vec!["亜"]);
    }
}
