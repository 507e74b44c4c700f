//! Diagnostic view of the conversion pipeline.
//!
//! Captures the lattice and the N-best paths with a per-segment cost
//! breakdown, for the `explain` CLI surface and for debugging dictionary
//! regressions. Query semantics are identical to [`super::convert`]; this
//! module only records more of what the search already computes.

use std::fmt::Write as _;

use serde::Serialize;

use crate::dict::{ConnectionMatrix, DictionarySet};
use crate::utf16;

use super::lattice::{build_lattice, Lattice};
use super::search::{ranked_paths, RankedPath};

/// Full diagnostic result for a single reading.
#[derive(Debug, Serialize)]
pub struct ExplainResult {
    pub reading: String,
    pub unit_count: usize,
    /// Arcs that survived beam pruning, BOS/EOS excluded.
    pub lattice_nodes: Vec<ExplainNode>,
    pub paths: Vec<ExplainPath>,
}

/// A lattice arc for diagnostic display.
#[derive(Debug, Serialize)]
pub struct ExplainNode {
    pub start: usize,
    pub end: usize,
    pub surface: String,
    pub word_cost: i64,
    /// Best BOS→arc cost from forward DP.
    pub forward_cost: i64,
    pub left_id: i16,
    pub right_id: i16,
}

/// A complete path with its cost breakdown.
#[derive(Debug, Serialize)]
pub struct ExplainPath {
    pub segments: Vec<ExplainSegment>,
    /// Connection cost of the final transition into EOS.
    pub eos_connection_cost: i64,
    pub total: i64,
}

impl ExplainPath {
    pub fn surface(&self) -> String {
        self.segments.iter().map(|s| s.surface.as_str()).collect()
    }
}

/// One arc within a path.
#[derive(Debug, Serialize)]
pub struct ExplainSegment {
    pub surface: String,
    pub start: usize,
    pub len: usize,
    pub word_cost: i64,
    /// Connection cost from BOS or from the previous segment.
    pub connection_cost: i64,
    pub left_id: i16,
    pub right_id: i16,
}

/// Run the conversion search and capture the lattice plus the N-best paths
/// with per-segment costs.
pub fn explain(
    dict: &DictionarySet,
    reading: &[u16],
    n_best: usize,
    beam_width: usize,
) -> ExplainResult {
    let mut lattice = build_lattice(dict, reading);
    let paths = ranked_paths(&mut lattice, &dict.connection, n_best, beam_width);

    ExplainResult {
        reading: String::from_utf16_lossy(reading),
        unit_count: reading.len(),
        lattice_nodes: collect_nodes(&lattice),
        paths: paths
            .iter()
            .map(|p| explain_path(&lattice, &dict.connection, p))
            .collect(),
    }
}

fn collect_nodes(lattice: &Lattice) -> Vec<ExplainNode> {
    let eos_col = lattice.columns().len() - 1;
    let mut out = Vec::new();
    for (end, column) in lattice.columns().iter().enumerate() {
        if end == 0 || end == eos_col {
            continue;
        }
        for arc in column {
            out.push(ExplainNode {
                start: arc.start_pos,
                end,
                surface: String::from_utf16_lossy(&arc.surface),
                word_cost: arc.word_cost,
                forward_cost: arc.f,
                left_id: arc.left_id,
                right_id: arc.right_id,
            });
        }
    }
    out
}

fn explain_path(
    lattice: &Lattice,
    conn: &ConnectionMatrix,
    path: &RankedPath,
) -> ExplainPath {
    let mut segments = Vec::with_capacity(path.arcs.len());
    let mut prev_right: i16 = 0; // BOS
    for &(col, idx) in &path.arcs {
        let arc = &lattice.columns()[col][idx];
        segments.push(ExplainSegment {
            surface: String::from_utf16_lossy(&arc.surface),
            start: arc.start_pos,
            len: arc.len,
            word_cost: arc.word_cost,
            connection_cost: i64::from(conn.get(prev_right, arc.left_id)),
            left_id: arc.left_id,
            right_id: arc.right_id,
        });
        prev_right = arc.right_id;
    }
    ExplainPath {
        segments,
        eos_connection_cost: i64::from(conn.get(prev_right, 0)),
        total: path.total,
    }
}

/// Render an [`ExplainResult`] as the text form the CLI prints.
pub fn format_text(result: &ExplainResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "reading: {} ({} units)",
        result.reading, result.unit_count
    );

    if !result.lattice_nodes.is_empty() {
        let _ = writeln!(out, "lattice ({} arcs):", result.lattice_nodes.len());
        for node in &result.lattice_nodes {
            let _ = writeln!(
                out,
                "  [{}..{}) {}\tcost={}\tf={}\tlr={},{}",
                node.start,
                node.end,
                node.surface,
                node.word_cost,
                node.forward_cost,
                node.left_id,
                node.right_id
            );
        }
    }

    let _ = writeln!(out, "paths ({}):", result.paths.len());
    for (rank, path) in result.paths.iter().enumerate() {
        let _ = writeln!(out, "  #{} {} total={}", rank + 1, path.surface(), path.total);
        for seg in &path.segments {
            let _ = writeln!(
                out,
                "    [{}..{}) {}\tword={}\tconn={}\tlr={},{}",
                seg.start,
                seg.start + seg.len,
                seg.surface,
                seg.word_cost,
                seg.connection_cost,
                seg.left_id,
                seg.right_id
            );
        }
    }
    out
}

/// Convenience wrapper taking the reading as a `&str`.
pub fn explain_str(
    dict: &DictionarySet,
    reading: &str,
    n_best: usize,
    beam_width: usize,
) -> ExplainResult {
    explain(dict, &utf16::encode(reading), n_best, beam_width)
}
