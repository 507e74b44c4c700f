//! Build-time prefix trees and their LOUDS conversion.
//!
//! The trees are only used while compiling a dictionary; queries always run
//! against the converted [`Louds`] / [`LoudsWithTermId`] forms. Children are
//! kept in a `BTreeMap` so BFS conversion enumerates them sorted by label
//! code unit, which makes the emitted LBS deterministic.

use std::collections::{BTreeMap, VecDeque};

use crate::bits::BitVector;

use super::term_id::LoudsWithTermId;
use super::{Louds, DUMMY_LABEL};

#[derive(Debug, Default)]
struct Node {
    children: BTreeMap<u16, Node>,
    terminal: bool,
}

/// Prefix tree over UTF-16 code units.
#[derive(Debug, Default)]
pub struct PrefixTree {
    root: Node,
}

impl PrefixTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &[u16]) {
        let mut cur = &mut self.root;
        for &unit in key {
            cur = cur.children.entry(unit).or_default();
        }
        cur.terminal = true;
    }

    /// Convert to LOUDS by BFS, emitting one '1' per child and a '0'
    /// terminator per node, after the two dummy bits that make the root
    /// addressable.
    pub fn to_louds(&self) -> Louds {
        let mut lbs = BitVector::new();
        let mut is_leaf = BitVector::new();
        let mut labels: Vec<u16> = vec![DUMMY_LABEL, DUMMY_LABEL];
        lbs.push(true);
        lbs.push(false);
        is_leaf.push(false);
        is_leaf.push(false);

        let mut queue: VecDeque<&Node> = VecDeque::new();
        queue.push_back(&self.root);
        while let Some(node) = queue.pop_front() {
            for (&label, child) in &node.children {
                lbs.push(true);
                is_leaf.push(child.terminal);
                labels.push(label);
                queue.push_back(child);
            }
            lbs.push(false);
            is_leaf.push(false);
        }

        Louds::from_parts(lbs, is_leaf, labels)
    }
}

#[derive(Debug, Default)]
struct TermNode {
    children: BTreeMap<u16, TermNode>,
    term_id: Option<u32>,
}

/// Prefix tree whose terminals carry a dense term id.
#[derive(Debug, Default)]
pub struct PrefixTreeWithTermId {
    root: TermNode,
}

impl PrefixTreeWithTermId {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &[u16], term_id: u32) {
        let mut cur = &mut self.root;
        for &unit in key {
            cur = cur.children.entry(unit).or_default();
        }
        cur.term_id = Some(term_id);
    }

    /// Convert to LOUDS. In addition to the plain layout, one term-id entry
    /// is appended per dequeued non-root node, in BFS order; non-terminals
    /// store −1.
    pub fn to_louds(&self) -> LoudsWithTermId {
        let mut lbs = BitVector::new();
        let mut is_leaf = BitVector::new();
        let mut labels: Vec<u16> = vec![DUMMY_LABEL, DUMMY_LABEL];
        let mut term_ids: Vec<i32> = Vec::new();
        lbs.push(true);
        lbs.push(false);
        is_leaf.push(false);
        is_leaf.push(false);

        let mut queue: VecDeque<&TermNode> = VecDeque::new();
        queue.push_back(&self.root);
        let mut is_root = true;
        while let Some(node) = queue.pop_front() {
            if !is_root {
                term_ids.push(node.term_id.map_or(-1, |t| t as i32));
            }
            is_root = false;

            for (&label, child) in &node.children {
                lbs.push(true);
                is_leaf.push(child.term_id.is_some());
                labels.push(label);
                queue.push_back(child);
            }
            lbs.push(false);
            is_leaf.push(false);
        }

        LoudsWithTermId::from_parts(Louds::from_parts(lbs, is_leaf, labels), term_ids)
    }
}
