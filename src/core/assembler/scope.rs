// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Routine reassembly scopes.
//!
//! A scope covers the nodes of one `.FUNCT` up to the next `.FUNCT`, `.END`
//! or the end of input. Local labels are guessed when the scope begins; if a
//! walk finds a label elsewhere the engine rewinds to the snapshot and walks
//! again with the corrected guesses.

use std::collections::HashMap;

use crate::core::abbrev_finder::Checkpoint;
use crate::core::ir::{Node, NodeKind};
use crate::core::layout::PackingBases;

/// Walks allowed before a routine is declared divergent.
pub const MAX_WALKS: u32 = 8;

/// Engine state captured at scope start and restored on rewind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeSnapshot {
    pub position: u32,
    pub fixups: usize,
    pub debug_records: usize,
    pub diagnostics: usize,
    pub text: Option<Checkpoint>,
    pub objects: u16,
    pub globals: u16,
    pub abbreviations: usize,
    pub packing: PackingBases,
}

#[derive(Debug, Clone)]
pub struct ReassemblyScope {
    pub routine: String,
    pub start_index: usize,
    pub end_index: usize,
    pub snapshot: ScopeSnapshot,
    pub walks: u32,
    local_labels: Vec<String>,
    guesses: HashMap<String, i32>,
    moved: bool,
    /// Global symbols that changed during a walk, with their value before it.
    deferred: Vec<(String, i32)>,
}

impl ReassemblyScope {
    pub fn new(routine: &str, start_index: usize, nodes: &[Node], snapshot: ScopeSnapshot) -> Self {
        let end_index = scope_end(nodes, start_index);
        let local_labels = nodes[start_index + 1..end_index]
            .iter()
            .filter_map(|node| match &node.kind {
                NodeKind::LocalLabel(name) => Some(name.clone()),
                _ => None,
            })
            .collect();
        Self {
            routine: routine.to_string(),
            start_index,
            end_index,
            snapshot,
            walks: 1,
            local_labels,
            guesses: HashMap::new(),
            moved: false,
            deferred: Vec::new(),
        }
    }

    pub fn local_labels(&self) -> &[String] {
        &self.local_labels
    }

    pub fn guess_for(&self, name: &str, fallback: i32) -> i32 {
        self.guesses.get(name).copied().unwrap_or(fallback)
    }

    /// Remember where a label actually landed; the walk must be repeated.
    pub fn record_move(&mut self, name: &str, actual: i32) {
        self.guesses.insert(name.to_string(), actual);
        self.moved = true;
    }

    pub fn needs_rewalk(&self) -> bool {
        self.moved
    }

    /// Start another walk. Fails once the walk budget is spent.
    pub fn begin_rewalk(&mut self) -> Result<(), u32> {
        if self.walks >= MAX_WALKS {
            return Err(self.walks);
        }
        self.walks += 1;
        self.moved = false;
        Ok(())
    }

    /// Defer a global value change until the walks are done.
    pub fn defer_global(&mut self, name: &str, old: i32) {
        if !self.deferred.iter().any(|(seen, _)| seen == name) {
            self.deferred.push((name.to_string(), old));
        }
    }

    pub fn take_deferred(&mut self) -> Vec<(String, i32)> {
        std::mem::take(&mut self.deferred)
    }
}

/// Index one past the last node of the routine starting at `start`.
pub fn scope_end(nodes: &[Node], start: usize) -> usize {
    nodes
        .iter()
        .enumerate()
        .skip(start + 1)
        .find(|(_, node)| node.ends_routine())
        .map_or(nodes.len(), |(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ir::{Directive, Instruction};

    fn snapshot() -> ScopeSnapshot {
        ScopeSnapshot {
            position: 0x100,
            fixups: 0,
            debug_records: 0,
            diagnostics: 0,
            text: None,
            objects: 0,
            globals: 0,
            abbreviations: 0,
            packing: PackingBases::default(),
        }
    }

    fn funct(name: &str) -> Node {
        Node::directive(Directive::Funct {
            name: name.to_string(),
            locals: Vec::new(),
        })
    }

    #[test]
    fn scope_ends_at_next_routine_or_end() {
        let nodes = vec![
            funct("A"),
            Node::local_label("L1"),
            Node::instruction(Instruction::new("RTRUE")),
            funct("B"),
            Node::local_label("L2"),
            Node::directive(Directive::End),
            Node::instruction(Instruction::new("QUIT")),
        ];
        let first = ReassemblyScope::new("A", 0, &nodes, snapshot());
        assert_eq!(first.end_index, 3);
        assert_eq!(first.local_labels(), &["L1".to_string()]);
        let second = ReassemblyScope::new("B", 3, &nodes, snapshot());
        assert_eq!(second.end_index, 5);
        assert_eq!(scope_end(&nodes[..5], 3), 5);
    }

    #[test]
    fn walk_budget_is_bounded() {
        let nodes = vec![funct("A")];
        let mut scope = ReassemblyScope::new("A", 0, &nodes, snapshot());
        for _ in 1..MAX_WALKS {
            scope.record_move("L", 4);
            assert!(scope.needs_rewalk());
            scope.begin_rewalk().expect("within budget");
            assert!(!scope.needs_rewalk());
        }
        assert_eq!(scope.begin_rewalk(), Err(MAX_WALKS));
        assert_eq!(scope.guess_for("L", 0), 4);
        assert_eq!(scope.guess_for("M", 9), 9);
    }

    #[test]
    fn deferred_globals_keep_first_old_value() {
        let nodes = vec![funct("A")];
        let mut scope = ReassemblyScope::new("A", 0, &nodes, snapshot());
        scope.defer_global("TBL", 10);
        scope.defer_global("TBL", 12);
        assert_eq!(scope.take_deferred(), vec![("TBL".to_string(), 10)]);
        assert!(scope.take_deferred().is_empty());
    }
}
