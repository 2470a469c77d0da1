// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Global and routine-local symbol tables.

use std::collections::HashMap;

/// What a symbol's value means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// Referenced but not yet defined.
    Unknown,
    Constant,
    Label,
    Variable,
    /// Packed routine address.
    Function,
    /// Packed string address.
    String,
    Object,
}

impl SymbolKind {
    /// Whether values of this kind may take part in addition.
    pub fn is_addable(self) -> bool {
        matches!(
            self,
            SymbolKind::Constant | SymbolKind::Label | SymbolKind::Object
        )
    }

    pub fn is_packed(self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::String)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Unknown => "unknown",
            SymbolKind::Constant => "constant",
            SymbolKind::Label => "label",
            SymbolKind::Variable => "variable",
            SymbolKind::Function => "function",
            SymbolKind::String => "string",
            SymbolKind::Object => "object",
        }
    }
}

/// Pass and node that last defined a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefinitionSite {
    pub pass: u32,
    pub node: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub value: i32,
    /// Predeclared local label still waiting for its definition.
    pub phantom: bool,
    pub defined_at: Option<DefinitionSite>,
}

impl Symbol {
    pub fn is_defined(&self) -> bool {
        self.kind != SymbolKind::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolTableResult {
    /// New symbol, or an Unknown placeholder that now has a value.
    Defined,
    Unchanged,
    Changed { old: i32 },
    /// Already defined elsewhere during the same pass.
    Duplicate { kind: SymbolKind },
}

/// Outcome of reaching a local label's real definition site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalLabelResult {
    Confirmed,
    /// The predeclared guess was wrong; `actual` is the better guess.
    Moved { guess: i32, actual: i32 },
    Duplicate,
    NotDeclared,
}

#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    entries: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.entries.get(name)
    }

    pub fn value_of(&self, name: &str) -> Option<i32> {
        self.lookup(name)
            .filter(|sym| sym.is_defined())
            .map(|sym| sym.value)
    }

    /// Remember a forward reference without giving it a value.
    pub fn insert_unknown(&mut self, name: &str) {
        self.entries
            .entry(name.to_string())
            .or_insert_with(|| Symbol {
                name: name.to_string(),
                kind: SymbolKind::Unknown,
                value: 0,
                phantom: false,
                defined_at: None,
            });
    }

    /// Define or update a symbol.
    ///
    /// Redefinition from the same node in the same pass (a re-walked routine)
    /// updates the value; from a different node it is a duplicate.
    pub fn define(
        &mut self,
        name: &str,
        kind: SymbolKind,
        value: i32,
        site: DefinitionSite,
    ) -> SymbolTableResult {
        match self.entries.get_mut(name) {
            Some(sym) if sym.is_defined() => {
                if let Some(prev) = sym.defined_at {
                    if prev.pass == site.pass && prev.node != site.node {
                        return SymbolTableResult::Duplicate { kind: sym.kind };
                    }
                }
                let old = sym.value;
                sym.kind = kind;
                sym.value = value;
                sym.phantom = false;
                sym.defined_at = Some(site);
                if old == value {
                    SymbolTableResult::Unchanged
                } else {
                    SymbolTableResult::Changed { old }
                }
            }
            Some(sym) => {
                sym.kind = kind;
                sym.value = value;
                sym.defined_at = Some(site);
                SymbolTableResult::Defined
            }
            None => {
                self.entries.insert(
                    name.to_string(),
                    Symbol {
                        name: name.to_string(),
                        kind,
                        value,
                        phantom: false,
                        defined_at: Some(site),
                    },
                );
                SymbolTableResult::Defined
            }
        }
    }

    /// Set a value without duplicate checking, for header symbols and
    /// other engine-owned names.
    pub fn set(&mut self, name: &str, kind: SymbolKind, value: i32) -> SymbolTableResult {
        let previous = self.lookup(name).filter(|sym| sym.is_defined()).map(|sym| sym.value);
        self.entries.insert(
            name.to_string(),
            Symbol {
                name: name.to_string(),
                kind,
                value,
                phantom: false,
                defined_at: None,
            },
        );
        match previous {
            None => SymbolTableResult::Defined,
            Some(old) if old == value => SymbolTableResult::Unchanged,
            Some(old) => SymbolTableResult::Changed { old },
        }
    }

    /// Move a label's value, used when vocabulary records are reordered.
    pub fn relocate(&mut self, name: &str, value: i32) {
        if let Some(sym) = self.entries.get_mut(name) {
            sym.value = value;
        }
    }

    /// Predeclare a local label at a guessed position.
    pub fn predeclare(&mut self, name: &str, guess: i32) {
        self.entries.insert(
            name.to_string(),
            Symbol {
                name: name.to_string(),
                kind: SymbolKind::Label,
                value: guess,
                phantom: true,
                defined_at: None,
            },
        );
    }

    /// Reach the definition of a local label at `position`.
    pub fn confirm(&mut self, name: &str, position: i32) -> LocalLabelResult {
        let Some(sym) = self.entries.get_mut(name) else {
            return LocalLabelResult::NotDeclared;
        };
        if !sym.phantom {
            return LocalLabelResult::Duplicate;
        }
        sym.phantom = false;
        if sym.value == position {
            LocalLabelResult::Confirmed
        } else {
            let guess = sym.value;
            sym.value = position;
            LocalLabelResult::Moved {
                guess,
                actual: position,
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.entries.values()
    }
}
