// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use super::*;

impl<'a> Assembler<'a> {
    pub(crate) fn process_global_label(&mut self, name: &str) -> Result<Flow, Fault> {
        let position = self.image.position();
        if self.vocab.is_some() {
            let previous = self.globals.value_of(name);
            let site = self.site();
            if let SymbolTableResult::Duplicate { kind } =
                self.globals
                    .define(name, SymbolKind::Label, position as i32, site)
            {
                return Err(duplicate_symbol(name, kind));
            }
            if let Some(vocab) = self.vocab.as_mut() {
                vocab.block.labels.push((name.to_string(), position));
                vocab.previous.push(previous);
            }
            return Ok(Flow::Continue);
        }
        self.define_global(name, SymbolKind::Label, position as i32)?;
        Ok(Flow::Continue)
    }

    pub(crate) fn process_local_label(&mut self, name: &str) -> Result<Flow, Fault> {
        if self.scope.is_none() {
            return Err(Fault::serious(
                AsmErrorKind::Symbol,
                "Local label outside a routine",
                Some(name),
            ));
        }
        let position = self.image.position() as i32;
        match self.locals.confirm(name, position) {
            LocalLabelResult::Confirmed => Ok(Flow::Continue),
            LocalLabelResult::Moved { guess, actual } => {
                if let Some(scope) = self.scope.as_mut() {
                    debug!(
                        "local label {name} in {} moved from {guess:#x} to {actual:#x}",
                        scope.routine
                    );
                    scope.record_move(name, actual);
                }
                Ok(Flow::Continue)
            }
            LocalLabelResult::Duplicate => Err(Fault::serious(
                AsmErrorKind::Symbol,
                "Duplicate local label",
                Some(name),
            )),
            LocalLabelResult::NotDeclared => Err(Fault::serious(
                AsmErrorKind::Symbol,
                "Local label was not declared by its routine",
                Some(name),
            )),
        }
    }

    /// Define a global symbol from the current node.
    pub(crate) fn define_global(
        &mut self,
        name: &str,
        kind: SymbolKind,
        value: i32,
    ) -> Result<(), Fault> {
        let site = self.site();
        match self.globals.define(name, kind, value, site) {
            SymbolTableResult::Defined | SymbolTableResult::Unchanged => Ok(()),
            SymbolTableResult::Changed { old } => self.note_global_change(name, old),
            SymbolTableResult::Duplicate { kind } => Err(duplicate_symbol(name, kind)),
        }
    }

    /// A global moved; decide when the move is judged.
    pub(crate) fn note_global_change(&mut self, name: &str, old: i32) -> Result<(), Fault> {
        if let Some(vocab) = self.vocab.as_mut() {
            if !vocab.deferred.iter().any(|(seen, _)| seen == name) {
                vocab.deferred.push((name.to_string(), old));
            }
            return Ok(());
        }
        if let Some(scope) = self.scope.as_mut() {
            scope.defer_global(name, old);
            return Ok(());
        }
        self.global_changed(name, old)
    }

    /// Judge a global whose value was `old` before this pass touched it.
    pub(crate) fn global_changed(&mut self, name: &str, old: i32) -> Result<(), Fault> {
        let Some(new) = self.globals.value_of(name) else {
            return Ok(());
        };
        if new == old {
            return Ok(());
        }
        match self.mode {
            PassMode::Measuring => {
                debug!(
                    "{name} moved from {old:#x} to {new:#x} in pass {}",
                    self.pass
                );
                self.changed = true;
                Ok(())
            }
            PassMode::Assembling => Err(Fault::fatal(
                AsmErrorKind::Layout,
                &format!("Value changed from {old:#x} to {new:#x} during the final pass"),
                Some(name),
            )),
        }
    }
}

fn duplicate_symbol(name: &str, kind: SymbolKind) -> Fault {
    Fault::serious(
        AsmErrorKind::Symbol,
        &format!("Symbol already defined as {}", kind.as_str()),
        Some(name),
    )
}
