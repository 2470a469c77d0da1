// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use super::*;

impl<'a> Assembler<'a> {
    /// Evaluate against the locals, then the globals.
    ///
    /// Forward references are remembered as Unknown globals so later passes
    /// can tell a forgotten symbol from one that was merely late.
    pub(crate) fn eval(&mut self, expr: &Expr) -> Result<Resolved, Fault> {
        match eval_expr(expr, &*self) {
            Ok(Resolved::Unknown(name)) => {
                self.globals.insert_unknown(&name);
                Ok(Resolved::Unknown(name))
            }
            Ok(known) => Ok(known),
            Err(err) => Err(match err.kind {
                EvalErrorKind::Undefined => {
                    Fault::fatal(AsmErrorKind::Symbol, &err.message, Some(&err.symbol))
                }
                EvalErrorKind::NotAddable | EvalErrorKind::NotVariable => {
                    Fault::serious(AsmErrorKind::Expression, &err.message, Some(&err.symbol))
                }
            }),
        }
    }

    /// Value that layout depends on directly, such as a table size.
    ///
    /// Returns `None` while the value is unknown and records a dependency so
    /// the next measuring pass sees it.
    pub(crate) fn eval_layout_value(&mut self, expr: &Expr) -> Result<Option<i32>, Fault> {
        match self.eval(expr)? {
            Resolved::Known { value, .. } => Ok(Some(value)),
            Resolved::Unknown(name) => {
                self.add_fixup(name, expr.clone(), FixupTarget::Dependency, None);
                Ok(None)
            }
        }
    }

    /// Argument that must be known right away, whatever the pass.
    pub(crate) fn eval_constant(&mut self, expr: &Expr, what: &str) -> Result<i32, Fault> {
        match self.eval(expr)? {
            Resolved::Known { value, .. } => Ok(value),
            Resolved::Unknown(name) => Err(Fault::serious(
                AsmErrorKind::Directive,
                &format!("{what} must be defined before use"),
                Some(&name),
            )),
        }
    }

    pub(crate) fn add_fixup(
        &mut self,
        symbol: String,
        expr: Expr,
        target: FixupTarget,
        relative_to: Option<u32>,
    ) {
        let location = self.current_location().unwrap_or_default();
        self.fixups.push(Fixup {
            symbol,
            expr,
            target,
            relative_to,
            location,
        });
    }

    /// Write a data value, leaving a placeholder and a fixup when unknown.
    pub(crate) fn write_value(&mut self, expr: &Expr, width: FixupWidth) -> Result<(), Fault> {
        let location = self.image.position();
        let value = match self.eval(expr)? {
            Resolved::Known { value, .. } => {
                if self.vocab.is_some() {
                    if let Some(label) = self.global_label_in(expr) {
                        // Records may move when the block is sorted.
                        let target = FixupTarget::Image { location, width };
                        self.add_fixup(label, expr.clone(), target, None);
                    }
                }
                value
            }
            Resolved::Unknown(name) => {
                let target = FixupTarget::Image { location, width };
                self.add_fixup(name, expr.clone(), target, None);
                0
            }
        };
        self.store_value(value, width);
        Ok(())
    }

    pub(crate) fn store_value(&mut self, value: i32, width: FixupWidth) {
        match width {
            FixupWidth::Byte => self.image.store((value & 0xFF) as u8),
            FixupWidth::Word => self.image.store_word(to_word(value)),
        }
    }

    fn patch_value(&mut self, location: u32, value: i32, width: FixupWidth) {
        match width {
            FixupWidth::Byte => self.image.patch_byte(location, (value & 0xFF) as u8),
            FixupWidth::Word => self.image.patch_word(location, to_word(value)),
        }
    }

    /// First global label named in `expr`, ignoring names shadowed by locals.
    pub(crate) fn global_label_in(&self, expr: &Expr) -> Option<String> {
        match expr {
            Expr::Number(_) | Expr::Quote(_) => None,
            Expr::Symbol(name) => {
                if self.locals.lookup(name).is_some() {
                    return None;
                }
                self.globals
                    .lookup(name)
                    .filter(|sym| sym.kind == SymbolKind::Label)
                    .map(|_| name.clone())
            }
            Expr::Add(lhs, rhs) => self
                .global_label_in(lhs)
                .or_else(|| self.global_label_in(rhs)),
        }
    }

    /// Whether a fixup's expression has a value now.
    pub(crate) fn fixup_resolves(&self, fixup: &Fixup) -> bool {
        matches!(eval_expr(&fixup.expr, self), Ok(Resolved::Known { .. }))
    }

    /// Patch a fixup if its value is known; returns whether it was applied.
    pub(crate) fn apply_fixup(&mut self, fixup: &Fixup) -> Result<bool, Fault> {
        let value = match self.eval(&fixup.expr)? {
            Resolved::Known { value, .. } => value,
            Resolved::Unknown(_) => return Ok(false),
        };
        let value = match fixup.relative_to {
            Some(from) => value - from as i32,
            None => value,
        };
        match fixup.target {
            FixupTarget::Image { location, width } => self.patch_value(location, value, width),
            FixupTarget::Dependency => {}
        }
        Ok(true)
    }
}
