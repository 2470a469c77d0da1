// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Operand expression evaluation.
//!
//! Expressions are numbers, symbol references, quoted variable references and
//! sums. During measuring passes a reference to a symbol that has no value yet
//! evaluates to [`Resolved::Unknown`] instead of failing, so layout can proceed
//! on a guess and be corrected by a later pass.

use crate::core::ir::Expr;
use crate::core::symbol_table::{Symbol, SymbolKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalErrorKind {
    Undefined,
    NotAddable,
    NotVariable,
}

/// Error returned from expression evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub message: String,
    pub symbol: String,
}

impl EvalError {
    fn new(kind: EvalErrorKind, message: impl Into<String>, symbol: &str) -> Self {
        Self {
            kind,
            message: message.into(),
            symbol: symbol.to_string(),
        }
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.message, self.symbol)
    }
}

impl std::error::Error for EvalError {}

/// Context for expression evaluation.
pub trait EvalContext {
    /// Look up a symbol, local scope first.
    fn lookup_symbol(&self, name: &str) -> Option<&Symbol>;

    /// Unknown symbols are errors on the final pass.
    fn is_final_pass(&self) -> bool;
}

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Known { kind: SymbolKind, value: i32 },
    /// Depends on a symbol with no value yet; the first such name.
    Unknown(String),
}

impl Resolved {
    pub fn constant(value: i32) -> Self {
        Resolved::Known {
            kind: SymbolKind::Constant,
            value,
        }
    }

    pub fn value(&self) -> Option<i32> {
        match self {
            Resolved::Known { value, .. } => Some(*value),
            Resolved::Unknown(_) => None,
        }
    }

    pub fn kind(&self) -> SymbolKind {
        match self {
            Resolved::Known { kind, .. } => *kind,
            Resolved::Unknown(_) => SymbolKind::Unknown,
        }
    }
}

/// Evaluate an expression.
pub fn eval_expr(expr: &Expr, ctx: &dyn EvalContext) -> Result<Resolved, EvalError> {
    match expr {
        Expr::Number(value) => Ok(Resolved::constant(*value)),
        Expr::Symbol(name) => resolve_symbol(name, ctx),
        Expr::Quote(name) => match resolve_symbol(name, ctx)? {
            Resolved::Known {
                kind: SymbolKind::Variable,
                value,
            } => Ok(Resolved::constant(value)),
            Resolved::Known { .. } => Err(EvalError::new(
                EvalErrorKind::NotVariable,
                "Quoted symbol is not a variable",
                name,
            )),
            unknown => Ok(unknown),
        },
        Expr::Add(lhs, rhs) => {
            let left = eval_expr(lhs, ctx)?;
            let right = eval_expr(rhs, ctx)?;
            add_resolved(left, right, ctx.is_final_pass())
        }
    }
}

fn resolve_symbol(name: &str, ctx: &dyn EvalContext) -> Result<Resolved, EvalError> {
    match ctx.lookup_symbol(name) {
        Some(sym) if sym.is_defined() => Ok(Resolved::Known {
            kind: sym.kind,
            value: sym.value,
        }),
        _ if ctx.is_final_pass() => Err(EvalError::new(
            EvalErrorKind::Undefined,
            "Undefined symbol",
            name,
        )),
        _ => Ok(Resolved::Unknown(name.to_string())),
    }
}

fn add_resolved(left: Resolved, right: Resolved, final_pass: bool) -> Result<Resolved, EvalError> {
    if !final_pass {
        if let Resolved::Unknown(name) = &left {
            return Ok(Resolved::Unknown(name.clone()));
        }
        if let Resolved::Unknown(name) = &right {
            return Ok(Resolved::Unknown(name.clone()));
        }
    }
    match (left, right) {
        (
            Resolved::Known {
                kind: lk,
                value: lv,
            },
            Resolved::Known {
                kind: rk,
                value: rv,
            },
        ) => {
            for kind in [lk, rk] {
                if !kind.is_addable() {
                    return Err(EvalError::new(
                        EvalErrorKind::NotAddable,
                        "Cannot add symbol of kind",
                        kind.as_str(),
                    ));
                }
            }
            let kind = if lk == SymbolKind::Label || rk == SymbolKind::Label {
                SymbolKind::Label
            } else {
                SymbolKind::Constant
            };
            Ok(Resolved::Known {
                kind,
                value: lv.wrapping_add(rv),
            })
        }
        (Resolved::Unknown(name), _) | (_, Resolved::Unknown(name)) => Err(EvalError::new(
            EvalErrorKind::Undefined,
            "Undefined symbol",
            &name,
        )),
    }
}

/// Whether an operand must use the word form.
///
/// Undefined symbols are presumed long so the measured size never shrinks
/// below what the final pass needs.
pub fn needs_long(expr: &Expr, ctx: &dyn EvalContext) -> bool {
    match expr {
        Expr::Number(value) => !fits_byte(*value),
        Expr::Quote(_) => false,
        Expr::Symbol(name) => match ctx.lookup_symbol(name) {
            Some(sym) if sym.is_defined() => match sym.kind {
                SymbolKind::Variable => false,
                _ => !fits_byte(sym.value),
            },
            _ => true,
        },
        Expr::Add(lhs, rhs) => {
            if needs_long(lhs, ctx) || needs_long(rhs, ctx) {
                return true;
            }
            match eval_expr(expr, ctx) {
                Ok(Resolved::Known { value, .. }) => !fits_byte(value),
                _ => true,
            }
        }
    }
}

pub fn fits_byte(value: i32) -> bool {
    (0..=255).contains(&value)
}

/// Truncate a value to the 16 bits stored in the image.
pub fn to_word(value: i32) -> u16 {
    (value & 0xFFFF) as u16
}
