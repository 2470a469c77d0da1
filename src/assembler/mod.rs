// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Z-machine assembler - main entry point.
//!
//! Ties the version-aware core to the multi-pass driver: measuring passes
//! until every address is stable, one assembling pass, then the story header.

pub mod cli;
mod engine;
mod node_directives;
mod node_directives_data;
mod node_directives_layout;
mod node_eval;
mod node_instruction;
mod node_labels;
mod output;
mod passes;
#[cfg(test)]
mod tests;

use engine::{Assembler, Fixup, FixupTarget, FixupWidth, Flow, PassMode, VocabState, HEADER_SIZE};

use log::{debug, info};

use crate::core::abbrev_finder::AbbrevFinder;
use crate::core::assembler::error::{
    AsmError, AsmErrorKind, AsmRunError, AsmRunReport, Diagnostic, Fault, PassCounts, Severity,
};
use crate::core::assembler::scope::{ReassemblyScope, ScopeSnapshot};
use crate::core::debug_info::{DebugRecord, DebugSink};
use crate::core::encoder::{self, BranchDest, BranchRequest, EncodeRequest, Operand};
use crate::core::expr::{eval_expr, fits_byte, needs_long, to_word, EvalContext, EvalErrorKind, Resolved};
use crate::core::imagestore::ImageStore;
use crate::core::ir::{
    BranchTarget, DebugDirective, Directive, Expr, Instruction, LocalDecl, Node, NodeKind,
    SourceLocation,
};
use crate::core::layout::{sort_records, PackedKind, PackingManager, TableState, VocabBlock};
use crate::core::opcodes::{self, OpcodeLookup};
use crate::core::symbol_table::{
    DefinitionSite, LocalLabelResult, Symbol, SymbolKind, SymbolTable, SymbolTableResult,
};
use crate::core::text_encoding::{TextEncodingError, ZTextEncoder};
use crate::core::version::ZVersion;

pub use cli::{validate_cli, Cli, CliConfig, DiagnosticsSinkConfig, OutputFormat, WarningPolicy};
pub use output::{format_abbreviations, serial_for_days, today_serial};
pub use passes::{run, run_with_cli, run_with_config};

/// Settings for one assembly run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblerOptions {
    /// Version used until a `.NEW` directive says otherwise.
    pub version: ZVersion,
    /// Serious errors tolerated before the run is abandoned.
    pub max_errors: usize,
    /// Six-character serial; today's UTC date when unset.
    pub serial: Option<String>,
    /// Release number; overrides the `ZORKID` symbol.
    pub release: Option<u16>,
    /// Four-character creator tag stored at 0x3C.
    pub creator: Option<String>,
    /// Collect literal text for the abbreviation optimizer.
    pub collect_text: bool,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            version: ZVersion::DEFAULT,
            max_errors: 100,
            serial: None,
            release: None,
            creator: None,
            collect_text: false,
        }
    }
}

/// Assemble `nodes` into a story image.
///
/// Debug records reach `sink` only when the run succeeds.
pub fn assemble(
    nodes: &[Node],
    options: &AssemblerOptions,
    sink: &mut dyn DebugSink,
) -> Result<AsmRunReport, AsmRunError> {
    Assembler::new(nodes, options).assemble(sink)
}
