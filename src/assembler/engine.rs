// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use super::*;

/// Bytes reserved for the story header at the start of every pass.
pub(crate) const HEADER_SIZE: u32 = 64;
pub(crate) const MAX_MEASURING_PASSES: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PassMode {
    Measuring,
    Assembling,
}

/// What a node handler asks of the pass loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Restart(ZVersion),
}

#[derive(Debug)]
enum NodeOutcome {
    Done,
    /// Rewind the open routine scope and walk it again.
    Retry,
    Restart(ZVersion),
    Recovered(AsmError),
    Abort(AsmError),
}

impl From<Result<Flow, Fault>> for NodeOutcome {
    fn from(result: Result<Flow, Fault>) -> Self {
        match result {
            Ok(Flow::Continue) => NodeOutcome::Done,
            Ok(Flow::Restart(version)) => NodeOutcome::Restart(version),
            Err(Fault::Serious(err)) => NodeOutcome::Recovered(err),
            Err(Fault::Fatal(err)) => NodeOutcome::Abort(err),
        }
    }
}

enum PassEnd {
    Completed,
    Restart(ZVersion),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FixupWidth {
    Byte,
    Word,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FixupTarget {
    Image { location: u32, width: FixupWidth },
    /// Nothing to patch; the node is evaluated again next pass.
    Dependency,
}

/// A value written before its symbol was known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Fixup {
    pub(crate) symbol: String,
    pub(crate) expr: Expr,
    pub(crate) target: FixupTarget,
    /// JUMP operands store `target - relative_to`.
    pub(crate) relative_to: Option<u32>,
    pub(crate) location: SourceLocation,
}

/// An open vocabulary block.
#[derive(Debug, Clone)]
pub(crate) struct VocabState {
    pub(crate) block: VocabBlock,
    pub(crate) fixup_start: usize,
    /// Value of each in-block label before this pass, parallel to `block.labels`.
    pub(crate) previous: Vec<Option<i32>>,
    /// Other global changes seen inside the block.
    pub(crate) deferred: Vec<(String, i32)>,
}

pub(crate) struct Assembler<'a> {
    pub(crate) nodes: &'a [Node],
    pub(crate) options: &'a AssemblerOptions,
    pub(crate) version: ZVersion,
    pub(crate) mode: PassMode,
    pub(crate) pass: u32,
    pub(crate) image: ImageStore,
    pub(crate) globals: SymbolTable,
    pub(crate) locals: SymbolTable,
    pub(crate) fixups: Vec<Fixup>,
    pub(crate) table: Option<TableState>,
    pub(crate) vocab: Option<VocabState>,
    pub(crate) packing: PackingManager,
    pub(crate) text_encoder: ZTextEncoder,
    pub(crate) flags1: u8,
    pub(crate) flags2: u16,
    pub(crate) objects: u16,
    pub(crate) global_vars: u16,
    pub(crate) scope: Option<ReassemblyScope>,
    pub(crate) debug_records: Vec<DebugRecord>,
    pub(crate) text: Option<AbbrevFinder>,
    /// Diagnostics kept across passes and restarts.
    pub(crate) diagnostics: Vec<Diagnostic>,
    /// Diagnostics of the pass in progress.
    pub(crate) pass_diagnostics: Vec<Diagnostic>,
    pub(crate) pass_errors: usize,
    pub(crate) counts: PassCounts,
    pub(crate) changed: bool,
    pub(crate) ended: bool,
    pub(crate) node_index: usize,
    pub(crate) tried_versions: Vec<ZVersion>,
}

impl<'a> Assembler<'a> {
    pub(crate) fn new(nodes: &'a [Node], options: &'a AssemblerOptions) -> Self {
        let version = options.version;
        let mut asm = Self {
            nodes,
            options,
            version,
            mode: PassMode::Measuring,
            pass: 0,
            image: ImageStore::new(),
            globals: SymbolTable::new(),
            locals: SymbolTable::new(),
            fixups: Vec::new(),
            table: None,
            vocab: None,
            packing: PackingManager::new(version),
            text_encoder: ZTextEncoder::new(version),
            flags1: 0,
            flags2: 0,
            objects: 0,
            global_vars: 0,
            scope: None,
            debug_records: Vec::new(),
            text: None,
            diagnostics: Vec::new(),
            pass_diagnostics: Vec::new(),
            pass_errors: 0,
            counts: PassCounts::new(),
            changed: false,
            ended: false,
            node_index: 0,
            tried_versions: vec![version],
        };
        asm.define_predefined();
        asm
    }

    fn define_predefined(&mut self) {
        self.globals.set("STACK", SymbolKind::Variable, 0);
    }

    /// Return to the initial state with a new starting version.
    fn restart(&mut self, version: ZVersion) {
        debug!(
            "restarting assembly for version {} after pass {}",
            version.number(),
            self.pass
        );
        self.tried_versions.push(version);
        self.counts.restarts += 1;
        self.version = version;
        self.globals = SymbolTable::new();
        self.define_predefined();
        self.packing = PackingManager::new(version);
        self.pass_diagnostics.clear();
    }

    fn begin_pass(&mut self, mode: PassMode) {
        self.pass += 1;
        self.mode = mode;
        self.image = ImageStore::new();
        self.image.fill(HEADER_SIZE, 0);
        self.locals.clear();
        self.fixups.clear();
        self.table = None;
        self.vocab = None;
        self.packing.reset_pass();
        self.text_encoder = ZTextEncoder::new(self.version);
        self.flags1 = 0;
        self.flags2 = 0;
        self.objects = 0;
        self.global_vars = 0;
        self.scope = None;
        self.debug_records.clear();
        self.text = (mode == PassMode::Assembling && self.options.collect_text)
            .then(AbbrevFinder::new);
        self.pass_diagnostics.clear();
        self.pass_errors = 0;
        self.changed = false;
        self.ended = false;
        self.node_index = 0;
    }

    /// Run measuring passes to a fixpoint, then the assembling pass.
    pub(crate) fn assemble(mut self, sink: &mut dyn DebugSink) -> Result<AsmRunReport, AsmRunError> {
        'restart: loop {
            let mut measured = 0;
            loop {
                measured += 1;
                self.counts.measuring_passes += 1;
                match self.run_pass(PassMode::Measuring) {
                    Ok(PassEnd::Completed) => {}
                    Ok(PassEnd::Restart(version)) => {
                        self.restart(version);
                        continue 'restart;
                    }
                    Err(err) => return Err(self.failure(err)),
                }
                debug!(
                    "measuring pass {} ended at {:#x} with {} fixups",
                    measured,
                    self.image.position(),
                    self.fixups.len()
                );
                if !self.changed {
                    break;
                }
                if measured >= MAX_MEASURING_PASSES {
                    debug!("layout still moving after {measured} measuring passes");
                    break;
                }
            }
            match self.run_pass(PassMode::Assembling) {
                Ok(PassEnd::Completed) => break,
                Ok(PassEnd::Restart(version)) => {
                    self.restart(version);
                    continue 'restart;
                }
                Err(err) => return Err(self.failure(err)),
            }
        }

        let errors = self
            .pass_diagnostics
            .iter()
            .filter(|diag| diag.severity() != Severity::Warning)
            .count();
        if errors > 0 {
            let count = errors.to_string();
            let err = AsmError::new(AsmErrorKind::Assembler, "Errors in assembly", Some(&count));
            return Err(self.failure(err));
        }
        if let Err(err) = self.finish_story() {
            return Err(self.failure(err));
        }

        self.diagnostics.append(&mut self.pass_diagnostics);
        self.counts.warnings = self.diagnostics.len() as u32;
        for record in self.debug_records.drain(..) {
            sink.record(record);
        }
        info!(
            "assembled version {} story: {} bytes after {} measuring passes",
            self.version.number(),
            self.image.len(),
            self.counts.measuring_passes
        );
        let text = self.text.take();
        Ok(AsmRunReport::new(self.image.into_bytes(), self.diagnostics, self.counts).with_text(text))
    }

    fn failure(&mut self, err: AsmError) -> AsmRunError {
        self.diagnostics.append(&mut self.pass_diagnostics);
        let errors = self
            .diagnostics
            .iter()
            .filter(|diag| diag.severity() != Severity::Warning)
            .count();
        self.counts.errors = errors as u32;
        self.counts.warnings = (self.diagnostics.len() - errors) as u32;
        AsmRunError::new(err, std::mem::take(&mut self.diagnostics))
    }

    fn run_pass(&mut self, mode: PassMode) -> Result<PassEnd, AsmError> {
        self.begin_pass(mode);
        let nodes = self.nodes;
        let mut index = 0;
        loop {
            let at_scope_end = self
                .scope
                .as_ref()
                .is_some_and(|scope| index >= scope.end_index);
            let outcome = if at_scope_end {
                self.finish_scope()
            } else if index >= nodes.len() || self.ended {
                break;
            } else {
                self.node_index = index;
                self.process_node(&nodes[index])
            };
            match outcome {
                NodeOutcome::Done => {}
                NodeOutcome::Retry => {
                    index = self.rewind_scope()?;
                    continue;
                }
                NodeOutcome::Restart(version) => return Ok(PassEnd::Restart(version)),
                NodeOutcome::Recovered(err) => {
                    let result = self.report_serious(err);
                    self.escalate(result)?;
                }
                NodeOutcome::Abort(err) => return Err(self.abort(err)),
            }
            if !at_scope_end {
                index += 1;
            }
        }
        self.end_pass()?;
        Ok(PassEnd::Completed)
    }

    fn process_node(&mut self, node: &'a Node) -> NodeOutcome {
        let result = match &node.kind {
            NodeKind::Directive(directive) => self.process_directive(directive),
            NodeKind::Instruction(instruction) => self.process_instruction(instruction),
            NodeKind::GlobalLabel(name) => self.process_global_label(name),
            NodeKind::LocalLabel(name) => self.process_local_label(name),
        };
        result.into()
    }

    fn end_pass(&mut self) -> Result<(), AsmError> {
        if let Some(table) = self.table.take() {
            let start = format!("{:#x}", table.start);
            let err = AsmError::new(
                AsmErrorKind::Directive,
                ".TABLE without .ENDT, opened at",
                Some(&start),
            );
            let result = self.report_serious(err);
            self.escalate(result)?;
        }
        if self.vocab.take().is_some() {
            let err = AsmError::new(AsmErrorKind::Directive, ".VOCBEG without .VOCEND", None);
            let result = self.report_serious(err);
            self.escalate(result)?;
        }
        match self.mode {
            PassMode::Measuring => {
                if !self.changed {
                    self.changed = self.fixups.iter().any(|fixup| self.fixup_resolves(fixup));
                }
            }
            PassMode::Assembling => {
                if !self.fixups.is_empty() {
                    let mut names: Vec<&str> =
                        self.fixups.iter().map(|fixup| fixup.symbol.as_str()).collect();
                    names.sort_unstable();
                    names.dedup();
                    let names = names.join(", ");
                    let err =
                        AsmError::new(AsmErrorKind::Symbol, "Unresolved references", Some(&names));
                    return Err(self.abort(err));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> ScopeSnapshot {
        ScopeSnapshot {
            position: self.image.position(),
            fixups: self.fixups.len(),
            debug_records: self.debug_records.len(),
            diagnostics: self.pass_diagnostics.len(),
            text: self.text.as_ref().map(AbbrevFinder::checkpoint),
            objects: self.objects,
            globals: self.global_vars,
            abbreviations: self.text_encoder.abbreviations().len(),
            packing: self.packing.bases(),
        }
    }

    /// Close the open scope, or ask for another walk when a label moved.
    fn finish_scope(&mut self) -> NodeOutcome {
        if self.scope.as_ref().is_some_and(ReassemblyScope::needs_rewalk) {
            return NodeOutcome::Retry;
        }
        let Some(mut scope) = self.scope.take() else {
            return NodeOutcome::Done;
        };
        self.locals.clear();
        if scope.walks > 1 {
            debug!(
                "routine {} settled after {} walks in pass {}",
                scope.routine, scope.walks, self.pass
            );
            self.counts.reassemblies += scope.walks - 1;
        }
        for (name, old) in scope.take_deferred() {
            match self.global_changed(&name, old) {
                Ok(()) => {}
                Err(Fault::Serious(err)) => return NodeOutcome::Recovered(err),
                Err(Fault::Fatal(err)) => return NodeOutcome::Abort(err),
            }
        }
        NodeOutcome::Done
    }

    /// Restore the scope snapshot and return the index to resume from.
    fn rewind_scope(&mut self) -> Result<usize, AsmError> {
        let Some(scope) = self.scope.as_mut() else {
            return Err(AsmError::new(AsmErrorKind::Assembler, "No routine to reassemble", None));
        };
        if let Err(walks) = scope.begin_rewalk() {
            let message = format!("Routine did not settle after {walks} walks");
            let err = AsmError::new(AsmErrorKind::Layout, &message, Some(&scope.routine));
            return Err(self.abort(err));
        }
        debug!("reassembling routine {} (walk {})", scope.routine, scope.walks);
        let snapshot = scope.snapshot;
        let start_index = scope.start_index;
        self.image.truncate(snapshot.position);
        self.image.seek(snapshot.position);
        self.fixups.truncate(snapshot.fixups);
        self.debug_records.truncate(snapshot.debug_records);
        self.pass_diagnostics.truncate(snapshot.diagnostics);
        self.pass_errors = self
            .pass_diagnostics
            .iter()
            .filter(|diag| diag.severity() != Severity::Warning)
            .count();
        if let (Some(text), Some(checkpoint)) = (self.text.as_mut(), snapshot.text) {
            text.rollback(checkpoint);
        }
        if self.table.is_some_and(|table| table.start >= snapshot.position) {
            self.table = None;
        }
        self.objects = snapshot.objects;
        self.global_vars = snapshot.globals;
        self.text_encoder.truncate_abbreviations(snapshot.abbreviations);
        self.packing.restore(snapshot.packing);
        Ok(start_index)
    }

    pub(crate) fn current_location(&self) -> Option<SourceLocation> {
        self.nodes
            .get(self.node_index)
            .map(|node| node.location.clone())
            .filter(|location| !location.file.is_empty() || location.line != 0)
    }

    pub(crate) fn site(&self) -> DefinitionSite {
        DefinitionSite {
            pass: self.pass,
            node: self.node_index,
        }
    }

    pub(crate) fn push_diagnostic(&mut self, diag: Diagnostic) {
        let diag = if diag.location().is_none() {
            diag.with_location(self.current_location())
        } else {
            diag
        };
        if diag.severity() == Severity::Warning && self.mode == PassMode::Assembling {
            debug!("{}", diag.format());
        }
        self.pass_diagnostics.push(diag);
    }

    pub(crate) fn warning(&mut self, err: AsmError) {
        self.push_diagnostic(Diagnostic::new(Severity::Warning, err));
    }

    /// Record a Serious error; reaching the error cap turns it Fatal.
    pub(crate) fn report_serious(&mut self, err: AsmError) -> Result<(), Fault> {
        self.report_serious_diagnostic(Diagnostic::new(Severity::Error, err))
    }

    pub(crate) fn report_serious_diagnostic(&mut self, diag: Diagnostic) -> Result<(), Fault> {
        self.push_diagnostic(diag);
        self.pass_errors += 1;
        if self.pass_errors >= self.options.max_errors.max(1) {
            let count = self.pass_errors.to_string();
            return Err(Fault::fatal(AsmErrorKind::Assembler, "Too many errors", Some(&count)));
        }
        Ok(())
    }

    /// Record a Fatal error and hand it back for the pass driver.
    fn abort(&mut self, err: AsmError) -> AsmError {
        self.push_diagnostic(Diagnostic::new(Severity::Fatal, err.clone()));
        err
    }

    fn escalate(&mut self, result: Result<(), Fault>) -> Result<(), AsmError> {
        result.map_err(|fault| self.abort(fault.into()))
    }
}

impl EvalContext for Assembler<'_> {
    fn lookup_symbol(&self, name: &str) -> Option<&Symbol> {
        self.locals.lookup(name).or_else(|| self.globals.lookup(name))
    }

    fn is_final_pass(&self) -> bool {
        self.mode == PassMode::Assembling
    }
}
