// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Error types, diagnostics, and reporting for the assembler.

use std::fmt;

use crate::core::abbrev_finder::AbbrevFinder;
use crate::core::ir::SourceLocation;

/// Categories of assembler errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsmErrorKind {
    Assembler,
    Cli,
    Directive,
    Expression,
    Instruction,
    Io,
    Layout,
    Symbol,
}

/// An assembler error with a kind and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmError {
    kind: AsmErrorKind,
    message: String,
}

impl AsmError {
    pub fn new(kind: AsmErrorKind, msg: &str, param: Option<&str>) -> Self {
        Self {
            kind,
            message: format_error(msg, param),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.kind
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AsmError {}

/// How far a failure reaches.
///
/// `Serious` abandons one node and lets the pass continue; `Fatal` ends the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    Serious(AsmError),
    Fatal(AsmError),
}

impl Fault {
    pub fn serious(kind: AsmErrorKind, msg: &str, param: Option<&str>) -> Self {
        Fault::Serious(AsmError::new(kind, msg, param))
    }

    pub fn fatal(kind: AsmErrorKind, msg: &str, param: Option<&str>) -> Self {
        Fault::Fatal(AsmError::new(kind, msg, param))
    }

    pub fn error(&self) -> &AsmError {
        match self {
            Fault::Serious(err) | Fault::Fatal(err) => err,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Fault::Fatal(_))
    }
}

impl From<Fault> for AsmError {
    fn from(fault: Fault) -> Self {
        match fault {
            Fault::Serious(err) | Fault::Fatal(err) => err,
        }
    }
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }
}

/// A diagnostic message with location and context.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub(crate) location: Option<SourceLocation>,
    pub(crate) code: String,
    pub(crate) severity: Severity,
    pub(crate) error: AsmError,
    pub(crate) notes: Vec<String>,
    pub(crate) help: Vec<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, error: AsmError) -> Self {
        Self {
            location: None,
            code: default_diagnostic_code(error.kind()).to_string(),
            severity,
            error,
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    pub fn from_fault(fault: Fault) -> Self {
        match fault {
            Fault::Serious(err) => Self::new(Severity::Error, err),
            Fault::Fatal(err) => Self::new(Severity::Fatal, err),
        }
    }

    pub fn with_location(mut self, location: Option<SourceLocation>) -> Self {
        self.location = location;
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }

    pub fn format(&self) -> String {
        let sev = match self.severity {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        };
        let mut out = match &self.location {
            Some(loc) => format!("{loc}: {sev} [{}] - {}", self.code, self.error.message()),
            None => format!("{sev} [{}] - {}", self.code, self.error.message()),
        };
        for note in &self.notes {
            out.push_str("\nnote: ");
            out.push_str(note);
        }
        for help in &self.help {
            out.push_str("\nhelp: ");
            out.push_str(help);
        }
        out
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn code(&self) -> &str {
        self.code.as_str()
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }

    pub fn message(&self) -> &str {
        self.error.message()
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.error.kind()
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn help(&self) -> &[String] {
        &self.help
    }
}

/// Pass statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassCounts {
    pub measuring_passes: u32,
    pub restarts: u32,
    pub reassemblies: u32,
    pub errors: u32,
    pub warnings: u32,
}

impl PassCounts {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Report from a successful assembly run.
#[derive(Debug)]
pub struct AsmRunReport {
    story: Vec<u8>,
    diagnostics: Vec<Diagnostic>,
    counts: PassCounts,
    text: Option<AbbrevFinder>,
}

impl AsmRunReport {
    pub fn new(story: Vec<u8>, diagnostics: Vec<Diagnostic>, counts: PassCounts) -> Self {
        Self {
            story,
            diagnostics,
            counts,
            text: None,
        }
    }

    /// Attach the literal text collected during the final pass.
    pub fn with_text(mut self, text: Option<AbbrevFinder>) -> Self {
        self.text = text;
        self
    }

    pub fn take_text(&mut self) -> Option<AbbrevFinder> {
        self.text.take()
    }

    pub fn story(&self) -> &[u8] {
        &self.story
    }

    pub fn into_story(self) -> Vec<u8> {
        self.story
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn counts(&self) -> PassCounts {
        self.counts
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }
}

/// Error from a failed assembly run.
#[derive(Debug)]
pub struct AsmRunError {
    error: AsmError,
    diagnostics: Vec<Diagnostic>,
}

impl AsmRunError {
    pub fn new(error: AsmError, diagnostics: Vec<Diagnostic>) -> Self {
        Self { error, diagnostics }
    }

    pub fn error(&self) -> &AsmError {
        &self.error
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity != Severity::Warning)
            .count()
    }

    /// First diagnostic that stopped the run, if any.
    pub fn first_error(&self) -> Option<&Diagnostic> {
        self.diagnostics
            .iter()
            .find(|d| d.severity != Severity::Warning)
    }
}

impl fmt::Display for AsmRunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for AsmRunError {}

fn default_diagnostic_code(kind: AsmErrorKind) -> &'static str {
    match kind {
        AsmErrorKind::Assembler => "zap001",
        AsmErrorKind::Cli => "zap101",
        AsmErrorKind::Directive => "zap201",
        AsmErrorKind::Symbol => "zap301",
        AsmErrorKind::Expression => "zap401",
        AsmErrorKind::Instruction => "zap402",
        AsmErrorKind::Io => "zap501",
        AsmErrorKind::Layout => "zap601",
    }
}

/// Format an error message with an optional parameter.
pub fn format_error(msg: &str, param: Option<&str>) -> String {
    match param {
        Some(p) => format!("{msg}: {p}"),
        None => msg.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_format_includes_location_and_severity() {
        let err = AsmError::new(AsmErrorKind::Symbol, "Undefined symbol", Some("FOO"));
        let diag = Diagnostic::new(Severity::Fatal, err)
            .with_location(Some(SourceLocation::new("game.zap", 12)));
        assert_eq!(
            diag.format(),
            "game.zap:12: FATAL [zap301] - Undefined symbol: FOO"
        );
    }

    #[test]
    fn diagnostic_format_appends_notes_then_help() {
        let err = AsmError::new(AsmErrorKind::Layout, "story file too large", None);
        let diag = Diagnostic::new(Severity::Error, err)
            .with_note("limit is 131072 bytes")
            .with_help("use abbreviations");
        let rendered = diag.format();
        let note_idx = rendered.find("note: limit").expect("note should render");
        let help_idx = rendered.find("help: use").expect("help should render");
        assert!(rendered.starts_with("ERROR [zap601] - story file too large"));
        assert!(note_idx < help_idx, "notes must render before help");
    }

    #[test]
    fn fault_maps_to_matching_severity() {
        let serious = Fault::serious(AsmErrorKind::Directive, "bad", None);
        let fatal = Fault::fatal(AsmErrorKind::Instruction, "worse", None);
        assert!(!serious.is_fatal());
        assert_eq!(Diagnostic::from_fault(serious).severity(), Severity::Error);
        assert_eq!(Diagnostic::from_fault(fatal).severity(), Severity::Fatal);
    }

    #[test]
    fn run_error_counts_only_errors() {
        let warn = Diagnostic::new(
            Severity::Warning,
            AsmError::new(AsmErrorKind::Layout, "packed address overflow", None),
        );
        let err = Diagnostic::new(
            Severity::Error,
            AsmError::new(AsmErrorKind::Directive, "table size mismatch", None),
        );
        let run = AsmRunError::new(
            AsmError::new(AsmErrorKind::Assembler, "assembly failed", None),
            vec![warn, err],
        );
        assert_eq!(run.error_count(), 1);
        assert_eq!(
            run.first_error().map(Diagnostic::message),
            Some("table size mismatch")
        );
    }
}
