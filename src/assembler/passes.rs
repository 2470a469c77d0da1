// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Assembler run orchestration.
//!
//! This module owns the CLI-driven run flow: reading the node file, running
//! the engine, then writing the story, debug records and abbreviation report.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use clap::Parser;

use super::*;
use crate::core::debug_info::DebugLog;
use crate::core::ir::nodes_from_json;

/// Run the assembler with command-line arguments.
pub fn run() -> Result<AsmRunReport, AsmRunError> {
    let cli = Cli::parse();
    run_with_cli(&cli)
}

pub fn run_with_cli(cli: &Cli) -> Result<AsmRunReport, AsmRunError> {
    let config = validate_cli(cli)?;
    run_with_config(&config)
}

/// Assemble one node file as configured and write every requested output.
pub fn run_with_config(config: &CliConfig) -> Result<AsmRunReport, AsmRunError> {
    let text = fs::read_to_string(&config.input)
        .map_err(|err| io_error("Error reading node file", &config.input, &err))?;
    let nodes = nodes_from_json(&text).map_err(|err| {
        let detail = format!("{}: {err}", config.input.display());
        AsmRunError::new(
            AsmError::new(AsmErrorKind::Io, "Invalid node file", Some(&detail)),
            Vec::new(),
        )
    })?;
    debug!("read {} nodes from {}", nodes.len(), config.input.display());

    let mut debug_log = DebugLog::new();
    let mut report = assemble(&nodes, &config.options, &mut debug_log)?;

    if config.warning_policy.treat_warnings_as_errors {
        let warning_diags: Vec<Diagnostic> = report
            .diagnostics()
            .iter()
            .filter(|diag| diag.severity == Severity::Warning)
            .map(|diag| {
                let mut warning = diag.clone();
                warning.severity = Severity::Error;
                warning
            })
            .collect();
        if !warning_diags.is_empty() {
            return Err(AsmRunError::new(
                AsmError::new(
                    AsmErrorKind::Assembler,
                    "Warnings treated as errors (--Werror)",
                    None,
                ),
                warning_diags,
            ));
        }
    }

    let version = report.story().first().copied().unwrap_or(3);
    let story_path = config.story_path(version);
    write_output(&story_path, |out| out.write_all(report.story()))?;
    info!(
        "wrote {} ({} bytes)",
        story_path.display(),
        report.story().len()
    );

    if let Some(path) = &config.debug_info {
        write_output(path, |out| debug_log.write_json(out))?;
        debug!(
            "wrote {} debug records to {}",
            debug_log.records().len(),
            path.display()
        );
    }

    if let Some(max) = config.abbreviations {
        if let Some(finder) = report.take_text() {
            let results: Vec<_> = finder.results(max).collect();
            info!("selected {} abbreviations", results.len());
            let listing = format_abbreviations(&results);
            match &config.abbrev_output {
                Some(path) => write_output(path, |out| out.write_all(listing.as_bytes()))?,
                None => {
                    let stdout = io::stdout();
                    let mut out = stdout.lock();
                    out.write_all(listing.as_bytes())
                        .map_err(|err| io_error("Error writing abbreviations", Path::new("-"), &err))?;
                }
            }
        }
    }

    Ok(report)
}

fn write_output(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>,
) -> Result<(), AsmRunError> {
    let file = File::create(path).map_err(|err| io_error("Error creating file", path, &err))?;
    let mut out = BufWriter::new(file);
    write(&mut out)
        .and_then(|()| out.flush())
        .map_err(|err| io_error("Error writing file", path, &err))
}

fn io_error(message: &str, path: &Path, err: &io::Error) -> AsmRunError {
    let detail = format!("{}: {err}", path.display());
    let error = AsmError::new(AsmErrorKind::Io, message, Some(&detail));
    AsmRunError::new(
        error.clone(),
        vec![Diagnostic::new(Severity::Fatal, error)],
    )
}
