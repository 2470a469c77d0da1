// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for zforge.

use std::fs::OpenOptions;
use std::io::{self, Write};

use clap::Parser;
use log::LevelFilter;
use serde_json::json;

use zforge::assembler::cli::{validate_cli, Cli, DiagnosticsSinkConfig, OutputFormat};
use zforge::assembler::run_with_config;
use zforge::core::assembler::error::{Diagnostic, Severity};

struct DiagnosticsSink {
    writer: Option<Box<dyn Write>>,
}

impl DiagnosticsSink {
    fn from_config(config: &DiagnosticsSinkConfig) -> io::Result<Self> {
        match config {
            DiagnosticsSinkConfig::Disabled => Ok(Self { writer: None }),
            DiagnosticsSinkConfig::Stderr => Ok(Self {
                writer: Some(Box::new(io::stderr())),
            }),
            DiagnosticsSinkConfig::File { path, append } => {
                let mut opts = OpenOptions::new();
                opts.create(true).write(true);
                if *append {
                    opts.append(true);
                } else {
                    opts.truncate(true);
                }
                let file = opts.open(path)?;
                Ok(Self {
                    writer: Some(Box::new(file)),
                })
            }
        }
    }

    fn emit_line(&mut self, line: &str) {
        if let Some(writer) = &mut self.writer {
            let _ = writeln!(writer, "{line}");
        }
    }

    fn emit_diagnostics(&mut self, diagnostics: &[Diagnostic], format: OutputFormat) {
        for diag in diagnostics {
            self.emit_line(&format_diagnostic_line(diag, format));
        }
    }
}

fn format_diagnostic_line(diag: &Diagnostic, format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        json!({
            "code": diag.code(),
            "severity": diag.severity().as_str(),
            "message": diag.message(),
            "file": diag.location().map(|loc| loc.file.clone()).filter(|file| !file.is_empty()),
            "line": diag.location().map(|loc| loc.line),
            "notes": diag.notes(),
            "help": diag.help(),
        })
        .to_string()
    } else {
        diag.format()
    }
}

fn log_level(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn setup_logging(level: LevelFilter) {
    env_logger::builder()
        .filter_level(level)
        .format_target(false)
        .format_timestamp(None)
        .parse_env("ZFORGE_LOG")
        .init();
}

fn visible(diagnostics: &[Diagnostic], emit_warnings: bool) -> Vec<Diagnostic> {
    diagnostics
        .iter()
        .filter(|diag| emit_warnings || diag.severity() != Severity::Warning)
        .cloned()
        .collect()
}

fn main() {
    let cli = Cli::parse();
    let cli_config = match validate_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    setup_logging(log_level(cli_config.verbosity));

    let mut sink = match DiagnosticsSink::from_config(&cli_config.diagnostics_sink) {
        Ok(sink) => sink,
        Err(err) => {
            eprintln!("Failed to open diagnostics sink: {err}");
            std::process::exit(1);
        }
    };

    let emit_warnings = cli_config.warning_policy.emit_warnings;
    match run_with_config(&cli_config) {
        Ok(report) => {
            if cli_config.quiet {
                return;
            }
            let diagnostics = visible(report.diagnostics(), emit_warnings);
            sink.emit_diagnostics(&diagnostics, cli_config.output_format);
        }
        Err(err) => {
            let diagnostics = visible(err.diagnostics(), emit_warnings);
            sink.emit_diagnostics(&diagnostics, cli_config.output_format);
            if cli_config.output_format != OutputFormat::Json
                && !matches!(cli_config.diagnostics_sink, DiagnosticsSinkConfig::Disabled)
            {
                sink.emit_line(&err.to_string());
            }
            std::process::exit(1);
        }
    }
}
