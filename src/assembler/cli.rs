// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and argument validation.

use std::env;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, ValueEnum};

use super::AssemblerOptions;
use crate::core::assembler::error::{AsmError, AsmErrorKind, AsmRunError};
use crate::core::version::ZVersion;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Most abbreviations any story version can hold.
const MAX_ABBREVIATIONS: usize = 96;

const LONG_ABOUT: &str = "Z-machine assembler for versions 1 through 8.

The input is a JSON array of parsed ZAP nodes. The story file is written next to
the input as <name>.z<version> unless -o/--outfile names it.
Use --debug-info to write the debug records of the final pass as JSON.
Use --abbreviations N to print up to N .FSTR declarations that would shorten the
story's text; --abbrev-output writes them to a file instead of stdout.";

#[derive(Parser, Debug)]
#[command(
    name = "zforge",
    version = VERSION,
    about = "Z-machine assembler with story layout, packed addresses and an abbreviation optimizer",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(
        value_name = "NODES",
        long_help = "JSON file holding the parsed program as an array of nodes."
    )]
    pub input: PathBuf,
    #[arg(
        short = 'o',
        long = "outfile",
        value_name = "FILE",
        long_help = "Write the story file to FILE. Defaults to the input name with a .z<version> extension."
    )]
    pub outfile: Option<PathBuf>,
    #[arg(
        long = "story-version",
        value_name = "N",
        value_parser = clap::value_parser!(u8).range(1..=8),
        long_help = "Story version to assemble for until a .NEW directive selects another. Defaults to 3."
    )]
    pub story_version: Option<u8>,
    #[arg(
        long = "debug-info",
        value_name = "FILE",
        long_help = "Write the debug records of the final pass to FILE as JSON."
    )]
    pub debug_info: Option<PathBuf>,
    #[arg(
        short = 'a',
        long = "abbreviations",
        value_name = "N",
        long_help = "Collect the story's literal text and report up to N abbreviations (at most 96)."
    )]
    pub abbreviations: Option<usize>,
    #[arg(
        long = "abbrev-output",
        value_name = "FILE",
        requires = "abbreviations",
        long_help = "Write the abbreviation declarations to FILE instead of stdout."
    )]
    pub abbrev_output: Option<PathBuf>,
    #[arg(
        long = "serial",
        value_name = "SERIAL",
        long_help = "Six-character serial stored at 0x12. Shorter values are padded with 0. Defaults to today's UTC date as YYMMDD."
    )]
    pub serial: Option<String>,
    #[arg(
        long = "release",
        value_name = "N",
        long_help = "Release number stored at 0x02. Overrides the ZORKID symbol."
    )]
    pub release: Option<u16>,
    #[arg(
        long = "creator",
        value_name = "TAG",
        long_help = "Creator tag of up to 4 ASCII characters stored at 0x3C."
    )]
    pub creator: Option<String>,
    #[arg(
        long = "max-errors",
        value_name = "N",
        long_help = "Serious errors tolerated before assembly is abandoned. Defaults to 100."
    )]
    pub max_errors: Option<usize>,
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        long_help = "Raise log verbosity. -v logs pass progress, -vv adds per-symbol detail."
    )]
    pub verbose: u8,
    #[arg(
        long = "format",
        value_enum,
        default_value_t = OutputFormat::Text,
        long_help = "Select diagnostic output format. text is default; json prints one object per diagnostic."
    )]
    pub format: OutputFormat,
    #[arg(
        short = 'q',
        long = "quiet",
        action = ArgAction::SetTrue,
        long_help = "Suppress diagnostic output for successful assembly runs. Errors are still reported unless --no-error is set."
    )]
    pub quiet: bool,
    #[arg(
        short = 'E',
        long = "error",
        value_name = "FILE",
        long_help = "Write diagnostics to FILE instead of stderr."
    )]
    pub error_file: Option<PathBuf>,
    #[arg(
        long = "error-append",
        action = ArgAction::SetTrue,
        requires = "error_file",
        long_help = "Append to the -E/--error file instead of truncating it."
    )]
    pub error_append: bool,
    #[arg(
        long = "no-error",
        action = ArgAction::SetTrue,
        conflicts_with = "error_file",
        long_help = "Do not report diagnostics at all."
    )]
    pub no_error: bool,
    #[arg(
        short = 'w',
        long = "no-warn",
        action = ArgAction::SetTrue,
        long_help = "Suppress warnings."
    )]
    pub no_warn: bool,
    #[arg(
        long = "Werror",
        action = ArgAction::SetTrue,
        conflicts_with = "no_warn",
        long_help = "Treat warnings as errors; no story file is written when any warning is reported."
    )]
    pub warn_error: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticsSinkConfig {
    Stderr,
    File { path: PathBuf, append: bool },
    Disabled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarningPolicy {
    pub emit_warnings: bool,
    pub treat_warnings_as_errors: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Validated CLI configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub input: PathBuf,
    pub outfile: Option<PathBuf>,
    pub debug_info: Option<PathBuf>,
    pub abbreviations: Option<usize>,
    pub abbrev_output: Option<PathBuf>,
    pub options: AssemblerOptions,
    pub verbosity: u8,
    pub quiet: bool,
    pub output_format: OutputFormat,
    pub diagnostics_sink: DiagnosticsSinkConfig,
    pub warning_policy: WarningPolicy,
}

impl CliConfig {
    /// Story file path for the version the run ended with.
    pub fn story_path(&self, version: u8) -> PathBuf {
        match &self.outfile {
            Some(path) => path.clone(),
            None => default_story_path(&self.input, version),
        }
    }
}

/// `<input stem>.z<version>` next to the input.
pub fn default_story_path(input: &Path, version: u8) -> PathBuf {
    input.with_extension(format!("z{version}"))
}

fn cli_error(message: impl Into<String>) -> AsmRunError {
    AsmRunError::new(
        AsmError::new(AsmErrorKind::Cli, &message.into(), None),
        Vec::new(),
    )
}

fn parse_env_bool(var_name: &str) -> Result<Option<bool>, AsmRunError> {
    let Some(raw) = env::var_os(var_name) else {
        return Ok(None);
    };
    let value = raw.to_string_lossy().trim().to_ascii_lowercase();
    let parsed = match value.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        "" => None,
        _ => {
            return Err(cli_error(format!(
                "Invalid boolean value for {var_name}: {value}"
            )))
        }
    };
    Ok(parsed)
}

fn parse_env_path(var_name: &str) -> Result<Option<PathBuf>, AsmRunError> {
    Ok(parse_env_string(var_name)?.map(PathBuf::from))
}

fn parse_env_usize(var_name: &str) -> Result<Option<usize>, AsmRunError> {
    let Some(value) = parse_env_string(var_name)? else {
        return Ok(None);
    };
    value
        .parse::<usize>()
        .map(Some)
        .map_err(|_| cli_error(format!("Invalid integer value for {var_name}: {value}")))
}

fn parse_env_string(var_name: &str) -> Result<Option<String>, AsmRunError> {
    let Some(raw) = env::var_os(var_name) else {
        return Ok(None);
    };
    let value = raw.to_string_lossy().trim().to_string();
    if value.is_empty() {
        return Ok(None);
    }
    Ok(Some(value))
}

/// Validate CLI arguments and return parsed configuration.
pub fn validate_cli(cli: &Cli) -> Result<CliConfig, AsmRunError> {
    let env_story_version = parse_env_usize("ZFORGE_STORY_VERSION")?;
    let env_max_errors = parse_env_usize("ZFORGE_MAX_ERRORS")?;
    let env_serial = parse_env_string("ZFORGE_SERIAL")?;
    let env_creator = parse_env_string("ZFORGE_CREATOR")?;
    let env_debug_info = parse_env_path("ZFORGE_DEBUG_INFO")?;

    let env_quiet = parse_env_bool("ZFORGE_QUIET")?;
    let env_no_warn = parse_env_bool("ZFORGE_NO_WARN")?;
    let env_warn_error = parse_env_bool("ZFORGE_WERROR")?;

    let env_error_file = parse_env_path("ZFORGE_ERROR_FILE")?;
    let env_error_append = parse_env_bool("ZFORGE_ERROR_APPEND")?;
    let env_no_error = parse_env_bool("ZFORGE_NO_ERROR")?;

    let effective_version = match cli.story_version {
        Some(number) => usize::from(number),
        None => env_story_version.unwrap_or(usize::from(ZVersion::DEFAULT.number())),
    };
    let version = u8::try_from(effective_version)
        .ok()
        .and_then(ZVersion::new)
        .ok_or_else(|| {
            cli_error(format!(
                "Story version must be between 1 and 8, found {effective_version}"
            ))
        })?;

    let max_errors = cli.max_errors.or(env_max_errors).unwrap_or(100);
    if max_errors == 0 {
        return Err(cli_error("--max-errors must be at least 1"));
    }

    if let Some(count) = cli.abbreviations {
        if count == 0 {
            return Err(cli_error("--abbreviations must be at least 1"));
        }
        if count > MAX_ABBREVIATIONS {
            return Err(cli_error(format!(
                "--abbreviations must be at most {MAX_ABBREVIATIONS}"
            )));
        }
    }

    let serial = cli.serial.clone().or(env_serial);
    if let Some(serial) = &serial {
        if !serial.bytes().all(|byte| byte.is_ascii_graphic()) {
            return Err(cli_error(format!(
                "Serial must be printable ASCII: {serial}"
            )));
        }
    }

    let creator = cli.creator.clone().or(env_creator);
    if let Some(creator) = &creator {
        if creator.len() > 4 || !creator.is_ascii() {
            return Err(cli_error(format!(
                "Creator tag must be at most 4 ASCII characters: {creator}"
            )));
        }
    }

    let effective_quiet = if cli.quiet {
        true
    } else {
        env_quiet.unwrap_or(false)
    };

    let effective_no_warn = if cli.no_warn {
        true
    } else if cli.warn_error {
        false
    } else {
        env_no_warn.unwrap_or(false)
    };

    let effective_warn_error = if cli.warn_error {
        true
    } else if effective_no_warn {
        false
    } else {
        env_warn_error.unwrap_or(false)
    };

    let effective_error_file = if cli.error_file.is_some() {
        cli.error_file.clone()
    } else {
        env_error_file
    };

    let effective_error_append = if cli.error_append {
        true
    } else {
        env_error_append.unwrap_or(false)
    };

    let effective_no_error = if cli.no_error {
        true
    } else if cli.error_file.is_some() {
        false
    } else {
        env_no_error.unwrap_or(false)
    };

    let diagnostics_sink = if effective_no_error {
        DiagnosticsSinkConfig::Disabled
    } else if let Some(path) = effective_error_file {
        DiagnosticsSinkConfig::File {
            path,
            append: effective_error_append,
        }
    } else {
        DiagnosticsSinkConfig::Stderr
    };

    let options = AssemblerOptions {
        version,
        max_errors,
        serial,
        release: cli.release,
        creator,
        collect_text: cli.abbreviations.is_some(),
    };

    Ok(CliConfig {
        input: cli.input.clone(),
        outfile: cli.outfile.clone(),
        debug_info: cli.debug_info.clone().or(env_debug_info),
        abbreviations: cli.abbreviations,
        abbrev_output: cli.abbrev_output.clone(),
        options,
        verbosity: cli.verbose,
        quiet: effective_quiet,
        output_format: cli.format,
        diagnostics_sink,
        warning_policy: WarningPolicy {
            emit_warnings: !effective_no_warn,
            treat_warnings_as_errors: effective_warn_error,
        },
    })
}
