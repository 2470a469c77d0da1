// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use std::fmt::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::abbrev_finder::AbbrevResult;

use super::*;

/// Interpreters expect at least this much story file.
pub(crate) const MIN_STORY_SIZE: u32 = 512;

/// Header words filled from same-named global symbols.
const HEADER_SYMBOLS: &[(u32, &str)] = &[
    (0x04, "ENDLOD"),
    (0x06, "START"),
    (0x08, "VOCAB"),
    (0x0A, "OBJECT"),
    (0x0C, "GLOBAL"),
    (0x0E, "IMPURE"),
    (0x18, "WORDS"),
];

const EXTENDED_HEADER_SYMBOLS: &[(u32, &str)] = &[(0x2E, "TCHARS"), (0x36, "EXTAB")];

impl<'a> Assembler<'a> {
    /// Pad the image and write the header once the final pass succeeded.
    pub(crate) fn finish_story(&mut self) -> Result<(), AsmError> {
        self.node_index = self.nodes.len();
        let unit = self.version.length_unit();
        let length = self.image.len().max(MIN_STORY_SIZE).div_ceil(unit) * unit;
        let max = self.version.max_story_size();
        if length > max {
            let version = self.version.number();
            let message = format!(
                "Story file exceeds the version {version} limit by {} bytes",
                length - max
            );
            let err = AsmError::new(AsmErrorKind::Layout, &message, None);
            self.push_diagnostic(
                Diagnostic::new(Severity::Error, err.clone())
                    .with_note(format!("version {version} stories hold at most {max} bytes"))
                    .with_help("define abbreviations with .FSTR to shorten the text"),
            );
            return Err(err);
        }
        self.image.pad_to(length);
        self.write_header(length);
        Ok(())
    }

    fn header_symbol(&self, name: &str) -> u16 {
        self.globals.value_of(name).map_or(0, to_word)
    }

    fn write_header(&mut self, length: u32) {
        let version = self.version;
        self.image.patch_byte(0x00, version.number());
        self.image.patch_byte(0x01, self.flags1);
        let release = self
            .options
            .release
            .unwrap_or_else(|| self.header_symbol("ZORKID"));
        self.image.patch_word(0x02, release);
        for &(addr, name) in HEADER_SYMBOLS {
            let value = self.header_symbol(name);
            self.image.patch_word(addr, value);
        }
        if version.has_extended_header() {
            for &(addr, name) in EXTENDED_HEADER_SYMBOLS {
                let value = self.header_symbol(name);
                self.image.patch_word(addr, value);
            }
        }
        self.image.patch_word(0x10, self.flags2);
        let serial = serial_bytes(self.options.serial.as_deref());
        self.image.patch_slice(0x12, &serial);
        self.image
            .patch_word(0x1A, (length / version.length_unit()) as u16);
        let (routines, strings) = self.packing.header_offsets();
        self.image.patch_word(0x28, routines);
        self.image.patch_word(0x2A, strings);
        if let Some(creator) = self.options.creator.as_deref() {
            self.image.patch_slice(0x3C, &creator_bytes(creator));
        }
        let sum = checksum(self.image.as_bytes());
        self.image.patch_word(0x1C, sum);
    }
}

/// 16-bit wrapping sum of every byte after the header.
pub(crate) fn checksum(story: &[u8]) -> u16 {
    story
        .iter()
        .skip(HEADER_SIZE as usize)
        .fold(0u16, |sum, &byte| sum.wrapping_add(u16::from(byte)))
}

fn serial_bytes(serial: Option<&str>) -> [u8; 6] {
    let text = match serial {
        Some(serial) => serial.to_string(),
        None => today_serial(),
    };
    let mut out = [b'0'; 6];
    for (slot, byte) in out
        .iter_mut()
        .zip(text.bytes().filter(u8::is_ascii_graphic))
    {
        *slot = byte;
    }
    out
}

fn creator_bytes(creator: &str) -> [u8; 4] {
    let mut out = [b' '; 4];
    for (slot, byte) in out.iter_mut().zip(creator.bytes().filter(u8::is_ascii)) {
        *slot = byte;
    }
    out
}

/// Today's UTC date as `YYMMDD`.
pub fn today_serial() -> String {
    let days = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs() / 86_400);
    serial_for_days(days as i64)
}

/// `YYMMDD` for a day count since 1970-01-01.
pub fn serial_for_days(days: i64) -> String {
    let (year, month, day) = civil_from_days(days);
    format!("{:02}{month:02}{day:02}", year.rem_euclid(100))
}

/// Proleptic Gregorian date for a day count since the Unix epoch.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

/// ZAP source declaring the selected abbreviations and their table.
pub fn format_abbreviations(results: &[AbbrevResult]) -> String {
    let mut out = String::new();
    for (index, result) in results.iter().enumerate() {
        let _ = writeln!(
            out,
            "\t.FSTR FSTR?{},\"{}\"\t\t; {}x, saves {}",
            index + 1,
            result.text.replace('"', "\"\""),
            result.count,
            result.savings
        );
    }
    if !results.is_empty() {
        out.push_str("WORDS::\n");
        for index in 0..results.len() {
            let _ = writeln!(out, "\tFSTR?{}", index + 1);
        }
    }
    out
}
