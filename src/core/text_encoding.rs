// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Z-string encoding for string directives, inline print text and dictionary
//! keys.

use crate::core::version::ZVersion;

const ALPHABET_0: &str = "abcdefghijklmnopqrstuvwxyz";
const ALPHABET_1: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
/// A2 from Z-character 8 on (7 is newline) in version 2 and later.
const ALPHABET_2: &str = "0123456789.,!?_#'\"/\\-:()";
/// A2 from Z-character 7 on in version 1.
const ALPHABET_2_V1: &str = "0123456789.,!?_#'\"/\\<-:()";

const PAD: u8 = 5;
const ESCAPE: u8 = 6;

/// Z-characters one abbreviation reference costs.
pub const ABBREVIATION_REF_COST: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextEncodingError {
    TooManyAbbreviations { version: ZVersion, limit: usize },
    EmptyAbbreviation,
}

impl std::fmt::Display for TextEncodingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextEncodingError::TooManyAbbreviations { version, limit } => write!(
                f,
                "Version {version} allows at most {limit} abbreviations"
            ),
            TextEncodingError::EmptyAbbreviation => write!(f, "Abbreviation text is empty"),
        }
    }
}

impl std::error::Error for TextEncodingError {}

/// Alphabet row a character lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Row {
    Space,
    A0(u8),
    A1(u8),
    A2(u8),
    Newline,
    Escape(u16),
}

fn classify(ch: char, version: ZVersion) -> Row {
    if ch == ' ' {
        return Row::Space;
    }
    if ch == '\n' {
        return Row::Newline;
    }
    if let Some(idx) = ALPHABET_0.find(ch) {
        return Row::A0(6 + idx as u8);
    }
    if let Some(idx) = ALPHABET_1.find(ch) {
        return Row::A1(6 + idx as u8);
    }
    let (row, first) = if version.number() == 1 {
        (ALPHABET_2_V1, 7)
    } else {
        (ALPHABET_2, 8)
    };
    if let Some(idx) = row.find(ch) {
        return Row::A2(first + idx as u8);
    }
    Row::Escape(zscii_code(ch))
}

fn zscii_code(ch: char) -> u16 {
    match ch as u32 {
        0x20..=0x7E => ch as u16,
        _ => u16::from(b'?'),
    }
}

/// Z-characters needed for `ch` with the standard alphabets.
pub fn zchar_cost(ch: char) -> u32 {
    match classify(ch, ZVersion::DEFAULT) {
        Row::Space | Row::A0(_) => 1,
        Row::A1(_) | Row::A2(_) | Row::Newline => 2,
        Row::Escape(_) => 4,
    }
}

/// Z-characters needed for `text` without abbreviations.
pub fn text_cost(text: &str) -> u32 {
    text.chars().map(zchar_cost).sum()
}

/// Encoder bound to one story version and its abbreviation list.
#[derive(Debug, Clone)]
pub struct ZTextEncoder {
    version: ZVersion,
    abbreviations: Vec<String>,
}

impl ZTextEncoder {
    pub fn new(version: ZVersion) -> Self {
        Self {
            version,
            abbreviations: Vec::new(),
        }
    }

    pub fn version(&self) -> ZVersion {
        self.version
    }

    pub fn abbreviation_limit(&self) -> usize {
        usize::from(self.version.abbreviation_banks()) * 32
    }

    /// Register an abbreviation; later encodings substitute it.
    pub fn register_abbreviation(&mut self, text: &str) -> Result<usize, TextEncodingError> {
        if text.is_empty() {
            return Err(TextEncodingError::EmptyAbbreviation);
        }
        let limit = self.abbreviation_limit();
        if self.abbreviations.len() >= limit {
            return Err(TextEncodingError::TooManyAbbreviations {
                version: self.version,
                limit,
            });
        }
        self.abbreviations.push(text.to_string());
        Ok(self.abbreviations.len() - 1)
    }

    pub fn abbreviations(&self) -> &[String] {
        &self.abbreviations
    }

    /// Forget abbreviations registered after the first `len`.
    pub fn truncate_abbreviations(&mut self, len: usize) {
        self.abbreviations.truncate(len);
    }

    /// Z-characters for `text`, substituting abbreviations when allowed.
    pub fn zchars(&self, text: &str, use_abbreviations: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(text.len());
        let mut rest = text;
        while let Some(ch) = rest.chars().next() {
            if use_abbreviations {
                if let Some((index, len)) = self.longest_abbreviation(rest) {
                    out.push(1 + (index / 32) as u8);
                    out.push((index % 32) as u8);
                    rest = &rest[len..];
                    continue;
                }
            }
            self.push_char(ch, &mut out);
            rest = &rest[ch.len_utf8()..];
        }
        out
    }

    fn longest_abbreviation(&self, text: &str) -> Option<(usize, usize)> {
        self.abbreviations
            .iter()
            .enumerate()
            .filter(|(_, abbrev)| text.starts_with(abbrev.as_str()))
            .max_by_key(|(index, abbrev)| (abbrev.len(), usize::MAX - index))
            .map(|(index, abbrev)| (index, abbrev.len()))
    }

    fn push_char(&self, ch: char, out: &mut Vec<u8>) {
        let (shift_a1, shift_a2) = if self.version.has_legacy_shifts() {
            (2, 3)
        } else {
            (4, 5)
        };
        match classify(ch, self.version) {
            Row::Space => out.push(0),
            Row::A0(code) => out.push(code),
            Row::A1(code) => out.extend([shift_a1, code]),
            Row::A2(code) => out.extend([shift_a2, code]),
            Row::Newline if self.version.number() == 1 => out.push(1),
            Row::Newline => out.extend([shift_a2, 7]),
            Row::Escape(zscii) => out.extend([
                shift_a2,
                ESCAPE,
                ((zscii >> 5) & 0x1F) as u8,
                (zscii & 0x1F) as u8,
            ]),
        }
    }

    /// Encoded Z-string bytes for `text`.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        let banks_allowed = self.version.abbreviation_banks() > 0;
        pack_zchars(&self.zchars(text, banks_allowed))
    }

    /// Encoded Z-string bytes with no abbreviation substitution.
    pub fn encode_plain(&self, text: &str) -> Vec<u8> {
        pack_zchars(&self.zchars(text, false))
    }

    /// Fixed-size dictionary key for `word`.
    pub fn dictionary_key(&self, word: &str) -> Vec<u8> {
        let lowered = word.to_lowercase();
        let mut zchars = self.zchars(&lowered, false);
        zchars.resize(self.version.dictionary_key_zchars(), PAD);
        pack_zchars(&zchars)
    }
}

/// Pack Z-characters three per word, padding with 5 and marking the last word.
pub fn pack_zchars(zchars: &[u8]) -> Vec<u8> {
    let mut padded = zchars.to_vec();
    if padded.is_empty() {
        padded.extend([PAD; 3]);
    }
    while padded.len() % 3 != 0 {
        padded.push(PAD);
    }
    let word_count = padded.len() / 3;
    let mut out = Vec::with_capacity(word_count * 2);
    for (idx, chunk) in padded.chunks(3).enumerate() {
        let mut word = (u16::from(chunk[0] & 0x1F) << 10)
            | (u16::from(chunk[1] & 0x1F) << 5)
            | u16::from(chunk[2] & 0x1F);
        if idx + 1 == word_count {
            word |= 0x8000;
        }
        out.extend(word.to_be_bytes());
    }
    out
}
