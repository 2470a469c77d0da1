// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Version-dependent rules of the story file format.

use std::fmt;

/// Story file version, always within `1..=8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZVersion(u8);

impl ZVersion {
    pub const DEFAULT: ZVersion = ZVersion(3);

    pub fn new(number: u8) -> Option<Self> {
        (1..=8).contains(&number).then_some(Self(number))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// Divisor applied to routine and string addresses.
    pub fn packing_divisor(self) -> u32 {
        match self.0 {
            1..=3 => 2,
            4..=7 => 4,
            _ => 8,
        }
    }

    /// Versions 6 and 7 pack relative to header offsets.
    pub fn uses_packing_offsets(self) -> bool {
        matches!(self.0, 6 | 7)
    }

    /// Unit of the length word at 0x1A.
    pub fn length_unit(self) -> u32 {
        match self.0 {
            1..=3 => 2,
            4 | 5 => 4,
            _ => 8,
        }
    }

    pub fn max_story_size(self) -> u32 {
        match self.0 {
            1..=3 => 128 * 1024,
            4 | 5 => 256 * 1024,
            7 => 320 * 1024,
            _ => 512 * 1024,
        }
    }

    /// Z-characters stored per dictionary key.
    pub fn dictionary_key_zchars(self) -> usize {
        if self.0 <= 3 {
            6
        } else {
            9
        }
    }

    /// Routine headers carry initial local values before version 5.
    pub fn has_local_defaults(self) -> bool {
        self.0 < 5
    }

    /// Objects use 3-byte links and 32 attributes before version 4.
    pub fn has_small_objects(self) -> bool {
        self.0 <= 3
    }

    /// Versions 1 and 2 use shift-lock characters and a different A2 row.
    pub fn has_legacy_shifts(self) -> bool {
        self.0 <= 2
    }

    /// Abbreviation banks available to Z-strings (version 1 has none).
    pub fn abbreviation_banks(self) -> u8 {
        match self.0 {
            1 => 0,
            2 => 1,
            _ => 3,
        }
    }

    /// TCHARS and EXTAB header fields exist from version 5 on.
    pub fn has_extended_header(self) -> bool {
        self.0 >= 5
    }
}

impl Default for ZVersion {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for ZVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
