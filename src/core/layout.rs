// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Packed-address alignment, open tables and vocabulary blocks.

use crate::core::version::ZVersion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackedKind {
    Routine,
    String,
}

/// Routine and string bases fixed so far in a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackingBases {
    pub routine: Option<u32>,
    pub string: Option<u32>,
}

/// Tracks packing bases for the current pass.
///
/// For versions 6 and 7 the first routine and the first string of each pass
/// fix their base at `8 * (position / 8)`; other versions pack from zero.
#[derive(Debug, Clone)]
pub struct PackingManager {
    version: ZVersion,
    routine_base: Option<u32>,
    string_base: Option<u32>,
}

impl PackingManager {
    pub fn new(version: ZVersion) -> Self {
        Self {
            version,
            routine_base: None,
            string_base: None,
        }
    }

    pub fn reset_pass(&mut self) {
        self.routine_base = None;
        self.string_base = None;
    }

    pub fn bases(&self) -> PackingBases {
        PackingBases {
            routine: self.routine_base,
            string: self.string_base,
        }
    }

    /// Forget bases fixed after `bases` was taken.
    pub fn restore(&mut self, bases: PackingBases) {
        self.routine_base = bases.routine;
        self.string_base = bases.string;
    }

    fn base(&self, kind: PackedKind) -> Option<u32> {
        match kind {
            PackedKind::Routine => self.routine_base,
            PackedKind::String => self.string_base,
        }
    }

    /// Padding to insert before placing `kind` at `position`.
    pub fn padding_for(&mut self, kind: PackedKind, position: u32) -> u32 {
        let divisor = self.version.packing_divisor();
        if !self.version.uses_packing_offsets() {
            return (divisor - position % divisor) % divisor;
        }
        let base = match self.base(kind) {
            Some(base) => base,
            None => {
                let base = (position / 8) * 8;
                match kind {
                    PackedKind::Routine => self.routine_base = Some(base),
                    PackedKind::String => self.string_base = Some(base),
                }
                base
            }
        };
        let rel = position.saturating_sub(base);
        let mut padding = (divisor - rel % divisor) % divisor;
        if position + padding == base {
            padding += divisor;
        }
        padding
    }

    /// Packed value for an aligned address; may exceed 16 bits.
    pub fn pack(&self, kind: PackedKind, addr: u32) -> u32 {
        let base = self.base(kind).unwrap_or(0);
        addr.saturating_sub(base) / self.version.packing_divisor()
    }

    /// Header words 0x28 and 0x2A, zero outside versions 6 and 7.
    pub fn header_offsets(&self) -> (u16, u16) {
        if !self.version.uses_packing_offsets() {
            return (0, 0);
        }
        let offset = |base: Option<u32>| (base.unwrap_or(0) / 8) as u16;
        (offset(self.routine_base), offset(self.string_base))
    }
}

/// An open `.TABLE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableState {
    pub start: u32,
    pub size: Option<u32>,
}

impl TableState {
    /// Checks the declared size against the end position; returns the actual
    /// size on mismatch.
    pub fn check_end(&self, end: u32) -> Result<(), u32> {
        let actual = end.saturating_sub(self.start);
        match self.size {
            Some(declared) if declared != actual => Err(actual),
            _ => Ok(()),
        }
    }
}

/// An open `.VOCBEG` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabBlock {
    pub record_size: u32,
    pub key_size: u32,
    pub start: u32,
    /// Global labels defined inside the block with their unsorted positions.
    pub labels: Vec<(String, u32)>,
}

impl VocabBlock {
    pub fn new(record_size: u32, key_size: u32, start: u32) -> Self {
        Self {
            record_size,
            key_size,
            start,
            labels: Vec::new(),
        }
    }

    /// Where a position inside the block lands after sorting.
    pub fn relocate(&self, position: u32, order: &[usize]) -> u32 {
        if self.record_size == 0 || position < self.start {
            return position;
        }
        let rel = position - self.start;
        let record = (rel / self.record_size) as usize;
        let within = rel % self.record_size;
        match order.iter().position(|&old| old == record) {
            Some(new_index) => self.start + new_index as u32 * self.record_size + within,
            None => position,
        }
    }
}

/// Stable sort of fixed-size records by their leading key bytes.
///
/// Returns the sorted bytes and, per new slot, the original record index.
/// Trailing bytes that do not fill a record stay in place.
pub fn sort_records(bytes: &[u8], record_size: usize, key_size: usize) -> (Vec<u8>, Vec<usize>) {
    if record_size == 0 {
        return (bytes.to_vec(), Vec::new());
    }
    let key_size = key_size.min(record_size);
    let count = bytes.len() / record_size;
    let record = |idx: usize| &bytes[idx * record_size..(idx + 1) * record_size];
    let mut order: Vec<usize> = (0..count).collect();
    order.sort_by(|&a, &b| record(a)[..key_size].cmp(&record(b)[..key_size]));
    let mut sorted = Vec::with_capacity(bytes.len());
    for &idx in &order {
        sorted.extend_from_slice(record(idx));
    }
    sorted.extend_from_slice(&bytes[count * record_size..]);
    (sorted, order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v(number: u8) -> ZVersion {
        ZVersion::new(number).expect("valid version")
    }

    #[test]
    fn version_three_aligns_to_even() {
        let mut packing = PackingManager::new(v(3));
        assert_eq!(packing.padding_for(PackedKind::Routine, 0x101), 1);
        assert_eq!(packing.padding_for(PackedKind::Routine, 0x102), 0);
        assert_eq!(packing.pack(PackedKind::Routine, 0x102), 0x81);
    }

    #[test]
    fn version_eight_divides_by_eight() {
        let mut packing = PackingManager::new(v(8));
        assert_eq!(packing.padding_for(PackedKind::String, 0x203), 5);
        assert_eq!(packing.pack(PackedKind::String, 0x208), 0x41);
    }

    #[test]
    fn version_six_fixes_base_and_avoids_zero() {
        let mut packing = PackingManager::new(v(6));
        // 0x1000 is its own base, so one divisor of padding is added.
        assert_eq!(packing.padding_for(PackedKind::Routine, 0x1000), 4);
        assert_eq!(packing.pack(PackedKind::Routine, 0x1004), 1);
        assert_eq!(packing.padding_for(PackedKind::String, 0x2006), 2);
        assert_eq!(packing.pack(PackedKind::String, 0x2008), 2);
        assert_eq!(packing.header_offsets(), (0x200, 0x400));
        packing.reset_pass();
        assert_eq!(packing.header_offsets(), (0, 0));
    }

    #[test]
    fn restored_bases_are_fixed_again_at_the_new_position() {
        let mut packing = PackingManager::new(v(7));
        packing.padding_for(PackedKind::Routine, 0x40);
        let bases = packing.bases();
        assert_eq!(packing.padding_for(PackedKind::String, 0x6E), 2);
        assert_eq!(packing.header_offsets(), (0x08, 0x0D));
        packing.restore(bases);
        assert_eq!(packing.bases().string, None);
        assert_eq!(packing.padding_for(PackedKind::String, 0x64), 0);
        assert_eq!(packing.pack(PackedKind::String, 0x64), 1);
        assert_eq!(packing.header_offsets(), (0x08, 0x0C));
    }

    #[test]
    fn table_size_mismatch_reports_actual() {
        let table = TableState {
            start: 100,
            size: Some(6),
        };
        assert_eq!(table.check_end(106), Ok(()));
        assert_eq!(table.check_end(108), Err(8));
        let open = TableState {
            start: 100,
            size: None,
        };
        assert_eq!(open.check_end(300), Ok(()));
    }

    #[test]
    fn records_sort_by_key_and_labels_follow() {
        // Three 3-byte records keyed on their first two bytes.
        let bytes = [0x20, 0x00, 0xA1, 0x10, 0x00, 0xB2, 0x15, 0x00, 0xC3, 0xEE];
        let (sorted, order) = sort_records(&bytes, 3, 2);
        assert_eq!(
            sorted,
            vec![0x10, 0x00, 0xB2, 0x15, 0x00, 0xC3, 0x20, 0x00, 0xA1, 0xEE]
        );
        assert_eq!(order, vec![1, 2, 0]);
        let block = VocabBlock::new(3, 2, 0x500);
        assert_eq!(block.relocate(0x500, &order), 0x506);
        assert_eq!(block.relocate(0x504, &order), 0x501);
    }

    proptest! {
        #[test]
        fn packed_addresses_align_with_base(version in 1u8..=8, position in 64u32..0x7_0000) {
            let version = v(version);
            let mut packing = PackingManager::new(version);
            let padding = packing.padding_for(PackedKind::Routine, position);
            let raw = position + padding;
            let (routine_offset, _) = packing.header_offsets();
            let base = u32::from(routine_offset) * 8;
            let divisor = version.packing_divisor();
            prop_assert_eq!((raw - base) % divisor, 0);
            let packed = packing.pack(PackedKind::Routine, raw);
            prop_assert_eq!((raw - base) / divisor, packed);
            prop_assert!(packed != 0);
        }
    }
}
