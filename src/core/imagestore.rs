// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Story image store with a write cursor and read-back for patching.

/// Stores assembled bytes in memory.
///
/// Bytes are written at the cursor via `store`/`store_slice`, patched in place
/// once fixups resolve, and finally handed out as the story bytes.
#[derive(Debug, Default, Clone)]
pub struct ImageStore {
    bytes: Vec<u8>,
    cursor: u32,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current write position.
    pub fn position(&self) -> u32 {
        self.cursor
    }

    /// Move the cursor. Gaps left behind read as zero.
    pub fn seek(&mut self, addr: u32) {
        self.cursor = addr;
    }

    /// Number of bytes up to the highest address written.
    pub fn len(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Store a single byte at the cursor and advance.
    pub fn store(&mut self, val: u8) {
        self.patch_byte(self.cursor, val);
        self.cursor = self.cursor.wrapping_add(1);
    }

    /// Store a big-endian word at the cursor and advance.
    pub fn store_word(&mut self, val: u16) {
        self.store_slice(&val.to_be_bytes());
    }

    /// Store a contiguous slice of bytes at the cursor.
    pub fn store_slice(&mut self, values: &[u8]) {
        for val in values {
            self.store(*val);
        }
    }

    /// Store `count` copies of `fill`.
    pub fn fill(&mut self, count: u32, fill: u8) {
        for _ in 0..count {
            self.store(fill);
        }
    }

    /// Overwrite the byte at `addr` without moving the cursor.
    pub fn patch_byte(&mut self, addr: u32, val: u8) {
        let idx = addr as usize;
        if idx >= self.bytes.len() {
            self.bytes.resize(idx + 1, 0);
        }
        self.bytes[idx] = val;
    }

    pub fn patch_word(&mut self, addr: u32, val: u16) {
        let [hi, lo] = val.to_be_bytes();
        self.patch_byte(addr, hi);
        self.patch_byte(addr.wrapping_add(1), lo);
    }

    pub fn read_byte(&self, addr: u32) -> u8 {
        self.bytes.get(addr as usize).copied().unwrap_or(0)
    }

    /// Copy of `len` bytes starting at `addr`, zero-filled past the end.
    pub fn read_slice(&self, addr: u32, len: u32) -> Vec<u8> {
        (0..len)
            .map(|offset| self.read_byte(addr.wrapping_add(offset)))
            .collect()
    }

    /// Overwrite a run of bytes starting at `addr` without moving the cursor.
    pub fn patch_slice(&mut self, addr: u32, values: &[u8]) {
        for (ix, val) in values.iter().enumerate() {
            self.patch_byte(addr.wrapping_add(ix as u32), *val);
        }
    }

    /// Drop everything from `len` on and clamp the cursor to it.
    pub fn truncate(&mut self, len: u32) {
        self.bytes.truncate(len as usize);
        self.cursor = self.cursor.min(len);
    }

    /// Extend the image with zeros so it is at least `len` bytes long.
    pub fn pad_to(&mut self, len: u32) {
        if (self.bytes.len() as u32) < len {
            self.bytes.resize(len as usize, 0);
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
