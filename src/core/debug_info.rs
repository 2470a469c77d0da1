// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Debug records produced by `.DEBUG-*` directives.

use std::io::{self, Write};

use serde::Serialize;

use crate::core::ir::DebugTable;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum DebugRecord {
    File {
        number: u16,
        include_name: String,
        actual_name: String,
    },
    RoutineStart {
        file: u16,
        line: u32,
        column: u32,
        pc: u32,
        name: String,
        locals: Vec<String>,
    },
    RoutineEnd {
        file: u16,
        line: u32,
        column: u32,
        pc: u32,
    },
    Line {
        file: u16,
        line: u32,
        column: u32,
        pc: u32,
    },
    Named {
        table: DebugTable,
        number: i32,
        name: String,
    },
}

/// Receives debug records in image order once assembly succeeds.
pub trait DebugSink {
    fn record(&mut self, record: DebugRecord);
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullDebugSink;

impl DebugSink for NullDebugSink {
    fn record(&mut self, _record: DebugRecord) {}
}

/// Collects records in memory.
#[derive(Debug, Default, Clone)]
pub struct DebugLog {
    records: Vec<DebugRecord>,
}

impl DebugLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[DebugRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn write_json<W: Write>(&self, mut out: W) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut out, &self.records).map_err(io::Error::other)?;
        writeln!(out)
    }
}

impl DebugSink for DebugLog {
    fn record(&mut self, record: DebugRecord) {
        self.records.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_serialize_with_tag() {
        let mut log = DebugLog::new();
        log.record(DebugRecord::Line {
            file: 1,
            line: 20,
            column: 4,
            pc: 0x4F2,
        });
        log.record(DebugRecord::Named {
            table: DebugTable::Global,
            number: 16,
            name: "SCORE".to_string(),
        });
        let mut out = Vec::new();
        log.write_json(&mut out).expect("serialize");
        let value: serde_json::Value = serde_json::from_slice(&out).expect("valid json");
        assert_eq!(value[0]["record"], "line");
        assert_eq!(value[0]["pc"], 0x4F2);
        assert_eq!(value[1]["table"], "global");
        assert_eq!(value[1]["name"], "SCORE");
    }
}
