// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use zforge::core::ir::Node;

pub fn unique_temp_dir() -> PathBuf {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_micros();
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("zforge-it-{now}-{seq}"));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub fn write_nodes(path: &Path, nodes: &[Node]) {
    let text = serde_json::to_string_pretty(nodes).expect("serialize nodes");
    fs::write(path, text).expect("write nodes");
}

pub fn run_zforge(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_zforge"))
        .args(args)
        .env_remove("ZFORGE_WERROR")
        .env_remove("ZFORGE_NO_WARN")
        .env_remove("ZFORGE_STORY_VERSION")
        .env_remove("ZFORGE_ERROR_FILE")
        .env_remove("ZFORGE_NO_ERROR")
        .env_remove("ZFORGE_QUIET")
        .output()
        .expect("run zforge")
}

pub fn word_at(story: &[u8], addr: usize) -> u16 {
    u16::from_be_bytes([story[addr], story[addr + 1]])
}
