// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Version-aware building blocks shared by the assembler engine.
//!
//! - [`ir`] - Nodes handed over by the parser
//! - [`symbol_table`] - Global and local symbols
//! - [`expr`] - Operand expression evaluation
//! - [`text_encoding`] - Z-string and dictionary key encoding
//! - [`opcodes`] / [`encoder`] - Instruction table and bytecode forms
//! - [`version`] / [`layout`] - Version rules, packing, tables and vocabulary blocks
//! - [`imagestore`] - Story image buffer
//! - [`debug_info`] - Debug record sink
//! - [`abbrev_finder`] - Abbreviation optimizer

pub mod abbrev_finder;
pub mod assembler;
pub mod debug_info;
pub mod encoder;
pub mod expr;
pub mod imagestore;
pub mod ir;
pub mod layout;
pub mod opcodes;
pub mod symbol_table;
pub mod text_encoding;
pub mod version;
