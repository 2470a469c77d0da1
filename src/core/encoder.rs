// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Instruction encoding.
//!
//! Operands arrive already resolved to a type and value; the engine decides
//! which operands are placeholders awaiting a fixup. The encoder picks the
//! instruction form and reports where each operand's bytes landed.

use crate::core::opcodes::{OpForm, OpcodeInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Word(u16),
    Byte(u8),
    Variable(u8),
}

impl Operand {
    fn type_bits(self) -> u8 {
        match self {
            Operand::Word(_) => 0b00,
            Operand::Byte(_) => 0b01,
            Operand::Variable(_) => 0b10,
        }
    }

    fn is_long(self) -> bool {
        matches!(self, Operand::Word(_))
    }

    fn push_value(self, out: &mut Vec<u8>) {
        match self {
            Operand::Word(value) => out.extend(value.to_be_bytes()),
            Operand::Byte(value) | Operand::Variable(value) => out.push(value),
        }
    }
}

const OMITTED: u8 = 0b11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchDest {
    /// Return from the routine with this value.
    Return(bool),
    Address(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchRequest {
    pub on_true: bool,
    pub dest: BranchDest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    OperandCount {
        opcode: &'static str,
        given: usize,
        min: u8,
        max: u8,
    },
    BranchOutOfRange(i32),
    /// Offsets 0 and 1 mean a return and cannot reach a label.
    BranchIntoInstruction,
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::OperandCount {
                opcode,
                given,
                min,
                max,
            } if min == max => write!(f, "{opcode} takes {min} operands, {given} given"),
            EncodeError::OperandCount {
                opcode,
                given,
                min,
                max,
            } => write!(f, "{opcode} takes {min} to {max} operands, {given} given"),
            EncodeError::BranchOutOfRange(offset) => {
                write!(f, "Branch offset {offset} is out of range")
            }
            EncodeError::BranchIntoInstruction => {
                write!(f, "Branch target lies inside the branching instruction")
            }
        }
    }
}

impl std::error::Error for EncodeError {}

/// One instruction ready to be encoded at `address`.
#[derive(Debug, Clone)]
pub struct EncodeRequest<'a> {
    pub info: &'a OpcodeInfo,
    pub operands: &'a [Operand],
    pub store: Option<u8>,
    pub branch: Option<BranchRequest>,
    /// Encoded Z-string for PRINTI/PRINTR.
    pub text: Option<&'a [u8]>,
    pub address: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    /// Byte offset of each operand's value within `bytes`.
    pub operand_offsets: Vec<usize>,
    pub store_offset: Option<usize>,
    pub long_branch: bool,
}

pub fn encode(req: &EncodeRequest<'_>) -> Result<Encoded, EncodeError> {
    let info = req.info;
    let count = req.operands.len();
    if count < usize::from(info.min_operands) || count > usize::from(info.max_operands) {
        return Err(EncodeError::OperandCount {
            opcode: info.name,
            given: count,
            min: info.min_operands,
            max: info.max_operands,
        });
    }

    let mut out = Vec::with_capacity(8);
    let number = info.number;
    let opbits = (number & 0x1F) as u8;
    match info.form() {
        OpForm::TwoOp => {
            let long = req.operands.iter().any(|operand| operand.is_long());
            if count == 2 && !long {
                let mut head = opbits;
                if matches!(req.operands[0], Operand::Variable(_)) {
                    head |= 0x40;
                }
                if matches!(req.operands[1], Operand::Variable(_)) {
                    head |= 0x20;
                }
                out.push(head);
            } else {
                out.push(0xC0 | opbits);
                push_type_bytes(req.operands, 1, &mut out);
            }
        }
        OpForm::OneOp => {
            let type_bits = req.operands[0].type_bits();
            out.push(0x80 | (type_bits << 4) | (number & 0x0F) as u8);
        }
        OpForm::ZeroOp => out.push(0xB0 | (number & 0x0F) as u8),
        OpForm::Var => {
            out.push(0xE0 | opbits);
            let banks = if info.has_double_types() { 2 } else { 1 };
            push_type_bytes(req.operands, banks, &mut out);
        }
        OpForm::Ext => {
            out.push(0xBE);
            out.push((number - 256) as u8);
            push_type_bytes(req.operands, 1, &mut out);
        }
    }

    let mut operand_offsets = Vec::with_capacity(count);
    for operand in req.operands {
        operand_offsets.push(out.len());
        operand.push_value(&mut out);
    }

    let mut store_offset = None;
    if info.store {
        store_offset = Some(out.len());
        out.push(req.store.unwrap_or(0));
    }

    let mut long_branch = false;
    if let Some(branch) = req.branch {
        long_branch = push_branch(branch, req.address, &mut out)?;
    }

    if let Some(text) = req.text {
        out.extend_from_slice(text);
    }

    Ok(Encoded {
        bytes: out,
        operand_offsets,
        store_offset,
        long_branch,
    })
}

fn push_type_bytes(operands: &[Operand], banks: usize, out: &mut Vec<u8>) {
    for bank in 0..banks {
        let mut byte = 0u8;
        for slot in 0..4 {
            let bits = operands
                .get(bank * 4 + slot)
                .map_or(OMITTED, |operand| operand.type_bits());
            byte |= bits << (6 - slot * 2);
        }
        out.push(byte);
    }
}

/// Branch offset as stored: relative to the byte after the branch data, plus two.
pub fn branch_offset(target: u32, after: u32) -> i32 {
    target as i32 - after as i32 + 2
}

fn push_branch(branch: BranchRequest, address: u32, out: &mut Vec<u8>) -> Result<bool, EncodeError> {
    let polarity = if branch.on_true { 0x80 } else { 0x00 };
    let target = match branch.dest {
        BranchDest::Return(value) => {
            out.push(polarity | 0x40 | u8::from(value));
            return Ok(false);
        }
        BranchDest::Address(target) => target,
    };
    let head = address + out.len() as u32;
    let short = branch_offset(target, head + 1);
    if (2..=63).contains(&short) {
        out.push(polarity | 0x40 | short as u8);
        return Ok(false);
    }
    let long = branch_offset(target, head + 2);
    if !(-8192..=8191).contains(&long) {
        return Err(EncodeError::BranchOutOfRange(long));
    }
    if long == 0 || long == 1 {
        return Err(EncodeError::BranchIntoInstruction);
    }
    let bits = (long as u16) & 0x3FFF;
    out.push(polarity | (bits >> 8) as u8);
    out.push((bits & 0xFF) as u8);
    Ok(true)
}

/// Operand word for JUMP at `address`.
pub fn jump_offset(target: u32, address: u32) -> u16 {
    (target as i32 - (address as i32 + 3) + 2) as u16
}
