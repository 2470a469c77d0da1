// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use super::*;

/// Operand slot still waiting for its symbol.
struct PendingOperand {
    slot: usize,
    symbol: String,
    expr: Expr,
    relative_to: Option<u32>,
}

impl<'a> Assembler<'a> {
    pub(crate) fn process_instruction(&mut self, instruction: &Instruction) -> Result<Flow, Fault> {
        let info = match opcodes::select(
            &instruction.opcode,
            instruction.operands.len(),
            self.version,
        ) {
            OpcodeLookup::Found(info) => info,
            OpcodeLookup::WrongVersion => {
                let message = format!("Opcode not available in version {}", self.version.number());
                return Err(Fault::fatal(
                    AsmErrorKind::Instruction,
                    &message,
                    Some(&instruction.opcode),
                ));
            }
            OpcodeLookup::Unknown => {
                return Err(Fault::fatal(
                    AsmErrorKind::Instruction,
                    "Unknown opcode",
                    Some(&instruction.opcode),
                ))
            }
        };

        if instruction.store.is_some() && !info.store {
            return Err(shape_error("does not store a result", info.name));
        }
        match (&instruction.branch, info.branch) {
            (Some(_), false) => return Err(shape_error("does not branch", info.name)),
            (None, true) => return Err(shape_error("requires a branch target", info.name)),
            _ => {}
        }
        match (&instruction.text, info.string) {
            (Some(_), false) => return Err(shape_error("does not take a string", info.name)),
            (None, true) => return Err(shape_error("requires a string", info.name)),
            _ => {}
        }

        let address = self.image.position();
        let mut operands = Vec::with_capacity(instruction.operands.len());
        let mut pending = Vec::new();
        if info.name == "JUMP" && instruction.operands.len() == 1 {
            let (operand, waiting) = self.jump_operand(&instruction.operands[0], address)?;
            operands.push(operand);
            pending.extend(waiting);
        } else {
            for (slot, expr) in instruction.operands.iter().enumerate() {
                let (operand, waiting) = self.resolve_operand(expr, slot)?;
                operands.push(operand);
                pending.extend(waiting);
            }
        }

        let mut store_fixup = None;
        let store = match &instruction.store {
            Some(expr) => Some(self.resolve_store(expr, &mut store_fixup)?),
            None => None,
        };

        let branch = match &instruction.branch {
            Some(branch) => Some(BranchRequest {
                on_true: branch.on_true,
                dest: self.resolve_branch(&branch.target)?,
            }),
            None => None,
        };

        let text = instruction
            .text
            .as_deref()
            .map(|text| self.text_encoder.encode(text));

        let request = EncodeRequest {
            info,
            operands: &operands,
            store,
            branch,
            text: text.as_deref(),
            address,
        };
        let encoded = encoder::encode(&request).map_err(|err| {
            Fault::serious(AsmErrorKind::Instruction, &err.to_string(), None)
        })?;
        self.image.store_slice(&encoded.bytes);

        for waiting in pending {
            let location = address + encoded.operand_offsets[waiting.slot] as u32;
            let target = FixupTarget::Image {
                location,
                width: FixupWidth::Word,
            };
            self.add_fixup(waiting.symbol, waiting.expr, target, waiting.relative_to);
        }
        if let (Some((symbol, expr)), Some(offset)) = (store_fixup, encoded.store_offset) {
            let target = FixupTarget::Image {
                location: address + offset as u32,
                width: FixupWidth::Byte,
            };
            self.add_fixup(symbol, expr, target, None);
        }
        if let Some(literal) = instruction.text.as_deref() {
            self.collect_text(literal);
        }
        Ok(Flow::Continue)
    }

    fn resolve_operand(
        &mut self,
        expr: &Expr,
        slot: usize,
    ) -> Result<(Operand, Option<PendingOperand>), Fault> {
        match self.eval(expr)? {
            Resolved::Known {
                kind: SymbolKind::Variable,
                value,
            } => Ok((Operand::Variable((value & 0xFF) as u8), None)),
            Resolved::Known { value, .. } => {
                if fits_byte(value) && !needs_long(expr, &*self) {
                    Ok((Operand::Byte(value as u8), None))
                } else {
                    Ok((Operand::Word(to_word(value)), None))
                }
            }
            Resolved::Unknown(symbol) => Ok((
                Operand::Word(0),
                Some(PendingOperand {
                    slot,
                    symbol,
                    expr: expr.clone(),
                    relative_to: None,
                }),
            )),
        }
    }

    /// JUMP stores a word offset to a label rather than its address.
    fn jump_operand(
        &mut self,
        expr: &Expr,
        address: u32,
    ) -> Result<(Operand, Option<PendingOperand>), Fault> {
        let Expr::Symbol(name) = expr else {
            return Err(shape_error("target must be a label", "JUMP"));
        };
        match self.eval(expr)? {
            Resolved::Known {
                kind: SymbolKind::Label,
                value,
            } => Ok((
                Operand::Word(encoder::jump_offset(value as u32, address)),
                None,
            )),
            Resolved::Known { .. } => Err(Fault::serious(
                AsmErrorKind::Instruction,
                "JUMP target must be a label",
                Some(name),
            )),
            Resolved::Unknown(symbol) => Ok((
                Operand::Word(0),
                Some(PendingOperand {
                    slot: 0,
                    symbol,
                    expr: expr.clone(),
                    relative_to: Some(address + 1),
                }),
            )),
        }
    }

    fn resolve_store(
        &mut self,
        expr: &Expr,
        fixup: &mut Option<(String, Expr)>,
    ) -> Result<u8, Fault> {
        match self.eval(expr)? {
            Resolved::Known {
                kind: SymbolKind::Variable,
                value,
            } => Ok((value & 0xFF) as u8),
            Resolved::Known { .. } => Err(Fault::serious(
                AsmErrorKind::Instruction,
                "Store target is not a variable",
                None,
            )),
            Resolved::Unknown(symbol) => {
                *fixup = Some((symbol, expr.clone()));
                Ok(0)
            }
        }
    }

    fn resolve_branch(&self, target: &BranchTarget) -> Result<BranchDest, Fault> {
        let name = match target {
            BranchTarget::True => return Ok(BranchDest::Return(true)),
            BranchTarget::False => return Ok(BranchDest::Return(false)),
            BranchTarget::Label(name) => name,
        };
        if self.scope.is_none() {
            return Err(Fault::serious(
                AsmErrorKind::Instruction,
                "Branch outside a routine",
                Some(name),
            ));
        }
        match self.locals.lookup(name) {
            Some(sym) if sym.kind == SymbolKind::Label => Ok(BranchDest::Address(sym.value as u32)),
            _ => Err(Fault::serious(
                AsmErrorKind::Instruction,
                "Branch target is not a label of this routine",
                Some(name),
            )),
        }
    }

    /// Feed literal text to the abbreviation optimizer when it is listening.
    pub(crate) fn collect_text(&mut self, text: &str) {
        if let Some(finder) = self.text.as_mut() {
            finder.add_text(text);
        }
    }
}

fn shape_error(problem: &str, opcode: &str) -> Fault {
    Fault::serious(
        AsmErrorKind::Instruction,
        &format!("{opcode} {problem}"),
        None,
    )
}
