// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use super::*;

/// Most locals a routine header can declare.
const MAX_LOCALS: usize = 15;

impl<'a> Assembler<'a> {
    pub(crate) fn process_directive(&mut self, directive: &Directive) -> Result<Flow, Fault> {
        match directive {
            Directive::New(version) => self.new_directive(version),
            Directive::Funct { name, locals } => self.funct_directive(name, locals),
            Directive::End => {
                self.ended = true;
                Ok(Flow::Continue)
            }
            Directive::Byte(values) => self.data_directive(values, FixupWidth::Byte),
            Directive::Word(values) => self.data_directive(values, FixupWidth::Word),
            Directive::Str(text) => self.str_directive(text, false),
            Directive::Strl(text) => self.str_directive(text, true),
            Directive::Len(text) => self.len_directive(text),
            Directive::Zword(text) => self.zword_directive(text),
            Directive::Gstr { name, text } => self.gstr_directive(name, text),
            Directive::Fstr { name, text } => self.fstr_directive(name, text),
            Directive::Equal { name, value } => self.equal_directive(name, value),
            Directive::Gvar { name, default } => self.gvar_directive(name, default.as_ref()),
            Directive::Table { size } => self.table_directive(size.as_ref()),
            Directive::Endt => self.endt_directive(),
            Directive::Vocbeg {
                record_size,
                key_size,
            } => self.vocbeg_directive(record_size, key_size),
            Directive::Vocend => self.vocend_directive(),
            Directive::Object {
                name,
                flags,
                parent,
                sibling,
                child,
                properties,
            } => self.object_directive(name, flags, [parent, sibling, child], properties),
            Directive::Prop { size, number } => self.prop_directive(size, number),
            Directive::Pdef => self.pdef_directive(),
            Directive::Time => {
                if self.version.number() <= 3 {
                    self.flags1 |= 0x02;
                }
                Ok(Flow::Continue)
            }
            Directive::Sound => {
                self.flags2 |= 0x80;
                Ok(Flow::Continue)
            }
            Directive::Debug(debug) => self.debug_directive(debug),
        }
    }

    fn new_directive(&mut self, expr: &Expr) -> Result<Flow, Fault> {
        let value = self.eval_constant(expr, "Story version")?;
        let Some(version) = u8::try_from(value).ok().and_then(ZVersion::new) else {
            return Err(Fault::serious(
                AsmErrorKind::Directive,
                "Unsupported story version",
                Some(&value.to_string()),
            ));
        };
        if version == self.version {
            return Ok(Flow::Continue);
        }
        if self.tried_versions.contains(&version) {
            let versions = format!("{} and {}", self.version.number(), version.number());
            return Err(Fault::fatal(
                AsmErrorKind::Directive,
                "Conflicting version directives",
                Some(&versions),
            ));
        }
        Ok(Flow::Restart(version))
    }

    fn funct_directive(&mut self, name: &str, locals: &[LocalDecl]) -> Result<Flow, Fault> {
        let index = self.node_index;
        let rewalk = self
            .scope
            .as_ref()
            .is_some_and(|scope| scope.start_index == index);
        if !rewalk {
            let snapshot = self.snapshot();
            self.scope = Some(ReassemblyScope::new(name, index, self.nodes, snapshot));
        }
        self.locals.clear();

        let padding = self
            .packing
            .padding_for(PackedKind::Routine, self.image.position());
        self.image.fill(padding, 0);
        let address = self.image.position();
        let packed = self.packing.pack(PackedKind::Routine, address);
        if packed > 0xFFFF {
            self.warning(packed_overflow(name, packed));
        }
        self.define_global(name, SymbolKind::Function, (packed & 0xFFFF) as i32)?;

        let mut count = locals.len();
        if count > MAX_LOCALS {
            let declared = count.to_string();
            self.report_serious(AsmError::new(
                AsmErrorKind::Directive,
                "Routines may declare at most 15 locals, found",
                Some(&declared),
            ))?;
            count = MAX_LOCALS;
        }
        let locals = &locals[..count];
        self.image.store(count as u8);
        for (slot, local) in locals.iter().enumerate() {
            self.locals
                .set(&local.name, SymbolKind::Variable, slot as i32 + 1);
        }
        if self.version.has_local_defaults() {
            for local in locals {
                match &local.default {
                    Some(default) => self.write_value(default, FixupWidth::Word)?,
                    None => self.image.store_word(0),
                }
            }
        } else if locals.iter().any(|local| local.default.is_some()) {
            let message = format!(
                "Local defaults are ignored in version {}",
                self.version.number()
            );
            self.warning(AsmError::new(AsmErrorKind::Directive, &message, Some(name)));
        }

        let guesses: Vec<(String, i32)> = match self.scope.as_ref() {
            Some(scope) => scope
                .local_labels()
                .iter()
                .map(|label| (label.clone(), scope.guess_for(label, address as i32)))
                .collect(),
            None => Vec::new(),
        };
        for (label, guess) in guesses {
            self.locals.predeclare(&label, guess);
        }
        Ok(Flow::Continue)
    }

    fn debug_directive(&mut self, debug: &DebugDirective) -> Result<Flow, Fault> {
        if self.mode != PassMode::Assembling {
            return Ok(Flow::Continue);
        }
        let pc = self.image.position();
        let record = match debug {
            DebugDirective::File {
                number,
                include_name,
                actual_name,
            } => DebugRecord::File {
                number: *number,
                include_name: include_name.clone(),
                actual_name: actual_name.clone(),
            },
            DebugDirective::Line { file, line, column } => DebugRecord::Line {
                file: *file,
                line: *line,
                column: *column,
                pc,
            },
            DebugDirective::Routine {
                file,
                line,
                column,
                name,
                locals,
            } => DebugRecord::RoutineStart {
                file: *file,
                line: *line,
                column: *column,
                pc,
                name: name.clone(),
                locals: locals.clone(),
            },
            DebugDirective::RoutineEnd { file, line, column } => DebugRecord::RoutineEnd {
                file: *file,
                line: *line,
                column: *column,
                pc,
            },
            DebugDirective::Named {
                table,
                number,
                name,
            } => {
                let number = self.eval_constant(number, "Debug record number")?;
                DebugRecord::Named {
                    table: *table,
                    number,
                    name: name.clone(),
                }
            }
        };
        self.debug_records.push(record);
        Ok(Flow::Continue)
    }
}

pub(crate) fn packed_overflow(name: &str, packed: u32) -> AsmError {
    let message = format!("Packed address {packed:#x} does not fit in 16 bits");
    AsmError::new(AsmErrorKind::Layout, &message, Some(name))
}
