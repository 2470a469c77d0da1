// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use super::*;

impl<'a> Assembler<'a> {
    pub(crate) fn table_directive(&mut self, size: Option<&Expr>) -> Result<Flow, Fault> {
        if let Some(open) = self.table {
            let start = format!("{:#x}", open.start);
            return Err(Fault::serious(
                AsmErrorKind::Directive,
                "Nested .TABLE; the open table starts at",
                Some(&start),
            ));
        }
        let size = match size {
            Some(expr) => self.eval_layout_value(expr)?.map(|size| size.max(0) as u32),
            None => None,
        };
        self.table = Some(TableState {
            start: self.image.position(),
            size,
        });
        Ok(Flow::Continue)
    }

    pub(crate) fn endt_directive(&mut self) -> Result<Flow, Fault> {
        let Some(table) = self.table.take() else {
            return Err(Fault::serious(
                AsmErrorKind::Directive,
                ".ENDT without .TABLE",
                None,
            ));
        };
        if let Err(actual) = table.check_end(self.image.position()) {
            let declared = table.size.unwrap_or_default();
            let message = format!("Table size mismatch: declared {declared}, actual {actual}");
            let start = format!("{:#x}", table.start);
            return Err(Fault::serious(
                AsmErrorKind::Directive,
                &message,
                Some(&start),
            ));
        }
        Ok(Flow::Continue)
    }

    pub(crate) fn vocbeg_directive(&mut self, record_size: &Expr, key_size: &Expr) -> Result<Flow, Fault> {
        if self.vocab.is_some() {
            return Err(Fault::serious(
                AsmErrorKind::Directive,
                "Nested .VOCBEG",
                None,
            ));
        }
        let record_size = self.eval_constant(record_size, "Vocabulary record size")?;
        let key_size = self.eval_constant(key_size, "Vocabulary key size")?;
        if record_size <= 0 || key_size <= 0 || key_size > record_size {
            let sizes = format!("record {record_size}, key {key_size}");
            return Err(Fault::serious(
                AsmErrorKind::Directive,
                "Invalid vocabulary sizes",
                Some(&sizes),
            ));
        }
        self.vocab = Some(VocabState {
            block: VocabBlock::new(
                record_size as u32,
                key_size as u32,
                self.image.position(),
            ),
            fixup_start: self.fixups.len(),
            previous: Vec::new(),
            deferred: Vec::new(),
        });
        Ok(Flow::Continue)
    }

    /// Sort the block's records, then move its labels and values with them.
    pub(crate) fn vocend_directive(&mut self) -> Result<Flow, Fault> {
        let Some(vocab) = self.vocab.take() else {
            return Err(Fault::serious(
                AsmErrorKind::Directive,
                ".VOCEND without .VOCBEG",
                None,
            ));
        };
        let block = &vocab.block;
        let start = block.start;
        let end = self.image.position();
        let length = end.saturating_sub(start);
        if length % block.record_size != 0 {
            let message = format!(
                "Vocabulary block of {length} bytes is not a whole number of {}-byte records",
                block.record_size
            );
            self.warning(AsmError::new(AsmErrorKind::Directive, &message, None));
        }
        let bytes = self.image.read_slice(start, length);
        let (sorted, order) = sort_records(
            &bytes,
            block.record_size as usize,
            block.key_size as usize,
        );
        self.image.patch_slice(start, &sorted);
        debug!(
            "sorted {} vocabulary records at {start:#x}",
            order.len()
        );

        for ((name, position), previous) in block.labels.iter().zip(&vocab.previous) {
            let moved = block.relocate(*position, &order);
            self.globals.relocate(name, moved as i32);
            if let Some(old) = previous {
                self.note_global_change(name, *old)?;
            }
        }

        let pending = self.fixups.split_off(vocab.fixup_start.min(self.fixups.len()));
        for mut fixup in pending {
            if let FixupTarget::Image { location, width } = fixup.target {
                if (start..end).contains(&location) {
                    fixup.target = FixupTarget::Image {
                        location: block.relocate(location, &order),
                        width,
                    };
                }
            }
            if !self.apply_fixup(&fixup)? {
                self.fixups.push(fixup);
            }
        }

        for (name, old) in &vocab.deferred {
            self.note_global_change(name, *old)?;
        }
        Ok(Flow::Continue)
    }

    /// Pad to the routine packing boundary.
    pub(crate) fn pdef_directive(&mut self) -> Result<Flow, Fault> {
        let divisor = self.version.packing_divisor();
        let position = self.image.position();
        self.image.fill((divisor - position % divisor) % divisor, 0);
        Ok(Flow::Continue)
    }
}
