// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use super::*;

/// Global variables are numbered from 16 up to 255.
const FIRST_GLOBAL: i32 = 16;
const MAX_GLOBALS: u16 = 240;

impl<'a> Assembler<'a> {
    pub(crate) fn data_directive(&mut self, values: &[Expr], width: FixupWidth) -> Result<Flow, Fault> {
        for value in values {
            self.write_value(value, width)?;
        }
        Ok(Flow::Continue)
    }

    pub(crate) fn str_directive(&mut self, text: &str, with_length: bool) -> Result<Flow, Fault> {
        let encoded = self.text_encoder.encode(text);
        if with_length {
            self.image.store(word_count(&encoded)?);
        }
        self.image.store_slice(&encoded);
        self.collect_text(text);
        Ok(Flow::Continue)
    }

    pub(crate) fn len_directive(&mut self, text: &str) -> Result<Flow, Fault> {
        let encoded = self.text_encoder.encode(text);
        self.image.store(word_count(&encoded)?);
        Ok(Flow::Continue)
    }

    pub(crate) fn zword_directive(&mut self, text: &str) -> Result<Flow, Fault> {
        let key = self.text_encoder.dictionary_key(text);
        self.image.store_slice(&key);
        Ok(Flow::Continue)
    }

    pub(crate) fn gstr_directive(&mut self, name: &str, text: &str) -> Result<Flow, Fault> {
        let padding = self
            .packing
            .padding_for(PackedKind::String, self.image.position());
        self.image.fill(padding, 0);
        let packed = self
            .packing
            .pack(PackedKind::String, self.image.position());
        if packed > 0xFFFF {
            self.warning(node_directives::packed_overflow(name, packed));
        }
        self.define_global(name, SymbolKind::String, (packed & 0xFFFF) as i32)?;
        let encoded = self.text_encoder.encode(text);
        self.image.store_slice(&encoded);
        self.collect_text(text);
        Ok(Flow::Continue)
    }

    /// Frequent string: an abbreviation body, addressed by word.
    pub(crate) fn fstr_directive(&mut self, name: &str, text: &str) -> Result<Flow, Fault> {
        match self.text_encoder.register_abbreviation(text) {
            Ok(_) => {}
            Err(TextEncodingError::TooManyAbbreviations { version, limit }) => {
                let message = format!(
                    "Version {} allows at most {limit} abbreviations",
                    version.number()
                );
                return Err(Fault::serious(AsmErrorKind::Directive, &message, Some(name)));
            }
            Err(TextEncodingError::EmptyAbbreviation) => {
                return Err(Fault::serious(
                    AsmErrorKind::Directive,
                    "Abbreviation text is empty",
                    Some(name),
                ))
            }
        }
        if self.image.position() % 2 != 0 {
            self.image.store(0);
        }
        let address = self.image.position();
        self.define_global(name, SymbolKind::Constant, (address / 2) as i32)?;
        let encoded = self.text_encoder.encode_plain(text);
        self.image.store_slice(&encoded);
        Ok(Flow::Continue)
    }

    pub(crate) fn equal_directive(&mut self, name: &str, value: &Expr) -> Result<Flow, Fault> {
        match self.eval(value)? {
            Resolved::Known { kind, value: known } => {
                let kind = match value {
                    Expr::Symbol(_) => kind,
                    _ => SymbolKind::Constant,
                };
                self.define_global(name, kind, known)?;
            }
            Resolved::Unknown(symbol) => {
                self.add_fixup(symbol, value.clone(), FixupTarget::Dependency, None);
                self.globals.insert_unknown(name);
            }
        }
        Ok(Flow::Continue)
    }

    pub(crate) fn gvar_directive(&mut self, name: &str, default: Option<&Expr>) -> Result<Flow, Fault> {
        if self.global_vars >= MAX_GLOBALS {
            return Err(Fault::serious(
                AsmErrorKind::Directive,
                "Too many global variables",
                Some(name),
            ));
        }
        let number = FIRST_GLOBAL + i32::from(self.global_vars);
        self.global_vars += 1;
        self.define_global(name, SymbolKind::Variable, number)?;
        match default {
            Some(expr) => self.write_value(expr, FixupWidth::Word)?,
            None => self.image.store_word(0),
        }
        Ok(Flow::Continue)
    }

    pub(crate) fn object_directive(
        &mut self,
        name: &str,
        flags: &[Expr],
        links: [&Expr; 3],
        properties: &Expr,
    ) -> Result<Flow, Fault> {
        let small = self.version.has_small_objects();
        let (flag_words, max_objects, link_width) = if small {
            (2, 255, FixupWidth::Byte)
        } else {
            (3, u16::MAX, FixupWidth::Word)
        };
        if flags.len() > flag_words {
            let message = format!(
                "Objects in version {} have {flag_words} flag words",
                self.version.number()
            );
            return Err(Fault::serious(AsmErrorKind::Directive, &message, Some(name)));
        }
        if self.objects >= max_objects {
            return Err(Fault::serious(
                AsmErrorKind::Directive,
                "Too many objects",
                Some(name),
            ));
        }
        self.objects += 1;
        self.define_global(name, SymbolKind::Object, i32::from(self.objects))?;
        for flag in flags {
            self.write_value(flag, FixupWidth::Word)?;
        }
        for _ in flags.len()..flag_words {
            self.image.store_word(0);
        }
        for link in links {
            self.write_value(link, link_width)?;
        }
        self.write_value(properties, FixupWidth::Word)?;
        Ok(Flow::Continue)
    }

    /// Property header: one byte in versions 1-3, one or two bytes after.
    pub(crate) fn prop_directive(&mut self, size: &Expr, number: &Expr) -> Result<Flow, Fault> {
        let size = self.eval_constant(size, "Property size")?;
        let number = self.eval_constant(number, "Property number")?;
        let (max_size, max_number) = if self.version.has_small_objects() {
            (8, 31)
        } else {
            (64, 63)
        };
        if !(1..=max_size).contains(&size) {
            return Err(Fault::serious(
                AsmErrorKind::Directive,
                "Property size out of range",
                Some(&size.to_string()),
            ));
        }
        if !(1..=max_number).contains(&number) {
            return Err(Fault::serious(
                AsmErrorKind::Directive,
                "Property number out of range",
                Some(&number.to_string()),
            ));
        }
        let (size, number) = (size as u8, number as u8);
        if self.version.has_small_objects() {
            self.image.store(32 * (size - 1) + number);
        } else if size <= 2 {
            let long = if size == 2 { 0x40 } else { 0 };
            self.image.store(number | long);
        } else {
            self.image.store(0x80 | number);
            self.image.store(0x80 | (size & 0x3F));
        }
        Ok(Flow::Continue)
    }
}

/// Length byte for an encoded Z-string.
fn word_count(encoded: &[u8]) -> Result<u8, Fault> {
    u8::try_from(encoded.len() / 2).map_err(|_| {
        Fault::serious(
            AsmErrorKind::Directive,
            "String is too long for a length byte",
            None,
        )
    })
}
