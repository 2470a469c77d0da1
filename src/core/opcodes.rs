// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Opcode table.
//!
//! Numbers follow the operand-count ranges of the instruction set: 1..=31 are
//! 2OP, 128..=143 are 1OP, 176..=191 are 0OP, 224..=255 are VAR and 256 and
//! up are EXT (`number - 256` is the extended opcode byte).

use crate::core::version::ZVersion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpForm {
    TwoOp,
    OneOp,
    ZeroOp,
    Var,
    Ext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub name: &'static str,
    pub number: u16,
    pub min_version: u8,
    pub max_version: u8,
    pub min_operands: u8,
    pub max_operands: u8,
    pub store: bool,
    pub branch: bool,
    /// Followed by an inline Z-string.
    pub string: bool,
    /// Replacement used when more than four operands are given.
    pub extra: Option<&'static str>,
}

impl OpcodeInfo {
    pub fn form(&self) -> OpForm {
        match self.number {
            0..=31 => OpForm::TwoOp,
            128..=143 => OpForm::OneOp,
            176..=191 => OpForm::ZeroOp,
            224..=255 => OpForm::Var,
            _ => OpForm::Ext,
        }
    }

    /// XCALL and IXCALL carry two operand-type bytes.
    pub fn has_double_types(&self) -> bool {
        self.max_operands > 4
    }

    pub fn available_in(&self, version: ZVersion) -> bool {
        (self.min_version..=self.max_version).contains(&version.number())
    }
}

const fn op(name: &'static str, number: u16, operands: (u8, u8)) -> OpcodeInfo {
    OpcodeInfo {
        name,
        number,
        min_version: 1,
        max_version: 8,
        min_operands: operands.0,
        max_operands: operands.1,
        store: false,
        branch: false,
        string: false,
        extra: None,
    }
}

impl OpcodeInfo {
    const fn versions(mut self, min: u8, max: u8) -> Self {
        self.min_version = min;
        self.max_version = max;
        self
    }

    const fn st(mut self) -> Self {
        self.store = true;
        self
    }

    const fn br(mut self) -> Self {
        self.branch = true;
        self
    }

    const fn text(mut self) -> Self {
        self.string = true;
        self
    }

    const fn extra(mut self, name: &'static str) -> Self {
        self.extra = Some(name);
        self
    }
}

const TWO: (u8, u8) = (2, 2);
const ONE: (u8, u8) = (1, 1);
const NONE: (u8, u8) = (0, 0);

pub static OPCODES: &[OpcodeInfo] = &[
    // 2OP
    op("EQUAL?", 1, (2, 4)).br(),
    op("LESS?", 2, TWO).br(),
    op("GRTR?", 3, TWO).br(),
    op("DLESS?", 4, TWO).br(),
    op("IGRTR?", 5, TWO).br(),
    op("IN?", 6, TWO).br(),
    op("BTST", 7, TWO).br(),
    op("BOR", 8, TWO).st(),
    op("BAND", 9, TWO).st(),
    op("FSET?", 10, TWO).br(),
    op("FSET", 11, TWO),
    op("FCLEAR", 12, TWO),
    op("SET", 13, TWO),
    op("MOVE", 14, TWO),
    op("GET", 15, TWO).st(),
    op("GETB", 16, TWO).st(),
    op("GETP", 17, TWO).st(),
    op("GETPT", 18, TWO).st(),
    op("NEXTP", 19, TWO).st(),
    op("ADD", 20, TWO).st(),
    op("SUB", 21, TWO).st(),
    op("MUL", 22, TWO).st(),
    op("DIV", 23, TWO).st(),
    op("MOD", 24, TWO).st(),
    op("CALL2", 25, TWO).st().versions(4, 8),
    op("ICALL2", 26, TWO).versions(5, 8),
    op("COLOR", 27, (2, 3)).versions(5, 8),
    op("THROW", 28, TWO).versions(5, 8),
    // 1OP
    op("ZERO?", 128, ONE).br(),
    op("NEXT?", 129, ONE).st().br(),
    op("FIRST?", 130, ONE).st().br(),
    op("LOC", 131, ONE).st(),
    op("PTSIZE", 132, ONE).st(),
    op("INC", 133, ONE),
    op("DEC", 134, ONE),
    op("PRINTB", 135, ONE),
    op("CALL1", 136, ONE).st().versions(4, 8),
    op("REMOVE", 137, ONE),
    op("PRINTD", 138, ONE),
    op("RETURN", 139, ONE),
    op("JUMP", 140, ONE),
    op("PRINT", 141, ONE),
    op("VALUE", 142, ONE).st(),
    op("BCOM", 143, ONE).st().versions(1, 4),
    op("ICALL1", 143, ONE).versions(5, 8),
    // 0OP
    op("RTRUE", 176, NONE),
    op("RFALSE", 177, NONE),
    op("PRINTI", 178, NONE).text(),
    op("PRINTR", 179, NONE).text(),
    op("NOOP", 180, NONE),
    op("SAVE", 181, NONE).br().versions(1, 3),
    op("SAVE", 181, NONE).st().versions(4, 4),
    op("RESTORE", 182, NONE).br().versions(1, 3),
    op("RESTORE", 182, NONE).st().versions(4, 4),
    op("RESTART", 183, NONE),
    op("RSTACK", 184, NONE),
    op("FSTACK", 185, NONE).versions(1, 4),
    op("CATCH", 185, NONE).st().versions(5, 8),
    op("QUIT", 186, NONE),
    op("CRLF", 187, NONE),
    op("USL", 188, NONE).versions(1, 3),
    op("VERIFY", 189, NONE).br().versions(3, 8),
    op("ORIGINAL?", 191, NONE).br().versions(5, 8),
    // VAR
    op("CALL", 224, (1, 4)).st().extra("XCALL"),
    op("PUT", 225, (3, 3)),
    op("PUTB", 226, (3, 3)),
    op("PUTP", 227, (3, 3)),
    op("READ", 228, (1, 4)).versions(1, 4),
    op("READ", 228, (1, 4)).st().versions(5, 8),
    op("PRINTC", 229, ONE),
    op("PRINTN", 230, ONE),
    op("RANDOM", 231, ONE).st(),
    op("PUSH", 232, ONE),
    op("POP", 233, (0, 1)).versions(1, 5),
    op("POP", 233, (0, 1)).st().versions(6, 6),
    op("POP", 233, (0, 1)).versions(7, 8),
    op("SPLIT", 234, ONE).versions(3, 8),
    op("SCREEN", 235, ONE).versions(3, 8),
    op("XCALL", 236, (1, 8)).st().versions(4, 8),
    op("CLEAR", 237, ONE).versions(4, 8),
    op("ERASE", 238, ONE).versions(4, 8),
    op("CURSET", 239, (1, 3)).versions(4, 8),
    op("CURGET", 240, ONE).versions(4, 8),
    op("HLIGHT", 241, ONE).versions(4, 8),
    op("BUFOUT", 242, ONE).versions(4, 8),
    op("DIROUT", 243, (1, 4)).versions(3, 8),
    op("DIRIN", 244, ONE).versions(3, 8),
    op("SOUND", 245, (1, 4)).versions(3, 8),
    op("INPUT", 246, (1, 3)).st().versions(4, 8),
    op("INTBL?", 247, (3, 4)).st().br().versions(4, 8),
    op("BCOM", 248, ONE).st().versions(5, 8),
    op("ICALL", 249, (1, 4)).versions(5, 8).extra("IXCALL"),
    op("IXCALL", 250, (1, 8)).versions(5, 8),
    op("LEX", 251, (2, 4)).versions(5, 8),
    op("ZWSTR", 252, (4, 4)).versions(5, 8),
    op("COPYT", 253, (3, 3)).versions(5, 8),
    op("PRINTT", 254, (2, 4)).versions(5, 8),
    op("ASSIGNED?", 255, ONE).br().versions(5, 8),
    // EXT
    op("SAVE", 256, (0, 4)).st().versions(5, 8),
    op("RESTORE", 257, (0, 4)).st().versions(5, 8),
    op("SHIFT", 258, TWO).st().versions(5, 8),
    op("ASHIFT", 259, TWO).st().versions(5, 8),
    op("FONT", 260, (1, 2)).st().versions(5, 8),
    op("DISPLAY", 261, (1, 3)).versions(6, 6),
    op("PICINF", 262, TWO).br().versions(6, 6),
    op("DCLEAR", 263, (1, 3)).versions(6, 6),
    op("MARGIN", 264, (2, 3)).versions(6, 6),
    op("ISAVE", 265, NONE).st().versions(5, 8),
    op("IRESTORE", 266, NONE).st().versions(5, 8),
    op("PRINTU", 267, ONE).versions(5, 8),
    op("CHECKU", 268, ONE).st().versions(5, 8),
    op("WINPOS", 272, (3, 3)).versions(6, 6),
    op("WINSIZE", 273, (3, 3)).versions(6, 6),
    op("WINATTR", 274, (2, 3)).versions(6, 6),
    op("WINGET", 275, TWO).st().versions(6, 6),
    op("SCROLL", 276, TWO).versions(6, 6),
    op("FSTACK", 277, (1, 2)).versions(6, 6),
    op("MOUSE-INFO", 278, ONE).versions(6, 6),
    op("MOUSE-LIMIT", 279, (0, 1)).versions(6, 6),
    op("XPUSH", 280, TWO).br().versions(6, 6),
    op("WINPUT", 281, (3, 3)).versions(6, 6),
    op("PRINTF", 282, ONE).versions(6, 6),
    op("MENU", 283, TWO).br().versions(6, 6),
    op("PICSET", 284, ONE).versions(6, 6),
];

/// Outcome of looking an opcode up for a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeLookup {
    Found(&'static OpcodeInfo),
    /// Known name, but not in this version.
    WrongVersion,
    Unknown,
}

pub fn lookup(name: &str, version: ZVersion) -> OpcodeLookup {
    let upper = name.to_ascii_uppercase();
    let mut known = false;
    for info in OPCODES.iter().filter(|info| info.name == upper) {
        known = true;
        if info.available_in(version) {
            return OpcodeLookup::Found(info);
        }
    }
    if known {
        OpcodeLookup::WrongVersion
    } else {
        OpcodeLookup::Unknown
    }
}

/// Resolve an opcode for `operand_count` operands, switching to the
/// extra-operand variant when one exists.
pub fn select(name: &str, operand_count: usize, version: ZVersion) -> OpcodeLookup {
    match lookup(name, version) {
        OpcodeLookup::Found(info) if operand_count > 4 => match info.extra {
            Some(extra) => lookup(extra, version),
            None => OpcodeLookup::Found(info),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(number: u8) -> ZVersion {
        ZVersion::new(number).expect("valid version")
    }

    #[test]
    fn lookup_is_version_aware() {
        let OpcodeLookup::Found(save3) = lookup("SAVE", v(3)) else {
            panic!("SAVE exists in v3");
        };
        assert!(save3.branch && !save3.store);
        let OpcodeLookup::Found(save5) = lookup("save", v(5)) else {
            panic!("SAVE exists in v5");
        };
        assert_eq!(save5.form(), OpForm::Ext);
        assert_eq!(lookup("CALL2", v(3)), OpcodeLookup::WrongVersion);
        assert_eq!(lookup("FROB", v(3)), OpcodeLookup::Unknown);
    }

    #[test]
    fn opcode_143_changes_meaning_in_v5() {
        assert!(matches!(lookup("BCOM", v(3)), OpcodeLookup::Found(info) if info.number == 143));
        assert!(matches!(lookup("BCOM", v(5)), OpcodeLookup::Found(info) if info.number == 248));
        assert_eq!(lookup("ICALL1", v(4)), OpcodeLookup::WrongVersion);
    }

    #[test]
    fn extra_operand_variants() {
        let OpcodeLookup::Found(call) = select("CALL", 6, v(5)) else {
            panic!("XCALL exists in v5");
        };
        assert_eq!(call.name, "XCALL");
        assert!(call.has_double_types());
        assert!(matches!(select("CALL", 3, v(5)), OpcodeLookup::Found(info) if info.name == "CALL"));
        assert_eq!(select("CALL", 5, v(3)), OpcodeLookup::WrongVersion);
        assert!(matches!(select("ICALL", 7, v(5)), OpcodeLookup::Found(info) if info.name == "IXCALL"));
    }

    #[test]
    fn forms_follow_number_ranges() {
        let form_of = |name: &str| match lookup(name, v(5)) {
            OpcodeLookup::Found(info) => info.form(),
            other => panic!("{name}: {other:?}"),
        };
        assert_eq!(form_of("ADD"), OpForm::TwoOp);
        assert_eq!(form_of("JUMP"), OpForm::OneOp);
        assert_eq!(form_of("PRINTI"), OpForm::ZeroOp);
        assert_eq!(form_of("PUTP"), OpForm::Var);
        assert_eq!(form_of("SHIFT"), OpForm::Ext);
    }

    #[test]
    fn every_version_has_no_duplicate_names() {
        for version in (1..=8).filter_map(ZVersion::new) {
            let mut names: Vec<&str> = OPCODES
                .iter()
                .filter(|info| info.available_in(version))
                .map(|info| info.name)
                .collect();
            let total = names.len();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), total, "duplicate opcode in v{version}");
        }
    }
}
