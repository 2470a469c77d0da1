// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Intermediate representation handed over by the ZAP parser.
//!
//! Nodes are read-only for the assembler. The serde representation is the
//! JSON hand-off format accepted by the command-line tool.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a node came from in the original source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.file.is_empty() {
            write!(f, "line {}", self.line)
        } else {
            write!(f, "{}:{}", self.file, self.line)
        }
    }
}

/// Symbolic operand or directive argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Number(i32),
    Symbol(String),
    /// `'NAME`: the variable number of `NAME`, passed as a constant.
    Quote(String),
    Add(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn num(value: i32) -> Self {
        Expr::Number(value)
    }

    pub fn sym(name: impl Into<String>) -> Self {
        Expr::Symbol(name.into())
    }

    pub fn quote(name: impl Into<String>) -> Self {
        Expr::Quote(name.into())
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Self {
        Expr::Add(Box::new(lhs), Box::new(rhs))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchTarget {
    True,
    False,
    Label(String),
}

/// Branch suffix: `/L` branches when the condition holds, `\L` when it fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    #[serde(default = "default_on_true")]
    pub on_true: bool,
    pub target: BranchTarget,
}

fn default_on_true() -> bool {
    true
}

impl Branch {
    pub fn to_label(name: impl Into<String>) -> Self {
        Self {
            on_true: true,
            target: BranchTarget::Label(name.into()),
        }
    }

    pub fn unless_label(name: impl Into<String>) -> Self {
        Self {
            on_true: false,
            target: BranchTarget::Label(name.into()),
        }
    }

    pub fn returning(value: bool) -> Self {
        Self {
            on_true: true,
            target: if value {
                BranchTarget::True
            } else {
                BranchTarget::False
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: String,
    #[serde(default)]
    pub operands: Vec<Expr>,
    #[serde(default)]
    pub store: Option<Expr>,
    #[serde(default)]
    pub branch: Option<Branch>,
    /// Inline literal for PRINTI/PRINTR.
    #[serde(default)]
    pub text: Option<String>,
}

impl Instruction {
    pub fn new(opcode: impl Into<String>) -> Self {
        Self {
            opcode: opcode.into(),
            operands: Vec::new(),
            store: None,
            branch: None,
            text: None,
        }
    }

    pub fn operands(mut self, operands: impl IntoIterator<Item = Expr>) -> Self {
        self.operands = operands.into_iter().collect();
        self
    }

    pub fn store(mut self, target: Expr) -> Self {
        self.store = Some(target);
        self
    }

    pub fn branch(mut self, branch: Branch) -> Self {
        self.branch = Some(branch);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDecl {
    pub name: String,
    #[serde(default)]
    pub default: Option<Expr>,
}

impl LocalDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    pub fn with_default(name: impl Into<String>, default: Expr) -> Self {
        Self {
            name: name.into(),
            default: Some(default),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugTable {
    Action,
    Attribute,
    Property,
    Global,
    Array,
    Object,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugDirective {
    File {
        number: u16,
        include_name: String,
        actual_name: String,
    },
    Line {
        file: u16,
        line: u32,
        column: u32,
    },
    Routine {
        file: u16,
        line: u32,
        column: u32,
        name: String,
        #[serde(default)]
        locals: Vec<String>,
    },
    RoutineEnd {
        file: u16,
        line: u32,
        column: u32,
    },
    Named {
        table: DebugTable,
        number: Expr,
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Directive {
    New(Expr),
    Funct {
        name: String,
        #[serde(default)]
        locals: Vec<LocalDecl>,
    },
    End,
    Byte(Vec<Expr>),
    Word(Vec<Expr>),
    Str(String),
    Strl(String),
    Len(String),
    Zword(String),
    Gstr {
        name: String,
        text: String,
    },
    Fstr {
        name: String,
        text: String,
    },
    Equal {
        name: String,
        value: Expr,
    },
    Gvar {
        name: String,
        #[serde(default)]
        default: Option<Expr>,
    },
    Table {
        #[serde(default)]
        size: Option<Expr>,
    },
    Endt,
    Vocbeg {
        record_size: Expr,
        key_size: Expr,
    },
    Vocend,
    Object {
        name: String,
        flags: Vec<Expr>,
        parent: Expr,
        sibling: Expr,
        child: Expr,
        properties: Expr,
    },
    Prop {
        size: Expr,
        number: Expr,
    },
    Pdef,
    Time,
    Sound,
    Debug(DebugDirective),
}

impl Directive {
    pub fn name(&self) -> &'static str {
        match self {
            Directive::New(_) => ".NEW",
            Directive::Funct { .. } => ".FUNCT",
            Directive::End => ".END",
            Directive::Byte(_) => ".BYTE",
            Directive::Word(_) => ".WORD",
            Directive::Str(_) => ".STR",
            Directive::Strl(_) => ".STRL",
            Directive::Len(_) => ".LEN",
            Directive::Zword(_) => ".ZWORD",
            Directive::Gstr { .. } => ".GSTR",
            Directive::Fstr { .. } => ".FSTR",
            Directive::Equal { .. } => ".EQUAL",
            Directive::Gvar { .. } => ".GVAR",
            Directive::Table { .. } => ".TABLE",
            Directive::Endt => ".ENDT",
            Directive::Vocbeg { .. } => ".VOCBEG",
            Directive::Vocend => ".VOCEND",
            Directive::Object { .. } => ".OBJECT",
            Directive::Prop { .. } => ".PROP",
            Directive::Pdef => ".PDEF",
            Directive::Time => ".TIME",
            Directive::Sound => ".SOUND",
            Directive::Debug(_) => ".DEBUG",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Directive(Directive),
    Instruction(Instruction),
    GlobalLabel(String),
    LocalLabel(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    #[serde(default)]
    pub location: SourceLocation,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            location: SourceLocation::default(),
        }
    }

    pub fn directive(directive: Directive) -> Self {
        Self::new(NodeKind::Directive(directive))
    }

    pub fn instruction(instruction: Instruction) -> Self {
        Self::new(NodeKind::Instruction(instruction))
    }

    pub fn global_label(name: impl Into<String>) -> Self {
        Self::new(NodeKind::GlobalLabel(name.into()))
    }

    pub fn local_label(name: impl Into<String>) -> Self {
        Self::new(NodeKind::LocalLabel(name.into()))
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }

    /// True for nodes that close the routine currently being assembled.
    pub fn ends_routine(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Directive(Directive::Funct { .. }) | NodeKind::Directive(Directive::End)
        )
    }
}

/// Parse a JSON array of nodes.
pub fn nodes_from_json(text: &str) -> Result<Vec<Node>, serde_json::Error> {
    serde_json::from_str(text)
}
