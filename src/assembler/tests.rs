// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use super::{assemble, output::checksum, AssemblerOptions, Severity};
use crate::core::assembler::error::{AsmRunError, AsmRunReport};
use crate::core::debug_info::{DebugLog, DebugRecord, NullDebugSink};
use crate::core::ir::{
    Branch, DebugDirective, DebugTable, Directive, Expr, Instruction, LocalDecl, Node,
    SourceLocation,
};
use crate::core::text_encoding::ZTextEncoder;
use crate::core::version::ZVersion;

fn v(number: u8) -> ZVersion {
    ZVersion::new(number).expect("valid version")
}

fn options(version: u8) -> AssemblerOptions {
    AssemblerOptions {
        version: v(version),
        serial: Some("000000".to_string()),
        ..AssemblerOptions::default()
    }
}

fn run(nodes: &[Node], options: &AssemblerOptions) -> Result<AsmRunReport, AsmRunError> {
    assemble(nodes, options, &mut NullDebugSink)
}

fn run_ok(nodes: &[Node], version: u8) -> AsmRunReport {
    match run(nodes, &options(version)) {
        Ok(report) => report,
        Err(err) => panic!("assembly failed: {err}: {:?}", err.diagnostics()),
    }
}

fn funct(name: &str, locals: &[&str]) -> Node {
    Node::directive(Directive::Funct {
        name: name.to_string(),
        locals: locals.iter().map(|&local| LocalDecl::new(local)).collect(),
    })
}

fn op(instruction: Instruction) -> Node {
    Node::instruction(instruction)
}

fn words(values: &[Expr]) -> Node {
    Node::directive(Directive::Word(values.to_vec()))
}

fn bytes(values: &[i32]) -> Node {
    Node::directive(Directive::Byte(values.iter().map(|&b| Expr::num(b)).collect()))
}

fn word_at(story: &[u8], addr: usize) -> u16 {
    u16::from_be_bytes([story[addr], story[addr + 1]])
}

#[test]
fn forward_global_reference_takes_one_extra_measuring_pass() {
    let nodes = vec![
        words(&[Expr::sym("FWD")]),
        Node::global_label("FWD"),
        words(&[Expr::num(0)]),
    ];
    let report = run_ok(&nodes, 3);
    assert_eq!(report.counts().measuring_passes, 2);
    assert_eq!(word_at(report.story(), 0x40), 0x42);
}

#[test]
fn backward_references_settle_in_one_measuring_pass() {
    let nodes = vec![
        Node::global_label("HERE"),
        words(&[Expr::sym("HERE"), Expr::add(Expr::sym("HERE"), Expr::num(2))]),
    ];
    let report = run_ok(&nodes, 3);
    assert_eq!(report.counts().measuring_passes, 1);
    assert_eq!(word_at(report.story(), 0x40), 0x40);
    assert_eq!(word_at(report.story(), 0x42), 0x42);
}

#[test]
fn undefined_symbol_is_fatal_in_final_pass() {
    let nodes = vec![words(&[Expr::sym("NOPE")]).at(SourceLocation::new("game.zap", 4))];
    let err = run(&nodes, &options(3)).expect_err("undefined symbol");
    assert_eq!(err.to_string(), "Undefined symbol: NOPE");
    let diag = err.first_error().expect("fatal diagnostic");
    assert_eq!(diag.severity(), Severity::Fatal);
    assert_eq!(diag.location(), Some(&SourceLocation::new("game.zap", 4)));
}

#[test]
fn unknown_opcode_is_fatal() {
    let nodes = vec![funct("GO", &[]), op(Instruction::new("FROB"))];
    let err = run(&nodes, &options(3)).expect_err("unknown opcode");
    assert_eq!(err.to_string(), "Unknown opcode: FROB");
}

#[test]
fn opcode_from_a_later_version_is_fatal() {
    let nodes = vec![
        funct("GO", &[]),
        op(Instruction::new("CALL2")
            .operands([Expr::num(0)])
            .store(Expr::sym("STACK"))),
    ];
    let err = run(&nodes, &options(3)).expect_err("CALL2 needs version 4");
    assert!(err.to_string().starts_with("Opcode not available in version 3"));
}

#[test]
fn forward_local_branch_converges_to_short_form() {
    let nodes = vec![
        funct("GO", &["X"]),
        op(Instruction::new("ZERO?")
            .operands([Expr::sym("X")])
            .branch(Branch::to_label("L1"))),
        Node::local_label("L1"),
        op(Instruction::new("RTRUE")),
    ];
    let report = run_ok(&nodes, 3);
    let story = report.story();
    assert_eq!(&story[0x40..0x47], &[0x01, 0x00, 0x00, 0xA0, 0x01, 0xC2, 0xB0]);
    // Three walks in the measuring pass and three in the final pass.
    assert_eq!(report.counts().reassemblies, 4);
    assert_eq!(report.counts().measuring_passes, 1);
}

#[test]
fn jump_stores_offset_to_local_label() {
    let nodes = vec![
        funct("GO", &[]),
        op(Instruction::new("JUMP").operands([Expr::sym("DONE")])),
        op(Instruction::new("RFALSE")),
        Node::local_label("DONE"),
        op(Instruction::new("RTRUE")),
    ];
    let report = run_ok(&nodes, 3);
    assert_eq!(&report.story()[0x40..0x46], &[0x00, 0x8C, 0x00, 0x03, 0xB1, 0xB0]);
}

#[test]
fn branch_to_unknown_label_is_serious() {
    let nodes = vec![
        funct("GO", &[]),
        op(Instruction::new("ZERO?")
            .operands([Expr::num(0)])
            .branch(Branch::to_label("NOWHERE"))),
    ];
    let err = run(&nodes, &options(3)).expect_err("branch target missing");
    assert_eq!(err.to_string(), "Errors in assembly: 1");
    let diag = err.first_error().expect("serious diagnostic");
    assert_eq!(diag.severity(), Severity::Error);
    assert!(diag.message().contains("NOWHERE"));
}

#[test]
fn store_targets_and_global_variables() {
    let nodes = vec![
        Node::directive(Directive::Gvar {
            name: "SCORE".to_string(),
            default: Some(Expr::num(5)),
        }),
        funct("GO", &[]),
        op(Instruction::new("ADD")
            .operands([Expr::sym("SCORE"), Expr::num(1)])
            .store(Expr::sym("SCORE"))),
        op(Instruction::new("RTRUE")),
    ];
    let report = run_ok(&nodes, 3);
    let story = report.story();
    assert_eq!(word_at(story, 0x40), 5);
    assert_eq!(&story[0x42..0x48], &[0x00, 0x54, 0x10, 0x01, 0x10, 0xB0]);
}

#[test]
fn new_directive_restarts_with_requested_version() {
    let nodes = vec![
        Node::directive(Directive::New(Expr::num(5))),
        funct("GO", &[]),
        op(Instruction::new("RTRUE")),
        words(&[Expr::sym("GO")]),
    ];
    let report = run_ok(&nodes, 3);
    assert_eq!(report.story()[0], 5);
    assert_eq!(report.counts().restarts, 1);
    // Version 5 routines pack by four and have no local defaults.
    assert_eq!(&report.story()[0x40..0x44], &[0x00, 0xB0, 0x00, 0x10]);
}

#[test]
fn conflicting_version_directives_are_fatal() {
    let nodes = vec![
        Node::directive(Directive::New(Expr::num(5))),
        Node::directive(Directive::New(Expr::num(4))),
    ];
    let err = run(&nodes, &options(3)).expect_err("conflicting versions");
    assert_eq!(err.to_string(), "Conflicting version directives: 4 and 5");
}

#[test]
fn packed_strings_and_routines_in_version_5() {
    let nodes = vec![
        funct("GO", &[]),
        op(Instruction::new("RTRUE")),
        Node::directive(Directive::Gstr {
            name: "HI".to_string(),
            text: "hi".to_string(),
        }),
        words(&[Expr::sym("GO"), Expr::sym("HI")]),
    ];
    let report = run_ok(&nodes, 5);
    let story = report.story();
    assert_eq!(&story[0x40..0x42], &[0x00, 0xB0]);
    assert_eq!(&story[0x42..0x44], &[0x00, 0x00]);
    assert_eq!(word_at(story, 0x44), 0xB5C5);
    assert_eq!(word_at(story, 0x46), 0x10);
    assert_eq!(word_at(story, 0x48), 0x11);
}

#[test]
fn version_7_header_records_packing_offsets() {
    let nodes = vec![
        bytes(&[0; 12]),
        funct("GO", &[]),
        op(Instruction::new("RTRUE")),
        words(&[Expr::sym("GO")]),
    ];
    let report = run_ok(&nodes, 7);
    let story = report.story();
    // Routine base 0x48, routine at 0x4C.
    assert_eq!(word_at(story, 0x28), 9);
    assert_eq!(word_at(story, 0x2A), 0);
    assert_eq!(word_at(story, 0x4E), 1);
}

#[test]
fn vocabulary_blocks_are_sorted_and_labels_follow() {
    let nodes = vec![
        words(&[Expr::sym("W2")]),
        Node::directive(Directive::Vocbeg {
            record_size: Expr::num(6),
            key_size: Expr::num(4),
        }),
        Node::global_label("W2"),
        Node::directive(Directive::Zword("zebra".to_string())),
        bytes(&[1, 2]),
        Node::global_label("W1"),
        Node::directive(Directive::Zword("apple".to_string())),
        bytes(&[3, 4]),
        Node::directive(Directive::Vocend),
        words(&[Expr::sym("W1"), Expr::sym("W2")]),
    ];
    let report = run_ok(&nodes, 3);
    let story = report.story();
    let encoder = ZTextEncoder::new(v(3));
    assert_eq!(&story[0x42..0x46], encoder.dictionary_key("apple").as_slice());
    assert_eq!(&story[0x46..0x48], &[3, 4]);
    assert_eq!(&story[0x48..0x4C], encoder.dictionary_key("zebra").as_slice());
    assert_eq!(&story[0x4C..0x4E], &[1, 2]);
    assert_eq!(word_at(story, 0x40), 0x48);
    assert_eq!(word_at(story, 0x4E), 0x42);
    assert_eq!(word_at(story, 0x50), 0x48);
}

#[test]
fn table_size_mismatch_is_serious() {
    let nodes = vec![
        Node::directive(Directive::Table {
            size: Some(Expr::num(4)),
        }),
        bytes(&[1, 2, 3]),
        Node::directive(Directive::Endt),
    ];
    let err = run(&nodes, &options(3)).expect_err("table mismatch");
    assert_eq!(err.to_string(), "Errors in assembly: 1");
    let diag = err.first_error().expect("table diagnostic");
    assert!(diag.message().contains("declared 4, actual 3"));
}

#[test]
fn unclosed_table_is_reported_at_end_of_pass() {
    let nodes = vec![Node::directive(Directive::Table { size: None }), bytes(&[1])];
    let err = run(&nodes, &options(3)).expect_err("unclosed table");
    let diag = err.first_error().expect("table diagnostic");
    assert!(diag.message().starts_with(".TABLE without .ENDT"));
}

#[test]
fn error_cap_turns_fatal() {
    let bad_prop = || {
        Node::directive(Directive::Prop {
            size: Expr::num(0),
            number: Expr::num(1),
        })
    };
    let nodes = vec![bad_prop(), bad_prop(), bad_prop()];
    let options = AssemblerOptions {
        max_errors: 2,
        ..options(3)
    };
    let err = run(&nodes, &options).expect_err("error cap");
    assert_eq!(err.to_string(), "Too many errors: 2");
    assert_eq!(err.error_count(), 3);
}

#[test]
fn small_objects_link_by_byte() {
    let object = |name: &str, flags: Vec<Expr>, parent: Expr, child: Expr| {
        Node::directive(Directive::Object {
            name: name.to_string(),
            flags,
            parent,
            sibling: Expr::num(0),
            child,
            properties: Expr::sym("PROPS"),
        })
    };
    let nodes = vec![
        object(
            "ROOM",
            vec![Expr::num(0x8000), Expr::num(0)],
            Expr::num(0),
            Expr::sym("LAMP"),
        ),
        object("LAMP", Vec::new(), Expr::sym("ROOM"), Expr::num(0)),
        Node::global_label("PROPS"),
        bytes(&[0]),
    ];
    let report = run_ok(&nodes, 3);
    let story = report.story();
    assert_eq!(
        &story[0x40..0x49],
        &[0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x52]
    );
    assert_eq!(
        &story[0x49..0x52],
        &[0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x52]
    );
}

#[test]
fn property_headers_follow_version() {
    let prop = |size: i32, number: i32| {
        Node::directive(Directive::Prop {
            size: Expr::num(size),
            number: Expr::num(number),
        })
    };
    let report = run_ok(&[prop(2, 5)], 3);
    assert_eq!(report.story()[0x40], 0x25);
    let report = run_ok(&[prop(4, 10), prop(2, 10), prop(1, 10)], 5);
    assert_eq!(&report.story()[0x40..0x44], &[0x8A, 0x84, 0x4A, 0x0A]);
}

#[test]
fn fstr_defines_word_address() {
    let nodes = vec![
        bytes(&[0]),
        Node::directive(Directive::Fstr {
            name: "FSTR?1".to_string(),
            text: "the ".to_string(),
        }),
        words(&[Expr::sym("FSTR?1")]),
    ];
    let report = run_ok(&nodes, 3);
    let story = report.story();
    let encoded = ZTextEncoder::new(v(3)).encode_plain("the ");
    assert_eq!(&story[0x42..0x42 + encoded.len()], encoded.as_slice());
    assert_eq!(word_at(story, 0x42 + encoded.len()), 0x21);
}

#[test]
fn header_fields_and_checksum() {
    let nodes = vec![
        Node::global_label("START"),
        funct("GO", &[]),
        op(Instruction::new("RTRUE")),
        Node::directive(Directive::Time),
    ];
    let options = AssemblerOptions {
        serial: Some("8703".to_string()),
        release: Some(42),
        creator: Some("ZF".to_string()),
        ..options(3)
    };
    let report = run(&nodes, &options).expect("assemble");
    let story = report.story();
    assert_eq!(story.len(), 512);
    assert_eq!(story[0], 3);
    assert_eq!(story[1], 0x02);
    assert_eq!(word_at(story, 0x02), 42);
    assert_eq!(word_at(story, 0x06), 0x40);
    assert_eq!(&story[0x12..0x18], b"870300");
    assert_eq!(word_at(story, 0x1A), 256);
    assert_eq!(word_at(story, 0x1C), checksum(story));
    assert_eq!(&story[0x3C..0x40], b"ZF  ");
}

#[test]
fn release_defaults_to_zorkid_symbol() {
    let nodes = vec![Node::directive(Directive::Equal {
        name: "ZORKID".to_string(),
        value: Expr::num(7),
    })];
    let report = run_ok(&nodes, 3);
    assert_eq!(word_at(report.story(), 0x02), 7);
}

#[test]
fn version_3_story_over_limit_names_the_excess() {
    let nodes = vec![Node::directive(Directive::Str("a".repeat(200_000)))];
    let err = run(&nodes, &options(3)).expect_err("story too large");
    assert_eq!(
        err.to_string(),
        "Story file exceeds the version 3 limit by 2326 bytes"
    );
    let diag = err.first_error().expect("layout diagnostic");
    assert!(!diag.help().is_empty());
}

#[test]
fn local_defaults_warn_after_version_4() {
    let nodes = vec![
        Node::directive(Directive::Funct {
            name: "GO".to_string(),
            locals: vec![LocalDecl::with_default("X", Expr::num(3))],
        }),
        op(Instruction::new("RTRUE")),
    ];
    let report = run_ok(&nodes, 3);
    assert_eq!(&report.story()[0x40..0x44], &[0x01, 0x00, 0x03, 0xB0]);
    assert_eq!(report.warning_count(), 0);
    let report = run_ok(&nodes, 5);
    assert_eq!(&report.story()[0x40..0x42], &[0x01, 0xB0]);
    assert_eq!(report.warning_count(), 1);
}

#[test]
fn duplicate_global_label_is_serious() {
    let nodes = vec![
        Node::global_label("TWICE"),
        bytes(&[0]),
        Node::global_label("TWICE"),
    ];
    let err = run(&nodes, &options(3)).expect_err("duplicate label");
    let diag = err.first_error().expect("symbol diagnostic");
    assert!(diag.message().contains("TWICE"));
}

#[test]
fn debug_records_reach_the_sink_with_final_addresses() {
    let nodes = vec![
        Node::directive(Directive::Debug(DebugDirective::File {
            number: 1,
            include_name: "game".to_string(),
            actual_name: "game.zil".to_string(),
        })),
        funct("GO", &[]),
        Node::directive(Directive::Debug(DebugDirective::Line {
            file: 1,
            line: 10,
            column: 0,
        })),
        op(Instruction::new("RTRUE")),
        Node::directive(Directive::Debug(DebugDirective::Named {
            table: DebugTable::Object,
            number: Expr::num(1),
            name: "ROOM".to_string(),
        })),
    ];
    let mut log = DebugLog::new();
    assemble(&nodes, &options(3), &mut log).expect("assemble");
    assert_eq!(log.records().len(), 3);
    assert!(matches!(log.records()[0], DebugRecord::File { number: 1, .. }));
    assert_eq!(
        log.records()[1],
        DebugRecord::Line {
            file: 1,
            line: 10,
            column: 0,
            pc: 0x41,
        }
    );
    assert_eq!(
        log.records()[2],
        DebugRecord::Named {
            table: DebugTable::Object,
            number: 1,
            name: "ROOM".to_string(),
        }
    );
}

#[test]
fn failed_runs_deliver_no_debug_records() {
    let nodes = vec![
        Node::directive(Directive::Debug(DebugDirective::Line {
            file: 1,
            line: 1,
            column: 0,
        })),
        words(&[Expr::sym("NOPE")]),
    ];
    let mut log = DebugLog::new();
    assert!(assemble(&nodes, &options(3), &mut log).is_err());
    assert!(log.is_empty());
}

#[test]
fn final_pass_text_feeds_the_optimizer() {
    let nodes = vec![
        funct("GO", &[]),
        op(Instruction::new("PRINTI").text("the cat sat on the mat by the door")),
        op(Instruction::new("RTRUE")),
    ];
    let options = AssemblerOptions {
        collect_text: true,
        ..options(3)
    };
    let mut report = run(&nodes, &options).expect("assemble");
    let finder = report.take_text().expect("collected text");
    let results: Vec<_> = finder.results(4).collect();
    assert_eq!(results[0].text, "the ");
    assert_eq!(results[0].count, 3);
    assert_eq!(results[0].savings, 2);
}

#[test]
fn text_is_not_collected_unless_requested() {
    let nodes = vec![Node::directive(Directive::Str("hello there".to_string()))];
    let mut report = run_ok(&nodes, 3);
    assert!(report.take_text().is_none());
}

fn shrinking_branches(count: usize) -> Vec<Node> {
    // Each branch starts long against the routine-header guess and settles short.
    (0..count)
        .map(|_| {
            op(Instruction::new("ZERO?")
                .operands([Expr::num(0)])
                .branch(Branch::to_label("L1")))
        })
        .collect()
}

#[test]
fn version_7_string_base_follows_a_rewalked_routine() {
    let mut nodes = vec![funct("GO", &[])];
    nodes.extend(shrinking_branches(10));
    nodes.extend([
        Node::local_label("L1"),
        op(Instruction::new("RTRUE")),
        Node::directive(Directive::Gstr {
            name: "HI".to_string(),
            text: "hi".to_string(),
        }),
        words(&[Expr::sym("GO"), Expr::sym("HI")]),
    ]);
    let report = run_ok(&nodes, 7);
    let story = report.story();
    assert!(report.counts().reassemblies > 0);
    // Routine base 0x40, routine at 0x44 with short branches from 0x45.
    assert_eq!(word_at(story, 0x28), 0x08);
    assert_eq!(&story[0x45..0x48], &[0x90, 0x00, 0xDD]);
    assert_eq!(story[0x63], 0xB0);
    // The string lands at 0x64 and fixes its base at 0x60.
    assert_eq!(word_at(story, 0x2A), 0x0C);
    assert_eq!(word_at(story, 0x64), 0xB5C5);
    assert_eq!(word_at(story, 0x66), 1);
    assert_eq!(word_at(story, 0x68), 1);
}

#[test]
fn packed_addresses_stay_consistent_after_a_rewalk() {
    let mut nodes = vec![funct("GO", &[])];
    nodes.extend(shrinking_branches(10));
    nodes.extend([
        Node::local_label("L1"),
        op(Instruction::new("RTRUE")),
        Node::directive(Directive::Gstr {
            name: "HI".to_string(),
            text: "hi".to_string(),
        }),
        funct("NEXT", &[]),
        op(Instruction::new("RFALSE")),
    ]);
    nodes.push(words(&[Expr::sym("GO"), Expr::sym("NEXT"), Expr::sym("HI")]));
    let report = run_ok(&nodes, 7);
    let story = report.story();
    assert!(report.counts().reassemblies > 0);
    let routine_base = usize::from(word_at(story, 0x28)) * 8;
    let string_base = usize::from(word_at(story, 0x2A)) * 8;
    let table = 0x6A;
    let go = usize::from(word_at(story, table));
    let next = usize::from(word_at(story, table + 2));
    let hi = usize::from(word_at(story, table + 4));
    for packed in [go, next, hi] {
        assert!(packed >= 1, "packed address {packed} must not be zero");
    }
    // Routines start with their locals count; strings hold the encoded text.
    assert_eq!(go * 4 + routine_base, 0x44);
    assert_eq!(story[go * 4 + routine_base], 0);
    assert_eq!(next * 4 + routine_base, 0x68);
    assert_eq!(&story[0x68..0x6A], &[0x00, 0xB1]);
    assert_eq!(hi * 4 + string_base, 0x64);
    assert_eq!(word_at(story, hi * 4 + string_base), 0xB5C5);
}

#[test]
fn time_flag_applies_only_up_to_version_3() {
    let nodes = vec![Node::directive(Directive::Time)];
    assert_eq!(run_ok(&nodes, 3).story()[0x01] & 0x02, 0x02);
    assert_eq!(run_ok(&nodes, 5).story()[0x01] & 0x02, 0);
}
