// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! End-to-end tests through the public `Assembler` API.

use asm86::{Assembler, AssemblyResult};

fn assemble(source: &str) -> AssemblyResult {
    Assembler::new().assemble(source, "test.asm")
}

fn assemble_ok(source: &str) -> AssemblyResult {
    let result = assemble(source);
    assert!(result.success, "assembly failed: {:?}", result.errors);
    result
}

#[test]
fn single_byte_opcodes() {
    assert_eq!(assemble_ok("NOP").binary, [0x90]);
    assert_eq!(assemble_ok("HLT").binary, [0xF4]);
    assert_eq!(assemble_ok("CLI").binary, [0xFA]);
    assert_eq!(assemble_ok("STI").binary, [0xFB]);
    assert_eq!(assemble_ok("IRET").binary, [0xCF]);
}

#[test]
fn mov_immediates() {
    assert_eq!(assemble_ok("MOV AX, 0x1234").binary, [0xB8, 0x34, 0x12]);
    assert_eq!(assemble_ok("MOV AL, 0x42").binary, [0xB0, 0x42]);
}

#[test]
fn stack_and_counter_shorthand() {
    assert_eq!(assemble_ok("PUSH AX").binary, [0x50]);
    assert_eq!(assemble_ok("POP BX").binary, [0x5B]);
    assert_eq!(assemble_ok("INC AX").binary, [0x40]);
    assert_eq!(assemble_ok("DEC BX").binary, [0x4B]);
}

#[test]
fn interrupts() {
    assert_eq!(assemble_ok("INT 3").binary, [0xCC]);
    assert_eq!(assemble_ok("INT 0x21").binary, [0xCD, 0x21]);
}

#[test]
fn alu_immediates() {
    assert_eq!(assemble_ok("ADD AX, 0x1234").binary[0], 0x05);
    assert_eq!(assemble_ok("SUB AL, 10").binary, [0x2C, 0x0A]);
}

#[test]
fn io_instructions() {
    assert_eq!(assemble_ok("IN AL, DX").binary, [0xEC]);
    assert_eq!(assemble_ok("OUT DX, AL").binary, [0xEE]);
    assert_eq!(assemble_ok("IN AL, 0x60").binary, [0xE4, 0x60]);
}

#[test]
fn xchg_accumulator() {
    assert_eq!(assemble_ok("XCHG AX, BX").binary, [0x93]);
}

#[test]
fn rep_prefix_precedes_the_string_op() {
    assert_eq!(assemble_ok("REP MOVSB").binary, [0xF3, 0xA4]);
}

#[test]
fn string_instructions() {
    let result = assemble_ok("MOVSB\nMOVSW\nSTOSB\nSTOSW\nLODSB\nLODSW");
    assert_eq!(result.binary, [0xA4, 0xA5, 0xAA, 0xAB, 0xAC, 0xAD]);
}

#[test]
fn memory_operands() {
    assert!(assemble("MOV AX, [0x1234]").success);
    assert!(assemble("MOV [0x1234], AX").success);
    assert!(assemble("MOV AX, [BX]").success);
    assert!(assemble("MOV AX, [BX+SI]").success);
    assert!(assemble("MOV AX, [BX+10]").success);
    assert!(assemble("LEA BX, [SI+10]").success);
}

#[test]
fn shifts() {
    assert!(assemble("SHL AX, 1").success);
    assert!(assemble("SHR BX, CL").success);
}

#[test]
fn data_directives() {
    let result = assemble_ok("DB \"Hello\"");
    assert_eq!(result.binary, b"Hello");

    let result = assemble_ok("DB \"Hi\", 0");
    assert_eq!(result.binary, [b'H', b'i', 0]);

    let result = assemble_ok("DW 0x1234, 0x5678");
    assert_eq!(result.binary, [0x34, 0x12, 0x78, 0x56]);

    let result = assemble_ok("DQ 1");
    assert_eq!(result.binary.len(), 8);

    let result = assemble_ok("DT 1");
    assert_eq!(result.binary.len(), 10);
}

#[test]
fn reserve_directives() {
    let result = assemble_ok("RESB 4\nRESW 2\nRESD 1");
    assert_eq!(result.binary, [0; 12]);
}

#[test]
fn times_directive() {
    let result = assemble_ok("TIMES 5 DB 0x90");
    assert_eq!(result.binary, [0x90; 5]);

    let result = assemble_ok("TIMES 3 NOP");
    assert_eq!(result.binary, [0x90; 3]);
}

#[test]
fn org_directive_sets_the_origin() {
    let result = assemble_ok("ORG 0x7C00\nNOP");
    assert_eq!(result.origin_address, 0x7C00);
}

#[test]
fn symbols_are_exported_with_original_case() {
    let result = assemble_ok("start: NOP\nMiddle: NOP\nend_label: HLT");
    assert_eq!(result.symbols["start"], 0);
    assert_eq!(result.symbols["Middle"], 1);
    assert_eq!(result.symbols["end_label"], 2);
}

#[test]
fn equ_constants_feed_immediates() {
    let result = assemble_ok("VIDEO_MEM EQU 0xB800\nMOV AX, VIDEO_MEM");
    assert_eq!(result.binary, [0xB8, 0x00, 0xB8]);
}

#[test]
fn equ_constants_fold_into_memory_displacements() {
    let result = assemble_ok("OFS EQU 4\nMOV AX, [BX+OFS]");
    assert_eq!(result.binary, [0x8B, 0x47, 0x04]);
}

#[test]
fn boot_sector_skeleton_is_512_bytes() {
    let source = r#"
        ORG 0x7C00

        start:
            CLI
            XOR AX, AX
            MOV DS, AX
            MOV ES, AX
            MOV SS, AX
            MOV SP, 0x7C00
            STI

        .halt:
            HLT
            JMP SHORT .halt

        TIMES 510-($-$$) DB 0
        DW 0xAA55
    "#;
    let result = assemble_ok(source);
    assert_eq!(result.origin_address, 0x7C00);
    assert_eq!(result.binary.len(), 512);
    assert_eq!(result.binary[510], 0x55);
    assert_eq!(result.binary[511], 0xAA);
    // The halt loop jumps back onto the HLT.
    let halt = (result.symbols[".halt"] - 0x7C00) as usize;
    assert_eq!(result.binary[halt], 0xF4);
    assert_eq!(result.binary[halt + 1], 0xEB);
    assert_eq!(result.binary[halt + 2], 0xFD);
}

#[test]
fn undefined_label_fails_the_run() {
    let result = assemble("JMP undefined_label");
    assert!(!result.success);
    assert!(!result.errors.is_empty());
    assert!(result.errors.iter().any(|e| e.message.contains("Undefined")));
}

#[test]
fn duplicate_label_fails_the_run_but_keeps_partial_results() {
    let result = assemble("start: NOP\nstart: HLT");
    assert!(!result.success);
    assert_eq!(result.binary, [0x90, 0xF4]);
    assert!(!result.listing.is_empty());
}

#[test]
fn mismatched_ends_is_reported() {
    let result = assemble("NOP\nENDS");
    assert!(!result.success);
    assert!(result
        .errors
        .iter()
        .any(|e| e.message.contains("ENDS without matching SEGMENT")));
    // Partial results survive the error.
    assert_eq!(result.binary, [0x90]);
}

#[test]
fn conditional_jump_out_of_range_fails_the_run() {
    let result = assemble("JE target\nTIMES 200 NOP\ntarget: HLT");
    assert!(!result.success);
    assert!(result
        .errors
        .iter()
        .any(|e| e.message.contains("SHORT jump")));
}

#[test]
fn listing_is_generated() {
    let result = assemble_ok("MOV AX, 0x1234\nNOP");
    assert!(!result.listing.is_empty());
    let text = result.listing_text();
    assert!(text.contains("B8 34 12"));
    assert!(text.contains(" | "));
}

#[test]
fn local_labels_roll_with_global_scope() {
    let source = "first:\n.loop: NOP\nJMP SHORT .loop\nsecond:\n.loop: NOP\nJMP SHORT .loop";
    let result = assemble_ok(source);
    assert_eq!(result.symbols["first"], 0);
    assert_eq!(result.symbols["second"], 3);
}

#[test]
fn segment_override_prefixes() {
    let result = assemble_ok("MOV AX, ES:[DI]");
    assert_eq!(result.binary[0], 0x26);
    let result = assemble_ok("MOV AX, CS:[SI]");
    assert_eq!(result.binary[0], 0x2E);
}

#[test]
fn preprocessor_macros_expand() {
    let source = "%macro outb 2\nMOV AL, %2\nOUT %1, AL\n%endmacro\noutb 0x20, 0x11";
    let result = assemble_ok(source);
    assert_eq!(result.binary, [0xB0, 0x11, 0xE6, 0x20]);
}

#[test]
fn preprocessor_include_search_path() {
    let dir = std::env::temp_dir().join("asm86-include-test");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("ports.inc"), "KBD EQU 0x60\n").unwrap();

    let mut assembler = Assembler::new();
    assembler.set_include_paths(vec![dir.to_string_lossy().into_owned()]);
    let result = assembler.assemble("%include \"ports.inc\"\nIN AL, KBD", "t.asm");
    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.binary, [0xE4, 0x60]);
}

#[test]
fn warnings_do_not_fail_the_run() {
    let result = assemble("SEGMENT .text\nNOP\nSEGMENT .data\nDB 1");
    assert!(result.success);
    assert!(result.warning_count() > 0);
}

#[test]
fn failed_instruction_keeps_downstream_addresses() {
    let result = assemble("JMP missing\nafter: HLT");
    assert!(!result.success);
    // The failed near jump pads 3 zero bytes, so `after` stays at 3.
    assert_eq!(result.symbols["after"], 3);
    assert_eq!(result.binary.len(), 4);
    assert_eq!(result.binary[3], 0xF4);
}

#[test]
fn case_insensitive_mnemonics_and_symbols() {
    let result = assemble_ok("Start: nop\njmp short START");
    assert_eq!(result.binary, [0x90, 0xEB, 0xFD]);
}

#[test]
fn size_fidelity_across_a_mixed_program() {
    let source = r#"
        ORG 0x100
        start:
            MOV AX, 0x1234
            MOV [0x10], AX
            ADD BX, BYTE 5
            PUSH DS
            loop_top:
            DEC CX
            JNZ loop_top
            CALL start
            RET
    "#;
    let result = assemble_ok(source);
    // Sum of listing row bytes equals the binary length.
    let total: usize = result.listing.iter().map(|l| l.machine_code.len()).sum();
    assert_eq!(total, result.binary.len());
}
