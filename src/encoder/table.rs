// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Static catalog of 8086 instruction encodings.
//!
//! One mnemonic has several rows, one per operand shape; the encoder
//! scans the table and keeps the most specific match. The catalog is the
//! single source of truth for opcodes and `/reg` extension fields.

/// Operand shape a table row expects in a given position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandSpec {
    None,
    Reg8,
    Reg16,
    Mem8,
    Mem16,
    Rm8,
    Rm16,
    Imm8,
    Imm16,
    Al,
    Ax,
    Cl,
    Dx,
    SegReg,
    Rel8,
    Rel16,
    Label,
}

/// How a row's bytes are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingForm {
    /// opcode + ModR/M + displacement.
    Modrm,
    /// opcode + ModR/M (`reg` = `/n` extension) + displacement + immediate.
    ModrmImm,
    /// opcode + register code folded into the opcode byte, then an
    /// optional immediate.
    RegInOpcode,
    /// opcode + immediate (or moffs16 for the accumulator MOV forms).
    Immediate,
    /// opcode + signed 8/16-bit offset from the end of the instruction.
    Relative,
    /// opcode byte alone.
    Fixed,
}

#[derive(Debug, Clone, Copy)]
pub struct Encoding {
    pub mnemonic: &'static str,
    pub operands: &'static [OperandSpec],
    pub form: EncodingForm,
    pub opcode: u8,
    /// `/n` reg-field extension for `ModrmImm` rows.
    pub reg_field: u8,
}

const fn row(
    mnemonic: &'static str,
    operands: &'static [OperandSpec],
    form: EncodingForm,
    opcode: u8,
    reg_field: u8,
) -> Encoding {
    Encoding {
        mnemonic,
        operands,
        form,
        opcode,
        reg_field,
    }
}

use EncodingForm::{Fixed, Immediate, Modrm, ModrmImm, RegInOpcode, Relative};
use OperandSpec::{
    Al, Ax, Cl, Dx, Imm16, Imm8, Mem16, Mem8, Reg16, Reg8, Rel16, Rel8, Rm16, Rm8, SegReg,
};

pub const INSTRUCTION_TABLE: &[Encoding] = &[
    // MOV
    row("MOV", &[Rm8, Reg8], Modrm, 0x88, 0),
    row("MOV", &[Rm16, Reg16], Modrm, 0x89, 0),
    row("MOV", &[Reg8, Rm8], Modrm, 0x8A, 0),
    row("MOV", &[Reg16, Rm16], Modrm, 0x8B, 0),
    row("MOV", &[Rm8, Imm8], ModrmImm, 0xC6, 0),
    row("MOV", &[Rm16, Imm16], ModrmImm, 0xC7, 0),
    // Accumulator to/from a direct memory offset.
    row("MOV", &[Al, Mem8], Immediate, 0xA0, 0),
    row("MOV", &[Ax, Mem16], Immediate, 0xA1, 0),
    row("MOV", &[Mem8, Al], Immediate, 0xA2, 0),
    row("MOV", &[Mem16, Ax], Immediate, 0xA3, 0),
    row("MOV", &[Al, Imm8], RegInOpcode, 0xB0, 0),
    row("MOV", &[Reg8, Imm8], RegInOpcode, 0xB0, 0),
    row("MOV", &[Ax, Imm16], RegInOpcode, 0xB8, 0),
    row("MOV", &[Reg16, Imm16], RegInOpcode, 0xB8, 0),
    row("MOV", &[Rm16, SegReg], Modrm, 0x8C, 0),
    row("MOV", &[SegReg, Rm16], Modrm, 0x8E, 0),
    // ADD
    row("ADD", &[Rm8, Reg8], Modrm, 0x00, 0),
    row("ADD", &[Rm16, Reg16], Modrm, 0x01, 0),
    row("ADD", &[Reg8, Rm8], Modrm, 0x02, 0),
    row("ADD", &[Reg16, Rm16], Modrm, 0x03, 0),
    row("ADD", &[Al, Imm8], Immediate, 0x04, 0),
    row("ADD", &[Ax, Imm16], Immediate, 0x05, 0),
    row("ADD", &[Rm8, Imm8], ModrmImm, 0x80, 0),
    row("ADD", &[Rm16, Imm16], ModrmImm, 0x81, 0),
    row("ADD", &[Rm16, Imm8], ModrmImm, 0x83, 0), // sign-extended
    // ADC
    row("ADC", &[Rm8, Reg8], Modrm, 0x10, 0),
    row("ADC", &[Rm16, Reg16], Modrm, 0x11, 0),
    row("ADC", &[Reg8, Rm8], Modrm, 0x12, 0),
    row("ADC", &[Reg16, Rm16], Modrm, 0x13, 0),
    row("ADC", &[Al, Imm8], Immediate, 0x14, 0),
    row("ADC", &[Ax, Imm16], Immediate, 0x15, 0),
    row("ADC", &[Rm8, Imm8], ModrmImm, 0x80, 2),
    row("ADC", &[Rm16, Imm16], ModrmImm, 0x81, 2),
    row("ADC", &[Rm16, Imm8], ModrmImm, 0x83, 2),
    // SUB
    row("SUB", &[Rm8, Reg8], Modrm, 0x28, 0),
    row("SUB", &[Rm16, Reg16], Modrm, 0x29, 0),
    row("SUB", &[Reg8, Rm8], Modrm, 0x2A, 0),
    row("SUB", &[Reg16, Rm16], Modrm, 0x2B, 0),
    row("SUB", &[Al, Imm8], Immediate, 0x2C, 0),
    row("SUB", &[Ax, Imm16], Immediate, 0x2D, 0),
    row("SUB", &[Rm8, Imm8], ModrmImm, 0x80, 5),
    row("SUB", &[Rm16, Imm16], ModrmImm, 0x81, 5),
    row("SUB", &[Rm16, Imm8], ModrmImm, 0x83, 5),
    // SBB
    row("SBB", &[Rm8, Reg8], Modrm, 0x18, 0),
    row("SBB", &[Rm16, Reg16], Modrm, 0x19, 0),
    row("SBB", &[Reg8, Rm8], Modrm, 0x1A, 0),
    row("SBB", &[Reg16, Rm16], Modrm, 0x1B, 0),
    row("SBB", &[Al, Imm8], Immediate, 0x1C, 0),
    row("SBB", &[Ax, Imm16], Immediate, 0x1D, 0),
    row("SBB", &[Rm8, Imm8], ModrmImm, 0x80, 3),
    row("SBB", &[Rm16, Imm16], ModrmImm, 0x81, 3),
    row("SBB", &[Rm16, Imm8], ModrmImm, 0x83, 3),
    // CMP
    row("CMP", &[Rm8, Reg8], Modrm, 0x38, 0),
    row("CMP", &[Rm16, Reg16], Modrm, 0x39, 0),
    row("CMP", &[Reg8, Rm8], Modrm, 0x3A, 0),
    row("CMP", &[Reg16, Rm16], Modrm, 0x3B, 0),
    row("CMP", &[Al, Imm8], Immediate, 0x3C, 0),
    row("CMP", &[Ax, Imm16], Immediate, 0x3D, 0),
    row("CMP", &[Rm8, Imm8], ModrmImm, 0x80, 7),
    row("CMP", &[Rm16, Imm16], ModrmImm, 0x81, 7),
    row("CMP", &[Rm16, Imm8], ModrmImm, 0x83, 7),
    // AND
    row("AND", &[Rm8, Reg8], Modrm, 0x20, 0),
    row("AND", &[Rm16, Reg16], Modrm, 0x21, 0),
    row("AND", &[Reg8, Rm8], Modrm, 0x22, 0),
    row("AND", &[Reg16, Rm16], Modrm, 0x23, 0),
    row("AND", &[Al, Imm8], Immediate, 0x24, 0),
    row("AND", &[Ax, Imm16], Immediate, 0x25, 0),
    row("AND", &[Rm8, Imm8], ModrmImm, 0x80, 4),
    row("AND", &[Rm16, Imm16], ModrmImm, 0x81, 4),
    row("AND", &[Rm16, Imm8], ModrmImm, 0x83, 4),
    // OR
    row("OR", &[Rm8, Reg8], Modrm, 0x08, 0),
    row("OR", &[Rm16, Reg16], Modrm, 0x09, 0),
    row("OR", &[Reg8, Rm8], Modrm, 0x0A, 0),
    row("OR", &[Reg16, Rm16], Modrm, 0x0B, 0),
    row("OR", &[Al, Imm8], Immediate, 0x0C, 0),
    row("OR", &[Ax, Imm16], Immediate, 0x0D, 0),
    row("OR", &[Rm8, Imm8], ModrmImm, 0x80, 1),
    row("OR", &[Rm16, Imm16], ModrmImm, 0x81, 1),
    row("OR", &[Rm16, Imm8], ModrmImm, 0x83, 1),
    // XOR
    row("XOR", &[Rm8, Reg8], Modrm, 0x30, 0),
    row("XOR", &[Rm16, Reg16], Modrm, 0x31, 0),
    row("XOR", &[Reg8, Rm8], Modrm, 0x32, 0),
    row("XOR", &[Reg16, Rm16], Modrm, 0x33, 0),
    row("XOR", &[Al, Imm8], Immediate, 0x34, 0),
    row("XOR", &[Ax, Imm16], Immediate, 0x35, 0),
    row("XOR", &[Rm8, Imm8], ModrmImm, 0x80, 6),
    row("XOR", &[Rm16, Imm16], ModrmImm, 0x81, 6),
    row("XOR", &[Rm16, Imm8], ModrmImm, 0x83, 6),
    // NOT / NEG / MUL / IMUL / DIV / IDIV
    row("NOT", &[Rm8], ModrmImm, 0xF6, 2),
    row("NOT", &[Rm16], ModrmImm, 0xF7, 2),
    row("NEG", &[Rm8], ModrmImm, 0xF6, 3),
    row("NEG", &[Rm16], ModrmImm, 0xF7, 3),
    row("MUL", &[Rm8], ModrmImm, 0xF6, 4),
    row("MUL", &[Rm16], ModrmImm, 0xF7, 4),
    row("IMUL", &[Rm8], ModrmImm, 0xF6, 5),
    row("IMUL", &[Rm16], ModrmImm, 0xF7, 5),
    row("DIV", &[Rm8], ModrmImm, 0xF6, 6),
    row("DIV", &[Rm16], ModrmImm, 0xF7, 6),
    row("IDIV", &[Rm8], ModrmImm, 0xF6, 7),
    row("IDIV", &[Rm16], ModrmImm, 0xF7, 7),
    // TEST
    row("TEST", &[Rm8, Reg8], Modrm, 0x84, 0),
    row("TEST", &[Rm16, Reg16], Modrm, 0x85, 0),
    row("TEST", &[Al, Imm8], Immediate, 0xA8, 0),
    row("TEST", &[Ax, Imm16], Immediate, 0xA9, 0),
    row("TEST", &[Rm8, Imm8], ModrmImm, 0xF6, 0),
    row("TEST", &[Rm16, Imm16], ModrmImm, 0xF7, 0),
    // INC / DEC
    row("INC", &[Rm8], ModrmImm, 0xFE, 0),
    row("INC", &[Rm16], ModrmImm, 0xFF, 0),
    row("INC", &[Ax], Fixed, 0x40, 0),
    row("INC", &[Reg16], RegInOpcode, 0x40, 0),
    row("DEC", &[Rm8], ModrmImm, 0xFE, 1),
    row("DEC", &[Rm16], ModrmImm, 0xFF, 1),
    row("DEC", &[Ax], Fixed, 0x48, 0),
    row("DEC", &[Reg16], RegInOpcode, 0x48, 0),
    // Shifts and rotates: by an implicit 1, an explicit immediate, or CL.
    row("ROL", &[Rm8], ModrmImm, 0xD0, 0),
    row("ROL", &[Rm16], ModrmImm, 0xD1, 0),
    row("ROR", &[Rm8], ModrmImm, 0xD0, 1),
    row("ROR", &[Rm16], ModrmImm, 0xD1, 1),
    row("RCL", &[Rm8], ModrmImm, 0xD0, 2),
    row("RCL", &[Rm16], ModrmImm, 0xD1, 2),
    row("RCR", &[Rm8], ModrmImm, 0xD0, 3),
    row("RCR", &[Rm16], ModrmImm, 0xD1, 3),
    row("SHL", &[Rm8], ModrmImm, 0xD0, 4),
    row("SHL", &[Rm16], ModrmImm, 0xD1, 4),
    row("SAL", &[Rm8], ModrmImm, 0xD0, 4),
    row("SAL", &[Rm16], ModrmImm, 0xD1, 4),
    row("SHR", &[Rm8], ModrmImm, 0xD0, 5),
    row("SHR", &[Rm16], ModrmImm, 0xD1, 5),
    row("SAR", &[Rm8], ModrmImm, 0xD0, 7),
    row("SAR", &[Rm16], ModrmImm, 0xD1, 7),
    row("ROL", &[Rm8, Imm8], ModrmImm, 0xD0, 0),
    row("ROL", &[Rm16, Imm8], ModrmImm, 0xD1, 0),
    row("ROR", &[Rm8, Imm8], ModrmImm, 0xD0, 1),
    row("ROR", &[Rm16, Imm8], ModrmImm, 0xD1, 1),
    row("RCL", &[Rm8, Imm8], ModrmImm, 0xD0, 2),
    row("RCL", &[Rm16, Imm8], ModrmImm, 0xD1, 2),
    row("RCR", &[Rm8, Imm8], ModrmImm, 0xD0, 3),
    row("RCR", &[Rm16, Imm8], ModrmImm, 0xD1, 3),
    row("SHL", &[Rm8, Imm8], ModrmImm, 0xD0, 4),
    row("SHL", &[Rm16, Imm8], ModrmImm, 0xD1, 4),
    row("SAL", &[Rm8, Imm8], ModrmImm, 0xD0, 4),
    row("SAL", &[Rm16, Imm8], ModrmImm, 0xD1, 4),
    row("SHR", &[Rm8, Imm8], ModrmImm, 0xD0, 5),
    row("SHR", &[Rm16, Imm8], ModrmImm, 0xD1, 5),
    row("SAR", &[Rm8, Imm8], ModrmImm, 0xD0, 7),
    row("SAR", &[Rm16, Imm8], ModrmImm, 0xD1, 7),
    row("ROL", &[Rm8, Cl], ModrmImm, 0xD2, 0),
    row("ROL", &[Rm16, Cl], ModrmImm, 0xD3, 0),
    row("ROR", &[Rm8, Cl], ModrmImm, 0xD2, 1),
    row("ROR", &[Rm16, Cl], ModrmImm, 0xD3, 1),
    row("RCL", &[Rm8, Cl], ModrmImm, 0xD2, 2),
    row("RCL", &[Rm16, Cl], ModrmImm, 0xD3, 2),
    row("RCR", &[Rm8, Cl], ModrmImm, 0xD2, 3),
    row("RCR", &[Rm16, Cl], ModrmImm, 0xD3, 3),
    row("SHL", &[Rm8, Cl], ModrmImm, 0xD2, 4),
    row("SHL", &[Rm16, Cl], ModrmImm, 0xD3, 4),
    row("SAL", &[Rm8, Cl], ModrmImm, 0xD2, 4),
    row("SAL", &[Rm16, Cl], ModrmImm, 0xD3, 4),
    row("SHR", &[Rm8, Cl], ModrmImm, 0xD2, 5),
    row("SHR", &[Rm16, Cl], ModrmImm, 0xD3, 5),
    row("SAR", &[Rm8, Cl], ModrmImm, 0xD2, 7),
    row("SAR", &[Rm16, Cl], ModrmImm, 0xD3, 7),
    // PUSH / POP
    row("PUSH", &[Ax], Fixed, 0x50, 0),
    row("PUSH", &[Reg16], RegInOpcode, 0x50, 0),
    row("PUSH", &[SegReg], Fixed, 0x06, 0),
    row("PUSH", &[Rm16], ModrmImm, 0xFF, 6),
    row("POP", &[Ax], Fixed, 0x58, 0),
    row("POP", &[Reg16], RegInOpcode, 0x58, 0),
    row("POP", &[SegReg], Fixed, 0x07, 0),
    row("POP", &[Rm16], ModrmImm, 0x8F, 0),
    // JMP: short, near, and register/memory indirect.
    row("JMP", &[Rel8], Relative, 0xEB, 0),
    row("JMP", &[Rel16], Relative, 0xE9, 0),
    row("JMP", &[Rm16], ModrmImm, 0xFF, 4),
    // Conditional jumps are short-only on the 8086.
    row("JO", &[Rel8], Relative, 0x70, 0),
    row("JNO", &[Rel8], Relative, 0x71, 0),
    row("JB", &[Rel8], Relative, 0x72, 0),
    row("JC", &[Rel8], Relative, 0x72, 0),
    row("JNAE", &[Rel8], Relative, 0x72, 0),
    row("JNB", &[Rel8], Relative, 0x73, 0),
    row("JAE", &[Rel8], Relative, 0x73, 0),
    row("JNC", &[Rel8], Relative, 0x73, 0),
    row("JE", &[Rel8], Relative, 0x74, 0),
    row("JZ", &[Rel8], Relative, 0x74, 0),
    row("JNE", &[Rel8], Relative, 0x75, 0),
    row("JNZ", &[Rel8], Relative, 0x75, 0),
    row("JBE", &[Rel8], Relative, 0x76, 0),
    row("JNA", &[Rel8], Relative, 0x76, 0),
    row("JNBE", &[Rel8], Relative, 0x77, 0),
    row("JA", &[Rel8], Relative, 0x77, 0),
    row("JS", &[Rel8], Relative, 0x78, 0),
    row("JNS", &[Rel8], Relative, 0x79, 0),
    row("JP", &[Rel8], Relative, 0x7A, 0),
    row("JPE", &[Rel8], Relative, 0x7A, 0),
    row("JNP", &[Rel8], Relative, 0x7B, 0),
    row("JPO", &[Rel8], Relative, 0x7B, 0),
    row("JL", &[Rel8], Relative, 0x7C, 0),
    row("JNGE", &[Rel8], Relative, 0x7C, 0),
    row("JNL", &[Rel8], Relative, 0x7D, 0),
    row("JGE", &[Rel8], Relative, 0x7D, 0),
    row("JLE", &[Rel8], Relative, 0x7E, 0),
    row("JNG", &[Rel8], Relative, 0x7E, 0),
    row("JNLE", &[Rel8], Relative, 0x7F, 0),
    row("JG", &[Rel8], Relative, 0x7F, 0),
    // CALL / RET
    row("CALL", &[Rel16], Relative, 0xE8, 0),
    row("CALL", &[Rm16], ModrmImm, 0xFF, 2),
    row("RET", &[], Fixed, 0xC3, 0),
    row("RET", &[Imm16], Immediate, 0xC2, 0),
    row("RETF", &[], Fixed, 0xCB, 0),
    row("RETF", &[Imm16], Immediate, 0xCA, 0),
    // LOOP family
    row("LOOP", &[Rel8], Relative, 0xE2, 0),
    row("LOOPE", &[Rel8], Relative, 0xE1, 0),
    row("LOOPZ", &[Rel8], Relative, 0xE1, 0),
    row("LOOPNE", &[Rel8], Relative, 0xE0, 0),
    row("LOOPNZ", &[Rel8], Relative, 0xE0, 0),
    row("JCXZ", &[Rel8], Relative, 0xE3, 0),
    // INT / IRET
    row("INT", &[Imm8], Immediate, 0xCD, 0),
    row("INT3", &[], Fixed, 0xCC, 0),
    row("INTO", &[], Fixed, 0xCE, 0),
    row("IRET", &[], Fixed, 0xCF, 0),
    // String operations
    row("MOVSB", &[], Fixed, 0xA4, 0),
    row("MOVSW", &[], Fixed, 0xA5, 0),
    row("CMPSB", &[], Fixed, 0xA6, 0),
    row("CMPSW", &[], Fixed, 0xA7, 0),
    row("SCASB", &[], Fixed, 0xAE, 0),
    row("SCASW", &[], Fixed, 0xAF, 0),
    row("LODSB", &[], Fixed, 0xAC, 0),
    row("LODSW", &[], Fixed, 0xAD, 0),
    row("STOSB", &[], Fixed, 0xAA, 0),
    row("STOSW", &[], Fixed, 0xAB, 0),
    // Repeat prefixes
    row("REP", &[], Fixed, 0xF3, 0),
    row("REPE", &[], Fixed, 0xF3, 0),
    row("REPZ", &[], Fixed, 0xF3, 0),
    row("REPNE", &[], Fixed, 0xF2, 0),
    row("REPNZ", &[], Fixed, 0xF2, 0),
    // I/O
    row("IN", &[Al, Imm8], Immediate, 0xE4, 0),
    row("IN", &[Ax, Imm8], Immediate, 0xE5, 0),
    row("IN", &[Al, Dx], Fixed, 0xEC, 0),
    row("IN", &[Ax, Dx], Fixed, 0xED, 0),
    row("OUT", &[Imm8, Al], Immediate, 0xE6, 0),
    row("OUT", &[Imm8, Ax], Immediate, 0xE7, 0),
    row("OUT", &[Dx, Al], Fixed, 0xEE, 0),
    row("OUT", &[Dx, Ax], Fixed, 0xEF, 0),
    // No-operand instructions
    row("NOP", &[], Fixed, 0x90, 0),
    row("HLT", &[], Fixed, 0xF4, 0),
    row("PUSHA", &[], Fixed, 0x60, 0),
    row("POPA", &[], Fixed, 0x61, 0),
    row("CLC", &[], Fixed, 0xF8, 0),
    row("STC", &[], Fixed, 0xF9, 0),
    row("CMC", &[], Fixed, 0xF5, 0),
    row("CLD", &[], Fixed, 0xFC, 0),
    row("STD", &[], Fixed, 0xFD, 0),
    row("CLI", &[], Fixed, 0xFA, 0),
    row("STI", &[], Fixed, 0xFB, 0),
    row("LAHF", &[], Fixed, 0x9F, 0),
    row("SAHF", &[], Fixed, 0x9E, 0),
    row("PUSHF", &[], Fixed, 0x9C, 0),
    row("POPF", &[], Fixed, 0x9D, 0),
    row("CBW", &[], Fixed, 0x98, 0),
    row("CWD", &[], Fixed, 0x99, 0),
    row("AAA", &[], Fixed, 0x37, 0),
    row("AAS", &[], Fixed, 0x3F, 0),
    row("AAM", &[], Fixed, 0xD4, 0),
    row("AAD", &[], Fixed, 0xD5, 0),
    row("DAA", &[], Fixed, 0x27, 0),
    row("DAS", &[], Fixed, 0x2F, 0),
    row("XLAT", &[], Fixed, 0xD7, 0),
    row("WAIT", &[], Fixed, 0x9B, 0),
    row("LOCK", &[], Fixed, 0xF0, 0),
    // XCHG
    row("XCHG", &[Ax, Reg16], RegInOpcode, 0x90, 0),
    row("XCHG", &[Reg16, Ax], RegInOpcode, 0x90, 0),
    row("XCHG", &[Reg8, Rm8], Modrm, 0x86, 0),
    row("XCHG", &[Reg16, Rm16], Modrm, 0x87, 0),
    // Address loads
    row("LEA", &[Reg16, Mem16], Modrm, 0x8D, 0),
    row("LDS", &[Reg16, Mem16], Modrm, 0xC5, 0),
    row("LES", &[Reg16, Mem16], Modrm, 0xC4, 0),
];

pub fn rows_for(mnemonic: &str) -> impl Iterator<Item = &'static Encoding> + '_ {
    INSTRUCTION_TABLE
        .iter()
        .filter(move |e| e.mnemonic.eq_ignore_ascii_case(mnemonic))
}

pub fn has_mnemonic(mnemonic: &str) -> bool {
    rows_for(mnemonic).next().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert!(has_mnemonic("mov"));
        assert!(has_mnemonic("MOV"));
        assert!(!has_mnemonic("MOVQ"));
    }

    #[test]
    fn mov_has_all_major_shapes() {
        let forms: Vec<EncodingForm> = rows_for("MOV").map(|e| e.form).collect();
        assert!(forms.contains(&Modrm));
        assert!(forms.contains(&ModrmImm));
        assert!(forms.contains(&RegInOpcode));
        assert!(forms.contains(&Immediate));
    }

    #[test]
    fn conditional_jumps_are_rel8_only() {
        for mnemonic in ["JE", "JNZ", "JA", "JPO", "JCXZ", "LOOP"] {
            for row in rows_for(mnemonic) {
                assert_eq!(row.form, Relative);
                assert_eq!(row.operands, &[Rel8]);
            }
        }
    }

    #[test]
    fn alu_sign_extended_rows_use_0x83() {
        for mnemonic in ["ADD", "ADC", "SUB", "SBB", "CMP", "AND", "OR", "XOR"] {
            assert!(
                rows_for(mnemonic)
                    .any(|r| r.opcode == 0x83 && r.operands == [Rm16, Imm8]),
                "{mnemonic} lacks the 0x83 row"
            );
        }
    }
}
