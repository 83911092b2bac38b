// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Table-driven instruction encoder.
//!
//! For each instruction the encoder picks the most specific matching
//! catalog row, emits a segment-override prefix when a memory operand
//! asks for one, and dispatches on the row's form. It borrows the symbol
//! table read-only for the duration of one generation run.

pub mod modrm;
pub mod table;

use std::fmt;

use crate::ast::{ImmediateOperand, Instruction, JumpType, MemoryOperand, Operand};
use crate::expr;
use crate::symbol_table::{Symbol, SymbolKind, SymbolTable};

use table::{Encoding, EncodingForm, OperandSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    NoEncoding(String),
    InvalidAddressing(String),
    ShortJumpOutOfRange { distance: i64 },
    UndefinedSymbol(String),
    InvalidExpression(String),
    BadOperand(&'static str),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::NoEncoding(mnemonic) => {
                write!(f, "No encoding found for instruction: {mnemonic}")
            }
            EncodeError::InvalidAddressing(message) => write!(f, "{message}"),
            EncodeError::ShortJumpOutOfRange { distance } => write!(
                f,
                "Jump target too far for SHORT jump (distance: {distance}, max: \u{b1}127)"
            ),
            EncodeError::UndefinedSymbol(name) => write!(f, "Undefined label: {name}"),
            EncodeError::InvalidExpression(text) => write!(f, "Invalid expression: {text}"),
            EncodeError::BadOperand(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for EncodeError {}

/// Per-run encoder; the symbol table borrow lives for one code
/// generation pass.
pub struct InstructionEncoder<'a> {
    symbols: &'a SymbolTable,
    current_address: u64,
}

impl<'a> InstructionEncoder<'a> {
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Self {
            symbols,
            current_address: 0,
        }
    }

    pub fn at_address(mut self, address: u64) -> Self {
        self.current_address = address;
        self
    }

    pub fn encode(&self, instr: &Instruction) -> Result<Vec<u8>, EncodeError> {
        // INT 3 gets the dedicated one-byte breakpoint opcode.
        if instr.mnemonic.eq_ignore_ascii_case("INT") {
            if let [Operand::Immediate(imm)] = instr.operands.as_slice() {
                if imm.symbol.is_none() && imm.value == 3 {
                    return Ok(vec![0xCC]);
                }
            }
        }

        let encoding = find_encoding(&instr.mnemonic, &instr.operands)
            .ok_or_else(|| EncodeError::NoEncoding(instr.mnemonic.clone()))?;

        let mut bytes = Vec::with_capacity(6);
        for operand in &instr.operands {
            if let Operand::Memory(mem) = operand {
                if let Some(seg) = &mem.segment_override {
                    if let Some(prefix) = segment_prefix(seg) {
                        bytes.push(prefix);
                    }
                }
            }
        }

        match encoding.form {
            EncodingForm::Modrm => self.encode_modrm(encoding, instr, &mut bytes)?,
            EncodingForm::ModrmImm => self.encode_modrm_imm(encoding, instr, &mut bytes)?,
            EncodingForm::RegInOpcode => self.encode_reg_in_opcode(encoding, instr, &mut bytes)?,
            EncodingForm::Immediate => self.encode_immediate_form(encoding, instr, &mut bytes)?,
            EncodingForm::Relative => self.encode_relative(encoding, instr, &mut bytes)?,
            EncodingForm::Fixed => encode_fixed(encoding, instr, &mut bytes),
        }
        Ok(bytes)
    }

    fn encode_modrm(
        &self,
        encoding: &Encoding,
        instr: &Instruction,
        bytes: &mut Vec<u8>,
    ) -> Result<(), EncodeError> {
        bytes.push(encoding.opcode);
        let dst = &instr.operands[0];
        let src = &instr.operands[1];

        match (dst, src) {
            (Operand::Register(d), Operand::Register(s)) => {
                // A segment register always occupies the reg field (8C/8E);
                // otherwise the source register does.
                let (reg, rm) = if d.is_segment {
                    (d.code, s.code)
                } else {
                    (s.code, d.code)
                };
                bytes.push(modrm::reg_to_reg(reg, rm));
            }
            (Operand::Register(d), Operand::Label(label)) => {
                // e.g. LEA SI, table - the label is a direct address.
                let value = self.symbol_value(&label.name)?;
                let result = modrm::direct(value as u16, d.code);
                bytes.push(result.modrm);
                bytes.extend_from_slice(&result.displacement);
            }
            (Operand::Memory(mem), Operand::Register(s)) => {
                self.push_memory_modrm(bytes, mem, s.code)?;
            }
            (Operand::Register(d), Operand::Memory(mem)) => {
                self.push_memory_modrm(bytes, mem, d.code)?;
            }
            _ => return Err(EncodeError::BadOperand("Invalid operand combination for ModRM")),
        }
        Ok(())
    }

    fn encode_modrm_imm(
        &self,
        encoding: &Encoding,
        instr: &Instruction,
        bytes: &mut Vec<u8>,
    ) -> Result<(), EncodeError> {
        bytes.push(encoding.opcode);

        match &instr.operands[0] {
            Operand::Register(reg) => {
                bytes.push(modrm::reg_to_reg(encoding.reg_field, reg.code));
            }
            Operand::Memory(mem) => {
                self.push_memory_modrm(bytes, mem, encoding.reg_field)?;
            }
            _ => return Err(EncodeError::BadOperand("Invalid destination operand")),
        }

        if instr.operands.len() > 1 {
            match &instr.operands[1] {
                Operand::Immediate(imm) => {
                    let value = self.immediate_value(imm)?;
                    // Shift-by-1 via D0/D1 keeps the 1 implicit.
                    if (encoding.opcode == 0xD0 || encoding.opcode == 0xD1) && value == 1 {
                        return Ok(());
                    }
                    let width = spec_width(encoding.operands[1]);
                    bytes.extend(modrm::encode_displacement(value, width));
                }
                Operand::Register(reg) if reg.size == 8 && reg.code == 1 => {
                    // Shift by CL carries no immediate.
                }
                _ => return Err(EncodeError::BadOperand("Expected immediate operand")),
            }
        }
        Ok(())
    }

    fn encode_reg_in_opcode(
        &self,
        encoding: &Encoding,
        instr: &Instruction,
        bytes: &mut Vec<u8>,
    ) -> Result<(), EncodeError> {
        let reg = instr.operands[0]
            .as_register()
            .ok_or(EncodeError::BadOperand("Expected register operand"))?;
        bytes.push(encoding.opcode.wrapping_add(reg.code));

        if instr.operands.len() > 1 {
            match &instr.operands[1] {
                Operand::Register(other) => {
                    // XCHG AX, r16 / XCHG r16, AX: the non-accumulator
                    // register selects the opcode.
                    let code = if reg.size == 16 && reg.code == 0 && !reg.is_segment {
                        other.code
                    } else {
                        reg.code
                    };
                    let last = bytes.len() - 1;
                    bytes[last] = encoding.opcode.wrapping_add(code);
                }
                Operand::Immediate(imm) => {
                    let value = self.immediate_value(imm)?;
                    let width = if reg.size == 8 { 1 } else { 2 };
                    bytes.extend(modrm::encode_displacement(value, width));
                }
                Operand::Label(label) => {
                    let value = self.symbol_value(&label.name)?;
                    let width = if reg.size == 8 { 1 } else { 2 };
                    bytes.extend(modrm::encode_displacement(value, width));
                }
                Operand::Memory(_) => {
                    return Err(EncodeError::BadOperand(
                        "Expected immediate operand or label reference",
                    ))
                }
            }
        }
        Ok(())
    }

    fn encode_immediate_form(
        &self,
        encoding: &Encoding,
        instr: &Instruction,
        bytes: &mut Vec<u8>,
    ) -> Result<(), EncodeError> {
        bytes.push(encoding.opcode);

        match instr.operands.len() {
            0 => Ok(()),
            1 => {
                let imm = instr.operands[0]
                    .as_immediate()
                    .ok_or(EncodeError::BadOperand("Expected immediate operand"))?;
                let value = self.immediate_value(imm)?;
                bytes.extend(modrm::encode_displacement(
                    value,
                    spec_width(encoding.operands[0]),
                ));
                Ok(())
            }
            _ => {
                if let Some(imm) = instr.operands[0].as_immediate() {
                    // OUT imm8, AL
                    let value = self.immediate_value(imm)?;
                    bytes.extend(modrm::encode_displacement(
                        value,
                        spec_width(encoding.operands[0]),
                    ));
                    Ok(())
                } else if let Some(mem) = instr.operands[0].as_memory() {
                    // MOV [moffs], AL/AX
                    let address = self.moffs_address(mem)?;
                    bytes.extend(modrm::encode_displacement(address, 2));
                    Ok(())
                } else if let Some(imm) = instr.operands[1].as_immediate() {
                    // IN AL, imm8 / ALU AL, imm / TEST AL, imm
                    let value = self.immediate_value(imm)?;
                    bytes.extend(modrm::encode_displacement(
                        value,
                        spec_width(encoding.operands[1]),
                    ));
                    Ok(())
                } else if let Some(mem) = instr.operands[1].as_memory() {
                    // MOV AL/AX, [moffs]
                    let address = self.moffs_address(mem)?;
                    bytes.extend(modrm::encode_displacement(address, 2));
                    Ok(())
                } else {
                    Err(EncodeError::BadOperand(
                        "Expected immediate operand or direct address",
                    ))
                }
            }
        }
    }

    fn encode_relative(
        &self,
        encoding: &Encoding,
        instr: &Instruction,
        bytes: &mut Vec<u8>,
    ) -> Result<(), EncodeError> {
        let label = instr.operands[0]
            .as_label()
            .ok_or(EncodeError::BadOperand("Expected label operand for jump"))?;
        let target = self.symbol_value(&label.name)?;

        let mut disp_size: i64 = if encoding.operands[0] == OperandSpec::Rel8 {
            1
        } else {
            2
        };
        let mut displacement = target - (self.current_address as i64 + 1 + disp_size);

        if disp_size == 1 && !modrm::fits_disp8(displacement) {
            if instr.mnemonic.eq_ignore_ascii_case("JMP") {
                // Unconditional short jump out of range: upgrade to near.
                disp_size = 2;
                bytes.push(0xE9);
                displacement = target - (self.current_address as i64 + 1 + disp_size);
            } else {
                return Err(EncodeError::ShortJumpOutOfRange {
                    distance: displacement,
                });
            }
        } else {
            bytes.push(encoding.opcode);
        }

        bytes.extend(modrm::encode_displacement(displacement, disp_size as usize));
        Ok(())
    }

    fn push_memory_modrm(
        &self,
        bytes: &mut Vec<u8>,
        mem: &MemoryOperand,
        reg_field: u8,
    ) -> Result<(), EncodeError> {
        let result = if mem.is_direct {
            modrm::direct(mem.direct_value, reg_field)
        } else if let Some(parsed) = &mem.parsed {
            let label_value = match &parsed.label {
                Some(name) => Some(self.symbol_value(name)?),
                None => None,
            };
            modrm::memory(parsed, reg_field, label_value)
                .map_err(EncodeError::InvalidAddressing)?
        } else {
            return Err(EncodeError::BadOperand("Invalid memory operand"));
        };
        bytes.push(result.modrm);
        bytes.extend_from_slice(&result.displacement);
        Ok(())
    }

    /// Absolute address for the accumulator moffs MOV forms.
    fn moffs_address(&self, mem: &MemoryOperand) -> Result<i64, EncodeError> {
        if mem.is_direct {
            return Ok(mem.direct_value as i64);
        }
        if let Some(parsed) = &mem.parsed {
            if parsed.registers.is_empty() {
                let mut address = parsed.displacement;
                if let Some(name) = &parsed.label {
                    address += self.symbol_value(name)?;
                }
                return Ok(address);
            }
        }
        Err(EncodeError::BadOperand(
            "Expected immediate operand or direct address",
        ))
    }

    fn immediate_value(&self, imm: &ImmediateOperand) -> Result<i64, EncodeError> {
        match &imm.symbol {
            None => Ok(imm.value),
            Some(text) => self.resolve_symbolic(text),
        }
    }

    /// Symbolic immediates with operators are evaluated with EQU
    /// constants substituted in; a bare name is a plain symbol lookup.
    fn resolve_symbolic(&self, text: &str) -> Result<i64, EncodeError> {
        if text.contains(['+', '-', '*', '/']) {
            let substituted = self.substitute_constants(text);
            return expr::evaluate(&substituted)
                .ok_or_else(|| EncodeError::InvalidExpression(text.to_string()));
        }
        self.symbol_value(text)
    }

    /// Whole-word substitution of resolved EQU constants, longest names
    /// first so one constant cannot corrupt another's dotted name.
    fn substitute_constants(&self, text: &str) -> String {
        let mut constants: Vec<&Symbol> = self
            .symbols
            .all_symbols()
            .map(|(_, symbol)| symbol)
            .filter(|s| s.kind == SymbolKind::Constant && s.resolved)
            .collect();
        constants.sort_by(|a, b| b.name.len().cmp(&a.name.len()).then(a.name.cmp(&b.name)));

        let mut result = text.to_string();
        for symbol in constants {
            result = replace_whole_words(&result, &symbol.name, &symbol.value.to_string());
        }
        result
    }

    fn symbol_value(&self, name: &str) -> Result<i64, EncodeError> {
        match self.lookup_label(name) {
            Some(symbol) if symbol.resolved => Ok(symbol.value),
            _ => Err(EncodeError::UndefinedSymbol(name.to_string())),
        }
    }

    /// Scoped lookup with a direct fallback so dotted globals such as
    /// segment labels stay reachable from inside a label scope.
    fn lookup_label(&self, name: &str) -> Option<&Symbol> {
        self.symbols.lookup(name).or_else(|| {
            if name.starts_with('.') {
                self.symbols.lookup_direct(name)
            } else {
                None
            }
        })
    }
}

fn encode_fixed(encoding: &Encoding, instr: &Instruction, bytes: &mut Vec<u8>) {
    // PUSH/POP seg fold the segment code into bits 3..4 of the opcode.
    if let Some(reg) = instr.operands.first().and_then(|op| op.as_register()) {
        if reg.is_segment && matches!(encoding.opcode, 0x06 | 0x07) {
            bytes.push(encoding.opcode | (reg.code << 3));
            return;
        }
    }
    bytes.push(encoding.opcode);
}

fn find_encoding(mnemonic: &str, operands: &[Operand]) -> Option<&'static Encoding> {
    let mut best: Option<&'static Encoding> = None;
    let mut best_specificity = -1i32;

    for encoding in table::rows_for(mnemonic) {
        if encoding.operands.len() != operands.len() {
            continue;
        }
        let mut all_match = true;
        let mut specificity = 0i32;
        for (operand, spec) in operands.iter().zip(encoding.operands) {
            if !matches_spec(operand, *spec) {
                all_match = false;
                break;
            }
            specificity += spec_score(*spec);
        }
        // Strictly greater: ties go to the earlier table row.
        if all_match && specificity > best_specificity {
            best = Some(encoding);
            best_specificity = specificity;
        }
    }
    best
}

fn matches_spec(operand: &Operand, spec: OperandSpec) -> bool {
    match spec {
        OperandSpec::None => false,
        OperandSpec::Reg8 => {
            matches!(operand, Operand::Register(r) if r.size == 8 && !r.is_segment)
        }
        OperandSpec::Reg16 => {
            matches!(operand, Operand::Register(r) if r.size == 16 && !r.is_segment)
        }
        // Memory with no base/index registers (direct or label-only), or
        // a plain label reference; the latter enables LEA r16, label.
        OperandSpec::Mem8 | OperandSpec::Mem16 => match operand {
            Operand::Memory(m) => {
                m.is_direct || m.parsed.as_ref().map_or(false, |p| p.registers.is_empty())
            }
            Operand::Label(_) => true,
            _ => false,
        },
        OperandSpec::Rm8 => match operand {
            Operand::Memory(m) => m.size_hint == 0 || m.size_hint == 8,
            Operand::Register(r) => r.size == 8 && !r.is_segment,
            _ => false,
        },
        OperandSpec::Rm16 => match operand {
            Operand::Memory(m) => m.size_hint == 0 || m.size_hint == 16,
            Operand::Register(r) => r.size == 16 && !r.is_segment,
            _ => false,
        },
        OperandSpec::Imm8 => match operand {
            Operand::Immediate(i) => i.size_hint != 16 && (-128..=255).contains(&i.value),
            _ => false,
        },
        OperandSpec::Imm16 => match operand {
            Operand::Immediate(i) => i.size_hint != 8 && (-32768..=65535).contains(&i.value),
            _ => false,
        },
        OperandSpec::Al => {
            matches!(operand, Operand::Register(r) if r.size == 8 && r.code == 0)
        }
        OperandSpec::Ax => {
            matches!(operand, Operand::Register(r) if r.size == 16 && r.code == 0 && !r.is_segment)
        }
        OperandSpec::Cl => {
            matches!(operand, Operand::Register(r) if r.size == 8 && r.code == 1)
        }
        OperandSpec::Dx => {
            matches!(operand, Operand::Register(r) if r.size == 16 && r.code == 2 && !r.is_segment)
        }
        OperandSpec::SegReg => matches!(operand, Operand::Register(r) if r.is_segment),
        OperandSpec::Rel8 => {
            matches!(operand, Operand::Label(l) if l.jump_type == JumpType::Short)
        }
        OperandSpec::Rel16 => matches!(
            operand,
            Operand::Label(l) if matches!(l.jump_type, JumpType::Near | JumpType::Far)
        ),
        OperandSpec::Label => matches!(operand, Operand::Label(_)),
    }
}

/// Specific registers beat generic register classes beat r/m beats the
/// rest; ties resolve to table order.
fn spec_score(spec: OperandSpec) -> i32 {
    match spec {
        OperandSpec::Al | OperandSpec::Ax | OperandSpec::Cl | OperandSpec::Dx => 10,
        OperandSpec::Reg8 | OperandSpec::Reg16 | OperandSpec::SegReg => 5,
        OperandSpec::Rm8 | OperandSpec::Rm16 => 3,
        _ => 1,
    }
}

fn spec_width(spec: OperandSpec) -> usize {
    if spec == OperandSpec::Imm8 {
        1
    } else {
        2
    }
}

pub fn segment_prefix(segment: &str) -> Option<u8> {
    match segment.to_ascii_uppercase().as_str() {
        "ES" => Some(0x26),
        "CS" => Some(0x2E),
        "SS" => Some(0x36),
        "DS" => Some(0x3E),
        _ => None,
    }
}

fn replace_whole_words(text: &str, name: &str, value: &str) -> String {
    let bytes = text.as_bytes();
    let mut result = String::with_capacity(text.len());
    let mut pos = 0;
    while pos < text.len() {
        if let Some(found) = text[pos..].find(name) {
            let start = pos + found;
            let end = start + name.len();
            let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
            let word_start = start == 0 || !is_word(bytes[start - 1]);
            let word_end = end >= text.len() || !is_word(bytes[end]);
            result.push_str(&text[pos..start]);
            if word_start && word_end {
                result.push_str(value);
            } else {
                result.push_str(&text[start..end]);
            }
            pos = end;
        } else {
            result.push_str(&text[pos..]);
            break;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Statement;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::symbol_table::SymbolTable;
    use proptest::prelude::*;

    fn instruction(line: &str) -> Instruction {
        let (program, errors) = Parser::new(Lexer::new(line, "t").tokenize()).parse();
        assert!(errors.is_empty(), "parse failed for '{line}': {errors:?}");
        match program.statements.into_iter().next() {
            Some(Statement::Instruction(i)) => i,
            other => panic!("expected instruction for '{line}', got {other:?}"),
        }
    }

    fn encode(line: &str) -> Vec<u8> {
        let symbols = SymbolTable::new();
        encode_with(line, &symbols, 0)
    }

    fn encode_with(line: &str, symbols: &SymbolTable, address: u64) -> Vec<u8> {
        let encoder = InstructionEncoder::new(symbols).at_address(address);
        encoder
            .encode(&instruction(line))
            .unwrap_or_else(|e| panic!("encode failed for '{line}': {e}"))
    }

    fn encode_err(line: &str, symbols: &SymbolTable) -> EncodeError {
        let encoder = InstructionEncoder::new(symbols);
        encoder
            .encode(&instruction(line))
            .expect_err("expected encode failure")
    }

    #[test]
    fn fixed_opcodes() {
        assert_eq!(encode("NOP"), [0x90]);
        assert_eq!(encode("HLT"), [0xF4]);
        assert_eq!(encode("CLI"), [0xFA]);
        assert_eq!(encode("INT3"), [0xCC]);
        assert_eq!(encode("MOVSB"), [0xA4]);
    }

    #[test]
    fn mov_register_immediate() {
        assert_eq!(encode("MOV AX, 0x1234"), [0xB8, 0x34, 0x12]);
        assert_eq!(encode("MOV AL, 0x42"), [0xB0, 0x42]);
        assert_eq!(encode("MOV BX, 2"), [0xBB, 0x02, 0x00]);
        assert_eq!(encode("MOV CH, 1"), [0xB5, 0x01]);
    }

    #[test]
    fn mov_register_register() {
        assert_eq!(encode("MOV AX, BX"), [0x89, 0xD8]);
        assert_eq!(encode("MOV DS, AX"), [0x8E, 0xD8]);
        assert_eq!(encode("MOV AX, CS"), [0x8C, 0xC8]);
    }

    #[test]
    fn mov_memory_forms() {
        // Accumulator moffs encodings.
        assert_eq!(encode("MOV AX, [0x1234]"), [0xA1, 0x34, 0x12]);
        assert_eq!(encode("MOV [0x1234], AX"), [0xA3, 0x34, 0x12]);
        assert_eq!(encode("MOV AL, [0x10]"), [0xA0, 0x10, 0x00]);
        // General register-indirect forms.
        assert_eq!(encode("MOV AX, [BX]"), [0x8B, 0x07]);
        assert_eq!(encode("MOV AX, [BX+SI]"), [0x8B, 0x00]);
        assert_eq!(encode("MOV AX, [BX+10]"), [0x8B, 0x47, 0x0A]);
        assert_eq!(encode("MOV CX, [BP]"), [0x8B, 0x4E, 0x00]);
        assert_eq!(encode("MOV [BX], AL"), [0x88, 0x07]);
    }

    #[test]
    fn segment_override_prefix() {
        assert_eq!(encode("MOV AX, ES:[DI]"), [0x26, 0x8B, 0x05]);
        assert_eq!(encode("MOV AX, [SS:SI]"), [0x36, 0x8B, 0x04]);
    }

    #[test]
    fn push_pop() {
        assert_eq!(encode("PUSH AX"), [0x50]);
        assert_eq!(encode("PUSH BX"), [0x53]);
        assert_eq!(encode("POP BX"), [0x5B]);
        assert_eq!(encode("PUSH DS"), [0x1E]);
        assert_eq!(encode("POP ES"), [0x07]);
        assert_eq!(encode("PUSH WORD [BX]"), [0xFF, 0x37]);
    }

    #[test]
    fn inc_dec() {
        assert_eq!(encode("INC AX"), [0x40]);
        assert_eq!(encode("INC SI"), [0x46]);
        assert_eq!(encode("DEC BX"), [0x4B]);
        assert_eq!(encode("INC AL"), [0xFE, 0xC0]);
        assert_eq!(encode("DEC BYTE [BX]"), [0xFE, 0x0F]);
    }

    #[test]
    fn alu_forms() {
        assert_eq!(encode("ADD AX, 0x1234")[0], 0x05);
        assert_eq!(encode("SUB AL, 10"), [0x2C, 0x0A]);
        assert_eq!(encode("ADD AX, BX"), [0x01, 0xD8]);
        assert_eq!(encode("XOR AX, AX"), [0x31, 0xC0]);
        assert_eq!(encode("CMP BX, 0x1000"), [0x81, 0xFB, 0x00, 0x10]);
        // Sign-extended imm8 form is only taken with an explicit BYTE hint.
        assert_eq!(encode("ADD BX, BYTE 5"), [0x83, 0xC3, 0x05]);
        assert_eq!(encode("ADD BX, 5"), [0x81, 0xC3, 0x05, 0x00]);
    }

    #[test]
    fn io_forms() {
        assert_eq!(encode("IN AL, DX"), [0xEC]);
        assert_eq!(encode("OUT DX, AL"), [0xEE]);
        assert_eq!(encode("IN AL, 0x60"), [0xE4, 0x60]);
        assert_eq!(encode("OUT 0x20, AL"), [0xE6, 0x20]);
    }

    #[test]
    fn xchg_accumulator_short_form() {
        assert_eq!(encode("XCHG AX, BX"), [0x93]);
        assert_eq!(encode("XCHG BX, AX"), [0x93]);
        assert_eq!(encode("XCHG BL, CL"), [0x86, 0xCB]);
    }

    #[test]
    fn shifts_and_rotates() {
        assert_eq!(encode("SHL AX, 1"), [0xD1, 0xE0]);
        assert_eq!(encode("SHL AX"), [0xD1, 0xE0]);
        assert_eq!(encode("SHR BX, CL"), [0xD3, 0xEB]);
        assert_eq!(encode("ROL AL, 1"), [0xD0, 0xC0]);
    }

    #[test]
    fn int_forms() {
        // INT 3 folds to the breakpoint opcode; other vectors use CD ib.
        assert_eq!(encode("INT 3"), [0xCC]);
        assert_eq!(encode("INT 0x21"), [0xCD, 0x21]);
    }

    #[test]
    fn ret_forms() {
        assert_eq!(encode("RET"), [0xC3]);
        assert_eq!(encode("RET 4"), [0xC2, 0x04, 0x00]);
        assert_eq!(encode("RETF"), [0xCB]);
    }

    #[test]
    fn lea_with_memory_and_label() {
        assert_eq!(encode("LEA BX, [SI+10]"), [0x8D, 0x5C, 0x0A]);

        let mut symbols = SymbolTable::new();
        symbols.define("table", crate::symbol_table::SymbolKind::Label, 0x0200, 1);
        assert_eq!(
            encode_with("LEA SI, table", &symbols, 0),
            [0x8D, 0x36, 0x00, 0x02]
        );
    }

    #[test]
    fn relative_jumps() {
        let mut symbols = SymbolTable::new();
        symbols.define("target", crate::symbol_table::SymbolKind::Label, 0x10, 1);

        // Near jump from address 0: disp16 = 0x10 - 3.
        assert_eq!(encode_with("JMP target", &symbols, 0), [0xE9, 0x0D, 0x00]);
        // Short backward jump: boot-sector halt loop shape.
        let mut symbols = SymbolTable::new();
        symbols.define("halt", crate::symbol_table::SymbolKind::Label, 0x7C0D, 1);
        assert_eq!(
            encode_with("JMP SHORT halt", &symbols, 0x7C0E),
            [0xEB, 0xFD]
        );
        // Conditional jump forward.
        let mut symbols = SymbolTable::new();
        symbols.define("done", crate::symbol_table::SymbolKind::Label, 0x12, 1);
        assert_eq!(encode_with("JE done", &symbols, 0x10), [0x74, 0x00]);
    }

    #[test]
    fn short_jmp_upgrades_to_near() {
        let mut symbols = SymbolTable::new();
        symbols.define("far_away", crate::symbol_table::SymbolKind::Label, 0x200, 1);
        assert_eq!(
            encode_with("JMP SHORT far_away", &symbols, 0),
            [0xE9, 0xFD, 0x01]
        );
    }

    #[test]
    fn conditional_jump_out_of_range_fails() {
        let mut symbols = SymbolTable::new();
        symbols.define("far_away", crate::symbol_table::SymbolKind::Label, 0x200, 1);
        match encode_err("JE far_away", &symbols) {
            EncodeError::ShortJumpOutOfRange { distance } => assert_eq!(distance, 0x200 - 2),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn undefined_symbol_fails() {
        let symbols = SymbolTable::new();
        assert_eq!(
            encode_err("JMP nowhere", &symbols),
            EncodeError::UndefinedSymbol("nowhere".to_string())
        );
    }

    #[test]
    fn symbolic_immediate_with_equ_expression() {
        let mut symbols = SymbolTable::new();
        symbols.define("BASE", crate::symbol_table::SymbolKind::Constant, 0x100, 1);
        assert_eq!(
            encode_with("MOV AX, BASE+4", &symbols, 0),
            [0xB8, 0x04, 0x01]
        );
    }

    #[test]
    fn no_encoding_for_bad_shapes() {
        let symbols = SymbolTable::new();
        assert!(matches!(
            encode_err("MOV AL, 0x1234", &symbols),
            EncodeError::NoEncoding(_)
        ));
    }

    #[test]
    fn invalid_addressing_mode_is_reported() {
        let symbols = SymbolTable::new();
        let err = encode_err("MOV AX, [SI+DI]", &symbols);
        assert!(matches!(err, EncodeError::InvalidAddressing(_)), "{err:?}");
    }

    #[test]
    fn rep_prefix_is_its_own_statement() {
        assert_eq!(encode("REP"), [0xF3]);
    }

    proptest! {
        #[test]
        fn imm16_operands_encode_little_endian(value in any::<u16>()) {
            let bytes = encode(&format!("MOV AX, {value}"));
            prop_assert_eq!(bytes, vec![0xB8, value as u8, (value >> 8) as u8]);
        }
    }
}
