// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Final code generation: one ordered walk over the analyzed tree,
//! producing the flat binary, the listing rows, and the exported symbol
//! map.
//!
//! An instruction that fails to encode contributes its estimated size in
//! zero bytes, so every later address (and every label value computed in
//! Pass 1) stays valid; the error is recorded and the run is marked
//! failed at the end.

use std::collections::BTreeMap;

use crate::assembler::AssemblyResult;
use crate::ast::{
    DataDirective, DataValue, Instruction, Operand, Program, ReserveDirective, Statement,
};
use crate::encoder::{modrm, InstructionEncoder};
use crate::error::DiagnosticSink;
use crate::semantic::SemanticAnalyzer;
use crate::symbol_table::{SymbolKind, SymbolTable};

/// One listing row; `machine_code` is empty for non-emitting statements.
#[derive(Debug, Clone)]
pub struct ListingLine {
    pub source_line: u32,
    pub source_text: String,
    pub address: u64,
    pub machine_code: Vec<u8>,
    pub success: bool,
    pub error_message: String,
}

impl ListingLine {
    fn new(source_line: u32, source_text: String, address: u64) -> Self {
        Self {
            source_line,
            source_text,
            address,
            machine_code: Vec::new(),
            success: true,
            error_message: String::new(),
        }
    }
}

pub struct CodeGenerator {
    analyzer: SemanticAnalyzer,
}

impl CodeGenerator {
    pub fn new() -> Self {
        Self {
            analyzer: SemanticAnalyzer::new(),
        }
    }

    pub fn generate(&mut self, program: &mut Program, origin: u64) -> AssemblyResult {
        self.analyzer.reset(origin);

        // Analysis records its diagnostics and keeps going; generation
        // still runs so the caller gets partial results alongside them.
        self.analyzer.analyze(program);

        let origin_address = self.analyzer.origin_address();
        let mut emitter = Emitter {
            symbols: self.analyzer.symbols_mut(),
            binary: Vec::new(),
            listing: Vec::new(),
            sink: DiagnosticSink::new(),
            current_address: origin_address,
        };
        for statement in &program.statements {
            emitter.statement(statement);
        }
        let Emitter {
            binary,
            listing,
            mut sink,
            ..
        } = emitter;

        let mut errors = self.analyzer.take_diagnostics();
        errors.extend(sink.take());
        let success = errors.iter().all(|e| !e.is_error());

        let symbols: BTreeMap<String, i64> = self
            .analyzer
            .symbols()
            .all_symbols()
            .filter(|(_, symbol)| symbol.kind == SymbolKind::Label)
            .map(|(_, symbol)| (symbol.name.clone(), symbol.value))
            .collect();

        AssemblyResult {
            binary,
            listing,
            symbols,
            errors,
            origin_address,
            success,
            source_lines: Vec::new(),
        }
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

struct Emitter<'a> {
    symbols: &'a mut SymbolTable,
    binary: Vec<u8>,
    listing: Vec<ListingLine>,
    sink: DiagnosticSink,
    current_address: u64,
}

impl Emitter<'_> {
    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Label(label) => {
                // The rolling scope must track generation order so local
                // references resolve the same way they did in Pass 1.
                if !SymbolTable::is_local_label(&label.name) {
                    self.symbols.set_global_scope(&label.name);
                }
                self.listing.push(ListingLine::new(
                    label.location.line,
                    format!("{}:", label.name),
                    self.current_address,
                ));
            }
            Statement::Instruction(instr) => self.instruction(instr),
            Statement::Data(data) => self.data(data),
            Statement::Reserve(reserve) => self.reserve(reserve),
            Statement::Times(times) => {
                for _ in 0..times.count {
                    self.statement(&times.body);
                }
            }
            Statement::Equ(equ) => {
                self.listing.push(ListingLine::new(
                    equ.location.line,
                    format!("{} EQU {}", equ.name, equ.value),
                    self.current_address,
                ));
            }
            Statement::Org(org) => {
                self.current_address = org.address as u64;
                self.listing.push(ListingLine::new(
                    org.location.line,
                    format!("ORG 0x{:X}", org.address),
                    self.current_address,
                ));
            }
            Statement::Segment(segment) => {
                self.listing.push(ListingLine::new(
                    segment.location.line,
                    format!("SEGMENT {}", segment.name),
                    self.current_address,
                ));
            }
            Statement::Ends(ends) => {
                let text = if ends.name.is_empty() {
                    "ENDS".to_string()
                } else {
                    format!("{} ENDS", ends.name)
                };
                self.listing.push(ListingLine::new(
                    ends.location.line,
                    text,
                    self.current_address,
                ));
            }
        }
    }

    fn instruction(&mut self, instr: &Instruction) {
        let result = {
            let encoder =
                InstructionEncoder::new(&*self.symbols).at_address(instr.assigned_address);
            encoder.encode(instr)
        };

        let mut line = ListingLine::new(
            instr.location.line,
            render_instruction(instr),
            self.current_address,
        );

        match result {
            Ok(bytes) => {
                self.binary.extend_from_slice(&bytes);
                self.current_address += bytes.len() as u64;
                line.machine_code = bytes;
            }
            Err(error) => {
                line.success = false;
                line.error_message = error.to_string();
                self.sink.error(error.to_string(), instr.location.clone());
                // Pad with zeros so later addresses match the layout.
                let pad = instr.estimated_size as usize;
                line.machine_code = vec![0; pad];
                self.binary.extend(std::iter::repeat(0).take(pad));
                self.current_address += instr.estimated_size;
            }
        }
        self.listing.push(line);
    }

    fn data(&mut self, data: &DataDirective) {
        let mut line = ListingLine::new(
            data.location.line,
            String::new(),
            self.current_address,
        );
        let mut source = format!("{} ", data.width.data_keyword());

        for (index, value) in data.values.iter().enumerate() {
            if index > 0 {
                source.push_str(", ");
            }
            match value {
                DataValue::Str(bytes) => {
                    source.push('"');
                    source.push_str(&String::from_utf8_lossy(bytes));
                    source.push('"');
                    line.machine_code.extend_from_slice(bytes);
                }
                DataValue::Char(byte) => {
                    source.push('\'');
                    source.push(*byte as char);
                    source.push('\'');
                    line.machine_code.push(*byte);
                }
                DataValue::Number(number) => {
                    source.push_str(&format_number(*number));
                    line.machine_code
                        .extend(modrm::encode_displacement(*number, data.width.bytes() as usize));
                }
                DataValue::Symbol(name) => {
                    // Pass 1 rewrites symbols to numbers; an analysis that
                    // failed never reaches generation.
                    source.push_str(name);
                    line.machine_code
                        .extend(std::iter::repeat(0).take(data.width.bytes() as usize));
                }
            }
        }

        self.binary.extend_from_slice(&line.machine_code);
        self.current_address += line.machine_code.len() as u64;
        line.source_text = source;
        self.listing.push(line);
    }

    fn reserve(&mut self, reserve: &ReserveDirective) {
        let total = (reserve.width.bytes() * reserve.count.max(0) as u64) as usize;
        let mut line = ListingLine::new(
            reserve.location.line,
            format!("{} {}", reserve.width.reserve_keyword(), reserve.count),
            self.current_address,
        );
        line.machine_code = vec![0; total];
        self.binary.extend(std::iter::repeat(0).take(total));
        self.current_address += total as u64;
        self.listing.push(line);
    }
}

fn render_instruction(instr: &Instruction) -> String {
    let mut text = instr.mnemonic.clone();
    for (index, operand) in instr.operands.iter().enumerate() {
        text.push_str(if index == 0 { " " } else { ", " });
        match operand {
            Operand::Register(reg) => text.push_str(&reg.name),
            Operand::Immediate(imm) => match &imm.symbol {
                Some(symbol) => text.push_str(symbol),
                None => text.push_str(&format_number(imm.value)),
            },
            Operand::Memory(mem) => {
                if let Some(seg) = &mem.segment_override {
                    text.push_str(seg);
                    text.push(':');
                }
                text.push('[');
                text.push_str(&mem.address_expr);
                text.push(']');
            }
            Operand::Label(label) => text.push_str(&label.name),
        }
    }
    text
}

fn format_number(value: i64) -> String {
    if value < 0 {
        value.to_string()
    } else {
        format!("0x{value:X}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn generate(source: &str) -> AssemblyResult {
        let (mut program, errors) = Parser::new(Lexer::new(source, "t").tokenize()).parse();
        assert!(errors.is_empty(), "parse errors: {errors:?}");
        CodeGenerator::new().generate(&mut program, 0)
    }

    #[test]
    fn single_instructions() {
        assert_eq!(generate("NOP").binary, [0x90]);
        assert_eq!(generate("HLT").binary, [0xF4]);
        assert_eq!(generate("MOV AX, 0x1234").binary, [0xB8, 0x34, 0x12]);
    }

    #[test]
    fn data_emission() {
        let result = generate("DB \"Hi\", 0");
        assert!(result.success);
        assert_eq!(result.binary, [b'H', b'i', 0]);

        let result = generate("DW 0xAA55");
        assert_eq!(result.binary, [0x55, 0xAA]);

        let result = generate("DD 0x11223344");
        assert_eq!(result.binary, [0x44, 0x33, 0x22, 0x11]);
    }

    #[test]
    fn reserve_emits_zeros() {
        let result = generate("RESW 3");
        assert_eq!(result.binary, [0; 6]);
    }

    #[test]
    fn times_repeats_the_body() {
        let result = generate("TIMES 5 DB 0x90");
        assert_eq!(result.binary, vec![0x90; 5]);

        let result = generate("TIMES 3 NOP");
        assert_eq!(result.binary, vec![0x90; 3]);
    }

    #[test]
    fn times_matches_inline_repetition() {
        let repeated = generate("TIMES 4 DB 0xAB");
        let inline = generate("DB 0xAB\nDB 0xAB\nDB 0xAB\nDB 0xAB");
        assert_eq!(repeated.binary, inline.binary);
    }

    #[test]
    fn labels_resolve_forward_and_backward() {
        let result = generate("start: NOP\nJMP start\nJE end\nend: HLT");
        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.symbols["start"], 0);
        assert_eq!(result.symbols["end"], 6);
    }

    #[test]
    fn failed_instruction_pads_with_estimated_size() {
        let result = generate("JMP missing\nHLT");
        assert!(!result.success);
        // 3 zero bytes for the failed near jump, then HLT at its
        // pass-1 address.
        assert_eq!(result.binary, [0, 0, 0, 0xF4]);
        let failed = &result.listing[0];
        assert!(!failed.success);
        assert!(failed.error_message.contains("Undefined label"));
    }

    #[test]
    fn recoverable_semantic_errors_keep_partial_results() {
        let result = generate("start: NOP\nstart: HLT");
        assert!(!result.success);
        // The duplicate label is reported, everything else still emits.
        assert_eq!(result.binary, [0x90, 0xF4]);
        assert_eq!(result.listing.len(), 4);
        assert_eq!(result.symbols["start"], 0);
    }

    #[test]
    fn listing_rows_cover_every_statement() {
        let result = generate("start: NOP\nDB 1\nRESB 2");
        assert!(result.success);
        assert_eq!(result.listing.len(), 4);
        assert_eq!(result.listing[0].machine_code.len(), 0);
        assert_eq!(result.listing[1].machine_code, [0x90]);
    }

    #[test]
    fn exported_symbols_are_labels_only() {
        let result = generate("CONST EQU 5\nstart: NOP");
        assert!(result.symbols.contains_key("start"));
        assert!(!result.symbols.contains_key("CONST"));
    }

    #[test]
    fn local_labels_resolve_during_generation() {
        let result = generate("start:\n.halt: HLT\nJMP SHORT .halt");
        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.binary, [0xF4, 0xEB, 0xFD]);
    }
}
