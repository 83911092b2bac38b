// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Multi-pass semantic analysis.
//!
//! Pass 1 walks the statement tree in order: it defines symbols, assigns
//! every instruction its absolute address and estimated size, resolves
//! memory-operand expressions against the symbols known so far, and
//! tracks segments. Recoverable errors accumulate in the sink and the
//! walk continues, so a failed run still yields a usable partial layout.
//! Pass 2 is a verification sweep that reports any symbol left
//! unresolved. The size estimator must reproduce the encoder's byte
//! count exactly; every rule here has a counterpart in the encoder's
//! form emitters.

use crate::ast::{
    DataDirective, Instruction, JumpType, MemoryOperand, Operand, Program, RegisterOperand,
    Statement,
};
use crate::error::{Diagnostic, DiagnosticSink, SourceLocation};
use crate::expr;
use crate::parser::is_conditional_jump;
use crate::symbol_table::{SymbolKind, SymbolTable};

/// Mnemonics that end straight-line control flow; used for the
/// code-into-data fall-through warning.
const TERMINATORS: &[&str] = &["HLT", "RET", "RETF", "IRET", "JMP", "INT"];

#[derive(Debug, Clone)]
pub struct SegmentInfo {
    pub name: String,
    pub start_address: u64,
    pub current_address: u64,
}

pub struct SemanticAnalyzer {
    symbols: SymbolTable,
    sink: DiagnosticSink,
    current_address: u64,
    segment_start: u64,
    origin_address: u64,
    segments: Vec<SegmentInfo>,
    current_segment: String,
    last_was_terminator: bool,
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        Self {
            symbols: SymbolTable::new(),
            sink: DiagnosticSink::new(),
            current_address: 0,
            segment_start: 0,
            origin_address: 0,
            segments: Vec::new(),
            current_segment: String::new(),
            last_was_terminator: false,
        }
    }

    /// Fresh state for one run; `origin` seeds the program counter until
    /// an `ORG` directive overrides it.
    pub fn reset(&mut self, origin: u64) {
        self.symbols.clear();
        self.sink.clear();
        self.current_address = origin;
        self.segment_start = origin;
        self.origin_address = origin;
        self.segments.clear();
        self.current_segment.clear();
        self.last_was_terminator = false;
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub fn origin_address(&self) -> u64 {
        self.origin_address
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.sink.take()
    }

    pub fn analyze(&mut self, program: &mut Program) -> bool {
        self.pass1(program);
        self.pass2_verify();
        !self.sink.has_errors()
    }

    fn pass1(&mut self, program: &mut Program) {
        for statement in &mut program.statements {
            self.pass1_statement(statement);
        }
    }

    /// Recoverable problems are recorded and the walk continues, skipping
    /// only the update the bad statement would have made, so later
    /// statements still get a usable layout.
    fn pass1_statement(&mut self, statement: &mut Statement) {
        match statement {
            Statement::Label(label) => {
                if !SymbolTable::is_local_label(&label.name) {
                    self.symbols.set_global_scope(&label.name);
                }
                if !self.symbols.define(
                    &label.name,
                    SymbolKind::Label,
                    self.current_address as i64,
                    label.location.line,
                ) {
                    self.sink.error(
                        format!("Label '{}' already defined", label.name),
                        label.location.clone(),
                    );
                }
            }
            Statement::Equ(equ) => {
                if !self.symbols.define(
                    &equ.name,
                    SymbolKind::Constant,
                    equ.value,
                    equ.location.line,
                ) {
                    self.sink.error(
                        format!("Constant '{}' already defined", equ.name),
                        equ.location.clone(),
                    );
                }
            }
            Statement::Org(org) => {
                self.set_origin(org.address as u64);
            }
            Statement::Segment(segment) => {
                self.enter_segment(&segment.name, &segment.location);
                // Segment names like .data must not scope as local labels.
                let saved_scope = self.symbols.global_scope().to_string();
                self.symbols.set_global_scope("");
                if !self.symbols.define(
                    &segment.name,
                    SymbolKind::Label,
                    self.current_address as i64,
                    segment.location.line,
                ) {
                    self.symbols
                        .update(&segment.name, self.current_address as i64);
                }
                self.symbols.set_global_scope(&saved_scope);
            }
            Statement::Ends(ends) => {
                self.exit_segment(&ends.name, &ends.location);
            }
            Statement::Reserve(reserve) => {
                if reserve.count < 0 {
                    self.sink.error(
                        format!("Reserve count is negative: {}", reserve.count),
                        reserve.location.clone(),
                    );
                } else {
                    self.current_address += reserve.width.bytes() * reserve.count as u64;
                }
            }
            Statement::Data(data) => {
                self.resolve_data_symbols(data);
                self.current_address += data_size(data);
            }
            Statement::Times(times) => {
                if times.count < 0 {
                    let resolved = {
                        let symbols = &self.symbols;
                        let lookup = |name: &str| {
                            symbols
                                .lookup(name)
                                .filter(|s| s.resolved)
                                .map(|s| s.value)
                        };
                        expr::evaluate_with_context_and_symbols(
                            &times.count_expr,
                            self.current_address,
                            self.segment_start,
                            &lookup,
                        )
                    };
                    match resolved {
                        Some(count) => times.count = count,
                        None => {
                            self.sink.error(
                                format!("Invalid TIMES count: {}", times.count_expr),
                                times.location.clone(),
                            );
                            times.count = 0;
                        }
                    }
                }
                if times.count < 0 {
                    self.sink.error(
                        format!("TIMES count is negative: {}", times.count),
                        times.location.clone(),
                    );
                    times.count = 0;
                }

                let single = match &mut *times.body {
                    Statement::Data(data) => {
                        self.resolve_data_symbols(data);
                        data_size(data)
                    }
                    Statement::Instruction(instr) => {
                        self.resolve_memory_operands(instr);
                        instr.assigned_address = self.current_address;
                        let size = self.calculate_instruction_size(instr);
                        instr.estimated_size = size;
                        size
                    }
                    _ => 0,
                };
                self.current_address += single * times.count as u64;
            }
            Statement::Instruction(instr) => {
                self.resolve_memory_operands(instr);
                let size = self.calculate_instruction_size(instr);
                instr.assigned_address = self.current_address;
                instr.estimated_size = size;
                self.current_address += size;

                let upper = instr.mnemonic.to_ascii_uppercase();
                self.last_was_terminator = TERMINATORS.contains(&upper.as_str());
            }
        }
    }

    /// All labels resolve during Pass 1; this sweep only reports leftovers
    /// so the "every surviving reference resolves" contract is checked in
    /// one place.
    fn pass2_verify(&mut self) {
        let unresolved: Vec<String> = self
            .symbols
            .all_symbols()
            .filter(|(_, symbol)| !symbol.resolved)
            .map(|(key, _)| key.clone())
            .collect();
        for name in unresolved {
            self.sink
                .error(format!("Undefined symbol: {name}"), SourceLocation::default());
        }
    }

    fn set_origin(&mut self, address: u64) {
        self.origin_address = address;
        self.current_address = address;
        self.segment_start = address;
    }

    fn enter_segment(&mut self, name: &str, location: &SourceLocation) {
        if !self.current_segment.is_empty()
            && is_code_segment(&self.current_segment)
            && is_data_segment(name)
            && !self.last_was_terminator
        {
            self.sink.warning(
                format!(
                    "Code segment '{}' may fall through into data segment '{}'; \
                     add HLT, JMP, or RET before the data section",
                    self.current_segment, name
                ),
                location.clone(),
            );
        }
        self.last_was_terminator = false;

        // Re-entering a named segment resumes from its stored address.
        if let Some(seg) = self.segments.iter().find(|s| s.name == name) {
            self.current_segment = name.to_string();
            self.current_address = seg.current_address;
            self.segment_start = seg.start_address;
            return;
        }

        self.segments.push(SegmentInfo {
            name: name.to_string(),
            start_address: self.current_address,
            current_address: self.current_address,
        });
        self.current_segment = name.to_string();
        self.segment_start = self.current_address;
    }

    fn exit_segment(&mut self, name: &str, location: &SourceLocation) {
        let target = if name.is_empty() {
            self.current_segment.clone()
        } else {
            name.to_string()
        };
        if target.is_empty() {
            self.sink
                .error("ENDS without matching SEGMENT", location.clone());
            return;
        }
        match self.segments.iter_mut().find(|s| s.name == target) {
            Some(seg) => seg.current_address = self.current_address,
            None => self
                .sink
                .error("ENDS without matching SEGMENT", location.clone()),
        }
    }

    /// An unresolved value stays symbolic (the generator emits zeros for
    /// it), so the directive keeps its size and the layout stays intact.
    fn resolve_data_symbols(&mut self, data: &mut DataDirective) {
        for value in &mut data.values {
            if let crate::ast::DataValue::Symbol(name) = value {
                match self.symbols.lookup(name).filter(|s| s.resolved) {
                    Some(symbol) => *value = crate::ast::DataValue::Number(symbol.value),
                    None => {
                        self.sink.error(
                            format!("Undefined symbol: {name}"),
                            data.location.clone(),
                        );
                    }
                }
            }
        }
    }

    /// Re-parse every memory operand with symbol substitution. EQU names
    /// inside brackets fold into the displacement; a register-free,
    /// label-free result becomes a direct address. A malformed expression
    /// is reported and left unparsed; the encoder rejects it again during
    /// generation.
    fn resolve_memory_operands(&mut self, instr: &mut Instruction) {
        for operand in &mut instr.operands {
            if let Operand::Memory(mem) = operand {
                let parsed = {
                    let symbols = &self.symbols;
                    let lookup = |name: &str| {
                        symbols
                            .lookup(name)
                            .filter(|s| s.resolved)
                            .map(|s| s.value)
                    };
                    expr::parse_address_with_symbols(&mem.address_expr, &lookup)
                };
                match parsed {
                    Some(parsed) => {
                        if parsed.registers.is_empty() && parsed.label.is_none() {
                            mem.is_direct = true;
                            mem.direct_value = parsed.displacement as u16;
                        } else {
                            mem.is_direct = false;
                        }
                        mem.parsed = Some(parsed);
                    }
                    None => {
                        self.sink.error(
                            format!("Invalid memory operand: {}", mem.address_expr),
                            mem.location.clone(),
                        );
                    }
                }
            }
        }
    }

    /// Size of one encoded instruction in bytes. Every arm mirrors the
    /// byte layout the encoder emits for the same operand shape.
    pub fn calculate_instruction_size(&self, instr: &Instruction) -> u64 {
        let mnemonic = instr.mnemonic.to_ascii_uppercase();
        let ops = &instr.operands;

        if ops.is_empty() && is_single_byte_mnemonic(&mnemonic) {
            return 1;
        }

        if (mnemonic == "RET" || mnemonic == "RETF") && ops.len() == 1 {
            return 3;
        }

        if mnemonic == "JMP" || mnemonic == "CALL" {
            if ops.len() == 1 {
                return match &ops[0] {
                    Operand::Label(label) => {
                        if mnemonic == "CALL" {
                            3
                        } else if label.jump_type == JumpType::Short {
                            2
                        } else {
                            3
                        }
                    }
                    Operand::Memory(mem) => seg_len(mem) + 1 + memory_encoding_size(mem),
                    _ => 2, // register indirect
                };
            }
            return 3;
        }

        if is_conditional_jump(&mnemonic) {
            return 2;
        }

        if mnemonic == "INT" && ops.len() == 1 {
            // INT 3 folds to the one-byte breakpoint opcode.
            if let Some(imm) = ops[0].as_immediate() {
                if imm.symbol.is_none() && imm.value == 3 {
                    return 1;
                }
            }
            return 2;
        }

        if (mnemonic == "IN" || mnemonic == "OUT") && ops.len() == 2 {
            let has_imm = ops.iter().any(|op| op.as_immediate().is_some());
            return if has_imm { 2 } else { 1 };
        }

        if mnemonic == "MOV" && ops.len() == 2 {
            return self.mov_size(ops);
        }

        if (mnemonic == "PUSH" || mnemonic == "POP") && ops.len() == 1 {
            return match &ops[0] {
                Operand::Register(_) => 1,
                Operand::Memory(mem) => seg_len(mem) + 1 + memory_encoding_size(mem),
                _ => 2,
            };
        }

        if (mnemonic == "INC" || mnemonic == "DEC") && ops.len() == 1 {
            return match &ops[0] {
                Operand::Register(reg) if reg.size == 16 => 1,
                Operand::Register(_) => 2,
                Operand::Memory(mem) => seg_len(mem) + 1 + memory_encoding_size(mem),
                _ => 2,
            };
        }

        if matches!(
            mnemonic.as_str(),
            "ADD" | "ADC" | "SUB" | "SBB" | "CMP" | "AND" | "OR" | "XOR"
        ) && ops.len() == 2
        {
            return alu_size(ops);
        }

        if mnemonic == "TEST" && ops.len() == 2 {
            return test_size(ops);
        }

        if matches!(
            mnemonic.as_str(),
            "ROL" | "ROR" | "RCL" | "RCR" | "SHL" | "SHR" | "SAL" | "SAR"
        ) && !ops.is_empty()
        {
            return match &ops[0] {
                Operand::Memory(mem) => seg_len(mem) + 1 + memory_encoding_size(mem),
                _ => 2,
            };
        }

        if matches!(
            mnemonic.as_str(),
            "NOT" | "NEG" | "MUL" | "IMUL" | "DIV" | "IDIV"
        ) && ops.len() == 1
        {
            return match &ops[0] {
                Operand::Memory(mem) => seg_len(mem) + 1 + memory_encoding_size(mem),
                _ => 2,
            };
        }

        if matches!(mnemonic.as_str(), "LEA" | "LDS" | "LES") && ops.len() == 2 {
            return match &ops[1] {
                Operand::Memory(mem) => seg_len(mem) + 1 + memory_encoding_size(mem),
                _ => 4, // label operand: opcode + ModR/M + disp16
            };
        }

        if mnemonic == "XCHG" && ops.len() == 2 {
            let is_ax16 = |reg: &RegisterOperand| reg.size == 16 && reg.code == 0 && !reg.is_segment;
            let reg0 = ops[0].as_register();
            let reg1 = ops[1].as_register();
            if let (Some(a), Some(b)) = (reg0, reg1) {
                if is_ax16(a) || is_ax16(b) {
                    return 1;
                }
                return 2;
            }
            if let Some(mem) = ops[0].as_memory().or_else(|| ops[1].as_memory()) {
                return seg_len(mem) + 1 + memory_encoding_size(mem);
            }
            return 2;
        }

        // Accepted but not sized above; keeps layout moving for mnemonics
        // the encoder will reject anyway.
        3
    }

    fn mov_size(&self, ops: &[Operand]) -> u64 {
        let dst_reg = ops[0].as_register();
        let src_reg = ops[1].as_register();
        let dst_mem = ops[0].as_memory();
        let src_mem = ops[1].as_memory();
        let imm = ops[1].as_immediate();

        if let (Some(reg), Some(_)) = (dst_reg, imm) {
            return if reg.size == 16 { 3 } else { 2 };
        }
        if dst_reg.is_some() && src_reg.is_some() {
            return 2;
        }

        if let Some(mem) = dst_mem.or(src_mem) {
            let seg = seg_len(mem);
            if let (Some(mem), Some(imm)) = (dst_mem, imm) {
                let imm_width = if mem.size_hint == 16 || (mem.size_hint == 0 && imm.value > 255)
                {
                    2
                } else {
                    1
                };
                return seg + 1 + memory_encoding_size(mem) + imm_width;
            }

            // Accumulator to/from a register-free address uses the moffs
            // encoding: opcode + 16-bit offset.
            let accumulator = |reg: Option<&RegisterOperand>| {
                reg.map_or(false, |r| r.code == 0 && !r.is_segment)
            };
            if (accumulator(dst_reg) && src_mem.is_some())
                || (accumulator(src_reg) && dst_mem.is_some())
            {
                let is_moffs = mem.is_direct
                    || mem.parsed.as_ref().map_or(false, |p| p.registers.is_empty());
                if is_moffs {
                    return seg + 3;
                }
            }

            return seg + 1 + memory_encoding_size(mem);
        }

        // e.g. MOV reg, label-expression immediate keeps the register form.
        3
    }
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn alu_size(ops: &[Operand]) -> u64 {
    let reg0 = ops[0].as_register();

    if let Some(imm) = ops[1].as_immediate() {
        if let Some(reg) = reg0 {
            if reg.code == 0 && !reg.is_segment {
                return if reg.size == 16 { 3 } else { 2 };
            }
        }
        if let Some(mem) = ops[0].as_memory() {
            let imm_width = if mem.size_hint == 16 { 2 } else { 1 };
            return seg_len(mem) + 1 + memory_encoding_size(mem) + imm_width;
        }
        if let Some(reg) = reg0 {
            if reg.size == 16 {
                // imm8 hint selects the sign-extended 0x83 form.
                return if imm.size_hint == 8 { 3 } else { 4 };
            }
            return 3;
        }
        return 4;
    }

    if reg0.is_some() && ops[1].as_register().is_some() {
        return 2;
    }
    if let Some(mem) = ops[0].as_memory().or_else(|| ops[1].as_memory()) {
        return seg_len(mem) + 1 + memory_encoding_size(mem);
    }
    4
}

fn test_size(ops: &[Operand]) -> u64 {
    let reg0 = ops[0].as_register();
    if let Some(_imm) = ops[1].as_immediate() {
        if let Some(reg) = reg0 {
            if reg.code == 0 && !reg.is_segment {
                return if reg.size == 16 { 3 } else { 2 };
            }
            return if reg.size == 16 { 4 } else { 3 };
        }
        if let Some(mem) = ops[0].as_memory() {
            let imm_width = if mem.size_hint == 16 { 2 } else { 1 };
            return seg_len(mem) + 1 + memory_encoding_size(mem) + imm_width;
        }
        return 3;
    }
    2
}

fn data_size(data: &DataDirective) -> u64 {
    data.values
        .iter()
        .map(|value| value.byte_size(data.width))
        .sum()
}

fn seg_len(mem: &MemoryOperand) -> u64 {
    mem.segment_override.is_some() as u64
}

/// ModR/M byte plus displacement bytes for a memory operand; identical to
/// what the ModR/M computer will emit.
pub fn memory_encoding_size(mem: &MemoryOperand) -> u64 {
    if mem.is_direct {
        return 3;
    }
    match &mem.parsed {
        Some(parsed) => {
            if parsed.registers.is_empty() {
                return 3;
            }
            if !parsed.has_displacement && parsed.label.is_none() {
                if parsed.registers.len() == 1 && parsed.registers[0].eq_ignore_ascii_case("BP") {
                    return 2;
                }
                return 1;
            }
            if parsed.label.is_some() {
                return 3;
            }
            if (-128..=127).contains(&parsed.displacement) {
                2
            } else {
                3
            }
        }
        None => 3,
    }
}

fn is_single_byte_mnemonic(mnemonic: &str) -> bool {
    matches!(
        mnemonic,
        "MOVSB" | "MOVSW" | "CMPSB" | "CMPSW" | "SCASB" | "SCASW" | "LODSB" | "LODSW" | "STOSB"
            | "STOSW" | "NOP" | "HLT" | "RET" | "RETF" | "IRET" | "PUSHA" | "POPA" | "PUSHF"
            | "POPF" | "CLC" | "STC" | "CMC" | "CLD" | "STD" | "CLI" | "STI" | "CBW" | "CWD"
            | "LAHF" | "SAHF" | "AAA" | "AAS" | "AAM" | "AAD" | "DAA" | "DAS" | "XLAT" | "WAIT"
            | "LOCK" | "INT3" | "INTO" | "REP" | "REPE" | "REPZ" | "REPNE" | "REPNZ"
    )
}

fn is_code_segment(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        ".text" | "text" | ".code" | "code" | "_text" | "_code"
    )
}

fn is_data_segment(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        ".data" | "data" | ".bss" | "bss" | ".rodata" | "rodata" | "_data" | "_bss"
    )
}
