// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Recursive-descent parser building the statement tree.
//!
//! Newline tokens are discarded up front; statement boundaries are
//! recovered syntactically, which is what lets a label share a line with
//! the statement it precedes. Operand text that cannot be settled at
//! parse time (symbolic immediates, bracketed address expressions, TIMES
//! counts) is carried as source text for the semantic passes.

use crate::ast::{
    DataDirective, DataValue, DataWidth, EndsDirective, EquDirective, Instruction, JumpType,
    Label, LabelRef, MemoryOperand, Operand, OrgDirective, Program, RegisterOperand,
    ReserveDirective, SegmentDirective, Statement, TimesDirective,
};
use crate::error::{Diagnostic, DiagnosticSink};
use crate::expr;
use crate::lexer::{Directive, Token, TokenKind};

/// Mnemonics that only ever take an 8-bit relative displacement.
const RELATIVE_ONLY: &[&str] = &[
    "JO", "JNO", "JB", "JC", "JNAE", "JNB", "JAE", "JNC", "JE", "JZ", "JNE", "JNZ", "JBE", "JNA",
    "JNBE", "JA", "JS", "JNS", "JP", "JPE", "JNP", "JPO", "JL", "JNGE", "JNL", "JGE", "JLE",
    "JNG", "JNLE", "JG", "LOOP", "LOOPE", "LOOPZ", "LOOPNE", "LOOPNZ", "JCXZ",
];

pub fn is_conditional_jump(mnemonic: &str) -> bool {
    let upper = mnemonic.to_ascii_uppercase();
    RELATIVE_ONLY.iter().any(|m| *m == upper)
}

/// Mnemonics whose identifier operands are label references rather than
/// symbolic immediates. LEA/LDS/LES take a label as a direct address.
fn takes_label_operand(mnemonic: &str) -> bool {
    let upper = mnemonic.to_ascii_uppercase();
    upper == "JMP"
        || upper == "CALL"
        || upper == "LEA"
        || upper == "LDS"
        || upper == "LES"
        || is_conditional_jump(&upper)
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    sink: DiagnosticSink,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let tokens: Vec<Token> = tokens
            .into_iter()
            .filter(|t| t.kind != TokenKind::Newline)
            .collect();
        Self {
            tokens,
            current: 0,
            sink: DiagnosticSink::new(),
        }
    }

    pub fn parse(mut self) -> (Program, Vec<Diagnostic>) {
        let mut program = Program::new();
        while !self.is_at_end() {
            if let Some(stmt) = self.parse_statement() {
                program.statements.push(stmt);
            }
        }
        (program, self.sink.take())
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        // Label definition: identifier followed by ':'.
        if self.check_ident() && self.peek_next_kind() == Some(&TokenKind::Colon) {
            return self.parse_label().map(Statement::Label);
        }

        // name EQU value
        if self.check_ident() && self.peek_next_kind() == Some(&TokenKind::Directive(Directive::Equ))
        {
            return self.parse_equ().map(Statement::Equ);
        }

        // NASM-style colon-free label before a data or reserve directive.
        if self.check_ident() {
            if let Some(TokenKind::Directive(dir)) = self.peek_next_kind() {
                if dir.is_data() || dir.is_reserve() {
                    let token = self.advance();
                    return Some(Statement::Label(Label {
                        name: token.text,
                        location: token.location,
                    }));
                }
            }
        }

        if let TokenKind::Directive(dir) = self.peek().kind {
            return match dir {
                Directive::Db | Directive::Dw | Directive::Dd | Directive::Dq | Directive::Dt => {
                    self.parse_data_directive().map(Statement::Data)
                }
                Directive::Org => self.parse_org().map(Statement::Org),
                Directive::Segment | Directive::Section => {
                    self.parse_segment().map(Statement::Segment)
                }
                Directive::Ends => self.parse_ends().map(Statement::Ends),
                Directive::Resb
                | Directive::Resw
                | Directive::Resd
                | Directive::Resq
                | Directive::Rest => self.parse_reserve().map(Statement::Reserve),
                Directive::Times => self.parse_times().map(Statement::Times),
                Directive::Equ => {
                    self.error("Must specify a name before EQU");
                    self.advance();
                    None
                }
            };
        }

        if self.peek().kind == TokenKind::Mnemonic {
            return self.parse_instruction().map(Statement::Instruction);
        }

        self.error("Expected instruction, label, or directive");
        self.advance();
        None
    }

    fn parse_label(&mut self) -> Option<Label> {
        let token = self.advance();
        self.expect(TokenKind::Colon, "Expected ':' after label")?;
        Some(Label {
            name: token.text,
            location: token.location,
        })
    }

    fn parse_instruction(&mut self) -> Option<Instruction> {
        let token = self.advance();
        let mut instr = Instruction::new(token.text.clone(), token.location);

        if !self.is_at_end() && self.is_operand_start() && !self.next_line_label_ahead() {
            if let Some(op) = self.parse_operand(&instr.mnemonic) {
                instr.operands.push(op);
            }
            while self.match_kind(&TokenKind::Comma) {
                if let Some(op) = self.parse_operand(&instr.mnemonic) {
                    instr.operands.push(op);
                }
            }
        }

        Some(instr)
    }

    /// An identifier that actually starts the next statement (a label or a
    /// colon-free data label) must not be eaten as an operand.
    fn next_line_label_ahead(&self) -> bool {
        if !self.check_ident() {
            return false;
        }
        match self.peek_next_kind() {
            Some(TokenKind::Colon) => true,
            Some(TokenKind::Directive(dir)) => {
                dir.is_data() || dir.is_reserve() || *dir == Directive::Equ
            }
            _ => false,
        }
    }

    fn parse_operand(&mut self, mnemonic: &str) -> Option<Operand> {
        let mut size_hint = 0u8;
        if let TokenKind::SizeSpec(bits) = self.peek().kind {
            size_hint = bits;
            self.advance();
            self.match_kind(&TokenKind::Ptr);
        }

        // Segment override written outside the brackets: ES:[DI]
        let mut segment_override: Option<String> = None;
        if self.peek().is_segment_register() && self.peek_next_kind() == Some(&TokenKind::Colon) {
            let seg = self.advance();
            self.advance();
            segment_override = Some(seg.text.to_ascii_uppercase());
        }

        if self.peek().kind == TokenKind::LBracket {
            return self
                .parse_memory(segment_override, size_hint)
                .map(Operand::Memory);
        }

        if let TokenKind::Register(info) = self.peek().kind {
            let token = self.advance();
            return Some(Operand::Register(RegisterOperand {
                name: token.text,
                size: info.size,
                code: info.code,
                is_segment: info.is_segment,
                location: token.location,
            }));
        }

        if matches!(
            self.peek().kind,
            TokenKind::Number(_) | TokenKind::CharLit(_) | TokenKind::Minus | TokenKind::Plus
        ) {
            return self.parse_immediate(size_hint).map(Operand::Immediate);
        }

        // Jump distance keyword, then a label reference or symbolic
        // immediate expression.
        let mut jump_type = if is_conditional_jump(mnemonic) {
            JumpType::Short
        } else {
            JumpType::Near
        };
        if let TokenKind::JumpDist(jt) = self.peek().kind {
            jump_type = jt;
            self.advance();
        }

        if self.check_ident() {
            let token = self.advance();
            let location = token.location.clone();
            let mut expression = token.text;

            // label+offset style continuation.
            while matches!(
                self.peek().kind,
                TokenKind::Plus | TokenKind::Minus | TokenKind::Star | TokenKind::Slash
            ) {
                let op = self.advance();
                expression.push_str(&op.text);
                match self.peek().kind {
                    TokenKind::Ident => expression.push_str(&self.advance().text),
                    TokenKind::Number(value) => {
                        self.advance();
                        expression.push_str(&value.to_string());
                    }
                    _ => {
                        self.error("Expected identifier or number after operator");
                        break;
                    }
                }
            }

            if takes_label_operand(mnemonic) {
                return Some(Operand::Label(LabelRef {
                    name: expression,
                    jump_type,
                    location,
                }));
            }
            return Some(Operand::Immediate(crate::ast::ImmediateOperand::symbolic(
                expression, size_hint, location,
            )));
        }

        self.error("Expected operand (register, immediate, or memory address)");
        None
    }

    fn parse_immediate(&mut self, size_hint: u8) -> Option<crate::ast::ImmediateOperand> {
        let location = self.peek().location.clone();
        let mut expr_text = String::new();
        let mut has_identifier = false;
        let mut last_was_operator = true;

        loop {
            match &self.peek().kind {
                TokenKind::Plus | TokenKind::Minus | TokenKind::Star | TokenKind::Slash => {
                    expr_text.push_str(&self.advance().text);
                    last_was_operator = true;
                }
                TokenKind::LParen => {
                    self.advance();
                    expr_text.push('(');
                    last_was_operator = true;
                }
                TokenKind::RParen => {
                    self.advance();
                    expr_text.push(')');
                    last_was_operator = false;
                }
                TokenKind::Number(value) => {
                    let value = *value;
                    self.advance();
                    expr_text.push_str(&value.to_string());
                    last_was_operator = false;
                }
                TokenKind::CharLit(byte) => {
                    let byte = *byte;
                    self.advance();
                    expr_text.push_str(&(byte as i64).to_string());
                    last_was_operator = false;
                }
                TokenKind::Ident if last_was_operator => {
                    expr_text.push_str(&self.advance().text);
                    has_identifier = true;
                    last_was_operator = false;
                }
                _ => break,
            }
        }

        if expr_text.is_empty() {
            self.error("Expected immediate value or expression");
            return None;
        }

        if has_identifier {
            return Some(crate::ast::ImmediateOperand::symbolic(
                expr_text, size_hint, location,
            ));
        }
        match expr::evaluate(&expr_text) {
            Some(value) => Some(crate::ast::ImmediateOperand::number(
                value, size_hint, location,
            )),
            None => {
                self.error(format!("Invalid expression: {expr_text}"));
                None
            }
        }
    }

    fn parse_memory(
        &mut self,
        segment_override: Option<String>,
        size_hint: u8,
    ) -> Option<MemoryOperand> {
        let location = self.peek().location.clone();
        self.expect(TokenKind::LBracket, "Expected '['")?;

        let mut address_expr = String::new();
        while self.peek().kind != TokenKind::RBracket && !self.is_at_end() {
            let token = self.advance();
            if !address_expr.is_empty() && needs_separator(&address_expr, &token.text) {
                address_expr.push(' ');
            }
            address_expr.push_str(&token.text);
        }
        self.expect(TokenKind::RBracket, "Expected ']'")?;

        let mut segment_override = segment_override;
        let mut address_expr = address_expr;

        // NASM also allows the override inside the brackets: [ES:DI].
        if let Some(colon) = address_expr.find(':') {
            let prefix = address_expr[..colon].trim().to_ascii_uppercase();
            if matches!(prefix.as_str(), "ES" | "CS" | "SS" | "DS") {
                segment_override = Some(prefix);
                address_expr = address_expr[colon + 1..].trim().to_string();
            }
        }

        let mut mem = MemoryOperand::new(address_expr, size_hint, location);
        mem.segment_override = segment_override;

        // Provisional parse without symbols; Pass 1 re-parses with the
        // symbol table once EQU constants exist.
        if let Some(parsed) = expr::parse_address(&mem.address_expr) {
            if parsed.registers.is_empty() && parsed.has_displacement && parsed.label.is_none() {
                mem.is_direct = true;
                mem.direct_value = parsed.displacement as u16;
            }
            mem.parsed = Some(parsed);
        }

        Some(mem)
    }

    fn parse_data_directive(&mut self) -> Option<DataDirective> {
        let token = self.advance();
        let width = match token.kind {
            TokenKind::Directive(Directive::Db) => DataWidth::Byte,
            TokenKind::Directive(Directive::Dw) => DataWidth::Word,
            TokenKind::Directive(Directive::Dd) => DataWidth::Dword,
            TokenKind::Directive(Directive::Dq) => DataWidth::Qword,
            TokenKind::Directive(Directive::Dt) => DataWidth::Tbyte,
            _ => {
                self.error("Invalid data directive");
                return None;
            }
        };

        let mut directive = DataDirective {
            width,
            values: Vec::new(),
            location: token.location,
        };

        loop {
            match &self.peek().kind {
                TokenKind::Str(bytes) => {
                    let bytes = bytes.clone();
                    self.advance();
                    directive.values.push(DataValue::Str(bytes));
                }
                TokenKind::CharLit(byte) => {
                    let byte = *byte;
                    self.advance();
                    directive.values.push(DataValue::Char(byte));
                }
                TokenKind::Number(value) => {
                    let value = *value;
                    self.advance();
                    directive.values.push(DataValue::Number(value));
                }
                TokenKind::Minus => {
                    self.advance();
                    match self.peek().kind {
                        TokenKind::Number(value) => {
                            self.advance();
                            directive.values.push(DataValue::Number(-value));
                        }
                        _ => {
                            self.error("Expected number after '-'");
                            return Some(directive);
                        }
                    }
                }
                TokenKind::Ident => {
                    let token = self.advance();
                    directive.values.push(DataValue::Symbol(token.text));
                }
                _ => {
                    self.error("Expected number, string, character literal, or symbol");
                    return Some(directive);
                }
            }
            if !self.match_kind(&TokenKind::Comma) {
                break;
            }
        }

        Some(directive)
    }

    fn parse_equ(&mut self) -> Option<EquDirective> {
        let name_token = self.advance();
        self.advance(); // EQU keyword

        let negative = self.match_kind(&TokenKind::Minus);
        let value = match self.peek().kind {
            TokenKind::Number(value) => {
                self.advance();
                value
            }
            TokenKind::CharLit(byte) => {
                self.advance();
                byte as i64
            }
            _ => {
                self.error("Expected numeric value after EQU");
                return None;
            }
        };

        Some(EquDirective {
            name: name_token.text,
            value: if negative { -value } else { value },
            location: name_token.location,
        })
    }

    fn parse_org(&mut self) -> Option<OrgDirective> {
        let org_token = self.advance();
        match self.peek().kind {
            TokenKind::Number(value) => {
                self.advance();
                Some(OrgDirective {
                    address: value,
                    location: org_token.location,
                })
            }
            _ => {
                self.error("Expected address after ORG");
                None
            }
        }
    }

    fn parse_segment(&mut self) -> Option<SegmentDirective> {
        let seg_token = self.advance();
        if self.check_ident() {
            let name = self.advance();
            Some(SegmentDirective {
                name: name.text,
                location: seg_token.location,
            })
        } else {
            self.error("Expected segment name");
            None
        }
    }

    fn parse_ends(&mut self) -> Option<EndsDirective> {
        let token = self.advance();
        // The relaxed bare form closes the current segment.
        Some(EndsDirective {
            name: String::new(),
            location: token.location,
        })
    }

    fn parse_reserve(&mut self) -> Option<ReserveDirective> {
        let token = self.advance();
        let width = match token.kind {
            TokenKind::Directive(Directive::Resb) => DataWidth::Byte,
            TokenKind::Directive(Directive::Resw) => DataWidth::Word,
            TokenKind::Directive(Directive::Resd) => DataWidth::Dword,
            TokenKind::Directive(Directive::Resq) => DataWidth::Qword,
            TokenKind::Directive(Directive::Rest) => DataWidth::Tbyte,
            _ => {
                self.error("Invalid reserve directive");
                return None;
            }
        };
        match self.peek().kind {
            TokenKind::Number(count) => {
                self.advance();
                Some(ReserveDirective {
                    width,
                    count,
                    location: token.location,
                })
            }
            _ => {
                self.error("Expected count after reserve directive");
                None
            }
        }
    }

    fn parse_times(&mut self) -> Option<TimesDirective> {
        let times_token = self.advance();

        // Collect the count expression text; it may use $, $$ and symbols
        // and is resolved during Pass 1 with position context.
        let mut count_expr = String::new();
        let mut last_was_value = false;
        loop {
            let is_value = matches!(
                self.peek().kind,
                TokenKind::Number(_)
                    | TokenKind::Ident
                    | TokenKind::Dollar
                    | TokenKind::DoubleDollar
            );
            // Two adjacent values mean the second one starts the body.
            if is_value && last_was_value {
                break;
            }
            match &self.peek().kind {
                TokenKind::Number(_)
                | TokenKind::Ident
                | TokenKind::Dollar
                | TokenKind::DoubleDollar => {
                    count_expr.push_str(&self.advance().text);
                    last_was_value = true;
                }
                TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::LParen => {
                    count_expr.push_str(&self.advance().text);
                    last_was_value = false;
                }
                TokenKind::RParen => {
                    count_expr.push_str(&self.advance().text);
                    last_was_value = true;
                }
                _ => break,
            }
        }

        if count_expr.is_empty() {
            self.error("Expected count (number or expression) after TIMES");
            return None;
        }

        let count = expr::evaluate(&count_expr).unwrap_or(-1);

        let body = match self.parse_statement() {
            Some(stmt) => stmt,
            None => {
                self.error("Expected statement after TIMES directive");
                return None;
            }
        };

        Some(TimesDirective {
            count,
            count_expr,
            body: Box::new(body),
            location: times_token.location,
        })
    }

    fn is_operand_start(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Register(_)
                | TokenKind::Number(_)
                | TokenKind::CharLit(_)
                | TokenKind::Ident
                | TokenKind::LBracket
                | TokenKind::SizeSpec(_)
                | TokenKind::Minus
                | TokenKind::Plus
                | TokenKind::JumpDist(_)
        )
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn peek_next_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.current + 1).map(|t| &t.kind)
    }

    fn check_ident(&self) -> bool {
        self.peek().kind == TokenKind::Ident
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.current.min(self.tokens.len() - 1)].clone();
        if self.current < self.tokens.len() - 1 {
            self.current += 1;
        }
        token
    }

    fn match_kind(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            return true;
        }
        false
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Option<Token> {
        if self.peek().kind == kind {
            return Some(self.advance());
        }
        self.error(message);
        None
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn error(&mut self, message: impl Into<String>) {
        let location = self.peek().location.clone();
        self.sink.error(message, location);
    }
}

/// Keep a space between adjacent word-like tokens when reconstructing a
/// bracketed address expression.
fn needs_separator(built: &str, next: &str) -> bool {
    let last = built.chars().last().unwrap_or(' ');
    let first = next.chars().next().unwrap_or(' ');
    let wordish = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$';
    wordish(last) && wordish(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(source: &str) -> (Program, Vec<Diagnostic>) {
        Parser::new(Lexer::new(source, "test.asm").tokenize()).parse()
    }

    fn parse_ok(source: &str) -> Program {
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "parse errors: {errors:?}");
        program
    }

    #[test]
    fn label_and_instruction_on_one_line() {
        let program = parse_ok("start: CLI");
        assert_eq!(program.statements.len(), 2);
        assert!(matches!(&program.statements[0], Statement::Label(l) if l.name == "start"));
        assert!(
            matches!(&program.statements[1], Statement::Instruction(i) if i.mnemonic == "CLI")
        );
    }

    #[test]
    fn colon_free_data_label() {
        let program = parse_ok("msg DB \"hi\", 0");
        assert!(matches!(&program.statements[0], Statement::Label(l) if l.name == "msg"));
        match &program.statements[1] {
            Statement::Data(d) => {
                assert_eq!(d.width, DataWidth::Byte);
                assert_eq!(d.values.len(), 2);
            }
            other => panic!("expected data directive, got {other:?}"),
        }
    }

    #[test]
    fn register_operands_carry_codes() {
        let program = parse_ok("MOV AX, BX");
        match &program.statements[0] {
            Statement::Instruction(i) => {
                let dst = i.operands[0].as_register().unwrap();
                let src = i.operands[1].as_register().unwrap();
                assert_eq!((dst.code, dst.size), (0, 16));
                assert_eq!((src.code, src.size), (3, 16));
            }
            other => panic!("expected instruction, got {other:?}"),
        }
    }

    #[test]
    fn memory_operand_with_segment_override() {
        let program = parse_ok("MOV AX, ES:[DI]\nMOV BX, [SS:SI]");
        for stmt in &program.statements {
            let Statement::Instruction(i) = stmt else {
                panic!("expected instruction");
            };
            let mem = i.operands[1].as_memory().unwrap();
            assert!(mem.segment_override.is_some());
            assert!(!mem.parsed.as_ref().unwrap().registers.is_empty());
        }
    }

    #[test]
    fn direct_memory_operand() {
        let program = parse_ok("MOV AX, [0x1234]");
        let Statement::Instruction(i) = &program.statements[0] else {
            panic!();
        };
        let mem = i.operands[1].as_memory().unwrap();
        assert!(mem.is_direct);
        assert_eq!(mem.direct_value, 0x1234);
    }

    #[test]
    fn conditional_jump_defaults_to_short() {
        let program = parse_ok("JE .done\nJMP start\nJMP SHORT start");
        let jumps: Vec<JumpType> = program
            .statements
            .iter()
            .map(|s| match s {
                Statement::Instruction(i) => i.operands[0].as_label().unwrap().jump_type,
                _ => panic!(),
            })
            .collect();
        assert_eq!(jumps, vec![JumpType::Short, JumpType::Near, JumpType::Short]);
    }

    #[test]
    fn symbolic_immediate_for_non_jump() {
        let program = parse_ok("MOV AX, VIDEO_MEM");
        let Statement::Instruction(i) = &program.statements[0] else {
            panic!();
        };
        let imm = i.operands[1].as_immediate().unwrap();
        assert_eq!(imm.symbol.as_deref(), Some("VIDEO_MEM"));
    }

    #[test]
    fn size_hint_from_byte_keyword() {
        let program = parse_ok("MOV BYTE [BX], 5\nADD AX, BYTE 1");
        let Statement::Instruction(i) = &program.statements[0] else {
            panic!();
        };
        assert_eq!(i.operands[0].as_memory().unwrap().size_hint, 8);
        let Statement::Instruction(i) = &program.statements[1] else {
            panic!();
        };
        assert_eq!(i.operands[1].as_immediate().unwrap().size_hint, 8);
    }

    #[test]
    fn times_with_position_expression() {
        let program = parse_ok("TIMES 510-($-$$) DB 0");
        let Statement::Times(t) = &program.statements[0] else {
            panic!();
        };
        assert_eq!(t.count_expr, "510-($-$$)");
        assert_eq!(t.count, -1);
        assert!(matches!(&*t.body, Statement::Data(_)));
    }

    #[test]
    fn times_with_literal_count() {
        let program = parse_ok("TIMES 3 NOP");
        let Statement::Times(t) = &program.statements[0] else {
            panic!();
        };
        assert_eq!(t.count, 3);
        assert!(matches!(&*t.body, Statement::Instruction(_)));
    }

    #[test]
    fn equ_directive() {
        let program = parse_ok("VIDEO EQU 0xB800");
        let Statement::Equ(e) = &program.statements[0] else {
            panic!();
        };
        assert_eq!(e.name, "VIDEO");
        assert_eq!(e.value, 0xB800);
    }

    #[test]
    fn unknown_statement_reports_and_recovers() {
        let (program, errors) = parse("]]\nNOP");
        assert!(!errors.is_empty());
        assert_eq!(program.statements.len(), 1);
    }

    #[test]
    fn negative_immediate() {
        let program = parse_ok("ADD AL, -5");
        let Statement::Instruction(i) = &program.statements[0] else {
            panic!();
        };
        assert_eq!(i.operands[1].as_immediate().unwrap().value, -5);
    }
}
