// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Tokenizer for the preprocessed assembly text.
//!
//! Numbers come in four bases (`0x`/`h` hex, `0b`/`b` binary, `0o`/`o`/`q`
//! octal, `$` hex, decimal), `$` and `$$` are position markers, and
//! single-quoted one-character literals lex as numbers so they can appear
//! anywhere an immediate can.

use crate::ast::JumpType;
use crate::error::SourceLocation;
use crate::expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Db,
    Dw,
    Dd,
    Dq,
    Dt,
    Equ,
    Segment,
    Section,
    Ends,
    Org,
    Resb,
    Resw,
    Resd,
    Resq,
    Rest,
    Times,
}

impl Directive {
    pub fn is_data(self) -> bool {
        matches!(
            self,
            Directive::Db | Directive::Dw | Directive::Dd | Directive::Dq | Directive::Dt
        )
    }

    pub fn is_reserve(self) -> bool {
        matches!(
            self,
            Directive::Resb
                | Directive::Resw
                | Directive::Resd
                | Directive::Resq
                | Directive::Rest
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterInfo {
    pub size: u8,
    pub code: u8,
    pub is_segment: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(i64),
    /// Single-character quoted literal.
    CharLit(u8),
    /// Quoted literal, kept as raw bytes.
    Str(Vec<u8>),
    Ident,
    Mnemonic,
    Register(RegisterInfo),
    Directive(Directive),
    /// BYTE (8) or WORD (16) operand-size specifier.
    SizeSpec(u8),
    /// Optional PTR keyword after a size specifier.
    Ptr,
    JumpDist(JumpType),
    Plus,
    Minus,
    Star,
    Slash,
    Comma,
    Colon,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Dollar,
    DoubleDollar,
    Newline,
    Eof,
    Invalid,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub location: SourceLocation,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind,
            text: text.into(),
            location,
        }
    }

    pub fn number(&self) -> i64 {
        match self.kind {
            TokenKind::Number(v) => v,
            TokenKind::CharLit(b) => b as i64,
            _ => 0,
        }
    }

    pub fn is_segment_register(&self) -> bool {
        matches!(self.kind, TokenKind::Register(info) if info.is_segment)
    }
}

const MNEMONICS: &[&str] = &[
    "AAA", "AAD", "AAM", "AAS", "ADC", "ADD", "AND", "CALL", "CBW", "CLC", "CLD", "CLI", "CMC",
    "CMP", "CMPS", "CMPSB", "CMPSW", "CWD", "DAA", "DAS", "DEC", "DIV", "ESC", "HLT", "IDIV",
    "IMUL", "IN", "INC", "INT", "INT3", "INTO", "IRET", "JA", "JAE", "JB", "JBE", "JC", "JCXZ",
    "JE", "JG", "JGE", "JL", "JLE", "JMP", "JNA", "JNAE", "JNB", "JNBE", "JNC", "JNE", "JNG",
    "JNGE", "JNL", "JNLE", "JNO", "JNP", "JNS", "JNZ", "JO", "JP", "JPE", "JPO", "JS", "JZ",
    "LAHF", "LDS", "LEA", "LES", "LOCK", "LODS", "LODSB", "LODSW", "LOOP", "LOOPE", "LOOPNE",
    "LOOPNZ", "LOOPZ", "MOV", "MOVS", "MOVSB", "MOVSW", "MUL", "NEG", "NOP", "NOT", "OR", "OUT",
    "POP", "POPA", "POPF", "PUSH", "PUSHA", "PUSHF", "RCL", "RCR", "REP", "REPE", "REPNE",
    "REPNZ", "REPZ", "RET", "RETF", "ROL", "ROR", "SAHF", "SAL", "SAR", "SBB", "SCAS", "SCASB",
    "SCASW", "SHL", "SHR", "STC", "STD", "STI", "STOS", "STOSB", "STOSW", "SUB", "TEST", "WAIT",
    "XCHG", "XLAT", "XOR",
];

pub fn is_mnemonic(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    MNEMONICS.binary_search(&upper.as_str()).is_ok()
}

pub fn register_info(name: &str) -> Option<RegisterInfo> {
    let reg = |size, code, is_segment| {
        Some(RegisterInfo {
            size,
            code,
            is_segment,
        })
    };
    match name.to_ascii_uppercase().as_str() {
        "AL" => reg(8, 0, false),
        "CL" => reg(8, 1, false),
        "DL" => reg(8, 2, false),
        "BL" => reg(8, 3, false),
        "AH" => reg(8, 4, false),
        "CH" => reg(8, 5, false),
        "DH" => reg(8, 6, false),
        "BH" => reg(8, 7, false),
        "AX" => reg(16, 0, false),
        "CX" => reg(16, 1, false),
        "DX" => reg(16, 2, false),
        "BX" => reg(16, 3, false),
        "SP" => reg(16, 4, false),
        "BP" => reg(16, 5, false),
        "SI" => reg(16, 6, false),
        "DI" => reg(16, 7, false),
        "ES" => reg(16, 0, true),
        "CS" => reg(16, 1, true),
        "SS" => reg(16, 2, true),
        "DS" => reg(16, 3, true),
        _ => None,
    }
}

fn directive_keyword(upper: &str) -> Option<Directive> {
    Some(match upper {
        "DB" => Directive::Db,
        "DW" => Directive::Dw,
        "DD" => Directive::Dd,
        "DQ" => Directive::Dq,
        "DT" => Directive::Dt,
        "EQU" => Directive::Equ,
        "SEGMENT" => Directive::Segment,
        "SECTION" => Directive::Section,
        "ENDS" => Directive::Ends,
        "ORG" => Directive::Org,
        "RESB" => Directive::Resb,
        "RESW" => Directive::Resw,
        "RESD" => Directive::Resd,
        "RESQ" => Directive::Resq,
        "REST" => Directive::Rest,
        "TIMES" => Directive::Times,
        _ => return None,
    })
}

pub struct Lexer<'a> {
    source: &'a [u8],
    filename: String,
    current: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, filename: impl Into<String>) -> Self {
        Self {
            source: source.as_bytes(),
            filename: filename.into(),
            current: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            if self.is_at_end() {
                break;
            }
            let token = self.next_token();
            if token.kind != TokenKind::Invalid || !token.text.is_empty() {
                tokens.push(token);
            }
        }
        tokens.push(Token::new(TokenKind::Eof, "", self.location()));
        tokens
    }

    fn next_token(&mut self) -> Token {
        let loc = self.location();
        let c = self.peek();

        if c == b';' {
            while !self.is_at_end() && self.peek() != b'\n' {
                self.advance();
            }
            return Token::new(TokenKind::Newline, "\n", loc);
        }
        if c == b'\n' {
            self.advance();
            return Token::new(TokenKind::Newline, "\n", loc);
        }

        if c == b'$' {
            if self.peek_next() == b'$' {
                self.advance();
                self.advance();
                return Token::new(TokenKind::DoubleDollar, "$$", loc);
            }
            if self.peek_next().is_ascii_hexdigit() {
                return self.scan_number(loc);
            }
            self.advance();
            return Token::new(TokenKind::Dollar, "$", loc);
        }

        if c.is_ascii_digit() {
            return self.scan_number(loc);
        }
        if c == b'"' || c == b'\'' {
            return self.scan_quoted(loc, c);
        }
        if c.is_ascii_alphabetic() || c == b'_' || c == b'.' {
            return self.scan_identifier(loc);
        }
        if c == b'%' && self.peek_next().is_ascii_alphabetic() {
            // Stray preprocessor directive; lex it as an identifier and
            // let the parser complain in context.
            return self.scan_identifier(loc);
        }

        self.advance();
        let kind = match c {
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b',' => TokenKind::Comma,
            b':' => TokenKind::Colon,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            _ => TokenKind::Invalid,
        };
        Token::new(kind, (c as char).to_string(), loc)
    }

    fn scan_number(&mut self, loc: SourceLocation) -> Token {
        let start = self.current;
        if self.peek() == b'$' {
            self.advance();
            while self.peek().is_ascii_hexdigit() {
                self.advance();
            }
        } else {
            // Eat the alphanumeric run; base prefixes and suffixes are
            // sorted out by the shared number parser.
            while self.peek().is_ascii_alphanumeric() {
                self.advance();
            }
        }
        let text = String::from_utf8_lossy(&self.source[start..self.current]).into_owned();
        match expr::parse_number(&text) {
            Some(value) => Token::new(TokenKind::Number(value), text, loc),
            None => Token::new(TokenKind::Invalid, text, loc),
        }
    }

    fn scan_identifier(&mut self, loc: SourceLocation) -> Token {
        let start = self.current;
        if self.peek() == b'%' {
            self.advance();
        }
        loop {
            let c = self.peek();
            if c.is_ascii_alphanumeric() || c == b'_' || c == b'.' {
                self.advance();
            } else {
                break;
            }
        }
        let text = String::from_utf8_lossy(&self.source[start..self.current]).into_owned();
        let upper = text.to_ascii_uppercase();

        if let Some(info) = register_info(&upper) {
            return Token::new(TokenKind::Register(info), text, loc);
        }
        if let Some(dir) = directive_keyword(&upper) {
            return Token::new(TokenKind::Directive(dir), text, loc);
        }
        match upper.as_str() {
            "BYTE" => return Token::new(TokenKind::SizeSpec(8), text, loc),
            "WORD" => return Token::new(TokenKind::SizeSpec(16), text, loc),
            "PTR" => return Token::new(TokenKind::Ptr, text, loc),
            "SHORT" => return Token::new(TokenKind::JumpDist(JumpType::Short), text, loc),
            "NEAR" => return Token::new(TokenKind::JumpDist(JumpType::Near), text, loc),
            "FAR" => return Token::new(TokenKind::JumpDist(JumpType::Far), text, loc),
            _ => {}
        }
        // A mnemonic directly followed by ':' is a label definition.
        if is_mnemonic(&upper) && self.peek() != b':' {
            return Token::new(TokenKind::Mnemonic, text, loc);
        }
        Token::new(TokenKind::Ident, text, loc)
    }

    fn scan_quoted(&mut self, loc: SourceLocation, quote: u8) -> Token {
        self.advance();
        let mut value: Vec<u8> = Vec::new();
        while !self.is_at_end() && self.peek() != quote && self.peek() != b'\n' {
            if self.peek() == b'\\' {
                self.advance();
                if self.is_at_end() {
                    break;
                }
                let escaped = self.advance();
                match escaped {
                    b'n' => value.push(b'\n'),
                    b't' => value.push(b'\t'),
                    b'r' => value.push(b'\r'),
                    b'\\' => value.push(b'\\'),
                    b'"' => value.push(b'"'),
                    b'\'' => value.push(b'\''),
                    b'x' => {
                        if self.peek().is_ascii_hexdigit() && self.peek_next().is_ascii_hexdigit()
                        {
                            let hi = self.advance();
                            let lo = self.advance();
                            value.push((hex_digit(hi) << 4) | hex_digit(lo));
                        }
                    }
                    other => value.push(other),
                }
            } else {
                value.push(self.advance());
            }
        }
        if !self.is_at_end() && self.peek() == quote {
            self.advance();
        }

        let display = String::from_utf8_lossy(&value).into_owned();
        if quote == b'\'' && value.len() == 1 {
            return Token::new(TokenKind::CharLit(value[0]), format!("'{display}'"), loc);
        }
        Token::new(TokenKind::Str(value), display, loc)
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() {
            match self.peek() {
                b' ' | b'\t' | b'\r' => {
                    self.advance();
                }
                _ => break,
            }
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.source[self.current]
        }
    }

    fn peek_next(&self) -> u8 {
        if self.current + 1 >= self.source.len() {
            0
        } else {
            self.source[self.current + 1]
        }
    }

    fn advance(&mut self) -> u8 {
        if self.is_at_end() {
            return 0;
        }
        let c = self.source[self.current];
        self.current += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn location(&self) -> SourceLocation {
        SourceLocation::new(self.filename.clone(), self.line, self.column)
    }
}

fn hex_digit(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        b'A'..=b'F' => b - b'A' + 10,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source, "test.asm")
            .tokenize()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn numbers_in_all_bases() {
        let kinds = kinds("42 0x2A 2Ah 0b101010 101010b 0o52 52q $2A");
        for kind in &kinds[..8] {
            assert_eq!(*kind, TokenKind::Number(42), "got {kind:?}");
        }
    }

    #[test]
    fn dollar_forms() {
        assert_eq!(
            kinds("$ $$ $FF"),
            vec![
                TokenKind::Dollar,
                TokenKind::DoubleDollar,
                TokenKind::Number(0xFF),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn registers_carry_their_codes() {
        let tokens = Lexer::new("ax bl ds", "t").tokenize();
        assert_eq!(
            tokens[0].kind,
            TokenKind::Register(RegisterInfo {
                size: 16,
                code: 0,
                is_segment: false
            })
        );
        assert_eq!(
            tokens[1].kind,
            TokenKind::Register(RegisterInfo {
                size: 8,
                code: 3,
                is_segment: false
            })
        );
        assert_eq!(
            tokens[2].kind,
            TokenKind::Register(RegisterInfo {
                size: 16,
                code: 3,
                is_segment: true
            })
        );
    }

    #[test]
    fn mnemonic_followed_by_colon_is_a_label() {
        let tokens = Lexer::new("loop: LOOP start", "t").tokenize();
        assert_eq!(tokens[0].kind, TokenKind::Ident);
        assert_eq!(tokens[1].kind, TokenKind::Colon);
        assert_eq!(tokens[2].kind, TokenKind::Mnemonic);
        assert_eq!(tokens[3].kind, TokenKind::Ident);
    }

    #[test]
    fn comments_end_the_line() {
        assert_eq!(
            kinds("NOP ; trailing words $ [ ]"),
            vec![TokenKind::Mnemonic, TokenKind::Newline, TokenKind::Eof]
        );
    }

    #[test]
    fn char_literals_are_single_bytes() {
        let tokens = Lexer::new("'A' 'AB' \"hi\"", "t").tokenize();
        assert_eq!(tokens[0].kind, TokenKind::CharLit(b'A'));
        assert_eq!(tokens[1].kind, TokenKind::Str(b"AB".to_vec()));
        assert_eq!(tokens[2].kind, TokenKind::Str(b"hi".to_vec()));
    }

    #[test]
    fn string_escapes_are_byte_accurate() {
        let tokens = Lexer::new(r#""a\n\x41\xFF""#, "t").tokenize();
        assert_eq!(tokens[0].kind, TokenKind::Str(vec![b'a', b'\n', b'A', 0xFF]));
    }

    #[test]
    fn locations_are_one_based() {
        let tokens = Lexer::new("NOP\n  HLT", "t").tokenize();
        assert_eq!(tokens[0].location.line, 1);
        assert_eq!(tokens[0].location.column, 1);
        let hlt = &tokens[2];
        assert_eq!(hlt.location.line, 2);
        assert_eq!(hlt.location.column, 3);
    }

    #[test]
    fn int3_is_a_mnemonic() {
        assert_eq!(kinds("INT3")[0], TokenKind::Mnemonic);
    }
}
