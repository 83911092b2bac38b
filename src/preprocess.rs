// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Text-level preprocessor run before the lexer.
//!
//! Supports `%define`/`%undef`, nested `%if`/`%elif`/`%else`/`%endif` and
//! `%ifdef`/`%ifndef`, NASM-style `%macro name argc` … `%endmacro` with
//! `%1..%n` parameters, `%include`, and trailing-backslash line
//! continuation. Substitution is purely textual; there is no macro
//! hygiene. Skipped branches and directive lines leave an empty line in
//! the output so downstream line numbers still match the input.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Diagnostic, Severity, SourceLocation};

const MAX_INCLUDE_DEPTH: usize = 16;

#[derive(Debug, Clone)]
struct MacroDefinition {
    name: String,
    param_count: usize,
    body: Vec<String>,
    line_defined: u32,
}

#[derive(Debug, Clone, Copy)]
struct CondBlock {
    is_true: bool,
    has_true_branch: bool,
    line: u32,
}

#[derive(Debug)]
pub struct PreprocessResult {
    pub lines: Vec<String>,
    pub errors: Vec<Diagnostic>,
    pub success: bool,
}

impl PreprocessResult {
    pub fn source(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

#[derive(Debug, Default)]
pub struct Preprocessor {
    defines: BTreeMap<String, String>,
    macros: HashMap<String, MacroDefinition>,
    include_paths: Vec<String>,
    errors: Vec<Diagnostic>,
    cond_stack: Vec<CondBlock>,
    output: Vec<String>,
    recording: Option<MacroDefinition>,
    include_depth: usize,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_include_paths(&mut self, paths: Vec<String>) {
        self.include_paths = paths;
    }

    /// Predefine a constant, as the CLI's `-D NAME[=VAL]` does.
    pub fn define(&mut self, name: &str, value: &str) {
        self.defines.insert(name.to_string(), value.to_string());
    }

    pub fn process(mut self, source: &str, filename: &str) -> PreprocessResult {
        self.process_lines(source, filename);

        if let Some(block) = self.cond_stack.last() {
            self.errors.push(Diagnostic::new(
                "Unclosed conditional block (missing %endif)",
                SourceLocation::new(filename, block.line, 1),
                Severity::Error,
            ));
        }
        if let Some(recording) = &self.recording {
            self.errors.push(Diagnostic::new(
                "Unclosed macro definition (missing %endmacro)",
                SourceLocation::new(filename, recording.line_defined, 1),
                Severity::Error,
            ));
        }

        let success = self.errors.iter().all(|e| !e.is_error());
        PreprocessResult {
            lines: self.output,
            errors: self.errors,
            success,
        }
    }

    fn process_lines(&mut self, source: &str, filename: &str) {
        let raw: Vec<&str> = source.lines().collect();
        let mut i = 0;
        while i < raw.len() {
            let line_num = (i + 1) as u32;
            let mut line = raw[i].to_string();
            while line.ends_with('\\') {
                line.pop();
                if i + 1 < raw.len() {
                    i += 1;
                    line.push_str(raw[i]);
                } else {
                    self.error("Line continuation at end of file", filename, line_num);
                    break;
                }
            }
            i += 1;

            let trimmed = line.trim().to_string();
            if trimmed.is_empty() || trimmed.starts_with(';') {
                self.emit_if_active(&trimmed);
                continue;
            }

            if let Some(directive) = directive_name(&trimmed) {
                self.handle_directive(&directive, &trimmed, filename, line_num);
                continue;
            }

            if let Some(recording) = &mut self.recording {
                recording.body.push(trimmed);
                self.output.push(String::new());
                continue;
            }
            if !self.active() {
                self.output.push(String::new());
                continue;
            }

            let expanded = self.expand_defines(&trimmed);
            if let Some((name, args)) = self.match_macro_invocation(&expanded) {
                self.expand_macro(&name, &args, filename, line_num);
            } else {
                self.output.push(expanded);
            }
        }
    }

    fn handle_directive(&mut self, directive: &str, line: &str, filename: &str, line_num: u32) {
        // Conditional directives run even inside skipped regions so the
        // nesting stays balanced; everything else only runs when active.
        match directive {
            "ifdef" | "ifndef" | "if" | "elif" | "else" | "endif" => {}
            "endmacro" if self.recording.is_some() => {}
            _ => {
                if self.recording.is_some() || !self.active() {
                    self.output.push(String::new());
                    return;
                }
            }
        }

        match directive {
            "define" => {
                let rest = directive_argument(line, "define");
                match rest.split_once(char::is_whitespace) {
                    Some((name, value)) => self.define(name.trim(), value.trim()),
                    None if !rest.is_empty() => self.define(&rest, ""),
                    None => self.error("%define requires a name", filename, line_num),
                }
            }
            "undef" => {
                let name = directive_argument(line, "undef");
                if name.is_empty() {
                    self.error("%undef requires a name", filename, line_num);
                } else {
                    self.defines.remove(&name);
                }
            }
            "ifdef" | "ifndef" => {
                let name = directive_argument(line, directive);
                if name.is_empty() {
                    self.error(
                        format!("%{directive} requires a name"),
                        filename,
                        line_num,
                    );
                    return;
                }
                let defined = self.defines.contains_key(&name);
                let cond = if directive == "ifdef" { defined } else { !defined };
                let active = cond && self.active();
                self.cond_stack.push(CondBlock {
                    is_true: active,
                    has_true_branch: active,
                    line: line_num,
                });
                self.output.push(String::new());
            }
            "if" => {
                let expr = directive_argument(line, "if");
                if expr.is_empty() {
                    self.error("%if requires an expression", filename, line_num);
                    return;
                }
                let expanded = self.expand_defines(&expr);
                let result = evaluate_condition(&expanded) && self.active();
                self.cond_stack.push(CondBlock {
                    is_true: result,
                    has_true_branch: result,
                    line: line_num,
                });
                self.output.push(String::new());
            }
            "elif" => {
                let expr = directive_argument(line, "elif");
                if self.cond_stack.is_empty() {
                    self.error("%elif without matching %if", filename, line_num);
                    return;
                }
                let parent_active = self.parent_active();
                let already_taken = self
                    .cond_stack
                    .last()
                    .map_or(false, |b| b.has_true_branch);
                let result = if already_taken {
                    false
                } else {
                    let expanded = self.expand_defines(&expr);
                    evaluate_condition(&expanded) && parent_active
                };
                if let Some(block) = self.cond_stack.last_mut() {
                    block.is_true = result;
                    if result {
                        block.has_true_branch = true;
                    }
                }
                self.output.push(String::new());
            }
            "else" => {
                let parent_active = self.parent_active();
                match self.cond_stack.last_mut() {
                    None => self.error("%else without matching %if", filename, line_num),
                    Some(block) => {
                        if block.has_true_branch {
                            block.is_true = false;
                        } else {
                            block.is_true = parent_active;
                            block.has_true_branch = true;
                        }
                        self.output.push(String::new());
                    }
                }
            }
            "endif" => {
                if self.cond_stack.pop().is_none() {
                    self.error("%endif without matching %if", filename, line_num);
                }
                self.output.push(String::new());
            }
            "macro" => {
                let rest = directive_argument(line, "macro");
                let mut parts = rest.split_whitespace();
                let name = match parts.next() {
                    Some(name) => name.to_string(),
                    None => {
                        self.error("%macro requires a name", filename, line_num);
                        return;
                    }
                };
                let param_count = parts
                    .next()
                    .and_then(|count| count.parse::<usize>().ok())
                    .unwrap_or(0);
                self.recording = Some(MacroDefinition {
                    name,
                    param_count,
                    body: Vec::new(),
                    line_defined: line_num,
                });
                self.output.push(String::new());
            }
            "endmacro" => {
                match self.recording.take() {
                    Some(def) => {
                        self.macros.insert(def.name.clone(), def);
                    }
                    None => self.error("%endmacro without matching %macro", filename, line_num),
                }
                self.output.push(String::new());
            }
            "include" => {
                self.handle_include(line, filename, line_num);
            }
            other => {
                self.error(
                    format!("Unknown preprocessor directive: %{other}"),
                    filename,
                    line_num,
                );
            }
        }
    }

    fn handle_include(&mut self, line: &str, filename: &str, line_num: u32) {
        let rest = directive_argument(line, "include");
        let (open, close) = match rest.chars().next() {
            Some('"') => ('"', '"'),
            Some('<') => ('<', '>'),
            _ => {
                self.error(
                    "%include filename must be in quotes or angle brackets",
                    filename,
                    line_num,
                );
                return;
            }
        };
        let body = &rest[open.len_utf8()..];
        let Some(end) = body.find(close) else {
            self.error("%include missing closing quote", filename, line_num);
            return;
        };
        let include_name = &body[..end];

        if self.include_depth >= MAX_INCLUDE_DEPTH {
            self.error(
                format!("%include nesting too deep: {include_name}"),
                filename,
                line_num,
            );
            return;
        }

        let Some(path) = self.find_include_file(include_name) else {
            self.error(
                format!("Could not find include file: {include_name}"),
                filename,
                line_num,
            );
            return;
        };
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => {
                self.error(
                    format!("Could not open file: {}", path.display()),
                    filename,
                    line_num,
                );
                return;
            }
        };

        self.include_depth += 1;
        let included_name = path.to_string_lossy().into_owned();
        self.process_lines(&content, &included_name);
        self.include_depth -= 1;
    }

    fn find_include_file(&self, name: &str) -> Option<PathBuf> {
        let direct = PathBuf::from(name);
        if direct.is_file() {
            return Some(direct);
        }
        for dir in &self.include_paths {
            let candidate = Path::new(dir).join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }

    fn expand_defines(&self, line: &str) -> String {
        let mut result = line.to_string();
        for (name, value) in &self.defines {
            result = replace_whole_words(&result, name, value);
        }
        result
    }

    fn match_macro_invocation(&self, line: &str) -> Option<(String, Vec<String>)> {
        let mut parts = line.splitn(2, char::is_whitespace);
        let first = parts.next()?;
        if !self.macros.contains_key(first) {
            return None;
        }
        let args: Vec<String> = match parts.next() {
            Some(rest) if !rest.trim().is_empty() => rest
                .split(',')
                .map(|arg| arg.trim().to_string())
                .collect(),
            _ => Vec::new(),
        };
        Some((first.to_string(), args))
    }

    fn expand_macro(&mut self, name: &str, args: &[String], filename: &str, line_num: u32) {
        let def = self.macros[name].clone();
        if args.len() != def.param_count {
            self.error(
                format!(
                    "Macro '{}' expects {} arguments, got {}",
                    def.name,
                    def.param_count,
                    args.len()
                ),
                filename,
                line_num,
            );
            return;
        }
        for body_line in &def.body {
            let mut expanded = body_line.clone();
            // Substitute highest-numbered parameters first so %10 is not
            // clobbered by %1.
            for (idx, arg) in args.iter().enumerate().rev() {
                expanded = expanded.replace(&format!("%{}", idx + 1), arg);
            }
            self.output.push(self.expand_defines(&expanded));
        }
    }

    fn active(&self) -> bool {
        self.cond_stack.last().map_or(true, |b| b.is_true)
    }

    fn parent_active(&self) -> bool {
        if self.cond_stack.len() < 2 {
            return true;
        }
        self.cond_stack[self.cond_stack.len() - 2].is_true
    }

    fn emit_if_active(&mut self, line: &str) {
        if self.recording.is_none() && self.active() {
            self.output.push(line.to_string());
        } else {
            self.output.push(String::new());
        }
    }

    fn error(&mut self, message: impl Into<String>, filename: &str, line: u32) {
        self.errors.push(Diagnostic::new(
            message,
            SourceLocation::new(filename, line, 1),
            Severity::Error,
        ));
    }
}

fn directive_name(line: &str) -> Option<String> {
    let rest = line.strip_prefix('%')?;
    let rest = rest.trim_start();
    let name: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name.to_ascii_lowercase())
    }
}

/// Text after `%<directive>`, trimmed.
fn directive_argument(line: &str, directive: &str) -> String {
    let lower = line.to_ascii_lowercase();
    match lower.find(directive) {
        Some(pos) => line[pos + directive.len()..].trim().to_string(),
        None => String::new(),
    }
}

fn replace_whole_words(text: &str, name: &str, value: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut pos = 0;
    while pos < text.len() {
        if let Some(found) = text[pos..].find(name) {
            let start = pos + found;
            let end = start + name.len();
            let word_start = start == 0 || !is_word_byte(bytes[start - 1]);
            let word_end = end >= text.len() || !is_word_byte(bytes[end]);
            result.push_str(&text[pos..start]);
            if word_start && word_end {
                result.push_str(value);
            } else {
                result.push_str(name);
            }
            pos = end;
        } else {
            result.push_str(&text[pos..]);
            break;
        }
    }
    result
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// `%if` condition: integer truthiness, or `==`/`!=` string comparison.
fn evaluate_condition(expr: &str) -> bool {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return false;
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return value != 0;
    }
    if let Some((left, right)) = trimmed.split_once("==") {
        return left.trim() == right.trim();
    }
    if let Some((left, right)) = trimmed.split_once("!=") {
        return left.trim() != right.trim();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> PreprocessResult {
        Preprocessor::new().process(source, "test.asm")
    }

    #[test]
    fn define_substitutes_whole_words() {
        let result = run("%define COUNT 5\nMOV CX, COUNT\nMOV AX, COUNTER");
        assert!(result.success);
        assert_eq!(result.lines[1], "MOV CX, 5");
        // COUNTER must not be rewritten.
        assert_eq!(result.lines[2], "MOV AX, COUNTER");
    }

    #[test]
    fn directive_lines_keep_numbering() {
        let result = run("%define A 1\nNOP");
        assert_eq!(result.lines.len(), 2);
        assert_eq!(result.lines[0], "");
        assert_eq!(result.lines[1], "NOP");
    }

    #[test]
    fn ifdef_includes_and_excludes() {
        let result = run("%define DEBUG 1\n%ifdef DEBUG\nINT3\n%endif\n%ifdef RELEASE\nHLT\n%endif\nNOP");
        assert!(result.success);
        let kept: Vec<&String> = result.lines.iter().filter(|l| !l.is_empty()).collect();
        assert_eq!(kept, ["INT3", "NOP"]);
    }

    #[test]
    fn if_else_branches() {
        let result = run("%if 0\nAAA\n%else\nAAS\n%endif");
        let kept: Vec<&String> = result.lines.iter().filter(|l| !l.is_empty()).collect();
        assert_eq!(kept, ["AAS"]);
    }

    #[test]
    fn nested_conditionals_respect_the_parent() {
        let result = run("%if 0\n%if 1\nAAA\n%endif\n%endif\nNOP");
        assert!(result.success);
        let kept: Vec<&String> = result.lines.iter().filter(|l| !l.is_empty()).collect();
        assert_eq!(kept, ["NOP"]);
    }

    #[test]
    fn macro_expansion_with_arguments() {
        let result = run("%macro store 2\nMOV [%1], %2\n%endmacro\nstore 0x10, AX");
        assert!(result.success);
        let kept: Vec<&String> = result.lines.iter().filter(|l| !l.is_empty()).collect();
        assert_eq!(kept, ["MOV [0x10], AX"]);
    }

    #[test]
    fn macro_argument_count_mismatch_is_an_error() {
        let result = run("%macro one 1\nNOP\n%endmacro\none a, b");
        assert!(!result.success);
    }

    #[test]
    fn unclosed_conditional_is_an_error() {
        let result = run("%if 1\nNOP");
        assert!(!result.success);
    }

    #[test]
    fn missing_include_is_an_error() {
        let result = run("%include \"no_such_file.inc\"");
        assert!(!result.success);
        assert!(result.errors[0]
            .message
            .contains("Could not find include file"));
    }

    #[test]
    fn line_continuation_joins_lines() {
        let result = run("DB 1, \\\n2, 3");
        assert_eq!(result.lines[0], "DB 1, 2, 3");
    }
}
