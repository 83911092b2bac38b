// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Source locations, diagnostics and the accumulating sink shared by every
//! phase of the assembler.

use std::fmt;

/// 1-based position in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub filename: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(filename: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            filename: filename.into(),
            line,
            column,
        }
    }

    pub fn format(&self) -> String {
        format!("{}:{}:{}", self.filename, self.line, self.column)
    }
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self {
            filename: "<input>".to_string(),
            line: 1,
            column: 1,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

impl Severity {
    fn as_str(self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal error",
        }
    }
}

/// One reported problem, formatted the way compiler-error parsers expect.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub location: SourceLocation,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, location: SourceLocation, severity: Severity) -> Self {
        Self {
            message: message.into(),
            location,
            severity,
        }
    }

    pub fn format(&self) -> String {
        format!(
            "{}: {}: {}",
            self.location.format(),
            self.severity.as_str(),
            self.message
        )
    }

    /// Warnings are not errors.
    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error | Severity::Fatal)
    }

    /// Render with the offending source line and a caret under the column.
    pub fn format_with_context(&self, lines: &[String], use_color: bool) -> String {
        let mut out = self.format();
        let idx = self.location.line.saturating_sub(1) as usize;
        if let Some(line) = lines.get(idx) {
            out.push('\n');
            out.push_str(&format!(
                "{:>5} | {}",
                self.location.line,
                highlight_column(line, self.location.column as usize, use_color)
            ));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

impl std::error::Error for Diagnostic {}

fn highlight_column(line: &str, column: usize, use_color: bool) -> String {
    if column == 0 {
        return line.to_string();
    }
    let idx = column - 1;
    if idx >= line.len() {
        if use_color {
            return format!("{line}\x1b[31m^\x1b[0m");
        }
        return format!("{line}^");
    }
    let (head, tail) = line.split_at(idx);
    let ch = tail.chars().next().unwrap_or(' ');
    let rest = &tail[ch.len_utf8()..];
    if use_color {
        format!("{head}\x1b[31m{ch}\x1b[0m{rest}")
    } else {
        line.to_string()
    }
}

/// Explicit error collector passed between phases so that a run can report
/// more than one problem.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    has_errors: bool,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, message: impl Into<String>, location: SourceLocation) {
        self.diagnostics
            .push(Diagnostic::new(message, location, Severity::Error));
        self.has_errors = true;
    }

    pub fn warning(&mut self, message: impl Into<String>, location: SourceLocation) {
        self.diagnostics
            .push(Diagnostic::new(message, location, Severity::Warning));
    }

    pub fn fatal(&mut self, message: impl Into<String>, location: SourceLocation) {
        self.diagnostics
            .push(Diagnostic::new(message, location, Severity::Fatal));
        self.has_errors = true;
    }

    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take(&mut self) -> Vec<Diagnostic> {
        self.has_errors = false;
        std::mem::take(&mut self.diagnostics)
    }

    pub fn extend(&mut self, diagnostics: Vec<Diagnostic>) {
        for d in &diagnostics {
            if d.is_error() {
                self.has_errors = true;
            }
        }
        self.diagnostics.extend(diagnostics);
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
        self.has_errors = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_format_matches_compiler_convention() {
        let d = Diagnostic::new(
            "undefined symbol: foo",
            SourceLocation::new("boot.asm", 12, 5),
            Severity::Error,
        );
        assert_eq!(d.format(), "boot.asm:12:5: error: undefined symbol: foo");
    }

    #[test]
    fn warnings_do_not_trip_the_sink() {
        let mut sink = DiagnosticSink::new();
        sink.warning("fall-through", SourceLocation::default());
        assert!(!sink.has_errors());
        assert_eq!(sink.error_count(), 0);
        sink.error("boom", SourceLocation::default());
        assert!(sink.has_errors());
        assert_eq!(sink.error_count(), 1);
    }

    #[test]
    fn take_resets_error_state() {
        let mut sink = DiagnosticSink::new();
        sink.error("boom", SourceLocation::default());
        let taken = sink.take();
        assert_eq!(taken.len(), 1);
        assert!(!sink.has_errors());
    }
}
