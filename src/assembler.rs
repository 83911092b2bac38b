// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Public assembly API: the pipeline from source text to the flat binary,
//! listing, and symbol map that the CLI and embedders consume.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use serde_json::json;

use crate::codegen::{CodeGenerator, ListingLine};
use crate::error::{Diagnostic, Severity, SourceLocation};
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::preprocess::Preprocessor;

/// Everything one assembly run produces. Partial results are kept even
/// when errors are present; `success` is false if any Error- or
/// Fatal-severity diagnostic was recorded in any phase.
#[derive(Debug)]
pub struct AssemblyResult {
    pub binary: Vec<u8>,
    pub listing: Vec<ListingLine>,
    /// Label name (original case) to final absolute address.
    pub symbols: BTreeMap<String, i64>,
    pub errors: Vec<Diagnostic>,
    pub origin_address: u64,
    pub success: bool,
    /// Preprocessed source, kept for diagnostics context rendering.
    pub source_lines: Vec<String>,
}

impl AssemblyResult {
    pub(crate) fn failed(
        errors: Vec<Diagnostic>,
        origin_address: u64,
        source_lines: Vec<String>,
    ) -> Self {
        Self {
            binary: Vec::new(),
            listing: Vec::new(),
            symbols: BTreeMap::new(),
            errors,
            origin_address,
            success: false,
            source_lines,
        }
    }

    pub fn error_count(&self) -> usize {
        self.errors.iter().filter(|d| d.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.errors
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    /// Human-readable listing: address, machine-code bytes, and the
    /// reconstructed source, separated by ` | `.
    pub fn listing_text(&self) -> String {
        let mut out = String::new();
        for line in &self.listing {
            let bytes = line
                .machine_code
                .iter()
                .map(|b| format!("{b:02X}"))
                .collect::<Vec<_>>()
                .join(" ");
            out.push_str(&format!(
                "{:04X} | {} | {}",
                line.address, bytes, line.source_text
            ));
            if !line.success {
                out.push_str(&format!(" | error: {}", line.error_message));
            }
            out.push('\n');
        }
        out
    }

    /// Exported label map as JSON.
    pub fn symbols_json(&self) -> String {
        json!({
            "schema": "asm86-symbols-v1",
            "origin": self.origin_address,
            "symbols": self.symbols,
        })
        .to_string()
    }

    pub fn write_binary(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(&self.binary)
    }
}

/// One configured assembler; each `assemble` call is an independent run
/// over fresh analyzer, encoder, and generator state.
#[derive(Debug)]
pub struct Assembler {
    origin: u64,
    include_paths: Vec<String>,
    defines: Vec<(String, String)>,
    warnings_enabled: bool,
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            origin: 0,
            include_paths: Vec::new(),
            defines: Vec::new(),
            warnings_enabled: true,
        }
    }

    /// Base address used until an `ORG` directive overrides it.
    pub fn set_origin(&mut self, origin: u64) {
        self.origin = origin;
    }

    pub fn set_include_paths(&mut self, paths: Vec<String>) {
        self.include_paths = paths;
    }

    pub fn enable_warnings(&mut self, enable: bool) {
        self.warnings_enabled = enable;
    }

    /// Predefine a preprocessor constant, as `-D NAME[=VAL]` does.
    pub fn predefine(&mut self, name: &str, value: &str) {
        self.defines.push((name.to_string(), value.to_string()));
    }

    pub fn assemble(&mut self, source: &str, filename: &str) -> AssemblyResult {
        let mut preprocessor = Preprocessor::new();
        preprocessor.set_include_paths(self.include_paths.clone());
        for (name, value) in &self.defines {
            preprocessor.define(name, value);
        }
        let preprocessed = preprocessor.process(source, filename);
        if !preprocessed.success {
            return AssemblyResult::failed(preprocessed.errors, self.origin, preprocessed.lines);
        }

        let tokens = Lexer::new(&preprocessed.source(), filename).tokenize();
        let (mut program, parse_errors) = Parser::new(tokens).parse();
        if parse_errors.iter().any(|d| d.is_error()) {
            return AssemblyResult::failed(parse_errors, self.origin, preprocessed.lines);
        }

        let mut generator = CodeGenerator::new();
        let mut result = generator.generate(&mut program, self.origin);
        result.source_lines = preprocessed.lines;
        if !self.warnings_enabled {
            result.errors.retain(|d| d.is_error());
        }
        result
    }

    pub fn assemble_file(&mut self, path: impl AsRef<Path>) -> AssemblyResult {
        let path = path.as_ref();
        let filename = path.to_string_lossy().into_owned();
        match fs::read_to_string(path) {
            Ok(source) => self.assemble(&source, &filename),
            Err(_) => AssemblyResult::failed(
                vec![Diagnostic::new(
                    format!("Could not open file: {filename}"),
                    SourceLocation::new(filename.clone(), 1, 1),
                    Severity::Fatal,
                )],
                self.origin,
                Vec::new(),
            ),
        }
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}
