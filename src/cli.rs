// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line front end.
//!
//! Outputs are opt-in except the flat binary itself: `-l/--list` adds a
//! listing, `-s/--symbols` a JSON symbol map. Filenames may be omitted
//! from those flags, in which case the output base (input name minus
//! `.asm`, or `-o`) plus a default extension is used.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::assembler::Assembler;
use crate::expr;

pub const VERSION: &str = "1.0";

const LONG_ABOUT: &str = "Intel 8086 Assembler producing flat binaries.

The binary image is always written; use -o/--outfile to change its base
name. A listing (-l/--list) and a JSON symbol map (-s/--symbols) are
opt-in. Sources run through a textual preprocessor first (%define,
%macro, %if, %include).";

#[derive(Parser, Debug)]
#[command(
    name = "asm86",
    version = VERSION,
    about = "Intel 8086 Assembler producing flat binaries",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(
        short = 'i',
        long = "infile",
        value_name = "FILE",
        action = ArgAction::Append,
        long_help = "Input assembly file (repeatable). Must end with .asm."
    )]
    pub infiles: Vec<PathBuf>,
    #[arg(
        short = 'o',
        long = "outfile",
        value_name = "BASE",
        long_help = "Output filename base. Defaults to the input base name."
    )]
    pub outfile: Option<String>,
    #[arg(
        short = 'l',
        long = "list",
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = "",
        long_help = "Emit a listing file. FILE is optional; when omitted, the output base is used and a .lst extension is added."
    )]
    pub list_name: Option<String>,
    #[arg(
        short = 's',
        long = "symbols",
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = "",
        long_help = "Emit a JSON symbol map. FILE is optional; when omitted, the output base is used and a .sym extension is added."
    )]
    pub symbols_name: Option<String>,
    #[arg(
        short = 'I',
        long = "include",
        value_name = "DIR",
        action = ArgAction::Append,
        long_help = "Add a directory to the %include search path (repeatable)."
    )]
    pub include_paths: Vec<String>,
    #[arg(
        short = 'D',
        long = "define",
        value_name = "NAME[=VAL]",
        action = ArgAction::Append,
        long_help = "Predefine a preprocessor constant (repeatable). If VAL is omitted, defaults to 1."
    )]
    pub defines: Vec<String>,
    #[arg(
        long = "org",
        value_name = "ADDR",
        long_help = "Origin address used until an ORG directive overrides it. Accepts the assembler's numeric bases (0x7C00, 7C00h, ...)."
    )]
    pub origin: Option<String>,
    #[arg(
        short = 'W',
        long = "no-warnings",
        action = ArgAction::SetTrue,
        long_help = "Suppress warning diagnostics."
    )]
    pub no_warnings: bool,
}

pub fn run() -> i32 {
    let cli = Cli::parse();
    if cli.infiles.is_empty() {
        eprintln!("No input files specified. Use -i/--infile");
        return 2;
    }

    let origin = match cli.origin.as_deref() {
        Some(text) => match expr::parse_number(text) {
            Some(value) if value >= 0 => value as u64,
            _ => {
                eprintln!("Invalid --org address: {text}");
                return 2;
            }
        },
        None => 0,
    };

    let use_color = std::env::var("NO_COLOR").is_err();
    let mut failures = 0;

    for path in &cli.infiles {
        let Some(base) = input_base(path) else {
            eprintln!("Input file must end with .asm: {}", path.display());
            failures += 1;
            continue;
        };
        let out_base = cli.outfile.clone().unwrap_or(base);

        let mut assembler = Assembler::new();
        assembler.set_origin(origin);
        assembler.set_include_paths(cli.include_paths.clone());
        assembler.enable_warnings(!cli.no_warnings);
        for define in &cli.defines {
            match define.split_once('=') {
                Some((name, value)) => assembler.predefine(name, value),
                None => assembler.predefine(define, "1"),
            }
        }

        let result = assembler.assemble_file(path);
        for diagnostic in &result.errors {
            eprintln!(
                "{}",
                diagnostic.format_with_context(&result.source_lines, use_color)
            );
        }
        if !result.success {
            eprintln!("Errors detected in source. No output files created.");
            failures += 1;
            continue;
        }

        let bin_path = format!("{out_base}.bin");
        if let Err(err) = result.write_binary(&bin_path) {
            eprintln!("Error writing {bin_path}: {err}");
            failures += 1;
            continue;
        }

        if let Some(name) = &cli.list_name {
            let list_path = resolve_output_path(&out_base, name, "lst");
            if let Err(err) = std::fs::write(&list_path, result.listing_text()) {
                eprintln!("Error writing {list_path}: {err}");
                failures += 1;
            }
        }
        if let Some(name) = &cli.symbols_name {
            let sym_path = resolve_output_path(&out_base, name, "sym");
            if let Err(err) = std::fs::write(&sym_path, result.symbols_json()) {
                eprintln!("Error writing {sym_path}: {err}");
                failures += 1;
            }
        }
    }

    failures
}

fn input_base(path: &PathBuf) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let base = name.strip_suffix(".asm")?;
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            Some(parent.join(base).to_string_lossy().into_owned())
        }
        _ => Some(base.to_string()),
    }
}

fn resolve_output_path(base: &str, name: &str, extension: &str) -> String {
    if name.is_empty() {
        return format!("{base}.{extension}");
    }
    let path = PathBuf::from(name);
    if path.extension().is_none() {
        return format!("{name}.{extension}");
    }
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_base_strips_the_asm_extension() {
        assert_eq!(input_base(&PathBuf::from("boot.asm")).unwrap(), "boot");
        assert_eq!(
            input_base(&PathBuf::from("src/boot.asm")).unwrap(),
            "src/boot"
        );
        assert!(input_base(&PathBuf::from("boot.s")).is_none());
    }

    #[test]
    fn output_paths_get_default_extensions() {
        assert_eq!(resolve_output_path("boot", "", "lst"), "boot.lst");
        assert_eq!(resolve_output_path("boot", "custom", "lst"), "custom.lst");
        assert_eq!(
            resolve_output_path("boot", "custom.txt", "lst"),
            "custom.txt"
        );
    }
}
