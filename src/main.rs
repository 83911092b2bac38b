// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for asm86.

fn main() {
    std::process::exit(asm86::cli::run());
}
