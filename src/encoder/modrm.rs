// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! ModR/M and displacement computation for the fixed 8086
//! effective-address table.
//!
//! Byte layout is `[mod:2 | reg:3 | rm:3]`. `[BP]` has no `mod=00`
//! encoding (that slot is the direct-address escape), so it is forced to
//! `mod=01` with a zero displacement byte. An address expression that
//! carries a label always takes the 16-bit displacement form, which keeps
//! the analyzer's size estimate and the emitted bytes in lockstep.

use crate::ast::AddressExpression;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModRm {
    pub modrm: u8,
    pub displacement: Vec<u8>,
}

impl ModRm {
    fn new(modrm: u8, displacement: Vec<u8>) -> Self {
        Self { modrm, displacement }
    }

    pub fn len(&self) -> usize {
        1 + self.displacement.len()
    }
}

pub fn combine(mode: u8, reg: u8, rm: u8) -> u8 {
    ((mode & 0x03) << 6) | ((reg & 0x07) << 3) | (rm & 0x07)
}

/// Register-to-register: `mod=11`.
pub fn reg_to_reg(reg_field: u8, rm_field: u8) -> u8 {
    combine(0b11, reg_field, rm_field)
}

/// Direct address `[disp16]`: `mod=00`, `rm=110`.
pub fn direct(address: u16, reg_field: u8) -> ModRm {
    ModRm::new(
        combine(0b00, reg_field, 0b110),
        encode_displacement(address as i64, 2),
    )
}

/// Register-indirect (and register+displacement) forms. `label_value`
/// must carry the resolved symbol value when the expression references
/// one; the caller resolves it so this stays a pure computation.
pub fn memory(
    addr: &AddressExpression,
    reg_field: u8,
    label_value: Option<i64>,
) -> Result<ModRm, String> {
    let has_label = addr.has_label();
    let total_displacement = addr
        .displacement
        .wrapping_add(label_value.unwrap_or(0));
    let has_displacement = addr.has_displacement || has_label;

    let rm = rm_code(&addr.registers).ok_or_else(|| {
        format!(
            "Invalid addressing mode combination: [{}]",
            addr.registers.join("+")
        )
    })?;

    // Direct address: no registers, only a displacement and/or label.
    if addr.registers.is_empty() {
        if has_displacement {
            return Ok(ModRm::new(
                combine(0b00, reg_field, 0b110),
                encode_displacement(total_displacement, 2),
            ));
        }
        return Ok(direct(0, reg_field));
    }

    // [BP] alone has no mod=00 form; force disp8 = 0.
    if addr.registers.len() == 1
        && addr.registers[0].eq_ignore_ascii_case("BP")
        && !has_displacement
    {
        return Ok(ModRm::new(combine(0b01, reg_field, rm), vec![0x00]));
    }

    if !has_displacement {
        return Ok(ModRm::new(combine(0b00, reg_field, rm), Vec::new()));
    }

    // A label reference always takes the disp16 form.
    if !has_label && fits_disp8(total_displacement) {
        return Ok(ModRm::new(
            combine(0b01, reg_field, rm),
            encode_displacement(total_displacement, 1),
        ));
    }
    Ok(ModRm::new(
        combine(0b10, reg_field, rm),
        encode_displacement(total_displacement, 2),
    ))
}

/// R/M code for a base/index register combination.
fn rm_code(registers: &[String]) -> Option<u8> {
    match registers.len() {
        0 => Some(0b110),
        1 => match registers[0].to_ascii_uppercase().as_str() {
            "BX" => Some(7),
            "BP" => Some(6),
            "SI" => Some(4),
            "DI" => Some(5),
            _ => None,
        },
        2 => {
            let has = |name: &str| registers.iter().any(|r| r.eq_ignore_ascii_case(name));
            if has("BX") && has("SI") {
                Some(0)
            } else if has("BX") && has("DI") {
                Some(1)
            } else if has("BP") && has("SI") {
                Some(2)
            } else if has("BP") && has("DI") {
                Some(3)
            } else {
                None
            }
        }
        _ => None,
    }
}

pub fn fits_disp8(displacement: i64) -> bool {
    (-128..=127).contains(&displacement)
}

/// Little-endian, low byte first.
pub fn encode_displacement(value: i64, size_bytes: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(size_bytes);
    let mut v = value;
    for _ in 0..size_bytes {
        bytes.push((v & 0xFF) as u8);
        v >>= 8;
    }
    bytes
}
