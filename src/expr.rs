// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Constant-expression evaluation.
//!
//! Four entry points: pure arithmetic, arithmetic with `$`/`$$` position
//! context, arithmetic with a symbol-lookup callback, and the
//! address-expression splitter that classifies the terms of a bracketed
//! memory operand. Operator precedence is `*`/`/` over `+`/`-`; splitting
//! at the rightmost top-level operator keeps `a-b-c` evaluating as
//! `(a-b)-c`. Integer division truncates toward zero; division by zero
//! fails the evaluation.

use crate::ast::AddressExpression;

/// Caller-supplied resolver for identifiers found inside expressions.
pub type SymbolLookup<'a> = dyn Fn(&str) -> Option<i64> + 'a;

/// The four registers the 8086 can use in an effective address.
const ADDRESSING_REGS: [&str; 4] = ["BX", "BP", "SI", "DI"];

/// Parse an integer literal in any of the supported bases.
///
/// Prefixes: `0x` hex, `0b` binary, `0o` octal, `$` hex. Suffixes: `h`
/// hex, `b` binary, `o`/`q` octal. A `0b`/`0o` prefix with no digit of
/// that base after it falls through to suffix parsing so that `0B8H`
/// reads as hex.
pub fn parse_number(text: &str) -> Option<i64> {
    let s = text.trim();
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if s.is_empty() {
        return None;
    }
    let value = parse_unsigned(s)?;
    Some(if negative { value.wrapping_neg() } else { value })
}

fn parse_unsigned(s: &str) -> Option<i64> {
    // '$' prefix first: $BB is hex, not a binary-suffixed literal.
    if let Some(hex) = s.strip_prefix('$') {
        if hex.is_empty() {
            return None;
        }
        return i64::from_str_radix(hex, 16).ok();
    }
    if let Some(rest) = strip_prefix_ci(s, "0x") {
        return i64::from_str_radix(rest, 16).ok();
    }
    if let Some(rest) = strip_prefix_ci(s, "0b") {
        if !rest.is_empty() && rest.bytes().all(|b| b == b'0' || b == b'1') {
            return i64::from_str_radix(rest, 2).ok();
        }
    }
    if let Some(rest) = strip_prefix_ci(s, "0o") {
        if !rest.is_empty() && rest.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
            return i64::from_str_radix(rest, 8).ok();
        }
    }
    if let Some(body) = strip_suffix_ci(s, 'h') {
        return i64::from_str_radix(body, 16).ok();
    }
    if let Some(body) = strip_suffix_ci(s, 'b') {
        if !body.is_empty() && body.bytes().all(|b| b == b'0' || b == b'1') {
            return i64::from_str_radix(body, 2).ok();
        }
        return None;
    }
    if let Some(body) = strip_suffix_ci(s, 'o').or_else(|| strip_suffix_ci(s, 'q')) {
        return i64::from_str_radix(body, 8).ok();
    }
    s.parse::<i64>().ok()
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

fn strip_suffix_ci(s: &str, suffix: char) -> Option<&str> {
    let last = s.chars().last()?;
    if last.eq_ignore_ascii_case(&suffix) {
        Some(&s[..s.len() - last.len_utf8()])
    } else {
        None
    }
}

/// Evaluate a pure arithmetic expression.
pub fn evaluate(expr: &str) -> Option<i64> {
    eval_text(expr, None)
}

/// Evaluate after substituting `$$` (segment start) and `$` (current
/// address). `$$` is replaced first so the two markers cannot be confused.
pub fn evaluate_with_context(expr: &str, current: u64, segment_start: u64) -> Option<i64> {
    eval_text(&substitute_position(expr, current, segment_start), None)
}

/// Evaluate with identifiers resolved through `lookup`; an identifier the
/// callback cannot resolve fails the whole evaluation.
pub fn evaluate_with_symbols(expr: &str, lookup: &SymbolLookup<'_>) -> Option<i64> {
    eval_text(expr, Some(lookup))
}

/// Position substitution plus symbol lookup, used for `TIMES` counts like
/// `510-($-$$)`.
pub fn evaluate_with_context_and_symbols(
    expr: &str,
    current: u64,
    segment_start: u64,
    lookup: &SymbolLookup,
) -> Option<i64> {
    eval_text(
        &substitute_position(expr, current, segment_start),
        Some(lookup),
    )
}

pub fn substitute_position(expr: &str, current: u64, segment_start: u64) -> String {
    expr.replace("$$", &segment_start.to_string())
        .replace('$', &current.to_string())
}

fn eval_text(expr: &str, lookup: Option<&SymbolLookup>) -> Option<i64> {
    let clean: String = expr.chars().filter(|c| !c.is_whitespace()).collect();
    eval_clean(&clean, lookup)
}

fn eval_clean(s: &str, lookup: Option<&SymbolLookup>) -> Option<i64> {
    if s.is_empty() {
        return None;
    }
    let bytes = s.as_bytes();

    // Lowest precedence first: split at the rightmost top-level +/-.
    if let Some(idx) = find_top_level_operator(bytes, &[b'+', b'-']) {
        let left = eval_clean(&s[..idx], lookup)?;
        let right = eval_clean(&s[idx + 1..], lookup)?;
        return Some(if bytes[idx] == b'+' {
            left.wrapping_add(right)
        } else {
            left.wrapping_sub(right)
        });
    }

    if let Some(idx) = find_top_level_operator(bytes, &[b'*', b'/']) {
        let left = eval_clean(&s[..idx], lookup)?;
        let right = eval_clean(&s[idx + 1..], lookup)?;
        return if bytes[idx] == b'*' {
            Some(left.wrapping_mul(right))
        } else if right == 0 {
            None
        } else {
            left.checked_div(right)
        };
    }

    // Unary sign on a full sub-expression, e.g. -(2+3).
    if let Some(rest) = s.strip_prefix('-') {
        return eval_clean(rest, lookup).map(|v| v.wrapping_neg());
    }
    if let Some(rest) = s.strip_prefix('+') {
        return eval_clean(rest, lookup);
    }

    if s.starts_with('(') && s.ends_with(')') && parens_balanced(&s[1..s.len() - 1]) {
        return eval_clean(&s[1..s.len() - 1], lookup);
    }

    if let Some(value) = parse_number(s) {
        return Some(value);
    }

    if is_valid_identifier(s) {
        if let Some(lookup) = lookup {
            return lookup(s);
        }
    }

    None
}

/// Rightmost occurrence of any of `ops` outside parentheses, skipping
/// unary signs (position 0 or right after another operator or `(`).
fn find_top_level_operator(bytes: &[u8], ops: &[u8]) -> Option<usize> {
    let mut depth: i32 = 0;
    for i in (0..bytes.len()).rev() {
        let c = bytes[i];
        match c {
            b')' => depth += 1,
            b'(' => depth -= 1,
            _ => {
                if depth == 0 && ops.contains(&c) {
                    if i == 0 {
                        continue;
                    }
                    let prev = bytes[i - 1];
                    if (c == b'-' || c == b'+')
                        && matches!(prev, b'+' | b'-' | b'*' | b'/' | b'(')
                    {
                        continue;
                    }
                    return Some(i);
                }
            }
        }
    }
    None
}

fn parens_balanced(s: &str) -> bool {
    let mut depth: i32 = 0;
    for b in s.bytes() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// `[A-Za-z_.][A-Za-z0-9_.]*`
pub fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

pub fn is_addressing_register(s: &str) -> bool {
    ADDRESSING_REGS.iter().any(|r| r.eq_ignore_ascii_case(s))
}

/// Split a bracketed memory expression into registers, displacement and an
/// optional label, without symbol knowledge.
pub fn parse_address(expr: &str) -> Option<AddressExpression> {
    parse_address_inner(expr, None)
}

/// Same split, with identifiers first offered to `lookup`; a resolvable
/// identifier (an `EQU` constant) folds into the displacement, an
/// unresolvable one becomes the expression's single label.
pub fn parse_address_with_symbols(
    expr: &str,
    lookup: &SymbolLookup,
) -> Option<AddressExpression> {
    parse_address_inner(expr, Some(lookup))
}

fn parse_address_inner(expr: &str, lookup: Option<&SymbolLookup>) -> Option<AddressExpression> {
    let mut result = AddressExpression::default();

    for (term, negative) in split_top_level_terms(expr) {
        let term = term.trim();
        if term.is_empty() {
            continue;
        }

        if is_addressing_register(term) {
            if negative {
                // A negated register has no effective-address encoding.
                return None;
            }
            result.registers.push(term.to_ascii_uppercase());
            continue;
        }

        if let Some(value) = parse_number(term) {
            let value = if negative { value.wrapping_neg() } else { value };
            result.displacement = result.displacement.wrapping_add(value);
            result.has_displacement = true;
            continue;
        }

        if is_valid_identifier(term) {
            if let Some(lookup) = lookup {
                if let Some(value) = lookup(term) {
                    let value = if negative { value.wrapping_neg() } else { value };
                    result.displacement = result.displacement.wrapping_add(value);
                    result.has_displacement = true;
                    continue;
                }
            }
            if result.label.is_some() {
                // Only one unresolved symbol per address expression.
                return None;
            }
            result.label = Some(term.to_string());
            continue;
        }

        // Numeric sub-expression, possibly with symbols.
        let text = if negative {
            format!("-({term})")
        } else {
            term.to_string()
        };
        let value = match lookup {
            Some(lookup) => evaluate_with_symbols(&text, lookup),
            None => evaluate(&text),
        }?;
        result.displacement = result.displacement.wrapping_add(value);
        result.has_displacement = true;
    }

    Some(result)
}

/// Split on `+`/`-` outside parentheses, tagging each term with whether a
/// `-` preceded it.
fn split_top_level_terms(expr: &str) -> Vec<(String, bool)> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut negative = false;
    let mut depth: i32 = 0;

    for c in expr.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                current.push(c);
            }
            '+' | '-' if depth == 0 => {
                if !current.trim().is_empty() {
                    terms.push((current.trim().to_string(), negative));
                }
                current.clear();
                negative = c == '-';
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        terms.push((current.trim().to_string(), negative));
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_number_bases() {
        assert_eq!(parse_number("42"), Some(42));
        assert_eq!(parse_number("-10"), Some(-10));
        assert_eq!(parse_number("0x2A"), Some(42));
        assert_eq!(parse_number("2Ah"), Some(42));
        assert_eq!(parse_number("0B8H"), Some(0xB8));
        assert_eq!(parse_number("$FF"), Some(255));
        assert_eq!(parse_number("0b101010"), Some(42));
        assert_eq!(parse_number("101010b"), Some(42));
        assert_eq!(parse_number("0o52"), Some(42));
        assert_eq!(parse_number("52q"), Some(42));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("zz"), None);
    }

    #[test]
    fn parse_number_dollar_hex_ending_in_b() {
        // $BB must read as hex, not as a binary-suffixed literal.
        assert_eq!(parse_number("$BB"), Some(0xBB));
        assert_eq!(parse_number("$0B"), Some(0x0B));
    }

    #[test]
    fn evaluate_precedence_and_associativity() {
        assert_eq!(evaluate("2+3*4"), Some(14));
        assert_eq!(evaluate("10-2-3"), Some(5));
        assert_eq!(evaluate("100/10/5"), Some(2));
        assert_eq!(evaluate("(2+3)*4"), Some(20));
        assert_eq!(evaluate("-5+10"), Some(5));
        assert_eq!(evaluate("2*-3"), Some(-6));
    }

    #[test]
    fn evaluate_division_by_zero_fails() {
        assert_eq!(evaluate("1/0"), None);
        assert_eq!(evaluate("10/(5-5)"), None);
    }

    #[test]
    fn evaluate_division_truncates_toward_zero() {
        assert_eq!(evaluate("7/2"), Some(3));
        assert_eq!(evaluate("0-7/2"), Some(-3));
    }

    #[test]
    fn evaluate_with_context_substitutes_both_markers() {
        // The boot-sector pad: 510-($-$$).
        assert_eq!(evaluate_with_context("510-($-$$)", 0x7C10, 0x7C00), Some(494));
        assert_eq!(evaluate_with_context("$", 5, 0), Some(5));
        assert_eq!(evaluate_with_context("$$", 5, 3), Some(3));
    }

    #[test]
    fn evaluate_with_symbols_resolves_identifiers() {
        let lookup = |name: &str| match name {
            "COUNT" => Some(8),
            _ => None,
        };
        assert_eq!(evaluate_with_symbols("COUNT*2", &lookup), Some(16));
        assert_eq!(evaluate_with_symbols("MISSING+1", &lookup), None);
    }

    #[test]
    fn parse_address_register_pairs() {
        let addr = parse_address("BX+SI").unwrap();
        assert_eq!(addr.registers, vec!["BX", "SI"]);
        assert!(!addr.has_displacement);
        assert!(addr.label.is_none());
    }

    #[test]
    fn parse_address_with_displacement_and_label() {
        let addr = parse_address("BX+10").unwrap();
        assert_eq!(addr.registers, vec!["BX"]);
        assert_eq!(addr.displacement, 10);

        let addr = parse_address("SI+msg").unwrap();
        assert_eq!(addr.registers, vec!["SI"]);
        assert_eq!(addr.label.as_deref(), Some("msg"));
    }

    #[test]
    fn parse_address_rejects_negative_register() {
        assert!(parse_address("-BX").is_none());
        assert!(parse_address("SI-DI").is_none());
    }

    #[test]
    fn parse_address_rejects_two_labels() {
        assert!(parse_address("foo+bar").is_none());
    }

    #[test]
    fn parse_address_with_symbols_folds_constants() {
        let lookup = |name: &str| match name {
            "OFS" => Some(0x20),
            _ => None,
        };
        let addr = parse_address_with_symbols("BX+OFS", &lookup).unwrap();
        assert_eq!(addr.registers, vec!["BX"]);
        assert_eq!(addr.displacement, 0x20);
        assert!(addr.label.is_none());

        let addr = parse_address_with_symbols("BP-OFS", &lookup).unwrap();
        assert_eq!(addr.displacement, -0x20);
    }

    #[test]
    fn identifier_grammar() {
        assert!(is_valid_identifier("_start"));
        assert!(is_valid_identifier(".loop"));
        assert!(is_valid_identifier("a.b_c1"));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("a-b"));
        assert!(!is_valid_identifier(""));
    }

    proptest! {
        #[test]
        fn decimal_round_trip(value in any::<u32>()) {
            prop_assert_eq!(parse_number(&value.to_string()), Some(value as i64));
        }

        #[test]
        fn hex_round_trip(value in any::<u32>()) {
            prop_assert_eq!(parse_number(&format!("0x{value:X}")), Some(value as i64));
            prop_assert_eq!(parse_number(&format!("${value:X}")), Some(value as i64));
        }

        #[test]
        fn binary_round_trip(value in any::<u16>()) {
            prop_assert_eq!(parse_number(&format!("0b{value:b}")), Some(value as i64));
        }

        #[test]
        fn subtraction_left_associates(a in -1000i64..1000, b in -1000i64..1000, c in -1000i64..1000) {
            let text = format!("{a}+{b}+{c}")
                .replace("+-", "-");
            prop_assert_eq!(evaluate(&text), Some(a + b + c));
        }
    }
}
