//! Compiler for DUCI format specifiers.
//!
//! Each command has a Set and a Get format, a compact string describing the
//! arguments expected after the command code.  Terms are applied left to
//! right, separated by `,` (optional between a term and a following `?`,
//! `=` or `[`):
//!
//! | Term | Meaning |
//! |------|---------|
//! | `=`  | assignment |
//! | `?`  | query |
//! | `i`  | integer, optional leading `-` |
//! | `v`  | floating point value, with or without decimal places |
//! | `x`  | 32-bit hexadecimal |
//! | `X`  | 64-bit hexadecimal, may be preceded by `0x` |
//! | `b`  | boolean, `0` or `1` |
//! | `c`  | single character |
//! | `s`  | string, up to the next `,` |
//! | `$`  | whole remaining payload, for custom handling |
//! | `d`  | date, always `dd/mm/yyyy` |
//! | `t`  | time, always `hh:mm:ss` |
//!
//! A type may be preceded by a 1 or 2 digit field width, e.g. `2i` expects
//! exactly 2 digits and `4x` exactly 4 hex digits.  A term wrapped in `[`
//! and `]` is optional, e.g. `"[i][i]?"`.
//!
//! Examples: `"=c"`, `"?"`, `"i=i,[i],[i]"`, `"[2i]?"`, `"=d"`.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use heapless::Vec;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::{Error, MAX_PARAMETERS, Result};

/// Type of a single argument slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Signed or unsigned decimal integer
    Integer,
    /// Floating point value
    Value,
    /// 32-bit hexadecimal value
    Hex32,
    /// 64-bit hexadecimal value
    Hex64,
    /// `0` or `1`
    Boolean,
    /// Any single character
    Character,
    /// Characters up to the next `,`
    Text,
    /// The whole remaining payload, uninterpreted
    Custom,
    /// `dd/mm/yyyy`
    Date,
    /// `hh:mm:ss`
    Time,
    /// Literal `?`
    Query,
    /// Literal `=`
    Assign,
}

impl ArgKind {
    /// Map a format type character to its argument kind
    pub fn from_char(ch: u8) -> Option<Self> {
        let kind = match ch {
            b'i' => ArgKind::Integer,
            b'v' => ArgKind::Value,
            b'x' => ArgKind::Hex32,
            b'X' => ArgKind::Hex64,
            b'b' => ArgKind::Boolean,
            b'c' => ArgKind::Character,
            b's' => ArgKind::Text,
            b'$' => ArgKind::Custom,
            b'd' => ArgKind::Date,
            b't' => ArgKind::Time,
            b'=' => ArgKind::Assign,
            b'?' => ArgKind::Query,
            _ => return None,
        };
        Some(kind)
    }
}

/// Compiled descriptor for one argument slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argument {
    pub kind: ArgKind,
    pub optional: bool,
    /// Fixed number of digits, or 0 for the kind's maximal default
    pub width: u8,
}

impl Argument {
    pub const fn new(kind: ArgKind) -> Self {
        Self {
            kind,
            optional: false,
            width: 0,
        }
    }
}

/// Ordered argument descriptors for one direction of a command
pub type ArgList = Vec<Argument, MAX_PARAMETERS>;

/// Compile a format specifier into its argument descriptors.
///
/// An empty specifier compiles to an empty list.  Fails with
/// [`Error::InvalidFormat`] on an unknown type character, an unclosed `[`, a
/// field width with more than 2 digits, or more than [`MAX_PARAMETERS`]
/// terms.
pub fn compile(spec: &str) -> Result<ArgList> {
    let bytes = spec.as_bytes();
    let mut args = ArgList::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let (arg, next) = term(bytes, pos)?;
        args.push(arg).map_err(|_| {
            warn!("Format {spec:?} has more than {MAX_PARAMETERS} arguments");
            Error::InvalidFormat
        })?;
        pos = next;

        // A separator is only needed between two terms that would otherwise
        // run together, so the next term may start here directly.
        if bytes.get(pos) == Some(&b',') {
            pos += 1;
            if pos == bytes.len() {
                warn!("Format {spec:?} has trailing separator");
                return Err(Error::InvalidFormat);
            }
        }
    }

    trace!("Compiled format {spec:?} to {} arguments", args.len());
    Ok(args)
}

// Compile the term starting at `pos`, returning it and the position just
// past it.
fn term(bytes: &[u8], mut pos: usize) -> Result<(Argument, usize)> {
    let optional = bytes.get(pos) == Some(&b'[');
    if optional {
        pos += 1;
    }

    let mut width: u8 = 0;
    let mut digits = 0;
    while let Some(ch) = bytes.get(pos).filter(|ch| ch.is_ascii_digit()) {
        if digits == 2 {
            return Err(Error::InvalidFormat);
        }
        width = width * 10 + (ch - b'0');
        digits += 1;
        pos += 1;
    }

    let kind = bytes
        .get(pos)
        .and_then(|&ch| ArgKind::from_char(ch))
        .ok_or(Error::InvalidFormat)?;
    pos += 1;

    if optional {
        if bytes.get(pos) != Some(&b']') {
            return Err(Error::InvalidFormat);
        }
        pos += 1;
    }

    Ok((
        Argument {
            kind,
            optional,
            width,
        },
        pos,
    ))
}
