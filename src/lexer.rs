//! Lexers for the individual DUCI argument types.
//!
//! Each lexer reads from a [`Cursor`] positioned at the start of the field,
//! and leaves the cursor just past whatever it consumed, whether or not the
//! field was valid.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use heapless::String;

use crate::STRING_LENGTH_LIMIT;

/// Default maximum digits for a decimal integer, enough for `-4294967296`
pub const INTEGER_MAX_DIGITS: usize = 11;

/// Default maximum digits for a 32-bit hex value
pub const HEX32_MAX_DIGITS: usize = 4;

/// Default maximum digits for a 64-bit hex value
pub const HEX64_MAX_DIGITS: usize = 8;

/// Earliest year accepted in a date
pub const MIN_YEAR: u16 = 2018;

/// Latest year accepted in a date
pub const MAX_YEAR: u16 = 2099;

const MONTH_DAYS: [u8; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// A field that could not be lexed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexError;

pub type LexResult<T> = core::result::Result<T, LexError>;

/// Calendar date, as carried by a `d` argument
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    pub day: u8,
    pub month: u8,
    pub year: u16,
}

/// Time of day, as carried by a `t` argument
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Time {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

/// Read position within a line's argument payload
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    pub fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.text.as_bytes().get(self.pos + offset).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.text.len()
    }

    /// Unconsumed text
    pub fn rest(&self) -> &'a str {
        self.text.get(self.pos..).unwrap_or("")
    }

    pub fn remaining(&self) -> usize {
        self.text.len().saturating_sub(self.pos)
    }

    pub fn advance(&mut self, count: usize) {
        self.pos = (self.pos + count).min(self.text.len());
    }

    /// Consume `ch` if it is next
    pub fn eat(&mut self, ch: u8) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume the next character, whatever it is
    pub fn next_char(&mut self) -> Option<char> {
        let ch = self.rest().chars().next()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn next_digit(&mut self) -> Option<u8> {
        let ch = self.peek().filter(u8::is_ascii_digit)?;
        self.pos += 1;
        Some(ch - b'0')
    }

    fn next_hex_digit(&mut self) -> Option<u8> {
        let value = (self.peek()? as char).to_digit(16)?;
        self.pos += 1;
        Some(value as u8)
    }
}

/// Decimal integer with optional leading `-`.
///
/// Reads up to `width` digits, or [`INTEGER_MAX_DIGITS`] if `width` is 0.
/// Fails if there are no digits, or fewer than a non-zero `width`.  Values
/// beyond `i32` keep their low 32 bits, so unsigned 32-bit values survive as
/// their bit pattern.
pub fn integer(cursor: &mut Cursor<'_>, width: usize) -> LexResult<i32> {
    let minus = cursor.eat(b'-');
    let max = if width == 0 { INTEGER_MAX_DIGITS } else { width };

    let mut value: u32 = 0;
    let mut count = 0;
    while count < max {
        match cursor.next_digit() {
            Some(digit) => value = value.wrapping_mul(10).wrapping_add(u32::from(digit)),
            None => break,
        }
        count += 1;
    }

    if count == 0 || (width > 0 && count < width) {
        return Err(LexError);
    }

    if minus {
        value = value.wrapping_neg();
    }
    Ok(value as i32)
}

/// 32-bit hex value, up to `width` digits or [`HEX32_MAX_DIGITS`] if 0
pub fn hex32(cursor: &mut Cursor<'_>, width: usize) -> LexResult<u32> {
    let max = if width == 0 { HEX32_MAX_DIGITS } else { width };
    hex(cursor, width, max).map(|value| value as u32)
}

/// 64-bit hex value, optionally prefixed by `0x`, up to `width` digits or
/// [`HEX64_MAX_DIGITS`] if 0
pub fn hex64(cursor: &mut Cursor<'_>, width: usize) -> LexResult<u64> {
    if cursor.peek() == Some(b'0') && matches!(cursor.peek_at(1), Some(b'x' | b'X')) {
        cursor.advance(2);
    }
    let max = if width == 0 { HEX64_MAX_DIGITS } else { width };
    hex(cursor, width, max)
}

fn hex(cursor: &mut Cursor<'_>, width: usize, max: usize) -> LexResult<u64> {
    let mut value: u64 = 0;
    let mut count = 0;
    while count < max {
        match cursor.next_hex_digit() {
            Some(digit) => value = (value << 4) | u64::from(digit),
            None => break,
        }
        count += 1;
    }

    if count == 0 || (width > 0 && count < width) {
        Err(LexError)
    } else {
        Ok(value)
    }
}

/// Floating point value: optional sign, digits, optional fraction and
/// optional exponent.  At least one digit is required.
pub fn value(cursor: &mut Cursor<'_>) -> LexResult<f32> {
    let start = cursor.clone();
    let mut len = 0;

    if matches!(cursor.peek(), Some(b'+' | b'-')) {
        len += 1;
    }

    let mut digits = 0;
    while cursor.peek_at(len).is_some_and(|ch| ch.is_ascii_digit()) {
        len += 1;
        digits += 1;
    }
    if cursor.peek_at(len) == Some(b'.') {
        len += 1;
        while cursor.peek_at(len).is_some_and(|ch| ch.is_ascii_digit()) {
            len += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return Err(LexError);
    }

    // Exponent only counts if digits follow it
    if matches!(cursor.peek_at(len), Some(b'e' | b'E')) {
        let mut exp = len + 1;
        if matches!(cursor.peek_at(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        if cursor.peek_at(exp).is_some_and(|ch| ch.is_ascii_digit()) {
            while cursor.peek_at(exp).is_some_and(|ch| ch.is_ascii_digit()) {
                exp += 1;
            }
            len = exp;
        }
    }

    let text = start.rest().get(..len).ok_or(LexError)?;
    let value = text.parse::<f32>().map_err(|_| LexError)?;
    cursor.advance(len);
    Ok(value)
}

/// Characters up to the next `,` or end of payload
pub fn text(cursor: &mut Cursor<'_>) -> LexResult<String<STRING_LENGTH_LIMIT>> {
    let rest = cursor.rest();
    let len = rest.find(',').unwrap_or(rest.len());
    cursor.advance(len);

    let mut out = String::new();
    out.push_str(&rest[..len]).map_err(|_| LexError)?;
    Ok(out)
}

/// The whole remaining payload, truncated to the parameter capacity
pub fn custom(cursor: &mut Cursor<'_>) -> String<STRING_LENGTH_LIMIT> {
    let mut out = String::new();
    for ch in cursor.rest().chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    cursor.advance(cursor.remaining());
    out
}

/// Date as exactly `dd/mm/yyyy`, which must be a valid calendar date
pub fn date(cursor: &mut Cursor<'_>) -> LexResult<Date> {
    if cursor.remaining() < 10 {
        return Err(LexError);
    }

    let day = fixed_digits(cursor, 2)?;
    separator(cursor, b'/')?;
    let month = fixed_digits(cursor, 2)?;
    separator(cursor, b'/')?;
    let year = fixed_digits(cursor, 4)?;

    let date = Date {
        day: day as u8,
        month: month as u8,
        year: year as u16,
    };
    if is_date_valid(&date) {
        Ok(date)
    } else {
        Err(LexError)
    }
}

/// Time as exactly `hh:mm:ss`.  Field ranges are not checked.
pub fn time(cursor: &mut Cursor<'_>) -> LexResult<Time> {
    if cursor.remaining() < 8 {
        return Err(LexError);
    }

    let hours = fixed_digits(cursor, 2)?;
    separator(cursor, b':')?;
    let minutes = fixed_digits(cursor, 2)?;
    separator(cursor, b':')?;
    let seconds = fixed_digits(cursor, 2)?;

    Ok(Time {
        hours: hours as u8,
        minutes: minutes as u8,
        seconds: seconds as u8,
    })
}

/// Check a date against the calendar, including leap years, and the
/// instrument's supported year range
pub fn is_date_valid(date: &Date) -> bool {
    let Date { day, month, year } = *date;

    if !(MIN_YEAR..=MAX_YEAR).contains(&year) || !(1..=12).contains(&month) || day < 1 {
        return false;
    }
    if day > MONTH_DAYS[month as usize - 1] {
        return false;
    }
    if month == 2 && day > 28 {
        let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
        return leap;
    }
    true
}

fn fixed_digits(cursor: &mut Cursor<'_>, count: usize) -> LexResult<u32> {
    let mut value = 0u32;
    for _ in 0..count {
        let digit = cursor.next_digit().ok_or(LexError)?;
        value = value * 10 + u32::from(digit);
    }
    Ok(value)
}

fn separator(cursor: &mut Cursor<'_>, ch: u8) -> LexResult<()> {
    if cursor.eat(ch) { Ok(()) } else { Err(LexError) }
}
