//! # Parser
//!
//! Single-pass recursive-descent parser from text to [`Value`].
//!
//! The parser walks a byte cursor and fails at the first structural error
//! with [`ProtocolError::MalformedInput`], carrying the byte offset of the
//! problem. It never backtracks.
//!
//! ## Numbers
//! Numbers follow an explicit state machine: optional `-`, integer digits,
//! optional fraction, optional exponent with optional sign. A fraction or
//! exponent yields `Float64`. Plain integers are range-checked: `Int32` when
//! they fit, `Int64` otherwise, and an error beyond 64 bits.
//!
//! ## Strings
//! Strings are scanned forward with an escape flag, so `"a\\"` terminates
//! after the escaped backslash. All standard escapes are decoded, including
//! `\uXXXX` surrogate pairs.

use crate::config::MAX_NESTING_DEPTH;
use crate::core::value::{Map, Value};
use crate::error::{constants, ProtocolError, Result};

/// Parse a complete document.
///
/// Leading and trailing whitespace is allowed; anything else after the
/// top-level value is an error.
pub fn parse(text: &str) -> Result<Value> {
    let mut parser = Parser::new(text);
    parser.skip_whitespace();
    if parser.at_end() {
        return Err(parser.error(constants::ERR_EMPTY_INPUT));
    }

    let value = parser.parse_value(0)?;

    parser.skip_whitespace();
    if !parser.at_end() {
        return Err(parser.error(constants::ERR_TRAILING_CHARACTERS));
    }

    Ok(value)
}

/// Parse a document from raw bytes, validating UTF-8 first.
pub fn parse_bytes(bytes: &[u8]) -> Result<Value> {
    let text = std::str::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8)?;
    parse(text)
}

struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    #[inline]
    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    #[inline]
    fn error(&self, reason: &'static str) -> ProtocolError {
        ProtocolError::MalformedInput {
            position: self.pos,
            reason,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
            self.pos += 1;
        }
    }

    /// Consume `expected` after optional whitespace.
    fn expect(&mut self, expected: u8, reason: &'static str) -> Result<()> {
        self.skip_whitespace();
        match self.peek() {
            Some(b) if b == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(_) => Err(self.error(reason)),
            None => Err(self.error(constants::ERR_UNEXPECTED_END)),
        }
    }

    fn parse_value(&mut self, depth: usize) -> Result<Value> {
        self.skip_whitespace();
        match self.peek() {
            Some(b'{') => self.parse_object(depth + 1),
            Some(b'[') => self.parse_array(depth + 1),
            Some(b'"') => self.parse_string().map(Value::Str),
            Some(b't') => self.parse_literal("true", Value::Bool(true)),
            Some(b'f') => self.parse_literal("false", Value::Bool(false)),
            Some(b'n') => self.parse_literal("null", Value::Null),
            Some(b'-' | b'0'..=b'9') => self.parse_number(),
            Some(_) => Err(self.error(constants::ERR_UNEXPECTED_CHAR)),
            None => Err(self.error(constants::ERR_UNEXPECTED_END)),
        }
    }

    fn parse_object(&mut self, depth: usize) -> Result<Value> {
        if depth > MAX_NESTING_DEPTH {
            return Err(self.error(constants::ERR_TOO_DEEP));
        }

        let mut map = Map::new();
        self.expect(b'{', constants::ERR_UNEXPECTED_CHAR)?;
        self.skip_whitespace();

        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(Value::Object(map));
        }

        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'"') => {}
                Some(b'}') => return Err(self.error(constants::ERR_TRAILING_COMMA)),
                Some(_) => return Err(self.error(constants::ERR_EXPECTED_KEY)),
                None => return Err(self.error(constants::ERR_UNEXPECTED_END)),
            }

            let key = self.parse_string()?;
            self.expect(b':', constants::ERR_EXPECTED_COLON)?;
            let value = self.parse_value(depth)?;
            map.insert(key, value);

            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                }
                Some(_) => return Err(self.error(constants::ERR_EXPECTED_COMMA)),
                None => return Err(self.error(constants::ERR_UNEXPECTED_END)),
            }
        }
    }

    fn parse_array(&mut self, depth: usize) -> Result<Value> {
        if depth > MAX_NESTING_DEPTH {
            return Err(self.error(constants::ERR_TOO_DEEP));
        }

        let mut items = Vec::new();
        self.expect(b'[', constants::ERR_UNEXPECTED_CHAR)?;
        self.skip_whitespace();

        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(Value::List(items));
        }

        loop {
            self.skip_whitespace();
            if self.peek() == Some(b']') {
                return Err(self.error(constants::ERR_TRAILING_COMMA));
            }

            items.push(self.parse_value(depth)?);

            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Value::List(items));
                }
                Some(_) => return Err(self.error(constants::ERR_EXPECTED_COMMA)),
                None => return Err(self.error(constants::ERR_UNEXPECTED_END)),
            }
        }
    }

    fn parse_literal(&mut self, literal: &'static str, value: Value) -> Result<Value> {
        if self.bytes[self.pos..].starts_with(literal.as_bytes()) {
            self.pos += literal.len();
            Ok(value)
        } else {
            Err(self.error(constants::ERR_INVALID_LITERAL))
        }
    }

    /// Cursor must sit on the opening quote.
    fn parse_string(&mut self) -> Result<String> {
        let open = self.pos;
        self.pos += 1;

        let mut out = String::new();
        let mut run_start = self.pos;

        loop {
            let Some(byte) = self.peek() else {
                return Err(ProtocolError::MalformedInput {
                    position: open,
                    reason: constants::ERR_UNTERMINATED_STRING,
                });
            };

            match byte {
                b'"' => {
                    out.push_str(&self.text[run_start..self.pos]);
                    self.pos += 1;
                    return Ok(out);
                }
                b'\\' => {
                    out.push_str(&self.text[run_start..self.pos]);
                    self.pos += 1;
                    self.parse_escape(&mut out)?;
                    run_start = self.pos;
                }
                0x00..=0x1F => return Err(self.error(constants::ERR_CONTROL_CHAR)),
                _ => self.pos += 1,
            }
        }
    }

    /// Cursor sits just after the backslash.
    fn parse_escape(&mut self, out: &mut String) -> Result<()> {
        let Some(byte) = self.peek() else {
            return Err(self.error(constants::ERR_UNEXPECTED_END));
        };
        self.pos += 1;

        let decoded = match byte {
            b'"' => '"',
            b'\\' => '\\',
            b'/' => '/',
            b'b' => '\u{0008}',
            b'f' => '\u{000C}',
            b'n' => '\n',
            b'r' => '\r',
            b't' => '\t',
            b'u' => self.parse_unicode_escape()?,
            _ => {
                self.pos -= 1;
                return Err(self.error(constants::ERR_INVALID_ESCAPE));
            }
        };
        out.push(decoded);
        Ok(())
    }

    fn parse_hex4(&mut self) -> Result<u16> {
        let text = self.text;
        let digits = text
            .get(self.pos..self.pos + 4)
            .ok_or_else(|| self.error(constants::ERR_INVALID_UNICODE))?;
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(self.error(constants::ERR_INVALID_UNICODE));
        }
        let unit =
            u16::from_str_radix(digits, 16).map_err(|_| self.error(constants::ERR_INVALID_UNICODE))?;
        self.pos += 4;
        Ok(unit)
    }

    /// Cursor sits just after `\u`.
    fn parse_unicode_escape(&mut self) -> Result<char> {
        let first = self.parse_hex4()?;

        let code = match first {
            0xD800..=0xDBFF => {
                if !self.bytes[self.pos..].starts_with(b"\\u") {
                    return Err(self.error(constants::ERR_INVALID_UNICODE));
                }
                self.pos += 2;
                let second = self.parse_hex4()?;
                if !(0xDC00..=0xDFFF).contains(&second) {
                    return Err(self.error(constants::ERR_INVALID_UNICODE));
                }
                0x10000 + ((u32::from(first) - 0xD800) << 10) + (u32::from(second) - 0xDC00)
            }
            0xDC00..=0xDFFF => return Err(self.error(constants::ERR_INVALID_UNICODE)),
            _ => u32::from(first),
        };

        char::from_u32(code).ok_or_else(|| self.error(constants::ERR_INVALID_UNICODE))
    }

    fn scan_digits(&mut self) -> usize {
        let start = self.pos;
        while let Some(b'0'..=b'9') = self.peek() {
            self.pos += 1;
        }
        self.pos - start
    }

    fn parse_number(&mut self) -> Result<Value> {
        let start = self.pos;
        let mut is_float = false;

        if self.peek() == Some(b'-') {
            self.pos += 1;
        }

        if self.scan_digits() == 0 {
            return Err(self.error(constants::ERR_INVALID_NUMBER));
        }

        if self.peek() == Some(b'.') {
            is_float = true;
            self.pos += 1;
            if self.scan_digits() == 0 {
                return Err(self.error(constants::ERR_INVALID_NUMBER));
            }
        }

        if let Some(b'e' | b'E') = self.peek() {
            is_float = true;
            self.pos += 1;
            if let Some(b'+' | b'-') = self.peek() {
                self.pos += 1;
            }
            if self.scan_digits() == 0 {
                return Err(self.error(constants::ERR_INVALID_NUMBER));
            }
        }

        // A number running straight into another token, e.g. `1.2.3` or `12abc`.
        if let Some(b'.' | b'e' | b'E' | b'+' | b'-' | b'a'..=b'z' | b'A'..=b'Z') = self.peek() {
            return Err(self.error(constants::ERR_INVALID_NUMBER));
        }

        let token = &self.text[start..self.pos];

        if is_float {
            // Overflow to infinity has no text form to round-trip through.
            return match token.parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(Value::Float64(n)),
                _ => Err(ProtocolError::MalformedInput {
                    position: start,
                    reason: constants::ERR_INVALID_NUMBER,
                }),
            };
        }

        let wide = token.parse::<i64>().map_err(|_| ProtocolError::MalformedInput {
            position: start,
            reason: constants::ERR_INTEGER_RANGE,
        })?;

        Ok(match i32::try_from(wide) {
            Ok(narrow) => Value::Int32(narrow),
            Err(_) => Value::Int64(wide),
        })
    }
}
