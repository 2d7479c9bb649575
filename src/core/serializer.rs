//! # Serializer
//!
//! Compact text encoding of a [`Value`], the inverse of [`crate::core::parser`].
//!
//! Output has no insignificant whitespace. Object keys come out in map
//! order. Floats always carry a `.` or an exponent so they parse back as
//! `Float64`; non-finite floats have no text form and are written as `null`.

use std::fmt::Write;

use crate::core::value::Value;

/// Serialize `value` to its compact text form. Never fails.
pub fn stringify(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Append the text form of `value` to `out`.
pub fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Int32(n) => {
            let _ = write!(out, "{n}");
        }
        Value::Int64(n) => {
            let _ = write!(out, "{n}");
        }
        Value::Float64(n) => write_float(out, *n),
        Value::Str(s) => write_string(out, s),
        Value::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_float(out: &mut String, n: f64) {
    if !n.is_finite() {
        out.push_str("null");
        return;
    }
    // `Debug` gives the shortest round-trip form and keeps `.0` on integral values.
    let _ = write!(out, "{n:?}");
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    let mut run_start = 0;
    for (i, ch) in s.char_indices() {
        let escaped = match ch {
            '"' => "\\\"",
            '\\' => "\\\\",
            '\n' => "\\n",
            '\r' => "\\r",
            '\t' => "\\t",
            '\u{0008}' => "\\b",
            '\u{000C}' => "\\f",
            c if (c as u32) < 0x20 => {
                out.push_str(&s[run_start..i]);
                let _ = write!(out, "\\u{:04x}", c as u32);
                run_start = i + 1;
                continue;
            }
            _ => continue,
        };
        out.push_str(&s[run_start..i]);
        out.push_str(escaped);
        run_start = i + ch.len_utf8();
    }
    out.push_str(&s[run_start..]);
    out.push('"');
}
