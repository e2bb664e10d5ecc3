//! Byte-exact encoding used for hashing.
//!
//! Output matches Python's `json.dumps(value, sort_keys=True)`: `", "` between
//! elements, `": "` after keys, everything outside printable ASCII escaped as
//! `\uXXXX`, and floats written with `repr` rules. Key order comes from the
//! field order of the serialized structs.

use serde::Serialize;
use serde_json::ser::Formatter;
use std::io::{self, Write};

/// Shortest round-trip rendering of `value`, following Python's `repr(float)`:
/// positional notation while the decimal exponent is in `-4..16`, scientific
/// with a signed two-digit exponent outside it, and `.0` on integral values.
pub fn float_repr(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let sign = if value.is_sign_negative() { "-" } else { "" };
    // Rust's `{:e}` already yields the shortest round-trip digits.
    let sci = format!("{:e}", value.abs());
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let Ok(exp) = exp.parse::<i32>() else {
        return sci;
    };
    let digits = mantissa.replace('.', "");
    let point = exp + 1;

    if point <= -4 || point > 16 {
        let (first, rest) = digits.split_at(1);
        let mantissa = if rest.is_empty() {
            first.to_string()
        } else {
            format!("{first}.{rest}")
        };
        let exp_sign = if exp < 0 { '-' } else { '+' };
        return format!("{sign}{mantissa}e{exp_sign}{:02}", exp.abs());
    }

    let len = digits.len() as i32;
    if point <= 0 {
        format!("{sign}0.{}{digits}", "0".repeat(point.unsigned_abs() as usize))
    } else if point < len {
        let (int, frac) = digits.split_at(point as usize);
        format!("{sign}{int}.{frac}")
    } else {
        format!("{sign}{digits}{}.0", "0".repeat((point - len) as usize))
    }
}

/// `serde_json` formatter producing the hashing encoding described above.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn begin_array_value<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_f64<W: ?Sized + Write>(&mut self, writer: &mut W, value: f64) -> io::Result<()> {
        writer.write_all(float_repr(value).as_bytes())
    }

    fn write_string_fragment<W: ?Sized + Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        // Quotes, backslashes and C0 controls never reach here; serde_json
        // escapes them itself with the same spelling Python uses.
        for c in fragment.chars() {
            if (' '..='~').contains(&c) {
                writer.write_all(&[c as u8])?;
            } else {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}

/// Encode `value` with [`CanonicalFormatter`].
pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(256);
    let mut ser = serde_json::Serializer::with_formatter(&mut out, CanonicalFormatter);
    value.serialize(&mut ser)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn float_repr_examples() {
        let cases = [
            (10.0, "10.0"),
            (1_600_000_001.25, "1600000001.25"),
            (123.456, "123.456"),
            (-2.5, "-2.5"),
            (0.0, "0.0"),
            (-0.0, "-0.0"),
            (0.0001, "0.0001"),
            (1e-5, "1e-05"),
            (1e15, "1000000000000000.0"),
            (1_234_567_890_123_456.0, "1234567890123456.0"),
            (1e16, "1e+16"),
            (1.5e16, "1.5e+16"),
            (1e22, "1e+22"),
            (5e-324, "5e-324"),
            (f64::MAX, "1.7976931348623157e+308"),
            (0.1 + 0.2, "0.30000000000000004"),
            (f64::NAN, "nan"),
            (f64::NEG_INFINITY, "-inf"),
        ];
        for (value, expected) in cases {
            assert_eq!(float_repr(value), expected, "repr of {value:e}");
        }
    }

    #[test]
    fn separators_have_spaces() {
        let value = json!({ "a": [1, 2], "b": "x" });
        let bytes = to_vec(&value).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"a": [1, 2], "b": "x"}"#);
    }

    #[test]
    fn empty_containers() {
        let value = json!({ "list": [], "map": {} });
        let bytes = to_vec(&value).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"list": [], "map": {}}"#);
    }

    #[test]
    fn strings_are_ascii_escaped() {
        let text = "Zo\u{eb} \u{65e5}\u{1F600}\u{7f}\n\"q\\";
        let bytes = to_vec(text).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#""Zo\u00eb \u65e5\ud83d\ude00\u007f\n\"q\\""#
        );
    }
}
