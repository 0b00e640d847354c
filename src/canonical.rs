//! Canonical JSON: the stable byte-exact serialization used as the
//! hashing and signing domain for every artifact in this crate.
//!
//! Rules: object keys sorted by UTF-16 code-unit order, arrays keep input
//! order, minimal string escaping, integers without a decimal point,
//! non-integers in shortest round-trip form, no insignificant whitespace,
//! no Unicode normalization.

use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;

/// Convert any serializable value into a `serde_json::Value` suitable for
/// canonical encoding. Non-finite floats are rejected with
/// `Error::InvalidCanonical`.
pub fn to_canonical_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::InvalidCanonical(e.to_string()))
}

/// Canonical UTF-8 bytes of a JSON value.
pub fn canonical_json_bytes(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(128);
    write_value(value, &mut out)?;
    Ok(out)
}

/// Canonical encoding as a `String`.
pub fn canonical_json_string(value: &Value) -> Result<String> {
    let bytes = canonical_json_bytes(value)?;
    // write_value only emits valid UTF-8
    String::from_utf8(bytes).map_err(|e| Error::InvalidCanonical(e.to_string()))
}

/// SHA-256 over the canonical encoding, lowercase 64-hex.
pub fn hash_canonical_hex(value: &Value) -> Result<String> {
    let bytes = canonical_json_bytes(value)?;
    Ok(crate::crypto::sha256_hex(&bytes))
}

/// Key comparator: UTF-16 code-unit order, the iteration order of the
/// reference object model. Differs from `str::cmp` only for keys with
/// supplementary-plane characters.
fn utf16_key_cmp(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => {
            if n.as_f64().map(|f| !f.is_finite()).unwrap_or(false) {
                return Err(Error::InvalidCanonical("non-finite number".to_string()));
            }
            // itoa for integers, ryu shortest round-trip for floats
            let s = serde_json::to_string(n)
                .map_err(|e| Error::InvalidCanonical(e.to_string()))?;
            out.extend_from_slice(s.as_bytes());
        }
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| utf16_key_cmp(a, b));
            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(key.as_str(), out);
                out.push(b':');
                write_value(&map[key.as_str()], out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn write_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\u{08}' => out.extend_from_slice(b"\\b"),
            '\t' => out.extend_from_slice(b"\\t"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\u{0c}' => out.extend_from_slice(b"\\f"),
            '\r' => out.extend_from_slice(b"\\r"),
            c if (c as u32) < 0x20 => {
                let esc = format!("\\u{:04x}", c as u32);
                out.extend_from_slice(esc.as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}
