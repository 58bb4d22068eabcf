//! Key to filename mapping for the durable tier.
//!
//! Cache keys are arbitrary strings (provider ARNs contain `:` and `/`), so
//! they cannot name files directly. [`encode`] maps any key to a flat,
//! filesystem-safe filename and [`decode`] inverts it exactly, rejecting
//! filenames this module did not produce so foreign files in the cache root
//! are never mistaken for cached objects.
//!
//! The mapping is total and injective: every key has exactly one filename,
//! and distinct keys never collide. Well-behaved keys (ASCII alphanumerics,
//! `-`, `_`, interior dots) pass through unchanged, so a key like
//! `secretARN1` names its file verbatim.

/// Bytes that pass through unescaped: ASCII alphanumerics plus `-` `_` `.`.
fn is_plain(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.')
}

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Encode a cache key as a filesystem-safe filename.
///
/// Every byte outside the plain set, plus a leading `.`, is written as `%XX`
/// with uppercase hex. No output is ever `.`, `..`, empty, or contains a path
/// separator. The empty key encodes to the reserved filename `"%"`, which no
/// other key can produce because `%` is itself always escaped.
pub fn encode(key: &str) -> String {
    if key.is_empty() {
        return "%".to_string();
    }
    let mut out = String::with_capacity(key.len());
    for (i, byte) in key.bytes().enumerate() {
        if is_plain(byte) && !(i == 0 && byte == b'.') {
            out.push(byte as char);
        } else {
            out.push('%');
            out.push(HEX[(byte >> 4) as usize] as char);
            out.push(HEX[(byte & 0x0F) as usize] as char);
        }
    }
    out
}

/// Decode a filename back to its cache key.
///
/// Returns `None` for any filename [`encode`] could not have produced,
/// including non-canonical escapes (lowercase hex, or an escape of a byte
/// that would have passed through plain).
pub fn decode(name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    if name == "%" {
        return Some(String::new());
    }

    let bytes = name.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hi = hex_value(*bytes.get(i + 1)?)?;
                let lo = hex_value(*bytes.get(i + 2)?)?;
                let byte = (hi << 4) | lo;
                // Only bytes encode() would have escaped are valid here.
                if is_plain(byte) && !(out.is_empty() && byte == b'.') {
                    return None;
                }
                out.push(byte);
                i += 3;
            }
            byte if is_plain(byte) => {
                if out.is_empty() && byte == b'.' {
                    return None;
                }
                out.push(byte);
                i += 1;
            }
            _ => return None,
        }
    }
    String::from_utf8(out).ok()
}

/// Uppercase hex digit value. Lowercase is rejected to keep decode canonical.
fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
