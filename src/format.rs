//! Message formatting: inbound payload bytes to display text.
//!
//! Two renderings exist. Text mode decodes UTF-8 (invalid sequences become
//! U+FFFD) and folds every newline-family sequence (`\r\n`, `\n\r`, lone `\r`,
//! lone `\n`) into a single `\n`. Raw mode shows each byte as its escaped
//! literal (`\r`, `\n`, `\x1b`, ...) but still breaks the line after every
//! newline-family sequence so the output stays readable.

use chrono::{DateTime, Local};

/// Rendering flags, snapshotted per message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatOptions {
    /// Prefix each message with `[HH:MM:SS.mmm] `.
    pub timestamp: bool,
    /// Show escaped bytes instead of decoded text.
    pub raw: bool,
}

/// Render one inbound payload.
pub fn format_message(
    payload: &[u8],
    received_at: DateTime<Local>,
    options: FormatOptions,
) -> String {
    let body = if options.raw {
        escape_raw(payload)
    } else {
        normalize_newlines(&String::from_utf8_lossy(payload))
    };

    if options.timestamp {
        let mut out = timestamp_prefix(received_at);
        out.push_str(&body);
        out
    } else {
        body
    }
}

/// `[HH:MM:SS.mmm] ` for the given instant, truncated to milliseconds.
pub fn timestamp_prefix(at: DateTime<Local>) -> String {
    at.format("[%H:%M:%S%.3f] ").to_string()
}

/// Replace every newline-family sequence with a single `\n`.
pub fn normalize_newlines(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;

    while let Some(offset) = memchr::memchr2(b'\r', b'\n', &bytes[pos..]) {
        let at = pos + offset;
        // `\r` and `\n` are ASCII, so `at` is always a char boundary.
        out.push_str(&text[pos..at]);
        out.push('\n');
        pos = at + newline_len(bytes, at);
    }
    out.push_str(&text[pos..]);
    out
}

/// Escape every byte and add a real line break after each newline sequence.
pub fn escape_raw(payload: &[u8]) -> String {
    let mut out = String::with_capacity(payload.len() * 2);
    let mut pos = 0;

    while pos < payload.len() {
        let byte = payload[pos];
        if byte == b'\r' || byte == b'\n' {
            let len = newline_len(payload, pos);
            for &b in &payload[pos..pos + len] {
                push_escaped(&mut out, b);
            }
            out.push('\n');
            pos += len;
        } else {
            push_escaped(&mut out, byte);
            pos += 1;
        }
    }
    out
}

/// Length of the newline sequence starting at `at` (1 or 2).
fn newline_len(bytes: &[u8], at: usize) -> usize {
    match (bytes[at], bytes.get(at + 1)) {
        (b'\r', Some(b'\n')) | (b'\n', Some(b'\r')) => 2,
        _ => 1,
    }
}

fn push_escaped(out: &mut String, byte: u8) {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    match byte {
        b'\\' => out.push_str("\\\\"),
        b'\'' => out.push_str("\\'"),
        b'\t' => out.push_str("\\t"),
        b'\n' => out.push_str("\\n"),
        b'\r' => out.push_str("\\r"),
        0x20..=0x7e => out.push(byte as char),
        _ => {
            out.push_str("\\x");
            out.push(HEX[(byte >> 4) as usize] as char);
            out.push(HEX[(byte & 0x0f) as usize] as char);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(h: u32, m: u32, s: u32, ms: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 3, 1, h, m, s)
            .single()
            .unwrap()
            + chrono::Duration::microseconds(ms as i64 * 1000 + 999)
    }

    const TEXT: FormatOptions = FormatOptions {
        timestamp: false,
        raw: false,
    };

    #[test]
    fn test_crlf_becomes_single_break() {
        assert_eq!(format_message(b"hello\r\n", at(0, 0, 0, 0), TEXT), "hello\n");
    }

    #[test]
    fn test_every_newline_family_member_normalizes() {
        assert_eq!(normalize_newlines("a\r\nb\n\rc\rd\ne"), "a\nb\nc\nd\ne");
    }

    #[test]
    fn test_double_crlf_is_two_breaks() {
        assert_eq!(normalize_newlines("a\r\n\r\nb"), "a\n\nb");
    }

    #[test]
    fn test_invalid_utf8_replaced() {
        let out = format_message(b"ok\xffend", at(0, 0, 0, 0), TEXT);
        assert_eq!(out, "ok\u{fffd}end");
    }

    #[test]
    fn test_multibyte_text_survives_normalization() {
        let payload = "température\r\n°C".as_bytes();
        assert_eq!(
            format_message(payload, at(0, 0, 0, 0), TEXT),
            "température\n°C"
        );
    }

    #[test]
    fn test_timestamp_prefix_truncates_to_millis() {
        let options = FormatOptions {
            timestamp: true,
            raw: false,
        };
        let out = format_message(b"x", at(13, 5, 9, 42), options);
        assert_eq!(out, "[13:05:09.042] x");
    }

    #[test]
    fn test_raw_mode_shows_escapes_and_breaks_lines() {
        let options = FormatOptions {
            timestamp: false,
            raw: true,
        };
        let out = format_message(b"OK\r\nERR\n\r\x1b[0m\r", at(0, 0, 0, 0), options);
        assert_eq!(out, "OK\\r\\n\nERR\\n\\r\n\\x1b[0m\\r\n");
    }

    #[test]
    fn test_raw_mode_escapes_quote_and_backslash() {
        assert_eq!(escape_raw(b"it's \\ \t"), "it\\'s \\\\ \\t");
    }

    #[test]
    fn test_raw_mode_with_timestamp() {
        let options = FormatOptions {
            timestamp: true,
            raw: true,
        };
        let out = format_message(b"\n", at(23, 59, 59, 999), options);
        assert_eq!(out, "[23:59:59.999] \\n\n");
    }
}
