use std::borrow::Cow;

use unicode_width::UnicodeWidthChar;

const ELLIPSIS: char = '…';

/// SEC-001: Remove terminal control characters and ANSI escape sequences.
///
/// Feed titles and descriptions are publisher-controlled and end up on the user's
/// terminal. Drops C0 controls other than tab/newline/CR, DEL, CSI sequences
/// (`ESC [` ... final byte) and OSC sequences (`ESC ]` ... BEL or `ESC \`).
///
/// Borrows when there is nothing to strip.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_unsafe) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\x1b' {
            if !is_unsafe(c) {
                out.push(c);
            }
            continue;
        }

        match chars.peek() {
            Some('[') => {
                chars.next();
                // Parameters and intermediates run until a final byte in 0x40..=0x7E
                for c in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&c) {
                        break;
                    }
                }
            }
            Some(']') => {
                chars.next();
                while let Some(c) = chars.next() {
                    if c == '\x07' {
                        break;
                    }
                    if c == '\x1b' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    Cow::Owned(out)
}

fn is_unsafe(c: char) -> bool {
    matches!(c, '\x00'..='\x08' | '\x0b' | '\x0c' | '\x0e'..='\x1f' | '\x7f')
}

/// Cut `s` to at most `max_width` terminal columns, ending in `…` when shortened.
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    let mut width = 0;
    let mut keep = 0; // byte length that still leaves room for the ellipsis

    for (idx, c) in s.char_indices() {
        let w = c.width().unwrap_or(0);
        if width + w > max_width {
            if max_width == 0 {
                return Cow::Borrowed("");
            }
            let mut out = s[..keep].trim_end().to_string();
            out.push(ELLIPSIS);
            return Cow::Owned(out);
        }
        width += w;
        if width < max_width {
            keep = idx + c.len_utf8();
        }
    }

    Cow::Borrowed(s)
}

/// Collapse runs of whitespace (including newlines) into single spaces.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
