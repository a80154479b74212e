//! Purpose: Encode cell text for line-editing interactive shells.
//! Exports: `encode_for_line_shell`, control key constants (`CTRL_*`, `SUBMIT`).
//! Role: Terminal-transport payload builder used by the session in line mode.
//! Invariants: Trailing line breaks are dropped before the optional submit; blank lines never reach the shell.
//! Invariants: Every embedded `\n` is followed by exactly one `CTRL_U`.

pub const CTRL_C: char = '\x03';
pub const CTRL_N: char = '\x0e';
pub const CTRL_O: char = '\x0f';
pub const CTRL_P: char = '\x10';
/// Kill-line directive: discard everything before the cursor on the input line.
pub const CTRL_U: char = '\x15';
/// Line-submission directive.
pub const SUBMIT: char = '\r';

fn is_line_break(ch: char) -> bool {
    ch == '\n' || ch == '\r'
}

/// Encodes a block so a line-editing shell reproduces it without stacking autoindent.
///
/// Trailing line breaks are dropped, runs of breaks collapse into one `\n`, and each
/// remaining `\n` is followed by a kill-line directive. When the last line is indented
/// a submission directive is appended so the shell does not hold it in its buffer.
pub fn encode_for_line_shell(text: &str) -> String {
    let trimmed = text.trim_end_matches(is_line_break);
    let mut out = String::with_capacity(trimmed.len() + 16);
    let mut in_break = false;
    for ch in trimmed.chars() {
        if is_line_break(ch) {
            if !in_break {
                out.push('\n');
                out.push(CTRL_U);
            }
            in_break = true;
        } else {
            in_break = false;
            out.push(ch);
        }
    }
    if last_line_is_indented(&out) {
        out.push(SUBMIT);
    }
    out
}

// Only lines that followed a break are inspected; a single-line block is sent as is.
fn last_line_is_indented(encoded: &str) -> bool {
    let Some((_, last)) = encoded.rsplit_once('\n') else {
        return false;
    };
    let last = last.strip_prefix(CTRL_U).unwrap_or(last);
    last.starts_with(|ch: char| ch.is_whitespace() || ch == CTRL_U)
}
