//! Purpose: Frame a cell for interpreters that need explicit multi-line paste mode.
//! Exports: `PasteFraming`, `DEFAULT_CHUNK_SIZE`, `split_lines`, `paste_chunks`, `paste_messages`.
//! Role: Pure message planner; the terminal layer performs the writes.
//! Invariants: Output is begin marker, one or more chunks, end marker, in that order.
//! Invariants: No chunk holds more than `chunk_size` physical lines.

use crate::core::error::{Error, ErrorKind};

pub const DEFAULT_CHUNK_SIZE: usize = 25;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PasteFraming {
    pub begin: String,
    pub end: String,
}

impl Default for PasteFraming {
    fn default() -> Self {
        // IPython's quiet %cpaste terminates on a line holding only `--`.
        Self {
            begin: "%cpaste -q".to_string(),
            end: "--".to_string(),
        }
    }
}

/// Splits on `\n`, `\r\n` and lone `\r`; a final line break does not add an empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut idx = 0;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\n' => {
                lines.push(&text[start..idx]);
                idx += 1;
                start = idx;
            }
            b'\r' => {
                lines.push(&text[start..idx]);
                idx += 1;
                if bytes.get(idx) == Some(&b'\n') {
                    idx += 1;
                }
                start = idx;
            }
            _ => idx += 1,
        }
    }
    if start < bytes.len() {
        lines.push(&text[start..]);
    }
    lines
}

/// Groups the lines of `text` into `\n`-joined chunks of at most `chunk_size` lines.
pub fn paste_chunks(text: &str, chunk_size: usize) -> Result<Vec<String>, Error> {
    if chunk_size == 0 {
        return Err(Error::new(ErrorKind::Config).with_message("chunk_size must be at least 1"));
    }
    Ok(split_lines(text)
        .chunks(chunk_size)
        .map(|chunk| chunk.join("\n"))
        .collect())
}

/// Full message sequence for one paste: begin marker, chunks, end marker.
pub fn paste_messages(
    text: &str,
    framing: &PasteFraming,
    chunk_size: usize,
) -> Result<Vec<String>, Error> {
    let chunks = paste_chunks(text, chunk_size)?;
    let mut messages = Vec::with_capacity(chunks.len() + 2);
    messages.push(framing.begin.clone());
    messages.extend(chunks);
    messages.push(framing.end.clone());
    Ok(messages)
}
