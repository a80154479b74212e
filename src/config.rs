//! Purpose: Hold user-facing options for cell detection and delivery.
//! Exports: `Config`, `SendMode`, `TermFlavor`, `LineEnding`, `parse_flag`.
//! Role: Single source of defaults for the library session and the CLI.
//! Invariants: Every field has a default; a partial JSON file is always valid input.
//! Invariants: `delimit_by` stays a raw string so bad values fail at strategy build time.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::core::error::{Error, ErrorKind, map_io_error_kind};
use crate::core::paste::{DEFAULT_CHUNK_SIZE, PasteFraming};
use crate::core::segment::BoundaryStrategy;

pub const DEFAULT_VALID_MARKS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 7778;

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SendMode {
    /// One submission per cell, encoded with kill-line directives.
    #[default]
    Line,
    /// Begin/end framed paste, chunked by `chunk_size`.
    Paste,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TermFlavor {
    #[default]
    Vim,
    Neovim,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    Cr,
    Lf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Cr => "\r",
            LineEnding::Lf => "\n",
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub delimit_by: String,
    pub tags: Vec<String>,
    #[serde(deserialize_with = "deserialize_flag")]
    pub use_regex: bool,
    pub valid_marks: String,
    pub chunk_size: usize,
    #[serde(deserialize_with = "deserialize_flag")]
    pub socket_enabled: bool,
    pub host: String,
    pub port: u16,
    pub send_mode: SendMode,
    pub paste_begin: String,
    pub paste_end: String,
    #[serde(deserialize_with = "deserialize_flag")]
    pub send_cell_headers: bool,
    #[serde(deserialize_with = "deserialize_flag")]
    pub update_file_variable: bool,
    #[serde(deserialize_with = "deserialize_flag")]
    pub send_ctrl_u: bool,
    #[serde(deserialize_with = "deserialize_flag")]
    pub send_ctrl_c: bool,
    pub insert_tag: String,
    pub run_command: String,
    pub empty_cell_placeholder: String,
    pub terminal: TermFlavor,
    pub channel_id: u32,
    pub line_ending: LineEnding,
}

impl Default for Config {
    fn default() -> Self {
        let framing = PasteFraming::default();
        Self {
            delimit_by: "tags".to_string(),
            tags: ["# %%", "#%%", "# <codecell>", "##"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            use_regex: false,
            valid_marks: DEFAULT_VALID_MARKS.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            socket_enabled: false,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            send_mode: SendMode::Line,
            paste_begin: framing.begin,
            paste_end: framing.end,
            send_cell_headers: false,
            update_file_variable: false,
            send_ctrl_u: true,
            send_ctrl_c: false,
            insert_tag: "# %%".to_string(),
            run_command: "%run {options} \"{filepath}\"".to_string(),
            empty_cell_placeholder: "# empty cell".to_string(),
            terminal: TermFlavor::Vim,
            channel_id: 0,
            line_ending: LineEnding::Cr,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            Error::new(map_io_error_kind(&err))
                .with_message("failed to read config file")
                .with_path(path)
                .with_source(err)
        })?;
        Self::from_json_str(&text).map_err(|err| err.with_path(path))
    }

    pub fn from_json_str(text: &str) -> Result<Self, Error> {
        let config: Config = serde_json::from_str(text).map_err(|err| {
            Error::new(ErrorKind::Config)
                .with_message("invalid config JSON")
                .with_source(err)
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.chunk_size == 0 {
            return Err(Error::new(ErrorKind::Config).with_message("chunk_size must be at least 1"));
        }
        self.strategy().map(|_| ())
    }

    pub fn strategy(&self) -> Result<BoundaryStrategy, Error> {
        BoundaryStrategy::from_options(
            &self.delimit_by,
            &self.valid_marks,
            &self.tags,
            self.use_regex,
        )
    }

    pub fn paste_framing(&self) -> PasteFraming {
        PasteFraming {
            begin: self.paste_begin.clone(),
            end: self.paste_end.clone(),
        }
    }
}

/// Parses loose boolean option values: `1 y yes t true` (any case) are true.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "y" | "yes" | "t" | "true"
    )
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(flag) => flag,
        Value::Number(num) => num.as_i64().is_some_and(|n| n != 0),
        Value::String(text) => parse_flag(&text),
        _ => false,
    })
}
