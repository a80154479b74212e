//! Purpose: `cellsend` CLI entry point.
//! Role: Binary crate root; parses args, loads config, runs commands, emits JSON on stdout.
//! Invariants: Terminal requests go to stdout as JSONL; everything else on stdout is one JSON value.
//! Invariants: Non-interactive errors and notices are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`; notices never change it.
#![allow(clippy::result_large_err)]
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;

use cellsend::api::{
    Config, Error, ErrorKind, LineEnding, SendMode, TermFlavor, TextDocument, to_exit_code,
};
use cellsend::notice::{Notice, notice_json};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome { exit_code });
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint(clap_error_hint(&err)),
                    ColorMode::Auto,
                ));
            }
        },
    };

    init_tracing();

    let color_mode = cli.color;
    command_dispatch::dispatch_command(cli.command, cli.config.as_deref(), color_mode)
        .map_err(|err| (err, color_mode))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "cellsend",
    version,
    about = "Send marker-delimited cells to interactive interpreters",
    long_about = None,
    before_help = r#"A cell is the run of lines from one boundary (a tag line such as `# %%`,
or a named mark) up to the next. Rows are 1-indexed."#,
    after_help = r#"EXAMPLES
  $ cellsend boundaries notebook.py
  $ cellsend cell notebook.py --row 12
  $ cellsend execute notebook.py --row 12 --terminal neovim --channel-id 3
  $ cellsend send notebook.py --row 12 --port 7778

LEARN MORE
  $ cellsend <command> --help"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(long, global = true, help = "JSON config file (flags override its values)")]
    config: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum SendModeCli {
    Line,
    Paste,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum TerminalCli {
    Vim,
    Neovim,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LineEndingCli {
    Cr,
    Lf,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "List cell boundary rows")]
    Boundaries {
        #[command(flatten)]
        select: SelectArgs,
        #[arg(long, help = "Include row 1 even when it holds no boundary")]
        include_first_line: bool,
    },
    #[command(about = "Show the cell under a row")]
    Cell {
        #[command(flatten)]
        select: SelectArgs,
        #[arg(long, help = "1-indexed row inside the cell")]
        row: usize,
    },
    #[command(about = "Row of the next cell start")]
    Next {
        #[command(flatten)]
        select: SelectArgs,
        #[arg(long, help = "1-indexed cursor row")]
        row: usize,
    },
    #[command(about = "Row of the current cell start, or the previous cell when on a header")]
    Prev {
        #[command(flatten)]
        select: SelectArgs,
        #[arg(long, help = "1-indexed cursor row")]
        row: usize,
    },
    #[command(
        about = "Encode text for a line-editing shell",
        after_help = r#"NOTES
  - Reads stdin unless --file is given
  - Blank lines are dropped and each line break is followed by Ctrl-U"#
    )]
    Encode {
        #[arg(short = 'f', long = "file", help = "Input file (use - for stdin)")]
        file: Option<String>,
        #[arg(long, help = "Write the payload bytes instead of a JSON envelope")]
        raw: bool,
    },
    #[command(
        about = "Send the cell under a row over the socket transport",
        after_help = r#"NOTES
  - Each message is UTF-8 text terminated by one NUL byte
  - Connection failures are reported as notices; the exit code stays 0"#
    )]
    Send {
        #[command(flatten)]
        select: SelectArgs,
        #[arg(long, help = "1-indexed row inside the cell")]
        row: usize,
        #[arg(long, help = "Receiver host (default 127.0.0.1)")]
        host: Option<String>,
        #[arg(long, help = "Receiver port (default 7778)")]
        port: Option<u16>,
    },
    #[command(
        about = "Run the cell under a row in a terminal",
        long_about = r#"Run the cell under a row in a terminal.

Terminal requests are written to stdout as JSON lines for the host editor to replay.
When the config enables the socket transport the cell is sent there instead."#
    )]
    Execute {
        #[command(flatten)]
        select: SelectArgs,
        #[arg(long, help = "1-indexed row inside the cell")]
        row: usize,
        #[command(flatten)]
        term: TermArgs,
    },
    #[command(about = "Insert a cell header above or below the current cell")]
    Insert {
        #[command(flatten)]
        select: SelectArgs,
        #[arg(long, help = "1-indexed cursor row")]
        row: usize,
        #[arg(long, conflicts_with = "below", help = "Insert above the current cell")]
        above: bool,
        #[arg(long, help = "Insert below the current cell (default)")]
        below: bool,
        #[arg(long, help = "Header text to insert")]
        insert_tag: Option<String>,
    },
    #[command(about = "Send an interpreter command to the terminal")]
    Command {
        #[command(subcommand)]
        action: CommandAction,
        #[command(flatten)]
        term: TermArgs,
    },
    #[command(about = "Generate shell completions")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
    #[command(about = "Print version info")]
    Version,
}

#[derive(Subcommand, Clone, Debug)]
enum CommandAction {
    #[command(about = "Re-run the previous history entry")]
    Previous,
    #[command(about = "Exit the interpreter and start it again")]
    Restart,
    #[command(about = "Run a script with the configured run command")]
    Run {
        #[arg(long, help = "Script path substituted for {filepath}")]
        file: PathBuf,
        #[arg(
            trailing_var_arg = true,
            allow_hyphen_values = true,
            help = "Options substituted for {options}"
        )]
        options: Vec<String>,
    },
    #[command(about = "Clear the interpreter screen")]
    Clear,
    #[command(about = "Close all plot windows")]
    CloseAll,
}

#[derive(Args, Clone, Debug)]
struct SelectArgs {
    #[arg(help = "Document to segment")]
    file: PathBuf,
    #[arg(long, help = "Boundary strategy: marks|tags")]
    delimit_by: Option<String>,
    #[arg(long, help = "Repeatable cell tag (replaces the configured tags)")]
    tag: Vec<String>,
    #[arg(long, help = "Treat tags as regular expressions")]
    regex: bool,
    #[arg(long, value_name = "MARK=ROW", help = "Repeatable mark position, e.g. a=12")]
    mark: Vec<String>,
    #[arg(long, help = "Mark characters that delimit cells, in order")]
    valid_marks: Option<String>,
}

#[derive(Args, Clone, Debug, Default)]
struct TermArgs {
    #[arg(long, value_enum, help = "Terminal flavor: vim|neovim")]
    terminal: Option<TerminalCli>,
    #[arg(long, help = "Terminal buffer or job channel id")]
    channel_id: Option<u32>,
    #[arg(long, value_enum, help = "Line ending after submitted lines: cr|lf")]
    line_ending: Option<LineEndingCli>,
    #[arg(long, value_enum, help = "Delivery mode: line|paste")]
    mode: Option<SendModeCli>,
    #[arg(long, help = "Lines per paste chunk")]
    chunk_size: Option<usize>,
    #[arg(long, help = "Do not send Ctrl-U before each action")]
    no_ctrl_u: bool,
    #[arg(long, help = "Send Ctrl-C before each action")]
    ctrl_c: bool,
    #[arg(long, help = "Send the cell header line before the cell")]
    send_headers: bool,
    #[arg(long, help = "Prefix the cell with a __file__ assignment")]
    file_variable: bool,
}

fn load_config(path: Option<&Path>) -> Result<Config, Error> {
    match path {
        Some(path) => Config::load(path),
        None => Ok(Config::default()),
    }
}

fn apply_select_args(config: &mut Config, select: &SelectArgs) {
    if let Some(delimit_by) = &select.delimit_by {
        config.delimit_by = delimit_by.clone();
    }
    if !select.tag.is_empty() {
        config.tags = select.tag.clone();
    }
    if select.regex {
        config.use_regex = true;
    }
    if let Some(valid_marks) = &select.valid_marks {
        config.valid_marks = valid_marks.clone();
    }
}

fn apply_term_args(config: &mut Config, term: &TermArgs) {
    if let Some(terminal) = term.terminal {
        config.terminal = match terminal {
            TerminalCli::Vim => TermFlavor::Vim,
            TerminalCli::Neovim => TermFlavor::Neovim,
        };
    }
    if let Some(channel_id) = term.channel_id {
        config.channel_id = channel_id;
    }
    if let Some(line_ending) = term.line_ending {
        config.line_ending = match line_ending {
            LineEndingCli::Cr => LineEnding::Cr,
            LineEndingCli::Lf => LineEnding::Lf,
        };
    }
    if let Some(mode) = term.mode {
        config.send_mode = match mode {
            SendModeCli::Line => SendMode::Line,
            SendModeCli::Paste => SendMode::Paste,
        };
    }
    if let Some(chunk_size) = term.chunk_size {
        config.chunk_size = chunk_size;
    }
    if term.no_ctrl_u {
        config.send_ctrl_u = false;
    }
    if term.ctrl_c {
        config.send_ctrl_c = true;
    }
    if term.send_headers {
        config.send_cell_headers = true;
    }
    if term.file_variable {
        config.update_file_variable = true;
    }
}

fn open_document(select: &SelectArgs) -> Result<TextDocument, Error> {
    let mut doc = TextDocument::open(&select.file)?;
    for mark_arg in &select.mark {
        let (mark, row) = parse_mark(mark_arg)?;
        doc.set_mark(mark, row);
    }
    Ok(doc)
}

fn parse_mark(arg: &str) -> Result<(char, usize), Error> {
    let invalid = || {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid mark: {arg:?}"))
            .with_hint("Use MARK=ROW with a single mark character, e.g. --mark a=12.")
    };
    let (name, row) = arg.split_once('=').ok_or_else(invalid)?;
    let mut chars = name.trim().chars();
    let mark = chars.next().ok_or_else(invalid)?;
    if chars.next().is_some() {
        return Err(invalid());
    }
    let row = row.trim().parse::<usize>().map_err(|_| invalid())?;
    Ok((mark, row))
}

fn read_input(file: Option<&str>) -> Result<String, Error> {
    let mut text = String::new();
    match file {
        None | Some("-") => {
            io::stdin().read_to_string(&mut text).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to read stdin")
                    .with_source(err)
            })?;
        }
        Some(path) => {
            text = std::fs::read_to_string(path).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to read input file")
                    .with_path(path)
                    .with_source(err)
            })?;
        }
    }
    Ok(text)
}

fn emit_version_output() {
    if io::stdout().is_terminal() {
        println!("cellsend {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(json!({
            "name": "cellsend",
            "version": env!("CARGO_PKG_VERSION"),
        }));
    }
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn emit_notice(notice: &Notice, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        let label = colorize_label("warning:", color_mode.use_color(is_tty), AnsiColor::Yellow);
        match notice.details.get("cause").and_then(Value::as_str) {
            Some(cause) => eprintln!("{label} {} ({cause})", notice.message),
            None => eprintln!("{label} {}", notice.message),
        }
        return;
    }

    let json = serde_json::to_string(&notice_json(notice)).unwrap_or_else(|_| {
        "{\"notice\":{\"kind\":\"internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Config => "invalid configuration".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::OutOfBounds => "row is outside the document".to_string(),
        ErrorKind::Connect => "connection failed".to_string(),
        ErrorKind::Send => "send failed".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(row) = err.row() {
        inner.insert("row".to_string(), json!(row));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = vec![format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    )];

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }
    if let Some(row) = err.row() {
        lines.push(format!(
            "{} {row}",
            colorize_label("row:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);
    let subcommand = usage.and_then(|usage| {
        let mut tokens = usage.split_whitespace();
        tokens.find(|token| *token == "cellsend")?;
        tokens.next().filter(|token| {
            !(token.starts_with('-') || token.starts_with('<') || token.starts_with('['))
        })
    });
    match subcommand {
        Some(name) => format!("Try `cellsend {name} --help`."),
        None => "Try `cellsend --help`.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, parse_mark};
    use cellsend::api::ErrorKind;
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_mark_accepts_char_and_row() {
        assert_eq!(parse_mark("a=12").expect("mark"), ('a', 12));
        assert_eq!(parse_mark(" Z = 3 ").expect("mark"), ('Z', 3));
    }

    #[test]
    fn parse_mark_rejects_bad_args() {
        for arg in ["a", "ab=1", "=1", "a=x", "a=-1"] {
            let err = parse_mark(arg).expect_err(arg);
            assert_eq!(err.kind(), ErrorKind::Usage);
        }
    }

    #[test]
    fn run_command_collects_trailing_options() {
        let cli = Cli::try_parse_from([
            "cellsend", "command", "run", "--file", "a.py", "-i", "-t",
        ])
        .expect("parse");
        let Command::Command { action, .. } = cli.command else {
            panic!("expected command subcommand");
        };
        let super::CommandAction::Run { file, options } = action else {
            panic!("expected run");
        };
        assert_eq!(file.to_str(), Some("a.py"));
        assert_eq!(options, vec!["-i".to_string(), "-t".to_string()]);
    }
}
