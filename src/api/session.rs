//! Purpose: Compose segmentation, encoding, and transports into editor actions.
//! Exports: `Session`, `CellSelection`, `ExecuteReport`, `Transport`, `Jump`, `InterpreterCommand`.
//! Role: The object a host editor holds for its lifetime; owns the socket channel.
//! Invariants: Boundaries are recomputed from the document on every action.
//! Invariants: Transport failures become warnings in the report; they never abort an action.
//! Invariants: Failed navigation leaves the cursor where it was.

use std::path::Path;

use crate::api::term::{TermSink, TermWriter};
use crate::config::{Config, SendMode};
use crate::core::channel::SocketChannel;
use crate::core::document::{Document, DocumentEditOps, cell_text};
use crate::core::encode::{CTRL_C, CTRL_N, CTRL_O, CTRL_P, CTRL_U, encode_for_line_shell};
use crate::core::error::{Error, ErrorKind};
use crate::core::paste::paste_messages;
use crate::core::segment::{BoundarySet, BoundaryStrategy, DelimitBy, compute_boundaries};

/// Header sent for the implicit cell above the first tag.
pub const IMPLICIT_CELL_HEADER: &str = "# cell 0";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Transport {
    Socket,
    Line,
    Paste,
}

impl Transport {
    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Socket => "socket",
            Transport::Line => "line",
            Transport::Paste => "paste",
        }
    }
}

/// The cell under a row, resolved against a concrete document.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CellSelection {
    pub start_row: usize,
    pub end_row: usize,
    /// First row of the cell body; skips the tag line in tags mode.
    pub body_start_row: usize,
    /// True when the cell starts at row 1 without a header line.
    pub implicit_first: bool,
    pub header: Option<String>,
    pub text: String,
}

#[derive(Debug)]
pub struct ExecuteReport {
    pub cell: CellSelection,
    pub transport: Transport,
    /// Exactly what was handed to the transport, before line endings or NUL framing.
    pub payload: String,
    pub warnings: Vec<Error>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Jump {
    Moved { from: usize, to: usize },
    /// No cell in that direction; the cursor did not move.
    Stay { row: usize },
}

impl Jump {
    pub fn row(self) -> usize {
        match self {
            Jump::Moved { to, .. } => to,
            Jump::Stay { row } => row,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InterpreterCommand {
    Previous,
    Restart,
    Run { options: Vec<String>, filepath: String },
    Clear,
    CloseAll,
}

pub struct Session<S: TermSink> {
    config: Config,
    strategy: BoundaryStrategy,
    term: TermWriter<S>,
    socket: SocketChannel,
}

impl<S: TermSink> Session<S> {
    pub fn new(config: Config, sink: S) -> Result<Self, Error> {
        config.validate()?;
        let strategy = config.strategy()?;
        let term = TermWriter::from_config(sink, &config);
        let socket = SocketChannel::new(config.host.clone(), config.port);
        Ok(Self {
            config,
            strategy,
            term,
            socket,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn strategy(&self) -> &BoundaryStrategy {
        &self.strategy
    }

    pub fn term(&self) -> &TermWriter<S> {
        &self.term
    }

    pub fn socket(&self) -> &SocketChannel {
        &self.socket
    }

    pub fn socket_mut(&mut self) -> &mut SocketChannel {
        &mut self.socket
    }

    pub fn into_sink(self) -> S {
        self.term.into_sink()
    }

    pub fn transport(&self) -> Transport {
        if self.config.socket_enabled {
            return Transport::Socket;
        }
        match self.config.send_mode {
            SendMode::Line => Transport::Line,
            SendMode::Paste => Transport::Paste,
        }
    }

    pub fn boundaries<D: Document + ?Sized>(
        &self,
        doc: &D,
        include_first_line: bool,
    ) -> BoundarySet {
        compute_boundaries(doc, &self.strategy, include_first_line)
    }

    pub fn locate_cell<D: Document + ?Sized>(
        &self,
        doc: &D,
        row: usize,
    ) -> Result<CellSelection, Error> {
        check_row(doc, row)?;
        let mut boundaries = self.boundaries(doc, false);
        let first_line_is_header = boundaries.contains(1);
        boundaries.insert(1);

        let cell = boundaries.current_cell(row).ok_or_else(|| {
            Error::new(ErrorKind::Internal)
                .with_message("no cell boundary at or before row")
                .with_row(row)
        })?;
        let end_row = cell.end_row_or(doc.line_count());
        let implicit_first = cell.start_row == 1 && !first_line_is_header;
        let tags = self.strategy.delimit_by() == DelimitBy::Tags;

        let header = match (tags, implicit_first) {
            (false, _) => None,
            (true, true) => Some(IMPLICIT_CELL_HEADER.to_string()),
            (true, false) => doc.line(cell.start_row).map(str::to_string),
        };
        let body_start_row = if tags && !implicit_first {
            cell.start_row + 1
        } else {
            cell.start_row
        };

        Ok(CellSelection {
            start_row: cell.start_row,
            end_row,
            body_start_row,
            implicit_first,
            header,
            text: cell_text(doc, body_start_row, end_row),
        })
    }

    /// Sends the cell under `row` to the interpreter.
    pub fn execute_cell<D: Document + ?Sized>(
        &mut self,
        doc: &D,
        row: usize,
        file_path: Option<&Path>,
    ) -> Result<ExecuteReport, Error> {
        let cell = self.locate_cell(doc, row)?;
        let transport = self.transport();
        let mut report = ExecuteReport {
            payload: String::new(),
            cell,
            transport,
            warnings: Vec::new(),
        };

        if transport == Transport::Socket {
            report.payload = report.cell.text.clone();
            if let Err(err) = self.socket.send(&report.payload) {
                warn_transport(&err);
                report.warnings.push(err);
            }
            return Ok(report);
        }

        let first_body_line = doc.line(report.cell.body_start_row).unwrap_or("");
        match self.execute_on_terminal(&mut report, first_body_line, file_path) {
            Ok(()) => Ok(report),
            Err(err) if err.is_transport() => {
                warn_transport(&err);
                report.warnings.push(err);
                Ok(report)
            }
            Err(err) => Err(err),
        }
    }

    fn execute_on_terminal(
        &mut self,
        report: &mut ExecuteReport,
        first_body_line: &str,
        file_path: Option<&Path>,
    ) -> Result<(), Error> {
        self.clear_prompt()?;

        if self.config.send_cell_headers {
            if let Some(header) = &report.cell.header {
                self.term.send_raw(header)?;
                self.term.send_key(CTRL_O)?;
                self.term.send_key(CTRL_N)?;
            }
        }

        let cell_is_empty = report.cell.text.is_empty();
        let mut text = report.cell.text.clone();
        if let (true, Some(path)) = (self.config.update_file_variable, file_path) {
            text = with_file_variable(&text, first_body_line, path);
        }

        match report.transport {
            Transport::Line => {
                report.payload = if cell_is_empty {
                    self.config.empty_cell_placeholder.clone()
                } else {
                    encode_for_line_shell(&text)
                };
                self.term.submit(&report.payload)?;
            }
            Transport::Paste => {
                let messages =
                    paste_messages(&text, &self.config.paste_framing(), self.config.chunk_size)?;
                report.payload = text;
                for message in &messages {
                    self.term.submit(message)?;
                }
            }
            Transport::Socket => unreachable!("socket delivery returns before terminal delivery"),
        }
        Ok(())
    }

    pub fn jump_next_cell<D>(&self, doc: &mut D) -> Result<Jump, Error>
    where
        D: Document + DocumentEditOps + ?Sized,
    {
        let (row, _) = doc.cursor();
        let target = self.boundaries(doc, true).next_cell(row);
        move_to(doc, row, target)
    }

    /// Moves to the start of the current cell, or to the previous cell when already there.
    pub fn jump_prev_cell<D>(&self, doc: &mut D) -> Result<Jump, Error>
    where
        D: Document + DocumentEditOps + ?Sized,
    {
        let (row, _) = doc.cursor();
        let target = self.boundaries(doc, true).prev_cell(row);
        move_to(doc, row, target)
    }

    /// Inserts a cell header after the current cell and returns its row.
    pub fn insert_cell_below<D>(&self, doc: &mut D) -> Result<usize, Error>
    where
        D: Document + DocumentEditOps + ?Sized,
    {
        let tag = self.config.insert_tag.as_str();
        if doc.line_count() == 0 {
            return insert_into_empty(doc, tag);
        }
        let (row, _) = doc.cursor();
        let cell = self
            .boundaries(doc, true)
            .current_cell(row)
            .ok_or_else(|| Error::new(ErrorKind::OutOfBounds).with_row(row))?;

        let mut at = cell.end_row_or(doc.line_count());
        if at != row && !doc.move_cursor(at, 0) {
            return Err(outside_buffer(at));
        }
        if doc.line(at).is_some_and(|line| !line.is_empty()) {
            open_below(doc, at)?;
            at += 1;
        }
        if at != 1 {
            open_below(doc, at)?;
            at += 1;
        }
        if at != doc.line_count() && !doc.insert_line_before(at, "") {
            return Err(outside_buffer(at));
        }
        type_at(doc, at, tag)?;
        Ok(at)
    }

    /// Inserts a cell header above the current cell and returns its row.
    pub fn insert_cell_above<D>(&self, doc: &mut D) -> Result<usize, Error>
    where
        D: Document + DocumentEditOps + ?Sized,
    {
        let tag = self.config.insert_tag.as_str();
        if doc.line_count() == 0 {
            return insert_into_empty(doc, tag);
        }
        let (row, _) = doc.cursor();
        let mut boundaries = self.boundaries(doc, false);
        let first_line_is_header = boundaries.contains(1);
        boundaries.insert(1);
        let start = boundaries
            .current_cell(row)
            .map(|cell| cell.start_row)
            .ok_or_else(|| Error::new(ErrorKind::OutOfBounds).with_row(row))?;

        if start != row && !doc.move_cursor(start, 0) {
            return Err(outside_buffer(start));
        }
        if !(start == 1 && !first_line_is_header) && !doc.insert_line_before(start, "") {
            return Err(outside_buffer(start));
        }
        if !doc.insert_line_before(start, tag) || !doc.move_cursor(start, 0) {
            return Err(outside_buffer(start));
        }
        Ok(start)
    }

    /// Sends an interpreter command; returns transport warnings.
    pub fn send_command(&mut self, command: &InterpreterCommand) -> Vec<Error> {
        if self.config.socket_enabled {
            tracing::debug!(?command, "socket transport has no command channel; skipping");
            return Vec::new();
        }
        match self.send_command_inner(command) {
            Ok(()) => Vec::new(),
            Err(err) => {
                warn_transport(&err);
                vec![err]
            }
        }
    }

    fn send_command_inner(&mut self, command: &InterpreterCommand) -> Result<(), Error> {
        self.clear_prompt()?;
        match command {
            InterpreterCommand::Previous => self.term.submit(&CTRL_P.to_string()),
            InterpreterCommand::Restart => {
                self.term.submit("exit")?;
                self.term.submit(&CTRL_P.to_string())
            }
            InterpreterCommand::Run { options, filepath } => {
                let line = self
                    .config
                    .run_command
                    .replace("{options}", &options.join(" "))
                    .replace("{filepath}", filepath);
                self.term.submit(&line)
            }
            InterpreterCommand::Clear => self.term.submit("%clear"),
            InterpreterCommand::CloseAll => self.term.submit("plt.close('all')"),
        }
    }

    fn clear_prompt(&mut self) -> Result<(), Error> {
        if self.config.send_ctrl_u {
            self.term.send_key(CTRL_U)?;
        }
        if self.config.send_ctrl_c {
            self.term.send_key(CTRL_C)?;
        }
        Ok(())
    }
}

fn check_row<D: Document + ?Sized>(doc: &D, row: usize) -> Result<(), Error> {
    if row == 0 || row > doc.line_count().max(1) {
        return Err(Error::new(ErrorKind::OutOfBounds)
            .with_message(format!("row must be between 1 and {}", doc.line_count().max(1)))
            .with_row(row));
    }
    Ok(())
}

fn move_to<D>(doc: &mut D, from: usize, to: usize) -> Result<Jump, Error>
where
    D: Document + DocumentEditOps + ?Sized,
{
    if to == from {
        return Ok(Jump::Stay { row: from });
    }
    if to > doc.line_count() || !doc.move_cursor(to, 0) {
        return Err(outside_buffer(to));
    }
    Ok(Jump::Moved { from, to })
}

fn outside_buffer(row: usize) -> Error {
    Error::new(ErrorKind::OutOfBounds)
        .with_message("cell header is outside the buffer boundaries")
        .with_row(row)
}

fn open_below<D: DocumentEditOps + ?Sized>(doc: &mut D, row: usize) -> Result<(), Error> {
    if doc.insert_line_after(row, "") {
        Ok(())
    } else {
        Err(outside_buffer(row + 1))
    }
}

fn type_at<D>(doc: &mut D, row: usize, text: &str) -> Result<(), Error>
where
    D: Document + DocumentEditOps + ?Sized,
{
    let line = format!("{text}{}", doc.line(row).unwrap_or(""));
    if !doc.replace_line(row, &line) || !doc.move_cursor(row, 0) {
        return Err(outside_buffer(row));
    }
    Ok(())
}

fn insert_into_empty<D>(doc: &mut D, tag: &str) -> Result<usize, Error>
where
    D: Document + DocumentEditOps + ?Sized,
{
    if !doc.insert_line_before(1, tag) {
        return Err(outside_buffer(1));
    }
    Ok(1)
}

fn with_file_variable(text: &str, first_line: &str, path: &Path) -> String {
    let indent_len = first_line
        .find(|ch: char| ch != ' ' && ch != '\t')
        .unwrap_or(first_line.len());
    let indent = &first_line[..indent_len];
    let quoted = path
        .display()
        .to_string()
        .replace('\\', "\\\\")
        .replace('\'', "\\'");
    format!("{indent}__file__ = '{quoted}'\n{text}")
}

fn warn_transport(err: &Error) {
    let cause = std::error::Error::source(err)
        .map(|source| source.to_string())
        .unwrap_or_default();
    tracing::warn!(kind = ?err.kind(), %cause, "{}", err.message().unwrap_or("transport failure"));
}

#[cfg(test)]
mod tests {
    use super::{InterpreterCommand, Jump, Session, Transport};
    use crate::api::term::{RecordingSink, TermRequest};
    use crate::config::{Config, SendMode};
    use crate::core::document::{DocumentEditOps, TextDocument};
    use crate::core::error::ErrorKind;
    use crate::core::segment::DelimitBy;
    use std::path::Path;

    const NOTEBOOK: &str = "import os\n# %% load\nx = 1\n\n# %% show\nif x:\n    print(x)\n";

    fn session(config: Config) -> Session<RecordingSink> {
        Session::new(config, RecordingSink::default()).expect("session")
    }

    fn quiet_config() -> Config {
        Config {
            send_ctrl_u: false,
            ..Config::default()
        }
    }

    fn texts(session: &Session<RecordingSink>) -> Vec<String> {
        session
            .term()
            .sink()
            .requests
            .iter()
            .map(|request| String::from_utf8_lossy(request.payload()).into_owned())
            .collect()
    }

    #[test]
    fn locate_cell_skips_tag_line() {
        let doc = TextDocument::from_text(NOTEBOOK);
        let session = session(quiet_config());
        let cell = session.locate_cell(&doc, 3).expect("cell");
        assert_eq!((cell.start_row, cell.end_row, cell.body_start_row), (2, 4, 3));
        assert_eq!(cell.header.as_deref(), Some("# %% load"));
        assert_eq!(cell.text, "x = 1\n");
    }

    #[test]
    fn locate_cell_implicit_first_cell_keeps_line_one() {
        let doc = TextDocument::from_text(NOTEBOOK);
        let session = session(quiet_config());
        let cell = session.locate_cell(&doc, 1).expect("cell");
        assert!(cell.implicit_first);
        assert_eq!(cell.header.as_deref(), Some("# cell 0"));
        assert_eq!(cell.text, "import os");
    }

    #[test]
    fn locate_cell_last_cell_runs_to_end() {
        let doc = TextDocument::from_text(NOTEBOOK);
        let session = session(quiet_config());
        let cell = session.locate_cell(&doc, 7).expect("cell");
        assert_eq!((cell.start_row, cell.end_row), (5, 7));
        assert_eq!(cell.text, "if x:\n    print(x)");
    }

    #[test]
    fn locate_cell_rejects_row_zero_and_past_end() {
        let doc = TextDocument::from_text(NOTEBOOK);
        let session = session(quiet_config());
        assert_eq!(session.locate_cell(&doc, 0).expect_err("err").kind(), ErrorKind::OutOfBounds);
        assert_eq!(session.locate_cell(&doc, 8).expect_err("err").kind(), ErrorKind::OutOfBounds);
    }

    #[test]
    fn marks_mode_keeps_marked_line_in_body() {
        let doc = TextDocument::from_text("a\nb\nc\nd").with_mark('q', 3);
        let config = Config {
            delimit_by: "marks".to_string(),
            ..quiet_config()
        };
        let session = session(config);
        let cell = session.locate_cell(&doc, 4).expect("cell");
        assert_eq!(cell.header, None);
        assert_eq!(cell.text, "c\nd");
    }

    #[test]
    fn execute_line_mode_encodes_and_submits() {
        let doc = TextDocument::from_text(NOTEBOOK);
        let mut session = session(Config::default());
        let report = session.execute_cell(&doc, 6, None).expect("execute");
        assert_eq!(report.transport, Transport::Line);
        assert!(report.warnings.is_empty());
        assert_eq!(texts(&session), vec!["\u{15}", "if x:\n\u{15}    print(x)\r\r"]);
    }

    #[test]
    fn execute_empty_cell_sends_placeholder() {
        let doc = TextDocument::from_text("# %%\n# %%\nx");
        let mut session = session(quiet_config());
        let report = session.execute_cell(&doc, 1, None).expect("execute");
        assert_eq!(report.payload, "# empty cell");
        assert_eq!(texts(&session), vec!["# empty cell\r"]);
    }

    #[test]
    fn execute_sends_headers_when_enabled() {
        let doc = TextDocument::from_text(NOTEBOOK);
        let config = Config {
            send_cell_headers: true,
            send_ctrl_c: true,
            ..Config::default()
        };
        let mut session = session(config);
        session.execute_cell(&doc, 3, None).expect("execute");
        assert_eq!(
            texts(&session),
            vec!["\u{15}", "\u{3}", "# %% load", "\u{f}", "\u{e}", "x = 1\r"]
        );
    }

    #[test]
    fn execute_paste_mode_frames_chunks() {
        let body: Vec<String> = (0..30).map(|i| format!("v{i} = {i}")).collect();
        let doc = TextDocument::from_text(&format!("# %%\n{}", body.join("\n")));
        let config = Config {
            send_mode: SendMode::Paste,
            ..quiet_config()
        };
        let mut session = session(config);
        let report = session.execute_cell(&doc, 2, None).expect("execute");
        assert_eq!(report.transport, Transport::Paste);
        let sent = texts(&session);
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0], "%cpaste -q\r");
        assert_eq!(sent[1].lines().count(), 25);
        assert_eq!(sent[2], format!("{}\r", body[25..].join("\n")));
        assert_eq!(sent[3], "--\r");
    }

    #[test]
    fn file_variable_uses_cell_indentation() {
        let doc = TextDocument::from_text("# %%\n    y = 2");
        let config = Config {
            update_file_variable: true,
            ..quiet_config()
        };
        let mut session = session(config);
        session
            .execute_cell(&doc, 2, Some(Path::new("/tmp/it's.py")))
            .expect("execute");
        assert_eq!(
            texts(&session),
            vec!["    __file__ = '/tmp/it\\'s.py'\n\u{15}    y = 2\r\r"]
        );
    }

    #[test]
    fn socket_failure_is_a_warning() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);
        let doc = TextDocument::from_text(NOTEBOOK);
        let config = Config {
            socket_enabled: true,
            port,
            ..Config::default()
        };
        let mut session = session(config);
        let report = session.execute_cell(&doc, 3, None).expect("non-fatal");
        assert_eq!(report.transport, Transport::Socket);
        assert_eq!(report.payload, "x = 1\n");
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind(), ErrorKind::Connect);
        assert!(session.term().sink().requests.is_empty());
    }

    #[test]
    fn jump_next_and_prev() {
        let mut doc = TextDocument::from_text(NOTEBOOK);
        let session = session(quiet_config());
        doc.move_cursor(3, 0);
        assert_eq!(session.jump_next_cell(&mut doc).expect("next"), Jump::Moved { from: 3, to: 5 });
        assert_eq!(session.jump_next_cell(&mut doc).expect("next"), Jump::Stay { row: 5 });
        doc.move_cursor(6, 0);
        assert_eq!(session.jump_prev_cell(&mut doc).expect("prev").row(), 5);
        assert_eq!(session.jump_prev_cell(&mut doc).expect("prev").row(), 2);
        assert_eq!(session.jump_prev_cell(&mut doc).expect("prev").row(), 1);
        assert_eq!(session.jump_prev_cell(&mut doc).expect("prev"), Jump::Stay { row: 1 });
    }

    #[test]
    fn jump_to_stale_mark_is_out_of_bounds() {
        let mut doc = TextDocument::from_text("a\nb\nc").with_mark('a', 9);
        let config = Config {
            delimit_by: "marks".to_string(),
            ..quiet_config()
        };
        let session = session(config);
        let err = session.jump_next_cell(&mut doc).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::OutOfBounds);
        assert_eq!(err.row(), Some(9));
        assert_eq!(doc.cursor(), (1, 0));
    }

    #[test]
    fn default_document_jumps_stay_and_inserts_at_top() {
        let session = session(quiet_config());
        let mut doc = TextDocument::default();
        assert_eq!(session.jump_next_cell(&mut doc).expect("next"), Jump::Stay { row: 1 });
        assert_eq!(session.jump_prev_cell(&mut doc).expect("prev"), Jump::Stay { row: 1 });

        assert_eq!(session.insert_cell_below(&mut doc).expect("below"), 1);
        assert_eq!(doc.lines(), ["# %%"]);

        let mut doc = TextDocument::default();
        assert_eq!(session.insert_cell_above(&mut doc).expect("above"), 1);
        assert_eq!(doc.lines(), ["# %%"]);
        assert_eq!(doc.cursor(), (1, 0));
    }

    #[test]
    fn strategy_follows_config() {
        let config = Config {
            delimit_by: " marks ".to_string(),
            valid_marks: "xy".to_string(),
            ..quiet_config()
        };
        let session = session(config);
        assert_eq!(session.strategy().delimit_by(), DelimitBy::Marks);
        let doc = TextDocument::from_text("a\nb\nc").with_mark('y', 3).with_mark('a', 2);
        assert_eq!(session.boundaries(&doc, false).as_slice(), [3]);
    }

    #[test]
    fn insert_cell_below_spaces_headers() {
        let mut doc = TextDocument::from_text("a\nb\n# %%\nc");
        let session = session(quiet_config());
        let row = session.insert_cell_below(&mut doc).expect("insert");
        assert_eq!(row, 4);
        assert_eq!(doc.lines(), ["a", "b", "", "# %%", "", "# %%", "c"]);
        assert_eq!(doc.cursor(), (4, 0));
    }

    #[test]
    fn insert_cell_below_at_end_of_document() {
        let mut doc = TextDocument::from_text("a\nb");
        let session = session(quiet_config());
        let row = session.insert_cell_below(&mut doc).expect("insert");
        assert_eq!(row, 4);
        assert_eq!(doc.lines(), ["a", "b", "", "# %%"]);
    }

    #[test]
    fn insert_cell_above_implicit_first_cell() {
        let mut doc = TextDocument::from_text("a\n# %%\nb");
        let session = session(quiet_config());
        let row = session.insert_cell_above(&mut doc).expect("insert");
        assert_eq!(row, 1);
        assert_eq!(doc.lines(), ["# %%", "a", "# %%", "b"]);
    }

    #[test]
    fn insert_cell_above_existing_header() {
        let mut doc = TextDocument::from_text("a\n# %%\nb");
        doc.move_cursor(3, 0);
        let session = session(quiet_config());
        let row = session.insert_cell_above(&mut doc).expect("insert");
        assert_eq!(row, 2);
        assert_eq!(doc.lines(), ["a", "# %%", "", "# %%", "b"]);
        assert_eq!(doc.cursor(), (2, 0));
    }

    #[test]
    fn commands_clear_prompt_first() {
        let mut session = session(Config::default());
        assert!(session.send_command(&InterpreterCommand::Restart).is_empty());
        assert!(
            session
                .send_command(&InterpreterCommand::Run {
                    options: vec!["-i".to_string(), "-t".to_string()],
                    filepath: "/w/a.py".to_string(),
                })
                .is_empty()
        );
        assert_eq!(
            texts(&session),
            vec!["\u{15}", "exit\r", "\u{10}\r", "\u{15}", "%run -i -t \"/w/a.py\"\r"]
        );
    }

    #[test]
    fn commands_are_skipped_on_socket_transport() {
        let config = Config {
            socket_enabled: true,
            ..Config::default()
        };
        let mut session = session(config);
        assert!(session.send_command(&InterpreterCommand::Clear).is_empty());
        assert!(session.term().sink().requests.is_empty());
    }

    #[test]
    fn neovim_requests_are_chansend() {
        let config = Config {
            terminal: crate::config::TermFlavor::Neovim,
            channel_id: 5,
            ..quiet_config()
        };
        let mut session = session(config);
        session.send_command(&InterpreterCommand::CloseAll);
        assert_eq!(
            session.into_sink().requests,
            vec![TermRequest::Chansend {
                channel_id: 5,
                bytes: b"plt.close('all')\r".to_vec()
            }]
        );
    }
}
