//! Purpose: Hold top-level CLI command dispatch for `cellsend`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Transport and navigation failures become notices; the command still succeeds.
//! Invariants: Config and usage problems are returned as errors before any request is written.

use super::*;

use cellsend::api::{
    Document, DocumentEditOps, ExecuteReport, InterpreterCommand, JsonlSink, Jump, Session,
    Transport, encode_for_line_shell,
};

type StdoutSession = Session<JsonlSink<io::Stdout>>;

pub(super) fn dispatch_command(
    command: Command,
    config_path: Option<&Path>,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "cellsend", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output();
            Ok(RunOutcome::ok())
        }
        Command::Boundaries {
            select,
            include_first_line,
        } => {
            let session = select_session(config_path, &select)?;
            let doc = open_document(&select)?;
            let boundaries = session.boundaries(&doc, include_first_line);
            emit_json(json!({
                "delimit_by": session.config().delimit_by.trim(),
                "boundaries": boundaries.as_slice(),
            }));
            Ok(RunOutcome::ok())
        }
        Command::Cell { select, row } => {
            let session = select_session(config_path, &select)?;
            let doc = open_document(&select)?;
            let cell = session.locate_cell(&doc, row)?;
            emit_json(json!({
                "start_row": cell.start_row,
                "end_row": cell.end_row,
                "body_start_row": cell.body_start_row,
                "header": cell.header,
                "text": cell.text,
            }));
            Ok(RunOutcome::ok())
        }
        Command::Next { select, row } => {
            jump_command("next", config_path, &select, row, color_mode, |session, doc| {
                session.jump_next_cell(doc)
            })
        }
        Command::Prev { select, row } => {
            jump_command("prev", config_path, &select, row, color_mode, |session, doc| {
                session.jump_prev_cell(doc)
            })
        }
        Command::Encode { file, raw } => {
            let text = read_input(file.as_deref())?;
            let payload = encode_for_line_shell(&text);
            if raw {
                use std::io::Write;
                let mut stdout = io::stdout();
                stdout
                    .write_all(payload.as_bytes())
                    .and_then(|()| stdout.flush())
                    .map_err(|err| {
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write payload")
                            .with_source(err)
                    })?;
            } else {
                emit_json(json!({ "payload": payload }));
            }
            Ok(RunOutcome::ok())
        }
        Command::Send {
            select,
            row,
            host,
            port,
        } => {
            let mut config = load_config(config_path)?;
            apply_select_args(&mut config, &select);
            config.socket_enabled = true;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            let mut session = Session::new(config, JsonlSink::new(io::stdout()))?;
            let doc = open_document(&select)?;
            let report = session.execute_cell(&doc, row, Some(&select.file))?;
            emit_warnings("send", &select.file, &report.warnings, color_mode);
            emit_json(socket_report_json(&session, &report));
            Ok(RunOutcome::ok())
        }
        Command::Execute { select, row, term } => {
            let mut config = load_config(config_path)?;
            apply_select_args(&mut config, &select);
            apply_term_args(&mut config, &term);
            let mut session = Session::new(config, JsonlSink::new(io::stdout()))?;
            let doc = open_document(&select)?;
            let file_path = std::fs::canonicalize(&select.file).unwrap_or(select.file.clone());
            let report = session.execute_cell(&doc, row, Some(&file_path))?;
            emit_warnings("execute", &select.file, &report.warnings, color_mode);
            tracing::debug!(
                transport = report.transport.as_str(),
                start_row = report.cell.start_row,
                end_row = report.cell.end_row,
                "cell delivered"
            );
            if report.transport == Transport::Socket {
                emit_json(socket_report_json(&session, &report));
            }
            Ok(RunOutcome::ok())
        }
        Command::Insert {
            select,
            row,
            above,
            below: _,
            insert_tag,
        } => {
            let mut config = load_config(config_path)?;
            apply_select_args(&mut config, &select);
            if let Some(tag) = insert_tag {
                config.insert_tag = tag;
            }
            let session = Session::new(config, JsonlSink::new(io::stdout()))?;
            let mut doc = open_document(&select)?;
            place_cursor(&mut doc, row)?;
            let inserted = if above {
                session.insert_cell_above(&mut doc)?
            } else {
                session.insert_cell_below(&mut doc)?
            };
            emit_json(json!({
                "row": inserted,
                "text": doc.to_text(),
            }));
            Ok(RunOutcome::ok())
        }
        Command::Command { action, term } => {
            let mut config = load_config(config_path)?;
            apply_term_args(&mut config, &term);
            let mut session = Session::new(config, JsonlSink::new(io::stdout()))?;
            let (name, command, file) = interpreter_command(action);
            let warnings = session.send_command(&command);
            let file = file.unwrap_or_default();
            emit_warnings(name, &file, &warnings, color_mode);
            Ok(RunOutcome::ok())
        }
    }
}

fn select_session(config_path: Option<&Path>, select: &SelectArgs) -> Result<StdoutSession, Error> {
    let mut config = load_config(config_path)?;
    apply_select_args(&mut config, select);
    Session::new(config, JsonlSink::new(io::stdout()))
}

fn jump_command<F>(
    name: &str,
    config_path: Option<&Path>,
    select: &SelectArgs,
    row: usize,
    color_mode: ColorMode,
    jump: F,
) -> Result<RunOutcome, Error>
where
    F: FnOnce(&StdoutSession, &mut TextDocument) -> Result<Jump, Error>,
{
    let session = select_session(config_path, select)?;
    let mut doc = open_document(select)?;
    place_cursor(&mut doc, row)?;
    let outcome = match jump(&session, &mut doc) {
        Ok(outcome) => outcome,
        Err(err) if err.kind() == ErrorKind::OutOfBounds => {
            emit_warnings(name, &select.file, std::slice::from_ref(&err), color_mode);
            Jump::Stay { row }
        }
        Err(err) => return Err(err),
    };
    emit_json(json!({
        "row": outcome.row(),
        "moved": matches!(outcome, Jump::Moved { .. }),
    }));
    Ok(RunOutcome::ok())
}

fn place_cursor(doc: &mut TextDocument, row: usize) -> Result<(), Error> {
    if doc.line_count() == 0 && row == 1 {
        return Ok(());
    }
    if !doc.move_cursor(row, 0) {
        return Err(Error::new(ErrorKind::OutOfBounds)
            .with_message(format!("row must be between 1 and {}", doc.line_count().max(1)))
            .with_row(row));
    }
    Ok(())
}

fn interpreter_command(action: CommandAction) -> (&'static str, InterpreterCommand, Option<PathBuf>) {
    match action {
        CommandAction::Previous => ("previous", InterpreterCommand::Previous, None),
        CommandAction::Restart => ("restart", InterpreterCommand::Restart, None),
        CommandAction::Clear => ("clear", InterpreterCommand::Clear, None),
        CommandAction::CloseAll => ("close-all", InterpreterCommand::CloseAll, None),
        CommandAction::Run { file, options } => {
            let filepath = std::fs::canonicalize(&file)
                .unwrap_or(file.clone())
                .display()
                .to_string();
            (
                "run",
                InterpreterCommand::Run { options, filepath },
                Some(file),
            )
        }
    }
}

fn socket_report_json(session: &StdoutSession, report: &ExecuteReport) -> Value {
    json!({
        "transport": report.transport.as_str(),
        "host": session.socket().host(),
        "port": session.socket().port(),
        "sent": report.warnings.is_empty() && !report.payload.is_empty(),
        "bytes": report.payload.len(),
        "start_row": report.cell.start_row,
        "end_row": report.cell.end_row,
    })
}

fn emit_warnings(cmd: &str, file: &Path, warnings: &[Error], color_mode: ColorMode) {
    let file = file.display().to_string();
    for warning in warnings {
        emit_notice(&Notice::from_error(cmd, &file, warning), color_mode);
    }
}
