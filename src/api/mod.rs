//! Purpose: Define the public Rust API boundary for cellsend.
//! Exports: Core types plus the terminal request layer and the editor session.
//! Role: Stable, additive-only surface used by the CLI and embedding editors.
//! Invariants: Hosts reach transports only through `Session` or the re-exported types.
//! Invariants: Internal helpers stay private to their modules.

mod session;
mod term;

pub use crate::config::{Config, LineEnding, SendMode, TermFlavor};
pub use crate::core::channel::{ChannelStatus, SocketChannel, is_closed};
pub use crate::core::document::{Document, DocumentEditOps, TextDocument, cell_text};
pub use crate::core::encode::encode_for_line_shell;
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::paste::{PasteFraming, paste_chunks, paste_messages};
pub use crate::core::segment::{
    BoundarySet, BoundaryStrategy, CellRange, DelimitBy, TagMatcher, compute_boundaries,
};
pub use session::{
    CellSelection, ExecuteReport, IMPLICIT_CELL_HEADER, InterpreterCommand, Jump, Session,
    Transport,
};
pub use term::{JsonlSink, RecordingSink, TermRequest, TermSink, TermWriter};
