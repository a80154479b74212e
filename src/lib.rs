//! Purpose: Library crate behind the `cellsend` CLI and editor integrations.
//! Exports: `core` (segmenter, encoder, transports, errors), `api`, `config`, `notice`.
//! Role: Keeps cell detection and delivery independent of any one editor.
//! Invariants: Core modules take explicit inputs; the only long-lived state is the socket.
//! Invariants: All rows crossing the API are 1-indexed.
pub mod api;
pub mod config;
pub mod core;
pub mod notice;
