// Core modules: document access, segmentation, encoding, transports, and errors.
pub mod channel;
pub mod document;
pub mod encode;
pub mod error;
pub mod paste;
pub mod segment;
