//! foxdev Core - Shared wire types
//!
//! This crate contains the JSON payloads exchanged between the preview UI and
//! the dev-server daemon (`foxdev-server`) over HTTP.
//!
//! Process management, output sniffing and the HTTP router live in the
//! `foxdev-server` crate.

mod protocol;

pub use protocol::*;
