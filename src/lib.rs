//! A small interactive shell with background jobs and Ctrl-C forwarding.
//!
//! The crate turns a line of text into a [`command::ParsedCommand`], launches it as a
//! child process and keeps track of what happened to it. Foreground commands are
//! supervised by the process-wide [`foreground::ForegroundState`], which is also the
//! only state touched from the SIGINT handler. Background commands live in a
//! [`jobs::JobTable`] that is polled once per prompt.
//!
//! The main entry point is [`Shell`], which owns the read-eval loop.

mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
pub mod external;
pub mod foreground;
pub mod jobs;
mod interpreter;
pub mod parser;
mod redirect;

/// Re-export of the interactive read-eval loop.
///
/// See [`Shell`] for the high-level API.
pub use interpreter::{Flow, Shell};
