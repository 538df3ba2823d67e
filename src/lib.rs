//! DUCI command protocol engine for instrument firmware.
//!
//! DUCI is a byte-oriented, line-based command/reply protocol used between a
//! master (PC, test rig, another instrument) and an instrument over serial,
//! USB-CDC or Bluetooth.  Every message is a single line:
//!
//! ```text
//! <start><CODE><payload>[:<CC>]<CR>?<LF>
//! ```
//!
//! - `<start>` is `*` or `#` for a command, `!` for a reply
//! - `<CODE>` is a two letter command code, matched case-insensitively
//! - `<payload>` is command specific, comma separated, using `=` for
//!   assignment and `?` for query
//! - `:<CC>` is an optional two digit checksum, the sum of all preceding
//!   bytes modulo 100
//!
//! `no_std`, and never allocates.  Requires `alloc` for the async session,
//! which is behind the `async` feature.
//!
//! ## Architecture
//!
//! The engine is made up of:
//! - A format compiler ([`format`]) turning a compact per-command format
//!   string such as `"[i]?"` or `"=2i,v"` into a list of typed argument
//!   descriptors.
//! - A fixed capacity command table ([`table`]) holding each command's code,
//!   compiled Set and Get argument lists, callbacks and permission levels.
//! - A line parser and dispatcher ([`parser`]) validating length, checksum
//!   and start character, looking the command up, extracting arguments
//!   ([`lexer`]) and invoking the matched callback under a permission check.
//! - A framer ([`frame`]) producing outgoing lines with optional checksum and
//!   terminator.
//! - An ownership handoff ([`handoff`]) allowing one task to temporarily
//!   take a comms channel from the task that normally services it.
//! - A session ([`session`]) tying a parser to a [`session::SerialMedium`],
//!   keeping the sticky error status register and command timeout.
//!
//! Only a single task is expected to use a parser or session at a time.  The
//! command table is built once at start-up and not modified afterwards.
//!
//! ## Getting Started
//!
//! 1. Implement [`session::SerialMedium`] for your transport.
//! 2. Create a [`session::Session`] owning that medium.
//! 3. Create a [`parser::Parser`] for the role the channel plays, and add
//!    commands to it with [`parser::Parser::add_command()`].  Callbacks
//!    receive `&mut Session<_>` (or whatever context type you choose) and a
//!    [`parser::Request`] holding the parsed parameters.
//! 4. Call [`session::Session::service()`] from the task owning the channel.
//!
//! ```rust,ignore
//! fn get_re<M: SerialMedium>(s: &mut Session<M>, _req: &Request<'_>) -> ErrorStatus {
//!     let mut line: heapless::String<16> = heapless::String::new();
//!     let _ = write!(line, "!RE={:08X}", s.take_error_register().bits());
//!     s.reply(&line)
//! }
//!
//! let mut parser = Parser::<Session<Uart>, 64>::new(Role::Slave);
//! parser.add_command("RE", "", "?", None, Some(get_re), Permission::None, Permission::None)?;
//! loop {
//!     session.service(&mut parser)?;
//! }
//! ```
//!
//! ## Features
//!
//! Default features:
//! - `async` - Enable the async session and async ownership handoff (requires
//!   `alloc`).
//!
//! Compile with `--no-default-features` for a purely synchronous build.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#![no_std]

#[cfg(feature = "async")]
extern crate alloc;

pub mod format;
pub mod frame;
pub mod handoff;
pub mod lexer;
pub mod parser;
pub mod session;
pub mod status;
pub mod table;

pub use format::{ArgKind, ArgList, Argument};
pub use frame::Framer;
#[cfg(feature = "async")]
pub use handoff::AsyncDelay;
pub use handoff::{CommsOwnership, Delay, HANDOFF_POLL_MS, Ownership};
pub use parser::{Parameter, Parser, ParserConfig, Request, Role};
#[cfg(feature = "async")]
pub use session::{AsyncSerialMedium, AsyncSession};
pub use session::{SerialMedium, Session};
pub use status::{AccessControl, ErrorStatus, MessageType, Permission};
pub use table::{AckHandler, Command, CommandTable, Handler};

/// Minimum length of a DUCI line, excluding terminators
pub const MESSAGE_MIN_SIZE: usize = 3;

/// Maximum length of a DUCI line, excluding terminators
pub const MESSAGE_MAX_SIZE: usize = 80;

/// Maximum number of arguments in a Set or Get format
pub const MAX_PARAMETERS: usize = 8;

/// Capacity of string and custom parameters
pub const STRING_LENGTH_LIMIT: usize = 64;

/// Default time in ms to wait for a reply to a query
pub const DEFAULT_TIMEOUT_MS: u32 = 500;

/// Engine errors.
///
/// These are integration and transport failures.  The outcome of parsing a
/// line is an [`ErrorStatus`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Format specifier could not be compiled
    InvalidFormat,
    /// Command code is not two ASCII letters
    InvalidCode,
    /// Command table is at capacity
    TableFull,
    /// Buffer too small for operation
    BufferTooSmall,
    /// I/O error on the serial medium
    Io,
    /// Timeout waiting for data
    Timeout,
    /// No data available
    NoData,
    /// Received line is not valid UTF-8
    InvalidUtf8,
}

/// Type to represent the result of an engine operation
pub type Result<T> = core::result::Result<T, Error>;
