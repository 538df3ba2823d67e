//! Fixed capacity DUCI command table.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use heapless::Vec;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::format::{ArgList, compile};
use crate::parser::Request;
use crate::{Error, ErrorStatus, Permission, Result};

/// Command callback.
///
/// Receives the context the parser was invoked with, and the parsed request.
/// The returned status is passed back unchanged to the caller of
/// [`crate::Parser::parse()`].
pub type Handler<C> = fn(&mut C, &Request<'_>) -> ErrorStatus;

/// Acknowledge callback, invoked with the matched command code
pub type AckHandler<C> = fn(&mut C, &str);

/// A registered command
pub struct Command<C> {
    code: &'static str,
    pub(crate) set_args: ArgList,
    pub(crate) get_args: ArgList,
    pub(crate) set: Option<Handler<C>>,
    pub(crate) get: Option<Handler<C>>,
    pub(crate) set_permission: Permission,
    pub(crate) get_permission: Permission,
}

impl<C> Command<C> {
    /// Two character command code, as registered
    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn set_args(&self) -> &ArgList {
        &self.set_args
    }

    pub fn get_args(&self) -> &ArgList {
        &self.get_args
    }

    pub fn set_permission(&self) -> Permission {
        self.set_permission
    }

    pub fn get_permission(&self) -> Permission {
        self.get_permission
    }

    /// Case-insensitive match against the first two bytes of `code`
    pub fn matches(&self, code: &[u8]) -> bool {
        code.len() >= 2 && self.code.as_bytes().eq_ignore_ascii_case(&code[..2])
    }
}

/// Table of up to `N` commands.
///
/// Built once during initialisation, then only read.  Lookup is a linear,
/// case-insensitive, first match scan, so registering the same code twice
/// leaves the second entry unreachable.  Avoiding duplicates is the
/// caller's responsibility.
pub struct CommandTable<C, const N: usize> {
    commands: Vec<Command<C>, N>,
}

impl<C, const N: usize> Default for CommandTable<C, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, const N: usize> CommandTable<C, N> {
    pub const fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    /// Add a command.
    ///
    /// Arguments:
    /// - `code` - two ASCII letter command code
    /// - `set_format` / `get_format` - format specifiers, see [`crate::format`]
    /// - `set` / `get` - callbacks, `None` if that direction is not supported
    /// - `set_permission` / `get_permission` - access level required to
    ///   invoke each callback
    ///
    /// Fails if the code is not two letters, either format does not compile,
    /// or the table is full.  These are integration defects and should be
    /// treated as fatal before entering the run loop.
    #[allow(clippy::too_many_arguments)]
    pub fn add(
        &mut self,
        code: &'static str,
        set_format: &str,
        get_format: &str,
        set: Option<Handler<C>>,
        get: Option<Handler<C>>,
        set_permission: Permission,
        get_permission: Permission,
    ) -> Result<()> {
        if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
            error!("Invalid command code {code:?}");
            return Err(Error::InvalidCode);
        }

        let set_args = compile(set_format).inspect_err(|_| {
            error!("Invalid set format {set_format:?} for {code}");
        })?;
        let get_args = compile(get_format).inspect_err(|_| {
            error!("Invalid get format {get_format:?} for {code}");
        })?;

        if self.find(code.as_bytes()).is_some() {
            warn!("Duplicate command {code}, later entry unreachable");
        }

        self.commands
            .push(Command {
                code,
                set_args,
                get_args,
                set,
                get,
                set_permission,
                get_permission,
            })
            .map_err(|_| {
                error!("Command table full ({N}), cannot add {code}");
                Error::TableFull
            })?;

        debug!("Added command {code} ({} of {N})", self.commands.len());
        Ok(())
    }

    /// Find the first command matching the two character `code`
    pub fn find(&self, code: &[u8]) -> Option<&Command<C>> {
        self.commands.iter().find(|cmd| cmd.matches(code))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn capacity(&self) -> usize {
        N
    }
}
