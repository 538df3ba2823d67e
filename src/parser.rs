//! DUCI line parser and dispatcher.
//!
//! A [`Parser`] owns a [`CommandTable`] and the per-channel configuration.
//! [`Parser::parse()`] takes one received line and runs it through, in
//! order, stopping at the first failure:
//!
//! 1. Truncate at the first CR or LF.
//! 2. Check the length is within [`MESSAGE_MIN_SIZE`] and
//!    [`MESSAGE_MAX_SIZE`].
//! 3. Validate and/or strip a trailing `:CC` checksum.
//! 4. Classify the start character for this parser's [`Role`].
//! 5. Look up the two character command code.
//! 6. Extract the arguments for the Set direction, falling back to the Get
//!    direction, and invoke the matching callback if permitted.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use heapless::{String, Vec};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::format::{ArgKind, Argument};
use crate::frame::{Framer, checksum};
use crate::lexer::{self, Cursor, Date, Time};
use crate::status::AccessControl;
use crate::table::{AckHandler, Command, CommandTable, Handler};
use crate::{
    ErrorStatus, MAX_PARAMETERS, MESSAGE_MAX_SIZE, MESSAGE_MIN_SIZE, MessageType, Permission,
    Result, STRING_LENGTH_LIMIT,
};

/// A single parsed argument
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Integer(i32),
    /// 32 or 64-bit hex value
    Hex(u64),
    Value(f32),
    Flag(bool),
    /// Single character, including the `?` and `=` markers
    Character(char),
    /// String or custom payload
    Text(String<STRING_LENGTH_LIMIT>),
    Date(Date),
    Time(Time),
    /// An optional assignment that was not supplied, meaning the values
    /// following it were left out
    Omitted,
}

impl Parameter {
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Parameter::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_hex(&self) -> Option<u64> {
        match self {
            Parameter::Hex(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<f32> {
        match self {
            Parameter::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Parameter::Flag(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Parameter::Character(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Parameter::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<Date> {
        match self {
            Parameter::Date(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<Time> {
        match self {
            Parameter::Time(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_omitted(&self) -> bool {
        matches!(self, Parameter::Omitted)
    }
}

/// Parameters extracted for one matched direction
pub type Parameters = Vec<Parameter, MAX_PARAMETERS>;

/// What a callback is invoked with
#[derive(Debug)]
pub struct Request<'a> {
    /// Command code, as registered
    pub code: &'static str,
    /// Type of the message, from its start character
    pub message_type: MessageType,
    /// Set when a slave receives a `*` command, which asks for the command
    /// to be echoed
    pub echo: bool,
    /// Parameters, positionally matching the direction's format
    pub params: &'a [Parameter],
}

impl Request<'_> {
    /// Parameter at `index`
    pub fn param(&self, index: usize) -> Option<&Parameter> {
        self.params.get(index)
    }
}

/// Which start characters a parser accepts, and its default configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Accepts `*` and `#` commands and `!` replies
    Any,
    /// Instrument receiving commands from a master, `*` and `#` only.  `*`
    /// requests an echo.
    Slave,
    /// Master receiving replies, `!` only.  Checksummed, LF terminated.
    Master,
    /// Both directions on one channel, LF terminated
    Peer,
}

impl Role {
    /// Classify a start character for this role, returning `None` if it is
    /// not accepted
    pub fn classify(self, ch: u8) -> Option<MessageType> {
        match (self, ch) {
            (Role::Any | Role::Slave | Role::Peer, b'*' | b'#') => Some(MessageType::Command),
            (Role::Any | Role::Master | Role::Peer, b'!') => Some(MessageType::Reply),
            _ => None,
        }
    }

    /// Default configuration for this role
    pub const fn config(self) -> ParserConfig {
        let config = ParserConfig::new();
        match self {
            Role::Any | Role::Slave => config,
            Role::Master | Role::Peer => config.with_terminator_crlf(false),
        }
    }
}

/// Per-parser configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// Require and validate a trailing `:CC` checksum
    pub checksum_enabled: bool,
    /// Strip a trailing `:CC` before parsing even if not validating it
    pub strip_trailing_checksum: bool,
    /// Outgoing lines end CR LF rather than LF
    pub terminator_crlf: bool,
    /// Invoke the acknowledge callback after a successful dispatch
    pub acknowledge: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserConfig {
    pub const fn new() -> Self {
        Self {
            checksum_enabled: true,
            strip_trailing_checksum: true,
            terminator_crlf: true,
            acknowledge: false,
        }
    }

    pub const fn with_checksum(mut self, enabled: bool) -> Self {
        self.checksum_enabled = enabled;
        self
    }

    pub const fn with_strip_trailing_checksum(mut self, strip: bool) -> Self {
        self.strip_trailing_checksum = strip;
        self
    }

    pub const fn with_terminator_crlf(mut self, crlf: bool) -> Self {
        self.terminator_crlf = crlf;
        self
    }

    pub const fn with_acknowledge(mut self, acknowledge: bool) -> Self {
        self.acknowledge = acknowledge;
        self
    }

    /// Framer producing lines matching this configuration
    pub const fn framer(&self) -> Framer {
        Framer::new(self.checksum_enabled, self.terminator_crlf)
    }
}

/// DUCI parser and dispatcher for one channel.
///
/// `C` is the context handed to callbacks, typically the
/// [`crate::session::Session`] servicing the channel.  `N` is the command
/// table capacity.
///
/// Not designed for concurrent use; one task parses one line at a time.
pub struct Parser<C, const N: usize> {
    table: CommandTable<C, N>,
    config: ParserConfig,
    role: Role,
    message_type: MessageType,
    echo: bool,
    ack: Option<AckHandler<C>>,
}

impl<C, const N: usize> Parser<C, N> {
    /// Create a parser with the default configuration for `role`
    pub const fn new(role: Role) -> Self {
        Self::with_config(role, role.config())
    }

    pub const fn with_config(role: Role, config: ParserConfig) -> Self {
        Self {
            table: CommandTable::new(),
            config,
            role,
            message_type: MessageType::Unexpected,
            echo: false,
            ack: None,
        }
    }

    /// Add a command.  See [`CommandTable::add()`].
    #[allow(clippy::too_many_arguments)]
    pub fn add_command(
        &mut self,
        code: &'static str,
        set_format: &str,
        get_format: &str,
        set: Option<Handler<C>>,
        get: Option<Handler<C>>,
        set_permission: Permission,
        get_permission: Permission,
    ) -> Result<()> {
        self.table.add(
            code,
            set_format,
            get_format,
            set,
            get,
            set_permission,
            get_permission,
        )
    }

    pub fn table(&self) -> &CommandTable<C, N> {
        &self.table
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ParserConfig) {
        self.config = config;
    }

    pub fn set_checksum_enabled(&mut self, enabled: bool) {
        self.config.checksum_enabled = enabled;
    }

    pub fn checksum_enabled(&self) -> bool {
        self.config.checksum_enabled
    }

    pub fn set_strip_trailing_checksum(&mut self, strip: bool) {
        self.config.strip_trailing_checksum = strip;
    }

    pub fn set_terminator_crlf(&mut self, crlf: bool) {
        self.config.terminator_crlf = crlf;
    }

    pub fn terminator_crlf(&self) -> bool {
        self.config.terminator_crlf
    }

    /// Set the acknowledge callback, invoked with the command code when
    /// acknowledge mode is on and a line's final status is empty.  A command
    /// whose callback returns an error, such as
    /// [`ErrorStatus::COMMAND_FAILED`], is not acknowledged.
    pub fn set_ack_handler(&mut self, ack: Option<AckHandler<C>>) {
        self.ack = ack;
    }

    pub fn set_acknowledge_mode(&mut self, acknowledge: bool) {
        self.config.acknowledge = acknowledge;
    }

    pub fn acknowledge_mode(&self) -> bool {
        self.config.acknowledge
    }

    /// Type of the most recently classified line
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Whether the most recent command asked to be echoed
    pub fn echo(&self) -> bool {
        self.echo
    }

    /// Frame `payload` for transmission using this parser's checksum and
    /// terminator settings
    pub fn prepare_tx_message(&self, payload: &str, buf: &mut [u8]) -> Result<usize> {
        self.config.framer().frame(payload, buf)
    }
}

impl<C: AccessControl, const N: usize> Parser<C, N> {
    /// Parse and dispatch one received line.
    ///
    /// Returns the resulting error status, which is empty on success.  When
    /// a callback runs, its returned status is passed back unchanged.
    pub fn parse(&mut self, ctx: &mut C, line: &str) -> ErrorStatus {
        // Anything from the first terminator on is ignored
        let end = line.find(['\r', '\n']).unwrap_or(line.len());
        let mut line = &line[..end];
        trace!("Parsing {line:?}");

        if line.len() < MESSAGE_MIN_SIZE {
            return ErrorStatus::MESSAGE_TOO_SMALL;
        }
        if line.len() > MESSAGE_MAX_SIZE {
            return ErrorStatus::MESSAGE_TOO_BIG;
        }

        let bytes = line.as_bytes();
        let len = bytes.len();
        let has_checksum = bytes[len - 3] == b':'
            && bytes[len - 2].is_ascii_digit()
            && bytes[len - 1].is_ascii_digit();

        if has_checksum {
            if self.config.checksum_enabled {
                let expected = (bytes[len - 2] - b'0') * 10 + (bytes[len - 1] - b'0');
                let actual = checksum(&bytes[..len - 2]);
                if actual != expected {
                    warn!("Checksum mismatch, expected {expected:02} got {actual:02}");
                    return ErrorStatus::INVALID_CHECKSUM;
                }
            }
            if self.config.checksum_enabled || self.config.strip_trailing_checksum {
                line = &line[..len - 3];
            }
        } else if self.config.checksum_enabled {
            return ErrorStatus::MISSING_ARGS;
        }

        let bytes = line.as_bytes();
        let start = bytes.first().copied().unwrap_or(0);
        self.echo = false;
        match self.role.classify(start) {
            Some(message_type) => {
                self.message_type = message_type;
                self.echo = self.role == Role::Slave && start == b'*';
            }
            None => {
                self.message_type = MessageType::Unexpected;
                return ErrorStatus::NEEDS_START;
            }
        }

        let Some(command) = self.table.find(&bytes[1..]) else {
            debug!("Unknown command in {line:?}");
            return ErrorStatus::UNKNOWN_COMMAND;
        };

        // Code is ASCII, so this is a char boundary
        let payload = &line[3..];
        self.process_command(ctx, command, payload)
    }

    // Try the Set direction, then fall back to Get if Set is not handled
    // or the arguments don't fit it.
    fn process_command(&self, ctx: &mut C, command: &Command<C>, payload: &str) -> ErrorStatus {
        let mut status = match command.set {
            Some(set) => self.dispatch(
                ctx,
                command,
                &command.set_args,
                set,
                command.set_permission,
                payload,
            ),
            None => ErrorStatus::UNHANDLED_MESSAGE,
        };

        if status.intersects(ErrorStatus::UNHANDLED_MESSAGE | ErrorStatus::INVALID_ARGS) {
            if let Some(get) = command.get {
                status = self.dispatch(
                    ctx,
                    command,
                    &command.get_args,
                    get,
                    command.get_permission,
                    payload,
                );
            }
        }

        if status.is_empty() && self.config.acknowledge {
            if let Some(ack) = self.ack {
                ack(ctx, command.code());
            }
        }

        if !status.is_empty() {
            debug!("Command {} failed: {status:?}", command.code());
        }
        status
    }

    fn dispatch(
        &self,
        ctx: &mut C,
        command: &Command<C>,
        args: &[Argument],
        handler: Handler<C>,
        permission: Permission,
        payload: &str,
    ) -> ErrorStatus {
        let params = match extract(args, payload) {
            Ok(params) => params,
            Err(status) => return status,
        };

        if !permission.permits(ctx.access_level()) {
            debug!(
                "Command {} requires {permission:?}, current {:?}",
                command.code(),
                ctx.access_level()
            );
            return ErrorStatus::INVALID_MODE;
        }

        trace!("Dispatching {} with {} parameters", command.code(), params.len());
        let request = Request {
            code: command.code(),
            message_type: self.message_type,
            echo: self.echo,
            params: &params,
        };
        handler(ctx, &request)
    }
}

/// Extract parameters from `payload` according to `args`.
///
/// Optional arguments left out at the end of the payload are given default
/// values.  Fails with [`ErrorStatus::INVALID_ARGS`] if the payload does not
/// match, including when any of it is left over.
pub fn extract(args: &[Argument], payload: &str) -> core::result::Result<Parameters, ErrorStatus> {
    let expected = args.len();
    let mut params = Parameters::new();
    let mut cursor = Cursor::new(payload);
    let mut status = ErrorStatus::empty();

    for (index, arg) in args.iter().enumerate() {
        if cursor.is_empty() || !status.is_empty() {
            break;
        }

        let param = match field(&mut cursor, arg) {
            Ok(param) => param,
            // An optional integer that isn't there takes its default, and
            // whatever was scanned is dropped
            Err(_) if arg.kind == ArgKind::Integer && arg.optional => Parameter::Integer(0),
            Err(_) => {
                status |= ErrorStatus::INVALID_ARGS;
                break;
            }
        };
        // Capacity matches the maximum argument count
        let _ = params.push(param);

        if index + 1 < expected {
            cursor.eat(b',');
        }
    }

    // Payload ran out early, fill in trailing optional arguments
    if status.is_empty() && cursor.is_empty() {
        for arg in args.iter().skip(params.len()) {
            if !arg.optional {
                continue;
            }
            let default = match arg.kind {
                ArgKind::Integer => Parameter::Integer(0),
                ArgKind::Value => Parameter::Value(0.0),
                ArgKind::Custom => Parameter::Text(String::new()),
                ArgKind::Assign => Parameter::Omitted,
                _ => {
                    status |= ErrorStatus::INVALID_ARGS;
                    break;
                }
            };
            let _ = params.push(default);
        }
    }

    if !cursor.is_empty() || params.len() != expected {
        trace!(
            "Argument mismatch, {} of {expected} parameters, {:?} left",
            params.len(),
            cursor.rest()
        );
        status |= ErrorStatus::INVALID_ARGS;
    }

    if status.is_empty() {
        Ok(params)
    } else {
        Err(status)
    }
}

fn field(cursor: &mut Cursor<'_>, arg: &Argument) -> lexer::LexResult<Parameter> {
    let width = usize::from(arg.width);
    let param = match arg.kind {
        ArgKind::Integer => Parameter::Integer(lexer::integer(cursor, width)?),
        ArgKind::Value => Parameter::Value(lexer::value(cursor)?),
        ArgKind::Hex32 => Parameter::Hex(u64::from(lexer::hex32(cursor, width)?)),
        ArgKind::Hex64 => Parameter::Hex(lexer::hex64(cursor, width)?),
        ArgKind::Text => Parameter::Text(lexer::text(cursor)?),
        ArgKind::Custom => Parameter::Text(lexer::custom(cursor)),
        ArgKind::Date => Parameter::Date(lexer::date(cursor)?),
        ArgKind::Time => Parameter::Time(lexer::time(cursor)?),
        ArgKind::Boolean => match cursor.peek() {
            Some(b'0') => {
                cursor.advance(1);
                Parameter::Flag(false)
            }
            Some(b'1') => {
                cursor.advance(1);
                Parameter::Flag(true)
            }
            _ => return Err(lexer::LexError),
        },
        ArgKind::Character => Parameter::Character(cursor.next_char().ok_or(lexer::LexError)?),
        ArgKind::Query => marker(cursor, b'?')?,
        ArgKind::Assign => marker(cursor, b'=')?,
    };
    Ok(param)
}

fn marker(cursor: &mut Cursor<'_>, ch: u8) -> lexer::LexResult<Parameter> {
    if cursor.eat(ch) {
        Ok(Parameter::Character(ch as char))
    } else {
        Err(lexer::LexError)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::format::compile;
    use std::vec::Vec as StdVec;

    #[derive(Default)]
    struct Ctx {
        level: Permission,
        calls: StdVec<(&'static str, MessageType, StdVec<Parameter>)>,
        acks: StdVec<std::string::String>,
        result: ErrorStatus,
    }

    impl AccessControl for Ctx {
        fn access_level(&self) -> Permission {
            self.level
        }
    }

    fn record(ctx: &mut Ctx, req: &Request<'_>) -> ErrorStatus {
        ctx.calls.push((req.code, req.message_type, req.params.to_vec()));
        ctx.result
    }

    fn unhandled(_: &mut Ctx, _: &Request<'_>) -> ErrorStatus {
        ErrorStatus::UNHANDLED_MESSAGE
    }

    fn ack(ctx: &mut Ctx, code: &str) {
        ctx.acks.push(code.into());
    }

    fn parser(checksum: bool) -> Parser<Ctx, 8> {
        let mut p = Parser::new(Role::Any);
        p.set_checksum_enabled(checksum);
        let none = Permission::None;
        p.add_command("KM", "=c", "?", Some(record), Some(record), none, none)
            .unwrap();
        p.add_command("RE", "", "?", None, Some(record), none, none)
            .unwrap();
        p.add_command("BT", "i=i,[i],[i],[i],[i]", "i?", Some(record), Some(record), none, none)
            .unwrap();
        p.add_command("PP", "[i][i]?", "", Some(record), None, none, none)
            .unwrap();
        p.add_command("WW", "=2i", "", Some(record), None, none, none)
            .unwrap();
        p.add_command(
            "CD",
            "=d",
            "?",
            Some(record),
            Some(record),
            Permission::Calibration,
            none,
        )
        .unwrap();
        p.add_command("SN", "=i", "?", Some(unhandled), Some(record), none, none)
            .unwrap();
        p.add_command("CU", "=$", "", Some(record), Some(record), none, none)
            .unwrap();
        p
    }

    fn with_checksum(line: &str) -> std::string::String {
        let cs = (line.bytes().map(u32::from).sum::<u32>() + u32::from(b':')) % 100;
        std::format!("{line}:{cs:02}")
    }

    #[test]
    fn query_with_no_set_handler_uses_get() {
        let mut p = parser(false);
        let mut ctx = Ctx::default();
        assert_eq!(p.parse(&mut ctx, "*RE?\r\n"), ErrorStatus::empty());
        assert_eq!(ctx.calls.len(), 1);
        assert_eq!(ctx.calls[0].0, "RE");
        assert_eq!(ctx.calls[0].2, [Parameter::Character('?')]);
        assert_eq!(p.message_type(), MessageType::Command);
    }

    #[test]
    fn codes_match_any_case() {
        for line in ["*bt?", "*Bt?", "*BT?", "*bT?"] {
            let mut p = parser(false);
            let mut ctx = Ctx::default();
            // "i?" needs an integer first
            assert_eq!(p.parse(&mut ctx, line), ErrorStatus::INVALID_ARGS);
            assert!(ctx.calls.is_empty());
            assert_eq!(p.parse(&mut ctx, &std::format!("{}3?", &line[..3])), ErrorStatus::empty());
            assert_eq!(ctx.calls[0].0, "BT");
        }
    }

    #[test]
    fn checksummed_set_with_trailing_defaults() {
        let mut p = parser(true);
        let mut ctx = Ctx::default();
        let line = with_checksum("*BT0=1");
        assert_eq!(line, "*BT0=1:08");
        assert_eq!(p.parse(&mut ctx, &std::format!("{line}\r\n")), ErrorStatus::empty());
        assert_eq!(
            ctx.calls[0].2,
            [
                Parameter::Integer(0),
                Parameter::Character('='),
                Parameter::Integer(1),
                Parameter::Integer(0),
                Parameter::Integer(0),
                Parameter::Integer(0),
                Parameter::Integer(0),
            ]
        );
    }

    #[test]
    fn explicit_optionals() {
        let mut p = parser(false);
        let mut ctx = Ctx::default();
        assert!(p.parse(&mut ctx, "*BT2=5,6,-7").is_empty());
        let params = &ctx.calls[0].2;
        assert_eq!(params[2], Parameter::Integer(5));
        assert_eq!(params[3], Parameter::Integer(6));
        assert_eq!(params[4], Parameter::Integer(-7));
        assert_eq!(params[5], Parameter::Integer(0));
    }

    #[test]
    fn checksum_errors() {
        let mut p = parser(true);
        let mut ctx = Ctx::default();
        assert_eq!(p.parse(&mut ctx, "*RE?:00"), ErrorStatus::INVALID_CHECKSUM);
        assert_eq!(p.parse(&mut ctx, "*RE?"), ErrorStatus::MISSING_ARGS);
        assert!(ctx.calls.is_empty());

        let good = with_checksum("*RE?");
        assert!(p.parse(&mut ctx, &good).is_empty());

        // Corrupt one byte before the checksum
        let bad = good.replacen("RE", "RF", 1);
        assert_eq!(p.parse(&mut ctx, &bad), ErrorStatus::INVALID_CHECKSUM);
    }

    #[test]
    fn checksum_stripped_when_not_validated() {
        let mut p = parser(false);
        let mut ctx = Ctx::default();
        assert!(p.parse(&mut ctx, "*RE?:99").is_empty());

        p.set_strip_trailing_checksum(false);
        assert_eq!(p.parse(&mut ctx, "*RE?:99"), ErrorStatus::INVALID_ARGS);
    }

    #[test]
    fn length_limits() {
        let mut p = parser(false);
        let mut ctx = Ctx::default();
        assert_eq!(p.parse(&mut ctx, "*R\r\n"), ErrorStatus::MESSAGE_TOO_SMALL);
        assert_eq!(p.parse(&mut ctx, ""), ErrorStatus::MESSAGE_TOO_SMALL);
        let long = std::format!("*KM={}", "x".repeat(MESSAGE_MAX_SIZE));
        assert_eq!(p.parse(&mut ctx, &long), ErrorStatus::MESSAGE_TOO_BIG);
    }

    #[test]
    fn length_limits_are_inclusive() {
        let mut p = parser(false);
        let mut ctx = Ctx::default();

        assert_eq!(p.parse(&mut ctx, "*C"), ErrorStatus::MESSAGE_TOO_SMALL);
        assert!(p.parse(&mut ctx, "*CU\r\n").is_empty());
        assert_eq!(ctx.calls.len(), 1);

        let longest = std::format!("*CU={}", "x".repeat(MESSAGE_MAX_SIZE - 4));
        assert_eq!(longest.len(), MESSAGE_MAX_SIZE);
        assert!(p.parse(&mut ctx, &longest).is_empty());
        assert_eq!(ctx.calls.len(), 2);

        let too_long = std::format!("{longest}x");
        assert_eq!(p.parse(&mut ctx, &too_long), ErrorStatus::MESSAGE_TOO_BIG);
        assert_eq!(ctx.calls.len(), 2);
    }

    #[test]
    fn failed_command_not_acknowledged() {
        let mut p = parser(false);
        p.set_ack_handler(Some(ack));
        p.set_acknowledge_mode(true);
        let mut ctx = Ctx {
            result: ErrorStatus::COMMAND_FAILED,
            ..Default::default()
        };
        assert_eq!(p.parse(&mut ctx, "*KM=R"), ErrorStatus::COMMAND_FAILED);
        assert_eq!(ctx.calls.len(), 1);
        assert!(ctx.acks.is_empty());
    }

    #[test]
    fn start_character() {
        let mut p = parser(false);
        let mut ctx = Ctx::default();
        assert_eq!(p.parse(&mut ctx, "XRE?\r\n"), ErrorStatus::NEEDS_START);
        assert_eq!(p.message_type(), MessageType::Unexpected);

        assert!(p.parse(&mut ctx, "#RE?").is_empty());
        assert_eq!(p.message_type(), MessageType::Command);
        assert!(p.parse(&mut ctx, "!RE?").is_empty());
        assert_eq!(p.message_type(), MessageType::Reply);
        assert_eq!(ctx.calls[1].1, MessageType::Reply);
    }

    #[test]
    fn roles_restrict_start_characters() {
        assert_eq!(Role::Master.classify(b'*'), None);
        assert_eq!(Role::Master.classify(b'!'), Some(MessageType::Reply));
        assert_eq!(Role::Slave.classify(b'!'), None);
        assert_eq!(Role::Slave.classify(b'#'), Some(MessageType::Command));
        assert_eq!(Role::Peer.classify(b'!'), Some(MessageType::Reply));
        assert_eq!(Role::Peer.classify(b'*'), Some(MessageType::Command));

        assert!(Role::Master.config().checksum_enabled);
        assert!(!Role::Master.config().terminator_crlf);
        assert!(Role::Slave.config().terminator_crlf);
    }

    #[test]
    fn slave_echo_flag() {
        let mut p = Parser::<Ctx, 2>::new(Role::Slave);
        p.set_checksum_enabled(false);
        p.add_command("RE", "", "?", None, Some(record), Permission::None, Permission::None)
            .unwrap();
        let mut ctx = Ctx::default();
        assert!(p.parse(&mut ctx, "*RE?").is_empty());
        assert!(p.echo());
        assert!(p.parse(&mut ctx, "#RE?").is_empty());
        assert!(!p.echo());
    }

    #[test]
    fn unknown_command() {
        let mut p = parser(false);
        let mut ctx = Ctx::default();
        assert_eq!(p.parse(&mut ctx, "*ZZ?\r\n"), ErrorStatus::UNKNOWN_COMMAND);
    }

    #[test]
    fn optional_leading_integers() {
        let mut p = parser(false);
        for (line, expected) in [
            ("*PP?", [0, 0]),
            ("*PP5?", [5, 0]),
            ("*PP5,6?", [5, 6]),
        ] {
            let mut ctx = Ctx::default();
            assert!(p.parse(&mut ctx, line).is_empty(), "{line}");
            let params = &ctx.calls[0].2;
            assert_eq!(params[0].as_int(), Some(expected[0]));
            assert_eq!(params[1].as_int(), Some(expected[1]));
            assert_eq!(params[2].as_char(), Some('?'));
        }

        let mut ctx = Ctx::default();
        assert_eq!(p.parse(&mut ctx, "*PP5,6,7?"), ErrorStatus::INVALID_ARGS);
        assert!(ctx.calls.is_empty());
    }

    #[test]
    fn field_width_is_exact() {
        let mut p = parser(false);
        let mut ctx = Ctx::default();
        assert!(p.parse(&mut ctx, "*WW=42").is_empty());
        assert_eq!(p.parse(&mut ctx, "*WW=4"), ErrorStatus::INVALID_ARGS);
        assert_eq!(p.parse(&mut ctx, "*WW=421"), ErrorStatus::INVALID_ARGS);
        assert_eq!(ctx.calls.len(), 1);
    }

    #[test]
    fn set_falls_back_to_get() {
        let mut p = parser(false);
        let mut ctx = Ctx::default();
        // Set handler reports unhandled, so Get is tried and doesn't fit "=5"
        assert_eq!(p.parse(&mut ctx, "*SN=5"), ErrorStatus::INVALID_ARGS);
        assert!(p.parse(&mut ctx, "*SN?").is_empty());
        assert_eq!(ctx.calls.len(), 1);

        // Set format doesn't fit "?", so Get is used
        assert!(p.parse(&mut ctx, "*KM?").is_empty());
        assert!(p.parse(&mut ctx, "*KM=R").is_empty());
        assert_eq!(ctx.calls[2].2[1], Parameter::Character('R'));
    }

    #[test]
    fn permission_gates_callback() {
        let mut p = parser(false);
        let mut ctx = Ctx::default();
        assert_eq!(p.parse(&mut ctx, "*CD=01/06/2024"), ErrorStatus::INVALID_MODE);
        assert!(ctx.calls.is_empty());

        ctx.level = Permission::Engineering;
        assert_eq!(p.parse(&mut ctx, "*CD=01/06/2024"), ErrorStatus::INVALID_MODE);
        assert!(ctx.calls.is_empty());

        ctx.level = Permission::Calibration;
        assert!(p.parse(&mut ctx, "*CD=01/06/2024").is_empty());
        assert_eq!(ctx.calls[0].2[1].as_date().map(|d| d.year), Some(2024));

        // Get direction needs no permission
        ctx.level = Permission::None;
        assert!(p.parse(&mut ctx, "*CD?").is_empty());
    }

    #[test]
    fn invalid_date_rejected() {
        let mut p = parser(false);
        let mut ctx = Ctx {
            level: Permission::Calibration,
            ..Default::default()
        };
        assert_eq!(p.parse(&mut ctx, "*CD=30/02/2024"), ErrorStatus::INVALID_ARGS);
    }

    #[test]
    fn callback_status_is_returned() {
        let mut p = parser(false);
        let mut ctx = Ctx {
            result: ErrorStatus::COMMAND_FAILED,
            ..Default::default()
        };
        assert_eq!(p.parse(&mut ctx, "*RE?"), ErrorStatus::COMMAND_FAILED);
        assert_eq!(ctx.calls.len(), 1);
    }

    #[test]
    fn acknowledge_after_success() {
        let mut p = parser(false);
        p.set_ack_handler(Some(ack));
        let mut ctx = Ctx::default();

        assert!(p.parse(&mut ctx, "*KM=L").is_empty());
        assert!(ctx.acks.is_empty());

        p.set_acknowledge_mode(true);
        assert!(p.parse(&mut ctx, "*KM=L").is_empty());
        assert!(p.parse(&mut ctx, "*KM?").is_empty());
        assert_eq!(p.parse(&mut ctx, "*KM"), ErrorStatus::INVALID_ARGS);
        assert_eq!(ctx.acks, ["KM", "KM"]);
    }

    #[test]
    fn extract_argument_types() {
        let args = compile("=s,b,4x,X,v,t").unwrap();
        let params = extract(&args, "=abc,1,00fF,0x1234ABCD,-2.5,12:30:00").unwrap();
        assert_eq!(params[1].as_str(), Some("abc"));
        assert_eq!(params[2].as_flag(), Some(true));
        assert_eq!(params[3].as_hex(), Some(0xFF));
        assert_eq!(params[4].as_hex(), Some(0x1234_ABCD));
        assert_eq!(params[5].as_value(), Some(-2.5));
        assert_eq!(params[6].as_time().map(|t| t.minutes), Some(30));

        assert_eq!(extract(&args, "=abc,2,00fF,0,1,12:30:00"), Err(ErrorStatus::INVALID_ARGS));
    }

    #[test]
    fn extract_custom_payload() {
        let args = compile("$").unwrap();
        let params = extract(&args, "anything,at=all?").unwrap();
        assert_eq!(params[0].as_str(), Some("anything,at=all?"));

        let args = compile("[$]").unwrap();
        let params = extract(&args, "").unwrap();
        assert_eq!(params[0].as_str(), Some(""));
    }

    #[test]
    fn optional_assignment_omitted() {
        let args = compile("[=][v]").unwrap();
        let params = extract(&args, "").unwrap();
        assert!(params[0].is_omitted());
        assert_eq!(params[1].as_value(), Some(0.0));

        let params = extract(&args, "=1.5").unwrap();
        assert_eq!(params[0].as_char(), Some('='));
        assert_eq!(params[1].as_value(), Some(1.5));
    }

    #[test]
    fn missing_required_argument() {
        let args = compile("=i,i").unwrap();
        assert_eq!(extract(&args, "=1"), Err(ErrorStatus::INVALID_ARGS));
        assert_eq!(extract(&args, "=1,"), Err(ErrorStatus::INVALID_ARGS));
        assert!(extract(&args, "=1,2").is_ok());
        assert_eq!(extract(&args, "=1,2,"), Err(ErrorStatus::INVALID_ARGS));
    }

    #[test]
    fn optional_non_numeric_cannot_default() {
        let args = compile("=[b]").unwrap();
        assert_eq!(extract(&args, "="), Err(ErrorStatus::INVALID_ARGS));
        assert!(extract(&args, "=1").is_ok());
    }
}
