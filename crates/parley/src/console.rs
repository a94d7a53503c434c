//! What the user types and what the user sees.
//!
//! Input lines become [`Command`]s; everything the client wants to show
//! becomes a [`Notice`]. Neither type knows about sockets or sessions, so
//! the state machine can be tested without a terminal.

use std::fmt;

use parley_session::SessionState;

/// First line shown after the client starts.
pub const GREETING: &str = "Authorize yourself, please. If you're unsure how, type /help.";

/// Reported when anything but `/auth` or `/help` is typed before
/// authentication.
pub const EXPECTED_AUTH: &str = "Invalid command. Expected '/auth' or '/help'.";

/// Reported when `/auth` is typed after authentication.
pub const ALREADY_AUTHORIZED: &str = "You are already authorized. This command cannot be used.";

const AUTH_HELP: &str = "To authorize, use:\n/auth username secret displayName";

const OPEN_HELP: &str = "To join channels, use:\n/join channelID\n\
                         To change your display name, use:\n/rename newName\n\
                         Any other line is sent as a chat message.";

const END_HELP: &str = "The session has ended.";

/// Usage text for `/help` in the given state.
pub fn help_text(state: SessionState) -> &'static str {
    match state {
        SessionState::Start | SessionState::Auth => AUTH_HELP,
        SessionState::Open => OPEN_HELP,
        SessionState::End(_) => END_HELP,
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Auth {
        username: String,
        secret: String,
        display_name: String,
    },
    Join {
        channel_id: String,
    },
    Rename {
        display_name: String,
    },
    Help,
    /// Anything that is not a command.
    Chat(String),
}

/// A line that looks like a command but isn't a well-formed one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Invalid usage of {command} command. Usage: {usage}")]
    Usage {
        command: &'static str,
        usage: &'static str,
    },

    #[error("Unknown command {0}. Type /help for usage.")]
    Unknown(String),
}

impl Command {
    /// Parses a non-empty input line (without its line terminator).
    ///
    /// Lines starting with `/` are commands with whitespace-separated
    /// arguments. Everything else is chat text and is kept verbatim.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        if !line.starts_with('/') {
            return Ok(Self::Chat(line.to_string()));
        }

        let mut words = line.split_whitespace();
        let name = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();

        match name {
            "/auth" => match args[..] {
                [username, secret, display_name] => Ok(Self::Auth {
                    username: username.to_string(),
                    secret: secret.to_string(),
                    display_name: display_name.to_string(),
                }),
                _ => Err(CommandError::Usage {
                    command: "/auth",
                    usage: "/auth <username> <secret> <displayName>",
                }),
            },
            "/join" => match args[..] {
                [channel_id] => Ok(Self::Join {
                    channel_id: channel_id.to_string(),
                }),
                _ => Err(CommandError::Usage {
                    command: "/join",
                    usage: "/join <channelID>",
                }),
            },
            "/rename" => match args[..] {
                [display_name] => Ok(Self::Rename {
                    display_name: display_name.to_string(),
                }),
                _ => Err(CommandError::Usage {
                    command: "/rename",
                    usage: "/rename <newName>",
                }),
            },
            "/help" => Ok(Self::Help),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Notice
// ---------------------------------------------------------------------------

/// Which terminal stream a notice belongs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Something to show the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A chat message from another user.
    Chat { from: String, content: String },
    /// A positive REPLY.
    Success(String),
    /// A negative REPLY.
    Failure(String),
    /// An ERR sent by the server.
    RemoteError { from: String, content: String },
    /// A problem detected locally.
    LocalError(String),
    /// Greeting and help text.
    Info(String),
}

impl Notice {
    /// Chat and help go to stdout; status and errors go to stderr.
    pub fn stream(&self) -> Stream {
        match self {
            Self::Chat { .. } | Self::Info(_) => Stream::Stdout,
            Self::Success(_) | Self::Failure(_) | Self::RemoteError { .. } | Self::LocalError(_) => {
                Stream::Stderr
            }
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat { from, content } => write!(f, "{from}: {content}"),
            Self::Success(content) => write!(f, "Success: {content}"),
            Self::Failure(content) => write!(f, "Failure: {content}"),
            Self::RemoteError { from, content } => write!(f, "ERR FROM {from}: {content}"),
            Self::LocalError(content) => write!(f, "ERR: {content}"),
            Self::Info(text) => f.write_str(text),
        }
    }
}
