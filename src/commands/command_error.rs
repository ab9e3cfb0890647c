use thiserror::Error;

use crate::{
    keyspace::{KeyspaceError, WrongType},
    resp::RespValue,
};

/// Every way a single request can fail without closing the connection.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("expected an array of bulk strings")]
    Protocol,
    #[error("unknown command '{name}'")]
    UnknownCommand { name: String, arguments: Vec<String> },
    #[error("unknown subcommand '{subcommand}' of '{command}'")]
    UnknownSubcommand { command: String, subcommand: String },
    #[error("wrong number of arguments for '{0}'")]
    WrongArity(String),
    #[error("wrong type")]
    WrongType,
    #[error("syntax error")]
    Syntax,
    #[error("value is not an integer or out of range")]
    NotAnInteger,
    #[error("value is not a valid float")]
    NotAFloat,
    #[error("increment or decrement would overflow")]
    Overflow,
    #[error("hash value is not an integer")]
    HashValueNotAnInteger,
    #[error("resulting score is not a number")]
    ScoreNotANumber,
    #[error("no such key")]
    NoSuchKey,
    #[error("DB index is out of range")]
    DatabaseOutOfRange,
    #[error("source and destination objects are the same")]
    SameObject,
    #[error("invalid expire time in '{0}'")]
    InvalidExpireTime(&'static str),
    #[error("invalid client name")]
    InvalidClientName,
    #[error("invalid value for {0}")]
    InvalidAttribute(String),
    #[error("unrecognized option '{0}'")]
    UnrecognizedOption(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl From<WrongType> for CommandError {
    fn from(_: WrongType) -> Self {
        CommandError::WrongType
    }
}

impl From<KeyspaceError> for CommandError {
    fn from(error: KeyspaceError) -> Self {
        match error {
            KeyspaceError::IndexOutOfRange(_) => CommandError::DatabaseOutOfRange,
            KeyspaceError::SameStore(_) => CommandError::SameObject,
        }
    }
}

impl CommandError {
    /// The error reply sent to the client.
    pub fn to_resp(&self) -> RespValue {
        let message = match self {
            CommandError::Protocol => {
                "ERR Protocol error: expected an array of bulk strings".to_string()
            }
            CommandError::UnknownCommand { name, arguments } => {
                let arguments = arguments
                    .iter()
                    .map(|argument| format!("'{}' ", argument))
                    .collect::<String>();
                format!(
                    "ERR unknown command '{}', with args beginning with: {}",
                    name, arguments
                )
            }
            CommandError::UnknownSubcommand {
                command,
                subcommand,
            } => format!(
                "ERR unknown subcommand '{}'. Try {} HELP.",
                subcommand,
                command.to_uppercase()
            ),
            CommandError::WrongArity(name) => {
                format!("ERR wrong number of arguments for '{}' command", name)
            }
            CommandError::WrongType => {
                "WRONGTYPE Operation against a key holding the wrong kind of value".to_string()
            }
            CommandError::Syntax => "ERR syntax error".to_string(),
            CommandError::NotAnInteger => "ERR value is not an integer or out of range".to_string(),
            CommandError::NotAFloat => "ERR value is not a valid float".to_string(),
            CommandError::Overflow => "ERR increment or decrement would overflow".to_string(),
            CommandError::HashValueNotAnInteger => "ERR hash value is not an integer".to_string(),
            CommandError::ScoreNotANumber => {
                "ERR resulting score is not a number (NaN)".to_string()
            }
            CommandError::NoSuchKey => "ERR no such key".to_string(),
            CommandError::DatabaseOutOfRange => "ERR DB index is out of range".to_string(),
            CommandError::SameObject => {
                "ERR source and destination objects are the same".to_string()
            }
            CommandError::InvalidExpireTime(command) => {
                format!("ERR invalid expire time in '{}' command", command)
            }
            CommandError::InvalidClientName => {
                "ERR Client names cannot contain spaces, newlines or special characters."
                    .to_string()
            }
            CommandError::InvalidAttribute(attribute) => format!(
                "ERR {} cannot contain spaces, newlines or special characters.",
                attribute
            ),
            CommandError::UnrecognizedOption(option) => {
                format!("ERR Unrecognized option '{}'", option)
            }
            CommandError::Persistence(reason) => format!("ERR {}", reason),
        };

        RespValue::error(message)
    }
}
