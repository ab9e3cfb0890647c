use std::str::FromStr;

use crate::{catalog::CatalogError, resp::RespValue};

/// Behaviour flags a command carries in the dispatch metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandFlag {
    Write,
    Readonly,
    Denyoom,
    Admin,
    Noscript,
    Loading,
    Stale,
    Fast,
    NoAuth,
    AllowBusy,
    Blocking,
}

impl CommandFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandFlag::Write => "write",
            CommandFlag::Readonly => "readonly",
            CommandFlag::Denyoom => "denyoom",
            CommandFlag::Admin => "admin",
            CommandFlag::Noscript => "noscript",
            CommandFlag::Loading => "loading",
            CommandFlag::Stale => "stale",
            CommandFlag::Fast => "fast",
            CommandFlag::NoAuth => "no_auth",
            CommandFlag::AllowBusy => "allow_busy",
            CommandFlag::Blocking => "blocking",
        }
    }
}

impl FromStr for CommandFlag {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "write" => Ok(CommandFlag::Write),
            "readonly" => Ok(CommandFlag::Readonly),
            "denyoom" => Ok(CommandFlag::Denyoom),
            "admin" => Ok(CommandFlag::Admin),
            "noscript" => Ok(CommandFlag::Noscript),
            "loading" => Ok(CommandFlag::Loading),
            "stale" => Ok(CommandFlag::Stale),
            "fast" => Ok(CommandFlag::Fast),
            "no_auth" => Ok(CommandFlag::NoAuth),
            "allow_busy" => Ok(CommandFlag::AllowBusy),
            "blocking" => Ok(CommandFlag::Blocking),
            other => Err(format!("unknown command flag '{}'", other)),
        }
    }
}

/// Allowed number of words in a request, command name included.
///
/// Built from the server's signed arity convention: `n` means exactly `n`
/// words, `-n` means at least `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: Option<usize>,
}

impl Arity {
    pub fn from_signed(arity: i64) -> Option<Self> {
        let words = usize::try_from(arity.unsigned_abs()).ok()?;
        if words == 0 {
            return None;
        }

        Some(Self {
            min: words,
            max: (arity > 0).then_some(words),
        })
    }

    pub fn to_signed(&self) -> i64 {
        let min = self.min as i64;
        match self.max {
            Some(_) => min,
            None => -min,
        }
    }

    pub fn accepts(&self, words: usize) -> bool {
        words >= self.min && self.max.map_or(true, |max| words <= max)
    }
}

/// Dispatch metadata for one command or subcommand.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandDefinition {
    /// Lower-cased; subcommands are `parent|sub`.
    pub name: String,
    pub arity: Arity,
    pub flags: Vec<CommandFlag>,
    pub first_key: i64,
    pub last_key: i64,
    pub key_step: i64,
    pub subcommands: Vec<CommandDefinition>,
}

impl CommandDefinition {
    pub fn has_flag(&self, flag: CommandFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn has_subcommands(&self) -> bool {
        !self.subcommands.is_empty()
    }

    pub fn is_write(&self) -> bool {
        self.has_flag(CommandFlag::Write)
    }

    /// Parses one entry of the dispatch resource:
    /// `[name, arity, [flags...], first_key, last_key, key_step, [subcommands...]]`.
    pub(crate) fn from_resp(value: &RespValue, parent: Option<&str>) -> Result<Self, CatalogError> {
        let Some(fields) = value.as_array() else {
            return Err(invalid("command entry is not an array"));
        };

        let [name, arity, flags, first_key, last_key, key_step, subcommands] = fields else {
            return Err(invalid(format!(
                "command entry has {} fields, expected 7",
                fields.len()
            )));
        };

        let name = name
            .as_str()
            .ok_or_else(|| invalid("command name is not a string"))?
            .to_lowercase();

        if let Some(parent) = parent {
            let prefix = format!("{}|", parent);
            if !name.starts_with(&prefix) || name.len() == prefix.len() {
                return Err(invalid(format!(
                    "subcommand '{}' is not named after its parent '{}'",
                    name, parent
                )));
            }
        } else if name.is_empty() || name.contains('|') {
            return Err(invalid(format!("invalid command name '{}'", name)));
        }

        let arity = arity
            .as_integer()
            .and_then(Arity::from_signed)
            .ok_or_else(|| invalid(format!("command '{}' has an invalid arity", name)))?;

        let flags = flags
            .as_array()
            .ok_or_else(|| invalid(format!("command '{}' flags are not an array", name)))?
            .iter()
            .map(|flag| {
                flag.as_str()
                    .ok_or_else(|| format!("command '{}' has a non-string flag", name))
                    .and_then(CommandFlag::from_str)
                    .map_err(invalid)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let integer = |value: &RespValue, field: &str| {
            value
                .as_integer()
                .ok_or_else(|| invalid(format!("command '{}' {} is not an integer", name, field)))
        };
        let first_key = integer(first_key, "first key")?;
        let last_key = integer(last_key, "last key")?;
        let key_step = integer(key_step, "key step")?;

        let subcommand_entries = subcommands
            .as_array()
            .ok_or_else(|| invalid(format!("command '{}' subcommands are not an array", name)))?;
        if parent.is_some() && !subcommand_entries.is_empty() {
            return Err(invalid(format!("subcommand '{}' has nested subcommands", name)));
        }

        let subcommands = subcommand_entries
            .iter()
            .map(|entry| CommandDefinition::from_resp(entry, Some(&name)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name,
            arity,
            flags,
            first_key,
            last_key,
            key_step,
            subcommands,
        })
    }

    /// The `COMMAND INFO` reply shape for this command.
    pub fn to_resp(&self) -> RespValue {
        RespValue::Array(vec![
            RespValue::bulk(self.name.clone()),
            RespValue::Integer(self.arity.to_signed()),
            RespValue::Array(
                self.flags
                    .iter()
                    .map(|flag| RespValue::simple(flag.as_str()))
                    .collect(),
            ),
            RespValue::Integer(self.first_key),
            RespValue::Integer(self.last_key),
            RespValue::Integer(self.key_step),
            RespValue::Array(Vec::new()),
            RespValue::Array(Vec::new()),
            RespValue::Array(Vec::new()),
            RespValue::Array(self.subcommands.iter().map(Self::to_resp).collect()),
        ])
    }
}

fn invalid(reason: impl Into<String>) -> CatalogError {
    CatalogError::Invalid {
        resource: "commands",
        reason: reason.into(),
    }
}
