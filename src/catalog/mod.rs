//! The command catalog: dispatch metadata and introspection metadata for
//! every emulated command, decoded once from two embedded RESP resources.
//!
//! Both tables are immutable after load. The only mutable part is the set of
//! disabled command names, which callers may grow (never shrink) while the
//! server is running.

mod definition;
mod docs;

use std::{
    collections::{HashMap, HashSet},
    sync::{PoisonError, RwLock},
};

use thiserror::Error;

use crate::resp::{RespError, RespValue};

pub use definition::{Arity, CommandDefinition, CommandFlag};
pub use docs::{ArgumentInfo, CommandInfoEntry};

const COMMANDS_RESOURCE: &[u8] = include_bytes!("../../resources/commands.resp");
const DOCS_RESOURCE: &[u8] = include_bytes!("../../resources/command_docs.resp");

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("{resource} resource definition error: {source}")]
    Decode {
        resource: &'static str,
        #[source]
        source: RespError,
    },
    #[error("invalid {resource} resource: {reason}")]
    Invalid {
        resource: &'static str,
        reason: String,
    },
    #[error("{resource} resource declares '{name}' more than once")]
    Duplicate { resource: &'static str, name: String },
}

#[derive(Debug)]
pub struct Catalog {
    /// Top-level commands and subcommands, the latter under `parent|sub`.
    definitions: HashMap<String, CommandDefinition>,
    /// Names of top-level commands in resource order.
    order: Vec<String>,
    docs: HashMap<String, CommandInfoEntry>,
    disabled: RwLock<HashSet<String>>,
}

impl Catalog {
    /// Loads the resources compiled into the binary.
    pub fn load_embedded() -> Result<Self, CatalogError> {
        Self::from_resources(COMMANDS_RESOURCE, DOCS_RESOURCE)
    }

    pub fn from_resources(commands: &[u8], docs: &[u8]) -> Result<Self, CatalogError> {
        let (definitions, order) = parse_definitions(commands)?;
        let docs = parse_docs(docs)?;

        tracing::debug!(
            commands = order.len(),
            entries = definitions.len(),
            docs = docs.len(),
            "command catalog loaded"
        );

        Ok(Self {
            definitions,
            order,
            docs,
            disabled: RwLock::new(HashSet::new()),
        })
    }

    /// Case-insensitive lookup of a command or a `parent|sub` subcommand.
    ///
    /// Disabled commands are still returned; callers that dispatch must also
    /// check [`Catalog::is_disabled`].
    pub fn lookup(&self, name: &str) -> Option<&CommandDefinition> {
        self.definitions.get(&name.to_lowercase())
    }

    pub fn info(&self, name: &str) -> Option<&CommandInfoEntry> {
        self.docs.get(&name.to_lowercase())
    }

    /// Marks `name` as permanently rejected. Disabling `client|setinfo`
    /// leaves the other `CLIENT` subcommands untouched.
    pub fn disable(&self, name: &str) {
        let name = name.to_lowercase();
        tracing::info!(command = %name, "command disabled");
        self.disabled
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name);
    }

    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&name.to_lowercase())
    }

    /// Top-level commands that are currently enabled, in declaration order.
    pub fn commands(&self) -> impl Iterator<Item = &CommandDefinition> + '_ {
        self.order
            .iter()
            .filter(|name| !self.is_disabled(name))
            .filter_map(|name| self.definitions.get(name))
    }

    pub fn len(&self) -> usize {
        self.commands().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn decode(resource: &'static str, input: &[u8]) -> Result<Vec<RespValue>, CatalogError> {
    match RespValue::decode_resource(input) {
        Ok(RespValue::Array(entries)) => Ok(entries),
        Ok(_) => Err(CatalogError::Invalid {
            resource,
            reason: "top-level value is not an array".to_string(),
        }),
        Err(source) => {
            tracing::error!(
                resource,
                position = source.position(),
                line = source.line(),
                "command catalog resource failed to decode"
            );
            Err(CatalogError::Decode { resource, source })
        }
    }
}

fn parse_definitions(
    input: &[u8],
) -> Result<(HashMap<String, CommandDefinition>, Vec<String>), CatalogError> {
    let mut definitions = HashMap::new();
    let mut order = Vec::new();

    for entry in decode("commands", input)? {
        let definition = CommandDefinition::from_resp(&entry, None)?;
        order.push(definition.name.clone());

        for subcommand in &definition.subcommands {
            insert_unique(&mut definitions, "commands", subcommand.name.clone(), subcommand.clone())?;
        }
        insert_unique(&mut definitions, "commands", definition.name.clone(), definition)?;
    }

    Ok((definitions, order))
}

fn parse_docs(input: &[u8]) -> Result<HashMap<String, CommandInfoEntry>, CatalogError> {
    let mut docs = HashMap::new();

    for entry in decode("command docs", input)? {
        let info = CommandInfoEntry::from_resp(&entry)?;
        insert_unique(&mut docs, "command docs", info.name.clone(), info)?;
    }

    Ok(docs)
}

fn insert_unique<T>(
    map: &mut HashMap<String, T>,
    resource: &'static str,
    name: String,
    value: T,
) -> Result<(), CatalogError> {
    if map.contains_key(&name) {
        return Err(CatalogError::Duplicate { resource, name });
    }
    map.insert(name, value);
    Ok(())
}
