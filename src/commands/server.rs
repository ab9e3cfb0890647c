use std::time::SystemTime;

use bytes::Bytes;
use globset::GlobBuilder;

use crate::{
    catalog::{Catalog, CommandDefinition},
    command_utils::{keyword, lossy, parse_integer},
    commands::CommandError,
    keyspace::{DataStore, DataStoreSet},
    resp::RespValue,
};

/// `COMMAND INFO` entry for `definition`, leaving out disabled subcommands.
fn command_entry(catalog: &Catalog, definition: &CommandDefinition) -> RespValue {
    if !definition.has_subcommands() {
        return definition.to_resp();
    }

    let mut visible = definition.clone();
    visible
        .subcommands
        .retain(|subcommand| !catalog.is_disabled(&subcommand.name));
    visible.to_resp()
}

/// Bare `COMMAND`: every enabled command.
pub fn command(catalog: &Catalog) -> Result<RespValue, CommandError> {
    Ok(RespValue::Array(
        catalog
            .commands()
            .map(|definition| command_entry(catalog, definition))
            .collect(),
    ))
}

pub fn command_count(catalog: &Catalog) -> Result<RespValue, CommandError> {
    Ok(RespValue::Integer(catalog.len() as i64))
}

/// Handles `COMMAND LIST [FILTERBY PATTERN pattern]`.
pub fn command_list(catalog: &Catalog, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let matcher = match arguments {
        [] => None,
        [filter, kind, pattern]
            if keyword(filter) == "FILTERBY" && keyword(kind) == "PATTERN" =>
        {
            let glob = GlobBuilder::new(&lossy(pattern))
                .literal_separator(false)
                .backslash_escape(true)
                .build()
                .map_err(|_| CommandError::Syntax)?;
            Some(glob.compile_matcher())
        }
        _ => return Err(CommandError::Syntax),
    };

    Ok(RespValue::Array(
        catalog
            .commands()
            .filter(|definition| {
                matcher
                    .as_ref()
                    .map_or(true, |matcher| matcher.is_match(&definition.name))
            })
            .map(|definition| RespValue::bulk(definition.name.clone()))
            .collect(),
    ))
}

/// Unknown or disabled names get a null entry in their position.
pub fn command_info(catalog: &Catalog, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    if arguments.is_empty() {
        return command(catalog);
    }

    Ok(RespValue::Array(
        arguments
            .iter()
            .map(|name| {
                let name = lossy(name).to_lowercase();
                match catalog.lookup(&name) {
                    Some(definition) if !catalog.is_disabled(&name) => {
                        command_entry(catalog, definition)
                    }
                    _ => RespValue::Null,
                }
            })
            .collect(),
    ))
}

fn docs_entry(catalog: &Catalog, name: &str) -> Option<RespValue> {
    if catalog.is_disabled(name) {
        return None;
    }
    let info = catalog.info(name)?;
    let RespValue::Array(mut fields) = info.to_resp() else {
        return None;
    };

    if let Some(definition) = catalog.lookup(name).filter(|definition| definition.has_subcommands()) {
        let subcommands = definition
            .subcommands
            .iter()
            .filter_map(|subcommand| {
                docs_entry(catalog, &subcommand.name).map(|docs| {
                    [RespValue::bulk(subcommand.name.clone()), docs]
                })
            })
            .flatten()
            .collect::<Vec<_>>();

        if !subcommands.is_empty() {
            fields.push(RespValue::bulk("subcommands"));
            fields.push(RespValue::Array(subcommands));
        }
    }

    Some(RespValue::Array(fields))
}

/// A flat name/docs map; names without docs are left out.
pub fn command_docs(catalog: &Catalog, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let names = if arguments.is_empty() {
        catalog
            .commands()
            .map(|definition| definition.name.clone())
            .collect::<Vec<_>>()
    } else {
        arguments
            .iter()
            .map(|name| lossy(name).to_lowercase())
            .collect()
    };

    Ok(RespValue::Array(
        names
            .into_iter()
            .filter_map(|name| {
                docs_entry(catalog, &name).map(|docs| [RespValue::bulk(name), docs])
            })
            .flatten()
            .collect(),
    ))
}

pub fn dbsize(store: &mut DataStore, _arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    Ok(RespValue::Integer(store.len() as i64))
}

fn check_flush_mode(arguments: &[Bytes]) -> Result<(), CommandError> {
    match arguments {
        [] => Ok(()),
        [mode] if matches!(keyword(mode).as_str(), "ASYNC" | "SYNC") => Ok(()),
        _ => Err(CommandError::Syntax),
    }
}

/// `ASYNC` and `SYNC` are accepted and both flush immediately.
pub fn flushdb(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    check_flush_mode(arguments)?;
    store.clear();
    Ok(RespValue::ok())
}

pub async fn flushall(stores: &DataStoreSet, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    check_flush_mode(arguments)?;
    for mut store in stores.lock_all().await {
        store.clear();
    }
    Ok(RespValue::ok())
}

pub async fn save(stores: &DataStoreSet) -> Result<RespValue, CommandError> {
    match stores.save().await {
        Ok(_) => Ok(RespValue::ok()),
        Err(error) => {
            tracing::error!(error = %error, "SAVE failed");
            Err(CommandError::Persistence(error.to_string()))
        }
    }
}

pub async fn swapdb(stores: &DataStoreSet, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let index = |argument: &Bytes| -> Result<usize, CommandError> {
        let index = parse_integer(argument)?;
        usize::try_from(index)
            .ok()
            .filter(|index| *index < stores.store_count())
            .ok_or(CommandError::DatabaseOutOfRange)
    };
    let first = index(&arguments[0])?;
    let second = index(&arguments[1])?;

    if first == second {
        return Ok(RespValue::ok());
    }

    let (mut a, mut b) = stores.lock_pair(first, second).await?;
    std::mem::swap(&mut *a, &mut *b);

    Ok(RespValue::ok())
}

/// Unix time as `[seconds, microseconds]`.
pub fn time() -> Result<RespValue, CommandError> {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();

    Ok(RespValue::bulk_array([
        now.as_secs().to_string(),
        now.subsec_micros().to_string(),
    ]))
}
