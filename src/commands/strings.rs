use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::time::Instant;

use crate::{
    command_utils::{bulk_or_null, keyword, parse_integer},
    commands::CommandError,
    keyspace::{DataStore, DataValue, Entry},
    resp::RespValue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetCondition {
    Always,
    IfMissing,
    IfPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetExpiry {
    Clear,
    Keep,
    After(Duration),
}

/// Parsed arguments for `SET key value [NX | XX] [GET] [EX s | PX ms | KEEPTTL]`.
#[derive(Debug, PartialEq)]
pub struct SetArguments {
    key: Bytes,
    value: Bytes,
    condition: SetCondition,
    expiry: SetExpiry,
    return_previous: bool,
}

impl SetArguments {
    pub fn parse(arguments: &[Bytes]) -> Result<Self, CommandError> {
        let [key, value, options @ ..] = arguments else {
            return Err(CommandError::WrongArity("set".to_string()));
        };

        let mut condition = SetCondition::Always;
        let mut expiry = SetExpiry::Clear;
        let mut expiry_given = false;
        let mut return_previous = false;

        let mut options = options.iter();
        while let Some(option) = options.next() {
            match keyword(option).as_str() {
                "NX" if condition == SetCondition::Always => condition = SetCondition::IfMissing,
                "XX" if condition == SetCondition::Always => condition = SetCondition::IfPresent,
                "GET" => return_previous = true,
                "KEEPTTL" if !expiry_given => {
                    expiry = SetExpiry::Keep;
                    expiry_given = true;
                }
                unit @ ("EX" | "PX") if !expiry_given => {
                    let amount = options.next().ok_or(CommandError::Syntax)?;
                    let amount = parse_integer(amount)?;
                    if amount <= 0 {
                        return Err(CommandError::InvalidExpireTime("set"));
                    }
                    let ttl_ms = if unit == "EX" {
                        amount
                            .checked_mul(1000)
                            .ok_or(CommandError::InvalidExpireTime("set"))?
                    } else {
                        amount
                    };
                    expiry = SetExpiry::After(Duration::from_millis(ttl_ms as u64));
                    expiry_given = true;
                }
                _ => return Err(CommandError::Syntax),
            }
        }

        Ok(Self {
            key: key.clone(),
            value: value.clone(),
            condition,
            expiry,
            return_previous,
        })
    }
}

/// Handles the SET command.
///
/// Replies `+OK`, or a null bulk string when the NX/XX condition stops the
/// write. With `GET` the previous string value (or null) is returned
/// instead, and a non-string previous value is a type error even if the
/// write would have gone ahead.
pub fn set(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let set_arguments = SetArguments::parse(arguments)?;

    let (previous, previous_expiry) = match store.get(&set_arguments.key) {
        Some(entry) => {
            let previous = match (&entry.value, set_arguments.return_previous) {
                (DataValue::String(data), _) => Some(data.clone()),
                (_, true) => return Err(CommandError::WrongType),
                (_, false) => None,
            };
            (Some(previous), entry.expires_at)
        }
        None => (None, None),
    };

    let exists = previous.is_some();
    let allowed = match set_arguments.condition {
        SetCondition::Always => true,
        SetCondition::IfMissing => !exists,
        SetCondition::IfPresent => exists,
    };

    if allowed {
        let expires_at = match set_arguments.expiry {
            SetExpiry::Clear => None,
            SetExpiry::Keep => previous_expiry,
            SetExpiry::After(ttl) => Some(
                Instant::now()
                    .checked_add(ttl)
                    .ok_or(CommandError::InvalidExpireTime("set"))?,
            ),
        };
        store.insert(
            set_arguments.key,
            Entry::with_expiry(DataValue::String(set_arguments.value), expires_at),
        );
    }

    if set_arguments.return_previous {
        return Ok(bulk_or_null(previous.flatten().as_ref()));
    }

    Ok(if allowed { RespValue::ok() } else { RespValue::Null })
}

pub fn get(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let value = store.typed(&arguments[0], DataValue::as_string)?;
    Ok(bulk_or_null(value))
}

pub fn getdel(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let Some(value) = store.typed(&arguments[0], DataValue::as_string)?.cloned() else {
        return Ok(RespValue::Null);
    };
    store.remove(&arguments[0]);
    Ok(RespValue::BulkString(value))
}

pub fn append(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let key = &arguments[0];
    let suffix = &arguments[1];

    let Some(entry) = store.get_mut(key) else {
        store.insert(key.clone(), Entry::new(DataValue::String(suffix.clone())));
        return Ok(RespValue::Integer(suffix.len() as i64));
    };

    let DataValue::String(current) = &mut entry.value else {
        return Err(CommandError::WrongType);
    };

    let mut combined = BytesMut::with_capacity(current.len() + suffix.len());
    combined.extend_from_slice(current);
    combined.extend_from_slice(suffix);
    *current = combined.freeze();

    Ok(RespValue::Integer(current.len() as i64))
}

pub fn strlen(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let length = store
        .typed(&arguments[0], DataValue::as_string)?
        .map_or(0, |value| value.len());
    Ok(RespValue::Integer(length as i64))
}

/// Adds `delta` to the integer stored at `key`, creating it from 0.
/// The expiry of an existing key is kept.
fn increment(store: &mut DataStore, key: &Bytes, delta: i64) -> Result<RespValue, CommandError> {
    let Some(entry) = store.get_mut(key) else {
        store.insert(
            key.clone(),
            Entry::new(DataValue::String(Bytes::from(delta.to_string()))),
        );
        return Ok(RespValue::Integer(delta));
    };

    let DataValue::String(current) = &mut entry.value else {
        return Err(CommandError::WrongType);
    };

    let updated = parse_integer(current)?
        .checked_add(delta)
        .ok_or(CommandError::Overflow)?;
    *current = Bytes::from(updated.to_string());

    Ok(RespValue::Integer(updated))
}

pub fn incr(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    increment(store, &arguments[0], 1)
}

pub fn decr(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    increment(store, &arguments[0], -1)
}

pub fn incrby(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let delta = parse_integer(&arguments[1])?;
    increment(store, &arguments[0], delta)
}

pub fn decrby(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let delta = parse_integer(&arguments[1])?
        .checked_neg()
        .ok_or(CommandError::Overflow)?;
    increment(store, &arguments[0], delta)
}

/// Non-string values read as null rather than failing the whole reply.
pub fn mget(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let values = arguments
        .iter()
        .map(|key| match store.get(key).map(|entry| &entry.value) {
            Some(DataValue::String(data)) => RespValue::BulkString(data.clone()),
            _ => RespValue::Null,
        })
        .collect();
    Ok(RespValue::Array(values))
}

pub fn mset(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    if arguments.len() % 2 != 0 {
        return Err(CommandError::WrongArity("mset".to_string()));
    }

    for pair in arguments.chunks_exact(2) {
        store.insert(pair[0].clone(), Entry::new(DataValue::String(pair[1].clone())));
    }
    Ok(RespValue::ok())
}
