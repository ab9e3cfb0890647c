use bytes::Bytes;

use crate::{
    command_utils::{bulk_or_null, parse_integer},
    commands::CommandError,
    keyspace::{DataStore, DataValue},
    resp::RespValue,
};

/// Handles `HSET key field value [field value ...]`. Replies with the
/// number of fields that did not exist before.
pub fn hset(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let (key, pairs) = (&arguments[0], &arguments[1..]);
    if pairs.is_empty() || pairs.len() % 2 != 0 {
        return Err(CommandError::WrongArity("hset".to_string()));
    }

    let hash = store.typed_or_insert(key.clone(), DataValue::new_hash, DataValue::as_hash_mut)?;
    let added = pairs
        .chunks_exact(2)
        .filter(|pair| hash.insert(pair[0].clone(), pair[1].clone()).is_none())
        .count();

    Ok(RespValue::Integer(added as i64))
}

pub fn hget(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let value = store
        .typed(&arguments[0], DataValue::as_hash)?
        .and_then(|hash| hash.get(&arguments[1]));
    Ok(bulk_or_null(value))
}

pub fn hdel(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let key = &arguments[0];
    let Some(hash) = store.typed_mut(key, DataValue::as_hash_mut)? else {
        return Ok(RespValue::Integer(0));
    };

    let removed = arguments[1..]
        .iter()
        .filter(|field| hash.remove(*field).is_some())
        .count();

    store.remove_if_empty(key);
    Ok(RespValue::Integer(removed as i64))
}

/// Fields and values interleaved, sorted by field so replies are stable.
pub fn hgetall(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let Some(hash) = store.typed(&arguments[0], DataValue::as_hash)? else {
        return Ok(RespValue::Array(Vec::new()));
    };

    let mut pairs = hash.iter().collect::<Vec<_>>();
    pairs.sort();

    Ok(RespValue::Array(
        pairs
            .into_iter()
            .flat_map(|(field, value)| {
                [
                    RespValue::BulkString(field.clone()),
                    RespValue::BulkString(value.clone()),
                ]
            })
            .collect(),
    ))
}

pub fn hexists(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let found = store
        .typed(&arguments[0], DataValue::as_hash)?
        .is_some_and(|hash| hash.contains_key(&arguments[1]));
    Ok(RespValue::Integer(found as i64))
}

pub fn hlen(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let length = store
        .typed(&arguments[0], DataValue::as_hash)?
        .map_or(0, |hash| hash.len());
    Ok(RespValue::Integer(length as i64))
}

fn sorted_column(
    store: &mut DataStore,
    key: &[u8],
    column: for<'a> fn((&'a Bytes, &'a Bytes)) -> &'a Bytes,
) -> Result<RespValue, CommandError> {
    let Some(hash) = store.typed(key, DataValue::as_hash)? else {
        return Ok(RespValue::Array(Vec::new()));
    };

    let mut pairs = hash.iter().collect::<Vec<_>>();
    pairs.sort();

    Ok(RespValue::Array(
        pairs
            .into_iter()
            .map(|pair| RespValue::BulkString(column(pair).clone()))
            .collect(),
    ))
}

pub fn hkeys(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    sorted_column(store, &arguments[0], |(field, _)| field)
}

pub fn hvals(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    sorted_column(store, &arguments[0], |(_, value)| value)
}

pub fn hincrby(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let (key, field) = (&arguments[0], &arguments[1]);
    let delta = parse_integer(&arguments[2])?;

    let hash = store.typed_or_insert(key.clone(), DataValue::new_hash, DataValue::as_hash_mut)?;
    let current = match hash.get(field) {
        Some(value) => parse_integer(value).map_err(|_| CommandError::HashValueNotAnInteger)?,
        None => 0,
    };
    let updated = current.checked_add(delta).ok_or(CommandError::Overflow)?;
    hash.insert(field.clone(), Bytes::from(updated.to_string()));

    Ok(RespValue::Integer(updated))
}
