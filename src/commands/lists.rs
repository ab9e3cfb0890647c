use bytes::Bytes;

use crate::{
    command_utils::{bulk_or_null, parse_integer, resolve_index, resolve_range},
    commands::CommandError,
    keyspace::{DataStore, DataValue},
    resp::RespValue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Head,
    Tail,
}

fn push(store: &mut DataStore, arguments: &[Bytes], end: End) -> Result<RespValue, CommandError> {
    let (key, elements) = (&arguments[0], &arguments[1..]);

    let list = store.typed_or_insert(key.clone(), DataValue::new_list, DataValue::as_list_mut)?;
    for element in elements {
        match end {
            End::Head => list.push_front(element.clone()),
            End::Tail => list.push_back(element.clone()),
        }
    }

    Ok(RespValue::Integer(list.len() as i64))
}

/// Handles LPUSH. Elements are inserted one after another at the head, so
/// `LPUSH k a b c` leaves `c b a`.
pub fn lpush(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    push(store, arguments, End::Head)
}

pub fn rpush(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    push(store, arguments, End::Tail)
}

/// Without a count a single element (or null) is returned; with a count an
/// array (or a null array when the key is missing).
fn pop(store: &mut DataStore, arguments: &[Bytes], end: End) -> Result<RespValue, CommandError> {
    if arguments.len() > 2 {
        return Err(CommandError::Syntax);
    }

    let key = &arguments[0];
    let count = match arguments.get(1) {
        Some(count) => {
            let count = parse_integer(count)?;
            Some(usize::try_from(count).map_err(|_| CommandError::NotAnInteger)?)
        }
        None => None,
    };

    let Some(list) = store.typed_mut(key, DataValue::as_list_mut)? else {
        return Ok(match count {
            Some(_) => RespValue::NullArray,
            None => RespValue::Null,
        });
    };

    let mut take = || match end {
        End::Head => list.pop_front(),
        End::Tail => list.pop_back(),
    };

    let reply = match count {
        None => bulk_or_null(take().as_ref()),
        Some(count) => RespValue::Array(
            std::iter::from_fn(&mut take)
                .take(count)
                .map(RespValue::BulkString)
                .collect(),
        ),
    };

    store.remove_if_empty(key);
    Ok(reply)
}

pub fn lpop(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    pop(store, arguments, End::Head)
}

pub fn rpop(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    pop(store, arguments, End::Tail)
}

pub fn llen(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let length = store
        .typed(&arguments[0], DataValue::as_list)?
        .map_or(0, |list| list.len());
    Ok(RespValue::Integer(length as i64))
}

/// Handles LRANGE. Both ends are inclusive and may be negative.
pub fn lrange(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let start = parse_integer(&arguments[1])?;
    let stop = parse_integer(&arguments[2])?;

    let Some(list) = store.typed(&arguments[0], DataValue::as_list)? else {
        return Ok(RespValue::Array(Vec::new()));
    };

    let Some((start, stop)) = resolve_range(list.len(), start, stop) else {
        return Ok(RespValue::Array(Vec::new()));
    };

    Ok(RespValue::Array(
        list.range(start..=stop)
            .cloned()
            .map(RespValue::BulkString)
            .collect(),
    ))
}

pub fn lindex(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let index = parse_integer(&arguments[1])?;

    let element = store
        .typed(&arguments[0], DataValue::as_list)?
        .and_then(|list| resolve_index(list.len(), index).and_then(|index| list.get(index)));
    Ok(bulk_or_null(element))
}
