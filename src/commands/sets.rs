use bytes::Bytes;

use crate::{
    commands::CommandError,
    keyspace::{DataStore, DataValue},
    resp::RespValue,
};

pub fn sadd(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let set = store.typed_or_insert(arguments[0].clone(), DataValue::new_set, DataValue::as_set_mut)?;
    let added = arguments[1..]
        .iter()
        .filter(|member| set.insert((*member).clone()))
        .count();
    Ok(RespValue::Integer(added as i64))
}

pub fn srem(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let key = &arguments[0];
    let Some(set) = store.typed_mut(key, DataValue::as_set_mut)? else {
        return Ok(RespValue::Integer(0));
    };

    let removed = arguments[1..]
        .iter()
        .filter(|member| set.remove(*member))
        .count();

    store.remove_if_empty(key);
    Ok(RespValue::Integer(removed as i64))
}

/// Members in byte order.
pub fn smembers(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let Some(set) = store.typed(&arguments[0], DataValue::as_set)? else {
        return Ok(RespValue::Array(Vec::new()));
    };

    let mut members = set.iter().cloned().collect::<Vec<_>>();
    members.sort();
    Ok(RespValue::Array(members.into_iter().map(RespValue::BulkString).collect()))
}

pub fn sismember(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let found = store
        .typed(&arguments[0], DataValue::as_set)?
        .is_some_and(|set| set.contains(&arguments[1]));
    Ok(RespValue::Integer(found as i64))
}

pub fn scard(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let length = store
        .typed(&arguments[0], DataValue::as_set)?
        .map_or(0, |set| set.len());
    Ok(RespValue::Integer(length as i64))
}
