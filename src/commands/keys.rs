use std::time::Duration;

use bytes::Bytes;
use globset::GlobBuilder;
use tokio::time::Instant;

use crate::{
    command_utils::{keyword, lossy, parse_integer},
    commands::CommandError,
    keyspace::{DataStore, DataStoreSet},
    resp::RespValue,
};

pub fn del(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let removed = arguments
        .iter()
        .filter(|key| store.remove(key).is_some())
        .count();
    Ok(RespValue::Integer(removed as i64))
}

/// Counts a key once per time it is named.
pub fn exists(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let found = arguments
        .iter()
        .filter(|key| store.contains_key(key))
        .count();
    Ok(RespValue::Integer(found as i64))
}

pub fn type_command(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let name = store
        .get(&arguments[0])
        .map_or("none", |entry| entry.value.type_name());
    Ok(RespValue::simple(name))
}

/// Glob-style key listing. `*`, `?`, `[...]` and `\` escapes are honoured.
pub fn keys(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let pattern = lossy(&arguments[0]);

    let Ok(glob) = GlobBuilder::new(&pattern)
        .literal_separator(false)
        .backslash_escape(true)
        .build()
    else {
        return Ok(RespValue::Array(Vec::new()));
    };
    let matcher = glob.compile_matcher();

    let mut matches = store
        .keys()
        .filter(|key| matcher.is_match(lossy(key)))
        .cloned()
        .collect::<Vec<_>>();
    matches.sort();

    Ok(RespValue::Array(matches.into_iter().map(RespValue::BulkString).collect()))
}

/// Moves the value and its expiry to the new name, replacing anything there.
pub fn rename(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let (source, destination) = (&arguments[0], &arguments[1]);

    let entry = store.remove(source).ok_or(CommandError::NoSuchKey)?;
    store.insert(destination.clone(), entry);

    Ok(RespValue::ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExpireCondition {
    Always,
    NoExpiry,
    HasExpiry,
    GreaterThan,
    LessThan,
}

struct ExpireArguments {
    key: Bytes,
    ttl_ms: i64,
    condition: ExpireCondition,
}

impl ExpireArguments {
    fn parse(arguments: &[Bytes], unit_ms: i64) -> Result<Self, CommandError> {
        let ttl_ms = parse_integer(&arguments[1])?
            .checked_mul(unit_ms)
            .ok_or(CommandError::InvalidExpireTime(if unit_ms == 1 { "pexpire" } else { "expire" }))?;

        let mut condition = ExpireCondition::Always;
        for option in &arguments[2..] {
            let next = match keyword(option).as_str() {
                "NX" => ExpireCondition::NoExpiry,
                "XX" => ExpireCondition::HasExpiry,
                "GT" => ExpireCondition::GreaterThan,
                "LT" => ExpireCondition::LessThan,
                other => return Err(CommandError::UnrecognizedOption(other.to_lowercase())),
            };
            if condition != ExpireCondition::Always && condition != next {
                return Err(CommandError::Syntax);
            }
            condition = next;
        }

        Ok(Self {
            key: arguments[0].clone(),
            ttl_ms,
            condition,
        })
    }
}

fn expire_with_unit(
    store: &mut DataStore,
    arguments: &[Bytes],
    unit_ms: i64,
) -> Result<RespValue, CommandError> {
    let expire_arguments = ExpireArguments::parse(arguments, unit_ms)?;

    let Some(current) = store.time_to_live(&expire_arguments.key) else {
        return Ok(RespValue::Integer(0));
    };

    let requested = Duration::from_millis(expire_arguments.ttl_ms.max(0) as u64);
    let allowed = match (expire_arguments.condition, current) {
        (ExpireCondition::Always, _) => true,
        (ExpireCondition::NoExpiry, current) => current.is_none(),
        (ExpireCondition::HasExpiry, current) => current.is_some(),
        // a key without a deadline counts as living forever
        (ExpireCondition::GreaterThan, Some(current)) => requested > current,
        (ExpireCondition::GreaterThan, None) => false,
        (ExpireCondition::LessThan, Some(current)) => requested < current,
        (ExpireCondition::LessThan, None) => true,
    };

    if !allowed {
        return Ok(RespValue::Integer(0));
    }

    if expire_arguments.ttl_ms <= 0 {
        store.remove(&expire_arguments.key);
    } else {
        let deadline = Instant::now().checked_add(requested).ok_or(
            CommandError::InvalidExpireTime(if unit_ms == 1 { "pexpire" } else { "expire" }),
        )?;
        store.set_expiry(&expire_arguments.key, Some(deadline));
    }

    Ok(RespValue::Integer(1))
}

pub fn expire(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    expire_with_unit(store, arguments, 1000)
}

pub fn pexpire(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    expire_with_unit(store, arguments, 1)
}

pub fn ttl(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    Ok(RespValue::Integer(match store.time_to_live(&arguments[0]) {
        None => -2,
        Some(None) => -1,
        Some(Some(remaining)) => ((remaining.as_millis() + 500) / 1000) as i64,
    }))
}

pub fn pttl(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    Ok(RespValue::Integer(match store.time_to_live(&arguments[0]) {
        None => -2,
        Some(None) => -1,
        Some(Some(remaining)) => remaining.as_millis() as i64,
    }))
}

pub fn persist(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let cleared = match store.get_mut(&arguments[0]) {
        Some(entry) => entry.expires_at.take().is_some(),
        None => false,
    };
    Ok(RespValue::Integer(cleared as i64))
}

/// Handles `MOVE key db`.
///
/// Replies 1 when the key was moved, 0 when it is missing in the selected
/// database or already present in the target one.
pub async fn move_key(
    stores: &DataStoreSet,
    selected: usize,
    arguments: &[Bytes],
) -> Result<RespValue, CommandError> {
    let target = parse_integer(&arguments[1])?;
    let target = usize::try_from(target).map_err(|_| CommandError::DatabaseOutOfRange)?;
    if target >= stores.store_count() {
        return Err(CommandError::DatabaseOutOfRange);
    }
    if target == selected {
        return Err(CommandError::SameObject);
    }

    let key = &arguments[0];
    let (mut source, mut destination) = stores.lock_pair(selected, target).await?;

    if destination.contains_key(key) {
        return Ok(RespValue::Integer(0));
    }
    let Some(entry) = source.remove(key) else {
        return Ok(RespValue::Integer(0));
    };
    destination.insert(key.clone(), entry);

    Ok(RespValue::Integer(1))
}
