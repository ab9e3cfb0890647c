use bytes::Bytes;

use crate::{
    command_utils::{format_float, keyword, parse_float, parse_integer, resolve_range},
    commands::CommandError,
    keyspace::{DataStore, DataValue},
    resp::RespValue,
};

fn score_reply(score: f64) -> RespValue {
    RespValue::bulk(format_float(score))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Existence {
    Any,
    OnlyNew,
    OnlyExisting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Any,
    Greater,
    Less,
}

/// Parsed `ZADD key [NX | XX] [GT | LT] [CH] [INCR] score member [score member ...]`.
#[derive(Debug, PartialEq)]
struct ZaddArguments {
    key: Bytes,
    existence: Existence,
    comparison: Comparison,
    count_changed: bool,
    increment: bool,
    members: Vec<(f64, Bytes)>,
}

impl ZaddArguments {
    fn parse(arguments: &[Bytes]) -> Result<Self, CommandError> {
        let key = arguments[0].clone();
        let mut existence = Existence::Any;
        let mut comparison = Comparison::Any;
        let mut count_changed = false;
        let mut increment = false;

        let mut rest = &arguments[1..];
        while let Some(option) = rest.first() {
            match keyword(option).as_str() {
                "NX" => existence = Existence::OnlyNew,
                "XX" => existence = Existence::OnlyExisting,
                "GT" => comparison = Comparison::Greater,
                "LT" => comparison = Comparison::Less,
                "CH" => count_changed = true,
                "INCR" => increment = true,
                _ => break,
            }
            rest = &rest[1..];
        }

        if rest.is_empty() || rest.len() % 2 != 0 {
            return Err(CommandError::Syntax);
        }
        if existence == Existence::OnlyNew && comparison != Comparison::Any {
            return Err(CommandError::Syntax);
        }
        if increment && rest.len() != 2 {
            return Err(CommandError::Syntax);
        }

        let members = rest
            .chunks_exact(2)
            .map(|pair| Ok((parse_float(&pair[0])?, pair[1].clone())))
            .collect::<Result<Vec<_>, CommandError>>()?;

        Ok(Self {
            key,
            existence,
            comparison,
            count_changed,
            increment,
            members,
        })
    }
}

/// Handles ZADD.
///
/// Replies with the number of new members (or of changed members with
/// `CH`). With `INCR` it behaves like ZINCRBY and replies with the new
/// score, or null when a condition blocked the update.
pub fn zadd(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let zadd_arguments = ZaddArguments::parse(arguments)?;
    let key = zadd_arguments.key.clone();

    let zset = store.typed_or_insert(key.clone(), DataValue::new_sorted_set, DataValue::as_sorted_set_mut)?;

    let mut added = 0;
    let mut changed = 0;
    let mut last_score = None;

    for (score, member) in zadd_arguments.members {
        let current = zset.score(&member);

        let allowed = match (zadd_arguments.existence, current) {
            (Existence::OnlyNew, Some(_)) | (Existence::OnlyExisting, None) => false,
            _ => true,
        };
        if !allowed {
            continue;
        }

        let score = match (zadd_arguments.increment, current) {
            (true, Some(current)) => current + score,
            _ => score,
        };
        if score.is_nan() {
            store.remove_if_empty(&key);
            return Err(CommandError::ScoreNotANumber);
        }

        let passes = match (zadd_arguments.comparison, current) {
            (Comparison::Greater, Some(current)) => score > current,
            (Comparison::Less, Some(current)) => score < current,
            _ => true,
        };
        if !passes {
            continue;
        }

        if current != Some(score) {
            if zset.insert(member, score) {
                added += 1;
            }
            changed += 1;
        }
        last_score = Some(score);
    }

    store.remove_if_empty(&key);

    if zadd_arguments.increment {
        return Ok(last_score.map_or(RespValue::Null, score_reply));
    }
    Ok(RespValue::Integer(if zadd_arguments.count_changed { changed } else { added }))
}

pub fn zrem(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let key = &arguments[0];
    let Some(zset) = store.typed_mut(key, DataValue::as_sorted_set_mut)? else {
        return Ok(RespValue::Integer(0));
    };

    let removed = arguments[1..]
        .iter()
        .filter(|member| zset.remove(member))
        .count();

    store.remove_if_empty(key);
    Ok(RespValue::Integer(removed as i64))
}

pub fn zscore(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let score = store
        .typed(&arguments[0], DataValue::as_sorted_set)?
        .and_then(|zset| zset.score(&arguments[1]));
    Ok(score.map_or(RespValue::Null, score_reply))
}

pub fn zcard(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let length = store
        .typed(&arguments[0], DataValue::as_sorted_set)?
        .map_or(0, |zset| zset.len());
    Ok(RespValue::Integer(length as i64))
}

/// Handles `ZRANGE key start stop [REV] [WITHSCORES]` over ranks.
pub fn zrange(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let start = parse_integer(&arguments[1])?;
    let stop = parse_integer(&arguments[2])?;

    let mut with_scores = false;
    let mut reverse = false;
    for option in &arguments[3..] {
        match keyword(option).as_str() {
            "WITHSCORES" => with_scores = true,
            "REV" => reverse = true,
            _ => return Err(CommandError::Syntax),
        }
    }

    let Some(zset) = store.typed(&arguments[0], DataValue::as_sorted_set)? else {
        return Ok(RespValue::Array(Vec::new()));
    };
    let Some((start, stop)) = resolve_range(zset.len(), start, stop) else {
        return Ok(RespValue::Array(Vec::new()));
    };

    let members: Box<dyn Iterator<Item = (&Bytes, f64)> + '_> = if reverse {
        Box::new(zset.iter().rev())
    } else {
        Box::new(zset.iter())
    };

    let mut reply = Vec::new();
    for (member, score) in members.skip(start).take(stop - start + 1) {
        reply.push(RespValue::BulkString(member.clone()));
        if with_scores {
            reply.push(score_reply(score));
        }
    }

    Ok(RespValue::Array(reply))
}

pub fn zrank(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let rank = store
        .typed(&arguments[0], DataValue::as_sorted_set)?
        .and_then(|zset| zset.rank(&arguments[1]));
    Ok(rank.map_or(RespValue::Null, |rank| RespValue::Integer(rank as i64)))
}

pub fn zincrby(store: &mut DataStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let (key, member) = (&arguments[0], &arguments[2]);
    let delta = parse_float(&arguments[1])?;

    let zset = store.typed_or_insert(key.clone(), DataValue::new_sorted_set, DataValue::as_sorted_set_mut)?;
    let score = zset.score(member).unwrap_or(0.0) + delta;
    if score.is_nan() {
        store.remove_if_empty(key);
        return Err(CommandError::ScoreNotANumber);
    }
    zset.insert(member.clone(), score);

    Ok(score_reply(score))
}
