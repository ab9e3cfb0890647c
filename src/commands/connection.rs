use bytes::Bytes;

use crate::{
    command_utils::{keyword, lossy, parse_integer},
    commands::CommandError,
    resp::RespValue,
    session::ClientSession,
};

pub fn ping(arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    match arguments {
        [] => Ok(RespValue::simple("PONG")),
        [message] => Ok(RespValue::BulkString(message.clone())),
        _ => Err(CommandError::WrongArity("ping".to_string())),
    }
}

pub fn echo(arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    Ok(RespValue::BulkString(arguments[0].clone()))
}

pub fn select(
    session: &mut ClientSession,
    store_count: usize,
    arguments: &[Bytes],
) -> Result<RespValue, CommandError> {
    let index = parse_integer(&arguments[0])?;
    let index = usize::try_from(index)
        .ok()
        .filter(|index| *index < store_count)
        .ok_or(CommandError::DatabaseOutOfRange)?;

    session.database = index;
    Ok(RespValue::ok())
}

/// Replies `+OK`; the connection closes once the reply is flushed.
pub fn quit(session: &mut ClientSession) -> Result<RespValue, CommandError> {
    session.request_quit();
    Ok(RespValue::ok())
}

pub fn client_id(session: &ClientSession) -> Result<RespValue, CommandError> {
    Ok(RespValue::Integer(session.id as i64))
}

/// Names and library attributes may only hold printable ASCII without spaces.
fn valid_attribute(value: &[u8]) -> bool {
    value.iter().all(|byte| (b'!'..=b'~').contains(byte))
}

pub fn client_setname(
    session: &mut ClientSession,
    arguments: &[Bytes],
) -> Result<RespValue, CommandError> {
    let name = &arguments[0];
    if !valid_attribute(name) {
        return Err(CommandError::InvalidClientName);
    }

    session.name = (!name.is_empty()).then(|| lossy(name));
    Ok(RespValue::ok())
}

pub fn client_getname(session: &ClientSession) -> Result<RespValue, CommandError> {
    Ok(match &session.name {
        Some(name) => RespValue::bulk(name.clone()),
        None => RespValue::Null,
    })
}

/// Handles `CLIENT SETINFO LIB-NAME name` and `CLIENT SETINFO LIB-VER version`.
pub fn client_setinfo(
    session: &mut ClientSession,
    arguments: &[Bytes],
) -> Result<RespValue, CommandError> {
    let (attribute, value) = (&arguments[0], &arguments[1]);

    let slot = match keyword(attribute).as_str() {
        "LIB-NAME" => &mut session.library_name,
        "LIB-VER" => &mut session.library_version,
        _ => return Err(CommandError::UnrecognizedOption(lossy(attribute))),
    };

    if !valid_attribute(value) {
        return Err(CommandError::InvalidAttribute(
            keyword(attribute).to_lowercase(),
        ));
    }

    *slot = (!value.is_empty()).then(|| lossy(value));
    Ok(RespValue::ok())
}

pub fn client_info(session: &ClientSession) -> Result<RespValue, CommandError> {
    Ok(RespValue::bulk(session.info_line()))
}
