//! Command handlers, grouped by the kind of data they touch.
//!
//! Most handlers act on the caller's selected store and are plain
//! functions over a locked [`DataStore`]. The rest need the session, the
//! catalog or more than one store and are called from [`execute`] directly.

mod command_error;
mod connection;
mod hashes;
mod keys;
mod lists;
mod server;
mod sets;
mod sorted_sets;
mod strings;

use bytes::Bytes;

use crate::{
    catalog::Catalog,
    keyspace::{DataStore, DataStoreSet},
    resp::RespValue,
    session::ClientSession,
};

pub use command_error::CommandError;

/// Everything a handler may reach while serving one request.
pub struct CommandContext<'a> {
    pub session: &'a mut ClientSession,
    pub stores: &'a DataStoreSet,
    pub catalog: &'a Catalog,
}

pub type StoreHandler = fn(&mut DataStore, &[Bytes]) -> Result<RespValue, CommandError>;

/// Handlers that run under the lock of the selected store.
fn store_handler(command: &str) -> Option<StoreHandler> {
    let handler: StoreHandler = match command {
        "dbsize" => server::dbsize,
        "flushdb" => server::flushdb,

        "del" => keys::del,
        "exists" => keys::exists,
        "type" => keys::type_command,
        "keys" => keys::keys,
        "rename" => keys::rename,
        "expire" => keys::expire,
        "pexpire" => keys::pexpire,
        "ttl" => keys::ttl,
        "pttl" => keys::pttl,
        "persist" => keys::persist,

        "get" => strings::get,
        "set" => strings::set,
        "getdel" => strings::getdel,
        "append" => strings::append,
        "strlen" => strings::strlen,
        "incr" => strings::incr,
        "decr" => strings::decr,
        "incrby" => strings::incrby,
        "decrby" => strings::decrby,
        "mget" => strings::mget,
        "mset" => strings::mset,

        "lpush" => lists::lpush,
        "rpush" => lists::rpush,
        "lpop" => lists::lpop,
        "rpop" => lists::rpop,
        "llen" => lists::llen,
        "lrange" => lists::lrange,
        "lindex" => lists::lindex,

        "hset" => hashes::hset,
        "hget" => hashes::hget,
        "hdel" => hashes::hdel,
        "hgetall" => hashes::hgetall,
        "hexists" => hashes::hexists,
        "hlen" => hashes::hlen,
        "hkeys" => hashes::hkeys,
        "hvals" => hashes::hvals,
        "hincrby" => hashes::hincrby,

        "sadd" => sets::sadd,
        "srem" => sets::srem,
        "smembers" => sets::smembers,
        "sismember" => sets::sismember,
        "scard" => sets::scard,

        "zadd" => sorted_sets::zadd,
        "zrem" => sorted_sets::zrem,
        "zscore" => sorted_sets::zscore,
        "zcard" => sorted_sets::zcard,
        "zrange" => sorted_sets::zrange,
        "zrank" => sorted_sets::zrank,
        "zincrby" => sorted_sets::zincrby,

        _ => return None,
    };
    Some(handler)
}

/// Runs the handler bound to `command`, a resolved lower-case catalog name.
///
/// `arguments` excludes the command word, and for subcommands the
/// subcommand word as well. Arity has already been checked.
pub async fn execute(
    command: &str,
    arguments: &[Bytes],
    context: &mut CommandContext<'_>,
) -> Result<RespValue, CommandError> {
    if let Some(handler) = store_handler(command) {
        let mut store = context.stores.lock(context.session.database).await?;
        return handler(&mut store, arguments);
    }

    match command {
        "ping" => connection::ping(arguments),
        "echo" => connection::echo(arguments),
        "select" => connection::select(context.session, context.stores.store_count(), arguments),
        "quit" => connection::quit(context.session),
        "client|id" => connection::client_id(context.session),
        "client|setname" => connection::client_setname(context.session, arguments),
        "client|getname" => connection::client_getname(context.session),
        "client|setinfo" => connection::client_setinfo(context.session, arguments),
        "client|info" => connection::client_info(context.session),

        "command" => server::command(context.catalog),
        "command|count" => server::command_count(context.catalog),
        "command|list" => server::command_list(context.catalog, arguments),
        "command|info" => server::command_info(context.catalog, arguments),
        "command|docs" => server::command_docs(context.catalog, arguments),
        "flushall" => server::flushall(context.stores, arguments).await,
        "save" => server::save(context.stores).await,
        "swapdb" => server::swapdb(context.stores, arguments).await,
        "time" => server::time(),

        "move" => keys::move_key(context.stores, context.session.database, arguments).await,

        // declared in the catalog but without a handler
        _ => Err(CommandError::UnknownCommand {
            name: command.to_string(),
            arguments: Vec::new(),
        }),
    }
}
