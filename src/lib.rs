//! A Redis-protocol emulator for testing client libraries.
//!
//! The emulator speaks RESP2 over TCP and keeps its data in memory:
//!
//! - Strings, lists, hashes, sets and sorted sets with key expiry
//! - A fixed number of databases selectable per connection
//! - Introspection through `COMMAND INFO`/`COMMAND DOCS`, driven by an
//!   embedded command catalog
//! - Optional snapshots to disk, saved periodically and on shutdown
//! - Runtime disabling of commands and a hook around every dispatch
//!
//! [`RedisEmulator`] is the entry point; the `redis-emu` binary wraps it
//! with command-line configuration.

pub mod catalog;
pub mod command_utils;
pub mod commands;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod emulator;
pub mod hook;
pub mod keyspace;
pub mod resp;
pub mod session;

pub use emulator::{EmulatorConfig, EmulatorError, RedisEmulator};
pub use hook::{DispatchHook, HookContext};
pub use resp::RespValue;
