use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use redis_emu::{
    hook::{DispatchHook, HookContext},
    resp::RespValue,
    session::ClientSession,
};

use crate::test_utils::TestUtils;

/// Counts hook callbacks and optionally answers `bypass_command` itself
#[derive(Default)]
struct RecordingHook {
    before: AtomicUsize,
    after: Mutex<Vec<(String, RespValue)>>,
    bypass_command: Option<&'static str>,
}

impl DispatchHook for RecordingHook {
    fn before(&self, context: &HookContext<'_>) -> Option<RespValue> {
        self.before.fetch_add(1, Ordering::SeqCst);
        match self.bypass_command {
            Some(command) if command == context.command => Some(RespValue::simple("BYPASSED")),
            _ => None,
        }
    }

    fn after(&self, context: &HookContext<'_>, reply: &RespValue) {
        self.after
            .lock()
            .unwrap()
            .push((context.command.to_string(), reply.clone()));
    }
}

#[tokio::test]
async fn test_set_then_get() {
    let dispatcher = TestUtils::dispatcher();
    let mut session = ClientSession::new(None);

    assert_eq!(TestUtils::run(&dispatcher, &mut session, &["SET", "foo", "bar"]).await, RespValue::ok());
    assert_eq!(TestUtils::run(&dispatcher, &mut session, &["get", "foo"]).await, TestUtils::bulk("bar"));
    assert_eq!(TestUtils::run(&dispatcher, &mut session, &["GET", "missing"]).await, RespValue::Null);
}

#[tokio::test]
async fn test_unknown_command_lists_arguments() {
    let dispatcher = TestUtils::dispatcher();
    let mut session = ClientSession::new(None);

    assert_eq!(
        TestUtils::run(&dispatcher, &mut session, &["FOO", "a", "b"]).await,
        RespValue::error("ERR unknown command 'FOO', with args beginning with: 'a' 'b' ")
    );
}

#[tokio::test]
async fn test_echoed_names_stay_on_one_line() {
    let dispatcher = TestUtils::dispatcher();
    let mut session = ClientSession::new(None);

    let reply = TestUtils::run(&dispatcher, &mut session, &["FOO\r\n+OK", "x\ny"]).await;

    let RespValue::Error(message) = &reply else {
        panic!("expected an error, got {:?}", reply);
    };
    assert!(!message.contains(['\r', '\n']), "{:?}", message);
    assert_eq!(reply.encode().iter().filter(|&&byte| byte == b'\n').count(), 1);
}

#[tokio::test]
async fn test_arity_is_checked_before_the_hook() {
    let dispatcher = TestUtils::dispatcher();
    let hook = Arc::new(RecordingHook::default());
    dispatcher.stores().hook().set(hook.clone()).await;
    let mut session = ClientSession::new(None);

    let expected = RespValue::error("ERR wrong number of arguments for 'get' command");
    assert_eq!(TestUtils::run(&dispatcher, &mut session, &["GET"]).await, expected);
    assert_eq!(TestUtils::run(&dispatcher, &mut session, &["GET", "a", "b"]).await, expected);
    assert_eq!(
        TestUtils::run(&dispatcher, &mut session, &["CLIENT", "SETINFO", "lib-name"]).await,
        RespValue::error("ERR wrong number of arguments for 'client|setinfo' command")
    );

    assert_eq!(hook.before.load(Ordering::SeqCst), 0);
    assert!(hook.after.lock().unwrap().is_empty());

    TestUtils::run(&dispatcher, &mut session, &["GET", "a"]).await;
    assert_eq!(hook.before.load(Ordering::SeqCst), 1);
    assert_eq!(
        hook.after.lock().unwrap().as_slice(),
        &[("get".to_string(), RespValue::Null)]
    );
}

#[tokio::test]
async fn test_hook_can_bypass_execution() {
    let dispatcher = TestUtils::dispatcher();
    let hook = Arc::new(RecordingHook {
        bypass_command: Some("set"),
        ..RecordingHook::default()
    });
    dispatcher.stores().hook().set(hook.clone()).await;
    let mut session = ClientSession::new(None);

    assert_eq!(
        TestUtils::run(&dispatcher, &mut session, &["SET", "k", "v"]).await,
        RespValue::simple("BYPASSED")
    );
    assert_eq!(TestUtils::run(&dispatcher, &mut session, &["GET", "k"]).await, RespValue::Null);
    assert!(!dispatcher.stores().is_dirty());

    let after = hook.after.lock().unwrap();
    assert_eq!(after[0], ("set".to_string(), RespValue::simple("BYPASSED")));

    drop(after);
    dispatcher.stores().hook().clear().await;
    assert_eq!(
        TestUtils::run(&dispatcher, &mut session, &["SET", "k", "v"]).await,
        RespValue::ok()
    );
}

#[tokio::test]
async fn test_disabled_command_is_unknown() {
    let dispatcher = TestUtils::dispatcher();
    let mut session = ClientSession::new(None);
    TestUtils::run(&dispatcher, &mut session, &["SET", "k", "v"]).await;

    dispatcher.catalog().disable("get");

    assert_eq!(
        TestUtils::run(&dispatcher, &mut session, &["GET", "k"]).await,
        RespValue::error("ERR unknown command 'GET', with args beginning with: 'k' ")
    );
    assert_eq!(
        TestUtils::run(&dispatcher, &mut session, &["COMMAND", "INFO", "get"]).await,
        RespValue::Array(vec![RespValue::Null])
    );
}

#[tokio::test]
async fn test_disabled_subcommand_is_unknown() {
    let dispatcher = TestUtils::dispatcher();
    let mut session = ClientSession::new(None);

    dispatcher.catalog().disable("client|setinfo");

    assert_eq!(
        TestUtils::run(&dispatcher, &mut session, &["CLIENT", "SETINFO", "LIB-NAME", "x"]).await,
        RespValue::error(
            "ERR unknown command 'CLIENT', with args beginning with: 'SETINFO' 'LIB-NAME' 'x' "
        )
    );
    assert_eq!(
        TestUtils::run(&dispatcher, &mut session, &["CLIENT", "ID"]).await,
        RespValue::Integer(session.id as i64)
    );
}

#[tokio::test]
async fn test_unknown_subcommand() {
    let dispatcher = TestUtils::dispatcher();
    let mut session = ClientSession::new(None);

    assert_eq!(
        TestUtils::run(&dispatcher, &mut session, &["client", "Bogus"]).await,
        RespValue::error("ERR unknown subcommand 'Bogus'. Try CLIENT HELP.")
    );
}

#[tokio::test]
async fn test_non_bulk_requests_are_protocol_errors() {
    let dispatcher = TestUtils::dispatcher();
    let mut session = ClientSession::new(None);
    let expected = RespValue::error("ERR Protocol error: expected an array of bulk strings");

    for request in [
        RespValue::simple("PING"),
        RespValue::Array(vec![]),
        RespValue::Array(vec![TestUtils::bulk("GET"), RespValue::Integer(1)]),
        RespValue::NullArray,
    ] {
        assert_eq!(dispatcher.dispatch(&mut session, request).await, expected);
    }
}

#[tokio::test]
async fn test_type_mismatch() {
    let dispatcher = TestUtils::dispatcher();
    let mut session = ClientSession::new(None);

    TestUtils::run(&dispatcher, &mut session, &["LPUSH", "list", "a"]).await;

    assert_eq!(
        TestUtils::run(&dispatcher, &mut session, &["GET", "list"]).await,
        RespValue::error("WRONGTYPE Operation against a key holding the wrong kind of value")
    );
}

#[tokio::test]
async fn test_select_switches_store() {
    let dispatcher = TestUtils::dispatcher();
    let mut session = ClientSession::new(None);

    TestUtils::run(&dispatcher, &mut session, &["SET", "k", "zero"]).await;
    assert_eq!(dispatcher.dispatch(&mut session, TestUtils::select(1)).await, RespValue::ok());
    assert_eq!(TestUtils::run(&dispatcher, &mut session, &["GET", "k"]).await, RespValue::Null);
    assert_eq!(
        TestUtils::run(&dispatcher, &mut session, &["SELECT", "16"]).await,
        RespValue::error("ERR DB index is out of range")
    );
    assert_eq!(session.database, 1);

    TestUtils::run(&dispatcher, &mut session, &["SET", "other", "one"]).await;
    assert_eq!(
        TestUtils::run(&dispatcher, &mut session, &["MOVE", "other", "0"]).await,
        RespValue::Integer(1)
    );
    dispatcher.dispatch(&mut session, TestUtils::select(0)).await;
    assert_eq!(TestUtils::run(&dispatcher, &mut session, &["GET", "k"]).await, TestUtils::bulk("zero"));
    assert_eq!(TestUtils::run(&dispatcher, &mut session, &["GET", "other"]).await, TestUtils::bulk("one"));
}

#[tokio::test]
async fn test_only_successful_writes_mark_dirty() {
    let dispatcher = TestUtils::dispatcher();
    let mut session = ClientSession::new(None);

    TestUtils::run(&dispatcher, &mut session, &["GET", "k"]).await;
    TestUtils::run(&dispatcher, &mut session, &["INCRBY", "k", "nope"]).await;
    assert!(!dispatcher.stores().is_dirty());

    TestUtils::run(&dispatcher, &mut session, &["INCR", "k"]).await;
    assert!(dispatcher.stores().is_dirty());
}

#[tokio::test]
async fn test_command_introspection() {
    let dispatcher = TestUtils::dispatcher();
    let mut session = ClientSession::new(None);

    let count = TestUtils::run(&dispatcher, &mut session, &["COMMAND", "COUNT"]).await;
    assert_eq!(count, RespValue::Integer(dispatcher.catalog().len() as i64));

    let info = TestUtils::run(&dispatcher, &mut session, &["COMMAND", "INFO", "get", "nope"]).await;
    let entries = info.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].as_array().unwrap()[0], TestUtils::bulk("get"));
    assert_eq!(entries[0].as_array().unwrap()[1], RespValue::Integer(2));
    assert_eq!(entries[1], RespValue::Null);

    let docs = TestUtils::run(&dispatcher, &mut session, &["COMMAND", "DOCS", "get"]).await;
    let docs = docs.as_array().unwrap();
    assert_eq!(docs[0], TestUtils::bulk("get"));
    assert_eq!(docs[1].as_array().unwrap()[0], TestUtils::bulk("summary"));

    let list = TestUtils::run(
        &dispatcher,
        &mut session,
        &["COMMAND", "LIST", "FILTERBY", "PATTERN", "z*"],
    )
    .await;
    let names = list.as_array().unwrap();
    assert!(!names.is_empty());
    assert!(names.iter().all(|name| name.as_str().unwrap().starts_with('z')));
}
