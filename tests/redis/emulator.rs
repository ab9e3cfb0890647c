use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use redis_emu::{
    hook::{DispatchHook, HookContext},
    resp::RespValue,
    EmulatorError, RedisEmulator,
};
use tokio::time::timeout;

use crate::test_utils::{TestEnv, TestUtils};

#[tokio::test]
async fn test_set_get_over_tcp() {
    let env = TestEnv::start().await;
    let mut client = env.connect().await;

    client.write(b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n").await;
    assert_eq!(client.read_reply().await, Some(RespValue::ok()));

    assert_eq!(client.send(TestUtils::get("foo")).await.encode(), b"$3\r\nbar\r\n".to_vec());
    assert_eq!(client.send(TestUtils::get("missing")).await.encode(), b"$-1\r\n".to_vec());

    let unknown = client.exec(&["NOPE"]).await;
    assert!(matches!(unknown, RespValue::Error(message) if message.starts_with("ERR unknown command 'NOPE'")));

    env.emulator.close().await;
}

#[tokio::test]
async fn test_pipelined_requests_are_answered_in_order() {
    let env = TestEnv::start().await;
    let mut client = env.connect().await;

    let mut pipeline = Vec::new();
    pipeline.extend(TestUtils::incr("n").encode());
    pipeline.extend(TestUtils::incr("n").encode());
    pipeline.extend(TestUtils::command(&["PING"]).encode());
    pipeline.extend(TestUtils::get("n").encode());
    client.write(&pipeline).await;

    assert_eq!(client.read_reply().await, Some(RespValue::Integer(1)));
    assert_eq!(client.read_reply().await, Some(RespValue::Integer(2)));
    assert_eq!(client.read_reply().await, Some(RespValue::simple("PONG")));
    assert_eq!(client.read_reply().await, Some(TestUtils::bulk("2")));

    env.emulator.close().await;
}

#[tokio::test]
async fn test_request_split_across_writes() {
    let env = TestEnv::start().await;
    let mut client = env.connect().await;

    let request = TestUtils::command(&["ECHO", "hello"]).encode();
    let (head, tail) = request.split_at(7);
    client.write(head).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.write(tail).await;

    assert_eq!(client.read_reply().await, Some(TestUtils::bulk("hello")));

    env.emulator.close().await;
}

#[tokio::test]
async fn test_quit_closes_after_reply() {
    let env = TestEnv::start().await;
    let mut client = env.connect().await;

    let mut pipeline = TestUtils::command(&["QUIT"]).encode();
    pipeline.extend(TestUtils::command(&["PING"]).encode());
    client.write(&pipeline).await;

    assert_eq!(client.read_reply().await, Some(RespValue::ok()));
    assert!(client.is_closed().await);

    env.emulator.close().await;
}

#[tokio::test]
async fn test_corrupted_framing_closes_connection() {
    let env = TestEnv::start().await;
    let mut client = env.connect().await;

    client.write(b"!garbage\r\n").await;

    match client.read_reply().await {
        Some(RespValue::Error(message)) => assert!(message.starts_with("ERR Protocol error")),
        other => panic!("expected a protocol error, got {:?}", other),
    }
    assert!(client.is_closed().await);

    let mut fresh = env.connect().await;
    assert_eq!(fresh.exec(&["PING"]).await, RespValue::simple("PONG"));

    env.emulator.close().await;
}

#[tokio::test]
async fn test_sessions_are_per_connection() {
    let env = TestEnv::start().await;
    let mut first = env.connect().await;
    let mut second = env.connect().await;

    first.send(TestUtils::select(2)).await;
    first.send(TestUtils::set("k", "two")).await;
    assert_eq!(second.send(TestUtils::get("k")).await, RespValue::Null);

    first.exec(&["CLIENT", "SETNAME", "first"]).await;
    assert_eq!(first.exec(&["CLIENT", "GETNAME"]).await, TestUtils::bulk("first"));
    assert_eq!(second.exec(&["CLIENT", "GETNAME"]).await, RespValue::Null);

    let first_id = first.exec(&["CLIENT", "ID"]).await;
    let second_id = second.exec(&["CLIENT", "ID"]).await;
    assert_ne!(first_id, second_id);

    env.emulator.close().await;
}

#[tokio::test]
async fn test_termination_is_idempotent() {
    let env = TestEnv::start().await;
    let mut client = env.connect().await;
    assert_eq!(client.exec(&["PING"]).await, RespValue::simple("PONG"));

    env.emulator.request_termination();
    timeout(Duration::from_secs(5), env.emulator.wait_for_termination())
        .await
        .expect("workers exit");

    env.emulator.request_termination();
    timeout(Duration::from_millis(100), env.emulator.wait_for_termination())
        .await
        .expect("second wait returns at once");

    assert!(client.is_closed().await);
    assert!(tokio::net::TcpStream::connect(env.addr).await.is_err());
}

#[tokio::test]
async fn test_termination_before_start_is_harmless() {
    let emulator = RedisEmulator::new(TestEnv::config());

    emulator.request_termination();
    emulator.wait_for_termination().await;
    assert!(emulator.local_addr().is_none());
}

#[tokio::test]
async fn test_start_twice_fails() {
    let env = TestEnv::start().await;

    assert!(matches!(env.emulator.start().await, Err(EmulatorError::AlreadyStarted)));

    env.emulator.close().await;
}

#[tokio::test]
async fn test_bind_failure_is_reported() {
    let env = TestEnv::start().await;
    let clash = RedisEmulator::new(redis_emu::EmulatorConfig {
        port: env.addr.port(),
        ..TestEnv::config()
    });

    assert!(matches!(clash.start().await, Err(EmulatorError::Bind { .. })));

    env.emulator.close().await;
}

#[tokio::test]
async fn test_control_surface_reports_endpoint() {
    let env = TestEnv::start().await;

    assert_eq!(env.emulator.local_addr(), Some(env.addr));
    assert_eq!(env.emulator.port(), env.addr.port());
    assert_ne!(env.emulator.port(), 0);
    assert_eq!(env.emulator.net_interface(), "127.0.0.1");

    env.emulator.close().await;
}

#[tokio::test]
async fn test_client_setinfo_can_be_disabled() {
    let emulator = RedisEmulator::new(TestEnv::config());
    emulator.disable_client_set_info();
    let addr = emulator.start().await.unwrap();
    let env = TestEnv { emulator, addr };
    let mut client = env.connect().await;

    let reply = client.exec(&["CLIENT", "SETINFO", "LIB-NAME", "redis-rs"]).await;
    assert!(matches!(reply, RespValue::Error(message) if message.starts_with("ERR unknown command")));
    assert_eq!(client.exec(&["CLIENT", "SETNAME", "ok"]).await, RespValue::ok());

    env.emulator.disable_command("ECHO");
    assert!(client.exec(&["ECHO", "x"]).await.is_error());

    env.emulator.close().await;
}

#[tokio::test]
async fn test_client_setinfo_enabled_by_default() {
    let env = TestEnv::start().await;
    let mut client = env.connect().await;

    assert_eq!(
        client.exec(&["CLIENT", "SETINFO", "LIB-NAME", "redis-rs"]).await,
        RespValue::ok()
    );
    let info = client.exec(&["CLIENT", "INFO"]).await;
    assert!(info.as_str().unwrap().contains("lib-name=redis-rs"));

    env.emulator.close().await;
}

struct CountingHook(AtomicUsize);

impl DispatchHook for CountingHook {
    fn after(&self, _context: &HookContext<'_>, _reply: &RespValue) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_hook_observes_network_requests() {
    let env = TestEnv::start().await;
    let hook = Arc::new(CountingHook(AtomicUsize::new(0)));
    env.emulator.set_hook(hook.clone()).await;
    let mut client = env.connect().await;

    client.exec(&["PING"]).await;
    client.send(TestUtils::set("a", "b")).await;
    assert_eq!(hook.0.load(Ordering::SeqCst), 2);

    env.emulator.clear_hook().await;
    client.exec(&["PING"]).await;
    assert_eq!(hook.0.load(Ordering::SeqCst), 2);

    env.emulator.close().await;
}
