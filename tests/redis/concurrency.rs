use std::{sync::Arc, time::Duration};

use redis_emu::{keyspace::DataStoreSet, resp::RespValue, session::ClientSession};
use tokio::time::timeout;

use crate::test_utils::TestUtils;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_incr_is_serializable() {
    let dispatcher = TestUtils::dispatcher();

    let tasks = (0..8)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                let mut session = ClientSession::new(None);
                for _ in 0..100 {
                    let reply = dispatcher.dispatch(&mut session, TestUtils::incr("counter")).await;
                    assert!(reply.as_integer().is_some());
                }
            })
        })
        .collect::<Vec<_>>();
    for task in tasks {
        task.await.unwrap();
    }

    let mut session = ClientSession::new(None);
    assert_eq!(
        dispatcher.dispatch(&mut session, TestUtils::get("counter")).await,
        TestUtils::bulk("800")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_different_stores_do_not_contend() {
    let stores = Arc::new(DataStoreSet::in_memory(16));
    let dispatcher = TestUtils::dispatcher_over(Arc::clone(&stores));

    let held = stores.lock(0).await.unwrap();

    let mut other = ClientSession::new(None);
    dispatcher.dispatch(&mut other, TestUtils::select(1)).await;
    let reply = timeout(
        Duration::from_secs(2),
        dispatcher.dispatch(&mut other, TestUtils::set("k", "v")),
    )
    .await
    .expect("store 1 is not blocked by store 0");
    assert_eq!(reply, RespValue::ok());

    let mut blocked = ClientSession::new(None);
    let waited = timeout(
        Duration::from_millis(100),
        dispatcher.dispatch(&mut blocked, TestUtils::set("k", "v")),
    )
    .await;
    assert!(waited.is_err(), "store 0 is held");

    drop(held);
    assert_eq!(
        dispatcher.dispatch(&mut blocked, TestUtils::set("k", "v")).await,
        RespValue::ok()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposing_swaps_do_not_deadlock() {
    let dispatcher = TestUtils::dispatcher();
    let mut session = ClientSession::new(None);
    TestUtils::run(&dispatcher, &mut session, &["SET", "marker", "zero"]).await;

    let tasks = (0..16)
        .map(|task| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                let mut session = ClientSession::new(None);
                let (a, b) = if task % 2 == 0 { ("0", "1") } else { ("1", "0") };
                for _ in 0..50 {
                    let reply = TestUtils::run(&dispatcher, &mut session, &["SWAPDB", a, b]).await;
                    assert_eq!(reply, RespValue::ok());
                }
            })
        })
        .collect::<Vec<_>>();

    timeout(Duration::from_secs(10), async {
        for task in tasks {
            task.await.unwrap();
        }
    })
    .await
    .expect("swaps finish");

    // 800 swaps: the marker is back in store 0
    assert_eq!(
        TestUtils::run(&dispatcher, &mut session, &["GET", "marker"]).await,
        TestUtils::bulk("zero")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_flushall_waits_for_every_store() {
    let stores = Arc::new(DataStoreSet::in_memory(4));
    let dispatcher = TestUtils::dispatcher_over(Arc::clone(&stores));
    let mut session = ClientSession::new(None);
    TestUtils::run(&dispatcher, &mut session, &["SET", "k", "v"]).await;

    let held = stores.lock(3).await.unwrap();
    let flush = timeout(
        Duration::from_millis(100),
        TestUtils::run(&dispatcher, &mut session, &["FLUSHALL"]),
    )
    .await;
    assert!(flush.is_err());

    drop(held);
    assert_eq!(TestUtils::run(&dispatcher, &mut session, &["FLUSHALL"]).await, RespValue::ok());
    assert_eq!(TestUtils::run(&dispatcher, &mut session, &["DBSIZE"]).await, RespValue::Integer(0));
}
