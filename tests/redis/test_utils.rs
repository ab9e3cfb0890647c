use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use bytes::{Buf, BytesMut};
use redis_emu::{
    catalog::Catalog, dispatcher::CommandDispatcher, keyspace::DataStoreSet, resp::RespValue,
    session::ClientSession, EmulatorConfig, RedisEmulator,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Test utilities for building requests
pub struct TestUtils;

impl TestUtils {
    /// A request as clients send it: an array of bulk strings
    pub fn command(words: &[&str]) -> RespValue {
        RespValue::bulk_array(words.iter().map(|word| word.as_bytes().to_vec()))
    }

    pub fn set(key: &str, value: &str) -> RespValue {
        Self::command(&["SET", key, value])
    }

    pub fn get(key: &str) -> RespValue {
        Self::command(&["GET", key])
    }

    pub fn incr(key: &str) -> RespValue {
        Self::command(&["INCR", key])
    }

    pub fn select(index: usize) -> RespValue {
        Self::command(&["SELECT", &index.to_string()])
    }

    pub fn bulk(value: &str) -> RespValue {
        RespValue::bulk(value.as_bytes().to_vec())
    }

    /// Builds a dispatcher over fresh in-memory stores
    pub fn dispatcher() -> CommandDispatcher {
        Self::dispatcher_over(Arc::new(DataStoreSet::in_memory(16)))
    }

    pub fn dispatcher_over(stores: Arc<DataStoreSet>) -> CommandDispatcher {
        let catalog = Catalog::load_embedded().expect("embedded catalog loads");
        CommandDispatcher::new(Arc::new(catalog), stores)
    }

    /// Dispatches `words` and returns the reply
    pub async fn run(
        dispatcher: &CommandDispatcher,
        session: &mut ClientSession,
        words: &[&str],
    ) -> RespValue {
        dispatcher.dispatch(session, Self::command(words)).await
    }
}

/// A running emulator on an ephemeral port
pub struct TestEnv {
    pub emulator: RedisEmulator,
    pub addr: SocketAddr,
}

impl TestEnv {
    /// Starts an emulator without persistence
    pub async fn start() -> Self {
        Self::start_with(Self::config()).await
    }

    /// Starts an emulator persisting under `base_path`
    pub async fn start_persistent(base_path: &Path) -> Self {
        Self::start_with(EmulatorConfig {
            persist_path: base_path.to_path_buf(),
            ..Self::config()
        })
        .await
    }

    pub async fn start_with(config: EmulatorConfig) -> Self {
        let emulator = RedisEmulator::new(config);
        let addr = emulator.start().await.expect("emulator starts");
        Self { emulator, addr }
    }

    pub fn config() -> EmulatorConfig {
        EmulatorConfig {
            port: 0,
            interface: "127.0.0.1".to_string(),
            save_interval: Duration::from_millis(50),
            ..EmulatorConfig::default()
        }
    }

    pub async fn connect(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr)
            .await
            .expect("connects to emulator");
        TestClient {
            stream,
            buffer: BytesMut::new(),
        }
    }
}

/// One client connection speaking raw RESP
pub struct TestClient {
    stream: TcpStream,
    buffer: BytesMut,
}

impl TestClient {
    /// Sends one request and waits for its reply
    pub async fn send(&mut self, request: RespValue) -> RespValue {
        self.write(&request.encode()).await;
        self.read_reply().await.expect("reply before close")
    }

    pub async fn exec(&mut self, words: &[&str]) -> RespValue {
        self.send(TestUtils::command(words)).await
    }

    pub async fn write(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.expect("write succeeds");
    }

    /// Next reply, or `None` once the server has closed the connection
    pub async fn read_reply(&mut self) -> Option<RespValue> {
        loop {
            if let Some((value, consumed)) =
                RespValue::decode_next(&self.buffer).expect("server sends valid RESP")
            {
                self.buffer.advance(consumed);
                return Some(value);
            }

            let read = timeout(REPLY_TIMEOUT, self.stream.read_buf(&mut self.buffer))
                .await
                .expect("reply within timeout")
                .expect("read succeeds");
            if read == 0 {
                return None;
            }
        }
    }

    /// True once the server has closed its side
    pub async fn is_closed(&mut self) -> bool {
        self.read_reply().await.is_none()
    }
}
