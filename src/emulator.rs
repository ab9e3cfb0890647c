//! The emulator's control surface: start, stop and instrumentation.

use std::{
    io,
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, Mutex, OnceLock, PoisonError},
    time::Duration,
};

use thiserror::Error;
use tokio::{
    net::TcpListener,
    sync::{watch, Mutex as AsyncMutex},
    task::JoinHandle,
    time::MissedTickBehavior,
};

use crate::{
    catalog::{Catalog, CatalogError},
    connection::ClientConnection,
    dispatcher::CommandDispatcher,
    hook::{DispatchHook, HookSlot},
    keyspace::{DataStoreSet, PersistError, DEFAULT_STORE_COUNT},
};

pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_millis(1000);

/// Name under which `CLIENT SETINFO` is registered in the catalog.
pub(crate) const CLIENT_SETINFO: &str = "client|setinfo";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatorConfig {
    pub port: u16,
    /// Address to bind; empty binds every interface.
    pub interface: String,
    /// Snapshot base path; empty disables persistence.
    pub persist_path: PathBuf,
    pub databases: usize,
    pub save_interval: Duration,
    pub disabled_commands: Vec<String>,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            interface: String::new(),
            persist_path: PathBuf::new(),
            databases: DEFAULT_STORE_COUNT,
            save_interval: DEFAULT_SAVE_INTERVAL,
            disabled_commands: Vec::new(),
        }
    }
}

#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("failed to load keyspace: {0}")]
    Persist(#[from] PersistError),
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("emulator was already started")]
    AlreadyStarted,
}

/// State that exists once `start` has succeeded.
#[derive(Debug)]
struct Running {
    catalog: Arc<Catalog>,
    local_addr: SocketAddr,
}

/// A Redis-protocol server running on the current tokio runtime.
///
/// ```no_run
/// # async fn demo() -> Result<(), redis_emu::EmulatorError> {
/// use redis_emu::{EmulatorConfig, RedisEmulator};
///
/// let emulator = RedisEmulator::new(EmulatorConfig { port: 0, ..Default::default() });
/// let addr = emulator.start().await?;
/// println!("listening on {}", addr);
/// emulator.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RedisEmulator {
    config: EmulatorConfig,
    hook: HookSlot,
    /// Names disabled so far; applied to the catalog at start.
    disabled: Mutex<Vec<String>>,
    running: OnceLock<Running>,
    shutdown: watch::Sender<bool>,
    workers: AsyncMutex<Vec<JoinHandle<()>>>,
}

impl RedisEmulator {
    pub fn new(config: EmulatorConfig) -> Self {
        let disabled = config
            .disabled_commands
            .iter()
            .map(|name| name.to_lowercase())
            .collect();
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            hook: HookSlot::default(),
            disabled: Mutex::new(disabled),
            running: OnceLock::new(),
            shutdown,
            workers: AsyncMutex::new(Vec::new()),
        }
    }

    /// Loads the catalog and keyspace, binds the listener and spawns the
    /// accept loop and the persistence worker. Returns the bound address.
    pub async fn start(&self) -> Result<SocketAddr, EmulatorError> {
        if self.running.get().is_some() {
            return Err(EmulatorError::AlreadyStarted);
        }

        let catalog = Arc::new(Catalog::load_embedded()?);
        let stores = Arc::new(
            DataStoreSet::open(&self.config.persist_path, self.config.databases)?
                .with_hook(self.hook.clone()),
        );

        let address = bind_address(&self.config.interface, self.config.port);
        let listener = TcpListener::bind(address.as_str())
            .await
            .map_err(|source| EmulatorError::Bind {
                address: address.clone(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| EmulatorError::Bind {
            address: address.clone(),
            source,
        })?;

        {
            let disabled = self.disabled.lock().unwrap_or_else(PoisonError::into_inner);
            for name in disabled.iter() {
                catalog.disable(name);
            }
            self.running
                .set(Running {
                    catalog: Arc::clone(&catalog),
                    local_addr,
                })
                .map_err(|_| EmulatorError::AlreadyStarted)?;
        }

        tracing::info!(addr = %local_addr, databases = stores.store_count(), "emulator listening");

        let dispatcher = CommandDispatcher::new(catalog, Arc::clone(&stores));
        let accept = tokio::spawn(accept_loop(listener, dispatcher, self.shutdown.subscribe()));
        let persist = tokio::spawn(persistence_worker(
            stores,
            self.config.save_interval,
            self.shutdown.subscribe(),
        ));
        self.workers.lock().await.extend([accept, persist]);

        Ok(local_addr)
    }

    /// Asks every worker and connection to stop. Safe to call any number
    /// of times, from any task.
    pub fn request_termination(&self) {
        self.shutdown.send_replace(true);
    }

    /// Waits for the accept loop and the persistence worker to exit.
    /// Returns at once when they already have, or never started.
    ///
    /// Concurrent callers queue on the worker list, so none of them returns
    /// before the final save has landed.
    pub async fn wait_for_termination(&self) {
        let mut workers = self.workers.lock().await;
        for worker in workers.drain(..) {
            if let Err(error) = worker.await {
                tracing::error!(error = %error, "emulator worker failed");
            }
        }
    }

    pub async fn close(&self) {
        self.request_termination();
        self.wait_for_termination().await;
    }

    pub async fn set_hook(&self, hook: Arc<dyn DispatchHook>) {
        self.hook.set(hook).await;
    }

    pub async fn clear_hook(&self) {
        self.hook.clear().await;
    }

    /// Makes `name` answer as an unknown command. Takes effect immediately
    /// when running, or at start otherwise. Subcommands use `parent|sub`.
    pub fn disable_command(&self, name: &str) {
        let name = name.to_lowercase();
        let mut disabled = self.disabled.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(running) = self.running.get() {
            running.catalog.disable(&name);
        }
        disabled.push(name);
    }

    /// Emulates a server that predates `CLIENT SETINFO`.
    pub fn disable_client_set_info(&self) {
        self.disable_command(CLIENT_SETINFO);
    }

    /// `None` until started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.get().map(|running| running.local_addr)
    }

    /// The bound port once started, the configured one before.
    pub fn port(&self) -> u16 {
        self.local_addr()
            .map_or(self.config.port, |addr| addr.port())
    }

    pub fn net_interface(&self) -> &str {
        &self.config.interface
    }
}

fn bind_address(interface: &str, port: u16) -> String {
    match interface {
        "" => format!("0.0.0.0:{}", port),
        ipv6 if ipv6.contains(':') => format!("[{}]:{}", ipv6, port),
        host => format!("{}:{}", host, port),
    }
}

async fn accept_loop(
    listener: TcpListener,
    dispatcher: CommandDispatcher,
    mut shutdown: watch::Receiver<bool>,
) {
    while !*shutdown.borrow() {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let connection = ClientConnection::new(stream, peer, dispatcher.clone());
                    tokio::spawn(connection.run(shutdown.clone()));
                }
                Err(error) => tracing::warn!(error = %error, "failed to accept connection"),
            },
            _ = shutdown.changed() => break,
        }
    }

    tracing::info!("listener closed");
}

/// Sweeps expired keys and saves the keyspace every `period`, then saves
/// once more on shutdown.
async fn persistence_worker(
    stores: Arc<DataStoreSet>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    interval.tick().await;

    while !*shutdown.borrow() {
        tokio::select! {
            _ = interval.tick() => {
                let expired = stores.sweep_expired().await;
                if expired > 0 {
                    tracing::debug!(expired, "expired keys removed");
                }
                if let Err(error) = stores.save_if_dirty().await {
                    tracing::error!(error = %error, "periodic save failed");
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    if let Err(error) = stores.save().await {
        tracing::error!(error = %error, "final save failed");
    }
}
