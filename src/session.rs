use std::{
    net::SocketAddr,
    sync::atomic::{AtomicU64, Ordering},
};

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Per-connection state. Owned by exactly one connection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSession {
    pub id: u64,
    pub peer: Option<SocketAddr>,
    /// Index of the selected store.
    pub database: usize,
    pub name: Option<String>,
    pub library_name: Option<String>,
    pub library_version: Option<String>,
    quit: bool,
}

impl ClientSession {
    pub fn new(peer: Option<SocketAddr>) -> Self {
        Self {
            id: NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed),
            peer,
            database: 0,
            name: None,
            library_name: None,
            library_version: None,
            quit: false,
        }
    }

    pub fn request_quit(&mut self) {
        self.quit = true;
    }

    pub fn wants_quit(&self) -> bool {
        self.quit
    }

    /// One line in the `CLIENT INFO` format.
    pub fn info_line(&self) -> String {
        let addr = self
            .peer
            .map(|peer| peer.to_string())
            .unwrap_or_default();

        format!(
            "id={} addr={} name={} db={} lib-name={} lib-ver={}\n",
            self.id,
            addr,
            self.name.as_deref().unwrap_or(""),
            self.database,
            self.library_name.as_deref().unwrap_or(""),
            self.library_version.as_deref().unwrap_or(""),
        )
    }
}
