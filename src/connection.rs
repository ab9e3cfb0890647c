use std::net::SocketAddr;

use bytes::{Buf, BytesMut};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::watch,
};

use crate::{dispatcher::CommandDispatcher, resp::RespValue, session::ClientSession};

const READ_BUFFER_CAPACITY: usize = 4 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Serving,
    Closing,
    Closed,
}

/// One client socket and the session it carries.
pub struct ClientConnection {
    stream: TcpStream,
    dispatcher: CommandDispatcher,
    session: ClientSession,
    input: BytesMut,
    output: BytesMut,
    state: ConnectionState,
}

/// What the decode pass left the connection wanting to do next.
enum Progress {
    NeedInput,
    Close,
}

impl ClientConnection {
    pub fn new(stream: TcpStream, peer: SocketAddr, dispatcher: CommandDispatcher) -> Self {
        Self {
            stream,
            dispatcher,
            session: ClientSession::new(Some(peer)),
            input: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            output: BytesMut::new(),
            state: ConnectionState::Connecting,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Serves requests until the client leaves, the framing breaks or
    /// `shutdown` flips to `true`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        self.state = ConnectionState::Serving;
        tracing::debug!(client = self.session.id, peer = ?self.session.peer, "client connected");

        while self.state == ConnectionState::Serving {
            let progress = self.serve_buffered().await;

            if !self.output.is_empty() {
                if let Err(error) = self.flush().await {
                    tracing::debug!(client = self.session.id, error = %error, "write failed");
                    self.state = ConnectionState::Closing;
                    break;
                }
            }

            if let Progress::Close = progress {
                self.state = ConnectionState::Closing;
                break;
            }

            if *shutdown.borrow() {
                self.state = ConnectionState::Closing;
                break;
            }

            tokio::select! {
                read = self.stream.read_buf(&mut self.input) => match read {
                    Ok(0) => self.state = ConnectionState::Closing,
                    Ok(_) => {}
                    Err(error) => {
                        tracing::debug!(client = self.session.id, error = %error, "read failed");
                        self.state = ConnectionState::Closing;
                    }
                },
                _ = shutdown.changed() => self.state = ConnectionState::Closing,
            }
        }

        let _ = self.stream.shutdown().await;
        self.state = ConnectionState::Closed;
        tracing::debug!(client = self.session.id, "client disconnected");
    }

    /// Dispatches every complete request already buffered, in order,
    /// queueing the replies.
    async fn serve_buffered(&mut self) -> Progress {
        loop {
            match RespValue::decode_next(&self.input) {
                Ok(Some((request, consumed))) => {
                    self.input.advance(consumed);

                    let reply = self.dispatcher.dispatch(&mut self.session, request).await;
                    reply.encode_into(&mut self.output);

                    if self.session.wants_quit() {
                        return Progress::Close;
                    }
                }
                Ok(None) => return Progress::NeedInput,
                Err(error) => {
                    tracing::debug!(client = self.session.id, error = %error, "protocol error");
                    RespValue::error(format!("ERR Protocol error: {}", error))
                        .encode_into(&mut self.output);
                    return Progress::Close;
                }
            }
        }
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        self.stream.write_all(&self.output).await?;
        self.stream.flush().await?;
        self.output.clear();
        Ok(())
    }
}
