use std::future::Future;
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::commands::executable::Executable;
use crate::commands::Command;
use crate::config::Config;
use crate::connection::{self, Connection};
use crate::frame::Frame;
use crate::store::Store;
use crate::Error;

/// Binds a server with a fresh store and serves until `shutdown` resolves.
pub async fn run(
    config: Config,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), Error> {
    let server = Server::bind(config, Store::new()).await?;
    let handle = server.handle();

    tokio::spawn(async move {
        shutdown.await;
        handle.stop();
    });

    server.serve().await
}

pub struct Server {
    listener: TcpListener,
    store: Store,
    config: Config,
    shutdown: CancellationToken,
}

/// Stops a running [`Server`]. Stopping more than once is harmless.
#[derive(Clone)]
pub struct ShutdownHandle {
    shutdown: CancellationToken,
}

impl ShutdownHandle {
    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

impl Server {
    pub async fn bind(config: Config, store: Store) -> Result<Server, Error> {
        let listener = TcpListener::bind((config.bind.as_str(), config.port)).await?;

        Ok(Server {
            listener,
            store,
            config,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    /// Accepts connections until stopped or until the listener fails. Connections already
    /// accepted keep running after this returns.
    pub async fn serve(self) -> Result<(), Error> {
        info!("Server listening on {}", self.listener.local_addr()?);

        loop {
            let (socket, client_address) = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted?,
            };

            let store = self.store.clone();
            let buffer_size = self.config.buffer_size;
            let max_frame_size = self.config.max_frame_size;
            info!("Accepted connection from {:?}", client_address);

            tokio::spawn(async move {
                let conn = Connection::with_limits(socket, buffer_size, max_frame_size);
                if let Err(e) = handle_connection(conn, client_address, store).await {
                    error!("Connection failed: {}", e);
                }
            });
        }

        // The listener is closed when `self` is dropped.
        info!("Server stopped accepting connections");
        Ok(())
    }
}

#[instrument(name = "connection", skip_all, fields(connection_id, client_address))]
async fn handle_connection(
    mut conn: Connection,
    client_address: SocketAddr,
    store: Store,
) -> Result<(), connection::Error> {
    tracing::Span::current()
        .record("connection_id", conn.id.to_string())
        .record("client_address", client_address.to_string());

    loop {
        let frame = match conn.read_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(connection::Error::Protocol(e)) => {
                warn!("Malformed frame from client: {}", e);
                conn.write_frame(&Frame::error(e.to_string())).await?;
                continue;
            }
            Err(e) => return Err(e),
        };

        debug!("Received frame from client: {}", frame);
        let res = match Command::try_from(frame).and_then(|cmd| cmd.exec(store.clone())) {
            Ok(res) => res,
            Err(e) => {
                warn!("Command failed: {}", e);
                Frame::error(e.to_string())
            }
        };

        debug!("Sending response to client: {}", res);
        conn.write_frame(&res).await?;
    }

    info!("Connection closed");
    Ok(())
}
