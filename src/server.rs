//! The Server
//!
//! Wires the keyspaces, the command table and the client connections into an
//! [`EventLoop`]. All state lives in one [`Server`] value that the reactor
//! hands mutably to every callback; nothing is shared across threads.
//!
//! ```text
//!   listener fd ──READABLE──> accept_clients ──> Client + READABLE
//!   client fd   ──READABLE──> read_from_client ──> execute ──> WRITABLE
//!   client fd   ──WRITABLE──> write_to_client ──> drop WRITABLE when drained
//!   time event  ─────────────> server_cron (active expiry)
//! ```

use crate::commands::CommandTable;
use crate::config::ServerConfig;
use crate::connection::{Client, ConnectionError, ConnectionStats};
use crate::protocol::Reply;
use crate::reactor::{EventLoop, Mask, ReactorError, TimeEventId, TimeMode};
use crate::storage::{active_expire_cycle, Db, ExpiryConfig};
use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::os::fd::{AsRawFd, RawFd};
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

/// Errors raised while starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("event loop error: {0}")]
    Reactor(#[from] ReactorError),
}

/// Process-wide server state.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    listener: TcpListener,
    dbs: Vec<Db>,
    commands: CommandTable,
    clients: HashMap<RawFd, Client>,
    expiry: ExpiryConfig,
    stats: ConnectionStats,
    cron_loops: u64,
}

impl Server {
    /// Binds the listening socket and allocates the keyspaces.
    pub fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let addr = config.bind_address();
        let listener = TcpListener::bind(&addr).map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
        listener.set_nonblocking(true)?;

        let dbs = (0..config.databases.max(1)).map(Db::new).collect();
        let expiry = config.expiry_config();

        info!(addr = %addr, databases = config.databases, "Server bound");
        Ok(Self {
            config,
            listener,
            dbs,
            commands: CommandTable::new(),
            clients: HashMap::new(),
            expiry,
            stats: ConnectionStats::new(),
            cron_loops: 0,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn cron_loops(&self) -> u64 {
        self.cron_loops
    }

    pub fn db(&self, index: usize) -> Option<&Db> {
        self.dbs.get(index)
    }

    pub fn db_mut(&mut self, index: usize) -> Option<&mut Db> {
        self.dbs.get_mut(index)
    }

    /// Registers the accept handler and the expiry cron with `el`.
    pub fn install(&self, el: &mut EventLoop<Server>) -> Result<TimeEventId, ServerError> {
        el.create_file_event(self.listener.as_raw_fd(), Mask::READABLE, accept_clients)?;
        let cron = el.create_time_event(self.expiry.interval_ms, TimeMode::Normal, server_cron);
        Ok(cron)
    }

    /// Runs the server on a fresh event loop until the loop is stopped.
    pub fn serve(mut self) -> Result<(), ServerError> {
        let mut el = EventLoop::new(self.config.idle_tick_ms)?;
        self.install(&mut el)?;
        info!(addr = %self.config.bind_address(), "Ready to accept connections");
        el.run(&mut self)?;
        Ok(())
    }

    /// Executes every complete request buffered for `fd`.
    ///
    /// Returns false if the client must be closed.
    fn process_input(&mut self, fd: RawFd) -> bool {
        let Some(client) = self.clients.get_mut(&fd) else {
            return false;
        };

        loop {
            let request = match client.next_request() {
                Ok(Some(request)) => request,
                Ok(None) => break,
                Err(err) => {
                    warn!(client = %client.addr(), error = %err, "Protocol error");
                    client.queue_reply(&Reply::error(format!("ERR {err}")));
                    client.close_after_reply();
                    break;
                }
            };

            // Every client works on database 0
            let reply = self.commands.execute(&mut self.dbs[0], &request);
            client.queue_reply(&reply);
            self.stats.command_processed();
        }

        true
    }

    /// Deregisters `fd` and drops its client, closing the socket.
    fn close_client(&mut self, el: &mut EventLoop<Server>, fd: RawFd, reason: &str) {
        if let Err(err) = el.delete_file_event(fd, Mask::READABLE | Mask::WRITABLE) {
            error!(fd, error = %err, "Failed to deregister client");
        }

        if let Some(client) = self.clients.remove(&fd) {
            self.stats.connection_closed();
            info!(client = %client.addr(), reason, "Client disconnected");
        }
    }
}

fn accept_clients(el: &mut EventLoop<Server>, server: &mut Server, _fd: RawFd, _mask: Mask) {
    loop {
        let (stream, addr) = match server.listener.accept() {
            Ok(accepted) => accepted,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!(error = %err, "Failed to accept connection");
                return;
            }
        };

        let client = match Client::new(stream, addr) {
            Ok(client) => client,
            Err(err) => {
                warn!(client = %addr, error = %err, "Failed to configure client socket");
                continue;
            }
        };

        let fd = client.fd();
        if let Err(err) = el.create_file_event(fd, Mask::READABLE, read_from_client) {
            warn!(client = %addr, error = %err, "Failed to register client");
            continue;
        }

        server.clients.insert(fd, client);
        server.stats.connection_opened();
        info!(client = %addr, fd, "Client connected");
    }
}

fn read_from_client(el: &mut EventLoop<Server>, server: &mut Server, fd: RawFd, _mask: Mask) {
    let Some(client) = server.clients.get_mut(&fd) else {
        return;
    };

    match client.read_from_socket() {
        Ok(n) => server.stats.record_read(n),
        Err(ConnectionError::Closed) if client.has_pending_replies() => {
            // Half-closed peer: stop reading but deliver what is queued
            client.close_after_reply();
            if let Err(err) = el
                .delete_file_event(fd, Mask::READABLE)
                .and_then(|()| watch_writable(el, fd))
            {
                warn!(fd, error = %err, "Failed to switch client to write-only");
                server.close_client(el, fd, "registration error");
            }
            return;
        }
        Err(ConnectionError::Closed) => {
            server.close_client(el, fd, "closed by peer");
            return;
        }
        Err(err) => {
            warn!(client = %client.addr(), error = %err, "Read failed");
            server.close_client(el, fd, "read error");
            return;
        }
    }

    if !server.process_input(fd) {
        return;
    }

    let Some(client) = server.clients.get(&fd) else {
        return;
    };
    let pending = client.has_pending_replies();
    let closing = client.should_close();

    if closing {
        server.close_client(el, fd, "protocol error");
        return;
    }

    if pending {
        if let Err(err) = watch_writable(el, fd) {
            warn!(fd, error = %err, "Failed to register client for writing");
            server.close_client(el, fd, "registration error");
        }
    }
}

/// Adds write interest for `fd` unless it is already registered.
fn watch_writable(el: &mut EventLoop<Server>, fd: RawFd) -> Result<(), ReactorError> {
    if el.file_event_mask(fd).contains(Mask::WRITABLE) {
        return Ok(());
    }
    el.create_file_event(fd, Mask::WRITABLE, write_to_client)
}

fn write_to_client(el: &mut EventLoop<Server>, server: &mut Server, fd: RawFd, _mask: Mask) {
    let Some(client) = server.clients.get_mut(&fd) else {
        return;
    };

    match client.flush() {
        Ok(n) => server.stats.record_written(n),
        Err(err) => {
            debug!(client = %client.addr(), error = %err, "Write failed");
            server.close_client(el, fd, "write error");
            return;
        }
    }

    if client.should_close() {
        server.close_client(el, fd, "closed after reply");
        return;
    }

    if !client.has_pending_replies() {
        if let Err(err) = el.delete_file_event(fd, Mask::WRITABLE) {
            warn!(fd, error = %err, "Failed to drop write interest");
            server.close_client(el, fd, "registration error");
        }
    }
}

fn server_cron(_el: &mut EventLoop<Server>, server: &mut Server, _id: TimeEventId) -> u64 {
    server.cron_loops += 1;

    let evicted = active_expire_cycle(&mut server.dbs, &server.expiry);
    if evicted > 0 {
        debug!(evicted, loop_count = server.cron_loops, "Active expiry cycle");
    } else {
        trace!(loop_count = server.cron_loops, "Cron tick");
    }

    server.expiry.interval_ms
}
