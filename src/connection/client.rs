//! Client Connection
//!
//! One [`Client`] per accepted TCP connection. The socket is non-blocking:
//! the reactor calls into the client when it is readable or writable, and
//! no call ever waits on the kernel.
//!
//! ## Buffer Management
//!
//! TCP is a stream protocol, so a single read may carry half a request or
//! several pipelined ones. Incoming bytes accumulate in a `BytesMut` query
//! buffer and complete requests are split off its front. Encoded replies
//! accumulate in an output buffer until the socket accepts them.

use crate::protocol::{ParseError, Reply, Request, RequestParser};
use bytes::{Buf, BytesMut};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use tracing::trace;

/// Hard limit on unparsed input per client (1 GB)
pub const MAX_QUERY_BUFFER: usize = 1024 * 1024 * 1024;

/// Initial query buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Bytes requested from the socket per `read` call
const READ_CHUNK: usize = 16 * 1024;

/// Server-wide connection counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: u64,
    /// Currently open connections
    pub active_connections: u64,
    /// Total requests executed
    pub commands_processed: u64,
    /// Total bytes read from clients
    pub bytes_read: u64,
    /// Total bytes written to clients
    pub bytes_written: u64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&mut self) {
        self.connections_accepted += 1;
        self.active_connections += 1;
    }

    pub fn connection_closed(&mut self) {
        self.active_connections = self.active_connections.saturating_sub(1);
    }

    pub fn command_processed(&mut self) {
        self.commands_processed += 1;
    }

    pub fn record_read(&mut self, count: usize) {
        self.bytes_read += count as u64;
    }

    pub fn record_written(&mut self, count: usize) {
        self.bytes_written += count as u64;
    }
}

/// Errors that can occur while servicing a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The client sent bytes that do not frame as a request
    #[error("Protocol error: {0}")]
    Parse(#[from] ParseError),

    /// The peer closed its end of the connection
    #[error("Client disconnected")]
    Closed,

    /// Query buffer limit exceeded
    #[error("Query buffer limit exceeded")]
    BufferFull,
}

/// A connected client: its socket plus input and output buffers.
#[derive(Debug)]
pub struct Client {
    stream: TcpStream,
    addr: SocketAddr,
    query_buf: BytesMut,
    reply_buf: Vec<u8>,
    sent: usize,
    parser: RequestParser,
    close_after_reply: bool,
}

impl Client {
    /// Wraps an accepted stream, switching it to non-blocking mode.
    pub fn new(stream: TcpStream, addr: SocketAddr) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            addr,
            query_buf: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            reply_buf: Vec::new(),
            sent: 0,
            parser: RequestParser::new(),
            close_after_reply: false,
        })
    }

    pub fn fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Bytes received but not yet parsed into a request.
    pub fn buffered(&self) -> usize {
        self.query_buf.len()
    }

    /// Reads at most one chunk from the socket into the query buffer.
    ///
    /// The reactor is level-triggered, so bytes left in the kernel wake the
    /// client again on the next pass and one busy peer cannot starve the
    /// rest. Returns the number of bytes read (0 when nothing was ready), or
    /// [`ConnectionError::Closed`] once the peer has shut down its side.
    pub fn read_from_socket(&mut self) -> Result<usize, ConnectionError> {
        if self.query_buf.len() >= MAX_QUERY_BUFFER {
            return Err(ConnectionError::BufferFull);
        }

        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return Err(ConnectionError::Closed),
                Ok(n) => {
                    self.query_buf.extend_from_slice(&chunk[..n]);
                    trace!(client = %self.addr, bytes = n, buffered = self.query_buf.len(), "Read data");
                    return Ok(n);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(0),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Splits the next complete request off the query buffer.
    ///
    /// `Ok(None)` means more bytes are needed.
    pub fn next_request(&mut self) -> Result<Option<Request>, ConnectionError> {
        if self.query_buf.is_empty() {
            return Ok(None);
        }

        match self.parser.parse(&self.query_buf)? {
            Some((request, consumed)) => {
                self.query_buf.advance(consumed);
                trace!(
                    client = %self.addr,
                    consumed,
                    remaining = self.query_buf.len(),
                    "Parsed request"
                );
                Ok(Some(request))
            }
            None => {
                // Frames that were only blank lines leave nothing to parse
                if self.query_buf.iter().all(|b| *b == b'\r' || *b == b'\n') {
                    self.query_buf.clear();
                }
                Ok(None)
            }
        }
    }

    /// Appends the encoded reply to the output buffer.
    pub fn queue_reply(&mut self, reply: &Reply) {
        reply.encode_into(&mut self.reply_buf);
    }

    pub fn has_pending_replies(&self) -> bool {
        self.sent < self.reply_buf.len()
    }

    /// Marks the client to be closed once its pending replies are flushed.
    pub fn close_after_reply(&mut self) {
        self.close_after_reply = true;
    }

    pub fn should_close(&self) -> bool {
        self.close_after_reply && !self.has_pending_replies()
    }

    /// Writes as much of the output buffer as the socket accepts.
    ///
    /// Returns the number of bytes written by this call.
    pub fn flush(&mut self) -> Result<usize, ConnectionError> {
        let mut total = 0;

        while self.has_pending_replies() {
            match self.stream.write(&self.reply_buf[self.sent..]) {
                Ok(0) => return Err(ConnectionError::Closed),
                Ok(n) => {
                    self.sent += n;
                    total += n;
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }

        if !self.has_pending_replies() {
            self.reply_buf.clear();
            self.sent = 0;
        }

        trace!(client = %self.addr, bytes = total, "Sent replies");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    fn connected_pair() -> (Client, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let peer = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (stream, addr) = listener.accept().unwrap();
        (Client::new(stream, addr).unwrap(), peer)
    }

    /// Reads until at least `want` bytes are buffered.
    fn read_at_least(client: &mut Client, want: usize) {
        for _ in 0..200 {
            match client.read_from_socket() {
                Ok(_) if client.buffered() >= want => return,
                Ok(_) => thread::sleep(Duration::from_millis(5)),
                Err(err) => panic!("read failed: {err}"),
            }
        }
        panic!("timed out waiting for {want} bytes");
    }

    #[test]
    fn test_stats_counters() {
        let mut stats = ConnectionStats::new();
        stats.connection_opened();
        stats.connection_opened();
        stats.connection_closed();
        stats.command_processed();
        stats.record_read(10);
        stats.record_written(5);

        assert_eq!(stats.connections_accepted, 2);
        assert_eq!(stats.active_connections, 1);
        assert_eq!(stats.commands_processed, 1);
        assert_eq!(stats.bytes_read, 10);
        assert_eq!(stats.bytes_written, 5);
    }

    #[test]
    fn test_pipelined_requests() {
        let (mut client, mut peer) = connected_pair();
        let payload = b"*1\r\n$4\r\nPING\r\n*2\r\n$3\r\nGET\r\n$1\r\nk\r\n";
        peer.write_all(payload).unwrap();
        read_at_least(&mut client, payload.len());

        let first = client.next_request().unwrap().unwrap();
        assert_eq!(first.command, "ping");
        let second = client.next_request().unwrap().unwrap();
        assert_eq!(second.command, "get");
        assert_eq!(second.args, vec![Bytes::from("k")]);
        assert!(client.next_request().unwrap().is_none());
        assert_eq!(client.buffered(), 0);
    }

    #[test]
    fn test_split_request_waits_for_rest() {
        let (mut client, mut peer) = connected_pair();

        peer.write_all(b"*2\r\n$3\r\nGET\r\n$3\r\nfo").unwrap();
        read_at_least(&mut client, 18);
        assert!(client.next_request().unwrap().is_none());

        peer.write_all(b"o\r\n").unwrap();
        read_at_least(&mut client, 21);
        let request = client.next_request().unwrap().unwrap();
        assert_eq!(request.args, vec![Bytes::from("foo")]);
    }

    #[test]
    fn test_read_takes_one_chunk_per_call() {
        let (mut client, mut peer) = connected_pair();
        let payload = vec![b'x'; 3 * READ_CHUNK];
        peer.write_all(&payload).unwrap();
        thread::sleep(Duration::from_millis(50));

        let n = client.read_from_socket().unwrap();
        assert!(n > 0 && n <= READ_CHUNK);
        assert_eq!(client.buffered(), n);

        read_at_least(&mut client, payload.len());
        assert_eq!(client.buffered(), payload.len());
    }

    #[test]
    fn test_protocol_error_surfaces() {
        let (mut client, mut peer) = connected_pair();
        peer.write_all(b"*x\r\n").unwrap();
        read_at_least(&mut client, 4);

        assert!(matches!(client.next_request(), Err(ConnectionError::Parse(_))));
    }

    #[test]
    fn test_flush_writes_queued_replies() {
        let (mut client, mut peer) = connected_pair();
        client.queue_reply(&Reply::status("PONG"));
        client.queue_reply(&Reply::integer(3));
        assert!(client.has_pending_replies());

        let written = client.flush().unwrap();
        assert_eq!(written, 11);
        assert!(!client.has_pending_replies());

        let mut buf = [0u8; 11];
        peer.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"+PONG\r\n:3\r\n");
    }

    #[test]
    fn test_peer_close_is_reported() {
        let (mut client, peer) = connected_pair();
        drop(peer);

        let mut result = client.read_from_socket();
        for _ in 0..200 {
            if !matches!(result, Ok(0)) {
                break;
            }
            thread::sleep(Duration::from_millis(5));
            result = client.read_from_socket();
        }
        assert!(matches!(result, Err(ConnectionError::Closed)));
    }

    #[test]
    fn test_close_after_reply() {
        let (mut client, _peer) = connected_pair();
        client.queue_reply(&Reply::error("ERR Protocol error"));
        client.close_after_reply();
        assert!(!client.should_close());

        client.flush().unwrap();
        assert!(client.should_close());
    }
}
