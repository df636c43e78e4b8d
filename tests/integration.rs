//! End-to-end tests: a real server on an ephemeral port, driven over TCP.

use boltkv::{Server, ServerConfig};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// Starts a server on its own thread and returns its address.
///
/// The server state is not `Send`, so it is built inside the thread.
fn spawn_server() -> SocketAddr {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let config = ServerConfig {
            port: 0,
            expire_check_interval_ms: 10,
            ..ServerConfig::default()
        };
        let server = Server::bind(config).expect("bind");
        tx.send(server.local_addr().expect("local addr")).expect("send addr");
        server.serve().expect("serve");
    });

    rx.recv_timeout(Duration::from_secs(5)).expect("server did not start")
}

fn connect(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    stream
}

/// Reads exactly `expected.len()` bytes and compares them.
fn expect_reply(stream: &mut TcpStream, expected: &[u8]) {
    let mut buf = vec![0u8; expected.len()];
    stream.read_exact(&mut buf).unwrap();
    assert_eq!(
        String::from_utf8_lossy(&buf),
        String::from_utf8_lossy(expected)
    );
}

fn command(words: &[&str]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", words.len()).into_bytes();
    for word in words {
        out.extend_from_slice(format!("${}\r\n{}\r\n", word.len(), word).as_bytes());
    }
    out
}

#[test]
fn test_ping_pong() {
    let addr = spawn_server();
    let mut client = connect(addr);

    client.write_all(b"*1\r\n$4\r\nPING\r\n").unwrap();
    expect_reply(&mut client, b"+PONG\r\n");

    client.write_all(b"PING\r\n").unwrap();
    expect_reply(&mut client, b"+PONG\r\n");
}

#[test]
fn test_set_get() {
    let addr = spawn_server();
    let mut client = connect(addr);

    client.write_all(&command(&["SET", "name", "bolt"])).unwrap();
    expect_reply(&mut client, b"+OK\r\n");

    client.write_all(&command(&["GET", "name"])).unwrap();
    expect_reply(&mut client, b"$4\r\nbolt\r\n");

    client.write_all(&command(&["GET", "missing"])).unwrap();
    expect_reply(&mut client, b"$-1\r\n");
}

#[test]
fn test_pipelined_commands() {
    let addr = spawn_server();
    let mut client = connect(addr);

    let mut batch = Vec::new();
    batch.extend(command(&["RPUSH", "l", "a", "b", "c"]));
    batch.extend(command(&["LRANGE", "l", "0", "-1"]));
    batch.extend(command(&["LINDEX", "l", "100"]));
    batch.extend(command(&["LLEN", "nothing"]));
    client.write_all(&batch).unwrap();

    expect_reply(
        &mut client,
        b":3\r\n*3\r\n$1\r\na\r\n$1\r\nb\r\n$1\r\nc\r\n$-1\r\n:0\r\n",
    );
}

#[test]
fn test_split_request() {
    let addr = spawn_server();
    let mut client = connect(addr);

    let request = command(&["SADD", "s", "a", "a", "b"]);
    let (head, tail) = request.split_at(request.len() / 2);
    client.write_all(head).unwrap();
    client.flush().unwrap();
    thread::sleep(Duration::from_millis(50));
    client.write_all(tail).unwrap();
    expect_reply(&mut client, b":2\r\n");

    client.write_all(&command(&["SCARD", "s"])).unwrap();
    expect_reply(&mut client, b":2\r\n");
}

#[test]
fn test_sorted_set_flow() {
    let addr = spawn_server();
    let mut client = connect(addr);

    client
        .write_all(&command(&["ZADD", "z", "1.5", "a", "2.5", "b"]))
        .unwrap();
    expect_reply(&mut client, b":2\r\n");

    client.write_all(&command(&["ZSCORE", "z", "a"])).unwrap();
    expect_reply(&mut client, b"$4\r\n1.50\r\n");

    client.write_all(&command(&["ZRANGE", "z", "1", "3"])).unwrap();
    expect_reply(&mut client, b"*2\r\n$1\r\na\r\n$1\r\nb\r\n");
}

#[test]
fn test_errors_keep_connection_open() {
    let addr = spawn_server();
    let mut client = connect(addr);

    client.write_all(&command(&["NOPE"])).unwrap();
    expect_reply(&mut client, b"-ERR unknown command 'nope'\r\n");

    client.write_all(&command(&["GET"])).unwrap();
    expect_reply(
        &mut client,
        b"-ERR wrong number of arguments for 'get' command\r\n",
    );

    client.write_all(&command(&["HSET", "h", "a", "1"])).unwrap();
    expect_reply(&mut client, b":1\r\n");
    client.write_all(&command(&["GET", "h"])).unwrap();
    expect_reply(
        &mut client,
        b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n",
    );
}

#[test]
fn test_expire_flow() {
    let addr = spawn_server();
    let mut client = connect(addr);

    client.write_all(&command(&["SET", "foo", "bar"])).unwrap();
    expect_reply(&mut client, b"+OK\r\n");
    client.write_all(&command(&["EXPIRE", "foo", "1"])).unwrap();
    expect_reply(&mut client, b":1\r\n");
    client.write_all(&command(&["TTL", "foo"])).unwrap();
    expect_reply(&mut client, b":1\r\n");

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        client.write_all(&command(&["EXISTS", "foo"])).unwrap();
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).unwrap();
        if &buf == b":0\r\n" {
            break;
        }
        assert!(Instant::now() < deadline, "key never expired");
        thread::sleep(Duration::from_millis(100));
    }

    client.write_all(&command(&["GET", "foo"])).unwrap();
    expect_reply(&mut client, b"$-1\r\n");
}

#[test]
fn test_many_clients() {
    let addr = spawn_server();
    let mut clients: Vec<TcpStream> = (0..8).map(|_| connect(addr)).collect();

    for (i, client) in clients.iter_mut().enumerate() {
        let key = format!("k{i}");
        let value = format!("v{i}");
        client.write_all(&command(&["SET", &key, &value])).unwrap();
    }
    for client in clients.iter_mut() {
        expect_reply(client, b"+OK\r\n");
    }

    let mut reader = connect(addr);
    reader.write_all(&command(&["EXISTS", "k0", "k3", "k7", "k8"])).unwrap();
    expect_reply(&mut reader, b":3\r\n");
}

#[test]
fn test_protocol_error_closes_connection() {
    let addr = spawn_server();
    let mut client = connect(addr);

    client.write_all(b"*1\r\n$abc\r\n").unwrap();

    let mut response = Vec::new();
    client.read_to_end(&mut response).unwrap();
    assert!(response.starts_with(b"-ERR"));
}
