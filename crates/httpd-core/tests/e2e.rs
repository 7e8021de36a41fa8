//! End-to-end scenarios driving the event loop over real sockets: a
//! background thread runs the server, the test thread plays client.
use std::{
    fs,
    io::{Read, Write},
    net::{SocketAddr, TcpStream},
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use httpd_core::{Server, ServerConfig};
use tempfile::tempdir;

struct Harness {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Harness {
    fn start(document_root: PathBuf, logs_dir: PathBuf, not_found_path: PathBuf) -> Self {
        let config = ServerConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            document_root,
            not_found_path,
            logs_dir,
        };
        let mut server = Server::bind(config).unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = {
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || {
                server.run(&shutdown).unwrap();
            })
        };
        Self { addr, shutdown, handle: Some(handle) }
    }

    fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        stream
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn read_all(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let _ = stream.read_to_end(&mut buf);
    buf
}

#[test]
fn get_existing_file_returns_200_with_exact_body() {
    let root = tempdir().unwrap();
    let logs = tempdir().unwrap();
    fs::write(root.path().join("hello.txt"), b"hello world").unwrap();

    let harness = Harness::start(root.path().to_path_buf(), logs.path().to_path_buf(), PathBuf::from("/nonexistent-404-doc"));

    let mut stream = harness.connect();
    stream.write_all(b"GET /hello.txt HTTP/1.0\r\n\r\n").unwrap();
    let response = read_all(&mut stream);

    let text = String::from_utf8_lossy(&response);
    assert!(text.starts_with("HTTP/1.0 200 OK\r\nDate: "));
    assert!(text.ends_with("hello world"));
}

#[test]
fn get_missing_file_returns_404_and_logs_it() {
    let root = tempdir().unwrap();
    let logs = tempdir().unwrap();

    let harness = Harness::start(root.path().to_path_buf(), logs.path().to_path_buf(), PathBuf::from("/nonexistent-404-doc"));

    let mut stream = harness.connect();
    stream.write_all(b"GET /missing HTTP/1.0\r\n\r\n").unwrap();
    let response = read_all(&mut stream);

    assert_eq!(response, b"HTTP/1.0 404 Not Found\r\n\r\n");

    // Drop the harness first so the server's error.log handle is flushed and
    // closed before we read it back.
    drop(harness);
    let error_log = fs::read_to_string(logs.path().join("error.log")).unwrap();
    assert!(error_log.trim_end().ends_with("GET /missing 404 Not Found"));
}

#[test]
fn subscriber_receives_a_publish() {
    let root = tempdir().unwrap();
    let logs = tempdir().unwrap();
    let harness = Harness::start(root.path().to_path_buf(), logs.path().to_path_buf(), PathBuf::from("/nonexistent-404-doc"));

    let mut subscriber = harness.connect();
    subscriber.write_all(b"POST /broadcast.service HTTP/1.0\r\nContent-Length: 0\r\n\r\n").unwrap();

    // Give the server a moment to park the subscriber as a ChatReceiver
    // before the publish lands.
    thread::sleep(Duration::from_millis(50));

    let mut publisher = harness.connect();
    publisher
        .write_all(b"POST /broadcast.service HTTP/1.0\r\nContent-Length: 5\r\n\r\nhello")
        .unwrap();
    // The publisher gets no response body; it's just closed.
    assert!(read_all(&mut publisher).is_empty());

    let response = read_all(&mut subscriber);
    let text = String::from_utf8_lossy(&response);
    assert!(text.starts_with("HTTP/1.0 200 OK\r\nDate: "));
    assert!(text.ends_with("hello"));
}

#[test]
fn two_subscribers_receive_the_same_publish() {
    let root = tempdir().unwrap();
    let logs = tempdir().unwrap();
    let harness = Harness::start(root.path().to_path_buf(), logs.path().to_path_buf(), PathBuf::from("/nonexistent-404-doc"));

    let mut sub_a = harness.connect();
    sub_a.write_all(b"POST /broadcast.service HTTP/1.0\r\nContent-Length: 0\r\n\r\n").unwrap();
    let mut sub_b = harness.connect();
    sub_b.write_all(b"POST /broadcast.service HTTP/1.0\r\nContent-Length: 0\r\n\r\n").unwrap();

    thread::sleep(Duration::from_millis(50));

    let mut publisher = harness.connect();
    publisher
        .write_all(b"POST /broadcast.service HTTP/1.0\r\nContent-Length: 3\r\n\r\nhey")
        .unwrap();
    assert!(read_all(&mut publisher).is_empty());

    let resp_a = String::from_utf8_lossy(&read_all(&mut sub_a)).into_owned();
    let resp_b = String::from_utf8_lossy(&read_all(&mut sub_b)).into_owned();
    assert!(resp_a.ends_with("hey"));
    assert!(resp_b.ends_with("hey"));
}

#[test]
fn sequential_publishes_accumulate_for_a_later_subscriber() {
    let root = tempdir().unwrap();
    let logs = tempdir().unwrap();
    let harness = Harness::start(root.path().to_path_buf(), logs.path().to_path_buf(), PathBuf::from("/nonexistent-404-doc"));

    let mut first = harness.connect();
    first.write_all(b"POST /broadcast.service HTTP/1.0\r\nContent-Length: 2\r\n\r\nab").unwrap();
    assert!(read_all(&mut first).is_empty());

    let mut second = harness.connect();
    second.write_all(b"POST /broadcast.service HTTP/1.0\r\nContent-Length: 2\r\n\r\ncd").unwrap();
    assert!(read_all(&mut second).is_empty());

    let mut late_subscriber = harness.connect();
    late_subscriber
        .write_all(b"POST /broadcast.service HTTP/1.0\r\nContent-Length: 0\r\n\r\n")
        .unwrap();
    let response = String::from_utf8_lossy(&read_all(&mut late_subscriber)).into_owned();
    assert!(response.ends_with("abcd"));
}

#[test]
fn oversized_request_only_disconnects_the_offending_connection() {
    let root = tempdir().unwrap();
    let logs = tempdir().unwrap();
    fs::write(root.path().join("ok.txt"), b"still fine").unwrap();
    let harness = Harness::start(root.path().to_path_buf(), logs.path().to_path_buf(), PathBuf::from("/nonexistent-404-doc"));

    let mut offender = harness.connect();
    // Past MAX_BUFFER (1 MiB) with no \r\n\r\n anywhere in the stream.
    let chunk = vec![b'x'; 64 * 1024];
    for _ in 0..40 {
        if offender.write_all(&chunk).is_err() {
            break;
        }
    }
    // The connection must have been torn down rather than left to grow
    // forever: either the write eventually fails, or a subsequent read
    // returns EOF/closed.
    let mut probe = [0u8; 1];
    let _ = offender.set_read_timeout(Some(Duration::from_secs(5)));
    let result = offender.read(&mut probe);
    assert!(matches!(result, Ok(0)) || result.is_err());

    let mut other = harness.connect();
    other.write_all(b"GET /ok.txt HTTP/1.0\r\n\r\n").unwrap();
    let response = read_all(&mut other);
    assert!(String::from_utf8_lossy(&response).ends_with("still fine"));
}
