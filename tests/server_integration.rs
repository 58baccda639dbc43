use std::fs;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

use soundwave::{AppServer, EventBus, ServeError, ServeOptions, StartResult};

fn fixture_app() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixture/app/www")
}

async fn send(port: u16, raw: &str) -> String {
    let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port))
        .await
        .expect("failed to connect to server");
    stream.write_all(raw.as_bytes()).await.expect("failed to send request");

    let mut buffer = String::new();
    stream.read_to_string(&mut buffer).await.unwrap();
    buffer
}

async fn get(port: u16, path: &str) -> String {
    send(port, &format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n")).await
}

fn record_logs(bus: &EventBus) -> Arc<Mutex<Vec<String>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.on_log(move |line| sink.lock().unwrap().push(line.to_string()));
    seen
}

async fn wait_for_logs(seen: &Arc<Mutex<Vec<String>>>, count: usize) {
    for _ in 0..100 {
        if seen.lock().unwrap().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn serve_reports_start_and_serves_root_document() {
    let (tx, rx) = oneshot::channel::<Result<StartResult, ServeError>>();
    AppServer::new(EventBus::new())
        .serve_with(Some(ServeOptions::port(4500).with_root(fixture_app())), move |result| {
            let _ = tx.send(result);
        })
        .unwrap();

    let started = rx.await.unwrap().expect("server should start");
    assert_eq!(started.address, Ipv4Addr::LOCALHOST);
    assert_eq!(started.port, 4500);
    assert_eq!(started.server.local_addr().port(), 4500);

    let response = get(4500, "/").await;
    assert!(response.contains("HTTP/1.1 200 OK"), "Expected 200 OK, got:\n{}", response);
    assert!(response.contains("<title>Hello World</title>"));

    started.server.shutdown().await;
}

#[tokio::test]
async fn log_subscriber_sees_startup_then_requests() {
    let bus = EventBus::new();
    let seen = record_logs(&bus);

    let started = AppServer::new(bus)
        .serve(Some(ServeOptions::port(4501).with_root(fixture_app())))
        .await
        .unwrap();

    get(4501, "/css/index.css").await;
    get(4501, "/missing.html").await;
    wait_for_logs(&seen, 3).await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "listening on 127.0.0.1:4501".to_string(),
            "200 /css/index.css".to_string(),
            "404 /missing.html".to_string(),
        ]
    );
    started.server.shutdown().await;
}

#[tokio::test]
async fn handles_multiple_concurrent_requests() {
    let tmp_dir = tempdir().unwrap();
    fs::write(tmp_dir.path().join("test.html"), "<h1>Concurrent Test</h1>").unwrap();

    let started = AppServer::new(EventBus::new())
        .serve(Some(ServeOptions::port(4502).with_root(tmp_dir.path())))
        .await
        .unwrap();

    let handles: Vec<_> = (0..5)
        .map(|_| tokio::spawn(async { get(4502, "/test.html").await }))
        .collect();

    for handle in handles {
        let buffer = handle.await.unwrap();
        assert!(buffer.contains("HTTP/1.1 200 OK"), "Expected 200 OK response, got:\n{}", buffer);
        assert!(buffer.contains("<h1>Concurrent Test</h1>"), "Expected file content, got:\n{}", buffer);
    }
    started.server.shutdown().await;
}

#[tokio::test]
async fn server_returns_404_for_missing_file() {
    let tmp_dir = tempdir().unwrap();

    let started = AppServer::new(EventBus::new())
        .serve(Some(ServeOptions::port(4503).with_root(tmp_dir.path())))
        .await
        .unwrap();

    let buffer = get(4503, "/nonexistent.html").await;

    assert!(buffer.contains("HTTP/1.1 404 NOT FOUND"), "Expected 404 NOT FOUND, got:\n{}", buffer);
    assert!(buffer.contains("<h1>404 Not Found</h1>"), "Expected 404 body, got:\n{}", buffer);
    started.server.shutdown().await;
}

#[tokio::test]
async fn second_server_on_same_port_reports_error() {
    let bus = EventBus::new();
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    bus.on_error(move |e| sink.lock().unwrap().push(e.to_string()));

    let app = AppServer::new(bus);
    let first = app
        .serve(Some(ServeOptions::port(4504).with_root(fixture_app())))
        .await
        .unwrap();

    let err = app
        .serve(Some(ServeOptions::port(4504).with_root(fixture_app())))
        .await
        .unwrap_err();

    assert!(matches!(err, ServeError::Bind { .. }));
    assert_eq!(errors.lock().unwrap().len(), 1);
    assert!(errors.lock().unwrap()[0].contains("127.0.0.1:4504"));

    // The first server is unaffected.
    assert!(get(4504, "/").await.contains("200 OK"));
    first.server.shutdown().await;
}

#[tokio::test]
async fn serve_without_options_opens_no_socket() {
    let err = soundwave::serve(None).await.unwrap_err();
    assert!(matches!(err, ServeError::MissingOptions));

    let err = soundwave::serve_with(None, |_| {}).unwrap_err();
    assert!(matches!(err, ServeError::MissingOptions));
}

#[tokio::test]
async fn listen_serves_a_plain_handler() {
    let tmp_dir = tempdir().unwrap();
    fs::write(tmp_dir.path().join("index.html"), "<h1>Hello from Test</h1>").unwrap();

    let server = soundwave::server::listen("127.0.0.1:0", soundwave::StaticFiles::new(tmp_dir.path()))
        .await
        .unwrap();

    let buffer = get(server.local_addr().port(), "/").await;
    assert!(buffer.contains("<h1>Hello from Test</h1>"), "got:\n{}", buffer);

    let head = send(server.local_addr().port(), "HEAD / HTTP/1.1\r\n\r\n").await;
    assert!(head.contains("Content-Length: 24"), "got:\n{}", head);
    assert!(head.ends_with("\r\n\r\n"));

    server.shutdown().await;
}

#[tokio::test]
async fn failure_after_start_reaches_bus_not_callback() {
    let tmp_dir = tempdir().unwrap();
    fs::write(tmp_dir.path().join("big.bin"), vec![0u8; 16 * 1024 * 1024]).unwrap();

    let bus = EventBus::new();
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    bus.on_error(move |e| sink.lock().unwrap().push(e.to_string()));

    let calls = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&calls);
    let (tx, rx) = oneshot::channel::<Result<StartResult, ServeError>>();
    AppServer::new(bus)
        .serve_with(Some(ServeOptions::port(4505).with_root(tmp_dir.path())), move |result| {
            *counter.lock().unwrap() += 1;
            let _ = tx.send(result);
        })
        .unwrap();
    let started = rx.await.unwrap().expect("server should start");

    // Request a file far larger than the socket buffers, never read it, then
    // close with unread data pending so the server's write is reset.
    let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, 4505)).await.unwrap();
    stream.write_all(b"GET /big.bin HTTP/1.1\r\n\r\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let mut first = [0u8; 64];
    let _ = stream.read(&mut first).await;
    drop(stream);

    for _ in 0..200 {
        if !errors.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(errors.lock().unwrap().len(), 1, "got: {:?}", errors.lock().unwrap());
    assert!(errors.lock().unwrap()[0].starts_with("server i/o error"));
    assert_eq!(*calls.lock().unwrap(), 1);
    started.server.shutdown().await;
}

#[tokio::test]
async fn idle_preconnect_is_not_reported() {
    let bus = EventBus::new();
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    bus.on_error(move |e| sink.lock().unwrap().push(e.to_string()));

    let started = AppServer::new(bus)
        .serve(Some(ServeOptions::port(4506).with_root(fixture_app())))
        .await
        .unwrap();

    drop(TcpStream::connect((Ipv4Addr::LOCALHOST, 4506)).await.unwrap());
    assert!(get(4506, "/").await.contains("200 OK"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(errors.lock().unwrap().is_empty(), "got: {:?}", errors.lock().unwrap());
    started.server.shutdown().await;
}
