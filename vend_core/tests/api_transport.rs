use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use vend_core::{HttpRequest, Transport, UreqTransport};

/// Minimal keep-alive HTTP/1.1 server answering `201 ok` to every request.
/// Returns the bound address and a counter of accepted connections.
fn keep_alive_server() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::spawn(move || serve(stream));
        }
    });
    (addr, accepted)
}

fn serve(stream: TcpStream) {
    let mut writer = stream.try_clone().expect("clone stream");
    let mut reader = BufReader::new(stream);
    loop {
        let mut content_length = 0usize;
        let mut line = String::new();
        // Request line plus headers, up to the blank line.
        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
            if line == "\r\n" {
                break;
            }
            if let Some((name, value)) = line.split_once(':')
                && name.eq_ignore_ascii_case("content-length")
            {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
        let mut body = vec![0; content_length];
        if reader.read_exact(&mut body).is_err() {
            return;
        }
        let reply = "HTTP/1.1 201 Created\r\nContent-Length: 2\r\nConnection: keep-alive\r\n\r\nok";
        if writer.write_all(reply.as_bytes()).is_err() {
            return;
        }
    }
}

fn post(url: &str, body: &[u8]) -> HttpRequest {
    HttpRequest {
        method: "POST",
        url: url.to_string(),
        headers: vec![("Content-Type", "application/json")],
        body: body.to_vec(),
        timeout: Duration::from_secs(5),
    }
}

#[test]
fn one_transport_reuses_its_connection_across_requests() {
    let (addr, accepted) = keep_alive_server();
    let url = format!("http://{addr}/api/ping/");
    let transport = UreqTransport::new();

    for n in 0..3 {
        let resp = transport
            .execute(&post(&url, format!("{{\"n\":{n}}}").as_bytes()))
            .expect("response");
        assert_eq!(resp.status, 201);
        assert_eq!(resp.body, b"ok");
    }

    assert_eq!(accepted.load(Ordering::SeqCst), 1);
}

#[test]
fn refused_connection_is_a_transport_error() {
    // Bind then drop to get a port nobody listens on.
    let addr = TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .expect("addr");
    let transport = UreqTransport::new();
    let err = transport.execute(&post(&format!("http://{addr}/"), b"{}"));
    assert!(err.is_err());
}
