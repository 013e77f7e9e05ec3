//! Minimal HTTP/1.1 stand-in for the image API, for integration tests.
//!
//! POSTs to the generate path are answered from a script, one entry per
//! request; once the script runs out the last entry repeats. Any GET under
//! `/images/` returns the configured image bytes.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Placeholder in scripted bodies, replaced with the server's base URL.
pub const BASE_PLACEHOLDER: &str = "{base}";

struct Shared {
    script: Mutex<VecDeque<(u16, String)>>,
    last: Mutex<(u16, String)>,
    image: Vec<u8>,
    generate_hits: AtomicUsize,
    image_hits: AtomicUsize,
    api_keys: Mutex<Vec<String>>,
}

pub struct ImageServer {
    pub base_url: String,
    shared: Arc<Shared>,
}

impl ImageServer {
    pub fn generate_hits(&self) -> usize {
        self.shared.generate_hits.load(Ordering::SeqCst)
    }

    pub fn image_hits(&self) -> usize {
        self.shared.image_hits.load(Ordering::SeqCst)
    }

    pub fn api_keys(&self) -> Vec<String> {
        self.shared.api_keys.lock().unwrap().clone()
    }
}

/// Starts a server in a background thread. Runs until the process exits.
pub fn start(script: Vec<(u16, &str)>, image: Vec<u8>) -> ImageServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let base_url = format!("http://127.0.0.1:{}/", port);

    let script: VecDeque<(u16, String)> = script
        .into_iter()
        .map(|(status, body)| (status, body.replace(BASE_PLACEHOLDER, &base_url)))
        .collect();
    let last = script.back().cloned().unwrap_or((200, "{\"data\":[]}".to_string()));
    let shared = Arc::new(Shared {
        script: Mutex::new(script),
        last: Mutex::new(last),
        image,
        generate_hits: AtomicUsize::new(0),
        image_hits: AtomicUsize::new(0),
        api_keys: Mutex::new(Vec::new()),
    });

    let server_shared = Arc::clone(&shared);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let shared = Arc::clone(&server_shared);
            thread::spawn(move || handle(stream, &shared));
        }
    });
    ImageServer { base_url, shared }
}

/// A base URL nothing listens on.
pub fn dead_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/", port)
}

fn handle(mut stream: TcpStream, shared: &Shared) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));

    let Some((head, _body)) = read_request(&mut stream) else {
        return;
    };
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or("");
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("");
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("api-key") {
                shared.api_keys.lock().unwrap().push(value.trim().to_string());
            }
        }
    }

    if method.eq_ignore_ascii_case("POST") && path.ends_with("/v1/ideogram-v3/generate") {
        shared.generate_hits.fetch_add(1, Ordering::SeqCst);
        let (status, body) = {
            let mut script = shared.script.lock().unwrap();
            script
                .pop_front()
                .unwrap_or_else(|| shared.last.lock().unwrap().clone())
        };
        respond(&mut stream, status, "application/json", body.as_bytes());
        return;
    }
    if method.eq_ignore_ascii_case("GET") && path.starts_with("/images/") {
        shared.image_hits.fetch_add(1, Ordering::SeqCst);
        respond(&mut stream, 200, "image/png", &shared.image);
        return;
    }
    respond(&mut stream, 404, "text/plain", b"not found");
}

/// Reads the request head and, if `Content-Length` is set, the body.
fn read_request(stream: &mut TcpStream) -> Option<(String, Vec<u8>)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let head_end = loop {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = buf[head_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    Some((head, body))
}

fn respond(stream: &mut TcpStream, status: u16, content_type: &str, body: &[u8]) {
    let reason = match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    };
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason,
        content_type,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
    let _ = stream.flush();
}
