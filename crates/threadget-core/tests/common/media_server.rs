//! Minimal HTTP/1.1 server for integration tests.
//!
//! Each path is bound to a `Route` that decides how the request is answered:
//! a body, an error status, N failures before success, a slow or stalled body,
//! or a truncated body. Counts hits per path and tracks how many requests are
//! being served at once. Every response carries `Connection: close`.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Route {
    /// 200 with the full body.
    Body(Vec<u8>),
    /// The given status with an empty body.
    Status(u16),
    /// The first `failures` requests get `status`, later ones the body.
    FailThenBody {
        failures: usize,
        status: u16,
        body: Vec<u8>,
    },
    /// Waits `delay` before answering with the body.
    Slow { body: Vec<u8>, delay: Duration },
    /// Announces the full length, sends `sent` bytes, then goes silent for
    /// `hold` before closing.
    Stall {
        body: Vec<u8>,
        sent: usize,
        hold: Duration,
    },
    /// Announces the full length but closes after `sent` bytes.
    Truncated { body: Vec<u8>, sent: usize },
}

#[derive(Default)]
struct State {
    routes: Mutex<HashMap<String, Route>>,
    hits: Mutex<HashMap<String, usize>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

/// Handle to a running server; it runs until the process exits.
#[derive(Clone)]
pub struct MediaServer {
    base: String,
    state: Arc<State>,
}

impl MediaServer {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(State::default());
        let server_state = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&server_state);
                thread::spawn(move || handle(stream, &state));
            }
        });
        Self {
            base: format!("http://127.0.0.1:{}", port),
            state,
        }
    }

    /// Base URL without trailing slash, e.g. `http://127.0.0.1:12345`.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Binds `path` (starting with `/`) to `route` and returns its full URL.
    pub fn route(&self, path: &str, route: Route) -> String {
        self.state
            .routes
            .lock()
            .unwrap()
            .insert(path.to_string(), route);
        self.url(path)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn hits(&self, path: &str) -> usize {
        self.state.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.state.hits.lock().unwrap().values().sum()
    }

    /// Most requests ever being processed at the same time (a `Slow` route
    /// counts for its whole delay).
    pub fn peak_active(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }
}

/// URL on a port nothing listens on (connection refused).
pub fn closed_port_url(path: &str) -> String {
    let port = {
        let l = TcpListener::bind("127.0.0.1:0").expect("bind");
        l.local_addr().unwrap().port()
    };
    format!("http://127.0.0.1:{}{}", port, path)
}

struct ActiveGuard<'a>(&'a State);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

fn handle(mut stream: TcpStream, state: &State) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(path) = read_request_path(&mut stream) else {
        return;
    };

    let now = state.active.fetch_add(1, Ordering::SeqCst) + 1;
    state.peak.fetch_max(now, Ordering::SeqCst);
    // Released before the last byte goes out, so a client cannot start its
    // next request while this one still counts as active.
    let active = ActiveGuard(state);

    let hit = {
        let mut hits = state.hits.lock().unwrap();
        let n = hits.entry(path.clone()).or_insert(0);
        *n += 1;
        *n
    };
    let route = state.routes.lock().unwrap().get(&path).cloned();
    if let Some(Route::Slow { delay, .. }) = &route {
        thread::sleep(*delay);
    }
    drop(active);

    match route {
        None => respond(&mut stream, 404, b""),
        Some(Route::Body(body)) => respond(&mut stream, 200, &body),
        Some(Route::Status(status)) => respond(&mut stream, status, b""),
        Some(Route::FailThenBody {
            failures,
            status,
            body,
        }) => {
            if hit <= failures {
                respond(&mut stream, status, b"");
            } else {
                respond(&mut stream, 200, &body);
            }
        }
        Some(Route::Slow { body, .. }) => respond(&mut stream, 200, &body),
        Some(Route::Stall { body, sent, hold }) => {
            let _ = write_head(&mut stream, 200, body.len());
            let _ = stream.write_all(&body[..sent.min(body.len())]);
            let _ = stream.flush();
            thread::sleep(hold);
        }
        Some(Route::Truncated { body, sent }) => {
            let _ = write_head(&mut stream, 200, body.len());
            let _ = stream.write_all(&body[..sent.min(body.len())]);
            let _ = stream.flush();
        }
    }
}

fn read_request_path(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return None,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
        if buf.len() > 64 * 1024 {
            return None;
        }
    }
    let request = String::from_utf8_lossy(&buf);
    let first = request.lines().next()?;
    let mut parts = first.split_whitespace();
    let _method = parts.next()?;
    parts.next().map(|p| p.to_string())
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

fn write_head(stream: &mut TcpStream, status: u16, len: usize) -> std::io::Result<()> {
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
        status,
        reason(status),
        len
    );
    stream.write_all(head.as_bytes())
}

fn respond(stream: &mut TcpStream, status: u16, body: &[u8]) {
    if write_head(stream, status, body.len()).is_ok() {
        let _ = stream.write_all(body);
    }
    let _ = stream.flush();
}
