// crates/triage-providers/tests/common/mod.rs
// ============================================================================
// Module: Provider Test Helpers
// Description: Local HTTP fixtures for probe and queue tests.
// Purpose: Serve scripted responses on loopback without external network.
// ============================================================================

#![allow(dead_code, reason = "Each test binary uses a subset of the helpers.")]

use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::thread::JoinHandle;

use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

/// Request observed by a fixture server.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    /// Path and query.
    pub url: String,
    /// Header pairs.
    pub headers: Vec<(String, String)>,
}

impl SeenRequest {
    /// Returns the value of a header, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Fixture server handle.
pub struct Fixture {
    /// Base URL, e.g. `http://127.0.0.1:4321`.
    pub base: String,
    /// Requests served so far.
    pub seen: Arc<Mutex<Vec<SeenRequest>>>,
    /// Serving thread.
    pub handle: JoinHandle<()>,
}

impl Fixture {
    /// Waits for the server thread and returns every observed request.
    pub fn finish(self) -> Vec<SeenRequest> {
        self.handle.join().unwrap();
        self.seen.lock().unwrap().clone()
    }
}

/// Serves exactly `count` requests, answering each through `respond`.
pub fn serve<F>(count: usize, respond: F) -> Fixture
where
    F: Fn(&SeenRequest) -> (u16, String, Vec<(String, String)>) + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let handle = thread::spawn(move || {
        for _ in 0 .. count {
            let Ok(request) = server.recv() else {
                return;
            };
            let observed = SeenRequest {
                url: request.url().to_string(),
                headers: request
                    .headers()
                    .iter()
                    .map(|header| {
                        let field = header.field.as_str().as_str().to_string();
                        (field, header.value.as_str().to_string())
                    })
                    .collect(),
            };
            let (status, body, headers) = respond(&observed);
            log.lock().unwrap().push(observed);
            let mut response = Response::from_string(body).with_status_code(status);
            for (field, value) in headers {
                let header = Header::from_bytes(field.as_bytes(), value.as_bytes()).unwrap();
                response.add_header(header);
            }
            let _ = request.respond(response);
        }
    });
    Fixture {
        base: format!("http://{addr}"),
        seen,
        handle,
    }
}

/// Serves `count` requests with a fixed status and JSON body.
pub fn serve_json(count: usize, status: u16, body: &str) -> Fixture {
    let body = body.to_string();
    serve(count, move |_| (status, body.clone(), Vec::new()))
}
