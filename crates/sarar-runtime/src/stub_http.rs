//! Canned-response HTTP server for backend tests.
//!
//! Serves one fixed `(status, body)` per path prefix, closes every
//! connection after the response, and records each request's path and body.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Clone)]
pub struct StubServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl StubServer {
    /// Bind to an ephemeral port and serve `routes` until the runtime ends.
    pub async fn start(routes: Vec<(&'static str, u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let routes = routes.clone();
                let log = Arc::clone(&log);
                tokio::spawn(async move { serve(stream, &routes, &log).await });
            }
        });
        Self {
            base_url: format!("http://{addr}"),
            requests,
        }
    }

    /// `(path, body)` of every request received so far.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|(p, _)| p).collect()
    }
}

async fn serve(
    mut stream: TcpStream,
    routes: &[(&'static str, u16, String)],
    log: &Mutex<Vec<(String, String)>>,
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let Ok(n) = stream.read(&mut chunk).await else {
            return;
        };
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|l| {
            let lower = l.to_lowercase();
            lower
                .strip_prefix("content-length:")
                .and_then(|v| v.trim().parse::<usize>().ok())
        })
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let Ok(n) = stream.read(&mut chunk).await else {
            return;
        };
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let path = head
        .lines()
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
    log.lock().unwrap().push((path.clone(), body));

    let (status, payload) = routes
        .iter()
        .find(|(prefix, _, _)| path.starts_with(prefix))
        .map(|(_, s, b)| (*s, b.clone()))
        .unwrap_or((404, "{}".to_string()));
    let response = format!(
        "HTTP/1.1 {status} STUB\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {payload}",
        payload.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}
