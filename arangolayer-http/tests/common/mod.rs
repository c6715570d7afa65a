#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
};

/// A request as the stub server received it.
#[derive(Debug, Clone)]
pub struct Received {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Received {
    /// The target without its query string.
    pub fn path(&self) -> &str {
        self.target.split_once('?').map_or(self.target.as_str(), |(path, _)| path)
    }

    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, query)| query)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("request body should be JSON")
    }
}

/// An HTTP server answering each request with the next scripted reply, one request
/// per connection.
pub struct StubServer {
    endpoint: String,
    received: Arc<Mutex<Vec<Received>>>,
}

impl StubServer {
    pub async fn start(replies: impl IntoIterator<Item = (u16, Value)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub server");
        let endpoint = format!("http://{}", listener.local_addr().expect("stub server address"));
        let replies = Arc::new(Mutex::new(replies.into_iter().collect::<VecDeque<_>>()));
        let received = Arc::new(Mutex::new(Vec::new()));

        let log = received.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let replies = replies.clone();
                let log = log.clone();
                tokio::spawn(async move { answer(stream, replies, log).await });
            }
        });

        Self { endpoint, received }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().expect("request log").clone()
    }
}

async fn answer(stream: TcpStream, replies: Arc<Mutex<VecDeque<(u16, Value)>>>, log: Arc<Mutex<Vec<Received>>>) {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).await.unwrap_or(0) == 0 {
        return;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    let mut content_length = 0;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await.expect("read header");
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let (name, value) = (name.trim().to_string(), value.trim().to_string());
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().expect("content-length");
            }
            headers.push((name, value));
        }
    }

    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).await.expect("read body");

    log.lock().expect("request log").push(Received {
        method,
        target,
        headers,
        body: String::from_utf8(body).expect("utf-8 body"),
    });

    let (status, reply) = replies
        .lock()
        .expect("reply queue")
        .pop_front()
        .unwrap_or((500, serde_json::json!({ "error": true, "errorMessage": "unexpected request" })));
    let reply = reply.to_string();
    let response = format!(
        "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
        reply.len()
    );

    let mut stream = reader.into_inner();
    stream.write_all(response.as_bytes()).await.expect("write reply");
    let _ = stream.shutdown().await;
}

/// An ArangoDB error body.
pub fn arango_error(code: u16, error_num: i64, message: &str) -> (u16, Value) {
    (
        code,
        serde_json::json!({ "error": true, "code": code, "errorNum": error_num, "errorMessage": message }),
    )
}
