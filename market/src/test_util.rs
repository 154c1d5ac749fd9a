use async_trait::async_trait;
use cache::{CacheError, Fetcher};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

// 按endpoint返回固定JSON，并记录请求
#[derive(Default)]
pub struct StaticFetcher {
    responses: HashMap<String, Value>,
    requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl StaticFetcher {
    pub fn with(mut self, endpoint: &str, value: Value) -> Self {
        self.responses.insert(endpoint.to_string(), value);
        self
    }

    pub async fn requests(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, endpoint: &str, params: &[(String, String)]) -> cache::Result<Value> {
        self.requests
            .lock()
            .await
            .push((endpoint.to_string(), params.to_vec()));
        self.responses
            .get(endpoint)
            .cloned()
            .ok_or_else(|| CacheError::fetch_status(404, format!("no response for {}", endpoint)))
    }
}

// 只回复固定状态码和body的HTTP服务器
pub struct MockHttpServer {
    pub url: String,
    request_lines: Arc<Mutex<Vec<String>>>,
}

impl MockHttpServer {
    pub async fn start(status: u16, body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let request_lines = Arc::new(Mutex::new(Vec::new()));
        let request_lines1 = request_lines.clone();
        let body = body.to_string();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            buf.extend_from_slice(&chunk[..n]);
                            if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                    }
                }
                let request = String::from_utf8_lossy(&buf).to_string();
                if let Some(line) = request.lines().next() {
                    request_lines1.lock().await.push(line.to_string());
                }
                let response = format!(
                    "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self { url, request_lines }
    }

    pub async fn request_lines(&self) -> Vec<String> {
        self.request_lines.lock().await.clone()
    }
}
