//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

#[allow(dead_code)]
/// Start a simple mock backend that returns a fixed response.
/// Binds an ephemeral port and returns its address.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            response.len(),
                            response
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// JSON rule file content for `(domain, backends)` pairs.
#[allow(dead_code)]
pub fn rules_json(rules: &[(&str, &[&str])]) -> String {
    let records: Vec<serde_json::Value> = rules
        .iter()
        .map(|(domain, backends)| serde_json::json!({ "Domain": domain, "Backends": backends }))
        .collect();
    serde_json::Value::Array(records).to_string()
}

/// Replace the file content in place, as an editor truncating and writing would.
#[allow(dead_code)]
pub fn rewrite(path: &Path, content: &str) {
    std::fs::write(path, content).unwrap();
}

/// Poll `condition` every 20ms until it holds or `timeout` elapses.
#[allow(dead_code)]
pub async fn eventually<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
