//! Errands HTTP Client
//!
//! A small, typed HTTP client for the errands queue service.
//!
//! Both the processor and the CLI talk to the service through this crate.
//!
//! # Example
//!
//! ```no_run
//! use errands_client::ErrandsClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), errands_client::ClientError> {
//!     let client = ErrandsClient::new("http://localhost:5555");
//!
//!     let errands = client.list_errands().await?;
//!     println!("{} errand(s) queued", errands.len());
//!     Ok(())
//! }
//! ```

pub mod error;
mod errands;
mod pipelines;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use errands_core::dto::errand::{CreateErrand, ErrandFilter};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the errands API
///
/// Covers the errand lifecycle:
/// - Listing and filtering errands
/// - Creating and deleting errands
/// - Claiming the next errand of a topic for processing
/// - Reporting completion or failure
///
/// plus basic pipeline management.
#[derive(Debug, Clone)]
pub struct ErrandsClient {
    /// Base URL of the service (e.g., "http://localhost:5555")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl ErrandsClient {
    /// Create a new errands client
    ///
    /// # Example
    /// ```
    /// use errands_client::ErrandsClient;
    ///
    /// let client = ErrandsClient::new("http://localhost:5555");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new errands client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use errands_client::ErrandsClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = ErrandsClient::with_client("http://localhost:5555", http_client);
    /// ```
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the service
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_server {
    //! Local HTTP server for exercising the client against canned replies.

    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// A request as the server received it
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RecordedRequest {
        pub method: String,
        pub path: String,
        pub body: String,
    }

    impl RecordedRequest {
        /// Request body parsed as JSON
        pub fn json(&self) -> serde_json::Value {
            serde_json::from_str(&self.body).unwrap()
        }
    }

    /// Requests received so far, in arrival order
    pub type Requests = Arc<Mutex<Vec<RecordedRequest>>>;

    /// Serves exactly one request, answering with `status` and a JSON `body`.
    pub async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, JoinHandle<RecordedRequest>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            write_response(&mut socket, status, body).await;
            request
        });

        (format!("http://{}", addr), handle)
    }

    /// Serves requests until the runtime stops, answering each one with
    /// whatever `respond` returns for it.
    pub async fn serve<F>(respond: F) -> (String, Requests)
    where
        F: Fn(&RecordedRequest) -> (&'static str, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Requests::default();

        let seen = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let (mut socket, _) = listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                let (status, body) = respond(&request);
                seen.lock().unwrap().push(request);
                write_response(&mut socket, status, &body).await;
            }
        });

        (format!("http://{}", addr), requests)
    }

    async fn read_request(socket: &mut TcpStream) -> RecordedRequest {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let head_len = loop {
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before the request head ended");
            buf.extend_from_slice(&chunk[..n]);
        };

        let head = String::from_utf8_lossy(&buf[..head_len]).to_string();
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        while buf.len() < head_len + content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        let mut request_line = head.split_whitespace();
        RecordedRequest {
            method: request_line.next().unwrap_or_default().to_string(),
            path: request_line.next().unwrap_or_default().to_string(),
            body: String::from_utf8_lossy(&buf[head_len..]).to_string(),
        }
    }

    async fn write_response(socket: &mut TcpStream, status: &str, body: &str) {
        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\
             connection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
    }
}
