//! The reverse-proxy client the Supervisor uses to both health-check newly-spawned
//! workers and forward invocation traffic to them (§4.4 "reverse-proxy component").
//! Built on `hyper`/`hyper-util`, the direct modern successor of the teacher's own
//! `tower-hyper` client in `azure-functions/src/worker.rs`.

use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

use functions_core::Error;

pub type HyperClient = Client<HttpConnector, Full<Bytes>>;

pub fn new_client() -> HyperClient {
    Client::builder(TokioExecutor::new()).build(HttpConnector::new())
}

#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Forwards one request to `http://127.0.0.1:{port}{path_tail}` (§4.4 "routing": the
/// Supervisor has already stripped the `/{project}/{region}/{short}` prefix by the time
/// this is called).
pub async fn forward(
    client: &HyperClient,
    port: u16,
    method: Method,
    path_tail: &str,
    query: &str,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ProxyResponse, Error> {
    let path_and_query = if query.is_empty() {
        path_tail.to_owned()
    } else {
        format!("{}?{}", path_tail, query)
    };
    let uri: http::Uri = format!("http://127.0.0.1:{}{}", port, path_and_query)
        .parse()
        .map_err(|e| Error::internal(format!("invalid proxied uri: {}", e)))?;

    let mut builder = Request::builder().method(method).uri(uri);
    *builder.headers_mut().unwrap() = headers;
    let request = builder
        .body(Full::new(body))
        .map_err(|e| Error::internal(format!("failed to build proxied request: {}", e)))?;

    let response = client
        .request(request)
        .await
        .map_err(|e| Error::internal(format!("failed to reach worker: {}", e)))?;

    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| Error::internal(format!("failed to read worker response: {}", e)))?
        .to_bytes();

    Ok(ProxyResponse {
        status,
        headers,
        body,
    })
}

/// Bounded poll of a freshly-spawned worker's `/healthz` (§4.4: "≤ 10 s").
pub async fn wait_for_healthz(
    client: &HyperClient,
    port: u16,
    timeout: Duration,
) -> Result<(), Error> {
    let deadline = tokio::time::Instant::now() + timeout;
    let uri: http::Uri = format!("http://127.0.0.1:{}/healthz", port)
        .parse()
        .expect("well-formed loopback uri");

    loop {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri.clone())
            .body(Full::new(Bytes::new()))
            .expect("well-formed healthz request");

        if let Ok(response) = client.request(request).await {
            if response.status() == StatusCode::OK {
                return Ok(());
            }
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(Error::internal("worker failed to become healthy in time"));
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
