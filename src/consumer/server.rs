//! Read-only HTTP surface over the published view.
//!
//! Routes:
//! - `GET /api/stats`: the [`CampaignDocument`] as JSON
//! - `GET /health`: `OK` while the view is fresh, 503 otherwise
//!
//! Nothing in a request selects a file or path on disk.

use std::convert::Infallible;
use std::net::SocketAddr;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::export::CampaignDocument;
use crate::engine::{PublishStatus, SnapshotHandle};

pub const STATS_PATH: &str = "/api/stats";
pub const HEALTH_PATH: &str = "/health";

/// HTTP server bound to a local address.
#[derive(Debug)]
pub struct ApiServer {
    listener: TcpListener,
    handle: SnapshotHandle,
}

impl ApiServer {
    /// Bind the listener. Use port 0 to pick a free port.
    pub async fn bind(addr: &str, handle: SnapshotHandle) -> anyhow::Result<Self> {
        let addr: SocketAddr = addr.parse()?;
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, handle })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve on a background task until the runtime shuts down or the task
    /// is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.serve().await {
                error!(error = %e, "HTTP server stopped");
            }
        })
    }

    pub async fn serve(self) -> std::io::Result<()> {
        if let Ok(addr) = self.listener.local_addr() {
            info!(%addr, "Serving campaign stats");
        }
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let io = TokioIo::new(stream);
            let handle = self.handle.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let handle = handle.clone();
                    async move { handle_request(req, &handle) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(%peer, error = %e, "HTTP connection error");
                }
            });
        }
    }
}

fn handle_request(
    req: Request<hyper::body::Incoming>,
    handle: &SnapshotHandle,
) -> Result<Response<Full<Bytes>>, Infallible> {
    debug!(method = %req.method(), path = %req.uri().path(), "HTTP request");
    Ok(route(req.method(), req.uri().path(), handle))
}

/// Map a method and path to a response.
pub fn route(method: &Method, path: &str, handle: &SnapshotHandle) -> Response<Full<Bytes>> {
    let known = path == STATS_PATH || path == HEALTH_PATH;
    if !known {
        return text(StatusCode::NOT_FOUND, "Not Found");
    }
    if *method != Method::GET && *method != Method::HEAD {
        let mut response = text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
        response
            .headers_mut()
            .insert(hyper::header::ALLOW, HeaderValue::from_static("GET, HEAD"));
        return response;
    }

    let published = handle.load();
    if path == HEALTH_PATH {
        return match published.status() {
            PublishStatus::Fresh => text(StatusCode::OK, "OK"),
            other => text(StatusCode::SERVICE_UNAVAILABLE, other.label()),
        };
    }

    match CampaignDocument::from_published(&published).to_json_pretty() {
        Ok(json) => respond(StatusCode::OK, "application/json", json),
        Err(e) => {
            error!(error = %e, "Failed to encode campaign document");
            text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

fn text(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    respond(status, "text/plain; charset=utf-8", body.to_string())
}

fn respond(status: StatusCode, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CampaignSnapshot, CampaignSummary};
    use crate::engine::{CampaignRoot, DeltaReport, DiscoveryMode};
    use chrono::Utc;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn published_handle() -> SnapshotHandle {
        let handle = SnapshotHandle::new();
        handle.publish(Arc::new(CampaignSnapshot {
            timestamp: Utc::now(),
            root: CampaignRoot {
                path: "/out".into(),
                mode: DiscoveryMode::Single,
            },
            instances: Vec::new(),
            summary: CampaignSummary {
                total_crashes: 7,
                ..CampaignSummary::default()
            },
            warnings: Vec::new(),
            delta: DeltaReport::default(),
            system: None,
        }));
        handle
    }

    async fn body(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_stats_route() {
        let response = route(&Method::GET, STATS_PATH, &published_handle());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");

        let json: serde_json::Value = serde_json::from_str(&body(response).await).unwrap();
        assert_eq!(json["status"], "fresh");
        assert_eq!(json["summary"]["total_crashes"], 7);
    }

    #[tokio::test]
    async fn test_health_route() {
        let response = route(&Method::GET, HEALTH_PATH, &SnapshotHandle::new());
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body(response).await, "not ready");

        let response = route(&Method::GET, HEALTH_PATH, &published_handle());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await, "OK");
    }

    #[test]
    fn test_unknown_path_and_method() {
        let handle = published_handle();
        assert_eq!(
            route(&Method::GET, "/../../etc/passwd", &handle).status(),
            StatusCode::NOT_FOUND
        );
        let response = route(&Method::POST, STATS_PATH, &handle);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[hyper::header::ALLOW], "GET, HEAD");
    }

    #[tokio::test]
    async fn test_serves_over_tcp() {
        let server = ApiServer::bind("127.0.0.1:0", published_handle()).await.unwrap();
        let addr = server.local_addr().unwrap();
        let task = server.spawn();

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.ends_with("OK"));
        task.abort();
    }
}
