//! Loopback diagnostic endpoint
//!
//! Serves a JSON snapshot of the engine statistics:
//!
//! - `GET /debug/vars`: [`EngineStats`] as JSON
//! - `GET /healthz`: `ok`
//! - anything else: `404`
//!
//! The endpoint is optional and never fatal: if the address cannot be
//! bound the daemon logs a warning and keeps updating.

use ddns_core::EngineStats;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Statistics shared between the event collector and the endpoint
pub type SharedStats = Arc<RwLock<EngineStats>>;

/// Bind `addr` and serve in the background
///
/// Returns the bound address, or `None` when binding failed.
pub async fn spawn(addr: SocketAddr, stats: SharedStats) -> Option<SocketAddr> {
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            warn!("Debug endpoint disabled, cannot bind {}: {}", addr, e);
            return None;
        }
    };

    let local = listener.local_addr().unwrap_or(addr);
    info!("Debug endpoint listening on http://{}/debug/vars", local);

    tokio::spawn(serve(listener, stats));
    Some(local)
}

/// Accept connections until the task is dropped
async fn serve(listener: TcpListener, stats: SharedStats) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Debug endpoint accept failed: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };

        let stats = stats.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req| handle(req, stats.clone()));
            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!("Debug connection from {} ended: {}", peer, e);
            }
        });
    }
}

async fn handle(
    req: Request<Incoming>,
    stats: SharedStats,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/debug/vars") => {
            let snapshot = stats.read().await.clone();
            match serde_json::to_vec_pretty(&snapshot) {
                Ok(body) => respond(StatusCode::OK, "application/json", body),
                Err(e) => respond(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "text/plain; charset=utf-8",
                    e.to_string().into_bytes(),
                ),
            }
        }
        (&Method::GET, "/healthz") => {
            respond(StatusCode::OK, "text/plain; charset=utf-8", b"ok".to_vec())
        }
        _ => respond(
            StatusCode::NOT_FOUND,
            "text/plain; charset=utf-8",
            b"not found".to_vec(),
        ),
    };

    Ok(response)
}

fn respond(status: StatusCode, content_type: &'static str, body: Vec<u8>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
