//! HTTP host serving one dispatcher per configured service.

use crate::config::{ConfigError, MockServerConfig};
use crate::dispatcher::{BufferedResponse, Dispatcher, ResponseWriter};
use crate::service::match_base_path;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::cmp::Reverse;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Routes requests to the service whose base path claims them
pub struct MockServer {
    dispatchers: Vec<Arc<Dispatcher>>,
}

impl MockServer {
    /// Services with longer base paths are tried first; ties keep their order
    pub fn new(dispatchers: Vec<Dispatcher>) -> Self {
        let mut dispatchers: Vec<_> = dispatchers.into_iter().map(Arc::new).collect();
        dispatchers.sort_by_key(|d| Reverse(d.path().len()));
        Self { dispatchers }
    }

    pub fn from_config(config: &MockServerConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.build_dispatchers()?))
    }

    pub fn dispatchers(&self) -> &[Arc<Dispatcher>] {
        &self.dispatchers
    }

    /// The dispatcher of the most specific service claiming `path`
    pub fn route(&self, path: &str) -> Option<&Arc<Dispatcher>> {
        self.dispatchers
            .iter()
            .find(|d| match_base_path(path, d.path()).is_some())
    }

    /// Handle one HTTP request.
    ///
    /// The body is collected first, then the dispatch runs on the blocking
    /// pool since hooks and actions may block.
    pub async fn handle<B>(&self, request: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: fmt::Display,
    {
        let Some(dispatcher) = self.route(request.uri().path()).cloned() else {
            debug!(
                "No service claims {} {}",
                request.method(),
                request.uri().path()
            );
            return json_error(
                StatusCode::NOT_FOUND,
                &format!(
                    "No service matches {} {}",
                    request.method(),
                    request.uri().path()
                ),
            );
        };

        let (parts, body) = request.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                debug!("Failed to read request body: {}", e);
                return json_error(
                    StatusCode::BAD_REQUEST,
                    &format!("Failed to read request body: {e}"),
                );
            }
        };
        let request = Request::from_parts(parts, body);

        let dispatched = tokio::task::spawn_blocking(move || {
            let mut response = BufferedResponse::new();
            dispatcher.dispatch_request(&request, &mut response);
            response
        })
        .await;

        match dispatched {
            Ok(response) => response.into_response(),
            Err(e) => {
                error!("Dispatch task failed: {}", e);
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "Dispatch task failed")
            }
        }
    }

    /// Accept connections on `listener` until `shutdown` resolves
    pub async fn serve<F>(self: Arc<Self>, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        info!(
            "Serving {} mock service(s) on {}",
            self.dispatchers.len(),
            local_addr
        );
        for dispatcher in &self.dispatchers {
            info!(
                "  service '{}' at '{}'",
                dispatcher.service().name(),
                if dispatcher.path().is_empty() { "/" } else { dispatcher.path() }
            );
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let server = Arc::clone(&self);
                            tokio::spawn(async move {
                                let io = TokioIo::new(stream);
                                let service = service_fn(move |req| {
                                    let server = Arc::clone(&server);
                                    async move { Ok::<_, Infallible>(server.handle(req).await) }
                                });
                                if let Err(e) = http1::Builder::new()
                                    .serve_connection(io, service)
                                    .await
                                {
                                    debug!("Connection error from {}: {}", addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error on {}: {}", local_addr, e);
                        }
                    }
                }
                _ = &mut shutdown => {
                    info!("Shutting down mock server on {}", local_addr);
                    break;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for MockServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockServer")
            .field("dispatchers", &self.dispatchers)
            .finish()
    }
}

fn json_error(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": message });
    let mut response = BufferedResponse::new();
    response.set_status(status);
    response.set_header("content-type", "application/json");
    response.write_body(body.to_string().as_bytes());
    response.into_response()
}
