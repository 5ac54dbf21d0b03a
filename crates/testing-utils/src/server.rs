//! Local HTTP server that test packages mount their routes on.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::{Request, State},
    response::Response,
    Router,
};
use chrono::Utc;
use hatchetest_api::{create_routes, with_middleware, AppState};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tower::ServiceExt;
use tracing::{debug, info};

const BASE_PORT: u16 = 8080;
const PORT_ATTEMPTS: u16 = 10;

type SharedRouter = Arc<RwLock<Router>>;

/// Test server started once per shared suite.
///
/// Requests are dispatched through a router that can be extended while the
/// server is running, see [`TestServer::register`].
pub struct TestServer {
    url: String,
    port: u16,
    routes: SharedRouter,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    /// Binds on a port derived from the current time so repeated runs on the
    /// same machine rarely collide; the next few ports are tried when taken.
    pub async fn start() -> Result<Self> {
        let listener = bind_listener().await?;
        let port = listener.local_addr()?.port();

        // middleware wraps the dispatcher so routes registered later get it too
        let routes: SharedRouter = Arc::new(RwLock::new(create_routes(AppState::default())));
        let app = with_middleware(
            Router::new()
                .fallback(dispatch)
                .with_state(Arc::clone(&routes)),
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let url = format!("http://localhost:{port}");
        info!("Test server started on {}", url);

        Ok(Self {
            url,
            port,
            routes,
            shutdown_tx,
            task,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Replaces the live router with `f(current)`. Takes effect for the next request.
    pub async fn register<F>(&self, f: F)
    where
        F: FnOnce(Router) -> Router,
    {
        let mut routes = self.routes.write().await;
        let current = std::mem::take(&mut *routes);
        *routes = f(current);
    }

    pub async fn shutdown(self) -> Result<()> {
        debug!("Shutting down test server on {}", self.url);

        // the server task may already be gone, in which case its result below says why
        let _ = self.shutdown_tx.send(());

        self.task
            .await
            .context("test server task failed")?
            .context("test server exited with an error")
    }

    #[cfg(test)]
    pub(crate) fn abort(&self) {
        self.task.abort();
    }
}

async fn dispatch(State(routes): State<SharedRouter>, request: Request) -> Response {
    let router = routes.read().await.clone();
    router
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {})
}

fn derived_port() -> u16 {
    BASE_PORT + (Utc::now().timestamp_subsec_nanos() % 1000) as u16
}

async fn bind_listener() -> Result<TcpListener> {
    let first = derived_port();
    let mut last_error = None;

    for port in first..first + PORT_ATTEMPTS {
        match TcpListener::bind(("127.0.0.1", port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) => {
                debug!("Port {} unavailable for test server: {}", port, e);
                last_error = Some(e);
            }
        }
    }

    Err(anyhow!(
        "no free port for test server in {}..{}: {:?}",
        first,
        first + PORT_ATTEMPTS,
        last_error
    ))
}
